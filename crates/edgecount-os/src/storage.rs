use std::path::{Path, PathBuf};

use edgecount::config::CredentialStorage;
use edgecount::error::{Error as LoopError, Result as LoopResult};

/// A [`CredentialStorage`] rooted at a directory.
///
/// The resource `/credentials.txt` is the file `credentials.txt` inside the
/// root directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileStorage {
    root: PathBuf,
}

impl FileStorage {
    /// Creates a [`FileStorage`] rooted at `root`.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Returns the root directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl CredentialStorage for FileStorage {
    fn read_to_string(&mut self, path: &str) -> LoopResult<String> {
        let file = self.root.join(path.trim_start_matches('/'));
        std::fs::read_to_string(&file)
            .map_err(|e| LoopError::configuration(format!("{}: {e}", file.display())))
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use edgecount::config::read_credentials;
    use edgecount::error::Error as LoopError;

    use super::FileStorage;

    #[test]
    fn reads_credentials_from_a_directory() {
        let root = std::env::temp_dir().join(format!("edgecount-storage-{}", std::process::id()));
        fs::create_dir_all(&root).unwrap();
        fs::write(root.join("credentials.txt"), "office\nopen-sesame\n").unwrap();

        let mut storage = FileStorage::new(&root);
        let credentials = read_credentials(&mut storage).unwrap();
        assert_eq!(credentials.ssid, "office");
        assert_eq!(credentials.password, "open-sesame");

        fs::remove_dir_all(&root).unwrap();

        assert!(matches!(
            read_credentials(&mut storage),
            Err(LoopError::ConfigurationUnavailable(_))
        ));
    }
}
