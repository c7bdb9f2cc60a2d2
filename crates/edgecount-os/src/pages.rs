use std::path::Path;

use edgecount::routes::Router;

use tracing::{info, warn};

use crate::error::Result;

/// A static page served at `/<file stem>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    /// Route path.
    pub path: &'static str,
    /// Content type, derived from the file extension.
    pub content_type: &'static str,
    /// Page contents.
    pub body: &'static str,
}

/// Loads the pages of a directory, so that `hello.html` is served at
/// `/hello`.
///
/// Pages live for the whole process. Files with an unknown extension are
/// skipped.
///
/// # Errors
///
/// The directory or one of its pages cannot be read.
pub fn load_pages(dir: &Path) -> Result<Vec<Page>> {
    let mut pages = Vec::new();

    for entry in std::fs::read_dir(dir)? {
        let file = entry?.path();

        let Some(content_type) = file
            .extension()
            .and_then(|extension| extension.to_str())
            .and_then(content_type)
        else {
            continue;
        };

        let Some(stem) = file.file_stem().and_then(|stem| stem.to_str()) else {
            continue;
        };

        let body = std::fs::read_to_string(&file)?;
        pages.push(Page {
            path: format!("/{stem}").leak(),
            content_type,
            body: body.leak(),
        });
    }

    pages.sort_unstable_by_key(|page| page.path);
    Ok(pages)
}

/// Adds the pages to a router.
///
/// A page never replaces an existing route.
#[must_use]
pub fn register(mut router: Router, pages: &[Page]) -> Router {
    for page in pages {
        if router.contains(page.path) {
            warn!("Page `{}` shadowed by an existing route", page.path);
            continue;
        }
        info!("Serving page `{}`", page.path);
        router = router.page(page.path, page.content_type, page.body);
    }
    router
}

fn content_type(extension: &str) -> Option<&'static str> {
    match extension {
        "html" | "htm" => Some("text/html"),
        "css" => Some("text/css"),
        "js" => Some("application/javascript"),
        "txt" => Some("text/plain"),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use edgecount::http::{Method, Request};
    use edgecount::routes::{NoIndicator, Router};

    use super::{load_pages, register};

    #[test]
    fn pages_are_served_by_stem() {
        let root = std::env::temp_dir().join(format!("edgecount-pages-{}", std::process::id()));
        fs::create_dir_all(&root).unwrap();
        fs::write(root.join("hello.html"), "<h1>hello</h1>").unwrap();
        fs::write(root.join("websocket.html"), "<script></script>").unwrap();
        fs::write(root.join("inline.txt"), "shadowed").unwrap();
        fs::write(root.join("image.png"), [0u8; 4]).unwrap();

        let pages = load_pages(&root).unwrap();
        fs::remove_dir_all(&root).unwrap();

        let paths = pages.iter().map(|page| page.path).collect::<Vec<_>>();
        assert_eq!(paths, ["/hello", "/inline", "/websocket"]);

        let router = register(Router::new(), &pages);
        let mut indicator = NoIndicator;

        let response = router.dispatch(&Request::new(Method::Get, "/hello"), &mut indicator);
        assert_eq!(response.headers.content_type, Some("text/html"));
        assert_eq!(response.body_text(), "<h1>hello</h1>");

        let response = router.dispatch(&Request::new(Method::Get, "/inline"), &mut indicator);
        assert_eq!(response.body_text(), "this works as well");
    }
}
