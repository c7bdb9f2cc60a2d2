use alloc::borrow::Cow;
use alloc::string::{String, ToString};
use alloc::vec::Vec;

use core::fmt;

/// `HTTP` request methods.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    /// `GET`
    Get,
    /// `POST`
    Post,
    /// `PUT`
    Put,
    /// `DELETE`
    Delete,
    /// Any other method.
    Other,
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Delete => "DELETE",
            Self::Other => "OTHER",
        }
        .fmt(f)
    }
}

/// An `HTTP` request surfaced by a network facade.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    /// Request method.
    pub method: Method,
    /// Request path, without the query.
    pub path: String,
    /// Query arguments, in request order.
    pub args: Vec<(String, String)>,
}

impl Request {
    /// Creates a [`Request`] without arguments.
    #[must_use]
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            args: Vec::new(),
        }
    }

    /// Creates a [`Request`] from a request target such as
    /// `/path?name=value&flag`.
    ///
    /// An argument without `=` has an empty value. Names and values are
    /// decoded from `%XX` escapes and `+`, and kept as received when they
    /// hold an invalid escape or decode to invalid UTF-8.
    #[must_use]
    pub fn from_target(method: Method, target: &str) -> Self {
        let (path, query) = target.split_once('?').unwrap_or((target, ""));

        let args = query
            .split('&')
            .filter(|arg| !arg.is_empty())
            .map(|arg| {
                let (name, value) = arg.split_once('=').unwrap_or((arg, ""));
                (decode(name), decode(value))
            })
            .collect();

        Self {
            method,
            path: path.to_string(),
            args,
        }
    }

    /// Adds an argument.
    #[must_use]
    #[inline]
    pub fn arg(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.args.push((name.into(), value.into()));
        self
    }
}

fn hex_digit(byte: u8) -> Option<u8> {
    match byte {
        b'0'..=b'9' => Some(byte - b'0'),
        b'a'..=b'f' => Some(byte - b'a' + 10),
        b'A'..=b'F' => Some(byte - b'A' + 10),
        _ => None,
    }
}

fn try_decode(text: &str) -> Option<String> {
    let mut bytes = text.bytes();
    let mut decoded = Vec::with_capacity(text.len());

    while let Some(byte) = bytes.next() {
        decoded.push(match byte {
            b'+' => b' ',
            b'%' => {
                let high = hex_digit(bytes.next()?)?;
                let low = hex_digit(bytes.next()?)?;
                (high << 4) | low
            }
            byte => byte,
        });
    }

    String::from_utf8(decoded).ok()
}

// Query component decoding.
fn decode(text: &str) -> String {
    try_decode(text).unwrap_or_else(|| text.to_string())
}

/// The status line and content type of a [`Response`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Headers {
    /// Status code.
    pub status: u16,
    /// Reason phrase.
    pub message: &'static str,
    /// Content type, if any.
    pub content_type: Option<&'static str>,
}

impl Headers {
    const fn text(status: u16, message: &'static str) -> Self {
        Self {
            status,
            message,
            content_type: Some("text/plain"),
        }
    }

    const fn ok(content_type: &'static str) -> Self {
        Self {
            status: 200,
            message: "OK",
            content_type: Some(content_type),
        }
    }
}

/// An `HTTP` response handed back to a network facade.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    /// Status line and content type.
    pub headers: Headers,
    /// Response body.
    pub body: Cow<'static, [u8]>,
}

impl Response {
    /// Creates a `200 OK` plain text [`Response`].
    #[must_use]
    pub const fn text(body: &'static str) -> Self {
        Self::new(Headers::text(200, "OK"), Cow::Borrowed(body.as_bytes()))
    }

    /// Creates a `200 OK` [`Response`] with the given content type.
    #[must_use]
    pub const fn content(content_type: &'static str, body: &'static str) -> Self {
        Self::new(Headers::ok(content_type), Cow::Borrowed(body.as_bytes()))
    }

    /// Creates a `404 Not Found` plain text [`Response`].
    #[must_use]
    pub fn not_found(body: String) -> Self {
        Self::new(Headers::text(404, "Not Found"), Cow::Owned(body.into_bytes()))
    }

    /// Creates a `400 Bad Request` plain text [`Response`].
    #[must_use]
    pub fn bad_request(body: String) -> Self {
        Self::new(
            Headers::text(400, "Bad Request"),
            Cow::Owned(body.into_bytes()),
        )
    }

    /// Creates a `500 Internal Server Error` plain text [`Response`].
    #[must_use]
    pub fn internal(body: String) -> Self {
        Self::new(
            Headers::text(500, "Internal Server Error"),
            Cow::Owned(body.into_bytes()),
        )
    }

    /// Returns the status code.
    #[must_use]
    pub const fn status(&self) -> u16 {
        self.headers.status
    }

    /// Returns the body as text, replacing invalid `UTF-8` sequences.
    #[must_use]
    pub fn body_text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }

    const fn new(headers: Headers, body: Cow<'static, [u8]>) -> Self {
        Self { headers, body }
    }
}

#[cfg(test)]
mod tests {
    use alloc::string::ToString;

    use super::{Method, Request, Response};

    #[test]
    fn target_with_query_arguments() {
        let request = Request::from_target(Method::Get, "/led?state=on&blink&&level=3");

        assert_eq!(request.path, "/led");
        assert_eq!(
            request.args,
            [
                ("state".to_string(), "on".to_string()),
                ("blink".to_string(), "".to_string()),
                ("level".to_string(), "3".to_string()),
            ]
        );
    }

    #[test]
    fn query_arguments_are_decoded() {
        let request = Request::from_target(Method::Get, "/x?name=a%20b&c%3Dd=e+f");

        assert_eq!(request.path, "/x");
        assert_eq!(
            request.args,
            [
                ("name".to_string(), "a b".to_string()),
                ("c=d".to_string(), "e f".to_string()),
            ]
        );
    }

    #[test]
    fn invalid_escapes_are_kept() {
        let request = Request::from_target(Method::Get, "/x?a=100%&b=%zz&c=%ff&d=%C3%A9");

        assert_eq!(
            request.args,
            [
                ("a".to_string(), "100%".to_string()),
                ("b".to_string(), "%zz".to_string()),
                ("c".to_string(), "%ff".to_string()),
                ("d".to_string(), "é".to_string()),
            ]
        );
    }

    #[test]
    fn target_without_query() {
        let request = Request::from_target(Method::Post, "/inline");
        assert_eq!(request, Request::new(Method::Post, "/inline"));
    }

    #[test]
    fn responses() {
        let response = Response::text("hello from esp32!");
        assert_eq!(response.status(), 200);
        assert_eq!(response.headers.content_type, Some("text/plain"));
        assert_eq!(response.body_text(), "hello from esp32!");

        let response = Response::not_found("File Not Found".to_string());
        assert_eq!(response.status(), 404);
        assert_eq!(response.headers.message, "Not Found");

        assert_eq!(Response::bad_request("x".to_string()).status(), 400);
        assert_eq!(Response::internal("x".to_string()).status(), 500);
    }
}
