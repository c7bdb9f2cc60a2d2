use alloc::format;
use alloc::string::String;

use core::fmt::Write;

use hashbrown::DefaultHashBuilder;

use indexmap::IndexMap;

use log::{error, info};

use crate::error::Result;
use crate::http::{Request, Response};

// Root route body.
const ROOT_BODY: &str = "hello from esp32!";
// Inline route body.
const INLINE_BODY: &str = "this works as well";

/// A stateless route handler.
pub type Handler = fn(&Request) -> Result<Response>;

/// An indicator that signals when a request is being served, such as a
/// status led.
pub trait StatusIndicator {
    /// Turns the indicator on or off.
    fn set(&mut self, on: bool);
}

/// A [`StatusIndicator`] that does nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoIndicator;

impl StatusIndicator for NoIndicator {
    fn set(&mut self, _on: bool) {}
}

#[derive(Clone, Copy)]
enum Route {
    Handler { handler: Handler, pulse: bool },
    Page {
        content_type: &'static str,
        body: &'static str,
    },
}

/// The route table.
///
/// Routes are matched on the exact request path, whatever the method.
/// Unknown paths are answered with a diagnostic `404` body listing the
/// requested path, method and arguments.
pub struct Router {
    routes: IndexMap<&'static str, Route, DefaultHashBuilder>,
}

impl Default for Router {
    fn default() -> Self {
        Self::new()
    }
}

impl Router {
    /// Creates a [`Router`] without routes.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            routes: IndexMap::with_hasher(DefaultHashBuilder::default()),
        }
    }

    /// Creates a [`Router`] with the default routes:
    ///
    /// - `/` answers with a greeting and pulses the status indicator
    /// - `/inline` answers with a fixed text
    #[must_use]
    pub fn new() -> Self {
        Self::empty()
            .route_with_indicator("/", |_| Ok(Response::text(ROOT_BODY)))
            .route("/inline", |_| Ok(Response::text(INLINE_BODY)))
    }

    /// Adds a route.
    #[must_use]
    #[inline]
    pub fn route(self, path: &'static str, handler: Handler) -> Self {
        self.insert(
            path,
            Route::Handler {
                handler,
                pulse: false,
            },
        )
    }

    /// Adds a route that turns the status indicator on while it runs.
    #[must_use]
    #[inline]
    pub fn route_with_indicator(self, path: &'static str, handler: Handler) -> Self {
        self.insert(
            path,
            Route::Handler {
                handler,
                pulse: true,
            },
        )
    }

    /// Adds a static page.
    #[must_use]
    #[inline]
    pub fn page(self, path: &'static str, content_type: &'static str, body: &'static str) -> Self {
        self.insert(path, Route::Page { content_type, body })
    }

    /// Whether a route exists for the given path.
    #[must_use]
    pub fn contains(&self, path: &str) -> bool {
        self.routes.contains_key(path)
    }

    /// Dispatches a request to its route.
    ///
    /// Handler errors are answered with a `500` diagnostic response.
    pub fn dispatch<I: StatusIndicator>(&self, request: &Request, indicator: &mut I) -> Response {
        info!("{} {}", request.method, request.path);

        match self.routes.get(request.path.as_str()) {
            Some(&Route::Page { content_type, body }) => Response::content(content_type, body),
            Some(&Route::Handler { handler, pulse }) => {
                if pulse {
                    indicator.set(true);
                }
                let response = handler(request).unwrap_or_else(|e| {
                    error!("Route `{}` failed: {e}", request.path);
                    Response::internal(format!("{e}\n"))
                });
                if pulse {
                    indicator.set(false);
                }
                response
            }
            None => {
                indicator.set(true);
                let response = Response::not_found(not_found_body(request));
                indicator.set(false);
                response
            }
        }
    }

    fn insert(mut self, path: &'static str, route: Route) -> Self {
        let _ = self.routes.insert(path, route);
        self
    }
}

/// Describes an unroutable request.
#[must_use]
pub fn not_found_body(request: &Request) -> String {
    let mut message = format!(
        "File Not Found\n\nURI: {}\nMethod: {}\nArguments: {}\n",
        request.path,
        request.method,
        request.args.len()
    );

    for (name, value) in &request.args {
        // Writing into a `String` cannot fail.
        let _ = writeln!(message, " {name}: {value}");
    }

    message
}
