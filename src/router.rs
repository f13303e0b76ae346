//! Ordered route table.
//!
//! Routes are kept in registration order, and that order is also the match
//! priority: [`Router::resolve`] walks the table front to back and returns the
//! first entry whose method and pattern both match. There is no duplicate
//! detection and no specificity ranking; an earlier `/users/:id` shadows a
//! later `/users/me`.
//!
//! A router built on its own can be mounted under a prefix into another
//! router (or an [`App`](crate::App)). Mounting copies the entries, so the
//! mounted table does not change if the source router is extended later.

use std::fmt;

use crate::handler::{BoxedHandler, IntoHandler};
use crate::method::Method;
use crate::pattern::{Params, Pattern};

/// One `(method, pattern, handler)` binding.
#[derive(Clone)]
pub struct Route {
    method: Method,
    pattern: Pattern,
    handler: BoxedHandler,
}

impl Route {
    pub fn method(&self) -> Method { self.method }
    pub fn pattern(&self) -> &str { self.pattern.as_str() }
}

impl fmt::Debug for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.method, self.pattern.as_str())
    }
}

/// The application route table.
///
/// Each registration call returns `self` so registrations chain naturally:
///
/// ```rust
/// # use weft::{handler, Router};
/// let jobs = Router::new()
///     .get("/all", handler::sync(|_, res| {
///         res.json(&serde_json::json!({ "message": "All job list" }))?;
///         handler::done()
///     }));
/// let api = Router::new().mount("/api/job", &jobs);
/// assert_eq!(api.routes()[0].pattern(), "/api/job/all");
/// ```
#[derive(Clone, Default)]
pub struct Router {
    routes: Vec<Route>,
}

impl Router {
    pub fn new() -> Self {
        Self { routes: Vec::new() }
    }

    /// Appends a route. Patterns use `:name` segments for captures.
    pub fn on(mut self, method: Method, path: &str, handler: impl IntoHandler) -> Self {
        self.push(method, path, handler.into_boxed_handler());
        self
    }

    pub fn get(self, path: &str, handler: impl IntoHandler) -> Self {
        self.on(Method::Get, path, handler)
    }

    pub fn post(self, path: &str, handler: impl IntoHandler) -> Self {
        self.on(Method::Post, path, handler)
    }

    pub fn put(self, path: &str, handler: impl IntoHandler) -> Self {
        self.on(Method::Put, path, handler)
    }

    pub fn delete(self, path: &str, handler: impl IntoHandler) -> Self {
        self.on(Method::Delete, path, handler)
    }

    pub fn patch(self, path: &str, handler: impl IntoHandler) -> Self {
        self.on(Method::Patch, path, handler)
    }

    /// Copies every route of `sub` into this table with `prefix` prepended to
    /// its pattern text. `sub` is left untouched and stays usable.
    pub fn mount(mut self, prefix: &str, sub: &Router) -> Self {
        self.mount_in_place(prefix, sub);
        self
    }

    pub(crate) fn push(&mut self, method: Method, path: &str, handler: BoxedHandler) {
        self.routes.push(Route { method, pattern: Pattern::parse(path), handler });
    }

    pub(crate) fn mount_in_place(&mut self, prefix: &str, sub: &Router) {
        self.routes.extend(sub.routes.iter().map(|route| Route {
            method: route.method,
            pattern: route.pattern.prefixed(prefix),
            handler: route.handler.clone(),
        }));
    }

    /// Registered routes in priority order.
    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    /// Finds the first route matching `method` (compared upper-case) and `path`.
    pub fn resolve(&self, method: &str, path: &str) -> Option<(BoxedHandler, Params)> {
        let method = method.to_ascii_uppercase();
        self.routes
            .iter()
            .filter(|route| route.method.as_str() == method)
            .find_map(|route| {
                route.pattern.matches(path).map(|params| (route.handler.clone(), params))
            })
    }
}

impl fmt::Debug for Router {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(&self.routes).finish()
    }
}
