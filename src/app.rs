//! Application builder and per-request dispatcher.
//!
//! # Lifecycle: build → seal → serve
//!
//! An [`App`] is the build phase: it collects global middleware, error
//! middleware and routes. [`App::seal`] freezes those lists into a
//! [`Dispatcher`], which has no registration API at all and is shared behind
//! an `Arc` by every connection. Handing an `App` to
//! [`Server::serve`](crate::Server::serve) seals it, so nothing can be
//! registered once connections are being accepted.
//!
//! # One request, start to finish
//!
//! 1. A fresh [`Response`] is created with the helper contract.
//! 2. The request context is built; the query string is parsed once.
//! 3. Global middleware run in registration order.
//! 4. The route table is consulted. No match answers
//!    `404 Cannot <METHOD> <path>`. A match stores the path parameters and
//!    runs the single matched handler as a one-element chain.
//! 5. If nothing finalized the response, it is answered `204 No Content`.
//!
//! Any failure in steps 3–4 goes through the error chain; nothing escapes to
//! the connection task.

use std::convert::Infallible;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use bytes::Bytes;
use http_body_util::{BodyExt, Full, LengthLimitError, Limited};
use hyper::body::Body;
use tracing::{debug, warn};

use crate::chain::{self, Completion};
use crate::config::Config;
use crate::error::Error;
use crate::handler::{BoxedErrorHandler, BoxedHandler, IntoErrorHandler, IntoHandler};
use crate::method::Method;
use crate::request::Request;
use crate::response::Response;
use crate::router::Router;

/// The build phase of an application.
///
/// ```rust
/// use weft::{handler, App, middleware};
///
/// let app = App::new()
///     .use_middleware(middleware::json())
///     .get("/api/hello", handler::sync(|_, res| {
///         res.json(&serde_json::json!({ "message": "Hello, world!" }))?;
///         handler::done()
///     }));
/// let dispatcher = app.seal();
/// # let _ = dispatcher;
/// ```
pub struct App {
    middlewares: Vec<BoxedHandler>,
    error_middlewares: Vec<BoxedErrorHandler>,
    router: Router,
    templates_dir: PathBuf,
    max_body_size: usize,
}

impl App {
    pub fn new() -> Self {
        Self::with_config(&Config::default())
    }

    /// Takes the templates root used by [`Response::render`] and the request
    /// body limit from `config`.
    pub fn with_config(config: &Config) -> Self {
        Self {
            middlewares: Vec::new(),
            error_middlewares: Vec::new(),
            router: Router::new(),
            templates_dir: config.templates_dir.clone(),
            max_body_size: config.max_body_size,
        }
    }

    /// Appends a global middleware, run for every request before routing.
    pub fn use_middleware(mut self, handler: impl IntoHandler) -> Self {
        self.middlewares.push(handler.into_boxed_handler());
        self
    }

    /// Appends an error middleware, run in order once any handler fails.
    pub fn use_error_middleware(mut self, handler: impl IntoErrorHandler) -> Self {
        self.error_middlewares.push(handler.into_boxed_error_handler());
        self
    }

    pub fn on(mut self, method: Method, path: &str, handler: impl IntoHandler) -> Self {
        self.router.push(method, path, handler.into_boxed_handler());
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

    /// Copies every route of `router` in under `prefix`.
    pub fn mount(mut self, prefix: &str, router: &Router) -> Self {
        self.router.mount_in_place(prefix, router);
        self
    }

    pub fn routes(&self) -> &Router {
        &self.router
    }

    /// Ends the build phase.
    pub fn seal(self) -> Arc<Dispatcher> {
        Arc::new(Dispatcher {
            middlewares: self.middlewares.into(),
            error_middlewares: self.error_middlewares.into(),
            router: self.router,
            templates_dir: Arc::from(self.templates_dir.as_path()),
            max_body_size: self.max_body_size,
        })
    }
}

impl Default for App {
    fn default() -> Self {
        Self::new()
    }
}

/// A sealed application: immutable, shared across all connections.
pub struct Dispatcher {
    middlewares: Box<[BoxedHandler]>,
    error_middlewares: Box<[BoxedErrorHandler]>,
    router: Router,
    templates_dir: Arc<Path>,
    max_body_size: usize,
}

impl Dispatcher {
    /// Buffers the body of a transport request, then dispatches it.
    ///
    /// A body larger than `max_body_size` is answered `413` without running
    /// any handler. A body that fails to arrive for any other reason is
    /// reported through the error chain, like any other failure.
    pub async fn serve<B>(
        &self,
        req: http::Request<B>,
        remote_addr: Option<SocketAddr>,
    ) -> Result<http::Response<Full<Bytes>>, Infallible>
    where
        B: Body<Data = Bytes>,
        B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        let (parts, body) = req.into_parts();
        let collected = Limited::new(body, self.max_body_size)
            .collect()
            .await
            .map(|c| c.to_bytes());

        let mut res = Response::new(Arc::clone(&self.templates_dir));
        let response = match collected {
            Ok(bytes) => {
                let req = Request::from_parts(parts, bytes).with_remote_addr(remote_addr);
                self.dispatch(req, res).await
            }
            Err(e) if e.is::<LengthLimitError>() => {
                warn!(path = parts.uri.path(), limit = self.max_body_size, "request body too large");
                res.status(413).text("Payload Too Large");
                res
            }
            Err(e) => {
                let mut req = Request::from_parts(parts, Bytes::new()).with_remote_addr(remote_addr);
                chain::run_errors(&self.error_middlewares, Error::Other(e), &mut req, &mut res).await;
                if !res.is_finalized() {
                    res.status(500).text("Internal Server Error");
                }
                res
            }
        };
        Ok(response.into_http())
    }

    /// Dispatches an already-buffered request. This is the whole pipeline
    /// without a socket, which is what the integration tests drive.
    pub async fn handle(&self, req: http::Request<Bytes>) -> http::Response<Full<Bytes>> {
        let (parts, body) = req.into_parts();
        let req = Request::from_parts(parts, body);
        let res = Response::new(Arc::clone(&self.templates_dir));
        self.dispatch(req, res).await.into_http()
    }

    async fn dispatch(&self, mut req: Request, mut res: Response) -> Response {
        let global = chain::run(&self.middlewares, &self.error_middlewares, &mut req, &mut res).await;

        if global == Completion::Completed {
            self.route(&mut req, &mut res).await;
        } else if global == Completion::Halted && !res.is_finalized() {
            warn!(method = req.method(), path = req.path(), "middleware halted without responding");
        }

        if !res.is_finalized() {
            debug!(method = req.method(), path = req.path(), "no response written, answering 204");
            res.status(204).end(Bytes::new());
        }
        res
    }

    async fn route(&self, req: &mut Request, res: &mut Response) {
        let Some((handler, params)) = self.router.resolve(req.method(), req.path()) else {
            let body = format!("Cannot {} {}", req.method(), req.path());
            res.status(404).text(body);
            return;
        };

        req.params = params;
        chain::run(std::slice::from_ref(&handler), &self.error_middlewares, req, res).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::{self, Next};
    use futures_util::stream;
    use http_body_util::StreamBody;
    use hyper::body::Frame;
    use serde_json::json;
    use std::sync::atomic::{AtomicBool, Ordering};

    fn get(uri: &str) -> http::Request<Bytes> {
        http::Request::builder().uri(uri).body(Bytes::new()).unwrap()
    }

    #[tokio::test]
    async fn forgetting_to_respond_yields_204() {
        let app = App::new().get("/quiet", handler::sync(|_, _| Ok(Next::Continue))).seal();
        let res = app.handle(get("/quiet")).await;
        assert_eq!(res.status(), 204);
    }

    #[tokio::test]
    async fn failing_middleware_never_reaches_routing() {
        let reached = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&reached);
        let app = App::new()
            .use_middleware(handler::sync(|_, _| Err(Error::msg("stop"))))
            .get("/", handler::sync(move |_, res| {
                flag.store(true, Ordering::SeqCst);
                res.text("routed");
                handler::done()
            }))
            .seal();

        let res = app.handle(get("/")).await;
        assert_eq!(res.status(), 500);
        assert!(!reached.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn params_are_set_before_the_handler_runs() {
        let app = App::new()
            .get("/items/:id", handler::sync(|req, res| {
                res.json(&json!({ "id": req.param("id") }))?;
                handler::done()
            }))
            .seal();
        let res = app.handle(get("/items/9")).await;
        let body = res.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(body.as_ref(), br#"{"id":"9"}"#);
    }

    #[tokio::test]
    async fn serve_buffers_a_streaming_body() {
        let app = App::new()
            .post("/echo", handler::sync(|req, res| {
                res.end(req.raw_body().clone());
                handler::done()
            }))
            .seal();
        let req = http::Request::builder()
            .method("POST")
            .uri("/echo")
            .body(Full::new(Bytes::from_static(b"ping")))
            .unwrap();

        let res = app.serve(req, None).await.unwrap();
        let body = res.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(body.as_ref(), b"ping");
    }

    #[tokio::test]
    async fn silently_halting_error_middleware_still_answers_500() {
        let app = App::new()
            .use_error_middleware(handler::error_sync(|_, _, _| handler::done()))
            .get("/fail", handler::sync(|_, _| Err(Error::msg("boom"))))
            .seal();

        let res = app.handle(get("/fail")).await;
        assert_eq!(res.status(), 500);
        let body = res.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(body.as_ref(), br#"{"error":"boom"}"#);
    }

    #[tokio::test]
    async fn a_failing_body_stream_goes_through_the_error_chain() {
        let app = App::new()
            .use_error_middleware(handler::error_sync(|_, _, _| handler::done()))
            .post("/echo", handler::sync(|_, res| {
                res.text("unreachable");
                handler::done()
            }))
            .seal();
        let body = StreamBody::new(stream::iter(vec![Err::<Frame<Bytes>, _>(
            std::io::Error::other("connection reset"),
        )]));
        let req = http::Request::builder().method("POST").uri("/echo").body(body).unwrap();

        let res = app.serve(req, None).await.unwrap();
        assert_eq!(res.status(), 500);
        let body = res.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(body.as_ref(), br#"{"error":"connection reset"}"#);
    }

    #[tokio::test]
    async fn oversized_bodies_are_rejected_before_dispatch() {
        let reached = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&reached);
        let config = Config { max_body_size: 8, ..Config::default() };
        let app = App::with_config(&config)
            .post("/echo", handler::sync(move |_, res| {
                flag.store(true, Ordering::SeqCst);
                res.text("routed");
                handler::done()
            }))
            .seal();
        let req = http::Request::builder()
            .method("POST")
            .uri("/echo")
            .body(Full::new(Bytes::from_static(b"far more than eight bytes")))
            .unwrap();

        let res = app.serve(req, None).await.unwrap();
        assert_eq!(res.status(), 413);
        assert!(!reached.load(Ordering::SeqCst));
    }
}
