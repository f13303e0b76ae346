//! Handler traits and type erasure.
//!
//! # The continuation, made explicit
//!
//! A handler receives the request context and the response and returns an
//! [`Outcome`]:
//!
//! | Returned            | Meaning                                          |
//! |---------------------|--------------------------------------------------|
//! | `Ok(Next::Continue)`| pass control to the next stage                   |
//! | `Ok(Next::Halt)`    | stop here; this handler answered the request     |
//! | `Err(e)`            | divert to the error chain with `e`               |
//!
//! A handler that panics is treated exactly like one returning `Err`.
//!
//! # How handlers are stored
//!
//! The dispatcher holds handlers of many concrete types in one list, so each
//! is erased behind `Arc<dyn Handler>`:
//!
//! ```text
//! handler::sync(|req, res| { … })         ← user writes this
//!        ↓
//! SyncHandler(closure)                    ← concrete wrapper
//!        ↓  stored as BoxedHandler = Arc<dyn Handler>
//! handler.call(&mut req, &mut res)        ← one vtable dispatch per stage
//!        ↓
//! Box::pin(async { closure(req, res) })   ← BoxFuture
//! ```
//!
//! Closures that need to `.await` go through [`from_fn`] and return the boxed
//! future themselves. End the block with [`next()`] or [`done()`] so the
//! block's output type is pinned to [`Outcome`] and `?` works inside it:
//!
//! ```rust
//! use weft::handler;
//!
//! let h = handler::from_fn(|req, res| Box::pin(async move {
//!     let id = req.param("id").unwrap_or("unknown").to_owned();
//!     res.json(&serde_json::json!({ "id": id }))?;
//!     handler::done()
//! }));
//! # let _ = h;
//! ```

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::error::Error;
use crate::request::Request;
use crate::response::Response;

/// A heap-allocated, type-erased future borrowing the request pair for `'a`.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// What a handler asks the pipeline to do next.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Next {
    Continue,
    Halt,
}

pub type Outcome = Result<Next, Error>;

/// `Ok(Next::Continue)`.
pub fn next() -> Outcome {
    Ok(Next::Continue)
}

/// `Ok(Next::Halt)`.
pub fn done() -> Outcome {
    Ok(Next::Halt)
}

/// A normal handler: global middleware or a route handler.
pub trait Handler: Send + Sync + 'static {
    fn call<'a>(&'a self, req: &'a mut Request, res: &'a mut Response) -> BoxFuture<'a, Outcome>;
}

/// An error handler, run only after a normal handler failed.
///
/// Returning `Ok(Next::Continue)` passes the same error on, `Err(e)` passes
/// `e` on instead, and `Ok(Next::Halt)` ends error handling.
pub trait ErrorHandler: Send + Sync + 'static {
    fn call<'a>(
        &'a self,
        err: &'a Error,
        req: &'a mut Request,
        res: &'a mut Response,
    ) -> BoxFuture<'a, Outcome>;
}

/// A type-erased handler shared across concurrent requests.
pub type BoxedHandler = Arc<dyn Handler>;
pub type BoxedErrorHandler = Arc<dyn ErrorHandler>;

// ── Closure adapters ──────────────────────────────────────────────────────────

/// Wraps an async closure that returns a boxed future.
pub struct FnHandler<F>(F);

/// Wraps a plain synchronous closure.
pub struct SyncHandler<F>(F);

pub struct ErrorFnHandler<F>(F);

pub struct ErrorSyncHandler<F>(F);

/// Adapts an async closure: `|req, res| Box::pin(async move { … })`.
pub fn from_fn<F>(f: F) -> FnHandler<F>
where
    F: for<'a> Fn(&'a mut Request, &'a mut Response) -> BoxFuture<'a, Outcome> + Send + Sync + 'static,
{
    FnHandler(f)
}

/// Adapts a synchronous closure: `|req, res| { …; Ok(Next::Halt) }`.
pub fn sync<F>(f: F) -> SyncHandler<F>
where
    F: Fn(&mut Request, &mut Response) -> Outcome + Send + Sync + 'static,
{
    SyncHandler(f)
}

/// Adapts an async error closure: `|err, req, res| Box::pin(async move { … })`.
pub fn error_fn<F>(f: F) -> ErrorFnHandler<F>
where
    F: for<'a> Fn(&'a Error, &'a mut Request, &'a mut Response) -> BoxFuture<'a, Outcome>
        + Send
        + Sync
        + 'static,
{
    ErrorFnHandler(f)
}

/// Adapts a synchronous error closure.
pub fn error_sync<F>(f: F) -> ErrorSyncHandler<F>
where
    F: Fn(&Error, &mut Request, &mut Response) -> Outcome + Send + Sync + 'static,
{
    ErrorSyncHandler(f)
}

impl<F> Handler for FnHandler<F>
where
    F: for<'a> Fn(&'a mut Request, &'a mut Response) -> BoxFuture<'a, Outcome> + Send + Sync + 'static,
{
    fn call<'a>(&'a self, req: &'a mut Request, res: &'a mut Response) -> BoxFuture<'a, Outcome> {
        (self.0)(req, res)
    }
}

impl<F> Handler for SyncHandler<F>
where
    F: Fn(&mut Request, &mut Response) -> Outcome + Send + Sync + 'static,
{
    fn call<'a>(&'a self, req: &'a mut Request, res: &'a mut Response) -> BoxFuture<'a, Outcome> {
        // Run inside the future so a panic surfaces where the runner polls.
        Box::pin(async move { (self.0)(req, res) })
    }
}

impl<F> ErrorHandler for ErrorFnHandler<F>
where
    F: for<'a> Fn(&'a Error, &'a mut Request, &'a mut Response) -> BoxFuture<'a, Outcome>
        + Send
        + Sync
        + 'static,
{
    fn call<'a>(
        &'a self,
        err: &'a Error,
        req: &'a mut Request,
        res: &'a mut Response,
    ) -> BoxFuture<'a, Outcome> {
        (self.0)(err, req, res)
    }
}

impl<F> ErrorHandler for ErrorSyncHandler<F>
where
    F: Fn(&Error, &mut Request, &mut Response) -> Outcome + Send + Sync + 'static,
{
    fn call<'a>(
        &'a self,
        err: &'a Error,
        req: &'a mut Request,
        res: &'a mut Response,
    ) -> BoxFuture<'a, Outcome> {
        Box::pin(async move { (self.0)(err, req, res) })
    }
}

/// Conversion into a stored handler. Implemented for every [`Handler`], so
/// registration methods accept both adapters and collaborator structs.
pub trait IntoHandler {
    fn into_boxed_handler(self) -> BoxedHandler;
}

impl<H: Handler> IntoHandler for H {
    fn into_boxed_handler(self) -> BoxedHandler {
        Arc::new(self)
    }
}

pub trait IntoErrorHandler {
    fn into_boxed_error_handler(self) -> BoxedErrorHandler;
}

impl<H: ErrorHandler> IntoErrorHandler for H {
    fn into_boxed_error_handler(self) -> BoxedErrorHandler {
        Arc::new(self)
    }
}
