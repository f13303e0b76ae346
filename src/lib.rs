//! # weft
//!
//! A small HTTP application toolkit: an ordered middleware pipeline, an error
//! middleware chain, and a path-pattern router, on top of hyper.
//!
//! ## The pipeline
//!
//! Every request goes through the same stages, in registration order:
//!
//! ```text
//! connection → global middleware → route lookup → matched handler → response
//!                    │                  │               │
//!                    └──── Err ─────────┴───── Err ─────┴──→ error middleware → fallback 500
//! ```
//!
//! - A handler returns [`Next::Continue`] to pass control on,
//!   [`Next::Halt`] once it has answered, or `Err` to divert to the error chain.
//! - No matching route answers `404 Cannot <METHOD> <path>`.
//! - A request nobody answered gets `204 No Content`.
//! - Once a response is finalized, further writes are silently ignored.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use serde_json::json;
//! use weft::{handler, middleware, App, Router, Server};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), weft::Error> {
//!     let jobs = Router::new().get("/all", handler::sync(|_, res| {
//!         res.json(&json!({ "message": "All job list" }))?;
//!         handler::done()
//!     }));
//!
//!     let app = App::new()
//!         .use_middleware(middleware::json())
//!         .mount("/api/job", &jobs)
//!         .get("/api/user/:id", handler::sync(|req, res| {
//!             res.json(&json!({ "userId": req.param("id"), "q": req.query("search") }))?;
//!             handler::done()
//!         }))
//!         .post("/api/user", handler::sync(|req, res| {
//!             res.status(201).json(&req.body())?;
//!             handler::done()
//!         }));
//!
//!     Server::bind("0.0.0.0:8080")?.serve(app).await
//! }
//! ```

mod app;
mod chain;
mod config;
mod error;
mod method;
mod pattern;
mod request;
mod response;
mod router;
mod server;

pub mod handler;
pub mod middleware;
pub mod template;

pub use app::{App, Dispatcher};
pub use config::{Config, CorsConfig, UploadConfig};
pub use error::Error;
pub use handler::{ErrorHandler, Handler, Next, Outcome};
pub use method::Method;
pub use pattern::{Params, Pattern};
pub use request::{Request, UploadedFile};
pub use response::{ContentType, Response};
pub use router::{Route, Router};
pub use server::Server;
