//! Per-request access log.

use std::time::Instant;

use tracing::info;

use crate::handler::{BoxFuture, Handler, Next, Outcome};
use crate::request::Request;
use crate::response::Response;

/// Emits one `info` event per request once its response is handed to the
/// transport: method, target, final status and elapsed milliseconds.
///
/// Register it first so the elapsed time covers the whole pipeline.
#[derive(Clone, Copy, Debug, Default)]
pub struct RequestLogger;

impl Handler for RequestLogger {
    fn call<'a>(&'a self, req: &'a mut Request, res: &'a mut Response) -> BoxFuture<'a, Outcome> {
        Box::pin(async move {
            let start = Instant::now();
            let method = req.method().to_owned();
            let target = req.target().to_owned();
            res.on_finish(move |res| {
                info!(
                    method = %method,
                    target = %target,
                    status = res.status_code(),
                    elapsed_ms = start.elapsed().as_millis() as u64,
                    "request finished"
                );
            });
            Ok(Next::Continue)
        })
    }
}
