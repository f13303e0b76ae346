//! Middleware and error-middleware runners.
//!
//! Both runners walk an ordered list with an index cursor, one handler at a
//! time, and never run two stages of the same request concurrently. The state
//! of a run is a [`Step`]; the loop below is the whole control flow, with no
//! nested continuations.
//!
//! A normal chain ends in exactly one of three ways:
//! - every handler continued: [`Completion::Completed`], the caller proceeds;
//! - a handler halted: [`Completion::Halted`], the request is answered;
//! - a handler failed or panicked: the error chain runs, then
//!   [`Completion::Diverted`]. The normal chain never resumes.
//!
//! The error chain has no further diversion target. Each handler either halts
//! it or passes an error on; once the list is exhausted the built-in fallback
//! answers `500 {"error": <message>}`.

use std::any::Any;
use std::panic::AssertUnwindSafe;

use futures_util::FutureExt;
use serde_json::json;
use tracing::{debug, error};

use crate::error::Error;
use crate::handler::{BoxedErrorHandler, BoxedHandler, Next, Outcome};
use crate::request::Request;
use crate::response::Response;

/// How a normal chain run ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Completion {
    Completed,
    Halted,
    Diverted,
}

enum Step {
    Continue(usize),
    Divert(Error),
    Done,
}

/// Runs `handlers` in order, diverting into `error_handlers` on failure.
pub(crate) async fn run(
    handlers: &[BoxedHandler],
    error_handlers: &[BoxedErrorHandler],
    req: &mut Request,
    res: &mut Response,
) -> Completion {
    let mut step = Step::Continue(0);
    loop {
        step = match step {
            Step::Continue(index) => match handlers.get(index) {
                None => Step::Done,
                Some(handler) => {
                    let outcome = guarded(handler.call(req, res)).await;
                    match outcome {
                        Ok(Next::Continue) => Step::Continue(index + 1),
                        Ok(Next::Halt) => return Completion::Halted,
                        Err(err) => Step::Divert(err),
                    }
                }
            },
            Step::Divert(err) => {
                debug!(error = %err, "diverting to error chain");
                run_errors(error_handlers, err, req, res).await;
                return Completion::Diverted;
            }
            Step::Done => return Completion::Completed,
        };
    }
}

/// Runs the error chain for `err`. The fallback responder answers unless a
/// handler halted with a finalized response.
pub(crate) async fn run_errors(
    error_handlers: &[BoxedErrorHandler],
    mut err: Error,
    req: &mut Request,
    res: &mut Response,
) {
    for handler in error_handlers {
        let outcome = guarded(handler.call(&err, req, res)).await;
        match outcome {
            Ok(Next::Halt) if res.is_finalized() => return,
            Ok(Next::Halt) => {
                debug!(error = %err, "error handler halted without responding");
                break;
            }
            Ok(Next::Continue) => {}
            Err(next_err) => err = next_err,
        }
    }
    fallback(&err, res);
}

/// Last stop for any error no handler dealt with.
fn fallback(err: &Error, res: &mut Response) {
    error!(error = ?err, "unhandled error");
    if res.is_finalized() {
        return;
    }
    res.status(500);
    if let Err(e) = res.json(&json!({ "error": err.message() })) {
        // Serialising a string map cannot realistically fail; answer anyway.
        error!(error = %e, "failed to serialise error body");
        res.text("Internal Server Error");
    }
}

/// Awaits a handler future, turning a panic into an [`Error::Panic`].
async fn guarded<F>(fut: F) -> Outcome
where
    F: std::future::Future<Output = Outcome>,
{
    match AssertUnwindSafe(fut).catch_unwind().await {
        Ok(outcome) => outcome,
        Err(payload) => Err(Error::Panic(panic_message(payload))),
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_owned()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::{self, IntoErrorHandler, IntoHandler};
    use bytes::Bytes;
    use std::path::Path;
    use std::sync::{Arc, Mutex};

    type Log = Arc<Mutex<Vec<&'static str>>>;

    fn pair() -> (Request, Response) {
        let (parts, ()) = http::Request::builder().uri("/").body(()).unwrap().into_parts();
        (
            Request::from_parts(parts, Bytes::new()),
            Response::new(Arc::from(Path::new("templates"))),
        )
    }

    fn step(log: &Log, name: &'static str, outcome: fn() -> Outcome) -> BoxedHandler {
        let log = Arc::clone(log);
        handler::sync(move |_, _| {
            log.lock().unwrap().push(name);
            outcome()
        })
        .into_boxed_handler()
    }

    #[tokio::test]
    async fn runs_in_order_and_completes() {
        let log = Log::default();
        let chain = [step(&log, "a", handler::next), step(&log, "b", handler::next)];
        let (mut req, mut res) = pair();

        assert_eq!(run(&chain, &[], &mut req, &mut res).await, Completion::Completed);
        assert_eq!(*log.lock().unwrap(), ["a", "b"]);
    }

    #[tokio::test]
    async fn empty_chain_completes() {
        let (mut req, mut res) = pair();
        assert_eq!(run(&[], &[], &mut req, &mut res).await, Completion::Completed);
    }

    #[tokio::test]
    async fn halt_stops_the_chain() {
        let log = Log::default();
        let chain = [step(&log, "a", handler::done), step(&log, "b", handler::next)];
        let (mut req, mut res) = pair();

        assert_eq!(run(&chain, &[], &mut req, &mut res).await, Completion::Halted);
        assert_eq!(*log.lock().unwrap(), ["a"]);
    }

    #[tokio::test]
    async fn error_diverts_and_never_resumes() {
        let log = Log::default();
        let chain = [
            step(&log, "a", || Err(Error::value(json!({ "message": "boom" })))),
            step(&log, "b", handler::next),
        ];
        let (mut req, mut res) = pair();

        assert_eq!(run(&chain, &[], &mut req, &mut res).await, Completion::Diverted);
        assert_eq!(*log.lock().unwrap(), ["a"]);
        assert_eq!(res.status_code(), 500);
        assert_eq!(res.body().as_ref(), br#"{"error":"boom"}"#);
    }

    #[tokio::test]
    async fn panic_is_treated_as_error() {
        let chain = [handler::sync(|_, _| panic!("kaboom")).into_boxed_handler()];
        let (mut req, mut res) = pair();

        assert_eq!(run(&chain, &[], &mut req, &mut res).await, Completion::Diverted);
        assert_eq!(res.status_code(), 500);
        assert_eq!(res.body().as_ref(), br#"{"error":"handler panicked: kaboom"}"#);
    }

    #[tokio::test]
    async fn error_handlers_pass_and_replace_errors() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let first = {
            let seen = Arc::clone(&seen);
            handler::error_sync(move |err, _, _| {
                seen.lock().unwrap().push(err.message());
                Err(Error::msg("replaced"))
            })
        };
        let second = {
            let seen = Arc::clone(&seen);
            handler::error_sync(move |err, _, _| {
                seen.lock().unwrap().push(err.message());
                handler::next()
            })
        };
        let errors = [first.into_boxed_error_handler(), second.into_boxed_error_handler()];
        let (mut req, mut res) = pair();

        run_errors(&errors, Error::msg("original"), &mut req, &mut res).await;
        assert_eq!(*seen.lock().unwrap(), ["original", "replaced"]);
        assert_eq!(res.body().as_ref(), br#"{"error":"replaced"}"#);
    }

    #[tokio::test]
    async fn halting_error_handler_skips_fallback() {
        let errors = [handler::error_sync(|err, _, res| {
            res.status(418).json(&json!({ "custom": err.message() }))?;
            handler::done()
        })
        .into_boxed_error_handler()];
        let (mut req, mut res) = pair();

        run_errors(&errors, Error::msg("tea"), &mut req, &mut res).await;
        assert_eq!(res.status_code(), 418);
        assert_eq!(res.body().as_ref(), br#"{"custom":"tea"}"#);
    }

    #[tokio::test]
    async fn halting_without_answering_still_gets_the_fallback() {
        let seen = Arc::new(Mutex::new(0));
        let errors = [
            handler::error_sync(|_, _, _| handler::done()).into_boxed_error_handler(),
            {
                let seen = Arc::clone(&seen);
                handler::error_sync(move |_, _, _| {
                    *seen.lock().unwrap() += 1;
                    handler::next()
                })
                .into_boxed_error_handler()
            },
        ];
        let (mut req, mut res) = pair();

        run_errors(&errors, Error::msg("boom"), &mut req, &mut res).await;
        assert_eq!(*seen.lock().unwrap(), 0);
        assert_eq!(res.status_code(), 500);
        assert_eq!(res.body().as_ref(), br#"{"error":"boom"}"#);
    }

    #[tokio::test]
    async fn fallback_leaves_a_finalized_response_alone() {
        let errors = [handler::error_sync(|_, _, res| {
            res.text("already answered");
            handler::next()
        })
        .into_boxed_error_handler()];
        let (mut req, mut res) = pair();

        run_errors(&errors, Error::msg("late"), &mut req, &mut res).await;
        assert_eq!(res.status_code(), 200);
        assert_eq!(res.body().as_ref(), b"already answered");
    }
}
