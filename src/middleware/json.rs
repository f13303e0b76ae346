//! JSON body parser.

use http::header::CONTENT_TYPE;
use serde_json::{Map, Value};
use tracing::debug;

use crate::handler::{BoxFuture, Handler, Next, Outcome};
use crate::method::Method;
use crate::request::Request;
use crate::response::Response;

/// Fills [`Request::body`] from `application/json` POST/PUT/PATCH bodies.
///
/// An empty body parses as `{}`. A body that is not valid JSON is answered
/// with `400 Invalid JSON` and the pipeline stops there.
#[derive(Clone, Copy, Debug, Default)]
pub struct JsonBody;

impl Handler for JsonBody {
    fn call<'a>(&'a self, req: &'a mut Request, res: &'a mut Response) -> BoxFuture<'a, Outcome> {
        Box::pin(async move {
            let wants_body = req.method().parse::<Method>().is_ok_and(Method::has_body);
            let is_json = req
                .header(CONTENT_TYPE.as_str())
                .is_some_and(|ct| ct.contains("application/json"));
            if !wants_body || !is_json {
                return Ok(Next::Continue);
            }

            let raw = req.raw_body();
            let parsed = if raw.is_empty() {
                Ok(Value::Object(Map::new()))
            } else {
                serde_json::from_slice::<Value>(raw)
            };

            match parsed {
                Ok(body) => {
                    req.set_body(body);
                    Ok(Next::Continue)
                }
                Err(e) => {
                    debug!(error = %e, "rejecting malformed JSON body");
                    res.status(400).text("Invalid JSON");
                    Ok(Next::Halt)
                }
            }
        })
    }
}
