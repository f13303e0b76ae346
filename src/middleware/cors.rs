//! CORS headers and preflight handling.

use crate::config::CorsConfig;
use crate::handler::{BoxFuture, Handler, Next, Outcome};
use crate::request::Request;
use crate::response::Response;

/// Sets `Access-Control-Allow-*` on every response and answers `OPTIONS`
/// preflight requests with `204`.
#[derive(Clone, Debug)]
pub struct Cors {
    origin: String,
    methods: String,
    headers: String,
    credentials: bool,
}

impl Cors {
    pub fn new(config: CorsConfig) -> Self {
        Self {
            origin: config.origin,
            methods: config.methods.join(","),
            headers: config.headers.join(","),
            credentials: config.credentials,
        }
    }
}

impl Default for Cors {
    fn default() -> Self {
        Self::new(CorsConfig::default())
    }
}

impl Handler for Cors {
    fn call<'a>(&'a self, req: &'a mut Request, res: &'a mut Response) -> BoxFuture<'a, Outcome> {
        Box::pin(async move {
            res.set_header("Access-Control-Allow-Origin", &self.origin)
                .set_header("Access-Control-Allow-Methods", &self.methods)
                .set_header("Access-Control-Allow-Headers", &self.headers);
            if self.credentials {
                res.set_header("Access-Control-Allow-Credentials", "true");
            }

            if req.method() == "OPTIONS" {
                res.status(204).end(bytes::Bytes::new());
                return Ok(Next::Halt);
            }
            Ok(Next::Continue)
        })
    }
}
