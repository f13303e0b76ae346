//! Built-in middleware.
//!
//! Each collaborator is a small [`Handler`](crate::handler::Handler) meant to
//! be registered with [`App::use_middleware`](crate::App::use_middleware). They
//! only depend on the handler contract: continue when the request is not
//! theirs to answer, halt once they have answered, and fail through the error
//! chain only for genuine handler errors. Malformed input (bad JSON, rejected
//! uploads) is answered with `400` on the spot.
//!
//! Registration order is execution order. The usual stack:
//!
//! ```rust
//! use weft::{App, Config, middleware};
//!
//! let config = Config::default();
//! let app = App::with_config(&config)
//!     .use_middleware(middleware::logger())
//!     .use_middleware(middleware::cookies())
//!     .use_middleware(middleware::json())
//!     .use_middleware(middleware::static_files(&config.public_dir))
//!     .use_middleware(middleware::templates(&config.templates_dir))
//!     .use_middleware(middleware::multipart(config.upload.clone()))
//!     .use_middleware(middleware::cors(config.cors.clone()));
//! # let _ = app;
//! ```

mod cookies;
mod cors;
mod json;
mod logger;
mod multipart;
mod static_files;
mod templates;

use std::path::Path;

use crate::config::{CorsConfig, UploadConfig};

pub use cookies::CookieParser;
pub use cors::Cors;
pub use json::JsonBody;
pub use logger::RequestLogger;
pub use multipart::Multipart;
pub use static_files::StaticFiles;
pub use templates::Templates;

/// Parses `application/json` bodies of POST, PUT and PATCH requests.
pub fn json() -> JsonBody {
    JsonBody
}

/// Parses the `Cookie` header into [`Request::cookies`](crate::Request::cookies).
pub fn cookies() -> CookieParser {
    CookieParser
}

/// Adds `Access-Control-Allow-*` headers and answers preflight requests.
pub fn cors(config: CorsConfig) -> Cors {
    Cors::new(config)
}

/// Serves regular files under `root` for GET and HEAD.
pub fn static_files(root: impl AsRef<Path>) -> StaticFiles {
    StaticFiles::new(root.as_ref())
}

/// Renders `.html` files under `dir` with query-string substitution.
pub fn templates(dir: impl AsRef<Path>) -> Templates {
    Templates::new(dir.as_ref())
}

/// Decodes `multipart/form-data` submissions.
pub fn multipart(config: UploadConfig) -> Multipart {
    Multipart::new(config)
}

/// Logs one line per finished request.
pub fn logger() -> RequestLogger {
    RequestLogger
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::path::Path;
    use std::sync::Arc;

    use bytes::Bytes;

    use crate::request::Request;
    use crate::response::Response;

    pub(crate) fn request(method: &str, uri: &str, headers: &[(&str, &str)], body: &[u8]) -> Request {
        let mut builder = http::Request::builder().method(method).uri(uri);
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        let (parts, ()) = builder.body(()).unwrap().into_parts();
        Request::from_parts(parts, Bytes::copy_from_slice(body))
    }

    pub(crate) fn response() -> Response {
        Response::new(Arc::from(Path::new("templates")))
    }
}
