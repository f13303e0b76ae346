//! Static file serving.

use std::path::{Component, Path, PathBuf};

use tracing::{debug, error};

use crate::handler::{BoxFuture, Handler, Next, Outcome};
use crate::request::Request;
use crate::response::{ContentType, Response};

/// Answers GET and HEAD requests whose path names a regular file under the
/// root directory. Anything else falls through to the next stage.
#[derive(Clone, Debug)]
pub struct StaticFiles {
    root: PathBuf,
}

impl StaticFiles {
    pub fn new(root: &Path) -> Self {
        Self { root: root.to_path_buf() }
    }
}

impl Handler for StaticFiles {
    fn call<'a>(&'a self, req: &'a mut Request, res: &'a mut Response) -> BoxFuture<'a, Outcome> {
        Box::pin(async move {
            if !is_read(req.method()) {
                return Ok(Next::Continue);
            }
            let Some(path) = map_path(&self.root, req.path()) else {
                return Ok(Next::Continue);
            };
            match tokio::fs::metadata(&path).await {
                Ok(meta) if meta.is_file() => {}
                _ => return Ok(Next::Continue),
            }

            match tokio::fs::read(&path).await {
                Ok(bytes) => {
                    debug!(path = %path.display(), "serving static file");
                    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
                    res.status(200).bytes(ContentType::from_extension(ext), bytes);
                }
                Err(e) => {
                    error!(path = %path.display(), error = %e, "failed to read static file");
                    res.status(500).text("Internal Server Error");
                }
            }
            Ok(Next::Halt)
        })
    }
}

pub(crate) fn is_read(method: &str) -> bool {
    method == "GET" || method == "HEAD"
}

/// Percent-decodes `url_path` and joins it under `root`, dropping every
/// component that could climb out of it (`..`, root, drive prefixes).
/// Returns `None` when the path does not decode or names the root itself.
pub(crate) fn map_path(root: &Path, url_path: &str) -> Option<PathBuf> {
    let decoded = urlencoding::decode(url_path).ok()?;
    let mut path = root.to_path_buf();
    let mut pushed = false;
    for component in Path::new(decoded.as_ref()).components() {
        if let Component::Normal(segment) = component {
            path.push(segment);
            pushed = true;
        }
    }
    pushed.then_some(path)
}
