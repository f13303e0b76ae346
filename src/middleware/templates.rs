//! Query-driven `.html` template rendering.

use std::path::{Path, PathBuf};

use tracing::error;

use crate::handler::{BoxFuture, Handler, Next, Outcome};
use crate::middleware::static_files::{is_read, map_path};
use crate::request::Request;
use crate::response::Response;
use crate::template;

/// Answers GET and HEAD requests for `.html` paths that exist under the
/// template directory, substituting `{{key}}` tokens from the query string.
#[derive(Clone, Debug)]
pub struct Templates {
    dir: PathBuf,
}

impl Templates {
    pub fn new(dir: &Path) -> Self {
        Self { dir: dir.to_path_buf() }
    }
}

impl Handler for Templates {
    fn call<'a>(&'a self, req: &'a mut Request, res: &'a mut Response) -> BoxFuture<'a, Outcome> {
        Box::pin(async move {
            if !is_read(req.method()) || !req.path().ends_with(".html") {
                return Ok(Next::Continue);
            }
            let Some(path) = map_path(&self.dir, req.path()) else {
                return Ok(Next::Continue);
            };
            match tokio::fs::metadata(&path).await {
                Ok(meta) if meta.is_file() => {}
                _ => return Ok(Next::Continue),
            }

            match template::load(&path).await {
                Ok(content) => {
                    let rendered = template::render_with_strings(&content, req.query_map());
                    res.status(200).html(rendered);
                }
                Err(e) => {
                    error!(path = %path.display(), error = %e, "failed to read template");
                    res.status(500).text("Internal Server Error");
                }
            }
            Ok(Next::Halt)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::middleware::test_support::{request, response};

    #[tokio::test]
    async fn renders_with_query_values() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("greet.html"), "<p>Hello {{ name }}{{suffix}}</p>").unwrap();
        let templates = Templates::new(dir.path());

        let mut req = request("GET", "/greet.html?name=Ada", &[], b"");
        let mut res = response();
        assert_eq!(templates.call(&mut req, &mut res).await.unwrap(), Next::Halt);
        assert_eq!(res.header("content-type"), Some("text/html; charset=utf-8"));
        assert_eq!(res.body().as_ref(), b"<p>Hello Ada{{suffix}}</p>");
    }

    #[tokio::test]
    async fn ignores_non_html_and_missing_templates() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("data.txt"), "x").unwrap();
        let templates = Templates::new(dir.path());
        let mut res = response();

        for path in ["/data.txt", "/absent.html"] {
            let mut req = request("GET", path, &[], b"");
            assert_eq!(templates.call(&mut req, &mut res).await.unwrap(), Next::Continue);
        }
        assert!(!res.is_finalized());
    }
}
