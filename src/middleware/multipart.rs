//! `multipart/form-data` decoding.

use std::convert::Infallible;

use bytes::{Bytes, BytesMut};
use futures_util::stream;
use http::header::CONTENT_TYPE;
use serde_json::{Map, Value, json};
use tracing::debug;

use crate::config::UploadConfig;
use crate::handler::{BoxFuture, Handler, Next, Outcome};
use crate::request::{Request, UploadedFile};
use crate::response::Response;

/// Decodes multipart submissions held in memory.
///
/// Text parts become string members of [`Request::body`]; file parts become
/// [`Request::files`]. A file over the size limit, a file whose MIME type is
/// not allowed, or a malformed payload is answered with
/// `400 {"error": <reason>}` and the pipeline stops.
#[derive(Clone, Debug)]
pub struct Multipart {
    config: UploadConfig,
}

/// Why a submission was refused. Shown to the client verbatim.
#[derive(Debug, thiserror::Error)]
enum Rejection {
    #[error("File too large")]
    TooLarge,
    #[error("File type not allowed: {0}")]
    MimeType(String),
    #[error("{0}")]
    Malformed(#[from] multer::Error),
}

struct Form {
    fields: Map<String, Value>,
    files: Vec<UploadedFile>,
}

impl Multipart {
    pub fn new(config: UploadConfig) -> Self {
        Self { config }
    }

    async fn decode(&self, boundary: String, body: Bytes) -> Result<Form, Rejection> {
        let source = stream::once(async move { Ok::<Bytes, Infallible>(body) });
        let mut multipart = multer::Multipart::new(source, boundary);
        let mut form = Form { fields: Map::new(), files: Vec::new() };

        while let Some(mut field) = multipart.next_field().await? {
            let name = field.name().unwrap_or_default().to_owned();

            let Some(file_name) = field.file_name().map(str::to_owned) else {
                let text = field.text().await?;
                form.fields.insert(name, Value::String(text));
                continue;
            };

            let content_type = field
                .content_type()
                .map(|m| m.essence_str().to_owned())
                .unwrap_or_else(|| "application/octet-stream".to_owned());
            if !self.config.allowed_mime_types.iter().any(|m| m.eq_ignore_ascii_case(&content_type)) {
                return Err(Rejection::MimeType(content_type));
            }

            let mut data = BytesMut::new();
            while let Some(chunk) = field.chunk().await? {
                if data.len() + chunk.len() > self.config.max_file_size {
                    return Err(Rejection::TooLarge);
                }
                data.extend_from_slice(&chunk);
            }

            form.files.push(UploadedFile {
                field: name,
                file_name: Some(file_name),
                content_type: Some(content_type),
                size: data.len(),
                data: data.freeze(),
            });
        }
        Ok(form)
    }
}

impl Handler for Multipart {
    fn call<'a>(&'a self, req: &'a mut Request, res: &'a mut Response) -> BoxFuture<'a, Outcome> {
        Box::pin(async move {
            let Some(content_type) = req.header(CONTENT_TYPE.as_str()) else {
                return Ok(Next::Continue);
            };
            if !content_type.to_ascii_lowercase().starts_with("multipart/form-data") {
                return Ok(Next::Continue);
            }

            let decoded = match multer::parse_boundary(content_type) {
                Ok(boundary) => self.decode(boundary, req.raw_body().clone()).await,
                Err(e) => Err(Rejection::Malformed(e)),
            };

            match decoded {
                Ok(form) => {
                    req.set_body(Value::Object(form.fields));
                    req.set_files(form.files);
                    Ok(Next::Continue)
                }
                Err(rejection) => {
                    debug!(reason = %rejection, "rejecting multipart upload");
                    res.status(400).json(&json!({ "error": rejection.to_string() }))?;
                    Ok(Next::Halt)
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::middleware::test_support::{request, response};

    const BOUNDARY: &str = "X-BOUNDARY";

    fn form(parts: &[(&str, Option<(&str, &str)>, &[u8])]) -> Vec<u8> {
        let mut body = Vec::new();
        for (name, file, data) in parts {
            body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
            match file {
                Some((file_name, mime)) => body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{name}\"; filename=\"{file_name}\"\r\nContent-Type: {mime}\r\n\r\n"
                    )
                    .as_bytes(),
                ),
                None => body.extend_from_slice(
                    format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n").as_bytes(),
                ),
            }
            body.extend_from_slice(data);
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
        body
    }

    fn upload_request(body: &[u8]) -> Request {
        let content_type = format!("multipart/form-data; boundary={BOUNDARY}");
        request("POST", "/api/user/upload", &[("content-type", content_type.as_str())], body)
    }

    fn small_limits() -> Multipart {
        Multipart::new(UploadConfig { max_file_size: 8, ..UploadConfig::default() })
    }

    #[tokio::test]
    async fn decodes_fields_and_files() {
        let body = form(&[
            ("name", None, &b"Ada"[..]),
            ("avatar", Some(("a.png", "image/png")), &b"\x89PNG"[..]),
        ]);
        let mut req = upload_request(&body);
        let mut res = response();

        assert_eq!(small_limits().call(&mut req, &mut res).await.unwrap(), Next::Continue);
        assert_eq!(req.body(), Some(&json!({ "name": "Ada" })));
        let files = req.files().unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].field, "avatar");
        assert_eq!(files[0].file_name.as_deref(), Some("a.png"));
        assert_eq!(files[0].content_type.as_deref(), Some("image/png"));
        assert_eq!(files[0].size, 4);
    }

    #[tokio::test]
    async fn rejects_oversized_files() {
        let body = form(&[("avatar", Some(("big.png", "image/png")), &b"0123456789"[..])]);
        let mut req = upload_request(&body);
        let mut res = response();

        assert_eq!(small_limits().call(&mut req, &mut res).await.unwrap(), Next::Halt);
        assert_eq!(res.status_code(), 400);
        assert_eq!(res.body().as_ref(), br#"{"error":"File too large"}"#);
    }

    #[tokio::test]
    async fn rejects_disallowed_mime_types() {
        let body = form(&[("doc", Some(("x.pdf", "application/pdf")), &b"%PDF"[..])]);
        let mut req = upload_request(&body);
        let mut res = response();

        assert_eq!(small_limits().call(&mut req, &mut res).await.unwrap(), Next::Halt);
        assert_eq!(res.body().as_ref(), br#"{"error":"File type not allowed: application/pdf"}"#);
    }

    #[tokio::test]
    async fn passes_other_content_types_through() {
        let mut req = request("POST", "/x", &[("content-type", "application/json")], b"{}");
        let mut res = response();
        assert_eq!(small_limits().call(&mut req, &mut res).await.unwrap(), Next::Continue);
        assert!(req.files().is_none());
    }
}
