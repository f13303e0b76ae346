//! Outgoing response and its helper contract.
//!
//! Every dispatch creates exactly one [`Response`] and hands it, by mutable
//! reference, to each stage of the pipeline. Handlers shape it with the
//! helpers below; the first finalizing helper (`end`, `json`, `send`, `text`,
//! `html`, `redirect`, `render`) seals it. From then on every helper is a
//! silent no-op, so a handler that answers twice still produces one response.

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use bytes::Bytes;
use http::header::{CONTENT_TYPE, LOCATION};
use http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use http_body_util::Full;
use serde::Serialize;
use serde_json::Value;
use tracing::warn;

use crate::error::Error;
use crate::template;

// ── ContentType ───────────────────────────────────────────────────────────────

/// Content-type values the built-in helpers and collaborators emit.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ContentType {
    Css,          // text/css
    Html,         // text/html; charset=utf-8
    Javascript,   // application/javascript
    Jpeg,         // image/jpeg
    Json,         // application/json
    OctetStream,  // application/octet-stream
    Png,          // image/png
    Svg,          // image/svg+xml
    Text,         // text/plain; charset=utf-8
}

impl ContentType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Css         => "text/css",
            Self::Html        => "text/html; charset=utf-8",
            Self::Javascript  => "application/javascript",
            Self::Jpeg        => "image/jpeg",
            Self::Json        => "application/json",
            Self::OctetStream => "application/octet-stream",
            Self::Png         => "image/png",
            Self::Svg         => "image/svg+xml",
            Self::Text        => "text/plain; charset=utf-8",
        }
    }

    /// Guesses a content type from a file extension.
    pub fn from_extension(ext: &str) -> Self {
        match ext.to_ascii_lowercase().as_str() {
            "css"          => Self::Css,
            "html" | "htm" => Self::Html,
            "js" | "mjs"   => Self::Javascript,
            "jpg" | "jpeg" => Self::Jpeg,
            "json"         => Self::Json,
            "png"          => Self::Png,
            "svg"          => Self::Svg,
            "txt"          => Self::Text,
            _              => Self::OctetStream,
        }
    }
}

// ── Response ─────────────────────────────────────────────────────────────────

type FinishHook = Box<dyn FnOnce(&Response) + Send + 'static>;

/// The response under construction for one request.
pub struct Response {
    status: StatusCode,
    headers: HeaderMap,
    body: Bytes,
    finalized: bool,
    templates_root: Arc<Path>,
    on_finish: Vec<FinishHook>,
}

impl Response {
    /// A fresh `200 OK` response with no body. `templates_root` is where
    /// [`render`](Response::render) looks up views.
    pub fn new(templates_root: Arc<Path>) -> Self {
        Self {
            status: StatusCode::OK,
            headers: HeaderMap::new(),
            body: Bytes::new(),
            finalized: false,
            templates_root,
            on_finish: Vec::new(),
        }
    }

    pub fn status_code(&self) -> u16 { self.status.as_u16() }
    pub fn headers(&self) -> &HeaderMap { &self.headers }
    pub fn body(&self) -> &Bytes { &self.body }

    /// True once a finalizing helper has run.
    pub fn is_finalized(&self) -> bool { self.finalized }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Sets the status code. Returns `self` so a finalizer can be chained:
    /// `res.status(201).json(&body)`.
    pub fn status(&mut self, code: u16) -> &mut Self {
        if self.finalized {
            return self;
        }
        match StatusCode::from_u16(code) {
            Ok(status) => self.status = status,
            Err(_) => warn!(code, "ignoring invalid status code"),
        }
        self
    }

    /// Sets (replaces) a header. Invalid names or values are logged and skipped.
    pub fn set_header(&mut self, name: &str, value: &str) -> &mut Self {
        if self.finalized {
            return self;
        }
        match (HeaderName::from_bytes(name.as_bytes()), HeaderValue::from_str(value)) {
            (Ok(name), Ok(value)) => {
                self.headers.insert(name, value);
            }
            _ => warn!(name, "ignoring invalid response header"),
        }
        self
    }

    /// Finalizes with a raw body and whatever headers are already set.
    pub fn end(&mut self, body: impl Into<Bytes>) {
        if self.finalized {
            return;
        }
        self.body = body.into();
        self.finalized = true;
    }

    /// Finalizes with an explicit content type.
    pub fn bytes(&mut self, content_type: ContentType, body: impl Into<Bytes>) {
        if self.finalized {
            return;
        }
        self.headers.insert(CONTENT_TYPE, HeaderValue::from_static(content_type.as_str()));
        self.end(body);
    }

    /// Finalizes with `value` serialised as `application/json`.
    pub fn json<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<(), Error> {
        if self.finalized {
            return Ok(());
        }
        let body = serde_json::to_vec(value)?;
        self.bytes(ContentType::Json, body);
        Ok(())
    }

    /// Finalizes with `text/plain`.
    pub fn text(&mut self, body: impl Into<String>) {
        self.bytes(ContentType::Text, body.into());
    }

    /// Finalizes with `text/html`.
    pub fn html(&mut self, body: impl Into<String>) {
        self.bytes(ContentType::Html, body.into());
    }

    /// Sends objects, arrays and `null` as JSON and everything else as text.
    pub fn send<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<(), Error> {
        if self.finalized {
            return Ok(());
        }
        match serde_json::to_value(value)? {
            v @ (Value::Object(_) | Value::Array(_) | Value::Null) => self.json(&v)?,
            Value::String(s) => self.text(s),
            other => self.text(other.to_string()),
        }
        Ok(())
    }

    /// `302 Found` with a `Location` header and no body.
    pub fn redirect(&mut self, url: &str) {
        if self.finalized {
            return;
        }
        match HeaderValue::from_str(url) {
            Ok(location) => {
                self.status = StatusCode::FOUND;
                self.headers.insert(LOCATION, location);
                self.end(Bytes::new());
            }
            Err(_) => warn!(url, "ignoring redirect to invalid location"),
        }
    }

    /// Loads `view` from the templates root, substitutes `{{key}}` tokens from
    /// `data` (a JSON object), and finalizes as `200 text/html`.
    ///
    /// A missing or unreadable template answers `500 Template not found`.
    pub async fn render<T: Serialize + ?Sized>(&mut self, view: &str, data: &T) -> Result<(), Error> {
        if self.finalized {
            return Ok(());
        }
        let data = serde_json::to_value(data)?;
        let path = self.templates_root.join(view);

        match template::load(&path).await {
            Ok(content) => {
                self.status = StatusCode::OK;
                self.html(template::render_with_value(&content, &data));
            }
            Err(e) => {
                warn!(view, error = %e, "template not found");
                self.status = StatusCode::INTERNAL_SERVER_ERROR;
                self.end("Template not found");
            }
        }
        Ok(())
    }

    /// Registers a callback that runs once, after the response is finalized,
    /// when it is handed to the transport.
    pub fn on_finish(&mut self, hook: impl FnOnce(&Response) + Send + 'static) {
        self.on_finish.push(Box::new(hook));
    }

    /// Runs finish hooks and converts into the transport's response type.
    pub(crate) fn into_http(mut self) -> http::Response<Full<Bytes>> {
        for hook in std::mem::take(&mut self.on_finish) {
            hook(&self);
        }
        let mut res = http::Response::new(Full::new(self.body));
        *res.status_mut() = self.status;
        *res.headers_mut() = self.headers;
        res
    }
}

impl fmt::Debug for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Response")
            .field("status", &self.status)
            .field("headers", &self.headers)
            .field("body_len", &self.body.len())
            .field("finalized", &self.finalized)
            .finish()
    }
}
