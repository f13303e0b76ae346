//! Per-request context.
//!
//! A [`Request`] is owned by exactly one in-flight dispatch. It starts with
//! the transport's view of the request (method, path, headers, raw body) plus
//! the parsed query string; middleware fill the optional capability fields
//! (`body`, `cookies`, `files`) as the pipeline advances, and the dispatcher
//! sets `params` once a route is resolved.
//!
//! Anything not covered by a dedicated field goes into [`Request::extensions`],
//! a type-keyed map shared by every stage of the pipeline.

use std::collections::HashMap;
use std::net::SocketAddr;

use bytes::Bytes;
use http::{Extensions, HeaderMap, Uri};
use serde_json::Value;

use crate::pattern::Params;

/// A file decoded from a `multipart/form-data` submission, held in memory.
#[derive(Clone, Debug)]
pub struct UploadedFile {
    pub field: String,
    pub file_name: Option<String>,
    pub content_type: Option<String>,
    pub size: usize,
    pub data: Bytes,
}

/// An incoming HTTP request and the context accumulated while dispatching it.
#[derive(Debug)]
pub struct Request {
    method: String,
    uri: Uri,
    headers: HeaderMap,
    raw_body: Bytes,
    remote_addr: Option<SocketAddr>,
    query: HashMap<String, String>,
    pub(crate) params: Params,
    pub(crate) body: Option<Value>,
    pub(crate) cookies: Option<HashMap<String, String>>,
    pub(crate) files: Option<Vec<UploadedFile>>,
    extensions: Extensions,
}

impl Request {
    /// Builds the context from the transport's request head and the buffered
    /// body. The method is normalised to upper-case and the query string is
    /// parsed here, once.
    pub fn from_parts(parts: http::request::Parts, raw_body: Bytes) -> Self {
        let query = parse_query(parts.uri.query());
        Self {
            method: parts.method.as_str().to_ascii_uppercase(),
            uri: parts.uri,
            headers: parts.headers,
            raw_body,
            remote_addr: None,
            query,
            params: Params::new(),
            body: None,
            cookies: None,
            files: None,
            extensions: parts.extensions,
        }
    }

    pub(crate) fn with_remote_addr(mut self, addr: Option<SocketAddr>) -> Self {
        self.remote_addr = addr;
        self
    }

    pub fn method(&self) -> &str { &self.method }
    pub fn path(&self) -> &str { self.uri.path() }
    pub fn uri(&self) -> &Uri { &self.uri }
    pub fn headers(&self) -> &HeaderMap { &self.headers }
    pub fn raw_body(&self) -> &Bytes { &self.raw_body }
    pub fn remote_addr(&self) -> Option<SocketAddr> { self.remote_addr }

    /// Path and query as sent by the client, e.g. `/search?q=x`.
    pub fn target(&self) -> &str {
        self.uri.path_and_query().map_or("/", |pq| pq.as_str())
    }

    /// Case-insensitive header lookup. Non-UTF-8 values are treated as absent.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Returns a named path parameter.
    ///
    /// For a route `/users/:id`, `req.param("id")` on `/users/42` returns `Some("42")`.
    pub fn param(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }

    pub fn params(&self) -> &Params { &self.params }

    pub fn query(&self, key: &str) -> Option<&str> {
        self.query.get(key).map(String::as_str)
    }

    pub fn query_map(&self) -> &HashMap<String, String> { &self.query }

    /// Parsed body, present once a body-parsing middleware has run.
    pub fn body(&self) -> Option<&Value> { self.body.as_ref() }

    pub fn set_body(&mut self, body: Value) {
        self.body = Some(body);
    }

    /// Parsed cookies, present once the cookie middleware has run.
    pub fn cookies(&self) -> Option<&HashMap<String, String>> { self.cookies.as_ref() }

    pub fn cookie(&self, name: &str) -> Option<&str> {
        self.cookies.as_ref()?.get(name).map(String::as_str)
    }

    pub fn set_cookies(&mut self, cookies: HashMap<String, String>) {
        self.cookies = Some(cookies);
    }

    /// Uploaded files, present once the multipart middleware has run.
    pub fn files(&self) -> Option<&[UploadedFile]> { self.files.as_deref() }

    pub fn set_files(&mut self, files: Vec<UploadedFile>) {
        self.files = Some(files);
    }

    pub fn extensions(&self) -> &Extensions { &self.extensions }
    pub fn extensions_mut(&mut self) -> &mut Extensions { &mut self.extensions }
}

/// Parses a query string with `application/x-www-form-urlencoded` rules.
/// On duplicate keys the last value wins.
pub(crate) fn parse_query(query: Option<&str>) -> HashMap<String, String> {
    query
        .map(|q| {
            url::form_urlencoded::parse(q.as_bytes())
                .map(|(k, v)| (k.into_owned(), v.into_owned()))
                .collect()
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(method: &str, uri: &str) -> Request {
        let (parts, ()) = http::Request::builder()
            .method(method)
            .uri(uri)
            .header("X-Trace", "abc")
            .body(())
            .unwrap()
            .into_parts();
        Request::from_parts(parts, Bytes::new())
    }

    #[test]
    fn query_is_parsed_once_at_construction() {
        let req = request("GET", "/api/user/123?search=engineer&page=2");
        assert_eq!(req.path(), "/api/user/123");
        assert_eq!(req.query("search"), Some("engineer"));
        assert_eq!(req.query("page"), Some("2"));
        assert_eq!(req.target(), "/api/user/123?search=engineer&page=2");
    }

    #[test]
    fn query_decoding_and_duplicates() {
        let q = parse_query(Some("a=1&a=2&name=John+Doe&x=%2F"));
        assert_eq!(q["a"], "2");
        assert_eq!(q["name"], "John Doe");
        assert_eq!(q["x"], "/");
        assert!(parse_query(None).is_empty());
    }

    #[test]
    fn method_is_upper_cased() {
        let req = request("patch", "/");
        assert_eq!(req.method(), "PATCH");
    }

    #[test]
    fn capability_fields_start_absent() {
        let req = request("GET", "/");
        assert!(req.body().is_none());
        assert!(req.cookies().is_none());
        assert!(req.files().is_none());
        assert_eq!(req.header("x-trace"), Some("abc"));
    }
}
