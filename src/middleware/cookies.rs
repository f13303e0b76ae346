//! `Cookie` header parser.

use std::collections::HashMap;

use http::header::COOKIE;

use crate::error::Error;
use crate::handler::{BoxFuture, Handler, Next, Outcome};
use crate::request::Request;
use crate::response::Response;

/// Fills [`Request::cookies`]. Always continues; an absent header yields an
/// empty map.
#[derive(Clone, Copy, Debug, Default)]
pub struct CookieParser;

impl Handler for CookieParser {
    fn call<'a>(&'a self, req: &'a mut Request, _res: &'a mut Response) -> BoxFuture<'a, Outcome> {
        Box::pin(async move {
            let cookies = parse(req.header(COOKIE.as_str()).unwrap_or(""))?;
            req.set_cookies(cookies);
            Ok(Next::Continue)
        })
    }
}

/// Splits on `;`, then at the first `=`. Values are percent-decoded; the last
/// occurrence of a name wins. A value that does not decode to UTF-8 fails.
pub(crate) fn parse(header: &str) -> Result<HashMap<String, String>, Error> {
    let mut cookies = HashMap::new();
    for pair in header.split(';') {
        let (name, value) = pair.trim().split_once('=').unwrap_or((pair.trim(), ""));
        let name = name.trim();
        if name.is_empty() {
            continue;
        }
        let value = urlencoding::decode(value)
            .map_err(|e| Error::msg(format!("malformed cookie `{name}`: {e}")))?;
        cookies.insert(name.to_owned(), value.into_owned());
    }
    Ok(cookies)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::middleware::test_support::{request, response};

    #[test]
    fn splits_pairs_and_decodes_values() {
        let cookies = parse("session=abc%20def; theme=dark;token=a=b=c").unwrap();
        assert_eq!(cookies["session"], "abc def");
        assert_eq!(cookies["theme"], "dark");
        assert_eq!(cookies["token"], "a=b=c");
    }

    #[test]
    fn last_duplicate_wins_and_empty_names_are_skipped() {
        let cookies = parse("a=1; a=2; =orphan; ;flag").unwrap();
        assert_eq!(cookies["a"], "2");
        assert_eq!(cookies["flag"], "");
        assert_eq!(cookies.len(), 2);
    }

    #[test]
    fn undecodable_value_is_an_error() {
        assert!(parse("bad=%FF%FE").is_err());
    }

    #[tokio::test]
    async fn populates_request_even_without_header() {
        let mut req = request("GET", "/", &[], b"");
        let mut res = response();
        assert_eq!(CookieParser.call(&mut req, &mut res).await.unwrap(), Next::Continue);
        assert_eq!(req.cookies().map(HashMap::len), Some(0));

        let mut req = request("GET", "/", &[("cookie", "user=ada")], b"");
        CookieParser.call(&mut req, &mut res).await.unwrap();
        assert_eq!(req.cookie("user"), Some("ada"));
    }
}
