//! Fixed-arity path patterns.
//!
//! A pattern is a `/`-delimited list of segments. A segment starting with `:`
//! captures the request segment at the same position under that name; every
//! other segment must match literally. Empty segments are ignored on both
//! sides, so `/`, `""` and `//` all normalise to zero segments.
//!
//! There are no wildcards, optional segments, or regexes: a pattern matches a
//! path only when both have the same number of segments.

use std::collections::HashMap;

/// Captured path parameters, keyed by name without the leading `:`.
pub type Params = HashMap<String, String>;

#[derive(Clone, Debug, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Param(String),
}

/// A parsed route pattern.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Pattern {
    source: String,
    segments: Vec<Segment>,
}

impl Pattern {
    pub fn parse(source: &str) -> Self {
        let segments = split(source)
            .map(|s| match s.strip_prefix(':') {
                Some(name) => Segment::Param(name.to_owned()),
                None => Segment::Literal(s.to_owned()),
            })
            .collect();
        Self { source: source.to_owned(), segments }
    }

    /// The pattern text as it was registered (after any mount prefixing).
    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Returns a new pattern with `prefix` concatenated in front.
    pub fn prefixed(&self, prefix: &str) -> Self {
        Self::parse(&format!("{prefix}{}", self.source))
    }

    /// Matches a concrete request path.
    ///
    /// Values are captured raw: percent-encoding in the path is preserved.
    pub fn matches(&self, path: &str) -> Option<Params> {
        let mut params = Params::new();
        let mut parts = split(path);

        for segment in &self.segments {
            let part = parts.next()?;
            match segment {
                Segment::Literal(lit) if lit == part => {}
                Segment::Literal(_) => return None,
                Segment::Param(name) => {
                    params.insert(name.clone(), part.to_owned());
                }
            }
        }

        // Path has more segments than the pattern.
        if parts.next().is_some() {
            return None;
        }
        Some(params)
    }
}

fn split(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|s| !s.is_empty())
}
