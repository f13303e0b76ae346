//! Unified error type.
//!
//! Every failure a handler can report travels as an [`Error`]: returned with
//! `?`, produced by a panicking handler, or raised by the server while it
//! binds and accepts. Errors never cross a request boundary; whatever reaches
//! the end of the error chain is answered with `500 {"error": <message>}`.

use serde_json::Value;

/// The error type for handlers, the error chain, and server startup.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A plain message, usually built with [`Error::msg`].
    #[error("{0}")]
    Message(String),

    /// An arbitrary JSON value, e.g. `{"message": "boom", "code": 7}`.
    #[error("{0}")]
    Value(Value),

    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    #[error("json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("transport: {0}")]
    Transport(#[from] hyper::Error),

    #[error("multipart: {0}")]
    Multipart(#[from] multer::Error),

    #[error("config: {0}")]
    Config(String),

    /// A handler panicked; carries the panic payload when it was a string.
    #[error("handler panicked: {0}")]
    Panic(String),

    #[error(transparent)]
    Other(#[from] Box<dyn std::error::Error + Send + Sync + 'static>),
}

const DEFAULT_MESSAGE: &str = "Internal Server Error";

impl Error {
    pub fn msg(message: impl Into<String>) -> Self {
        Self::Message(message.into())
    }

    /// Wraps any JSON-serialisable value as an error payload.
    pub fn value(value: impl Into<Value>) -> Self {
        Self::Value(value.into())
    }

    /// The human-readable message used by the fallback error responder.
    ///
    /// A JSON object with a string `message` field yields that field, a JSON
    /// string yields itself, `null` yields the generic default, and any other
    /// JSON value is serialised. Every other variant uses its `Display` text.
    pub fn message(&self) -> String {
        match self {
            Self::Message(m) => m.clone(),
            Self::Value(Value::Object(map)) => match map.get("message") {
                Some(Value::String(m)) => m.clone(),
                Some(other) if !other.is_null() => other.to_string(),
                _ => DEFAULT_MESSAGE.to_owned(),
            },
            Self::Value(Value::String(s)) => s.clone(),
            Self::Value(Value::Null) => DEFAULT_MESSAGE.to_owned(),
            Self::Value(other) => other.to_string(),
            other => other.to_string(),
        }
    }
}

impl From<String> for Error {
    fn from(message: String) -> Self {
        Self::Message(message)
    }
}

impl From<&str> for Error {
    fn from(message: &str) -> Self {
        Self::Message(message.to_owned())
    }
}
