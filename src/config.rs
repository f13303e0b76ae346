//! Application configuration.
//!
//! All fields have defaults, so an empty TOML document is a valid config.
//! `WEFT_PORT` (or `PORT`) in the environment overrides the configured port.
//!
//! ```toml
//! host = "127.0.0.1"
//! port = 3000
//! public_dir = "public"
//! templates_dir = "templates"
//! max_body_size = 10485760
//!
//! [cors]
//! origin = "https://example.com"
//! credentials = true
//!
//! [upload]
//! max_file_size = 2097152
//! allowed_mime_types = ["image/png"]
//! ```

use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::Error;

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub host: String,
    pub port: u16,

    /// Root of the static file collaborator.
    pub public_dir: PathBuf,

    /// Root for `Response::render` and the template collaborator.
    pub templates_dir: PathBuf,

    /// Largest request body buffered before dispatch, in bytes.
    pub max_body_size: usize,

    pub cors: CorsConfig,
    pub upload: UploadConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_owned(),
            port: 8080,
            public_dir: PathBuf::from("public"),
            templates_dir: PathBuf::from("templates"),
            max_body_size: 10 * 1024 * 1024,
            cors: CorsConfig::default(),
            upload: UploadConfig::default(),
        }
    }
}

impl Config {
    pub fn from_toml_str(source: &str) -> Result<Self, Error> {
        let config: Self = toml::from_str(source).map_err(|e| Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Loads a TOML file and applies the environment override.
    pub fn load(path: &Path) -> Result<Self, Error> {
        let source = std::fs::read_to_string(path)?;
        Self::from_toml_str(&source)?.with_env_overrides()
    }

    /// Applies `WEFT_PORT`, falling back to `PORT`.
    pub fn with_env_overrides(mut self) -> Result<Self, Error> {
        let port = std::env::var("WEFT_PORT").or_else(|_| std::env::var("PORT"));
        if let Ok(port) = port {
            self.port = port
                .parse()
                .map_err(|_| Error::Config(format!("invalid port `{port}`")))?;
        }
        Ok(self)
    }

    pub fn socket_addr(&self) -> Result<SocketAddr, Error> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .map_err(|_| Error::Config(format!("invalid listen address `{}:{}`", self.host, self.port)))
    }

    fn validate(&self) -> Result<(), Error> {
        self.socket_addr()?;
        if self.max_body_size == 0 {
            return Err(Error::Config("max_body_size must be positive".to_owned()));
        }
        if self.upload.max_file_size == 0 {
            return Err(Error::Config("upload.max_file_size must be positive".to_owned()));
        }
        Ok(())
    }
}

/// `Access-Control-Allow-*` values.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CorsConfig {
    pub origin: String,
    pub methods: Vec<String>,
    pub headers: Vec<String>,
    pub credentials: bool,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            origin: "*".to_owned(),
            methods: ["GET", "POST", "PUT", "DELETE", "PATCH", "OPTIONS"]
                .map(str::to_owned)
                .to_vec(),
            headers: vec!["Content-Type".to_owned(), "Authorization".to_owned()],
            credentials: false,
        }
    }
}

/// Limits for multipart uploads.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct UploadConfig {
    /// Largest accepted file part, in bytes.
    pub max_file_size: usize,
    pub allowed_mime_types: Vec<String>,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            max_file_size: 1024 * 1024,
            allowed_mime_types: vec!["image/jpeg".to_owned(), "image/png".to_owned()],
        }
    }
}
