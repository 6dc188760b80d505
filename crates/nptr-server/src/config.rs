use std::fmt;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use nptr_store::{NamingScheme, ObjectKey};
use serde::{Deserialize, Serialize};

use crate::error::{ServerError, ServerResult};

/// Default cap on the size of an uploaded file (1 GiB).
pub const DEFAULT_MAX_UPLOAD_SIZE: u64 = 1024 * 1024 * 1024;

/// Where the server accepts connections.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Listen {
    Tcp(SocketAddr),
    Unix(PathBuf),
}

impl fmt::Display for Listen {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Tcp(addr) => write!(f, "{addr}"),
            Self::Unix(path) => write!(f, "unix:{}", path.display()),
        }
    }
}

/// Immutable server configuration, built once at startup.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub listen: Listen,
    /// Directory holding stored objects. Must already exist.
    pub storage_root: PathBuf,
    /// Base URL prepended to object keys in upload responses.
    pub public_url: String,
    /// Largest accepted file, in bytes.
    pub max_upload_size: u64,
    pub naming: NamingScheme,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: Listen::Tcp(Self::default_tcp_addr()),
            storage_root: PathBuf::from("files"),
            public_url: "http://127.0.0.1:8000".into(),
            max_upload_size: DEFAULT_MAX_UPLOAD_SIZE,
            naming: NamingScheme::default(),
        }
    }
}

impl ServerConfig {
    pub fn default_tcp_addr() -> SocketAddr {
        SocketAddr::from(([127, 0, 0, 1], 8000))
    }

    /// Parse a TOML document. Missing keys take their defaults.
    pub fn from_toml_str(text: &str) -> ServerResult<Self> {
        toml::from_str(text).map_err(|e| ServerError::Config(e.to_string()))
    }

    /// Load a TOML config file.
    pub fn load(path: &Path) -> ServerResult<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| ServerError::Config(format!("reading {}: {e}", path.display())))?;
        Self::from_toml_str(&text)
    }

    /// Check the settings that make startup impossible.
    pub fn validate(&self) -> ServerResult<()> {
        if !self.storage_root.is_dir() {
            return Err(ServerError::Config(format!(
                "uploads directory does not exist: {}",
                self.storage_root.display()
            )));
        }
        if self.public_url.trim().is_empty() {
            return Err(ServerError::Config("public URL must not be empty".into()));
        }
        if self.max_upload_size == 0 {
            return Err(ServerError::Config("max upload size must be positive".into()));
        }
        Ok(())
    }

    /// Public URL of a stored object.
    pub fn object_url(&self, key: &ObjectKey) -> String {
        format!("{}/{}", self.public_url.trim_end_matches('/'), key)
    }

    /// Text served on `GET /`.
    pub fn usage_hint(&self) -> String {
        format!("curl -F'f=@f' {}", self.public_url)
    }
}
