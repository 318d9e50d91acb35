//! Engine configuration
//!
//! A single JSON config file drives the whole process. Every field has a
//! default so a missing or partial file still yields a runnable engine.
//! `lodestone init` writes the defaults out; `lodestone serve` reads them.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Root data directory (catalog, journal).
    pub data_dir: PathBuf,
    /// HTTP server settings.
    pub http: HttpConfig,
    /// Identity boundary settings.
    pub auth: AuthConfig,
    /// Engine limits.
    pub limits: LimitsConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./lodestone_data"),
            http: HttpConfig::default(),
            auth: AuthConfig::default(),
            limits: LimitsConfig::default(),
        }
    }
}

/// HTTP server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Bind address.
    pub bind_address: String,
    /// Port.
    pub port: u16,
    /// Allowed CORS origins. Empty = permissive (development).
    pub cors_origins: Vec<String>,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1".to_string(),
            port: 8090,
            cors_origins: Vec::new(),
        }
    }
}

impl HttpConfig {
    /// Full socket address string.
    pub fn socket_addr(&self) -> String {
        format!("{}:{}", self.bind_address, self.port)
    }
}

/// Identity boundary settings.
///
/// Token issuance belongs to the external auth collaborator; the engine only
/// verifies what that collaborator signed.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// HS256 shared secret for bearer-token verification.
    pub token_secret: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            token_secret: String::new(),
        }
    }
}

impl AuthConfig {
    /// Whether token verification is configured at all.
    pub fn is_configured(&self) -> bool {
        !self.token_secret.is_empty()
    }
}

/// Engine limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Default page size for record listing.
    pub default_limit: usize,
    /// Maximum page size for record listing.
    pub max_limit: usize,
    /// Maximum relation expansion depth.
    pub expand_max_depth: usize,
    /// Per-subscriber event queue capacity.
    pub subscriber_queue_capacity: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            default_limit: 30,
            max_limit: 500,
            expand_max_depth: 6,
            subscriber_queue_capacity: 256,
        }
    }
}

impl EngineConfig {
    /// Load configuration from a JSON file.
    ///
    /// A missing file yields the defaults; a present but malformed file is an
    /// error (a typo must not silently fall back to defaults).
    pub fn load(path: &Path) -> io::Result<Self> {
        match fs::read_to_string(path) {
            Ok(contents) => serde_json::from_str(&contents)
                .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(e),
        }
    }

    /// Write configuration to a JSON file (pretty-printed, atomic rename).
    pub fn save(&self, path: &Path) -> io::Result<()> {
        let contents = serde_json::to_string_pretty(self)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        let tmp = path.with_extension("tmp");
        fs::write(&tmp, contents)?;
        fs::rename(&tmp, path)
    }
}
