//! Server configuration.
//!
//! Three equivalent ways to configure, later layers winning:
//!
//! ```text
//!   defaults         ServerConfig::default()
//!   murmur.toml      [server]
//!                    listen = "0.0.0.0:7777"
//!                    write_timeout_ms = 500
//!   env var          MURMUR_SERVER__LISTEN=0.0.0.0:7777
//!                    (double underscore = nesting)
//! ```

use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use murmur_directory::DirectoryConfig;
use murmur_transport::DEFAULT_MAX_FRAME_LEN;
use serde::{Deserialize, Serialize};

/// Ports below this are reserved.
pub const MIN_PORT: u16 = 1024;

/// The port the server listens on by default.
pub const DEFAULT_PORT: u16 = 7777;

/// Errors raised while loading or validating configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A layer could not be read or deserialized.
    #[error(transparent)]
    Load(#[from] figment::Error),

    /// The listen port is outside `1024..=65535`.
    #[error("port {0} is out of range, expected {MIN_PORT}..=65535")]
    InvalidPort(u16),

    /// A size or duration that must be positive is zero.
    #[error("`{0}` must be greater than zero")]
    Zero(&'static str),
}

// ---------------------------------------------------------------------------
// ServerConfig
// ---------------------------------------------------------------------------

/// Tunables for a Murmur server (lives under `[server]` in the TOML file).
///
/// Durations are written in milliseconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address to listen on.
    pub listen: SocketAddr,

    /// Longest accepted line, in bytes. Longer lines drop the connection.
    pub max_frame_len: usize,

    /// Housekeeping tick of the reactor loop.
    #[serde(rename = "poll_interval_ms", with = "millis")]
    pub poll_interval: Duration,

    /// Upper bound on a single write to one client.
    #[serde(rename = "write_timeout_ms", with = "millis")]
    pub write_timeout: Duration,

    /// Upper bound on a directory query.
    #[serde(rename = "directory_timeout_ms", with = "millis")]
    pub directory_timeout: Duration,

    /// Capacity of the directory actor's queue.
    pub directory_queue: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        let directory = DirectoryConfig::default();
        Self {
            listen: SocketAddr::from(([0, 0, 0, 0], DEFAULT_PORT)),
            max_frame_len: DEFAULT_MAX_FRAME_LEN,
            poll_interval: Duration::from_millis(200),
            write_timeout: Duration::from_secs(1),
            directory_timeout: directory.timeout,
            directory_queue: directory.queue,
        }
    }
}

impl ServerConfig {
    /// Checks the values a file or environment could get wrong.
    ///
    /// [`MurmurServerBuilder`](crate::MurmurServerBuilder) doesn't call
    /// this, so tests and embedders may still listen on port 0.
    ///
    /// # Errors
    /// [`ConfigError::InvalidPort`] or [`ConfigError::Zero`].
    pub fn validate(&self) -> Result<(), ConfigError> {
        let port = self.listen.port();
        if port < MIN_PORT {
            return Err(ConfigError::InvalidPort(port));
        }
        let positive = [
            ("max_frame_len", self.max_frame_len == 0),
            ("poll_interval_ms", self.poll_interval.is_zero()),
            ("write_timeout_ms", self.write_timeout.is_zero()),
            ("directory_timeout_ms", self.directory_timeout.is_zero()),
            ("directory_queue", self.directory_queue == 0),
        ];
        match positive.into_iter().find(|(_, is_zero)| *is_zero) {
            Some((field, _)) => Err(ConfigError::Zero(field)),
            None => Ok(()),
        }
    }

    /// The directory actor settings carried by this config.
    pub fn directory(&self) -> DirectoryConfig {
        DirectoryConfig {
            queue: self.directory_queue,
            timeout: self.directory_timeout,
        }
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct FileConfig {
    #[serde(default)]
    server: ServerConfig,
}

/// Builds the layered figment: defaults → TOML file (if given) →
/// `MURMUR_*` env vars.
///
/// A missing file is treated as empty.
pub fn figment(path: Option<&Path>) -> figment::Figment {
    use figment::{
        providers::{Env, Format, Serialized, Toml},
        Figment,
    };

    let mut figment = Figment::from(Serialized::defaults(FileConfig::default()));
    if let Some(path) = path {
        figment = figment.merge(Toml::file(path));
    }
    figment.merge(Env::prefixed("MURMUR_").split("__"))
}

/// Loads and validates the server configuration.
///
/// # Errors
/// [`ConfigError::Load`] if a layer is malformed, otherwise whatever
/// [`ServerConfig::validate`] reports.
pub fn load(path: Option<&Path>) -> Result<ServerConfig, ConfigError> {
    let file: FileConfig = figment(path).extract()?;
    file.server.validate()?;
    Ok(file.server)
}

mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(u64::try_from(value.as_millis()).unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}
