//! # Client Configuration
//!
//! Settings for one Classic/CPE client connection, grouped the way they are consumed:
//! `client` feeds the login and ExtInfo packets, `protocol` shapes the session,
//! `transport` the TCP connection and `logging` the `tracing` subscriber.
//!
//! ## Sources
//! - TOML, via [`ProtocolConfig::from_file`] or [`ProtocolConfig::from_toml`]
//! - `CLASSIC_PROTOCOL_*` environment variables, via [`ProtocolConfig::from_env`]
//! - [`ProtocolConfig::default_with_overrides`] in code and tests
//!
//! Every section has serde defaults, so a TOML file only needs the keys it changes.
//!
//! ## Notes
//! - `strict_framing` turns the silent frame-desync tolerance into a hard error; real
//!   servers rely on the lenient behaviour, so it defaults to off
//! - `max_map_volume` caps the buffer a server can make the client allocate

use crate::error::{ProtocolError, Result};
use crate::utils::timeout;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use tracing::Level;

/// Classic protocol version sent in the login packet
pub const PROTOCOL_VERSION: u8 = 7;

/// Login "unused" byte value that announces CPE support
pub const CPE_MAGIC: u8 = 0x42;

/// Default application name announced in ExtInfo
pub const DEFAULT_APP_NAME: &str = "classic-protocol 0.9";

/// Largest map volume accepted by default (bytes)
pub const MAX_MAP_VOLUME: usize = 512 * 1024 * 1024;

/// Longest name the login packet's username field is expected to carry.
const MAX_USERNAME_LEN: usize = 16;

/// Width of every string field on the wire.
const STRING_FIELD_LEN: usize = 64;

/// Inbound buffer must fit the widest frame (BulkBlockUpdate, 1282 bytes).
const MIN_READ_BUFFER: usize = 2048;

const MIN_CONNECT_TIMEOUT: Duration = Duration::from_millis(100);
const MAX_CONNECT_TIMEOUT: Duration = Duration::from_secs(300);

/// Everything a [`Connection`](crate::Connection) and its session are built from.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct ProtocolConfig {
    pub client: ClientConfig,
    pub protocol: ProtocolSettings,
    pub transport: TransportConfig,
    pub logging: LoggingConfig,
}

impl ProtocolConfig {
    /// Read and parse a TOML config file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            ProtocolError::ConfigError(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::from_toml(&text)
    }

    pub fn from_toml(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| ProtocolError::ConfigError(format!("bad TOML: {e}")))
    }

    /// Defaults, overridden by whichever `CLASSIC_PROTOCOL_*` variables are set.
    /// Values that fail to parse are ignored.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        if let Some(address) = env_value::<String>("SERVER_ADDRESS") {
            config.transport.address = address;
        }
        if let Some(username) = env_value::<String>("USERNAME") {
            config.client.username = username;
        }
        if let Some(mppass) = env_value::<String>("MPPASS") {
            config.client.verification_key = mppass;
        }
        if let Some(ms) = env_value::<u64>("CONNECTION_TIMEOUT_MS") {
            config.transport.connection_timeout = Duration::from_millis(ms);
        }
        if let Some(use_cpe) = env_value::<bool>("USE_CPE") {
            config.protocol.use_cpe = use_cpe;
        }
        if let Some(strict) = env_value::<bool>("STRICT_FRAMING") {
            config.protocol.strict_framing = strict;
        }
        Ok(config)
    }

    /// Defaults with `mutator` applied.
    pub fn default_with_overrides<F>(mutator: F) -> Self
    where
        F: FnOnce(&mut Self),
    {
        let mut config = Self::default();
        mutator(&mut config);
        config
    }

    /// The default config rendered as TOML, as a starting point for a config file.
    pub fn example_config() -> String {
        toml::to_string_pretty(&Self::default()).unwrap_or_default()
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let text = toml::to_string_pretty(self)
            .map_err(|e| ProtocolError::ConfigError(format!("cannot encode config: {e}")))?;
        std::fs::write(path, text).map_err(|e| {
            ProtocolError::ConfigError(format!("cannot write {}: {e}", path.display()))
        })
    }

    /// Every problem found, one message each. Empty when the config is usable.
    pub fn validate(&self) -> Vec<String> {
        let mut problems = Vec::new();
        self.client.check(&mut problems);
        self.protocol.check(&mut problems);
        self.transport.check(&mut problems);
        self.logging.check(&mut problems);
        problems
    }

    /// [`validate`](Self::validate), folded into one [`ProtocolError::ConfigError`].
    pub fn validate_strict(&self) -> Result<()> {
        let problems = self.validate();
        if problems.is_empty() {
            return Ok(());
        }
        Err(ProtocolError::ConfigError(format!(
            "{} config problem(s): {}",
            problems.len(),
            problems.join("; ")
        )))
    }
}

fn env_value<T: FromStr>(suffix: &str) -> Option<T> {
    std::env::var(format!("CLASSIC_PROTOCOL_{suffix}"))
        .ok()
        .and_then(|raw| raw.parse().ok())
}

fn check_string_field(problems: &mut Vec<String>, key: &str, value: &str, max: usize) {
    if value.len() > max {
        problems.push(format!(
            "{key} is {} bytes, longer than {max}",
            value.len()
        ));
    }
}

/// Identity sent in the login packet and the ExtInfo reply.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ClientConfig {
    pub username: String,
    /// mppass handed out by the server list; empty for unauthenticated servers
    pub verification_key: String,
    /// Announced to the server in ExtInfo
    pub app_name: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            username: "Player".into(),
            verification_key: String::new(),
            app_name: DEFAULT_APP_NAME.into(),
        }
    }
}

impl ClientConfig {
    fn check(&self, problems: &mut Vec<String>) {
        if self.username.is_empty() {
            problems.push("Username cannot be empty".into());
        } else if self.username.len() > MAX_USERNAME_LEN {
            problems.push(format!(
                "Username too long: {} bytes, the login name holds {MAX_USERNAME_LEN}",
                self.username.len()
            ));
        }
        if self.verification_key.len() > STRING_FIELD_LEN {
            problems.push("Verification key longer than a 64-byte string field".into());
        }
        if self.app_name.is_empty() {
            problems.push("client.app_name is empty; ExtInfo needs a name".into());
        }
        check_string_field(problems, "client.app_name", &self.app_name, STRING_FIELD_LEN);
    }
}

/// How the session decodes and what it negotiates.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ProtocolSettings {
    /// Send the CPE marker at login and register extension handlers
    pub use_cpe: bool,
    /// Announce BlockDefinitions/BlockDefinitionsExt and decode their packets
    pub allow_custom_blocks: bool,
    /// Surface texture pack URLs from the server
    pub allow_server_textures: bool,
    /// Fail a frame whose handler consumed a different byte count than its size
    pub strict_framing: bool,
    /// Largest decompressed map volume (bytes) the client will allocate
    pub max_map_volume: usize,
}

impl Default for ProtocolSettings {
    fn default() -> Self {
        Self {
            use_cpe: true,
            allow_custom_blocks: true,
            allow_server_textures: true,
            strict_framing: false,
            max_map_volume: MAX_MAP_VOLUME,
        }
    }
}

impl ProtocolSettings {
    fn check(&self, problems: &mut Vec<String>) {
        if self.max_map_volume == 0 {
            problems.push("protocol.max_map_volume cannot be 0".into());
        } else if self.max_map_volume > u32::MAX as usize {
            problems.push(format!(
                "protocol.max_map_volume {} exceeds the 32-bit size prefix",
                self.max_map_volume
            ));
        }
        if self.allow_custom_blocks && !self.use_cpe {
            problems.push("allow_custom_blocks has no effect when use_cpe is disabled".into());
        }
    }
}

/// TCP side of the connection.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TransportConfig {
    /// `host:port` of the server, e.g. "127.0.0.1:25565"
    pub address: String,
    /// Connect deadline, stored in TOML as milliseconds
    #[serde(with = "millis")]
    pub connection_timeout: Duration,
    /// Initial capacity of the inbound frame buffer
    pub read_buffer_capacity: usize,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            address: "127.0.0.1:25565".into(),
            connection_timeout: timeout::DEFAULT_TIMEOUT,
            read_buffer_capacity: 64 * 1024,
        }
    }
}

impl TransportConfig {
    fn check(&self, problems: &mut Vec<String>) {
        if self.address.is_empty() {
            problems.push("Server address cannot be empty".into());
        } else if self.address.parse::<std::net::SocketAddr>().is_err() {
            problems.push(format!(
                "Invalid server address '{}', want ip:port",
                self.address
            ));
        }

        if self.connection_timeout < MIN_CONNECT_TIMEOUT {
            problems.push(format!(
                "transport.connection_timeout too short ({:?} < {MIN_CONNECT_TIMEOUT:?})",
                self.connection_timeout
            ));
        } else if self.connection_timeout > MAX_CONNECT_TIMEOUT {
            problems.push(format!(
                "transport.connection_timeout too long ({:?} > {MAX_CONNECT_TIMEOUT:?})",
                self.connection_timeout
            ));
        }

        if self.read_buffer_capacity < MIN_READ_BUFFER {
            problems.push(format!(
                "Read buffer capacity {} cannot hold a bulk block update (need {MIN_READ_BUFFER})",
                self.read_buffer_capacity
            ));
        }
    }
}

/// Subscriber settings read by [`init_logging`](crate::utils::logging::init_logging).
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Recorded on the "Logging initialized" event
    pub app_name: String,
    /// Used when `RUST_LOG` is unset
    #[serde(with = "level_name")]
    pub log_level: Level,
    pub log_to_console: bool,
    pub log_to_file: bool,
    /// Appended to; required when `log_to_file` is set
    pub log_file_path: Option<String>,
    /// One JSON object per event instead of the human format
    pub json_format: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            app_name: "classic-protocol".into(),
            log_level: Level::INFO,
            log_to_console: true,
            log_to_file: false,
            log_file_path: None,
            json_format: false,
        }
    }
}

impl LoggingConfig {
    fn check(&self, problems: &mut Vec<String>) {
        if self.app_name.is_empty() {
            problems.push("logging.app_name is empty".into());
        }

        if self.log_to_file {
            match self.log_file_path.as_deref().map(Path::new) {
                None => {
                    problems.push("log_file_path must be specified for file logging".into())
                }
                Some(path) => {
                    let missing_dir = path
                        .parent()
                        .filter(|dir| !dir.as_os_str().is_empty())
                        .filter(|dir| !dir.exists());
                    if let Some(dir) = missing_dir {
                        problems.push(format!("log directory {} is missing", dir.display()));
                    }
                }
            }
        } else if !self.log_to_console {
            problems.push("At least one logging output is needed: console or file".into());
        }
    }
}

/// `Duration` as integer milliseconds.
mod millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(u64::try_from(value.as_millis()).unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}

/// `tracing::Level` as its lower-case name.
mod level_name {
    use serde::{de::Error, Deserialize, Deserializer, Serializer};
    use tracing::Level;

    pub fn serialize<S: Serializer>(level: &Level, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&level.as_str().to_ascii_lowercase())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Level, D::Error> {
        let name = String::deserialize(d)?;
        name.parse()
            .map_err(|_| D::Error::custom(format!("unknown log level '{name}'")))
    }
}
