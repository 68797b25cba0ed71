//! Connection settings and their one-time resolution
//!
//! Values come from, in order of precedence: explicit command-line options,
//! an optional TOML file, environment variables and finally built-in defaults.
//! Resolution happens once at startup and produces an immutable [`ClientSettings`].

use crate::clock;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use thiserror::Error;

/// Default MQTT broker port
pub const DEFAULT_PORT: u16 = 1883;
/// Broker used when neither an option nor `MQTTNAME` names one
pub const DEFAULT_BROKER: &str = "localhost";
/// Topic used when none is given
pub const DEFAULT_TOPIC: &str = "Test";

/// Environment variable holding the broker host name
pub const ENV_BROKER: &str = "MQTTNAME";
/// Environment variable holding the broker password
pub const ENV_PASSWORD: &str = "PSWVAL";
/// Environment variable holding the broker user name
pub const ENV_USERNAME: &str = "USERNAME";

fn default_keep_alive() -> u64 {
    60
}

fn default_connect_timeout() -> u64 {
    10
}

fn default_retry_interval() -> u64 {
    1000
}

/// MQTT quality of service level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum Qos {
    #[default]
    AtMostOnce,
    AtLeastOnce,
    ExactlyOnce,
}

impl Qos {
    pub fn as_u8(self) -> u8 {
        match self {
            Qos::AtMostOnce => 0,
            Qos::AtLeastOnce => 1,
            Qos::ExactlyOnce => 2,
        }
    }
}

impl TryFrom<u8> for Qos {
    type Error = ConfigError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Qos::AtMostOnce),
            1 => Ok(Qos::AtLeastOnce),
            2 => Ok(Qos::ExactlyOnce),
            other => Err(ConfigError::InvalidQos(other)),
        }
    }
}

impl From<Qos> for u8 {
    fn from(qos: Qos) -> Self {
        qos.as_u8()
    }
}

impl From<Qos> for rumqttc::QoS {
    fn from(qos: Qos) -> Self {
        match qos {
            Qos::AtMostOnce => rumqttc::QoS::AtMostOnce,
            Qos::AtLeastOnce => rumqttc::QoS::AtLeastOnce,
            Qos::ExactlyOnce => rumqttc::QoS::ExactlyOnce,
        }
    }
}

impl From<rumqttc::QoS> for Qos {
    fn from(qos: rumqttc::QoS) -> Self {
        match qos {
            rumqttc::QoS::AtMostOnce => Qos::AtMostOnce,
            rumqttc::QoS::AtLeastOnce => Qos::AtLeastOnce,
            rumqttc::QoS::ExactlyOnce => Qos::ExactlyOnce,
        }
    }
}

impl fmt::Display for Qos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_u8())
    }
}

/// Fully resolved connection parameters
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClientSettings {
    /// Name of the running program, shown in the parameter summary
    pub identity: String,
    pub broker: String,
    pub port: u16,
    pub client_id: String,
    pub username: Option<String>,
    #[serde(skip_serializing)]
    pub password: Option<String>,
    pub topic: String,
    /// Outbound message, already carrying its timestamp suffix
    pub message: Option<String>,
    pub qos: Qos,
    pub retain: bool,
    pub keep_alive_secs: u64,
    pub connect_timeout_secs: u64,
    /// Pause before polling the client again after a network error
    pub retry_interval_ms: u64,
}

impl ClientSettings {
    /// Parameter summary printed when connecting; the password is redacted
    pub fn summary(&self) -> String {
        let mut summary = format!("broker: {}:{}, cn: {}", self.broker, self.port, self.client_id);
        if let Some(message) = &self.message {
            summary.push_str(&format!(", msg: {message}"));
        }
        let password = if self.password.is_some() { "***" } else { "None" };
        summary.push_str(&format!(
            ", Psw: {password}, qos: {}, retain: {}, topic: {}, userName: {}",
            self.qos,
            self.retain,
            self.topic,
            self.username.as_deref().unwrap_or("None")
        ));
        summary
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.port == 0 {
            return Err(ConfigError::InvalidPort(self.port.to_string()));
        }
        if self.broker.trim().is_empty() {
            return Err(ConfigError::InvalidConfig("broker must not be empty".to_string()));
        }
        if self.topic.trim().is_empty() {
            return Err(ConfigError::InvalidConfig("topic must not be empty".to_string()));
        }
        Ok(())
    }
}

impl fmt::Display for ClientSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Running {} with the following parameters\n {}",
            self.identity,
            self.summary()
        )
    }
}

/// Explicitly supplied values; anything left `None` falls through to the next source
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SettingsOverrides {
    pub broker: Option<String>,
    pub port: Option<u16>,
    pub client_id: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub topic: Option<String>,
    pub message: Option<String>,
    pub qos: Option<Qos>,
    pub retain: Option<bool>,
    pub keep_alive_secs: Option<u64>,
    pub connect_timeout_secs: Option<u64>,
    pub retry_interval_ms: Option<u64>,
}

impl SettingsOverrides {
    /// Fill every unset field from `fallback`
    pub fn or(self, fallback: SettingsOverrides) -> SettingsOverrides {
        SettingsOverrides {
            broker: non_empty(self.broker).or(fallback.broker),
            port: self.port.or(fallback.port),
            client_id: non_empty(self.client_id).or(fallback.client_id),
            username: non_empty(self.username).or(fallback.username),
            password: non_empty(self.password).or(fallback.password),
            topic: non_empty(self.topic).or(fallback.topic),
            message: self.message.or(fallback.message),
            qos: self.qos.or(fallback.qos),
            retain: self.retain.or(fallback.retain),
            keep_alive_secs: self.keep_alive_secs.or(fallback.keep_alive_secs),
            connect_timeout_secs: self.connect_timeout_secs.or(fallback.connect_timeout_secs),
            retry_interval_ms: self.retry_interval_ms.or(fallback.retry_interval_ms),
        }
    }
}

/// TOML settings file layout
///
/// ```toml
/// [mqtt]
/// broker = "broker.local"
/// port = 1883
/// topic = "Test"
/// qos = 1
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SettingsFile {
    #[serde(default)]
    pub mqtt: SettingsOverrides,
}

impl SettingsFile {
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }
}

/// Per-program defaults that differ between the publisher and the subscriber
#[derive(Debug, Clone, PartialEq)]
pub struct ClientDefaults {
    pub client_id: String,
    pub message: Option<String>,
}

impl ClientDefaults {
    pub fn publisher() -> Self {
        Self {
            client_id: "Test_publishr".to_string(),
            message: Some("This is just a test #".to_string()),
        }
    }

    pub fn subscriber() -> Self {
        Self {
            client_id: "Test_Subscriber".to_string(),
            message: None,
        }
    }
}

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),
    #[error("Failed to parse TOML: {0}")]
    TomlParse(#[from] toml::de::Error),
    #[error("Invalid QoS level {0}: must be 0, 1 or 2")]
    InvalidQos(u8),
    #[error("Invalid port: {0}")]
    InvalidPort(String),
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Resolve settings against the process environment
pub fn resolve(
    identity: &str,
    overrides: SettingsOverrides,
    defaults: &ClientDefaults,
) -> Result<ClientSettings, ConfigError> {
    resolve_with(identity, overrides, defaults, |name| std::env::var(name).ok())
}

/// Resolve settings with an injected environment lookup
pub fn resolve_with<F>(
    identity: &str,
    overrides: SettingsOverrides,
    defaults: &ClientDefaults,
    env: F,
) -> Result<ClientSettings, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let env = |name: &str| non_empty(env(name));
    let stamp = clock::timestamp();

    let settings = ClientSettings {
        identity: identity.to_string(),
        broker: non_empty(overrides.broker)
            .or_else(|| env(ENV_BROKER))
            .unwrap_or_else(|| DEFAULT_BROKER.to_string()),
        port: overrides.port.unwrap_or(DEFAULT_PORT),
        client_id: non_empty(overrides.client_id).unwrap_or_else(|| defaults.client_id.clone()),
        username: non_empty(overrides.username).or_else(|| env(ENV_USERNAME)),
        password: non_empty(overrides.password).or_else(|| env(ENV_PASSWORD)),
        topic: non_empty(overrides.topic).unwrap_or_else(|| DEFAULT_TOPIC.to_string()),
        message: overrides
            .message
            .or_else(|| defaults.message.clone())
            .map(|message| clock::stamp_message(&message, &stamp)),
        qos: overrides.qos.unwrap_or_default(),
        retain: overrides.retain.unwrap_or(false),
        keep_alive_secs: overrides.keep_alive_secs.unwrap_or_else(default_keep_alive),
        connect_timeout_secs: overrides
            .connect_timeout_secs
            .unwrap_or_else(default_connect_timeout),
        retry_interval_ms: overrides
            .retry_interval_ms
            .unwrap_or_else(default_retry_interval),
    };

    settings.validate()?;
    Ok(settings)
}

/// Parse a port number; `None` for anything that is not a positive `u16`
pub fn parse_port(value: &str) -> Option<u16> {
    value.trim().parse::<u16>().ok().filter(|port| *port > 0)
}

/// Parse a QoS level; `None` unless the value is 0, 1 or 2
pub fn parse_qos(value: &str) -> Option<Qos> {
    value
        .trim()
        .parse::<u8>()
        .ok()
        .and_then(|level| Qos::try_from(level).ok())
}

/// Parse a retain flag from the usual true/false spellings
pub fn parse_retain(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "true" | "t" | "yes" | "y" | "1" => Some(true),
        "false" | "f" | "no" | "n" | "0" => Some(false),
        _ => None,
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}
