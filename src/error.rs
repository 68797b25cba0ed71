//! Error types for the MQTT test clients
//!
//! `ConnectionError` describes one of the six MQTT 3.1.1 CONNACK return codes.
//! `AssistantError` is the crate-wide error returned by the client assistant.

use crate::config::ConfigError;
use crate::transport::LinkError;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// CONNACK return codes defined by MQTT 3.1.1
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ConnackCode {
    Accepted = 0,
    UnacceptableProtocolVersion = 1,
    IdentifierRejected = 2,
    ServerUnavailable = 3,
    BadUsernameOrPassword = 4,
    NotAuthorized = 5,
}

const CONNACK_DESCRIPTIONS: [&str; 6] = [
    "Connection successful",
    "Connection refused – incorrect protocol version",
    "Connection refused – invalid client identifier",
    "Connection refused – server unavailable",
    "Connection refused – bad username or password",
    "Connection refused – not authorised",
];

impl ConnackCode {
    /// Fixed human-readable description for this code
    pub fn description(self) -> &'static str {
        CONNACK_DESCRIPTIONS[self as usize]
    }

    pub fn as_u8(self) -> u8 {
        self as u8
    }

    pub fn is_success(self) -> bool {
        self == ConnackCode::Accepted
    }
}

impl TryFrom<u8> for ConnackCode {
    type Error = AssistantError;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        match code {
            0 => Ok(ConnackCode::Accepted),
            1 => Ok(ConnackCode::UnacceptableProtocolVersion),
            2 => Ok(ConnackCode::IdentifierRejected),
            3 => Ok(ConnackCode::ServerUnavailable),
            4 => Ok(ConnackCode::BadUsernameOrPassword),
            5 => Ok(ConnackCode::NotAuthorized),
            other => Err(AssistantError::UnknownReturnCode(other)),
        }
    }
}

impl From<rumqttc::ConnectReturnCode> for ConnackCode {
    fn from(code: rumqttc::ConnectReturnCode) -> Self {
        use rumqttc::ConnectReturnCode as Rc;
        match code {
            Rc::Success => ConnackCode::Accepted,
            Rc::RefusedProtocolVersion => ConnackCode::UnacceptableProtocolVersion,
            Rc::BadClientId => ConnackCode::IdentifierRejected,
            Rc::ServiceUnavailable => ConnackCode::ServerUnavailable,
            Rc::BadUserNamePassword => ConnackCode::BadUsernameOrPassword,
            Rc::NotAuthorized => ConnackCode::NotAuthorized,
        }
    }
}

impl fmt::Display for ConnackCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_u8())
    }
}

/// Raised when the broker refuses a connection or a publish cannot be accepted
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ConnectionError {
    code: ConnackCode,
    message: String,
}

impl ConnectionError {
    /// Create an error whose message comes from the CONNACK table
    pub fn new(code: ConnackCode) -> Self {
        Self {
            code,
            message: code.description().to_string(),
        }
    }

    /// Create an error with a custom message overriding the table lookup
    pub fn with_message<S: Into<String>>(code: ConnackCode, message: S) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    /// Create an error from a raw return code
    ///
    /// Codes outside 0..=5 are reported as [`AssistantError::UnknownReturnCode`].
    pub fn from_code(code: u8) -> Result<Self, AssistantError> {
        ConnackCode::try_from(code).map(Self::new)
    }

    pub fn code(&self) -> ConnackCode {
        self.code
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Main error type for client assistant operations
#[derive(Debug, Error)]
pub enum AssistantError {
    #[error("{0}")]
    Connection(#[from] ConnectionError),

    #[error("Unknown MQTT return code: {0}")]
    UnknownReturnCode(u8),

    #[error("MQTT client error: {0}")]
    Link(#[from] LinkError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("No CONNACK received within {0:?}")]
    ConnectTimeout(Duration),

    #[error("Event loop is not running")]
    NotStarted,
}

impl AssistantError {
    /// Build the error for a nonzero return code, mapping unknown codes explicitly
    pub fn from_return_code(code: u8) -> Self {
        match ConnectionError::from_code(code) {
            Ok(err) => AssistantError::Connection(err),
            Err(err) => err,
        }
    }

    /// The CONNACK code carried by this error, if any
    pub fn connack_code(&self) -> Option<ConnackCode> {
        match self {
            AssistantError::Connection(err) => Some(err.code()),
            _ => None,
        }
    }
}

/// Result type for client assistant operations
pub type AssistantResult<T> = Result<T, AssistantError>;
