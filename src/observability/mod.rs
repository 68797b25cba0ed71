//! Observability for the MQTT test clients
//!
//! Structured diagnostic logging; console status output is printed separately.

pub mod logging;

pub use logging::{init_default_logging, init_logging, parse_level, LogFormat};

// Span macro for structured logging
pub use logging::mqtt_span;
