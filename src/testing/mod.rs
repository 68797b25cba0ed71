//! Testing utilities and mock implementations
//!
//! Mock transport halves for exercising the client assistant without an
//! MQTT broker.

pub mod mocks;

pub use mocks::*;
