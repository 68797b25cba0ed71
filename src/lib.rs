//! MQTT Test Clients
//!
//! Publisher and subscriber utilities for exercising an MQTT broker, built on
//! a small client assistant around [rumqttc](https://docs.rs/rumqttc).
//!
//! # Overview
//!
//! - [`config`] resolves connection settings once at startup
//! - [`assistant::ClientAssistant`] owns one client session and dispatches
//!   its callbacks to injectable [`assistant::Hooks`]
//! - [`error::ConnectionError`] describes MQTT 3.1.1 CONNACK refusals
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use mqtt_test_clients::assistant::{ClientAssistant, Hooks};
//! use mqtt_test_clients::config::{self, ClientDefaults, SettingsOverrides};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let overrides = SettingsOverrides {
//!     topic: Some("Test".to_string()),
//!     message: Some("ping".to_string()),
//!     ..Default::default()
//! };
//! let settings = config::resolve("example", overrides, &ClientDefaults::publisher())?;
//!
//! let hooks = Hooks::default().on_publish(|_, pkid| println!("published {pkid}"));
//! let mut assistant = ClientAssistant::new(settings, hooks);
//!
//! assistant.publish(None).await?;
//! assistant.terminate().await;
//! # Ok(())
//! # }
//! ```

pub mod assistant;
pub mod cli;
pub mod clock;
pub mod config;
pub mod error;
pub mod observability;
pub mod signals;
pub mod testing;
pub mod transport;

pub use assistant::{ClientAssistant, Hooks, MessageRecord};
pub use config::{ClientSettings, Qos, SettingsOverrides};
pub use error::{AssistantError, AssistantResult, ConnackCode, ConnectionError};
pub use transport::{LinkEvent, MqttLink, PublishReceipt};
