//! rumqttc implementation of the transport seams
//!
//! - `connection`: option building (credentials, keep alive, last will)
//! - `message_handler`: event translation
//! - `client`: the request and event halves used by the assistant
//!
//! ```rust,no_run
//! use mqtt_test_clients::config::{resolve, ClientDefaults, Qos, SettingsOverrides};
//! use mqtt_test_clients::transport::mqtt::create_connection;
//! use mqtt_test_clients::transport::{EventSource, LinkEvent, MqttLink};
//!
//! # tokio_test::block_on(async {
//! let settings = resolve("watch", SettingsOverrides::default(), &ClientDefaults::subscriber())?;
//! let (link, mut events) = create_connection(&settings);
//!
//! link.subscribe("Test", Qos::AtMostOnce)?;
//! while let Ok(event) = events.next_event().await {
//!     if let LinkEvent::Message { topic, payload, .. } = event {
//!         println!("{topic}: {payload:?}");
//!     }
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! # }).unwrap();
//! ```

pub mod client;
pub mod connection;
pub mod message_handler;

pub use client::{create_connection, RumqttEvents, RumqttLink};
pub use connection::{build_last_will, configure_mqtt_options};
pub use message_handler::MessageHandler;
