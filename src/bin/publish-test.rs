//! MQTT publish test client
//!
//! Connects to a broker, publishes one message and exits.
//!
//! ## Usage
//!
//! ```bash
//! # Publish the default test message to topic "Test" on localhost
//! publish-test
//!
//! # Publish with QoS 1 as a retained message
//! publish-test -b broker.local -t sensors/temp -m "21.5" -q 1 -r true
//!
//! # Credentials from the environment
//! MQTTNAME=broker.local USERNAME=alice PSWVAL=secret publish-test -m ping
//! ```

use clap::error::ErrorKind;
use clap::{CommandFactory, Parser};
use mqtt_test_clients::assistant::ClientAssistant;
use mqtt_test_clients::cli::{publish_once, publisher_hooks, PublishArgs};
use mqtt_test_clients::config::ClientDefaults;
use mqtt_test_clients::observability::init_default_logging;
use mqtt_test_clients::signals::shutdown_signal;
use std::process;
use std::sync::Arc;
use tokio::sync::Notify;
use tracing::{error, info};

const IDENTITY: &str = "publish-test";

#[tokio::main]
async fn main() {
    let args = PublishArgs::parse();

    init_default_logging();

    if args.has_empty_message() {
        PublishArgs::command()
            .error(ErrorKind::InvalidValue, "a non-empty --message is required")
            .exit();
    }

    let settings = match args
        .connection
        .resolve(IDENTITY, &ClientDefaults::publisher())
    {
        Ok(settings) => settings,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            eprintln!("Error: {e}");
            process::exit(1);
        }
    };

    // Released by the on-publish hook once the message has left or been acknowledged
    let confirmed = Arc::new(Notify::new());
    let mut assistant = ClientAssistant::new(settings, publisher_hooks(confirmed.clone()));

    let outcome = tokio::select! {
        result = publish_once(&mut assistant, &confirmed) => result,
        signal = shutdown_signal() => {
            match signal {
                Ok(signal) => info!("Received {}, stopping", signal),
                Err(e) => error!("Signal handler failed: {}", e),
            }
            Ok(())
        }
    };

    assistant.terminate().await;

    if let Err(e) = outcome {
        eprintln!("Error: {e}");
        process::exit(1);
    }
    process::exit(0);
}
