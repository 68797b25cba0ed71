//! MQTT subscribe test client
//!
//! Subscribes to a topic on connect and prints every message received until
//! interrupted with Ctrl-C.
//!
//! ## Usage
//!
//! ```bash
//! # Watch topic "Test" on localhost
//! subscribe-test
//!
//! # Watch a wildcard topic with QoS 1, no progress dots
//! subscribe-test -b broker.local -t 'sensors/#' -q 1 -w 0
//! ```

use clap::Parser;
use mqtt_test_clients::assistant::ClientAssistant;
use mqtt_test_clients::cli::{subscriber_hooks, SubscribeArgs};
use mqtt_test_clients::config::ClientDefaults;
use mqtt_test_clients::observability::init_default_logging;
use mqtt_test_clients::signals::shutdown_signal;
use std::io::Write;
use std::process;
use std::time::Duration;
use tracing::{error, info};

const IDENTITY: &str = "subscribe-test";

/// Progress dots printed per line
const DOTS_PER_LINE: u32 = 60;

#[tokio::main]
async fn main() {
    let args = SubscribeArgs::parse();

    init_default_logging();

    let settings = match args
        .connection
        .resolve(IDENTITY, &ClientDefaults::subscriber())
    {
        Ok(settings) => settings,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            eprintln!("Error: {e}");
            process::exit(1);
        }
    };
    let wait_interval = args.wait_interval();

    let mut assistant = ClientAssistant::new(settings, subscriber_hooks());

    let outcome = match assistant.run_loop() {
        Ok(()) => tokio::select! {
            result = assistant.wait_for_exit() => result,
            signal = shutdown_signal() => {
                match signal {
                    Ok(signal) => info!("Received {}, stopping", signal),
                    Err(e) => error!("Signal handler failed: {}", e),
                }
                Ok(())
            }
            _ = print_progress(wait_interval) => Ok(()),
        },
        Err(e) => Err(e),
    };

    // A connection error ends the session like an interrupt does
    if let Err(e) = outcome {
        error!("Event loop stopped: {}", e);
        eprintln!("Error: {e}");
    }

    assistant.terminate().await;
    process::exit(0);
}

/// Print a dot every interval, forever; a zero interval prints nothing
async fn print_progress(interval: Duration) {
    if interval.is_zero() {
        return std::future::pending().await;
    }

    let mut ticker = tokio::time::interval(interval);
    ticker.tick().await;
    let mut dots = 0;
    loop {
        ticker.tick().await;
        let mut stdout = std::io::stdout().lock();
        let _ = stdout.write_all(b".");
        dots += 1;
        if dots == DOTS_PER_LINE {
            let _ = stdout.write_all(b"\n");
            dots = 0;
        }
        let _ = stdout.flush();
    }
}
