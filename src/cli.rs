//! Command-line surface shared by `publish-test` and `subscribe-test`
//!
//! Numeric and boolean options are accepted as text and parsed leniently:
//! a value that does not parse falls back to its default with a warning.
//! Malformed option syntax is still a clap usage error (exit status 2).
//!
//! The hook sets and the one-shot publish flow of both programs live here too.

use crate::config::{
    self, parse_port, parse_qos, parse_retain, ClientDefaults, ClientSettings, ConfigError,
    SettingsFile, SettingsOverrides,
};
use crate::assistant::hooks::print_connected;
use crate::assistant::{ClientAssistant, Hooks};
use crate::error::AssistantResult;
use crate::transport::{EventSource, MqttLink};
use clap::{Args, Parser};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tracing::{error, info, warn};

/// Default pause between progress dots
pub const DEFAULT_WAIT_TIME: Duration = Duration::from_secs(1);

/// Connection options common to both test clients
#[derive(Debug, Clone, Default, Args)]
pub struct ConnectionArgs {
    /// The address on the network for the broker (default: $MQTTNAME, then localhost)
    #[arg(short = 'b', long)]
    pub broker: Option<String>,

    /// Name to use for this client
    #[arg(short = 'c', long = "client", value_name = "CLIENT_ID")]
    pub client_id: Option<String>,

    /// The payload to publish; also used as the last will message
    #[arg(short = 'm', long)]
    pub message: Option<String>,

    /// The port number of the broker (default: 1883)
    #[arg(short = 'o', long)]
    pub port: Option<String>,

    /// The password to use for the broker (default: $PSWVAL)
    #[arg(short = 'p', long)]
    pub password: Option<String>,

    /// The quality of service: 0, 1 or 2 (default: 0)
    #[arg(short = 'q', long)]
    pub qos: Option<String>,

    /// If true, the broker keeps the message as the topic's last known good value
    #[arg(short = 'r', long)]
    pub retain: Option<String>,

    /// Topic to publish on or monitor (default: Test)
    #[arg(short = 't', long)]
    pub topic: Option<String>,

    /// User name for the broker (default: $USERNAME)
    #[arg(short = 'u', long)]
    pub username: Option<String>,

    /// Optional TOML file with an [mqtt] table of the same settings
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,
}

impl ConnectionArgs {
    /// Explicit values from the command line, invalid numbers dropped with a warning
    pub fn to_overrides(&self) -> SettingsOverrides {
        SettingsOverrides {
            broker: self.broker.clone(),
            port: lenient("port", self.port.as_deref(), parse_port),
            client_id: self.client_id.clone(),
            username: self.username.clone(),
            password: self.password.clone(),
            topic: self.topic.clone(),
            message: self.message.clone(),
            qos: lenient("qos", self.qos.as_deref(), parse_qos),
            retain: lenient("retain", self.retain.as_deref(), parse_retain),
            ..Default::default()
        }
    }

    /// Command-line values layered over the config file, if one was given
    pub fn load_overrides(&self) -> Result<SettingsOverrides, ConfigError> {
        let overrides = self.to_overrides();
        match &self.config {
            Some(path) => {
                info!("Loading configuration from: {}", path.display());
                let file = SettingsFile::load_from_file(path)?;
                Ok(overrides.or(file.mqtt))
            }
            None => Ok(overrides),
        }
    }

    /// Run the one-time resolution step against the process environment
    pub fn resolve(
        &self,
        identity: &str,
        defaults: &ClientDefaults,
    ) -> Result<ClientSettings, ConfigError> {
        config::resolve(identity, self.load_overrides()?, defaults)
    }
}

fn lenient<T>(name: &str, value: Option<&str>, parse: fn(&str) -> Option<T>) -> Option<T> {
    let raw = value?;
    let parsed = parse(raw);
    if parsed.is_none() {
        warn!("Ignoring invalid {} value {:?}, using default", name, raw);
    }
    parsed
}

/// Publish one message to an MQTT broker
#[derive(Debug, Parser)]
#[command(name = "publish-test")]
#[command(about = "Test an MQTT broker's publish function")]
#[command(version)]
pub struct PublishArgs {
    #[command(flatten)]
    pub connection: ConnectionArgs,
}

impl PublishArgs {
    /// The publisher refuses an explicitly empty message
    pub fn has_empty_message(&self) -> bool {
        self.connection
            .message
            .as_deref()
            .is_some_and(|message| message.trim().is_empty())
    }
}

/// Subscribe to a topic and print every message received
#[derive(Debug, Parser)]
#[command(name = "subscribe-test")]
#[command(about = "Test an MQTT broker's subscribe function")]
#[command(version)]
pub struct SubscribeArgs {
    #[command(flatten)]
    pub connection: ConnectionArgs,

    /// Seconds between progress dots; 0 disables them (default: 1)
    #[arg(short = 'w', long, value_name = "SECONDS")]
    pub wait_time: Option<String>,
}

impl SubscribeArgs {
    pub fn wait_interval(&self) -> Duration {
        lenient("wait-time", self.wait_time.as_deref(), parse_wait_time)
            .unwrap_or(DEFAULT_WAIT_TIME)
    }
}

/// Parse a non-negative number of seconds, fractions allowed
pub fn parse_wait_time(value: &str) -> Option<Duration> {
    let secs = value.trim().parse::<f64>().ok()?;
    if secs.is_finite() && secs >= 0.0 {
        Some(Duration::from_secs_f64(secs))
    } else {
        None
    }
}

/// Hooks for `publish-test`: announce each completed publish and release `confirmed`
pub fn publisher_hooks(confirmed: Arc<Notify>) -> Hooks {
    Hooks::default().on_publish(move |_, pkid| {
        println!("Message published successfully (mid {pkid})");
        confirmed.notify_one();
    })
}

/// Hooks for `subscribe-test`
///
/// Subscribing on every CONNACK restores the subscription after a reconnect.
/// A failed subscribe is logged and the session stays up.
pub fn subscriber_hooks() -> Hooks {
    Hooks::default().on_connect(|ctx, info| {
        let topic = ctx.settings.topic.trim();
        if let Err(e) = ctx.link.subscribe(topic, ctx.settings.qos) {
            error!("Failed to subscribe to {}: {}", topic, e);
        }
        print_connected(info);
    })
}

/// Connect, publish the configured message and wait for the publish hook
///
/// A missing confirmation within the connect timeout is only a warning.
pub async fn publish_once<L, E>(
    assistant: &mut ClientAssistant<L, E>,
    confirmed: &Notify,
) -> AssistantResult<()>
where
    L: MqttLink + 'static,
    E: EventSource + 'static,
{
    assistant.connect().await?;

    let settings = assistant.settings();
    println!(
        "Publishing on topic {} message: {}",
        settings.topic,
        settings.message.as_deref().unwrap_or_default()
    );
    let wait = Duration::from_secs(settings.connect_timeout_secs);

    let receipt = assistant.publish(None).await?;
    info!(topic = %receipt.topic, qos = %receipt.qos, "Message handed to client");

    if tokio::time::timeout(wait, confirmed.notified()).await.is_err() {
        warn!("No publish confirmation within {:?}", wait);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Qos;

    #[test]
    fn test_short_flags_map_to_fields() {
        let args = PublishArgs::try_parse_from([
            "publish-test", "-b", "broker.local", "-c", "pub-1", "-m", "ping", "-o", "1884", "-p",
            "secret", "-q", "1", "-r", "true", "-t", "sensors", "-u", "alice",
        ])
        .unwrap();

        let overrides = args.connection.to_overrides();
        assert_eq!(overrides.broker.as_deref(), Some("broker.local"));
        assert_eq!(overrides.client_id.as_deref(), Some("pub-1"));
        assert_eq!(overrides.message.as_deref(), Some("ping"));
        assert_eq!(overrides.port, Some(1884));
        assert_eq!(overrides.password.as_deref(), Some("secret"));
        assert_eq!(overrides.qos, Some(Qos::AtLeastOnce));
        assert_eq!(overrides.retain, Some(true));
        assert_eq!(overrides.topic.as_deref(), Some("sensors"));
        assert_eq!(overrides.username.as_deref(), Some("alice"));
    }

    #[test]
    fn test_invalid_values_fall_back() {
        let args =
            PublishArgs::try_parse_from(["publish-test", "--port", "abc", "--qos", "7"]).unwrap();

        let overrides = args.connection.to_overrides();
        assert_eq!(overrides.port, None);
        assert_eq!(overrides.qos, None);
    }

    #[test]
    fn test_empty_message_detected() {
        let args = PublishArgs::try_parse_from(["publish-test", "-m", ""]).unwrap();
        assert!(args.has_empty_message());

        let args = PublishArgs::try_parse_from(["publish-test"]).unwrap();
        assert!(!args.has_empty_message());
    }

    #[test]
    fn test_wait_time_parsing() {
        assert_eq!(parse_wait_time("2"), Some(Duration::from_secs(2)));
        assert_eq!(parse_wait_time("0.5"), Some(Duration::from_millis(500)));
        assert_eq!(parse_wait_time("0"), Some(Duration::ZERO));
        assert_eq!(parse_wait_time("-1"), None);
        assert_eq!(parse_wait_time("soon"), None);

        let args = SubscribeArgs::try_parse_from(["subscribe-test", "-w", "bogus"]).unwrap();
        assert_eq!(args.wait_interval(), DEFAULT_WAIT_TIME);
    }
}
