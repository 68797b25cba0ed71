//! Pure option building for the rumqttc client
//!
//! Turns resolved [`ClientSettings`] into [`MqttOptions`]: credentials,
//! keep alive and the last will message.

use crate::config::ClientSettings;
use rumqttc::{LastWill, MqttOptions};
use std::time::Duration;

/// Shortest keep alive rumqttc accepts
const MIN_KEEP_ALIVE_SECS: u64 = 5;

/// Build the rumqttc options for a resolved configuration
pub fn configure_mqtt_options(settings: &ClientSettings) -> MqttOptions {
    let mut mqtt_options = MqttOptions::new(
        settings.client_id.clone(),
        settings.broker.clone(),
        settings.port,
    );

    mqtt_options.set_keep_alive(Duration::from_secs(
        settings.keep_alive_secs.max(MIN_KEEP_ALIVE_SECS),
    ));
    mqtt_options.set_clean_session(true);

    // Password alone is never sent; MQTT 3.1.1 requires a user name with it
    if let Some(username) = &settings.username {
        let password = settings.password.clone().unwrap_or_default();
        mqtt_options.set_credentials(username.clone(), password);
    }

    if let Some(will) = build_last_will(settings) {
        mqtt_options.set_last_will(will);
    }

    mqtt_options
}

/// Last will published by the broker if this client drops unexpectedly
pub fn build_last_will(settings: &ClientSettings) -> Option<LastWill> {
    settings.message.as_ref().map(|message| {
        LastWill::new(
            settings.topic.clone(),
            message.clone().into_bytes(),
            settings.qos.into(),
            settings.retain,
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{resolve_with, ClientDefaults, Qos, SettingsOverrides};

    fn settings(overrides: SettingsOverrides) -> ClientSettings {
        resolve_with("test", overrides, &ClientDefaults::subscriber(), |_| None).unwrap()
    }

    #[test]
    fn test_options_carry_broker_and_client_id() {
        let options = configure_mqtt_options(&settings(SettingsOverrides {
            broker: Some("broker.local".to_string()),
            port: Some(1884),
            client_id: Some("tester".to_string()),
            ..Default::default()
        }));

        assert_eq!(options.broker_address(), ("broker.local".to_string(), 1884));
        assert_eq!(options.client_id(), "tester");
        assert!(options.clean_session());
    }

    #[test]
    fn test_credentials_set_only_with_username() {
        let options = configure_mqtt_options(&settings(SettingsOverrides {
            password: Some("secret".to_string()),
            ..Default::default()
        }));
        assert!(options.credentials().is_none());

        let options = configure_mqtt_options(&settings(SettingsOverrides {
            username: Some("alice".to_string()),
            password: Some("secret".to_string()),
            ..Default::default()
        }));
        assert_eq!(
            options.credentials(),
            Some(("alice".to_string(), "secret".to_string()))
        );
    }

    #[test]
    fn test_keep_alive_is_clamped() {
        let options = configure_mqtt_options(&settings(SettingsOverrides {
            keep_alive_secs: Some(1),
            ..Default::default()
        }));
        assert_eq!(options.keep_alive(), Duration::from_secs(5));
    }

    #[test]
    fn test_last_will_follows_message() {
        let without_message = settings(SettingsOverrides::default());
        assert!(build_last_will(&without_message).is_none());

        let with_message = settings(SettingsOverrides {
            message: Some("bye".to_string()),
            topic: Some("status".to_string()),
            qos: Some(Qos::AtLeastOnce),
            retain: Some(true),
            ..Default::default()
        });
        let will = build_last_will(&with_message).unwrap();
        assert_eq!(will.topic, "status");
        assert!(String::from_utf8_lossy(&will.message).starts_with("bye ("));
        assert_eq!(will.qos, rumqttc::QoS::AtLeastOnce);
        assert!(will.retain);
    }
}
