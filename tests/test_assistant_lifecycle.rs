//! Lifecycle tests for the client assistant
//!
//! Covers connect, publish, run loop, callback dispatch and terminate
//! against the in-memory mock session.


use mqtt_test_clients::assistant::{Hooks, MessageRecord, SessionState};
use mqtt_test_clients::cli::{publish_once, publisher_hooks, subscriber_hooks};
use mqtt_test_clients::config::{Qos, SettingsOverrides};
use mqtt_test_clients::error::{AssistantError, ConnackCode};
use mqtt_test_clients::transport::LinkEvent;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use test_helpers::{
    failing_assistant, mock_assistant, test_settings, test_settings_with, wait_until,
};
use tokio::sync::Notify;

#[tokio::test]
async fn test_connect_waits_for_connack() {
    let (mut assistant, _link, feed) = mock_assistant(test_settings(), Hooks::default());
    feed.connack(0);

    let result = assistant.connect().await;

    assert!(result.is_ok(), "Connect should succeed on CONNACK 0");
    assert!(assistant.is_connected());
    assert_eq!(assistant.session_state(), SessionState::Accepted);
    assert!(assistant.is_loop_running());
}

#[tokio::test]
async fn test_connect_refused_returns_connection_error() {
    let (mut assistant, _link, feed) = mock_assistant(test_settings(), Hooks::default());
    feed.connack(4);

    let err = assistant.connect().await.unwrap_err();

    assert_eq!(err.connack_code(), Some(ConnackCode::BadUsernameOrPassword));
    assert_eq!(err.to_string(), "Connection refused – bad username or password");
    assert!(!assistant.is_connected());
}

#[tokio::test]
async fn test_connect_times_out_without_connack() {
    let settings = test_settings_with(SettingsOverrides {
        connect_timeout_secs: Some(0),
        ..Default::default()
    });
    let (mut assistant, _link, _feed) = mock_assistant(settings, Hooks::default());

    let err = assistant.connect().await.unwrap_err();
    assert!(matches!(err, AssistantError::ConnectTimeout(_)));
}

#[tokio::test]
async fn test_connect_reports_network_failure() {
    let (mut assistant, _link, feed) = mock_assistant(test_settings(), Hooks::default());
    feed.network_error("connection refused");

    let err = assistant.connect().await.unwrap_err();
    assert!(matches!(err, AssistantError::Link(_)));
    assert!(err.to_string().contains("connection refused"));
}

#[tokio::test]
async fn test_publish_connects_first_and_uses_settings() {
    let settings = test_settings_with(SettingsOverrides {
        topic: Some("Test".to_string()),
        message: Some("ping".to_string()),
        qos: Some(Qos::AtLeastOnce),
        retain: Some(true),
        ..Default::default()
    });
    let (mut assistant, link, feed) = mock_assistant(settings, Hooks::default());
    feed.connack(0);

    let receipt = assistant.publish(None).await.unwrap();

    assert!(assistant.is_connected());
    assert!(receipt.is_success());
    let published = link.get_published();
    assert_eq!(published.len(), 1);
    let (topic, payload, qos, retain) = &published[0];
    assert_eq!(topic, "Test");
    assert!(String::from_utf8_lossy(payload).starts_with("ping ("));
    assert_eq!(*qos, Qos::AtLeastOnce);
    assert!(*retain);
}

#[tokio::test]
async fn test_publish_override_message() {
    let (mut assistant, link, feed) = mock_assistant(test_settings(), Hooks::default());
    feed.connack(0);

    assistant.publish(Some("override")).await.unwrap();

    assert_eq!(link.get_published()[0].1, b"override".to_vec());
}

#[tokio::test]
async fn test_publish_nonzero_rc_raises_connection_error() {
    let (mut assistant, link, feed) = mock_assistant(test_settings(), Hooks::default());
    feed.connack(0);
    link.set_publish_rc(3);

    let result = assistant.publish(None).await;

    match result {
        Err(AssistantError::Connection(err)) => {
            assert_eq!(err.code(), ConnackCode::ServerUnavailable);
        }
        other => panic!("Expected connection error, got {other:?}"),
    }
    assert!(link.get_published().is_empty());
}

#[tokio::test]
async fn test_publish_unknown_rc_is_explicit() {
    let (mut assistant, link, feed) = mock_assistant(test_settings(), Hooks::default());
    feed.connack(0);
    link.set_publish_rc(14);

    let result = assistant.publish(None).await;
    assert!(matches!(result, Err(AssistantError::UnknownReturnCode(14))));
}

#[tokio::test]
async fn test_run_loop_is_idempotent() {
    let (mut assistant, _link, _feed) = mock_assistant(test_settings(), Hooks::default());

    assistant.run_loop().unwrap();
    assert!(assistant.is_connected(), "Run loop connects asynchronously");
    assert!(assistant.is_loop_running());

    assert!(assistant.run_loop().is_ok());
    assert!(assistant.is_loop_running());

    assistant.terminate().await;
}

#[tokio::test]
async fn test_terminate_disconnects_once_and_stops_loop() {
    let disconnects = Arc::new(Mutex::new(Vec::new()));
    let sink = disconnects.clone();
    let hooks = Hooks::default().on_disconnect(move |_, info| {
        sink.lock().unwrap().push(info.reason.clone());
    });
    let (mut assistant, link, feed) = mock_assistant(test_settings(), hooks);
    feed.connack(0);
    assistant.connect().await.unwrap();

    assistant.terminate().await;

    assert_eq!(link.disconnect_count(), 1);
    assert!(!assistant.is_connected());
    assert!(!assistant.is_loop_running());
    assert_eq!(assistant.session_state(), SessionState::Closed);
    assert_eq!(*disconnects.lock().unwrap(), vec!["client disconnected".to_string()]);
}

#[tokio::test]
async fn test_terminate_without_connect_skips_disconnect() {
    let (mut assistant, link, _feed) = mock_assistant(test_settings(), Hooks::default());

    assistant.terminate().await;

    assert_eq!(link.disconnect_count(), 0);
}

#[test]
fn test_three_messages_count_to_three() {
    let records: Arc<Mutex<Vec<(u64, MessageRecord)>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = records.clone();
    let hooks = Hooks::default().on_message(move |_, count, record| {
        sink.lock().unwrap().push((count, record.clone()));
    });
    let (assistant, _link, _feed) = mock_assistant(test_settings(), hooks);

    for (topic, payload) in [("a", "one"), ("b", "two"), ("c", "three")] {
        assistant
            .dispatch(LinkEvent::Message {
                topic: topic.to_string(),
                payload: payload.as_bytes().to_vec().into(),
                qos: Qos::AtMostOnce,
                retain: false,
            })
            .unwrap();
    }

    assert_eq!(assistant.messages_received(), 3);
    let records = records.lock().unwrap();
    let seen: Vec<(u64, &str, &str)> = records
        .iter()
        .map(|(n, r)| (*n, r.topic.as_str(), r.message.as_str()))
        .collect();
    assert_eq!(seen, vec![(1, "a", "one"), (2, "b", "two"), (3, "c", "three")]);
}

#[tokio::test]
async fn test_nonzero_connack_ends_loop_with_error() {
    let connects = Arc::new(Mutex::new(0));
    let sink = connects.clone();
    let hooks = Hooks::default().on_connect(move |_, _| *sink.lock().unwrap() += 1);
    let (mut assistant, _link, feed) = mock_assistant(test_settings(), hooks);

    assistant.run_loop().unwrap();
    feed.connack(5);

    let err = assistant.wait_for_exit().await.unwrap_err();
    assert_eq!(err.connack_code(), Some(ConnackCode::NotAuthorized));
    assert_eq!(*connects.lock().unwrap(), 0, "Hook must not run on refusal");
    assert_eq!(assistant.session_state(), SessionState::Refused(5));
}

#[tokio::test]
async fn test_network_error_dispatches_disconnect_and_keeps_running() {
    let reasons = Arc::new(Mutex::new(Vec::new()));
    let sink = reasons.clone();
    let hooks = Hooks::default().on_disconnect(move |_, info| {
        sink.lock().unwrap().push(info.reason.clone());
    });
    let (mut assistant, _link, feed) = mock_assistant(test_settings(), hooks);

    assistant.run_loop().unwrap();
    feed.connack(0);
    feed.network_error("connection reset");
    feed.connack(0);
    feed.message("Test", "after reconnect");

    assert!(wait_until(|| assistant.messages_received() == 1).await);
    assert!(assistant.is_loop_running());
    assert_eq!(reasons.lock().unwrap().len(), 1);
    assert!(reasons.lock().unwrap()[0].contains("connection reset"));
    assert_eq!(assistant.session_state(), SessionState::Accepted);

    assistant.terminate().await;
}

#[tokio::test]
async fn test_publish_hook_fires_from_loop() {
    let confirmed = Arc::new(Mutex::new(Vec::new()));
    let sink = confirmed.clone();
    let hooks = Hooks::default().on_publish(move |_, pkid| sink.lock().unwrap().push(pkid));
    let (mut assistant, _link, feed) = mock_assistant(test_settings(), hooks);
    feed.connack(0);

    assistant.publish(Some("ping")).await.unwrap();
    feed.published(0);

    assert!(wait_until(|| confirmed.lock().unwrap().as_slice() == [0]).await);
    assistant.terminate().await;
}

#[tokio::test]
async fn test_subscriber_hooks_subscribe_once_per_connack() {
    let records = Arc::new(Mutex::new(Vec::new()));
    let sink = records.clone();
    let hooks = subscriber_hooks().on_message(move |_, count, record| {
        sink.lock().unwrap().push((count, record.clone()));
    });
    let settings = test_settings_with(SettingsOverrides {
        topic: Some(" Test ".to_string()),
        ..Default::default()
    });
    let (mut assistant, link, feed) = mock_assistant(settings, hooks);

    assistant.run_loop().unwrap();
    feed.connack(0);
    feed.message("Test", "hello");

    assert!(wait_until(|| assistant.messages_received() == 1).await);
    assert_eq!(link.get_subscriptions(), vec![("Test".to_string(), Qos::AtMostOnce)]);
    {
        let records = records.lock().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].0, 1);
        assert_eq!(records[0].1.topic, "Test");
        assert_eq!(records[0].1.message, "hello");
    }

    feed.network_error("connection reset");
    feed.connack(0);
    assert!(wait_until(|| link.get_subscriptions().len() == 2).await);

    assistant.terminate().await;
}

#[tokio::test]
async fn test_publisher_flow_waits_for_confirmation() {
    let confirmed = Arc::new(Notify::new());
    let (mut assistant, link, feed) =
        mock_assistant(test_settings(), publisher_hooks(confirmed.clone()));
    feed.connack(0);
    feed.published(0);

    let result = tokio::time::timeout(
        Duration::from_secs(1),
        publish_once(&mut assistant, &confirmed),
    )
    .await;

    assert!(matches!(result, Ok(Ok(()))));
    let published = link.get_published();
    assert_eq!(published.len(), 1);
    assert_eq!(published[0].0, "Test");
    assert!(String::from_utf8_lossy(&published[0].1).starts_with("This is just a test # ("));

    assistant.terminate().await;
    assert_eq!(link.disconnect_count(), 1);
}

#[tokio::test]
async fn test_publisher_flow_reports_refusal() {
    let confirmed = Arc::new(Notify::new());
    let (mut assistant, link, feed) =
        mock_assistant(test_settings(), publisher_hooks(confirmed.clone()));
    feed.connack(5);

    let err = publish_once(&mut assistant, &confirmed).await.unwrap_err();

    assert_eq!(err.connack_code(), Some(ConnackCode::NotAuthorized));
    assert!(link.get_published().is_empty());
}

#[tokio::test]
async fn test_subscribe_failure_keeps_session_up() {
    let (mut assistant, feed) = failing_assistant(test_settings(), subscriber_hooks());

    assistant.run_loop().unwrap();
    feed.connack(0);
    feed.message("Test", "hello");

    assert!(wait_until(|| assistant.messages_received() == 1).await);
    assert_eq!(assistant.session_state(), SessionState::Accepted);
    assert!(assistant.is_loop_running());

    assistant.terminate().await;
}

#[tokio::test]
async fn test_publish_link_failure_is_link_error() {
    let (mut assistant, feed) = failing_assistant(test_settings(), Hooks::default());
    feed.connack(0);

    let err = assistant.publish(None).await.unwrap_err();

    assert!(matches!(err, AssistantError::Link(_)));
    assert!(err.to_string().contains("Mock publish failure"));
    assistant.terminate().await;
}

#[tokio::test]
async fn test_terminate_stops_loop_when_disconnect_fails() {
    let (mut assistant, feed) = failing_assistant(test_settings(), Hooks::default());
    feed.connack(0);
    assistant.connect().await.unwrap();

    assistant.terminate().await;

    assert!(!assistant.is_connected());
    assert!(!assistant.is_loop_running());
}

#[tokio::test]
async fn test_terminate_after_loop_ended_skips_disconnect() {
    let (mut assistant, link, feed) = mock_assistant(test_settings(), Hooks::default());

    assistant.run_loop().unwrap();
    feed.connack(5);
    assert!(wait_until(|| !assistant.is_loop_running()).await);

    assistant.terminate().await;

    assert_eq!(link.disconnect_count(), 0);
    assert!(!assistant.is_connected());
}

#[tokio::test]
async fn test_broker_disconnect_then_network_error_notifies_once() {
    let reasons = Arc::new(Mutex::new(Vec::new()));
    let sink = reasons.clone();
    let hooks = Hooks::default().on_disconnect(move |_, info| {
        sink.lock().unwrap().push(info.reason.clone());
    });
    let (mut assistant, _link, feed) = mock_assistant(test_settings(), hooks);

    assistant.run_loop().unwrap();
    feed.connack(0);
    feed.send(LinkEvent::Disconnected {
        reason: "broker sent DISCONNECT".to_string(),
    });
    feed.network_error("connection reset");
    feed.connack(0);
    feed.message("Test", "back");

    assert!(wait_until(|| assistant.messages_received() == 1).await);
    assert_eq!(
        *reasons.lock().unwrap(),
        vec!["broker sent DISCONNECT".to_string()]
    );

    assistant.terminate().await;
}
