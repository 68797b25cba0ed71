//! Callback strategy injected into the client assistant
//!
//! [`Hooks`] holds the four callback bodies. Each defaults to the console
//! output of the stock test clients and can be replaced before the assistant
//! is built; the registration with the MQTT client never changes.

use super::message::MessageRecord;
use crate::config::ClientSettings;
use crate::transport::MqttLink;
use std::fmt;
use std::sync::Arc;

/// What a hook can reach while it runs on the event task
pub struct HookContext<'a> {
    pub link: &'a dyn MqttLink,
    pub settings: &'a ClientSettings,
}

/// Accepted connection details passed to the on-connect hook
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectInfo {
    pub code: u8,
    pub session_present: bool,
    pub time: String,
}

/// Disconnect details passed to the on-disconnect hook
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisconnectInfo {
    pub reason: String,
    pub time: String,
}

pub type ConnectHook = Arc<dyn Fn(&HookContext<'_>, &ConnectInfo) + Send + Sync>;
pub type DisconnectHook = Arc<dyn Fn(&HookContext<'_>, &DisconnectInfo) + Send + Sync>;
pub type MessageHook = Arc<dyn Fn(&HookContext<'_>, u64, &MessageRecord) + Send + Sync>;
pub type PublishHook = Arc<dyn Fn(&HookContext<'_>, u16) + Send + Sync>;

/// The four replaceable callback bodies
#[derive(Clone)]
pub struct Hooks {
    pub(crate) on_connect: ConnectHook,
    pub(crate) on_disconnect: DisconnectHook,
    pub(crate) on_message: MessageHook,
    pub(crate) on_publish: PublishHook,
}

impl Default for Hooks {
    fn default() -> Self {
        Self {
            on_connect: Arc::new(default_connect),
            on_disconnect: Arc::new(default_disconnect),
            on_message: Arc::new(default_message),
            on_publish: Arc::new(default_publish),
        }
    }
}

impl Hooks {
    pub fn on_connect<F>(mut self, hook: F) -> Self
    where
        F: Fn(&HookContext<'_>, &ConnectInfo) + Send + Sync + 'static,
    {
        self.on_connect = Arc::new(hook);
        self
    }

    pub fn on_disconnect<F>(mut self, hook: F) -> Self
    where
        F: Fn(&HookContext<'_>, &DisconnectInfo) + Send + Sync + 'static,
    {
        self.on_disconnect = Arc::new(hook);
        self
    }

    pub fn on_message<F>(mut self, hook: F) -> Self
    where
        F: Fn(&HookContext<'_>, u64, &MessageRecord) + Send + Sync + 'static,
    {
        self.on_message = Arc::new(hook);
        self
    }

    pub fn on_publish<F>(mut self, hook: F) -> Self
    where
        F: Fn(&HookContext<'_>, u16) + Send + Sync + 'static,
    {
        self.on_publish = Arc::new(hook);
        self
    }
}

impl fmt::Debug for Hooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hooks").finish_non_exhaustive()
    }
}

fn default_connect(_: &HookContext<'_>, info: &ConnectInfo) {
    print_connected(info);
}

fn default_disconnect(_: &HookContext<'_>, _: &DisconnectInfo) {}

fn default_message(_: &HookContext<'_>, count: u64, record: &MessageRecord) {
    print_message(count, record);
}

fn default_publish(_: &HookContext<'_>, _: u16) {}

/// Default on-connect output
pub fn print_connected(info: &ConnectInfo) {
    println!("Connected with result code {} at {}", info.code, info.time);
}

/// Default on-message output
pub fn print_message(count: u64, record: &MessageRecord) {
    println!(
        "#{count} received at {}\nTopic: {} Message: {}\n",
        record.time, record.topic, record.message
    );
}
