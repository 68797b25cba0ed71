//! Client assistant shared by the publisher and subscriber test clients

pub mod hooks;
pub mod lifecycle;
pub mod message;

pub use hooks::{ConnectInfo, DisconnectInfo, HookContext, Hooks};
pub use lifecycle::{ClientAssistant, SessionState};
pub use message::MessageRecord;
