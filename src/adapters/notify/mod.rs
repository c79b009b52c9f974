//! Outbound notification channel adapters.

pub mod chat;
pub mod push;

pub use chat::ChatNotifier;
pub use push::PushNotifier;
