//! Infrastructure: configuration, logging, and the identity keystore.

pub mod config;
pub mod identity;
pub mod logging;

pub use config::{ConfigError, ConfigLoader};
pub use identity::{verify_signature, IdentityError, IdentityStore};
pub use logging::init_logging;
