//! Adapters: everything that touches the outside world.

pub mod authn;
pub mod http;
pub mod notify;
pub mod sqlite;
