//! Report broadcast to external listeners over TCP.

pub mod protocol;
pub mod server;
