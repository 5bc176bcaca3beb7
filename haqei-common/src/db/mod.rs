//! Database initialization for the durable cache tier

pub mod init;

pub use init::*;
