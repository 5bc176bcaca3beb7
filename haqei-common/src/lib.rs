//! # HAQEI Common Library
//!
//! Shared code for the HAQEI mapping services including:
//! - Common error type
//! - Bootstrap configuration loading and root folder resolution
//! - SQLite initialization for the durable cache tier
//! - Timestamp helpers

pub mod config;
pub mod db;
pub mod error;
pub mod time;

pub use error::{Error, Result};
