//! Error type shared by the HAQEI crates

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Bootstrap and persistence failures
#[derive(Error, Debug)]
pub enum Error {
    /// SQLite open, pragma or schema failure
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Root folder or config file I/O
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// TOML file unreadable or unparseable
    #[error("Configuration error: {0}")]
    Config(String),
}
