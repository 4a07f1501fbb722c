//! Common error types for railyard

use thiserror::Error;

/// Common result type for railyard operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types across the railyard tools
#[derive(Error, Debug)]
pub enum Error {
    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// A source row could not be decoded into its model
    #[error("Invalid record in {table}: {message}")]
    InvalidRecord { table: String, message: String },
}
