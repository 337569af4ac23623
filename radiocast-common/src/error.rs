//! Errors raised while loading shared configuration

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    /// Config file could not be read
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Config file missing or malformed
    #[error("Configuration error: {0}")]
    Config(String),
}
