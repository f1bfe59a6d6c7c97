use std::io;

use thiserror::Error;
use weighstation_core::transport::{DecodeError, TransportError};
use weighstation_core::SubmitError;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Core(#[from] weighstation_core::Error),
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error(transparent)]
    Submit(#[from] SubmitError),
    #[error(transparent)]
    Decode(#[from] DecodeError),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
    #[error("Invalid hex payload: {0}")]
    InvalidPayload(String),
    #[error("Invalid scale address: {0}")]
    InvalidAddress(String),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error(
        "No relay URL configured. Pass --relay-url, set WEIGHSTATION_RELAY_URL, or run `weighstation config init --relay-url <url>`."
    )]
    RelayNotConfigured,
}
