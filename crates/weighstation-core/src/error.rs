//! Error types for weighstation-core

use thiserror::Error;

use crate::submit::SubmitError;
use crate::transport::TransportError;

/// Result type alias using weighstation-core's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in weighstation-core operations
#[derive(Error, Debug)]
pub enum Error {
    /// Scale transport error (adapter or session)
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Record or shift-event submission error
    #[error(transparent)]
    Submission(#[from] SubmitError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Weight recording attempted without a started shift
    #[error("No shift has been started on this station")]
    NoActiveShift,
}

impl Error {
    /// Returns the transport error when this error came from a scale transport.
    pub const fn as_transport(&self) -> Option<&TransportError> {
        match self {
            Self::Transport(error) => Some(error),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transport_errors_display_without_prefix() {
        let error = Error::from(TransportError::ConnectFailed("link lost".to_string()));
        assert_eq!(error.to_string(), "Failed to connect to scale: link lost");
        assert!(matches!(
            error.as_transport(),
            Some(TransportError::ConnectFailed(_))
        ));
    }

    #[test]
    fn no_active_shift_has_operator_facing_message() {
        assert_eq!(
            Error::NoActiveShift.to_string(),
            "No shift has been started on this station"
        );
        assert!(Error::NoActiveShift.as_transport().is_none());
    }

    #[test]
    fn submission_errors_convert_transparently() {
        let error = Error::from(SubmitError::Api("HTTP 502".to_string()));
        assert!(matches!(error, Error::Submission(SubmitError::Api(_))));
        assert_eq!(
            error.to_string(),
            SubmitError::Api("HTTP 502".to_string()).to_string()
        );
        assert!(error.as_transport().is_none());
    }
}
