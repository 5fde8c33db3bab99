//! Error types for DIMSE operations

use thiserror::Error;

/// Result type alias for DIMSE operations
pub type Result<T> = std::result::Result<T, DimseError>;

/// Error types that can occur during DIMSE operations
#[derive(Error, Debug)]
pub enum DimseError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Network error: {0}")]
    Network(#[from] std::io::Error),

    #[error("DICOM parsing error: {0}")]
    DicomParsing(String),

    #[error("DICOM object error: {0}")]
    DicomObject(String),

    #[error("DICOM UL error: {0}")]
    DicomUl(String),

    #[error("Association rejected: {0}")]
    AssociationRejected(String),

    #[error("No accepted presentation context for {sop_class} in {transfer_syntax}")]
    NoPresentationContext {
        sop_class: String,
        transfer_syntax: String,
    },

    #[error("DIMSE operation failed: {0}")]
    OperationFailed(String),

    #[error("Invalid AE Title: {0}")]
    InvalidAeTitle(String),

    #[error("Timeout occurred: {0}")]
    Timeout(String),

    #[error("Association closed: {0}")]
    SessionClosed(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl DimseError {
    /// Create a new configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a new operation failed error
    pub fn operation_failed(msg: impl Into<String>) -> Self {
        Self::OperationFailed(msg.into())
    }

    /// Create a new internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Wrap an upper layer protocol error
    pub fn ul(err: impl std::fmt::Display) -> Self {
        Self::DicomUl(err.to_string())
    }

    /// Check if this error is recoverable
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            DimseError::Network(_) | DimseError::Timeout(_) | DimseError::AssociationRejected(_)
        )
    }

    /// True when the peer never answered: the socket failed, timed out, or
    /// the association went away before a response arrived.
    pub fn is_no_response(&self) -> bool {
        matches!(
            self,
            DimseError::Network(_)
                | DimseError::Timeout(_)
                | DimseError::DicomUl(_)
                | DimseError::SessionClosed(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_response_classification() {
        let timeout = DimseError::Timeout("read".into());
        assert!(timeout.is_no_response());
        assert!(timeout.is_recoverable());

        let rejected = DimseError::AssociationRejected("called AE unknown".into());
        assert!(!rejected.is_no_response());

        let missing = DimseError::NoPresentationContext {
            sop_class: "1.2.3".into(),
            transfer_syntax: "1.2.840.10008.1.2".into(),
        };
        assert!(!missing.is_no_response());
        assert!(missing.to_string().contains("1.2.3"));
    }
}
