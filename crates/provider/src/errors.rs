//! Typed, pre-classified vault-provider errors.

use tbv_poll::{Classify, ErrorClass};

/// Everything that can go wrong talking to the vault provider.
///
/// The retry classification lives here, on the type, assigned once when the
/// HTTP adapter maps a response. Consumers dispatch on [`Classify`] and
/// never inspect message strings.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    /// The provider has not indexed the deposit or is still producing
    /// templates. Retryable.
    #[error("vault provider not ready: {0}")]
    NotReady(String),

    /// The provider is reachable but failing (5xx). Retryable.
    #[error("vault provider unavailable: {0}")]
    Unavailable(String),

    /// The request never completed (connection, TLS, timeout). Retryable.
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The provider rejected the depositor's identity or key material.
    /// Never retried: the deposit cannot proceed as constructed.
    #[error("unauthorized depositor: {0}")]
    Unauthorized(String),

    /// The provider answered with something this client cannot interpret.
    #[error("protocol error: {0}")]
    Protocol(String),
}

impl Classify for ProviderError {
    fn class(&self) -> ErrorClass {
        match self {
            Self::NotReady(_) | Self::Unavailable(_) | Self::Transport(_) => {
                ErrorClass::Transient
            }
            Self::Unauthorized(_) | Self::Protocol(_) => ErrorClass::Terminal,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_ready_is_transient() {
        let err = ProviderError::NotReady("no transaction graphs yet".to_string());
        assert_eq!(err.class(), ErrorClass::Transient);
    }

    #[test]
    fn unauthorized_is_terminal() {
        let err = ProviderError::Unauthorized("depositor key mismatch".to_string());
        assert_eq!(err.class(), ErrorClass::Terminal);
    }

    #[test]
    fn malformed_responses_are_terminal() {
        let err = ProviderError::Protocol("expected json object".to_string());
        assert_eq!(err.class(), ErrorClass::Terminal);
    }
}
