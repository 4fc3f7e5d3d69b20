use crate::media::ProviderError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    InvalidInput(String),

    #[error("{0}")]
    NotFound(String),

    /// `context` is the client-safe summary, `source` carries provider detail.
    #[error("{context}: {source}")]
    Upstream {
        context: &'static str,
        #[source]
        source: ProviderError,
    },
}

impl AppError {
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    pub fn upstream(context: &'static str, source: ProviderError) -> Self {
        Self::Upstream { context, source }
    }

    /// Message safe to show a client. Production mode hides provider detail.
    pub fn public_message(&self, production: bool) -> String {
        match self {
            Self::Upstream { context, .. } if production => context.to_string(),
            other => other.to_string(),
        }
    }
}
