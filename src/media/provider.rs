use super::types::RawVideoInfo;
use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;
use std::time::Duration;
use thiserror::Error;

pub type ByteStream = BoxStream<'static, Result<Bytes, ProviderError>>;

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("metadata extraction timed out after {}s", .0.as_secs())]
    Timeout(Duration),

    #[error("extraction failed ({status}): {message}")]
    Failed { status: String, message: String },

    #[error("invalid metadata: {0}")]
    InvalidMetadata(#[from] serde_json::Error),

    #[error("stream read failed: {0}")]
    Io(#[from] std::io::Error),
}

#[async_trait]
pub trait ExtractionProvider: Send + Sync {
    /// Human-readable name of the provider
    fn name(&self) -> &'static str;

    /// Fetch metadata and the available formats for a video
    async fn resolve(&self, url: &str) -> Result<RawVideoInfo, ProviderError>;

    /// Start producing the bytes of exactly one format.
    ///
    /// Dropping the returned stream must release every upstream resource.
    async fn open_stream(&self, url: &str, format_id: &str) -> Result<ByteStream, ProviderError>;

    /// Test if this provider is usable on the system
    async fn test_availability(&self) -> bool {
        true
    }
}
