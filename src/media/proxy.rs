use super::{
    provider::ByteStream,
    relay::{spawn_relay, Relay},
    resolver::MetadataResolver,
    types::FormatDescriptor,
    utils::{content_disposition, content_type, download_filename},
    validate::validate_format_id,
};
use crate::error::AppError;
use futures::StreamExt;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// A download whose upstream has already produced its first chunk (or ended),
/// so the response headers can be committed safely.
pub struct PreparedDownload {
    pub filename: String,
    pub content_disposition: String,
    pub content_type: String,
    pub format: FormatDescriptor,
    pub stream: ByteStream,
}

pub struct StreamProxy {
    resolver: Arc<MetadataResolver>,
    buffer_chunks: usize,
}

impl StreamProxy {
    pub fn new(resolver: Arc<MetadataResolver>, buffer_chunks: usize) -> Self {
        Self {
            resolver,
            buffer_chunks,
        }
    }

    pub async fn open(
        &self,
        raw_url: Option<&str>,
        raw_format_id: Option<&str>,
    ) -> Result<PreparedDownload, AppError> {
        let url = self.resolver.validate_url(raw_url)?;
        let format_id = validate_format_id(raw_format_id)?;

        let video = self.resolver.resolve_url(&url).await?;
        let format = video
            .find_format(&format_id)
            .cloned()
            .ok_or_else(|| AppError::not_found(format!("Format not found: {format_id}")))?;

        let provider = self.resolver.provider();
        let mut stream = provider
            .open_stream(url.as_str(), &format.format_id)
            .await
            .map_err(|e| AppError::upstream("Failed to download video", e))?;

        // Nothing has been sent yet, so an early failure can still become a
        // proper error response.
        let stream = match stream.next().await {
            Some(Ok(first)) => {
                debug!("First chunk of {} bytes received for {}", first.len(), url);
                futures::stream::once(async move { Ok(first) })
                    .chain(stream)
                    .boxed()
            }
            Some(Err(e)) => {
                warn!("Download of format {} failed before any data: {}", format.format_id, e);
                return Err(AppError::upstream("Failed to download video", e));
            }
            None => futures::stream::empty().boxed(),
        };

        info!(
            "Starting download of \"{}\" format {} ({})",
            video.title, format.format_id, format.ext
        );

        Ok(PreparedDownload {
            filename: download_filename(&video.title, &format.ext),
            content_disposition: content_disposition(&video.title, &format.ext),
            content_type: content_type(&format),
            format,
            stream,
        })
    }

    /// Starts relaying a prepared download into a response body.
    pub fn relay(&self, download: PreparedDownload) -> Relay {
        spawn_relay(download.stream, self.buffer_chunks)
    }
}
