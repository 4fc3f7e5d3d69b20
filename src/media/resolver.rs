use super::{
    provider::{ExtractionProvider, ProviderError},
    types::{FormatDescriptor, RawFormat, RawVideoInfo, VideoDescriptor, NO_CODEC},
    validate::validate_source_url,
};
use crate::{config::ProviderConfig, error::AppError};
use std::{collections::HashSet, sync::Arc, time::Duration};
use tracing::{debug, info, warn};
use url::Url;

const UNTITLED: &str = "Untitled";

pub struct MetadataResolver {
    provider: Arc<dyn ExtractionProvider>,
    allowed_hosts: Vec<String>,
    timeout: Duration,
}

impl MetadataResolver {
    pub fn new(provider: Arc<dyn ExtractionProvider>, config: &ProviderConfig) -> Self {
        Self {
            provider,
            allowed_hosts: config.allowed_hosts.clone(),
            timeout: config.metadata_timeout(),
        }
    }

    pub fn provider(&self) -> &Arc<dyn ExtractionProvider> {
        &self.provider
    }

    pub fn validate_url(&self, raw: Option<&str>) -> Result<Url, AppError> {
        validate_source_url(raw, &self.allowed_hosts)
    }

    pub async fn resolve(&self, raw_url: Option<&str>) -> Result<VideoDescriptor, AppError> {
        let url = self.validate_url(raw_url)?;
        self.resolve_url(&url).await
    }

    /// Resolves an already validated URL. Never retries.
    pub async fn resolve_url(&self, url: &Url) -> Result<VideoDescriptor, AppError> {
        info!("Resolving formats with {} for: {}", self.provider.name(), url);

        let raw = tokio::time::timeout(self.timeout, self.provider.resolve(url.as_str()))
            .await
            .map_err(|_| ProviderError::Timeout(self.timeout))
            .and_then(|result| result)
            .map_err(|e| {
                warn!("Metadata resolution failed for {}: {}", url, e);
                AppError::upstream("Failed to fetch formats", e)
            })?;

        let descriptor = describe(raw);
        debug!(
            "Resolved \"{}\" with {} usable formats",
            descriptor.title,
            descriptor.formats.len()
        );
        Ok(descriptor)
    }
}

/// Normalizes provider metadata for clients.
///
/// Formats with neither video nor audio are dropped, as are repeated format
/// ids (the first usable occurrence wins).
pub fn describe(raw: RawVideoInfo) -> VideoDescriptor {
    let mut seen = HashSet::new();
    let formats = raw
        .formats
        .into_iter()
        .filter(|f| !f.format_id.is_empty())
        .map(describe_format)
        .filter(|f| f.has_video() || f.has_audio())
        .filter(|f| seen.insert(f.format_id.clone()))
        .collect();

    VideoDescriptor {
        title: raw
            .title
            .filter(|t| !t.trim().is_empty())
            .unwrap_or_else(|| UNTITLED.to_string()),
        channel: raw.channel.or(raw.uploader),
        duration: raw.duration.map(|d| d.max(0.0).round() as u64).unwrap_or(0),
        thumbnail: raw.thumbnail,
        formats,
    }
}

fn describe_format(raw: RawFormat) -> FormatDescriptor {
    let vcodec = codec(raw.vcodec);
    let acodec = codec(raw.acodec);

    let quality = raw
        .format_note
        .filter(|n| !n.trim().is_empty())
        .or_else(|| raw.height.map(|h| format!("{h}p")))
        .or_else(|| (vcodec == NO_CODEC && acodec != NO_CODEC).then(|| "audio only".to_string()));

    FormatDescriptor {
        format_id: raw.format_id,
        ext: raw.ext.unwrap_or_else(|| "bin".to_string()),
        vcodec,
        acodec,
        height: raw.height,
        quality,
        filesize: raw
            .filesize
            .or(raw.filesize_approx)
            .filter(|s| *s > 0.0)
            .map(|s| s.round() as u64),
        fps: raw.fps,
    }
}

/// An absent codec is unknown rather than absent, so it is kept as such.
fn codec(raw: Option<String>) -> String {
    raw.map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty())
        .unwrap_or_else(|| "unknown".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::testing::{sample_info, FakeProvider, SAMPLE_URL};

    fn resolver(provider: Arc<FakeProvider>) -> MetadataResolver {
        let config = ProviderConfig {
            allowed_hosts: vec!["example.com".to_string()],
            metadata_timeout_secs: 1,
            ..Default::default()
        };
        MetadataResolver::new(provider, &config)
    }

    #[test]
    fn test_describe_drops_formats_without_streams() {
        let descriptor = describe(sample_info());

        let ids: Vec<&str> = descriptor.formats.iter().map(|f| f.format_id.as_str()).collect();
        assert_eq!(ids, vec!["18", "137", "251"]);
        assert!(descriptor
            .formats
            .iter()
            .all(|f| !(f.vcodec == NO_CODEC && f.acodec == NO_CODEC)));
    }

    #[test]
    fn test_describe_normalizes_fields() {
        let descriptor = describe(sample_info());

        assert_eq!(descriptor.title, "Never Gonna: Give/You Up?");
        assert_eq!(descriptor.channel.as_deref(), Some("Rick Astley"));
        assert_eq!(descriptor.duration, 213);

        let progressive = descriptor.find_format("18").unwrap();
        assert_eq!(progressive.quality.as_deref(), Some("360p"));
        assert_eq!(progressive.filesize, Some(10_485_760));
        assert_eq!(progressive.fps, Some(30.0));

        let video_only = descriptor.find_format("137").unwrap();
        assert_eq!(video_only.quality.as_deref(), Some("1080p"));
        assert_eq!(video_only.acodec, "none");

        let audio = descriptor.find_format("251").unwrap();
        assert_eq!(audio.quality.as_deref(), Some("audio only"));
        assert_eq!(audio.filesize, Some(3_500_000));
    }

    #[test]
    fn test_describe_fallbacks() {
        let raw = RawVideoInfo {
            title: Some("  ".to_string()),
            uploader: Some("uploader".to_string()),
            formats: vec![
                RawFormat {
                    format_id: "http-720p".to_string(),
                    ..Default::default()
                },
                RawFormat {
                    format_id: "http-720p".to_string(),
                    ext: Some("webm".to_string()),
                    ..Default::default()
                },
                RawFormat::default(),
            ],
            ..Default::default()
        };

        let descriptor = describe(raw);
        assert_eq!(descriptor.title, "Untitled");
        assert_eq!(descriptor.channel.as_deref(), Some("uploader"));
        assert_eq!(descriptor.duration, 0);
        assert_eq!(descriptor.formats.len(), 1);

        let format = &descriptor.formats[0];
        assert_eq!(format.ext, "bin");
        assert_eq!(format.vcodec, "unknown");
        assert!(format.quality.is_none());
    }

    #[test]
    fn test_describe_skips_streamless_duplicate() {
        let none = || Some(NO_CODEC.to_string());
        let raw = RawVideoInfo {
            formats: vec![
                RawFormat {
                    format_id: "sb0".to_string(),
                    vcodec: none(),
                    acodec: none(),
                    ..Default::default()
                },
                RawFormat {
                    format_id: "sb0".to_string(),
                    ext: Some("mp4".to_string()),
                    vcodec: Some("avc1".to_string()),
                    acodec: none(),
                    ..Default::default()
                },
            ],
            ..Default::default()
        };

        let descriptor = describe(raw);
        assert_eq!(descriptor.formats.len(), 1);
        assert_eq!(descriptor.formats[0].ext, "mp4");
        assert!(descriptor.formats[0].has_video());
    }

    #[tokio::test]
    async fn test_resolve_invalid_url_skips_provider() {
        let provider = Arc::new(FakeProvider::new(sample_info()));
        let resolver = resolver(provider.clone());

        let err = resolver.resolve(Some("not a url")).await.unwrap_err();
        assert!(matches!(err, AppError::InvalidInput(_)));

        let err = resolver.resolve(Some("https://vimeo.com/1")).await.unwrap_err();
        assert!(matches!(err, AppError::InvalidInput(_)));

        assert_eq!(provider.resolve_count(), 0);
    }

    #[tokio::test]
    async fn test_resolve_success() {
        let provider = Arc::new(FakeProvider::new(sample_info()));
        let resolver = resolver(provider.clone());

        let descriptor = resolver.resolve(Some(SAMPLE_URL)).await.unwrap();
        assert_eq!(descriptor.formats.len(), 3);
        assert_eq!(provider.resolve_count(), 1);
    }

    #[tokio::test]
    async fn test_resolve_provider_failure_is_upstream() {
        let provider = Arc::new(FakeProvider::failing());
        let resolver = resolver(provider.clone());

        let err = resolver.resolve(Some(SAMPLE_URL)).await.unwrap_err();
        assert!(matches!(err, AppError::Upstream { .. }));
        assert!(err.to_string().contains("Video unavailable"));
        assert_eq!(provider.resolve_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_resolve_times_out() {
        let provider = Arc::new(FakeProvider::new(sample_info()).with_delay(Duration::from_secs(60)));
        let resolver = resolver(provider);

        let err = resolver.resolve(Some(SAMPLE_URL)).await.unwrap_err();
        match err {
            AppError::Upstream {
                source: ProviderError::Timeout(after),
                ..
            } => assert_eq!(after, Duration::from_secs(1)),
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
