mod provider;
mod proxy;
mod relay;
mod resolver;
mod types;
mod utils;
mod validate;
mod ytdlp;

#[cfg(test)]
pub mod testing;

pub use provider::{ExtractionProvider, ProviderError};
pub use proxy::StreamProxy;
pub use relay::RelayOutcome;
pub use resolver::MetadataResolver;
pub use types::VideoDescriptor;
pub use ytdlp::YtDlpProvider;

use crate::config::ProviderConfig;
use std::sync::Arc;
use tracing::{info, warn};

/// Builds the yt-dlp backed provider described by the config.
pub fn provider_from_config(config: &ProviderConfig) -> Arc<dyn ExtractionProvider> {
    info!(
        "Extraction provider: {} {}",
        config.binary,
        config.args.join(" ")
    );
    Arc::new(YtDlpProvider::new(config.binary.clone(), config.args.clone()))
}

pub async fn test_setup(provider: &dyn ExtractionProvider) {
    info!("Testing extraction provider setup...");

    if provider.test_availability().await {
        info!("✅ {} is available", provider.name());
    } else {
        warn!(
            "{} is not available, format and download requests will fail until it is installed",
            provider.name()
        );
    }
}
