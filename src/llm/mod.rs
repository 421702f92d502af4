pub mod prompts;
pub mod provider;
pub mod response;

use serde::{Deserialize, Serialize};

use crate::db::Enrichment;
use crate::error::ProviderError;

pub use provider::{create_provider, AnthropicProvider, GoogleProvider, OpenAIProvider};

/// Identity read off an album cover.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedAlbum {
    pub album_name: String,
    pub artists: Vec<String>,
}

/// What the provider is told about an album when asked to fill in details.
#[derive(Debug, Clone, Copy)]
pub struct EnrichmentRequest<'a> {
    pub album_name: &'a str,
    pub artists: &'a [String],
    /// Values already known; only absent fields are requested
    pub existing: &'a Enrichment,
    /// Allowed labels for `matched_categories`; empty skips category matching
    pub vocabulary: &'a [String],
}

/// A vision-capable LLM that can read album covers and supply album details.
pub trait MetadataProvider: Send + Sync {
    /// Every album readable in the image, in the order the model listed them.
    fn extract_from_image(&self, image: &[u8]) -> Result<Vec<ExtractedAlbum>, ProviderError>;

    fn enrich(&self, request: &EnrichmentRequest<'_>) -> Result<Enrichment, ProviderError>;

    /// Get the provider name for display
    fn provider_name(&self) -> &'static str;
}
