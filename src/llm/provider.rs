use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::prompts::{enrichment_prompt, extraction_prompt, prepare_image};
use super::response::{parse_enrichment, parse_extraction};
use super::{EnrichmentRequest, ExtractedAlbum, MetadataProvider};
use crate::config::{Config, LlmProviderType, ProviderConfig};
use crate::db::Enrichment;
use crate::error::{ProviderError, Result};

const EXTRACTION_MAX_TOKENS: u32 = 1000;
const ENRICHMENT_MAX_TOKENS: u32 = 2000;
const TEMPERATURE: f32 = 0.2;

/// Base64 JPEG ready to attach to a request.
struct EncodedImage {
    data: String,
    media_type: &'static str,
}

fn encode(image: &[u8]) -> std::result::Result<EncodedImage, ProviderError> {
    let (data, media_type) = prepare_image(image)?;
    Ok(EncodedImage { data, media_type })
}

fn http_agent(timeout: Duration) -> ureq::Agent {
    ureq::AgentBuilder::new().timeout(timeout).build()
}

fn send<B: Serialize, R: DeserializeOwned>(
    request: ureq::Request,
    body: &B,
) -> std::result::Result<R, ProviderError> {
    let response = request
        .set("Content-Type", "application/json")
        .send_json(body)?;
    response
        .into_json::<R>()
        .map_err(|e| ProviderError::Malformed(format!("unexpected response envelope: {}", e)))
}

fn base_url(config: &ProviderConfig, default: &str) -> String {
    config
        .endpoint
        .as_deref()
        .map(str::trim)
        .filter(|e| !e.is_empty())
        .unwrap_or(default)
        .trim_end_matches('/')
        .to_string()
}

fn model_or(config: &ProviderConfig, default: &str) -> String {
    let model = config.model.trim();
    if model.is_empty() {
        default.to_string()
    } else {
        model.to_string()
    }
}

// ============================================================================
// OpenAI chat completions
// ============================================================================

pub const OPENAI_DEFAULT_ENDPOINT: &str = "https://api.openai.com/v1";
pub const OPENAI_DEFAULT_MODEL: &str = "gpt-4o";

pub struct OpenAIProvider {
    agent: ureq::Agent,
    endpoint: String,
    model: String,
    api_key: String,
}

#[derive(Debug, Serialize)]
struct OpenAIChatRequest {
    model: String,
    messages: Vec<OpenAIMessage>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct OpenAIMessage {
    role: String,
    content: Vec<OpenAIContentPart>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type")]
enum OpenAIContentPart {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(rename = "image_url")]
    ImageUrl { image_url: ImageUrl },
}

#[derive(Debug, Serialize)]
struct ImageUrl {
    url: String,
}

#[derive(Debug, Deserialize)]
struct OpenAIChatResponse {
    choices: Vec<OpenAIChoice>,
}

#[derive(Debug, Deserialize)]
struct OpenAIChoice {
    message: OpenAIResponseMessage,
}

#[derive(Debug, Deserialize)]
struct OpenAIResponseMessage {
    content: Option<String>,
}

impl OpenAIProvider {
    pub fn new(config: &ProviderConfig, api_key: &str, timeout: Duration) -> Self {
        Self {
            agent: http_agent(timeout),
            endpoint: base_url(config, OPENAI_DEFAULT_ENDPOINT),
            model: model_or(config, OPENAI_DEFAULT_MODEL),
            api_key: api_key.to_string(),
        }
    }

    fn build_request(
        &self,
        prompt: String,
        image: Option<EncodedImage>,
        max_tokens: u32,
    ) -> OpenAIChatRequest {
        let mut content = vec![OpenAIContentPart::Text { text: prompt }];
        if let Some(image) = image {
            content.push(OpenAIContentPart::ImageUrl {
                image_url: ImageUrl {
                    url: format!("data:{};base64,{}", image.media_type, image.data),
                },
            });
        }

        OpenAIChatRequest {
            model: self.model.clone(),
            messages: vec![OpenAIMessage {
                role: "user".to_string(),
                content,
            }],
            max_tokens,
            temperature: TEMPERATURE,
        }
    }

    fn response_text(response: OpenAIChatResponse) -> std::result::Result<String, ProviderError> {
        response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| ProviderError::Malformed("no choices in OpenAI response".to_string()))
    }

    fn complete(
        &self,
        prompt: String,
        image: Option<EncodedImage>,
        max_tokens: u32,
    ) -> std::result::Result<String, ProviderError> {
        let request = self.build_request(prompt, image, max_tokens);
        let url = format!("{}/chat/completions", self.endpoint);

        let http = self
            .agent
            .post(&url)
            .set("Authorization", &format!("Bearer {}", self.api_key));

        Self::response_text(send(http, &request)?)
    }
}

impl MetadataProvider for OpenAIProvider {
    fn extract_from_image(&self, image: &[u8]) -> std::result::Result<Vec<ExtractedAlbum>, ProviderError> {
        let image = encode(image)?;
        let text = self.complete(
            extraction_prompt().to_string(),
            Some(image),
            EXTRACTION_MAX_TOKENS,
        )?;
        parse_extraction(&text)
    }

    fn enrich(&self, request: &EnrichmentRequest<'_>) -> std::result::Result<Enrichment, ProviderError> {
        let text = self.complete(enrichment_prompt(request), None, ENRICHMENT_MAX_TOKENS)?;
        parse_enrichment(&text, request.vocabulary)
    }

    fn provider_name(&self) -> &'static str {
        "OpenAI"
    }
}

// ============================================================================
// Anthropic messages
// ============================================================================

pub const ANTHROPIC_DEFAULT_ENDPOINT: &str = "https://api.anthropic.com/v1";
pub const ANTHROPIC_DEFAULT_MODEL: &str = "claude-3-5-sonnet-20241022";

pub struct AnthropicProvider {
    agent: ureq::Agent,
    endpoint: String,
    model: String,
    api_key: String,
}

#[derive(Debug, Serialize)]
struct AnthropicRequest {
    model: String,
    max_tokens: u32,
    temperature: f32,
    messages: Vec<AnthropicMessage>,
}

#[derive(Debug, Serialize)]
struct AnthropicMessage {
    role: String,
    content: Vec<AnthropicContent>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type")]
enum AnthropicContent {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(rename = "image")]
    Image { source: AnthropicImageSource },
}

#[derive(Debug, Serialize)]
struct AnthropicImageSource {
    #[serde(rename = "type")]
    source_type: String,
    media_type: String,
    data: String,
}

#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    content: Vec<AnthropicResponseContent>,
}

#[derive(Debug, Deserialize)]
struct AnthropicResponseContent {
    text: Option<String>,
}

impl AnthropicProvider {
    pub fn new(config: &ProviderConfig, api_key: &str, timeout: Duration) -> Self {
        Self {
            agent: http_agent(timeout),
            endpoint: base_url(config, ANTHROPIC_DEFAULT_ENDPOINT),
            model: model_or(config, ANTHROPIC_DEFAULT_MODEL),
            api_key: api_key.to_string(),
        }
    }

    fn build_request(
        &self,
        prompt: String,
        image: Option<EncodedImage>,
        max_tokens: u32,
    ) -> AnthropicRequest {
        let mut content = Vec::new();
        if let Some(image) = image {
            content.push(AnthropicContent::Image {
                source: AnthropicImageSource {
                    source_type: "base64".to_string(),
                    media_type: image.media_type.to_string(),
                    data: image.data,
                },
            });
        }
        content.push(AnthropicContent::Text { text: prompt });

        AnthropicRequest {
            model: self.model.clone(),
            max_tokens,
            temperature: TEMPERATURE,
            messages: vec![AnthropicMessage {
                role: "user".to_string(),
                content,
            }],
        }
    }

    fn response_text(response: AnthropicResponse) -> std::result::Result<String, ProviderError> {
        let text: String = response
            .content
            .into_iter()
            .filter_map(|c| c.text)
            .collect::<Vec<_>>()
            .join("");
        if text.trim().is_empty() {
            Err(ProviderError::Malformed(
                "no text content in Anthropic response".to_string(),
            ))
        } else {
            Ok(text)
        }
    }

    fn complete(
        &self,
        prompt: String,
        image: Option<EncodedImage>,
        max_tokens: u32,
    ) -> std::result::Result<String, ProviderError> {
        let request = self.build_request(prompt, image, max_tokens);
        let url = format!("{}/messages", self.endpoint);

        let http = self
            .agent
            .post(&url)
            .set("x-api-key", &self.api_key)
            .set("anthropic-version", "2023-06-01");

        Self::response_text(send(http, &request)?)
    }
}

impl MetadataProvider for AnthropicProvider {
    fn extract_from_image(&self, image: &[u8]) -> std::result::Result<Vec<ExtractedAlbum>, ProviderError> {
        let image = encode(image)?;
        let text = self.complete(
            extraction_prompt().to_string(),
            Some(image),
            EXTRACTION_MAX_TOKENS,
        )?;
        parse_extraction(&text)
    }

    fn enrich(&self, request: &EnrichmentRequest<'_>) -> std::result::Result<Enrichment, ProviderError> {
        let text = self.complete(enrichment_prompt(request), None, ENRICHMENT_MAX_TOKENS)?;
        parse_enrichment(&text, request.vocabulary)
    }

    fn provider_name(&self) -> &'static str {
        "Anthropic Claude"
    }
}

// ============================================================================
// Google Gemini generateContent
// ============================================================================

pub const GOOGLE_DEFAULT_ENDPOINT: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const GOOGLE_DEFAULT_MODEL: &str = "gemini-2.0-flash";

pub struct GoogleProvider {
    agent: ureq::Agent,
    endpoint: String,
    model: String,
    api_key: String,
}

#[derive(Debug, Serialize)]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    #[serde(rename = "generationConfig")]
    generation_config: GeminiGenerationConfig,
}

#[derive(Debug, Serialize)]
struct GeminiContent {
    role: String,
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum GeminiPart {
    Text { text: String },
    InlineData { inline_data: GeminiInlineData },
}

#[derive(Debug, Serialize)]
struct GeminiInlineData {
    mime_type: String,
    data: String,
}

#[derive(Debug, Serialize)]
struct GeminiGenerationConfig {
    #[serde(rename = "maxOutputTokens")]
    max_output_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidate {
    content: Option<GeminiResponseContent>,
}

#[derive(Debug, Deserialize)]
struct GeminiResponseContent {
    #[serde(default)]
    parts: Vec<GeminiResponsePart>,
}

#[derive(Debug, Deserialize)]
struct GeminiResponsePart {
    text: Option<String>,
}

impl GoogleProvider {
    pub fn new(config: &ProviderConfig, api_key: &str, timeout: Duration) -> Self {
        Self {
            agent: http_agent(timeout),
            endpoint: base_url(config, GOOGLE_DEFAULT_ENDPOINT),
            model: model_or(config, GOOGLE_DEFAULT_MODEL),
            api_key: api_key.to_string(),
        }
    }

    fn build_request(
        &self,
        prompt: String,
        image: Option<EncodedImage>,
        max_tokens: u32,
    ) -> GeminiRequest {
        let mut parts = vec![GeminiPart::Text { text: prompt }];
        if let Some(image) = image {
            parts.push(GeminiPart::InlineData {
                inline_data: GeminiInlineData {
                    mime_type: image.media_type.to_string(),
                    data: image.data,
                },
            });
        }

        GeminiRequest {
            contents: vec![GeminiContent {
                role: "user".to_string(),
                parts,
            }],
            generation_config: GeminiGenerationConfig {
                max_output_tokens: max_tokens,
                temperature: TEMPERATURE,
            },
        }
    }

    fn response_text(response: GeminiResponse) -> std::result::Result<String, ProviderError> {
        // Safety-blocked responses come back with no candidates or no content
        let text: String = response
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|content| {
                content
                    .parts
                    .into_iter()
                    .filter_map(|p| p.text)
                    .collect::<Vec<_>>()
                    .join("")
            })
            .unwrap_or_default();

        if text.trim().is_empty() {
            Err(ProviderError::Malformed(
                "no candidates in Gemini response".to_string(),
            ))
        } else {
            Ok(text)
        }
    }

    fn complete(
        &self,
        prompt: String,
        image: Option<EncodedImage>,
        max_tokens: u32,
    ) -> std::result::Result<String, ProviderError> {
        let request = self.build_request(prompt, image, max_tokens);
        let url = format!("{}/models/{}:generateContent", self.endpoint, self.model);

        let http = self.agent.post(&url).set("x-goog-api-key", &self.api_key);

        Self::response_text(send(http, &request)?)
    }
}

impl MetadataProvider for GoogleProvider {
    fn extract_from_image(&self, image: &[u8]) -> std::result::Result<Vec<ExtractedAlbum>, ProviderError> {
        let image = encode(image)?;
        let text = self.complete(
            extraction_prompt().to_string(),
            Some(image),
            EXTRACTION_MAX_TOKENS,
        )?;
        parse_extraction(&text)
    }

    fn enrich(&self, request: &EnrichmentRequest<'_>) -> std::result::Result<Enrichment, ProviderError> {
        let text = self.complete(enrichment_prompt(request), None, ENRICHMENT_MAX_TOKENS)?;
        parse_enrichment(&text, request.vocabulary)
    }

    fn provider_name(&self) -> &'static str {
        "Google Gemini"
    }
}

// ============================================================================
// Factory function
// ============================================================================

/// Create the configured provider. Fails if it has no API key.
pub fn create_provider(config: &Config) -> Result<Box<dyn MetadataProvider>> {
    config.validate_provider()?;

    let llm = &config.llm;
    let settings = llm.active();
    let api_key = settings
        .api_key
        .as_deref()
        .map(str::trim)
        .unwrap_or_default();
    let timeout = Duration::from_secs(llm.request_timeout_secs.max(1));

    let provider: Box<dyn MetadataProvider> = match llm.provider {
        LlmProviderType::OpenAI => Box::new(OpenAIProvider::new(settings, api_key, timeout)),
        LlmProviderType::Anthropic => Box::new(AnthropicProvider::new(settings, api_key, timeout)),
        LlmProviderType::Google => Box::new(GoogleProvider::new(settings, api_key, timeout)),
    };

    tracing::debug!(
        "Using {} provider with model {}",
        provider.provider_name(),
        if settings.model.is_empty() { "(default)" } else { settings.model.as_str() }
    );

    Ok(provider)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CatalogError;
    use serde_json::{json, Value};

    fn provider_config(endpoint: Option<&str>, model: &str) -> ProviderConfig {
        ProviderConfig {
            api_key: Some("key".to_string()),
            model: model.to_string(),
            endpoint: endpoint.map(|e| e.to_string()),
        }
    }

    fn image() -> EncodedImage {
        EncodedImage {
            data: "AAAA".to_string(),
            media_type: "image/jpeg",
        }
    }

    #[test]
    fn test_openai_request_shape() {
        let provider = OpenAIProvider::new(&provider_config(None, ""), "key", Duration::from_secs(5));
        assert_eq!(provider.endpoint, OPENAI_DEFAULT_ENDPOINT);
        assert_eq!(provider.model, OPENAI_DEFAULT_MODEL);

        let body = serde_json::to_value(provider.build_request("hi".to_string(), Some(image()), 10)).unwrap();
        assert_eq!(body["model"], "gpt-4o");
        assert_eq!(body["messages"][0]["content"][0], json!({"type": "text", "text": "hi"}));
        assert_eq!(
            body["messages"][0]["content"][1]["image_url"]["url"],
            "data:image/jpeg;base64,AAAA"
        );
    }

    #[test]
    fn test_openai_response_envelope() {
        let response: OpenAIChatResponse =
            serde_json::from_str(r#"{"choices": [{"message": {"content": "{\"a\": 1}"}}]}"#).unwrap();
        assert_eq!(OpenAIProvider::response_text(response).unwrap(), "{\"a\": 1}");

        let empty: OpenAIChatResponse = serde_json::from_str(r#"{"choices": []}"#).unwrap();
        assert!(matches!(
            OpenAIProvider::response_text(empty),
            Err(ProviderError::Malformed(_))
        ));
    }

    #[test]
    fn test_anthropic_request_puts_image_first() {
        let provider = AnthropicProvider::new(
            &provider_config(Some("https://proxy.local/v1/"), "claude-test"),
            "key",
            Duration::from_secs(5),
        );
        assert_eq!(provider.endpoint, "https://proxy.local/v1");

        let body = serde_json::to_value(provider.build_request("hi".to_string(), Some(image()), 10)).unwrap();
        assert_eq!(body["model"], "claude-test");
        assert_eq!(body["messages"][0]["content"][0]["type"], "image");
        assert_eq!(body["messages"][0]["content"][0]["source"]["type"], "base64");
        assert_eq!(body["messages"][0]["content"][1]["text"], "hi");
    }

    #[test]
    fn test_anthropic_response_joins_text_blocks() {
        let response: AnthropicResponse = serde_json::from_str(
            r#"{"content": [{"type": "text", "text": "{\"a\":"}, {"type": "text", "text": " 1}"}]}"#,
        )
        .unwrap();
        assert_eq!(AnthropicProvider::response_text(response).unwrap(), "{\"a\": 1}");
    }

    #[test]
    fn test_gemini_request_shape() {
        let provider = GoogleProvider::new(&provider_config(None, ""), "key", Duration::from_secs(5));
        let body: Value =
            serde_json::to_value(provider.build_request("hi".to_string(), Some(image()), 10)).unwrap();

        assert_eq!(body["contents"][0]["parts"][0], json!({"text": "hi"}));
        assert_eq!(
            body["contents"][0]["parts"][1]["inline_data"],
            json!({"mime_type": "image/jpeg", "data": "AAAA"})
        );
        assert_eq!(body["generationConfig"]["maxOutputTokens"], 10);
    }

    #[test]
    fn test_gemini_blocked_response_is_malformed() {
        let blocked: GeminiResponse =
            serde_json::from_str(r#"{"promptFeedback": {"blockReason": "SAFETY"}}"#).unwrap();
        assert!(matches!(
            GoogleProvider::response_text(blocked),
            Err(ProviderError::Malformed(_))
        ));

        let ok: GeminiResponse = serde_json::from_str(
            r#"{"candidates": [{"content": {"parts": [{"text": "[]"}]}}]}"#,
        )
        .unwrap();
        assert_eq!(GoogleProvider::response_text(ok).unwrap(), "[]");
    }

    #[test]
    fn test_create_provider_selects_vendor() {
        let mut config = Config::default();
        config.llm.provider = LlmProviderType::Google;
        config.llm.google.api_key = Some("g-key".to_string());

        let provider = create_provider(&config).unwrap();
        assert_eq!(provider.provider_name(), "Google Gemini");
    }

    #[test]
    fn test_create_provider_requires_key() {
        let mut config = Config::default();
        config.llm.provider = LlmProviderType::Anthropic;
        config.llm.anthropic.api_key = Some("   ".to_string());

        assert!(matches!(
            create_provider(&config),
            Err(CatalogError::Configuration(_))
        ));
    }
}
