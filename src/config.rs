use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{CatalogError, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    #[serde(default)]
    pub llm: LlmConfig,

    #[serde(default)]
    pub settings: SettingsConfig,

    #[serde(default)]
    pub site: SiteConfig,

    /// Where this config was loaded from; category edits are written back here.
    #[serde(skip)]
    pub source_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LlmProviderType {
    #[default]
    OpenAI,
    Anthropic,
    Google,
}

impl LlmProviderType {
    pub fn name(&self) -> &'static str {
        match self {
            LlmProviderType::OpenAI => "openai",
            LlmProviderType::Anthropic => "anthropic",
            LlmProviderType::Google => "google",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(default)]
    pub provider: LlmProviderType,

    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    #[serde(default = "default_openai")]
    pub openai: ProviderConfig,

    #[serde(default = "default_anthropic")]
    pub anthropic: ProviderConfig,

    #[serde(default = "default_google")]
    pub google: ProviderConfig,
}

/// Credentials and model selection for one vendor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default)]
    pub api_key: Option<String>,

    /// Empty means the vendor default
    #[serde(default)]
    pub model: String,

    /// Base URL override, mostly useful for proxies and compatible gateways
    #[serde(default)]
    pub endpoint: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DuplicatePolicy {
    /// Refuse the insert and report the existing record
    #[default]
    Block,
    /// Log a warning and insert anyway
    Warn,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettingsConfig {
    #[serde(default = "default_auto_enrich")]
    pub auto_enrich: bool,

    #[serde(default)]
    pub duplicate_policy: DuplicatePolicy,

    #[serde(default = "default_predefined_genres")]
    pub predefined_genres: Vec<String>,

    /// Category vocabulary offered to the provider for matching
    #[serde(default)]
    pub user_categories: Vec<String>,

    #[serde(default = "default_image_extensions")]
    pub image_extensions: Vec<String>,

    #[serde(default = "default_image_directories")]
    pub image_directories: Vec<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteConfig {
    #[serde(default = "default_site_output_dir")]
    pub output_dir: PathBuf,

    #[serde(default = "default_site_title")]
    pub title: String,
}

fn default_db_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("albumshelf")
        .join("albums.db")
}

fn default_request_timeout_secs() -> u64 {
    120
}

fn default_openai() -> ProviderConfig {
    ProviderConfig {
        api_key: None,
        model: "gpt-4o".to_string(),
        endpoint: None,
    }
}

fn default_anthropic() -> ProviderConfig {
    ProviderConfig {
        api_key: None,
        model: "claude-3-5-sonnet-20241022".to_string(),
        endpoint: None,
    }
}

fn default_google() -> ProviderConfig {
    ProviderConfig {
        api_key: None,
        model: "gemini-2.0-flash".to_string(),
        endpoint: None,
    }
}

fn default_auto_enrich() -> bool {
    true
}

fn default_predefined_genres() -> Vec<String> {
    [
        "rock", "pop", "jazz", "classical", "electronic", "hip-hop", "r&b", "soul",
        "funk", "blues", "country", "folk", "metal", "punk", "reggae", "world",
        "ambient", "soundtrack",
    ]
    .iter()
    .map(|g| g.to_string())
    .collect()
}

fn default_image_extensions() -> Vec<String> {
    vec![
        "jpg".to_string(),
        "jpeg".to_string(),
        "png".to_string(),
        "webp".to_string(),
    ]
}

fn default_image_directories() -> Vec<PathBuf> {
    vec![PathBuf::from("albums_owned"), PathBuf::from("albums_wishlist")]
}

fn default_site_output_dir() -> PathBuf {
    PathBuf::from("site")
}

fn default_site_title() -> String {
    "Album Collection".to_string()
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: LlmProviderType::default(),
            request_timeout_secs: default_request_timeout_secs(),
            openai: default_openai(),
            anthropic: default_anthropic(),
            google: default_google(),
        }
    }
}

impl LlmConfig {
    /// Settings for the provider selected by `provider`.
    pub fn active(&self) -> &ProviderConfig {
        match self.provider {
            LlmProviderType::OpenAI => &self.openai,
            LlmProviderType::Anthropic => &self.anthropic,
            LlmProviderType::Google => &self.google,
        }
    }
}

impl Default for SettingsConfig {
    fn default() -> Self {
        Self {
            auto_enrich: default_auto_enrich(),
            duplicate_policy: DuplicatePolicy::default(),
            predefined_genres: default_predefined_genres(),
            user_categories: Vec::new(),
            image_extensions: default_image_extensions(),
            image_directories: default_image_directories(),
        }
    }
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            output_dir: default_site_output_dir(),
            title: default_site_title(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            llm: LlmConfig::default(),
            settings: SettingsConfig::default(),
            site: SiteConfig::default(),
            source_path: None,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path())
    }

    /// Load from `path`, writing a default config there if it does not exist yet.
    pub fn load_from(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path).map_err(|e| {
                CatalogError::Configuration(format!("cannot read {}: {}", path.display(), e))
            })?;
            toml::from_str::<Config>(&content).map_err(|e| {
                CatalogError::Configuration(format!("invalid config {}: {}", path.display(), e))
            })?
        } else {
            let config = Config::default();
            config.save_to(path)?;
            tracing::info!("Wrote default configuration to {:?}", path);
            config
        };
        config.source_path = Some(path.to_path_buf());
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        let path = self
            .source_path
            .clone()
            .unwrap_or_else(Self::config_path);
        self.save_to(&path)
    }

    fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let content = toml::to_string_pretty(self)
            .map_err(|e| CatalogError::Configuration(format!("cannot serialize config: {}", e)))?;
        std::fs::write(path, content)?;

        Ok(())
    }

    pub fn config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("albumshelf")
    }

    fn config_path() -> PathBuf {
        Self::config_dir().join("config.toml")
    }

    /// The selected provider must have a non-empty API key before anything
    /// touches the database.
    pub fn validate_provider(&self) -> Result<()> {
        let provider = self.llm.provider;
        match self.llm.active().api_key.as_deref().map(str::trim) {
            Some(key) if !key.is_empty() => Ok(()),
            _ => Err(CatalogError::Configuration(format!(
                "no API key configured for provider '{}' (set llm.{}.api_key)",
                provider.name(),
                provider.name()
            ))),
        }
    }

    /// Add a label to the category vocabulary. Returns false if already present.
    pub fn add_category(&mut self, category: &str) -> Result<bool> {
        let category = normalize_category(category);
        if category.is_empty() {
            return Err(CatalogError::Validation(
                "category name cannot be empty".to_string(),
            ));
        }
        if self.settings.user_categories.contains(&category) {
            return Ok(false);
        }
        self.settings.user_categories.push(category);
        Ok(true)
    }

    /// Remove a label from the category vocabulary. Returns false if it was not there.
    pub fn remove_category(&mut self, category: &str) -> bool {
        let category = normalize_category(category);
        let before = self.settings.user_categories.len();
        self.settings.user_categories.retain(|c| *c != category);
        self.settings.user_categories.len() != before
    }
}

fn normalize_category(category: &str) -> String {
    category.trim().to_lowercase()
}
