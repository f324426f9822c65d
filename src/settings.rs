//! Application settings storage
//!
//! Stores configuration like API keys in a JSON file in the app data directory.
//! Settings are loaded into a value and turned into explicit `LlmConfig` /
//! `HttpOptions`; nothing is kept in process-wide state.

use crate::ai_client::{BackendKind, LlmConfig};
use crate::http::HttpOptions;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const APP_DIR_NAME: &str = "litaudit";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub openai_api_key: Option<String>,
    #[serde(default)]
    pub anthropic_api_key: Option<String>,
    /// LLM backend: "openai" or "anthropic" (default: "openai")
    #[serde(default = "default_llm_backend")]
    pub llm_backend: String,
    /// Model override (None = backend default)
    #[serde(default)]
    pub llm_model: Option<String>,
    /// Base URL override, e.g. an Ollama server at http://localhost:11434/v1
    #[serde(default)]
    pub llm_base_url: Option<String>,
    #[serde(default = "default_llm_timeout")]
    pub llm_timeout_secs: u64,
    /// Proxy for Scholar/Crossref/mirror traffic, e.g. http://host:port
    #[serde(default)]
    pub proxy: Option<String>,
    /// Contact email for the Crossref polite pool
    #[serde(default)]
    pub crossref_mailto: Option<String>,
    #[serde(default)]
    pub pdf_mirror: Option<String>,
    #[serde(default = "default_max_pdf_size")]
    pub max_pdf_size_mb: u32,
    #[serde(default = "default_request_delay")]
    pub request_delay_secs: u64,
}

fn default_llm_backend() -> String {
    "openai".to_string()
}

fn default_llm_timeout() -> u64 {
    120
}

fn default_max_pdf_size() -> u32 {
    5
}

fn default_request_delay() -> u64 {
    5 // avoids HTTP 429 from the mirror
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            openai_api_key: None,
            anthropic_api_key: None,
            llm_backend: default_llm_backend(),
            llm_model: None,
            llm_base_url: None,
            llm_timeout_secs: default_llm_timeout(),
            proxy: None,
            crossref_mailto: None,
            pdf_mirror: None,
            max_pdf_size_mb: default_max_pdf_size(),
            request_delay_secs: default_request_delay(),
        }
    }
}

/// `<data_dir>/litaudit`, or the working directory when there is no data dir
pub fn app_data_dir() -> PathBuf {
    dirs::data_dir()
        .map(|p| p.join(APP_DIR_NAME))
        .unwrap_or_else(|| PathBuf::from("."))
}

pub fn default_settings_path() -> PathBuf {
    app_data_dir().join("settings.json")
}

/// Env var wins over the stored value; empty values count as unset
fn env_or(var: &str, stored: &Option<String>) -> Option<String> {
    if let Ok(key) = std::env::var(var) {
        if !key.is_empty() {
            return Some(key);
        }
    }
    stored.clone().filter(|k| !k.is_empty())
}

/// Mask a secret for display (first 8 / last 4 chars)
pub fn mask_key(key: &str) -> String {
    if key.len() > 12 && key.is_ascii() {
        format!("{}...{}", &key[..8], &key[key.len() - 4..])
    } else {
        "*".repeat(key.chars().count())
    }
}

impl Settings {
    /// Load settings from disk or create default
    pub fn load(path: &Path) -> Self {
        if path.exists() {
            match fs::read_to_string(path) {
                Ok(content) => serde_json::from_str(&content).unwrap_or_else(|e| {
                    eprintln!("[Settings] Ignoring unreadable {}: {}", path.display(), e);
                    Settings::default()
                }),
                Err(_) => Settings::default(),
            }
        } else {
            Settings::default()
        }
    }

    /// Save settings to disk
    pub fn save(&self, path: &Path) -> Result<(), String> {
        let content = serde_json::to_string_pretty(self)
            .map_err(|e| format!("Failed to serialize settings: {}", e))?;

        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| format!("Failed to create config directory: {}", e))?;
        }

        fs::write(path, content)
            .map_err(|e| format!("Failed to write settings: {}", e))?;

        Ok(())
    }

    /// OpenAI key (checks OPENAI_API_KEY first, then stored setting)
    pub fn openai_api_key(&self) -> Option<String> {
        env_or("OPENAI_API_KEY", &self.openai_api_key)
    }

    /// Anthropic key (checks ANTHROPIC_API_KEY first, then stored setting)
    pub fn anthropic_api_key(&self) -> Option<String> {
        env_or("ANTHROPIC_API_KEY", &self.anthropic_api_key)
    }

    pub fn backend(&self) -> Result<BackendKind, String> {
        self.llm_backend.parse()
    }

    /// Explicit model configuration for the evaluator
    pub fn llm_config(&self) -> Result<LlmConfig, String> {
        let mut config = match self.backend()? {
            BackendKind::OpenAi => LlmConfig::openai(self.openai_api_key()),
            BackendKind::Anthropic => LlmConfig::anthropic(self.anthropic_api_key()),
        };
        if let Some(model) = self.llm_model.as_ref().filter(|m| !m.is_empty()) {
            config.model = model.clone();
        }
        if let Some(url) = self.llm_base_url.as_ref().filter(|u| !u.is_empty()) {
            config.base_url = url.clone();
        }
        config.timeout = Duration::from_secs(self.llm_timeout_secs);
        Ok(config)
    }

    pub fn http_options(&self) -> HttpOptions {
        self.http_options_with_proxy(None)
    }

    /// HTTP options with a one-off proxy taking precedence over the stored one
    pub fn http_options_with_proxy(&self, proxy_override: Option<&str>) -> HttpOptions {
        let proxy = proxy_override.map(str::to_string).or_else(|| self.proxy.clone());
        HttpOptions::default().with_proxy(proxy)
    }

    pub fn request_delay(&self) -> Duration {
        Duration::from_secs(self.request_delay_secs)
    }
}
