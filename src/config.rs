use serde::Deserialize;

use crate::error::{AppError, Result};
use crate::research::ExtractMode;

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    pub research: ResearchConfig,
    pub claude: ClaudeConfig,
    #[serde(default)]
    pub drafting: DraftingConfig,
    #[serde(default)]
    pub approval: ApprovalConfig,
    pub smtp: SmtpConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// Where profile text comes from. URLs are templates: `{id}` is replaced
/// with the URL-encoded subject identifier.
#[derive(Debug, Deserialize, Clone)]
pub struct ResearchConfig {
    pub primary_url: String,
    #[serde(default = "default_primary_mode")]
    pub primary_mode: ExtractMode,
    pub fallback_url: String,
    #[serde(default = "default_fallback_mode")]
    pub fallback_mode: ExtractMode,
    #[serde(default = "default_fetch_timeout")]
    pub timeout_secs: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default = "default_keywords")]
    pub keywords: Vec<String>,
}

#[derive(Deserialize, Clone)]
pub struct ClaudeConfig {
    pub api_key: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_draft_retries")]
    pub max_retries: u32,
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,
}

// Manual Debug impl to avoid leaking the API key
impl std::fmt::Debug for ClaudeConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClaudeConfig")
            .field("api_key", &"[REDACTED]")
            .field("model", &self.model)
            .field("max_tokens", &self.max_tokens)
            .field("temperature", &self.temperature)
            .field("max_retries", &self.max_retries)
            .field("retry_backoff_ms", &self.retry_backoff_ms)
            .finish()
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct DraftingConfig {
    #[serde(default)]
    pub student_name: String,
    #[serde(default)]
    pub student_background: String,
    #[serde(default = "default_subject")]
    pub default_subject: String,
    #[serde(default = "default_placeholder_markers")]
    pub placeholder_markers: Vec<String>,
    #[serde(default = "default_max_profile_chars")]
    pub max_profile_chars: usize,
}

impl Default for DraftingConfig {
    fn default() -> Self {
        Self {
            student_name: String::new(),
            student_background: String::new(),
            default_subject: default_subject(),
            placeholder_markers: default_placeholder_markers(),
            max_profile_chars: default_max_profile_chars(),
        }
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct ApprovalConfig {
    #[serde(default)]
    pub auto_approve: bool,
    /// Unset means wait forever.
    #[serde(default)]
    pub timeout_seconds: Option<u64>,
}

#[derive(Deserialize, Clone)]
pub struct SmtpConfig {
    #[serde(default = "default_smtp_host")]
    pub host: String,
    #[serde(default = "default_smtp_port")]
    pub port: u16,
    pub username: String,
    pub password: String,
    pub from: String,
    pub to: String,
    /// Extra attempts on transport errors only.
    #[serde(default)]
    pub max_retries: u32,
    #[serde(default = "default_send_backoff_ms")]
    pub retry_backoff_ms: u64,
}

// Manual Debug impl to avoid leaking the SMTP password
impl std::fmt::Debug for SmtpConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SmtpConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .field("from", &self.from)
            .field("to", &self.to)
            .field("max_retries", &self.max_retries)
            .field("retry_backoff_ms", &self.retry_backoff_ms)
            .finish()
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_primary_mode() -> ExtractMode {
    ExtractMode::PageText
}

fn default_fallback_mode() -> ExtractMode {
    ExtractMode::Scholar
}

fn default_fetch_timeout() -> u64 {
    15
}

fn default_user_agent() -> String {
    "Mozilla/5.0 (Macintosh; Intel Mac OS X) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120 Safari/537.36"
        .to_string()
}

fn default_keywords() -> Vec<String> {
    [
        "supply chain",
        "logistics",
        "revenue management",
        "pricing",
        "optimization",
        "operations research",
        "network simulation",
        "healthcare",
        "data analytics",
        "business optimization",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

fn default_model() -> String {
    "claude-sonnet-4-20250514".to_string()
}

fn default_max_tokens() -> u32 {
    1024
}

fn default_temperature() -> f32 {
    0.7
}

fn default_draft_retries() -> u32 {
    1
}

fn default_retry_backoff_ms() -> u64 {
    500
}

fn default_subject() -> String {
    "Prospective PhD Student - Research Interest".to_string()
}

fn default_placeholder_markers() -> Vec<String> {
    ["[Your Name]", "[Your Full Name]", "[Contact Information]", "["]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_max_profile_chars() -> usize {
    4000
}

fn default_smtp_host() -> String {
    "smtp.gmail.com".to_string()
}

fn default_smtp_port() -> u16 {
    465
}

fn default_send_backoff_ms() -> u64 {
    2000
}

impl AppConfig {
    pub fn load(config_path: Option<&str>) -> Result<Self> {
        let mut builder = config::Config::builder();

        // Load from file if specified
        if let Some(path) = config_path {
            builder = builder.add_source(config::File::with_name(path));
        } else {
            builder = builder.add_source(config::File::with_name("outreach").required(false));
        }

        // Environment variable overrides with OUTREACH_ prefix
        builder = builder.add_source(
            config::Environment::with_prefix("OUTREACH")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder
            .build()
            .map_err(|e| AppError::Config(e.to_string()))?;

        config
            .try_deserialize()
            .map_err(|e| AppError::Config(e.to_string()))
    }
}
