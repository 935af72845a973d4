use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::analyzer::RetryPolicy;
use crate::delivery::smtp::SmtpSecurity;
use crate::pipeline::OrchestratorSettings;
use crate::secrets::SecretSource;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub version: String,
    pub storage: StorageConfig,
    #[serde(default)]
    pub analyzer: AnalyzerConfig,
    #[serde(default)]
    pub image_text: ImageTextConfig,
    #[serde(default)]
    pub delivery: DeliveryConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    pub fn orchestrator_settings(&self) -> OrchestratorSettings {
        OrchestratorSettings {
            email_prefix: self.storage.email_prefix.clone(),
            report_prefix: self.storage.report_prefix.clone(),
            from_address: self.delivery.from_address.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Directory acting as the bucket.
    pub root: String,
    #[serde(default = "default_email_prefix")]
    pub email_prefix: String,
    #[serde(default = "default_report_prefix")]
    pub report_prefix: String,
    #[serde(default)]
    pub conditional_writes: bool,
}

fn default_email_prefix() -> String {
    "Emails/".to_string()
}

fn default_report_prefix() -> String {
    "processed_invoices/".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyzerConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub api_key_file: Option<String>,
    #[serde(default = "default_api_key_env_var")]
    pub api_key_env_var: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub retry: RetryConfig,
}

fn default_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_model() -> String {
    "gpt-4o".to_string()
}

fn default_api_key_env_var() -> Option<String> {
    Some("OPENAI_API_KEY".to_string())
}

fn default_timeout_secs() -> u64 {
    60
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            model: default_model(),
            api_key: None,
            api_key_file: None,
            api_key_env_var: default_api_key_env_var(),
            timeout_secs: default_timeout_secs(),
            retry: RetryConfig::default(),
        }
    }
}

impl AnalyzerConfig {
    pub fn api_key_source(&self) -> SecretSource<'_> {
        SecretSource::new(
            self.api_key.as_deref(),
            self.api_key_file.as_deref(),
            self.api_key_env_var.as_deref(),
        )
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_delay_ms")]
    pub base_delay_ms: u64,
    #[serde(default = "default_delay_ms")]
    pub jitter_ms: u64,
    #[serde(default = "default_delay_ms")]
    pub transient_pause_ms: u64,
}

fn default_max_attempts() -> u32 {
    3
}

fn default_delay_ms() -> u64 {
    1000
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_ms: default_delay_ms(),
            jitter_ms: default_delay_ms(),
            transient_pause_ms: default_delay_ms(),
        }
    }
}

impl RetryConfig {
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            base_delay: Duration::from_millis(self.base_delay_ms),
            jitter: Duration::from_millis(self.jitter_ms),
            transient_pause: Duration::from_millis(self.transient_pause_ms),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageTextProvider {
    /// The analyzer's vision endpoint.
    #[default]
    Vision,
    /// Local Tesseract OCR. Requires the `tesseract` feature.
    Tesseract,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageTextConfig {
    #[serde(default)]
    pub provider: ImageTextProvider,
    #[serde(default = "default_languages")]
    pub languages: Vec<String>,
}

fn default_languages() -> Vec<String> {
    vec!["eng".to_string()]
}

impl Default for ImageTextConfig {
    fn default() -> Self {
        Self {
            provider: ImageTextProvider::default(),
            languages: default_languages(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    Smtp,
    /// Write messages as `.eml` objects.
    #[default]
    Outbox,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryConfig {
    #[serde(default)]
    pub transport: TransportKind,
    #[serde(default = "default_from_address")]
    pub from_address: String,
    #[serde(default = "default_outbox_prefix")]
    pub outbox_prefix: String,
    #[serde(default)]
    pub smtp: Option<SmtpConfig>,
}

fn default_from_address() -> String {
    "noreply@yourdomain.com".to_string()
}

fn default_outbox_prefix() -> String {
    "outbox/".to_string()
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            transport: TransportKind::default(),
            from_address: default_from_address(),
            outbox_prefix: default_outbox_prefix(),
            smtp: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SmtpConfig {
    pub host: String,
    #[serde(default = "default_smtp_port")]
    pub port: u16,
    #[serde(default)]
    pub security: SmtpSecurity,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub password_file: Option<String>,
    #[serde(default)]
    pub password_env_var: Option<String>,
    #[serde(default = "default_smtp_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_smtp_port() -> u16 {
    587
}

fn default_smtp_timeout_secs() -> u64 {
    30
}

impl SmtpConfig {
    pub fn password_source(&self) -> SecretSource<'_> {
        SecretSource::new(
            self.password.as_deref(),
            self.password_file.as_deref(),
            self.password_env_var.as_deref(),
        )
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_level")]
    pub level: String,
    #[serde(default)]
    pub format: LogFormat,
}

fn default_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            format: LogFormat::default(),
        }
    }
}
