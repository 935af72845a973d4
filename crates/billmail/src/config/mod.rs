pub mod loader;
pub mod schema;

pub use loader::{load_config, load_config_from_str};
pub use schema::{
    AnalyzerConfig, Config, DeliveryConfig, ImageTextConfig, ImageTextProvider, LogFormat,
    LoggingConfig, RetryConfig, SmtpConfig, StorageConfig, TransportKind,
};
