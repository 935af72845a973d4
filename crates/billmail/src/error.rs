use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BillmailError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Analyzer error: {0}")]
    Analyzer(#[from] crate::analyzer::AnalyzerError),

    #[error("Delivery error: {0}")]
    Delivery(#[from] crate::delivery::DeliveryError),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config JSON: {0}")]
    ParseJson(#[from] serde_json::Error),

    #[error("Config validation failed: {message}")]
    Validation { message: String },

    #[error("Schema validation failed: {errors}")]
    SchemaValidation { errors: String },

    #[error("Secret for '{name}' could not be resolved: {source}")]
    Secret {
        name: String,
        #[source]
        source: crate::secrets::SecretError,
    },
}

#[derive(Error, Debug)]
pub enum ProcessError {
    #[error("Unsupported document format: {0}")]
    UnsupportedFormat(String),

    #[error("Failed to process PDF: {0}")]
    PdfProcessing(String),

    #[error("Failed to process image: {0}")]
    ImageProcessing(String),

    #[error("Failed to open archive: {0}")]
    ArchiveOpen(String),

    #[error("Failed to read archive entry '{name}': {reason}")]
    ArchiveEntry { name: String, reason: String },

    #[error("OCR failed: {0}")]
    OcrFailed(String),

    #[error("Text extraction failed: {0}")]
    TextExtraction(String),
}

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Failed to read object '{key}': {source}")]
    Read {
        key: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write object '{key}': {source}")]
    Write {
        key: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to list objects under '{prefix}': {reason}")]
    List { prefix: String, reason: String },

    #[error("Invalid object key '{0}'")]
    InvalidKey(String),

    #[error("Conditional write rejected for '{key}': object changed since it was read")]
    PreconditionFailed { key: String },
}
