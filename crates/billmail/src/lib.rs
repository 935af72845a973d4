pub mod analyzer;
pub mod app;
pub mod config;
pub mod delivery;
pub mod email;
pub mod error;
pub mod ledger;
pub mod pipeline;
pub mod processor;
pub mod secrets;
pub mod storage;

pub use app::{build_orchestrator, run_invocation};
pub use config::{load_config, Config};
pub use error::{BillmailError, ConfigError, ProcessError, StorageError};
pub use pipeline::{InvocationSummary, Orchestrator};
pub use secrets::{SecretError, SecretSource};
