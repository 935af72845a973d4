//! Wiring of the production adapters from a loaded [`Config`].

use std::sync::Arc;
use std::time::Duration;

use log::{error, info};

use crate::analyzer::{DocumentAnalyzer, OpenAiAnalyzer, VisionReader};
use crate::config::{Config, ImageTextProvider, TransportKind};
use crate::delivery::{MailTransport, OutboxTransport, SmtpMailTransport};
use crate::error::{BillmailError, ConfigError};
use crate::ledger::LedgerStore;
use crate::pipeline::{Dispatcher, InvocationSummary, Orchestrator};
use crate::processor::ImageTextReader;
use crate::storage::{FsObjectStore, ObjectStore};

/// Builds an orchestrator backed by the filesystem store, the configured
/// analyzer endpoint and the configured mail transport.
pub fn build_orchestrator(config: &Config) -> Result<Orchestrator, BillmailError> {
    let store: Arc<dyn ObjectStore> = Arc::new(FsObjectStore::new(&config.storage.root));

    let api_key = config
        .analyzer
        .api_key_source()
        .resolve()
        .map_err(|source| ConfigError::Secret {
            name: "analyzer.api_key".to_string(),
            source,
        })?;
    let analyzer: Arc<dyn DocumentAnalyzer> = Arc::new(OpenAiAnalyzer::new(
        &config.analyzer.base_url,
        config.analyzer.model.clone(),
        api_key,
        config.analyzer.timeout(),
        config.analyzer.retry.policy(),
    )?);

    let image_reader = build_image_reader(config, Arc::clone(&analyzer))?;
    let transport = build_transport(config, Arc::clone(&store))?;

    info!(
        "Using store at {}, model {}, {:?} image text, {:?} delivery",
        config.storage.root, config.analyzer.model, config.image_text.provider, config.delivery.transport
    );

    Ok(Orchestrator::new(
        Arc::clone(&store),
        LedgerStore::new(store, config.storage.conditional_writes),
        Dispatcher::new(analyzer, image_reader),
        transport,
        config.orchestrator_settings(),
    ))
}

/// Builds the orchestrator and runs one invocation. A wiring failure is
/// reported as a 500 summary instead of an error.
pub async fn run_invocation(config: &Config) -> InvocationSummary {
    match build_orchestrator(config) {
        Ok(orchestrator) => orchestrator.run().await,
        Err(e) => {
            error!("Could not start the invocation: {}", e);
            InvocationSummary::failed(e)
        }
    }
}

fn build_image_reader(
    config: &Config,
    analyzer: Arc<dyn DocumentAnalyzer>,
) -> Result<Arc<dyn ImageTextReader>, ConfigError> {
    match config.image_text.provider {
        ImageTextProvider::Vision => Ok(Arc::new(VisionReader::new(analyzer))),
        #[cfg(feature = "tesseract")]
        ImageTextProvider::Tesseract => Ok(Arc::new(crate::processor::ocr::TesseractReader::new(
            &config.image_text.languages,
        ))),
        #[cfg(not(feature = "tesseract"))]
        ImageTextProvider::Tesseract => Err(ConfigError::Validation {
            message: "image_text.provider 'tesseract' requires building with the 'tesseract' feature"
                .to_string(),
        }),
    }
}

fn build_transport(
    config: &Config,
    store: Arc<dyn ObjectStore>,
) -> Result<Arc<dyn MailTransport>, BillmailError> {
    let delivery = &config.delivery;
    match delivery.transport {
        TransportKind::Outbox => Ok(Arc::new(OutboxTransport::new(
            store,
            delivery.outbox_prefix.clone(),
        ))),
        TransportKind::Smtp => {
            let smtp = delivery.smtp.as_ref().ok_or_else(|| ConfigError::Validation {
                message: "delivery.smtp is required for the smtp transport".to_string(),
            })?;
            let password = smtp
                .password_source()
                .resolve_optional()
                .map_err(|source| ConfigError::Secret {
                    name: "delivery.smtp.password".to_string(),
                    source,
                })?;
            let credentials = match (&smtp.username, password) {
                (Some(username), Some(password)) => Some((username.clone(), password)),
                _ => None,
            };
            Ok(Arc::new(SmtpMailTransport::new(
                &smtp.host,
                smtp.port,
                smtp.security,
                credentials,
                Duration::from_secs(smtp.timeout_secs),
            )?))
        }
    }
}
