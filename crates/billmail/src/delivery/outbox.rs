use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tracing::info;
use uuid::Uuid;

use crate::storage::{ObjectStore, WriteCondition};

use super::{DeliveryError, MailTransport, OutboundMessage};

/// Writes each message as an `.eml` object instead of sending it.
///
/// Useful for dry runs and for deployments where another system picks the
/// messages up.
pub struct OutboxTransport {
    store: Arc<dyn ObjectStore>,
    prefix: String,
}

impl OutboxTransport {
    pub fn new(store: Arc<dyn ObjectStore>, prefix: impl Into<String>) -> Self {
        let mut prefix = prefix.into();
        if !prefix.is_empty() && !prefix.ends_with('/') {
            prefix.push('/');
        }
        Self { store, prefix }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }
}

#[async_trait]
impl MailTransport for OutboxTransport {
    async fn send(&self, message: &OutboundMessage) -> Result<(), DeliveryError> {
        let email = message.to_mime()?;
        let key = format!(
            "{}{}_{}.eml",
            self.prefix,
            Utc::now().format("%Y%m%d_%H%M%S"),
            Uuid::new_v4()
        );

        self.store
            .put(&key, &email.formatted(), WriteCondition::IfAbsent)
            .await?;

        info!("Queued message to {} as {}", message.to, key);
        Ok(())
    }
}
