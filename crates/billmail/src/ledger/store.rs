//! Loading and saving ledgers through the object store.

use std::sync::Arc;

use chrono::Utc;
use log::{debug, error, info, warn};

use crate::email::EmailSignature;
use crate::error::StorageError;
use crate::storage::{ObjectStore, WriteCondition};

use super::{Ledger, LedgerError, LedgerRecord};

/// Default number of conditional write attempts before giving up.
pub const DEFAULT_CONFLICT_ATTEMPTS: usize = 3;

/// Reads and writes ledger documents.
///
/// With conditional writes enabled every save is guarded by the version the
/// ledger was read at. A concurrent change triggers a reload, the pending
/// records are applied on top and the save is retried.
pub struct LedgerStore {
    store: Arc<dyn ObjectStore>,
    conditional_writes: bool,
    conflict_attempts: usize,
}

impl LedgerStore {
    pub fn new(store: Arc<dyn ObjectStore>, conditional_writes: bool) -> Self {
        Self {
            store,
            conditional_writes,
            conflict_attempts: DEFAULT_CONFLICT_ATTEMPTS,
        }
    }

    pub fn with_conflict_attempts(mut self, attempts: usize) -> Self {
        self.conflict_attempts = attempts.max(1);
        self
    }

    /// Loads a ledger, falling back to an empty view on any failure.
    ///
    /// A document that exists but cannot be decoded keeps its version so the
    /// next save replaces it.
    pub async fn load<R: LedgerRecord>(&self) -> Ledger<R> {
        match self.store.get(R::OBJECT_KEY).await {
            Ok(Some(object)) => {
                match Ledger::<R>::decode(&object.body, Some(object.version.clone())) {
                    Ok(ledger) => {
                        info!("Loaded {} records from {}", ledger.len(), R::OBJECT_KEY);
                        ledger
                    }
                    Err(e) => {
                        warn!("{}; starting from an empty ledger", e);
                        Ledger::new(Default::default(), Some(object.version))
                    }
                }
            }
            Ok(None) => {
                info!("No existing {} found, starting fresh", R::OBJECT_KEY);
                Ledger::default()
            }
            Err(e) => {
                error!("Could not read {}: {}; starting from an empty ledger", R::OBJECT_KEY, e);
                Ledger::default()
            }
        }
    }

    /// Inserts a record and persists the whole ledger.
    ///
    /// The record stays in the in-memory view even when the save fails.
    pub async fn record<R: LedgerRecord>(
        &self,
        ledger: &mut Ledger<R>,
        signature: EmailSignature,
        record: R,
    ) -> Result<(), LedgerError> {
        ledger.insert(signature, record);
        self.save(ledger).await
    }

    /// Writes the ledger document, replacing what is stored.
    pub async fn save<R: LedgerRecord>(&self, ledger: &mut Ledger<R>) -> Result<(), LedgerError> {
        if !self.conditional_writes {
            let body = ledger.encode(&Utc::now().to_rfc3339())?;
            let version = self
                .store
                .put(R::OBJECT_KEY, &body, WriteCondition::Always)
                .await?;
            ledger.set_version(Some(version));
            debug!("Saved {} ({} records)", R::OBJECT_KEY, ledger.len());
            return Ok(());
        }

        for attempt in 1..=self.conflict_attempts {
            let condition = match ledger.version() {
                Some(version) => WriteCondition::IfVersion(version.clone()),
                None => WriteCondition::IfAbsent,
            };
            let body = ledger.encode(&Utc::now().to_rfc3339())?;

            match self.store.put(R::OBJECT_KEY, &body, condition).await {
                Ok(version) => {
                    ledger.set_version(Some(version));
                    debug!(
                        "Saved {} ({} records, attempt {})",
                        R::OBJECT_KEY,
                        ledger.len(),
                        attempt
                    );
                    return Ok(());
                }
                Err(StorageError::PreconditionFailed { .. }) => {
                    warn!(
                        "{} changed since it was read (attempt {}/{}), merging",
                        R::OBJECT_KEY,
                        attempt,
                        self.conflict_attempts
                    );
                    self.merge_latest(ledger).await?;
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(LedgerError::Conflict {
            key: R::OBJECT_KEY.to_string(),
            attempts: self.conflict_attempts,
        })
    }

    /// Re-reads the stored document and applies the in-memory records on top.
    async fn merge_latest<R: LedgerRecord>(&self, ledger: &mut Ledger<R>) -> Result<(), LedgerError> {
        let Some(object) = self.store.get(R::OBJECT_KEY).await? else {
            ledger.set_version(None);
            return Ok(());
        };

        let mut latest = match Ledger::<R>::decode(&object.body, Some(object.version.clone())) {
            Ok(latest) => latest,
            Err(e) => {
                warn!("{}; overwriting it", e);
                Ledger::new(Default::default(), Some(object.version))
            }
        };
        for (signature, record) in ledger.records() {
            latest.insert(signature.clone(), record.clone());
        }
        *ledger = latest;
        Ok(())
    }
}
