use std::collections::BTreeMap;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::StorageError;

use super::{check_condition, ObjectMeta, ObjectStore, ObjectVersion, StoredObject, WriteCondition};

/// In-process object store. Used by tests and dry runs.
#[derive(Default)]
pub struct MemoryObjectStore {
    objects: Mutex<BTreeMap<String, Vec<u8>>>,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts an object unconditionally.
    pub fn insert(&self, key: impl Into<String>, body: impl Into<Vec<u8>>) {
        self.lock().insert(key.into(), body.into());
    }

    /// Returns a copy of an object's body, if present.
    pub fn body(&self, key: &str) -> Option<Vec<u8>> {
        self.lock().get(key).cloned()
    }

    /// All keys currently stored, in order.
    pub fn keys(&self) -> Vec<String> {
        self.lock().keys().cloned().collect()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BTreeMap<String, Vec<u8>>> {
        // A poisoned map is still a consistent map: every mutation is a single insert.
        self.objects.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn list(&self, prefix: &str) -> Result<Vec<ObjectMeta>, StorageError> {
        Ok(self
            .lock()
            .iter()
            .filter(|(key, _)| key.starts_with(prefix))
            .map(|(key, body)| ObjectMeta {
                key: key.clone(),
                size: body.len() as u64,
            })
            .collect())
    }

    async fn get(&self, key: &str) -> Result<Option<StoredObject>, StorageError> {
        Ok(self.lock().get(key).map(|body| StoredObject {
            version: ObjectVersion::of(body),
            body: body.clone(),
        }))
    }

    async fn put(
        &self,
        key: &str,
        body: &[u8],
        condition: WriteCondition,
    ) -> Result<ObjectVersion, StorageError> {
        let mut objects = self.lock();
        let current = objects.get(key).map(|b| ObjectVersion::of(b));
        check_condition(key, current.as_ref(), &condition)?;
        objects.insert(key.to_string(), body.to_vec());
        Ok(ObjectVersion::of(body))
    }
}
