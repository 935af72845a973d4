//! Object storage for inbound emails, ledgers and report artifacts.
//!
//! Keys are `/`-separated relative paths, the way a bucket names objects.
//! Every stored object carries a version token (a digest of its content) so
//! callers can make read-modify-write cycles conditional.

pub mod filesystem;
pub mod memory;

use async_trait::async_trait;
use sha2::{Digest, Sha256};

use crate::error::StorageError;

pub use filesystem::FsObjectStore;
pub use memory::MemoryObjectStore;

/// Opaque version token of a stored object.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ObjectVersion(String);

impl ObjectVersion {
    /// Computes the version token for the given object content.
    pub fn of(body: &[u8]) -> Self {
        let digest = Sha256::digest(body);
        Self(format!("{:x}", digest)[..16].to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Listing entry for a stored object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectMeta {
    pub key: String,
    pub size: u64,
}

/// An object body together with the version it was read at.
#[derive(Debug, Clone)]
pub struct StoredObject {
    pub body: Vec<u8>,
    pub version: ObjectVersion,
}

/// Precondition attached to a write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteCondition {
    /// Last writer wins.
    Always,
    /// Only create; fail if the key already exists.
    IfAbsent,
    /// Only replace the object if it is still at this version.
    IfVersion(ObjectVersion),
}

#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Lists objects whose key starts with `prefix`, sorted by key.
    async fn list(&self, prefix: &str) -> Result<Vec<ObjectMeta>, StorageError>;

    /// Reads an object. A missing key is `Ok(None)`, not an error.
    async fn get(&self, key: &str) -> Result<Option<StoredObject>, StorageError>;

    /// Writes an object in full, honoring `condition`.
    async fn put(
        &self,
        key: &str,
        body: &[u8],
        condition: WriteCondition,
    ) -> Result<ObjectVersion, StorageError>;
}

/// Checks a write precondition against the version currently stored.
pub(crate) fn check_condition(
    key: &str,
    current: Option<&ObjectVersion>,
    condition: &WriteCondition,
) -> Result<(), StorageError> {
    let satisfied = match (condition, current) {
        (WriteCondition::Always, _) => true,
        (WriteCondition::IfAbsent, current) => current.is_none(),
        (WriteCondition::IfVersion(expected), Some(current)) => expected == current,
        (WriteCondition::IfVersion(_), None) => false,
    };

    if satisfied {
        Ok(())
    } else {
        Err(StorageError::PreconditionFailed {
            key: key.to_string(),
        })
    }
}
