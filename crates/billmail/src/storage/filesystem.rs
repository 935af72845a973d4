use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use walkdir::WalkDir;

use crate::error::StorageError;

use super::{check_condition, ObjectMeta, ObjectStore, ObjectVersion, StoredObject, WriteCondition};

const TEMP_SUFFIX: &str = ".tmp";

/// Object store backed by a local directory acting as the bucket.
///
/// Writes land in a temporary sibling file first and are renamed into place,
/// so readers never observe a partially written ledger.
pub struct FsObjectStore {
    root: PathBuf,
}

impl FsObjectStore {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Maps a key onto a path below the root, rejecting traversal.
    fn resolve(&self, key: &str) -> Result<PathBuf, StorageError> {
        let relative = Path::new(key);
        let valid = !key.is_empty()
            && relative
                .components()
                .all(|c| matches!(c, Component::Normal(_)));
        if !valid {
            return Err(StorageError::InvalidKey(key.to_string()));
        }
        Ok(self.root.join(relative))
    }

    fn key_for(&self, path: &Path) -> Option<String> {
        let relative = path.strip_prefix(&self.root).ok()?;
        let parts: Vec<&str> = relative
            .components()
            .map(|c| c.as_os_str().to_str())
            .collect::<Option<Vec<_>>>()?;
        Some(parts.join("/"))
    }

    async fn current_version(&self, key: &str, path: &Path) -> Result<Option<ObjectVersion>, StorageError> {
        match tokio::fs::read(path).await {
            Ok(body) => Ok(Some(ObjectVersion::of(&body))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StorageError::Read {
                key: key.to_string(),
                source: e,
            }),
        }
    }
}

fn is_temp_file(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(|n| n.starts_with('.') && n.ends_with(TEMP_SUFFIX))
        .unwrap_or(false)
}

#[async_trait]
impl ObjectStore for FsObjectStore {
    async fn list(&self, prefix: &str) -> Result<Vec<ObjectMeta>, StorageError> {
        // Walk only the directory part of the prefix; the remainder filters names.
        let dir_part = match prefix.rfind('/') {
            Some(idx) => &prefix[..idx],
            None => "",
        };
        let start = if dir_part.is_empty() {
            self.root.clone()
        } else {
            self.resolve(dir_part)?
        };

        if !start.is_dir() {
            return Ok(Vec::new());
        }

        let mut objects = Vec::new();
        for entry in WalkDir::new(&start).follow_links(false) {
            let entry = entry.map_err(|e| StorageError::List {
                prefix: prefix.to_string(),
                reason: e.to_string(),
            })?;
            if !entry.file_type().is_file() || is_temp_file(entry.path()) {
                continue;
            }
            let Some(key) = self.key_for(entry.path()) else {
                log::warn!("Skipping non UTF-8 path {}", entry.path().display());
                continue;
            };
            if !key.starts_with(prefix) {
                continue;
            }
            let size = entry.metadata().map(|m| m.len()).unwrap_or(0);
            objects.push(ObjectMeta { key, size });
        }

        objects.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(objects)
    }

    async fn get(&self, key: &str) -> Result<Option<StoredObject>, StorageError> {
        let path = self.resolve(key)?;
        match tokio::fs::read(&path).await {
            Ok(body) => Ok(Some(StoredObject {
                version: ObjectVersion::of(&body),
                body,
            })),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StorageError::Read {
                key: key.to_string(),
                source: e,
            }),
        }
    }

    async fn put(
        &self,
        key: &str,
        body: &[u8],
        condition: WriteCondition,
    ) -> Result<ObjectVersion, StorageError> {
        let path = self.resolve(key)?;
        let write_err = |source| StorageError::Write {
            key: key.to_string(),
            source,
        };

        if condition != WriteCondition::Always {
            let current = self.current_version(key, &path).await?;
            check_condition(key, current.as_ref(), &condition)?;
        }

        let parent = path.parent().unwrap_or(&self.root).to_path_buf();
        tokio::fs::create_dir_all(&parent).await.map_err(write_err)?;

        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("object");
        let temp_path = parent.join(format!(
            ".{}.{}{}",
            file_name,
            uuid::Uuid::new_v4().simple(),
            TEMP_SUFFIX
        ));

        tokio::fs::write(&temp_path, body).await.map_err(write_err)?;
        if let Err(e) = tokio::fs::rename(&temp_path, &path).await {
            let _ = tokio::fs::remove_file(&temp_path).await;
            return Err(write_err(e));
        }

        Ok(ObjectVersion::of(body))
    }
}
