// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Directory blob backend, sharded by key.
//!
//! An object lives in a subdirectory named after the segment of its name
//! before the first `_`, so every version of a key shares one shard:
//!
//! ```text
//! {root}/64f1c2/64f1c2_20251019120500.json
//! {root}/_/plain.json                        (no `_` in the name)
//! ```
//!
//! Listing a prefix that contains `_` reads only that shard. Shorter
//! prefixes fall back to walking every shard.
//!
//! Writes go to a hidden temporary file first and are renamed into place, so
//! readers never see a partially written object.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;

use crate::storage::traits::{BlobBackend, StorageError};

/// Shard for names without a key segment.
const UNSHARDED: &str = "_";

pub struct FsBlobBackend {
    root: PathBuf,
}

impl FsBlobBackend {
    /// Open (creating if needed) a blob directory.
    pub async fn open(root: impl AsRef<Path>) -> Result<Self, StorageError> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root)
            .await
            .map_err(|e| StorageError::Backend(format!("Failed to create {}: {}", root.display(), e)))?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the object `name`, inside its shard.
    pub fn path_of(&self, name: &str) -> Result<PathBuf, StorageError> {
        if name.is_empty()
            || name.starts_with('.')
            || name.contains(['/', '\\'])
            || name.chars().any(char::is_control)
        {
            return Err(StorageError::InvalidName(name.to_string()));
        }
        Ok(self.root.join(shard(name)).join(name))
    }

    /// Names in one shard directory starting with `prefix`. A missing shard is empty.
    async fn list_shard(&self, dir: &Path, prefix: &str, names: &mut Vec<String>) -> Result<(), StorageError> {
        let mut entries = match fs::read_dir(dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(io_err("list", prefix, e)),
        };

        while let Some(entry) = entries.next_entry().await.map_err(|e| io_err("list", prefix, e))? {
            let Ok(name) = entry.file_name().into_string() else {
                continue;
            };
            if name.starts_with('.') || !name.starts_with(prefix) {
                continue;
            }
            names.push(name);
        }
        Ok(())
    }
}

/// Shard directory for an object name.
fn shard(name: &str) -> &str {
    match name.split_once('_') {
        Some((key, _)) if !key.is_empty() => key,
        _ => UNSHARDED,
    }
}

fn io_err(op: &str, name: &str, e: std::io::Error) -> StorageError {
    StorageError::Backend(format!("{} '{}' failed: {}", op, name, e))
}

#[async_trait]
impl BlobBackend for FsBlobBackend {
    async fn put(&self, name: &str, data: Vec<u8>) -> Result<(), StorageError> {
        let path = self.path_of(name)?;
        let dir = self.root.join(shard(name));
        fs::create_dir_all(&dir).await.map_err(|e| io_err("mkdir", name, e))?;

        let tmp = dir.join(format!(".{}.{}.tmp", name, uuid::Uuid::new_v4().simple()));
        fs::write(&tmp, &data).await.map_err(|e| io_err("write", name, e))?;
        if let Err(e) = fs::rename(&tmp, &path).await {
            let _ = fs::remove_file(&tmp).await;
            return Err(io_err("rename", name, e));
        }
        Ok(())
    }

    async fn get(&self, name: &str) -> Result<Option<Vec<u8>>, StorageError> {
        let path = self.path_of(name)?;
        match fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(io_err("read", name, e)),
        }
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
        let mut names = Vec::new();

        if prefix.contains('_') && !prefix.starts_with('_') {
            // Every name starting with `prefix` shares its first segment
            self.list_shard(&self.root.join(shard(prefix)), prefix, &mut names).await?;
        } else {
            let mut shards = fs::read_dir(&self.root)
                .await
                .map_err(|e| io_err("list", prefix, e))?;
            while let Some(entry) = shards.next_entry().await.map_err(|e| io_err("list", prefix, e))? {
                if entry.file_type().await.map(|t| t.is_dir()).unwrap_or(false) {
                    self.list_shard(&entry.path(), prefix, &mut names).await?;
                }
            }
        }

        names.sort();
        Ok(names)
    }

    async fn delete(&self, name: &str) -> Result<bool, StorageError> {
        let path = self.path_of(name)?;
        match fs::remove_file(&path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(io_err("delete", name, e)),
        }
    }
}
