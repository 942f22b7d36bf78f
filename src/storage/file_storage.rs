// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Directory-backed slot storage
//!
//! Each slot is a single file named after the slot. Writes go to a temporary
//! file in the same directory which is then renamed over the target, so a
//! reader never sees a half-written envelope.

use async_trait::async_trait;
use std::io::Write;
use std::path::{Path, PathBuf};

use super::slot_storage::{SlotStorage, StorageError};

#[derive(Debug, Clone)]
pub struct FileSlotStorage {
    root: PathBuf,
}

impl FileSlotStorage {
    /// Open (and create if needed) a slot directory.
    pub async fn open(root: impl AsRef<Path>) -> Result<Self, StorageError> {
        let root = root.as_ref().to_path_buf();
        tokio::fs::create_dir_all(&root)
            .await
            .map_err(|e| StorageError::Io {
                slot: root.display().to_string(),
                reason: e.to_string(),
            })?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn slot_path(&self, slot: &str) -> Result<PathBuf, StorageError> {
        let valid = !slot.is_empty()
            && slot
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        if !valid {
            return Err(StorageError::InvalidSlot(slot.to_string()));
        }
        Ok(self.root.join(format!("{}.slot", slot)))
    }
}

#[async_trait]
impl SlotStorage for FileSlotStorage {
    async fn get(&self, slot: &str) -> Result<Option<String>, StorageError> {
        let path = self.slot_path(slot)?;
        match tokio::fs::read_to_string(&path).await {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) if e.kind() == std::io::ErrorKind::InvalidData => Err(StorageError::Corrupt {
                slot: slot.to_string(),
                reason: e.to_string(),
            }),
            Err(e) => Err(StorageError::Io {
                slot: slot.to_string(),
                reason: e.to_string(),
            }),
        }
    }

    async fn set(&self, slot: &str, value: &str) -> Result<(), StorageError> {
        let path = self.slot_path(slot)?;
        let root = self.root.clone();
        let value = value.to_string();
        let slot_name = slot.to_string();

        tokio::task::spawn_blocking(move || -> std::io::Result<()> {
            let mut tmp = tempfile::NamedTempFile::new_in(&root)?;
            tmp.write_all(value.as_bytes())?;
            tmp.as_file().sync_all()?;
            tmp.persist(&path).map_err(|e| e.error)?;
            Ok(())
        })
        .await
        .map_err(|e| StorageError::Io {
            slot: slot_name.clone(),
            reason: format!("write task failed: {}", e),
        })?
        .map_err(|e| StorageError::Io {
            slot: slot_name,
            reason: e.to_string(),
        })
    }

    async fn remove(&self, slot: &str) -> Result<(), StorageError> {
        let path = self.slot_path(slot)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StorageError::Io {
                slot: slot.to_string(),
                reason: e.to_string(),
            }),
        }
    }
}
