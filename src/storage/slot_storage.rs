// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("I/O error on slot {slot}: {reason}")]
    Io { slot: String, reason: String },
    #[error("Invalid slot name: {0}")]
    InvalidSlot(String),
    #[error("Slot {slot} holds unreadable data: {reason}")]
    Corrupt { slot: String, reason: String },
}

/// Device-scoped key/value store holding whole string values.
///
/// Writes replace the previous value atomically: a concurrent `get` observes
/// either the old value or the new one, never a partial write.
#[async_trait]
pub trait SlotStorage: Send + Sync {
    async fn get(&self, slot: &str) -> Result<Option<String>, StorageError>;
    async fn set(&self, slot: &str, value: &str) -> Result<(), StorageError>;
    async fn remove(&self, slot: &str) -> Result<(), StorageError>;
}

/// In-memory slot storage, used for tests and ephemeral embeddings.
#[derive(Clone, Default)]
pub struct MemorySlotStorage {
    slots: Arc<RwLock<HashMap<String, String>>>,
}

impl MemorySlotStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.slots.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.slots.read().await.is_empty()
    }

    pub async fn contains(&self, slot: &str) -> bool {
        self.slots.read().await.contains_key(slot)
    }
}

#[async_trait]
impl SlotStorage for MemorySlotStorage {
    async fn get(&self, slot: &str) -> Result<Option<String>, StorageError> {
        Ok(self.slots.read().await.get(slot).cloned())
    }

    async fn set(&self, slot: &str, value: &str) -> Result<(), StorageError> {
        self.slots
            .write()
            .await
            .insert(slot.to_string(), value.to_string());
        Ok(())
    }

    async fn remove(&self, slot: &str) -> Result<(), StorageError> {
        self.slots.write().await.remove(slot);
        Ok(())
    }
}
