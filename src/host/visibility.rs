// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Foreground/background signal
//!
//! The host pushes page visibility changes into a [`VisibilitySignal`]; the
//! session validator and the deep-link probe both listen on it. Only real
//! transitions are broadcast.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VisibilityState {
    Visible,
    Hidden,
}

#[derive(Clone)]
pub struct VisibilitySignal {
    sender: broadcast::Sender<VisibilityState>,
    hidden: Arc<AtomicBool>,
}

impl VisibilitySignal {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(32);
        Self {
            sender,
            hidden: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<VisibilityState> {
        self.sender.subscribe()
    }

    pub fn is_hidden(&self) -> bool {
        self.hidden.load(Ordering::SeqCst)
    }

    /// Record the host's current visibility. Emits only on change.
    pub fn set_hidden(&self, hidden: bool) {
        let previous = self.hidden.swap(hidden, Ordering::SeqCst);
        if previous == hidden {
            return;
        }
        let state = if hidden {
            VisibilityState::Hidden
        } else {
            VisibilityState::Visible
        };
        // No receivers is fine; nobody is listening yet.
        let _ = self.sender.send(state);
        tracing::debug!("Page visibility changed: {:?}", state);
    }

    /// Number of live listeners.
    pub fn listener_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for VisibilitySignal {
    fn default() -> Self {
        Self::new()
    }
}
