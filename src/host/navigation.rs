// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use thiserror::Error;

pub type ProbeId = u64;

#[derive(Debug, Clone, Error)]
pub enum NavigationError {
    #[error("Navigation blocked: {0}")]
    Blocked(String),
}

/// Hidden navigation targets used to hand a deep link to the OS.
pub trait NavigationHost: Send + Sync {
    /// Attach an invisible element pointed at `url` and trigger it.
    fn attach_hidden_target(&self, url: &str) -> Result<ProbeId, NavigationError>;

    /// Remove a previously attached element. Unknown ids are ignored.
    fn remove_hidden_target(&self, id: ProbeId);

    /// Number of elements currently attached.
    fn active_targets(&self) -> usize;
}

type LaunchHook = Arc<dyn Fn(&str) + Send + Sync>;

/// In-process [`NavigationHost`] that tracks attached targets.
///
/// An optional launch hook sees every triggered URL; embedders use it to
/// forward the link to the platform, tests use it to simulate an app opening.
#[derive(Clone, Default)]
pub struct ProbeFrameRegistry {
    next_id: Arc<AtomicU64>,
    targets: Arc<Mutex<HashMap<ProbeId, String>>>,
    launched: Arc<Mutex<Vec<String>>>,
    hook: Option<LaunchHook>,
    blocked: bool,
}

impl ProbeFrameRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_launch_hook(hook: impl Fn(&str) + Send + Sync + 'static) -> Self {
        Self {
            hook: Some(Arc::new(hook)),
            ..Self::default()
        }
    }

    /// A registry whose every attach fails, as when a popup blocker intervenes.
    pub fn blocking() -> Self {
        Self {
            blocked: true,
            ..Self::default()
        }
    }

    /// Every URL triggered so far, in order.
    pub fn launched_urls(&self) -> Vec<String> {
        self.launched
            .lock()
            .map(|urls| urls.clone())
            .unwrap_or_default()
    }
}

impl NavigationHost for ProbeFrameRegistry {
    fn attach_hidden_target(&self, url: &str) -> Result<ProbeId, NavigationError> {
        if self.blocked {
            return Err(NavigationError::Blocked(url.to_string()));
        }
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut targets) = self.targets.lock() {
            targets.insert(id, url.to_string());
        }
        if let Ok(mut launched) = self.launched.lock() {
            launched.push(url.to_string());
        }
        if let Some(hook) = &self.hook {
            hook(url);
        }
        Ok(id)
    }

    fn remove_hidden_target(&self, id: ProbeId) {
        if let Ok(mut targets) = self.targets.lock() {
            targets.remove(&id);
        }
    }

    fn active_targets(&self) -> usize {
        self.targets.lock().map(|t| t.len()).unwrap_or(0)
    }
}
