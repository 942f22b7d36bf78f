// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Session revalidation on foreground/background transitions
//!
//! A user who leaves to sign in a wallet app can come back hours later. When
//! the page returns to the foreground the stored session is loaded again so
//! expiry that happened in the background is caught before the app acts on a
//! dead session. Going to the background is the cheap path: observers are told
//! the page is hidden and nothing is reloaded.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;

use super::store::SessionStore;
use crate::host::{VisibilitySignal, VisibilityState};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VisibilityEvent {
    pub visible: bool,
    pub session_valid: bool,
}

type Observer = Arc<dyn Fn(VisibilityEvent) + Send + Sync>;
type ObserverMap = Mutex<HashMap<u64, Observer>>;

#[derive(Clone, Default)]
struct ObserverRegistry {
    next_id: Arc<AtomicU64>,
    observers: Arc<ObserverMap>,
}

impl ObserverRegistry {
    fn register(&self, observer: Observer) -> Subscription {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut observers) = self.observers.lock() {
            observers.insert(id, observer);
        }
        Subscription {
            id,
            observers: Arc::downgrade(&self.observers),
        }
    }

    fn notify(&self, event: VisibilityEvent) {
        // Snapshot so an observer may unsubscribe from inside its callback
        let snapshot: Vec<Observer> = match self.observers.lock() {
            Ok(observers) => observers.values().cloned().collect(),
            Err(_) => return,
        };
        for observer in snapshot {
            observer(event);
        }
    }

    fn len(&self) -> usize {
        self.observers.lock().map(|o| o.len()).unwrap_or(0)
    }
}

/// Handle returned by [`VisibilityValidator::on_visibility_change`].
///
/// The callback stays registered while the handle lives; dropping it or
/// calling [`Subscription::dispose`] detaches the callback.
#[must_use = "dropping the subscription immediately unregisters the callback"]
pub struct Subscription {
    id: u64,
    observers: Weak<ObserverMap>,
}

impl Subscription {
    pub fn dispose(self) {
        drop(self);
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(observers) = self.observers.upgrade() {
            if let Ok(mut observers) = observers.lock() {
                observers.remove(&self.id);
            }
        }
    }
}

pub struct VisibilityValidator {
    signal: VisibilitySignal,
    store: Arc<SessionStore>,
    observers: ObserverRegistry,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl VisibilityValidator {
    pub fn new(signal: VisibilitySignal, store: Arc<SessionStore>) -> Self {
        Self {
            signal,
            store,
            observers: ObserverRegistry::default(),
            task: Mutex::new(None),
        }
    }

    pub fn on_visibility_change(&self, callback: impl Fn(VisibilityEvent) + Send + Sync + 'static) -> Subscription {
        self.observers.register(Arc::new(callback))
    }

    pub fn observer_count(&self) -> usize {
        self.observers.len()
    }

    /// Start listening. Calling `start` on a running validator is a no-op.
    pub fn start(&self) {
        let Ok(mut task) = self.task.lock() else {
            return;
        };
        if task.as_ref().map(|t| !t.is_finished()).unwrap_or(false) {
            return;
        }

        let mut rx = self.signal.subscribe();
        let store = self.store.clone();
        let observers = self.observers.clone();

        *task = Some(tokio::spawn(async move {
            loop {
                let state = match rx.recv().await {
                    Ok(state) => state,
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::debug!("Visibility listener skipped {} transitions", skipped);
                        continue;
                    }
                    Err(RecvError::Closed) => break,
                };

                match state {
                    VisibilityState::Hidden => observers.notify(VisibilityEvent {
                        visible: false,
                        session_valid: true,
                    }),
                    VisibilityState::Visible => {
                        let session_valid = revalidate(&store).await;
                        observers.notify(VisibilityEvent {
                            visible: true,
                            session_valid,
                        });
                    }
                }
            }
        }));
        tracing::debug!("Visibility validator started");
    }

    /// Stop listening and release the signal subscription.
    pub fn stop(&self) {
        if let Ok(mut task) = self.task.lock() {
            if let Some(handle) = task.take() {
                handle.abort();
                tracing::debug!("Visibility validator stopped");
            }
        }
    }

    pub fn is_running(&self) -> bool {
        self.task
            .lock()
            .map(|t| t.as_ref().map(|h| !h.is_finished()).unwrap_or(false))
            .unwrap_or(false)
    }

    /// Re-check the stored session now, as on a return to the foreground.
    pub async fn revalidate(&self) -> bool {
        revalidate(&self.store).await
    }
}

impl Drop for VisibilityValidator {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn revalidate(store: &SessionStore) -> bool {
    match store.revalidate().await {
        Ok(Some(_)) => true,
        Ok(None) => {
            tracing::info!("Session gone or expired while backgrounded");
            false
        }
        Err(e) => {
            tracing::warn!("Could not refresh session on foreground: {}", e);
            store.load().await.is_some()
        }
    }
}
