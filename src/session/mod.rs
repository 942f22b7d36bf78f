// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
pub mod migration;
pub mod store;
pub mod types;
pub mod visibility;

pub use migration::{LegacySession, MigrationError, MigrationOutcome, MigrationRecord, MigrationTracker};
pub use store::{SessionStore, SessionStoreError};
pub use types::{generate_session_id, now_millis, Session, SessionValidationError};
pub use visibility::{Subscription, VisibilityEvent, VisibilityValidator};
