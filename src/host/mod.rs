// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Host integration points
//!
//! Everything the auth flow needs from the embedding runtime (page origin,
//! user agent, crypto availability, foreground/background signal, hidden
//! navigation targets) is expressed as a trait or a small hub here so the
//! rest of the crate stays host-agnostic.

pub mod environment;
pub mod navigation;
pub mod visibility;

pub use environment::{check_security_support, DeviceTraits, HostEnvironment, SecuritySupport, StaticHost};
pub use navigation::{NavigationError, NavigationHost, ProbeFrameRegistry, ProbeId};
pub use visibility::{VisibilitySignal, VisibilityState};
