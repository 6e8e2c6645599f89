//! Bluetooth Module
//!
//! Decoding and subscription engine between a BLE transport and the host
//! application.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                   OpenSpatialService                     │
//! │  (Main coordinator - public API for the application)     │
//! └──────────┬──────────────────┬───────────────┬───────────┘
//!            │                  │               │
//!            ▼                  ▼               ▼
//! ┌──────────────────┐ ┌─────────────────┐ ┌──────────────┐
//! │  Subscriptions   │ │   Dispatcher    │ │   Requests   │
//! │                  │ │                 │ │              │
//! │ - one listener   │ │ - upcalls from  │ │ - get / set  │
//! │   per stream     │ │   the transport │ │   responses  │
//! │ - enable/disable │ │ - link states   │ │              │
//! └────────┬─────────┘ └────────┬────────┘ └──────────────┘
//!          │                    │
//!          ▼                    ▼
//! ┌──────────────────┐ ┌─────────────────┐
//! │    Transport     │ │ Codec/Protocol  │
//! │ (platform BLE)   │ │ - payloads      │
//! │                  │ │ - commands      │
//! └──────────────────┘ └─────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`codec`] - Sensor payload decoding
//! - [`protocol`] - Characteristic UUIDs, command and response frames
//! - [`transport`] - Contract the platform BLE adapter implements
//! - [`subscriptions`] - Per-device, per-stream listener registry
//! - [`requests`] - Outstanding get/set requests awaiting a response
//! - [`dispatcher`] - Routes transport upcalls to the codec and listeners
//! - [`service`] - Main service coordinator

pub mod codec;
pub mod dispatcher;
pub mod protocol;
pub mod requests;
pub mod service;
pub mod subscriptions;
pub mod transport;

// Re-export main service for convenience
pub use service::{OpenSpatialService, ServiceConfig};

use crate::domain::events::StatusEvent;
use std::sync::{Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tokio::sync::mpsc;

/// Sending half of the status channel
pub type StatusSender = mpsc::UnboundedSender<StatusEvent>;

// Listeners never run under these locks, so a poisoned lock still holds
// consistent data.

pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

pub(crate) fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

pub(crate) fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}
