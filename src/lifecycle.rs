//! Worker lifecycle: install and activate hooks
//!
//! A worker moves through `Installing → Waiting → Active`, and becomes
//! `Redundant` once a newer worker replaces it. During install it
//! may ask to skip the waiting phase; during activation it may ask to take
//! control of clients that were opened before it. The host awaits each hook
//! before moving the worker on (see `Registration`).

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;

use crate::data::ManifestRequest;
use crate::interceptor::{Interception, InterceptError};

/// Position of a worker in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    /// Install hook is running
    Installing,
    /// Installed, held back until the previous active worker is released
    Waiting,
    /// Handling requests for the clients it controls
    Active,
    /// Replaced or released; still serves clients it controls until they close
    Redundant,
}

impl fmt::Display for WorkerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            WorkerState::Installing => "installing",
            WorkerState::Waiting => "waiting",
            WorkerState::Active => "active",
            WorkerState::Redundant => "redundant",
        };
        f.write_str(name)
    }
}

/// Requests a worker makes to its host from inside a lifecycle hook
///
/// Both requests are idempotent; asking twice is the same as asking once.
#[derive(Debug, Default)]
pub struct LifecycleSignals {
    skip_waiting: AtomicBool,
    claim_clients: AtomicBool,
}

impl LifecycleSignals {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask to become active without waiting for the previous worker to be released
    pub fn skip_waiting(&self) {
        self.skip_waiting.store(true, Ordering::SeqCst);
    }

    /// Ask to control every open client as soon as activation completes
    pub fn claim_clients(&self) {
        self.claim_clients.store(true, Ordering::SeqCst);
    }

    pub fn skip_waiting_requested(&self) -> bool {
        self.skip_waiting.load(Ordering::SeqCst)
    }

    pub fn claim_requested(&self) -> bool {
        self.claim_clients.load(Ordering::SeqCst)
    }
}

/// A request-handling worker hosted by a `Registration`
#[async_trait]
pub trait Worker: Send + Sync {
    /// Called once when the worker is installed
    async fn on_install(&self, signals: &LifecycleSignals);

    /// Called once when the worker becomes active
    async fn on_activate(&self, signals: &LifecycleSignals);

    /// Called for every request issued by a client this worker controls
    async fn on_fetch(&self, request: &ManifestRequest) -> Result<Interception, InterceptError>;
}
