//! Host-side registration of workers and the clients they control
//!
//! `Registration` plays the part of the runtime: it installs and activates
//! workers, tracks which worker version controls each open client, and routes
//! a client's requests through its controller or straight to the network.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::data::{Fetcher, ManifestRequest};
use crate::interceptor::{InterceptError, Interception, ResponseSource, Served};
use crate::lifecycle::{LifecycleSignals, Worker, WorkerState};

/// Identifier of an open client (a page, a CLI session)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ClientId(u64);

/// Version number handed out to each registered worker, starting at 1
pub type WorkerVersion = u64;

struct Slot<W> {
    worker: Arc<W>,
    state: WorkerState,
}

struct Inner<W> {
    workers: HashMap<WorkerVersion, Slot<W>>,
    active: Option<WorkerVersion>,
    waiting: Option<WorkerVersion>,
    /// Controller of each open client, `None` when uncontrolled
    clients: HashMap<ClientId, Option<WorkerVersion>>,
    next_version: WorkerVersion,
    next_client: u64,
}

impl<W> Inner<W> {
    /// Drops workers that are neither current nor controlling any client
    fn prune(&mut self) {
        let active = self.active;
        let waiting = self.waiting;
        let clients = &self.clients;
        self.workers.retain(|version, slot| {
            let keep = Some(*version) == active
                || Some(*version) == waiting
                || slot.state == WorkerState::Installing
                || clients.values().any(|c| *c == Some(*version));
            if !keep {
                tracing::debug!(version, "retiring worker");
            }
            keep
        });
    }

    /// Marks `version` as replaced; it lingers only while clients use it
    fn retire(&mut self, version: WorkerVersion) {
        if let Some(slot) = self.workers.get_mut(&version) {
            slot.state = WorkerState::Redundant;
        }
    }
}

/// Registry of workers and the clients they control
pub struct Registration<W> {
    inner: Mutex<Inner<W>>,
}

impl<W> Default for Registration<W> {
    fn default() -> Self {
        Self::new()
    }
}

impl<W> Registration<W> {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                workers: HashMap::new(),
                active: None,
                waiting: None,
                clients: HashMap::new(),
                next_version: 1,
                next_client: 1,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner<W>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Current lifecycle state of `version`, or `None` once it has been dropped
    pub fn state(&self, version: WorkerVersion) -> Option<WorkerState> {
        self.lock().workers.get(&version).map(|slot| slot.state)
    }

    /// Version of the active worker, if any
    pub fn active_version(&self) -> Option<WorkerVersion> {
        self.lock().active
    }

    /// Opens a client, controlled by the active worker if there is one
    pub fn open_client(&self) -> ClientId {
        let mut inner = self.lock();
        let id = ClientId(inner.next_client);
        inner.next_client += 1;
        let controller = inner.active;
        inner.clients.insert(id, controller);
        id
    }

    /// Closes a client; workers no longer needed are retired
    pub fn close_client(&self, id: ClientId) {
        let mut inner = self.lock();
        inner.clients.remove(&id);
        inner.prune();
    }

    /// Version of the worker controlling `id`
    pub fn controller_version(&self, id: ClientId) -> Option<WorkerVersion> {
        self.lock().clients.get(&id).copied().flatten()
    }

    /// Worker controlling `id`
    pub fn controller(&self, id: ClientId) -> Option<Arc<W>> {
        let inner = self.lock();
        let version = inner.clients.get(&id).copied().flatten()?;
        inner.workers.get(&version).map(|slot| Arc::clone(&slot.worker))
    }
}

impl<W: Worker> Registration<W> {
    /// Installs `worker` and, when possible, activates it
    ///
    /// The worker becomes active right after install if it asked to skip
    /// waiting or if no other worker is active; otherwise it stays `Waiting`
    /// until `release_active` is called.
    pub async fn register(&self, worker: W) -> WorkerVersion {
        let worker = Arc::new(worker);
        let version = {
            let mut inner = self.lock();
            let version = inner.next_version;
            inner.next_version += 1;
            inner.workers.insert(
                version,
                Slot {
                    worker: Arc::clone(&worker),
                    state: WorkerState::Installing,
                },
            );
            version
        };

        tracing::debug!(version, "installing worker");
        let signals = LifecycleSignals::new();
        worker.on_install(&signals).await;

        let promote = {
            let mut inner = self.lock();
            let promote = signals.skip_waiting_requested() || inner.active.is_none();
            if !promote {
                if let Some(slot) = inner.workers.get_mut(&version) {
                    slot.state = WorkerState::Waiting;
                }
                // A newer waiting worker replaces an older one
                if let Some(older) = inner.waiting.replace(version) {
                    inner.retire(older);
                }
                inner.prune();
            }
            promote
        };

        if promote {
            self.activate(version, worker, signals).await;
        } else {
            tracing::debug!(version, "worker waiting for the active worker to be released");
        }
        version
    }

    /// Retires the active worker and activates the waiting one, if any
    ///
    /// Clients keep their controller unless the newly active worker claims them.
    pub async fn release_active(&self) -> Option<WorkerVersion> {
        let (version, worker) = {
            let mut inner = self.lock();
            let version = inner.waiting.take()?;
            let worker = Arc::clone(&inner.workers.get(&version)?.worker);
            (version, worker)
        };

        self.activate(version, worker, LifecycleSignals::new()).await;
        Some(version)
    }

    async fn activate(&self, version: WorkerVersion, worker: Arc<W>, signals: LifecycleSignals) {
        worker.on_activate(&signals).await;

        let mut inner = self.lock();
        if let Some(slot) = inner.workers.get_mut(&version) {
            slot.state = WorkerState::Active;
        }
        // Anything still waiting behind this version is superseded
        if let Some(waiting) = inner.waiting.filter(|w| *w <= version) {
            inner.waiting = None;
            if waiting != version {
                inner.retire(waiting);
            }
        }
        if let Some(previous) = inner.active.replace(version).filter(|v| *v != version) {
            inner.retire(previous);
        }

        if signals.claim_requested() {
            for controller in inner.clients.values_mut() {
                *controller = Some(version);
            }
        }
        inner.prune();
        tracing::info!(version, claimed = signals.claim_requested(), "worker active");
    }

    /// Issues a request on behalf of client `id`
    ///
    /// Requests from an uncontrolled client, and requests the controller
    /// passes through, go to `network` unchanged.
    pub async fn fetch<F: Fetcher + ?Sized>(
        &self,
        id: ClientId,
        request: &ManifestRequest,
        network: &F,
    ) -> Result<Served, InterceptError> {
        if let Some(worker) = self.controller(id) {
            if let Interception::Respond(served) = worker.on_fetch(request).await? {
                return Ok(served);
            }
        }

        let response = network.fetch(request).await?;
        Ok(Served {
            response,
            source: ResponseSource::Network,
        })
    }
}
