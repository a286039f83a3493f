//! Worker lifecycle state and the clients the worker controls.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use swcache_core::Error;
use tokio::sync::RwLock;

/// Lifecycle states of one worker version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkerState {
    /// Created, no lifecycle event handled yet
    Parsed,
    /// Install event in progress
    Installing,
    /// Installed, waiting to activate
    Installed,
    /// Activate event in progress
    Activating,
    /// Active and intercepting fetches
    Activated,
    /// Install failed; a later attempt may retry
    Redundant,
}

impl WorkerState {
    /// Only an activated worker receives fetch events.
    pub fn can_intercept_fetch(&self) -> bool {
        matches!(self, WorkerState::Activated)
    }
}

impl std::fmt::Display for WorkerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WorkerState::Parsed => write!(f, "parsed"),
            WorkerState::Installing => write!(f, "installing"),
            WorkerState::Installed => write!(f, "installed"),
            WorkerState::Activating => write!(f, "activating"),
            WorkerState::Activated => write!(f, "activated"),
            WorkerState::Redundant => write!(f, "redundant"),
        }
    }
}

/// An open execution context (a page) in the worker's scope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientInfo {
    pub id: u64,
    pub url: String,
    /// Version of the worker serving this client, if any.
    pub controller: Option<String>,
}

/// Registration of one worker version.
#[derive(Debug)]
pub struct Registration {
    version: String,
    state: RwLock<WorkerState>,
    skip_waiting: AtomicBool,
    clients: RwLock<Vec<ClientInfo>>,
    next_client_id: AtomicU64,
}

impl Registration {
    pub fn new(version: impl Into<String>) -> Self {
        Self {
            version: version.into(),
            state: RwLock::new(WorkerState::Parsed),
            skip_waiting: AtomicBool::new(false),
            clients: RwLock::new(Vec::new()),
            next_client_id: AtomicU64::new(1),
        }
    }

    /// Version this registration belongs to (the cache generation name).
    pub fn version(&self) -> &str {
        &self.version
    }

    pub async fn state(&self) -> WorkerState {
        *self.state.read().await
    }

    /// Move to `to` if the current state is one of `from`.
    pub(crate) async fn transition(&self, from: &[WorkerState], to: WorkerState) -> Result<(), Error> {
        let mut state = self.state.write().await;
        if !from.contains(&*state) {
            return Err(Error::InvalidState(format!("cannot move from {} to {}", *state, to)));
        }
        tracing::debug!(version = %self.version, from = %*state, to = %to, "worker state change");
        *state = to;
        Ok(())
    }

    /// Ask to activate as soon as install finishes, without waiting for
    /// clients of an older version to close.
    pub fn skip_waiting(&self) {
        self.skip_waiting.store(true, Ordering::SeqCst);
    }

    pub fn skip_waiting_requested(&self) -> bool {
        self.skip_waiting.load(Ordering::SeqCst)
    }

    /// Register an open client, optionally already controlled by some
    /// version. Returns its id.
    pub async fn open_client(&self, url: impl Into<String>, controller: Option<String>) -> u64 {
        let id = self.next_client_id.fetch_add(1, Ordering::SeqCst);
        self.clients
            .write()
            .await
            .push(ClientInfo { id, url: url.into(), controller });
        id
    }

    /// Forget a closed client. Returns false if the id was unknown.
    pub async fn close_client(&self, id: u64) -> bool {
        let mut clients = self.clients.write().await;
        let before = clients.len();
        clients.retain(|c| c.id != id);
        clients.len() != before
    }

    pub async fn clients(&self) -> Vec<ClientInfo> {
        self.clients.read().await.clone()
    }

    /// True once skip-waiting was requested, or when no open client is held
    /// by another version.
    pub async fn ready_to_activate(&self) -> bool {
        if self.skip_waiting_requested() {
            return true;
        }
        self.clients
            .read()
            .await
            .iter()
            .all(|c| c.controller.as_deref().is_none_or(|v| v == self.version))
    }

    /// Make this version the controller of every open client.
    ///
    /// Returns the number of clients whose controller changed.
    pub async fn claim(&self) -> usize {
        let mut clients = self.clients.write().await;
        let mut claimed = 0;
        for client in clients.iter_mut() {
            if client.controller.as_deref() != Some(self.version.as_str()) {
                client.controller = Some(self.version.clone());
                claimed += 1;
            }
        }
        claimed
    }
}
