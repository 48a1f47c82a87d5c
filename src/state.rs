//! The per-client state the listener writes and the telemetry aggregator
//! reads. Both live on different threads, so everything here sits behind a
//! single mutex; see [`SharedState`].

use crate::{
    identity::ClientIdentity,
    message::{GazeEntry, Inbound},
    reconciler::{BuildCheck, BuildReconciler},
};
use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard},
};

/// Latest gaze per client, plus the session's build reconciliation.
///
/// Entries are never removed: the transport does not tell us when a client
/// goes away, so a stale gaze stays until the process restarts.
#[derive(Debug, Default)]
pub struct HubState {
    gaze: HashMap<ClientIdentity, String>,
    reconciler: BuildReconciler,
    mismatches: usize,
}

impl HubState {
    /// An empty state: no clients, no build yet.
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies one classified ingest message. Returns the build check for
    /// handshakes.
    pub fn apply(&mut self, client: ClientIdentity, inbound: Inbound) -> Option<BuildCheck> {
        match inbound {
            Inbound::Handshake(build) => {
                let check = self.reconciler.observe(&client, build);
                if let BuildCheck::Mismatch { .. } = check {
                    self.mismatches += 1;
                }
                Some(check)
            }
            Inbound::Gaze(gaze) => {
                self.gaze.insert(client, gaze);
                None
            }
        }
    }

    /// The latest gaze of one client.
    pub fn gaze(&self, client: &ClientIdentity) -> Option<&str> {
        self.gaze.get(client).map(String::as_str)
    }

    /// Number of clients that have reported gaze.
    pub fn client_count(&self) -> usize {
        self.gaze.len()
    }

    /// A copy of every client's gaze, sorted by identity so that repeated
    /// snapshots of the same state read the same.
    pub fn snapshot(&self) -> Vec<GazeEntry> {
        let mut entries: Vec<_> = self.gaze.iter().collect();
        entries.sort_by(|a, b| a.0.cmp(b.0));
        entries
            .into_iter()
            .map(|(identity, value)| GazeEntry {
                identity: identity.to_string(),
                value: value.clone(),
            })
            .collect()
    }

    /// The session build, once a handshake has set it.
    pub fn build(&self) -> Option<u64> {
        self.reconciler.build()
    }

    /// How many handshakes disagreed with the session build.
    pub fn mismatches(&self) -> usize {
        self.mismatches
    }
}

/// A handle on the one [`HubState`] of a hub. Clones share the state.
#[derive(Debug, Clone, Default)]
pub struct SharedState(Arc<Mutex<HubState>>);

impl SharedState {
    /// Wraps a fresh, empty [`HubState`].
    pub fn new() -> Self {
        Self::default()
    }

    /// Locks the state. A panic on the other side of the lock cannot leave
    /// a half-written entry, since every update is a single insert, so a
    /// poisoned lock is simply taken over.
    pub fn lock(&self) -> MutexGuard<'_, HubState> {
        self.0.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
