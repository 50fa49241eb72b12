use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::Result;

use crate::ports::PortAllocator;
use crate::reconcile::tunnels_to_reestablish;
use crate::remote::Remote;

/// What a reconnect did for one client.
pub struct ReconnectOutcome {
    /// Tunnels that were active before but absent from the new declaration,
    /// as the engine reported them (pre-reestablishment ports).
    pub reestablished: Vec<Remote>,
    /// The client's full active set after the reconnect.
    pub active: Vec<Remote>,
}

/// Per-client active-tunnel bookkeeping. Each client gets its own lock, so
/// one client's reconcile-and-apply is a single critical section while
/// unrelated clients proceed in parallel.
#[derive(Default)]
pub struct Broker {
    clients: Mutex<HashMap<String, Arc<Mutex<Vec<Remote>>>>>,
}

impl Broker {
    pub fn new() -> Self {
        Self::default()
    }

    fn entry(&self, client: &str) -> Arc<Mutex<Vec<Remote>>> {
        let mut clients = lock(&self.clients);
        clients.entry(client.to_string()).or_default().clone()
    }

    /// Seed a client's active set, e.g. from a persisted record.
    pub fn restore(&self, client: &str, tunnels: Vec<Remote>) {
        let entry = self.entry(client);
        *lock(&entry) = tunnels;
    }

    /// The client's current active set, if any tunnels are recorded.
    pub fn active(&self, client: &str) -> Option<Vec<Remote>> {
        let clients = lock(&self.clients);
        let entry = clients.get(client)?;
        let tunnels = lock(entry);
        if tunnels.is_empty() {
            None
        } else {
            Some(tunnels.clone())
        }
    }

    /// Drop everything recorded for a client.
    pub fn forget(&self, client: &str) {
        lock(&self.clients).remove(client);
    }

    /// Process a client reconnect: figure out which previously active
    /// tunnels the new declaration no longer covers, establish the declared
    /// set plus those leftovers, and replace the active record. Ephemeral
    /// local ports are assigned fresh on every establishment.
    pub fn handle_reconnect(
        &self,
        client: &str,
        declared: Vec<Remote>,
        ports: &dyn PortAllocator,
    ) -> Result<ReconnectOutcome> {
        let entry = self.entry(client);
        let mut active = lock(&entry);

        let missing = tunnels_to_reestablish(&active, &declared);
        let reestablished = missing.clone();

        let mut next = Vec::with_capacity(declared.len() + missing.len());
        for mut tunnel in declared.into_iter().chain(missing) {
            if !tunnel.is_local_explicit() {
                tunnel.assign_local_port(ports.allocate()?);
            }
            next.push(tunnel);
        }

        *active = next.clone();
        Ok(ReconnectOutcome {
            reestablished,
            active: next,
        })
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}
