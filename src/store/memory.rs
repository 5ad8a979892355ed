//! In-memory list store, used for dry runs and tests.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use super::{ListStore, StoreConnection};
use crate::error::StoreError;

/// List store keeping every list in memory.
///
/// Queued writes become visible only once their connection is flushed, like
/// pipelined writes on a real server.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<State>>,
}

#[derive(Debug, Default)]
struct State {
    lists: HashMap<String, Vec<String>>,
    flushes: u64,
    connections: usize,
    rejecting_writes: bool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store whose connections accept queued writes but fail every flush.
    pub fn rejecting_writes() -> Self {
        let store = Self::default();
        store.lock().rejecting_writes = true;
        store
    }

    /// Snapshot of the list stored under `key`.
    pub fn list(&self, key: &str) -> Vec<String> {
        self.lock().lists.get(key).cloned().unwrap_or_default()
    }

    /// Number of successful flushes over all connections.
    pub fn flushes(&self) -> u64 {
        self.lock().flushes
    }

    /// Number of connections handed out so far.
    pub fn connections(&self) -> usize {
        self.lock().connections
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl ListStore for MemoryStore {
    type Connection = MemoryConnection;

    fn connect(&self) -> Result<MemoryConnection, StoreError> {
        self.lock().connections += 1;
        Ok(MemoryConnection {
            store: self.clone(),
            queued: Vec::new(),
        })
    }

    fn clear(&self, key: &str) -> Result<(), StoreError> {
        self.lock().lists.remove(key);
        Ok(())
    }

    fn len(&self, key: &str) -> Result<u64, StoreError> {
        Ok(self.lock().lists.get(key).map_or(0, |list| list.len() as u64))
    }
}

#[derive(Debug)]
pub struct MemoryConnection {
    store: MemoryStore,
    queued: Vec<(String, String)>,
}

impl StoreConnection for MemoryConnection {
    fn queue_push(&mut self, key: &str, document: String) -> Result<(), StoreError> {
        self.queued.push((key.to_string(), document));
        Ok(())
    }

    fn flush(&mut self) -> Result<(), StoreError> {
        let queued = std::mem::take(&mut self.queued);
        let mut state = self.store.lock();
        if state.rejecting_writes {
            return Err(StoreError::Unavailable(format!(
                "{} queued writes rejected",
                queued.len()
            )));
        }
        for (key, document) in queued {
            state.lists.entry(key).or_default().push(document);
        }
        state.flushes += 1;
        Ok(())
    }
}
