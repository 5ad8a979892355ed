//! Module for writing documents to the remote list store.
//!
//! A [`ListStore`] hands out private connections. Each connection queues
//! appends without waiting for replies until it is flushed; the
//! [`StoreWriter`] owns one connection and flushes it in fixed-size batches.

use tracing::debug;

use crate::error::StoreError;

mod memory;
mod remote;


pub use self::memory::{MemoryConnection, MemoryStore};
pub use self::remote::{RedisConnection, RedisStore};

/// A single connection capable of pipelining list appends.
pub trait StoreConnection: Send {
    /// Queues an append of `document` to the list `key` without waiting for acknowledgment.
    fn queue_push(&mut self, key: &str, document: String) -> Result<(), StoreError>;

    /// Sends every queued write and waits for their replies. The queue is empty afterwards, even on failure.
    fn flush(&mut self) -> Result<(), StoreError>;
}

/// The list store as seen by the pipeline.
pub trait ListStore: Sync {
    type Connection: StoreConnection;

    /// Opens a connection that is used by a single digester only.
    fn connect(&self) -> Result<Self::Connection, StoreError>;

    /// Deletes the list.
    fn clear(&self, key: &str) -> Result<(), StoreError>;

    /// Number of entries in the list, including those of earlier runs.
    fn len(&self, key: &str) -> Result<u64, StoreError>;
}

/// Counters of a [`StoreWriter`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct WriterStats {
    /// Documents accepted by `submit`
    pub submitted: u64,
    /// Documents whose flush succeeded
    pub appended: u64,
    /// Flush operations issued, failed ones included
    pub flushes: u64,
    /// Documents that never reached the store because queueing or their flush failed
    pub lost: u64,
}

impl std::ops::AddAssign for WriterStats {
    fn add_assign(&mut self, other: Self) {
        self.submitted += other.submitted;
        self.appended += other.appended;
        self.flushes += other.flushes;
        self.lost += other.lost;
    }
}

/// Batching writer over one store connection.
///
/// At most `batch_size` writes are queued without acknowledgment. The owner
/// must call [`StoreWriter::flush`] once it is done, writes still queued when
/// the writer is dropped are lost.
pub struct StoreWriter<C> {
    connection: C,
    key: String,
    batch_size: usize,
    pending: usize,
    stats: WriterStats,
}

impl<C: StoreConnection> StoreWriter<C> {
    pub fn new(connection: C, key: impl Into<String>, batch_size: usize) -> Self {
        Self {
            connection,
            key: key.into(),
            batch_size: batch_size.max(1),
            pending: 0,
            stats: WriterStats::default(),
        }
    }

    /// Queues `document` and flushes once the batch is full.
    ///
    /// A failed flush drops the whole batch; nothing is retried. The dropped
    /// writes are counted in [`WriterStats::lost`].
    pub fn submit(&mut self, document: String) -> Result<(), StoreError> {
        if let Err(err) = self.connection.queue_push(&self.key, document) {
            self.stats.lost += 1;
            return Err(err);
        }
        self.pending += 1;
        self.stats.submitted += 1;

        if self.pending >= self.batch_size {
            self.flush()?;
        }
        Ok(())
    }

    /// Forces the queued writes onto the wire. Does nothing if no write is queued.
    pub fn flush(&mut self) -> Result<(), StoreError> {
        if self.pending == 0 {
            return Ok(());
        }
        let batch = std::mem::take(&mut self.pending);
        self.stats.flushes += 1;
        debug!(batch, "Flushing...");

        match self.connection.flush() {
            Ok(()) => {
                self.stats.appended += batch as u64;
                Ok(())
            }
            Err(err) => {
                self.stats.lost += batch as u64;
                Err(err)
            }
        }
    }

    /// Writes queued but not flushed yet.
    pub fn pending(&self) -> usize {
        self.pending
    }

    pub fn stats(&self) -> WriterStats {
        self.stats
    }
}
