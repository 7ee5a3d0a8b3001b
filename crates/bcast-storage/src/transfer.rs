//! Bounded, paced queue for outbound transfers.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, Semaphore};
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::error::{StorageError, StorageResult};

/// Default cap on concurrent transfers.
pub const DEFAULT_MAX_TRANSFERS: usize = 2;
/// Default minimum gap between transfer starts.
pub const DEFAULT_PACING: Duration = Duration::from_millis(200);

/// Shared gate for a quota-limited destination.
///
/// At most `max_concurrent` transfers run at once and consecutive starts are
/// at least `pacing` apart. Clones share the same limits.
#[derive(Clone)]
pub struct TransferQueue {
    permits: Arc<Semaphore>,
    max_concurrent: usize,
    pacing: Duration,
    next_start: Arc<Mutex<Option<Instant>>>,
}

impl Default for TransferQueue {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_TRANSFERS, DEFAULT_PACING)
    }
}

impl TransferQueue {
    pub fn new(max_concurrent: usize, pacing: Duration) -> Self {
        let max_concurrent = max_concurrent.max(1);
        Self {
            permits: Arc::new(Semaphore::new(max_concurrent)),
            max_concurrent,
            pacing,
            next_start: Arc::new(Mutex::new(None)),
        }
    }

    /// Transfers currently holding a slot.
    pub fn in_flight(&self) -> usize {
        self.max_concurrent - self.permits.available_permits()
    }

    async fn pace(&self) {
        let mut next = self.next_start.lock().await;
        if let Some(at) = *next {
            tokio::time::sleep_until(at).await;
        }
        *next = Some(Instant::now() + self.pacing);
    }

    /// Run `transfer` once a slot is free and the pacing delay has passed.
    pub async fn run<F>(&self, transfer: F) -> StorageResult<F::Output>
    where
        F: Future,
    {
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|_| StorageError::QueueClosed)?;
        self.pace().await;
        Ok(transfer.await)
    }

    /// [`run`](Self::run) on a detached task.
    pub fn spawn<F>(&self, transfer: F) -> JoinHandle<StorageResult<F::Output>>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        let queue = self.clone();
        tokio::spawn(async move { queue.run(transfer).await })
    }
}
