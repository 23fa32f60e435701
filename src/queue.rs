use crate::error::{DispatchError, Result};
use crate::item::WorkItem;
use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Default)]
struct QueueState {
    items: VecDeque<WorkItem>,
    completed: bool,
    pushed: u64,
}

/// Unbounded FIFO of [`WorkItem`]s shared by any number of producers and a
/// single consumer.
///
/// `push` never waits. `take` suspends until an item arrives, the queue is
/// completed and drained, or the cancellation token fires.
#[derive(Debug, Default)]
pub struct ThrottledQueue {
    state: Mutex<QueueState>,
    available: Notify,
}

impl ThrottledQueue {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, QueueState> {
        // The state is a plain deque; a panic mid-push cannot leave it torn.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append an item to the back of the queue
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::QueueClosed`] once [`Self::complete`] has been called.
    pub fn push(&self, item: WorkItem) -> Result<()> {
        {
            let mut state = self.lock();
            if state.completed {
                return Err(DispatchError::QueueClosed);
            }
            state.items.push_back(item);
            state.pushed += 1;
        }
        self.available.notify_one();
        Ok(())
    }

    /// Pop the front item without waiting
    #[must_use]
    pub fn try_take(&self) -> Option<WorkItem> {
        self.lock().items.pop_front()
    }

    /// Wait for the next item
    ///
    /// # Errors
    ///
    /// - [`DispatchError::Canceled`] if `cancel` fires before or while waiting
    /// - [`DispatchError::QueueClosed`] if the queue is completed and empty
    pub async fn take(&self, cancel: &CancellationToken) -> Result<WorkItem> {
        loop {
            if cancel.is_cancelled() {
                return Err(DispatchError::Canceled);
            }

            // Register interest before looking at the deque so a push that
            // lands in between still wakes us.
            let notified = self.available.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            {
                let mut state = self.lock();
                if let Some(item) = state.items.pop_front() {
                    return Ok(item);
                }
                if state.completed {
                    return Err(DispatchError::QueueClosed);
                }
            }

            tokio::select! {
                biased;
                () = cancel.cancelled() => return Err(DispatchError::Canceled),
                () = &mut notified => {}
            }
        }
    }

    /// Stop accepting items. Items already queued can still be taken.
    pub fn complete(&self) {
        self.lock().completed = true;
        self.available.notify_waiters();
    }

    #[must_use]
    pub fn is_completed(&self) -> bool {
        self.lock().completed
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().items.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().items.is_empty()
    }

    /// Number of items ever accepted by `push`
    #[must_use]
    pub fn total_pushed(&self) -> u64 {
        self.lock().pushed
    }
}
