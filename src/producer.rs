use crate::config::ProducerConfig;
use crate::error::{DispatchError, Result};
use crate::item::WorkItem;
use crate::queue::ThrottledQueue;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Substitute `{run}` and `{index}` in a url template
#[must_use]
pub fn render_url(template: &str, run: u32, index: u32) -> String {
    template
        .replace("{run}", &run.to_string())
        .replace("{index}", &index.to_string())
}

/// Feeds [`WorkItem`]s into a [`ThrottledQueue`] at a fixed cadence.
///
/// Cloning is cheap; clones share the queue, the cancellation token and the
/// enqueue counter.
#[derive(Debug, Clone)]
pub struct Producer {
    config: ProducerConfig,
    queue: Arc<ThrottledQueue>,
    cancel: CancellationToken,
    enqueued: Arc<AtomicU64>,
}

impl Producer {
    #[must_use]
    pub fn new(config: ProducerConfig, queue: Arc<ThrottledQueue>, cancel: CancellationToken) -> Self {
        Self {
            config,
            queue,
            cancel,
            enqueued: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Items pushed so far across every run, including runs that were canceled
    #[must_use]
    pub fn enqueued(&self) -> u64 {
        self.enqueued.load(Ordering::Relaxed)
    }

    /// Enqueue one batch of items, pausing `interval_ms` after each push
    ///
    /// Unless `enqueue_full_count` is set the batch holds `count - 1` items.
    /// Returns the number of items pushed.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The cancellation token fires before the batch is finished
    /// - The queue has been completed
    pub async fn run(&self, run: u32) -> Result<u32> {
        let total = self.config.items_per_run();
        let interval = Duration::from_millis(self.config.interval_ms);
        let mut pushed = 0;

        for index in 0..total {
            if self.cancel.is_cancelled() {
                info!(run, pushed, "producer canceled");
                return Err(DispatchError::Canceled);
            }

            let item = WorkItem::new(render_url(&self.config.url, run, index));
            let id = item.id();
            self.queue.push(item)?;
            pushed += 1;
            self.enqueued.fetch_add(1, Ordering::Relaxed);
            info!(run, index, %id, "enqueued request #{index}");

            if !interval.is_zero() {
                tokio::select! {
                    biased;
                    () = self.cancel.cancelled() => {
                        info!(run, pushed, "producer canceled");
                        return Err(DispatchError::Canceled);
                    }
                    () = tokio::time::sleep(interval) => {}
                }
            }
        }

        Ok(pushed)
    }
}
