use crate::config::DispatcherConfig;
use crate::error::{DispatchError, Result, TransportError};
use crate::item::WorkItem;
use crate::queue::ThrottledQueue;
use crate::sink::ResultSink;
use crate::throttle::Throttle;
use crate::transport::Transport;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Live counters for a dispatcher, shared with whoever wants to watch it
#[derive(Debug, Default)]
pub struct DispatchStats {
    dispatched: AtomicU64,
    succeeded: AtomicU64,
    failed: AtomicU64,
    skipped: AtomicU64,
    throttle_waits: AtomicU64,
    throttled_ms: AtomicU64,
}

/// Point-in-time copy of [`DispatchStats`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct DispatchReport {
    /// Requests handed to the transport
    pub dispatched: u64,
    /// Requests answered with a 2xx status and stored in the sink
    pub succeeded: u64,
    /// Requests dropped after a non-2xx status or a transport error
    pub failed: u64,
    /// Items never dispatched because their url was blank
    pub skipped: u64,
    /// Times the dispatcher waited for a full window to run out
    pub throttle_waits: u64,
    /// Total milliseconds spent in those waits
    pub throttled_ms: u64,
}

impl DispatchStats {
    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    #[must_use]
    pub fn snapshot(&self) -> DispatchReport {
        DispatchReport {
            dispatched: self.dispatched.load(Ordering::Relaxed),
            succeeded: self.succeeded.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            skipped: self.skipped.load(Ordering::Relaxed),
            throttle_waits: self.throttle_waits.load(Ordering::Relaxed),
            throttled_ms: self.throttled_ms.load(Ordering::Relaxed),
        }
    }
}

/// The single consumer of a [`ThrottledQueue`].
///
/// Takes items one at a time, keeps dispatches under `max_per_window` per
/// window and stores every successful response in the [`ResultSink`]. Failed
/// requests are counted and dropped.
///
/// The transport is owned by the dispatcher and released when [`Self::run`]
/// returns, whatever the reason.
#[derive(Debug)]
pub struct RateLimitedDispatcher {
    transport: Box<dyn Transport>,
    queue: Arc<ThrottledQueue>,
    sink: Arc<ResultSink>,
    cancel: CancellationToken,
    throttle: Throttle,
    stats: Arc<DispatchStats>,
}

impl RateLimitedDispatcher {
    #[must_use]
    pub fn new(
        config: &DispatcherConfig,
        transport: Box<dyn Transport>,
        queue: Arc<ThrottledQueue>,
        sink: Arc<ResultSink>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            transport,
            queue,
            sink,
            cancel,
            throttle: Throttle::new(config.max_per_window, config.window_ms),
            stats: Arc::new(DispatchStats::default()),
        }
    }

    #[must_use]
    pub fn stats(&self) -> Arc<DispatchStats> {
        Arc::clone(&self.stats)
    }

    /// Drain the queue until it is completed and empty
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::Canceled`] when the cancellation token fires,
    /// whether the dispatcher was waiting for an item, for the window to run
    /// out or for a response.
    pub async fn run(mut self) -> Result<DispatchReport> {
        loop {
            let item = match self.queue.take(&self.cancel).await {
                Ok(item) => item,
                Err(DispatchError::QueueClosed) => {
                    info!("queue completed and drained, dispatcher stopping");
                    return Ok(self.stats.snapshot());
                }
                Err(e) => {
                    info!("dispatcher canceled");
                    return Err(e);
                }
            };
            self.dispatch(item).await?;
        }
    }

    async fn dispatch(&mut self, mut item: WorkItem) -> Result<()> {
        if let Err(e) = item.ensure_dispatchable() {
            debug!(id = %item.id(), error = %e, "skipping item");
            DispatchStats::bump(&self.stats.skipped);
            return Ok(());
        }

        if let Some(waited) = self.throttle.acquire(&self.cancel).await? {
            debug!(waited_ms = waited.as_millis(), "window full, waited for next window");
            DispatchStats::bump(&self.stats.throttle_waits);
            #[allow(clippy::cast_possible_truncation)]
            self.stats
                .throttled_ms
                .fetch_add(waited.as_millis() as u64, Ordering::Relaxed);
        }

        DispatchStats::bump(&self.stats.dispatched);
        let id = item.id();
        let response = match self.transport.get(item.url(), &self.cancel).await {
            Ok(response) => response,
            Err(TransportError::Canceled) => return Err(DispatchError::Canceled),
            Err(e) => {
                warn!(%id, error = %e, "request failed, dropping item");
                DispatchStats::bump(&self.stats.failed);
                return Ok(());
            }
        };

        info!(
            %id,
            status = response.status,
            "dequeued request at timer mark: {} milliseconds",
            self.throttle.elapsed_ms()
        );

        if !response.is_success() {
            debug!(%id, status = response.status, "non-success status, dropping item");
            DispatchStats::bump(&self.stats.failed);
            return Ok(());
        }

        if let Err(e) = item.attach_payload(response.body) {
            debug!(%id, error = %e, "dropping item");
            DispatchStats::bump(&self.stats.failed);
            return Ok(());
        }
        self.sink.push(item);
        DispatchStats::bump(&self.stats.succeeded);
        Ok(())
    }
}
