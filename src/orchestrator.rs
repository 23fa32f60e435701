use crate::config::{Config, ShutdownPolicy};
use crate::dispatcher::{DispatchReport, RateLimitedDispatcher};
use crate::producer::Producer;
use crate::queue::ThrottledQueue;
use crate::sink::ResultSink;
use crate::transport::Transport;
use anyhow::{Context, Result};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Outcome of a full [`Orchestrator::run`]
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    /// Producer runs that enqueued their whole batch
    pub runs_completed: u32,
    /// Items pushed across every producer run
    pub enqueued: u64,
    pub dispatch: DispatchReport,
    /// Whether the run was cut short by the cancellation token
    pub canceled: bool,
    /// Items still queued when the dispatcher stopped
    pub left_in_queue: usize,
}

/// Wires a producer and a dispatcher to one queue, one sink and one
/// cancellation token, and sequences the producer runs.
#[derive(Debug)]
pub struct Orchestrator {
    config: Config,
    queue: Arc<ThrottledQueue>,
    sink: Arc<ResultSink>,
    cancel: CancellationToken,
}

impl Orchestrator {
    #[must_use]
    pub fn new(config: Config) -> Self {
        Self::with_cancellation(config, CancellationToken::new())
    }

    #[must_use]
    pub fn with_cancellation(config: Config, cancel: CancellationToken) -> Self {
        Self {
            config,
            queue: Arc::new(ThrottledQueue::new()),
            sink: Arc::new(ResultSink::new()),
            cancel,
        }
    }

    #[must_use]
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    #[must_use]
    pub fn queue(&self) -> Arc<ThrottledQueue> {
        Arc::clone(&self.queue)
    }

    #[must_use]
    pub fn sink(&self) -> Arc<ResultSink> {
        Arc::clone(&self.sink)
    }

    /// Run every configured producer batch, then shut the dispatcher down
    /// according to the shutdown policy and wait for it to finish.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - A producer or dispatcher task panics
    /// - The producer fails for a reason other than cancellation
    pub async fn run(&self, transport: Box<dyn Transport>) -> Result<RunSummary> {
        let dispatcher = RateLimitedDispatcher::new(
            &self.config.dispatcher,
            transport,
            Arc::clone(&self.queue),
            Arc::clone(&self.sink),
            self.cancel.clone(),
        );
        let stats = dispatcher.stats();
        let consumer = tokio::spawn(dispatcher.run());

        let producer = Producer::new(
            self.config.producer.clone(),
            Arc::clone(&self.queue),
            self.cancel.clone(),
        );

        let runs = self.config.orchestrator.runs;
        let pause = Duration::from_millis(self.config.orchestrator.pause_ms);
        let mut runs_completed = 0;
        let mut canceled = false;

        for run in 1..=runs {
            let task = {
                let producer = producer.clone();
                tokio::spawn(async move { producer.run(run).await })
            };

            match task.await.context("producer task panicked")? {
                Ok(pushed) => {
                    info!(run, pushed, "queued all requests for this run");
                    runs_completed += 1;
                }
                Err(e) if e.is_canceled() => {
                    canceled = true;
                    break;
                }
                Err(e) => {
                    self.cancel.cancel();
                    match consumer.await {
                        Ok(result) => debug!(?result, "dispatcher stopped after producer failure"),
                        Err(join) => debug!(error = %join, "dispatcher task failed after producer failure"),
                    }
                    return Err(e).context("producer failed");
                }
            }

            if run < runs {
                info!(pause_ms = self.config.orchestrator.pause_ms, "pausing before the next producer run");
                tokio::select! {
                    biased;
                    () = self.cancel.cancelled() => {
                        canceled = true;
                        break;
                    }
                    () = tokio::time::sleep(pause) => {}
                }
                info!("pause over, starting producer again");
            }
        }

        if !canceled {
            match self.config.orchestrator.shutdown {
                ShutdownPolicy::Drain => {
                    info!(queued = self.queue.len(), "draining queue before shutdown");
                    self.queue.complete();
                }
                ShutdownPolicy::Cancel => {
                    info!(queued = self.queue.len(), "canceling dispatcher");
                    self.cancel.cancel();
                }
            }
        }

        match consumer.await.context("dispatcher task panicked")? {
            Ok(_) => {}
            Err(e) if e.is_canceled() => canceled = true,
            Err(e) => return Err(e).context("dispatcher failed"),
        }

        let summary = RunSummary {
            runs_completed,
            enqueued: producer.enqueued(),
            dispatch: stats.snapshot(),
            canceled,
            left_in_queue: self.queue.len(),
        };
        info!(
            runs = summary.runs_completed,
            enqueued = summary.enqueued,
            succeeded = summary.dispatch.succeeded,
            failed = summary.dispatch.failed,
            "processing complete"
        );
        Ok(summary)
    }
}
