use super::{HttpResponse, Transport};
use crate::error::TransportError;
use async_trait::async_trait;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

type Responder = dyn Fn(&str) -> Result<HttpResponse, TransportError> + Send + Sync;

/// A request observed by [`MockTransport`]
#[derive(Debug, Clone)]
pub struct MockCall {
    pub url: String,
    pub at: Instant,
}

/// Shared record of the calls a [`MockTransport`] received.
///
/// Stays readable after the transport itself has been moved into a
/// dispatcher and dropped.
#[derive(Debug, Clone, Default)]
pub struct CallLog {
    calls: Arc<Mutex<Vec<MockCall>>>,
}

impl CallLog {
    fn lock(&self) -> MutexGuard<'_, Vec<MockCall>> {
        self.calls.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn record(&self, url: &str) {
        self.lock().push(MockCall {
            url: url.to_string(),
            at: Instant::now(),
        });
    }

    #[must_use]
    pub fn calls(&self) -> Vec<MockCall> {
        self.lock().clone()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Largest number of calls that started inside any half-open interval
    /// `[t, t + window)`
    #[must_use]
    pub fn max_in_any_window(&self, window: Duration) -> usize {
        let calls = self.lock();
        let mut times: Vec<Instant> = calls.iter().map(|call| call.at).collect();
        times.sort();

        let mut best = 0;
        let mut lo = 0;
        for hi in 0..times.len() {
            while lo < hi && times[hi].duration_since(times[lo]) >= window {
                lo += 1;
            }
            best = best.max(hi - lo + 1);
        }
        best
    }
}

/// Scriptable [`Transport`] for tests and dry runs
pub struct MockTransport {
    responder: Box<Responder>,
    latency: Duration,
    log: CallLog,
}

impl fmt::Debug for MockTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MockTransport")
            .field("latency", &self.latency)
            .field("calls", &self.log.len())
            .finish_non_exhaustive()
    }
}

impl MockTransport {
    pub fn new<F>(responder: F) -> Self
    where
        F: Fn(&str) -> Result<HttpResponse, TransportError> + Send + Sync + 'static,
    {
        Self {
            responder: Box::new(responder),
            latency: Duration::ZERO,
            log: CallLog::default(),
        }
    }

    /// Always answers 200 with `body`
    pub fn ok(body: impl Into<String>) -> Self {
        let body = body.into();
        Self::new(move |_| Ok(HttpResponse::new(200, body.clone())))
    }

    /// Always answers 200 with the requested url as the body
    #[must_use]
    pub fn echo() -> Self {
        Self::new(|url| Ok(HttpResponse::new(200, url)))
    }

    /// Always answers with `status` and an empty body
    #[must_use]
    pub fn status(status: u16) -> Self {
        Self::new(move |_| Ok(HttpResponse::new(status, "")))
    }

    /// Delay every response by `latency`
    #[must_use]
    pub const fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    #[must_use]
    pub fn call_log(&self) -> CallLog {
        self.log.clone()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn get(
        &self,
        url: &str,
        cancel: &CancellationToken,
    ) -> Result<HttpResponse, TransportError> {
        self.log.record(url);
        if !self.latency.is_zero() {
            tokio::select! {
                biased;
                () = cancel.cancelled() => return Err(TransportError::Canceled),
                () = tokio::time::sleep(self.latency) => {}
            }
        }
        (self.responder)(url)
    }
}
