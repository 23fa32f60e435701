use crate::config::HttpConfig;
use crate::error::TransportError;
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

pub mod http;
pub mod mock;

pub use http::HttpTransport;
pub use mock::{CallLog, MockCall, MockTransport};

/// The HTTP collaborator the dispatcher sends work through
#[async_trait]
pub trait Transport: std::fmt::Debug + Send + Sync {
    /// Issue a GET request for `url`
    ///
    /// Implementations only need to read the body of successful (2xx)
    /// responses.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - `cancel` fires before the response is complete
    /// - The request could not be sent or no response arrived
    /// - The response body could not be read
    async fn get(
        &self,
        url: &str,
        cancel: &CancellationToken,
    ) -> Result<HttpResponse, TransportError>;
}

/// Status and body of a completed request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    #[must_use]
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.status >= 200 && self.status < 300
    }
}

/// Creates the real HTTP transport from configuration
///
/// # Errors
///
/// Returns an error if the underlying HTTP client cannot be built.
pub fn create_transport(config: &HttpConfig) -> Result<Box<dyn Transport>, TransportError> {
    Ok(Box::new(HttpTransport::new(config)?))
}
