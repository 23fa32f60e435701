pub mod cli;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod init;
pub mod item;
pub mod orchestrator;
pub mod producer;
pub mod queue;
pub mod sink;
pub mod throttle;
pub mod transport;

// Re-export key types for convenience
pub use config::{Config, ConfigOverrides, Loaded, ShutdownPolicy, SkippedConfig};
pub use dispatcher::{DispatchReport, DispatchStats, RateLimitedDispatcher};
pub use error::{DispatchError, TransportError};
pub use init::{initialize_config, InitOptions};
pub use item::WorkItem;
pub use orchestrator::{Orchestrator, RunSummary};
pub use producer::Producer;
pub use queue::ThrottledQueue;
pub use sink::ResultSink;
pub use throttle::Throttle;
pub use transport::{HttpResponse, HttpTransport, MockTransport, Transport};

// Test utilities module - only compiled with test or testing feature
#[cfg(any(test, feature = "testing"))]
pub mod test_utils;
