//! Batch runtime environment and job progress reporting.

pub mod environment;
pub mod progress;

pub use environment::{BatchEnvironment, WORKER_THREAD_PREFIX};
pub use progress::{
    Command, Connector, InMemoryConnector, JobContext, JobProgressListener, NotifyError, ProgressMessage,
    SystemRegistry, REQUEST_ID_PROPERTY,
};
