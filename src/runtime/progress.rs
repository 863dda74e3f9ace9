//! Job progress notification sent to the job-streamer control bus.
//!
//! When a job finishes, the listener reads the execution id and the
//! `request-id` job property and sends
//! `{"command": "progress", "id": <request-id>, "execution-id": <execution-id>}`
//! through the connector registered in the [`SystemRegistry`].

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

/// Job property carrying the id of the control-bus request that started the job.
pub const REQUEST_ID_PROPERTY: &str = "request-id";

/// Errors raised while reporting progress.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NotifyError {
    /// The job context has no `request-id` property.
    #[error("job property `request-id` is missing")]
    MissingRequestId,
    /// The `request-id` property is not an integer.
    #[error("job property `request-id` is not an integer: {0:?}")]
    InvalidRequestId(String),
    /// No connector is registered in the system registry.
    #[error("no connector registered in the system registry")]
    MissingConnector,
    /// The connector failed to deliver the message.
    #[error("failed to send progress message: {0}")]
    Send(String),
}

/// Control-bus command kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Command {
    /// A job execution made progress (or finished).
    Progress,
}

/// Message sent after a job finishes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ProgressMessage {
    /// Always [`Command::Progress`].
    pub command: Command,
    /// Request id from the job properties.
    pub id: i64,
    /// Job execution id.
    pub execution_id: i64,
}

impl ProgressMessage {
    /// Progress message for `execution_id` started by request `id`.
    #[must_use]
    pub const fn progress(id: i64, execution_id: i64) -> Self {
        Self {
            command: Command::Progress,
            id,
            execution_id,
        }
    }

    /// JSON encoding as sent on the wire.
    ///
    /// # Errors
    ///
    /// Propagates serialization failures.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Transport to the control bus.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Deliver `message`.
    async fn send_message(&self, message: &ProgressMessage) -> Result<(), NotifyError>;
}

/// Connector that keeps sent messages in memory; for tests and local runs.
#[derive(Debug, Default)]
pub struct InMemoryConnector {
    sent: Mutex<Vec<ProgressMessage>>,
}

impl InMemoryConnector {
    /// Create an empty connector.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of delivered messages, oldest first.
    #[must_use]
    pub fn sent(&self) -> Vec<ProgressMessage> {
        self.sent.lock().clone()
    }
}

#[async_trait]
impl Connector for InMemoryConnector {
    async fn send_message(&self, message: &ProgressMessage) -> Result<(), NotifyError> {
        self.sent.lock().push(message.clone());
        Ok(())
    }
}

/// Components shared by the agent, passed explicitly instead of looked up globally.
#[derive(Clone, Default)]
pub struct SystemRegistry {
    connector: Option<Arc<dyn Connector>>,
}

impl SystemRegistry {
    /// Registry with no components.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Return a copy with `connector` registered.
    #[must_use]
    pub fn with_connector(mut self, connector: Arc<dyn Connector>) -> Self {
        self.connector = Some(connector);
        self
    }

    /// The registered connector.
    ///
    /// # Errors
    ///
    /// `NotifyError::MissingConnector` if none is registered.
    pub fn connector(&self) -> Result<Arc<dyn Connector>, NotifyError> {
        self.connector.clone().ok_or(NotifyError::MissingConnector)
    }
}

/// What the listener knows about a finished job.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JobContext {
    /// Job execution id.
    pub execution_id: i64,
    /// Job properties.
    pub properties: HashMap<String, String>,
}

impl JobContext {
    /// Context for `execution_id` with no properties.
    #[must_use]
    pub fn new(execution_id: i64) -> Self {
        Self {
            execution_id,
            properties: HashMap::new(),
        }
    }

    /// Return a copy with property `key` set.
    #[must_use]
    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    fn request_id(&self) -> Result<i64, NotifyError> {
        let raw = self
            .properties
            .get(REQUEST_ID_PROPERTY)
            .ok_or(NotifyError::MissingRequestId)?;
        raw.trim()
            .parse()
            .map_err(|_| NotifyError::InvalidRequestId(raw.clone()))
    }
}

/// Sends a progress message when a job finishes.
#[derive(Clone)]
pub struct JobProgressListener {
    system: SystemRegistry,
}

impl JobProgressListener {
    /// Listener sending through the connector in `system`.
    #[must_use]
    pub const fn new(system: SystemRegistry) -> Self {
        Self { system }
    }

    /// Report that the job described by `context` finished. Returns the message sent.
    ///
    /// # Errors
    ///
    /// See [`NotifyError`].
    pub async fn after_job(&self, context: &JobContext) -> Result<ProgressMessage, NotifyError> {
        debug!(execution_id = context.execution_id, "Send progress message");
        let message = ProgressMessage::progress(context.request_id()?, context.execution_id);
        let connector = self.system.connector()?;
        connector.send_message(&message).await?;
        debug!(message = ?message, "Sent progress message");
        Ok(message)
    }

    /// [`after_job`](Self::after_job) for callers on a worker thread, outside any runtime.
    ///
    /// # Errors
    ///
    /// See [`NotifyError`]; a runtime that cannot be built is reported as `Send`.
    #[cfg(feature = "tokio-runtime")]
    pub fn after_job_blocking(&self, context: &JobContext) -> Result<ProgressMessage, NotifyError> {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| NotifyError::Send(format!("failed to create runtime: {e}")))?;
        rt.block_on(self.after_job(context))
    }
}
