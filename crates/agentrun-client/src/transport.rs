use std::collections::HashMap;
use std::pin::Pin;

use crate::errors::TransportError;
use crate::task::{ExecOptions, TaskId};

/// Raw byte stream of an execution response body.
pub type ByteStream =
    Pin<Box<dyn futures::Stream<Item = Result<bytes::Bytes, TransportError>> + Send + 'static>>;

/// Transport seam between the execution manager and the agent-run API.
///
/// The HTTP implementation lives in `client`; tests drive the manager
/// with scripted fakes over this trait.
#[async_trait::async_trait]
pub trait TaskTransport: Send + Sync {
    /// Issues the streamed execution request for one task.
    ///
    /// Exactly one POST with the JSON-encoded input payload; the response
    /// body is returned as a byte stream. Non-success statuses are
    /// reported as errors, never as a stream.
    async fn open_stream(
        &self,
        task_id: &TaskId,
        inputs: &HashMap<String, String>,
        options: &ExecOptions,
    ) -> Result<ByteStream, TransportError>;

    /// Notifies the server that the task should release its resources.
    ///
    /// Fire-and-forget from the caller's perspective; failures are
    /// surfaced so they can be logged.
    async fn send_stop(&self, task_id: &TaskId) -> Result<(), TransportError>;
}
