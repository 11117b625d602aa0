/// Errors raised by a transport implementation before they are normalized
/// into a terminal execution failure.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    /// The request could not be sent or the connection failed.
    #[error("request failed: {message}")]
    Request { message: String },
    /// The server answered with a non-success status.
    #[error("server returned status {status}: {body}")]
    Status { status: u16, body: String },
    /// Reading from an established stream failed.
    #[error("stream read failed: {message}")]
    Read { message: String },
}

impl TransportError {
    /// Creates a request-level error.
    pub fn request(message: impl Into<String>) -> Self {
        Self::Request {
            message: message.into(),
        }
    }

    /// Creates a status error from an HTTP response.
    pub fn status(status: u16, body: impl Into<String>) -> Self {
        Self::Status {
            status,
            body: body.into(),
        }
    }

    /// Creates a stream read error.
    pub fn read(message: impl Into<String>) -> Self {
        Self::Read {
            message: message.into(),
        }
    }
}

/// Terminal outcome of a failed or cancelled execution.
///
/// Malformed frames and payloads are never represented here; the decoder
/// recovers from those locally by skipping the offending record.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, serde::Serialize, serde::Deserialize)]
pub enum ExecutionFailure {
    /// Network or stream transport failed.
    #[error("network failure: {message}")]
    Network { message: String },
    /// The server reported an execution error (non-2xx status or an
    /// `error` stream event).
    #[error("server error: {message}")]
    Server { message: String },
    /// The stream violated the expected event protocol.
    #[error("protocol failure: {message}")]
    Protocol { message: String },
    /// The execution was cancelled by the user.
    #[error("execution cancelled")]
    Cancelled,
}

/// Top-level error type for the public client API.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ClientError {
    /// Invalid client configuration.
    #[error("config error: {0}")]
    Config(String),
    /// An execution is already in flight for this manager.
    #[error("an execution is already active for task index {task_index}")]
    Busy { task_index: usize },
    /// Transport error surfaced outside a running stream.
    #[error(transparent)]
    Transport(#[from] TransportError),
}

pub(crate) fn failure_from_transport(err: &TransportError) -> ExecutionFailure {
    match err {
        TransportError::Request { message } | TransportError::Read { message } => {
            ExecutionFailure::Network {
                message: message.clone(),
            }
        }
        TransportError::Status { status, body } => ExecutionFailure::Server {
            message: format!("status {status}: {body}"),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_success_status_maps_to_server_failure() {
        let failure = failure_from_transport(&TransportError::status(502, "bad gateway"));
        assert!(matches!(failure, ExecutionFailure::Server { .. }));
    }

    #[test]
    fn read_error_maps_to_network_failure() {
        let failure = failure_from_transport(&TransportError::read("connection reset"));
        assert!(matches!(failure, ExecutionFailure::Network { .. }));
    }
}
