//! Streaming task execution client for the agent-run API.
//!
//! The executor issues a single POST per task, decodes the
//! blank-line-delimited event stream from the response body, and renders
//! each event into an [`OutputTarget`] until the run completes, fails, or
//! is cancelled through the manager.
//!
//! # Usage
//!
//! ```no_run
//! use std::collections::HashMap;
//! use std::sync::Arc;
//!
//! use agentrun_client::prelude::*;
//! use agentrun_client::store::InMemoryTaskStore;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), ClientError> {
//! let client = AgentRunClient::new(
//!     ClientConfig::new("https://agents.example.com", "run-42"),
//! )?;
//! let store = Arc::new(InMemoryTaskStore::new());
//! let manager = ExecutionManager::new(Arc::new(client), store)
//!     .with_status_callback(|task_index, status| {
//!         println!("task {task_index} is now {status}");
//!     });
//!
//! let mut inputs = HashMap::new();
//! inputs.insert("prompt".to_string(), "summarize the report".to_string());
//! manager.start_execution(
//!     0,
//!     TaskId::new("task-uuid"),
//!     inputs,
//!     Box::new(MemoryTarget::with_placeholder()),
//! )?;
//! manager.wait_until_idle().await;
//! # Ok(())
//! # }
//! ```

/// HTTP client for the agent-run API and its configuration.
pub mod client;
/// Buffering decoder for the blank-line-delimited event stream.
pub mod decoder;
/// Public error types used by the client API.
pub mod errors;
/// Wire-level stream events.
pub mod event;
/// Execution manager, handle slot, and cancellation.
pub mod executor;
/// Tracing bootstrap.
pub mod observability;
/// Common imports for typical usage.
pub mod prelude;
/// Event-to-target render dispatch.
pub mod render;
/// Output target abstraction and the in-memory implementation.
pub mod sink;
/// Task-state store written by the executor.
pub mod store;
/// Task identifiers, statuses, and execution options.
pub mod task;
/// Transport seam between the executor and the server.
pub mod transport;

pub use client::{AgentRunClient, ClientConfig};
pub use decoder::FrameDecoder;
pub use errors::{ClientError, ExecutionFailure, TransportError};
pub use event::StreamEvent;
pub use executor::{AbortHandle, ExecutionHandle, ExecutionManager, StatusCallback};
pub use observability::init_observability;
pub use render::RenderDispatcher;
pub use sink::{MemoryTarget, OutputTarget, RenderedBlock};
pub use store::{InMemoryTaskStore, TaskStore};
pub use task::{ExecOptions, TaskId, TaskStatus};
pub use transport::{ByteStream, TaskTransport};
