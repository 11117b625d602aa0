//! Common imports for typical client usage.
//!
//! This module intentionally exports the most frequently used runtime
//! types so application code needs fewer import lines.
pub use crate::{
    AbortHandle, AgentRunClient, ClientConfig, ClientError, ExecOptions, ExecutionManager,
    MemoryTarget, OutputTarget, StreamEvent, TaskId, TaskStatus,
};
