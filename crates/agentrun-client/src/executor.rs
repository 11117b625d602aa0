use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures::StreamExt as _;
use tokio::sync::{Notify, watch};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::decoder::FrameDecoder;
use crate::errors::{ClientError, ExecutionFailure, failure_from_transport};
use crate::event::StreamEvent;
use crate::render::RenderDispatcher;
use crate::sink::OutputTarget;
use crate::store::TaskStore;
use crate::task::{ExecOptions, TaskId, TaskStatus};
use crate::transport::TaskTransport;

const CANCEL_NOTICE: &str = "Task execution stopped by user";

/// Callback invoked with `(task_index, status)` on every status
/// transition made by the executor.
pub type StatusCallback = Arc<dyn Fn(usize, TaskStatus) + Send + Sync>;

/// Handle used to request cancellation of the in-flight execution.
#[derive(Clone)]
pub struct AbortHandle {
    tx: watch::Sender<bool>,
}

impl AbortHandle {
    /// Requests cancellation.
    ///
    /// Cancellation is cooperative: it stops further chunks from being
    /// awaited and settles the execution as `cancelled`.
    pub fn abort(&self) {
        let _ = self.tx.send(true);
    }
}

/// Live-state token for one in-flight streamed task execution.
pub struct ExecutionHandle {
    task_index: usize,
    task_id: TaskId,
    execution_id: Uuid,
    abort: AbortHandle,
}

impl ExecutionHandle {
    /// Returns the task index this execution renders into.
    pub fn task_index(&self) -> usize {
        self.task_index
    }

    /// Returns the executed task's id.
    pub fn task_id(&self) -> &TaskId {
        &self.task_id
    }

    /// Returns the execution id used for log correlation.
    pub fn execution_id(&self) -> Uuid {
        self.execution_id
    }
}

fn lock_slot(slot: &Mutex<Option<ExecutionHandle>>) -> MutexGuard<'_, Option<ExecutionHandle>> {
    slot.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Owner of the single execution slot.
///
/// At most one execution is in flight per manager; a second
/// `start_execution` while one is active returns `ClientError::Busy`.
/// The slot and the output target are only touched from the spawned
/// execution task and behind the slot mutex, so a multi-threaded runtime
/// observes the same serialization as a single-threaded host.
pub struct ExecutionManager {
    transport: Arc<dyn TaskTransport>,
    store: Arc<dyn TaskStore>,
    on_status: Option<StatusCallback>,
    options: ExecOptions,
    slot: Arc<Mutex<Option<ExecutionHandle>>>,
    idle: Arc<Notify>,
}

impl ExecutionManager {
    /// Creates a manager over a transport and a task-state store.
    pub fn new(transport: Arc<dyn TaskTransport>, store: Arc<dyn TaskStore>) -> Self {
        Self {
            transport,
            store,
            on_status: None,
            options: ExecOptions::default(),
            slot: Arc::new(Mutex::new(None)),
            idle: Arc::new(Notify::new()),
        }
    }

    /// Registers the status-change callback.
    pub fn with_status_callback(
        mut self,
        callback: impl Fn(usize, TaskStatus) + Send + Sync + 'static,
    ) -> Self {
        self.on_status = Some(Arc::new(callback));
        self
    }

    /// Sets execution options applied to every run.
    pub fn with_options(mut self, options: ExecOptions) -> Self {
        self.options = options;
        self
    }

    /// Returns true while an execution is in flight.
    pub fn is_running(&self) -> bool {
        lock_slot(&self.slot).is_some()
    }

    /// Returns the task of the in-flight execution, if any.
    ///
    /// The invoking UI uses this to keep the start control disabled while
    /// a task runs.
    pub fn current_task(&self) -> Option<(usize, TaskId)> {
        lock_slot(&self.slot)
            .as_ref()
            .map(|handle| (handle.task_index, handle.task_id.clone()))
    }

    /// Starts a streamed execution for one task.
    ///
    /// Issues the POST, decodes the response stream, and renders every
    /// event into `target` until a terminal event, a transport failure,
    /// or cancellation settles the run. Must be called from within a
    /// tokio runtime.
    pub fn start_execution(
        &self,
        task_index: usize,
        task_id: impl Into<TaskId>,
        inputs: HashMap<String, String>,
        target: Box<dyn OutputTarget>,
    ) -> Result<(), ClientError> {
        let task_id = task_id.into();
        let execution_id = Uuid::new_v4();
        let (abort_tx, abort_rx) = watch::channel(false);

        {
            let mut slot = lock_slot(&self.slot);
            if let Some(active) = slot.as_ref() {
                return Err(ClientError::Busy {
                    task_index: active.task_index,
                });
            }
            *slot = Some(ExecutionHandle {
                task_index,
                task_id: task_id.clone(),
                execution_id,
                abort: AbortHandle { tx: abort_tx },
            });
        }

        info!(%execution_id, task = %task_id, task_index, "starting task execution");
        tokio::spawn(
            ExecutionTask {
                transport: self.transport.clone(),
                store: self.store.clone(),
                on_status: self.on_status.clone(),
                options: self.options.clone(),
                slot: self.slot.clone(),
                idle: self.idle.clone(),
                task_index,
                task_id,
                execution_id,
                inputs,
                abort_rx,
                target,
            }
            .run(),
        );
        Ok(())
    }

    /// Cancels the in-flight execution, if any.
    ///
    /// Aborts the stream and fires a best-effort stop notification at the
    /// server; the client-visible status settles as `cancelled` when the
    /// execution task observes the abort. A cancel with no active
    /// execution is a logged no-op.
    pub fn cancel_execution(&self) {
        let slot = lock_slot(&self.slot);
        let Some(handle) = slot.as_ref() else {
            debug!("cancel requested with no active execution");
            return;
        };

        info!(execution_id = %handle.execution_id, task = %handle.task_id, "cancelling task execution");
        handle.abort.abort();

        let transport = self.transport.clone();
        let task_id = handle.task_id.clone();
        tokio::spawn(async move {
            if let Err(err) = transport.send_stop(&task_id).await {
                warn!(task = %task_id, %err, "stop notification failed");
            }
        });
    }

    /// Waits until no execution is in flight.
    pub async fn wait_until_idle(&self) {
        loop {
            let notified = self.idle.notified();
            if !self.is_running() {
                return;
            }
            notified.await;
        }
    }

    /// Replays a previously persisted HTML result into a target.
    ///
    /// Returns true when a saved result existed. A task whose stored
    /// status is `completed` is re-announced through the status callback
    /// so indicators can catch up after a reload.
    pub fn restore_saved_result(&self, task_index: usize, target: &mut dyn OutputTarget) -> bool {
        let Some(html) = self.store.html_result(task_index) else {
            return false;
        };
        target.clear_placeholder();
        target.append_html(&html);
        if self.store.status(task_index) == Some(TaskStatus::Completed)
            && let Some(callback) = &self.on_status
        {
            callback(task_index, TaskStatus::Completed);
        }
        true
    }
}

struct ExecutionTask {
    transport: Arc<dyn TaskTransport>,
    store: Arc<dyn TaskStore>,
    on_status: Option<StatusCallback>,
    options: ExecOptions,
    slot: Arc<Mutex<Option<ExecutionHandle>>>,
    idle: Arc<Notify>,
    task_index: usize,
    task_id: TaskId,
    execution_id: Uuid,
    inputs: HashMap<String, String>,
    abort_rx: watch::Receiver<bool>,
    target: Box<dyn OutputTarget>,
}

impl ExecutionTask {
    async fn run(mut self) {
        let mut abort_rx = self.abort_rx.clone();

        let opened = tokio::select! {
            opened = self
                .transport
                .open_stream(&self.task_id, &self.inputs, &self.options) => Some(opened),
            _ = aborted(&mut abort_rx) => None,
        };

        let mut stream = match opened {
            None => {
                self.settle_cancelled();
                return;
            }
            Some(Ok(stream)) => stream,
            Some(Err(err)) => {
                self.settle_failure(failure_from_transport(&err));
                return;
            }
        };

        let mut decoder = FrameDecoder::new();
        let mut dispatcher = RenderDispatcher::new();
        loop {
            let next = tokio::select! {
                next = stream.next() => next,
                _ = aborted(&mut abort_rx) => {
                    self.settle_cancelled();
                    return;
                }
            };

            match next {
                Some(Ok(chunk)) => {
                    for event in decoder.push_chunk(&chunk) {
                        match event {
                            StreamEvent::Complete { html_result } => {
                                if let Some(html) = html_result {
                                    self.store.save_html_result(self.task_index, html);
                                }
                                self.settle(TaskStatus::Completed);
                                return;
                            }
                            StreamEvent::Error { message } => {
                                self.target.append_error_block(&message);
                                self.target.scroll_to_end();
                                self.settle(TaskStatus::Error);
                                return;
                            }
                            event => dispatcher.apply(&event, self.target.as_mut()),
                        }
                    }
                }
                Some(Err(err)) => {
                    // A read error that races the abort still settles as
                    // cancelled, never as a generic failure.
                    if *abort_rx.borrow() {
                        self.settle_cancelled();
                    } else {
                        self.settle_failure(failure_from_transport(&err));
                    }
                    return;
                }
                None => {
                    decoder.finish();
                    self.settle_failure(ExecutionFailure::Protocol {
                        message: "stream ended without a terminal event".into(),
                    });
                    return;
                }
            }
        }
    }

    fn settle_cancelled(&mut self) {
        info!(execution_id = %self.execution_id, task = %self.task_id, "task execution cancelled");
        self.target.append_cancel_notice(CANCEL_NOTICE);
        self.target.scroll_to_end();
        self.settle(TaskStatus::Cancelled);
    }

    fn settle_failure(&mut self, failure: ExecutionFailure) {
        warn!(execution_id = %self.execution_id, task = %self.task_id, %failure, "task execution failed");
        self.target.append_error_block(&failure.to_string());
        self.target.scroll_to_end();
        self.settle(TaskStatus::Error);
    }

    fn settle(&mut self, status: TaskStatus) {
        debug!(execution_id = %self.execution_id, task_index = self.task_index, %status, "task execution settled");
        self.store.set_status(self.task_index, status);
        if let Some(callback) = &self.on_status {
            callback(self.task_index, status);
        }
        lock_slot(&self.slot).take();
        self.idle.notify_waiters();
    }
}

/// Resolves once cancellation has been requested; pends forever when the
/// abort sender is gone (the execution is settling anyway).
async fn aborted(rx: &mut watch::Receiver<bool>) {
    loop {
        if *rx.borrow() {
            return;
        }
        if rx.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}
