use std::collections::HashMap;
use std::time::Duration;

use futures::StreamExt as _;
use tracing::debug;

use crate::errors::{ClientError, TransportError};
use crate::task::{ExecOptions, TaskId};
use crate::transport::{ByteStream, TaskTransport};

const CSRF_HEADER: &str = "X-CSRFToken";

/// Configuration for the agent-run HTTP client.
#[derive(Clone, Debug)]
pub struct ClientConfig {
    /// Server base URL, e.g. `https://agents.example.com`.
    pub base_url: String,
    /// Identifier of the agent run whose tasks are executed.
    pub run_id: String,
    /// Optional CSRF token sent as `X-CSRFToken` on every request.
    pub csrf_token: Option<String>,
    /// Default HTTP timeout for non-streaming requests.
    pub timeout: Duration,
}

impl ClientConfig {
    /// Creates a config with default timeout for the given run.
    pub fn new(base_url: impl Into<String>, run_id: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            run_id: run_id.into(),
            csrf_token: None,
            timeout: Duration::from_secs(120),
        }
    }

    /// Builds a config from `AGENTRUN_BASE_URL`, `AGENTRUN_RUN_ID`, and
    /// optionally `AGENTRUN_CSRF_TOKEN`.
    pub fn from_env() -> Result<Self, ClientError> {
        let base_url = std::env::var("AGENTRUN_BASE_URL").unwrap_or_default();
        if base_url.trim().is_empty() {
            return Err(ClientError::Config(
                "missing AGENTRUN_BASE_URL for agent-run client".into(),
            ));
        }
        let run_id = std::env::var("AGENTRUN_RUN_ID").unwrap_or_default();
        if run_id.trim().is_empty() {
            return Err(ClientError::Config(
                "missing AGENTRUN_RUN_ID for agent-run client".into(),
            ));
        }
        let mut config = Self::new(base_url, run_id);
        if let Ok(token) = std::env::var("AGENTRUN_CSRF_TOKEN")
            && !token.trim().is_empty()
        {
            config.csrf_token = Some(token);
        }
        Ok(config)
    }

    /// Sets the CSRF token.
    pub fn csrf_token(mut self, token: impl Into<String>) -> Self {
        self.csrf_token = Some(token.into());
        self
    }

    /// Overrides the default HTTP timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn api_root(&self) -> String {
        format!(
            "{}/agents/api/agent_run/{}",
            self.base_url.trim_end_matches('/'),
            self.run_id
        )
    }

    pub(crate) fn task_execute_url(&self, task_id: &TaskId) -> String {
        format!("{}/task_execute/{}/stream", self.api_root(), task_id)
    }

    pub(crate) fn task_stop_url(&self, task_id: &TaskId) -> String {
        format!("{}/task_execute/{}/stop", self.api_root(), task_id)
    }

    pub(crate) fn task_input_url(&self, task_id: &TaskId) -> String {
        format!("{}/task_input/{}", self.api_root(), task_id)
    }

    pub(crate) fn selected_task_url(&self) -> String {
        format!("{}/selected_task", self.api_root())
    }
}

#[derive(serde::Deserialize)]
struct SaveAck {
    success: bool,
    #[serde(default)]
    error: Option<String>,
}

/// HTTP client for the agent-run API.
///
/// Implements `TaskTransport` for the streaming executor and exposes the
/// task-input and selected-task persistence calls directly.
pub struct AgentRunClient {
    http: reqwest::Client,
    config: ClientConfig,
}

impl AgentRunClient {
    /// Creates a client from explicit configuration.
    pub fn new(config: ClientConfig) -> Result<Self, ClientError> {
        if config.base_url.trim().is_empty() {
            return Err(ClientError::Config("base_url must not be empty".into()));
        }
        if config.run_id.trim().is_empty() {
            return Err(ClientError::Config("run_id must not be empty".into()));
        }
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| ClientError::Config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { http, config })
    }

    /// Creates a client from `AGENTRUN_*` environment variables.
    pub fn from_env() -> Result<Self, ClientError> {
        Self::new(ClientConfig::from_env()?)
    }

    fn post_json(&self, url: String, body: &serde_json::Value) -> reqwest::RequestBuilder {
        let mut req = self.http.post(url).json(body);
        if let Some(token) = &self.config.csrf_token {
            req = req.header(CSRF_HEADER, token);
        }
        req
    }

    async fn send_ack(&self, url: String, body: serde_json::Value) -> Result<(), TransportError> {
        let response = self
            .post_json(url, &body)
            .send()
            .await
            .map_err(|e| TransportError::request(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(TransportError::status(status.as_u16(), body));
        }
        let ack: SaveAck = response
            .json()
            .await
            .map_err(|e| TransportError::read(format!("invalid ack body: {e}")))?;
        if !ack.success {
            return Err(TransportError::request(
                ack.error.unwrap_or_else(|| "server rejected the update".into()),
            ));
        }
        Ok(())
    }

    /// Persists the task's input values server-side.
    pub async fn save_task_inputs(
        &self,
        task_id: &TaskId,
        inputs: &HashMap<String, String>,
    ) -> Result<(), TransportError> {
        debug!(task = %task_id, "saving task inputs");
        self.send_ack(
            self.config.task_input_url(task_id),
            serde_json::json!({ "inputs": inputs }),
        )
        .await
    }

    /// Persists which task is currently selected in the run view.
    pub async fn save_selected_task(&self, task_index: usize) -> Result<(), TransportError> {
        debug!(task_index, "saving selected task");
        self.send_ack(
            self.config.selected_task_url(),
            serde_json::json!({ "task_index": task_index }),
        )
        .await
    }
}

#[async_trait::async_trait]
impl TaskTransport for AgentRunClient {
    async fn open_stream(
        &self,
        task_id: &TaskId,
        inputs: &HashMap<String, String>,
        options: &ExecOptions,
    ) -> Result<ByteStream, TransportError> {
        debug!(task = %task_id, "starting task execution stream");
        let mut req = self
            .post_json(
                self.config.task_execute_url(task_id),
                &serde_json::json!({ "inputs": inputs }),
            )
            .header(reqwest::header::ACCEPT, "text/plain");
        if let Some(timeout) = options.timeout {
            req = req.timeout(timeout);
        }

        let response = req
            .send()
            .await
            .map_err(|e| TransportError::request(format!("execution request failed: {e}")))?;
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(TransportError::status(status.as_u16(), body));
        }

        let stream = response
            .bytes_stream()
            .map(|item| item.map_err(|e| TransportError::read(e.to_string())));
        Ok(Box::pin(stream))
    }

    async fn send_stop(&self, task_id: &TaskId) -> Result<(), TransportError> {
        debug!(task = %task_id, "sending stop notification");
        let response = self
            .post_json(self.config.task_stop_url(task_id), &serde_json::json!({}))
            .send()
            .await
            .map_err(|e| TransportError::request(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(TransportError::status(status.as_u16(), body));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> ClientConfig {
        ClientConfig::new("https://agents.example.com/", "run-42")
    }

    #[test]
    fn urls_are_rooted_at_the_agent_run_api() {
        let task = TaskId::new("task-7");
        let config = config();
        assert_eq!(
            config.task_execute_url(&task),
            "https://agents.example.com/agents/api/agent_run/run-42/task_execute/task-7/stream"
        );
        assert_eq!(
            config.task_stop_url(&task),
            "https://agents.example.com/agents/api/agent_run/run-42/task_execute/task-7/stop"
        );
        assert_eq!(
            config.task_input_url(&task),
            "https://agents.example.com/agents/api/agent_run/run-42/task_input/task-7"
        );
        assert_eq!(
            config.selected_task_url(),
            "https://agents.example.com/agents/api/agent_run/run-42/selected_task"
        );
    }

    #[test]
    fn client_rejects_empty_run_id() {
        let result = AgentRunClient::new(ClientConfig::new("https://x", " "));
        assert!(matches!(result, Err(ClientError::Config(_))));
    }

    #[test]
    fn csrf_token_builder_sets_the_token() {
        let config = config().csrf_token("tok");
        assert_eq!(config.csrf_token.as_deref(), Some("tok"));
    }
}
