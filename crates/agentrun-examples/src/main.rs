//! Execute one agent-run task against a live endpoint and stream its
//! output to the console. Ctrl-C cancels the execution.

use std::collections::HashMap;
use std::io::Write as _;
use std::sync::Arc;

use clap::Parser;

use agentrun_client::prelude::*;
use agentrun_client::store::{InMemoryTaskStore, TaskStore as _};

#[derive(Parser, Debug)]
#[command(about = "Stream one agent-run task execution to the console")]
struct Cli {
    /// Server base URL; falls back to AGENTRUN_BASE_URL.
    #[arg(long)]
    base_url: Option<String>,

    /// Agent run identifier; falls back to AGENTRUN_RUN_ID.
    #[arg(long)]
    run_id: Option<String>,

    /// Task to execute.
    #[arg(long)]
    task_id: String,

    /// Index of the task in the run's task list.
    #[arg(long, default_value_t = 0)]
    task_index: usize,

    /// Input values as `name=value` pairs; may be repeated.
    #[arg(long = "input", value_name = "NAME=VALUE")]
    inputs: Vec<String>,

    /// Optional CSRF token; falls back to AGENTRUN_CSRF_TOKEN.
    #[arg(long)]
    csrf_token: Option<String>,
}

struct ConsoleTarget;

impl OutputTarget for ConsoleTarget {
    fn clear_placeholder(&mut self) {}

    fn append_html(&mut self, html: &str) {
        println!("{html}");
    }

    fn append_text(&mut self, _region_id: &str, text: &str) {
        print!("{text}");
        let _ = std::io::stdout().flush();
    }

    fn set_region(&mut self, region_id: &str, html: &str) {
        println!("[{region_id}] {html}");
    }

    fn remove_region(&mut self, _region_id: &str) {}

    fn append_final_block(&mut self, html: &str) {
        println!("\n=== result ===\n{html}");
    }

    fn append_error_block(&mut self, message: &str) {
        eprintln!("\n!!! {message}");
    }

    fn append_cancel_notice(&mut self, message: &str) {
        eprintln!("\n--- {message}");
    }

    fn scroll_to_end(&mut self) {}
}

fn parse_input(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((name, value)) if !name.trim().is_empty() => {
            Ok((name.trim().to_string(), value.to_string()))
        }
        _ => Err(format!("input must be NAME=VALUE, got `{raw}`")),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    agentrun_client::init_observability();
    let cli = Cli::parse();

    let mut config = match (&cli.base_url, &cli.run_id) {
        (Some(base_url), Some(run_id)) => ClientConfig::new(base_url, run_id),
        _ => ClientConfig::from_env()?,
    };
    if let Some(token) = cli.csrf_token {
        config = config.csrf_token(token);
    }

    let mut inputs = HashMap::new();
    for raw in &cli.inputs {
        let (name, value) = parse_input(raw)?;
        inputs.insert(name, value);
    }

    let client = AgentRunClient::new(config)?;
    let store = Arc::new(InMemoryTaskStore::new());
    let manager = Arc::new(
        ExecutionManager::new(Arc::new(client), store.clone()).with_status_callback(
            |task_index, status| {
                println!("-- task {task_index}: {status}");
            },
        ),
    );

    manager.start_execution(
        cli.task_index,
        TaskId::new(cli.task_id),
        inputs,
        Box::new(ConsoleTarget),
    )?;

    {
        let manager = manager.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                manager.cancel_execution();
            }
        });
    }

    manager.wait_until_idle().await;
    if let Some(status) = store.status(cli.task_index) {
        println!("final status: {status}");
    }
    Ok(())
}
