//! Test doubles shared by the unit tests.

use std::collections::VecDeque;
use std::sync::Arc;

use chrono::{TimeZone, Utc};
use serde_json::json;
use tokio::sync::Mutex;

use crate::domain::{RunResult, Screenshot};
use crate::ports::{AgentError, AgentTask, AutomationAgent, FixedClock};

/// What the scripted agent does on one call.
pub enum Step {
    Return(RunResult),
    Fail(String),
    /// Never completes; only a deadline gets the caller out.
    Hang,
}

/// Agent that replays a script, then keeps returning successful runs.
#[derive(Default)]
pub struct ScriptedAgent {
    script: Mutex<VecDeque<Step>>,
    calls: Mutex<Vec<AgentTask>>,
}

impl ScriptedAgent {
    pub fn new(steps: impl IntoIterator<Item = Step>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(steps.into_iter().collect()),
            calls: Mutex::new(Vec::new()),
        })
    }

    pub async fn calls(&self) -> Vec<AgentTask> {
        self.calls.lock().await.clone()
    }
}

#[async_trait::async_trait]
impl AutomationAgent for ScriptedAgent {
    async fn run(&self, task: &AgentTask) -> Result<RunResult, AgentError> {
        self.calls.lock().await.push(task.clone());
        task.provider()?;
        let step = self.script.lock().await.pop_front();
        match step {
            Some(Step::Return(result)) => Ok(result),
            Some(Step::Fail(message)) => Err(AgentError::Run(message)),
            Some(Step::Hang) => std::future::pending().await,
            None => Ok(successful_run(1)),
        }
    }
}

/// Finished run with an explicit `done` success and `screenshots` images.
pub fn successful_run(screenshots: usize) -> RunResult {
    RunResult {
        is_done: true,
        is_successful: Some(true),
        total_duration_seconds: 4.0,
        model_actions: vec![
            json!({"go_to_url": {"url": "https://shop.test"}}),
            json!({"done": {"success": true, "text": "checked out"}}),
        ],
        errors: vec![None, None],
        final_result: Some("checked out".into()),
        screenshots: (1..=screenshots)
            .map(|n| Screenshot::new(format!("png-{n}").into_bytes()))
            .collect(),
        ..RunResult::default()
    }
}

/// Finished run whose last action reports failure.
pub fn explicitly_failed_run() -> RunResult {
    RunResult {
        is_done: true,
        is_successful: Some(false),
        model_actions: vec![json!({"done": {"success": false, "text": "cart is empty"}})],
        errors: vec![Some("cart is empty".into())],
        ..RunResult::default()
    }
}

pub fn test_run_body(slug: &str) -> String {
    json!({
        "taskType": "test-run",
        "testRunSlug": slug,
        "task": "Add the cheapest item to the cart and check out",
        "modelProvider": "openai",
        "modelSlug": "gpt-4.1-mini",
    })
    .to_string()
}

pub fn analysis_body(organization: &str, id: i64, domain: &str) -> String {
    json!({
        "taskType": "website-analysis",
        "organizationSlug": organization,
        "organizationId": id,
        "organizationDomain": domain,
        "modelProvider": "google",
        "modelSlug": "gemini-2.5-flash",
    })
    .to_string()
}

pub fn fixed_clock() -> Arc<FixedClock> {
    let start = Utc.with_ymd_and_hms(2025, 5, 1, 9, 0, 0).unwrap();
    Arc::new(FixedClock::new(start))
}
