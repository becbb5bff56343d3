//! HttpAgent - エージェント sidecar を HTTP で呼ぶ本番用アダプタ
//!
//! `POST {base}/runs` に `{task, modelProvider, modelSlug}` を送り、
//! 実行結果（スクリーンショットは base64 文字列）を受け取ります。
//! 2xx 以外は `AgentError::Rejected`。リトライはしません。
//! `model_outputs` の要素は `kind`（thought / action_result / usage / opaque）
//! があればその型に、なければ JSON のまま `Residue` にします。

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, instrument};

use crate::domain::run_result::null_as_default;
use crate::domain::{ActionResult, AgentThought, Residue, RunResult, Screenshot, UsageSummary};
use crate::ports::{AgentError, AgentTask, AutomationAgent};

#[derive(Debug, Clone)]
pub struct HttpAgent {
    client: reqwest::Client,
    base_url: String,
}

impl HttpAgent {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), base_url)
    }

    pub fn with_client(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { client, base_url }
    }

    fn runs_url(&self) -> String {
        format!("{}/runs", self.base_url)
    }
}

/// Response body of `POST /runs`.
///
/// 未設定の値は `null` で届くことがあるので、Option 以外は `null_as_default`。
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RunResponse {
    /// Set when the agent itself gave up on the run.
    error: Option<String>,
    #[serde(deserialize_with = "null_as_default")]
    is_done: bool,
    is_successful: Option<bool>,
    #[serde(deserialize_with = "null_as_default")]
    total_duration_seconds: f64,
    #[serde(deserialize_with = "null_as_default")]
    model_actions: Vec<Value>,
    #[serde(deserialize_with = "null_as_default")]
    action_results: Vec<ActionResult>,
    #[serde(deserialize_with = "null_as_default")]
    model_thoughts: Vec<AgentThought>,
    #[serde(deserialize_with = "null_as_default")]
    extracted_content: Vec<String>,
    final_result: Option<String>,
    #[serde(deserialize_with = "null_as_default")]
    errors: Vec<Option<String>>,
    usage: Option<UsageSummary>,
    #[serde(deserialize_with = "null_as_default")]
    model_outputs: Vec<Value>,
    /// Base64-encoded PNGs in capture order.
    #[serde(deserialize_with = "null_as_default")]
    screenshots: Vec<String>,
}

/// `model_outputs` の要素のうち、sidecar が `kind` で型を明示したもの
#[derive(Debug, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum TypedOutput {
    Thought(AgentThought),
    ActionResult(ActionResult),
    Usage(UsageSummary),
    Opaque {
        #[serde(default, rename = "type")]
        type_name: String,
        #[serde(default)]
        repr: String,
    },
}

const OUTPUT_KINDS: &[&str] = &["thought", "action_result", "usage", "opaque"];

/// Typed outputs become their `Residue` variant; everything else stays JSON.
fn residue_from_wire(value: Value) -> Residue {
    let typed = value
        .get("kind")
        .and_then(Value::as_str)
        .is_some_and(|kind| OUTPUT_KINDS.contains(&kind));
    if !typed {
        return Residue::Json(value);
    }
    match TypedOutput::deserialize(&value) {
        Ok(TypedOutput::Thought(thought)) => Residue::Thought(thought),
        Ok(TypedOutput::ActionResult(result)) => Residue::ActionResult(result),
        Ok(TypedOutput::Usage(usage)) => Residue::Usage(usage),
        Ok(TypedOutput::Opaque { type_name, repr }) => Residue::Opaque { type_name, repr },
        Err(err) => {
            debug!(error = %err, "model output does not match its kind; keeping it as JSON");
            Residue::Json(value)
        }
    }
}

impl RunResponse {
    fn into_run_result(self) -> Result<RunResult, AgentError> {
        if let Some(message) = self.error {
            return Err(AgentError::Run(message));
        }

        let screenshots = self
            .screenshots
            .iter()
            .enumerate()
            .map(|(index, encoded)| {
                STANDARD
                    .decode(encoded)
                    .map(Screenshot::new)
                    .map_err(|err| AgentError::Decode(format!("screenshot {}: {err}", index + 1)))
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(RunResult {
            is_done: self.is_done,
            is_successful: self.is_successful,
            total_duration_seconds: self.total_duration_seconds,
            model_actions: self.model_actions,
            action_results: self.action_results,
            model_thoughts: self.model_thoughts,
            extracted_content: self.extracted_content,
            final_result: self.final_result,
            errors: self.errors,
            usage: self.usage,
            model_outputs: self.model_outputs.into_iter().map(residue_from_wire).collect(),
            screenshots,
        })
    }
}

#[async_trait::async_trait]
impl AutomationAgent for HttpAgent {
    #[instrument(skip_all, fields(provider = %task.model_provider, model = %task.model_slug))]
    async fn run(&self, task: &AgentTask) -> Result<RunResult, AgentError> {
        task.provider()?;

        let response = self.client.post(self.runs_url()).json(task).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AgentError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        let body = response.bytes().await?;
        let decoded: RunResponse =
            serde_json::from_slice(&body).map_err(|err| AgentError::Decode(err.to_string()))?;
        let result = decoded.into_run_result()?;
        debug!(
            is_done = result.is_done,
            steps = result.model_actions.len(),
            screenshots = result.screenshots.len(),
            "agent run finished"
        );
        Ok(result)
    }
}
