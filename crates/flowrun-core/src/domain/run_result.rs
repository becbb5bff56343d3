//! Run Result: what the automation agent hands back for one task.
//!
//! 一つのパイプライン呼び出しだけが所有します（共有しない）。
//! JSON への変換は `codec` の責務で、ここは値の形と判定ロジックのみ。

use bytes::Bytes;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use super::status::RunStatus;

/// JSON の `null` を `Default::default()` として読む。
///
/// `#[serde(default)]` はフィールドの欠落しか扱わないので、エージェントが
/// 未設定の値を `null` で送ってくるフィールドに付けます。
pub(crate) fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// One screenshot as raw PNG bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Screenshot(pub Bytes);

impl Screenshot {
    pub fn new(bytes: impl Into<Bytes>) -> Self {
        Self(bytes.into())
    }

    pub fn bytes(&self) -> &Bytes {
        &self.0
    }
}

/// The agent's reasoning for one step.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentThought {
    pub thinking: Option<String>,
    pub evaluation_previous_goal: Option<String>,
    pub memory: Option<String>,
    pub next_goal: Option<String>,
}

/// Outcome of one executed browser action.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ActionResult {
    pub is_done: Option<bool>,
    pub success: Option<bool>,
    pub error: Option<String>,
    #[serde(deserialize_with = "null_as_default")]
    pub attachments: Vec<String>,
    pub long_term_memory: Option<String>,
    pub extracted_content: Option<String>,
    #[serde(deserialize_with = "null_as_default")]
    pub include_extracted_content_only_once: bool,
    #[serde(deserialize_with = "null_as_default")]
    pub include_in_memory: bool,
}

/// Token and cost metrics for the whole run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UsageSummary {
    #[serde(deserialize_with = "null_as_default")]
    pub total_prompt_tokens: u64,
    #[serde(deserialize_with = "null_as_default")]
    pub total_completion_tokens: u64,
    #[serde(deserialize_with = "null_as_default")]
    pub total_tokens: u64,
    /// Not always finite: some providers report no price and the agent
    /// divides by zero.
    #[serde(deserialize_with = "null_as_default")]
    pub total_cost: f64,
    #[serde(deserialize_with = "null_as_default")]
    pub entry_count: u64,
}

/// Heterogeneous value produced by the agent.
///
/// 閉じた union: 未知の型は `Opaque` に落とし込み、シリアライズは決して失敗しない。
#[derive(Debug, Clone, PartialEq)]
pub enum Residue {
    Json(Value),
    Thought(AgentThought),
    ActionResult(ActionResult),
    Usage(UsageSummary),
    Opaque { type_name: String, repr: String },
}

impl Residue {
    pub fn opaque(type_name: impl Into<String>, repr: impl Into<String>) -> Self {
        Residue::Opaque {
            type_name: type_name.into(),
            repr: repr.into(),
        }
    }
}

/// Structured outcome of one agent run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunResult {
    pub is_done: bool,
    pub is_successful: Option<bool>,
    pub total_duration_seconds: f64,
    /// Ordered model actions, each an object keyed by the action name,
    /// e.g. `{"done": {"success": true, "text": "..."}}`.
    pub model_actions: Vec<Value>,
    pub action_results: Vec<ActionResult>,
    pub model_thoughts: Vec<AgentThought>,
    pub extracted_content: Vec<String>,
    pub final_result: Option<String>,
    /// One entry per step; `None` when the step had no error.
    pub errors: Vec<Option<String>>,
    pub usage: Option<UsageSummary>,
    pub model_outputs: Vec<Residue>,
    /// Capture order.
    pub screenshots: Vec<Screenshot>,
}

/// Keys the agent attaches to an action that are not the action itself.
const ACTION_METADATA_KEYS: &[&str] = &["interacted_element"];

impl RunResult {
    /// True when the last model action is an explicit `done` with `success: false`.
    pub fn last_action_failed(&self) -> bool {
        self.model_actions
            .last()
            .and_then(|action| action.get("done"))
            .and_then(|done| done.get("success"))
            .and_then(Value::as_bool)
            == Some(false)
    }

    /// Terminal status this run earns.
    pub fn verdict(&self) -> RunStatus {
        if !self.is_done || self.last_action_failed() {
            RunStatus::Failed
        } else {
            RunStatus::Succeeded
        }
    }

    pub fn has_errors(&self) -> bool {
        self.errors.iter().any(Option::is_some)
    }

    /// Action name per model action, in order.
    pub fn action_names(&self) -> Vec<String> {
        self.model_actions
            .iter()
            .filter_map(|action| {
                action
                    .as_object()?
                    .keys()
                    .find(|key| !ACTION_METADATA_KEYS.contains(&key.as_str()))
                    .cloned()
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serde_json::json;

    fn run(is_done: bool, actions: Vec<Value>) -> RunResult {
        RunResult {
            is_done,
            model_actions: actions,
            ..RunResult::default()
        }
    }

    #[rstest]
    #[case::done_without_actions(true, vec![], RunStatus::Succeeded)]
    #[case::done_success(true, vec![json!({"done": {"success": true, "text": "ok"}})], RunStatus::Succeeded)]
    #[case::done_success_missing(true, vec![json!({"done": {"text": "ok"}})], RunStatus::Succeeded)]
    #[case::last_action_not_done(true, vec![json!({"click": {"index": 3}})], RunStatus::Succeeded)]
    #[case::explicit_failure(true, vec![json!({"go_to_url": {}}), json!({"done": {"success": false}})], RunStatus::Failed)]
    #[case::not_done(false, vec![json!({"done": {"success": true}})], RunStatus::Failed)]
    #[case::not_done_no_actions(false, vec![], RunStatus::Failed)]
    fn verdict_follows_done_and_last_action(
        #[case] is_done: bool,
        #[case] actions: Vec<Value>,
        #[case] expected: RunStatus,
    ) {
        assert_eq!(run(is_done, actions).verdict(), expected);
    }

    #[test]
    fn earlier_failure_markers_do_not_count() {
        let result = run(
            true,
            vec![
                json!({"done": {"success": false}}),
                json!({"done": {"success": true}}),
            ],
        );
        assert!(!result.last_action_failed());
    }

    #[test]
    fn action_names_skip_metadata() {
        let result = run(
            true,
            vec![
                json!({"interacted_element": null, "click_element": {"index": 1}}),
                json!({"done": {"success": true}}),
                json!("not an object"),
            ],
        );
        assert_eq!(result.action_names(), vec!["click_element", "done"]);
    }

    #[test]
    fn null_agent_fields_read_as_defaults() {
        let action: ActionResult = serde_json::from_value(json!({
            "is_done": true,
            "success": null,
            "attachments": null,
            "include_extracted_content_only_once": null,
            "include_in_memory": null,
        }))
        .unwrap();
        assert_eq!(action.is_done, Some(true));
        assert!(action.attachments.is_empty());
        assert!(!action.include_in_memory);

        let usage: UsageSummary = serde_json::from_value(json!({
            "total_prompt_tokens": 120,
            "total_completion_tokens": null,
            "total_cost": null,
        }))
        .unwrap();
        assert_eq!(usage.total_prompt_tokens, 120);
        assert_eq!(usage.total_completion_tokens, 0);
        assert_eq!(usage.total_cost, 0.0);
    }

    #[test]
    fn has_errors_ignores_empty_steps() {
        let mut result = run(true, vec![]);
        result.errors = vec![None, None];
        assert!(!result.has_errors());
        result.errors.push(Some("timeout".into()));
        assert!(result.has_errors());
    }
}
