//! `ToDocument` for the result parts and the `Residue` union.

use serde_json::{Map, Value, json};

use super::{ToDocument, float_document};
use crate::domain::{ActionResult, AgentThought, Residue, UsageSummary};

impl ToDocument for AgentThought {
    fn to_document(&self) -> Value {
        json!({
            "thinking": self.thinking,
            "evaluation_previous_goal": self.evaluation_previous_goal,
            "memory": self.memory,
            "next_goal": self.next_goal,
        })
    }
}

impl ToDocument for ActionResult {
    fn to_document(&self) -> Value {
        json!({
            "is_done": self.is_done,
            "success": self.success,
            "error": self.error,
            "attachments": self.attachments,
            "long_term_memory": self.long_term_memory,
            "extracted_content": self.extracted_content,
            "include_extracted_content_only_once": self.include_extracted_content_only_once,
            "include_in_memory": self.include_in_memory,
        })
    }
}

impl ToDocument for UsageSummary {
    fn to_document(&self) -> Value {
        let mut document = Map::new();
        document.insert("total_prompt_tokens".into(), self.total_prompt_tokens.into());
        document.insert(
            "total_completion_tokens".into(),
            self.total_completion_tokens.into(),
        );
        document.insert("total_tokens".into(), self.total_tokens.into());
        document.insert("total_cost".into(), float_document(self.total_cost));
        document.insert("entry_count".into(), self.entry_count.into());
        Value::Object(document)
    }
}

impl ToDocument for Residue {
    fn to_document(&self) -> Value {
        match self {
            Residue::Json(value) => value.clone(),
            Residue::Thought(thought) => thought.to_document(),
            Residue::ActionResult(result) => result.to_document(),
            Residue::Usage(usage) => usage.to_document(),
            Residue::Opaque { type_name, repr } => Value::String(opaque_text(type_name, repr)),
        }
    }
}

/// `repr` when there is one, otherwise a placeholder naming the type.
fn opaque_text(type_name: &str, repr: &str) -> String {
    if !repr.trim().is_empty() {
        return repr.to_string();
    }
    match type_name.trim() {
        "" => "<opaque value>".to_string(),
        name => format!("<{name}>"),
    }
}
