//! Run / analysis documents as persisted to the artifact store.

use serde_json::{Value, json};

use super::{ToDocument, float_document};
use crate::domain::RunResult;

/// Where screenshot `id` (1-based) was stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScreenshotRef {
    pub id: usize,
    pub path: String,
}

impl ToDocument for ScreenshotRef {
    fn to_document(&self) -> Value {
        json!({ "id": self.id, "path": self.path })
    }
}

/// `run.json` of a test run. Screenshots are referenced by path, never embedded.
#[derive(Debug, Clone, Copy)]
pub struct RunDocument<'a> {
    pub result: &'a RunResult,
    pub screenshots: &'a [ScreenshotRef],
}

impl<'a> RunDocument<'a> {
    pub fn new(result: &'a RunResult, screenshots: &'a [ScreenshotRef]) -> Self {
        Self {
            result,
            screenshots,
        }
    }
}

impl ToDocument for RunDocument<'_> {
    fn to_document(&self) -> Value {
        let result = self.result;
        json!({
            "usage": result.usage.to_document(),
            "is_done": result.is_done,
            "is_successful": result.is_successful,
            "total_duration_seconds": float_document(result.total_duration_seconds),
            "has_errors": result.has_errors(),
            "model_actions": result.model_actions,
            "screenshots": self.screenshots.to_document(),
            "actions_results": result.action_results.to_document(),
            // no include list is configured, so the filtered view is empty
            "model_actions_filtered": [],
            "model_thoughts": result.model_thoughts.to_document(),
            "action_names": result.action_names(),
            "final_result": result.final_result,
            "extracted_content": result.extracted_content,
            "errors": result.errors,
            "model_outputs": result.model_outputs.to_document(),
        })
    }
}

/// Analysis document of a website analysis.
#[derive(Debug, Clone, Copy)]
pub struct AnalysisDocument<'a> {
    pub result: &'a RunResult,
}

impl<'a> AnalysisDocument<'a> {
    pub fn new(result: &'a RunResult) -> Self {
        Self { result }
    }
}

impl ToDocument for AnalysisDocument<'_> {
    fn to_document(&self) -> Value {
        let result = self.result;
        json!({
            "usage": result.usage.to_document(),
            "is_done": result.is_done,
            "is_successful": result.is_successful,
            "has_errors": result.has_errors(),
            "final_result": result.final_result,
            "errors": result.errors,
        })
    }
}
