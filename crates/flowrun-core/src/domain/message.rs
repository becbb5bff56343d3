//! Task Message: the unit pulled from the queue.
//!
//! The body is a JSON document tagged by `taskType`. Producers add extra
//! fields (`testSlug`, `userEmail`, `createdAt`, ...) that the worker ignores.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::analysis::OrganizationId;
use super::ids::{OrganizationSlug, TestRunSlug, TestVersionSlug};
use super::model::ModelChoice;

/// A parsed task message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "taskType")]
pub enum TaskMessage {
    #[serde(rename = "test-run")]
    TestRun(TestRunTask),

    #[serde(rename = "website-analysis")]
    WebsiteAnalysis(AnalysisTask),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestRunTask {
    pub test_run_slug: TestRunSlug,

    /// Natural-language description handed to the agent.
    pub task: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_provider: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_slug: Option<String>,

    /// Present on suite runs; enables the prior-run context lookup.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test_version_slug: Option<TestVersionSlug>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisTask {
    pub organization_slug: OrganizationSlug,
    pub organization_id: OrganizationId,
    pub organization_domain: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_provider: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_slug: Option<String>,
}

/// Task kind, as named by `taskType` on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskKind {
    TestRun,
    WebsiteAnalysis,
}

impl TaskKind {
    pub fn as_str(self) -> &'static str {
        match self {
            TaskKind::TestRun => "test-run",
            TaskKind::WebsiteAnalysis => "website-analysis",
        }
    }
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TaskMessage {
    /// Parse a raw queue body. Unknown or missing `taskType` is an error.
    pub fn parse(body: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(body)
    }

    pub fn kind(&self) -> TaskKind {
        match self {
            TaskMessage::TestRun(_) => TaskKind::TestRun,
            TaskMessage::WebsiteAnalysis(_) => TaskKind::WebsiteAnalysis,
        }
    }
}

impl TestRunTask {
    pub fn model(&self, fallback: &ModelChoice) -> ModelChoice {
        ModelChoice::resolve(
            self.model_provider.as_deref(),
            self.model_slug.as_deref(),
            fallback,
        )
    }
}

impl AnalysisTask {
    pub fn model(&self, fallback: &ModelChoice) -> ModelChoice {
        ModelChoice::resolve(
            self.model_provider.as_deref(),
            self.model_slug.as_deref(),
            fallback,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn parses_suite_test_run_with_extra_fields() {
        let body = r#"{
            "taskType": "test-run",
            "testRunSlug": "abc123",
            "testVersionSlug": "v-9",
            "testSlug": "checkout",
            "projectSlug": "shop",
            "organizationSlug": "acme",
            "createdAt": "2025-01-01T00:00:00Z",
            "userEmail": "qa@example.com",
            "task": "Buy the cheapest item",
            "modelProvider": "openai",
            "modelSlug": "gpt-4.1-mini"
        }"#;

        let TaskMessage::TestRun(task) = TaskMessage::parse(body).unwrap() else {
            panic!("expected a test run");
        };
        assert_eq!(task.test_run_slug.as_str(), "abc123");
        assert_eq!(task.test_version_slug.unwrap().as_str(), "v-9");
        assert_eq!(task.model_provider.as_deref(), Some("openai"));
    }

    #[test]
    fn test_run_without_model_uses_fallback() {
        let body = r#"{"taskType":"test-run","testRunSlug":"r1","task":"open the home page"}"#;
        let TaskMessage::TestRun(task) = TaskMessage::parse(body).unwrap() else {
            panic!("expected a test run");
        };
        assert_eq!(task.model(&ModelChoice::default()), ModelChoice::default());
    }

    #[rstest]
    #[case::numeric_id(r#"{"taskType":"website-analysis","organizationSlug":"acme","organizationId":42,"organizationDomain":"acme.test"}"#, OrganizationId::Numeric(42))]
    #[case::text_id(r#"{"taskType":"website-analysis","organizationSlug":"acme","organizationId":"org-42","organizationDomain":"acme.test"}"#, OrganizationId::Text("org-42".into()))]
    fn parses_website_analysis(#[case] body: &str, #[case] expected_id: OrganizationId) {
        let message = TaskMessage::parse(body).unwrap();
        assert_eq!(message.kind(), TaskKind::WebsiteAnalysis);
        let TaskMessage::WebsiteAnalysis(task) = message else {
            unreachable!()
        };
        assert_eq!(task.organization_id, expected_id);
        assert_eq!(task.organization_domain, "acme.test");
    }

    #[rstest]
    #[case::not_json("not json at all")]
    #[case::missing_type(r#"{"testRunSlug":"r1","task":"x"}"#)]
    #[case::unknown_type(r#"{"taskType":"crawl","testRunSlug":"r1","task":"x"}"#)]
    #[case::missing_slug(r#"{"taskType":"test-run","task":"x"}"#)]
    #[case::bad_slug(r#"{"taskType":"test-run","testRunSlug":"a/b","task":"x"}"#)]
    fn malformed_bodies_are_rejected(#[case] body: &str) {
        assert!(TaskMessage::parse(body).is_err());
    }
}
