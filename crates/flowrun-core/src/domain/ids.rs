//! Domain identifiers (strongly-typed slugs).
//!
//! # Phantom Type パターン
//! `Slug<T>` で共通実装を提供しつつ、`T` はマーカー型としてのみ使います。
//! TestRunSlug と OrganizationSlug はどちらも文字列ですが、混同できません。
//!
//! ## 検証
//! slug はアーティファクトキー（`test-runs/{slug}/...`）の一部になるため、
//! 空文字・`/`・`\`・`.`/`..` を拒否します。

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::marker::PhantomData;

/// SlugMarker は各 slug 型のマーカー trait
pub trait SlugMarker: Send + Sync + 'static {
    /// エラー・ログ表示用の名前（例: "test run"）
    fn label() -> &'static str;
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SlugError {
    #[error("{label} slug must not be empty")]
    Empty { label: &'static str },

    #[error("{label} slug '{value}' is not a single path segment")]
    NotASegment { label: &'static str, value: String },
}

/// ジェネリック slug 型
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Slug<T: SlugMarker> {
    value: String,
    _marker: PhantomData<T>,
}

impl<T: SlugMarker> Slug<T> {
    pub fn parse(value: impl Into<String>) -> Result<Self, SlugError> {
        let value = value.into();
        if value.trim().is_empty() {
            return Err(SlugError::Empty { label: T::label() });
        }
        if value == "." || value == ".." || value.contains(['/', '\\']) {
            return Err(SlugError::NotASegment {
                label: T::label(),
                value,
            });
        }
        Ok(Self {
            value,
            _marker: PhantomData,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.value
    }
}

impl<T: SlugMarker> fmt::Display for Slug<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.value)
    }
}

impl<T: SlugMarker> Serialize for Slug<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.value)
    }
}

impl<'de, T: SlugMarker> Deserialize<'de> for Slug<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = String::deserialize(deserializer)?;
        Self::parse(value).map_err(serde::de::Error::custom)
    }
}

// ========================================
// マーカー型の定義
// ========================================

/// TestRun のマーカー型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TestRun {}

impl SlugMarker for TestRun {
    fn label() -> &'static str {
        "test run"
    }
}

/// Organization のマーカー型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Organization {}

impl SlugMarker for Organization {
    fn label() -> &'static str {
        "organization"
    }
}

/// TestVersion のマーカー型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TestVersion {}

impl SlugMarker for TestVersion {
    fn label() -> &'static str {
        "test version"
    }
}

/// Slug of a test run; keys the Status Record and the `test-runs/` artifacts.
pub type TestRunSlug = Slug<TestRun>;

/// Slug of an organization; keys the `organizations/` artifacts.
pub type OrganizationSlug = Slug<Organization>;

/// Slug of a test version (used only for context lookups).
pub type TestVersionSlug = Slug<TestVersion>;

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn slug_keeps_its_value() {
        let slug = TestRunSlug::parse("abc123").unwrap();
        assert_eq!(slug.as_str(), "abc123");
        assert_eq!(slug.to_string(), "abc123");
    }

    #[rstest]
    #[case::empty("")]
    #[case::blank("   ")]
    #[case::dot(".")]
    #[case::dotdot("..")]
    #[case::nested("a/b")]
    #[case::backslash("a\\b")]
    fn unsafe_slugs_are_rejected(#[case] raw: &str) {
        assert!(TestRunSlug::parse(raw).is_err());
    }

    #[test]
    fn error_names_the_slug_kind() {
        let err = OrganizationSlug::parse("").unwrap_err();
        assert_eq!(err.to_string(), "organization slug must not be empty");
    }

    #[test]
    fn slugs_deserialize_through_validation() {
        let ok: TestRunSlug = serde_json::from_str("\"run-1\"").unwrap();
        assert_eq!(ok.as_str(), "run-1");

        let err = serde_json::from_str::<TestRunSlug>("\"../etc\"").unwrap_err();
        assert!(err.to_string().contains("single path segment"));
    }
}
