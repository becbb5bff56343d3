//! Result Codec - 実行結果を JSON ドキュメントへ変換
//!
//! 実行時の属性探索はしません。結果の各パーツが `ToDocument` を実装し、
//! 未知の値は `Residue::Opaque` に落とします。
//! そのためシリアライズは表現できない値（NaN など）でも失敗しません。

mod document;
mod residue;

use bytes::Bytes;
use serde_json::Value;

pub use self::document::{AnalysisDocument, RunDocument, ScreenshotRef};

/// Explicit conversion of one result part into a JSON document.
pub trait ToDocument {
    fn to_document(&self) -> Value;
}

impl<T: ToDocument> ToDocument for Option<T> {
    fn to_document(&self) -> Value {
        self.as_ref().map_or(Value::Null, T::to_document)
    }
}

impl<T: ToDocument> ToDocument for [T] {
    fn to_document(&self) -> Value {
        Value::Array(self.iter().map(T::to_document).collect())
    }
}

impl<T: ToDocument> ToDocument for Vec<T> {
    fn to_document(&self) -> Value {
        self.as_slice().to_document()
    }
}

impl ToDocument for Value {
    fn to_document(&self) -> Value {
        self.clone()
    }
}

impl ToDocument for String {
    fn to_document(&self) -> Value {
        Value::String(self.clone())
    }
}

/// JSON number for finite floats, a string (`"NaN"`, `"inf"`, `"-inf"`) otherwise.
pub fn float_document(value: f64) -> Value {
    serde_json::Number::from_f64(value)
        .map(Value::Number)
        .unwrap_or_else(|| Value::String(value.to_string()))
}

/// Pretty-printed (2-space indent) UTF-8 JSON.
pub fn encode(document: &impl ToDocument) -> Result<Bytes, serde_json::Error> {
    serde_json::to_vec_pretty(&document.to_document()).map(Bytes::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serde_json::json;

    #[rstest]
    #[case::finite(1.5, json!(1.5))]
    #[case::nan(f64::NAN, json!("NaN"))]
    #[case::inf(f64::INFINITY, json!("inf"))]
    #[case::neg_inf(f64::NEG_INFINITY, json!("-inf"))]
    fn floats_always_have_a_representation(#[case] value: f64, #[case] expected: Value) {
        assert_eq!(float_document(value), expected);
    }

    #[test]
    fn options_and_lists_compose() {
        let values: Vec<Option<String>> = vec![Some("a".into()), None];
        assert_eq!(values.to_document(), json!(["a", null]));
    }

    #[test]
    fn encoding_is_pretty_printed() {
        let bytes = encode(&json!({"a": 1})).unwrap();
        assert_eq!(std::str::from_utf8(&bytes).unwrap(), "{\n  \"a\": 1\n}");
    }
}
