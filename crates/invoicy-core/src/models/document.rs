//! Document references and the payloads extracted from them.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Names one uploaded file in the document store.
///
/// The storage path is never carried here; it is resolved through a
/// [`DocumentStore`](crate::store::DocumentStore) at dispatch time.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentRef {
    name: String,
}

impl DocumentRef {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    /// File name inside the store.
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for DocumentRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

impl From<&str> for DocumentRef {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for DocumentRef {
    fn from(name: String) -> Self {
        Self::new(name)
    }
}

/// Structured data recovered from one successful invocation.
///
/// The value is kept as the extractor produced it. Field shape is the
/// presenter's business, so only the sub-fields it relies on get accessors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExtractedPayload(Value);

impl ExtractedPayload {
    pub fn new(value: Value) -> Self {
        Self(value)
    }

    /// The raw JSON value.
    pub fn value(&self) -> &Value {
        &self.0
    }

    /// Paths of page images the extractor derived from the document.
    ///
    /// Non-string entries are skipped.
    pub fn image_paths(&self) -> Vec<&str> {
        self.0
            .get("image_paths")
            .and_then(Value::as_array)
            .map(|paths| paths.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default()
    }
}

impl From<Value> for ExtractedPayload {
    fn from(value: Value) -> Self {
        Self(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_image_paths_skips_non_strings() {
        let payload = ExtractedPayload::new(json!({
            "image_paths": ["uploads/a_page_1.jpg", 7, "uploads/a_page_2.jpg"]
        }));
        assert_eq!(
            payload.image_paths(),
            vec!["uploads/a_page_1.jpg", "uploads/a_page_2.jpg"]
        );
    }

    #[test]
    fn test_image_paths_missing() {
        let payload = ExtractedPayload::new(json!({"invoice_number": "FV/1/2024"}));
        assert!(payload.image_paths().is_empty());
    }

    #[test]
    fn test_document_ref_serializes_as_name() {
        let doc = DocumentRef::new("invoice.pdf");
        assert_eq!(serde_json::to_string(&doc).unwrap(), "\"invoice.pdf\"");
        assert_eq!(doc.to_string(), "invoice.pdf");
    }
}
