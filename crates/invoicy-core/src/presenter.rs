//! JSON rendering of batch outcomes for the web and CLI front ends.

use std::path::Path;

use serde_json::{Map, Value, json};

use crate::models::batch::{BatchEntry, BatchResult};
use crate::models::document::ExtractedPayload;

/// Renders entries the way the UI consumes them.
#[derive(Debug, Clone)]
pub struct Presenter {
    uploads_base_url: String,
}

impl Presenter {
    /// `uploads_base_url` is the public URL of the uploads directory.
    pub fn new(uploads_base_url: impl Into<String>) -> Self {
        let base: String = uploads_base_url.into();
        Self {
            uploads_base_url: base.trim_end_matches('/').to_string(),
        }
    }

    /// Public URL of an image the extractor wrote next to the uploads.
    pub fn image_url(&self, image_path: &str) -> String {
        let file_name = Path::new(image_path)
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| image_path.to_string());
        format!("{}/{}", self.uploads_base_url, file_name)
    }

    /// Render a successful payload.
    ///
    /// Object payloads get an `imageUrls` array built from `image_paths`;
    /// anything else is wrapped as `{"data": ...}`.
    pub fn present_payload(&self, payload: &ExtractedPayload) -> Value {
        let image_urls: Vec<Value> = payload
            .image_paths()
            .into_iter()
            .map(|p| Value::String(self.image_url(p)))
            .collect();

        match payload.value() {
            Value::Object(fields) => {
                let mut fields: Map<String, Value> = fields.clone();
                fields.insert("imageUrls".to_string(), Value::Array(image_urls));
                Value::Object(fields)
            }
            other => json!({ "data": other, "imageUrls": image_urls }),
        }
    }

    /// Render one batch entry.
    pub fn present_entry(&self, entry: &BatchEntry) -> Value {
        match &entry.outcome {
            Ok(payload) => self.present_payload(payload),
            Err(error) => json!({
                "document": entry.document.name(),
                "error": error.kind(),
                "details": error.to_string(),
            }),
        }
    }

    /// Render a batch as an array in input order.
    pub fn present_batch(&self, result: &BatchResult) -> Value {
        Value::Array(result.iter().map(|e| self.present_entry(e)).collect())
    }
}
