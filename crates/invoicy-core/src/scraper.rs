//! Recovery of the structured result from extractor output.
//!
//! The extractor writes free-form progress text to stdout and exactly one
//! marker line, `output data: <json>`, carrying its result. On failure it
//! may write a JSON object with an `error` field to stderr.

use lazy_static::lazy_static;
use regex::Regex;
use serde_json::Value;
use tracing::warn;

use crate::error::ScrapeError;
use crate::models::document::ExtractedPayload;

/// Prefix of the line carrying the JSON result.
pub const DEFAULT_MARKER: &str = "output data: ";

lazy_static! {
    // Progress report emitted by the extractor between steps
    static ref PROGRESS_LINE: Regex = Regex::new(
        r"^Progress:\s*(.+?)\s*$"
    ).unwrap();
}

/// Extract the payload using the default marker.
pub fn extract(stdout: &str) -> Result<ExtractedPayload, ScrapeError> {
    extract_with_marker(stdout, DEFAULT_MARKER)
}

/// Extract the payload following the first occurrence of `marker`.
///
/// The candidate JSON is the rest of the marker's line. Later marker lines
/// are ignored. No field of the payload is inspected.
pub fn extract_with_marker(stdout: &str, marker: &str) -> Result<ExtractedPayload, ScrapeError> {
    let start = stdout.find(marker).ok_or(ScrapeError::NoMarkerFound)?;
    let rest = &stdout[start + marker.len()..];
    let candidate = rest.lines().next().unwrap_or("");

    if rest[candidate.len()..].contains(marker) {
        warn!("Extractor output contains more than one marker line, using the first");
    }

    serde_json::from_str::<Value>(candidate)
        .map(ExtractedPayload::new)
        .map_err(|e| ScrapeError::MalformedPayload(e.to_string()))
}

/// Step name of a `Progress: <step>` line.
pub fn progress_step(line: &str) -> Option<&str> {
    PROGRESS_LINE
        .captures(line)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

/// Message of the last `{"error": ...}` report on stderr.
pub fn stderr_diagnostic(stderr: &str) -> Option<String> {
    stderr.lines().rev().find_map(|line| {
        let line = line.trim();
        if !line.starts_with('{') {
            return None;
        }
        serde_json::from_str::<Value>(line)
            .ok()?
            .get("error")?
            .as_str()
            .map(str::to_string)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_extract_single_marker() {
        let payload = extract("output data: {\"a\":1}\n").unwrap();
        assert_eq!(payload.value(), &json!({"a": 1}));
    }

    #[test]
    fn test_extract_among_progress() {
        let stdout = "Progress: Extracting information\n\
                      Extracted Text: FAKTURA VAT\n\
                      Progress: Ready to present\n\
                      output data: {\"invoice_number\": \"FV/12/2024\", \"total\": 123.45}\r\n\
                      bye\n";
        let payload = extract(stdout).unwrap();
        assert_eq!(
            payload.value(),
            &json!({"invoice_number": "FV/12/2024", "total": 123.45})
        );
    }

    #[test]
    fn test_extract_no_marker() {
        assert_eq!(
            extract("Progress: Extracting information\nnothing here\n"),
            Err(ScrapeError::NoMarkerFound)
        );
        assert_eq!(extract(""), Err(ScrapeError::NoMarkerFound));
    }

    #[test]
    fn test_extract_malformed() {
        let result = extract("output data: {not valid json\n");
        assert!(matches!(result, Err(ScrapeError::MalformedPayload(_))));
    }

    #[test]
    fn test_extract_empty_remainder() {
        let result = extract("output data: \nmore\n");
        assert!(matches!(result, Err(ScrapeError::MalformedPayload(_))));
    }

    #[test]
    fn test_marker_mid_line() {
        let payload = extract("[d2] output data: [1, 2, 3]").unwrap();
        assert_eq!(payload.value(), &json!([1, 2, 3]));
    }

    #[test]
    fn test_first_marker_wins() {
        let stdout = "output data: {\"page\":1}\noutput data: {\"page\":2}\n";
        assert_eq!(extract(stdout).unwrap().value(), &json!({"page": 1}));
    }

    #[test]
    fn test_nested_json_string_left_alone() {
        let stdout = r#"output data: {"structured_data": {"response_content": "{\"a\": 1}"}}"#;
        let payload = extract(stdout).unwrap();
        assert_eq!(
            payload.value()["structured_data"]["response_content"],
            json!("{\"a\": 1}")
        );
    }

    #[test]
    fn test_custom_marker() {
        let payload = extract_with_marker("RESULT={\"ok\":true}\n", "RESULT=").unwrap();
        assert_eq!(payload.value(), &json!({"ok": true}));
    }

    #[test]
    fn test_progress_step() {
        assert_eq!(progress_step("Progress: Collating information"), Some("Collating information"));
        assert_eq!(progress_step("Progress:   Ready to present  "), Some("Ready to present"));
        assert_eq!(progress_step("Extracted Text: Progress: no"), None);
    }

    #[test]
    fn test_stderr_diagnostic() {
        let stderr = "Traceback noise\n\
                      {\"error\": \"OPENAI_API_KEY not found\", \"traceback\": \"...\"}\n";
        assert_eq!(
            stderr_diagnostic(stderr),
            Some("OPENAI_API_KEY not found".to_string())
        );
        assert_eq!(stderr_diagnostic("plain failure\n"), None);
        assert_eq!(stderr_diagnostic("{\"other\": 1}\n"), None);
    }
}
