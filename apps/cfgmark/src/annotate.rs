//! Offline annotation of a document from a saved server response.
//!
//! Produces a `Report` with annotations and a summary. The findings file may
//! hold a bare findings array, a full validate response, or an error body as
//! returned by a failed validate/apply call.

use crate::backend::{unwrap_error_payload, ValidateResponse};
use crate::error::{Error, Result};
use crate::markers;
use crate::models::{Finding, Report, Summary, WorkflowState};
use std::fs;
use std::path::Path;
use tracing::debug;

/// Findings carried by a saved response, plus the state it implies.
pub fn parse_findings(raw: &str) -> std::result::Result<(Vec<Finding>, WorkflowState), String> {
    if let Ok(findings) = serde_json::from_str::<Vec<Finding>>(raw) {
        let state = if findings.is_empty() {
            WorkflowState::Valid
        } else {
            WorkflowState::Invalid
        };
        return Ok((findings, state));
    }
    if let Ok(resp) = serde_json::from_str::<ValidateResponse>(raw) {
        let findings = resp.findings().to_vec();
        let state = if findings.is_empty() && resp.is_valid {
            WorkflowState::Valid
        } else {
            WorkflowState::Invalid
        };
        return Ok((findings, state));
    }
    let payload = unwrap_error_payload(raw);
    if payload.findings.is_empty() {
        return Err(format!("no findings recognised ({})", payload.message));
    }
    Ok((payload.findings, WorkflowState::Failed))
}

/// Annotate `doc_path` with the findings stored in `findings_path`.
pub fn run_annotate(doc_path: &Path, findings_path: &Path, span_width: u32) -> Result<Report> {
    let text = fs::read_to_string(doc_path).map_err(|e| Error::io(doc_path, e))?;
    let raw = fs::read_to_string(findings_path).map_err(|e| Error::io(findings_path, e))?;
    let (findings, state) = parse_findings(&raw).map_err(|message| Error::Findings {
        path: findings_path.to_path_buf(),
        message,
    })?;
    debug!(count = findings.len(), "annotating from saved findings");
    let annotations = markers::assemble_with_width(&text, &findings, span_width);
    Ok(Report {
        file: doc_path.to_string_lossy().to_string(),
        state: Some(state),
        message: None,
        applied_version: None,
        summary: Summary::of(&annotations),
        annotations,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_parse_findings_shapes() {
        let (f, s) = parse_findings(r#"[{"message": "a"}]"#).unwrap();
        assert_eq!((f.len(), s), (1, WorkflowState::Invalid));
        let (f, s) = parse_findings(r#"{"isValid": true}"#).unwrap();
        assert_eq!((f.len(), s), (0, WorkflowState::Valid));
        let (f, s) =
            parse_findings(r#"{"message": "boom", "errors": [{"message": "x", "line": 2, "column": 1}]}"#)
                .unwrap();
        assert_eq!((f.len(), s), (1, WorkflowState::Failed));
        assert!(parse_findings("gateway timeout").is_err());
    }

    #[test]
    fn test_run_annotate_from_files() {
        let dir = tempdir().unwrap();
        let doc = dir.path().join("targets.yml");
        let findings = dir.path().join("findings.json");
        fs::write(&doc, "targets:\n  - name: web\n    url: ftp://x\n").unwrap();
        fs::write(
            &findings,
            r#"{"isValid": false, "errors": [
                {"message": "unsupported scheme", "path": "targets[0].url"},
                {"message": "interval missing", "severity": "warning"}
            ]}"#,
        )
        .unwrap();
        let report = run_annotate(&doc, &findings, markers::SPAN_WIDTH).unwrap();
        assert_eq!(report.state, Some(WorkflowState::Invalid));
        assert_eq!(report.annotations.len(), 2);
        assert_eq!(report.annotations[0].start_line, 3);
        assert_eq!(report.annotations[0].end_column, 15);
        assert_eq!(report.summary.errors, 1);
        assert_eq!(report.summary.warnings, 1);
    }

    #[test]
    fn test_run_annotate_missing_file() {
        let dir = tempdir().unwrap();
        let err = run_annotate(
            &dir.path().join("nope.yml"),
            &dir.path().join("nope.json"),
            10,
        )
        .unwrap_err();
        assert!(matches!(err, Error::Io { .. }));
    }
}
