//! Turn raw findings into renderer-ready annotations.
//!
//! Every finding produces exactly one annotation, in input order. An explicit
//! coordinate is trusted as-is; otherwise the path is resolved against the
//! current text; otherwise the annotation lands at the top of the document.
//! Spans have a fixed width so zero-length matches stay visible.

use crate::models::{Annotation, Finding, ResolvedPosition};
use crate::resolve;
use tracing::debug;

/// Default distance between start and end column of an annotation.
pub const SPAN_WIDTH: u32 = 10;

/// Rendering surface able to display a set of annotations.
pub trait AnnotationSink {
    /// Replace everything currently shown with `annotations`.
    fn set_annotations(&mut self, annotations: &[Annotation]);
    fn clear_annotations(&mut self);
}

/// Sink that keeps the latest set in memory.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct MemorySink {
    pub current: Vec<Annotation>,
    /// Number of set/clear calls received.
    pub updates: usize,
}

impl AnnotationSink for MemorySink {
    fn set_annotations(&mut self, annotations: &[Annotation]) {
        self.current = annotations.to_vec();
        self.updates += 1;
    }

    fn clear_annotations(&mut self) {
        self.current.clear();
        self.updates += 1;
    }
}

/// Where a single finding should be anchored.
pub fn position_of(text: &str, finding: &Finding) -> ResolvedPosition {
    if let (Some(line), Some(column)) = (finding.line, finding.column) {
        return ResolvedPosition::new(line, column);
    }
    if let Some(path) = finding.path.as_ref() {
        return match path.to_logical() {
            Ok(p) => resolve::resolve(text, &p),
            Err(e) => {
                debug!(path = %path, error = %e, "finding path unparseable");
                ResolvedPosition::FALLBACK
            }
        };
    }
    // A lone line still beats the fallback.
    if let Some(line) = finding.line {
        return ResolvedPosition::new(line, 1);
    }
    ResolvedPosition::FALLBACK
}

pub fn assemble(text: &str, findings: &[Finding]) -> Vec<Annotation> {
    assemble_with_width(text, findings, SPAN_WIDTH)
}

pub fn assemble_with_width(text: &str, findings: &[Finding], width: u32) -> Vec<Annotation> {
    findings
        .iter()
        .map(|f| {
            let pos = position_of(text, f);
            Annotation {
                start_line: pos.line,
                start_column: pos.column,
                end_line: pos.line,
                end_column: pos.column.saturating_add(width),
                message: f.message.clone(),
                severity: f.severity,
            }
        })
        .collect()
}

/// Push `annotations` to `sink`, clearing it when there are none.
pub fn publish<S: AnnotationSink + ?Sized>(sink: &mut S, annotations: &[Annotation]) {
    if annotations.is_empty() {
        sink.clear_annotations();
    } else {
        sink.set_annotations(annotations);
    }
}
