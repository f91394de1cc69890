//! Shared data models for documents, findings, annotations and versions.

pub mod path;
pub mod version;

pub use path::{LogicalPath, PathError, Segment};
pub use version::ConfigurationVersion;

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
/// Snapshot identifier of a document; bumped on every edit.
pub struct Revision(pub u64);

impl Revision {
    pub fn next(self) -> Revision {
        Revision(self.0 + 1)
    }
}

impl fmt::Display for Revision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "r{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// The text being edited together with its current revision.
pub struct Document {
    text: String,
    revision: Revision,
}

impl Document {
    /// A freshly loaded document starts at revision 1.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            revision: Revision(1),
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn revision(&self) -> Revision {
        self.revision
    }

    /// Replace the content and advance the revision.
    pub fn edit(&mut self, text: impl Into<String>) -> Revision {
        self.text = text.into();
        self.revision = self.revision.next();
        self.revision
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    #[default]
    Error,
    #[serde(alias = "warn")]
    Warning,
    Info,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Error => "error",
            Severity::Warning => "warning",
            Severity::Info => "info",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
/// A single validation outcome as reported by the server.
///
/// The location is an explicit coordinate, a logical path, or absent. A
/// coordinate wins over a path when both are present.
pub struct Finding {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<FindingPath>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column: Option<u32>,
    #[serde(default)]
    pub severity: Severity,
}

impl Finding {
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            path: None,
            line: None,
            column: None,
            severity: Severity::Error,
        }
    }

    pub fn at_path(message: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            path: Some(FindingPath::Dotted(path.into())),
            ..Self::message(message)
        }
    }

    pub fn at(message: impl Into<String>, line: u32, column: u32) -> Self {
        Self {
            line: Some(line),
            column: Some(column),
            ..Self::message(message)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
/// Path as it arrives on the wire: `"targets[2].name"` or
/// `["targets", 2, "name"]`.
pub enum FindingPath {
    Dotted(String),
    Parts(Vec<PathPart>),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PathPart {
    Index(usize),
    Key(String),
}

impl FindingPath {
    pub fn to_logical(&self) -> Result<LogicalPath, PathError> {
        match self {
            FindingPath::Dotted(s) => s.parse(),
            FindingPath::Parts(parts) => LogicalPath::from_parts(parts),
        }
    }
}

impl fmt::Display for FindingPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FindingPath::Dotted(s) => f.write_str(s),
            FindingPath::Parts(parts) => {
                for (i, p) in parts.iter().enumerate() {
                    match p {
                        PathPart::Index(k) => write!(f, "[{}]", k)?,
                        PathPart::Key(k) if i == 0 => f.write_str(k)?,
                        PathPart::Key(k) => write!(f, ".{}", k)?,
                    }
                }
                Ok(())
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
/// 1-indexed line/column; never zero.
pub struct ResolvedPosition {
    pub line: u32,
    pub column: u32,
}

impl ResolvedPosition {
    /// Top of the document, used whenever a location cannot be determined.
    pub const FALLBACK: ResolvedPosition = ResolvedPosition { line: 1, column: 1 };

    pub fn new(line: u32, column: u32) -> Self {
        Self {
            line: line.max(1),
            column: column.max(1),
        }
    }
}

impl Default for ResolvedPosition {
    fn default() -> Self {
        Self::FALLBACK
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
/// Renderer-ready diagnostic with a resolved span.
pub struct Annotation {
    pub start_line: u32,
    pub start_column: u32,
    pub end_line: u32,
    pub end_column: u32,
    pub message: String,
    pub severity: Severity,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkflowState {
    Idle,
    Validating,
    Valid,
    Invalid,
    Applying,
    Applied,
    Failed,
}

impl WorkflowState {
    /// A validate or apply call is outstanding.
    pub fn is_busy(&self) -> bool {
        matches!(self, WorkflowState::Validating | WorkflowState::Applying)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            WorkflowState::Idle => "idle",
            WorkflowState::Validating => "validating",
            WorkflowState::Valid => "valid",
            WorkflowState::Invalid => "invalid",
            WorkflowState::Applying => "applying",
            WorkflowState::Applied => "applied",
            WorkflowState::Failed => "failed",
        }
    }
}

impl fmt::Display for WorkflowState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
/// Annotation counts by severity.
pub struct Summary {
    pub errors: usize,
    pub warnings: usize,
    pub infos: usize,
}

impl Summary {
    pub fn of(annotations: &[Annotation]) -> Self {
        let mut s = Summary::default();
        for a in annotations {
            match a.severity {
                Severity::Error => s.errors += 1,
                Severity::Warning => s.warnings += 1,
                Severity::Info => s.infos += 1,
            }
        }
        s
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
/// Annotations for one document plus the outcome that produced them.
pub struct Report {
    pub file: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<WorkflowState>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(rename = "appliedVersion", skip_serializing_if = "Option::is_none")]
    pub applied_version: Option<ConfigurationVersion>,
    pub annotations: Vec<Annotation>,
    pub summary: Summary,
}
