//! Logical paths into the document hierarchy.
//!
//! A path is written as dot-separated keys where a key may carry a single
//! list index: `targets[2].labels.team`. Paths also arrive as JSON arrays
//! (`["targets", 2, "labels", "team"]`) where an integer indexes the key
//! before it.

use super::PathPart;
use regex::Regex;
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Segment {
    /// `name`
    Key(String),
    /// `name[index]`
    Index(String, usize),
}

impl Segment {
    pub fn name(&self) -> &str {
        match self {
            Segment::Key(n) | Segment::Index(n, _) => n,
        }
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Segment::Key(n) => f.write_str(n),
            Segment::Index(n, k) => write!(f, "{}[{}]", n, k),
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PathError {
    #[error("path is empty")]
    Empty,
    #[error("empty segment at position {0}")]
    EmptySegment(usize),
    #[error("malformed segment '{0}'")]
    Malformed(String),
    #[error("index {0} does not follow a key")]
    DanglingIndex(usize),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LogicalPath {
    segments: Vec<Segment>,
}

fn segment_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^([^\[\]]+)(?:\[(\d+)\])?$").expect("segment pattern is valid")
    })
}

impl LogicalPath {
    pub fn new(segments: Vec<Segment>) -> Self {
        Self { segments }
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Build from wire parts, folding each integer into the key before it.
    pub fn from_parts(parts: &[PathPart]) -> Result<Self, PathError> {
        if parts.is_empty() {
            return Err(PathError::Empty);
        }
        let mut segments: Vec<Segment> = Vec::with_capacity(parts.len());
        for (pos, part) in parts.iter().enumerate() {
            match part {
                PathPart::Key(k) => {
                    let k = k.trim();
                    if k.is_empty() {
                        return Err(PathError::EmptySegment(pos));
                    }
                    segments.push(Segment::Key(k.to_string()));
                }
                PathPart::Index(i) => match segments.pop() {
                    Some(Segment::Key(name)) => segments.push(Segment::Index(name, *i)),
                    _ => return Err(PathError::DanglingIndex(*i)),
                },
            }
        }
        Ok(Self { segments })
    }
}

impl FromStr for LogicalPath {
    type Err = PathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        // Servers sometimes root paths with `$.`
        let s = s.strip_prefix("$.").unwrap_or(s);
        if s.is_empty() {
            return Err(PathError::Empty);
        }
        let mut segments = Vec::new();
        for (pos, raw) in s.split('.').enumerate() {
            let raw = raw.trim();
            if raw.is_empty() {
                return Err(PathError::EmptySegment(pos));
            }
            let caps = segment_re()
                .captures(raw)
                .ok_or_else(|| PathError::Malformed(raw.to_string()))?;
            let name = caps[1].trim().to_string();
            match caps.get(2) {
                Some(idx) => {
                    let k = idx
                        .as_str()
                        .parse::<usize>()
                        .map_err(|_| PathError::Malformed(raw.to_string()))?;
                    segments.push(Segment::Index(name, k));
                }
                None => segments.push(Segment::Key(name)),
            }
        }
        Ok(Self { segments })
    }
}

impl fmt::Display for LogicalPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, seg) in self.segments.iter().enumerate() {
            if i > 0 {
                f.write_str(".")?;
            }
            write!(f, "{}", seg)?;
        }
        Ok(())
    }
}
