//! Logical path resolution against live document text.
//!
//! Resolution is a single forward pass over the lines of the document. A
//! search floor starts at the first line for every call and only advances as
//! segments are matched, so a duplicate key earlier in the file can never
//! capture a later, more specific path. Each segment after the first is only
//! searched inside the block of the line matched before it, so a key missing
//! from one list item is not picked up from the next. Anything that cannot
//! be located resolves to the top of the document instead of failing.
//!
//! Line handling:
//! - Blank lines and `#` comments are skipped and never end a list.
//! - Leading list markers (`- `) are stripped before key matching, so the
//!   first key of a list item is found on the item line itself.
//! - Content of `|` and `>` block scalars is opaque: it is never matched as a
//!   key, never counted as an item and never ends a list.

use crate::models::{LogicalPath, ResolvedPosition, Segment};
use regex::Regex;
use std::sync::OnceLock;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LineKind {
    Blank,
    Comment,
    Opaque,
    Content,
}

#[derive(Debug)]
struct Line<'a> {
    kind: LineKind,
    /// Leading whitespace, in characters.
    indent: usize,
    /// Indentation of the first key after any list markers.
    key_indent: usize,
    /// Line content with indentation and list markers removed.
    key_body: &'a str,
    /// Trimmed content starts with a `-` item marker.
    is_item: bool,
}

fn keyed_block_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"^(?:"[^"]*"|'[^']*'|[^:#'"]+):\s+[|>][1-9+\-]{0,2}\s*(?:#.*)?$"#)
            .expect("block scalar pattern is valid")
    })
}

fn bare_block_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^[|>][1-9+\-]{0,2}\s*(?:#.*)?$").expect("block scalar pattern is valid")
    })
}

fn is_item_marker(s: &str) -> bool {
    s == "-" || s.starts_with("- ") || s.starts_with("-\t")
}

/// Strip any number of leading `- ` markers; returns the rest and the
/// number of characters removed.
fn strip_markers(mut s: &str) -> (&str, usize) {
    let mut removed = 0;
    while is_item_marker(s) {
        let rest = s[1..].trim_start();
        removed += s.chars().count() - rest.chars().count();
        s = rest;
    }
    (s, removed)
}

fn scan(text: &str) -> Vec<Line<'_>> {
    let mut out = Vec::new();
    // Indentation a block scalar's content must exceed.
    let mut block_parent: Option<usize> = None;
    for raw in text.lines() {
        let trimmed = raw.trim_start();
        let indent = raw.chars().count() - trimmed.chars().count();
        let blank = trimmed.trim_end().is_empty();
        if let Some(parent) = block_parent {
            if blank || indent > parent {
                out.push(Line {
                    kind: LineKind::Opaque,
                    indent,
                    key_indent: indent,
                    key_body: "",
                    is_item: false,
                });
                continue;
            }
            block_parent = None;
        }
        let kind = if blank {
            LineKind::Blank
        } else if trimmed.starts_with('#') {
            LineKind::Comment
        } else {
            LineKind::Content
        };
        let (key_body, removed) = if kind == LineKind::Content {
            strip_markers(trimmed)
        } else {
            (trimmed, 0)
        };
        let is_item = kind == LineKind::Content && removed > 0;
        if kind == LineKind::Content {
            if keyed_block_re().is_match(key_body) {
                block_parent = Some(indent + removed);
            } else if is_item && bare_block_re().is_match(key_body) {
                block_parent = Some(indent);
            }
        }
        out.push(Line {
            kind,
            indent,
            key_indent: indent + removed,
            key_body,
            is_item,
        });
    }
    out
}

fn matches_key(body: &str, name: &str) -> bool {
    let plain = body
        .strip_prefix(name)
        .is_some_and(|rest| rest.starts_with(':'));
    plain
        || ['"', '\'']
            .iter()
            .any(|q| matches_quoted(body, name, *q))
}

fn matches_quoted(body: &str, name: &str, quote: char) -> bool {
    body.strip_prefix(quote)
        .and_then(|rest| rest.strip_prefix(name))
        .and_then(|rest| rest.strip_prefix(quote))
        .is_some_and(|rest| rest.trim_start().starts_with(':'))
}

fn find_key(lines: &[Line<'_>], from: usize, to: usize, name: &str) -> Option<usize> {
    lines
        .iter()
        .enumerate()
        .take(to)
        .skip(from)
        .find(|(_, l)| l.kind == LineKind::Content && matches_key(l.key_body, name))
        .map(|(i, _)| i)
}

/// End (exclusive) of the block owned by line `i`: the first later content
/// line not nested under it. An item owns deeper lines; a key also owns
/// items of a compact list at its own indentation.
fn block_end(lines: &[Line<'_>], i: usize, item: bool) -> usize {
    let owner = &lines[i];
    lines
        .iter()
        .enumerate()
        .skip(i + 1)
        .find(|(_, l)| {
            l.kind == LineKind::Content
                && if item {
                    l.indent <= owner.indent
                } else {
                    l.indent < owner.key_indent || (l.indent == owner.key_indent && !l.is_item)
                }
        })
        .map_or(lines.len(), |(j, _)| j)
}

/// Find the `k`-th item of the list introduced at line `intro`.
fn find_item(lines: &[Line<'_>], intro: usize, k: usize) -> Option<usize> {
    let base = lines[intro].key_indent;
    let mut item_indent: Option<usize> = None;
    let mut seen = 0usize;
    for (j, line) in lines.iter().enumerate().skip(intro + 1) {
        if line.kind != LineKind::Content {
            continue;
        }
        match item_indent {
            None => {
                // Compact lists put their dashes at the introducer's indentation.
                if line.is_item && line.indent >= base {
                    item_indent = Some(line.indent);
                } else {
                    return None;
                }
            }
            Some(ii) => {
                if line.indent < ii || (line.indent == ii && !line.is_item) {
                    return None;
                }
            }
        }
        if line.is_item && Some(line.indent) == item_indent {
            if seen == k {
                return Some(j);
            }
            seen += 1;
        }
    }
    None
}

/// Locate `path` in `text`, or `None` when any segment is missing.
pub fn locate(text: &str, path: &LogicalPath) -> Option<ResolvedPosition> {
    if path.is_empty() {
        return None;
    }
    let lines = scan(text);
    let mut floor = 0usize;
    // Segments after the first must lie inside the block matched before them.
    let mut end = lines.len();
    let mut hit: Option<usize> = None;
    for seg in path.segments() {
        let at = find_key(&lines, floor, end, seg.name())?;
        let i = match seg {
            Segment::Key(_) => {
                floor = at + 1;
                end = block_end(&lines, at, false);
                at
            }
            Segment::Index(_, k) => {
                let i = find_item(&lines, at, *k)?;
                // The item line may carry the item's first key.
                floor = i;
                end = block_end(&lines, i, true);
                i
            }
        };
        hit = Some(i);
    }
    let i = hit?;
    let line = u32::try_from(i + 1).unwrap_or(u32::MAX);
    let column = u32::try_from(lines[i].indent + 1).unwrap_or(u32::MAX);
    Some(ResolvedPosition::new(line, column))
}

/// Resolve `path` to a position, falling back to `{1,1}`.
pub fn resolve(text: &str, path: &LogicalPath) -> ResolvedPosition {
    match locate(text, path) {
        Some(pos) => pos,
        None => {
            debug!(path = %path, "path not found; using fallback position");
            ResolvedPosition::FALLBACK
        }
    }
}

/// Parse and resolve a dotted path; malformed paths fall back too.
pub fn resolve_str(text: &str, path: &str) -> ResolvedPosition {
    match path.parse::<LogicalPath>() {
        Ok(p) => resolve(text, &p),
        Err(e) => {
            debug!(path, error = %e, "unparseable path; using fallback position");
            ResolvedPosition::FALLBACK
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TARGETS: &str = "\
# monitored targets
interval: 30s
targets:
  - name: web
    url: https://web.example
  - name: db
    url: tcp://db.example:5432
groups:
- name: core
  members:
    - web
    - db
- name: edge
  members: []
";

    fn at(text: &str, path: &str) -> (u32, u32) {
        let p = resolve_str(text, path);
        (p.line, p.column)
    }

    #[test]
    fn test_resolves_plain_and_indexed_segments() {
        assert_eq!(at(TARGETS, "interval"), (2, 1));
        assert_eq!(at(TARGETS, "targets"), (3, 1));
        assert_eq!(at(TARGETS, "targets[0]"), (4, 3));
        assert_eq!(at(TARGETS, "targets[1].name"), (6, 3));
        assert_eq!(at(TARGETS, "targets[1].url"), (7, 5));
    }

    #[test]
    fn test_is_deterministic() {
        let p: LogicalPath = "targets[1].url".parse().unwrap();
        let first = resolve(TARGETS, &p);
        for _ in 0..5 {
            assert_eq!(resolve(TARGETS, &p), first);
        }
    }

    #[test]
    fn test_missing_item_falls_back() {
        assert_eq!(at(TARGETS, "targets[2].name"), (1, 1));
        assert_eq!(at(TARGETS, "nothing.here"), (1, 1));
        assert_eq!(at(TARGETS, "bad[path"), (1, 1));
    }

    #[test]
    fn test_each_call_starts_at_top() {
        let later = at(TARGETS, "groups[1].name");
        let earlier = at(TARGETS, "groups[0].name");
        assert_eq!(later, (13, 1));
        assert_eq!(earlier, (9, 1));
        let p: LogicalPath = "groups[0].name".parse().unwrap();
        assert_eq!(resolve(TARGETS, &p), ResolvedPosition::new(9, 1));
    }

    #[test]
    fn test_compact_list_at_introducer_indent() {
        assert_eq!(at(TARGETS, "groups[1]"), (13, 1));
        assert_eq!(at(TARGETS, "groups[2]"), (1, 1));
    }

    #[test]
    fn test_nested_items_are_not_counted() {
        // groups[0] has two nested members; they must not shift sibling indices
        assert_eq!(at(TARGETS, "groups[1].members"), (14, 3));
        assert_eq!(at(TARGETS, "groups[0].members[1]"), (12, 5));
        assert_eq!(at(TARGETS, "groups[1].members[0]"), (1, 1));
    }

    #[test]
    fn test_key_match_is_exact() {
        let text = "names: [a]\nname: b\n";
        assert_eq!(at(text, "name"), (2, 1));
    }

    #[test]
    fn test_earlier_duplicate_does_not_capture_later_path() {
        let text = "\
defaults:
  timeout: 5s
targets:
  - name: a
    timeout: 9s
";
        assert_eq!(at(text, "targets[0].timeout"), (5, 5));
        assert_eq!(at(text, "timeout"), (2, 3));
    }

    #[test]
    fn test_key_missing_from_item_does_not_reach_next_item() {
        let text = "targets:\n  - web\n  - name: db\n";
        assert_eq!(at(text, "targets[0].name"), (1, 1));
        assert_eq!(at(text, "targets[1].name"), (3, 3));
        let text = "\
limits:
  cpu: 2
alerts:
  memory: 1g
";
        assert_eq!(at(text, "limits.memory"), (1, 1));
        assert_eq!(at(text, "alerts.memory"), (4, 3));
    }

    #[test]
    fn test_list_ends_at_outdent() {
        let text = "\
targets:
  - name: a
other:
  - name: b
";
        assert_eq!(at(text, "targets[1]"), (1, 1));
        assert_eq!(at(text, "other[0].name"), (4, 3));
    }

    #[test]
    fn test_comments_and_blank_lines_inside_list() {
        let text = "\
targets:
  - name: a

  # disabled for now
  - name: b
";
        assert_eq!(at(text, "targets[1].name"), (5, 3));
    }

    #[test]
    fn test_block_scalar_content_is_opaque() {
        let text = "\
targets:
  - name: a
    script: |
      name: not-a-key
      - not an item
  - name: b
notes: >-
  targets:
end: true
";
        assert_eq!(at(text, "targets[1].name"), (6, 3));
        assert_eq!(at(text, "targets[2]"), (1, 1));
        assert_eq!(at(text, "end"), (9, 1));
    }

    #[test]
    fn test_quoted_keys_match() {
        let text = "\"targets\":\n  - 'name': a\n";
        assert_eq!(at(text, "targets[0].name"), (2, 3));
    }

    #[test]
    fn test_empty_list_falls_back() {
        let text = "targets: []\nnext:\n  - x\n";
        assert_eq!(at(text, "targets[0]"), (1, 1));
    }

    #[test]
    fn test_locate_reports_missing() {
        let p: LogicalPath = "targets[5]".parse().unwrap();
        assert_eq!(locate(TARGETS, &p), None);
        assert!(locate(TARGETS, &"targets".parse().unwrap()).is_some());
    }
}
