//! Output rendering for reports, resolved positions and version lists.
//!
//! Supports `human` (default) and `json` outputs. The JSON form includes
//! per-item fields and a top-level summary.

use crate::history::is_current;
use crate::models::{ConfigurationVersion, Report, ResolvedPosition, Severity, WorkflowState};
use owo_colors::OwoColorize;
use serde_json::json;
use serde_json::Value as JsonVal;

fn use_colors(output: &str) -> bool {
    output != "json" && std::env::var_os("NO_COLOR").is_none()
}

fn to_pretty(v: &JsonVal) -> String {
    serde_json::to_string_pretty(v).unwrap_or_else(|_| v.to_string())
}

pub fn error_prefix() -> String {
    if use_colors("human") {
        "error:".red().bold().to_string()
    } else {
        "error:".to_string()
    }
}

pub fn note_prefix() -> String {
    if use_colors("human") {
        "note:".bright_black().to_string()
    } else {
        "note:".to_string()
    }
}

fn severity_tag(sev: Severity, color: bool) -> String {
    let (tag, icon) = match sev {
        Severity::Error => ("⟦error⟧", "✖"),
        Severity::Warning => ("⟦warn⟧", "▲"),
        Severity::Info => ("⟦info⟧", "◆"),
    };
    if !color {
        return format!("{} {}", icon, tag);
    }
    match sev {
        Severity::Error => format!("{} {}", icon.red(), tag.red().bold()),
        Severity::Warning => format!("{} {}", icon.yellow(), tag.yellow().bold()),
        Severity::Info => format!("{} {}", icon.blue(), tag.blue().bold()),
    }
}

fn state_label(state: WorkflowState, color: bool) -> String {
    let s = state.as_str();
    if !color {
        return s.to_string();
    }
    match state {
        WorkflowState::Valid | WorkflowState::Applied => s.green().bold().to_string(),
        WorkflowState::Invalid | WorkflowState::Failed => s.red().bold().to_string(),
        _ => s.bright_black().to_string(),
    }
}

/// Print a report in the requested format.
pub fn print_report(report: &Report, output: &str) {
    match output {
        "json" => println!("{}", to_pretty(&compose_report_json(report))),
        _ => {
            let color = use_colors(output);
            let file = if color {
                report.file.clone().bold().to_string()
            } else {
                report.file.clone()
            };
            for a in &report.annotations {
                println!(
                    "{} {}:{}:{} — {}",
                    severity_tag(a.severity, color),
                    file,
                    a.start_line,
                    a.start_column,
                    a.message
                );
            }
            if let Some(v) = &report.applied_version {
                println!("applied version {} ({})", v.id, v.content_hash_prefix);
            }
            if let Some(msg) = &report.message {
                println!("{} {}", error_prefix(), msg);
            }
            let state = report
                .state
                .map(|s| format!(" state={}", state_label(s, color)))
                .unwrap_or_default();
            let summary = format!(
                "— Summary —{} errors={} warnings={} infos={}",
                state, report.summary.errors, report.summary.warnings, report.summary.infos
            );
            if color {
                println!("{}", summary.bold());
            } else {
                println!("{}", summary);
            }
        }
    }
}

pub fn print_position(file: &str, path: &str, pos: ResolvedPosition, output: &str) {
    match output {
        "json" => println!("{}", to_pretty(&compose_position_json(file, path, pos))),
        _ => println!("{}:{}:{}", file, pos.line, pos.column),
    }
}

/// Print versions already sorted newest first.
pub fn print_versions(versions: &[ConfigurationVersion], output: &str) {
    match output {
        "json" => println!("{}", to_pretty(&compose_versions_json(versions))),
        _ => {
            let color = use_colors(output);
            for (i, v) in versions.iter().enumerate() {
                let marker = if is_current(i) {
                    if color {
                        "● current".green().bold().to_string()
                    } else {
                        "● current".to_string()
                    }
                } else {
                    "○".to_string()
                };
                let note = v.note.as_deref().unwrap_or("");
                println!(
                    "{} {} {} {} {} {}",
                    marker,
                    v.id,
                    v.applied_timestamp.format("%Y-%m-%d %H:%M:%S"),
                    v.content_hash_prefix,
                    v.actor,
                    note
                );
            }
        }
    }
}

/// Compose report JSON object (pure) for testing/snapshot purposes.
pub fn compose_report_json(report: &Report) -> JsonVal {
    serde_json::to_value(report).unwrap_or(JsonVal::Null)
}

pub fn compose_position_json(file: &str, path: &str, pos: ResolvedPosition) -> JsonVal {
    json!({"file": file, "path": path, "line": pos.line, "column": pos.column})
}

/// Compose version list JSON with the `current` flag on the first entry.
pub fn compose_versions_json(versions: &[ConfigurationVersion]) -> JsonVal {
    let items: Vec<_> = versions
        .iter()
        .enumerate()
        .map(|(i, v)| {
            let mut item = serde_json::to_value(v).unwrap_or(JsonVal::Null);
            if let Some(obj) = item.as_object_mut() {
                obj.insert("current".into(), JsonVal::Bool(is_current(i)));
            }
            item
        })
        .collect();
    json!({"versions": items, "total": versions.len()})
}
