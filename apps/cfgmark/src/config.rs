//! Configuration discovery and effective settings resolution.
//!
//! cfgmark reads `cfgmark.toml|yaml|yml` from the working directory (or the
//! closest ancestor) and merges it with CLI flags to produce an `Effective`
//! config.
//! Defaults:
//! - `server`: none (required by `validate`, `apply` and `versions`)
//! - `output`: `human`
//! - `timeoutSecs`: 30
//! - `validate.dryRun`: false
//! - `annotations.spanWidth`: 10
//! - `download.dir`: the root directory
//!
//! Overrides precedence: CLI > config file > defaults.

use crate::error::{Error, Result};
use crate::markers::SPAN_WIDTH;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

const CONFIG_NAMES: [&str; 3] = ["cfgmark.toml", "cfgmark.yaml", "cfgmark.yml"];

#[derive(Debug, Default, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
/// Root configuration loaded from `cfgmark.toml|yaml`.
pub struct CfgmarkConfig {
    pub server: Option<String>,
    pub output: Option<String>,
    pub timeout_secs: Option<u64>,
    #[serde(default)]
    pub validate: Option<ValidateCfg>,
    #[serde(default)]
    pub annotations: Option<AnnotationsCfg>,
    #[serde(default)]
    pub download: Option<DownloadCfg>,
}

#[derive(Debug, Default, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct ValidateCfg {
    pub dry_run: Option<bool>,
}

#[derive(Debug, Default, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct AnnotationsCfg {
    pub span_width: Option<u32>,
}

#[derive(Debug, Default, Deserialize, Clone)]
pub struct DownloadCfg {
    pub dir: Option<String>,
}

#[derive(Debug, Clone)]
/// Fully-resolved configuration used by commands after applying precedence.
pub struct Effective {
    pub root: PathBuf,
    pub config_found: bool,
    pub server: Option<String>,
    pub output: String,
    pub timeout: Duration,
    pub dry_run: bool,
    pub span_width: u32,
    pub download_dir: PathBuf,
}

impl Effective {
    pub fn server(&self) -> Result<&str> {
        self.server.as_deref().ok_or(Error::NoServer)
    }
}

/// Walk upward from `start` to find the directory holding the config.
///
/// Stops when a `cfgmark.toml|yaml|yml` or a `.git` directory is found.
pub fn detect_root(start: &Path) -> PathBuf {
    let mut cur = start;
    loop {
        if CONFIG_NAMES.iter().any(|n| cur.join(n).exists()) || cur.join(".git").exists() {
            return cur.to_path_buf();
        }
        match cur.parent() {
            Some(p) => cur = p,
            None => return start.to_path_buf(),
        }
    }
}

/// Load `CfgmarkConfig` from the first config file present in `root`.
pub fn load_config(root: &Path) -> Result<Option<CfgmarkConfig>> {
    for name in CONFIG_NAMES {
        let path = root.join(name);
        if !path.exists() {
            continue;
        }
        let s = fs::read_to_string(&path).map_err(|e| Error::io(&path, e))?;
        let parsed = if name.ends_with(".toml") {
            toml::from_str::<CfgmarkConfig>(&s).map_err(|e| e.to_string())
        } else {
            serde_yaml::from_str::<CfgmarkConfig>(&s).map_err(|e| e.to_string())
        };
        debug!(path = %path.display(), "loaded config");
        return parsed
            .map(Some)
            .map_err(|message| Error::Config { path, message });
    }
    Ok(None)
}

/// Resolve `Effective` by merging CLI flags, discovered config, and defaults.
pub fn resolve_effective(
    cli_root: Option<&str>,
    cli_server: Option<&str>,
    cli_output: Option<&str>,
    cli_dry_run: Option<bool>,
) -> Result<Effective> {
    let start = PathBuf::from(cli_root.unwrap_or("."));
    let root = detect_root(&start);
    let loaded = load_config(&root)?;
    let config_found = loaded.is_some();
    let cfg = loaded.unwrap_or_default();

    let server = cli_server
        .map(|s| s.to_string())
        .or(cfg.server)
        .filter(|s| !s.trim().is_empty());
    let output = cli_output
        .map(|s| s.to_string())
        .or(cfg.output)
        .unwrap_or_else(|| "human".to_string());
    let timeout = Duration::from_secs(cfg.timeout_secs.unwrap_or(30));
    let dry_run = cli_dry_run
        .or_else(|| cfg.validate.as_ref().and_then(|v| v.dry_run))
        .unwrap_or(false);
    let span_width = cfg
        .annotations
        .as_ref()
        .and_then(|a| a.span_width)
        .unwrap_or(SPAN_WIDTH);
    let download_dir = cfg
        .download
        .as_ref()
        .and_then(|d| d.dir.as_ref())
        .map(|d| root.join(d))
        .unwrap_or_else(|| root.clone());

    Ok(Effective {
        root,
        config_found,
        server,
        output,
        timeout,
        dry_run,
        span_width,
        download_dir,
    })
}
