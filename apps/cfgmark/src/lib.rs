//! cfgmark core library.
//!
//! This crate maps server findings onto positions in a live monitoring target
//! config and governs the validate/apply/edit cycle that decides when those
//! positions are still meaningful.
//!
//! High-level modules:
//! - `models`: Documents, logical paths, findings, annotations, versions.
//! - `resolve`: Logical path to line/column resolution.
//! - `markers`: Findings to annotations, and the rendering-surface trait.
//! - `backend`: Server operations and the HTTP implementation.
//! - `workflow`: Validate/apply state machine and the async session driver.
//! - `history`: Sorted version history and downloads.
//! - `annotate`: Offline annotation from saved responses.
//! - `config`: Discovery and effective configuration resolution.
//! - `cli`: CLI argument parsing (binary uses this).
//! - `output`: Human/JSON printers.
pub mod annotate;
pub mod backend;
pub mod cli;
pub mod config;
pub mod error;
pub mod history;
pub mod markers;
pub mod models;
pub mod output;
pub mod resolve;
pub mod workflow;

pub use error::{Error, Result};
