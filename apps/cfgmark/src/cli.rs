//! CLI argument parsing via `clap`.

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "cfgmark",
    version,
    about = "Validate, apply and annotate monitoring target configs",
    long_about = "cfgmark — resolve server findings onto precise positions of a monitoring target config and drive the validate/apply workflow.\n\nConfiguration precedence: CLI > cfgmark.toml > defaults.",
    after_help = "Examples:\n  cfgmark resolve targets.yml 'targets[2].url'\n  cfgmark annotate targets.yml --findings response.json\n  cfgmark validate targets.yml --server http://monitor:8080 --dry-run\n  cfgmark versions ls --output json",
    arg_required_else_help = true
)]
/// Top-level CLI options and subcommands.
pub struct Cli {
    #[command(subcommand)]
    pub cmd: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show version
    #[command(about = "Show version", long_about = "Print the current cfgmark version.")]
    Version,
    /// Resolve a logical path to a line/column
    #[command(
        about = "Resolve a logical path",
        long_about = "Print the line:column a dotted/bracketed path points at. Unresolvable paths print 1:1.",
        after_help = "Examples:\n  cfgmark resolve targets.yml 'groups[0].members[1]'"
    )]
    Resolve {
        #[arg(help = "Document to search")]
        file: String,
        #[arg(help = "Logical path, e.g. targets[2].url")]
        path: String,
        #[arg(long, help = "Directory to discover cfgmark.toml from (default: current dir)")]
        root: Option<String>,
        #[arg(long, help = "Output mode: human|json (default: human)")]
        output: Option<String>,
    },
    /// Annotate a document from saved findings
    #[command(
        about = "Annotate from saved findings",
        long_about = "Map findings from a saved validate response (or error body) onto the document without contacting the server.",
        after_help = "Examples:\n  cfgmark annotate targets.yml --findings response.json --output json"
    )]
    Annotate {
        #[arg(help = "Document to annotate")]
        file: String,
        #[arg(long, help = "JSON file with findings, a validate response or an error body")]
        findings: String,
        #[arg(long, help = "Directory to discover cfgmark.toml from (default: current dir)")]
        root: Option<String>,
        #[arg(long, help = "Output mode: human|json (default: human)")]
        output: Option<String>,
    },
    /// Validate a document against the server
    #[command(
        about = "Validate a document",
        long_about = "Submit the document for server-side validation and print annotated findings. Exits non-zero when invalid or failed."
    )]
    Validate {
        #[arg(help = "Document to validate")]
        file: String,
        #[arg(long, help = "Server base URL")]
        server: Option<String>,
        #[arg(long, action = clap::ArgAction::SetTrue, help = "Validate without persisting anything")]
        dry_run: bool,
        #[arg(long, help = "Directory to discover cfgmark.toml from (default: current dir)")]
        root: Option<String>,
        #[arg(long, help = "Output mode: human|json (default: human)")]
        output: Option<String>,
    },
    /// Apply a document as a new version
    #[command(
        about = "Apply a document",
        long_about = "Persist the document as a new configuration version and print the applied version."
    )]
    Apply {
        #[arg(help = "Document to apply")]
        file: String,
        #[arg(long, help = "Server base URL")]
        server: Option<String>,
        #[arg(long, help = "Directory to discover cfgmark.toml from (default: current dir)")]
        root: Option<String>,
        #[arg(long, help = "Output mode: human|json (default: human)")]
        output: Option<String>,
    },
    /// Version history (ls/download)
    Versions {
        #[command(subcommand)]
        cmd: VersionsCmd,
    },
}

#[derive(Subcommand)]
/// Subcommands for `cfgmark versions`
pub enum VersionsCmd {
    /// List applied versions, newest first
    #[command(about = "List versions", long_about = "List applied versions newest first; the first one is current.")]
    Ls {
        #[arg(long, help = "Server base URL")]
        server: Option<String>,
        #[arg(long, help = "Directory to discover cfgmark.toml from (default: current dir)")]
        root: Option<String>,
        #[arg(long, help = "Output mode: human|json (default: human)")]
        output: Option<String>,
    },
    /// Download a version to a file
    #[command(
        about = "Download version",
        long_about = "Save a version's text. The default file name is targets-<date>-<id>.yml."
    )]
    Download {
        #[arg(help = "Version id")]
        id: String,
        #[arg(long, help = "Override the file name")]
        name: Option<String>,
        #[arg(long, help = "Server base URL")]
        server: Option<String>,
        #[arg(long, help = "Directory to discover cfgmark.toml from (default: current dir)")]
        root: Option<String>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_validate_flags() {
        let cli = Cli::try_parse_from([
            "cfgmark",
            "validate",
            "targets.yml",
            "--server",
            "http://x",
            "--dry-run",
        ])
        .unwrap();
        match cli.cmd {
            Commands::Validate {
                file,
                server,
                dry_run,
                ..
            } => {
                assert_eq!(file, "targets.yml");
                assert_eq!(server.as_deref(), Some("http://x"));
                assert!(dry_run);
            }
            _ => panic!("expected validate"),
        }
    }

    #[test]
    fn test_parse_resolve_output() {
        let cli = Cli::try_parse_from([
            "cfgmark",
            "resolve",
            "targets.yml",
            "targets[1].url",
            "--output",
            "json",
        ])
        .unwrap();
        assert!(matches!(
            cli.cmd,
            Commands::Resolve { ref path, ref output, .. }
                if path == "targets[1].url" && output.as_deref() == Some("json")
        ));
    }

    #[test]
    fn test_parse_versions_download() {
        let cli = Cli::try_parse_from(["cfgmark", "versions", "download", "v3", "--name", "a.yml"])
            .unwrap();
        assert!(matches!(
            cli.cmd,
            Commands::Versions {
                cmd: VersionsCmd::Download { ref id, ref name, .. }
            } if id == "v3" && name.as_deref() == Some("a.yml")
        ));
    }
}
