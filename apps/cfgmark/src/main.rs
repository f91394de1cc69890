//! cfgmark CLI binary entry point.
//! Delegates to the library for resolution, annotation and server calls.

use cfgmark::backend::HttpBackend;
use cfgmark::cli::{Cli, Commands, VersionsCmd};
use cfgmark::history::VersionHistory;
use cfgmark::markers::MemorySink;
use cfgmark::models::{Report, Summary, WorkflowState};
use cfgmark::workflow::{Session, ValidationWorkflow};
use cfgmark::{annotate, config, output, resolve, Error, Result};
use clap::Parser;
use std::fs;
use std::path::Path;
use tracing::info;
use tracing_subscriber::EnvFilter;

fn init_tracing() {
    let filter = EnvFilter::try_from_env("CFGMARK_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn read_doc(file: &str) -> Result<String> {
    fs::read_to_string(file).map_err(|e| Error::io(file, e))
}

fn session_report(file: &str, session: &Session<HttpBackend, MemorySink>) -> Report {
    let wf = session.workflow();
    let annotations = wf.annotations().to_vec();
    Report {
        file: file.to_string(),
        state: Some(wf.state()),
        message: wf.last_error().map(str::to_string),
        applied_version: wf.applied_version().cloned(),
        summary: Summary::of(&annotations),
        annotations,
    }
}

fn exit_code(state: Option<WorkflowState>) -> i32 {
    match state {
        Some(WorkflowState::Invalid) | Some(WorkflowState::Failed) => 1,
        _ => 0,
    }
}

fn note_missing_config(eff: &config::Effective) {
    if !eff.config_found && eff.output != "json" {
        eprintln!("{} No cfgmark.toml found; using defaults.", output::note_prefix());
    }
}

async fn run(cli: Cli) -> Result<i32> {
    match cli.cmd {
        Commands::Version => {
            println!("{}", env!("CARGO_PKG_VERSION"));
            Ok(0)
        }
        Commands::Resolve {
            file,
            path,
            root,
            output: out,
        } => {
            let eff = config::resolve_effective(root.as_deref(), None, out.as_deref(), None)?;
            let text = read_doc(&file)?;
            let pos = resolve::resolve_str(&text, &path);
            output::print_position(&file, &path, pos, &eff.output);
            Ok(0)
        }
        Commands::Annotate {
            file,
            findings,
            root,
            output: out,
        } => {
            let eff = config::resolve_effective(root.as_deref(), None, out.as_deref(), None)?;
            let report =
                annotate::run_annotate(Path::new(&file), Path::new(&findings), eff.span_width)?;
            output::print_report(&report, &eff.output);
            Ok(exit_code(report.state))
        }
        Commands::Validate {
            file,
            server,
            dry_run,
            root,
            output: out,
        } => {
            let eff = config::resolve_effective(
                root.as_deref(),
                server.as_deref(),
                out.as_deref(),
                if dry_run { Some(true) } else { None },
            )?;
            note_missing_config(&eff);
            let backend = HttpBackend::new(eff.server()?, eff.timeout)?;
            let workflow = ValidationWorkflow::new(read_doc(&file)?).with_span_width(eff.span_width);
            let session = Session::with_workflow(backend, MemorySink::default(), workflow);
            if eff.dry_run {
                session.validate_dry_run().await?;
            } else {
                session.validate().await?;
            }
            let report = session_report(&file, &session);
            output::print_report(&report, &eff.output);
            Ok(exit_code(report.state))
        }
        Commands::Apply {
            file,
            server,
            root,
            output: out,
        } => {
            let eff =
                config::resolve_effective(root.as_deref(), server.as_deref(), out.as_deref(), None)?;
            note_missing_config(&eff);
            let backend = HttpBackend::new(eff.server()?, eff.timeout)?;
            let workflow = ValidationWorkflow::new(read_doc(&file)?).with_span_width(eff.span_width);
            let session = Session::with_workflow(backend, MemorySink::default(), workflow);
            session.apply().await?;
            let report = session_report(&file, &session);
            output::print_report(&report, &eff.output);
            Ok(exit_code(report.state))
        }
        Commands::Versions { cmd } => match cmd {
            VersionsCmd::Ls {
                server,
                root,
                output: out,
            } => {
                let eff = config::resolve_effective(
                    root.as_deref(),
                    server.as_deref(),
                    out.as_deref(),
                    None,
                )?;
                let backend = HttpBackend::new(eff.server()?, eff.timeout)?;
                let versions = VersionHistory::new(&backend).list().await?;
                output::print_versions(&versions, &eff.output);
                Ok(0)
            }
            VersionsCmd::Download {
                id,
                name,
                server,
                root,
            } => {
                let eff = config::resolve_effective(root.as_deref(), server.as_deref(), None, None)?;
                let backend = HttpBackend::new(eff.server()?, eff.timeout)?;
                let dl = VersionHistory::new(&backend)
                    .download(&id, name.as_deref())
                    .await?;
                fs::create_dir_all(&eff.download_dir)
                    .map_err(|e| Error::io(&eff.download_dir, e))?;
                let dest = eff.download_dir.join(&dl.file_name);
                fs::write(&dest, dl.text).map_err(|e| Error::io(&dest, e))?;
                info!(path = %dest.display(), "version downloaded");
                println!("downloaded: {}", dest.to_string_lossy());
                Ok(0)
            }
        },
    }
}

fn main() {
    init_tracing();
    let cli = Cli::parse();
    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("{} cannot start runtime: {}", output::error_prefix(), e);
            std::process::exit(2);
        }
    };
    match runtime.block_on(run(cli)) {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("{} {}", output::error_prefix(), e.user_message());
            std::process::exit(2);
        }
    }
}
