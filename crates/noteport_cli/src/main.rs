//! Thin export driver around `noteport_core`.
//!
//! # Responsibility
//! - Parse command-line options and initialize logging.
//! - Run one export and print the auditable summary.

use clap::Parser;
use log::error;
use noteport_core::{run, ExportMode, ExportOptions, RunSummary, WireLayout};
use std::path::PathBuf;
use std::process::ExitCode;

/// Export notes from the source application database to portable text.
#[derive(Debug, Parser)]
#[command(name = "noteport", version, about)]
struct Cli {
    /// Source database file.
    #[arg(long, default_value = "NoteStore.sqlite")]
    db_path: PathBuf,

    /// Export plain text to a single corpus file instead of Markdown files.
    #[arg(long)]
    llm_output: bool,

    /// Output directory for Markdown mode.
    #[arg(short, long, default_value = "exported_notes")]
    output_dir: PathBuf,

    /// Output file for corpus mode.
    #[arg(long, default_value = "llm_export.txt")]
    llm_file: PathBuf,

    /// Application data root holding Media/ and Accounts/.
    /// Defaults to the database file's directory.
    #[arg(long)]
    data_root: Option<PathBuf>,

    /// Extra roots searched for attachment files, in order.
    #[arg(long = "attachment-root")]
    attachment_roots: Vec<PathBuf>,

    /// JSON file overriding the note blob field numbering.
    #[arg(long)]
    layout: Option<PathBuf>,

    /// Log directory; defaults to a temp location.
    #[arg(long)]
    log_dir: Option<PathBuf>,

    /// Log level (trace|debug|info|warn|error).
    #[arg(long)]
    log_level: Option<String>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let log_dir = cli
        .log_dir
        .clone()
        .unwrap_or_else(|| std::env::temp_dir().join("noteport-logs"));
    let log_level = cli
        .log_level
        .clone()
        .unwrap_or_else(|| noteport_core::default_log_level().to_string());
    if let Err(message) = noteport_core::init_logging(&log_level, &log_dir) {
        eprintln!("warning: logging disabled: {message}");
    }

    let layout = match &cli.layout {
        Some(path) => match WireLayout::from_json_file(path) {
            Ok(layout) => layout,
            Err(message) => {
                eprintln!("error: {message}");
                return ExitCode::FAILURE;
            }
        },
        None => WireLayout::default(),
    };

    let mode = if cli.llm_output {
        ExportMode::Llm {
            output_file: cli.llm_file.clone(),
        }
    } else {
        ExportMode::Markdown {
            output_dir: cli.output_dir.clone(),
        }
    };

    let options = ExportOptions {
        db_path: cli.db_path.clone(),
        data_root: cli.data_root.clone(),
        extra_attachment_roots: cli.attachment_roots.clone(),
        mode,
        layout,
    };

    // Token counting needs an external library; none is wired in here, so
    // the corpus header simply omits the token line.
    match run(&options, None) {
        Ok(summary) => {
            print_summary(&summary);
            ExitCode::SUCCESS
        }
        Err(err) => {
            error!("event=export_run module=cli status=fatal error={err}");
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn print_summary(summary: &RunSummary) {
    println!("Exported {} notes.", summary.exported);
    println!(
        "Skipped: {} trash, {} smart folder, {} encrypted, {} no folder, {} no data.",
        summary.skips.trash,
        summary.skips.smart_folder,
        summary.skips.encrypted,
        summary.skips.no_folder,
        summary.skips.no_data
    );
    if summary.corrupt_blobs > 0 {
        println!("Corrupt note blobs replaced with placeholders: {}", summary.corrupt_blobs);
    }
    if summary.write_errors > 0 {
        println!("Notes that failed to write: {}", summary.write_errors);
    }
    let att = &summary.attachments;
    if att.copied + att.source_missing + att.db_missing + att.unsupported + att.errors > 0 {
        println!(
            "Attachments: {} copied, {} source missing, {} db missing, {} unsupported, {} errors.",
            att.copied, att.source_missing, att.db_missing, att.unsupported, att.errors
        );
    }
    if let Some(tokens) = summary.total_tokens {
        println!("Total tokens: {tokens}");
    }
}
