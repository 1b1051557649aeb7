//! Export run orchestration.
//!
//! # Responsibility
//! - Drive one full export: snapshot, schema resolution, fetch, decode,
//!   attachment resolution, rendering, and output writing.
//! - Contain per-note and per-attachment failures at that granularity.
//!
//! # Invariants
//! - Only whole-run preconditions are fatal: unreadable source, snapshot
//!   failure, unresolved required entity id, unwritable output.
//! - Every skipped or degraded item leaves either a visible placeholder in
//!   the output or a count in the run summary.
//! - Notes are processed strictly sequentially, one at a time.

use crate::db::{open_notes_db, DbError, DbSnapshot};
use crate::decode::{decode, DecodeError, WireLayout};
use crate::fetch::{NoteFetcher, SkipCounts};
use crate::model::{AnnotationKind, DecodedNote, RawNote, Resolution};
use crate::render::filename::note_stem;
use crate::render::{render_markdown, render_plaintext, LinkKind, RenderedAttachment};
use crate::resolve::{materialize, uti, AttachmentResolver, ATTACHMENTS_SUBDIR};
use crate::schema::{EntityIdMap, SchemaError};
use chrono::Local;
use log::{error, info, warn};
use std::collections::{HashMap, HashSet};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};

/// Body placeholder written when a note's blob cannot be decoded.
pub const CORRUPT_BLOB_PLACEHOLDER: &str = "[Corrupt note data]";

/// Default corpus file header label.
const LLM_HEADER_LABEL: &str = "# Apple Notes Export for LLM";

/// Optional external token counter, supplied by the caller.
///
/// `None` from `count` means the counter is unavailable or failed; the
/// corpus header then omits the token line.
pub trait TokenCounter {
    fn count(&self, text: &str) -> Option<u64>;
}

/// Output mode for one run.
#[derive(Debug, Clone)]
pub enum ExportMode {
    /// One Markdown file per note plus a copied-attachment directory.
    Markdown { output_dir: PathBuf },
    /// One concatenated plain-text corpus file.
    Llm { output_file: PathBuf },
}

/// Whole-run configuration.
#[derive(Debug, Clone)]
pub struct ExportOptions {
    /// Live source database file; a snapshot is taken before reading.
    pub db_path: PathBuf,
    /// Application data root holding `Media/`, `Accounts/`, etc.
    /// Defaults to the source database's parent directory.
    pub data_root: Option<PathBuf>,
    /// Additional roots searched for attachment files, in order.
    pub extra_attachment_roots: Vec<PathBuf>,
    pub mode: ExportMode,
    /// Field numbering for the note blob format.
    pub layout: WireLayout,
}

#[derive(Debug)]
pub enum ExportError {
    Db(DbError),
    Schema(SchemaError),
    /// Output artifact could not be created or written.
    Output(String),
}

impl Display for ExportError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::Schema(err) => write!(f, "{err}"),
            Self::Output(message) => write!(f, "output write failed: {message}"),
        }
    }
}

impl Error for ExportError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::Schema(err) => Some(err),
            Self::Output(_) => None,
        }
    }
}

impl From<DbError> for ExportError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<SchemaError> for ExportError {
    fn from(value: SchemaError) -> Self {
        Self::Schema(value)
    }
}

/// Per-attachment outcome counters for one run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AttachmentStats {
    pub copied: u64,
    pub source_missing: u64,
    pub db_missing: u64,
    pub unsupported: u64,
    pub errors: u64,
}

/// Auditable result of one export run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunSummary {
    pub exported: u64,
    pub skips: SkipCounts,
    pub corrupt_blobs: u64,
    pub write_errors: u64,
    pub attachments: AttachmentStats,
    /// Present when a token counter was available and returned a value.
    pub total_tokens: Option<u64>,
}

/// Runs one full export.
pub fn run(
    options: &ExportOptions,
    token_counter: Option<&dyn TokenCounter>,
) -> Result<RunSummary, ExportError> {
    let snapshot = DbSnapshot::acquire(&options.db_path)?;
    let conn = open_notes_db(snapshot.db_path())?;
    let ids = EntityIdMap::resolve(&conn);
    let mut fetcher = NoteFetcher::new(&conn, &ids)?;
    let (notes, skips) = fetcher.fetch_notes()?;

    let data_root = options
        .data_root
        .clone()
        .or_else(|| options.db_path.parent().map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from("."));

    let mut summary = RunSummary {
        skips,
        ..RunSummary::default()
    };

    match &options.mode {
        ExportMode::Markdown { output_dir } => {
            std::fs::create_dir_all(output_dir).map_err(|err| {
                ExportError::Output(format!("create `{}`: {err}", output_dir.display()))
            })?;
            for note in &notes {
                export_note_markdown(
                    note,
                    &fetcher,
                    &data_root,
                    &options.extra_attachment_roots,
                    output_dir,
                    &options.layout,
                    &mut summary,
                );
            }
        }
        ExportMode::Llm { output_file } => {
            let mut corpus = String::new();
            for note in &notes {
                let decoded = decode_or_placeholder(note, &fetcher, &options.layout, &mut summary);
                corpus.push_str(&render_plaintext(&decoded, &note.meta));
                summary.exported += 1;
            }

            summary.total_tokens = token_counter.and_then(|counter| counter.count(&corpus));

            let mut header = String::new();
            header.push_str(LLM_HEADER_LABEL);
            header.push('\n');
            header.push_str(&format!(
                "# Exported on: {}\n",
                Local::now().format("%Y-%m-%d %H:%M:%S")
            ));
            if let Some(tokens) = summary.total_tokens {
                header.push_str(&format!("# Total Tokens: {tokens}\n"));
            }
            header.push_str("\n---\n\n");

            std::fs::write(output_file, format!("{header}{corpus}")).map_err(|err| {
                ExportError::Output(format!("write `{}`: {err}", output_file.display()))
            })?;
        }
    }

    info!(
        "event=export_run module=export status=ok exported={} skipped={} corrupt_blobs={} write_errors={} att_copied={} att_source_missing={} att_db_missing={} att_unsupported={} att_errors={}",
        summary.exported,
        summary.skips.total(),
        summary.corrupt_blobs,
        summary.write_errors,
        summary.attachments.copied,
        summary.attachments.source_missing,
        summary.attachments.db_missing,
        summary.attachments.unsupported,
        summary.attachments.errors
    );
    Ok(summary)
}

fn decode_or_placeholder(
    note: &RawNote,
    fetcher: &NoteFetcher<'_>,
    layout: &WireLayout,
    summary: &mut RunSummary,
) -> DecodedNote {
    let known = fetcher.attachment_identifiers_for_note(note.meta.pk);
    match decode(&note.blob, &known, layout) {
        Ok(decoded) => decoded,
        Err(DecodeError::CorruptBlob(reason)) => {
            warn!(
                "event=decode_note module=export status=corrupt pk={} reason={reason}",
                note.meta.pk
            );
            summary.corrupt_blobs += 1;
            DecodedNote {
                body: CORRUPT_BLOB_PLACEHOLDER.to_string(),
                annotations: Vec::new(),
            }
        }
    }
}

fn export_note_markdown(
    note: &RawNote,
    fetcher: &NoteFetcher<'_>,
    data_root: &Path,
    extra_roots: &[PathBuf],
    output_dir: &Path,
    layout: &WireLayout,
    summary: &mut RunSummary,
) {
    let decoded = decode_or_placeholder(note, fetcher, layout, summary);
    let resolver = AttachmentResolver::new(
        data_root.to_path_buf(),
        note.meta.account_uuid.clone(),
        extra_roots.to_vec(),
    );

    let mut rendered_attachments: HashMap<String, RenderedAttachment> = HashMap::new();
    let mut diagnosed: HashSet<&str> = HashSet::new();
    for annotation in &decoded.annotations {
        let AnnotationKind::Attachment {
            identifier,
            type_uti,
            in_database,
        } = &annotation.kind
        else {
            continue;
        };
        // Non-file and database-missing references render straight from the
        // annotation; count each identifier once.
        if uti::is_non_file_uti(type_uti) {
            if diagnosed.insert(identifier) {
                summary.attachments.unsupported += 1;
            }
            continue;
        }
        if !in_database {
            if diagnosed.insert(identifier) {
                summary.attachments.db_missing += 1;
            }
            continue;
        }
        if rendered_attachments.contains_key(identifier) {
            continue;
        }
        let rendered = resolve_one_attachment(
            identifier,
            type_uti,
            fetcher,
            &resolver,
            output_dir,
            &mut summary.attachments,
        );
        rendered_attachments.insert(identifier.clone(), rendered);
    }

    let doc = render_markdown(&decoded, &note.meta, &rendered_attachments);
    let path = output_dir.join(format!("{}.md", note_stem(&note.meta, &decoded)));
    match std::fs::write(&path, doc) {
        Ok(()) => summary.exported += 1,
        Err(err) => {
            error!(
                "event=write_note module=export status=error pk={} path={} error={err}",
                note.meta.pk,
                path.display()
            );
            summary.write_errors += 1;
        }
    }
}

fn resolve_one_attachment(
    identifier: &str,
    blob_uti: &str,
    fetcher: &NoteFetcher<'_>,
    resolver: &AttachmentResolver,
    output_dir: &Path,
    stats: &mut AttachmentStats,
) -> RenderedAttachment {
    let record = match fetcher.attachment_by_identifier(identifier) {
        Ok(Some(record)) => record,
        Ok(None) => {
            stats.db_missing += 1;
            return RenderedAttachment::DbMissing {
                identifier: identifier.to_string(),
            };
        }
        Err(err) => {
            stats.errors += 1;
            return RenderedAttachment::Error {
                message: format!("{identifier}: {err}"),
            };
        }
    };

    // The database row's UTI wins over what the blob declared.
    let mut record = record;
    if record.type_uti.is_none() && !blob_uti.is_empty() {
        record.type_uti = Some(blob_uti.to_string());
    }
    let effective_uti = record.type_uti.clone().unwrap_or_default();

    match resolver.resolve(&record) {
        Resolution::Found(source) => {
            let dest_dir = output_dir.join(ATTACHMENTS_SUBDIR);
            match materialize(&source, &record, &dest_dir) {
                Ok((_, file_name)) => {
                    stats.copied += 1;
                    let label = file_name
                        .rsplit_once('.')
                        .map(|(stem, _)| stem)
                        .unwrap_or(&file_name)
                        .replace('_', " ");
                    let kind = if uti::is_image_uti(&effective_uti) {
                        LinkKind::Image
                    } else if uti::is_pdf_uti(&effective_uti) {
                        LinkKind::Pdf
                    } else {
                        LinkKind::File
                    };
                    RenderedAttachment::Link {
                        label,
                        rel_path: format!("{ATTACHMENTS_SUBDIR}/{file_name}"),
                        kind,
                    }
                }
                Err(message) => {
                    error!(
                        "event=materialize_attachment module=export status=error identifier={identifier} error={message}"
                    );
                    stats.errors += 1;
                    RenderedAttachment::Error { message }
                }
            }
        }
        Resolution::NotFoundOnDisk => {
            stats.source_missing += 1;
            RenderedAttachment::SourceMissing {
                name: record
                    .filename
                    .clone()
                    .unwrap_or_else(|| identifier.to_string()),
            }
        }
        Resolution::NotFoundInDatabase => {
            stats.db_missing += 1;
            RenderedAttachment::DbMissing {
                identifier: identifier.to_string(),
            }
        }
        Resolution::Error(message) => {
            stats.errors += 1;
            RenderedAttachment::Error { message }
        }
    }
}
