//! Output rendering for decoded notes.
//!
//! # Responsibility
//! - Turn a decoded note plus resolved attachments into a Markdown document.
//! - Turn a decoded note into a delimited plain-text block for corpus mode.
//!
//! # Invariants
//! - Unresolved attachments render as bracketed diagnostics, never as
//!   broken links.
//! - Plain-text mode strips attachments entirely: no links, no
//!   placeholders, no attachment directory references.
//! - Emphasis markers never span line breaks.

use crate::model::{AnnotationKind, DecodedNote, NoteMeta};
use crate::resolve::uti;
use crate::time;
use std::collections::HashMap;

pub mod filename;

/// How a resolved attachment should be linked in Markdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkKind {
    Image,
    Pdf,
    File,
}

/// Per-attachment render decision, prepared by the export driver.
#[derive(Debug, Clone, PartialEq)]
pub enum RenderedAttachment {
    /// File was materialized; link to it relative to the note file.
    Link {
        label: String,
        rel_path: String,
        kind: LinkKind,
    },
    /// Inline-only construct with no backing file.
    Unsupported { type_uti: String },
    /// Database row exists but no source file was found on disk.
    SourceMissing { name: String },
    /// The blob references an identifier the database does not contain.
    DbMissing { identifier: String },
    /// Lookup or copy failed.
    Error { message: String },
}

impl RenderedAttachment {
    fn to_markdown(&self) -> String {
        match self {
            Self::Link {
                label,
                rel_path,
                kind,
            } => match kind {
                LinkKind::Image => format!("![{label}]({rel_path})"),
                LinkKind::Pdf => format!("[{label} (PDF)]({rel_path})"),
                LinkKind::File => format!("[{label} (File)]({rel_path})"),
            },
            Self::Unsupported { type_uti } => format!("[Unsupported: {type_uti}]"),
            Self::SourceMissing { name } => format!("[Attachment source missing: {name}]"),
            Self::DbMissing { identifier } => format!("[Att DB missing: {identifier}]"),
            Self::Error { message } => format!("[Att Error: {message}]"),
        }
    }
}

/// Renders one note as a standalone Markdown document.
pub fn render_markdown(
    decoded: &DecodedNote,
    meta: &NoteMeta,
    attachments: &HashMap<String, RenderedAttachment>,
) -> String {
    let title = filename::note_title(meta, decoded);
    let mut doc = format!("# {title}\n\n");

    let mut meta_lines = Vec::new();
    if let Some(created) = time::format_core_data(meta.created) {
        meta_lines.push(format!("**Created:** {created}"));
    }
    if let Some(modified) = time::format_core_data(meta.modified) {
        meta_lines.push(format!("**Modified:** {modified}"));
    }
    if !meta_lines.is_empty() {
        doc.push_str(&meta_lines.join("\n"));
        doc.push_str("\n\n---\n\n");
    }

    let body = apply_annotations(decoded, attachments);
    doc.push_str(&body.replace('\u{fffc}', ""));
    doc.push('\n');
    doc
}

/// Renders one note as a delimited plain-text corpus block.
///
/// Attachment ranges are removed entirely and all styling is discarded.
pub fn render_plaintext(decoded: &DecodedNote, meta: &NoteMeta) -> String {
    let text = plain_body(decoded);
    let title_source = DecodedNote {
        body: text.clone(),
        annotations: Vec::new(),
    };
    let title = filename::note_title(meta, &title_source);
    let modified = time::format_core_data(meta.modified)
        .unwrap_or_else(|| "Unknown Date".to_string());

    format!(
        "--- NOTE START ---\nTitle: {title}\nModified: {modified}\nContent:\n{text}\n--- NOTE END ---\n\n"
    )
}

/// Body text with attachment ranges dropped and styling ignored.
pub fn plain_body(decoded: &DecodedNote) -> String {
    let chars: Vec<char> = decoded.body.chars().collect();
    let mut keep = vec![true; chars.len()];
    for annotation in &decoded.annotations {
        if matches!(annotation.kind, AnnotationKind::Attachment { .. }) {
            for flag in keep
                .iter_mut()
                .take(annotation.end.min(chars.len()))
                .skip(annotation.start)
            {
                *flag = false;
            }
        }
    }
    let text: String = chars
        .iter()
        .zip(keep)
        .filter(|(c, kept)| *kept && **c != '\u{fffc}')
        .map(|(c, _)| c)
        .collect();
    text.trim().to_string()
}

/// One annotated range with all kinds anchored to it.
struct AnnotationGroup<'a> {
    start: usize,
    end: usize,
    kinds: Vec<&'a AnnotationKind>,
}

fn group_annotations(decoded: &DecodedNote) -> Vec<AnnotationGroup<'_>> {
    let mut groups: Vec<AnnotationGroup<'_>> = Vec::new();
    for annotation in &decoded.annotations {
        match groups.last_mut() {
            Some(last) if last.start == annotation.start && last.end == annotation.end => {
                last.kinds.push(&annotation.kind);
            }
            _ => groups.push(AnnotationGroup {
                start: annotation.start,
                end: annotation.end,
                kinds: vec![&annotation.kind],
            }),
        }
    }
    groups
}

fn apply_annotations(
    decoded: &DecodedNote,
    attachments: &HashMap<String, RenderedAttachment>,
) -> String {
    let chars: Vec<char> = decoded.body.chars().collect();
    let mut out = String::new();
    let mut cursor = 0usize;

    for group in group_annotations(decoded) {
        let start = group.start.min(chars.len());
        let end = group.end.min(chars.len());
        if start < cursor || end < start {
            continue; // malformed anchor, keep what is already written
        }
        if start > cursor {
            out.extend(&chars[cursor..start]);
        }

        let attachment = group.kinds.iter().find_map(|kind| match kind {
            AnnotationKind::Attachment {
                identifier,
                type_uti,
                in_database,
            } => Some((identifier, type_uti, *in_database)),
            _ => None,
        });

        if let Some((identifier, type_uti, in_database)) = attachment {
            out.push_str(&attachment_markup(
                identifier,
                type_uti,
                in_database,
                attachments,
            ));
        } else {
            let segment: String = chars[start..end].iter().collect();
            out.push_str(&styled_segment(&segment, &group.kinds));
        }
        cursor = end;
    }

    if cursor < chars.len() {
        out.extend(&chars[cursor..]);
    }
    out
}

fn attachment_markup(
    identifier: &str,
    type_uti: &str,
    in_database: bool,
    attachments: &HashMap<String, RenderedAttachment>,
) -> String {
    if uti::is_non_file_uti(type_uti) {
        return format!("[Unsupported: {type_uti}]");
    }
    if !in_database {
        return RenderedAttachment::DbMissing {
            identifier: identifier.to_string(),
        }
        .to_markdown();
    }
    match attachments.get(identifier) {
        Some(rendered) => rendered.to_markdown(),
        None => RenderedAttachment::Error {
            message: identifier.to_string(),
        }
        .to_markdown(),
    }
}

/// Applies Markdown styling line by line so emphasis never crosses `\n`.
fn styled_segment(segment: &str, kinds: &[&AnnotationKind]) -> String {
    let bold = kinds.iter().any(|k| matches!(k, AnnotationKind::Bold));
    let italic = kinds.iter().any(|k| matches!(k, AnnotationKind::Italic));
    let strike = kinds
        .iter()
        .any(|k| matches!(k, AnnotationKind::Strikethrough));
    let mono = kinds.iter().any(|k| matches!(k, AnnotationKind::Monospace));
    let link = kinds.iter().find_map(|k| match k {
        AnnotationKind::Link(url) => Some(url.as_str()),
        _ => None,
    });
    // Underline has no Markdown form; it passes through as plain text.

    let mut lines = Vec::new();
    for line in segment.split('\n') {
        lines.push(styled_line(line, bold, italic, strike, mono, link));
    }
    lines.join("\n")
}

fn styled_line(
    line: &str,
    bold: bool,
    italic: bool,
    strike: bool,
    mono: bool,
    link: Option<&str>,
) -> String {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return line.to_string();
    }
    let leading = &line[..line.len() - line.trim_start().len()];
    let trailing = &line[line.trim_end().len()..];

    let mut core = trimmed.to_string();
    if mono {
        core = format!("`{core}`");
    } else {
        core = match (bold, italic) {
            (true, true) => format!("***{core}***"),
            (true, false) => format!("**{core}**"),
            (false, true) => format!("*{core}*"),
            (false, false) => core,
        };
        if strike {
            core = format!("~~{core}~~");
        }
    }
    if let Some(url) = link {
        core = format!("[{core}]({url})");
    }
    format!("{leading}{core}{trailing}")
}
