//! Filesystem-safe name derivation for exported notes and attachments.
//!
//! # Responsibility
//! - Sanitize declared names for use as file names.
//! - Derive a note title and export stem when the row has no title.
//!
//! # Invariants
//! - Sanitized output is never empty; `Untitled` is the floor.
//! - Export stems embed the note primary key, so two notes with the same
//!   first line never collide.

use crate::model::{DecodedNote, NoteMeta};

/// Longest sanitized name kept before the uniqueness suffix.
const MAX_SANITIZED_LEN: usize = 150;
/// Longest derived title taken from body or snippet text.
const MAX_DERIVED_TITLE_LEN: usize = 80;

/// Replaces filesystem-hostile characters and collapses whitespace.
///
/// Keeps alphanumerics, spaces, underscores and dashes; whitespace runs
/// become single underscores; output is capped and never empty.
pub fn sanitize_filename(name: &str) -> String {
    let kept: String = name
        .chars()
        .filter(|c| c.is_alphanumeric() || matches!(c, ' ' | '_' | '-'))
        .collect();
    let joined = kept.split_whitespace().collect::<Vec<_>>().join("_");
    let capped: String = joined.chars().take(MAX_SANITIZED_LEN).collect();
    if capped.is_empty() {
        "Untitled".to_string()
    } else {
        capped
    }
}

/// Display title for one note.
///
/// Preference order: declared title, first non-empty body line, snippet,
/// `Untitled_Note_<pk>`. Body lines consisting only of embedded-object
/// placeholders do not qualify as titles.
pub fn note_title(meta: &NoteMeta, decoded: &DecodedNote) -> String {
    if let Some(title) = meta.title.as_deref() {
        let trimmed = title.trim();
        if !trimmed.is_empty() {
            return trimmed.to_string();
        }
    }

    if let Some(line) = first_meaningful_line(&decoded.body) {
        return line;
    }

    if let Some(snippet) = meta.snippet.as_deref() {
        let trimmed = snippet.trim();
        if !trimmed.is_empty() {
            return trimmed.chars().take(MAX_DERIVED_TITLE_LEN).collect();
        }
    }

    format!("Untitled_Note_{}", meta.pk)
}

/// File stem for a note's Markdown export: sanitized title plus the pk.
pub fn note_stem(meta: &NoteMeta, decoded: &DecodedNote) -> String {
    format!("{}_{}", sanitize_filename(&note_title(meta, decoded)), meta.pk)
}

fn first_meaningful_line(body: &str) -> Option<String> {
    for line in body.lines() {
        let cleaned: String = line.chars().filter(|c| *c != '\u{fffc}').collect();
        let trimmed = cleaned.trim();
        if !trimmed.is_empty() {
            return Some(trimmed.chars().take(MAX_DERIVED_TITLE_LEN).collect());
        }
    }
    None
}
