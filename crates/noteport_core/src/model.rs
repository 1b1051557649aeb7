//! Domain records shared across the export pipeline.
//!
//! # Responsibility
//! - Define the read-only row shapes produced by the record fetcher.
//! - Define the decoded note structure consumed by the renderer.
//!
//! # Invariants
//! - `DecodedNote` is built once per note and never mutated afterwards.
//! - Every annotation range lies within the body's character bounds.
//! - At most one attachment annotation is anchored at a given range.

use std::path::PathBuf;

/// Note metadata as read from the source database.
///
/// Timestamps are Apple Core Data epoch seconds (seconds since 2001-01-01
/// UTC), kept raw here and converted only at render time.
#[derive(Debug, Clone, PartialEq)]
pub struct NoteMeta {
    /// Source database primary key (`Z_PK`).
    pub pk: i64,
    /// Declared title, when the row carries one.
    pub title: Option<String>,
    /// Short snippet derived by the source application.
    pub snippet: Option<String>,
    pub created: Option<f64>,
    pub modified: Option<f64>,
    /// Parent folder primary key.
    pub folder_pk: Option<i64>,
    /// Account container UUID resolved through the folder chain.
    pub account_uuid: Option<String>,
}

/// One note row plus its compressed body blob.
#[derive(Debug, Clone)]
pub struct RawNote {
    pub meta: NoteMeta,
    /// Compressed structured-text blob (`ZICNOTEDATA.ZDATA`), opaque here.
    pub blob: Vec<u8>,
}

/// Inline styling or embedded-object marker anchored to a body range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnnotationKind {
    Bold,
    Italic,
    Underline,
    Strikethrough,
    Monospace,
    Link(String),
    /// Embedded object reference occupying the anchored range.
    Attachment {
        /// Attachment identifier as written in the blob (UUID string).
        identifier: String,
        /// Declared type UTI from the blob, may differ from the database row.
        type_uti: String,
        /// Whether the identifier was present in the database's attachment
        /// set at decode time. Unknown identifiers are still recorded so the
        /// renderer can emit a visible placeholder instead of dropping them.
        in_database: bool,
    },
}

/// Styling/attachment marker over `[start, end)` character offsets.
///
/// Offsets count Unicode scalar values of the decoded body, not bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Annotation {
    pub start: usize,
    pub end: usize,
    pub kind: AnnotationKind,
}

/// Plain-text body plus ordered annotations, produced by the blob decoder.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DecodedNote {
    pub body: String,
    /// Document order, anchored to `body` character offsets.
    pub annotations: Vec<Annotation>,
}

impl DecodedNote {
    /// Returns the body character count (scalar values, not bytes).
    pub fn char_len(&self) -> usize {
        self.body.chars().count()
    }
}

/// Attachment row joined with its media row, as far as the schema allows.
///
/// Media fields stay optional: the source schema renames and drops columns
/// across versions and a partial row is still worth resolving.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AttachmentRecord {
    /// Attachment primary key (`Z_PK`).
    pub pk: i64,
    /// Stable identifier referenced from note blobs.
    pub identifier: String,
    /// Declared type UTI from the database row.
    pub type_uti: Option<String>,
    /// Media row identifier (directory key under `Media/`).
    pub media_id: Option<String>,
    /// Declared filename on the media row.
    pub filename: Option<String>,
    /// Media generation directory component, when present.
    pub generation: Option<String>,
    /// Fallback image generation for drawings.
    pub fallback_image_generation: Option<String>,
    /// Fallback PDF generation for scanned documents.
    pub fallback_pdf_generation: Option<String>,
    /// Preview pixel size for gallery scans.
    pub preview_size: Option<(i64, i64)>,
}

/// Outcome of locating one attachment's source file for this run.
///
/// Never cached across runs; the filesystem may change between runs.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    /// Absolute path of the first candidate found on disk.
    Found(PathBuf),
    /// The database has no attachment row for the referenced identifier.
    NotFoundInDatabase,
    /// The row exists but no candidate path exists on disk.
    NotFoundOnDisk,
    /// Lookup or copy failed for an unexpected reason.
    Error(String),
}

#[cfg(test)]
mod tests {
    use super::{Annotation, AnnotationKind, DecodedNote};

    #[test]
    fn char_len_counts_scalar_values() {
        let note = DecodedNote {
            body: "héllo\u{fffc}".to_string(),
            annotations: Vec::new(),
        };
        assert_eq!(note.char_len(), 6);
    }

    #[test]
    fn attachment_annotations_compare_by_identifier() {
        let a = Annotation {
            start: 0,
            end: 1,
            kind: AnnotationKind::Attachment {
                identifier: "A".to_string(),
                type_uti: "public.png".to_string(),
                in_database: true,
            },
        };
        let b = a.clone();
        assert_eq!(a, b);
    }
}
