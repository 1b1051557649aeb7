//! Compressed note blob decoding.
//!
//! # Responsibility
//! - Decompress a note's body blob and parse the nested structured-text
//!   message inside it.
//! - Produce a `DecodedNote`: plain body text plus ordered annotations.
//!
//! # Invariants
//! - Decoding is deterministic: identical bytes yield identical results.
//! - Unknown fields and style attributes are skipped, never errors; the
//!   schema drifts and this decoder does not own it.
//! - Attachment references are always recorded, even when the identifier
//!   is unknown — a visible placeholder beats silent loss of content.

use crate::model::{Annotation, AnnotationKind, DecodedNote};
use flate2::read::{GzDecoder, ZlibDecoder};
use log::debug;
use std::collections::HashSet;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::io::Read;

pub mod layout;
pub mod wire;

pub use layout::WireLayout;

use wire::{MessageReader, WireError};

#[derive(Debug, PartialEq, Eq)]
pub enum DecodeError {
    /// Malformed or truncated blob; the note is skipped with a placeholder.
    CorruptBlob(String),
}

impl Display for DecodeError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::CorruptBlob(reason) => write!(f, "corrupt note blob: {reason}"),
        }
    }
}

impl Error for DecodeError {}

impl From<WireError> for DecodeError {
    fn from(value: WireError) -> Self {
        Self::CorruptBlob(value.to_string())
    }
}

/// Decodes one compressed note blob into body text plus annotations.
///
/// `known_attachment_ids` marks which referenced identifiers exist in the
/// database; unknown references are still recorded so the renderer can emit
/// an explicit missing-attachment placeholder.
pub fn decode(
    blob: &[u8],
    known_attachment_ids: &HashSet<String>,
    layout: &WireLayout,
) -> Result<DecodedNote, DecodeError> {
    let plain = decompress(blob)
        .ok_or_else(|| DecodeError::CorruptBlob("decompression failed".to_string()))?;

    let document = MessageReader::find_bytes(&plain, layout.document.document)?
        .ok_or_else(|| DecodeError::CorruptBlob("document message missing".to_string()))?;
    let note = MessageReader::find_bytes(document, layout.document.note)?
        .ok_or_else(|| DecodeError::CorruptBlob("note message missing".to_string()))?;

    let mut note_text: Option<String> = None;
    let mut runs: Vec<&[u8]> = Vec::new();
    let mut reader = MessageReader::new(note);
    while let Some((field, value)) = reader.next_field()? {
        if field == layout.document.note_text {
            if note_text.is_none() {
                note_text = value.as_lossy_str();
            }
        } else if field == layout.document.attribute_run {
            if let Some(bytes) = value.as_bytes() {
                runs.push(bytes);
            }
        }
    }

    let text = note_text.unwrap_or_default();
    if runs.is_empty() {
        // No styling at all: the body is the text as stored.
        return Ok(DecodedNote {
            body: text,
            annotations: Vec::new(),
        });
    }

    build_from_runs(&text, &runs, known_attachment_ids, layout)
}

/// Gzip first, then raw zlib; the source application has used both framings.
fn decompress(blob: &[u8]) -> Option<Vec<u8>> {
    let mut out = Vec::new();
    if GzDecoder::new(blob).read_to_end(&mut out).is_ok() {
        return Some(out);
    }
    out.clear();
    if ZlibDecoder::new(blob).read_to_end(&mut out).is_ok() {
        return Some(out);
    }
    None
}

#[derive(Debug, Default)]
struct RunAttrs {
    length: u64,
    bold: bool,
    italic: bool,
    underline: bool,
    strikethrough: bool,
    monospace: bool,
    link: Option<String>,
    attachment: Option<(String, String)>,
}

fn build_from_runs(
    text: &str,
    runs: &[&[u8]],
    known_attachment_ids: &HashSet<String>,
    layout: &WireLayout,
) -> Result<DecodedNote, DecodeError> {
    let chars: Vec<char> = text.chars().collect();
    let mut pos = 0usize;
    let mut body = String::new();
    let mut body_chars = 0usize;
    let mut annotations = Vec::new();

    for run_bytes in runs {
        let attrs = parse_run(run_bytes, layout)?;
        // Run lengths count scalar values of the stored text; clamp so a
        // drifted length never panics or drops the rest of the note.
        let take = (attrs.length as usize).min(chars.len().saturating_sub(pos));
        let segment: String = chars[pos..pos + take].iter().collect();
        pos += take;

        let start = body_chars;
        let mut seg_chars = take;

        if let Some((identifier, type_uti)) = attrs.attachment {
            if seg_chars == 0 {
                // Anchor zero-width references on an object replacement
                // char so the renderer has a range to substitute.
                body.push('\u{fffc}');
                seg_chars = 1;
            } else {
                body.push_str(&segment);
            }
            let in_database = known_attachment_ids.contains(&identifier);
            if !in_database {
                debug!(
                    "event=decode_attachment module=decode status=unknown_id identifier={identifier}"
                );
            }
            body_chars += seg_chars;
            annotations.push(Annotation {
                start,
                end: body_chars,
                kind: AnnotationKind::Attachment {
                    identifier,
                    type_uti,
                    in_database,
                },
            });
            continue;
        }

        body.push_str(&segment);
        body_chars += seg_chars;
        if seg_chars == 0 {
            continue;
        }
        let end = body_chars;
        let mut push = |kind: AnnotationKind| {
            annotations.push(Annotation { start, end, kind });
        };
        if attrs.bold {
            push(AnnotationKind::Bold);
        }
        if attrs.italic {
            push(AnnotationKind::Italic);
        }
        if attrs.underline {
            push(AnnotationKind::Underline);
        }
        if attrs.strikethrough {
            push(AnnotationKind::Strikethrough);
        }
        if attrs.monospace {
            push(AnnotationKind::Monospace);
        }
        if let Some(url) = attrs.link {
            push(AnnotationKind::Link(url));
        }
    }

    // Text not covered by any run is kept as plain body rather than lost.
    if pos < chars.len() {
        let tail: String = chars[pos..].iter().collect();
        body.push_str(&tail);
    }

    Ok(DecodedNote { body, annotations })
}

fn parse_run(bytes: &[u8], layout: &WireLayout) -> Result<RunAttrs, DecodeError> {
    let mut attrs = RunAttrs::default();
    let mut reader = MessageReader::new(bytes);
    while let Some((field, value)) = reader.next_field()? {
        if field == layout.run.length {
            attrs.length = value.as_varint().unwrap_or(0);
        } else if field == layout.run.font_weight {
            let weight = value.as_varint().unwrap_or(0);
            attrs.bold = weight & 0x1 != 0;
            attrs.italic = weight & 0x2 != 0;
        } else if field == layout.run.underlined {
            attrs.underline = value.as_varint().unwrap_or(0) != 0;
        } else if field == layout.run.strikethrough {
            attrs.strikethrough = value.as_varint().unwrap_or(0) != 0;
        } else if field == layout.run.paragraph_style {
            if let Some(style) = value.as_bytes() {
                attrs.monospace = parse_style_type(style, layout)?
                    == Some(layout.nested.monospace_style_type);
            }
        } else if field == layout.run.link {
            attrs.link = value.as_lossy_str().filter(|url| !url.is_empty());
        } else if field == layout.run.attachment_info {
            if let Some(info) = value.as_bytes() {
                attrs.attachment = parse_attachment_info(info, layout)?;
            }
        }
        // Every other field is an unrecognized style attribute: skipped.
    }
    Ok(attrs)
}

fn parse_style_type(bytes: &[u8], layout: &WireLayout) -> Result<Option<u64>, DecodeError> {
    let mut reader = MessageReader::new(bytes);
    while let Some((field, value)) = reader.next_field()? {
        if field == layout.nested.style_type {
            return Ok(value.as_varint());
        }
    }
    Ok(None)
}

fn parse_attachment_info(
    bytes: &[u8],
    layout: &WireLayout,
) -> Result<Option<(String, String)>, DecodeError> {
    let mut identifier = None;
    let mut type_uti = None;
    let mut reader = MessageReader::new(bytes);
    while let Some((field, value)) = reader.next_field()? {
        if field == layout.nested.attachment_identifier {
            identifier = value.as_lossy_str();
        } else if field == layout.nested.attachment_type_uti {
            type_uti = value.as_lossy_str();
        }
    }
    Ok(identifier.map(|id| (id, type_uti.unwrap_or_default())))
}
