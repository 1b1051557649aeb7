//! Configurable field numbering for the proprietary note blob.
//!
//! # Responsibility
//! - Keep the reverse-engineered field numbers out of the decoder proper.
//! - Allow overriding them from a JSON file when the source application's
//!   schema version shifts.
//!
//! The numbers below are the last-known-good layout. They are data, not
//! contract: nothing guarantees they are stable across application
//! versions, which is why they live in a serializable struct.

use serde::{Deserialize, Serialize};
use std::path::Path;

/// Field numbers of the root document wrapper.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DocumentLayout {
    /// Root message -> document submessage.
    pub document: u32,
    /// Document -> note submessage.
    pub note: u32,
    /// Note -> full body text.
    pub note_text: u32,
    /// Note -> repeated attribute run.
    pub attribute_run: u32,
}

impl Default for DocumentLayout {
    fn default() -> Self {
        Self {
            document: 2,
            note: 3,
            note_text: 2,
            attribute_run: 5,
        }
    }
}

/// Field numbers inside one attribute run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunLayout {
    /// Run length in Unicode scalar values of the body text.
    pub length: u32,
    /// Nested paragraph style submessage.
    pub paragraph_style: u32,
    /// Bitmask: bit 0 bold, bit 1 italic.
    pub font_weight: u32,
    pub underlined: u32,
    pub strikethrough: u32,
    /// Hyperlink URL string.
    pub link: u32,
    /// Nested attachment reference submessage.
    pub attachment_info: u32,
}

impl Default for RunLayout {
    fn default() -> Self {
        Self {
            length: 1,
            paragraph_style: 2,
            font_weight: 5,
            underlined: 6,
            strikethrough: 7,
            link: 9,
            attachment_info: 12,
        }
    }
}

/// Field numbers of nested submessages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NestedLayout {
    /// Paragraph style -> style type varint.
    pub style_type: u32,
    /// Style type value marking a monospaced block.
    pub monospace_style_type: u64,
    /// Attachment info -> attachment identifier string.
    pub attachment_identifier: u32,
    /// Attachment info -> declared type UTI string.
    pub attachment_type_uti: u32,
}

impl Default for NestedLayout {
    fn default() -> Self {
        Self {
            style_type: 1,
            monospace_style_type: 4,
            attachment_identifier: 1,
            attachment_type_uti: 2,
        }
    }
}

/// Complete wire layout for one schema version.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WireLayout {
    pub document: DocumentLayout,
    pub run: RunLayout,
    pub nested: NestedLayout,
}

impl WireLayout {
    /// Loads a layout override from a JSON file.
    ///
    /// Omitted fields keep their last-known-good defaults, so an override
    /// file only needs to name what actually moved.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, String> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|err| format!("read layout `{}`: {err}", path.display()))?;
        serde_json::from_str(&text)
            .map_err(|err| format!("parse layout `{}`: {err}", path.display()))
    }
}
