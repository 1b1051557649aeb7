//! Type-identifier (UTI) classification and extension mapping.
//!
//! # Responsibility
//! - Map declared UTIs to output file extensions.
//! - Classify UTIs for link rendering (image, PDF, non-file inline types).

/// UTIs that never correspond to a copyable file (tables, inline tokens).
const NON_FILE_UTIS: [&str; 5] = [
    "com.apple.notes.table",
    "com.apple.notes.inlinetextattachment.hashtag",
    "com.apple.notes.inlinetextattachment.mention",
    "com.apple.notes.inlinetextattachment.link",
    "public.url",
];

const IMAGE_MARKERS: [&str; 8] = [
    "image", "jpeg", "png", "gif", "tiff", "scan", "drawing", "gallery",
];

const PDF_MARKERS: [&str; 2] = ["pdf", "com.apple.paper.doc.scan"];

/// Known UTI to extension pairs, covering the formats the source
/// application commonly embeds.
const UTI_EXTENSIONS: [(&str, &str); 26] = [
    ("public.jpeg", ".jpg"),
    ("public.png", ".png"),
    ("public.gif", ".gif"),
    ("public.tiff", ".tiff"),
    ("com.adobe.pdf", ".pdf"),
    ("public.plain-text", ".txt"),
    ("public.rtf", ".rtf"),
    ("public.url", ".url"),
    ("public.vcard", ".vcf"),
    ("com.apple.keynote.key", ".key"),
    ("com.apple.keynote.kth", ".kth"),
    ("com.apple.numbers.numbers", ".numbers"),
    ("com.apple.pages.pages", ".pages"),
    ("com.microsoft.word.doc", ".doc"),
    ("org.openxmlformats.wordprocessingml.document", ".docx"),
    ("com.microsoft.excel.xls", ".xls"),
    ("org.openxmlformats.spreadsheetml.sheet", ".xlsx"),
    ("com.microsoft.powerpoint.ppt", ".ppt"),
    ("org.openxmlformats.presentationml.presentation", ".pptx"),
    ("public.mpeg-4", ".mp4"),
    ("public.mpeg-4-audio", ".m4a"),
    ("public.mp3", ".mp3"),
    ("com.apple.quicktime-movie", ".mov"),
    ("com.apple.drawing", ".png"),
    ("com.apple.drawing.2", ".png"),
    ("com.apple.paper.doc.scan", ".pdf"),
];

/// Whether this UTI is an inline-only construct with no backing file.
pub fn is_non_file_uti(uti: &str) -> bool {
    NON_FILE_UTIS.contains(&uti)
}

/// Whether the attachment should render as an image link.
pub fn is_image_uti(uti: &str) -> bool {
    let lower = uti.to_ascii_lowercase();
    IMAGE_MARKERS.iter().any(|marker| lower.contains(marker))
}

/// Whether the attachment should render as a PDF link.
pub fn is_pdf_uti(uti: &str) -> bool {
    let lower = uti.to_ascii_lowercase();
    PDF_MARKERS.iter().any(|marker| lower.contains(marker))
}

/// Output extension for a UTI, falling back to the declared filename's
/// extension, then `.bin`.
pub fn extension_for(uti: Option<&str>, declared_filename: Option<&str>) -> String {
    if let Some(uti) = uti {
        if let Some((_, ext)) = UTI_EXTENSIONS.iter().find(|(known, _)| *known == uti) {
            return (*ext).to_string();
        }
    }
    if let Some(name) = declared_filename {
        if let Some((_, ext)) = name.rsplit_once('.') {
            if !ext.is_empty() && ext.len() <= 8 {
                return format!(".{ext}");
            }
        }
    }
    ".bin".to_string()
}
