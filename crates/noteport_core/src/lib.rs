//! Core export pipeline for the proprietary note store.
//! This crate is the single source of truth for decode/resolve/render
//! behavior; the CLI stays a thin driver around it.

pub mod db;
pub mod decode;
pub mod export;
pub mod fetch;
pub mod logging;
pub mod model;
pub mod render;
pub mod resolve;
pub mod schema;
pub mod time;

pub use decode::{decode, DecodeError, WireLayout};
pub use export::{
    run, ExportError, ExportMode, ExportOptions, RunSummary, TokenCounter,
    CORRUPT_BLOB_PLACEHOLDER,
};
pub use fetch::{NoteFetcher, SkipCounts};
pub use logging::{default_log_level, init_logging};
pub use model::{
    Annotation, AnnotationKind, AttachmentRecord, DecodedNote, NoteMeta, RawNote, Resolution,
};
pub use render::{render_markdown, render_plaintext, RenderedAttachment};
pub use resolve::{materialize, AttachmentResolver, ATTACHMENTS_SUBDIR};
pub use schema::{EntityIdMap, EntityKind, SchemaError};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
