//! Best-effort attachment file resolution and materialization.
//!
//! # Responsibility
//! - Enumerate candidate on-disk locations for one attachment record and
//!   pick the first that exists.
//! - Copy resolved files into the output attachment area under
//!   collision-free names.
//!
//! # Invariants
//! - Candidate order is fixed: account-specific layout first, then the
//!   shared data root, then per-UTI fallback layouts.
//! - Materialized names depend only on the declared filename and the
//!   attachment primary key, so re-runs produce identical names.
//! - Resolution outcomes are never cached across runs.

use crate::model::{AttachmentRecord, Resolution};
use crate::render::filename::sanitize_filename;
use log::debug;
use std::path::{Path, PathBuf};

pub mod uti;

/// Subdirectory of the export root receiving copied attachment files.
pub const ATTACHMENTS_SUBDIR: &str = "_attachments";

const DRAWING_UTIS: [&str; 3] = ["com.apple.drawing", "com.apple.drawing.2", "com.apple.paper"];
const SCAN_PDF_UTI: &str = "com.apple.paper.doc.scan";
const GALLERY_UTI: &str = "com.apple.notes.gallery";

/// Locates attachment source files under the application's data root.
pub struct AttachmentResolver {
    data_root: PathBuf,
    account_uuid: Option<String>,
    extra_roots: Vec<PathBuf>,
}

impl AttachmentResolver {
    pub fn new(
        data_root: impl Into<PathBuf>,
        account_uuid: Option<String>,
        extra_roots: Vec<PathBuf>,
    ) -> Self {
        Self {
            data_root: data_root.into(),
            account_uuid,
            extra_roots,
        }
    }

    /// Base directories searched in order: account container, data root,
    /// then caller-supplied extra roots for alternate layouts.
    fn base_roots(&self) -> Vec<PathBuf> {
        let mut roots = Vec::new();
        if let Some(uuid) = &self.account_uuid {
            roots.push(self.data_root.join("Accounts").join(uuid));
        }
        roots.push(self.data_root.clone());
        roots.extend(self.extra_roots.iter().cloned());
        roots
    }

    /// All candidate source paths for one record, in search order.
    ///
    /// Pure path construction; nothing here touches the filesystem, which
    /// keeps the strategy list testable in isolation.
    pub fn candidate_paths(&self, record: &AttachmentRecord) -> Vec<PathBuf> {
        let uti = record.type_uti.as_deref().unwrap_or("");
        let mut candidates = Vec::new();

        for base in self.base_roots() {
            if let (Some(media_id), Some(filename)) = (&record.media_id, &record.filename) {
                if let Some(generation) = record.generation.as_deref().filter(|g| !g.is_empty()) {
                    candidates.push(base.join("Media").join(media_id).join(generation).join(filename));
                }
                candidates.push(base.join("Media").join(media_id).join(filename));
            }

            if DRAWING_UTIS.contains(&uti) {
                if let Some(generation) = &record.fallback_image_generation {
                    candidates.push(
                        base.join("FallbackImages")
                            .join(&record.identifier)
                            .join(generation)
                            .join("FallbackImage.png"),
                    );
                }
                for ext in ["jpg", "png"] {
                    candidates
                        .push(base.join("FallbackImages").join(format!("{}.{ext}", record.identifier)));
                }
            }

            if uti == SCAN_PDF_UTI {
                let generation = record.fallback_pdf_generation.clone().unwrap_or_default();
                candidates.push(
                    base.join("FallbackPDFs")
                        .join(&record.identifier)
                        .join(generation)
                        .join("FallbackPDF.pdf"),
                );
            }

            if uti == GALLERY_UTI {
                if let Some((width, height)) = record.preview_size {
                    candidates.push(
                        base.join("Previews")
                            .join(format!("{}-1-{width}x{height}-0.jpeg", record.identifier)),
                    );
                }
            }
        }

        candidates
    }

    /// First existing candidate wins; none existing is `NotFoundOnDisk`.
    pub fn resolve(&self, record: &AttachmentRecord) -> Resolution {
        for candidate in self.candidate_paths(record) {
            if candidate.is_file() {
                debug!(
                    "event=resolve_attachment module=resolve status=found pk={} path={}",
                    record.pk,
                    candidate.display()
                );
                return Resolution::Found(candidate);
            }
        }
        debug!(
            "event=resolve_attachment module=resolve status=not_on_disk pk={} identifier={}",
            record.pk, record.identifier
        );
        Resolution::NotFoundOnDisk
    }
}

/// Copies a resolved source file into the attachment area.
///
/// The destination name is `<sanitized stem>_<attachment pk><ext>`:
/// deterministic across runs and collision-free across attachments that
/// share a declared filename.
pub fn materialize(
    source: &Path,
    record: &AttachmentRecord,
    dest_dir: &Path,
) -> Result<(PathBuf, String), String> {
    std::fs::create_dir_all(dest_dir)
        .map_err(|err| format!("create `{}`: {err}", dest_dir.display()))?;

    let file_name = materialized_name(record, source);
    let dest = dest_dir.join(&file_name);
    std::fs::copy(source, &dest)
        .map_err(|err| format!("copy `{}`: {err}", source.display()))?;
    Ok((dest, file_name))
}

/// Destination file name for one attachment, independent of copy order.
pub fn materialized_name(record: &AttachmentRecord, source: &Path) -> String {
    let declared = record
        .filename
        .clone()
        .or_else(|| {
            source
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
        })
        .unwrap_or_else(|| "attachment".to_string());

    let stem = Path::new(&declared)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| declared.clone());
    let extension = uti::extension_for(record.type_uti.as_deref(), Some(&declared));
    format!("{}_{}{extension}", sanitize_filename(&stem), record.pk)
}

#[cfg(test)]
mod tests {
    use super::{materialized_name, AttachmentResolver};
    use crate::model::AttachmentRecord;
    use std::path::Path;

    fn record(uti: &str) -> AttachmentRecord {
        AttachmentRecord {
            pk: 42,
            identifier: "ABCD-1234".to_string(),
            type_uti: Some(uti.to_string()),
            media_id: Some("MEDIA-1".to_string()),
            filename: Some("photo.jpg".to_string()),
            generation: Some("G1".to_string()),
            ..AttachmentRecord::default()
        }
    }

    #[test]
    fn account_root_is_searched_before_data_root() {
        let resolver = AttachmentResolver::new(
            "/data",
            Some("ACC-UUID".to_string()),
            Vec::new(),
        );
        let candidates = resolver.candidate_paths(&record("public.jpeg"));
        assert_eq!(
            candidates[0],
            Path::new("/data/Accounts/ACC-UUID/Media/MEDIA-1/G1/photo.jpg")
        );
        assert_eq!(
            candidates[1],
            Path::new("/data/Accounts/ACC-UUID/Media/MEDIA-1/photo.jpg")
        );
        assert!(candidates
            .iter()
            .any(|p| p == Path::new("/data/Media/MEDIA-1/G1/photo.jpg")));
    }

    #[test]
    fn drawings_add_fallback_image_candidates() {
        let mut rec = record("com.apple.drawing");
        rec.fallback_image_generation = Some("F9".to_string());
        let resolver = AttachmentResolver::new("/data", None, Vec::new());
        let candidates = resolver.candidate_paths(&rec);
        assert!(candidates
            .iter()
            .any(|p| p == Path::new("/data/FallbackImages/ABCD-1234/F9/FallbackImage.png")));
        assert!(candidates
            .iter()
            .any(|p| p == Path::new("/data/FallbackImages/ABCD-1234.png")));
    }

    #[test]
    fn gallery_previews_use_declared_size() {
        let mut rec = record("com.apple.notes.gallery");
        rec.preview_size = Some((800, 600));
        let resolver = AttachmentResolver::new("/data", None, Vec::new());
        let candidates = resolver.candidate_paths(&rec);
        assert!(candidates
            .iter()
            .any(|p| p == Path::new("/data/Previews/ABCD-1234-1-800x600-0.jpeg")));
    }

    #[test]
    fn materialized_name_appends_pk_before_extension() {
        let name = materialized_name(&record("public.jpeg"), Path::new("/x/photo.jpg"));
        assert_eq!(name, "photo_42.jpg");
    }

    #[test]
    fn materialized_name_sanitizes_declared_stem() {
        let mut rec = record("public.jpeg");
        rec.filename = Some("my: photo?.jpg".to_string());
        let name = materialized_name(&rec, Path::new("/x/any"));
        assert_eq!(name, "my_photo_42.jpg");
    }
}
