//! Row enumeration over the snapshot database.
//!
//! # Responsibility
//! - Enumerate note rows, load body blobs, and apply the export filtering
//!   policy before any decoding happens.
//! - Look up attachment and media rows referenced from note blobs.
//!
//! # Invariants
//! - Notes in the trash folder, in smart folders, or password-protected
//!   never reach the decoder; each skip is counted, never silent.
//! - Per-row lookup failures degrade to `None` and a log line; only the
//!   top-level enumeration query can fail the fetch.

use crate::db::DbError;
use crate::model::{AttachmentRecord, NoteMeta, RawNote};
use crate::schema::{EntityIdMap, EntityKind, SchemaError, FOLDER_TYPE_SMART, FOLDER_TYPE_TRASH};
use log::{info, warn};
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::{HashMap, HashSet};

/// Per-category counters for notes excluded before decoding.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SkipCounts {
    pub trash: u64,
    pub smart_folder: u64,
    pub encrypted: u64,
    pub no_folder: u64,
    pub no_data: u64,
}

impl SkipCounts {
    pub fn total(&self) -> u64 {
        self.trash + self.smart_folder + self.encrypted + self.no_folder + self.no_data
    }
}

#[derive(Debug, Clone, Copy)]
struct FolderInfo {
    owner_pk: Option<i64>,
    parent_pk: Option<i64>,
    folder_type: Option<i64>,
}

/// Read-only record fetcher bound to one snapshot connection.
///
/// Folder and account lookups are cached for the lifetime of the fetcher,
/// which is one export run.
pub struct NoteFetcher<'conn> {
    conn: &'conn Connection,
    note_ent: i64,
    folder_ent: i64,
    attachment_ent: i64,
    media_ent: i64,
    account_ent: i64,
    folder_cache: HashMap<i64, Option<FolderInfo>>,
    owner_cache: HashMap<i64, Option<i64>>,
    account_cache: HashMap<i64, Option<String>>,
}

impl<'conn> NoteFetcher<'conn> {
    /// Binds a fetcher to a connection, requiring note/attachment ids.
    pub fn new(conn: &'conn Connection, ids: &EntityIdMap) -> Result<Self, SchemaError> {
        Ok(Self {
            conn,
            note_ent: ids.required(EntityKind::Note)?,
            attachment_ent: ids.required(EntityKind::Attachment)?,
            folder_ent: ids.get(EntityKind::Folder).unwrap_or(5),
            media_ent: ids.get(EntityKind::Media).unwrap_or(8),
            account_ent: ids.get(EntityKind::Account).unwrap_or(1),
            folder_cache: HashMap::new(),
            owner_cache: HashMap::new(),
            account_cache: HashMap::new(),
        })
    }

    /// Enumerates exportable notes, newest modification first.
    ///
    /// Applies the filtering policy: trash, smart folders, missing folder,
    /// missing body data, and password-protected notes are skipped and
    /// counted.
    pub fn fetch_notes(&mut self) -> Result<(Vec<RawNote>, SkipCounts), DbError> {
        let rows = self.query_note_rows()?;
        let mut skips = SkipCounts::default();
        let mut notes = Vec::new();

        for row in rows {
            if row.encrypted {
                skips.encrypted += 1;
                continue;
            }
            let Some(data_pk) = row.note_data_pk else {
                skips.no_data += 1;
                continue;
            };
            let Some(folder_pk) = row.folder_pk else {
                skips.no_folder += 1;
                continue;
            };
            match self.folder_info(folder_pk).and_then(|info| info.folder_type) {
                Some(FOLDER_TYPE_TRASH) => {
                    skips.trash += 1;
                    continue;
                }
                Some(FOLDER_TYPE_SMART) => {
                    skips.smart_folder += 1;
                    continue;
                }
                Some(_) => {}
                None => {
                    skips.no_folder += 1;
                    continue;
                }
            }

            let Some(blob) = self.load_blob(data_pk)? else {
                skips.no_data += 1;
                continue;
            };

            let owner_pk = self.resolve_folder_owner(folder_pk);
            let account_uuid = owner_pk.and_then(|pk| self.account_uuid(pk));

            notes.push(RawNote {
                meta: NoteMeta {
                    pk: row.pk,
                    title: row.title,
                    snippet: row.snippet,
                    created: row.created,
                    modified: row.modified,
                    folder_pk: Some(folder_pk),
                    account_uuid,
                },
                blob,
            });
        }

        info!(
            "event=fetch_notes module=fetch status=ok notes={} skipped_trash={} skipped_smart={} skipped_encrypted={} skipped_no_folder={} skipped_no_data={}",
            notes.len(),
            skips.trash,
            skips.smart_folder,
            skips.encrypted,
            skips.no_folder,
            skips.no_data
        );
        Ok((notes, skips))
    }

    /// Identifiers of attachments owned by one note.
    ///
    /// Falls back to the full attachment identifier set when the owning-note
    /// column is absent in this schema version.
    pub fn attachment_identifiers_for_note(&self, note_pk: i64) -> HashSet<String> {
        let scoped = self.query_identifiers(
            "SELECT ZIDENTIFIER FROM ZICCLOUDSYNCINGOBJECT WHERE Z_ENT = ?1 AND ZNOTE = ?2",
            params![self.attachment_ent, note_pk],
        );
        match scoped {
            Ok(ids) => ids,
            Err(err) => {
                warn!(
                    "event=fetch_attachment_ids module=fetch status=fallback note_pk={note_pk} error={err}"
                );
                self.query_identifiers(
                    "SELECT ZIDENTIFIER FROM ZICCLOUDSYNCINGOBJECT WHERE Z_ENT = ?1",
                    params![self.attachment_ent],
                )
                .unwrap_or_default()
            }
        }
    }

    /// Attachment row joined with its media row, by blob identifier.
    ///
    /// Returns `Ok(None)` for a dangling reference. Media columns missing in
    /// this schema version degrade field-by-field instead of failing.
    pub fn attachment_by_identifier(
        &self,
        identifier: &str,
    ) -> Result<Option<AttachmentRecord>, DbError> {
        let head = self
            .conn
            .query_row(
                "SELECT Z_PK, ZTYPEUTI, ZMEDIA FROM ZICCLOUDSYNCINGOBJECT
                 WHERE ZIDENTIFIER = ?1 AND Z_ENT = ?2",
                params![identifier, self.attachment_ent],
                |row| {
                    Ok((
                        row.get::<_, i64>(0)?,
                        row.get::<_, Option<String>>(1)?,
                        row.get::<_, Option<i64>>(2)?,
                    ))
                },
            )
            .optional()?;

        let Some((pk, type_uti, media_pk)) = head else {
            return Ok(None);
        };

        let mut record = AttachmentRecord {
            pk,
            identifier: identifier.to_string(),
            type_uti,
            ..AttachmentRecord::default()
        };

        if let Some(media_pk) = media_pk {
            self.fill_media_fields(&mut record, media_pk);
        }
        self.fill_fallback_fields(&mut record);
        Ok(Some(record))
    }

    fn fill_media_fields(&self, record: &mut AttachmentRecord, media_pk: i64) {
        let with_generation = self.conn.query_row(
            "SELECT ZIDENTIFIER, ZFILENAME, ZGENERATION1 FROM ZICCLOUDSYNCINGOBJECT
             WHERE Z_PK = ?1 AND Z_ENT = ?2",
            params![media_pk, self.media_ent],
            |row| {
                Ok((
                    row.get::<_, Option<String>>(0)?,
                    row.get::<_, Option<String>>(1)?,
                    row.get::<_, Option<String>>(2)?,
                ))
            },
        );
        match with_generation.optional() {
            Ok(Some((media_id, filename, generation))) => {
                record.media_id = media_id;
                record.filename = filename;
                record.generation = generation;
            }
            Ok(None) => {}
            Err(err) => {
                // Generation column drifts across versions; retry without it.
                warn!(
                    "event=fetch_media module=fetch status=fallback media_pk={media_pk} error={err}"
                );
                if let Ok(Some((media_id, filename))) = self
                    .conn
                    .query_row(
                        "SELECT ZIDENTIFIER, ZFILENAME FROM ZICCLOUDSYNCINGOBJECT
                         WHERE Z_PK = ?1 AND Z_ENT = ?2",
                        params![media_pk, self.media_ent],
                        |row| {
                            Ok((
                                row.get::<_, Option<String>>(0)?,
                                row.get::<_, Option<String>>(1)?,
                            ))
                        },
                    )
                    .optional()
                {
                    record.media_id = media_id;
                    record.filename = filename;
                }
            }
        }
    }

    /// Drawing/scan/gallery fallback columns, each tolerated when absent.
    fn fill_fallback_fields(&self, record: &mut AttachmentRecord) {
        record.fallback_image_generation = self.optional_text_column(
            "SELECT ZFALLBACKIMAGEGENERATION FROM ZICCLOUDSYNCINGOBJECT
             WHERE Z_PK = ?1 AND Z_ENT = ?2",
            record.pk,
        );
        record.fallback_pdf_generation = self.optional_text_column(
            "SELECT ZFALLBACKPDFGENERATION FROM ZICCLOUDSYNCINGOBJECT
             WHERE Z_PK = ?1 AND Z_ENT = ?2",
            record.pk,
        );
        record.preview_size = self
            .conn
            .query_row(
                "SELECT ZSIZEWIDTH, ZSIZEHEIGHT FROM ZICCLOUDSYNCINGOBJECT
                 WHERE Z_PK = ?1 AND Z_ENT = ?2",
                params![record.pk, self.attachment_ent],
                |row| {
                    Ok((
                        row.get::<_, Option<i64>>(0)?,
                        row.get::<_, Option<i64>>(1)?,
                    ))
                },
            )
            .optional()
            .ok()
            .flatten()
            .and_then(|(w, h)| Some((w?, h?)));
    }

    fn optional_text_column(&self, sql: &str, pk: i64) -> Option<String> {
        self.conn
            .query_row(sql, params![pk, self.attachment_ent], |row| {
                row.get::<_, Option<String>>(0)
            })
            .optional()
            .ok()
            .flatten()
            .flatten()
    }

    fn folder_info(&mut self, folder_pk: i64) -> Option<FolderInfo> {
        if let Some(cached) = self.folder_cache.get(&folder_pk) {
            return *cached;
        }
        let info = self
            .conn
            .query_row(
                "SELECT ZOWNER, ZPARENT, ZFOLDERTYPE FROM ZICCLOUDSYNCINGOBJECT
                 WHERE Z_PK = ?1 AND Z_ENT = ?2",
                params![folder_pk, self.folder_ent],
                |row| {
                    Ok(FolderInfo {
                        owner_pk: row.get(0)?,
                        parent_pk: row.get(1)?,
                        folder_type: row.get(2)?,
                    })
                },
            )
            .optional()
            .unwrap_or_else(|err| {
                warn!(
                    "event=fetch_folder module=fetch status=error folder_pk={folder_pk} error={err}"
                );
                None
            });
        self.folder_cache.insert(folder_pk, info);
        info
    }

    /// Walks the folder parent chain up to the owning account row.
    fn resolve_folder_owner(&mut self, folder_pk: i64) -> Option<i64> {
        if let Some(cached) = self.owner_cache.get(&folder_pk) {
            return *cached;
        }
        let mut visited = HashSet::new();
        let mut current = Some(folder_pk);
        let mut owner = None;
        while let Some(pk) = current {
            if !visited.insert(pk) {
                break; // parent cycle in corrupted data
            }
            match self.folder_info(pk) {
                Some(info) => {
                    if info.owner_pk.is_some() {
                        owner = info.owner_pk;
                        break;
                    }
                    current = info.parent_pk;
                }
                None => break,
            }
        }
        self.owner_cache.insert(folder_pk, owner);
        owner
    }

    fn account_uuid(&mut self, owner_pk: i64) -> Option<String> {
        if let Some(cached) = self.account_cache.get(&owner_pk) {
            return cached.clone();
        }
        let uuid = self
            .conn
            .query_row(
                "SELECT ZIDENTIFIER FROM ZICCLOUDSYNCINGOBJECT
                 WHERE Z_PK = ?1 AND Z_ENT = ?2",
                params![owner_pk, self.account_ent],
                |row| row.get::<_, Option<String>>(0),
            )
            .optional()
            .unwrap_or_else(|err| {
                warn!(
                    "event=fetch_account module=fetch status=error owner_pk={owner_pk} error={err}"
                );
                None
            })
            .flatten();
        self.account_cache.insert(owner_pk, uuid.clone());
        uuid
    }

    fn load_blob(&self, data_pk: i64) -> Result<Option<Vec<u8>>, DbError> {
        let blob = self
            .conn
            .query_row(
                "SELECT ZDATA FROM ZICNOTEDATA WHERE Z_PK = ?1",
                params![data_pk],
                |row| row.get::<_, Option<Vec<u8>>>(0),
            )
            .optional()?
            .flatten();
        Ok(blob)
    }

    fn query_identifiers(
        &self,
        sql: &str,
        params: impl rusqlite::Params,
    ) -> Result<HashSet<String>, rusqlite::Error> {
        let mut stmt = self.conn.prepare(sql)?;
        let mut rows = stmt.query(params)?;
        let mut ids = HashSet::new();
        while let Some(row) = rows.next()? {
            if let Some(id) = row.get::<_, Option<String>>(0)? {
                ids.insert(id);
            }
        }
        Ok(ids)
    }

    fn query_note_rows(&self) -> Result<Vec<NoteRow>, DbError> {
        match self.query_note_rows_with_encryption_flag() {
            Ok(rows) => Ok(rows),
            Err(rusqlite::Error::SqliteFailure(_, Some(message)))
                if message.contains("no such column") =>
            {
                // Older schema without the password-protection column.
                warn!("event=fetch_notes module=fetch status=fallback reason={message}");
                self.query_note_rows_without_encryption_flag()
                    .map_err(DbError::from)
            }
            Err(rusqlite::Error::SqlInputError { msg: message, .. })
                if message.contains("no such column") =>
            {
                // Older schema without the password-protection column.
                warn!("event=fetch_notes module=fetch status=fallback reason={message}");
                self.query_note_rows_without_encryption_flag()
                    .map_err(DbError::from)
            }
            Err(err) => Err(err.into()),
        }
    }

    fn query_note_rows_with_encryption_flag(&self) -> Result<Vec<NoteRow>, rusqlite::Error> {
        let mut stmt = self.conn.prepare(
            "SELECT Z_PK, ZTITLE1, ZSNIPPET, ZCREATIONDATE1, ZMODIFICATIONDATE1,
                    ZFOLDER, ZNOTEDATA, ZISPASSWORDPROTECTED
             FROM ZICCLOUDSYNCINGOBJECT
             WHERE Z_ENT = ?1
             ORDER BY ZMODIFICATIONDATE1 DESC, Z_PK ASC",
        )?;
        let mut rows = stmt.query(params![self.note_ent])?;
        let mut out = Vec::new();
        while let Some(row) = rows.next()? {
            out.push(NoteRow {
                pk: row.get(0)?,
                title: row.get(1)?,
                snippet: row.get(2)?,
                created: row.get(3)?,
                modified: row.get(4)?,
                folder_pk: row.get(5)?,
                note_data_pk: row.get(6)?,
                encrypted: row.get::<_, Option<i64>>(7)?.unwrap_or(0) != 0,
            });
        }
        Ok(out)
    }

    fn query_note_rows_without_encryption_flag(&self) -> Result<Vec<NoteRow>, rusqlite::Error> {
        let mut stmt = self.conn.prepare(
            "SELECT Z_PK, ZTITLE1, ZSNIPPET, ZCREATIONDATE1, ZMODIFICATIONDATE1,
                    ZFOLDER, ZNOTEDATA
             FROM ZICCLOUDSYNCINGOBJECT
             WHERE Z_ENT = ?1
             ORDER BY ZMODIFICATIONDATE1 DESC, Z_PK ASC",
        )?;
        let mut rows = stmt.query(params![self.note_ent])?;
        let mut out = Vec::new();
        while let Some(row) = rows.next()? {
            out.push(NoteRow {
                pk: row.get(0)?,
                title: row.get(1)?,
                snippet: row.get(2)?,
                created: row.get(3)?,
                modified: row.get(4)?,
                folder_pk: row.get(5)?,
                note_data_pk: row.get(6)?,
                encrypted: false,
            });
        }
        Ok(out)
    }
}

struct NoteRow {
    pk: i64,
    title: Option<String>,
    snippet: Option<String>,
    created: Option<f64>,
    modified: Option<f64>,
    folder_pk: Option<i64>,
    note_data_pk: Option<i64>,
    encrypted: bool,
}
