//! Shared fixtures: synthetic note blobs and a NoteStore-shaped database.
#![allow(dead_code)]

use flate2::write::GzEncoder;
use flate2::Compression;
use rusqlite::{params, Connection};
use std::io::Write;
use std::path::Path;

// --- wire format encoding -------------------------------------------------

pub fn varint(out: &mut Vec<u8>, mut value: u64) {
    loop {
        let byte = (value & 0x7f) as u8;
        value >>= 7;
        if value == 0 {
            out.push(byte);
            break;
        }
        out.push(byte | 0x80);
    }
}

pub fn field_varint(out: &mut Vec<u8>, field: u32, value: u64) {
    varint(out, u64::from(field) << 3);
    varint(out, value);
}

pub fn field_bytes(out: &mut Vec<u8>, field: u32, bytes: &[u8]) {
    varint(out, (u64::from(field) << 3) | 2);
    varint(out, bytes.len() as u64);
    out.extend_from_slice(bytes);
}

/// One attribute run for blob construction.
#[derive(Default)]
pub struct RunSpec {
    pub length: u64,
    pub font_weight: Option<u64>,
    pub underlined: bool,
    pub strikethrough: bool,
    pub style_type: Option<u64>,
    pub link: Option<&'static str>,
    /// (identifier, type UTI)
    pub attachment: Option<(&'static str, &'static str)>,
}

impl RunSpec {
    pub fn plain(length: u64) -> Self {
        Self {
            length,
            ..Self::default()
        }
    }
}

fn encode_run(spec: &RunSpec) -> Vec<u8> {
    let mut run = Vec::new();
    field_varint(&mut run, 1, spec.length);
    if let Some(style_type) = spec.style_type {
        let mut style = Vec::new();
        field_varint(&mut style, 1, style_type);
        field_bytes(&mut run, 2, &style);
    }
    if let Some(weight) = spec.font_weight {
        field_varint(&mut run, 5, weight);
    }
    if spec.underlined {
        field_varint(&mut run, 6, 1);
    }
    if spec.strikethrough {
        field_varint(&mut run, 7, 1);
    }
    if let Some(url) = spec.link {
        field_bytes(&mut run, 9, url.as_bytes());
    }
    if let Some((identifier, uti)) = spec.attachment {
        let mut info = Vec::new();
        field_bytes(&mut info, 1, identifier.as_bytes());
        field_bytes(&mut info, 2, uti.as_bytes());
        field_bytes(&mut run, 12, &info);
    }
    run
}

/// Builds an uncompressed root message for the given text and runs.
pub fn encode_document(text: &str, runs: &[RunSpec]) -> Vec<u8> {
    let mut note = Vec::new();
    field_bytes(&mut note, 2, text.as_bytes());
    for spec in runs {
        field_bytes(&mut note, 5, &encode_run(spec));
    }
    let mut document = Vec::new();
    field_bytes(&mut document, 3, &note);
    let mut root = Vec::new();
    field_bytes(&mut root, 2, &document);
    root
}

pub fn gzip(bytes: &[u8]) -> Vec<u8> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(bytes).unwrap();
    encoder.finish().unwrap()
}

/// Compressed blob for the given text and runs.
pub fn build_blob(text: &str, runs: &[RunSpec]) -> Vec<u8> {
    gzip(&encode_document(text, runs))
}

// --- fixture database -----------------------------------------------------

/// Entity ids written into the fixture's metadata table.
pub const ENT_NOTE: i64 = 10;
pub const ENT_FOLDER: i64 = 5;
pub const ENT_ATTACHMENT: i64 = 7;
pub const ENT_MEDIA: i64 = 8;
pub const ENT_ACCOUNT: i64 = 1;

/// Creates an empty NoteStore-shaped database at `path`.
pub fn create_fixture_db(path: &Path) -> Connection {
    let conn = Connection::open(path).unwrap();
    conn.execute_batch(
        "CREATE TABLE Z_PRIMARYKEY (Z_NAME TEXT, Z_ENT INTEGER);
         CREATE TABLE ZICCLOUDSYNCINGOBJECT (
             Z_PK INTEGER PRIMARY KEY,
             Z_ENT INTEGER,
             ZTITLE1 TEXT,
             ZSNIPPET TEXT,
             ZCREATIONDATE1 REAL,
             ZMODIFICATIONDATE1 REAL,
             ZFOLDER INTEGER,
             ZNOTEDATA INTEGER,
             ZISPASSWORDPROTECTED INTEGER,
             ZOWNER INTEGER,
             ZPARENT INTEGER,
             ZFOLDERTYPE INTEGER,
             ZIDENTIFIER TEXT,
             ZTYPEUTI TEXT,
             ZMEDIA INTEGER,
             ZNOTE INTEGER,
             ZFILENAME TEXT,
             ZGENERATION1 TEXT,
             ZFALLBACKIMAGEGENERATION TEXT,
             ZFALLBACKPDFGENERATION TEXT,
             ZSIZEWIDTH INTEGER,
             ZSIZEHEIGHT INTEGER
         );
         CREATE TABLE ZICNOTEDATA (Z_PK INTEGER PRIMARY KEY, ZDATA BLOB);
         INSERT INTO Z_PRIMARYKEY VALUES
             ('ICNote', 10), ('ICFolder', 5), ('ICAttachment', 7),
             ('ICMedia', 8), ('ICAccount', 1);",
    )
    .unwrap();
    conn
}

pub fn insert_account(conn: &Connection, pk: i64, uuid: &str) {
    conn.execute(
        "INSERT INTO ZICCLOUDSYNCINGOBJECT (Z_PK, Z_ENT, ZIDENTIFIER) VALUES (?1, ?2, ?3)",
        params![pk, ENT_ACCOUNT, uuid],
    )
    .unwrap();
}

pub fn insert_folder(conn: &Connection, pk: i64, owner_pk: Option<i64>, folder_type: i64) {
    conn.execute(
        "INSERT INTO ZICCLOUDSYNCINGOBJECT (Z_PK, Z_ENT, ZOWNER, ZFOLDERTYPE)
         VALUES (?1, ?2, ?3, ?4)",
        params![pk, ENT_FOLDER, owner_pk, folder_type],
    )
    .unwrap();
}

#[allow(clippy::too_many_arguments)]
pub fn insert_note(
    conn: &Connection,
    pk: i64,
    title: Option<&str>,
    folder_pk: i64,
    modified: f64,
    blob: &[u8],
    encrypted: bool,
) {
    let data_pk = pk + 1000;
    conn.execute(
        "INSERT INTO ZICNOTEDATA (Z_PK, ZDATA) VALUES (?1, ?2)",
        params![data_pk, blob],
    )
    .unwrap();
    conn.execute(
        "INSERT INTO ZICCLOUDSYNCINGOBJECT
             (Z_PK, Z_ENT, ZTITLE1, ZFOLDER, ZNOTEDATA, ZMODIFICATIONDATE1,
              ZCREATIONDATE1, ZISPASSWORDPROTECTED)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            pk,
            ENT_NOTE,
            title,
            folder_pk,
            data_pk,
            modified,
            modified - 100.0,
            encrypted as i64
        ],
    )
    .unwrap();
}

pub fn insert_attachment_with_media(
    conn: &Connection,
    attachment_pk: i64,
    identifier: &str,
    note_pk: i64,
    type_uti: &str,
    media_pk: i64,
    media_id: &str,
    filename: &str,
    generation: Option<&str>,
) {
    conn.execute(
        "INSERT INTO ZICCLOUDSYNCINGOBJECT
             (Z_PK, Z_ENT, ZIDENTIFIER, ZNOTE, ZTYPEUTI, ZMEDIA)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![attachment_pk, ENT_ATTACHMENT, identifier, note_pk, type_uti, media_pk],
    )
    .unwrap();
    conn.execute(
        "INSERT INTO ZICCLOUDSYNCINGOBJECT
             (Z_PK, Z_ENT, ZIDENTIFIER, ZFILENAME, ZGENERATION1)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![media_pk, ENT_MEDIA, media_id, filename, generation],
    )
    .unwrap();
}
