mod common;

use common::{build_blob, encode_document, gzip, RunSpec};
use noteport_core::model::{AnnotationKind, NoteMeta};
use noteport_core::{decode, render_plaintext, DecodeError, WireLayout};
use std::collections::HashSet;

fn no_ids() -> HashSet<String> {
    HashSet::new()
}

fn meta(pk: i64) -> NoteMeta {
    NoteMeta {
        pk,
        title: None,
        snippet: None,
        created: None,
        modified: None,
        folder_pk: None,
        account_uuid: None,
    }
}

#[test]
fn hello_world_roundtrips_through_plaintext() {
    let blob = build_blob("Hello world", &[RunSpec::plain(11)]);
    let decoded = decode(&blob, &no_ids(), &WireLayout::default()).unwrap();
    assert_eq!(decoded.body, "Hello world");
    assert!(decoded.annotations.is_empty());

    let block = render_plaintext(&decoded, &meta(1));
    assert!(block.contains("Content:\nHello world\n"));
    assert!(block.starts_with("--- NOTE START ---\n"));
    assert!(block.ends_with("--- NOTE END ---\n\n"));
}

#[test]
fn decoding_is_deterministic() {
    let blob = build_blob(
        "styled text here",
        &[
            RunSpec {
                length: 6,
                font_weight: Some(1),
                ..RunSpec::default()
            },
            RunSpec::plain(10),
        ],
    );
    let layout = WireLayout::default();
    let first = decode(&blob, &no_ids(), &layout).unwrap();
    let second = decode(&blob, &no_ids(), &layout).unwrap();
    assert_eq!(first, second);
}

#[test]
fn style_bits_become_annotations() {
    let blob = build_blob(
        "bolditalic",
        &[RunSpec {
            length: 10,
            font_weight: Some(3),
            underlined: true,
            strikethrough: true,
            ..RunSpec::default()
        }],
    );
    let decoded = decode(&blob, &no_ids(), &WireLayout::default()).unwrap();
    let kinds: Vec<&AnnotationKind> = decoded.annotations.iter().map(|a| &a.kind).collect();
    assert!(kinds.contains(&&AnnotationKind::Bold));
    assert!(kinds.contains(&&AnnotationKind::Italic));
    assert!(kinds.contains(&&AnnotationKind::Underline));
    assert!(kinds.contains(&&AnnotationKind::Strikethrough));
    for annotation in &decoded.annotations {
        assert_eq!((annotation.start, annotation.end), (0, 10));
    }
}

#[test]
fn monospace_style_type_is_detected() {
    let blob = build_blob(
        "let x = 1;",
        &[RunSpec {
            length: 10,
            style_type: Some(4),
            ..RunSpec::default()
        }],
    );
    let decoded = decode(&blob, &no_ids(), &WireLayout::default()).unwrap();
    assert_eq!(decoded.annotations.len(), 1);
    assert_eq!(decoded.annotations[0].kind, AnnotationKind::Monospace);
}

#[test]
fn link_runs_carry_the_url() {
    let blob = build_blob(
        "click here",
        &[
            RunSpec::plain(6),
            RunSpec {
                length: 4,
                link: Some("https://example.com"),
                ..RunSpec::default()
            },
        ],
    );
    let decoded = decode(&blob, &no_ids(), &WireLayout::default()).unwrap();
    assert_eq!(decoded.annotations.len(), 1);
    assert_eq!(
        decoded.annotations[0].kind,
        AnnotationKind::Link("https://example.com".to_string())
    );
    assert_eq!((decoded.annotations[0].start, decoded.annotations[0].end), (6, 10));
}

#[test]
fn unknown_attachment_identifier_is_still_recorded() {
    let blob = build_blob(
        "a\u{fffc}b",
        &[
            RunSpec::plain(1),
            RunSpec {
                length: 1,
                attachment: Some(("GHOST-1", "public.jpeg")),
                ..RunSpec::default()
            },
            RunSpec::plain(1),
        ],
    );
    let decoded = decode(&blob, &no_ids(), &WireLayout::default()).unwrap();
    assert_eq!(decoded.annotations.len(), 1);
    match &decoded.annotations[0].kind {
        AnnotationKind::Attachment {
            identifier,
            in_database,
            ..
        } => {
            assert_eq!(identifier, "GHOST-1");
            assert!(!in_database);
        }
        other => panic!("unexpected annotation: {other:?}"),
    }
}

#[test]
fn known_attachment_identifier_is_flagged() {
    let mut known = HashSet::new();
    known.insert("ATT-1".to_string());
    let blob = build_blob(
        "\u{fffc}",
        &[RunSpec {
            length: 1,
            attachment: Some(("ATT-1", "public.png")),
            ..RunSpec::default()
        }],
    );
    let decoded = decode(&blob, &known, &WireLayout::default()).unwrap();
    match &decoded.annotations[0].kind {
        AnnotationKind::Attachment { in_database, .. } => assert!(in_database),
        other => panic!("unexpected annotation: {other:?}"),
    }
}

#[test]
fn empty_body_is_not_an_error() {
    let blob = build_blob("", &[]);
    let decoded = decode(&blob, &no_ids(), &WireLayout::default()).unwrap();
    assert!(decoded.body.is_empty());
    assert!(decoded.annotations.is_empty());
}

#[test]
fn garbage_bytes_are_a_corrupt_blob() {
    let result = decode(b"not compressed at all", &no_ids(), &WireLayout::default());
    assert!(matches!(result, Err(DecodeError::CorruptBlob(_))));
}

#[test]
fn truncated_compressed_stream_is_a_corrupt_blob() {
    let mut blob = build_blob("some text", &[RunSpec::plain(9)]);
    blob.truncate(blob.len() / 2);
    let result = decode(&blob, &no_ids(), &WireLayout::default());
    assert!(matches!(result, Err(DecodeError::CorruptBlob(_))));
}

#[test]
fn missing_document_message_is_a_corrupt_blob() {
    // Valid gzip around a message that has no document field.
    let mut root = Vec::new();
    common::field_varint(&mut root, 7, 99);
    let blob = gzip(&root);
    let result = decode(&blob, &no_ids(), &WireLayout::default());
    assert!(matches!(result, Err(DecodeError::CorruptBlob(_))));
}

#[test]
fn run_length_overrun_is_clamped_not_fatal() {
    let blob = build_blob("short", &[RunSpec::plain(500)]);
    let decoded = decode(&blob, &no_ids(), &WireLayout::default()).unwrap();
    assert_eq!(decoded.body, "short");
}

#[test]
fn text_not_covered_by_runs_is_kept() {
    let blob = build_blob("covered tail", &[RunSpec::plain(7)]);
    let decoded = decode(&blob, &no_ids(), &WireLayout::default()).unwrap();
    assert_eq!(decoded.body, "covered tail");
}

#[test]
fn unknown_fields_are_ignored() {
    // Hand-build a note with extra fields sprinkled at every level.
    let mut note = Vec::new();
    common::field_varint(&mut note, 99, 1);
    common::field_bytes(&mut note, 2, "drifted".as_bytes());
    let mut run = Vec::new();
    common::field_varint(&mut run, 1, 7);
    common::field_varint(&mut run, 42, 1234);
    common::field_bytes(&mut note, 5, &run);
    let mut document = Vec::new();
    common::field_varint(&mut document, 11, 5);
    common::field_bytes(&mut document, 3, &note);
    let mut root = Vec::new();
    common::field_bytes(&mut root, 2, &document);

    let decoded = decode(&gzip(&root), &no_ids(), &WireLayout::default()).unwrap();
    assert_eq!(decoded.body, "drifted");
}

#[test]
fn layout_override_moves_field_numbers() {
    let layout: WireLayout =
        serde_json::from_str(r#"{"document": {"note_text": 4}}"#).unwrap();
    let mut note = Vec::new();
    common::field_bytes(&mut note, 4, "moved".as_bytes());
    let mut document = Vec::new();
    common::field_bytes(&mut document, 3, &note);
    let mut root = Vec::new();
    common::field_bytes(&mut root, 2, &document);

    let decoded = decode(&gzip(&root), &no_ids(), &layout).unwrap();
    assert_eq!(decoded.body, "moved");

    let decoded_default = decode(&gzip(&root), &no_ids(), &WireLayout::default()).unwrap();
    assert_eq!(decoded_default.body, "");
}

#[test]
fn encode_helper_is_parseable() {
    // Sanity check on the fixture encoder itself.
    let bytes = encode_document("x", &[RunSpec::plain(1)]);
    assert!(!bytes.is_empty());
}
