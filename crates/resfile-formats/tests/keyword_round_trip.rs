#![allow(clippy::expect_used, clippy::unwrap_used, clippy::panic)]
//! Integration tests for keyword files
//!
//! Writes small restart-like files in both variants and reads them back the
//! way a container scan does: header first, payload decoded or skipped.

use binrw::Endian;
use resfile_formats::keyword::{ElementType, Keyword, KeywordError, KeywordHeader};
use resfile_formats::record::{OpenMode, RecordStream, looks_like_formatted};
use std::fs;

fn restart_keywords() -> Vec<Keyword> {
    let mut intehead = Keyword::new("INTEHEAD", ElementType::Int32, 95).unwrap();
    intehead.set(64, 2024_i32).unwrap();
    vec![
        Keyword::from_values("SEQNUM", &[3_i32]).unwrap(),
        intehead,
        Keyword::from_bools("LOGIHEAD", &[true, false, true]).unwrap(),
        Keyword::from_values("DOUBHEAD", &[0.0_f64, 31.5]).unwrap(),
        Keyword::message("STARTSOL").unwrap(),
        Keyword::from_values("PRESSURE", &vec![250.0_f32; 2345]).unwrap(),
        Keyword::from_values("SWAT", &vec![0.2_f32; 2345]).unwrap(),
        Keyword::message("ENDSOL").unwrap(),
        Keyword::from_strings_with_width("ZWEL", 20, &["PROD-1", "INJ-1"]).unwrap(),
    ]
}

fn read_all(path: &std::path::Path, formatted: bool) -> Vec<Keyword> {
    let mut stream = RecordStream::open_with_endian(path, OpenMode::Read, Endian::Big)
        .unwrap()
        .with_formatted(formatted);
    let mut keywords = Vec::new();
    while let Some(kw) = Keyword::decode(&mut stream).unwrap() {
        keywords.push(kw);
    }
    keywords
}

#[test]
fn test_unformatted_file_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("CASE.X0003");
    let keywords = restart_keywords();

    let mut stream = RecordStream::open_with_endian(&path, OpenMode::Write, Endian::Big).unwrap();
    for kw in &keywords {
        kw.encode(&mut stream).unwrap();
    }
    drop(stream);

    let expected_len: u64 = keywords.iter().map(|k| k.header().encoded_len()).sum();
    assert_eq!(fs::metadata(&path).unwrap().len(), expected_len);
    assert_eq!(read_all(&path, false), keywords);
}

#[test]
fn test_formatted_file_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("CASE.F0003");
    let keywords = restart_keywords();

    let mut stream = RecordStream::open(&path, OpenMode::Write, false)
        .unwrap()
        .with_formatted(true);
    for kw in &keywords {
        kw.encode(&mut stream).unwrap();
    }
    drop(stream);

    let mut file = fs::File::open(&path).unwrap();
    assert!(looks_like_formatted(&mut file).unwrap());
    assert_eq!(read_all(&path, true), keywords);
}

#[test]
fn test_header_scan_skips_payloads() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("CASE.UNRST");
    let keywords = restart_keywords();

    let mut stream = RecordStream::open(&path, OpenMode::Write, false).unwrap();
    for kw in &keywords {
        kw.encode(&mut stream).unwrap();
    }
    drop(stream);

    let mut stream = RecordStream::open(&path, OpenMode::Read, false).unwrap();
    let mut offsets = Vec::new();
    loop {
        let offset = stream.position().unwrap();
        let Some(header) = KeywordHeader::read(&mut stream).unwrap() else {
            break;
        };
        header.skip_data(&mut stream).unwrap();
        offsets.push((header, offset));
    }

    assert_eq!(offsets.len(), keywords.len());
    let mut expected_offset = 0;
    for ((header, offset), kw) in offsets.iter().zip(&keywords) {
        assert_eq!(header, &kw.header());
        assert_eq!(*offset, expected_offset);
        expected_offset += kw.header().encoded_len();
    }
}

#[test]
fn test_unknown_type_tag_is_rejected() {
    let kw = Keyword::from_values("BAD", &[1_i32]).unwrap();
    let mut bytes = kw.to_bytes(Endian::Big).unwrap();
    bytes[16..20].copy_from_slice(b"QQQQ");

    let err = Keyword::from_bytes(&bytes, Endian::Big).unwrap_err();
    assert!(matches!(err, KeywordError::UnknownType(ref tag) if tag == "QQQQ"));
    assert!(err.is_corruption());
}
