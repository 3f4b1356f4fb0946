//! Test utilities shared by the keyword and record test modules

use crate::keyword::Keyword;
use crate::record::RecordStream;
use binrw::Endian;
use std::io::Cursor;

/// The three-keyword container used throughout the tests:
/// `COUNT` (INTE), `PRES` (REAL) and `NAME` (CHAR)
pub fn sample_keywords() -> Vec<Keyword> {
    vec![
        Keyword::from_values("COUNT", &[42_i32]).unwrap(),
        Keyword::from_values("PRES", &[1.0_f32, 2.0, 3.0]).unwrap(),
        Keyword::from_strings("NAME", &["AAAAAAAA", "BBBBBBBB"]).unwrap(),
    ]
}

/// In-memory record stream holding `keywords`, positioned at the start
pub fn stream_with(keywords: &[Keyword], endian: Endian) -> RecordStream<Cursor<Vec<u8>>> {
    let mut stream = RecordStream::new(Cursor::new(Vec::new()), endian);
    for keyword in keywords {
        keyword.encode(&mut stream).unwrap();
    }
    stream.rewind().unwrap();
    stream
}
