//! Formatted (ASCII) keyword codec
//!
//! A keyword is written as a header line
//!
//! ```text
//!  'PRES    '           3 'REAL'
//! ```
//!
//! followed by the values, a fixed number per line, using Fortran
//! scientific notation (`0.15000000E+01`, `0.15000000000000D+01`) for
//! floating point values. Lines restart at every block boundary, so the
//! block structure of the unformatted file is kept.

use std::io::{Read, Seek, Write};

use super::codec::ensure_available;
use super::header::name_from_field;
use super::{ElementType, Keyword, KeywordError, KeywordHeader, KeywordResult, NAME_LENGTH};
use crate::record::{RecordError, RecordStream, Token};

/// Split `value` into a mantissa in [0.1, 1) and a decimal exponent
fn scientific(value: f64) -> (f64, i32) {
    if value == 0.0 || !value.is_finite() {
        return (value, 0);
    }
    let mut power = value.abs().log10().ceil() as i32;
    let mut mantissa = value / 10f64.powi(power);
    if mantissa.abs() >= 1.0 {
        mantissa *= 0.1;
        power += 1;
    }
    (mantissa, power)
}

fn format_float(out: &mut Vec<u8>, value: f64, precision: usize, width: usize, marker: char) {
    let (mantissa, power) = scientific(value);
    let _ = write!(out, "  {mantissa:>width$.precision$}{marker}{power:+03}");
}

fn format_value(keyword: &Keyword, index: usize, out: &mut Vec<u8>) -> KeywordResult<()> {
    match keyword.element_type() {
        ElementType::Int32 => {
            let _ = write!(out, " {:>11}", keyword.get::<i32>(index)?);
        }
        ElementType::Real32 => {
            format_float(out, f64::from(keyword.get::<f32>(index)?), 8, 11, 'E');
        }
        ElementType::Real64 => {
            format_float(out, keyword.get::<f64>(index)?, 14, 17, 'D');
        }
        ElementType::Bool32 => {
            let flag = if keyword.get_bool(index)? { 'T' } else { 'F' };
            let _ = write!(out, "  {flag}");
        }
        ElementType::FixedString8 | ElementType::VariableString(_) => {
            keyword.check_index(index)?;
            out.extend_from_slice(b" '");
            out.extend_from_slice(keyword.element_bytes(index));
            out.push(b'\'');
        }
        ElementType::Message => {}
    }
    Ok(())
}

/// Fewest bytes the values of `header` can take up in text form
fn min_text_bytes(header: &KeywordHeader) -> u64 {
    let per_value = if header.element_type.is_string() {
        header.element_type.element_size() + 2
    } else {
        1
    };
    header.count as u64 * per_value as u64
}

pub(super) fn write_header<S: Write + Seek>(
    header: &KeywordHeader,
    stream: &mut RecordStream<S>,
) -> KeywordResult<()> {
    let line = format!(
        " '{:<8}' {:>11} '{}'\n",
        header.name, header.count, header.element_type
    );
    stream.write_text(&line)?;
    Ok(())
}

pub(super) fn write_values<S: Write + Seek>(
    keyword: &Keyword,
    stream: &mut RecordStream<S>,
) -> KeywordResult<()> {
    let element_type = keyword.element_type();
    if element_type == ElementType::Message || keyword.is_empty() {
        return Ok(());
    }

    let columns = element_type.columns();
    let block_size = element_type.block_size();
    let mut text = Vec::new();

    for block_start in (0..keyword.count()).step_by(block_size) {
        let block_end = (block_start + block_size).min(keyword.count());
        let mut column = 0;
        for index in block_start..block_end {
            format_value(keyword, index, &mut text)?;
            column += 1;
            if column == columns {
                text.push(b'\n');
                column = 0;
            }
        }
        if column > 0 {
            text.push(b'\n');
        }
    }

    stream.write_text(&text)?;
    Ok(())
}

pub(super) fn read_header<S: Read + Seek>(
    stream: &mut RecordStream<S>,
) -> KeywordResult<Option<KeywordHeader>> {
    let Some(name) = stream.read_quoted_field(NAME_LENGTH, "keyword name")? else {
        return Ok(None);
    };
    let mut field = [b' '; NAME_LENGTH];
    field.copy_from_slice(&name);
    let name = name_from_field(field)?;

    let count = stream.expect_token("element count")?;
    let count_value: i64 = count.text.parse().map_err(|_| RecordError::InvalidToken {
        offset: count.offset,
        reason: format!("invalid element count {:?}", count.text),
    })?;
    let count_value =
        usize::try_from(count_value).map_err(|_| KeywordError::InvalidCount(count_value))?;

    let tag = stream.expect_quoted_field(4, "type tag")?;
    let mut tag_field = [0u8; 4];
    tag_field.copy_from_slice(&tag);
    let element_type = ElementType::from_tag(tag_field)?;

    KeywordHeader::new(&name, element_type, count_value).map(Some)
}

fn parse_float(token: &Token, element_type: ElementType) -> KeywordResult<f64> {
    token
        .text
        .replace(['D', 'd'], "E")
        .parse()
        .map_err(|_| invalid_value(token, element_type))
}

fn invalid_value(token: &Token, element_type: ElementType) -> KeywordError {
    KeywordError::InvalidValue {
        element_type,
        text: token.text.clone(),
    }
}

pub(super) fn read_values<S: Read + Seek>(
    stream: &mut RecordStream<S>,
    header: KeywordHeader,
) -> KeywordResult<Keyword> {
    let element_type = header.element_type;
    if element_type == ElementType::Message {
        return Ok(Keyword::from_header(header));
    }
    ensure_available(stream, min_text_bytes(&header), "keyword values")?;
    let mut keyword = Keyword::from_header(header);

    if element_type.is_string() {
        let width = element_type.element_size();
        for index in 0..keyword.count() {
            let field = stream.expect_quoted_field(width, "keyword value")?;
            keyword.element_bytes_mut(index).copy_from_slice(&field);
        }
        return Ok(keyword);
    }

    for index in 0..keyword.count() {
        let token = stream.expect_token("keyword value")?;
        match element_type {
            ElementType::Int32 => {
                let value: i32 = token
                    .text
                    .parse()
                    .map_err(|_| invalid_value(&token, element_type))?;
                keyword.set(index, value)?;
            }
            ElementType::Real32 => {
                keyword.set(index, parse_float(&token, element_type)? as f32)?;
            }
            ElementType::Real64 => {
                keyword.set(index, parse_float(&token, element_type)?)?;
            }
            ElementType::Bool32 => {
                let value = match token.text.as_str() {
                    "T" | "t" => true,
                    "F" | "f" => false,
                    _ => return Err(invalid_value(&token, element_type)),
                };
                keyword.set_bool(index, value)?;
            }
            ElementType::FixedString8 | ElementType::VariableString(_) | ElementType::Message => {}
        }
    }

    Ok(keyword)
}

pub(super) fn skip_values<S: Read + Seek>(
    header: &KeywordHeader,
    stream: &mut RecordStream<S>,
) -> KeywordResult<()> {
    let element_type = header.element_type;
    if element_type == ElementType::Message {
        return Ok(());
    }
    for _ in 0..header.count {
        if element_type.is_string() {
            stream.expect_quoted_field(element_type.element_size(), "keyword value")?;
        } else {
            stream.expect_token("keyword value")?;
        }
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Cursor;

    fn to_text(keyword: &Keyword) -> String {
        let mut stream = RecordStream::formatted(Cursor::new(Vec::new()));
        keyword.encode(&mut stream).unwrap();
        String::from_utf8(stream.into_inner().into_inner()).unwrap()
    }

    fn from_text(text: &str) -> Keyword {
        let mut stream = RecordStream::formatted(Cursor::new(text.as_bytes().to_vec()));
        Keyword::decode(&mut stream).unwrap().unwrap()
    }

    #[test]
    fn test_scientific_split() {
        assert_eq!(scientific(0.0), (0.0, 0));
        assert_eq!(scientific(1.5), (0.15, 1));
        assert_eq!(scientific(10.0), (0.1, 2));
        assert_eq!(scientific(-250.0), (-0.25, 3));
    }

    #[test]
    fn test_real_layout() {
        let kw = Keyword::from_values("PRES", &[1.5_f32, 2.0, -0.25]).unwrap();
        assert_eq!(
            to_text(&kw),
            " 'PRES    '           3 'REAL'\n   0.15000000E+01   0.20000000E+01  -0.25000000E+00\n"
        );
    }

    #[test]
    fn test_integer_and_logical_layout() {
        let ints = Keyword::from_values("COUNT", &[42_i32]).unwrap();
        assert_eq!(
            to_text(&ints),
            " 'COUNT   '           1 'INTE'\n          42\n"
        );

        let flags = Keyword::from_bools("FLAGS", &[true, false]).unwrap();
        assert_eq!(
            to_text(&flags),
            " 'FLAGS   '           2 'LOGI'\n  T  F\n"
        );
    }

    #[test]
    fn test_double_layout() {
        let kw = Keyword::from_values("TIME", &[1.5_f64]).unwrap();
        assert_eq!(
            to_text(&kw),
            " 'TIME    '           1 'DOUB'\n   0.15000000000000D+01\n"
        );
    }

    #[test]
    fn test_columns_wrap() {
        let kw = Keyword::from_values("I", &[1_i32, 2, 3, 4, 5, 6, 7]).unwrap();
        let text = to_text(&kw);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[1].split_whitespace().count(), 6);
        assert_eq!(lines[2].trim(), "7");
    }

    #[test]
    fn test_round_trip() {
        let keywords = [
            Keyword::from_values("PRES", &[1.5_f32, -2.0, 0.0]).unwrap(),
            Keyword::from_values("TIME", &[0.25_f64, 1e10]).unwrap(),
            Keyword::from_values("COUNT", &[42_i32, -7]).unwrap(),
            Keyword::from_bools("FLAGS", &[true, false, true]).unwrap(),
            Keyword::from_strings("NAME", &["AAAAAAAA", "B B"]).unwrap(),
            Keyword::from_strings_with_width("WELL", 12, &["INJECTOR 1"]).unwrap(),
            Keyword::message("ENDSOL").unwrap(),
        ];
        for kw in keywords {
            assert_eq!(from_text(&to_text(&kw)), kw);
        }
    }

    #[test]
    fn test_strings_with_quotes_and_blanks() {
        let kw = Keyword::from_strings("WELLS", &["O'NEIL", "B", "'", ""]).unwrap();
        let text = to_text(&kw);
        assert!(text.contains(" 'O'NEIL  ' 'B       ' ''       ' '        '"));
        assert_eq!(from_text(&text), kw);

        let mut stream = RecordStream::formatted(Cursor::new(text.into_bytes()));
        let header = KeywordHeader::read(&mut stream).unwrap().unwrap();
        header.skip_data(&mut stream).unwrap();
        assert_eq!(KeywordHeader::read(&mut stream).unwrap(), None);
    }

    #[test]
    fn test_name_with_quote() {
        let kw = Keyword::from_values("A'B", &[1_i32]).unwrap();
        assert_eq!(from_text(&to_text(&kw)), kw);
    }

    #[test]
    fn test_huge_count_is_truncation() {
        let mut stream = RecordStream::formatted(Cursor::new(
            b" 'HUGE    ' 2147483647 'DOUB'\n  0.1D+01\n".to_vec(),
        ));
        let err = Keyword::decode(&mut stream).unwrap_err();
        assert!(matches!(
            err,
            KeywordError::Record(RecordError::Truncated {
                context: "keyword values",
                ..
            })
        ));
    }

    #[test]
    fn test_fortran_double_exponent() {
        let kw = from_text(" 'X       '           2 'DOUB'\n  0.5D+01  -0.1d-01\n");
        assert_eq!(kw.values::<f64>().unwrap(), vec![5.0, -0.01]);
    }

    #[test]
    fn test_invalid_values() {
        let mut stream = RecordStream::formatted(Cursor::new(
            b" 'X       '           1 'LOGI'\n  Q\n".to_vec(),
        ));
        assert!(matches!(
            Keyword::decode(&mut stream),
            Err(KeywordError::InvalidValue { .. })
        ));

        let mut stream = RecordStream::formatted(Cursor::new(
            b" 'X       '           2 'INTE'\n  1\n".to_vec(),
        ));
        assert!(matches!(
            Keyword::decode(&mut stream),
            Err(KeywordError::Record(RecordError::Truncated { .. }))
        ));

        let mut stream = RecordStream::formatted(Cursor::new(b" X 1 'INTE'\n".to_vec()));
        assert!(matches!(
            Keyword::decode(&mut stream),
            Err(KeywordError::Record(RecordError::InvalidToken { .. }))
        ));
    }
}
