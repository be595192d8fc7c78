// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// PDF object serialization for incremental updates.
//
// `lopdf` can only save whole documents, which would rewrite the original
// bytes. The stamper instead appends a handful of objects after the
// original `%%EOF`, so it serializes those objects itself. Output must be
// byte-for-byte reproducible: dictionary entries are written in insertion
// order and numbers use a fixed formatting.

use std::io::Write;

use lopdf::{Dictionary, Object, ObjectId, Stream, StringFormat};

/// Serialize a complete indirect object (`N G obj ... endobj`).
pub fn write_indirect(out: &mut Vec<u8>, id: ObjectId, object: &Object) {
    // Writing into a Vec cannot fail.
    let _ = writeln!(out, "{} {} obj", id.0, id.1);
    write_object(out, object);
    out.extend_from_slice(b"\nendobj\n");
}

/// Serialize a direct object.
pub fn write_object(out: &mut Vec<u8>, object: &Object) {
    match object {
        Object::Null => out.extend_from_slice(b"null"),
        Object::Boolean(b) => out.extend_from_slice(if *b { b"true" } else { b"false" }),
        Object::Integer(i) => {
            let _ = write!(out, "{i}");
        }
        Object::Real(r) => write_real(out, f64::from(*r)),
        Object::Name(name) => write_name(out, name),
        Object::String(bytes, StringFormat::Literal) => write_literal_string(out, bytes),
        Object::String(bytes, StringFormat::Hexadecimal) => write_hex_string(out, bytes),
        Object::Array(items) => {
            out.push(b'[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(b' ');
                }
                write_object(out, item);
            }
            out.push(b']');
        }
        Object::Dictionary(dict) => write_dictionary(out, dict, None),
        Object::Stream(stream) => write_stream(out, stream),
        Object::Reference((num, generation)) => {
            let _ = write!(out, "{num} {generation} R");
        }
    }
}

fn write_dictionary(out: &mut Vec<u8>, dict: &Dictionary, length: Option<usize>) {
    out.extend_from_slice(b"<<");
    for (key, value) in dict.iter() {
        if length.is_some() && key.as_slice() == b"Length" {
            continue;
        }
        out.push(b' ');
        write_name(out, key);
        out.push(b' ');
        write_object(out, value);
    }
    if let Some(len) = length {
        let _ = write!(out, " /Length {len}");
    }
    out.extend_from_slice(b" >>");
}

/// Streams are written unfiltered with a direct `/Length`.
fn write_stream(out: &mut Vec<u8>, stream: &Stream) {
    write_dictionary(out, &stream.dict, Some(stream.content.len()));
    out.extend_from_slice(b"\nstream\n");
    out.extend_from_slice(&stream.content);
    out.extend_from_slice(b"\nendstream");
}

fn write_real(out: &mut Vec<u8>, value: f64) {
    out.extend_from_slice(format_real(value).as_bytes());
}

/// PDF number syntax: no exponent, no trailing zeros, at most six decimals.
pub fn format_real(value: f64) -> String {
    let value = if value.is_finite() { value } else { 0.0 };
    let rendered = format!("{value:.6}");
    let trimmed = rendered.trim_end_matches('0').trim_end_matches('.');
    match trimmed {
        "" | "-" | "-0" => "0".to_owned(),
        other => other.to_owned(),
    }
}

fn write_name(out: &mut Vec<u8>, name: &[u8]) {
    out.push(b'/');
    for &b in name {
        if is_regular_name_char(b) {
            out.push(b);
        } else {
            let _ = write!(out, "#{b:02X}");
        }
    }
}

fn is_regular_name_char(b: u8) -> bool {
    (0x21..=0x7e).contains(&b) && !b"()<>[]{}/%#".contains(&b)
}

fn write_literal_string(out: &mut Vec<u8>, bytes: &[u8]) {
    out.push(b'(');
    for &b in bytes {
        match b {
            b'(' | b')' | b'\\' => {
                out.push(b'\\');
                out.push(b);
            }
            b'\r' => out.extend_from_slice(b"\\r"),
            b'\n' => out.extend_from_slice(b"\\n"),
            _ => out.push(b),
        }
    }
    out.push(b')');
}

fn write_hex_string(out: &mut Vec<u8>, bytes: &[u8]) {
    out.push(b'<');
    for b in bytes {
        let _ = write!(out, "{b:02X}");
    }
    out.push(b'>');
}

#[cfg(test)]
mod tests {
    use super::*;

    fn render(object: &Object) -> String {
        let mut out = Vec::new();
        write_object(&mut out, object);
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn scalars() {
        assert_eq!(render(&Object::Null), "null");
        assert_eq!(render(&Object::Boolean(true)), "true");
        assert_eq!(render(&Object::Integer(-42)), "-42");
        assert_eq!(render(&Object::Real(0.5)), "0.5");
        assert_eq!(render(&Object::Real(612.0)), "612");
        assert_eq!(render(&Object::Reference((7, 0))), "7 0 R");
    }

    #[test]
    fn reals_have_no_exponent_or_trailing_zeros() {
        assert_eq!(format_real(522.0), "522");
        assert_eq!(format_real(18.25), "18.25");
        assert_eq!(format_real(-0.0), "0");
        assert_eq!(format_real(1e-9), "0");
        assert_eq!(format_real(f64::NAN), "0");
    }

    #[test]
    fn names_escape_delimiters_and_whitespace() {
        assert_eq!(render(&Object::Name(b"CertiTrustQR".to_vec())), "/CertiTrustQR");
        assert_eq!(render(&Object::Name(b"A B#(".to_vec())), "/A#20B#23#28");
    }

    #[test]
    fn strings_escape_parentheses() {
        let literal = Object::String(b"a(b)\\c\n".to_vec(), StringFormat::Literal);
        assert_eq!(render(&literal), r"(a\(b\)\\c\n)");
        let hex = Object::String(vec![0x00, 0xab], StringFormat::Hexadecimal);
        assert_eq!(render(&hex), "<00AB>");
    }

    #[test]
    fn dictionary_keeps_insertion_order() {
        let mut dict = Dictionary::new();
        dict.set("Type", Object::Name(b"Page".to_vec()));
        dict.set("MediaBox", Object::Array(vec![
            Object::Integer(0),
            Object::Integer(0),
            Object::Integer(612),
            Object::Integer(792),
        ]));
        dict.set("Parent", Object::Reference((2, 0)));
        assert_eq!(
            render(&Object::Dictionary(dict)),
            "<< /Type /Page /MediaBox [0 0 612 792] /Parent 2 0 R >>"
        );
    }

    #[test]
    fn stream_length_is_recomputed() {
        let mut dict = Dictionary::new();
        dict.set("Length", Object::Integer(999));
        let stream = Stream::new(dict, b"q\n".to_vec());

        let mut out = Vec::new();
        write_indirect(&mut out, (12, 0), &Object::Stream(stream));
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "12 0 obj\n<< /Length 2 >>\nstream\nq\n\nendstream\nendobj\n"
        );
    }
}
