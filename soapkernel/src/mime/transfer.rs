//! Content-Transfer-Encoding handling for MIME parts

use crate::error::Result;
use base64::Engine;

const LINE_LENGTH: usize = 76;

/// Encodes part content for the wire
///
/// `binary`, `8bit`, `7bit` and unknown encodings are sent unchanged.
pub fn encode(content: &[u8], encoding: &str) -> Vec<u8> {
    match encoding.trim().to_ascii_lowercase().as_str() {
        "base64" => encode_base64(content),
        "quoted-printable" => encode_quoted_printable(content),
        _ => content.to_vec(),
    }
}

/// Decodes part content received from the wire
pub fn decode(content: &[u8], encoding: &str) -> Result<Vec<u8>> {
    match encoding.trim().to_ascii_lowercase().as_str() {
        "base64" => {
            let compact: Vec<u8> = content
                .iter()
                .copied()
                .filter(|b| !b.is_ascii_whitespace())
                .collect();
            Ok(base64::engine::general_purpose::STANDARD.decode(compact)?)
        }
        "quoted-printable" => Ok(decode_quoted_printable(content)),
        _ => Ok(content.to_vec()),
    }
}

fn encode_base64(content: &[u8]) -> Vec<u8> {
    let encoded = base64::engine::general_purpose::STANDARD.encode(content);
    let mut out = Vec::with_capacity(encoded.len() + encoded.len() / LINE_LENGTH * 2);
    for (i, chunk) in encoded.as_bytes().chunks(LINE_LENGTH).enumerate() {
        if i > 0 {
            out.extend_from_slice(b"\r\n");
        }
        out.extend_from_slice(chunk);
    }
    out
}

fn encode_quoted_printable(content: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(content.len());
    let mut line_len = 0;

    for (i, &byte) in content.iter().enumerate() {
        if byte == b'\n' {
            out.extend_from_slice(b"\r\n");
            line_len = 0;
            continue;
        }
        if byte == b'\r' {
            continue;
        }

        // Un espace en fin de ligne serait supprimé par le décodeur
        let line_end = matches!(&content[i + 1..], [] | [b'\n', ..] | [b'\r', b'\n', ..]);
        let literal = (33..=126).contains(&byte) && byte != b'=' || byte == b' ' && !line_end;
        let width = if literal { 1 } else { 3 };
        // Soft line break, '=' compris
        if line_len + width > LINE_LENGTH - 1 {
            out.extend_from_slice(b"=\r\n");
            line_len = 0;
        }
        if literal {
            out.push(byte);
        } else {
            out.extend_from_slice(format!("={:02X}", byte).as_bytes());
        }
        line_len += width;
    }
    out
}

fn decode_quoted_printable(content: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(content.len());
    let mut i = 0;

    while i < content.len() {
        if content[i] != b'=' {
            out.push(content[i]);
            i += 1;
            continue;
        }

        match content.get(i + 1..i + 3) {
            Some(b"\r\n") => i += 3,
            Some([b'\n', _]) => i += 2,
            Some([hi, lo]) => match (hex_value(*hi), hex_value(*lo)) {
                (Some(h), Some(l)) => {
                    out.push(h << 4 | l);
                    i += 3;
                }
                _ => {
                    out.push(b'=');
                    i += 1;
                }
            },
            _ => {
                // '=' final ou suivi d'un seul octet
                if content.get(i + 1) != Some(&b'\n') {
                    out.extend_from_slice(&content[i..]);
                }
                break;
            }
        }
    }
    out
}

fn hex_value(byte: u8) -> Option<u8> {
    (byte as char).to_digit(16).map(|d| d as u8)
}
