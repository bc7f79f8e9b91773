/// Text decoding and detection of Visual Studio coverage XML files.
///
/// Visual Studio writes `.coveragexml` files as UTF-16LE with a byte order
/// mark, but files re-saved by other tools are often UTF-8. Strategy:
///   1. Honour a BOM (UTF-8, UTF-16LE, UTF-16BE)
///   2. Without a BOM, a zero in the second byte means UTF-16LE text
///   3. Otherwise the bytes must be valid UTF-8
use std::borrow::Cow;
use std::path::Path;

use encoding_rs::{Encoding, UTF_16LE, UTF_8};

use crate::error::{CoverageError, Result};

/// Root element of a coverage document.
pub const ROOT_ELEMENT: &str = "CoverageDSPriv";

/// Default namespace of a coverage document.
pub const COVERAGE_NAMESPACE: &str = "urn:Coverage";

/// Decode raw file bytes to text. Malformed input is an invalid-format error.
pub fn decode(bytes: &[u8]) -> Result<Cow<'_, str>> {
    let (encoding, bom_len) = sniff(bytes);

    encoding
        .decode_without_bom_handling_and_without_replacement(&bytes[bom_len..])
        .ok_or_else(|| {
            CoverageError::invalid(format!("content is not valid {}", encoding.name()))
        })
}

/// Encoding and BOM length, following the strategy above.
fn sniff(bytes: &[u8]) -> (&'static Encoding, usize) {
    match Encoding::for_bom(bytes) {
        Some(found) => found,
        None if bytes.len() >= 2 && bytes[0] != 0 && bytes[1] == 0 => (UTF_16LE, 0),
        None => (UTF_8, 0),
    }
}

/// Encode text the way Visual Studio does: UTF-16LE preceded by a BOM.
pub fn encode_utf16le(text: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(2 + text.len() * 2);
    out.extend_from_slice(&[0xFF, 0xFE]);
    for unit in text.encode_utf16() {
        out.extend_from_slice(&unit.to_le_bytes());
    }
    out
}

/// Whether `path` looks like a coverage XML file, by extension first and
/// then by its root element.
pub fn is_coverage_file(path: &Path, content: &[u8]) -> bool {
    detect_by_extension(path) || detect_by_content(content)
}

fn detect_by_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("coveragexml"))
        .unwrap_or(false)
}

fn detect_by_content(content: &[u8]) -> bool {
    // The root element sits near the top; a few KB is enough.
    let head = &content[..content.len().min(4096)];
    let (encoding, bom_len) = sniff(head);

    // Not the last chunk, so a character cut by the window is held back
    // instead of being an error.
    let mut decoder = encoding.new_decoder_without_bom_handling();
    let capacity = decoder
        .max_utf8_buffer_length(head.len())
        .unwrap_or(head.len() * 3);
    let mut text = String::with_capacity(capacity);
    let _ = decoder.decode_to_string(&head[bom_len..], &mut text, false);

    text.contains(&format!("<{}", ROOT_ELEMENT))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_utf8_without_bom() {
        assert_eq!(decode(b"<CoverageDSPriv/>").unwrap(), "<CoverageDSPriv/>");
    }

    #[test]
    fn test_decode_utf8_bom() {
        assert_eq!(decode(b"\xEF\xBB\xBF<a/>").unwrap(), "<a/>");
    }

    #[test]
    fn test_decode_utf16le_roundtrip() {
        let bytes = encode_utf16le("<a>é</a>");
        assert_eq!(&bytes[..2], &[0xFF, 0xFE]);
        assert_eq!(decode(&bytes).unwrap(), "<a>é</a>");
    }

    #[test]
    fn test_decode_utf16le_without_bom() {
        let bytes: Vec<u8> = "<a/>"
            .encode_utf16()
            .flat_map(|u| u.to_le_bytes())
            .collect();
        assert_eq!(decode(&bytes).unwrap(), "<a/>");
    }

    #[test]
    fn test_decode_invalid_utf8() {
        let err = decode(b"<a>\xFF\xFE\xFD</a>").unwrap_err();
        assert!(matches!(err, CoverageError::InvalidCoverageFile { .. }));
    }

    #[test]
    fn test_detect_by_extension() {
        assert!(is_coverage_file(Path::new("run.coveragexml"), b""));
        assert!(is_coverage_file(Path::new("RUN.CoverageXml"), b""));
        assert!(!is_coverage_file(Path::new("run.xml"), b"<coverage/>"));
    }

    #[test]
    fn test_detect_by_content() {
        let utf16 = encode_utf16le("<CoverageDSPriv xmlns=\"urn:Coverage\">");
        assert!(is_coverage_file(Path::new("out.xml"), &utf16));
        assert!(is_coverage_file(
            Path::new("out.xml"),
            b"<?xml version=\"1.0\"?>\n<CoverageDSPriv>"
        ));
    }
    #[test]
    fn test_detect_when_window_splits_a_character() {
        let mut text = String::from("<CoverageDSPriv xmlns=\"urn:Coverage\">");
        while text.len() < 4095 {
            text.push('a');
        }
        // Two-byte character straddling the 4096-byte window.
        text.push('é');
        text.push_str("</CoverageDSPriv>");
        assert_eq!(text.as_bytes()[4095], 0xC3);

        assert!(is_coverage_file(Path::new("run.xml"), text.as_bytes()));
    }

    #[test]
    fn test_detect_utf16_in_long_file() {
        let mut bytes = encode_utf16le("<CoverageDSPriv>");
        bytes.extend(std::iter::repeat(b'a').take(5000));
        assert!(is_coverage_file(Path::new("run.xml"), &bytes));
    }
}
