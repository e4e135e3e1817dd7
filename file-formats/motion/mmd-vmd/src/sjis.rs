//! Fixed-width shift_jis name fields.
//!
//! VMD stores bone and morph names in fixed-size byte fields padded with NUL
//! bytes. A name that fills the whole field can end in the middle of a
//! multibyte sequence; the host application truncates the broken trailing
//! byte, and so do we.

use encoding_rs::SHIFT_JIS;

use crate::error::{Result, VmdError};

/// Decodes a fixed-width shift_jis field.
///
/// The field is cut at the first NUL byte. If the remaining bytes do not form
/// valid shift_jis, the final byte is dropped and decoding is retried once
/// (a split multibyte tail), falling back to lossy decoding otherwise.
pub fn decode_fixed(bytes: &[u8]) -> String {
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    let trimmed = &bytes[..end];
    if let Some(s) = SHIFT_JIS.decode_without_bom_handling_and_without_replacement(trimmed) {
        return s.into_owned();
    }
    if !trimmed.is_empty() {
        let retry = &trimmed[..trimmed.len() - 1];
        if let Some(s) = SHIFT_JIS.decode_without_bom_handling_and_without_replacement(retry) {
            return s.into_owned();
        }
    }
    SHIFT_JIS.decode(trimmed).0.into_owned()
}

/// Encodes `text` as shift_jis into a NUL-padded field of `width` bytes.
pub fn encode_fixed(text: &str, width: usize) -> Result<Vec<u8>> {
    let (encoded, _, had_errors) = SHIFT_JIS.encode(text);
    if had_errors {
        return Err(VmdError::Encoding(text.to_string()));
    }
    if encoded.len() > width {
        return Err(VmdError::NameTooLong {
            name: text.to_string(),
            width,
        });
    }
    let mut field = vec![0u8; width];
    field[..encoded.len()].copy_from_slice(&encoded);
    Ok(field)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_japanese_names() {
        let field = encode_fixed("右腕", 15).unwrap();
        assert_eq!(field.len(), 15);
        assert_eq!(decode_fixed(&field), "右腕");
    }

    #[test]
    fn truncates_at_first_nul() {
        let mut field = encode_fixed("頭", 15).unwrap();
        // Garbage after the NUL terminator must be ignored.
        field[10] = 0xfd;
        assert_eq!(decode_fixed(&field), "頭");
    }

    #[test]
    fn drops_split_multibyte_tail() {
        // 15 bytes of 2-byte characters leaves 7 whole chars + 1 broken byte.
        let (encoded, _, _) = SHIFT_JIS.encode("ああああああああ");
        let field: Vec<u8> = encoded[..15].to_vec();
        assert_eq!(decode_fixed(&field), "あああああああ");
    }

    #[test]
    fn rejects_overlong_names() {
        let err = encode_fixed("とても長いボーン名前です", 15).unwrap_err();
        assert!(matches!(err, VmdError::NameTooLong { width: 15, .. }));
    }
}
