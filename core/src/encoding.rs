/// Encoding and newline handling for raw document bytes
use crate::error::StoreError;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Encoding {
    #[default]
    Utf8,
    Utf8Bom,
    Utf16Le,
    Utf16Be,
    Latin1,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Newline {
    #[default]
    Lf,
    Crlf,
}

impl Encoding {
    /// Detect encoding from a byte-order mark, falling back to UTF-8 validation
    pub fn detect(content: &[u8]) -> Self {
        if content.starts_with(&[0xEF, 0xBB, 0xBF]) {
            return Self::Utf8Bom;
        }
        if content.starts_with(&[0xFF, 0xFE]) {
            return Self::Utf16Le;
        }
        if content.starts_with(&[0xFE, 0xFF]) {
            return Self::Utf16Be;
        }
        if std::str::from_utf8(content).is_ok() {
            return Self::Utf8;
        }
        Self::Latin1
    }

    pub fn has_bom(self) -> bool {
        matches!(self, Self::Utf8Bom | Self::Utf16Le | Self::Utf16Be)
    }
}

impl Newline {
    pub fn detect(content: &[u8]) -> Self {
        if content.windows(2).any(|window| window == b"\r\n") {
            Self::Crlf
        } else {
            Self::Lf
        }
    }

    /// Rewrite every line ending of `text` in this style
    pub fn apply(self, text: &str) -> String {
        let normalized = text.replace("\r\n", "\n");
        match self {
            Self::Lf => normalized,
            Self::Crlf => normalized.replace('\n', "\r\n"),
        }
    }
}

/// Decode bytes with the detected encoding
pub fn decode(bytes: &[u8]) -> Result<(String, Encoding), StoreError> {
    let encoding = Encoding::detect(bytes);
    let text = decode_as(bytes, encoding)?;
    Ok((text, encoding))
}

pub fn decode_as(bytes: &[u8], encoding: Encoding) -> Result<String, StoreError> {
    match encoding {
        Encoding::Utf8 => String::from_utf8(bytes.to_vec())
            .map_err(|e| StoreError::Encoding(e.to_string())),
        Encoding::Utf8Bom => {
            let content = bytes.strip_prefix(&[0xEF, 0xBB, 0xBF]).unwrap_or(bytes);
            String::from_utf8(content.to_vec()).map_err(|e| StoreError::Encoding(e.to_string()))
        }
        Encoding::Utf16Le | Encoding::Utf16Be => {
            let content = bytes
                .strip_prefix(&[0xFF, 0xFE])
                .or_else(|| bytes.strip_prefix(&[0xFE, 0xFF]))
                .unwrap_or(bytes);
            if content.len() % 2 != 0 {
                return Err(StoreError::Encoding(
                    "odd number of bytes in UTF-16 content".to_string(),
                ));
            }
            let units: Vec<u16> = content
                .chunks_exact(2)
                .map(|chunk| match encoding {
                    Encoding::Utf16Le => u16::from_le_bytes([chunk[0], chunk[1]]),
                    _ => u16::from_be_bytes([chunk[0], chunk[1]]),
                })
                .collect();
            String::from_utf16(&units).map_err(|e| StoreError::Encoding(e.to_string()))
        }
        // Latin-1 bytes map one-to-one onto U+0000..U+00FF
        Encoding::Latin1 => Ok(bytes.iter().map(|&b| char::from(b)).collect()),
    }
}

pub fn encode(text: &str, encoding: Encoding) -> Result<Vec<u8>, StoreError> {
    match encoding {
        Encoding::Utf8 => Ok(text.as_bytes().to_vec()),
        Encoding::Utf8Bom => {
            let mut bytes = vec![0xEF, 0xBB, 0xBF];
            bytes.extend_from_slice(text.as_bytes());
            Ok(bytes)
        }
        Encoding::Utf16Le => {
            let mut bytes = vec![0xFF, 0xFE];
            for unit in text.encode_utf16() {
                bytes.extend_from_slice(&unit.to_le_bytes());
            }
            Ok(bytes)
        }
        Encoding::Utf16Be => {
            let mut bytes = vec![0xFE, 0xFF];
            for unit in text.encode_utf16() {
                bytes.extend_from_slice(&unit.to_be_bytes());
            }
            Ok(bytes)
        }
        Encoding::Latin1 => text
            .chars()
            .map(|c| {
                u8::try_from(u32::from(c)).map_err(|_| {
                    StoreError::Encoding(format!("character {:?} is not representable in Latin-1", c))
                })
            })
            .collect(),
    }
}

/// Read a document, detecting its encoding
pub fn read_file(path: &Path) -> Result<(String, Encoding), StoreError> {
    let bytes = std::fs::read(path)?;
    decode(&bytes)
}

/// Write a document in the given encoding
pub fn write_file(path: &Path, text: &str, encoding: Encoding) -> Result<(), StoreError> {
    let bytes = encode(text, encoding)?;
    std::fs::write(path, bytes)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn detects_utf8() {
        assert_eq!(Encoding::detect("Hello, World!".as_bytes()), Encoding::Utf8);
    }

    #[test]
    fn detects_utf8_bom() {
        let mut content = vec![0xEF, 0xBB, 0xBF];
        content.extend_from_slice(b"Hello");
        let (text, encoding) = decode(&content).unwrap();
        assert_eq!(encoding, Encoding::Utf8Bom);
        assert!(encoding.has_bom());
        assert_eq!(text, "Hello");
    }

    #[test]
    fn decodes_utf16le() {
        let bytes = encode("%date\tÿ", Encoding::Utf16Le).unwrap();
        assert_eq!(&bytes[..2], &[0xFF, 0xFE]);
        let (text, encoding) = decode(&bytes).unwrap();
        assert_eq!(encoding, Encoding::Utf16Le);
        assert_eq!(text, "%date\tÿ");
    }

    #[test]
    fn falls_back_to_latin1() {
        let (text, encoding) = decode(&[b'c', b'a', b'f', 0xE9]).unwrap();
        assert_eq!(encoding, Encoding::Latin1);
        assert_eq!(text, "café");
    }

    #[test]
    fn latin1_rejects_wide_characters() {
        assert!(matches!(
            encode("snowman ☃", Encoding::Latin1),
            Err(StoreError::Encoding(_))
        ));
    }

    #[test]
    fn detects_and_applies_newlines() {
        assert_eq!(Newline::detect(b"Line1\r\nLine2\r\n"), Newline::Crlf);
        assert_eq!(Newline::detect(b"Line1\nLine2\n"), Newline::Lf);
        assert_eq!(Newline::Crlf.apply("a\nb\r\n"), "a\r\nb\r\n");
        assert_eq!(Newline::Lf.apply("a\r\nb"), "a\nb");
    }

    #[test]
    fn roundtrip_with_bom() {
        let temp = NamedTempFile::new().unwrap();
        write_file(temp.path(), "Hello, World!", Encoding::Utf8Bom).unwrap();
        let (text, encoding) = read_file(temp.path()).unwrap();
        assert_eq!(text, "Hello, World!");
        assert_eq!(encoding, Encoding::Utf8Bom);
    }
}
