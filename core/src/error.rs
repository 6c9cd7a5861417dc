/// Error taxonomy shared by codecs, stores and the merge engine
use crate::formats::FileFormat;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    /// Malformed input for the declared format. `line` is 1-based, 0 when unknown.
    #[error("Parse error in {format} content (line {line}): {message}")]
    Parse {
        format: FileFormat,
        line: usize,
        message: String,
    },

    #[error("Unsupported operation for {format}: {operation}")]
    UnsupportedCapability {
        format: FileFormat,
        operation: &'static str,
    },

    #[error("Merge policy forbids replacing the translation of {id:?}")]
    MergeConflictPolicy { id: String },

    /// Never returned by `parse`; collected as a warning instead.
    #[error("Identity {id:?} is used by {count} units")]
    DuplicateIdentity { id: String, count: usize },

    /// A cached store is held by another checkout.
    #[error("Store {0} is already checked out")]
    CheckedOut(String),

    #[error("Encoding error: {0}")]
    Encoding(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl StoreError {
    pub fn parse(format: FileFormat, line: usize, message: impl Into<String>) -> Self {
        Self::Parse {
            format,
            line,
            message: message.into(),
        }
    }

    pub fn unsupported(format: FileFormat, operation: &'static str) -> Self {
        Self::UnsupportedCapability { format, operation }
    }
}

/// 1-based line number of a byte offset, for parse errors.
pub(crate) fn line_of(raw: &str, offset: usize) -> usize {
    let end = offset.min(raw.len());
    raw.as_bytes()[..end].iter().filter(|&&b| b == b'\n').count() + 1
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_error_names_format_and_line() {
        let err = StoreError::parse(FileFormat::Po, 12, "unterminated string");
        let text = err.to_string();
        assert!(text.contains("po"));
        assert!(text.contains("line 12"));
        assert!(text.contains("unterminated string"));
    }

    #[test]
    fn line_of_counts_newlines_before_offset() {
        let raw = "a\nb\nc";
        assert_eq!(line_of(raw, 0), 1);
        assert_eq!(line_of(raw, 2), 2);
        assert_eq!(line_of(raw, 4), 3);
        assert_eq!(line_of(raw, 100), 3);
    }
}
