use std::path::PathBuf;

use serde::Serialize;
use thiserror::Error;

/// A near-miss source line reported alongside a failed snippet search.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FuzzyMatch {
    /// 1-based line number in the target file.
    pub line_number: usize,
    /// Similarity ratio against the snippet's first line, rounded to 2 places.
    pub score: f64,
    /// The trimmed source line.
    pub text: String,
}

/// Errors produced while decoding a patch document, in either dialect.
#[derive(Error, Debug)]
pub enum ParseError {
    #[error("failed to read patch file {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse YAML patch: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Malformed directive in the line-prefixed dialect.
    #[error("line {line}: {message}")]
    Directive { line: usize, message: String },

    #[error("unsupported patch version '{version}'")]
    UnsupportedVersion { version: String },

    /// Structural problem at document or file-change level.
    #[error("{0}")]
    Document(String),

    /// Cross-field invariant violation inside one modification.
    #[error("modification #{} of '{file_path}': {message}", .index + 1)]
    Modification {
        file_path: String,
        /// 0-based index within the file change.
        index: usize,
        message: String,
    },

    #[error("invalid file path '{path}': {message}")]
    FilePath { path: String, message: String },
}

impl ParseError {
    pub fn code(&self) -> &'static str {
        match self {
            ParseError::Io { .. }
            | ParseError::Yaml(_)
            | ParseError::Directive { .. }
            | ParseError::UnsupportedVersion { .. }
            | ParseError::Document(_) => "INVALID_PATCH_FILE",
            ParseError::Modification { .. } => "INVALID_MODIFICATION",
            ParseError::FilePath { .. } => "INVALID_FILE_PATH",
        }
    }
}

/// Errors from resolving an anchor or snippet to a line range.
#[derive(Error, Debug)]
pub enum LocateError {
    #[error("anchor not found")]
    AnchorNotFound { anchor: String },

    #[error("anchor found {count} times")]
    AnchorAmbiguous { anchor: String, count: usize },

    #[error("snippet not found")]
    SnippetNotFound {
        snippet: String,
        anchor: Option<String>,
        suggestions: Vec<FuzzyMatch>,
    },

    #[error("snippet found {count} times")]
    SnippetAmbiguous { snippet: String, count: usize },

    #[error("end snippet not found after start snippet")]
    EndSnippetNotFound {
        start_snippet: String,
        end_snippet: String,
    },

    #[error("pattern normalizes to zero lines")]
    EmptyPattern,
}

impl LocateError {
    pub fn code(&self) -> &'static str {
        match self {
            LocateError::AnchorNotFound { .. } => "ANCHOR_NOT_FOUND",
            LocateError::AnchorAmbiguous { .. } => "AMBIGUOUS_ANCHOR",
            LocateError::SnippetNotFound { .. } => "SNIPPET_NOT_FOUND",
            LocateError::SnippetAmbiguous { .. } => "AMBIGUOUS_MATCH",
            LocateError::EndSnippetNotFound { .. } => "END_SNIPPET_NOT_FOUND",
            LocateError::EmptyPattern => "EMPTY_PATTERN",
        }
    }

    /// Whether this is a not-found-class failure, the only class the
    /// idempotency checker may absorb. Ambiguity always aborts.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            LocateError::AnchorNotFound { .. }
                | LocateError::SnippetNotFound { .. }
                | LocateError::EndSnippetNotFound { .. }
        )
    }
}

/// Errors from applying a single modification to a file buffer.
#[derive(Error, Debug)]
pub enum ModifyError {
    #[error(transparent)]
    Locate(#[from] LocateError),

    #[error("file exists with different content")]
    ExistingFileMismatch,
}

impl ModifyError {
    pub fn code(&self) -> &'static str {
        match self {
            ModifyError::Locate(e) => e.code(),
            ModifyError::ExistingFileMismatch => "FILE_EXISTS_MISMATCH",
        }
    }
}

/// Top-level transaction errors. Any of these aborts the patch; nothing is
/// flushed to disk.
#[derive(Error, Debug)]
pub enum ApplyError {
    #[error("invalid patch file: {0}")]
    Parse(#[from] ParseError),

    #[error("target file not found: {path}")]
    FileNotFound { path: String },

    #[error("modification #{} of '{path}' ({action}): {source}", .index + 1)]
    Modification {
        path: String,
        /// 0-based index within the file change.
        index: usize,
        action: &'static str,
        source: ModifyError,
    },

    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("afailed.ap exists; remove or rename it before running with --force")]
    CaptureFileExists,

    #[error("all changes failed in force mode")]
    AllChangesFailed,
}

impl ApplyError {
    pub fn code(&self) -> &'static str {
        match self {
            ApplyError::Parse(e) => e.code(),
            ApplyError::FileNotFound { .. } => "FILE_NOT_FOUND",
            ApplyError::Modification { source, .. } => source.code(),
            ApplyError::Io { .. } => "IO_ERROR",
            ApplyError::CaptureFileExists => "AFAILED_EXISTS",
            ApplyError::AllChangesFailed => "ALL_CHANGES_FAILED",
        }
    }

    /// Relative path of the offending file, when one is known.
    pub fn file_path(&self) -> Option<&str> {
        match self {
            ApplyError::Parse(ParseError::Modification { file_path, .. }) => Some(file_path),
            ApplyError::Parse(ParseError::FilePath { path, .. }) => Some(path),
            ApplyError::FileNotFound { path } => Some(path),
            ApplyError::Modification { path, .. } => Some(path),
            _ => None,
        }
    }

    /// 0-based modification index, when the failure is tied to one.
    pub fn mod_index(&self) -> Option<usize> {
        match self {
            ApplyError::Parse(ParseError::Modification { index, .. }) => Some(*index),
            ApplyError::Modification { index, .. } => Some(*index),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn locate_error_codes_match_taxonomy() {
        let e = LocateError::SnippetNotFound {
            snippet: "x".to_string(),
            anchor: None,
            suggestions: vec![],
        };
        assert_eq!(e.code(), "SNIPPET_NOT_FOUND");
        assert!(e.is_not_found());

        let e = LocateError::SnippetAmbiguous {
            snippet: "x".to_string(),
            count: 2,
        };
        assert_eq!(e.code(), "AMBIGUOUS_MATCH");
        assert!(!e.is_not_found());
    }

    #[test]
    fn apply_error_names_file_and_index() {
        let e = ApplyError::Modification {
            path: "b.txt".to_string(),
            index: 1,
            action: "REPLACE",
            source: ModifyError::Locate(LocateError::EmptyPattern),
        };
        assert_eq!(e.file_path(), Some("b.txt"));
        assert_eq!(e.mod_index(), Some(1));
        assert!(e.to_string().contains("modification #2"));
        assert!(e.to_string().contains("b.txt"));
    }
}
