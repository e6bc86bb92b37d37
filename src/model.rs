//! Typed patch document model.
//!
//! Modifications are a tagged sum keyed by action, with per-variant
//! required fields, so every document that survives parsing is known to
//! satisfy the cross-field invariants: point and range locators are
//! mutually exclusive, inserts only take a point snippet, and `content`
//! is present exactly where the action consumes it.

use serde::{Deserialize, Serialize};

/// Line-ending style for emitted files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub enum Newline {
    #[serde(rename = "LF")]
    Lf,
    #[serde(rename = "CRLF")]
    Crlf,
    #[serde(rename = "CR")]
    Cr,
}

impl Newline {
    pub fn as_str(self) -> &'static str {
        match self {
            Newline::Lf => "\n",
            Newline::Crlf => "\r\n",
            Newline::Cr => "\r",
        }
    }

    /// Directive token as it appears in patch documents.
    pub fn token(self) -> &'static str {
        match self {
            Newline::Lf => "LF",
            Newline::Crlf => "CRLF",
            Newline::Cr => "CR",
        }
    }

    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "LF" => Some(Newline::Lf),
            "CRLF" => Some(Newline::Crlf),
            "CR" => Some(Newline::Cr),
            _ => None,
        }
    }

    /// Detect the dominant ending from the first 1 KiB of a file.
    /// CRLF wins over LF wins over CR; `None` when no ending is present.
    pub fn detect(content: &str) -> Option<Self> {
        let probe = &content.as_bytes()[..content.len().min(1024)];
        if probe.windows(2).any(|w| w == b"\r\n") {
            Some(Newline::Crlf)
        } else if probe.contains(&b'\n') {
            Some(Newline::Lf)
        } else if probe.contains(&b'\r') {
            Some(Newline::Cr)
        } else {
            None
        }
    }

    pub fn platform_default() -> Self {
        if cfg!(windows) {
            Newline::Crlf
        } else {
            Newline::Lf
        }
    }
}

/// Where a point or range locator searches: either the whole file, or a
/// region scoped by an anchor that must be unique in the file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    Point {
        snippet: String,
    },
    Range {
        start_snippet: String,
        end_snippet: String,
    },
}

/// Locator attributes shared by region-consuming actions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Locator {
    pub target: Target,
    pub anchor: Option<String>,
    /// Expand the region upward through up to this many blank lines.
    pub leading_blanks: u32,
    /// Expand the region downward through up to this many blank lines.
    pub trailing_blanks: u32,
}

/// One modification, applied in document order against a file buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Modification {
    Replace {
        locator: Locator,
        content: String,
    },
    InsertAfter {
        snippet: String,
        anchor: Option<String>,
        content: String,
    },
    InsertBefore {
        snippet: String,
        anchor: Option<String>,
        content: String,
    },
    Delete {
        locator: Locator,
    },
    CreateFile {
        content: String,
    },
}

impl Modification {
    pub fn action(&self) -> &'static str {
        match self {
            Modification::Replace { .. } => "REPLACE",
            Modification::InsertAfter { .. } => "INSERT_AFTER",
            Modification::InsertBefore { .. } => "INSERT_BEFORE",
            Modification::Delete { .. } => "DELETE",
            Modification::CreateFile { .. } => "CREATE_FILE",
        }
    }
}

/// An ordered group of modifications against one target file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileChange {
    /// Relative path below the project root; never traverses upward.
    pub file_path: String,
    /// Line ending for newly created files. Existing files keep their
    /// detected ending.
    pub newline: Option<Newline>,
    pub modifications: Vec<Modification>,
}

/// A fully parsed, immutable patch document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatchDocument {
    /// Dialect version the document claimed ("1.0", "2.0", or "3.0").
    pub version: String,
    /// Hex id from the line-prefixed header, when that dialect was used.
    pub patch_id: Option<String>,
    pub changes: Vec<FileChange>,
}
