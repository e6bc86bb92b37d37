//! Per-file buffer state for one transaction.
//!
//! A session holds the target file as a line sequence plus the detected
//! line ending and terminal-newline policy. All five actions mutate the
//! buffer only; disk is untouched until the transaction driver commits.
//! The idempotency checker lives here too: it sees the located region and
//! the reindented content side by side, which is exactly what the skip
//! conditions compare.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::info;

use crate::error::{LocateError, ModifyError};
use crate::indent::{leading_indent, reindent};
use crate::locate::{expand_blank_lines, locate_range, locate_snippet, LineRange};
use crate::model::{Locator, Modification, Newline, Target};

/// What applying one modification did to the buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use = "ModOutcome should be recorded for reporting"]
pub enum ModOutcome {
    /// The buffer was changed.
    Applied,
    /// The intended effect was already present; nothing changed.
    Skipped,
}

#[derive(Debug)]
pub struct FileSession {
    rel_path: String,
    abs_path: PathBuf,
    /// File content exactly as read, or None when the file did not exist.
    original: Option<String>,
    lines: Vec<String>,
    newline: Newline,
    trailing_newline: bool,
    dirty: bool,
}

impl FileSession {
    /// Open a session for `rel_path` under `project_root`. A missing file
    /// yields an empty session; the driver decides whether that is legal
    /// for the change at hand.
    pub fn open(
        project_root: &Path,
        rel_path: &str,
        newline_override: Option<Newline>,
    ) -> io::Result<Self> {
        let abs_path = project_root.join(rel_path);
        match fs::read_to_string(&abs_path) {
            Ok(content) => Ok(Self::from_content(rel_path, abs_path, content)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                Ok(Self::missing(rel_path, abs_path, newline_override))
            }
            Err(e) => Err(e),
        }
    }

    /// Existing files keep their detected dominant ending; the patch's
    /// `newline` attribute only ever applies to files created here.
    fn from_content(rel_path: &str, abs_path: PathBuf, content: String) -> Self {
        let newline = Newline::detect(&content).unwrap_or_else(Newline::platform_default);
        let normalized = content.replace("\r\n", "\n").replace('\r', "\n");
        let trailing_newline = normalized.ends_with('\n');
        let lines = if normalized.is_empty() {
            Vec::new()
        } else {
            let body = normalized.strip_suffix('\n').unwrap_or(&normalized);
            body.split('\n').map(String::from).collect()
        };
        Self {
            rel_path: rel_path.to_string(),
            abs_path,
            original: Some(content),
            lines,
            newline,
            trailing_newline,
            dirty: false,
        }
    }

    fn missing(rel_path: &str, abs_path: PathBuf, newline_override: Option<Newline>) -> Self {
        Self {
            rel_path: rel_path.to_string(),
            abs_path,
            original: None,
            lines: Vec::new(),
            newline: newline_override.unwrap_or_else(Newline::platform_default),
            trailing_newline: true,
            dirty: false,
        }
    }

    pub fn rel_path(&self) -> &str {
        &self.rel_path
    }

    pub fn abs_path(&self) -> &Path {
        &self.abs_path
    }

    /// Whether the file existed on disk when the session was opened.
    pub fn exists(&self) -> bool {
        self.original.is_some()
    }

    /// Apply one modification to the in-memory buffer.
    pub fn apply(&mut self, modification: &Modification) -> Result<ModOutcome, ModifyError> {
        match modification {
            Modification::CreateFile { content } => self.create_file(content),
            Modification::Delete { locator } => self.delete(locator),
            Modification::Replace { locator, content } => self.replace(locator, content),
            Modification::InsertAfter {
                snippet,
                anchor,
                content,
            } => self.insert(snippet, anchor.as_deref(), content, true),
            Modification::InsertBefore {
                snippet,
                anchor,
                content,
            } => self.insert(snippet, anchor.as_deref(), content, false),
        }
    }

    /// Render the buffer to bytes: trailing horizontal whitespace stripped
    /// from every line, the session's line ending applied, terminal
    /// newline as the original had it (new files always get one).
    pub fn finalize(&self) -> String {
        render(&self.lines, self.newline, self.trailing_newline)
    }

    /// True when a commit would change what is on disk.
    pub fn is_modified(&self) -> bool {
        if !self.dirty {
            return false;
        }
        match &self.original {
            Some(original) => self.finalize() != *original,
            None => true,
        }
    }

    fn locate(&self, locator: &Locator) -> Result<LineRange, LocateError> {
        match &locator.target {
            Target::Point { snippet } => {
                locate_snippet(&self.lines, snippet, locator.anchor.as_deref())
            }
            Target::Range {
                start_snippet,
                end_snippet,
            } => locate_range(
                &self.lines,
                start_snippet,
                end_snippet,
                locator.anchor.as_deref(),
            ),
        }
    }

    fn create_file(&mut self, content: &str) -> Result<ModOutcome, ModifyError> {
        // Created content lands verbatim: no indentation reflow.
        let fresh: Vec<String> = content.lines().map(String::from).collect();
        if self.original.is_some() {
            let rendered = render(&fresh, self.newline, true);
            if self.original.as_deref() == Some(rendered.as_str()) {
                info!(path = %self.rel_path, "create skipped, file already has this content");
                return Ok(ModOutcome::Skipped);
            }
            return Err(ModifyError::ExistingFileMismatch);
        }
        self.lines = fresh;
        self.trailing_newline = true;
        self.dirty = true;
        Ok(ModOutcome::Applied)
    }

    fn delete(&mut self, locator: &Locator) -> Result<ModOutcome, ModifyError> {
        let range = match self.locate(locator) {
            Ok(range) => range,
            Err(e) if e.is_not_found() => {
                info!(path = %self.rel_path, code = e.code(), "delete skipped, target already absent");
                return Ok(ModOutcome::Skipped);
            }
            Err(e) => return Err(e.into()),
        };
        let range =
            expand_blank_lines(&self.lines, range, locator.leading_blanks, locator.trailing_blanks);
        self.lines.drain(range.start..=range.end);
        self.dirty = true;
        Ok(ModOutcome::Applied)
    }

    fn replace(&mut self, locator: &Locator, content: &str) -> Result<ModOutcome, ModifyError> {
        let range = match self.locate(locator) {
            Ok(range) => range,
            Err(e) if e.is_not_found() && self.content_present(locator, content) => {
                info!(path = %self.rel_path, "replace skipped, replacement already present");
                return Ok(ModOutcome::Skipped);
            }
            Err(e) => return Err(e.into()),
        };
        // Indent comes from the first matched line; blank-line expansion may
        // move the boundary onto a blank line, which has none to offer.
        let indent = leading_indent(&self.lines[range.start]).to_string();
        let range =
            expand_blank_lines(&self.lines, range, locator.leading_blanks, locator.trailing_blanks);
        let replacement = reindent(content, &indent);
        if lines_equal(&self.lines[range.start..=range.end], &replacement) {
            info!(path = %self.rel_path, "replace skipped, region already matches");
            return Ok(ModOutcome::Skipped);
        }
        self.lines.splice(range.start..=range.end, replacement);
        self.dirty = true;
        Ok(ModOutcome::Applied)
    }

    /// A failed REPLACE locate is an idempotent skip when the replacement
    /// content itself can be located under the same anchor discipline.
    fn content_present(&self, locator: &Locator, content: &str) -> bool {
        locate_snippet(&self.lines, content, locator.anchor.as_deref()).is_ok()
    }

    fn insert(
        &mut self,
        snippet: &str,
        anchor: Option<&str>,
        content: &str,
        after: bool,
    ) -> Result<ModOutcome, ModifyError> {
        let range = locate_snippet(&self.lines, snippet, anchor)?;
        let indent = leading_indent(&self.lines[range.start]).to_string();
        let block = reindent(content, &indent);
        if block.is_empty() {
            return Ok(ModOutcome::Skipped);
        }

        let already = if after {
            self.lines
                .get(range.end + 1..range.end + 1 + block.len())
                .is_some_and(|next| lines_equal(next, &block))
        } else {
            range.start >= block.len()
                && lines_equal(&self.lines[range.start - block.len()..range.start], &block)
        };
        if already {
            info!(path = %self.rel_path, "insert skipped, block already present");
            return Ok(ModOutcome::Skipped);
        }

        let at = if after { range.end + 1 } else { range.start };
        self.lines.splice(at..at, block);
        self.dirty = true;
        Ok(ModOutcome::Applied)
    }
}

fn trim_trailing(line: &str) -> &str {
    line.trim_end_matches(|c| c == ' ' || c == '\t')
}

/// Line equality under trailing-whitespace normalization, which is what
/// `finalize` erases anyway.
fn lines_equal(current: &[String], wanted: &[String]) -> bool {
    current.len() == wanted.len()
        && current
            .iter()
            .zip(wanted)
            .all(|(c, w)| trim_trailing(c) == trim_trailing(w))
}

fn render(lines: &[String], newline: Newline, trailing: bool) -> String {
    if lines.is_empty() {
        return String::new();
    }
    let ending = newline.as_str();
    let mut out = lines
        .iter()
        .map(|l| trim_trailing(l))
        .collect::<Vec<_>>()
        .join(ending);
    if trailing {
        out.push_str(ending);
    }
    out
}
