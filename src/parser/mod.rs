//! Patch document parsing.
//!
//! Two surface dialects decode to the same internal modification list: the
//! YAML form (versions 1.0 and 2.0) and the line-prefixed AP 3.0 form. Both
//! dialects deserialize into the wire structs here, and a single conversion
//! pass enforces the cross-field invariants while building the typed model.

pub mod prefixed;
pub mod yaml;

use std::fs;
use std::path::{Component, Path};

use serde::Deserialize;

use crate::error::ParseError;
use crate::model::{FileChange, Locator, Modification, Newline, PatchDocument, Target};

/// Parse a patch document, sniffing which dialect it is written in.
///
/// A document whose first meaningful line is an AP 3.0 header (or which has
/// no meaningful lines at all) takes the line-prefixed path; everything
/// else is treated as YAML.
pub fn parse_str(input: &str) -> Result<PatchDocument, ParseError> {
    if prefixed::is_prefixed_dialect(input) {
        prefixed::parse(input)
    } else {
        yaml::parse(input)
    }
}

pub fn load_from_path(path: impl AsRef<Path>) -> Result<PatchDocument, ParseError> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path).map_err(|source| ParseError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_str(&contents)
}

/// Raw locator mapping of the v1.0 nested form.
#[derive(Debug, Default, Clone, Deserialize)]
pub(crate) struct TargetWire {
    #[serde(default)]
    pub snippet: Option<String>,
    #[serde(default)]
    pub anchor: Option<String>,
    #[serde(default)]
    pub include_leading_blank_lines: Option<u32>,
    #[serde(default)]
    pub include_trailing_blank_lines: Option<u32>,
}

/// Raw modification mapping before invariant checking.
#[derive(Debug, Default, Clone, Deserialize)]
pub(crate) struct ModificationWire {
    pub action: String,
    #[serde(default)]
    pub target: Option<TargetWire>,
    #[serde(default)]
    pub snippet: Option<String>,
    #[serde(default)]
    pub start_snippet: Option<String>,
    #[serde(default)]
    pub end_snippet: Option<String>,
    #[serde(default)]
    pub anchor: Option<String>,
    #[serde(default)]
    pub include_leading_blank_lines: Option<u32>,
    #[serde(default)]
    pub include_trailing_blank_lines: Option<u32>,
    #[serde(default)]
    pub content: Option<String>,
}

#[derive(Debug, Default, Clone, Deserialize)]
pub(crate) struct FileChangeWire {
    #[serde(default)]
    pub file_path: String,
    #[serde(default)]
    pub newline: Option<Newline>,
    #[serde(default)]
    pub modifications: Vec<ModificationWire>,
}

/// Where a dialect carries its locator fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum LocatorStyle {
    /// v1.0: inside a `target` mapping, point snippets only.
    Nested,
    /// v2.0 and the line-prefixed dialect: flat on the modification.
    Flat,
}

pub(crate) fn convert_changes(
    changes: Vec<FileChangeWire>,
    style: LocatorStyle,
) -> Result<Vec<FileChange>, ParseError> {
    changes
        .into_iter()
        .map(|change| {
            validate_file_path(&change.file_path)?;
            let modifications = change
                .modifications
                .into_iter()
                .enumerate()
                .map(|(index, wire)| {
                    convert_modification(&change.file_path, index, wire, style)
                })
                .collect::<Result<Vec<_>, _>>()?;
            Ok(FileChange {
                file_path: change.file_path,
                newline: change.newline,
                modifications,
            })
        })
        .collect()
}

/// Paths must stay below the project root: relative, and free of `..`.
fn validate_file_path(path: &str) -> Result<(), ParseError> {
    if path.is_empty() {
        return Err(ParseError::Document(
            "missing 'file_path' for a change block".to_string(),
        ));
    }
    for component in Path::new(path).components() {
        match component {
            Component::ParentDir => {
                return Err(ParseError::FilePath {
                    path: path.to_string(),
                    message: "path traversal detected".to_string(),
                });
            }
            Component::RootDir | Component::Prefix(_) => {
                return Err(ParseError::FilePath {
                    path: path.to_string(),
                    message: "path must be relative".to_string(),
                });
            }
            Component::CurDir | Component::Normal(_) => {}
        }
    }
    Ok(())
}

fn convert_modification(
    file_path: &str,
    index: usize,
    wire: ModificationWire,
    style: LocatorStyle,
) -> Result<Modification, ParseError> {
    let fail = |message: String| ParseError::Modification {
        file_path: file_path.to_string(),
        index,
        message,
    };

    let action = wire.action.clone();
    let fields = flatten_locator(wire, style).map_err(&fail)?;

    match action.as_str() {
        "CREATE_FILE" => {
            if fields.snippet.is_some()
                || fields.start_snippet.is_some()
                || fields.end_snippet.is_some()
            {
                return Err(fail("CREATE_FILE does not take snippets".to_string()));
            }
            let content = fields
                .content
                .ok_or_else(|| fail("CREATE_FILE requires 'content'".to_string()))?;
            Ok(Modification::CreateFile { content })
        }
        "DELETE" => {
            if fields.content.is_some() {
                return Err(fail("DELETE does not take 'content'".to_string()));
            }
            let locator = build_locator(&fields).map_err(&fail)?;
            Ok(Modification::Delete { locator })
        }
        "REPLACE" => {
            let locator = build_locator(&fields).map_err(&fail)?;
            let content = fields
                .content
                .ok_or_else(|| fail("REPLACE requires 'content'".to_string()))?;
            Ok(Modification::Replace { locator, content })
        }
        "INSERT_AFTER" | "INSERT_BEFORE" => {
            if fields.start_snippet.is_some() || fields.end_snippet.is_some() {
                return Err(fail(format!(
                    "action '{action}' does not support range snippets"
                )));
            }
            let snippet = fields
                .snippet
                .ok_or_else(|| fail(format!("action '{action}' requires 'snippet'")))?;
            let content = fields
                .content
                .ok_or_else(|| fail(format!("action '{action}' requires 'content'")))?;
            if action == "INSERT_AFTER" {
                Ok(Modification::InsertAfter {
                    snippet,
                    anchor: fields.anchor,
                    content,
                })
            } else {
                Ok(Modification::InsertBefore {
                    snippet,
                    anchor: fields.anchor,
                    content,
                })
            }
        }
        other => Err(fail(format!("unknown action '{other}'"))),
    }
}

/// Locator fields after per-dialect placement rules are resolved.
struct LocatorFields {
    snippet: Option<String>,
    start_snippet: Option<String>,
    end_snippet: Option<String>,
    anchor: Option<String>,
    leading_blanks: u32,
    trailing_blanks: u32,
    content: Option<String>,
}

fn flatten_locator(wire: ModificationWire, style: LocatorStyle) -> Result<LocatorFields, String> {
    match style {
        LocatorStyle::Nested => {
            if wire.snippet.is_some()
                || wire.start_snippet.is_some()
                || wire.end_snippet.is_some()
                || wire.anchor.is_some()
                || wire.include_leading_blank_lines.is_some()
                || wire.include_trailing_blank_lines.is_some()
            {
                return Err(
                    "version 1.0 carries locator fields inside 'target'".to_string()
                );
            }
            let target = wire.target.unwrap_or_default();
            Ok(LocatorFields {
                snippet: target.snippet,
                start_snippet: None,
                end_snippet: None,
                anchor: target.anchor,
                leading_blanks: target.include_leading_blank_lines.unwrap_or(0),
                trailing_blanks: target.include_trailing_blank_lines.unwrap_or(0),
                content: wire.content,
            })
        }
        LocatorStyle::Flat => {
            if wire.target.is_some() {
                return Err("'target' is a version 1.0 field; use flat locator fields".to_string());
            }
            Ok(LocatorFields {
                snippet: wire.snippet,
                start_snippet: wire.start_snippet,
                end_snippet: wire.end_snippet,
                anchor: wire.anchor,
                leading_blanks: wire.include_leading_blank_lines.unwrap_or(0),
                trailing_blanks: wire.include_trailing_blank_lines.unwrap_or(0),
                content: wire.content,
            })
        }
    }
}

fn build_locator(fields: &LocatorFields) -> Result<Locator, String> {
    let target = match (
        &fields.snippet,
        &fields.start_snippet,
        &fields.end_snippet,
    ) {
        (Some(_), Some(_), _) | (Some(_), _, Some(_)) => {
            return Err("'snippet' and range snippets are mutually exclusive".to_string());
        }
        (Some(snippet), None, None) => Target::Point {
            snippet: snippet.clone(),
        },
        (None, Some(start), Some(end)) => Target::Range {
            start_snippet: start.clone(),
            end_snippet: end.clone(),
        },
        (None, Some(_), None) | (None, None, Some(_)) => {
            return Err(
                "'start_snippet' and 'end_snippet' must be used together".to_string()
            );
        }
        (None, None, None) => {
            return Err("requires a 'snippet' or a snippet range".to_string());
        }
    };
    Ok(Locator {
        target,
        anchor: fields.anchor.clone(),
        leading_blanks: fields.leading_blanks,
        trailing_blanks: fields.trailing_blanks,
    })
}
