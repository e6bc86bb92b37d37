//! Line-prefixed surface dialect (AP 3.0).
//!
//! Every directive line starts with the patch's 8-hex-digit id, which makes
//! directives unambiguous against arbitrary value content: a value line can
//! never be mistaken for a directive unless it happens to start with the
//! same random prefix. Values (paths, snippets, content) run from a value
//! directive to the next prefixed line, trimmed of leading and trailing
//! blank lines.

use crate::error::ParseError;
use crate::model::{FileChange, Modification, Newline, PatchDocument, Target};
use crate::parser::{convert_changes, FileChangeWire, LocatorStyle, ModificationWire};

const ACTIONS: [&str; 5] = [
    "REPLACE",
    "INSERT_AFTER",
    "INSERT_BEFORE",
    "DELETE",
    "CREATE_FILE",
];
const VALUE_KEYS: [&str; 5] = ["snippet", "anchor", "content", "start_snippet", "end_snippet"];
const ARG_KEYS: [&str; 2] = [
    "include_leading_blank_lines",
    "include_trailing_blank_lines",
];

/// `{8 lowercase hex digits} AP 3.0`
fn parse_header(line: &str) -> Option<&str> {
    let mut tokens = line.split_whitespace();
    let id = tokens.next()?;
    if tokens.next()? != "AP" || tokens.next()? != "3.0" || tokens.next().is_some() {
        return None;
    }
    (id.len() == 8 && id.chars().all(|c| matches!(c, '0'..='9' | 'a'..='f'))).then_some(id)
}

/// A document is in the prefixed dialect when its first line that is not
/// blank or a `#` comment is an AP 3.0 header. A document with no such line
/// is an empty prefixed patch.
pub fn is_prefixed_dialect(input: &str) -> bool {
    match input
        .lines()
        .map(str::trim)
        .find(|l| !l.is_empty() && !l.starts_with('#'))
    {
        Some(line) => parse_header(line).is_some(),
        None => true,
    }
}

/// What a run of value lines is being collected for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Reading {
    Path,
    Field(&'static str),
}

pub fn parse(input: &str) -> Result<PatchDocument, ParseError> {
    let lines: Vec<&str> = input.lines().collect();

    // Locate the header; everything before it must be blank or comment.
    let mut patch_id = None;
    let mut body_start = lines.len();
    for (idx, line) in lines.iter().enumerate() {
        let stripped = line.trim();
        if stripped.is_empty() || stripped.starts_with('#') {
            continue;
        }
        match parse_header(stripped) {
            Some(id) => {
                patch_id = Some(id.to_string());
                body_start = idx + 1;
            }
            None => {
                return Err(ParseError::Directive {
                    line: idx + 1,
                    message: "invalid AP 3.0 header".to_string(),
                });
            }
        }
        break;
    }

    let Some(patch_id) = patch_id else {
        return Ok(PatchDocument {
            version: "3.0".to_string(),
            patch_id: None,
            changes: Vec::new(),
        });
    };

    let mut changes: Vec<FileChangeWire> = Vec::new();
    let mut reading: Option<Reading> = None;
    let mut value_lines: Vec<&str> = Vec::new();

    for (idx, line) in lines.iter().enumerate().skip(body_start) {
        let line_num = idx + 1;

        let Some(rest) = strip_prefix(line, &patch_id) else {
            if reading.is_some() {
                value_lines.push(line);
            } else if !line.trim().is_empty() {
                return Err(ParseError::Directive {
                    line: line_num,
                    message: format!("unexpected content: '{}'", line.trim()),
                });
            }
            continue;
        };

        if let Some(pending) = reading.take() {
            flush_value(&mut changes, pending, std::mem::take(&mut value_lines));
        }

        let rest = rest.trim();
        let (key, args) = match rest.split_once(char::is_whitespace) {
            Some((key, args)) => (key, Some(args.trim())),
            None => (rest, None),
        };

        let modification_open = changes
            .last()
            .is_some_and(|c| !c.modifications.is_empty());

        if key == "FILE" {
            let newline = args.and_then(Newline::from_token);
            changes.push(FileChangeWire {
                file_path: String::new(),
                newline,
                modifications: Vec::new(),
            });
            reading = Some(Reading::Path);
        } else if ACTIONS.contains(&key) {
            let Some(change) = changes.last_mut() else {
                return Err(ParseError::Directive {
                    line: line_num,
                    message: format!("action '{key}' before FILE"),
                });
            };
            change.modifications.push(ModificationWire {
                action: key.to_string(),
                ..Default::default()
            });
        } else if let Some(field) = VALUE_KEYS.iter().copied().find(|k| *k == key) {
            if args.is_some() {
                return Err(ParseError::Directive {
                    line: line_num,
                    message: format!("directive '{field}' takes no arguments"),
                });
            }
            if !modification_open {
                return Err(ParseError::Directive {
                    line: line_num,
                    message: format!("'{field}' outside a modification"),
                });
            }
            reading = Some(Reading::Field(field));
        } else if ARG_KEYS.contains(&key) {
            if !modification_open {
                return Err(ParseError::Directive {
                    line: line_num,
                    message: format!("'{key}' outside a modification"),
                });
            }
            let count: u32 = args
                .unwrap_or("")
                .parse()
                .map_err(|_| ParseError::Directive {
                    line: line_num,
                    message: format!("argument for '{key}' must be a non-negative integer"),
                })?;
            if let Some(modification) = changes
                .last_mut()
                .and_then(|c| c.modifications.last_mut())
            {
                if key == "include_leading_blank_lines" {
                    modification.include_leading_blank_lines = Some(count);
                } else {
                    modification.include_trailing_blank_lines = Some(count);
                }
            }
        } else if let Some(newline) = Newline::from_token(key) {
            let Some(change) = changes.last_mut() else {
                return Err(ParseError::Directive {
                    line: line_num,
                    message: format!("newline '{key}' before FILE"),
                });
            };
            change.newline = Some(newline);
        } else {
            return Err(ParseError::Directive {
                line: line_num,
                message: format!("unknown directive '{key}'"),
            });
        }
    }

    if let Some(pending) = reading.take() {
        flush_value(&mut changes, pending, value_lines);
    }

    let changes = convert_changes(changes, LocatorStyle::Flat)?;
    Ok(PatchDocument {
        version: "3.0".to_string(),
        patch_id: Some(patch_id),
        changes,
    })
}

/// Return the directive text after `{id} `, or None for a value line.
fn strip_prefix<'a>(line: &'a str, patch_id: &str) -> Option<&'a str> {
    let rest = line.strip_prefix(patch_id)?;
    rest.starts_with([' ', '\t']).then_some(rest)
}

/// Assign collected value lines, trimmed of surrounding blank lines.
fn flush_value(changes: &mut [FileChangeWire], reading: Reading, value_lines: Vec<&str>) {
    let mut start = 0;
    while start < value_lines.len() && value_lines[start].trim().is_empty() {
        start += 1;
    }
    let mut end = value_lines.len();
    while end > start && value_lines[end - 1].trim().is_empty() {
        end -= 1;
    }
    let value = value_lines[start..end].join("\n");

    let Some(change) = changes.last_mut() else {
        return;
    };
    match reading {
        Reading::Path => change.file_path = value,
        Reading::Field(key) => {
            if let Some(modification) = change.modifications.last_mut() {
                match key {
                    "snippet" => modification.snippet = Some(value),
                    "anchor" => modification.anchor = Some(value),
                    "content" => modification.content = Some(value),
                    "start_snippet" => modification.start_snippet = Some(value),
                    "end_snippet" => modification.end_snippet = Some(value),
                    _ => {}
                }
            }
        }
    }
}

/// Re-serialize a set of failed changes as a valid AP 3.0 patch, so the
/// failing subset of a forced run can be inspected and retried.
pub fn serialize_failures(patch_id: &str, changes: &[FileChange]) -> String {
    let mut out = String::new();
    out.push_str("# Summary: Failed changes from a forced patch application.\n\n");
    out.push_str(&format!("{patch_id} AP 3.0\n\n"));

    for change in changes {
        out.push_str(&format!("{patch_id} FILE"));
        if let Some(newline) = change.newline {
            out.push_str(&format!(" {}", newline.token()));
        }
        out.push_str(&format!("\n{}\n\n", change.file_path));

        for modification in &change.modifications {
            out.push_str(&format!("{patch_id} {}\n", modification.action()));
            match modification {
                Modification::Replace { locator, content } => {
                    if let Some(anchor) = &locator.anchor {
                        push_value(&mut out, patch_id, "anchor", anchor);
                    }
                    push_target(&mut out, patch_id, &locator.target);
                    push_value(&mut out, patch_id, "content", content);
                    push_blank_counts(
                        &mut out,
                        patch_id,
                        locator.leading_blanks,
                        locator.trailing_blanks,
                    );
                }
                Modification::Delete { locator } => {
                    if let Some(anchor) = &locator.anchor {
                        push_value(&mut out, patch_id, "anchor", anchor);
                    }
                    push_target(&mut out, patch_id, &locator.target);
                    push_blank_counts(
                        &mut out,
                        patch_id,
                        locator.leading_blanks,
                        locator.trailing_blanks,
                    );
                }
                Modification::InsertAfter {
                    snippet,
                    anchor,
                    content,
                }
                | Modification::InsertBefore {
                    snippet,
                    anchor,
                    content,
                } => {
                    if let Some(anchor) = anchor {
                        push_value(&mut out, patch_id, "anchor", anchor);
                    }
                    push_value(&mut out, patch_id, "snippet", snippet);
                    push_value(&mut out, patch_id, "content", content);
                }
                Modification::CreateFile { content } => {
                    push_value(&mut out, patch_id, "content", content);
                }
            }
            out.push('\n');
        }
    }
    out
}

fn push_value(out: &mut String, patch_id: &str, key: &str, value: &str) {
    out.push_str(&format!("{patch_id} {key}\n{value}\n"));
}

fn push_target(out: &mut String, patch_id: &str, target: &Target) {
    match target {
        Target::Point { snippet } => push_value(out, patch_id, "snippet", snippet),
        Target::Range {
            start_snippet,
            end_snippet,
        } => {
            push_value(out, patch_id, "start_snippet", start_snippet);
            push_value(out, patch_id, "end_snippet", end_snippet);
        }
    }
}

fn push_blank_counts(out: &mut String, patch_id: &str, leading: u32, trailing: u32) {
    if leading > 0 {
        out.push_str(&format!(
            "{patch_id} include_leading_blank_lines {leading}\n"
        ));
    }
    if trailing > 0 {
        out.push_str(&format!(
            "{patch_id} include_trailing_blank_lines {trailing}\n"
        ));
    }
}
