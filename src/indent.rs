//! Indentation reflow for inserted and replacement content.
//!
//! Content carried by a patch is written at whatever indent the author
//! chose; when it lands in a file it must align with the located region.
//! The reflow shifts the whole block by the effective indent and never
//! touches relative indentation inside the block.

use crate::normalize::is_blank;

/// Leading horizontal whitespace of a line, as found in the file.
pub fn leading_indent(line: &str) -> &str {
    let trimmed = line.trim_start_matches(|c| c == ' ' || c == '\t');
    &line[..line.len() - trimmed.len()]
}

/// Split `content` into logical lines and prepend `indent` to each
/// non-blank line. Blank lines stay blank.
pub fn reindent(content: &str, indent: &str) -> Vec<String> {
    content
        .lines()
        .map(|line| {
            if is_blank(line) {
                String::new()
            } else {
                format!("{indent}{line}")
            }
        })
        .collect()
}
