//! Snippet and anchor resolution over a file buffer.
//!
//! The locator is a pure function of an immutable line buffer: it resolves
//! anchor and snippet text to inclusive line ranges under the normalized
//! matching discipline of [`crate::normalize`]. Mutation lives elsewhere.

use similar::TextDiff;
use tracing::debug;

use crate::error::{FuzzyMatch, LocateError};
use crate::normalize::{is_blank, normalize_pattern, NormalizedView};

/// Minimum similarity for a line to be offered as a near-miss suggestion.
const FUZZY_CUTOFF: f64 = 0.7;
/// At most this many suggestions accompany a failed snippet search.
const FUZZY_LIMIT: usize = 3;

/// An inclusive range of original line indices in a buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineRange {
    pub start: usize,
    pub end: usize,
}

impl LineRange {
    pub fn new(start: usize, end: usize) -> Self {
        debug_assert!(start <= end);
        Self { start, end }
    }

    pub fn line_count(&self) -> usize {
        self.end - self.start + 1
    }
}

/// Find every normalized match of `pattern` in `lines`, restricted to lines
/// strictly after `after` when given. Ranges use original indices; interior
/// blank lines are invisible to matching but covered by the range.
fn find_matches(
    lines: &[String],
    pattern: &str,
    after: Option<usize>,
) -> Result<Vec<LineRange>, LocateError> {
    let wanted = normalize_pattern(pattern);
    if wanted.is_empty() {
        return Err(LocateError::EmptyPattern);
    }

    let view = NormalizedView::new(lines);
    let entries: Vec<_> = match after {
        Some(limit) => view
            .entries()
            .iter()
            .copied()
            .filter(|e| e.origin > limit)
            .collect(),
        None => view.entries().to_vec(),
    };

    let mut found = Vec::new();
    if entries.len() < wanted.len() {
        return Ok(found);
    }
    for window in entries.windows(wanted.len()) {
        if window.iter().map(|e| e.text).eq(wanted.iter().copied()) {
            found.push(LineRange::new(
                window[0].origin,
                window[wanted.len() - 1].origin,
            ));
        }
    }
    Ok(found)
}

/// Resolve an anchor: it must match exactly once across the whole buffer.
pub fn locate_anchor(lines: &[String], anchor: &str) -> Result<LineRange, LocateError> {
    let matches = find_matches(lines, anchor, None)?;
    match matches.len() {
        0 => Err(LocateError::AnchorNotFound {
            anchor: anchor.to_string(),
        }),
        1 => Ok(matches[0]),
        count => Err(LocateError::AnchorAmbiguous {
            anchor: anchor.to_string(),
            count,
        }),
    }
}

/// Resolve a point snippet. Unanchored, the snippet must match exactly once
/// in the buffer. Anchored, the search is scoped to the lines following the
/// anchor's last line and the first match wins.
pub fn locate_snippet(
    lines: &[String],
    snippet: &str,
    anchor: Option<&str>,
) -> Result<LineRange, LocateError> {
    match anchor {
        Some(anchor_text) => {
            let anchor_range = locate_anchor(lines, anchor_text)?;
            debug!(
                anchor_start = anchor_range.start,
                anchor_end = anchor_range.end,
                "anchor resolved, scoping snippet search"
            );
            let matches = find_matches(lines, snippet, Some(anchor_range.end))?;
            matches
                .first()
                .copied()
                .ok_or_else(|| LocateError::SnippetNotFound {
                    snippet: snippet.to_string(),
                    anchor: Some(anchor_text.to_string()),
                    suggestions: fuzzy_matches(lines, snippet),
                })
        }
        None => {
            let matches = find_matches(lines, snippet, None)?;
            match matches.len() {
                0 => Err(LocateError::SnippetNotFound {
                    snippet: snippet.to_string(),
                    anchor: None,
                    suggestions: fuzzy_matches(lines, snippet),
                }),
                1 => Ok(matches[0]),
                count => Err(LocateError::SnippetAmbiguous {
                    snippet: snippet.to_string(),
                    count,
                }),
            }
        }
    }
}

/// Resolve a `(start_snippet, end_snippet)` range. The start follows the
/// point-snippet rules; the end is the first match beginning after the
/// start's last line. The result spans both matches inclusively.
pub fn locate_range(
    lines: &[String],
    start_snippet: &str,
    end_snippet: &str,
    anchor: Option<&str>,
) -> Result<LineRange, LocateError> {
    let start = locate_snippet(lines, start_snippet, anchor)?;
    let ends = find_matches(lines, end_snippet, Some(start.end))?;
    let end = ends
        .first()
        .copied()
        .ok_or_else(|| LocateError::EndSnippetNotFound {
            start_snippet: start_snippet.to_string(),
            end_snippet: end_snippet.to_string(),
        })?;
    Ok(LineRange::new(start.start, end.end))
}

/// Widen a located range through up to `leading` blank lines above and
/// `trailing` blank lines below, stopping at the first non-blank line or
/// the buffer edge.
pub fn expand_blank_lines(
    lines: &[String],
    range: LineRange,
    leading: u32,
    trailing: u32,
) -> LineRange {
    let mut start = range.start;
    for _ in 0..leading {
        if start == 0 || !is_blank(&lines[start - 1]) {
            break;
        }
        start -= 1;
    }

    let mut end = range.end;
    for _ in 0..trailing {
        if end + 1 >= lines.len() || !is_blank(&lines[end + 1]) {
            break;
        }
        end += 1;
    }

    LineRange::new(start, end)
}

/// Rank buffer lines by similarity to the snippet's first normalized line,
/// for "did you mean" diagnostics on a failed search.
pub fn fuzzy_matches(lines: &[String], snippet: &str) -> Vec<FuzzyMatch> {
    let wanted = normalize_pattern(snippet);
    let Some(first) = wanted.first() else {
        return Vec::new();
    };

    let mut candidates = Vec::new();
    for (idx, line) in lines.iter().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        let ratio = TextDiff::from_chars(*first, trimmed).ratio() as f64;
        let score = (ratio * 100.0).round() / 100.0;
        if score >= FUZZY_CUTOFF {
            candidates.push(FuzzyMatch {
                line_number: idx + 1,
                score,
                text: trimmed.to_string(),
            });
        }
    }
    candidates.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
    candidates.truncate(FUZZY_LIMIT);
    candidates
}

#[cfg(test)]
mod tests {
    use super::*;

    fn buffer(text: &str) -> Vec<String> {
        text.lines().map(|l| l.to_string()).collect()
    }

    #[test]
    fn single_line_match_ignores_indent() {
        let lines = buffer("def f():\n    print(\"a\")\n");
        let range = locate_snippet(&lines, "print(\"a\")", None).unwrap();
        assert_eq!(range, LineRange::new(1, 1));
    }

    #[test]
    fn multi_line_match_spans_interior_blanks() {
        let lines = buffer("a\nstart\n\n  middle\nend\nb");
        let range = locate_snippet(&lines, "start\nmiddle\nend", None).unwrap();
        assert_eq!(range, LineRange::new(1, 4));
    }

    #[test]
    fn substring_of_a_line_never_matches() {
        let lines = buffer("let value = compute();\n");
        let err = locate_snippet(&lines, "compute()", None).unwrap_err();
        assert!(matches!(err, LocateError::SnippetNotFound { .. }));
    }

    #[test]
    fn unanchored_duplicate_is_ambiguous() {
        let lines = buffer("x = 1\ny\nx = 1\n");
        let err = locate_snippet(&lines, "x = 1", None).unwrap_err();
        match err {
            LocateError::SnippetAmbiguous { count, .. } => assert_eq!(count, 2),
            other => panic!("expected ambiguous, got {other:?}"),
        }
    }

    #[test]
    fn anchor_scopes_to_following_lines() {
        let lines = buffer(
            "const safeConfig = {\n  setting: \"default\",\n};\n\nfunction configure() {\n  setting: \"default\",\n}\n",
        );
        let range =
            locate_snippet(&lines, "setting: \"default\",", Some("function configure() {"))
                .unwrap();
        assert_eq!(range, LineRange::new(5, 5));
    }

    #[test]
    fn anchor_body_does_not_self_match() {
        // The snippet equals the anchor's own line; scoped search must start
        // on the line after the anchor and therefore miss it.
        let lines = buffer("marker\nother\n");
        let err = locate_snippet(&lines, "marker", Some("marker")).unwrap_err();
        assert!(matches!(err, LocateError::SnippetNotFound { .. }));
    }

    #[test]
    fn anchored_search_takes_first_of_many() {
        let lines = buffer("anchor\ndup\nmid\ndup\n");
        let range = locate_snippet(&lines, "dup", Some("anchor")).unwrap();
        assert_eq!(range, LineRange::new(1, 1));
    }

    #[test]
    fn duplicate_anchor_is_ambiguous() {
        let lines = buffer("a\nx\na\n");
        let err = locate_snippet(&lines, "x", Some("a")).unwrap_err();
        match err {
            LocateError::AnchorAmbiguous { count, .. } => assert_eq!(count, 2),
            other => panic!("expected ambiguous anchor, got {other:?}"),
        }
    }

    #[test]
    fn range_spans_start_to_end() {
        let lines = buffer("def get_pi():\n    x = 1\n    return 3.14\n\nprint(\"x\")\n");
        let range = locate_range(&lines, "def get_pi():", "return 3.14", None).unwrap();
        assert_eq!(range, LineRange::new(0, 2));
    }

    #[test]
    fn range_end_must_follow_start() {
        let lines = buffer("return 3.14\ndef get_pi():\n");
        let err = locate_range(&lines, "def get_pi():", "return 3.14", None).unwrap_err();
        assert!(matches!(err, LocateError::EndSnippetNotFound { .. }));
    }

    #[test]
    fn whitespace_pattern_is_rejected() {
        let lines = buffer("a\n");
        let err = locate_snippet(&lines, "   \n\t\n", None).unwrap_err();
        assert!(matches!(err, LocateError::EmptyPattern));
    }

    #[test]
    fn expansion_stops_at_non_blank_and_edges() {
        let lines = buffer("a\n\n\ntarget\n\nb\n");
        let range = LineRange::new(3, 3);
        let expanded = expand_blank_lines(&lines, range, 1, 5);
        assert_eq!(expanded, LineRange::new(2, 4));

        let expanded = expand_blank_lines(&lines, range, 5, 0);
        // Two blanks above, then a non-blank line stops the walk.
        assert_eq!(expanded, LineRange::new(1, 3));
    }

    #[test]
    fn expansion_at_beginning_of_file() {
        let lines = buffer("\ntarget\n");
        let expanded = expand_blank_lines(&lines, LineRange::new(1, 1), 3, 0);
        assert_eq!(expanded, LineRange::new(0, 1));
    }

    #[test]
    fn fuzzy_suggestions_rank_close_lines() {
        let lines = buffer("setting: \"default\"\nunrelated()\n");
        let suggestions = fuzzy_matches(&lines, "setting: \"defautl\"");
        assert!(!suggestions.is_empty());
        assert_eq!(suggestions[0].line_number, 1);
        assert!(suggestions[0].score >= 0.7);
    }

    #[test]
    fn fuzzy_suggestions_cap_at_three() {
        let lines = buffer("val x = 1\nval x = 2\nval x = 3\nval x = 4\n");
        let suggestions = fuzzy_matches(&lines, "val x = 9");
        assert_eq!(suggestions.len(), 3);
    }
}
