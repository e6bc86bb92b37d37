//! Line normalization shared by pattern preparation and buffer search.
//!
//! Matching is line-oriented on trimmed content: blank lines are dropped,
//! and each surviving line is compared with horizontal whitespace removed
//! from both ends. The same rules apply to the anchor/snippet text and to
//! the target buffer, so a match depends only on trimmed non-blank content.

/// Trim horizontal whitespace (spaces and tabs) from both ends of a line.
pub fn trim_horizontal(line: &str) -> &str {
    line.trim_matches(|c| c == ' ' || c == '\t')
}

/// A line is blank when it is empty or horizontal whitespace only.
pub fn is_blank(line: &str) -> bool {
    trim_horizontal(line).is_empty()
}

/// Normalize a pattern (anchor or snippet) into its trimmed non-blank lines.
pub fn normalize_pattern(text: &str) -> Vec<&str> {
    text.lines()
        .map(trim_horizontal)
        .filter(|l| !l.is_empty())
        .collect()
}

/// A surviving line of a normalized buffer, with its origin index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NormalizedLine<'a> {
    /// Index of this line in the original buffer.
    pub origin: usize,
    /// The trimmed line content.
    pub text: &'a str,
}

/// Normalized view of a line buffer: blank lines removed, the rest trimmed,
/// each entry carrying the index it came from so the locator can recover
/// original line ranges.
#[derive(Debug)]
pub struct NormalizedView<'a> {
    entries: Vec<NormalizedLine<'a>>,
}

impl<'a> NormalizedView<'a> {
    pub fn new(lines: &'a [String]) -> Self {
        let entries = lines
            .iter()
            .enumerate()
            .filter_map(|(origin, raw)| {
                let text = trim_horizontal(raw);
                (!text.is_empty()).then_some(NormalizedLine { origin, text })
            })
            .collect();
        Self { entries }
    }

    pub fn entries(&self) -> &[NormalizedLine<'a>] {
        &self.entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn buffer(lines: &[&str]) -> Vec<String> {
        lines.iter().map(|l| l.to_string()).collect()
    }

    #[test]
    fn trims_spaces_and_tabs_only() {
        assert_eq!(trim_horizontal("  \tfoo \t"), "foo");
        assert_eq!(trim_horizontal("foo bar"), "foo bar");
    }

    #[test]
    fn pattern_drops_blank_lines() {
        let lines = normalize_pattern("\n  def f():\n\n      return 1\n   \n");
        assert_eq!(lines, vec!["def f():", "return 1"]);
    }

    #[test]
    fn pattern_of_whitespace_is_empty() {
        assert!(normalize_pattern("   \n\t\n").is_empty());
        assert!(normalize_pattern("").is_empty());
    }

    #[test]
    fn view_keeps_origin_indices() {
        let lines = buffer(&["a", "", "  b  ", "\t", "c"]);
        let view = NormalizedView::new(&lines);
        let entries = view.entries();
        assert_eq!(entries.len(), 3);
        assert_eq!((entries[0].origin, entries[0].text), (0, "a"));
        assert_eq!((entries[1].origin, entries[1].text), (2, "b"));
        assert_eq!((entries[2].origin, entries[2].text), (4, "c"));
    }

    #[test]
    fn blank_detection() {
        assert!(is_blank(""));
        assert!(is_blank("   \t"));
        assert!(!is_blank(" x "));
    }
}
