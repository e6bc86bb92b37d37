//! YAML surface dialect, versions 1.0 and 2.0.
//!
//! The two versions differ only in where the locator lives: 1.0 nests it
//! in a `target` mapping (point snippets only), 2.0 puts the fields flat
//! on the modification and adds range snippets.

use serde::Deserialize;

use crate::error::ParseError;
use crate::model::PatchDocument;
use crate::parser::{convert_changes, FileChangeWire, LocatorStyle};

#[derive(Debug, Deserialize)]
struct DocumentWire {
    version: String,
    #[serde(default)]
    changes: Vec<FileChangeWire>,
}

pub(crate) fn parse(input: &str) -> Result<PatchDocument, ParseError> {
    let wire: DocumentWire = serde_yaml::from_str(input)?;
    let style = match wire.version.as_str() {
        "1.0" => LocatorStyle::Nested,
        "2.0" => LocatorStyle::Flat,
        other => {
            return Err(ParseError::UnsupportedVersion {
                version: other.to_string(),
            });
        }
    };
    let changes = convert_changes(wire.changes, style)?;
    Ok(PatchDocument {
        version: wire.version,
        patch_id: None,
        changes,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Modification, Newline, Target};

    #[test]
    fn parses_v2_flat_locators() {
        let doc = parse(
            r#"
version: "2.0"
changes:
  - file_path: "src/g.py"
    modifications:
      - action: REPLACE
        snippet: "print(\"a\")"
        content: "print(\"b\")"
"#,
        )
        .unwrap();

        assert_eq!(doc.version, "2.0");
        assert_eq!(doc.changes.len(), 1);
        let change = &doc.changes[0];
        assert_eq!(change.file_path, "src/g.py");
        match &change.modifications[0] {
            Modification::Replace { locator, content } => {
                assert_eq!(
                    locator.target,
                    Target::Point {
                        snippet: "print(\"a\")".to_string()
                    }
                );
                assert_eq!(content, "print(\"b\")");
            }
            other => panic!("expected REPLACE, got {other:?}"),
        }
    }

    #[test]
    fn parses_v1_nested_target() {
        let doc = parse(
            r#"
version: "1.0"
changes:
  - file_path: "g.py"
    modifications:
      - action: DELETE
        target:
          snippet: "obsolete()"
          anchor: "def main():"
          include_trailing_blank_lines: 1
"#,
        )
        .unwrap();

        match &doc.changes[0].modifications[0] {
            Modification::Delete { locator } => {
                assert_eq!(locator.anchor.as_deref(), Some("def main():"));
                assert_eq!(locator.trailing_blanks, 1);
                assert_eq!(locator.leading_blanks, 0);
            }
            other => panic!("expected DELETE, got {other:?}"),
        }
    }

    #[test]
    fn v1_rejects_flat_locator_fields() {
        let err = parse(
            r#"
version: "1.0"
changes:
  - file_path: "g.py"
    modifications:
      - action: DELETE
        snippet: "x"
"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("inside 'target'"));
    }

    #[test]
    fn v2_rejects_nested_target() {
        let err = parse(
            r#"
version: "2.0"
changes:
  - file_path: "g.py"
    modifications:
      - action: DELETE
        target:
          snippet: "x"
"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("version 1.0 field"));
    }

    #[test]
    fn parses_range_and_blank_expansion() {
        let doc = parse(
            r#"
version: "2.0"
changes:
  - file_path: "calc.py"
    modifications:
      - action: DELETE
        start_snippet: "def get_pi():"
        end_snippet: "return 3.14"
        include_trailing_blank_lines: 1
"#,
        )
        .unwrap();

        match &doc.changes[0].modifications[0] {
            Modification::Delete { locator } => {
                assert!(matches!(locator.target, Target::Range { .. }));
                assert_eq!(locator.trailing_blanks, 1);
            }
            other => panic!("expected DELETE, got {other:?}"),
        }
    }

    #[test]
    fn parses_newline_attribute_and_create_file() {
        let doc = parse(
            r#"
version: "2.0"
changes:
  - file_path: "new/mod.txt"
    newline: CRLF
    modifications:
      - action: CREATE_FILE
        content: "hello"
"#,
        )
        .unwrap();
        assert_eq!(doc.changes[0].newline, Some(Newline::Crlf));
    }

    #[test]
    fn unknown_version_is_rejected() {
        let err = parse("version: \"4.0\"\nchanges: []\n").unwrap_err();
        assert_eq!(err.code(), "INVALID_PATCH_FILE");
        assert!(err.to_string().contains("4.0"));
    }

    #[test]
    fn missing_version_is_malformed() {
        let err = parse("changes: []\n").unwrap_err();
        assert_eq!(err.code(), "INVALID_PATCH_FILE");
    }

    #[test]
    fn empty_change_list_is_valid() {
        let doc = parse("version: \"2.0\"\nchanges: []\n").unwrap();
        assert!(doc.changes.is_empty());
    }
}
