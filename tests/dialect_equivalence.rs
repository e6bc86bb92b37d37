//! The two YAML versions and the line-prefixed dialect are alternate
//! surfaces over one internal modification list: the same logical patch
//! must parse identically through all three.

use snippet_patcher::{parse_str, Modification};

const YAML_V1: &str = r#"
version: "1.0"
changes:
  - file_path: "src/app.py"
    modifications:
      - action: REPLACE
        target:
          snippet: "total = 0"
          anchor: "def summarize(items):"
          include_leading_blank_lines: 1
        content: "total = base"
      - action: INSERT_AFTER
        target:
          snippet: "total = base"
        content: "log(total)"
"#;

const YAML_V2: &str = r#"
version: "2.0"
changes:
  - file_path: "src/app.py"
    modifications:
      - action: REPLACE
        snippet: "total = 0"
        anchor: "def summarize(items):"
        include_leading_blank_lines: 1
        content: "total = base"
      - action: INSERT_AFTER
        snippet: "total = base"
        content: "log(total)"
"#;

const PREFIXED: &str = "\
1f2e3d4c AP 3.0

1f2e3d4c FILE
src/app.py

1f2e3d4c REPLACE
1f2e3d4c anchor
def summarize(items):
1f2e3d4c snippet
total = 0
1f2e3d4c content
total = base
1f2e3d4c include_leading_blank_lines 1

1f2e3d4c INSERT_AFTER
1f2e3d4c snippet
total = base
1f2e3d4c content
log(total)
";

#[test]
fn all_three_dialects_produce_the_same_modifications() {
    let v1 = parse_str(YAML_V1).unwrap();
    let v2 = parse_str(YAML_V2).unwrap();
    let prefixed = parse_str(PREFIXED).unwrap();

    assert_eq!(v1.changes, v2.changes);
    assert_eq!(v2.changes, prefixed.changes);

    assert_eq!(v1.version, "1.0");
    assert_eq!(v2.version, "2.0");
    assert_eq!(prefixed.version, "3.0");
    assert_eq!(prefixed.patch_id.as_deref(), Some("1f2e3d4c"));
}

#[test]
fn parsed_modifications_have_the_expected_shape() {
    let document = parse_str(YAML_V2).unwrap();
    let mods = &document.changes[0].modifications;
    assert_eq!(mods.len(), 2);
    match &mods[0] {
        Modification::Replace { locator, content } => {
            assert_eq!(locator.anchor.as_deref(), Some("def summarize(items):"));
            assert_eq!(locator.leading_blanks, 1);
            assert_eq!(content, "total = base");
        }
        other => panic!("expected REPLACE, got {other:?}"),
    }
    assert!(matches!(&mods[1], Modification::InsertAfter { .. }));
}

#[test]
fn mutually_exclusive_locators_are_malformed() {
    let yaml = r#"
version: "2.0"
changes:
  - file_path: "a.txt"
    modifications:
      - action: REPLACE
        snippet: "x"
        start_snippet: "y"
        end_snippet: "z"
        content: "w"
"#;
    let err = parse_str(yaml).unwrap_err();
    assert_eq!(err.code(), "INVALID_MODIFICATION");
}

#[test]
fn missing_content_is_malformed() {
    let yaml = r#"
version: "2.0"
changes:
  - file_path: "a.txt"
    modifications:
      - action: INSERT_AFTER
        snippet: "x"
"#;
    let err = parse_str(yaml).unwrap_err();
    assert!(err.to_string().contains("requires 'content'"));
}

#[test]
fn yaml_syntax_errors_are_invalid_patch_files() {
    let err = parse_str("version: \"2.0\"\nchanges: [unclosed\n").unwrap_err();
    assert_eq!(err.code(), "INVALID_PATCH_FILE");
}

#[test]
fn prefixed_dialect_with_corrupt_header_is_rejected() {
    let err = parse_str("zz11 AP 3.0\n").unwrap_err();
    assert_eq!(err.code(), "INVALID_PATCH_FILE");
}
