use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use colored::Colorize;
use similar::{ChangeTag, TextDiff};
use snippet_patcher::{
    apply_document, load_from_path, ApplyError, ApplyOptions, ApplyReport, LocateError,
    ModOutcome, ModifyError, PatchDocument, FAILURE_CAPTURE_NAME,
};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "snippet-patcher")]
#[command(about = "Apply a snippet-addressed patch to a text file tree", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to the patch file (YAML or line-prefixed dialect)
    #[arg(value_name = "PATCH")]
    patch_file: Option<PathBuf>,

    /// Path to the patch file (alternative to the positional form)
    #[arg(long = "patch", value_name = "PATH", conflicts_with = "patch_file")]
    patch: Option<PathBuf>,

    /// Root directory of the tree the patch applies to
    #[arg(long, default_value = ".", value_name = "DIR")]
    dir: PathBuf,

    /// Run the full pipeline but do not modify any files
    #[arg(short = 'n', long)]
    dry_run: bool,

    /// Show a unified diff of each changed file
    #[arg(long)]
    diff: bool,

    /// Apply what can be applied and save failing modifications to afailed.ap
    #[arg(short, long)]
    force: bool,

    /// Emit a machine-readable JSON object on failure
    #[arg(long)]
    json_report: bool,

    /// Enable detailed debug logging
    #[arg(long)]
    debug: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.debug);

    let patch_path = match cli.patch_file.clone().or_else(|| cli.patch.clone()) {
        Some(path) => path,
        None => {
            eprintln!(
                "{}",
                "error: a patch file is required (positional or --patch)".red()
            );
            return ExitCode::from(2);
        }
    };

    match run(&cli, &patch_path) {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            if let Some(apply_error) = error.downcast_ref::<ApplyError>() {
                if cli.json_report {
                    match serde_json::to_string_pretty(&failure_json(apply_error)) {
                        Ok(json) => println!("{json}"),
                        Err(e) => eprintln!("failed to render JSON report: {e}"),
                    }
                } else {
                    print_failure(apply_error);
                }
            } else {
                eprintln!("{}", format!("ERROR: {error:#}").red());
            }
            ExitCode::from(1)
        }
    }
}

fn run(cli: &Cli, patch_path: &Path) -> anyhow::Result<()> {
    let project_root = cli
        .dir
        .canonicalize()
        .with_context(|| format!("cannot access project directory {}", cli.dir.display()))?;

    let document = load_from_path(patch_path).map_err(ApplyError::Parse)?;

    // Capture pre-application contents of the targets so --diff can show
    // what changed even on a dry run.
    let before = if cli.diff {
        capture_before(&document, &project_root)
    } else {
        HashMap::new()
    };

    if cli.dry_run {
        println!(
            "{}",
            "[DRY RUN - showing what would be applied]".cyan()
        );
    }

    let options = ApplyOptions {
        dry_run: cli.dry_run,
        force: cli.force,
    };
    let report = apply_document(&document, &project_root, options)?;

    for outcome in &report.outcomes {
        match outcome.outcome {
            ModOutcome::Applied => println!(
                "{} {} #{} applied to {}",
                "✓".green(),
                outcome.action,
                outcome.index + 1,
                outcome.file_path
            ),
            ModOutcome::Skipped => println!(
                "{} {} #{} already applied to {}",
                "⊙".yellow(),
                outcome.action,
                outcome.index + 1,
                outcome.file_path
            ),
        }
    }

    for failure in &report.failures {
        eprintln!(
            "{} {} #{} failed on {}: {}",
            "✗".red(),
            failure.action,
            failure.index + 1,
            failure.file_path,
            failure.error
        );
    }
    if !report.failures.is_empty() && report.committed {
        eprintln!(
            "{}",
            format!("Warning: some changes failed and were written to {FAILURE_CAPTURE_NAME}")
                .yellow()
        );
    }

    if cli.diff {
        for write in &report.writes {
            let previous = before.get(&write.rel_path).map(String::as_str).unwrap_or("");
            display_diff(&write.rel_path, previous, &write.contents);
        }
    }

    print_summary(&report, cli);
    Ok(())
}

fn capture_before(document: &PatchDocument, project_root: &Path) -> HashMap<String, String> {
    let mut contents = HashMap::new();
    for change in &document.changes {
        if contents.contains_key(&change.file_path) {
            continue;
        }
        if let Ok(text) = fs::read_to_string(project_root.join(&change.file_path)) {
            contents.insert(change.file_path.clone(), text);
        }
    }
    contents
}

fn print_summary(report: &ApplyReport, cli: &Cli) {
    println!();
    println!("{}", "Summary:".bold());
    println!(
        "  {} applied",
        report.applied_count().to_string().green()
    );
    println!(
        "  {} skipped",
        report.skipped_count().to_string().yellow()
    );
    if cli.force {
        println!("  {} failed", report.failures.len().to_string().red());
    }
    let verb = if cli.dry_run { "would change" } else { "written" };
    println!("  {} file(s) {verb}", report.writes.len());
}

/// Unified diff of one file, original vs patched.
fn display_diff(path: &str, original: &str, modified: &str) {
    println!("\n{}", format!("--- {path} (original)").dimmed());
    println!("{}", format!("+++ {path} (patched)").dimmed());

    let diff = TextDiff::from_lines(original, modified);

    for change in diff.iter_all_changes() {
        let sign = match change.tag() {
            ChangeTag::Delete => format!("-{change}").red(),
            ChangeTag::Insert => format!("+{change}").green(),
            ChangeTag::Equal => format!(" {change}").normal(),
        };
        print!("{sign}");
    }
}

/// Human diagnostics to stderr: the offending file and 1-based
/// modification index, the patterns involved, and near-miss suggestions.
fn print_failure(error: &ApplyError) {
    let file_info = error
        .file_path()
        .map(|p| format!(" in file '{p}'"))
        .unwrap_or_default();
    let mod_info = error
        .mod_index()
        .map(|i| format!(" (modification #{})", i + 1))
        .unwrap_or_default();
    eprintln!("\n{}", format!("ERROR{file_info}{mod_info}: {error}").red());

    if let ApplyError::Modification {
        source: ModifyError::Locate(locate),
        ..
    } = error
    {
        print_locate_context(locate);
    }
}

fn print_snippet_block(name: &str, value: &str) {
    eprintln!("  {name}:");
    for line in value.trim().lines() {
        eprintln!("    {}", line.trim_end());
    }
}

fn print_locate_context(error: &LocateError) {
    match error {
        LocateError::AnchorNotFound { anchor } | LocateError::AnchorAmbiguous { anchor, .. } => {
            print_snippet_block("Anchor", anchor);
        }
        LocateError::SnippetNotFound {
            snippet,
            anchor,
            suggestions,
        } => {
            if let Some(anchor) = anchor {
                print_snippet_block("Anchor", anchor);
            }
            print_snippet_block("Snippet", snippet);
            if !suggestions.is_empty() {
                eprintln!("  Did you mean one of these?");
                for suggestion in suggestions {
                    eprintln!(
                        "    Line {} (Score: {}): {}",
                        suggestion.line_number, suggestion.score, suggestion.text
                    );
                }
            }
        }
        LocateError::SnippetAmbiguous { snippet, .. } => {
            print_snippet_block("Snippet", snippet);
        }
        LocateError::EndSnippetNotFound {
            start_snippet,
            end_snippet,
        } => {
            print_snippet_block("Start Snippet", start_snippet);
            print_snippet_block("End Snippet", end_snippet);
        }
        LocateError::EmptyPattern => {}
    }
}

/// Machine-readable failure report, shaped like the debug tooling that
/// consumes it expects: status, file_path, 0-based mod_idx, and an error
/// object with code, message, and context.
fn failure_json(error: &ApplyError) -> serde_json::Value {
    let mut report = serde_json::json!({
        "status": "FAILED",
        "error": {
            "code": error.code(),
            "message": error.to_string(),
        },
    });
    if let Some(path) = error.file_path() {
        report["file_path"] = path.into();
    }
    if let Some(index) = error.mod_index() {
        report["mod_idx"] = index.into();
    }
    if let ApplyError::Modification {
        source: ModifyError::Locate(locate),
        action,
        ..
    } = error
    {
        report["error"]["context"] = locate_context_json(locate, action);
    }
    report
}

fn locate_context_json(error: &LocateError, action: &str) -> serde_json::Value {
    let mut ctx = serde_json::json!({ "action": action });
    match error {
        LocateError::AnchorNotFound { anchor } => {
            ctx["anchor"] = anchor.as_str().into();
        }
        LocateError::AnchorAmbiguous { anchor, count } => {
            ctx["anchor"] = anchor.as_str().into();
            ctx["count"] = (*count).into();
        }
        LocateError::SnippetNotFound {
            snippet,
            anchor,
            suggestions,
        } => {
            ctx["snippet"] = snippet.as_str().into();
            if let Some(anchor) = anchor {
                ctx["anchor"] = anchor.as_str().into();
            }
            ctx["fuzzy_matches"] =
                serde_json::to_value(suggestions).unwrap_or(serde_json::Value::Null);
        }
        LocateError::SnippetAmbiguous { snippet, count } => {
            ctx["snippet"] = snippet.as_str().into();
            ctx["count"] = (*count).into();
        }
        LocateError::EndSnippetNotFound {
            start_snippet,
            end_snippet,
        } => {
            ctx["start_snippet"] = start_snippet.as_str().into();
            ctx["end_snippet"] = end_snippet.as_str().into();
        }
        LocateError::EmptyPattern => {}
    }
    ctx
}

fn init_tracing(debug: bool) {
    let filter = if debug {
        EnvFilter::new("snippet_patcher=debug")
    } else {
        EnvFilter::from_default_env()
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
