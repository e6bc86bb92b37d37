//! Transaction driver: parse, locate, mutate in memory, then commit all
//! buffers or none.
//!
//! Disk is never opened for writing during the application phase. Every
//! finalized buffer is accumulated first; only after the whole document has
//! applied cleanly does the commit loop write each file via tempfile +
//! fsync + rename. A logical failure therefore always leaves the tree
//! byte-identical to its pre-application state.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use tracing::{debug, info};

use crate::error::{ApplyError, ModifyError};
use crate::model::{FileChange, Modification, PatchDocument};
use crate::parser::{self, prefixed};
use crate::session::{FileSession, ModOutcome};

/// Name of the patch written by a forced run to hold the failing subset.
pub const FAILURE_CAPTURE_NAME: &str = "afailed.ap";

#[derive(Debug, Clone, Copy, Default)]
pub struct ApplyOptions {
    /// Run the full pipeline but do not touch the filesystem.
    pub dry_run: bool,
    /// Apply what can be applied; collect locate failures into
    /// `afailed.ap` instead of aborting.
    pub force: bool,
}

/// Outcome of one modification, for reporting.
#[derive(Debug, Clone)]
pub struct ModReport {
    pub file_path: String,
    /// 0-based index within the file change.
    pub index: usize,
    pub action: &'static str,
    pub outcome: ModOutcome,
}

/// A modification that failed under `--force`.
#[derive(Debug)]
pub struct FailedModification {
    pub file_path: String,
    pub index: usize,
    pub action: &'static str,
    pub error: ModifyError,
}

/// A file the transaction decided to (or did) write.
#[derive(Debug, Clone)]
pub struct PlannedWrite {
    pub rel_path: String,
    pub path: PathBuf,
    pub contents: String,
}

#[derive(Debug, Default)]
pub struct ApplyReport {
    pub outcomes: Vec<ModReport>,
    /// Only populated by forced runs.
    pub failures: Vec<FailedModification>,
    /// Files with changed content. Written to disk unless this was a dry
    /// run.
    pub writes: Vec<PlannedWrite>,
    pub committed: bool,
}

impl ApplyReport {
    pub fn applied_count(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| o.outcome == ModOutcome::Applied)
            .count()
    }

    pub fn skipped_count(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| o.outcome == ModOutcome::Skipped)
            .count()
    }
}

/// Parse the patch at `patch_path` and apply it to the tree under
/// `project_root`.
pub fn apply_patch_file(
    patch_path: &Path,
    project_root: &Path,
    options: ApplyOptions,
) -> Result<ApplyReport, ApplyError> {
    let document = parser::load_from_path(patch_path)?;
    apply_document(&document, project_root, options)
}

/// Apply an already-parsed document. See the module docs for the
/// transaction contract.
pub fn apply_document(
    document: &PatchDocument,
    project_root: &Path,
    options: ApplyOptions,
) -> Result<ApplyReport, ApplyError> {
    let capture_path = project_root.join(FAILURE_CAPTURE_NAME);
    if options.force && capture_path.exists() {
        return Err(ApplyError::CaptureFileExists);
    }

    let mut sessions: Vec<FileSession> = Vec::new();
    let mut session_index: HashMap<String, usize> = HashMap::new();
    let mut outcomes = Vec::new();
    let mut failures: Vec<FailedModification> = Vec::new();
    let mut failed_changes: Vec<FileChange> = Vec::new();

    for change in &document.changes {
        let session_id = match session_index.get(&change.file_path).copied() {
            Some(id) => id,
            None => {
                let session =
                    FileSession::open(project_root, &change.file_path, change.newline).map_err(
                        |source| ApplyError::Io {
                            path: project_root.join(&change.file_path),
                            source,
                        },
                    )?;
                let creates = change
                    .modifications
                    .iter()
                    .any(|m| matches!(m, Modification::CreateFile { .. }));
                if !session.exists() && !creates {
                    return Err(ApplyError::FileNotFound {
                        path: change.file_path.clone(),
                    });
                }
                sessions.push(session);
                session_index.insert(change.file_path.clone(), sessions.len() - 1);
                sessions.len() - 1
            }
        };

        for (index, modification) in change.modifications.iter().enumerate() {
            debug!(
                file = %change.file_path,
                index = index + 1,
                action = modification.action(),
                "applying modification"
            );
            match sessions[session_id].apply(modification) {
                Ok(outcome) => outcomes.push(ModReport {
                    file_path: change.file_path.clone(),
                    index,
                    action: modification.action(),
                    outcome,
                }),
                Err(error) => {
                    if options.force && matches!(error, ModifyError::Locate(_)) {
                        record_failure(&mut failed_changes, change, modification);
                        failures.push(FailedModification {
                            file_path: change.file_path.clone(),
                            index,
                            action: modification.action(),
                            error,
                        });
                        continue;
                    }
                    return Err(ApplyError::Modification {
                        path: change.file_path.clone(),
                        index,
                        action: modification.action(),
                        source: error,
                    });
                }
            }
        }
    }

    let writes: Vec<PlannedWrite> = sessions
        .iter()
        .filter(|s| s.is_modified())
        .map(|s| PlannedWrite {
            rel_path: s.rel_path().to_string(),
            path: s.abs_path().to_path_buf(),
            contents: s.finalize(),
        })
        .collect();

    if !failures.is_empty() {
        let patch_id = document.patch_id.as_deref().unwrap_or("00000000");
        let capture = prefixed::serialize_failures(patch_id, &failed_changes);
        if !options.dry_run {
            fs::write(&capture_path, capture).map_err(|source| ApplyError::Io {
                path: capture_path.clone(),
                source,
            })?;
            info!(path = %capture_path.display(), "wrote failing subset");
        }
        if writes.is_empty() {
            return Err(ApplyError::AllChangesFailed);
        }
    }

    if !options.dry_run {
        for write in &writes {
            commit_file(&write.path, &write.contents).map_err(|source| ApplyError::Io {
                path: write.path.clone(),
                source,
            })?;
            debug!(path = %write.path.display(), bytes = write.contents.len(), "committed");
        }
    }

    Ok(ApplyReport {
        outcomes,
        failures,
        writes,
        committed: !options.dry_run,
    })
}

/// Group a failed modification under its file, preserving document order,
/// so the capture file round-trips as one change block per file.
fn record_failure(
    failed_changes: &mut Vec<FileChange>,
    change: &FileChange,
    modification: &Modification,
) {
    let block = match failed_changes
        .iter()
        .position(|c| c.file_path == change.file_path)
    {
        Some(idx) => idx,
        None => {
            failed_changes.push(FileChange {
                file_path: change.file_path.clone(),
                newline: change.newline,
                modifications: Vec::new(),
            });
            failed_changes.len() - 1
        }
    };
    failed_changes[block].modifications.push(modification.clone());
}

/// Atomic write: tempfile in the target directory, fsync, rename, then an
/// mtime touch so incremental build tools notice the change.
fn commit_file(path: &Path, contents: &str) -> io::Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => {
            fs::create_dir_all(parent)?;
            parent
        }
        _ => Path::new("."),
    };

    let mut temp = NamedTempFile::new_in(dir)?;
    temp.write_all(contents.as_bytes())?;
    temp.as_file().sync_all()?;
    temp.persist(path).map_err(|e| e.error)?;

    filetime::set_file_mtime(path, filetime::FileTime::now())?;
    Ok(())
}
