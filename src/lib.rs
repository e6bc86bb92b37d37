//! Snippet Patcher: declarative, snippet-addressed patching for text trees
//!
//! A patching system that locates edit targets by semantic code fragments
//! instead of line numbers, so patches survive whitespace and formatting
//! drift in the files they target.
//!
//! # Architecture
//!
//! A patch document (YAML v1.0/v2.0 or the line-prefixed AP 3.0 dialect)
//! decodes to an ordered list of file changes. For each file, a
//! [`FileSession`] holds the buffer; the locator resolves each anchor and
//! snippet to a line range under normalized matching (blank lines ignored,
//! horizontal whitespace trimmed), inserted content is reflowed to the
//! located region's indent, and already-applied modifications become
//! silent skips. Mutation happens purely in memory.
//!
//! # Safety
//!
//! - All-or-nothing commit: buffers are flushed only after every
//!   modification in the document succeeded
//! - Atomic file writes (tempfile + fsync + rename)
//! - Relative target paths only; `..` components are rejected
//! - `CREATE_FILE` never overwrites differing content
//! - Re-applying a patch is a no-op
//!
//! # Example
//!
//! ```no_run
//! use std::path::Path;
//! use snippet_patcher::{apply_patch_file, ApplyOptions};
//!
//! let report = apply_patch_file(
//!     Path::new("fix.ap"),
//!     Path::new("."),
//!     ApplyOptions::default(),
//! )?;
//! println!("{} applied, {} skipped", report.applied_count(), report.skipped_count());
//! # Ok::<(), snippet_patcher::ApplyError>(())
//! ```

pub mod apply;
pub mod error;
pub mod indent;
pub mod locate;
pub mod model;
pub mod normalize;
pub mod parser;
pub mod session;

// Re-exports
pub use apply::{
    apply_document, apply_patch_file, ApplyOptions, ApplyReport, FailedModification, ModReport,
    PlannedWrite, FAILURE_CAPTURE_NAME,
};
pub use error::{ApplyError, FuzzyMatch, LocateError, ModifyError, ParseError};
pub use locate::{locate_anchor, locate_range, locate_snippet, LineRange};
pub use model::{FileChange, Locator, Modification, Newline, PatchDocument, Target};
pub use parser::{load_from_path, parse_str};
pub use session::{FileSession, ModOutcome};
