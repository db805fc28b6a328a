//! Scoped working-directory swap for the colorization library.

use std::env;
use std::path::{Path, PathBuf};

use tracing::{debug, error};

use crate::error::{Error, Result};

/// Records the caller's working directory, switches to the library's, and
/// guarantees restoration on every exit path.
///
/// The happy path calls [`restore`](Self::restore) so a failure there is
/// surfaced; any other path (early return, propagated error) restores via
/// `Drop`, which logs a failed restore but never masks the error already in
/// flight. Either way restoration runs exactly once.
pub struct WorkingDirectoryScope {
    original: PathBuf,
    restored: bool,
}

impl WorkingDirectoryScope {
    pub fn enter(target: &Path) -> Result<Self> {
        let original = env::current_dir()?;
        env::set_current_dir(target)?;
        debug!(
            from = %original.display(),
            to = %target.display(),
            "working directory swapped"
        );
        Ok(Self {
            original,
            restored: false,
        })
    }

    /// The directory that will be restored.
    pub fn original(&self) -> &Path {
        &self.original
    }

    /// Restore explicitly, surfacing a failure to the caller.
    pub fn restore(mut self) -> Result<()> {
        self.restored = true;
        env::set_current_dir(&self.original).map_err(|e| {
            Error::DirectoryRestoreFailed(format!("{}: {e}", self.original.display()))
        })
    }
}

impl Drop for WorkingDirectoryScope {
    fn drop(&mut self) {
        if self.restored {
            return;
        }
        if let Err(e) = env::set_current_dir(&self.original) {
            error!(
                dir = %self.original.display(),
                error = %e,
                "failed to restore working directory"
            );
        }
    }
}
