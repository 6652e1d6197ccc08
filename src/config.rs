//! Process-wide tunables and per-call configuration
//!
//! The only environment-level knob this crate recognizes is the number
//! of worker threads used by PDB generation (`pdb_jobs` in the
//! original C sources). We keep a process-wide default for CLI-style
//! callers but every entry point that spawns workers takes an explicit
//! [`GenerationConfig`] so the setting never has to be threaded through
//! a global for library use.

use std::sync::atomic::{AtomicUsize, Ordering};

/// Maximum number of worker threads [`GenerationConfig`] accepts.
pub const PDB_MAX_JOBS: usize = 256;

static PDB_JOBS: AtomicUsize = AtomicUsize::new(1);

/// Returns the process-wide default job count (initially 1).
pub fn pdb_jobs() -> usize {
    PDB_JOBS.load(Ordering::Relaxed)
}

/// Sets the process-wide default job count, clamped to `1..=256`.
pub fn set_pdb_jobs(jobs: usize) {
    PDB_JOBS.store(jobs.clamp(1, PDB_MAX_JOBS), Ordering::Relaxed);
}

/// Configuration for a single [`crate::pdb::generator::generate`] call.
#[derive(Debug, Clone, Copy)]
pub struct GenerationConfig {
    /// Number of OS worker threads used for the parallel BFS, `1..=256`.
    pub jobs: usize,
    /// When set, progress is reported to stderr between BFS depths.
    pub verbose: bool,
}

impl GenerationConfig {
    /// Creates a config with an explicit job count, clamped to `1..=256`.
    pub fn with_jobs(jobs: usize) -> Self {
        Self {
            jobs: jobs.clamp(1, PDB_MAX_JOBS),
            verbose: false,
        }
    }

    /// Enables stderr progress reporting.
    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }
}

impl Default for GenerationConfig {
    /// Uses the process-wide [`pdb_jobs`] default.
    fn default() -> Self {
        Self::with_jobs(pdb_jobs())
    }
}

/// Configuration for [`crate::catalogue::Catalogue::load`].
#[derive(Debug, Clone, Copy, Default)]
pub struct CatalogueLoadConfig {
    /// Rewrite loaded PDBs into identified (diff-encoded) form, matching
    /// `CAT_IDENTIFY` in the original sources.
    pub identify: bool,
    /// When set, load progress is reported to stderr.
    pub verbose: bool,
}
