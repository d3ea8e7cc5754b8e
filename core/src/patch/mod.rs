//! Line Patch Engine: index-aligned line edits between two texts
//!
//! `calc_patches` compares two texts line by line at equal indices and either
//! returns the edits or refuses when too much changed, in which case the
//! sender should ship the full text instead.
//!
//! `apply_patches` resolves every edit against the original line numbering
//! of the base text: deletions leave a tombstone instead of shifting the
//! lines after them, so an edit list produced by `calc_patches` applies in
//! any order with the same result.

pub mod apply;
pub mod diff;

pub use apply::{apply_patches, apply_patches_with_slack};
pub use diff::{calc_patches, edit_ratio, split_lines, Refused};

/// Above this share of changed lines a patch is refused
pub const DEFAULT_MAX_PATCH_RATIO: f64 = 0.30;

/// How far past the current end an insert may land before it is ignored
pub const DEFAULT_GROWTH_SLACK: usize = 100;

/// Tunables for the patch engine
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PatchConfig {
    /// Maximum changed/total line ratio for a patch to be produced
    pub max_ratio: f64,
    /// Maximum gap (in lines) an out-of-range insert may open up
    pub growth_slack: usize,
}

impl Default for PatchConfig {
    fn default() -> Self {
        Self {
            max_ratio: DEFAULT_MAX_PATCH_RATIO,
            growth_slack: DEFAULT_GROWTH_SLACK,
        }
    }
}

impl PatchConfig {
    pub fn with_max_ratio(mut self, max_ratio: f64) -> Self {
        self.max_ratio = max_ratio;
        self
    }

    pub fn with_growth_slack(mut self, growth_slack: usize) -> Self {
        self.growth_slack = growth_slack;
        self
    }

    /// `calc_patches` with this config's ratio
    pub fn diff(&self, old: &str, new: &str) -> Result<Vec<crate::message::PatchOp>, Refused> {
        calc_patches(old, new, self.max_ratio)
    }

    /// `apply_patches` with this config's slack
    pub fn apply(&self, base: &str, patches: &[crate::message::PatchOp]) -> String {
        apply_patches_with_slack(base, patches, self.growth_slack)
    }
}
