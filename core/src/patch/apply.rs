// Patch application: original-index resolution with a growth guard

use std::panic::{self, AssertUnwindSafe};
use tracing::{error, warn};

use super::diff::split_lines;
use super::DEFAULT_GROWTH_SLACK;
use crate::message::PatchOp;

/// Apply line edits to `base_text` with the default growth slack.
pub fn apply_patches(base_text: &str, patches: &[PatchOp]) -> String {
    apply_patches_with_slack(base_text, patches, DEFAULT_GROWTH_SLACK)
}

/// Apply line edits to `base_text`.
///
/// - in range, `Some(line)`: replace the line
/// - in range, `None`: delete the line
/// - past the end, `Some(line)`: pad with empty lines up to the index, then
///   append; skipped if the index is more than `growth_slack` past the end
/// - past the end, `None`: nothing to delete
///
/// Indices always refer to the base text's numbering. A delete leaves a
/// hole rather than shifting the following lines up.
///
/// Never fails: if anything goes wrong the base text comes back unchanged.
pub fn apply_patches_with_slack(base_text: &str, patches: &[PatchOp], growth_slack: usize) -> String {
    match panic::catch_unwind(AssertUnwindSafe(|| rebuild(base_text, patches, growth_slack))) {
        Ok(text) => text,
        Err(_) => {
            error!("patch apply failed, keeping document unchanged");
            base_text.to_string()
        }
    }
}

fn rebuild(base_text: &str, patches: &[PatchOp], growth_slack: usize) -> String {
    // None marks a deleted slot
    let mut slots: Vec<Option<&str>> = split_lines(base_text).into_iter().map(Some).collect();

    for op in patches {
        let line = op.line.as_deref();
        if op.index < slots.len() {
            slots[op.index] = line;
            continue;
        }

        let Some(line) = line else {
            continue;
        };
        if op.index > slots.len().saturating_add(growth_slack) {
            warn!(
                "patch index {} too far past end ({} lines), ignoring",
                op.index,
                slots.len()
            );
            continue;
        }
        slots.resize(op.index, Some(""));
        slots.push(Some(line));
    }

    slots.into_iter().flatten().collect::<Vec<_>>().join("\n")
}
