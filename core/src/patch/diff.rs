// Line diff: index-aligned comparison with a refusal threshold

use thiserror::Error;

use crate::message::PatchOp;

/// The texts differ too much for a patch to be worthwhile.
#[derive(Debug, Clone, Copy, PartialEq, Error)]
#[error("edit ratio {ratio:.2} ({changed}/{total} lines) exceeds {max_ratio:.2}")]
pub struct Refused {
    pub changed: usize,
    pub total: usize,
    pub ratio: f64,
    pub max_ratio: f64,
}

/// Split text into lines on `\n` / `\r\n`. A trailing newline does not
/// produce an extra empty line.
pub fn split_lines(text: &str) -> Vec<&str> {
    text.lines().collect()
}

/// Share of changed lines. With no lines at all, any change counts as a
/// complete rewrite.
pub fn edit_ratio(changed: usize, total: usize) -> f64 {
    if total == 0 {
        if changed > 0 {
            1.0
        } else {
            0.0
        }
    } else {
        changed as f64 / total as f64
    }
}

/// Compute the line edits turning `old_text` into `new_text`.
///
/// Line `i` of the old text is compared with line `i` of the new one. Each
/// mismatch yields `PatchOp(i, new line)`, or `PatchOp(i, None)` when the
/// new text has no line `i`. Ops are in ascending index order.
pub fn calc_patches(old_text: &str, new_text: &str, max_ratio: f64) -> Result<Vec<PatchOp>, Refused> {
    let old_lines = split_lines(old_text);
    let new_lines = split_lines(new_text);
    let total = old_lines.len().max(new_lines.len());

    let mut patches = Vec::new();
    for i in 0..total {
        let old = old_lines.get(i);
        let new = new_lines.get(i);
        if old != new {
            patches.push(PatchOp {
                index: i,
                line: new.map(|line| line.to_string()),
            });
        }
    }

    let changed = patches.len();
    let ratio = edit_ratio(changed, total);
    if ratio > max_ratio {
        return Err(Refused {
            changed,
            total,
            ratio,
            max_ratio,
        });
    }
    Ok(patches)
}
