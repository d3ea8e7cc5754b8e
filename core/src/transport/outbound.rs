//! Outbound planner: debounce and full-vs-patch decision on the sender
//!
//! The planner tracks two texts:
//! - `pending`: the latest text seen in the editor
//! - `baseline`: what the receiver holds once our last send was applied
//!
//! Each polling tick the caller feeds the current text to `observe`, then
//! asks `poll` for something to send. Once the send succeeds it hands the
//! plan back to `commit`. Nothing here is shared: one owner, one tick at a
//! time.

use std::time::{Duration, Instant};
use tracing::debug;

use crate::message::MessageBody;
use crate::patch::PatchConfig;

/// A message body ready to go out, plus the baseline to adopt once it is sent
#[derive(Debug, Clone, PartialEq)]
pub struct Planned {
    pub body: MessageBody,
    next_baseline: String,
}

impl Planned {
    /// The text this body delivers, line for line
    pub fn next_baseline(&self) -> &str {
        &self.next_baseline
    }
}

#[derive(Debug, Clone)]
pub struct Outbound {
    baseline: String,
    pending: String,
    last_edit: Instant,
    settle: Duration,
    patch: PatchConfig,
}

impl Outbound {
    pub fn new(settle: Duration, patch: PatchConfig, now: Instant) -> Self {
        Self {
            baseline: String::new(),
            pending: String::new(),
            last_edit: now,
            settle,
            patch,
        }
    }

    /// Record the editor's current text. Returns true if it changed.
    pub fn observe(&mut self, text: &str, now: Instant) -> bool {
        if text == self.pending {
            return false;
        }
        self.pending.clear();
        self.pending.push_str(text);
        self.last_edit = now;
        true
    }

    /// The text has been idle for at least the settle time
    pub fn is_settled(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.last_edit) >= self.settle
    }

    /// Decide what, if anything, to send now.
    ///
    /// Returns a patch when the edit ratio allows one and a full message
    /// otherwise. A change that leaves every line as it was (say, only a
    /// trailing newline) is folded into the baseline without a send.
    pub fn poll(&mut self, now: Instant) -> Option<Planned> {
        if !self.is_settled(now) || self.pending == self.baseline {
            return None;
        }

        match self.patch.diff(&self.baseline, &self.pending) {
            Ok(patches) if patches.is_empty() => {
                self.baseline.clone_from(&self.pending);
                None
            }
            // The receiver may end up without trailing empty lines that
            // `pending` has; a later insert past them pads them back.
            Ok(patches) => Some(Planned {
                body: MessageBody::Patch { patches },
                next_baseline: self.pending.clone(),
            }),
            Err(refused) => {
                debug!("Sending full text: {}", refused);
                Some(Planned {
                    body: MessageBody::Full {
                        text: self.pending.clone(),
                    },
                    next_baseline: self.pending.clone(),
                })
            }
        }
    }

    /// The planned body was sent; move the baseline forward.
    pub fn commit(&mut self, planned: Planned) {
        self.baseline = planned.next_baseline;
    }

    /// Some observed text has not been delivered yet
    pub fn has_unsent(&self) -> bool {
        self.pending != self.baseline
    }

    /// New connection: the receiver starts from nothing.
    pub fn reset(&mut self) {
        self.baseline.clear();
    }

    pub fn baseline(&self) -> &str {
        &self.baseline
    }

    pub fn pending(&self) -> &str {
        &self.pending
    }
}
