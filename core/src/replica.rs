// Replica: receiver-side copy of the sender's document
//
// Lives for one connection. Messages are applied in seq order; anything at or
// below the last applied seq is stale and dropped. There is no gap detection:
// a lost patch leaves the copy out of sync until the next full message.

use tracing::debug;

use crate::message::{Message, MessageBody};
use crate::patch::{apply_patches_with_slack, split_lines, DEFAULT_GROWTH_SLACK};

/// Where the replica stands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplicaState {
    /// Nothing applied yet on this connection
    Empty,
    /// Last applied message had this seq
    Synced(u64),
}

/// What `Replica::apply` did with a message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// Full message: document replaced
    Replaced,
    /// Patch message: edits applied
    Patched,
    /// seq not newer than the last applied one; nothing changed
    Stale { seq: u64, last: u64 },
}

impl ApplyOutcome {
    pub fn is_applied(&self) -> bool {
        !matches!(self, ApplyOutcome::Stale { .. })
    }
}

#[derive(Debug, Clone)]
pub struct Replica {
    text: String,
    state: ReplicaState,
    growth_slack: usize,
}

impl Default for Replica {
    fn default() -> Self {
        Self::new()
    }
}

impl Replica {
    pub fn new() -> Self {
        Self::with_growth_slack(DEFAULT_GROWTH_SLACK)
    }

    pub fn with_growth_slack(growth_slack: usize) -> Self {
        Self {
            text: String::new(),
            state: ReplicaState::Empty,
            growth_slack,
        }
    }

    pub fn state(&self) -> ReplicaState {
        self.state
    }

    /// Seq of the last applied message, 0 while empty
    pub fn last_seq(&self) -> u64 {
        match self.state {
            ReplicaState::Empty => 0,
            ReplicaState::Synced(seq) => seq,
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn lines(&self) -> Vec<&str> {
        split_lines(&self.text)
    }

    /// Apply an accepted (already verified) message.
    pub fn apply(&mut self, message: &Message) -> ApplyOutcome {
        let last = self.last_seq();
        if message.seq <= last {
            debug!("stale seq {} (last {})", message.seq, last);
            return ApplyOutcome::Stale {
                seq: message.seq,
                last,
            };
        }

        let outcome = match &message.body {
            MessageBody::Full { text } => {
                self.text = text.clone();
                ApplyOutcome::Replaced
            }
            MessageBody::Patch { patches } => {
                self.text = apply_patches_with_slack(&self.text, patches, self.growth_slack);
                ApplyOutcome::Patched
            }
        };
        self.state = ReplicaState::Synced(message.seq);
        debug!("applied {} seq {}", message.kind(), message.seq);
        outcome
    }

    /// Back to `Empty`, e.g. when a new connection starts
    pub fn reset(&mut self) {
        self.text.clear();
        self.state = ReplicaState::Empty;
    }
}
