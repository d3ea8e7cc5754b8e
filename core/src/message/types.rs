// Message types: what the sender puts on the wire

use serde::{Deserialize, Serialize};

use super::checksum::{compute_checksum, verify};
use super::canonical::CanonicalError;

/// One line-level edit.
///
/// `line: Some(..)` replaces the line at `index` (or inserts it past the end),
/// `line: None` means the new text has no line at `index`.
///
/// On the wire this is a two-element array: `[index, line|null]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "(usize, Option<String>)", into = "(usize, Option<String>)")]
pub struct PatchOp {
    pub index: usize,
    pub line: Option<String>,
}

impl PatchOp {
    pub fn replace(index: usize, line: impl Into<String>) -> Self {
        Self {
            index,
            line: Some(line.into()),
        }
    }

    pub fn delete(index: usize) -> Self {
        Self { index, line: None }
    }
}

impl From<(usize, Option<String>)> for PatchOp {
    fn from((index, line): (usize, Option<String>)) -> Self {
        Self { index, line }
    }
}

impl From<PatchOp> for (usize, Option<String>) {
    fn from(op: PatchOp) -> Self {
        (op.index, op.line)
    }
}

/// Message body, tagged by the `type` field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum MessageBody {
    /// Complete document snapshot
    Full { text: String },
    /// Line edits against the previously sent document
    Patch { patches: Vec<PatchOp> },
}

impl MessageBody {
    pub fn kind(&self) -> &'static str {
        match self {
            MessageBody::Full { .. } => "full",
            MessageBody::Patch { .. } => "patch",
        }
    }
}

/// A document update as it travels from sender to receiver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Per-connection sequence number, strictly increasing, starts at 1
    pub seq: u64,
    #[serde(flatten)]
    pub body: MessageBody,
    /// Lowercase hex SHA-256 of the canonical form without this field
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checksum: Option<String>,
}

impl Message {
    /// Create an unstamped full-text message
    pub fn full(seq: u64, text: impl Into<String>) -> Self {
        Self {
            seq,
            body: MessageBody::Full { text: text.into() },
            checksum: None,
        }
    }

    /// Create an unstamped patch message
    pub fn patch(seq: u64, patches: Vec<PatchOp>) -> Self {
        Self {
            seq,
            body: MessageBody::Patch { patches },
            checksum: None,
        }
    }

    /// Attach the integrity checksum, replacing any previous one.
    pub fn stamp(&mut self) -> Result<(), CanonicalError> {
        self.checksum = Some(compute_checksum(self)?);
        Ok(())
    }

    /// Builder-style `stamp`
    pub fn stamped(mut self) -> Result<Self, CanonicalError> {
        self.stamp()?;
        Ok(self)
    }

    /// True when the stored checksum matches the content
    pub fn verify(&self) -> bool {
        verify(self)
    }

    pub fn kind(&self) -> &'static str {
        self.body.kind()
    }
}
