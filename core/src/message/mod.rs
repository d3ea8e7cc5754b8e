// Message module: types, canonical form, integrity and envelope codec

pub mod canonical;
pub mod checksum;
pub mod codec;
pub mod types;

pub use canonical::{to_canonical_bytes, CanonicalError};
pub use checksum::{compute_checksum, verify};
pub use codec::{decode, decode_value, encode, message_from_value, EnvelopeError};
pub use types::{Message, MessageBody, PatchOp};
