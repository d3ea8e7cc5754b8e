// padsync core: live text mirroring between two machines
//
// A sender watches a document and ships it to one receiver as full snapshots
// or line patches. Every message is canonical JSON, checksummed, compressed,
// base64-wrapped and length-prefixed on a plain TCP stream.
//
// Layers, bottom up:
//   wire     : zlib helpers, length-prefixed frames
//   message  : types, canonical JSON, checksum, envelope codec
//   patch    : line diff and apply
//   replica  : receiver-side document state
//   transport: sender link, receive loop, LAN discovery

pub mod config;
pub mod message;
pub mod patch;
pub mod replica;
pub mod transport;
pub mod wire;

pub use config::SyncConfig;
pub use message::{
    compute_checksum, decode, decode_value, encode, to_canonical_bytes, verify, CanonicalError,
    EnvelopeError, Message, MessageBody, PatchOp,
};
pub use patch::{apply_patches, apply_patches_with_slack, calc_patches, PatchConfig, Refused};
pub use replica::{ApplyOutcome, Replica, ReplicaState};
pub use transport::{
    accept_frame, run_receiver, serve_connection, ConnectionEnd, Outbound, Planned,
    CloseWatch, ReceiverEvent, Rejected, SenderLink, TransportError,
};
pub use wire::{frame, read_frame, read_frame_bounded, write_frame, FrameError};
