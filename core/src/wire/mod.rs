//! Wire layer: byte-level plumbing under the message codec
//!
//! - compress: zlib helpers used by the envelope
//! - frame: 4-byte big-endian length prefix + exact reads over a stream

pub mod compress;
pub mod frame;

pub use frame::{frame, read_frame, read_frame_bounded, write_frame, FrameError, FRAME_HEADER_LEN};
