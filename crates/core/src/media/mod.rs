//! Frame storage and RTP packet encoding.
//!
//! This module owns the two data formats the streamer moves frames through:
//!
//! - [`store`] — the on-disk video format: repeated records of a
//!   5-ASCII-digit length prefix followed by that many raw payload bytes.
//! - [`rtp`] — the 12-byte RTP fixed header (RFC 3550 §5.1) that fronts
//!   every datagram on the data channel.
//!
//! ## RTP overview (RFC 3550)
//!
//! Each stored frame becomes exactly one RTP packet. The fixed header
//! carries:
//!
//! - **Sequence number** (16-bit) — the source frame number truncated to
//!   16 bits; the receiver uses it to drop late and duplicate packets.
//! - **Timestamp** (32-bit) — wall-clock seconds at send time.
//! - **SSRC** (32-bit) — randomly chosen to identify the sender.
//!
//! The payload type for this stream is always [`MJPEG_PAYLOAD_TYPE`]
//! (static type 26, RFC 3551 §6).

pub mod rtp;
pub mod store;

pub use rtp::RtpHeader;
pub use store::{Frame, FrameReader, FrameWriter};

/// Static RTP payload type for JPEG-compressed video (RFC 3551 §6).
pub const MJPEG_PAYLOAD_TYPE: u8 = 26;
