use crate::error::{ProtocolErrorKind, Result, StreamError};

/// Size of the RTP fixed header in bytes (RFC 3550 §5.1).
pub const HEADER_LEN: usize = 12;

/// RTP protocol version written into every header.
pub const RTP_VERSION: u8 = 2;

/// The RTP fixed header (RFC 3550 §5.1).
///
/// ```text
///  0                   1                   2                   3
///  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |V=2|P|X|  CC   |M|     PT      |       Sequence Number         |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |                           Timestamp                           |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |                             SSRC                              |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// ```
///
/// Every field is carried at its wire width, so [`encode`](Self::encode)
/// followed by [`decode`](Self::decode) returns the original values exactly.
/// The sequence number is not an internal counter here: the sender derives
/// it from the source frame number ([`for_frame`](Self::for_frame)), one
/// packet per frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RtpHeader {
    /// Protocol version (2 bits). Always [`RTP_VERSION`] for sent packets.
    pub version: u8,
    /// Padding flag (1 bit).
    pub padding: bool,
    /// Extension flag (1 bit).
    pub extension: bool,
    /// CSRC count (4 bits).
    pub csrc_count: u8,
    /// Marker flag (1 bit).
    pub marker: bool,
    /// Payload type (7 bits, RFC 3551).
    pub payload_type: u8,
    /// Sequence number (16 bits), big-endian on the wire.
    pub sequence: u16,
    /// Timestamp (32 bits), big-endian on the wire.
    pub timestamp: u32,
    /// Synchronization source identifier (32 bits, RFC 3550 §8.1).
    pub ssrc: u32,
}

impl RtpHeader {
    /// Header for one outgoing frame packet.
    ///
    /// The sequence number is the frame number truncated to 16 bits.
    /// Padding, extension, CSRC count, and marker are always zero for this
    /// stream.
    pub fn for_frame(payload_type: u8, frame_number: u64, timestamp: u32, ssrc: u32) -> Self {
        Self {
            version: RTP_VERSION,
            padding: false,
            extension: false,
            csrc_count: 0,
            marker: false,
            payload_type,
            sequence: (frame_number % 65_536) as u16,
            timestamp,
            ssrc,
        }
    }

    /// Serialize to the 12-byte wire representation.
    ///
    /// Fields are assumed to be within their bit widths; out-of-range bits
    /// in `version`, `csrc_count`, or `payload_type` would bleed into
    /// neighboring fields.
    pub fn encode(&self) -> [u8; HEADER_LEN] {
        let mut header = [0u8; HEADER_LEN];
        header[0] = (self.version << 6)
            | ((self.padding as u8) << 5)
            | ((self.extension as u8) << 4)
            | self.csrc_count;
        header[1] = ((self.marker as u8) << 7) | self.payload_type;
        header[2..4].copy_from_slice(&self.sequence.to_be_bytes());
        header[4..8].copy_from_slice(&self.timestamp.to_be_bytes());
        header[8..12].copy_from_slice(&self.ssrc.to_be_bytes());
        header
    }

    /// Parse the fixed header from the start of a datagram.
    ///
    /// Fails with [`ProtocolErrorKind::TruncatedPacket`] when fewer than
    /// [`HEADER_LEN`] bytes are available.
    pub fn decode(buf: &[u8]) -> Result<Self> {
        if buf.len() < HEADER_LEN {
            return Err(StreamError::Protocol {
                kind: ProtocolErrorKind::TruncatedPacket,
            });
        }

        Ok(Self {
            version: buf[0] >> 6,
            padding: (buf[0] >> 5) & 1 == 1,
            extension: (buf[0] >> 4) & 1 == 1,
            csrc_count: buf[0] & 0x0F,
            marker: (buf[1] >> 7) & 1 == 1,
            payload_type: buf[1] & 0x7F,
            sequence: u16::from_be_bytes([buf[2], buf[3]]),
            timestamp: u32::from_be_bytes([buf[4], buf[5], buf[6], buf[7]]),
            ssrc: u32::from_be_bytes([buf[8], buf[9], buf[10], buf[11]]),
        })
    }
}

/// Assemble one data-channel datagram: fixed header followed by the payload.
pub fn build_packet(header: &RtpHeader, payload: &[u8]) -> Vec<u8> {
    let mut packet = Vec::with_capacity(HEADER_LEN + payload.len());
    packet.extend_from_slice(&header.encode());
    packet.extend_from_slice(payload);
    packet
}

/// Split a received datagram into its fixed header and payload bytes.
pub fn split_packet(datagram: &[u8]) -> Result<(RtpHeader, &[u8])> {
    let header = RtpHeader::decode(datagram)?;
    Ok((header, &datagram[HEADER_LEN..]))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame_header() -> RtpHeader {
        RtpHeader::for_frame(26, 7, 1_700_000_000, 0xAABBCCDD)
    }

    #[test]
    fn version_is_2() {
        let buf = frame_header().encode();
        assert_eq!(buf[0] >> 6, 2);
    }

    #[test]
    fn payload_type_written() {
        let buf = frame_header().encode();
        assert_eq!(buf[1] & 0x7F, 26);
    }

    #[test]
    fn sequence_from_frame_number() {
        let buf = frame_header().encode();
        assert_eq!(u16::from_be_bytes([buf[2], buf[3]]), 7);
    }

    #[test]
    fn sequence_truncates_to_16_bits() {
        let header = RtpHeader::for_frame(26, 65_537, 0, 0);
        assert_eq!(header.sequence, 1);
    }

    #[test]
    fn ssrc_written() {
        let buf = frame_header().encode();
        assert_eq!(
            u32::from_be_bytes([buf[8], buf[9], buf[10], buf[11]]),
            0xAABBCCDD
        );
    }

    #[test]
    fn roundtrip_exact() {
        let cases = [
            RtpHeader {
                version: 2,
                padding: false,
                extension: false,
                csrc_count: 0,
                marker: false,
                payload_type: 26,
                sequence: 1,
                timestamp: 0,
                ssrc: 0,
            },
            RtpHeader {
                version: 3,
                padding: true,
                extension: true,
                csrc_count: 15,
                marker: true,
                payload_type: 127,
                sequence: u16::MAX,
                timestamp: u32::MAX,
                ssrc: u32::MAX,
            },
            RtpHeader {
                version: 0,
                padding: true,
                extension: false,
                csrc_count: 9,
                marker: false,
                payload_type: 96,
                sequence: 0x8000,
                timestamp: 0xDEADBEEF,
                ssrc: 0x01020304,
            },
        ];

        for case in cases {
            let decoded = RtpHeader::decode(&case.encode()).unwrap();
            assert_eq!(decoded, case);
        }
    }

    #[test]
    fn decode_rejects_short_datagram() {
        assert!(RtpHeader::decode(&[0u8; 11]).is_err());
        assert!(RtpHeader::decode(&[]).is_err());
    }

    #[test]
    fn split_packet_separates_payload() {
        let packet = build_packet(&frame_header(), b"jpeg bytes");
        let (header, payload) = split_packet(&packet).unwrap();
        assert_eq!(header.sequence, 7);
        assert_eq!(payload, b"jpeg bytes");
    }
}
