//! BattlEye RCON wire codec
//!
//! Packet layout (little-endian):
//!
//! ```text
//! offset  bytes        meaning
//! 0       'B' 'E'      magic
//! 2       u32          CRC-32/IEEE over bytes [6..end]
//! 6       0xFF         header terminator
//! 7       u8           kind: 0=Login, 1=Command, 2=Message
//! 8..     ...          body (per-kind layout)
//! ```
//!
//! Per-kind body layout after the kind byte:
//!
//! - Login: the password bytes (request) or a status byte (reply).
//! - Command, single page: `seq` then the body.
//! - Command, multipart reply: `seq`, `0x00`, `pages`, `page`, body.
//! - Message: `seq` then the body; the client acks with an empty body.

use bytes::{BufMut, Bytes, BytesMut};
use crc::Crc;

use crate::error::{Error, Result};

/// Magic bytes opening every packet.
pub const MAGIC: [u8; 2] = [b'B', b'E'];

/// Header terminator, first byte covered by the CRC.
pub const HEADER_END: u8 = 0xFF;

/// First body byte of a successful login reply.
pub const LOGIN_SUCCESS: u8 = 0x01;

/// Delimiter announcing a multipart command reply.
pub const MULTIPART: u8 = 0x00;

/// Smallest well-formed packet: 7 header bytes plus the kind byte.
pub const MIN_PACKET_SIZE: usize = 8;

/// Protocol limit for a single client command body. The client never sends
/// multipart packets, so longer commands are rejected outright.
pub const MAX_COMMAND_BODY: usize = 1391;

/// Fixed per-packet overhead budgeted on top of the body when sizing the
/// read buffer: 7 header bytes, kind, seq, multipart delimiter, pages, page,
/// with slack.
pub const PACKET_OVERHEAD: u16 = 16;

/// CRC-32/IEEE (reflected, poly 0xEDB88320), the checksum BattlEye uses.
const CRC32: Crc<u32> = Crc::<u32>::new(&crc::CRC_32_ISO_HDLC);

/// Packet kind byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum PacketKind {
    Login = 0x00,
    Command = 0x01,
    Message = 0x02,
}

impl PacketKind {
    fn from_byte(b: u8) -> Result<Self> {
        match b {
            0x00 => Ok(PacketKind::Login),
            0x01 => Ok(PacketKind::Command),
            0x02 => Ok(PacketKind::Message),
            _ => Err(Error::UnknownKind),
        }
    }
}

/// A decoded RCON packet.
///
/// `seq` is meaningless for Login packets. `pages == 0` means a single-page
/// body; a multipart command reply carries `pages >= 2` and a zero-based
/// `page` index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    pub kind: PacketKind,
    pub seq: u8,
    pub pages: u8,
    pub page: u8,
    pub body: Bytes,
}

impl Packet {
    /// Login packet; the password (or the server's status byte) is the body.
    pub fn login(body: impl Into<Bytes>) -> Self {
        Self {
            kind: PacketKind::Login,
            seq: 0,
            pages: 0,
            page: 0,
            body: body.into(),
        }
    }

    /// Single-page command packet.
    pub fn command(seq: u8, body: impl Into<Bytes>) -> Self {
        Self {
            kind: PacketKind::Command,
            seq,
            pages: 0,
            page: 0,
            body: body.into(),
        }
    }

    /// One page of a multipart command reply. Only servers emit these; the
    /// encoder supports them for test harnesses.
    pub fn command_page(seq: u8, pages: u8, page: u8, body: impl Into<Bytes>) -> Self {
        Self {
            kind: PacketKind::Command,
            seq,
            pages,
            page,
            body: body.into(),
        }
    }

    /// Message packet; with an empty body this is the client-side ack.
    pub fn message(seq: u8, body: impl Into<Bytes>) -> Self {
        Self {
            kind: PacketKind::Message,
            seq,
            pages: 0,
            page: 0,
            body: body.into(),
        }
    }

    /// Bytes this packet occupies on the wire.
    pub fn wire_len(&self) -> usize {
        let per_kind = match self.kind {
            PacketKind::Login => 0,
            PacketKind::Command if self.pages != 0 => 4, // seq + delim + pages + page
            PacketKind::Command | PacketKind::Message => 1, // seq
        };

        MIN_PACKET_SIZE + per_kind + self.body.len()
    }

    /// Encode into a single contiguous buffer.
    ///
    /// The payload is laid out first with a zeroed CRC field, then the
    /// checksum over `[6..]` is patched into bytes `[2..6]`. One allocation,
    /// no temporaries.
    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(self.wire_len());

        buf.put_slice(&MAGIC);
        buf.put_u32_le(0); // CRC placeholder
        buf.put_u8(HEADER_END);
        buf.put_u8(self.kind as u8);

        match self.kind {
            PacketKind::Login => {}
            PacketKind::Command => {
                buf.put_u8(self.seq);
                if self.pages != 0 {
                    buf.put_u8(MULTIPART);
                    buf.put_u8(self.pages);
                    buf.put_u8(self.page);
                }
            }
            PacketKind::Message => buf.put_u8(self.seq),
        }

        buf.put_slice(&self.body);

        let crc = CRC32.checksum(&buf[6..]);
        buf[2..6].copy_from_slice(&crc.to_le_bytes());

        buf.freeze()
    }

    /// Decode a datagram.
    ///
    /// The body is copied into a fresh buffer so the caller's read buffer
    /// can be reused for the next datagram.
    pub fn decode(data: &[u8]) -> Result<Self> {
        if data.len() < MIN_PACKET_SIZE {
            return Err(Error::PacketTooSmall);
        }

        if data[0] != MAGIC[0] || data[1] != MAGIC[1] || data[6] != HEADER_END {
            return Err(Error::BadHeader);
        }

        let stored = u32::from_le_bytes([data[2], data[3], data[4], data[5]]);
        if stored != CRC32.checksum(&data[6..]) {
            return Err(Error::BadCrc);
        }

        let kind = PacketKind::from_byte(data[7])?;
        let mut seq = 0;
        let mut pages = 0;
        let mut page = 0;
        let mut body_at = MIN_PACKET_SIZE;

        match kind {
            PacketKind::Login => {}
            PacketKind::Command => {
                if data.len() < 9 {
                    return Err(Error::PacketTooSmall);
                }
                seq = data[8];
                body_at = 9;
                if data.len() > 9 && data[9] == MULTIPART {
                    if data.len() < 12 {
                        return Err(Error::PacketTooSmall);
                    }
                    pages = data[10];
                    page = data[11];
                    body_at = 12;
                }
            }
            PacketKind::Message => {
                if data.len() < 9 {
                    return Err(Error::PacketTooSmall);
                }
                seq = data[8];
                body_at = 9;
            }
        }

        Ok(Self {
            kind,
            seq,
            pages,
            page,
            body: Bytes::copy_from_slice(&data[body_at..]),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crc_parameters_match_ieee() {
        // Standard CRC-32 check value: "123456789" -> 0xCBF43926.
        assert_eq!(CRC32.checksum(b"123456789"), 0xCBF4_3926);
    }

    #[test]
    fn login_roundtrip() {
        let pkt = Packet::login(Bytes::from_static(b"secret"));
        let wire = pkt.encode();

        assert_eq!(&wire[..2], b"BE");
        assert_eq!(wire[6], HEADER_END);
        assert_eq!(wire[7], 0x00);
        assert_eq!(&wire[8..], b"secret");

        let back = Packet::decode(&wire).unwrap();
        assert_eq!(back, pkt);
    }

    #[test]
    fn command_roundtrip() {
        let pkt = Packet::command(0x42, Bytes::from_static(b"players"));
        let wire = pkt.encode();

        assert_eq!(wire[7], 0x01);
        assert_eq!(wire[8], 0x42);
        assert_eq!(&wire[9..], b"players");

        let back = Packet::decode(&wire).unwrap();
        assert_eq!(back, pkt);
        assert_eq!(back.pages, 0);
    }

    #[test]
    fn multipart_roundtrip() {
        let pkt = Packet::command_page(7, 3, 1, Bytes::from_static(b"chunk"));
        let wire = pkt.encode();

        assert_eq!(wire[8], 7);
        assert_eq!(wire[9], MULTIPART);
        assert_eq!(wire[10], 3);
        assert_eq!(wire[11], 1);
        assert_eq!(&wire[12..], b"chunk");

        let back = Packet::decode(&wire).unwrap();
        assert_eq!(back, pkt);
    }

    #[test]
    fn message_roundtrip() {
        let pkt = Packet::message(200, Bytes::from_static(b"hello"));
        let back = Packet::decode(&pkt.encode()).unwrap();
        assert_eq!(back, pkt);

        // Ack shape: same seq, empty body.
        let ack = Packet::message(200, Bytes::new());
        let wire = ack.encode();
        assert_eq!(wire.len(), 9);
        assert_eq!(Packet::decode(&wire).unwrap().body.len(), 0);
    }

    #[test]
    fn embedded_crc_covers_suffix() {
        let wire = Packet::command(1, Bytes::from_static(b"bans")).encode();
        let stored = u32::from_le_bytes([wire[2], wire[3], wire[4], wire[5]]);
        assert_eq!(stored, CRC32.checksum(&wire[6..]));
    }

    #[test]
    fn rejects_short_packet() {
        assert!(matches!(
            Packet::decode(b"BE\x00\x00"),
            Err(Error::PacketTooSmall)
        ));
    }

    #[test]
    fn rejects_bad_magic_and_terminator() {
        let mut wire = BytesMut::from(&Packet::login(Bytes::new()).encode()[..]);
        wire[0] = b'X';
        assert!(matches!(Packet::decode(&wire), Err(Error::BadHeader)));

        let mut wire = BytesMut::from(&Packet::login(Bytes::new()).encode()[..]);
        wire[6] = 0x00;
        assert!(matches!(Packet::decode(&wire), Err(Error::BadHeader)));
    }

    #[test]
    fn rejects_corrupted_payload() {
        let mut wire = BytesMut::from(&Packet::command(9, Bytes::from_static(b"players")).encode()[..]);
        let last = wire.len() - 1;
        wire[last] ^= 0xFF;
        assert!(matches!(Packet::decode(&wire), Err(Error::BadCrc)));
    }

    #[test]
    fn rejects_unknown_kind() {
        // Patch the kind byte and re-patch the CRC so only the kind is bad.
        let mut wire = BytesMut::from(&Packet::login(Bytes::new()).encode()[..]);
        wire[7] = 0x07;
        let crc = CRC32.checksum(&wire[6..]);
        wire[2..6].copy_from_slice(&crc.to_le_bytes());
        assert!(matches!(Packet::decode(&wire), Err(Error::UnknownKind)));
    }

    #[test]
    fn rejects_truncated_multipart() {
        // seq followed by the multipart delimiter but no pages/page bytes.
        let mut buf = BytesMut::new();
        buf.put_slice(&MAGIC);
        buf.put_u32_le(0);
        buf.put_u8(HEADER_END);
        buf.put_u8(PacketKind::Command as u8);
        buf.put_u8(5);
        buf.put_u8(MULTIPART);
        let crc = CRC32.checksum(&buf[6..]);
        buf[2..6].copy_from_slice(&crc.to_le_bytes());

        assert!(matches!(Packet::decode(&buf), Err(Error::PacketTooSmall)));
    }

    #[test]
    fn command_body_without_delimiter_stays_single_page() {
        // A body starting with a non-zero byte keeps pages == 0 even when
        // the packet is long enough to look multipart.
        let pkt = Packet::command(3, Bytes::from_static(b"\x01\x02\x03\x04"));
        let back = Packet::decode(&pkt.encode()).unwrap();
        assert_eq!(back.pages, 0);
        assert_eq!(back.body, Bytes::from_static(b"\x01\x02\x03\x04"));
    }
}
