//! Message framing — the four-field record and its fixed-header
//! encoding over any byte-stream transport.
//!
//! Wire size of the header is 13 bytes, all integers little-endian:
//!
//! ```text
//! device_id:  u32
//! session_id: u32
//! type:       u8
//! length:     u32
//! payload:    length bytes
//! ```

use static_assertions::assert_eq_size;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use zerocopy::{AsBytes, FromBytes, FromZeroes};

use crate::constants::MAX_FRAME_PAYLOAD;
use crate::error::AuthError;

/// Purpose byte carried in a [`Message`]'s `type` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageType {
    /// `0x30` — a handshake message.
    Handshake,
    /// `0x31` — an application (telemetry) record.
    Record,
    /// `0x32` — a transport-level acknowledgement. Never produced or
    /// consumed by the authentication core itself.
    Ack,
}

impl MessageType {
    pub const fn as_u8(self) -> u8 {
        match self {
            MessageType::Handshake => 0x30,
            MessageType::Record => 0x31,
            MessageType::Ack => 0x32,
        }
    }
}

impl TryFrom<u8> for MessageType {
    type Error = AuthError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0x30 => Ok(MessageType::Handshake),
            0x31 => Ok(MessageType::Record),
            0x32 => Ok(MessageType::Ack),
            other => Err(AuthError::MalformedFrame(format!("unknown message type {other:#04x}"))),
        }
    }
}

/// The fixed-size header in front of every frame. Kept `#[repr(C, packed)]`
/// with a zerocopy derive so the wire layout is a compile-time guarantee
/// rather than a convention to remember.
#[derive(Debug, Clone, AsBytes, FromBytes, FromZeroes)]
#[repr(C, packed)]
struct FrameHeader {
    device_id: u32,
    session_id: u32,
    type_tag: u8,
    length: u32,
}

assert_eq_size!(FrameHeader, [u8; 13]);

/// A single `(device_id, session_id, type, payload)` record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub device_id: u32,
    pub session_id: u32,
    pub msg_type: MessageType,
    pub payload: Vec<u8>,
}

impl Message {
    pub fn new(device_id: u32, session_id: u32, msg_type: MessageType, payload: Vec<u8>) -> Self {
        Self { device_id, session_id, msg_type, payload }
    }

    /// Write this message's header then payload to `conn`.
    pub async fn write<W: AsyncWrite + Unpin>(&self, conn: &mut W) -> Result<(), AuthError> {
        let header = FrameHeader {
            device_id: self.device_id,
            session_id: self.session_id,
            type_tag: self.msg_type.as_u8(),
            length: self.payload.len() as u32,
        };
        conn.write_all(header.as_bytes()).await.map_err(|_| AuthError::TransportClosed)?;
        conn.write_all(&self.payload).await.map_err(|_| AuthError::TransportClosed)?;
        Ok(())
    }

    /// Read one message from `conn`.
    ///
    /// Fails with `TransportClosed` on a short read (peer gone mid-frame)
    /// and `MalformedFrame` if the declared payload length exceeds
    /// `MAX_FRAME_PAYLOAD`.
    pub async fn read<R: AsyncRead + Unpin>(conn: &mut R) -> Result<Self, AuthError> {
        let mut header_bytes = [0u8; 13];
        conn.read_exact(&mut header_bytes).await.map_err(|_| AuthError::TransportClosed)?;
        let header = FrameHeader::read_from(&header_bytes[..])
            .expect("FrameHeader::read_from cannot fail for a correctly sized buffer");

        if header.length > MAX_FRAME_PAYLOAD {
            return Err(AuthError::MalformedFrame(format!(
                "declared frame length {} exceeds cap {MAX_FRAME_PAYLOAD}",
                header.length
            )));
        }

        let msg_type = MessageType::try_from(header.type_tag)?;

        let mut payload = vec![0u8; header.length as usize];
        conn.read_exact(&mut payload).await.map_err(|_| AuthError::TransportClosed)?;

        Ok(Self { device_id: header.device_id, session_id: header.session_id, msg_type, payload })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn write_then_read_round_trips() {
        let msg = Message::new(7, 3, MessageType::Record, b"telemetry payload".to_vec());

        let mut buf = Vec::new();
        msg.write(&mut buf).await.unwrap();

        let mut cursor = std::io::Cursor::new(buf);
        let parsed = Message::read(&mut cursor).await.unwrap();
        assert_eq!(parsed, msg);
    }

    #[tokio::test]
    async fn empty_payload_round_trips() {
        let msg = Message::new(1, 0, MessageType::Handshake, Vec::new());
        let mut buf = Vec::new();
        msg.write(&mut buf).await.unwrap();

        let mut cursor = std::io::Cursor::new(buf);
        let parsed = Message::read(&mut cursor).await.unwrap();
        assert_eq!(parsed, msg);
    }

    #[tokio::test]
    async fn short_header_is_transport_closed() {
        let mut cursor = std::io::Cursor::new(vec![0u8; 4]);
        let err = Message::read(&mut cursor).await.unwrap_err();
        assert!(matches!(err, AuthError::TransportClosed));
    }

    #[tokio::test]
    async fn oversized_length_is_malformed() {
        let mut header_bytes = Vec::new();
        header_bytes.extend_from_slice(&1u32.to_le_bytes());
        header_bytes.extend_from_slice(&0u32.to_le_bytes());
        header_bytes.push(MessageType::Record.as_u8());
        header_bytes.extend_from_slice(&(MAX_FRAME_PAYLOAD + 1).to_le_bytes());

        let mut cursor = std::io::Cursor::new(header_bytes);
        let err = Message::read(&mut cursor).await.unwrap_err();
        assert!(matches!(err, AuthError::MalformedFrame(_)));
    }

    #[tokio::test]
    async fn unknown_type_tag_is_malformed() {
        let mut header_bytes = Vec::new();
        header_bytes.extend_from_slice(&1u32.to_le_bytes());
        header_bytes.extend_from_slice(&0u32.to_le_bytes());
        header_bytes.push(0xFF);
        header_bytes.extend_from_slice(&0u32.to_le_bytes());

        let mut cursor = std::io::Cursor::new(header_bytes);
        let err = Message::read(&mut cursor).await.unwrap_err();
        assert!(matches!(err, AuthError::MalformedFrame(_)));
    }
}
