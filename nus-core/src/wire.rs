//! Framing: length-prefix (4 bytes LE) + bincode payload.

use crate::protocol::AirMessage;

pub const LEN_SIZE: usize = 4;
pub const MAX_FRAME_LEN: u32 = 64 * 1024;

/// Encode a message into a single frame: 4 bytes LE length + bincode payload.
pub fn encode_frame(msg: &AirMessage) -> Result<Vec<u8>, FrameEncodeError> {
    let payload = bincode::serialize(msg).map_err(FrameEncodeError::Encode)?;
    let len = payload.len() as u32;
    if len > MAX_FRAME_LEN {
        return Err(FrameEncodeError::TooLarge);
    }
    let mut out = Vec::with_capacity(LEN_SIZE + payload.len());
    out.extend_from_slice(&len.to_le_bytes());
    out.extend_from_slice(&payload);
    Ok(out)
}

#[derive(Debug, thiserror::Error)]
pub enum FrameEncodeError {
    #[error("encode error: {0}")]
    Encode(#[from] bincode::Error),
    #[error("frame too large")]
    TooLarge,
}

/// Decode one frame from the front of `bytes`. Returns the message and the number of bytes consumed.
/// `NeedMore` means the caller should retry once more bytes have arrived.
pub fn decode_frame(bytes: &[u8]) -> Result<(AirMessage, usize), FrameDecodeError> {
    let len = frame_len(bytes)?;
    if bytes.len() < LEN_SIZE + len {
        return Err(FrameDecodeError::NeedMore);
    }
    let msg = decode_payload(&bytes[LEN_SIZE..LEN_SIZE + len])?;
    Ok((msg, LEN_SIZE + len))
}

/// Payload length announced by a frame header, checked against the limit.
pub fn frame_len(header: &[u8]) -> Result<usize, FrameDecodeError> {
    if header.len() < LEN_SIZE {
        return Err(FrameDecodeError::NeedMore);
    }
    let len = u32::from_le_bytes([header[0], header[1], header[2], header[3]]);
    if len > MAX_FRAME_LEN {
        return Err(FrameDecodeError::TooLarge);
    }
    Ok(len as usize)
}

/// Decode a frame body whose header was already consumed.
pub fn decode_payload(payload: &[u8]) -> Result<AirMessage, FrameDecodeError> {
    bincode::deserialize(payload).map_err(FrameDecodeError::Decode)
}

#[derive(Debug, thiserror::Error)]
pub enum FrameDecodeError {
    #[error("need more bytes")]
    NeedMore,
    #[error("frame too large")]
    TooLarge,
    #[error("decode error: {0}")]
    Decode(#[from] bincode::Error),
}
