//! Wire protocol: the message schema and the length-prefixed JSON framing
//! every peer connection speaks.
//!
//! Frames are `u32` big-endian byte length followed by that many bytes of
//! JSON. JSON over a fixed framing is the simplest encoding that still
//! gives every message type an explicit, decode-time-validated shape,
//! which is what the protocol calls for over a generic pub/sub payload.

use serde::{Deserialize, Serialize};
use tokio::io::{AsyncReadExt, AsyncWriteExt};

use fractalpow_core::block::Block;
use fractalpow_core::transaction::Transaction;
use fractalpow_core::Hash;

/// Hard ceiling on a single frame, independent of `max_block_bytes` —
/// guards the length prefix itself against a peer claiming an absurd size.
pub const MAX_FRAME_BYTES: u32 = 16 * 1024 * 1024;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Handshake {
    pub version: u32,
    pub network: String,
    pub node_id: String,
    pub height: u64,
}

/// A block's identity and linkage, without its transaction list — the
/// payload for `headers` responses during sync.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeaderView {
    pub index: u64,
    pub hash: Hash,
    pub prev_hash: Hash,
    pub timestamp: u64,
}

impl From<&Block> for HeaderView {
    fn from(block: &Block) -> Self {
        Self {
            index: block.index,
            hash: block.block_hash(),
            prev_hash: block.prev_hash,
            timestamp: block.timestamp,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum Message {
    Handshake(Handshake),
    Ping { nonce: u64 },
    Pong { nonce: u64 },
    InvBlock { hash: Hash, height: u64 },
    GetBlock { hash: Hash },
    Block(Box<Block>),
    InvTx { txid: Hash },
    GetTx { txid: Hash },
    Tx(Box<Transaction>),
    GetHeaders { from_height: u64, count: u32 },
    Headers(Vec<HeaderView>),
}

#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("frame of {0} bytes exceeds the {1} byte limit")]
    Oversize(u32, u32),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed message: {0}")]
    Decode(#[from] serde_json::Error),
}

pub async fn write_frame<W: AsyncWriteExt + Unpin>(writer: &mut W, msg: &Message) -> Result<(), FrameError> {
    let body = serde_json::to_vec(msg)?;
    let len = body.len() as u32;
    writer.write_all(&len.to_be_bytes()).await?;
    writer.write_all(&body).await?;
    writer.flush().await?;
    Ok(())
}

pub async fn read_frame<R: AsyncReadExt + Unpin>(reader: &mut R) -> Result<Message, FrameError> {
    let mut len_buf = [0u8; 4];
    reader.read_exact(&mut len_buf).await?;
    let len = u32::from_be_bytes(len_buf);
    if len > MAX_FRAME_BYTES {
        return Err(FrameError::Oversize(len, MAX_FRAME_BYTES));
    }
    let mut body = vec![0u8; len as usize];
    reader.read_exact(&mut body).await?;
    Ok(serde_json::from_slice(&body)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn frame_round_trips_over_an_in_memory_pipe() {
        let msg = Message::Ping { nonce: 42 };
        let mut buf = Vec::new();
        write_frame(&mut buf, &msg).await.unwrap();

        let mut cursor = std::io::Cursor::new(buf);
        let decoded = read_frame(&mut cursor).await.unwrap();
        assert!(matches!(decoded, Message::Ping { nonce: 42 }));
    }

    #[tokio::test]
    async fn oversize_length_prefix_is_rejected_before_reading_body() {
        let mut buf = Vec::new();
        buf.extend_from_slice(&(MAX_FRAME_BYTES + 1).to_be_bytes());
        let mut cursor = std::io::Cursor::new(buf);
        assert!(matches!(read_frame(&mut cursor).await, Err(FrameError::Oversize(_, _))));
    }
}
