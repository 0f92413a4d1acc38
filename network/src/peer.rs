//! Per-peer connection: handshake, header-first sync, then steady-state
//! inventory reaction. One [`PeerActor`] owns one TCP connection end to
//! end; the dispatcher in [`crate::node`] only ever talks to it through a
//! [`PeerHandle`]'s outbound queue.

use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::time::timeout;

use fractalpow_core::block::Block;
use fractalpow_core::chain::ChainHandle;
use fractalpow_core::Hash;

use crate::protocol::{self, HeaderView, Handshake, Message};
use crate::ratelimit::RateLimiter;

pub const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);
pub const READ_IDLE_TIMEOUT: Duration = Duration::from_secs(60);
pub const RESPONSE_TIMEOUT: Duration = Duration::from_secs(30);
pub const HEADERS_PER_REQUEST: u32 = 500;

pub type PeerId = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeerState {
    Connecting,
    Handshaking,
    Syncing,
    Live,
    Closed,
}

/// Cloneable front a dispatcher pushes announcements through; the actual
/// socket write happens on the peer's own task.
#[derive(Clone)]
pub struct PeerHandle {
    pub id: PeerId,
    outbound: mpsc::Sender<Message>,
}

impl PeerHandle {
    pub async fn push(&self, msg: Message) -> bool {
        self.outbound.send(msg).await.is_ok()
    }
}

pub struct PeerActor {
    id: PeerId,
    node_id: String,
    network: String,
    chain: ChainHandle,
    state: PeerState,
    limiter: RateLimiter,
}

/// Spawns a peer task over `stream`. Returns the [`PeerHandle`] the
/// dispatcher uses to push outbound announcements to it.
pub fn spawn(id: PeerId, node_id: String, network: String, chain: ChainHandle, stream: TcpStream) -> PeerHandle {
    let (outbound_tx, outbound_rx) = mpsc::channel(64);
    let handle = PeerHandle { id, outbound: outbound_tx.clone() };
    let actor = PeerActor {
        id,
        node_id,
        network,
        chain,
        state: PeerState::Connecting,
        limiter: RateLimiter::default_bucket(),
    };
    tokio::spawn(async move {
        actor.run(stream, outbound_rx).await;
    });
    handle
}

impl PeerActor {
    pub fn state(&self) -> PeerState {
        self.state
    }

    async fn run(mut self, stream: TcpStream, mut outbound_rx: mpsc::Receiver<Message>) {
        let (mut reader, mut writer) = tokio::io::split(stream);

        self.state = PeerState::Handshaking;
        let local_height = self.chain.tip().await.map(|b| b.index).unwrap_or(0);
        let hello = Message::Handshake(Handshake {
            version: 1,
            network: self.network.clone(),
            node_id: self.node_id.clone(),
            height: local_height,
        });
        if protocol::write_frame(&mut writer, &hello).await.is_err() {
            self.state = PeerState::Closed;
            return;
        }

        let peer_height = match timeout(HANDSHAKE_TIMEOUT, protocol::read_frame(&mut reader)).await {
            Ok(Ok(Message::Handshake(hs))) if hs.network == self.network => hs.height,
            _ => {
                tracing::warn!(peer = self.id, "handshake failed or timed out");
                self.state = PeerState::Closed;
                return;
            }
        };

        self.state = PeerState::Syncing;
        if self.sync_from_peer(&mut reader, &mut writer, peer_height).await.is_err() {
            tracing::warn!(peer = self.id, "sync stalled, disconnecting");
            self.state = PeerState::Closed;
            return;
        }
        self.state = PeerState::Live;
        tracing::info!(peer = self.id, "peer live");

        loop {
            tokio::select! {
                inbound = timeout(READ_IDLE_TIMEOUT, protocol::read_frame(&mut reader)) => {
                    match inbound {
                        Ok(Ok(msg)) => {
                            if !self.limiter.try_acquire() {
                                tracing::warn!(peer = self.id, "rate limit exceeded, disconnecting");
                                break;
                            }
                            if self.handle_live_message(msg, &mut writer).await.is_err() {
                                break;
                            }
                        }
                        Ok(Err(e)) => {
                            tracing::debug!(peer = self.id, error = %e, "connection closed");
                            break;
                        }
                        Err(_) => {
                            if protocol::write_frame(&mut writer, &Message::Ping { nonce: self.id }).await.is_err() {
                                break;
                            }
                        }
                    }
                }
                out = outbound_rx.recv() => {
                    match out {
                        Some(msg) => {
                            if protocol::write_frame(&mut writer, &msg).await.is_err() {
                                break;
                            }
                        }
                        None => break,
                    }
                }
            }
        }
        self.state = PeerState::Closed;
        tracing::info!(peer = self.id, "peer closed");
    }

    /// Header-first backfill: request headers from our tip, then fetch and
    /// apply each missing block in order until we match `peer_height`.
    async fn sync_from_peer<R, W>(&mut self, reader: &mut R, writer: &mut W, peer_height: u64) -> Result<(), ()>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        loop {
            let local_height = self.chain.tip().await.map_err(|_| ())?.index;
            if local_height >= peer_height {
                return Ok(());
            }
            protocol::write_frame(
                writer,
                &Message::GetHeaders { from_height: local_height + 1, count: HEADERS_PER_REQUEST },
            )
            .await
            .map_err(|_| ())?;

            let headers = match timeout(RESPONSE_TIMEOUT, protocol::read_frame(reader)).await {
                Ok(Ok(Message::Headers(h))) => h,
                _ => return Err(()),
            };
            if headers.is_empty() {
                return Ok(());
            }
            for header in headers {
                protocol::write_frame(writer, &Message::GetBlock { hash: header.hash }).await.map_err(|_| ())?;
                let block = match timeout(RESPONSE_TIMEOUT, protocol::read_frame(reader)).await {
                    Ok(Ok(Message::Block(b))) => *b,
                    _ => return Err(()),
                };
                self.chain.add_block(block).await.map_err(|_| ())?;
            }
        }
    }

    async fn handle_live_message<W>(&mut self, msg: Message, writer: &mut W) -> Result<(), ()>
    where
        W: AsyncWrite + Unpin,
    {
        match msg {
            Message::Ping { nonce } => {
                protocol::write_frame(writer, &Message::Pong { nonce }).await.map_err(|_| ())
            }
            Message::Pong { .. } => Ok(()),
            Message::InvBlock { hash, .. } => {
                protocol::write_frame(writer, &Message::GetBlock { hash }).await.map_err(|_| ())
            }
            Message::GetBlock { hash } => {
                if let Ok(Some(block)) = self.chain.get_block_by_hash(hash).await {
                    protocol::write_frame(writer, &Message::Block(Box::new(block))).await.map_err(|_| ())
                } else {
                    Ok(())
                }
            }
            Message::Block(block) => {
                let _ = self.chain.add_block(*block).await;
                Ok(())
            }
            Message::InvTx { txid } => {
                protocol::write_frame(writer, &Message::GetTx { txid }).await.map_err(|_| ())
            }
            Message::GetTx { txid } => {
                if let Ok(Some(tx)) = self.chain.get_transaction(txid).await {
                    protocol::write_frame(writer, &Message::Tx(Box::new(tx))).await.map_err(|_| ())
                } else {
                    Ok(())
                }
            }
            Message::Tx(tx) => {
                let _ = self.chain.submit_transaction(*tx).await;
                Ok(())
            }
            Message::GetHeaders { from_height, count } => {
                let blocks = self.chain.headers_from(from_height, count).await.unwrap_or_default();
                let headers: Vec<HeaderView> = blocks.iter().map(HeaderView::from).collect();
                protocol::write_frame(writer, &Message::Headers(headers)).await.map_err(|_| ())
            }
            Message::Headers(_) => Ok(()),
            // A second handshake mid-session is a protocol violation.
            Message::Handshake(_) => Err(()),
        }
    }
}

/// Builds the `inv_block`/`inv_tx` announcements a successful `add_block`
/// or `submit_transaction` broadcasts to every `Live` peer.
pub fn inv_block(block: &Block) -> Message {
    Message::InvBlock { hash: block.block_hash(), height: block.index }
}

pub fn inv_tx(txid: Hash) -> Message {
    Message::InvTx { txid }
}
