//! Dispatcher task: owns the peer set, accepts inbound connections, and
//! exposes outbound connect/broadcast to the embedding process. The peer
//! set and connection registry live here, separate from the chain task,
//! per the resource-ownership split: chain state has one writer, peers
//! have another, and the two talk only through [`fractalpow_core::chain::ChainHandle`].

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Mutex;

use fractalpow_core::block::Block;
use fractalpow_core::chain::ChainHandle;
use fractalpow_core::Hash;

use crate::peer::{self, PeerHandle, PeerId};

pub struct Node {
    node_id: String,
    network: String,
    chain: ChainHandle,
    next_peer_id: AtomicU64,
    peers: Mutex<HashMap<PeerId, PeerHandle>>,
}

impl Node {
    pub fn new(node_id: String, network: String, chain: ChainHandle) -> Arc<Self> {
        Arc::new(Self {
            node_id,
            network,
            chain,
            next_peer_id: AtomicU64::new(1),
            peers: Mutex::new(HashMap::new()),
        })
    }

    fn next_id(&self) -> PeerId {
        self.next_peer_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Accepts inbound connections on `addr` until the listener errors.
    /// Runs forever; spawn it as its own task.
    pub async fn listen(self: Arc<Self>, addr: std::net::SocketAddr) -> std::io::Result<()> {
        let listener = TcpListener::bind(addr).await?;
        tracing::info!(%addr, "listening for peers");
        loop {
            let (stream, remote) = listener.accept().await?;
            tracing::info!(%remote, "inbound connection");
            self.clone().adopt(stream).await;
        }
    }

    /// Dials `addr` and registers the resulting connection the same way an
    /// inbound one would be.
    pub async fn connect(self: Arc<Self>, addr: std::net::SocketAddr) -> std::io::Result<()> {
        let stream = TcpStream::connect(addr).await?;
        self.adopt(stream).await;
        Ok(())
    }

    async fn adopt(self: Arc<Self>, stream: TcpStream) {
        let id = self.next_id();
        let handle = peer::spawn(id, self.node_id.clone(), self.network.clone(), self.chain.clone(), stream);
        self.peers.lock().await.insert(id, handle);
    }

    pub async fn peer_count(&self) -> usize {
        self.peers.lock().await.len()
    }

    /// Broadcasts `inv_block` to every registered peer. Peers that have
    /// since closed are pruned lazily on the next broadcast.
    pub async fn announce_block(&self, block: &Block) {
        self.broadcast(peer::inv_block(block)).await;
    }

    pub async fn announce_tx(&self, txid: Hash) {
        self.broadcast(peer::inv_tx(txid)).await;
    }

    async fn broadcast(&self, msg: crate::protocol::Message) {
        let mut peers = self.peers.lock().await;
        let mut dead = Vec::new();
        for (id, handle) in peers.iter() {
            if !handle.push(msg.clone()).await {
                dead.push(*id);
            }
        }
        for id in dead {
            peers.remove(&id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn announce_to_an_empty_peer_set_is_a_no_op() {
        let manager = fractalpow_core::chain::ChainManager::open(
            fractalpow_core::config::Config::default(),
            fractalpow_core::store::MemStore::new(),
        )
        .unwrap();
        let (chain, _join) = fractalpow_core::chain::spawn(manager, 8);
        let node = Node::new("solo".into(), "test".into(), chain);
        assert_eq!(node.peer_count().await, 0);
        let block = fractalpow_core::block::Block::genesis(&fractalpow_core::config::Config::default());
        node.announce_block(&block).await; // must not panic with zero peers
    }
}
