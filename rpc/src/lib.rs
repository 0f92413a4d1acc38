//! RPC contract: request/response shapes and the trait the node's JSON-RPC
//! server implements. Transport (HTTP/WS binding, TLS) is out of scope —
//! this crate only pins down the method signatures and DTOs so `core` and
//! any client can agree on them.

use tokio::sync::{mpsc, Mutex};

use jsonrpsee::core::RpcResult;
use jsonrpsee::proc_macros::rpc;
use jsonrpsee::types::ErrorObjectOwned;
use serde::{Deserialize, Serialize};

use fractalpow_core::amount::Amount;
use fractalpow_core::block::Block;
use fractalpow_core::chain::ChainHandle;
use fractalpow_core::miner::{self, MinerHandle};
use fractalpow_core::transaction::Transaction;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockchainInfo {
    pub network: String,
    pub height: u64,
    pub tip_hash: String,
    pub header_bits: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PeerInfo {
    pub connected_peers: usize,
}

/// The `getBlock(index|hash)` request discriminant.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BlockQuery {
    Index(u64),
    Hash(String),
}

#[rpc(server, client, namespace = "chain")]
pub trait ChainRpc {
    #[method(name = "getBlockchainInfo")]
    async fn get_blockchain_info(&self) -> RpcResult<BlockchainInfo>;

    #[method(name = "getBlock")]
    async fn get_block(&self, query: BlockQuery) -> RpcResult<Option<Block>>;

    #[method(name = "getBalance")]
    async fn get_balance(&self, address: String) -> RpcResult<Amount>;

    #[method(name = "getTransaction")]
    async fn get_transaction(&self, txid: String) -> RpcResult<Option<Transaction>>;

    #[method(name = "sendTransaction")]
    async fn send_transaction(&self, tx: Transaction) -> RpcResult<()>;

    #[method(name = "startMining")]
    async fn start_mining(&self, address: String) -> RpcResult<()>;

    #[method(name = "stopMining")]
    async fn stop_mining(&self) -> RpcResult<()>;

    #[method(name = "getPeerInfo")]
    async fn get_peer_info(&self) -> RpcResult<PeerInfo>;
}

fn internal_error(err: fractalpow_core::Error) -> ErrorObjectOwned {
    ErrorObjectOwned::owned(-32000, err.to_string(), None::<()>)
}

/// Minimal server binding the contract above to a running chain actor.
/// The staking pass-through named in the spec's RPC contract is omitted
/// from the trait entirely: the staking ledger is an external
/// collaborator this workspace never implements. `startMining`/
/// `stopMining` delegate to `core::miner`; mined blocks are accepted onto
/// the chain but not announced to any peers, since this crate has no
/// network handle to announce through.
pub struct ChainRpcHandler {
    chain: ChainHandle,
    network: String,
    miner: Mutex<Option<MinerHandle>>,
}

impl ChainRpcHandler {
    pub fn new(chain: ChainHandle, network: String) -> Self {
        Self { chain, network, miner: Mutex::new(None) }
    }
}

#[jsonrpsee::core::async_trait]
impl ChainRpcServer for ChainRpcHandler {
    async fn get_blockchain_info(&self) -> RpcResult<BlockchainInfo> {
        let tip = self.chain.tip().await.map_err(internal_error)?;
        let header_bits = self.chain.header_bits().await.map_err(internal_error)?;
        Ok(BlockchainInfo {
            network: self.network.clone(),
            height: tip.index,
            tip_hash: hex::encode(tip.block_hash()),
            header_bits,
        })
    }

    async fn get_block(&self, query: BlockQuery) -> RpcResult<Option<Block>> {
        match query {
            BlockQuery::Index(index) => self.chain.get_block_by_index(index).await.map_err(internal_error),
            BlockQuery::Hash(hex_hash) => {
                let bytes = hex::decode(&hex_hash).map_err(|_| {
                    ErrorObjectOwned::owned(-32001, "malformed block hash", None::<()>)
                })?;
                let hash: fractalpow_core::Hash = bytes
                    .try_into()
                    .map_err(|_| ErrorObjectOwned::owned(-32001, "block hash must be 32 bytes", None::<()>))?;
                self.chain.get_block_by_hash(hash).await.map_err(internal_error)
            }
        }
    }

    async fn get_balance(&self, address: String) -> RpcResult<Amount> {
        self.chain.balance(address).await.map_err(internal_error)
    }

    async fn get_transaction(&self, txid: String) -> RpcResult<Option<Transaction>> {
        let bytes = hex::decode(&txid).map_err(|_| ErrorObjectOwned::owned(-32001, "malformed txid", None::<()>))?;
        let hash: fractalpow_core::Hash =
            bytes.try_into().map_err(|_| ErrorObjectOwned::owned(-32001, "txid must be 32 bytes", None::<()>))?;
        self.chain.get_transaction(hash).await.map_err(internal_error)
    }

    async fn send_transaction(&self, tx: Transaction) -> RpcResult<()> {
        self.chain.submit_transaction(tx).await.map_err(internal_error)
    }

    async fn start_mining(&self, address: String) -> RpcResult<()> {
        let mut slot = self.miner.lock().await;
        if slot.is_some() {
            return Err(ErrorObjectOwned::owned(-32002, "miner already running", None::<()>));
        }
        let (tx, mut rx) = mpsc::channel(1);
        tokio::spawn(async move { while rx.recv().await.is_some() {} });
        *slot = Some(miner::spawn(self.chain.clone(), address, tx));
        Ok(())
    }

    async fn stop_mining(&self) -> RpcResult<()> {
        let handle = self.miner.lock().await.take();
        if let Some(handle) = handle {
            handle.stop().await;
        }
        Ok(())
    }

    async fn get_peer_info(&self) -> RpcResult<PeerInfo> {
        // Peer bookkeeping lives in the network crate's dispatcher, which
        // this handler is not wired to; a real binary wires it through.
        Ok(PeerInfo { connected_peers: 0 })
    }
}
