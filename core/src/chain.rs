//! Chain manager: the single writer that owns the store, the ledger, the
//! mempool, and the current difficulty state. [`ChainManager::add_block`]
//! runs the full validation pipeline and commits atomically; everything
//! else in the crate that wants to mutate chain state goes through it.
//!
//! [`spawn`] wraps a manager behind a bounded `tokio::sync::mpsc` channel so
//! callers on other tasks reach it only by message passing, per the
//! single-writer discipline — mirrors the request/reply actor shape the
//! wider pack uses for long-lived owned-state services.

use std::collections::BTreeSet;

use tokio::sync::{mpsc, oneshot};

use crate::amount::Amount;
use crate::block::Block;
use crate::config::Config;
use crate::difficulty::DifficultyState;
use crate::error::{Error, Result};
use crate::ledger::Ledger;
use crate::mempool::Mempool;
use crate::now_ts;
use crate::pow::{self, MineParams};
use crate::reward;
use crate::store::{BlockCommit, ChainStore};
use crate::transaction::Transaction;

pub struct ChainManager<S: ChainStore> {
    store: S,
    ledger: Ledger,
    mempool: Mempool,
    difficulty: DifficultyState,
    cfg: Config,
    tip: Block,
}

impl<S: ChainStore> ChainManager<S> {
    /// Opens `store`, initializing it with the network genesis block if
    /// empty, or replaying every persisted block to rebuild the in-memory
    /// ledger and difficulty state otherwise.
    pub fn open(cfg: Config, store: S) -> Result<Self> {
        let mut ledger = Ledger::new();
        let mut difficulty = DifficultyState::initial(&cfg);

        let tip = match store.height()? {
            Some(height) => {
                let mut last_block = None;
                for index in 0..=height {
                    let block = store
                        .get_block_by_index(index)?
                        .ok_or_else(|| Error::Corruption(format!("missing block at height {index}")))?;
                    ledger.apply_transactions(&block.transactions)?;
                    if index > 0 && index % cfg.retarget_interval == 0 {
                        let window_start = store
                            .get_block_by_index(index - cfg.retarget_interval)?
                            .ok_or_else(|| Error::Corruption("missing retarget window start".into()))?;
                        difficulty = difficulty.retarget(window_start.timestamp, block.timestamp, &cfg);
                    }
                    last_block = Some(block);
                }
                last_block.expect("height Some implies at least one block")
            }
            None => {
                let genesis = Block::genesis(&cfg);
                ledger.apply_transactions(&genesis.transactions)?;
                let deltas = vec![(cfg.genesis_address.clone(), ledger.balance(&cfg.genesis_address))];
                store.commit_block(BlockCommit {
                    block: &genesis,
                    balance_deltas: &deltas,
                })?;
                genesis
            }
        };

        Ok(Self {
            mempool: Mempool::new(cfg.mempool_capacity),
            store,
            ledger,
            difficulty,
            cfg,
            tip,
        })
    }

    pub fn tip(&self) -> &Block {
        &self.tip
    }

    pub fn balance(&self, address: &str) -> Amount {
        self.ledger.balance(address)
    }

    pub fn mine_params(&self) -> MineParams {
        MineParams {
            target_dimension: self.cfg.target_dimension,
            epsilon: self.difficulty.epsilon,
        }
    }

    pub fn header_bits(&self) -> u32 {
        self.difficulty.header_bits
    }

    pub fn get_block_by_index(&self, index: u64) -> Result<Option<Block>> {
        self.store.get_block_by_index(index)
    }

    pub fn get_block_by_hash(&self, hash: &crate::Hash) -> Result<Option<Block>> {
        self.store.get_block_by_hash(hash)
    }

    /// Looks up a pending transaction by id. The store has no txid index,
    /// so a transaction that has already been mined into a block is not
    /// found here — callers needing that must scan blocks by height.
    pub fn get_transaction(&self, txid: &crate::Hash) -> Option<Transaction> {
        self.mempool.get(txid).cloned()
    }

    /// Up to `count` consecutive blocks starting at `from_height`, stopping
    /// early at the current tip — the basis for both `get_headers`
    /// responses and block backfill during sync.
    pub fn headers_from(&self, from_height: u64, count: u32) -> Result<Vec<Block>> {
        let mut out = Vec::new();
        for index in from_height..from_height.saturating_add(count as u64) {
            match self.store.get_block_by_index(index)? {
                Some(block) => out.push(block),
                None => break,
            }
        }
        Ok(out)
    }

    /// Format/signature-validates `tx` against the current ledger and
    /// admits it to the mempool.
    pub fn submit_transaction(&mut self, tx: Transaction) -> Result<()> {
        tx.validate(|addr| self.ledger.balance(addr))?;
        if !self.mempool.insert(tx) {
            return Err(Error::MempoolFull);
        }
        Ok(())
    }

    /// Assembles a candidate block: coinbase first, then mempool
    /// transactions by descending fee, skipping any that would overdraft
    /// the sender against the running in-block balance or overflow the
    /// serialized size budget. The caller still has to run
    /// [`crate::pow::mine`] on the result.
    pub fn assemble_candidate(&self, miner_address: &str) -> Result<Block> {
        let mut scratch = self.ledger.clone();
        let mut included = Vec::new();
        let mut fees = Amount::ZERO;
        let mut remaining_bytes = self.cfg.max_block_bytes;

        for tx in self.mempool.by_fee_desc() {
            let tx_len = bincode::serialize(&tx)?.len();
            if tx_len > remaining_bytes {
                continue;
            }
            if scratch.apply_transactions(std::slice::from_ref(&tx)).is_err() {
                continue;
            }
            remaining_bytes -= tx_len;
            fees = fees.checked_add(tx.fee)?;
            included.push(tx);
        }

        let height = self.tip.index + 1;
        let subsidy = reward::reward(height, self.cfg.initial_reward, self.cfg.halving_interval);
        let coinbase_amount = subsidy.checked_add(fees)?;
        let coinbase = Transaction::coinbase(miner_address.to_string(), coinbase_amount, height);

        let mut transactions = vec![coinbase];
        transactions.extend(included);
        Ok(Block::new_candidate(&self.tip, transactions, self.difficulty.header_bits))
    }

    /// Validates and commits `block`. On success the ledger, mempool, tip,
    /// and (at window boundaries) difficulty state all advance together;
    /// on any failure nothing is mutated.
    #[tracing::instrument(skip(self, block), fields(height = block.index))]
    pub fn add_block(&mut self, block: Block) -> Result<()> {
        let expected_index = self.tip.index + 1;
        if block.index != expected_index {
            return Err(Error::NonSequentialHeight);
        }
        if block.prev_hash != self.tip.block_hash() {
            return Err(Error::PrevHashMismatch);
        }

        let now = now_ts();
        if block.timestamp > now + self.cfg.max_future_drift_secs {
            return Err(Error::TimestampOutOfWindow);
        }
        if block.timestamp < self.tip.timestamp {
            return Err(Error::TimestampOutOfWindow);
        }

        if block.compute_merkle_root() != block.merkle_root {
            return Err(Error::BadMerkleRoot);
        }
        if !block.has_single_leading_coinbase() {
            return Err(Error::BadCoinbaseShape);
        }

        let serialized_len = bincode::serialize(&block)?.len();
        if serialized_len > self.cfg.max_block_bytes {
            return Err(Error::OversizeBlock(serialized_len));
        }

        if block.difficulty != self.difficulty.header_bits {
            return Err(Error::DifficultyFail);
        }
        pow::verify(&block, self.cfg.target_dimension, self.difficulty.epsilon)?;

        let mut fees = Amount::ZERO;
        for tx in block.transactions.iter().skip(1) {
            fees = fees.checked_add(tx.fee)?;
        }
        let expected_coinbase_amount = reward::reward(block.index, self.cfg.initial_reward, self.cfg.halving_interval)
            .checked_add(fees)?;
        let coinbase_amount = block.coinbase().ok_or(Error::BadCoinbaseShape)?.amount;
        if coinbase_amount != expected_coinbase_amount {
            return Err(Error::BadCoinbaseAmount);
        }

        let mut scratch = self.ledger.clone();
        scratch.apply_transactions(&block.transactions)?;

        let mut touched = BTreeSet::new();
        for tx in &block.transactions {
            if !tx.from_address.is_empty() {
                touched.insert(tx.from_address.clone());
            }
            touched.insert(tx.to_address.clone());
        }
        let deltas: Vec<(String, Amount)> = touched.into_iter().map(|addr| (addr.clone(), scratch.balance(&addr))).collect();

        self.store.commit_block(BlockCommit {
            block: &block,
            balance_deltas: &deltas,
        })?;

        for tx in block.transactions.iter().skip(1) {
            self.mempool.remove(&tx.txid());
        }
        self.ledger = scratch;
        let new_height = block.index;
        self.tip = block;

        if new_height > 0 && new_height % self.cfg.retarget_interval == 0 {
            let window_start = self
                .store
                .get_block_by_index(new_height - self.cfg.retarget_interval)?
                .ok_or_else(|| Error::Corruption("missing retarget window start".into()))?;
            self.difficulty = self.difficulty.retarget(window_start.timestamp, self.tip.timestamp, &self.cfg);
            tracing::info!(new_bits = self.difficulty.header_bits, new_epsilon = self.difficulty.epsilon, "retargeted");
        }

        tracing::info!(height = new_height, "block applied");
        Ok(())
    }
}

/// Requests accepted by the actor loop spawned by [`spawn`].
pub enum Command {
    AddBlock(Block, oneshot::Sender<Result<()>>),
    SubmitTransaction(Transaction, oneshot::Sender<Result<()>>),
    AssembleCandidate(String, oneshot::Sender<Result<Block>>),
    Balance(String, oneshot::Sender<Amount>),
    Tip(oneshot::Sender<Block>),
    MineParams(oneshot::Sender<MineParams>),
    HeaderBits(oneshot::Sender<u32>),
    GetBlockByIndex(u64, oneshot::Sender<Result<Option<Block>>>),
    GetBlockByHash(crate::Hash, oneshot::Sender<Result<Option<Block>>>),
    HeadersFrom(u64, u32, oneshot::Sender<Result<Vec<Block>>>),
    GetTransaction(crate::Hash, oneshot::Sender<Option<Transaction>>),
}

/// Cloneable front to a chain manager running on its own task. All methods
/// round-trip through the actor's command channel, so callers never touch
/// the store or ledger directly.
#[derive(Clone)]
pub struct ChainHandle {
    sender: mpsc::Sender<Command>,
}

fn channel_closed() -> Error {
    Error::Store("chain actor task is no longer running".into())
}

impl ChainHandle {
    pub async fn add_block(&self, block: Block) -> Result<()> {
        let (reply, rx) = oneshot::channel();
        self.sender.send(Command::AddBlock(block, reply)).await.map_err(|_| channel_closed())?;
        rx.await.map_err(|_| channel_closed())?
    }

    pub async fn submit_transaction(&self, tx: Transaction) -> Result<()> {
        let (reply, rx) = oneshot::channel();
        self.sender.send(Command::SubmitTransaction(tx, reply)).await.map_err(|_| channel_closed())?;
        rx.await.map_err(|_| channel_closed())?
    }

    pub async fn assemble_candidate(&self, miner_address: String) -> Result<Block> {
        let (reply, rx) = oneshot::channel();
        self.sender
            .send(Command::AssembleCandidate(miner_address, reply))
            .await
            .map_err(|_| channel_closed())?;
        rx.await.map_err(|_| channel_closed())?
    }

    pub async fn balance(&self, address: String) -> Result<Amount> {
        let (reply, rx) = oneshot::channel();
        self.sender.send(Command::Balance(address, reply)).await.map_err(|_| channel_closed())?;
        rx.await.map_err(|_| channel_closed())
    }

    pub async fn tip(&self) -> Result<Block> {
        let (reply, rx) = oneshot::channel();
        self.sender.send(Command::Tip(reply)).await.map_err(|_| channel_closed())?;
        rx.await.map_err(|_| channel_closed())
    }

    pub async fn mine_params(&self) -> Result<MineParams> {
        let (reply, rx) = oneshot::channel();
        self.sender.send(Command::MineParams(reply)).await.map_err(|_| channel_closed())?;
        rx.await.map_err(|_| channel_closed())
    }

    pub async fn header_bits(&self) -> Result<u32> {
        let (reply, rx) = oneshot::channel();
        self.sender.send(Command::HeaderBits(reply)).await.map_err(|_| channel_closed())?;
        rx.await.map_err(|_| channel_closed())
    }

    pub async fn get_block_by_index(&self, index: u64) -> Result<Option<Block>> {
        let (reply, rx) = oneshot::channel();
        self.sender.send(Command::GetBlockByIndex(index, reply)).await.map_err(|_| channel_closed())?;
        rx.await.map_err(|_| channel_closed())?
    }

    pub async fn get_block_by_hash(&self, hash: crate::Hash) -> Result<Option<Block>> {
        let (reply, rx) = oneshot::channel();
        self.sender.send(Command::GetBlockByHash(hash, reply)).await.map_err(|_| channel_closed())?;
        rx.await.map_err(|_| channel_closed())?
    }

    pub async fn headers_from(&self, from_height: u64, count: u32) -> Result<Vec<Block>> {
        let (reply, rx) = oneshot::channel();
        self.sender
            .send(Command::HeadersFrom(from_height, count, reply))
            .await
            .map_err(|_| channel_closed())?;
        rx.await.map_err(|_| channel_closed())?
    }

    pub async fn get_transaction(&self, txid: crate::Hash) -> Result<Option<Transaction>> {
        let (reply, rx) = oneshot::channel();
        self.sender.send(Command::GetTransaction(txid, reply)).await.map_err(|_| channel_closed())?;
        rx.await.map_err(|_| channel_closed())
    }
}

/// Spawns `manager` on its own task, returning a [`ChainHandle`] and the
/// task's `JoinHandle`. `buffer` bounds the outstanding-request queue —
/// callers block (cooperatively, via `.send().await`) once it fills,
/// rather than the actor accumulating unbounded backlog.
pub fn spawn<S>(manager: ChainManager<S>, buffer: usize) -> (ChainHandle, tokio::task::JoinHandle<()>)
where
    S: ChainStore + 'static,
{
    let (sender, mut receiver) = mpsc::channel(buffer);
    let join = tokio::spawn(async move {
        let mut manager = manager;
        while let Some(cmd) = receiver.recv().await {
            match cmd {
                Command::AddBlock(block, reply) => {
                    let _ = reply.send(manager.add_block(block));
                }
                Command::SubmitTransaction(tx, reply) => {
                    let _ = reply.send(manager.submit_transaction(tx));
                }
                Command::AssembleCandidate(addr, reply) => {
                    let _ = reply.send(manager.assemble_candidate(&addr));
                }
                Command::Balance(addr, reply) => {
                    let _ = reply.send(manager.balance(&addr));
                }
                Command::Tip(reply) => {
                    let _ = reply.send(manager.tip().clone());
                }
                Command::MineParams(reply) => {
                    let _ = reply.send(manager.mine_params());
                }
                Command::HeaderBits(reply) => {
                    let _ = reply.send(manager.header_bits());
                }
                Command::GetBlockByIndex(index, reply) => {
                    let _ = reply.send(manager.get_block_by_index(index));
                }
                Command::GetBlockByHash(hash, reply) => {
                    let _ = reply.send(manager.get_block_by_hash(&hash));
                }
                Command::HeadersFrom(from_height, count, reply) => {
                    let _ = reply.send(manager.headers_from(from_height, count));
                }
                Command::GetTransaction(txid, reply) => {
                    let _ = reply.send(manager.get_transaction(&txid));
                }
            }
        }
    });
    (ChainHandle { sender }, join)
}
