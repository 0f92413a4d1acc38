//! Cancellable background mining worker. Owns no chain state itself — it
//! only talks to a [`ChainHandle`], the same way any other caller would,
//! so it never bypasses the single-writer discipline in [`crate::chain`].

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::block::Block;
use crate::cancel::CancelToken;
use crate::chain::ChainHandle;
use crate::pow;

/// A running miner task plus the means to stop it.
pub struct MinerHandle {
    cancel: CancelToken,
    task: JoinHandle<()>,
}

impl MinerHandle {
    /// Requests cancellation and waits for the worker to exit. Cancellation
    /// is checked once per nonce and once per fractal grid row, so this
    /// returns promptly rather than waiting out an entire mining attempt.
    pub async fn stop(self) {
        self.cancel.cancel();
        let _ = self.task.await;
    }
}

/// Spawns a worker that repeatedly assembles a candidate on top of the
/// current tip, mines it, and submits it back through `chain`. Each
/// successfully mined block is also sent on `mined`, so a caller with
/// network access (this crate has none) can announce it to peers.
///
/// The mining loop itself is synchronous and CPU-bound, so each attempt
/// runs via [`tokio::task::spawn_blocking`] rather than on the async
/// worker thread pool.
pub fn spawn(chain: ChainHandle, miner_address: String, mined: mpsc::Sender<Block>) -> MinerHandle {
    let cancel = CancelToken::new();
    let worker_cancel = cancel.clone();

    let task = tokio::spawn(async move {
        while !worker_cancel.is_cancelled() {
            let candidate = match chain.assemble_candidate(miner_address.clone()).await {
                Ok(block) => block,
                Err(_) => break,
            };
            let params = match chain.mine_params().await {
                Ok(params) => params,
                Err(_) => break,
            };

            let attempt_cancel = worker_cancel.clone();
            let attempt_address = miner_address.clone();
            let mine_result = tokio::task::spawn_blocking(move || {
                let mut candidate = candidate;
                let found = pow::mine(&mut candidate, &attempt_address, &params, &attempt_cancel);
                (found, candidate)
            })
            .await;

            let (found, mined_block) = match mine_result {
                Ok(result) => result,
                Err(_) => break,
            };

            if !found {
                // Either cancelled mid-attempt, or the tip moved under us
                // and the candidate no longer matches. Either way, loop
                // around and reassemble against the latest tip.
                continue;
            }

            if chain.add_block(mined_block.clone()).await.is_ok() {
                if mined.send(mined_block).await.is_err() {
                    break;
                }
            }
        }
    });

    MinerHandle { cancel, task }
}
