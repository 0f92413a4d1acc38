use std::time::Duration;

use fractalpow_core::cancel::CancelToken;
use fractalpow_core::chain::{self, ChainManager};
use fractalpow_core::config::ConfigBuilder;
use fractalpow_core::pow::mine;
use fractalpow_core::store::MemStore;
use fractalpow_network::Node;

fn fast_config() -> fractalpow_core::config::Config {
    ConfigBuilder::new()
        .initial_difficulty(0)
        .target_dimension(1.5)
        .initial_epsilon(0.5)
        .finish()
}

#[tokio::test]
async fn node_a_mines_a_block_and_node_b_adopts_it_via_propagation() {
    let cfg = fast_config();

    let manager_a = ChainManager::open(cfg.clone(), MemStore::new()).unwrap();
    let (chain_a, _join_a) = chain::spawn(manager_a, 32);
    let manager_b = ChainManager::open(cfg, MemStore::new()).unwrap();
    let (chain_b, _join_b) = chain::spawn(manager_b, 32);

    let node_a = Node::new("a".into(), "test".into(), chain_a.clone());
    let node_b = Node::new("b".into(), "test".into(), chain_b.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    let listen_task = tokio::spawn(node_b.clone().listen(addr));
    tokio::time::sleep(Duration::from_millis(50)).await;
    node_a.clone().connect(addr).await.unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;

    // Node A mines block 1 on its own chain.
    let mut candidate = chain_a.assemble_candidate("miner-a".into()).await.unwrap();
    let params = chain_a.mine_params().await.unwrap();
    assert!(mine(&mut candidate, "miner-a", &params, &CancelToken::new()));
    chain_a.add_block(candidate.clone()).await.unwrap();
    node_a.announce_block(&candidate).await;

    // Node B should fetch and apply it within the propagation window.
    let mut adopted = false;
    for _ in 0..20 {
        if chain_b.tip().await.unwrap().index == 1 {
            adopted = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    assert!(adopted, "node B did not adopt block 1 within the propagation window");
    assert_eq!(chain_b.tip().await.unwrap().block_hash(), candidate.block_hash());

    listen_task.abort();
}
