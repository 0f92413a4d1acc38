use fractalpow_core::amount::Amount;
use fractalpow_core::block::Block;
use fractalpow_core::cancel::CancelToken;
use fractalpow_core::chain::ChainManager;
use fractalpow_core::config::{Config, ConfigBuilder};
use fractalpow_core::crypto::{address_from_pub, generate_keypair};
use fractalpow_core::pow::{self, mine};
use fractalpow_core::store::MemStore;
use fractalpow_core::transaction::Transaction;

fn fast_config() -> Config {
    ConfigBuilder::new()
        .initial_difficulty(0)
        .target_dimension(1.5)
        .initial_epsilon(0.5)
        .finish()
}

#[test]
fn genesis_block_passes_its_own_pow_verification() {
    // Genesis is constructed, not mined, so it only needs to clear whatever
    // difficulty the network config fixes it at — zero here, same as any
    // other unmined header.
    let cfg = fast_config();
    let genesis = Block::genesis(&cfg);
    assert!(pow::hash_meets_difficulty(&genesis.header_hash(), genesis.difficulty));
}

#[test]
fn mining_a_candidate_produces_a_block_that_verifies() {
    let cfg = fast_config();
    let manager = ChainManager::open(cfg, MemStore::new()).unwrap();
    let mut candidate = manager.assemble_candidate("miner-address").unwrap();
    let params = manager.mine_params();
    assert!(mine(&mut candidate, "miner-address", &params, &CancelToken::new()));
    assert!(pow::verify(&candidate, params.target_dimension, params.epsilon).is_ok());
}

#[test]
fn end_to_end_transaction_flow_settles_correct_balances() {
    let cfg = fast_config();
    let mut manager = ChainManager::open(cfg.clone(), MemStore::new()).unwrap();

    let keypair = generate_keypair();
    let address_a = address_from_pub(&keypair.public_key_bytes());

    // Fund A via mining.
    let mut block1 = manager.assemble_candidate(&address_a).unwrap();
    let params = manager.mine_params();
    assert!(mine(&mut block1, &address_a, &params, &CancelToken::new()));
    manager.add_block(block1).unwrap();
    assert_eq!(manager.balance(&address_a), cfg.initial_reward);

    // A signs a transfer to B with a fee.
    let mut transfer = Transaction::new_unsigned(
        address_a.clone(),
        "address-b".into(),
        Amount::from_coins(10),
        Amount::from_units(10_000_000), // 0.1
        0,
    );
    transfer.sign(&keypair);
    manager.submit_transaction(transfer).unwrap();

    // Miner of block 2 collects the fee on top of the subsidy.
    let mut block2 = manager.assemble_candidate("miner-of-block-2").unwrap();
    let params = manager.mine_params();
    assert!(mine(&mut block2, "miner-of-block-2", &params, &CancelToken::new()));
    manager.add_block(block2).unwrap();

    assert_eq!(
        manager.balance(&address_a),
        Amount::from_units(cfg.initial_reward.units() - 10 * 100_000_000 - 10_000_000)
    );
    assert_eq!(manager.balance("address-b"), Amount::from_coins(10));
    assert_eq!(
        manager.balance("miner-of-block-2"),
        Amount::from_units(cfg.initial_reward.units() + 10_000_000)
    );
}

#[test]
fn reopening_an_empty_store_twice_yields_the_same_genesis_hash() {
    let cfg = Config::default();
    let a = ChainManager::open(cfg.clone(), MemStore::new()).unwrap();
    let b = ChainManager::open(cfg, MemStore::new()).unwrap();
    assert_eq!(a.tip().block_hash(), b.tip().block_hash());
}
