use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use memwallet::{
    BlockSubscriber, FaultPolicy, InMemoryWallet, NodeConnection, NodeError, WalletConfig,
    WalletError,
};
use memwallet_consensus::{Network, COIN};
use memwallet_primitives::{Address, Transaction, TxIn, TxOut};
use memwallet_simnode::SimNode;

const SUBSIDY: i64 = 5 * COIN;

fn harness(id: u32) -> (Arc<SimNode>, InMemoryWallet) {
    let node = SimNode::new(Network::Regtest).expect("simnode");
    let config = WalletConfig::for_harness(Network::Regtest, id)
        .with_fault_policy(FaultPolicy::Panic)
        .with_sync_poll_interval(Duration::from_millis(5));
    let wallet = InMemoryWallet::new(config).expect("wallet");
    wallet
        .start(Arc::clone(&node) as Arc<dyn NodeConnection>)
        .expect("start");
    (node, wallet)
}

fn catch_up(node: &SimNode, wallet: &InMemoryWallet) {
    node.flush().expect("flush");
    let target = node.tip_height().expect("tip");
    assert_eq!(
        wallet
            .sync_timeout(target, Duration::from_secs(10))
            .expect("sync"),
        target
    );
}

#[test]
fn mined_coinbases_mature_after_sixteen_blocks() {
    let (node, wallet) = harness(100);
    let mining = wallet.coinbase_address();
    node.generate(20, Some(&mining)).expect("generate");
    catch_up(&node, &wallet);

    let balance = wallet.balance_breakdown().expect("balance");
    assert_eq!(balance.spendable, 4 * SUBSIDY);
    assert_eq!(balance.immature, 16 * SUBSIDY);
    assert_eq!(wallet.balance().expect("balance"), 4 * SUBSIDY);
    assert_eq!(wallet.list_unspent().expect("unspent").len(), 4);
    wallet.stop().expect("stop");
}

#[test]
fn foreign_payouts_are_not_tracked() {
    let (node, wallet) = harness(101);
    let stranger = Address::from_pubkey_hash([0x42; 20], Network::Regtest);
    node.generate(20, Some(&stranger)).expect("generate");
    node.generate(1, None).expect("generate");
    catch_up(&node, &wallet);
    assert_eq!(wallet.balance_breakdown().expect("balance").total(), 0);
    wallet.stop().expect("stop");
}

#[test]
fn reorg_unwinds_and_replays_coinbases() {
    let (node, wallet) = harness(102);
    let mining = wallet.coinbase_address();
    node.generate(20, Some(&mining)).expect("generate");
    catch_up(&node, &wallet);

    assert_eq!(node.invalidate_tip(2).expect("invalidate"), 18);
    node.flush().expect("flush");
    assert_eq!(wallet.synced_height().expect("height"), 18);
    assert_eq!(wallet.balance().expect("balance"), 2 * SUBSIDY);
    let balance = wallet.balance_breakdown().expect("balance");
    assert_eq!(balance.immature, 16 * SUBSIDY);

    let other = Address::from_pubkey_hash([0x24; 20], Network::Regtest);
    node.generate(3, Some(&other)).expect("generate");
    catch_up(&node, &wallet);
    assert_eq!(wallet.synced_height().expect("height"), 21);
    assert_eq!(wallet.balance().expect("balance"), 5 * SUBSIDY);
    let balance = wallet.balance_breakdown().expect("balance");
    assert_eq!(balance.immature, 13 * SUBSIDY);
    wallet.stop().expect("stop");
}

#[test]
fn broadcast_spend_moves_value_between_owned_addresses() {
    let (node, wallet) = harness(103);
    let mining = wallet.coinbase_address();
    node.generate(17, Some(&mining)).expect("generate");
    catch_up(&node, &wallet);

    let unspent = wallet.list_unspent().expect("unspent");
    let coin = unspent.into_iter().next().expect("mature coin");
    wallet.lock_outpoint(&coin.outpoint).expect("lock");
    assert_eq!(wallet.balance().expect("balance"), 0);

    let destination = wallet.new_address().expect("address");
    let stranger = Address::from_pubkey_hash([0x33; 20], Network::Regtest);
    let tx = Transaction {
        vin: vec![TxIn::new(coin.outpoint, Vec::new())],
        vout: vec![
            TxOut::new(3 * COIN, destination.script_pubkey()),
            TxOut::new(2 * COIN - 1000, stranger.script_pubkey()),
        ],
        ..Transaction::default()
    };
    let txid = wallet.broadcast(&tx).expect("broadcast");
    assert_eq!(node.mempool_contains(&txid), Ok(true));

    node.generate(1, None).expect("generate");
    catch_up(&node, &wallet);
    let unspent = wallet.list_unspent().expect("unspent");
    assert!(unspent.iter().all(|u| u.outpoint != coin.outpoint));
    let received = unspent
        .iter()
        .find(|u| u.address == destination)
        .expect("payment to new address");
    assert_eq!(received.value, 3 * COIN);
    assert_eq!(received.maturity_height, 0);
    assert!(wallet.locked_outpoints().expect("locked").is_empty());

    // Disconnecting the spending block brings the locked coin back.
    node.invalidate_tip(1).expect("invalidate");
    node.flush().expect("flush");
    let locked = wallet.locked_outpoints().expect("locked");
    assert_eq!(locked, vec![coin.outpoint]);
    wallet.unlock_outputs(&tx.vin).expect("unlock");
    assert_eq!(wallet.balance().expect("balance"), SUBSIDY);
    wallet.stop().expect("stop");
}

#[test]
fn node_rejections_surface_as_wallet_errors() {
    let (node, wallet) = harness(104);
    let mining = wallet.coinbase_address();
    node.generate(2, Some(&mining)).expect("generate");
    catch_up(&node, &wallet);

    let immature = node.block_at(1).expect("block").transactions[0].outpoint(2);
    let tx = Transaction {
        vin: vec![TxIn::new(immature, Vec::new())],
        vout: vec![TxOut::new(COIN, mining.script_pubkey())],
        ..Transaction::default()
    };
    match wallet.broadcast(&tx) {
        Err(WalletError::Node(NodeError::Rejected(reason))) => {
            assert!(reason.contains("immature"), "{reason}");
        }
        other => panic!("expected rejection, got {other:?}"),
    }
    wallet.stop().expect("stop");
}

#[test]
fn addresses_issued_while_running_receive_payments() {
    let (node, wallet) = harness(105);
    let fresh = wallet.new_address().expect("address");
    node.mine_to(vec![TxOut::new(7 * COIN, fresh.script_pubkey())])
        .expect("mine_to");
    catch_up(&node, &wallet);
    let balance = wallet.balance_breakdown().expect("balance");
    assert_eq!(balance.immature, 7 * COIN);

    node.generate(16, None).expect("generate");
    catch_up(&node, &wallet);
    let unspent = wallet.list_unspent().expect("unspent");
    assert_eq!(unspent.len(), 1);
    assert_eq!(unspent[0].address, fresh);
    assert_eq!(unspent[0].maturity_height, 17);
    wallet.stop().expect("stop");
}

#[test]
fn stopped_wallet_ignores_new_blocks() {
    let (node, wallet) = harness(106);
    let mining = wallet.coinbase_address();
    node.generate(1, Some(&mining)).expect("generate");
    catch_up(&node, &wallet);
    wallet.stop().expect("stop");
    assert!(!node.is_notifying());
    assert_eq!(node.subscriber_count(), Ok(0));

    node.generate(2, Some(&mining)).expect("generate");
    node.flush().expect("flush");
    assert_eq!(wallet.synced_height().expect("height"), 1);
}

#[test]
fn other_subscribers_see_the_same_notifications() {
    struct Tally(AtomicU32, AtomicU32);

    impl BlockSubscriber for Tally {
        fn block_connected(&self, _header: &[u8], _filtered_txns: &[Vec<u8>]) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }

        fn block_disconnected(&self, _header: &[u8]) {
            self.1.fetch_add(1, Ordering::SeqCst);
        }
    }

    let (node, wallet) = harness(107);
    let tally = Arc::new(Tally(AtomicU32::new(0), AtomicU32::new(0)));
    node.subscribe(Arc::clone(&tally) as Arc<dyn BlockSubscriber>)
        .expect("subscribe");
    assert_eq!(node.subscriber_count(), Ok(2));

    let mining = wallet.coinbase_address();
    node.generate(17, Some(&mining)).expect("generate");
    catch_up(&node, &wallet);
    node.invalidate_tip(1).expect("invalidate");
    node.flush().expect("flush");

    assert_eq!(tally.0.load(Ordering::SeqCst), 17);
    assert_eq!(tally.1.load(Ordering::SeqCst), 1);
    assert_eq!(wallet.synced_height().expect("height"), 16);
    assert_eq!(wallet.balance().expect("balance"), 0);
    wallet.stop().expect("stop");
}
