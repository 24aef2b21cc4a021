//! End-to-end pipeline tests over a scripted chain client: staged
//! build/sign/broadcast and the online single-pass flow.

use super::test_helpers::{inclusion_timeout, test_address, transfer_file_json, MockChainClient};
use crate::app::{App, RunOptions};
use crate::config::Config;
use crate::gas;
use crate::keyring::Keyring;
use crate::signer::SignError;
use crate::types::{Coins, BASE_DENOM};
use std::path::PathBuf;
use std::sync::atomic::Ordering;
use std::sync::Arc;

struct Fixture {
    _home: tempfile::TempDir,
    client: Arc<MockChainClient>,
    app: App,
    transfer_file: PathBuf,
}

/// App over a temp keyring ("payer" key), a scripted client, and a transfer
/// file with `recipients` one-baby entries.
fn fixture(recipients: usize, config: Config) -> Fixture {
    let home = tempfile::tempdir().unwrap();

    let keyring = Keyring::new(home.path().join("keys"), "baby");
    keyring.generate("payer").unwrap();

    let addresses: Vec<_> = (0..recipients).map(|i| test_address(i as u8)).collect();
    let pairs: Vec<_> = addresses.iter().map(|a| (a, 1.0)).collect();
    let transfer_file = home.path().join("transfer.json");
    std::fs::write(&transfer_file, transfer_file_json(&pairs)).unwrap();

    let client = Arc::new(MockChainClient::new());
    let app = App::new(config, client.clone(), keyring);
    Fixture {
        _home: home,
        client,
        app,
        transfer_file,
    }
}

fn opts() -> RunOptions {
    RunOptions {
        from: "payer".to_string(),
        batch_size: 10,
        ..Default::default()
    }
}

#[tokio::test]
async fn build_txs_offline_uses_the_gas_model_and_balances() {
    let f = fixture(25, Config::default());
    let opts = RunOptions {
        offline: true,
        ..opts()
    };

    let txs = f.app.build_txs(&f.transfer_file, &opts).await.unwrap().unwrap();
    assert_eq!(txs.len(), 3);

    for (tx, expected_outputs) in txs.iter().zip([10usize, 10, 5]) {
        let msg = &tx.body.messages[0];
        assert_eq!(msg.outputs.len(), expected_outputs);
        let out_sum = msg
            .outputs
            .iter()
            .fold(Coins::new(), |acc, o| acc.checked_add(&o.amount));
        assert_eq!(msg.inputs[0].amount, out_sum);
        assert_eq!(tx.auth_info.fee.gas_limit, gas::estimate_gas(expected_outputs));
        assert!(!tx.is_signed());
    }
    // offline never touches the chain
    assert_eq!(f.client.simulate_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn build_txs_online_applies_gas_adjustment_to_simulation() {
    let f = fixture(5, Config::default());
    let txs = f
        .app
        .build_txs(&f.transfer_file, &opts())
        .await
        .unwrap()
        .unwrap();

    assert_eq!(txs.len(), 1);
    assert_eq!(f.client.simulate_calls.load(Ordering::SeqCst), 1);
    // default simulation answers 400_000; adjustment 1.1
    assert_eq!(txs[0].auth_info.fee.gas_limit, 440_000);
}

#[tokio::test]
async fn validate_only_short_circuits_before_any_network_activity() {
    let f = fixture(25, Config::default());
    let opts = RunOptions {
        validate_only: true,
        ..opts()
    };

    assert!(f.app.build_txs(&f.transfer_file, &opts).await.unwrap().is_none());
    f.app.start(&f.transfer_file, &opts).await.unwrap();

    assert_eq!(f.client.simulate_calls.load(Ordering::SeqCst), 0);
    assert_eq!(f.client.account_calls.load(Ordering::SeqCst), 0);
    assert_eq!(f.client.broadcast_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn staged_flow_signs_sequentially_and_broadcasts_in_order() {
    let f = fixture(25, Config::default());
    let build_opts = RunOptions {
        offline: true,
        ..opts()
    };
    let txs = f
        .app
        .build_txs(&f.transfer_file, &build_opts)
        .await
        .unwrap()
        .unwrap();

    let sign_opts = RunOptions {
        offline: true,
        sequence: 7,
        account_number: 3,
        ..opts()
    };
    let signed = f.app.sign_txs(&txs, &sign_opts).unwrap();
    assert_eq!(signed.len(), 3);
    for (k, tx) in signed.iter().enumerate() {
        assert_eq!(tx.auth_info.signer_infos[0].sequence, 7 + k as u64);
        assert!(tx.is_signed());
    }

    f.app.broadcast_txs(&signed, 0).await.unwrap();
    assert_eq!(f.client.broadcast_calls.load(Ordering::SeqCst), 3);
    assert_eq!(f.client.inclusion_calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn signing_without_offline_flag_is_rejected() {
    let f = fixture(5, Config::default());
    let build_opts = RunOptions {
        offline: true,
        ..opts()
    };
    let txs = f
        .app
        .build_txs(&f.transfer_file, &build_opts)
        .await
        .unwrap()
        .unwrap();

    let err = f.app.sign_txs(&txs, &opts()).unwrap_err();
    assert!(matches!(err, SignError::OnlineUnsupported));
}

#[tokio::test]
async fn start_confirms_each_batch_with_a_fresh_sequence() {
    let f = fixture(25, Config::default());
    f.app.start(&f.transfer_file, &opts()).await.unwrap();

    // one account query, simulation, broadcast and confirmation per batch
    assert_eq!(f.client.account_calls.load(Ordering::SeqCst), 3);
    assert_eq!(f.client.simulate_calls.load(Ordering::SeqCst), 3);
    assert_eq!(f.client.broadcast_calls.load(Ordering::SeqCst), 3);
    assert_eq!(f.client.inclusion_calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn start_rebuilds_and_resends_a_batch_that_missed_its_window() {
    let f = fixture(25, Config::default());
    // first batch misses its inclusion window once, then lands
    f.client.push_inclusion(Err(inclusion_timeout("AA")));

    f.app.start(&f.transfer_file, &opts()).await.unwrap();

    // batch 0 was built and sent twice, batches 1 and 2 once each
    assert_eq!(f.client.broadcast_calls.load(Ordering::SeqCst), 4);
    assert_eq!(f.client.account_calls.load(Ordering::SeqCst), 4);
}

#[tokio::test]
async fn start_gives_up_after_the_configured_resend_budget() {
    let mut config = Config::default();
    config.chain.max_resends = 1;
    let f = fixture(5, config);
    f.client.push_inclusion(Err(inclusion_timeout("AA")));
    f.client.push_inclusion(Err(inclusion_timeout("AA")));

    let err = f.app.start(&f.transfer_file, &opts()).await.unwrap_err();
    let message = format!("{err:#}");
    assert!(message.contains("not included after 1 resends"), "{message}");
    assert!(message.contains("--start-index 0"), "{message}");
    assert_eq!(f.client.broadcast_calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn start_loads_a_single_entry_when_zero_amounts_are_present() {
    let home = tempfile::tempdir().unwrap();
    let keyring = Keyring::new(home.path().join("keys"), "baby");
    keyring.generate("payer").unwrap();

    let (a, b) = (test_address(1), test_address(2));
    let transfer_file = home.path().join("transfer.json");
    std::fs::write(&transfer_file, transfer_file_json(&[(&a, 10.0), (&b, 0.0)])).unwrap();

    let client = Arc::new(MockChainClient::new());
    let app = App::new(Config::default(), client.clone(), keyring);

    let set = app.load(&transfer_file).unwrap();
    assert_eq!(set.len(), 1);
    assert_eq!(set.total.amount_of(BASE_DENOM), 10_000_000);

    app.start(&transfer_file, &opts()).await.unwrap();
    assert_eq!(client.broadcast_calls.load(Ordering::SeqCst), 1);
}
