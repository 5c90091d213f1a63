//! Recovery against an indexer served over HTTP.
use std::collections::HashMap;
use std::sync::Arc;

use httpmock::prelude::*;
use httpmock::Mock;
use multisig_engine::bitcoin::bip32::{Xpriv, Xpub};
use multisig_engine::bitcoin::hashes::{sha256, Hash};
use multisig_engine::bitcoin::secp256k1::Secp256k1;
use multisig_engine::bitcoin::Txid;
use multisig_engine::fixed_script_wallet::{MultisigScript, OutputScriptType, RootWalletKeys};
use multisig_engine::indexer::{HttpIndexer, UnspentOutput};
use multisig_engine::recovery::{
    RecoveryOutcome, RecoveryParams, RecoveryPlan, UtxoRecovery, DEFAULT_FEE_RATE,
};
use multisig_engine::{to_output_script, Error, Network};
use serde_json::json;
use url::Url;

const NETWORK: Network = Network::BitcoinTestnet;
const BASE_PATH: &str = "/api/tbtc";
/// Indices queried per chain, and one past the end
const MOCKED_INDICES: u32 = 24;

fn xprv(seed: &str) -> Xpriv {
    let seed_hash = sha256::Hash::hash(seed.as_bytes()).to_byte_array();
    Xpriv::new_master(multisig_engine::bitcoin::Network::Testnet, &seed_hash).unwrap()
}

fn params() -> RecoveryParams {
    let secp = Secp256k1::new();
    let destination = wallet_script(&keys(), 0, 100).address;
    RecoveryParams::new(
        xprv("recovery/0"),
        xprv("recovery/1"),
        Xpub::from_priv(&secp, &xprv("recovery/2")),
        destination,
    )
}

fn keys() -> RootWalletKeys {
    let secp = Secp256k1::new();
    RootWalletKeys::new(
        ["recovery/0", "recovery/1", "recovery/2"].map(|s| Xpub::from_priv(&secp, &xprv(s))),
    )
}

fn wallet_script(keys: &RootWalletKeys, chain: u32, index: u32) -> MultisigScript {
    MultisigScript::from_wallet_keys(keys, chain, index, OutputScriptType::P2sh, NETWORK).unwrap()
}

fn recovery(server: &MockServer) -> UtxoRecovery {
    let base = Url::parse(&server.url(BASE_PATH)).unwrap();
    UtxoRecovery::new(NETWORK, Arc::new(HttpIndexer::new(base, None).unwrap()))
}

/// Address-info mocks for chains 0 and 1, keyed by `(chain, index)`.
///
/// `used` addresses report one transaction and the given balance.
async fn mock_addresses<'a>(
    server: &'a MockServer,
    used: &HashMap<(u32, u32), u64>,
) -> HashMap<(u32, u32), Mock<'a>> {
    let keys = keys();
    let mut mocks = HashMap::new();
    for chain in [0, 1] {
        for index in 0..MOCKED_INDICES {
            let address = wallet_script(&keys, chain, index).address;
            let (tx_count, balance) = match used.get(&(chain, index)) {
                Some(balance) => (1, *balance),
                None => (0, 0),
            };
            let mock = server
                .mock_async(|when, then| {
                    when.method(GET)
                        .path(format!("{}/address/{}", BASE_PATH, address));
                    then.status(200).json_body(json!({
                        "address": {"total": {"transaction_count": tx_count, "balance_int": balance}}
                    }));
                })
                .await;
            mocks.insert((chain, index), mock);
        }
    }
    mocks
}

#[tokio::test]
async fn test_gap_limit_termination() {
    let server = MockServer::start_async().await;
    // used but emptied addresses
    let used = HashMap::from([((0, 0), 0), ((0, 1), 0), ((0, 2), 0), ((1, 0), 0), ((1, 1), 0), ((1, 2), 0)]);
    let mocks = mock_addresses(&server, &used).await;

    let outcome = recovery(&server).recover(&params()).await.unwrap();
    assert_eq!(outcome, RecoveryOutcome::NothingToRecover);

    for chain in [0, 1] {
        let mut queries = 0;
        for index in 0..MOCKED_INDICES {
            queries += mocks[&(chain, index)].hits_async().await;
        }
        // 3 used addresses followed by a gap of 20
        assert_eq!(queries, 3 + 20, "chain {}", chain);
        assert_eq!(mocks[&(chain, 23)].hits_async().await, 0);
    }
}

#[tokio::test]
async fn test_empty_wallet() {
    let server = MockServer::start_async().await;
    let mocks = mock_addresses(&server, &HashMap::new()).await;

    let outcome = recovery(&server).recover(&params()).await.unwrap();
    assert_eq!(outcome, RecoveryOutcome::NothingToRecover);
    assert_eq!(mocks[&(0, 19)].hits_async().await, 1);
    assert_eq!(mocks[&(0, 20)].hits_async().await, 0);
}

struct FundedWallet {
    expected: multisig_engine::bitcoin::Transaction,
}

/// One unspent of 50,000 at chain 0 index 1, and the sweep it should produce.
async fn fund_wallet(server: &MockServer) -> FundedWallet {
    let keys = keys();
    let funded = wallet_script(&keys, 0, 1);
    let txid = Txid::from_byte_array([0x42; 32]);
    server
        .mock_async(|when, then| {
            when.method(GET)
                .path(format!("{}/address/{}/unspent", BASE_PATH, funded.address));
            then.status(200).json_body(json!({
                "unspent": [{"txid": txid.to_string(), "n": 0, "value_int": 50_000}]
            }));
        })
        .await;

    let params = params();
    let plan = RecoveryPlan::new(
        vec![UnspentOutput {
            txid,
            vout: 0,
            value: 50_000,
            address: funded.address.clone(),
            script: Some(funded),
            chain_path: Some((0, 1)),
        }],
        to_output_script(&params.recovery_destination, NETWORK).unwrap(),
        DEFAULT_FEE_RATE,
    )
    .unwrap();
    let expected = plan
        .sign(NETWORK, &params.user_key, Some(&params.backup_key))
        .unwrap();
    FundedWallet { expected }
}

#[tokio::test]
async fn test_recover() {
    let server = MockServer::start_async().await;
    mock_addresses(&server, &HashMap::from([((0, 1), 50_000)])).await;
    let FundedWallet { expected } = fund_wallet(&server).await;
    let decode = server
        .mock_async(|when, then| {
            when.method(POST).path(format!("{}/decodetx", BASE_PATH));
            then.status(200)
                .json_body(json!({"transaction": {"TxId": expected.compute_txid().to_string()}}));
        })
        .await;

    let outcome = recovery(&server).recover(&params()).await.unwrap();
    decode.assert_async().await;
    let RecoveryOutcome::Recovered(recovered) = outcome else {
        panic!("expected a recovery transaction");
    };
    assert_eq!(recovered.txid, expected.compute_txid().to_string());
    // 341 vbytes at 100 sat/vbyte
    assert_eq!(recovered.fee, 34_100);
    assert_eq!(recovered.recovery_amount, 50_000 - 34_100);
    assert_eq!(recovered.inputs.len(), 1);
    assert_eq!(recovered.inputs[0].chain_path, "/0/0/0/1");
}

#[tokio::test]
async fn test_decoder_disagreement() {
    let server = MockServer::start_async().await;
    mock_addresses(&server, &HashMap::from([((0, 1), 50_000)])).await;
    fund_wallet(&server).await;
    server
        .mock_async(|when, then| {
            when.method(POST).path(format!("{}/decodetx", BASE_PATH));
            then.status(200)
                .json_body(json!({"transaction": {"TxId": Txid::from_byte_array([1; 32]).to_string()}}));
        })
        .await;

    let err = recovery(&server).recover(&params()).await.unwrap_err();
    assert!(matches!(err, Error::RecoveryVerification(_)));
}
