//! Interfaces to the external services the engine consumes.
//!
//! Everything returned through these traits is untrusted: amounts and scripts
//! that matter for consensus are re-derived or re-checked locally by the
//! callers.
mod http;

pub use http::{HttpFeeRateSource, HttpIndexer};
pub(crate) use http::{build_client, read_json};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use crate::bitcoin::Txid;
use crate::fixed_script_wallet::MultisigScript;

#[derive(Debug, Error)]
pub enum IndexerError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("url parse: {0}")]
    Url(#[from] url::ParseError),
    #[error("{url} returned HTTP {status}: {body}")]
    Status {
        url: String,
        status: u16,
        body: String,
    },
    #[error("decode error: {0}")]
    Decode(String),
    #[error("not found: {0}")]
    NotFound(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AddressInfo {
    pub tx_count: u64,
    pub total_balance: u64,
}

/// A spendable output, as reported by an indexer or discovered by a scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnspentOutput {
    pub txid: Txid,
    pub vout: u32,
    pub value: u64,
    pub address: String,
    /// Scripts needed to spend the output, when the owner is known
    pub script: Option<MultisigScript>,
    /// `(chain, index)` the scripts were derived at
    pub chain_path: Option<(u32, u32)>,
}

impl UnspentOutput {
    pub fn outpoint(&self) -> crate::bitcoin::OutPoint {
        crate::bitcoin::OutPoint {
            txid: self.txid,
            vout: self.vout,
        }
    }
}

/// The parts of an externally decoded transaction the engine checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedTransaction {
    pub txid: String,
}

/// Coordinator metadata about a wallet address.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddressDetails {
    #[serde(default)]
    pub address: Option<String>,
    pub chain: u32,
    pub index: u32,
    #[serde(default)]
    pub coin_specific: Option<CoinSpecific>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CoinSpecific {
    #[serde(default)]
    pub redeem_script: Option<String>,
    #[serde(default)]
    pub witness_script: Option<String>,
}

impl AddressDetails {
    pub fn new(chain: u32, index: u32, segwit: bool) -> Self {
        Self {
            address: None,
            chain,
            index,
            coin_specific: segwit.then(|| CoinSpecific {
                redeem_script: None,
                witness_script: Some(String::new()),
            }),
        }
    }

    /// Addresses with a witness script are wrapped segwit.
    pub fn is_segwit(&self) -> bool {
        self.coin_specific
            .as_ref()
            .is_some_and(|c| c.witness_script.is_some())
    }
}

/// Block explorer queries used by verification and recovery.
#[async_trait]
pub trait Indexer: Send + Sync {
    async fn address_info(&self, address: &str) -> Result<AddressInfo, IndexerError>;

    async fn unspent_outputs(&self, address: &str) -> Result<Vec<UnspentOutput>, IndexerError>;

    /// Raw serialized transaction.
    async fn transaction_by_id(&self, txid: &Txid) -> Result<Vec<u8>, IndexerError>;

    async fn decode_transaction(&self, tx_hex: &str) -> Result<DecodedTransaction, IndexerError>;
}

#[async_trait]
pub trait FeeRateSource: Send + Sync {
    /// Recommended fee rate in base units per byte.
    async fn recommended_fee_rate(&self) -> Result<u64, IndexerError>;
}

/// Coordinator lookup of wallet address metadata.
#[async_trait]
pub trait WalletAddressLookup: Send + Sync {
    async fn wallet_address(&self, address: &str) -> Result<Option<AddressDetails>, IndexerError>;
}

/// Fee rate from `source`, or `default_rate` when there is no source or it fails.
pub async fn resolve_fee_rate(source: Option<&dyn FeeRateSource>, default_rate: u64) -> u64 {
    let Some(source) = source else {
        return default_rate;
    };
    match source.recommended_fee_rate().await {
        Ok(rate) if rate > 0 => rate,
        Ok(_) => {
            warn!(default_rate, "fee source returned zero, using default fee rate");
            default_rate
        }
        Err(e) => {
            warn!(error = %e, default_rate, "could not fetch fee rate, using default fee rate");
            default_rate
        }
    }
}
