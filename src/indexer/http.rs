//! reqwest clients for a block-explorer style indexer and fee endpoint.
//!
//! Endpoints (relative to the base url):
//! - GET  /address/{address}          address.total.{transaction_count, balance_int}
//! - GET  /address/{address}/unspent  unspent[].{txid, n, value_int}
//! - GET  /tx/{txid}/hex              hex[0].hex
//! - POST /decodetx                   {"hex": ..} -> transaction.TxId
use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;
use url::Url;

use super::{AddressInfo, DecodedTransaction, FeeRateSource, Indexer, IndexerError, UnspentOutput};
use crate::bitcoin::Txid;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(20);

pub(crate) fn build_client() -> Result<Client, IndexerError> {
    Ok(Client::builder().timeout(REQUEST_TIMEOUT).build()?)
}

pub(crate) async fn read_json<T: DeserializeOwned>(
    resp: reqwest::Response,
) -> Result<T, IndexerError> {
    let url = resp.url().to_string();
    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        return Err(IndexerError::Status {
            url,
            status: status.as_u16(),
            body,
        });
    }
    let text = resp.text().await?;
    serde_json::from_str(&text).map_err(|e| IndexerError::Decode(format!("{}: {}", url, e)))
}

#[derive(Clone)]
pub struct HttpIndexer {
    base: Url,
    client: Client,
    api_key: Option<String>,
}

impl HttpIndexer {
    /// `base` like "https://api.example.com/v1/btc/main".
    pub fn new(base: Url, api_key: Option<String>) -> Result<Self, IndexerError> {
        Ok(Self {
            base,
            client: build_client()?,
            api_key,
        })
    }

    fn url(&self, segments: &[&str]) -> Result<Url, IndexerError> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| IndexerError::Decode(format!("{} cannot be a base url", self.base)))?
            .pop_if_empty()
            .extend(segments);
        if let Some(key) = &self.api_key {
            url.query_pairs_mut().append_pair("api_key", key);
        }
        Ok(url)
    }

    async fn get<T: DeserializeOwned>(&self, segments: &[&str]) -> Result<T, IndexerError> {
        let url = self.url(segments)?;
        debug!(%url, "indexer request");
        read_json(self.client.get(url).send().await?).await
    }
}

#[derive(Deserialize)]
struct AddressResponse {
    address: AddressBody,
}

#[derive(Deserialize)]
struct AddressBody {
    total: AddressTotals,
}

#[derive(Deserialize)]
struct AddressTotals {
    transaction_count: u64,
    balance_int: u64,
}

#[derive(Deserialize)]
struct UnspentResponse {
    #[serde(default)]
    unspent: Vec<UnspentEntry>,
}

#[derive(Deserialize)]
struct UnspentEntry {
    txid: String,
    n: u32,
    value_int: u64,
}

#[derive(Deserialize)]
struct TxHexResponse {
    hex: Vec<TxHexEntry>,
}

#[derive(Deserialize)]
struct TxHexEntry {
    hex: String,
}

#[derive(Deserialize)]
struct DecodeResponse {
    transaction: DecodedBody,
}

#[derive(Deserialize)]
struct DecodedBody {
    #[serde(rename = "TxId")]
    tx_id: String,
}

#[async_trait]
impl Indexer for HttpIndexer {
    async fn address_info(&self, address: &str) -> Result<AddressInfo, IndexerError> {
        let resp: AddressResponse = self.get(&["address", address]).await?;
        Ok(AddressInfo {
            tx_count: resp.address.total.transaction_count,
            total_balance: resp.address.total.balance_int,
        })
    }

    async fn unspent_outputs(&self, address: &str) -> Result<Vec<UnspentOutput>, IndexerError> {
        let resp: UnspentResponse = self.get(&["address", address, "unspent"]).await?;
        resp.unspent
            .into_iter()
            .map(|u| {
                let txid = Txid::from_str(&u.txid)
                    .map_err(|e| IndexerError::Decode(format!("invalid txid {}: {}", u.txid, e)))?;
                Ok(UnspentOutput {
                    txid,
                    vout: u.n,
                    value: u.value_int,
                    address: address.to_string(),
                    script: None,
                    chain_path: None,
                })
            })
            .collect()
    }

    async fn transaction_by_id(&self, txid: &Txid) -> Result<Vec<u8>, IndexerError> {
        let txid = txid.to_string();
        let resp: TxHexResponse = self.get(&["tx", &txid, "hex"]).await?;
        let entry = resp
            .hex
            .into_iter()
            .next()
            .ok_or_else(|| IndexerError::NotFound(format!("transaction {}", txid)))?;
        hex::decode(entry.hex.trim())
            .map_err(|e| IndexerError::Decode(format!("transaction {} is not hex: {}", txid, e)))
    }

    async fn decode_transaction(&self, tx_hex: &str) -> Result<DecodedTransaction, IndexerError> {
        let url = self.url(&["decodetx"])?;
        debug!(%url, "indexer decode request");
        let resp = self
            .client
            .post(url)
            .json(&json!({ "hex": tx_hex }))
            .send()
            .await?;
        let resp: DecodeResponse = read_json(resp).await?;
        Ok(DecodedTransaction {
            txid: resp.transaction.tx_id,
        })
    }
}

/// Fee endpoint answering `{"hourFee": <sat/byte>}`.
#[derive(Clone)]
pub struct HttpFeeRateSource {
    url: Url,
    client: Client,
}

impl HttpFeeRateSource {
    pub fn new(url: Url) -> Result<Self, IndexerError> {
        Ok(Self {
            url,
            client: build_client()?,
        })
    }
}

#[derive(Deserialize)]
struct FeeResponse {
    #[serde(rename = "hourFee")]
    hour_fee: u64,
}

#[async_trait]
impl FeeRateSource for HttpFeeRateSource {
    async fn recommended_fee_rate(&self) -> Result<u64, IndexerError> {
        let resp: FeeResponse = read_json(self.client.get(self.url.clone()).send().await?).await?;
        Ok(resp.hour_fee)
    }
}
