//! Recovery of account-model wallet contracts with the user and backup keys.
//!
//! The user key signs the operation moving the whole wallet balance. The
//! backup key signs and pays for the transaction calling the contract, so its
//! address must hold enough ether for gas.
use std::sync::Arc;

use async_trait::async_trait;
use num_bigint::BigUint;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};
use url::Url;

use super::abi::{encode_get_next_sequence_id, encode_send_multisig, SendMultiSigCall};
use super::operation::{
    default_expire_time, sign_digest, sign_operation, verify_operation_signature,
    AccountRecipient, HalfSignedOperation, Operation, OperationKind,
};
use super::transaction::LegacyTransaction;
use super::{signing_key_from_xprv, EthAddress};
use crate::bitcoin::bip32::Xpriv;
use crate::error::{Error, Result};
use crate::indexer::{build_client, read_json, IndexerError};

pub const DEFAULT_GAS_PRICE: u64 = 20_000_000_000;
pub const DEFAULT_GAS_LIMIT: u64 = 500_000;

/// Account state queries used by recovery.
#[async_trait]
pub trait AccountExplorer: Send + Sync {
    /// Number of transactions sent from `address`, i.e. its next nonce.
    async fn outgoing_transaction_count(&self, address: &EthAddress) -> Result<u64, IndexerError>;

    async fn balance(&self, address: &EthAddress) -> Result<BigUint, IndexerError>;

    async fn token_balance(
        &self,
        token: &EthAddress,
        holder: &EthAddress,
    ) -> Result<BigUint, IndexerError>;

    /// Read-only contract call at the latest block.
    async fn call(&self, to: &EthAddress, data: &[u8]) -> Result<Vec<u8>, IndexerError>;
}

/// Etherscan-style `/api?module=..&action=..` explorer.
#[derive(Clone)]
pub struct EtherscanExplorer {
    base: Url,
    client: Client,
    api_key: Option<String>,
}

#[derive(Deserialize)]
struct ExplorerResponse {
    #[serde(default)]
    message: Option<String>,
    result: Value,
}

#[derive(Deserialize)]
struct ExplorerTransaction {
    from: String,
}

impl EtherscanExplorer {
    pub fn new(base: Url, api_key: Option<String>) -> Result<Self, IndexerError> {
        Ok(Self {
            base,
            client: build_client()?,
            api_key,
        })
    }

    fn url(&self, query: &[(&str, &str)]) -> Result<Url, IndexerError> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| IndexerError::Decode(format!("{} cannot be a base url", self.base)))?
            .pop_if_empty()
            .push("api");
        {
            let mut pairs = url.query_pairs_mut();
            pairs.extend_pairs(query);
            if let Some(key) = &self.api_key {
                pairs.append_pair("apikey", key);
            }
        }
        Ok(url)
    }

    async fn query(&self, query: &[(&str, &str)]) -> Result<ExplorerResponse, IndexerError> {
        let url = self.url(query)?;
        debug!(%url, "explorer request");
        read_json(self.client.get(url).send().await?).await
    }

    async fn query_amount(&self, query: &[(&str, &str)]) -> Result<BigUint, IndexerError> {
        let resp = self.query(query).await?;
        let amount = resp
            .result
            .as_str()
            .and_then(|s| BigUint::parse_bytes(s.as_bytes(), 10));
        amount.ok_or_else(|| {
            IndexerError::Decode(format!(
                "expected a decimal amount, got {} ({})",
                resp.result,
                resp.message.unwrap_or_default()
            ))
        })
    }
}

#[async_trait]
impl AccountExplorer for EtherscanExplorer {
    async fn outgoing_transaction_count(&self, address: &EthAddress) -> Result<u64, IndexerError> {
        let address = address.to_string();
        let resp = self
            .query(&[("module", "account"), ("action", "txlist"), ("address", &address)])
            .await?;
        // an empty history comes back as a message instead of a list
        let no_history = resp
            .message
            .as_deref()
            .is_some_and(|m| m.starts_with("No transactions found"));
        let transactions: Vec<ExplorerTransaction> = if resp.result.is_array() {
            serde_json::from_value(resp.result)
                .map_err(|e| IndexerError::Decode(format!("txlist of {}: {}", address, e)))?
        } else if no_history {
            vec![]
        } else {
            return Err(IndexerError::Decode(format!(
                "txlist of {}: unexpected result {}",
                address, resp.result
            )));
        };
        Ok(transactions
            .iter()
            .filter(|tx| tx.from.eq_ignore_ascii_case(&address))
            .count() as u64)
    }

    async fn balance(&self, address: &EthAddress) -> Result<BigUint, IndexerError> {
        let address = address.to_string();
        self.query_amount(&[("module", "account"), ("action", "balance"), ("address", &address)])
            .await
    }

    async fn token_balance(
        &self,
        token: &EthAddress,
        holder: &EthAddress,
    ) -> Result<BigUint, IndexerError> {
        let (token, holder) = (token.to_string(), holder.to_string());
        self.query_amount(&[
            ("module", "account"),
            ("action", "tokenbalance"),
            ("contractaddress", &token),
            ("address", &holder),
            ("tag", "latest"),
        ])
        .await
    }

    async fn call(&self, to: &EthAddress, data: &[u8]) -> Result<Vec<u8>, IndexerError> {
        let (to, data) = (to.to_string(), format!("0x{}", hex::encode(data)));
        let resp = self
            .query(&[
                ("module", "proxy"),
                ("action", "eth_call"),
                ("to", &to),
                ("data", &data),
                ("tag", "latest"),
            ])
            .await?;
        let result = resp
            .result
            .as_str()
            .ok_or_else(|| IndexerError::Decode(format!("eth_call to {}: {}", to, resp.result)))?;
        hex::decode(result.strip_prefix("0x").unwrap_or(result))
            .map_err(|e| IndexerError::Decode(format!("eth_call to {}: {}", to, e)))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GasParams {
    pub gas_price: u64,
    pub gas_limit: u64,
    /// Signs with replay protection when set
    #[serde(default)]
    pub chain_id: Option<u64>,
}

impl Default for GasParams {
    fn default() -> Self {
        Self {
            gas_price: DEFAULT_GAS_PRICE,
            gas_limit: DEFAULT_GAS_LIMIT,
            chain_id: None,
        }
    }
}

impl GasParams {
    pub fn max_fee(&self) -> BigUint {
        BigUint::from(self.gas_price) * self.gas_limit
    }
}

#[derive(Debug, Clone)]
pub struct AccountRecoveryParams {
    pub user_key: Xpriv,
    pub backup_key: Xpriv,
    pub wallet_contract: EthAddress,
    pub recovery_destination: EthAddress,
}

#[derive(Debug, Clone)]
pub struct TokenRecoveryParams {
    pub user_key: Xpriv,
    pub wallet_contract: EthAddress,
    pub token_contract: EthAddress,
    pub recipient: EthAddress,
}

/// A fully signed transaction ready to broadcast.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SignedAccountTransaction {
    /// `0x`-prefixed transaction hash
    pub id: String,
    /// Raw transaction hex
    pub tx: String,
}

#[derive(Clone)]
pub struct AccountRecovery {
    explorer: Arc<dyn AccountExplorer>,
    gas: GasParams,
}

impl AccountRecovery {
    pub fn new(explorer: Arc<dyn AccountExplorer>) -> Self {
        Self {
            explorer,
            gas: GasParams::default(),
        }
    }

    pub fn with_gas(mut self, gas: GasParams) -> Self {
        self.gas = gas;
        self
    }

    pub fn gas(&self) -> GasParams {
        self.gas
    }

    /// Sequence id the wallet contract accepts next.
    pub async fn next_sequence_id(&self, wallet_contract: &EthAddress) -> Result<u64> {
        let word = self
            .explorer
            .call(wallet_contract, &encode_get_next_sequence_id())
            .await
            .map_err(|e| Error::indexer(format!("reading sequence id of {}", wallet_contract), e))?;
        if word.len() != 32 {
            return Err(Error::parse(format!(
                "sequence id of {} is {} bytes, expected 32",
                wallet_contract,
                word.len()
            )));
        }
        u64::try_from(&BigUint::from_bytes_be(&word))
            .map_err(|_| Error::parse(format!("sequence id of {} overflows", wallet_contract)))
    }

    /// Sweep the wallet contract's ether balance to the recovery destination.
    pub async fn recover(&self, params: &AccountRecoveryParams) -> Result<SignedAccountTransaction> {
        let user_key = signing_key_from_xprv(&params.user_key)?;
        let backup_key = signing_key_from_xprv(&params.backup_key)?;
        let backup_address = EthAddress::from_signing_key(&backup_key);

        let nonce = self
            .explorer
            .outgoing_transaction_count(&backup_address)
            .await
            .map_err(|e| Error::indexer(format!("listing transactions of {}", backup_address), e))?;
        let backup_balance = self
            .explorer
            .balance(&backup_address)
            .await
            .map_err(|e| Error::indexer(format!("reading balance of {}", backup_address), e))?;
        if backup_balance < self.gas.max_fee() {
            return Err(Error::InsufficientFunds(format!(
                "backup key address {} has balance {}, needs at least {} to pay for gas",
                backup_address,
                backup_balance,
                self.gas.max_fee()
            )));
        }

        let wallet_balance = self
            .explorer
            .balance(&params.wallet_contract)
            .await
            .map_err(|e| Error::indexer(format!("reading balance of {}", params.wallet_contract), e))?;
        if wallet_balance == BigUint::from(0u32) {
            return Err(Error::InsufficientFunds(format!(
                "wallet contract {} has no balance to recover",
                params.wallet_contract
            )));
        }
        let sequence_id = self.next_sequence_id(&params.wallet_contract).await?;
        debug!(nonce, %wallet_balance, sequence_id, "wallet contract state");

        let operation = Operation {
            kind: OperationKind::Ether,
            recipient: AccountRecipient::new(params.recovery_destination, wallet_balance),
            expire_time: default_expire_time(),
            sequence_id,
        };
        let digest = operation.digest()?;
        let signature = sign_digest(&digest, &user_key)?;
        verify_operation_signature(&digest, &signature, &EthAddress::from_signing_key(&user_key))?;

        let data = encode_send_multisig(&SendMultiSigCall {
            to: operation.recipient.address,
            value: operation.recipient.amount.clone(),
            data: vec![],
            expire_time: operation.expire_time,
            sequence_id,
            signature: signature.to_vec(),
        })?;
        let tx = LegacyTransaction {
            nonce,
            gas_price: self.gas.gas_price,
            gas_limit: self.gas.gas_limit,
            to: params.wallet_contract,
            value: BigUint::from(0u32),
            data,
            chain_id: self.gas.chain_id,
        };
        let (raw, id) = tx.sign(&backup_key)?;

        info!(
            wallet = %params.wallet_contract,
            amount = %operation.recipient.amount,
            "built account recovery transaction"
        );
        Ok(SignedAccountTransaction {
            id: format!("0x{}", hex::encode(id)),
            tx: hex::encode(raw),
        })
    }

    /// Half-sign a transfer of the wallet's whole balance of `token_contract`.
    pub async fn recover_token(&self, params: &TokenRecoveryParams) -> Result<HalfSignedOperation> {
        let user_key = signing_key_from_xprv(&params.user_key)?;
        let balance = self
            .explorer
            .token_balance(&params.token_contract, &params.wallet_contract)
            .await
            .map_err(|e| {
                Error::indexer(format!("reading token balance of {}", params.wallet_contract), e)
            })?;
        if balance == BigUint::from(0u32) {
            return Err(Error::InsufficientFunds(format!(
                "wallet contract {} holds no {} tokens",
                params.wallet_contract, params.token_contract
            )));
        }
        let sequence_id = self.next_sequence_id(&params.wallet_contract).await?;

        let operation = Operation {
            kind: OperationKind::Token {
                contract: params.token_contract,
            },
            recipient: AccountRecipient::new(params.recipient, balance),
            expire_time: default_expire_time(),
            sequence_id,
        };
        let half_signed = sign_operation(&operation, &user_key)?;
        info!(
            wallet = %params.wallet_contract,
            token = %params.token_contract,
            amount = %operation.recipient.amount,
            "half-signed token recovery"
        );
        Ok(HalfSignedOperation {
            gas_limit: Some(self.gas.gas_limit),
            gas_price: Some(self.gas.gas_price),
            ..half_signed
        })
    }
}
