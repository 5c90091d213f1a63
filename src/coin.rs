//! Supported chains behind one capability surface.
//!
//! Capabilities that need a collaborator (an indexer or an account explorer)
//! build it from the coin's [`CoinConfig`]. Offline capabilities work
//! without one.
use std::fmt;
use std::sync::Arc;

use crate::account::{
    self, build_operation_digest, sign_operation, verify_operation_signature, AccountRecipient,
    AccountRecovery, AccountRecoveryParams, EthAddress, EtherscanExplorer, HalfSignedOperation,
    Operation, SignedAccountTransaction, TokenRecoveryParams, ETH_BASE_FACTOR,
};
use crate::bitcoin::bip32::Xpriv;
use crate::bitcoin::{PublicKey, Transaction};
use crate::config::{CoinConfig, EngineConfig};
use crate::error::{Error, Result};
use crate::fixed_script_wallet::{build_multisig_address, MultisigScript};
use crate::indexer::{HttpFeeRateSource, HttpIndexer, WalletAddressLookup};
use crate::networks::Network;
use crate::recovery::{CrossChainRecovery, RecoveryOutcome, RecoveryParams, UtxoRecovery};
use crate::signer::{sign_transaction, InputContext};
use crate::verify::{
    KeySignatures, PrebuildVerifier, Recipient, TransactionPrebuild, VerificationPolicy,
    VerifiedPrebuild, WalletKeychains,
};

/// Satoshis per coin.
pub const UTXO_BASE_FACTOR: u128 = 100_000_000;

#[derive(Clone)]
pub struct UtxoCoin {
    network: Network,
    gap_limit: u32,
    config: Option<CoinConfig>,
    address_lookup: Option<Arc<dyn WalletAddressLookup>>,
}

#[derive(Clone)]
pub struct EthCoin {
    testnet: bool,
    config: Option<CoinConfig>,
}

#[derive(Clone)]
pub enum Coin {
    Utxo(UtxoCoin),
    Eth(EthCoin),
}

pub enum SignRequest<'a> {
    Utxo {
        tx: &'a Transaction,
        key: &'a Xpriv,
        contexts: &'a [InputContext],
        is_last_signature: bool,
    },
    Account {
        recipients: &'a [AccountRecipient],
        expire_time: Option<u64>,
        sequence_id: u64,
        key: &'a Xpriv,
    },
}

#[derive(Debug, Clone)]
pub enum SignedTransaction {
    Utxo(Transaction),
    HalfSigned(HalfSignedOperation),
}

pub enum VerifyRequest<'a> {
    Utxo {
        recipients: &'a [Recipient],
        prebuild: &'a TransactionPrebuild,
        keychains: &'a WalletKeychains,
        key_signatures: Option<&'a KeySignatures>,
        policy: &'a VerificationPolicy,
    },
    /// An operation signature made by `signer`
    Account {
        operation: &'a Operation,
        signature: &'a [u8],
        signer: &'a EthAddress,
    },
}

#[derive(Debug, Clone)]
pub enum Verified {
    Utxo(VerifiedPrebuild),
    Account,
}

pub enum RecoverRequest {
    Utxo(RecoveryParams),
    Account(AccountRecoveryParams),
    Token(TokenRecoveryParams),
}

#[derive(Debug, Clone)]
pub enum Recovered {
    Utxo(RecoveryOutcome),
    Account(SignedAccountTransaction),
    Token(HalfSignedOperation),
}

impl UtxoCoin {
    pub fn network(&self) -> Network {
        self.network
    }

    pub fn with_address_lookup(mut self, lookup: Arc<dyn WalletAddressLookup>) -> Self {
        self.address_lookup = Some(lookup);
        self
    }

    fn config(&self) -> Result<&CoinConfig> {
        self.config
            .as_ref()
            .ok_or_else(|| Error::Config(format!("no indexer configured for {}", self.network)))
    }

    fn indexer(&self) -> Result<HttpIndexer> {
        let config = self.config()?;
        HttpIndexer::new(config.indexer_base_url.clone(), config.api_key.clone())
            .map_err(|e| Error::indexer(format!("creating indexer client for {}", self.network), e))
    }

    /// Recovery orchestrator backed by the configured indexer and fee endpoint.
    pub fn utxo_recovery(&self) -> Result<UtxoRecovery> {
        let config = self.config()?;
        let mut recovery = UtxoRecovery::new(self.network, Arc::new(self.indexer()?))
            .with_default_fee_rate(config.network_params.default_fee_rate);
        if let Some(url) = &config.fee_rate_url {
            let source = HttpFeeRateSource::new(url.clone())
                .map_err(|e| Error::indexer("creating fee rate client", e))?;
            recovery = recovery.with_fee_source(Arc::new(source));
        }
        Ok(recovery)
    }

    /// Recovery of `source` chain coins held on this coin's chain.
    pub fn cross_chain_recovery(&self, source: Network) -> Result<CrossChainRecovery> {
        let recovery = CrossChainRecovery::new(source, self.utxo_recovery()?)?;
        Ok(match &self.address_lookup {
            Some(lookup) => recovery.with_address_lookup(lookup.clone()),
            None => recovery,
        })
    }

    /// Recovery parameters with the configured gap limit.
    pub fn recovery_params(
        &self,
        user_key: Xpriv,
        backup_key: Xpriv,
        bitgo_key: crate::bitcoin::bip32::Xpub,
        recovery_destination: impl Into<String>,
    ) -> RecoveryParams {
        RecoveryParams {
            gap_limit: self.gap_limit,
            ..RecoveryParams::new(user_key, backup_key, bitgo_key, recovery_destination)
        }
    }
}

impl EthCoin {
    fn recovery(&self) -> Result<AccountRecovery> {
        let config = self
            .config
            .as_ref()
            .ok_or_else(|| Error::Config("no account explorer configured".to_string()))?;
        let explorer = EtherscanExplorer::new(config.indexer_base_url.clone(), config.api_key.clone())
            .map_err(|e| Error::indexer("creating account explorer client", e))?;
        Ok(AccountRecovery::new(Arc::new(explorer)).with_gas(config.network_params.gas_params()))
    }
}

impl Coin {
    /// Coin for a chain tag such as `btc`, `tltc` or `eth`.
    pub fn from_tag(tag: &str, config: &EngineConfig) -> Result<Coin> {
        let coin_config = config.coin(tag).cloned();
        if let Some(network) = Network::from_coin_name(tag) {
            return Ok(Coin::Utxo(UtxoCoin {
                network,
                gap_limit: config.gap_limit,
                config: coin_config,
                address_lookup: None,
            }));
        }
        match tag {
            "eth" | "teth" => Ok(Coin::Eth(EthCoin {
                testnet: tag == "teth",
                config: coin_config,
            })),
            _ => Err(Error::Config(format!("unsupported coin {}", tag))),
        }
    }

    pub fn tag(&self) -> &'static str {
        match self {
            Coin::Utxo(coin) => coin.network.coin_name(),
            Coin::Eth(coin) if coin.testnet => "teth",
            Coin::Eth(_) => "eth",
        }
    }

    /// Base units per whole coin.
    pub fn base_factor(&self) -> u128 {
        match self {
            Coin::Utxo(_) => UTXO_BASE_FACTOR,
            Coin::Eth(_) => ETH_BASE_FACTOR,
        }
    }

    pub fn is_valid_address(&self, address: &str) -> bool {
        match self {
            Coin::Utxo(coin) => crate::address::is_valid_address(address, coin.network),
            Coin::Eth(_) => account::is_valid_address(address),
        }
    }

    /// Multisig script and address. Account wallets are contracts and have no
    /// script address.
    pub fn build_multisig_address(
        &self,
        public_keys: &[PublicKey],
        threshold: usize,
        use_segwit_layer: bool,
    ) -> Result<MultisigScript> {
        match self {
            Coin::Utxo(coin) => {
                build_multisig_address(public_keys, threshold, use_segwit_layer, coin.network)
            }
            Coin::Eth(_) => Err(Error::policy(
                "account-model wallets are contracts without a multisig script",
            )),
        }
    }

    pub fn sign_transaction(&self, request: SignRequest<'_>) -> Result<SignedTransaction> {
        match (self, request) {
            (
                Coin::Utxo(coin),
                SignRequest::Utxo {
                    tx,
                    key,
                    contexts,
                    is_last_signature,
                },
            ) => Ok(SignedTransaction::Utxo(sign_transaction(
                tx,
                key,
                contexts,
                coin.network,
                is_last_signature,
            )?)),
            (
                Coin::Eth(_),
                SignRequest::Account {
                    recipients,
                    expire_time,
                    sequence_id,
                    key,
                },
            ) => {
                let (_, operation) = build_operation_digest(recipients, expire_time, sequence_id)?;
                let key = account::signing_key_from_xprv(key)?;
                Ok(SignedTransaction::HalfSigned(sign_operation(&operation, &key)?))
            }
            _ => Err(self.model_mismatch()),
        }
    }

    pub async fn verify_transaction(&self, request: VerifyRequest<'_>) -> Result<Verified> {
        match (self, request) {
            (
                Coin::Utxo(coin),
                VerifyRequest::Utxo {
                    recipients,
                    prebuild,
                    keychains,
                    key_signatures,
                    policy,
                },
            ) => {
                let mut verifier = PrebuildVerifier::new(coin.network);
                if !policy.disable_networking {
                    verifier = verifier.with_indexer(Arc::new(coin.indexer()?));
                }
                if let Some(lookup) = &coin.address_lookup {
                    verifier = verifier.with_address_lookup(lookup.clone());
                }
                let verified = verifier
                    .verify(recipients, prebuild, keychains, key_signatures, policy)
                    .await?;
                Ok(Verified::Utxo(verified))
            }
            (
                Coin::Eth(_),
                VerifyRequest::Account {
                    operation,
                    signature,
                    signer,
                },
            ) => {
                verify_operation_signature(&operation.digest()?, signature, signer)?;
                Ok(Verified::Account)
            }
            _ => Err(self.model_mismatch()),
        }
    }

    pub async fn recover(&self, request: RecoverRequest) -> Result<Recovered> {
        match (self, request) {
            (Coin::Utxo(coin), RecoverRequest::Utxo(params)) => {
                Ok(Recovered::Utxo(coin.utxo_recovery()?.recover(&params).await?))
            }
            (Coin::Eth(coin), RecoverRequest::Account(params)) => {
                Ok(Recovered::Account(coin.recovery()?.recover(&params).await?))
            }
            (Coin::Eth(coin), RecoverRequest::Token(params)) => {
                Ok(Recovered::Token(coin.recovery()?.recover_token(&params).await?))
            }
            _ => Err(self.model_mismatch()),
        }
    }

    fn model_mismatch(&self) -> Error {
        let model = match self {
            Coin::Utxo(_) => "UTXO",
            Coin::Eth(_) => "account-model",
        };
        Error::policy(format!("{} is a {} coin", self.tag(), model))
    }
}

impl fmt::Debug for Coin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Coin({})", self.tag())
    }
}
