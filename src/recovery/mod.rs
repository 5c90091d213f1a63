//! Recovery of wallet funds without the coordinating service.
//!
//! The wallet's addresses are re-derived from the key triple and scanned on
//! an indexer. Every unspent found is swept to one destination output, signed
//! with the user and backup keys.
pub mod cross_chain;
mod scan;

pub use cross_chain::{check_recovery_pair, CrossChainRecovery, WrongChainParams};
pub use scan::{scan_chain, GapScan, DEFAULT_GAP_LIMIT};

use std::sync::Arc;

use futures::future::try_join_all;
use serde::Serialize;
use tracing::info;

use crate::address::to_output_script;
use crate::bitcoin::absolute::LockTime;
use crate::bitcoin::bip32::{Xpriv, Xpub};
use crate::bitcoin::secp256k1::Secp256k1;
use crate::bitcoin::transaction::Version;
use crate::bitcoin::{Amount, ScriptBuf, Sequence, Transaction, TxIn, TxOut, Witness};
use crate::error::{Error, Result};
use crate::fixed_script_wallet::{
    default_derivation_prefix, derivation_path, Chain, OutputScriptType, RootWalletKeys, Scope,
};
use crate::indexer::{resolve_fee_rate, FeeRateSource, Indexer, UnspentOutput};
use crate::networks::Network;
use crate::signer::{Finalization, InputContext, PartialTransaction};
use crate::transaction::dimensions::estimate_vsize;
use crate::transaction::{checked_total, encode_transaction_hex};
use crate::verify::{verify_signature, VerificationMode};

/// Default fee rate in base units per byte when no fee source answers.
pub const DEFAULT_FEE_RATE: u64 = 100;

/// Keys and destination for a recovery. Keys are root keys of the wallet.
#[derive(Debug, Clone)]
pub struct RecoveryParams {
    pub user_key: Xpriv,
    pub backup_key: Xpriv,
    pub bitgo_key: Xpub,
    pub recovery_destination: String,
    pub gap_limit: u32,
    /// Chains to scan
    pub chains: Vec<Chain>,
}

impl RecoveryParams {
    /// Parameters scanning the p2sh receive and change chains.
    pub fn new(
        user_key: Xpriv,
        backup_key: Xpriv,
        bitgo_key: Xpub,
        recovery_destination: impl Into<String>,
    ) -> Self {
        Self {
            user_key,
            backup_key,
            bitgo_key,
            recovery_destination: recovery_destination.into(),
            gap_limit: DEFAULT_GAP_LIMIT,
            chains: vec![
                Chain::new(OutputScriptType::P2sh, Scope::External),
                Chain::new(OutputScriptType::P2sh, Scope::Internal),
            ],
        }
    }

    pub fn wallet_keys(&self) -> RootWalletKeys {
        let secp = Secp256k1::signing_only();
        RootWalletKeys::new([
            Xpub::from_priv(&secp, &self.user_key),
            Xpub::from_priv(&secp, &self.backup_key),
            self.bitgo_key,
        ])
    }
}

/// Unspents to sweep and the single output they are swept to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecoveryPlan {
    pub unspents: Vec<UnspentOutput>,
    pub destination: TxOut,
    pub fee: u64,
}

impl RecoveryPlan {
    /// Plan a sweep of `unspents` to `destination_script`, paying `fee_rate`
    /// per estimated virtual byte.
    pub fn new(
        unspents: Vec<UnspentOutput>,
        destination_script: ScriptBuf,
        fee_rate: u64,
    ) -> Result<Self> {
        let script_types = unspents
            .iter()
            .map(|u| {
                u.script.as_ref().map(|s| s.script_type()).ok_or_else(|| {
                    Error::policy(format!("unspent {} has no wallet script", u.outpoint()))
                })
            })
            .collect::<Result<Vec<_>>>()?;
        let vsize = estimate_vsize(&script_types, &[destination_script.len()]) as u64;
        let fee = vsize * fee_rate;
        let total = checked_total(unspents.iter().map(|u| u.value))?;
        if total <= fee {
            return Err(Error::InsufficientFunds(format!(
                "recoverable amount {} does not cover the fee {}",
                total, fee
            )));
        }
        Ok(Self {
            unspents,
            destination: TxOut {
                value: Amount::from_sat(total - fee),
                script_pubkey: destination_script,
            },
            fee,
        })
    }

    pub fn total_input(&self) -> u64 {
        self.unspents.iter().map(|u| u.value).sum()
    }

    pub fn unsigned_transaction(&self, network: Network) -> Transaction {
        Transaction {
            version: if network.fork_id().is_some() {
                Version::TWO
            } else {
                Version::ONE
            },
            lock_time: LockTime::ZERO,
            input: self
                .unspents
                .iter()
                .map(|u| TxIn {
                    previous_output: u.outpoint(),
                    script_sig: ScriptBuf::new(),
                    sequence: Sequence::MAX,
                    witness: Witness::new(),
                })
                .collect(),
            output: vec![self.destination.clone()],
        }
    }

    pub fn input_contexts(&self) -> Result<Vec<InputContext>> {
        self.unspents
            .iter()
            .map(|u| {
                let (script, (chain, index)) = u.script.as_ref().zip(u.chain_path).ok_or_else(
                    || Error::policy(format!("unspent {} has no wallet derivation", u.outpoint())),
                )?;
                Ok(InputContext::new(
                    script,
                    u.value,
                    derivation_path(&default_derivation_prefix(), chain, index),
                ))
            })
            .collect()
    }

    /// Sign with `user_key`, then with `backup_key` when given.
    ///
    /// With both keys the result is fully signed, otherwise half-signed.
    pub fn sign(
        &self,
        network: Network,
        user_key: &Xpriv,
        backup_key: Option<&Xpriv>,
    ) -> Result<Transaction> {
        let contexts = self.input_contexts()?;
        let mut partial =
            PartialTransaction::new(&self.unsigned_transaction(network), &contexts, network)?
                .sign(user_key)?;
        if let Some(backup_key) = backup_key {
            partial = partial.sign(backup_key)?;
        }
        partial.finalize(Finalization::from_last_signature(backup_key.is_some()))
    }

    /// Re-verify every input signature of a fully signed sweep.
    pub fn verify_signed(&self, tx: &Transaction, network: Network) -> Result<()> {
        for (input_index, unspent) in self.unspents.iter().enumerate() {
            if !verify_signature(
                tx,
                input_index,
                Some(unspent.value),
                VerificationMode::All,
                network,
            )? {
                return Err(Error::RecoveryVerification(format!(
                    "signatures of input {} do not verify",
                    input_index
                )));
            }
        }
        Ok(())
    }
}

/// A signed input of a recovery transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecoveryInput {
    /// e.g. `/0/0/1/1`
    pub chain_path: String,
    pub redeem_script: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub witness_script: Option<String>,
    pub value: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecoveryTransaction {
    pub transaction_hex: String,
    pub txid: String,
    pub inputs: Vec<RecoveryInput>,
    pub recovery_amount: u64,
    pub fee: u64,
}

impl RecoveryTransaction {
    fn new(plan: &RecoveryPlan, tx: &Transaction) -> Self {
        Self {
            transaction_hex: encode_transaction_hex(tx),
            txid: tx.compute_txid().to_string(),
            inputs: plan
                .unspents
                .iter()
                .filter_map(|u| {
                    let script = u.script.as_ref()?;
                    let (chain, index) = u.chain_path?;
                    Some(RecoveryInput {
                        chain_path: format!("/0/0/{}/{}", chain, index),
                        redeem_script: script.redeem_script.to_hex_string(),
                        witness_script: script.witness_script.as_ref().map(|s| s.to_hex_string()),
                        value: u.value,
                    })
                })
                .collect(),
            recovery_amount: plan.destination.value.to_sat(),
            fee: plan.fee,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum RecoveryOutcome {
    /// The scan found no unspent outputs
    NothingToRecover,
    Recovered(RecoveryTransaction),
}

/// Sweeps a wallet on one UTXO network.
#[derive(Clone)]
pub struct UtxoRecovery {
    network: Network,
    indexer: Arc<dyn Indexer>,
    fee_source: Option<Arc<dyn FeeRateSource>>,
    default_fee_rate: u64,
}

impl UtxoRecovery {
    pub fn new(network: Network, indexer: Arc<dyn Indexer>) -> Self {
        Self {
            network,
            indexer,
            fee_source: None,
            default_fee_rate: DEFAULT_FEE_RATE,
        }
    }

    pub fn with_fee_source(mut self, fee_source: Arc<dyn FeeRateSource>) -> Self {
        self.fee_source = Some(fee_source);
        self
    }

    pub fn with_default_fee_rate(mut self, fee_rate: u64) -> Self {
        self.default_fee_rate = fee_rate;
        self
    }

    pub fn network(&self) -> Network {
        self.network
    }

    pub(crate) fn indexer(&self) -> &dyn Indexer {
        self.indexer.as_ref()
    }

    pub async fn fee_rate(&self) -> u64 {
        resolve_fee_rate(self.fee_source.as_deref(), self.default_fee_rate).await
    }

    /// Unspents on every chain, chains scanned concurrently.
    pub async fn scan(
        &self,
        wallet_keys: &RootWalletKeys,
        chains: &[Chain],
        gap_limit: u32,
    ) -> Result<Vec<UnspentOutput>> {
        let per_chain = try_join_all(chains.iter().map(|chain| {
            scan_chain(
                self.indexer.as_ref(),
                wallet_keys,
                *chain,
                self.network,
                gap_limit,
            )
        }))
        .await?;
        Ok(per_chain.into_iter().flatten().collect())
    }

    /// Confirm the transaction id with the indexer's decoder.
    pub async fn verify_with_decoder(&self, tx: &Transaction) -> Result<()> {
        let tx_hex = encode_transaction_hex(tx);
        let decoded = self
            .indexer
            .decode_transaction(&tx_hex)
            .await
            .map_err(|e| Error::indexer("decoding recovery transaction", e))?;
        let txid = tx.compute_txid().to_string();
        if decoded.txid != txid {
            return Err(Error::RecoveryVerification(format!(
                "inconsistent recovery transaction id: decoder reports {}, expected {}",
                decoded.txid, txid
            )));
        }
        Ok(())
    }

    /// Sweep everything the wallet holds to `params.recovery_destination`.
    pub async fn recover(&self, params: &RecoveryParams) -> Result<RecoveryOutcome> {
        let destination_script = to_output_script(&params.recovery_destination, self.network)
            .map_err(|e| Error::policy(format!("invalid recovery destination: {}", e)))?;

        let unspents = self
            .scan(&params.wallet_keys(), &params.chains, params.gap_limit)
            .await?;
        if unspents.is_empty() {
            info!(network = %self.network, "no unspents found, nothing to recover");
            return Ok(RecoveryOutcome::NothingToRecover);
        }

        let fee_rate = self.fee_rate().await;
        let plan = RecoveryPlan::new(unspents, destination_script, fee_rate)?;
        let tx = plan.sign(self.network, &params.user_key, Some(&params.backup_key))?;
        plan.verify_signed(&tx, self.network)?;
        self.verify_with_decoder(&tx).await?;

        info!(
            network = %self.network,
            inputs = plan.unspents.len(),
            total = plan.total_input(),
            fee = plan.fee,
            fee_rate,
            txid = %tx.compute_txid(),
            "built recovery transaction"
        );
        Ok(RecoveryOutcome::Recovered(RecoveryTransaction::new(&plan, &tx)))
    }
}
