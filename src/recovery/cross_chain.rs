//! Recovery of coins sent to a wallet address on a sibling chain.
//!
//! Sibling chains share script and address formats, so a wallet address of
//! one chain can receive coins on another. The same key triple controls the
//! output there.
use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, info, warn};

use super::{RecoveryPlan, RecoveryTransaction, UtxoRecovery};
use crate::address::{from_output_script, to_output_script};
use crate::bitcoin::bip32::{Xpriv, Xpub};
use crate::bitcoin::secp256k1::Secp256k1;
use crate::bitcoin::{OutPoint, Txid};
use crate::error::{Error, Result};
use crate::fixed_script_wallet::RootWalletKeys;
use crate::indexer::{AddressDetails, UnspentOutput, WalletAddressLookup};
use crate::networks::Network;
use crate::transaction::decode_transaction;
use crate::verify::address::derive_claimed_script;

/// Chains whose coins can be recovered from each other, by mainnet tag.
const RECOVERY_PAIRS: &[(&str, &str)] = &[("btc", "ltc"), ("btc", "bch"), ("bch", "ltc")];

/// Fail unless coins of `source` sent to `recovery` can be recovered.
pub fn check_recovery_pair(source: Network, recovery: Network) -> Result<()> {
    let unsupported = || Error::UnsupportedRecoveryPair {
        source_coin: source.coin_name().to_string(),
        recovery_coin: recovery.coin_name().to_string(),
    };
    if source.is_mainnet() != recovery.is_mainnet() {
        return Err(unsupported());
    }
    let (a, b) = (source.mainnet().coin_name(), recovery.mainnet().coin_name());
    if RECOVERY_PAIRS
        .iter()
        .any(|&(x, y)| (x, y) == (a, b) || (y, x) == (a, b))
    {
        Ok(())
    } else {
        Err(unsupported())
    }
}

#[derive(Debug, Clone)]
pub struct WrongChainParams {
    /// Transaction on the holding chain paying the wallet
    pub txid: Txid,
    pub user_key: Xpriv,
    pub backup_pub: Xpub,
    /// Without the backup key the result is half-signed
    pub backup_key: Option<Xpriv>,
    pub bitgo_key: Xpub,
    pub recovery_address: String,
    /// Derivations of wallet addresses, keyed by their source-chain form
    pub address_details: HashMap<String, AddressDetails>,
}

impl WrongChainParams {
    fn wallet_keys(&self) -> Result<RootWalletKeys> {
        let secp = Secp256k1::signing_only();
        if let Some(backup_key) = &self.backup_key {
            if Xpub::from_priv(&secp, backup_key) != self.backup_pub {
                return Err(Error::policy("backup key does not match the backup xpub"));
            }
        }
        Ok(RootWalletKeys::new([
            Xpub::from_priv(&secp, &self.user_key),
            self.backup_pub,
            self.bitgo_key,
        ]))
    }
}

/// Recovers coins of a `source` chain wallet that landed on the chain served
/// by `holding`.
#[derive(Clone)]
pub struct CrossChainRecovery {
    source: Network,
    holding: UtxoRecovery,
    address_lookup: Option<Arc<dyn WalletAddressLookup>>,
}

impl CrossChainRecovery {
    pub fn new(source: Network, holding: UtxoRecovery) -> Result<Self> {
        check_recovery_pair(source, holding.network())?;
        Ok(Self {
            source,
            holding,
            address_lookup: None,
        })
    }

    pub fn with_address_lookup(mut self, lookup: Arc<dyn WalletAddressLookup>) -> Self {
        self.address_lookup = Some(lookup);
        self
    }

    async fn claimed_details(
        &self,
        params: &WrongChainParams,
        source_address: &str,
    ) -> Result<Option<AddressDetails>> {
        if let Some(details) = params.address_details.get(source_address) {
            return Ok(Some(details.clone()));
        }
        let Some(lookup) = &self.address_lookup else {
            return Ok(None);
        };
        lookup
            .wallet_address(source_address)
            .await
            .map_err(|e| Error::indexer(format!("looking up wallet address {}", source_address), e))
    }

    /// Wallet outputs of `params.txid` still unspent on the holding chain.
    async fn locate_unspents(
        &self,
        params: &WrongChainParams,
        wallet_keys: &RootWalletKeys,
    ) -> Result<Vec<UnspentOutput>> {
        let holding = self.holding.network();
        let indexer = self.holding.indexer();
        let bytes = indexer
            .transaction_by_id(&params.txid)
            .await
            .map_err(|e| Error::indexer(format!("fetching transaction {}", params.txid), e))?;
        let tx = decode_transaction(&bytes)?;
        if tx.compute_txid() != params.txid {
            return Err(Error::parse(format!(
                "fetched transaction does not match id {}",
                params.txid
            )));
        }

        let mut unspents = vec![];
        for (vout, output) in tx.output.iter().enumerate() {
            let Ok(source_address) = from_output_script(&output.script_pubkey, self.source) else {
                continue;
            };
            let Some(details) = self.claimed_details(params, &source_address).await? else {
                debug!(vout, address = %source_address, "output is not a known wallet address");
                continue;
            };
            let script = match derive_claimed_script(&details, wallet_keys, holding) {
                Ok(script) if script.output_script == output.script_pubkey => script,
                Ok(_) => {
                    warn!(vout, address = %source_address, "claimed derivation does not match output");
                    continue;
                }
                Err(e) => {
                    warn!(vout, address = %source_address, error = %e, "cannot spend output on {}", holding);
                    continue;
                }
            };

            let outpoint = OutPoint {
                txid: params.txid,
                vout: vout as u32,
            };
            let still_unspent = indexer
                .unspent_outputs(&script.address)
                .await
                .map_err(|e| Error::indexer(format!("fetching unspents of {}", script.address), e))?
                .iter()
                .any(|u| u.outpoint() == outpoint);
            if !still_unspent {
                warn!(%outpoint, "wallet output is already spent");
                continue;
            }

            unspents.push(UnspentOutput {
                txid: params.txid,
                vout: outpoint.vout,
                value: output.value.to_sat(),
                address: script.address.clone(),
                chain_path: Some((details.chain, details.index)),
                script: Some(script),
            });
        }
        Ok(unspents)
    }

    pub async fn recover(&self, params: &WrongChainParams) -> Result<RecoveryTransaction> {
        let holding = self.holding.network();
        let destination = to_output_script(&params.recovery_address, holding)
            .map_err(|e| Error::policy(format!("invalid recovery address: {}", e)))?;
        let wallet_keys = params.wallet_keys()?;

        let unspents = self.locate_unspents(params, &wallet_keys).await?;
        if unspents.is_empty() {
            return Err(Error::InsufficientFunds(format!(
                "transaction {} has no unspent wallet outputs on {}",
                params.txid, holding
            )));
        }

        let plan = RecoveryPlan::new(unspents, destination, self.holding.fee_rate().await)?;
        let tx = plan.sign(holding, &params.user_key, params.backup_key.as_ref())?;
        if params.backup_key.is_some() {
            plan.verify_signed(&tx, holding)?;
            self.holding.verify_with_decoder(&tx).await?;
        }

        info!(
            source = %self.source,
            holding = %holding,
            inputs = plan.unspents.len(),
            fee = plan.fee,
            "built cross-chain recovery transaction"
        );
        Ok(RecoveryTransaction::new(&plan, &tx))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(Network::Bitcoin, Network::Litecoin)]
    #[case(Network::Litecoin, Network::Bitcoin)]
    #[case(Network::Bitcoin, Network::BitcoinCash)]
    #[case(Network::BitcoinCash, Network::Litecoin)]
    #[case(Network::BitcoinTestnet, Network::BitcoinCashTestnet)]
    #[case(Network::LitecoinTestnet, Network::BitcoinCashTestnet)]
    fn test_supported_pairs(#[case] source: Network, #[case] recovery: Network) {
        assert!(check_recovery_pair(source, recovery).is_ok());
    }

    #[rstest]
    #[case(Network::Bitcoin, Network::BitcoinGold)]
    #[case(Network::Bitcoin, Network::Bitcoin)]
    #[case(Network::Bitcoin, Network::LitecoinTestnet)]
    #[case(Network::BitcoinGold, Network::Litecoin)]
    fn test_unsupported_pairs(#[case] source: Network, #[case] recovery: Network) {
        assert!(matches!(
            check_recovery_pair(source, recovery),
            Err(Error::UnsupportedRecoveryPair { .. })
        ));
    }
}
