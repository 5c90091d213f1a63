//! Verification of coordinator-built transactions before signing.
//!
//! The coordinator's proposal is untrusted. Outputs are matched against the
//! caller's intent, extra outputs must be provably owned by the wallet (or be
//! small enough to be the pay-as-you-go fee), and the input amounts are taken
//! from transactions whose ids we recompute.
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use futures::future::try_join_all;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::bitcoin::bip32::{Xpriv, Xpub};
use crate::bitcoin::secp256k1::Secp256k1;
use crate::bitcoin::{Transaction, Txid};
use crate::error::{Error, Result};
use crate::fixed_script_wallet::RootWalletKeys;
use crate::indexer::{AddressDetails, Indexer, WalletAddressLookup};
use crate::message::verify_key_signature;
use crate::networks::Network;
use crate::transaction::{
    checked_total, decode_transaction, decode_transaction_hex, explain_transaction, ExplainedOutput,
    ExplainedTransaction,
};
use crate::verify::address::verify_address;

/// Permitted unrequested external spend, in parts per thousand of the
/// intended external spend.
const PAY_AS_YOU_GO_LIMIT_PER_MILLE: u64 = 15;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recipient {
    pub address: String,
    pub amount: u64,
}

impl Recipient {
    pub fn new(address: impl Into<String>, amount: u64) -> Self {
        Self {
            address: address.into(),
            amount,
        }
    }

    fn matches(&self, output: &ExplainedOutput) -> bool {
        output.address.as_deref() == Some(self.address.as_str()) && output.amount == self.amount
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrebuildInfo {
    /// Claimed derivation of wallet addresses appearing in the outputs
    #[serde(default)]
    pub wallet_address_details: HashMap<String, AddressDetails>,
    /// Previous transactions by id, hex encoded
    #[serde(default)]
    pub tx_hexes: HashMap<String, String>,
    #[serde(default)]
    pub change_addresses: Vec<String>,
}

/// An unsigned transaction proposed by the coordinator.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionPrebuild {
    pub tx_hex: String,
    #[serde(default)]
    pub tx_info: PrebuildInfo,
}

#[derive(Debug, Clone)]
pub struct WalletKeychains {
    pub user: Xpub,
    /// Present when the user key is available for signing
    pub user_private: Option<Xpriv>,
    pub backup: Xpub,
    pub bitgo: Xpub,
}

impl WalletKeychains {
    pub fn root_wallet_keys(&self) -> RootWalletKeys {
        RootWalletKeys::new([self.user, self.backup, self.bitgo])
    }
}

/// Signatures by the user key over the backup and BitGo xpubs, hex encoded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeySignatures {
    pub backup_pub: String,
    pub bitgo_pub: String,
}

#[derive(Debug, Clone, Default)]
pub struct VerificationPolicy {
    /// Work with the data at hand only. Tolerates unsigned keychains.
    pub disable_networking: bool,
    /// Out-of-band address details, taking precedence over the prebuild's
    pub addresses: HashMap<String, AddressDetails>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedPrebuild {
    pub txid: Txid,
    pub transaction: Transaction,
    pub explanation: ExplainedTransaction,
    pub input_amount: u64,
    pub output_amount: u64,
    pub fee: u64,
}

#[derive(Debug, Clone)]
struct OutputDetails {
    output: ExplainedOutput,
    external: bool,
}

/// Verifies prebuilds for one network.
#[derive(Clone)]
pub struct PrebuildVerifier {
    network: Network,
    indexer: Option<Arc<dyn Indexer>>,
    address_lookup: Option<Arc<dyn WalletAddressLookup>>,
}

impl PrebuildVerifier {
    pub fn new(network: Network) -> Self {
        Self {
            network,
            indexer: None,
            address_lookup: None,
        }
    }

    pub fn with_indexer(mut self, indexer: Arc<dyn Indexer>) -> Self {
        self.indexer = Some(indexer);
        self
    }

    pub fn with_address_lookup(mut self, lookup: Arc<dyn WalletAddressLookup>) -> Self {
        self.address_lookup = Some(lookup);
        self
    }

    pub async fn verify(
        &self,
        recipients: &[Recipient],
        prebuild: &TransactionPrebuild,
        keychains: &WalletKeychains,
        key_signatures: Option<&KeySignatures>,
        policy: &VerificationPolicy,
    ) -> Result<VerifiedPrebuild> {
        verify_keychains(keychains, key_signatures, policy)?;

        let transaction = decode_transaction_hex(&prebuild.tx_hex)?;
        let explanation = explain_transaction(
            &transaction,
            self.network,
            &prebuild.tx_info.change_addresses,
        )?;
        let all_outputs: Vec<ExplainedOutput> = explanation.all_outputs().cloned().collect();

        if let Some(missing) = recipients
            .iter()
            .find(|r| !all_outputs.iter().any(|o| r.matches(o)))
        {
            return Err(Error::MissingRecipient {
                address: missing.address.clone(),
                amount: missing.amount,
            });
        }

        let wallet_keys = keychains.root_wallet_keys();
        let details = try_join_all(
            all_outputs
                .iter()
                .map(|output| self.classify_output(output, &wallet_keys, prebuild, policy)),
        )
        .await?;
        check_unrequested_spend(&details, recipients)?;

        let input_values = self
            .resolve_input_values(&transaction, prebuild, policy)
            .await?;
        let input_amount = checked_total(input_values)?;
        let output_amount = checked_total(transaction.output.iter().map(|o| o.value.to_sat()))?;
        if output_amount > input_amount {
            return Err(Error::NegativeFee {
                input_amount,
                output_amount,
            });
        }

        Ok(VerifiedPrebuild {
            txid: transaction.compute_txid(),
            transaction,
            explanation,
            input_amount,
            output_amount,
            fee: input_amount - output_amount,
        })
    }

    /// Decide whether `output` is wallet-owned.
    async fn classify_output(
        &self,
        output: &ExplainedOutput,
        wallet_keys: &RootWalletKeys,
        prebuild: &TransactionPrebuild,
        policy: &VerificationPolicy,
    ) -> Result<OutputDetails> {
        let external = |output: &ExplainedOutput| OutputDetails {
            output: output.clone(),
            external: true,
        };
        let Some(address) = output.address.as_deref() else {
            return Ok(external(output));
        };

        let mut claimed = policy
            .addresses
            .get(address)
            .or_else(|| prebuild.tx_info.wallet_address_details.get(address))
            .cloned();
        if claimed.is_none() && !policy.disable_networking {
            if let Some(lookup) = &self.address_lookup {
                claimed = lookup.wallet_address(address).await.map_err(|e| {
                    Error::indexer(format!("looking up wallet address {}", address), e)
                })?;
            }
        }
        let Some(claimed) = claimed else {
            return Ok(external(output));
        };

        match verify_address(address, &claimed, wallet_keys, self.network) {
            Ok(_) => Ok(OutputDetails {
                output: output.clone(),
                external: false,
            }),
            Err(e) => {
                debug!(address, error = %e, "output is not wallet-owned");
                Ok(external(output))
            }
        }
    }

    /// Value of the output spent by each input, in input order.
    async fn resolve_input_values(
        &self,
        transaction: &Transaction,
        prebuild: &TransactionPrebuild,
        policy: &VerificationPolicy,
    ) -> Result<Vec<u64>> {
        let mut cache: HashMap<Txid, Transaction> = HashMap::new();
        for (txid, tx_hex) in &prebuild.tx_info.tx_hexes {
            let tx = decode_transaction_hex(tx_hex)?;
            if tx.compute_txid().to_string() != *txid {
                return Err(Error::UnresolvedInput {
                    input_index: transaction
                        .input
                        .iter()
                        .position(|i| i.previous_output.txid.to_string() == *txid)
                        .unwrap_or_default(),
                    outpoint: txid.clone(),
                    reason: "input transaction hex does not match id".to_string(),
                });
            }
            cache.insert(tx.compute_txid(), tx);
        }

        let missing: Vec<Txid> = transaction
            .input
            .iter()
            .map(|i| i.previous_output.txid)
            .filter(|txid| !cache.contains_key(txid))
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();
        if !missing.is_empty() {
            let unresolved = |reason: &str| {
                let (input_index, input) = transaction
                    .input
                    .iter()
                    .enumerate()
                    .find(|(_, i)| missing.contains(&i.previous_output.txid))
                    .map(|(index, input)| (index, input.previous_output.to_string()))
                    .unwrap_or_default();
                Error::UnresolvedInput {
                    input_index,
                    outpoint: input,
                    reason: reason.to_string(),
                }
            };
            if policy.disable_networking {
                return Err(unresolved(
                    "attempting to retrieve transaction details externally with networking disabled",
                ));
            }
            let Some(indexer) = &self.indexer else {
                return Err(unresolved("no indexer configured"));
            };
            let fetched = try_join_all(missing.iter().map(|txid| async move {
                let bytes = indexer
                    .transaction_by_id(txid)
                    .await
                    .map_err(|e| Error::indexer(format!("fetching transaction {}", txid), e))?;
                Ok::<_, Error>((*txid, decode_transaction(&bytes)?))
            }))
            .await?;
            for (txid, tx) in fetched {
                if tx.compute_txid() != txid {
                    return Err(unresolved("fetched transaction does not match id"));
                }
                cache.insert(txid, tx);
            }
        }

        transaction
            .input
            .iter()
            .enumerate()
            .map(|(input_index, input)| {
                let outpoint = input.previous_output;
                cache
                    .get(&outpoint.txid)
                    .and_then(|tx| tx.output.get(outpoint.vout as usize))
                    .map(|output| output.value.to_sat())
                    .ok_or_else(|| Error::UnresolvedInput {
                        input_index,
                        outpoint: outpoint.to_string(),
                        reason: "previous transaction has no such output".to_string(),
                    })
            })
            .collect()
    }
}

/// Check the keychain signatures made by the user key.
pub fn verify_keychains(
    keychains: &WalletKeychains,
    key_signatures: Option<&KeySignatures>,
    policy: &VerificationPolicy,
) -> Result<()> {
    let Some(key_signatures) = key_signatures else {
        if policy.disable_networking {
            warn!("keychain signatures unavailable, using keys passed offline");
            return Ok(());
        }
        return Err(Error::KeySignature(
            "keychains are not signed by the user key".to_string(),
        ));
    };

    match &keychains.user_private {
        Some(xprv) => {
            if Xpub::from_priv(&Secp256k1::signing_only(), xprv) != keychains.user {
                return Err(Error::KeySignature(
                    "user private key does not match public key".to_string(),
                ));
            }
        }
        None if policy.disable_networking => {
            warn!("user private key unavailable for verification");
        }
        None => {
            return Err(Error::KeySignature(
                "user private key unavailable for verification".to_string(),
            ))
        }
    }

    let backup_valid =
        verify_key_signature(&keychains.user, &keychains.backup, &key_signatures.backup_pub)?;
    let bitgo_valid =
        verify_key_signature(&keychains.user, &keychains.bitgo, &key_signatures.bitgo_pub)?;
    if !backup_valid || !bitgo_valid {
        return Err(Error::KeySignature(
            "secondary public key signatures invalid".to_string(),
        ));
    }
    Ok(())
}

fn check_unrequested_spend(details: &[OutputDetails], recipients: &[Recipient]) -> Result<()> {
    let is_requested =
        |d: &OutputDetails| recipients.iter().any(|r| r.matches(&d.output));
    let intended = checked_total(
        details
            .iter()
            .filter(|d| d.external && is_requested(d))
            .map(|d| d.output.amount),
    )?;
    let unauthorized = checked_total(
        details
            .iter()
            .filter(|d| d.external && !is_requested(d))
            .map(|d| d.output.amount),
    )?;

    if u128::from(unauthorized) * 1000
        > u128::from(intended) * u128::from(PAY_AS_YOU_GO_LIMIT_PER_MILLE)
    {
        return Err(Error::UnauthorizedSpend {
            unauthorized,
            limit: intended * PAY_AS_YOU_GO_LIMIT_PER_MILLE / 1000,
            intended,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bitcoin::{Amount, OutPoint, ScriptBuf, TxOut};
    use crate::fixed_script_wallet::{MultisigScript, OutputScriptType};
    use crate::indexer::{AddressInfo, DecodedTransaction, IndexerError, UnspentOutput};
    use crate::message::sign_message;
    use crate::test_utils::{funding_transaction, get_test_wallet_xprvs, spend_transaction};
    use crate::transaction::encode_transaction_hex;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const SEED: &str = "prebuild";
    const NETWORK: Network = Network::Bitcoin;

    fn keychains() -> (WalletKeychains, KeySignatures) {
        let secp = Secp256k1::new();
        let xprvs = get_test_wallet_xprvs(SEED);
        let xpubs: Vec<Xpub> = xprvs.iter().map(|x| Xpub::from_priv(&secp, x)).collect();
        let sign = |xpub: &Xpub| hex::encode(sign_message(&xprvs[0].private_key, &xpub.to_string()));
        (
            WalletKeychains {
                user: xpubs[0],
                user_private: Some(xprvs[0]),
                backup: xpubs[1],
                bitgo: xpubs[2],
            },
            KeySignatures {
                backup_pub: sign(&xpubs[1]),
                bitgo_pub: sign(&xpubs[2]),
            },
        )
    }

    fn external_script(byte: u8) -> ScriptBuf {
        let mut bytes = vec![0x76, 0xa9, 0x14];
        bytes.extend_from_slice(&[byte; 20]);
        bytes.extend_from_slice(&[0x88, 0xac]);
        ScriptBuf::from_bytes(bytes)
    }

    fn address(script: &ScriptBuf) -> String {
        crate::address::from_output_script(script, NETWORK).unwrap()
    }

    struct Fixture {
        prebuild: TransactionPrebuild,
        recipient: Recipient,
        keychains: WalletKeychains,
        key_signatures: KeySignatures,
    }

    /// One 100_010_000 input paying 100_000_000 to an external recipient plus
    /// the given extra outputs.
    fn fixture(extra: Vec<TxOut>, change: Option<(u32, u32, u64)>) -> Fixture {
        let (keychains, key_signatures) = keychains();
        let funding = funding_transaction(ScriptBuf::new(), 100_010_000 + 1_000_000, 1);
        let recipient_script = external_script(7);
        let mut outputs = vec![TxOut {
            value: Amount::from_sat(100_000_000),
            script_pubkey: recipient_script.clone(),
        }];
        outputs.extend(extra);

        let mut tx_info = PrebuildInfo::default();
        if let Some((chain, index, value)) = change {
            let script = MultisigScript::from_wallet_keys(
                &keychains.root_wallet_keys(),
                chain,
                index,
                OutputScriptType::P2sh,
                NETWORK,
            )
            .unwrap();
            outputs.push(TxOut {
                value: Amount::from_sat(value),
                script_pubkey: script.output_script.clone(),
            });
            tx_info.change_addresses.push(script.address.clone());
            tx_info
                .wallet_address_details
                .insert(script.address, AddressDetails::new(chain, index, false));
        }
        let tx = spend_transaction(
            &[OutPoint {
                txid: funding.compute_txid(),
                vout: 0,
            }],
            outputs,
        );
        tx_info.tx_hexes.insert(
            funding.compute_txid().to_string(),
            encode_transaction_hex(&funding),
        );

        Fixture {
            prebuild: TransactionPrebuild {
                tx_hex: encode_transaction_hex(&tx),
                tx_info,
            },
            recipient: Recipient::new(address(&recipient_script), 100_000_000),
            keychains,
            key_signatures,
        }
    }

    impl Fixture {
        async fn verify(&self, verifier: &PrebuildVerifier) -> Result<VerifiedPrebuild> {
            verifier
                .verify(
                    &[self.recipient.clone()],
                    &self.prebuild,
                    &self.keychains,
                    Some(&self.key_signatures),
                    &VerificationPolicy::default(),
                )
                .await
        }
    }

    fn extra_output(amount: u64) -> Vec<TxOut> {
        vec![TxOut {
            value: Amount::from_sat(amount),
            script_pubkey: external_script(9),
        }]
    }

    #[tokio::test]
    async fn test_verify_with_change() {
        let fixture = fixture(vec![], Some((1, 4, 1_000_000)));
        let verified = fixture.verify(&PrebuildVerifier::new(NETWORK)).await.unwrap();
        assert_eq!(verified.input_amount, 101_010_000);
        assert_eq!(verified.output_amount, 101_000_000);
        assert_eq!(verified.fee, 10_000);
        assert_eq!(verified.explanation.change_outputs.len(), 1);
    }

    #[tokio::test]
    async fn test_altered_amount_is_missing_recipient() {
        let mut fixture = fixture(vec![], None);
        fixture.recipient.amount += 1;
        let err = fixture.verify(&PrebuildVerifier::new(NETWORK)).await.unwrap_err();
        assert!(matches!(err, Error::MissingRecipient { amount: 100_000_001, .. }));
    }

    #[tokio::test]
    async fn test_pay_as_you_go_ceiling() {
        // exactly 1.5% of the intended spend passes
        let fixture = fixture(extra_output(1_500_000), None);
        let verified = fixture.verify(&PrebuildVerifier::new(NETWORK)).await.unwrap();
        assert_eq!(verified.output_amount, 101_500_000);

        let fixture = self::fixture(extra_output(1_500_001), None);
        let err = fixture.verify(&PrebuildVerifier::new(NETWORK)).await.unwrap_err();
        assert!(matches!(
            err,
            Error::UnauthorizedSpend {
                unauthorized: 1_500_001,
                limit: 1_500_000,
                intended: 100_000_000
            }
        ));
    }

    #[tokio::test]
    async fn test_outputs_beyond_money_supply() {
        let huge = TxOut {
            value: Amount::from_sat(u64::MAX / 2 + 1),
            script_pubkey: external_script(9),
        };
        let fixture = fixture(vec![huge.clone(), huge], None);
        let err = fixture.verify(&PrebuildVerifier::new(NETWORK)).await.unwrap_err();
        assert!(matches!(err, Error::Parse(_)));
    }

    #[test]
    fn test_unrequested_spend_total_overflow() {
        let details = [u64::MAX, 1].map(|amount| OutputDetails {
            output: ExplainedOutput {
                address: Some(address(&external_script(9))),
                amount,
            },
            external: true,
        });
        assert!(matches!(
            check_unrequested_spend(&details, &[]),
            Err(Error::Parse(_))
        ));
    }

    #[tokio::test]
    async fn test_change_with_wrong_derivation_is_external() {
        let mut fixture = fixture(vec![], Some((1, 4, 2_000_000)));
        let change_address = fixture.prebuild.tx_info.change_addresses[0].clone();
        fixture
            .prebuild
            .tx_info
            .wallet_address_details
            .insert(change_address, AddressDetails::new(1, 5, false));
        let err = fixture.verify(&PrebuildVerifier::new(NETWORK)).await.unwrap_err();
        assert!(matches!(err, Error::UnauthorizedSpend { .. }));
    }

    #[tokio::test]
    async fn test_negative_fee() {
        let mut fixture = fixture(extra_output(1_000_000), None);
        // input only covers the recipient
        let funding = funding_transaction(ScriptBuf::new(), 100_500_000, 2);
        let mut tx = decode_transaction_hex(&fixture.prebuild.tx_hex).unwrap();
        tx.input[0].previous_output = OutPoint {
            txid: funding.compute_txid(),
            vout: 0,
        };
        fixture.prebuild.tx_hex = encode_transaction_hex(&tx);
        fixture.prebuild.tx_info.tx_hexes = HashMap::from([(
            funding.compute_txid().to_string(),
            encode_transaction_hex(&funding),
        )]);

        let err = fixture.verify(&PrebuildVerifier::new(NETWORK)).await.unwrap_err();
        assert!(matches!(
            err,
            Error::NegativeFee {
                input_amount: 100_500_000,
                output_amount: 101_000_000
            }
        ));
        assert!(err.to_string().contains("by 500000 satoshis"));
    }

    #[tokio::test]
    async fn test_tx_hex_must_match_id() {
        let mut fixture = fixture(vec![], None);
        let other = funding_transaction(ScriptBuf::new(), 5, 3);
        let (txid, _) = fixture.prebuild.tx_info.tx_hexes.iter().next().unwrap();
        let txid = txid.clone();
        fixture
            .prebuild
            .tx_info
            .tx_hexes
            .insert(txid, encode_transaction_hex(&other));
        let err = fixture.verify(&PrebuildVerifier::new(NETWORK)).await.unwrap_err();
        assert!(matches!(err, Error::UnresolvedInput { .. }));
    }

    struct RawTxIndexer {
        txs: HashMap<Txid, Transaction>,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Indexer for RawTxIndexer {
        async fn address_info(&self, _: &str) -> std::result::Result<AddressInfo, IndexerError> {
            Ok(AddressInfo::default())
        }

        async fn unspent_outputs(
            &self,
            _: &str,
        ) -> std::result::Result<Vec<UnspentOutput>, IndexerError> {
            Ok(vec![])
        }

        async fn transaction_by_id(&self, txid: &Txid) -> std::result::Result<Vec<u8>, IndexerError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.txs
                .get(txid)
                .map(crate::transaction::encode_transaction)
                .ok_or_else(|| IndexerError::NotFound(txid.to_string()))
        }

        async fn decode_transaction(
            &self,
            _: &str,
        ) -> std::result::Result<DecodedTransaction, IndexerError> {
            Err(IndexerError::Decode("unsupported".to_string()))
        }
    }

    #[tokio::test]
    async fn test_inputs_resolved_through_indexer() {
        let mut fixture = fixture(vec![], None);
        let funding = funding_transaction(ScriptBuf::new(), 101_010_000, 1);
        // two inputs spending the same previous transaction
        let mut tx = decode_transaction_hex(&fixture.prebuild.tx_hex).unwrap();
        tx.input.push(tx.input[0].clone());
        tx.input[1].previous_output.vout = 1;
        fixture.prebuild.tx_hex = encode_transaction_hex(&tx);
        fixture.prebuild.tx_info.tx_hexes.clear();

        let indexer = Arc::new(RawTxIndexer {
            txs: HashMap::from([(funding.compute_txid(), funding.clone())]),
            calls: AtomicUsize::new(0),
        });
        // funding_transaction has a single output
        let err = fixture
            .verify(&PrebuildVerifier::new(NETWORK).with_indexer(indexer.clone()))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::UnresolvedInput { input_index: 1, .. }));
        assert_eq!(indexer.calls.load(Ordering::SeqCst), 1);

        tx.input.pop();
        fixture.prebuild.tx_hex = encode_transaction_hex(&tx);
        let verified = fixture
            .verify(&PrebuildVerifier::new(NETWORK).with_indexer(indexer))
            .await
            .unwrap();
        assert_eq!(verified.fee, 1_010_000);

        // networking disabled
        let policy = VerificationPolicy {
            disable_networking: true,
            ..Default::default()
        };
        let err = PrebuildVerifier::new(NETWORK)
            .verify(
                &[fixture.recipient.clone()],
                &fixture.prebuild,
                &fixture.keychains,
                Some(&fixture.key_signatures),
                &policy,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, Error::UnresolvedInput { .. }));
    }

    #[test]
    fn test_keychain_signatures() {
        let (keychains, signatures) = keychains();
        let policy = VerificationPolicy::default();
        assert!(verify_keychains(&keychains, Some(&signatures), &policy).is_ok());

        // unsigned keys fail closed unless offline
        assert!(matches!(
            verify_keychains(&keychains, None, &policy),
            Err(Error::KeySignature(_))
        ));
        let offline = VerificationPolicy {
            disable_networking: true,
            ..Default::default()
        };
        assert!(verify_keychains(&keychains, None, &offline).is_ok());

        // signatures swapped
        let swapped = KeySignatures {
            backup_pub: signatures.bitgo_pub.clone(),
            bitgo_pub: signatures.backup_pub.clone(),
        };
        assert!(verify_keychains(&keychains, Some(&swapped), &policy).is_err());

        // user private key must match
        let other = WalletKeychains {
            user_private: Some(get_test_wallet_xprvs("other")[0]),
            ..keychains.clone()
        };
        assert!(verify_keychains(&other, Some(&signatures), &policy).is_err());

        let public_only = WalletKeychains {
            user_private: None,
            ..keychains
        };
        assert!(verify_keychains(&public_only, Some(&signatures), &policy).is_err());
        assert!(verify_keychains(&public_only, Some(&signatures), &offline).is_ok());
    }

    #[test]
    fn test_prebuild_json() {
        let prebuild: TransactionPrebuild = serde_json::from_str(
            r#"{"txHex": "0100", "txInfo": {"changeAddresses": ["2N1"], "txHexes": {}}}"#,
        )
        .unwrap();
        assert_eq!(prebuild.tx_info.change_addresses, vec!["2N1".to_string()]);
        assert!(prebuild.tx_info.wallet_address_details.is_empty());
    }
}
