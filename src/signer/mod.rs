//! Signing of multisig spends.
//!
//! A [`PartialTransaction`] is an immutable value: applying a signature or
//! signing with a key returns a new value, and [`PartialTransaction::finalize`]
//! chooses between the broadcastable and the half-signed serialization.
mod finalize;

use std::fmt;

use tracing::debug;

use crate::bitcoin::bip32::{DerivationPath, Xpriv};
use crate::bitcoin::secp256k1::{Message, Secp256k1};
use crate::bitcoin::{PublicKey, ScriptBuf, Transaction, Witness};
use crate::error::{Error, Result};
use crate::fixed_script_wallet::{parse_multisig_script, MultisigScript, OutputScriptType};
use crate::networks::Network;
use crate::transaction::sighash::{signature_hash, SighashAlgorithm};
use crate::verify::{check_signature, parse_signature_script};

/// What the signer needs to know about the output spent by an input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputContext {
    /// For wrapped segwit, the p2wsh program
    pub redeem_script: ScriptBuf,
    pub witness_script: Option<ScriptBuf>,
    pub value: u64,
    /// Path from the signing key to the input's key
    pub path: DerivationPath,
}

impl InputContext {
    pub fn new(script: &MultisigScript, value: u64, path: DerivationPath) -> Self {
        Self {
            redeem_script: script.redeem_script.clone(),
            witness_script: script.witness_script.clone(),
            value,
            path,
        }
    }
}

/// Why an input could not be signed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureIssue {
    pub input_index: usize,
    pub cause: String,
}

impl fmt::Display for SignatureIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "input {}: {}", self.input_index, self.cause)
    }
}

/// Signing failed for at least one input.
///
/// `partial` holds every signature that did succeed.
#[derive(Debug, Clone)]
pub struct SigningFailure {
    pub issues: Vec<SignatureIssue>,
    pub partial: Box<PartialTransaction>,
}

impl fmt::Display for SigningFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let indices: Vec<String> = self
            .issues
            .iter()
            .map(|i| i.input_index.to_string())
            .collect();
        write!(f, "Failed to sign inputs at indices {}", indices.join(", "))?;
        for issue in &self.issues {
            write!(f, "; {}", issue)?;
        }
        Ok(())
    }
}

impl std::error::Error for SigningFailure {}

/// Serialization chosen by [`PartialTransaction::finalize`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Finalization {
    /// Exactly `threshold` signatures, ready for broadcast
    Complete,
    /// One slot per key with `OP_0` placeholders, for a later co-signer
    Partial,
}

impl Finalization {
    pub fn from_last_signature(is_last_signature: bool) -> Self {
        if is_last_signature {
            Finalization::Complete
        } else {
            Finalization::Partial
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct PartialInput {
    script_type: OutputScriptType,
    redeem_script: ScriptBuf,
    multisig_script: ScriptBuf,
    public_keys: Vec<PublicKey>,
    threshold: usize,
    value: u64,
    path: DerivationPath,
    /// One slot per public key, in script order
    signatures: Vec<Option<Vec<u8>>>,
}

impl PartialInput {
    fn signature_count(&self) -> usize {
        self.signatures.iter().filter(|s| s.is_some()).count()
    }
}

/// A transaction being signed, with one signature slot per key and input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartialTransaction {
    unsigned: Transaction,
    inputs: Vec<PartialInput>,
    network: Network,
}

impl PartialTransaction {
    /// Start from `tx`, keeping signatures it already carries.
    ///
    /// Existing signatures must verify against one of the input's keys.
    pub fn new(tx: &Transaction, contexts: &[InputContext], network: Network) -> Result<Self> {
        if contexts.len() != tx.input.len() {
            return Err(Error::policy(format!(
                "expected {} input contexts, got {}",
                tx.input.len(),
                contexts.len()
            )));
        }
        let mut unsigned = tx.clone();
        for input in &mut unsigned.input {
            input.script_sig = ScriptBuf::new();
            input.witness = Witness::new();
        }

        let mut inputs = Vec::with_capacity(contexts.len());
        for (input_index, context) in contexts.iter().enumerate() {
            let (script_type, multisig_script) = match &context.witness_script {
                Some(witness_script) => {
                    if !network.supports_segwit() {
                        return Err(Error::policy(format!(
                            "Network {} does not support segwit",
                            network
                        )));
                    }
                    if witness_script.to_p2wsh() != context.redeem_script {
                        return Err(Error::policy(format!(
                            "Input {}: witness script does not match redeem script",
                            input_index
                        )));
                    }
                    (OutputScriptType::P2shP2wsh, witness_script.clone())
                }
                None => (OutputScriptType::P2sh, context.redeem_script.clone()),
            };
            let (threshold, public_keys) = parse_multisig_script(&multisig_script)?;
            inputs.push(PartialInput {
                script_type,
                redeem_script: context.redeem_script.clone(),
                multisig_script,
                signatures: vec![None; public_keys.len()],
                public_keys,
                threshold,
                value: context.value,
                path: context.path.clone(),
            });
        }

        let mut partial = Self {
            unsigned,
            inputs,
            network,
        };
        for (input_index, input) in tx.input.iter().enumerate() {
            let Some(parsed) = parse_signature_script(input)? else {
                continue;
            };
            for signature in parsed.non_empty_signatures() {
                let position = partial.signer_position(input_index, signature)?.ok_or_else(|| {
                    Error::InvalidSignature(format!(
                        "Input {}: existing signature does not verify against any key",
                        input_index
                    ))
                })?;
                partial = partial.apply_signature(input_index, position, signature.to_vec())?;
            }
        }
        Ok(partial)
    }

    pub fn network(&self) -> Network {
        self.network
    }

    pub fn unsigned_transaction(&self) -> &Transaction {
        &self.unsigned
    }

    /// Number of signatures collected for `input_index`.
    pub fn signature_count(&self, input_index: usize) -> usize {
        self.inputs
            .get(input_index)
            .map_or(0, PartialInput::signature_count)
    }

    fn algorithm(&self, input: &PartialInput) -> SighashAlgorithm {
        SighashAlgorithm::for_input(
            self.network,
            input.script_type == OutputScriptType::P2shP2wsh,
        )
    }

    /// Position of the key that made `signature`, if any.
    fn signer_position(&self, input_index: usize, signature: &[u8]) -> Result<Option<usize>> {
        let input = &self.inputs[input_index];
        for (position, public_key) in input.public_keys.iter().enumerate() {
            if check_signature(
                &self.unsigned,
                input_index,
                &input.multisig_script,
                Some(input.value),
                self.algorithm(input),
                signature,
                public_key,
            )? {
                return Ok(Some(position));
            }
        }
        Ok(None)
    }

    /// Place `signature` in the slot of the key at `key_position`.
    pub fn apply_signature(
        mut self,
        input_index: usize,
        key_position: usize,
        signature: Vec<u8>,
    ) -> Result<Self> {
        let input = self
            .inputs
            .get_mut(input_index)
            .ok_or_else(|| Error::policy(format!("no input at index {}", input_index)))?;
        let slot = input.signatures.get_mut(key_position).ok_or_else(|| {
            Error::policy(format!(
                "Input {}: no key at position {}",
                input_index, key_position
            ))
        })?;
        *slot = Some(signature);
        Ok(self)
    }

    fn sign_input(&self, input_index: usize, key: &Xpriv) -> std::result::Result<(usize, Vec<u8>), String> {
        let secp = Secp256k1::new();
        let input = &self.inputs[input_index];
        let derived = key
            .derive_priv(&secp, &input.path)
            .map_err(|e| format!("could not derive key at {}: {}", input.path, e))?;
        let public_key = PublicKey::new(derived.private_key.public_key(&secp));
        let position = input
            .public_keys
            .iter()
            .position(|k| *k == public_key)
            .ok_or_else(|| "signing key is not part of the multisig script".to_string())?;

        let algorithm = self.algorithm(input);
        let hash_type = algorithm.default_hash_type();
        let digest = signature_hash(
            &self.unsigned,
            input_index,
            &input.multisig_script,
            Some(input.value),
            algorithm,
            hash_type,
        )
        .map_err(|e| e.to_string())?;
        let signature = secp.sign_ecdsa(&Message::from_digest(digest), &derived.private_key);
        let mut bytes = signature.serialize_der().to_vec();
        bytes.push(hash_type as u8);

        let verified = check_signature(
            &self.unsigned,
            input_index,
            &input.multisig_script,
            Some(input.value),
            algorithm,
            &bytes,
            &public_key,
        )
        .map_err(|e| e.to_string())?;
        if !verified {
            return Err("signature failed self-verification".to_string());
        }
        Ok((position, bytes))
    }

    /// Sign every input with `key`, derived along each input's path.
    ///
    /// Inputs are signed independently. When any input fails, the returned
    /// [`SigningFailure`] lists every issue and carries the other signatures.
    pub fn sign(self, key: &Xpriv) -> std::result::Result<Self, SigningFailure> {
        let mut issues = vec![];
        let mut signed = self.clone();
        for input_index in 0..self.inputs.len() {
            let applied = self
                .sign_input(input_index, key)
                .and_then(|(position, signature)| {
                    signed
                        .clone()
                        .apply_signature(input_index, position, signature)
                        .map_err(|e| e.to_string())
                });
            match applied {
                Ok(next) => {
                    debug!(input_index, "signed input");
                    signed = next;
                }
                Err(cause) => {
                    debug!(input_index, %cause, "could not sign input");
                    issues.push(SignatureIssue { input_index, cause });
                }
            }
        }
        if issues.is_empty() {
            Ok(signed)
        } else {
            Err(SigningFailure {
                issues,
                partial: Box::new(signed),
            })
        }
    }

    /// Serialize the collected signatures into the transaction.
    pub fn finalize(&self, finalization: Finalization) -> Result<Transaction> {
        let mut tx = self.unsigned.clone();
        for (input_index, input) in self.inputs.iter().enumerate() {
            let stack: Vec<Vec<u8>> = match finalization {
                Finalization::Complete => {
                    if input.signature_count() < input.threshold {
                        return Err(Error::policy(format!(
                            "Input {}: has {} of {} required signatures",
                            input_index,
                            input.signature_count(),
                            input.threshold
                        )));
                    }
                    input
                        .signatures
                        .iter()
                        .flatten()
                        .take(input.threshold)
                        .cloned()
                        .collect()
                }
                Finalization::Partial => input
                    .signatures
                    .iter()
                    .map(|s| s.clone().unwrap_or_default())
                    .collect(),
            };
            let (script_sig, witness) = finalize::build_unlock(
                input_index,
                input.script_type,
                &input.redeem_script,
                &input.multisig_script,
                &stack,
            )?;
            tx.input[input_index].script_sig = script_sig;
            tx.input[input_index].witness = witness;
        }
        Ok(tx)
    }
}

/// Sign `tx` with `key` and serialize the result.
///
/// With `is_last_signature` the transaction is finalized for broadcast,
/// otherwise it keeps placeholder slots for the remaining signers.
pub fn sign_transaction(
    tx: &Transaction,
    key: &Xpriv,
    contexts: &[InputContext],
    network: Network,
    is_last_signature: bool,
) -> Result<Transaction> {
    let signed = PartialTransaction::new(tx, contexts, network)?.sign(key)?;
    signed.finalize(Finalization::from_last_signature(is_last_signature))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bitcoin::{Amount, OutPoint, TxOut};
    use crate::fixed_script_wallet::{default_derivation_prefix, derivation_path};
    use crate::test_utils::{get_test_wallet_keys, get_test_wallet_xprvs, spend_transaction};
    use crate::verify::{verify_signature, VerificationMode};
    use crate::bitcoin::hashes::Hash;
    use crate::bitcoin::Txid;

    const SEED: &str = "signer";

    fn context(chain: u32, index: u32, value: u64, network: Network) -> InputContext {
        let script_type = if chain >= 10 {
            OutputScriptType::P2shP2wsh
        } else {
            OutputScriptType::P2sh
        };
        let script = MultisigScript::from_wallet_keys(
            &get_test_wallet_keys(SEED),
            chain,
            index,
            script_type,
            network,
        )
        .unwrap();
        InputContext::new(
            &script,
            value,
            derivation_path(&default_derivation_prefix(), chain, index),
        )
    }

    fn unsigned(input_count: usize) -> Transaction {
        let outpoints: Vec<OutPoint> = (0..input_count as u32)
            .map(|vout| OutPoint {
                txid: Txid::from_byte_array([9; 32]),
                vout,
            })
            .collect();
        spend_transaction(
            &outpoints,
            vec![TxOut {
                value: Amount::from_sat(10_000),
                script_pubkey: ScriptBuf::from_hex("a914999a8eb861e3fabae1efe4fb16ff4752e1f5976687")
                    .unwrap(),
            }],
        )
    }

    fn user_and_backup(contexts: &[InputContext], network: Network) -> Transaction {
        let xprvs = get_test_wallet_xprvs(SEED);
        let tx = unsigned(contexts.len());
        let half = sign_transaction(&tx, &xprvs[0], contexts, network, false).unwrap();
        sign_transaction(&half, &xprvs[1], contexts, network, true).unwrap()
    }

    #[test]
    fn test_sign_p2sh_complete() {
        let contexts = [
            context(0, 0, 6000, Network::Bitcoin),
            context(1, 3, 5000, Network::Bitcoin),
        ];
        let tx = user_and_backup(&contexts, Network::Bitcoin);
        for (i, ctx) in contexts.iter().enumerate() {
            assert!(
                verify_signature(&tx, i, Some(ctx.value), VerificationMode::All, Network::Bitcoin)
                    .unwrap()
            );
            let parsed = parse_signature_script(&tx.input[i]).unwrap().unwrap();
            assert_eq!(parsed.signatures.len(), 2);
            assert!(!parsed.has_placeholders());
        }
    }

    #[test]
    fn test_sign_segwit_and_forkid() {
        for (chain, network) in [
            (10, Network::Bitcoin),
            (11, Network::Litecoin),
            (0, Network::BitcoinCash),
            (10, Network::BitcoinGold),
        ] {
            let contexts = [context(chain, 1, 7000, network)];
            let tx = user_and_backup(&contexts, network);
            assert!(
                verify_signature(&tx, 0, Some(7000), VerificationMode::All, network).unwrap(),
                "{} chain {}",
                network,
                chain
            );
            // the digest commits to the value
            assert!(!verify_signature(&tx, 0, Some(7001), VerificationMode::All, network).unwrap());
        }
    }

    #[test]
    fn test_half_signed_placeholders() {
        let xprvs = get_test_wallet_xprvs(SEED);
        let contexts = [context(0, 0, 6000, Network::Bitcoin)];
        let half =
            sign_transaction(&unsigned(1), &xprvs[1], &contexts, Network::Bitcoin, false).unwrap();
        let parsed = parse_signature_script(&half.input[0]).unwrap().unwrap();
        assert_eq!(parsed.signatures.len(), 3);
        assert!(parsed.signatures[0].is_empty());
        assert!(!parsed.signatures[1].is_empty());
        assert!(parsed.signatures[2].is_empty());

        let backup = PublicKey::from(
            get_test_wallet_keys(SEED)
                .derive_pub_triple(0, 0)
                .unwrap()[1],
        );
        assert!(verify_signature(
            &half,
            0,
            None,
            VerificationMode::PublicKey(backup),
            Network::Bitcoin
        )
        .unwrap());
        assert!(
            verify_signature(&half, 0, None, VerificationMode::SignatureIndex(0), Network::Bitcoin)
                .unwrap()
        );
        assert!(
            !verify_signature(&half, 0, None, VerificationMode::SignatureIndex(1), Network::Bitcoin)
                .unwrap()
        );

        // a single signature cannot be finalized
        let partial = PartialTransaction::new(&half, &contexts, Network::Bitcoin).unwrap();
        assert_eq!(partial.signature_count(0), 1);
        assert!(partial.finalize(Finalization::Complete).is_err());
    }

    #[test]
    fn test_partial_failure() {
        let xprvs = get_test_wallet_xprvs(SEED);
        let mut contexts = vec![
            context(0, 0, 6000, Network::Bitcoin),
            context(0, 1, 6000, Network::Bitcoin),
            context(0, 2, 6000, Network::Bitcoin),
        ];
        // the path no longer leads to a key of the script
        contexts[1].path = derivation_path(&default_derivation_prefix(), 0, 99);

        let partial = PartialTransaction::new(&unsigned(3), &contexts, Network::Bitcoin).unwrap();
        let failure = partial.sign(&xprvs[0]).unwrap_err();
        assert_eq!(failure.issues.len(), 1);
        assert_eq!(failure.issues[0].input_index, 1);
        assert_eq!(failure.partial.signature_count(0), 1);
        assert_eq!(failure.partial.signature_count(1), 0);
        assert_eq!(failure.partial.signature_count(2), 1);
        assert!(failure
            .to_string()
            .starts_with("Failed to sign inputs at indices 1"));

        let err = sign_transaction(&unsigned(3), &xprvs[0], &contexts, Network::Bitcoin, false)
            .unwrap_err();
        assert!(matches!(err, Error::Signing(_)));
    }

    #[test]
    fn test_apply_signature_is_pure() {
        let contexts = [context(0, 0, 6000, Network::Bitcoin)];
        let partial = PartialTransaction::new(&unsigned(1), &contexts, Network::Bitcoin).unwrap();
        let applied = partial.clone().apply_signature(0, 2, vec![0x30]).unwrap();
        assert_eq!(partial.signature_count(0), 0);
        assert_eq!(applied.signature_count(0), 1);
        assert!(partial.clone().apply_signature(0, 3, vec![0x30]).is_err());
        assert!(partial.apply_signature(1, 0, vec![0x30]).is_err());
    }

    #[test]
    fn test_context_count_mismatch() {
        let contexts = [context(0, 0, 6000, Network::Bitcoin)];
        assert!(PartialTransaction::new(&unsigned(2), &contexts, Network::Bitcoin).is_err());
    }

    #[test]
    fn test_segwit_rejected_on_bch() {
        let btc = context(10, 0, 6000, Network::Bitcoin);
        assert!(PartialTransaction::new(&unsigned(1), &[btc], Network::BitcoinCash).is_err());
    }
}
