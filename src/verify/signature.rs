//! Parsing of multisig unlock scripts and verification of their signatures.
//!
//! Signatures appear in two forms: half-signed, with one slot per key and
//! `OP_0` placeholders for the missing ones, and complete, with exactly the
//! threshold number of signatures in key order.
use crate::bitcoin::blockdata::opcodes::all::OP_PUSHBYTES_0;
use crate::bitcoin::script::Instruction;
use crate::bitcoin::secp256k1::ecdsa::Signature;
use crate::bitcoin::secp256k1::{Message, Secp256k1};
use crate::bitcoin::{PublicKey, Script, ScriptBuf, Transaction, TxIn};
use crate::error::{Error, Result};
use crate::fixed_script_wallet::parse_multisig_script;
use crate::networks::Network;
use crate::transaction::sighash::{signature_hash, SighashAlgorithm};

/// How a multisig input is unlocked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputScriptType {
    P2sh,
    P2shP2wsh,
    P2wsh,
}

impl InputScriptType {
    pub fn is_segwit(&self) -> bool {
        !matches!(self, InputScriptType::P2sh)
    }
}

/// A decoded multisig unlock script.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedSignatureScript {
    pub script_type: InputScriptType,
    /// Signature pushes in script order. Placeholders are empty.
    pub signatures: Vec<Vec<u8>>,
    /// The CHECKMULTISIG script
    pub multisig_script: ScriptBuf,
    pub public_keys: Vec<PublicKey>,
    pub threshold: usize,
}

impl ParsedSignatureScript {
    pub fn non_empty_signatures(&self) -> impl Iterator<Item = &[u8]> {
        self.signatures
            .iter()
            .filter(|s| !s.is_empty())
            .map(|s| s.as_slice())
    }

    /// Half-signed inputs carry one slot per key.
    pub fn has_placeholders(&self) -> bool {
        self.signatures.iter().any(|s| s.is_empty())
    }
}

/// Pushed items of a push-only script, `None` if any other opcode appears.
fn script_pushes(script: &Script) -> Result<Option<Vec<Vec<u8>>>> {
    let mut pushes = vec![];
    for instruction in script.instructions() {
        match instruction {
            Ok(Instruction::PushBytes(bytes)) => pushes.push(bytes.as_bytes().to_vec()),
            Ok(Instruction::Op(op)) if op == OP_PUSHBYTES_0 => pushes.push(vec![]),
            Ok(Instruction::Op(_)) => return Ok(None),
            Err(e) => return Err(Error::parse(format!("invalid signature script: {}", e))),
        }
    }
    Ok(Some(pushes))
}

/// Split `[OP_0, sig.., script]` into signatures and the multisig script.
fn split_stack(stack: &[Vec<u8>]) -> Option<(Vec<Vec<u8>>, ScriptBuf, usize, Vec<PublicKey>)> {
    let (last, rest) = stack.split_last()?;
    let (first, signatures) = rest.split_first()?;
    if !first.is_empty() || signatures.is_empty() {
        return None;
    }
    let multisig_script = ScriptBuf::from_bytes(last.clone());
    let (threshold, public_keys) = parse_multisig_script(&multisig_script).ok()?;
    Some((signatures.to_vec(), multisig_script, threshold, public_keys))
}

/// Decode the unlock script of `input`.
///
/// Returns `Ok(None)` when the input is not a multisig script-hash spend, and
/// an error when the scriptSig itself cannot be decoded.
pub fn parse_signature_script(input: &TxIn) -> Result<Option<ParsedSignatureScript>> {
    let Some(script_sig) = script_pushes(&input.script_sig)? else {
        return Ok(None);
    };

    let (script_type, stack) = if input.witness.is_empty() {
        (InputScriptType::P2sh, script_sig)
    } else {
        let script_type = match script_sig.as_slice() {
            [] => InputScriptType::P2wsh,
            [redeem] if ScriptBuf::from_bytes(redeem.clone()).is_p2wsh() => {
                InputScriptType::P2shP2wsh
            }
            _ => return Ok(None),
        };
        let stack: Vec<Vec<u8>> = input.witness.iter().map(|item| item.to_vec()).collect();
        if script_type == InputScriptType::P2shP2wsh {
            let witness_script = stack.last().map(|s| ScriptBuf::from_bytes(s.clone()));
            let redeem = ScriptBuf::from_bytes(script_sig[0].clone());
            if witness_script.map(|s| s.to_p2wsh()) != Some(redeem) {
                return Err(Error::parse(
                    "witness script does not match the p2wsh redeem script",
                ));
            }
        }
        (script_type, stack)
    };

    Ok(split_stack(&stack).map(
        |(signatures, multisig_script, threshold, public_keys)| ParsedSignatureScript {
            script_type,
            signatures,
            multisig_script,
            public_keys,
            threshold,
        },
    ))
}

/// Which signatures to check in [`verify_signature`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerificationMode {
    /// Every non-empty signature must be made by a distinct script key.
    All,
    /// Only the n-th non-empty signature, against any script key.
    SignatureIndex(usize),
    /// Any signature made by this key.
    PublicKey(PublicKey),
}

/// Check one `der || hash_type` signature against `public_key`.
///
/// Malformed signatures do not verify.
pub fn check_signature(
    tx: &Transaction,
    input_index: usize,
    script_code: &Script,
    value: Option<u64>,
    algorithm: SighashAlgorithm,
    signature: &[u8],
    public_key: &PublicKey,
) -> Result<bool> {
    let Some((hash_type_byte, der)) = signature.split_last() else {
        return Ok(false);
    };
    let Ok(mut ecdsa) = Signature::from_der(der) else {
        return Ok(false);
    };
    ecdsa.normalize_s();
    let hash_type = algorithm.hash_type_from_signature_byte(*hash_type_byte);
    let digest = match signature_hash(tx, input_index, script_code, value, algorithm, hash_type) {
        Ok(digest) => digest,
        Err(Error::Policy(_)) => return Ok(false),
        Err(e) => return Err(e),
    };
    let message = Message::from_digest(digest);
    Ok(Secp256k1::verification_only()
        .verify_ecdsa(&message, &ecdsa, &public_key.inner)
        .is_ok())
}

/// Verify the signatures of input `input_index`.
///
/// `value` is the amount of the spent output. Inputs whose digest commits to
/// the value fail verification when it is not provided.
pub fn verify_signature(
    tx: &Transaction,
    input_index: usize,
    value: Option<u64>,
    mode: VerificationMode,
    network: Network,
) -> Result<bool> {
    let input = tx.input.get(input_index).ok_or_else(|| {
        Error::parse(format!(
            "input index {} out of range, transaction has {} inputs",
            input_index,
            tx.input.len()
        ))
    })?;
    let Some(parsed) = parse_signature_script(input)? else {
        return Ok(false);
    };
    let algorithm = SighashAlgorithm::for_input(network, parsed.script_type.is_segwit());
    if algorithm.requires_value() && value.is_none() {
        return Ok(false);
    }

    let check = |signature: &[u8], public_key: &PublicKey| {
        check_signature(
            tx,
            input_index,
            &parsed.multisig_script,
            value,
            algorithm,
            signature,
            public_key,
        )
    };
    let signatures: Vec<&[u8]> = parsed.non_empty_signatures().collect();

    match mode {
        VerificationMode::All => {
            if signatures.is_empty() {
                return Ok(false);
            }
            // each signature must match a distinct key, in any order
            let mut used = vec![false; parsed.public_keys.len()];
            for signature in signatures {
                let mut matched = false;
                for (position, key) in parsed.public_keys.iter().enumerate() {
                    if !used[position] && check(signature, key)? {
                        used[position] = true;
                        matched = true;
                        break;
                    }
                }
                if !matched {
                    return Ok(false);
                }
            }
            Ok(true)
        }
        VerificationMode::SignatureIndex(index) => {
            let Some(&signature) = signatures.get(index) else {
                return Ok(false);
            };
            for key in &parsed.public_keys {
                if check(signature, key)? {
                    return Ok(true);
                }
            }
            Ok(false)
        }
        VerificationMode::PublicKey(public_key) => {
            if !parsed.public_keys.contains(&public_key) {
                return Ok(false);
            }
            for signature in signatures {
                if check(signature, &public_key)? {
                    return Ok(true);
                }
            }
            Ok(false)
        }
    }
}
