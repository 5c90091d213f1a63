//! Signature hash computation.
//!
//! Three algorithms are in use across the supported networks:
//! - legacy (original Bitcoin algorithm) for non-segwit inputs,
//! - BIP-143 for segwit v0 inputs,
//! - BIP-143 with `SIGHASH_FORKID` and the network's fork id mixed into the
//!   hash type for Bitcoin Cash and Bitcoin Gold, for every input.

use crate::bitcoin::hashes::Hash;
use crate::bitcoin::psbt::Psbt;
use crate::bitcoin::sighash::{EcdsaSighashType, SighashCache};
use crate::bitcoin::{Amount, Script, ScriptBuf, Transaction, TxOut, Witness};
use crate::error::{Error, Result};
use crate::networks::Network;

pub const SIGHASH_ALL: u32 = 0x01;
pub const SIGHASH_FORKID: u32 = 0x40;
const SIGHASH_BASE_MASK: u32 = 0x1f;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SighashAlgorithm {
    Legacy,
    SegwitV0,
    ForkId { fork_id: u32 },
}

impl SighashAlgorithm {
    pub fn for_input(network: Network, is_segwit: bool) -> Self {
        match network.fork_id() {
            Some(fork_id) => SighashAlgorithm::ForkId { fork_id },
            None if is_segwit => SighashAlgorithm::SegwitV0,
            None => SighashAlgorithm::Legacy,
        }
    }

    /// Whether the digest commits to the value of the spent output.
    pub fn requires_value(&self) -> bool {
        !matches!(self, SighashAlgorithm::Legacy)
    }

    /// The hash type used when signing with SIGHASH_ALL.
    ///
    /// Only the low byte is appended to the DER signature; the fork id bits
    /// are committed to in the digest.
    pub fn default_hash_type(&self) -> u32 {
        match self {
            SighashAlgorithm::ForkId { fork_id } => (fork_id << 8) | SIGHASH_FORKID | SIGHASH_ALL,
            _ => SIGHASH_ALL,
        }
    }

    /// Reconstruct the full hash type from the byte appended to a signature.
    pub fn hash_type_from_signature_byte(&self, byte: u8) -> u32 {
        match self {
            SighashAlgorithm::ForkId { fork_id } => (fork_id << 8) | u32::from(byte),
            _ => u32::from(byte),
        }
    }
}

/// Compute the digest signed for input `input_index`.
///
/// `script_code` is the multisig script (redeem script for p2sh, witness
/// script for segwit). `value` is required for every algorithm but legacy.
pub fn signature_hash(
    tx: &Transaction,
    input_index: usize,
    script_code: &Script,
    value: Option<u64>,
    algorithm: SighashAlgorithm,
    hash_type: u32,
) -> Result<[u8; 32]> {
    if input_index >= tx.input.len() {
        return Err(Error::parse(format!(
            "input index {} out of range, transaction has {} inputs",
            input_index,
            tx.input.len()
        )));
    }
    let missing_value = || {
        Error::policy(format!(
            "value of input {} is required to compute its signature hash",
            input_index
        ))
    };

    match algorithm {
        SighashAlgorithm::Legacy => {
            let cache = SighashCache::new(tx);
            let sighash = cache
                .legacy_signature_hash(input_index, script_code, hash_type)
                .map_err(|e| Error::parse(format!("failed to compute legacy sighash: {}", e)))?;
            Ok(sighash.to_byte_array())
        }
        SighashAlgorithm::SegwitV0 => {
            let value = value.ok_or_else(missing_value)?;
            let sighash_type = EcdsaSighashType::from_standard(hash_type)
                .map_err(|e| Error::parse(format!("invalid sighash type: {}", e)))?;
            let mut cache = SighashCache::new(tx);
            let sighash = cache
                .p2wsh_signature_hash(
                    input_index,
                    script_code,
                    Amount::from_sat(value),
                    sighash_type,
                )
                .map_err(|e| Error::parse(format!("failed to compute segwit sighash: {}", e)))?;
            Ok(sighash.to_byte_array())
        }
        SighashAlgorithm::ForkId { .. } => {
            let value = value.ok_or_else(missing_value)?;
            forkid_signature_hash(tx, input_index, script_code, value, hash_type)
        }
    }
}

/// BIP-143 digest with a replay-protected hash type.
///
/// Computed by the forked `Psbt::sighash_forkid`. A psbt holds only unsigned
/// inputs, so unlock scripts are stripped first; the digest never covers them.
fn forkid_signature_hash(
    tx: &Transaction,
    input_index: usize,
    script_code: &Script,
    value: u64,
    hash_type: u32,
) -> Result<[u8; 32]> {
    if hash_type & SIGHASH_FORKID == 0 {
        return Err(Error::policy("hash type is missing SIGHASH_FORKID"));
    }
    if hash_type & SIGHASH_BASE_MASK != SIGHASH_ALL || hash_type & 0x80 != 0 {
        return Err(Error::policy("only SIGHASH_ALL is supported"));
    }
    let fork_id = hash_type >> 8;

    let mut unsigned_tx = tx.clone();
    for input in &mut unsigned_tx.input {
        input.script_sig = ScriptBuf::new();
        input.witness = Witness::new();
    }
    let mut psbt = Psbt::from_unsigned_tx(unsigned_tx)
        .map_err(|e| Error::parse(format!("failed to build psbt for sighash: {}", e)))?;
    let input = &mut psbt.inputs[input_index];
    input.witness_utxo = Some(TxOut {
        value: Amount::from_sat(value),
        script_pubkey: script_code.to_p2sh(),
    });
    input.redeem_script = Some(script_code.to_owned());

    let mut cache = SighashCache::new(&psbt.unsigned_tx);
    let (message, _) = psbt
        .sighash_forkid(input_index, &mut cache, fork_id)
        .map_err(|e| Error::parse(format!("failed to compute fork id sighash: {}", e)))?;
    Ok(*message.as_ref())
}
