//! Operation digests signed by wallet keys.
//!
//! The wallet contract hashes the tightly packed tuple
//! `(label, to, value, data, expireTime, sequenceId)`. The label keeps ether
//! and token operations from being replayed as one another.
use k256::ecdsa::{RecoveryId, Signature, SigningKey, VerifyingKey};
use num_bigint::BigUint;
use serde::Serialize;

use super::{keccak256, EthAddress};
use crate::error::{Error, Result};

/// Signatures expire a week after signing unless told otherwise.
pub const EXPIRE_TIME_DEFAULT_SECS: u64 = 60 * 60 * 24 * 7;

const ETHER_LABEL: &str = "ETHER";
const TOKEN_LABEL: &str = "ERC20";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountRecipient {
    pub address: EthAddress,
    /// In base units (wei or token units)
    pub amount: BigUint,
    pub data: Vec<u8>,
}

impl AccountRecipient {
    pub fn new(address: EthAddress, amount: BigUint) -> Self {
        Self {
            address,
            amount,
            data: vec![],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationKind {
    Ether,
    Token { contract: EthAddress },
}

impl OperationKind {
    pub fn label(&self) -> &'static str {
        match self {
            OperationKind::Ether => ETHER_LABEL,
            OperationKind::Token { .. } => TOKEN_LABEL,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Operation {
    pub kind: OperationKind,
    pub recipient: AccountRecipient,
    /// Seconds since the epoch
    pub expire_time: u64,
    pub sequence_id: u64,
}

pub(crate) fn uint256(value: &BigUint) -> Result<[u8; 32]> {
    let bytes = value.to_bytes_be();
    if bytes.len() > 32 {
        return Err(Error::policy(format!("{} does not fit in 256 bits", value)));
    }
    let mut word = [0u8; 32];
    word[32 - bytes.len()..].copy_from_slice(&bytes);
    Ok(word)
}

pub(crate) fn uint256_from_u64(value: u64) -> [u8; 32] {
    let mut word = [0u8; 32];
    word[24..].copy_from_slice(&value.to_be_bytes());
    word
}

impl Operation {
    /// Tightly packed encoding of the operation tuple.
    pub fn encode_packed(&self) -> Result<Vec<u8>> {
        let mut packed = Vec::with_capacity(5 + 20 + 32 * 3 + 20 + self.recipient.data.len());
        packed.extend_from_slice(self.kind.label().as_bytes());
        packed.extend_from_slice(self.recipient.address.as_bytes());
        packed.extend_from_slice(&uint256(&self.recipient.amount)?);
        match &self.kind {
            OperationKind::Ether => packed.extend_from_slice(&self.recipient.data),
            OperationKind::Token { contract } => packed.extend_from_slice(contract.as_bytes()),
        }
        packed.extend_from_slice(&uint256_from_u64(self.expire_time));
        packed.extend_from_slice(&uint256_from_u64(self.sequence_id));
        Ok(packed)
    }

    pub fn digest(&self) -> Result<[u8; 32]> {
        Ok(keccak256(&self.encode_packed()?))
    }
}

/// Now plus [`EXPIRE_TIME_DEFAULT_SECS`].
pub fn default_expire_time() -> u64 {
    chrono::Utc::now().timestamp().max(0) as u64 + EXPIRE_TIME_DEFAULT_SECS
}

/// Digest of an ether operation to exactly one recipient.
pub fn build_operation_digest(
    recipients: &[AccountRecipient],
    expire_time: Option<u64>,
    sequence_id: u64,
) -> Result<([u8; 32], Operation)> {
    let [recipient] = recipients else {
        return Err(Error::policy("must send to exactly 1 recipient"));
    };
    let operation = Operation {
        kind: OperationKind::Ether,
        recipient: recipient.clone(),
        expire_time: expire_time.unwrap_or_else(default_expire_time),
        sequence_id,
    };
    Ok((operation.digest()?, operation))
}

/// Sign a digest as is, returning `r || s || v` with `v = 27 + recovery id`.
pub fn sign_digest(digest: &[u8; 32], key: &SigningKey) -> Result<[u8; 65]> {
    let (signature, recovery_id) = key
        .sign_prehash_recoverable(digest)
        .map_err(|e| Error::InvalidSignature(format!("signing failed: {}", e)))?;
    let mut bytes = [0u8; 65];
    bytes[..64].copy_from_slice(&signature.to_bytes());
    bytes[64] = 27 + recovery_id.to_byte();
    Ok(bytes)
}

/// Address of the key that made an `r || s || v` signature.
pub fn recover_signer(digest: &[u8; 32], signature: &[u8]) -> Result<EthAddress> {
    if signature.len() != 65 {
        return Err(Error::InvalidSignature(format!(
            "signature must be 65 bytes, got {}",
            signature.len()
        )));
    }
    let v = signature[64];
    let recovery_id = v
        .checked_sub(27)
        .and_then(RecoveryId::from_byte)
        .ok_or_else(|| Error::InvalidSignature(format!("invalid recovery byte {}", v)))?;
    let signature = Signature::from_slice(&signature[..64])
        .map_err(|e| Error::InvalidSignature(e.to_string()))?;
    let key = VerifyingKey::recover_from_prehash(digest, &signature, recovery_id)
        .map_err(|e| Error::InvalidSignature(e.to_string()))?;
    Ok(EthAddress::from_verifying_key(&key))
}

/// Fail with `InvalidSignature` unless `expected` made the signature.
pub fn verify_operation_signature(
    digest: &[u8; 32],
    signature: &[u8],
    expected: &EthAddress,
) -> Result<()> {
    let signer = recover_signer(digest, signature)?;
    if &signer != expected {
        return Err(Error::InvalidSignature(format!(
            "signature recovers to {}, expected {}",
            signer, expected
        )));
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HalfSignedRecipient {
    pub address: EthAddress,
    pub amount: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
}

/// An operation signed by one wallet key, to be completed by a co-signer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HalfSignedOperation {
    pub recipient: HalfSignedRecipient,
    pub expire_time: u64,
    pub contract_sequence_id: u64,
    pub operation_hash: String,
    pub signature: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_contract_address: Option<EthAddress>,
    /// Gas the co-signer should spend sending the operation
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gas_limit: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gas_price: Option<u64>,
}

/// Sign `operation` with `key` and check the signature recovers to it.
pub fn sign_operation(operation: &Operation, key: &SigningKey) -> Result<HalfSignedOperation> {
    let digest = operation.digest()?;
    let signature = sign_digest(&digest, key)?;
    verify_operation_signature(&digest, &signature, &EthAddress::from_signing_key(key))?;

    let recipient = &operation.recipient;
    Ok(HalfSignedOperation {
        recipient: HalfSignedRecipient {
            address: recipient.address,
            amount: recipient.amount.to_string(),
            data: (!recipient.data.is_empty()).then(|| format!("0x{}", hex::encode(&recipient.data))),
        },
        expire_time: operation.expire_time,
        contract_sequence_id: operation.sequence_id,
        operation_hash: format!("0x{}", hex::encode(digest)),
        signature: format!("0x{}", hex::encode(signature)),
        token_contract_address: match operation.kind {
            OperationKind::Token { contract } => Some(contract),
            OperationKind::Ether => None,
        },
        gas_limit: None,
        gas_price: None,
    })
}
