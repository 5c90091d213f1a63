//! Account-model (Ethereum) multisig operations.
//!
//! Account-model wallets are contracts that execute an operation once it
//! carries signatures of two wallet keys. One signature travels in the
//! contract call data, the other is the signature of the transaction sender.
mod abi;
mod operation;
mod recovery;
mod transaction;

pub use abi::{
    encode_get_next_sequence_id, encode_send_multisig, function_selector, SendMultiSigCall,
};
pub use operation::{
    build_operation_digest, default_expire_time, recover_signer, sign_digest, sign_operation,
    verify_operation_signature, AccountRecipient, HalfSignedOperation, HalfSignedRecipient,
    Operation, OperationKind, EXPIRE_TIME_DEFAULT_SECS,
};
pub use recovery::{
    AccountExplorer, AccountRecovery, AccountRecoveryParams, EtherscanExplorer, GasParams,
    SignedAccountTransaction, TokenRecoveryParams, DEFAULT_GAS_LIMIT, DEFAULT_GAS_PRICE,
};
pub use transaction::LegacyTransaction;

use std::fmt;
use std::str::FromStr;

use k256::ecdsa::{SigningKey, VerifyingKey};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha3::{Digest, Keccak256};

use crate::bitcoin::bip32::Xpriv;
use crate::error::{Error, Result};

/// Wei per ether.
pub const ETH_BASE_FACTOR: u128 = 1_000_000_000_000_000_000;

pub fn keccak256(data: &[u8]) -> [u8; 32] {
    Keccak256::digest(data).into()
}

/// A 20-byte account address.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EthAddress(pub [u8; 20]);

impl EthAddress {
    pub fn from_verifying_key(key: &VerifyingKey) -> Self {
        let point = key.to_encoded_point(false);
        let hash = keccak256(&point.as_bytes()[1..]);
        let mut address = [0u8; 20];
        address.copy_from_slice(&hash[12..]);
        EthAddress(address)
    }

    pub fn from_signing_key(key: &SigningKey) -> Self {
        Self::from_verifying_key(key.verifying_key())
    }

    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }
}

impl FromStr for EthAddress {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let stripped = s.strip_prefix("0x").unwrap_or(s);
        if stripped.len() != 40 {
            return Err(Error::parse(format!("invalid address: {}", s)));
        }
        let mut address = [0u8; 20];
        hex::decode_to_slice(stripped, &mut address)
            .map_err(|_| Error::parse(format!("invalid address: {}", s)))?;
        Ok(EthAddress(address))
    }
}

impl fmt::Display for EthAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for EthAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EthAddress({})", self)
    }
}

impl Serialize for EthAddress {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for EthAddress {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        EthAddress::from_str(&s).map_err(serde::de::Error::custom)
    }
}

/// `0x`-optional, 40 hex characters.
pub fn is_valid_address(address: &str) -> bool {
    EthAddress::from_str(address).is_ok()
}

/// Account signing key of an extended private key: its own secret, not a child.
pub fn signing_key_from_xprv(xprv: &Xpriv) -> Result<SigningKey> {
    SigningKey::from_slice(&xprv.private_key.secret_bytes())
        .map_err(|e| Error::Key(format!("invalid account signing key: {}", e)))
}
