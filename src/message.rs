//! Bitcoin message signing (BIP-137), used for keychain signatures.
//!
//! When a wallet is created the user key signs the backup and BitGo xpubs.
//! Verifying those signatures before deriving any address proves that the
//! keys handed to us by the coordinator are the ones the user approved.

use crate::bitcoin::bip32::Xpub;
use crate::bitcoin::consensus::serialize;
use crate::bitcoin::hashes::{sha256d, Hash};
use crate::bitcoin::secp256k1::ecdsa::{RecoverableSignature, RecoveryId};
use crate::bitcoin::secp256k1::{Message, PublicKey, Secp256k1, SecretKey};
use crate::bitcoin::VarInt;
use crate::error::{Error, Result};

const BITCOIN_SIGNED_MESSAGE_PREFIX: &[u8] = b"\x18Bitcoin Signed Message:\n";

/// Header byte offset for signatures made with a compressed key.
const COMPRESSED_HEADER: u8 = 31;
const UNCOMPRESSED_HEADER: u8 = 27;

fn message_hash(message: &str) -> Message {
    let mut data = BITCOIN_SIGNED_MESSAGE_PREFIX.to_vec();
    data.extend(serialize(&VarInt::from(message.len())));
    data.extend_from_slice(message.as_bytes());
    Message::from_digest(sha256d::Hash::hash(&data).to_byte_array())
}

/// Sign `message`, returning the 65-byte `header || r || s` signature.
pub fn sign_message(secret_key: &SecretKey, message: &str) -> Vec<u8> {
    let secp = Secp256k1::signing_only();
    let signature = secp.sign_ecdsa_recoverable(&message_hash(message), secret_key);
    let (recovery_id, compact) = signature.serialize_compact();

    let mut bytes = Vec::with_capacity(65);
    bytes.push(COMPRESSED_HEADER + recovery_id.to_i32() as u8);
    bytes.extend_from_slice(&compact);
    bytes
}

/// Recover the signer of a BIP-137 signature.
pub fn recover_message_signer(message: &str, signature: &[u8]) -> Result<PublicKey> {
    if signature.len() != 65 {
        return Err(Error::KeySignature(format!(
            "signature must be 65 bytes, got {}",
            signature.len()
        )));
    }
    let header = signature[0];
    let recovery_id = match header {
        COMPRESSED_HEADER..=34 => header - COMPRESSED_HEADER,
        UNCOMPRESSED_HEADER..=30 => header - UNCOMPRESSED_HEADER,
        _ => {
            return Err(Error::KeySignature(format!(
                "invalid signature header {}",
                header
            )))
        }
    };
    let recovery_id = RecoveryId::from_i32(i32::from(recovery_id))
        .map_err(|e| Error::KeySignature(format!("invalid recovery id: {}", e)))?;
    let signature = RecoverableSignature::from_compact(&signature[1..], recovery_id)
        .map_err(|e| Error::KeySignature(format!("invalid signature: {}", e)))?;

    Secp256k1::verification_only()
        .recover_ecdsa(&message_hash(message), &signature)
        .map_err(|e| Error::KeySignature(format!("failed to recover public key: {}", e)))
}

/// `true` when `signature` over `message` was made by `public_key`.
pub fn verify_message(public_key: &PublicKey, message: &str, signature: &[u8]) -> Result<bool> {
    Ok(&recover_message_signer(message, signature)? == public_key)
}

/// Verify that `signer` signed the base58 serialization of `signed`.
pub fn verify_key_signature(signer: &Xpub, signed: &Xpub, signature_hex: &str) -> Result<bool> {
    let signature = hex::decode(signature_hex)
        .map_err(|e| Error::KeySignature(format!("signature is not hex: {}", e)))?;
    verify_message(&signer.public_key, &signed.to_string(), &signature)
}
