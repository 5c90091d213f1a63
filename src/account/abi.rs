//! Contract call data for the wallet contract.
use num_bigint::BigUint;

use super::operation::{uint256, uint256_from_u64};
use super::{keccak256, EthAddress};
use crate::error::Result;

const SEND_MULTISIG: &str = "sendMultiSig(address,uint256,bytes,uint256,uint256,bytes)";
const GET_NEXT_SEQUENCE_ID: &str = "getNextSequenceId()";

/// First four bytes of the keccak hash of a canonical function signature.
pub fn function_selector(signature: &str) -> [u8; 4] {
    let hash = keccak256(signature.as_bytes());
    [hash[0], hash[1], hash[2], hash[3]]
}

pub fn encode_get_next_sequence_id() -> Vec<u8> {
    function_selector(GET_NEXT_SEQUENCE_ID).to_vec()
}

fn address_word(address: &EthAddress) -> [u8; 32] {
    let mut word = [0u8; 32];
    word[12..].copy_from_slice(address.as_bytes());
    word
}

fn padded_len(len: usize) -> usize {
    len.div_ceil(32) * 32
}

/// Length-prefixed `bytes` tail, zero padded to a word boundary.
fn encode_bytes(out: &mut Vec<u8>, bytes: &[u8]) {
    out.extend_from_slice(&uint256_from_u64(bytes.len() as u64));
    out.extend_from_slice(bytes);
    out.resize(out.len() + padded_len(bytes.len()) - bytes.len(), 0);
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendMultiSigCall {
    pub to: EthAddress,
    pub value: BigUint,
    pub data: Vec<u8>,
    pub expire_time: u64,
    pub sequence_id: u64,
    /// `r || s || v` of the other signing key
    pub signature: Vec<u8>,
}

pub fn encode_send_multisig(call: &SendMultiSigCall) -> Result<Vec<u8>> {
    const HEAD_WORDS: usize = 6;
    let data_offset = HEAD_WORDS * 32;
    let signature_offset = data_offset + 32 + padded_len(call.data.len());

    let mut out = Vec::with_capacity(
        4 + signature_offset + 32 + padded_len(call.signature.len()),
    );
    out.extend_from_slice(&function_selector(SEND_MULTISIG));
    out.extend_from_slice(&address_word(&call.to));
    out.extend_from_slice(&uint256(&call.value)?);
    out.extend_from_slice(&uint256_from_u64(data_offset as u64));
    out.extend_from_slice(&uint256_from_u64(call.expire_time));
    out.extend_from_slice(&uint256_from_u64(call.sequence_id));
    out.extend_from_slice(&uint256_from_u64(signature_offset as u64));
    encode_bytes(&mut out, &call.data);
    encode_bytes(&mut out, &call.signature);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn word(bytes: &[u8], n: usize) -> &[u8] {
        &bytes[4 + n * 32..4 + (n + 1) * 32]
    }

    #[test]
    fn test_selectors() {
        assert_eq!(hex::encode(function_selector(SEND_MULTISIG)), "39125215");
        assert_eq!(hex::encode(encode_get_next_sequence_id()), "a0b7967b");
    }

    #[test]
    fn test_send_multisig_layout() {
        let call = SendMultiSigCall {
            to: EthAddress([0x11; 20]),
            value: BigUint::from(1000u32),
            data: vec![0xab, 0xcd],
            expire_time: 1_500_000_000,
            sequence_id: 7,
            signature: vec![0x55; 65],
        };
        let encoded = encode_send_multisig(&call).unwrap();
        assert_eq!(&encoded[..4], &[0x39, 0x12, 0x52, 0x15]);
        // head, data (length + 1 word), signature (length + 3 words)
        assert_eq!(encoded.len(), 4 + 32 * (6 + 2 + 4));

        assert_eq!(&word(&encoded, 0)[12..], &[0x11; 20]);
        assert_eq!(word(&encoded, 1), &uint256_from_u64(1000));
        assert_eq!(word(&encoded, 2), &uint256_from_u64(192));
        assert_eq!(word(&encoded, 3), &uint256_from_u64(1_500_000_000));
        assert_eq!(word(&encoded, 4), &uint256_from_u64(7));
        assert_eq!(word(&encoded, 5), &uint256_from_u64(256));

        assert_eq!(word(&encoded, 6), &uint256_from_u64(2));
        assert_eq!(&word(&encoded, 7)[..2], &[0xab, 0xcd]);
        assert!(word(&encoded, 7)[2..].iter().all(|b| *b == 0));
        assert_eq!(word(&encoded, 8), &uint256_from_u64(65));
        assert_eq!(encoded[4 + 9 * 32 + 64], 0x55);
        assert!(encoded[4 + 9 * 32 + 65..].iter().all(|b| *b == 0));
    }

    #[test]
    fn test_empty_data() {
        let call = SendMultiSigCall {
            to: EthAddress([0x11; 20]),
            value: BigUint::from(0u32),
            data: vec![],
            expire_time: 1,
            sequence_id: 1,
            signature: vec![1; 65],
        };
        let encoded = encode_send_multisig(&call).unwrap();
        assert_eq!(word(&encoded, 5), &uint256_from_u64(224));
        assert_eq!(word(&encoded, 6), &uint256_from_u64(0));
        assert_eq!(encoded.len(), 4 + 32 * (6 + 1 + 4));
    }
}
