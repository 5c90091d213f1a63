//! Legacy (pre-typed-envelope) account transactions.
use k256::ecdsa::SigningKey;
use num_bigint::BigUint;
use rlp::RlpStream;

use super::{keccak256, EthAddress};
use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LegacyTransaction {
    pub nonce: u64,
    pub gas_price: u64,
    pub gas_limit: u64,
    pub to: EthAddress,
    pub value: BigUint,
    pub data: Vec<u8>,
    /// Replay protection; `None` signs without a chain id
    pub chain_id: Option<u64>,
}

fn strip_leading_zeros(bytes: &[u8]) -> Vec<u8> {
    let start = bytes.iter().position(|b| *b != 0).unwrap_or(bytes.len());
    bytes[start..].to_vec()
}

impl LegacyTransaction {
    fn append_fields(&self, stream: &mut RlpStream) {
        stream.append(&self.nonce);
        stream.append(&self.gas_price);
        stream.append(&self.gas_limit);
        stream.append(&self.to.as_bytes().to_vec());
        stream.append(&strip_leading_zeros(&self.value.to_bytes_be()));
        stream.append(&self.data);
    }

    /// Hash the sender signs: six fields, plus `chainId, 0, 0` when present.
    pub fn signing_hash(&self) -> [u8; 32] {
        let mut stream = RlpStream::new();
        match self.chain_id {
            Some(chain_id) => {
                stream.begin_list(9);
                self.append_fields(&mut stream);
                stream.append(&chain_id);
                stream.append(&0u8);
                stream.append(&0u8);
            }
            None => {
                stream.begin_list(6);
                self.append_fields(&mut stream);
            }
        }
        keccak256(&stream.out())
    }

    /// Raw signed transaction and its id.
    pub fn sign(&self, key: &SigningKey) -> Result<(Vec<u8>, [u8; 32])> {
        let (signature, recovery_id) = key
            .sign_prehash_recoverable(&self.signing_hash())
            .map_err(|e| Error::InvalidSignature(format!("signing failed: {}", e)))?;
        let v = match self.chain_id {
            Some(chain_id) => chain_id
                .checked_mul(2)
                .and_then(|n| n.checked_add(35 + recovery_id.to_byte() as u64))
                .ok_or_else(|| Error::policy(format!("chain id {} is too large", chain_id)))?,
            None => 27 + recovery_id.to_byte() as u64,
        };
        let rs = signature.to_bytes();

        let mut stream = RlpStream::new();
        stream.begin_list(9);
        self.append_fields(&mut stream);
        stream.append(&v);
        stream.append(&strip_leading_zeros(&rs[..32]));
        stream.append(&strip_leading_zeros(&rs[32..]));
        let raw = stream.out().to_vec();
        let id = keccak256(&raw);
        Ok((raw, id))
    }
}
