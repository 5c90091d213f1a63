//! Transaction codec for the supported UTXO networks.
//!
//! All supported networks share Bitcoin's wire format (version, inputs,
//! outputs, locktime, with the segwit marker/flag and witness stack when any
//! input carries witness data). What differs between them is the signature
//! hash, see [`sighash`].
pub mod dimensions;
pub mod sighash;

use serde::Serialize;

use crate::address::from_output_script;
use crate::bitcoin::consensus::{deserialize, serialize};
use crate::bitcoin::{Amount, Transaction, Txid};
use crate::error::{Error, Result};
use crate::networks::Network;

pub fn decode_transaction(bytes: &[u8]) -> Result<Transaction> {
    deserialize(bytes).map_err(|e| Error::parse(format!("could not decode transaction: {}", e)))
}

pub fn decode_transaction_hex(tx_hex: &str) -> Result<Transaction> {
    let bytes = hex::decode(tx_hex.trim())
        .map_err(|e| Error::parse(format!("transaction is not valid hex: {}", e)))?;
    decode_transaction(&bytes)
}

pub fn encode_transaction(tx: &Transaction) -> Vec<u8> {
    serialize(tx)
}

pub fn encode_transaction_hex(tx: &Transaction) -> String {
    hex::encode(encode_transaction(tx))
}

pub fn txid(tx: &Transaction) -> Txid {
    tx.compute_txid()
}

/// Sum of satoshi amounts, each bounded by the money supply.
pub fn checked_total(amounts: impl IntoIterator<Item = u64>) -> Result<u64> {
    amounts.into_iter().try_fold(0u64, |total, amount| {
        if amount > Amount::MAX_MONEY.to_sat() {
            return Err(Error::parse(format!(
                "amount {} exceeds the money supply",
                amount
            )));
        }
        total
            .checked_add(amount)
            .ok_or_else(|| Error::parse("amount total overflows"))
    })
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExplainedOutput {
    /// `None` for scripts without an address form (e.g. OP_RETURN)
    pub address: Option<String>,
    pub amount: u64,
}

/// Human-oriented breakdown of a transaction's outputs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExplainedTransaction {
    pub id: String,
    pub outputs: Vec<ExplainedOutput>,
    pub change_outputs: Vec<ExplainedOutput>,
    pub output_amount: u64,
    pub change_amount: u64,
}

impl ExplainedTransaction {
    /// Every output, change included, in transaction order.
    pub fn all_outputs(&self) -> impl Iterator<Item = &ExplainedOutput> {
        self.outputs.iter().chain(self.change_outputs.iter())
    }
}

/// Split the outputs of `tx` into payments and change.
///
/// `change_addresses` is the wallet's claim about which outputs are change;
/// it is not verified here.
pub fn explain_transaction(
    tx: &Transaction,
    network: Network,
    change_addresses: &[String],
) -> Result<ExplainedTransaction> {
    let mut outputs = vec![];
    let mut change_outputs = vec![];
    for output in &tx.output {
        let explained = ExplainedOutput {
            address: from_output_script(&output.script_pubkey, network).ok(),
            amount: output.value.to_sat(),
        };
        let is_change = explained
            .address
            .as_ref()
            .is_some_and(|a| change_addresses.contains(a));
        if is_change {
            change_outputs.push(explained);
        } else {
            outputs.push(explained);
        }
    }
    Ok(ExplainedTransaction {
        id: txid(tx).to_string(),
        output_amount: checked_total(outputs.iter().map(|o| o.amount))?,
        change_amount: checked_total(change_outputs.iter().map(|o| o.amount))?,
        outputs,
        change_outputs,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bitcoin::{Amount, OutPoint, ScriptBuf, TxOut};
    use crate::test_utils::spend_transaction;

    fn p2sh(byte: u8) -> ScriptBuf {
        let mut bytes = vec![0xa9, 0x14];
        bytes.extend_from_slice(&[byte; 20]);
        bytes.push(0x87);
        ScriptBuf::from_bytes(bytes)
    }

    #[test]
    fn test_roundtrip_hex() {
        let tx = spend_transaction(
            &[OutPoint::null()],
            vec![TxOut {
                value: Amount::from_sat(1000),
                script_pubkey: p2sh(1),
            }],
        );
        let tx_hex = encode_transaction_hex(&tx);
        let decoded = decode_transaction_hex(&tx_hex).unwrap();
        assert_eq!(decoded, tx);
        assert_eq!(txid(&decoded), tx.compute_txid());
    }

    #[test]
    fn test_decode_garbage() {
        assert!(matches!(decode_transaction_hex("zz"), Err(Error::Parse(_))));
        assert!(matches!(decode_transaction_hex("0100"), Err(Error::Parse(_))));
    }

    #[test]
    fn test_explain_transaction() {
        let tx = spend_transaction(
            &[OutPoint::null()],
            vec![
                TxOut {
                    value: Amount::from_sat(5000),
                    script_pubkey: p2sh(1),
                },
                TxOut {
                    value: Amount::from_sat(700),
                    script_pubkey: p2sh(2),
                },
                TxOut {
                    value: Amount::ZERO,
                    script_pubkey: ScriptBuf::from_hex("6a0401020304").unwrap(),
                },
            ],
        );
        let change = from_output_script(&p2sh(2), Network::Bitcoin).unwrap();
        let explained = explain_transaction(&tx, Network::Bitcoin, &[change.clone()]).unwrap();

        assert_eq!(explained.outputs.len(), 2);
        assert_eq!(explained.outputs[1].address, None);
        assert_eq!(explained.change_outputs.len(), 1);
        assert_eq!(explained.change_outputs[0].address, Some(change));
        assert_eq!(explained.output_amount, 5000);
        assert_eq!(explained.change_amount, 700);
        assert_eq!(explained.all_outputs().count(), 3);
        assert_eq!(explained.id, tx.compute_txid().to_string());
    }

    #[test]
    fn test_checked_total() {
        let max = Amount::MAX_MONEY.to_sat();
        assert_eq!(checked_total([5000, 700]).unwrap(), 5700);
        assert_eq!(checked_total(Vec::new()).unwrap(), 0);
        assert_eq!(checked_total([max]).unwrap(), max);
        assert!(matches!(checked_total([max + 1]), Err(Error::Parse(_))));
        assert!(matches!(checked_total([u64::MAX, 1]), Err(Error::Parse(_))));
    }

    #[test]
    fn test_explain_rejects_oversized_outputs() {
        let tx = spend_transaction(
            &[OutPoint::null()],
            vec![
                TxOut {
                    value: Amount::from_sat(u64::MAX / 2 + 1),
                    script_pubkey: p2sh(1),
                },
                TxOut {
                    value: Amount::from_sat(u64::MAX / 2 + 1),
                    script_pubkey: p2sh(2),
                },
            ],
        );
        assert!(matches!(
            explain_transaction(&tx, Network::Bitcoin, &[]),
            Err(Error::Parse(_))
        ));
    }
}
