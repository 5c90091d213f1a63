//! Fixtures shared by unit tests.

use crate::bitcoin::absolute::LockTime;
use crate::bitcoin::hashes::Hash;
use crate::bitcoin::transaction::Version;
use crate::bitcoin::{Amount, OutPoint, ScriptBuf, Sequence, Transaction, TxIn, TxOut, Txid, Witness};

pub use crate::fixed_script_wallet::tests::{
    get_test_wallet_keys, get_test_wallet_xprvs, get_xpriv_from_seed,
};

/// A transaction paying `value` to a script, usable as a funding transaction in tests.
pub fn funding_transaction(script_pubkey: ScriptBuf, value: u64, salt: u8) -> Transaction {
    Transaction {
        version: Version::ONE,
        lock_time: LockTime::ZERO,
        input: vec![TxIn {
            previous_output: OutPoint {
                txid: Txid::from_byte_array([salt; 32]),
                vout: 0,
            },
            script_sig: ScriptBuf::new(),
            sequence: Sequence::MAX,
            witness: Witness::new(),
        }],
        output: vec![TxOut {
            value: Amount::from_sat(value),
            script_pubkey,
        }],
    }
}

/// An unsigned transaction spending the given outpoints to the given outputs.
pub fn spend_transaction(inputs: &[OutPoint], outputs: Vec<TxOut>) -> Transaction {
    Transaction {
        version: Version::ONE,
        lock_time: LockTime::ZERO,
        input: inputs
            .iter()
            .map(|previous_output| TxIn {
                previous_output: *previous_output,
                script_sig: ScriptBuf::new(),
                sequence: Sequence::MAX,
                witness: Witness::new(),
            })
            .collect(),
        output: outputs,
    }
}
