//! Multisignature transaction engine for BitGo-style 2-of-3 wallets.
//!
//! UTXO chains (BTC, BCH, BTG, LTC) are handled by [`fixed_script_wallet`],
//! [`transaction`], [`signer`], [`verify`] and [`recovery`]; account-model
//! chains (ETH) by [`account`]. [`coin::Coin`] ties them together behind one
//! capability surface selected by a chain tag.
pub mod account;
mod address;
pub mod coin;
pub mod config;
mod error;
pub mod fixed_script_wallet;
pub mod indexer;
pub mod message;
mod networks;
pub mod recovery;
pub mod signer;
pub mod transaction;
pub mod verify;

#[cfg(test)]
mod test_utils;

// re-export bitcoin from the miniscript crate
pub use ::miniscript::bitcoin;

pub use address::{from_output_script, is_valid_address, to_output_script};
pub use error::{Error, Result};
pub use networks::Network;
