/// This module contains code for the BitGo Fixed Script Wallets.
/// These are not based on descriptors.
mod wallet_keys;
pub mod wallet_scripts;

pub use wallet_keys::*;
pub use wallet_scripts::*;
