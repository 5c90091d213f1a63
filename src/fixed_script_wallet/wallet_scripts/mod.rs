/// Code relating to script types of BitGo's multisig wallets.
mod checkmultisig;

pub use checkmultisig::{
    build_multisig_script, check_threshold, parse_multisig_script, MAX_SCRIPT_ELEMENT_SIZE,
};

use std::convert::TryFrom;
use std::str::FromStr;

use crate::address::from_output_script;
use crate::bitcoin::{PublicKey, ScriptBuf};
use crate::error::{Error, Result};
use crate::fixed_script_wallet::wallet_keys::RootWalletKeys;
use crate::networks::Network;

/// Signatures required to spend from a BitGo wallet.
pub const WALLET_THRESHOLD: usize = 2;

/// The scripts committing to a multisig policy, and the address they resolve to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MultisigScript {
    /// Script pushed in the scriptSig. For wrapped segwit this is the p2wsh program.
    pub redeem_script: ScriptBuf,
    /// The multisig script itself when it is spent through the witness.
    pub witness_script: Option<ScriptBuf>,
    pub output_script: ScriptBuf,
    pub address: String,
}

impl MultisigScript {
    pub fn new(
        public_keys: &[PublicKey],
        threshold: usize,
        script_type: OutputScriptType,
        network: Network,
    ) -> Result<Self> {
        let multisig = build_multisig_script(public_keys, threshold)?;
        let (redeem_script, witness_script) = match script_type {
            OutputScriptType::P2sh => (multisig, None),
            OutputScriptType::P2shP2wsh => {
                if !network.supports_segwit() {
                    return Err(Error::policy(format!(
                        "Network {} does not support segwit",
                        network
                    )));
                }
                (multisig.to_p2wsh(), Some(multisig))
            }
        };
        let output_script = redeem_script.to_p2sh();
        let address = from_output_script(&output_script, network)?;
        Ok(Self {
            redeem_script,
            witness_script,
            output_script,
            address,
        })
    }

    pub fn from_wallet_keys(
        wallet_keys: &RootWalletKeys,
        chain: u32,
        index: u32,
        script_type: OutputScriptType,
        network: Network,
    ) -> Result<Self> {
        let keys = wallet_keys
            .derive_pub_triple(chain, index)?
            .map(PublicKey::from);
        Self::new(&keys, WALLET_THRESHOLD, script_type, network)
    }

    /// The script containing the public keys and threshold.
    pub fn multisig_script(&self) -> &ScriptBuf {
        self.witness_script.as_ref().unwrap_or(&self.redeem_script)
    }

    pub fn script_type(&self) -> OutputScriptType {
        if self.witness_script.is_some() {
            OutputScriptType::P2shP2wsh
        } else {
            OutputScriptType::P2sh
        }
    }
}

/// Build the script and address for a threshold policy over `public_keys`.
pub fn build_multisig_address(
    public_keys: &[PublicKey],
    threshold: usize,
    use_segwit_layer: bool,
    network: Network,
) -> Result<MultisigScript> {
    MultisigScript::new(
        public_keys,
        threshold,
        OutputScriptType::from_segwit_flag(use_segwit_layer),
        network,
    )
}

/// Whether a chain is for receiving (external) or change (internal) addresses.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum Scope {
    /// External chains are for receiving addresses (even chain values: 0, 10).
    External,
    /// Internal chains are for change addresses (odd chain values: 1, 11).
    Internal,
}

/// BitGo-Defined mappings between derivation path component and script type.
///
/// The chain value is used in derivation paths: `m/0/0/{chain}/{index}`.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct Chain {
    pub script_type: OutputScriptType,
    pub scope: Scope,
}

impl Chain {
    pub const fn new(script_type: OutputScriptType, scope: Scope) -> Self {
        Self { script_type, scope }
    }

    /// Get the u32 chain value for derivation paths.
    pub const fn value(&self) -> u32 {
        (match self.script_type {
            OutputScriptType::P2sh => 0,
            OutputScriptType::P2shP2wsh => 10,
        }) + match self.scope {
            Scope::External => 0,
            Scope::Internal => 1,
        }
    }
}

impl TryFrom<u32> for Chain {
    type Error = String;

    fn try_from(value: u32) -> std::result::Result<Self, Self::Error> {
        let (script_type, scope) = match value {
            0 => (OutputScriptType::P2sh, Scope::External),
            1 => (OutputScriptType::P2sh, Scope::Internal),
            10 => (OutputScriptType::P2shP2wsh, Scope::External),
            11 => (OutputScriptType::P2shP2wsh, Scope::Internal),
            _ => return Err(format!("no chain for {}", value)),
        };
        Ok(Chain::new(script_type, scope))
    }
}

impl FromStr for Chain {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let chain: u32 = u32::from_str(s).map_err(|v| v.to_string())?;
        Chain::try_from(chain)
    }
}

/// Multisig output script types.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum OutputScriptType {
    /// Legacy Pay-To-Script-Hash (chains 0, 1)
    P2sh,
    /// Wrapped-Segwit Pay-To-Script-Hash (chains 10, 11)
    P2shP2wsh,
}

impl OutputScriptType {
    pub fn from_segwit_flag(use_segwit_layer: bool) -> Self {
        if use_segwit_layer {
            OutputScriptType::P2shP2wsh
        } else {
            OutputScriptType::P2sh
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OutputScriptType::P2sh => "p2sh",
            OutputScriptType::P2shP2wsh => "p2shP2wsh",
        }
    }
}

impl FromStr for OutputScriptType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "p2sh" => Ok(OutputScriptType::P2sh),
            "p2shP2wsh" => Ok(OutputScriptType::P2shP2wsh),
            _ => Err(format!(
                "Unknown script type '{}'. Expected: p2sh, p2shP2wsh",
                s
            )),
        }
    }
}

impl std::fmt::Display for OutputScriptType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
