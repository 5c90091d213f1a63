use crate::error::{Error, Result};
use crate::fixed_script_wallet::{Chain, MultisigScript, OutputScriptType, RootWalletKeys};
use crate::indexer::AddressDetails;
use crate::networks::Network;

/// Re-derive the wallet script at the claimed chain and index.
///
/// The script type follows the chain. A claimed witness script must agree
/// with it.
pub fn derive_claimed_script(
    details: &AddressDetails,
    wallet_keys: &RootWalletKeys,
    network: Network,
) -> Result<MultisigScript> {
    let chain = Chain::try_from(details.chain).map_err(Error::policy)?;
    if details.is_segwit() != (chain.script_type == OutputScriptType::P2shP2wsh) {
        return Err(Error::policy(format!(
            "chain {} does not match the claimed script type",
            details.chain
        )));
    }
    MultisigScript::from_wallet_keys(
        wallet_keys,
        details.chain,
        details.index,
        chain.script_type,
        network,
    )
}

/// Check that `address` belongs to the wallet at the claimed derivation.
pub fn verify_address(
    address: &str,
    details: &AddressDetails,
    wallet_keys: &RootWalletKeys,
    network: Network,
) -> Result<MultisigScript> {
    let script = derive_claimed_script(details, wallet_keys, network)?;
    if script.address != address {
        return Err(Error::AddressMismatch {
            expected: address.to_string(),
            derived: script.address,
        });
    }
    Ok(script)
}
