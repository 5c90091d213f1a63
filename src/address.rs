//! Address encoding for the supported networks.
//!
//! Legacy addresses are base58check with a network version byte
//! distinguishing pay-to-pubkey-hash from pay-to-script-hash. Native segwit
//! addresses use bech32/bech32m with the network's human readable prefix.

use bech32::{hrp::Hrp, segwit, Fe32};

use crate::bitcoin::{base58, Script, ScriptBuf};
use crate::error::{Error, Result};
use crate::networks::Network;

const HASH_LEN: usize = 20;

/// Decode an address into the output script it commits to.
pub fn to_output_script(address: &str, network: Network) -> Result<ScriptBuf> {
    let params = network.address_params();

    if let Ok(payload) = base58::decode_check(address) {
        if payload.len() != HASH_LEN + 1 {
            return Err(Error::parse(format!(
                "invalid base58 payload length {} for address {}",
                payload.len(),
                address
            )));
        }
        let version = payload[0];
        let hash = &payload[1..];
        if version == params.pub_key_hash {
            return Ok(p2pkh_script(hash));
        }
        if version == params.script_hash || Some(version) == params.legacy_script_hash {
            return Ok(p2sh_script(hash));
        }
        return Err(Error::parse(format!(
            "address {} has version byte {:#04x} which is not valid for {}",
            address, version, network
        )));
    }

    let Some(expected_hrp) = params.bech32_hrp else {
        return Err(Error::parse(format!(
            "address {} is not a valid {} address",
            address, network
        )));
    };
    let (hrp, version, program) = segwit::decode(address)
        .map_err(|e| Error::parse(format!("invalid address {}: {}", address, e)))?;
    if hrp.as_str() != expected_hrp {
        return Err(Error::parse(format!(
            "address {} has prefix {} but {} expects {}",
            address,
            hrp.as_str(),
            network,
            expected_hrp
        )));
    }
    Ok(witness_program_script(version.to_u8(), &program))
}

/// Encode an output script as an address on the given network.
pub fn from_output_script(script: &Script, network: Network) -> Result<String> {
    let params = network.address_params();
    let bytes = script.as_bytes();

    if script.is_p2pkh() {
        return Ok(base58_address(params.pub_key_hash, &bytes[3..23]));
    }
    if script.is_p2sh() {
        return Ok(base58_address(params.script_hash, &bytes[2..22]));
    }
    if script.is_witness_program() {
        let hrp = params.bech32_hrp.ok_or_else(|| {
            Error::parse(format!("{} does not support segwit outputs", network))
        })?;
        let hrp = Hrp::parse(hrp).map_err(|e| Error::parse(e.to_string()))?;
        let version = match bytes[0] {
            0 => 0,
            op @ 0x51..=0x60 => op - 0x50,
            op => return Err(Error::parse(format!("invalid witness version opcode {}", op))),
        };
        let version = Fe32::try_from(version).map_err(|e| Error::parse(e.to_string()))?;
        return segwit::encode(hrp, version, &bytes[2..])
            .map_err(|e| Error::parse(format!("could not encode segwit address: {}", e)));
    }
    Err(Error::parse(format!(
        "output script {} has no address form",
        script.to_hex_string()
    )))
}

pub fn is_valid_address(address: &str, network: Network) -> bool {
    to_output_script(address, network).is_ok()
}

fn base58_address(version: u8, hash: &[u8]) -> String {
    let mut payload = Vec::with_capacity(HASH_LEN + 1);
    payload.push(version);
    payload.extend_from_slice(hash);
    base58::encode_check(&payload)
}

fn p2pkh_script(hash: &[u8]) -> ScriptBuf {
    // OP_DUP OP_HASH160 <20> OP_EQUALVERIFY OP_CHECKSIG
    let mut bytes = vec![0x76, 0xa9, 0x14];
    bytes.extend_from_slice(hash);
    bytes.extend_from_slice(&[0x88, 0xac]);
    ScriptBuf::from_bytes(bytes)
}

fn p2sh_script(hash: &[u8]) -> ScriptBuf {
    // OP_HASH160 <20> OP_EQUAL
    let mut bytes = vec![0xa9, 0x14];
    bytes.extend_from_slice(hash);
    bytes.push(0x87);
    ScriptBuf::from_bytes(bytes)
}

fn witness_program_script(version: u8, program: &[u8]) -> ScriptBuf {
    let version_op = if version == 0 { 0x00 } else { 0x50 + version };
    let mut bytes = vec![version_op, program.len() as u8];
    bytes.extend_from_slice(program);
    ScriptBuf::from_bytes(bytes)
}
