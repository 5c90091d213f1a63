//! m-of-n OP_CHECKMULTISIG scripts.

use crate::bitcoin::blockdata::opcodes::all::{OP_CHECKMULTISIG, OP_PUSHNUM_1, OP_PUSHNUM_16};
use crate::bitcoin::blockdata::script::{Builder, Instruction};
use crate::bitcoin::{PublicKey, Script, ScriptBuf};
use crate::error::{Error, Result};

/// Largest script that can be pushed as a p2sh redeem script.
pub const MAX_SCRIPT_ELEMENT_SIZE: usize = 520;

const MAX_PUBKEYS: usize = 16;

pub fn check_threshold(threshold: usize, key_count: usize) -> Result<()> {
    if threshold == 0 {
        return Err(Error::policy("threshold has to be positive"));
    }
    if threshold > key_count {
        return Err(Error::policy("threshold cannot exceed number of keys"));
    }
    if key_count > MAX_PUBKEYS {
        return Err(Error::policy(format!(
            "at most {} keys are supported, got {}",
            MAX_PUBKEYS, key_count
        )));
    }
    Ok(())
}

/// `<threshold> <pubkey>... <n> OP_CHECKMULTISIG`, keys in the given order.
pub fn build_multisig_script(public_keys: &[PublicKey], threshold: usize) -> Result<ScriptBuf> {
    check_threshold(threshold, public_keys.len())?;
    let builder = public_keys
        .iter()
        .fold(Builder::new().push_int(threshold as i64), |b, key| {
            b.push_key(key)
        });
    let script = builder
        .push_int(public_keys.len() as i64)
        .push_opcode(OP_CHECKMULTISIG)
        .into_script();
    if script.len() > MAX_SCRIPT_ELEMENT_SIZE {
        return Err(Error::policy(format!(
            "multisig script of {} bytes exceeds the {} byte limit",
            script.len(),
            MAX_SCRIPT_ELEMENT_SIZE
        )));
    }
    Ok(script)
}

fn small_int(instruction: Option<Instruction>) -> Option<usize> {
    match instruction {
        Some(Instruction::Op(op))
            if (OP_PUSHNUM_1.to_u8()..=OP_PUSHNUM_16.to_u8()).contains(&op.to_u8()) =>
        {
            Some((op.to_u8() - OP_PUSHNUM_1.to_u8() + 1) as usize)
        }
        _ => None,
    }
}

/// Parse a multisig script into its threshold and ordered public keys.
pub fn parse_multisig_script(script: &Script) -> Result<(usize, Vec<PublicKey>)> {
    let instructions = script
        .instructions()
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| Error::parse(format!("invalid script: {}", e)))?;

    let not_multisig = || Error::parse("script is not a multisig script");

    if instructions.len() < 4 {
        return Err(not_multisig());
    }
    let last = instructions.len() - 1;
    match instructions[last] {
        Instruction::Op(op) if op == OP_CHECKMULTISIG => {}
        _ => return Err(not_multisig()),
    }
    let threshold = small_int(instructions.first().copied()).ok_or_else(not_multisig)?;
    let key_count = small_int(Some(instructions[last - 1])).ok_or_else(not_multisig)?;

    let keys = instructions[1..last - 1]
        .iter()
        .map(|instruction| match instruction {
            Instruction::PushBytes(bytes) => PublicKey::from_slice(bytes.as_bytes())
                .map_err(|e| Error::parse(format!("invalid public key in script: {}", e))),
            Instruction::Op(_) => Err(not_multisig()),
        })
        .collect::<Result<Vec<_>>>()?;

    if keys.len() != key_count || threshold > key_count {
        return Err(not_multisig());
    }
    Ok((threshold, keys))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixed_script_wallet::wallet_keys::tests::get_test_wallet_keys;

    fn keys() -> Vec<PublicKey> {
        get_test_wallet_keys("multisig")
            .derive_pub_triple(0, 0)
            .unwrap()
            .iter()
            .map(|k| PublicKey::from(*k))
            .collect()
    }

    #[test]
    fn test_build_and_parse_2_of_3() {
        let keys = keys();
        let script = build_multisig_script(&keys, 2).unwrap();
        // OP_2 <33>*3 OP_3 OP_CHECKMULTISIG
        assert_eq!(script.len(), 105);
        assert_eq!(script.as_bytes()[0], 0x52);
        assert_eq!(script.as_bytes()[104], 0xae);

        let (threshold, parsed) = parse_multisig_script(&script).unwrap();
        assert_eq!(threshold, 2);
        assert_eq!(parsed, keys);
    }

    #[test]
    fn test_threshold_bounds() {
        let keys = keys();
        assert!(matches!(
            build_multisig_script(&keys, 0),
            Err(Error::Policy(msg)) if msg.contains("positive")
        ));
        assert!(matches!(
            build_multisig_script(&keys, 4),
            Err(Error::Policy(msg)) if msg.contains("exceed")
        ));
        assert!(build_multisig_script(&keys, 3).is_ok());
        assert!(build_multisig_script(&keys, 1).is_ok());
    }

    #[test]
    fn test_parse_rejects_other_scripts() {
        let p2pkh = ScriptBuf::from_hex("76a914751e76e8199196d454941c45d1b3a323f1433bd688ac")
            .unwrap();
        assert!(parse_multisig_script(&p2pkh).is_err());
        assert!(parse_multisig_script(&ScriptBuf::new()).is_err());
    }
}
