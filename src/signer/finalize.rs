//! Assembly of scriptSig and witness from collected signatures.
use crate::bitcoin::blockdata::opcodes::all::OP_PUSHBYTES_0;
use crate::bitcoin::script::{Builder, PushBytesBuf};
use crate::bitcoin::{ScriptBuf, Witness};
use crate::error::{Error, Result};
use crate::fixed_script_wallet::OutputScriptType;

fn push_bytes(input_index: usize, bytes: &[u8]) -> Result<PushBytesBuf> {
    PushBytesBuf::try_from(bytes.to_vec()).map_err(|e| {
        Error::parse(format!(
            "Input {}: failed to convert to push bytes: {}",
            input_index, e
        ))
    })
}

/// Unlock data for one multisig input.
///
/// `stack` is the signature list without the leading `OP_0`; empty entries
/// become placeholders.
pub(crate) fn build_unlock(
    input_index: usize,
    script_type: OutputScriptType,
    redeem_script: &ScriptBuf,
    multisig_script: &ScriptBuf,
    stack: &[Vec<u8>],
) -> Result<(ScriptBuf, Witness)> {
    match script_type {
        OutputScriptType::P2sh => {
            // scriptSig = [OP_0, sigs..., redeemScript]
            let mut builder = Builder::new().push_opcode(OP_PUSHBYTES_0);
            for signature in stack {
                builder = if signature.is_empty() {
                    builder.push_opcode(OP_PUSHBYTES_0)
                } else {
                    builder.push_slice(push_bytes(input_index, signature)?)
                };
            }
            builder = builder.push_slice(push_bytes(input_index, multisig_script.as_bytes())?);
            Ok((builder.into_script(), Witness::new()))
        }
        OutputScriptType::P2shP2wsh => {
            // witness = [empty, sigs..., witnessScript], scriptSig = [redeemScript]
            let mut items: Vec<Vec<u8>> = vec![vec![]];
            items.extend(stack.iter().cloned());
            items.push(multisig_script.to_bytes());
            let script_sig = Builder::new()
                .push_slice(push_bytes(input_index, redeem_script.as_bytes())?)
                .into_script();
            Ok((script_sig, Witness::from_slice(&items)))
        }
    }
}
