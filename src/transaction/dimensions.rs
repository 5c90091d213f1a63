//! Dimensions for estimating transaction virtual size.
//!
//! Estimates assume fully signed inputs and use the largest DER signature
//! size, so fees computed from them never undershoot.

use crate::bitcoin::VarInt;
use crate::fixed_script_wallet::OutputScriptType;

// ECDSA signature sizes (DER encoding variance, sighash byte included)
const ECDSA_SIG_MAX: usize = 73;

const OP_SIZE: usize = 1;
const OP_0_SIZE: usize = OP_SIZE;
const OP_PUSH_SIZE: usize = OP_SIZE;

const P2MS_PUB_SCRIPT_SIZE: usize = 105; // 2-of-3 multisig script with compressed pubkeys
const P2WSH_PUB_SCRIPT_SIZE: usize = 34;

// version(4) + locktime(4) + varint for ins(1) + varint for outs(1)
const TX_OVERHEAD_SIZE: usize = 10;
// segwit marker and flag, counted as witness data
const TX_SEGWIT_MARKER_WEIGHT: usize = 2;

fn var_slice_size(length: usize) -> usize {
    VarInt::from(length).size() + length
}

/// Compute the size of a witness vector
fn vector_size(element_lengths: &[usize]) -> usize {
    VarInt::from(element_lengths.len()).size()
        + element_lengths
            .iter()
            .map(|&len| var_slice_size(len))
            .sum::<usize>()
}

/// Compute input weight from script and witness component lengths
fn compute_input_weight(script_components: &[usize], witness_components: &[usize]) -> usize {
    let script_length: usize = script_components.iter().sum();
    // prevout(32) + index(4) + sequence(4) + scriptSig
    let base_size = 40 + var_slice_size(script_length);
    let witness_size = if witness_components.is_empty() {
        0
    } else {
        vector_size(witness_components)
    };
    4 * base_size + witness_size
}

fn p2sh_components(sig_size: usize) -> Vec<usize> {
    vec![
        OP_0_SIZE,
        OP_PUSH_SIZE + sig_size,
        OP_PUSH_SIZE + sig_size,
        OP_PUSH_SIZE + 1 + P2MS_PUB_SCRIPT_SIZE, // OP_PUSHDATA1 + redeemScript
    ]
}

fn p2sh_p2wsh_components(sig_size: usize) -> (Vec<usize>, Vec<usize>) {
    (
        vec![OP_SIZE + P2WSH_PUB_SCRIPT_SIZE],
        vec![0, sig_size, sig_size, P2MS_PUB_SCRIPT_SIZE],
    )
}

/// Maximum weight of a fully signed 2-of-3 input.
pub fn input_weight(script_type: OutputScriptType) -> usize {
    match script_type {
        OutputScriptType::P2sh => compute_input_weight(&p2sh_components(ECDSA_SIG_MAX), &[]),
        OutputScriptType::P2shP2wsh => {
            let (script, witness) = p2sh_p2wsh_components(ECDSA_SIG_MAX);
            compute_input_weight(&script, &witness)
        }
    }
}

pub fn output_weight(script_length: usize) -> usize {
    // value(8) + script
    4 * (8 + var_slice_size(script_length))
}

/// Estimated virtual size of a transaction spending `inputs` to outputs with
/// the given script lengths.
pub fn estimate_vsize(inputs: &[OutputScriptType], output_script_lengths: &[usize]) -> usize {
    let is_segwit = inputs.contains(&OutputScriptType::P2shP2wsh);
    let mut weight = 4 * TX_OVERHEAD_SIZE;
    if is_segwit {
        weight += TX_SEGWIT_MARKER_WEIGHT;
    }
    weight += inputs
        .iter()
        .map(|script_type| {
            // non-witness inputs of a segwit transaction carry an empty witness
            let empty_witness = usize::from(is_segwit && *script_type == OutputScriptType::P2sh);
            input_weight(*script_type) + empty_witness
        })
        .sum::<usize>();
    weight += output_script_lengths
        .iter()
        .map(|len| output_weight(*len))
        .sum::<usize>();
    weight.div_ceil(4)
}
