use std::str::FromStr;

use anyhow::{Context, Result};
use clap::Subcommand;
use multisig_engine::bitcoin::PublicKey;
use multisig_engine::transaction::{decode_transaction_hex, explain_transaction};
use multisig_engine::verify::{verify_signature, VerificationMode};
use multisig_engine::Network;

use crate::network::NetworkArg;

#[derive(Subcommand)]
pub enum TxCommand {
    /// Check the multisig signatures of one input
    VerifySignature {
        /// Transaction hex
        tx: String,
        #[arg(long, default_value_t = 0)]
        input_index: usize,
        /// Value of the spent output, required for segwit and fork-id inputs
        #[arg(long)]
        value: Option<u64>,
        /// Only check the signature at this position
        #[arg(long, conflicts_with = "public_key")]
        signature_index: Option<usize>,
        /// Only check for a signature by this key (hex)
        #[arg(long)]
        public_key: Option<String>,
        #[arg(short, long, value_enum)]
        network: NetworkArg,
    },
    /// Print the outputs of a transaction as JSON
    Explain {
        /// Transaction hex
        tx: String,
        /// Addresses to report as change
        #[arg(long)]
        change: Vec<String>,
        #[arg(short, long, value_enum)]
        network: NetworkArg,
    },
}

pub fn handle_command(command: TxCommand) -> Result<()> {
    match command {
        TxCommand::VerifySignature {
            tx,
            input_index,
            value,
            signature_index,
            public_key,
            network,
        } => {
            let tx = decode_transaction_hex(&tx).context("Failed to decode transaction")?;
            let mode = match (signature_index, public_key) {
                (Some(index), _) => VerificationMode::SignatureIndex(index),
                (None, Some(key)) => VerificationMode::PublicKey(
                    PublicKey::from_str(&key).context("Invalid public key")?,
                ),
                (None, None) => VerificationMode::All,
            };
            let valid = verify_signature(&tx, input_index, value, mode, network.into())
                .context("Failed to verify signature")?;
            println!("{}", valid);
            Ok(())
        }
        TxCommand::Explain {
            tx,
            change,
            network,
        } => {
            let network: Network = network.into();
            let tx = decode_transaction_hex(&tx).context("Failed to decode transaction")?;
            let explanation = explain_transaction(&tx, network, &change)
                .context("Failed to explain transaction")?;
            println!("{}", serde_json::to_string_pretty(&explanation)?);
            Ok(())
        }
    }
}
