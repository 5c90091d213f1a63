use std::str::FromStr;

use anyhow::{anyhow, Context, Result};
use clap::Subcommand;
use multisig_engine::bitcoin::bip32::Xpub;
use multisig_engine::bitcoin::Script;
use multisig_engine::fixed_script_wallet::{Chain, MultisigScript, RootWalletKeys};
use multisig_engine::{from_output_script, to_output_script, Network};

use crate::network::NetworkArg;

#[derive(Subcommand)]
pub enum AddressCommand {
    /// Decode an address to its output script (hex)
    Decode {
        /// The address to decode
        address: String,
        /// Network (btc, tbtc, ltc, bch, btg, etc.)
        #[arg(short, long, value_enum)]
        network: NetworkArg,
    },
    /// Encode an output script (hex) to an address
    Encode {
        /// Output script as hex
        script: String,
        /// Network (btc, tbtc, ltc, bch, btg, etc.)
        #[arg(short, long, value_enum)]
        network: NetworkArg,
    },
    /// Derive the wallet address at a chain and index
    Generate {
        /// User, backup and BitGo root xpubs, in that order
        #[arg(long, num_args = 3, required = true)]
        xpubs: Vec<String>,
        /// Wallet chain (0, 1, 10 or 11)
        #[arg(long, default_value_t = 0)]
        chain: u32,
        #[arg(long, default_value_t = 0)]
        index: u32,
        #[arg(short, long, value_enum)]
        network: NetworkArg,
    },
}

pub fn parse_xpub_triple(xpubs: &[String]) -> Result<[Xpub; 3]> {
    let parsed = xpubs
        .iter()
        .map(|s| Xpub::from_str(s).with_context(|| format!("Invalid xpub {}", s)))
        .collect::<Result<Vec<_>>>()?;
    parsed
        .try_into()
        .map_err(|v: Vec<Xpub>| anyhow!("Expected 3 xpubs, got {}", v.len()))
}

pub fn handle_command(command: AddressCommand) -> Result<()> {
    match command {
        AddressCommand::Decode { address, network } => {
            let network: Network = network.into();
            let script =
                to_output_script(&address, network).context("Failed to decode address")?;
            println!("{}", hex::encode(script.as_bytes()));
            Ok(())
        }
        AddressCommand::Encode { script, network } => {
            let network: Network = network.into();
            let script_bytes =
                hex::decode(&script).context("Invalid hex string for output script")?;
            let script_obj = Script::from_bytes(&script_bytes);
            let address = from_output_script(script_obj, network)
                .context("Failed to encode output script to address")?;
            println!("{}", address);
            Ok(())
        }
        AddressCommand::Generate {
            xpubs,
            chain,
            index,
            network,
        } => {
            let keys = RootWalletKeys::new(parse_xpub_triple(&xpubs)?);
            let chain = Chain::try_from(chain).map_err(|e| anyhow!(e))?;
            let script = MultisigScript::from_wallet_keys(
                &keys,
                chain.value(),
                index,
                chain.script_type,
                network.into(),
            )
            .context("Failed to derive wallet address")?;
            println!("address: {}", script.address);
            println!("redeemScript: {}", hex::encode(script.redeem_script.as_bytes()));
            if let Some(witness_script) = &script.witness_script {
                println!("witnessScript: {}", hex::encode(witness_script.as_bytes()));
            }
            Ok(())
        }
    }
}
