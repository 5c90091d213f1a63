mod address;
mod eth;
mod network;
mod recover;
mod tx;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "multisig-engine-cli", about = "Multisig wallet tooling")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Address encoding and wallet address derivation
    #[command(subcommand)]
    Address(address::AddressCommand),
    /// Transaction inspection
    #[command(subcommand)]
    Tx(tx::TxCommand),
    /// Sweep a UTXO wallet with the user and backup keys
    Recover(recover::RecoverArgs),
    /// Recover wallet funds sent on a sibling chain
    RecoverWrongChain(recover::WrongChainArgs),
    /// Account-model (ETH) operations
    #[command(subcommand)]
    Eth(eth::EthCommand),
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Address(command) => address::handle_command(command),
        Commands::Tx(command) => tx::handle_command(command),
        Commands::Recover(args) => recover::handle_recover(args).await,
        Commands::RecoverWrongChain(args) => recover::handle_wrong_chain(args).await,
        Commands::Eth(command) => eth::handle_command(command).await,
    }
}
