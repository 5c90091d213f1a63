use std::collections::HashMap;
use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{anyhow, bail, Context, Result};
use clap::Args;
use multisig_engine::bitcoin::bip32::{Xpriv, Xpub};
use multisig_engine::bitcoin::Txid;
use multisig_engine::coin::{Coin, RecoverRequest, Recovered};
use multisig_engine::config::EngineConfig;
use multisig_engine::fixed_script_wallet::{Chain, OutputScriptType, Scope};
use multisig_engine::indexer::AddressDetails;
use multisig_engine::recovery::WrongChainParams;
use multisig_engine::Network;

#[derive(Args)]
pub struct RecoverArgs {
    /// Engine configuration (TOML)
    #[arg(long)]
    config: PathBuf,
    /// Coin to recover (btc, tltc, ...)
    #[arg(long)]
    coin: String,
    /// User root xprv
    #[arg(long)]
    user_key: String,
    /// Backup root xprv
    #[arg(long)]
    backup_key: String,
    /// BitGo root xpub
    #[arg(long)]
    bitgo_key: String,
    /// Address receiving the recovered funds
    #[arg(long)]
    destination: String,
    /// Also scan the wrapped segwit chains (10 and 11)
    #[arg(long)]
    segwit: bool,
}

#[derive(Args)]
pub struct WrongChainArgs {
    #[arg(long)]
    config: PathBuf,
    /// Coin the wallet belongs to
    #[arg(long)]
    source_coin: String,
    /// Coin the funds were sent on
    #[arg(long)]
    recovery_coin: String,
    /// Transaction that paid the wallet on the recovery coin's chain
    #[arg(long)]
    txid: String,
    #[arg(long)]
    user_key: String,
    /// Backup root xpub
    #[arg(long)]
    backup_pub: String,
    /// Without the backup key the transaction is only half-signed
    #[arg(long)]
    backup_key: Option<String>,
    #[arg(long)]
    bitgo_key: String,
    #[arg(long)]
    destination: String,
    /// JSON map of wallet address to `{"chain": .., "index": ..}`
    #[arg(long)]
    address_details: PathBuf,
}

fn parse_xprv(s: &str) -> Result<Xpriv> {
    Xpriv::from_str(s).context("Invalid xprv")
}

fn parse_xpub(s: &str) -> Result<Xpub> {
    Xpub::from_str(s).context("Invalid xpub")
}

fn utxo_network(tag: &str) -> Result<Network> {
    Network::from_coin_name(tag).ok_or_else(|| anyhow!("{} is not a UTXO coin", tag))
}

pub async fn handle_recover(args: RecoverArgs) -> Result<()> {
    let config = EngineConfig::load(&args.config).context("Failed to load config")?;
    let coin = Coin::from_tag(&args.coin, &config)?;
    let Coin::Utxo(utxo) = &coin else {
        bail!("{} is not a UTXO coin, use `eth recover`", args.coin);
    };

    let mut params = utxo.recovery_params(
        parse_xprv(&args.user_key)?,
        parse_xprv(&args.backup_key)?,
        parse_xpub(&args.bitgo_key)?,
        args.destination,
    );
    if args.segwit {
        params.chains.extend([
            Chain::new(OutputScriptType::P2shP2wsh, Scope::External),
            Chain::new(OutputScriptType::P2shP2wsh, Scope::Internal),
        ]);
    }

    let Recovered::Utxo(outcome) = coin
        .recover(RecoverRequest::Utxo(params))
        .await
        .context("Recovery failed")?
    else {
        bail!("unexpected recovery result");
    };
    println!("{}", serde_json::to_string_pretty(&outcome)?);
    Ok(())
}

pub async fn handle_wrong_chain(args: WrongChainArgs) -> Result<()> {
    let config = EngineConfig::load(&args.config).context("Failed to load config")?;
    let source = utxo_network(&args.source_coin)?;
    let coin = Coin::from_tag(&args.recovery_coin, &config)?;
    let Coin::Utxo(holding) = &coin else {
        bail!("{} is not a UTXO coin", args.recovery_coin);
    };

    let details = std::fs::read_to_string(&args.address_details)
        .with_context(|| format!("Failed to read {}", args.address_details.display()))?;
    let address_details: HashMap<String, AddressDetails> =
        serde_json::from_str(&details).context("Invalid address details")?;

    let params = WrongChainParams {
        txid: Txid::from_str(&args.txid).context("Invalid txid")?,
        user_key: parse_xprv(&args.user_key)?,
        backup_pub: parse_xpub(&args.backup_pub)?,
        backup_key: args.backup_key.as_deref().map(parse_xprv).transpose()?,
        bitgo_key: parse_xpub(&args.bitgo_key)?,
        recovery_address: args.destination,
        address_details,
    };
    let recovered = holding
        .cross_chain_recovery(source)?
        .recover(&params)
        .await
        .context("Cross-chain recovery failed")?;
    println!("{}", serde_json::to_string_pretty(&recovered)?);
    Ok(())
}
