use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::{anyhow, bail, Context, Result};
use clap::Subcommand;
use multisig_engine::account::{
    build_operation_digest, AccountRecipient, AccountRecoveryParams, EthAddress,
    TokenRecoveryParams,
};
use multisig_engine::bitcoin::bip32::Xpriv;
use multisig_engine::coin::{Coin, RecoverRequest, Recovered};
use multisig_engine::config::EngineConfig;
use num_bigint::BigUint;

#[derive(Subcommand)]
pub enum EthCommand {
    /// Print the operation hash of an ether transfer
    OperationHash {
        /// Recipient address
        #[arg(long)]
        to: String,
        /// Amount in wei
        #[arg(long)]
        amount: String,
        /// Call data (hex)
        #[arg(long, default_value = "")]
        data: String,
        /// Seconds since the epoch, defaults to a week from now
        #[arg(long)]
        expire_time: Option<u64>,
        #[arg(long)]
        sequence_id: u64,
    },
    /// Sweep a wallet contract with the user and backup keys
    Recover {
        #[arg(long)]
        config: PathBuf,
        /// eth or teth
        #[arg(long, default_value = "eth")]
        coin: String,
        #[arg(long)]
        user_key: String,
        #[arg(long)]
        backup_key: String,
        #[arg(long)]
        wallet_contract: String,
        #[arg(long)]
        destination: String,
    },
    /// Half-sign a transfer of a wallet's whole token balance
    RecoverToken {
        #[arg(long)]
        config: PathBuf,
        #[arg(long, default_value = "eth")]
        coin: String,
        #[arg(long)]
        user_key: String,
        #[arg(long)]
        wallet_contract: String,
        #[arg(long)]
        token_contract: String,
        #[arg(long)]
        recipient: String,
    },
}

fn parse_address(s: &str) -> Result<EthAddress> {
    EthAddress::from_str(s).with_context(|| format!("Invalid address {}", s))
}

fn parse_xprv(s: &str) -> Result<Xpriv> {
    Xpriv::from_str(s).context("Invalid xprv")
}

fn account_coin(config: &Path, tag: &str) -> Result<Coin> {
    let config = EngineConfig::load(config).context("Failed to load config")?;
    let coin = Coin::from_tag(tag, &config)?;
    if !matches!(coin, Coin::Eth(_)) {
        bail!("{} is not an account-model coin", tag);
    }
    Ok(coin)
}

pub async fn handle_command(command: EthCommand) -> Result<()> {
    match command {
        EthCommand::OperationHash {
            to,
            amount,
            data,
            expire_time,
            sequence_id,
        } => {
            let amount = BigUint::parse_bytes(amount.as_bytes(), 10)
                .ok_or_else(|| anyhow!("Invalid amount {}", amount))?;
            let recipient = AccountRecipient {
                address: parse_address(&to)?,
                amount,
                data: hex::decode(data.trim_start_matches("0x")).context("Invalid call data")?,
            };
            let (digest, operation) =
                build_operation_digest(&[recipient], expire_time, sequence_id)?;
            println!("operationHash: 0x{}", hex::encode(digest));
            println!("expireTime: {}", operation.expire_time);
            Ok(())
        }
        EthCommand::Recover {
            config,
            coin,
            user_key,
            backup_key,
            wallet_contract,
            destination,
        } => {
            let coin = account_coin(&config, &coin)?;
            let params = AccountRecoveryParams {
                user_key: parse_xprv(&user_key)?,
                backup_key: parse_xprv(&backup_key)?,
                wallet_contract: parse_address(&wallet_contract)?,
                recovery_destination: parse_address(&destination)?,
            };
            let Recovered::Account(signed) = coin
                .recover(RecoverRequest::Account(params))
                .await
                .context("Recovery failed")?
            else {
                bail!("unexpected recovery result");
            };
            println!("{}", serde_json::to_string_pretty(&signed)?);
            Ok(())
        }
        EthCommand::RecoverToken {
            config,
            coin,
            user_key,
            wallet_contract,
            token_contract,
            recipient,
        } => {
            let coin = account_coin(&config, &coin)?;
            let params = TokenRecoveryParams {
                user_key: parse_xprv(&user_key)?,
                wallet_contract: parse_address(&wallet_contract)?,
                token_contract: parse_address(&token_contract)?,
                recipient: parse_address(&recipient)?,
            };
            let Recovered::Token(half_signed) = coin
                .recover(RecoverRequest::Token(params))
                .await
                .context("Token recovery failed")?
            else {
                bail!("unexpected recovery result");
            };
            println!(
                "{}",
                serde_json::to_string_pretty(&serde_json::json!({ "halfSigned": half_signed }))?
            );
            Ok(())
        }
    }
}
