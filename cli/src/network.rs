//! Network argument type for CLI commands

use clap::ValueEnum;
use multisig_engine::Network;

/// CLI argument type for network selection
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum NetworkArg {
    Btc,
    Tbtc,
    Ltc,
    Tltc,
    Bch,
    Tbch,
    Btg,
    Tbtg,
}

impl From<NetworkArg> for Network {
    fn from(arg: NetworkArg) -> Self {
        match arg {
            NetworkArg::Btc => Network::Bitcoin,
            NetworkArg::Tbtc => Network::BitcoinTestnet,
            NetworkArg::Ltc => Network::Litecoin,
            NetworkArg::Tltc => Network::LitecoinTestnet,
            NetworkArg::Bch => Network::BitcoinCash,
            NetworkArg::Tbch => Network::BitcoinCashTestnet,
            NetworkArg::Btg => Network::BitcoinGold,
            NetworkArg::Tbtg => Network::BitcoinGoldTestnet,
        }
    }
}
