//! UTXO networks supported by the engine and their consensus parameters.

use std::fmt;
use std::str::FromStr;

/// Base58check version bytes and bech32 prefix of a network.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddressParams {
    pub pub_key_hash: u8,
    pub script_hash: u8,
    /// Additional script-hash version accepted on decode (Litecoin's legacy `3...`)
    pub legacy_script_hash: Option<u8>,
    pub bech32_hrp: Option<&'static str>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Network {
    Bitcoin,
    BitcoinTestnet,
    BitcoinCash,
    BitcoinCashTestnet,
    BitcoinGold,
    BitcoinGoldTestnet,
    Litecoin,
    LitecoinTestnet,
}

impl Network {
    pub fn all() -> &'static [Network] {
        &[
            Network::Bitcoin,
            Network::BitcoinTestnet,
            Network::BitcoinCash,
            Network::BitcoinCashTestnet,
            Network::BitcoinGold,
            Network::BitcoinGoldTestnet,
            Network::Litecoin,
            Network::LitecoinTestnet,
        ]
    }

    /// Chain tag used by BitGo, e.g. `btc` or `tltc`.
    pub fn coin_name(&self) -> &'static str {
        match self {
            Network::Bitcoin => "btc",
            Network::BitcoinTestnet => "tbtc",
            Network::BitcoinCash => "bch",
            Network::BitcoinCashTestnet => "tbch",
            Network::BitcoinGold => "btg",
            Network::BitcoinGoldTestnet => "tbtg",
            Network::Litecoin => "ltc",
            Network::LitecoinTestnet => "tltc",
        }
    }

    pub fn from_coin_name(name: &str) -> Option<Network> {
        Network::all()
            .iter()
            .copied()
            .find(|n| n.coin_name() == name)
    }

    pub fn is_mainnet(&self) -> bool {
        self.mainnet() == *self
    }

    /// The mainnet this network belongs to.
    pub fn mainnet(&self) -> Network {
        match self {
            Network::Bitcoin | Network::BitcoinTestnet => Network::Bitcoin,
            Network::BitcoinCash | Network::BitcoinCashTestnet => Network::BitcoinCash,
            Network::BitcoinGold | Network::BitcoinGoldTestnet => Network::BitcoinGold,
            Network::Litecoin | Network::LitecoinTestnet => Network::Litecoin,
        }
    }

    pub fn address_params(&self) -> AddressParams {
        match self {
            Network::Bitcoin => AddressParams {
                pub_key_hash: 0x00,
                script_hash: 0x05,
                legacy_script_hash: None,
                bech32_hrp: Some("bc"),
            },
            Network::BitcoinTestnet => AddressParams {
                pub_key_hash: 0x6f,
                script_hash: 0xc4,
                legacy_script_hash: None,
                bech32_hrp: Some("tb"),
            },
            Network::BitcoinCash => AddressParams {
                pub_key_hash: 0x00,
                script_hash: 0x05,
                legacy_script_hash: None,
                bech32_hrp: None,
            },
            Network::BitcoinCashTestnet => AddressParams {
                pub_key_hash: 0x6f,
                script_hash: 0xc4,
                legacy_script_hash: None,
                bech32_hrp: None,
            },
            Network::BitcoinGold => AddressParams {
                pub_key_hash: 0x26,
                script_hash: 0x17,
                legacy_script_hash: None,
                bech32_hrp: Some("btg"),
            },
            Network::BitcoinGoldTestnet => AddressParams {
                pub_key_hash: 0x6f,
                script_hash: 0xc4,
                legacy_script_hash: None,
                bech32_hrp: Some("tbtg"),
            },
            Network::Litecoin => AddressParams {
                pub_key_hash: 0x30,
                script_hash: 0x32,
                legacy_script_hash: Some(0x05),
                bech32_hrp: Some("ltc"),
            },
            Network::LitecoinTestnet => AddressParams {
                pub_key_hash: 0x6f,
                script_hash: 0x3a,
                legacy_script_hash: Some(0xc4),
                bech32_hrp: Some("tltc"),
            },
        }
    }

    pub fn supports_segwit(&self) -> bool {
        !matches!(self.mainnet(), Network::BitcoinCash)
    }

    /// Replay-protection fork id mixed into the signature hash type.
    ///
    /// `None` for networks that use the plain Bitcoin sighash algorithms.
    pub fn fork_id(&self) -> Option<u32> {
        match self.mainnet() {
            Network::BitcoinCash => Some(0),
            Network::BitcoinGold => Some(79),
            _ => None,
        }
    }

    /// Number of base units in one coin.
    pub fn base_factor(&self) -> u64 {
        100_000_000
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.coin_name())
    }
}

impl FromStr for Network {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Network::from_coin_name(s).ok_or_else(|| format!("unknown network '{}'", s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coin_name_roundtrip() {
        for network in Network::all() {
            assert_eq!(Network::from_str(network.coin_name()).unwrap(), *network);
        }
        assert!(Network::from_str("doge").is_err());
    }

    #[test]
    fn test_fork_ids() {
        assert_eq!(Network::Bitcoin.fork_id(), None);
        assert_eq!(Network::Litecoin.fork_id(), None);
        assert_eq!(Network::BitcoinCash.fork_id(), Some(0));
        assert_eq!(Network::BitcoinCashTestnet.fork_id(), Some(0));
        assert_eq!(Network::BitcoinGold.fork_id(), Some(79));
    }

    #[test]
    fn test_segwit_support() {
        assert!(Network::Bitcoin.supports_segwit());
        assert!(Network::LitecoinTestnet.supports_segwit());
        assert!(!Network::BitcoinCash.supports_segwit());
    }

    #[test]
    fn test_mainnet() {
        assert!(Network::Bitcoin.is_mainnet());
        assert!(!Network::BitcoinGoldTestnet.is_mainnet());
        assert_eq!(Network::LitecoinTestnet.mainnet(), Network::Litecoin);
    }
}
