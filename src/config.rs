//! Engine configuration, loaded from TOML.
//!
//! ```toml
//! gap_limit = 20
//!
//! [coins.btc]
//! indexer_base_url = "https://api.example.com/v1/btc/main"
//! fee_rate_url = "https://fees.example.com/api/v1/fees/recommended"
//!
//! [coins.eth]
//! indexer_base_url = "https://api.etherscan.io"
//! api_key = "..."
//! network_params = { gas_price = 30000000000 }
//! ```
use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::account::{GasParams, DEFAULT_GAS_LIMIT, DEFAULT_GAS_PRICE};
use crate::error::{Error, Result};
use crate::recovery::{DEFAULT_FEE_RATE, DEFAULT_GAP_LIMIT};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default = "default_gap_limit")]
    pub gap_limit: u32,
    /// Per-coin settings keyed by chain tag
    #[serde(default)]
    pub coins: HashMap<String, CoinConfig>,
}

fn default_gap_limit() -> u32 {
    DEFAULT_GAP_LIMIT
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            gap_limit: DEFAULT_GAP_LIMIT,
            coins: HashMap::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoinConfig {
    /// Block explorer (UTXO) or account explorer (ETH) base url
    pub indexer_base_url: Url,
    #[serde(default)]
    pub fee_rate_url: Option<Url>,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub network_params: NetworkParams,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkParams {
    /// Base units per byte
    pub default_fee_rate: u64,
    /// Wei per gas
    pub gas_price: u64,
    pub gas_limit: u64,
    pub chain_id: Option<u64>,
}

impl Default for NetworkParams {
    fn default() -> Self {
        Self {
            default_fee_rate: DEFAULT_FEE_RATE,
            gas_price: DEFAULT_GAS_PRICE,
            gas_limit: DEFAULT_GAS_LIMIT,
            chain_id: None,
        }
    }
}

impl NetworkParams {
    pub fn gas_params(&self) -> GasParams {
        GasParams {
            gas_price: self.gas_price,
            gas_limit: self.gas_limit,
            chain_id: self.chain_id,
        }
    }
}

impl EngineConfig {
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: EngineConfig =
            toml::from_str(content).map_err(|e| Error::Config(format!("invalid TOML: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            Error::Config(format!("failed to read {}: {}", path.as_ref().display(), e))
        })?;
        Self::from_toml_str(&content)
    }

    fn validate(&self) -> Result<()> {
        if self.gap_limit == 0 {
            return Err(Error::Config("gap_limit must be positive".to_string()));
        }
        for (tag, coin) in &self.coins {
            if coin.network_params.gas_limit == 0 {
                return Err(Error::Config(format!("{}: gas_limit must be positive", tag)));
            }
        }
        Ok(())
    }

    pub fn coin(&self, tag: &str) -> Option<&CoinConfig> {
        self.coins.get(tag)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::from_toml_str("").unwrap();
        assert_eq!(config, EngineConfig::default());
        assert_eq!(config.gap_limit, 20);
    }

    #[test]
    fn test_coin_config() {
        let config = EngineConfig::from_toml_str(
            r#"
            gap_limit = 5

            [coins.btc]
            indexer_base_url = "https://api.example.com/v1/btc/main"
            fee_rate_url = "https://fees.example.com/recommended"

            [coins.teth]
            indexer_base_url = "https://api-kovan.etherscan.io"
            api_key = "secret"
            network_params = { gas_price = 30000000000, chain_id = 42 }
            "#,
        )
        .unwrap();
        assert_eq!(config.gap_limit, 5);

        let btc = config.coin("btc").unwrap();
        assert_eq!(btc.indexer_base_url.path(), "/v1/btc/main");
        assert!(btc.fee_rate_url.is_some());
        assert_eq!(btc.network_params, NetworkParams::default());
        assert_eq!(btc.network_params.default_fee_rate, 100);

        let teth = config.coin("teth").unwrap();
        assert_eq!(teth.api_key.as_deref(), Some("secret"));
        assert_eq!(
            teth.network_params.gas_params(),
            GasParams {
                gas_price: 30_000_000_000,
                gas_limit: 500_000,
                chain_id: Some(42),
            }
        );
        assert!(config.coin("ltc").is_none());
    }

    #[test]
    fn test_invalid_config() {
        assert!(matches!(
            EngineConfig::from_toml_str("gap_limit = 0"),
            Err(Error::Config(_))
        ));
        assert!(matches!(
            EngineConfig::from_toml_str("[coins.btc]\nindexer_base_url = \"not a url\""),
            Err(Error::Config(_))
        ));
        assert!(matches!(
            EngineConfig::load("/nonexistent/engine.toml"),
            Err(Error::Config(_))
        ));
    }
}
