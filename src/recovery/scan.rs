//! Gap-limit address scan.
//!
//! Wallet addresses are derived in order along a chain. Scanning stops once
//! `gap_limit` consecutive addresses have never been used.
use tracing::debug;

use crate::error::{Error, Result};
use crate::fixed_script_wallet::{Chain, MultisigScript, RootWalletKeys};
use crate::indexer::{Indexer, UnspentOutput};
use crate::networks::Network;

pub const DEFAULT_GAP_LIMIT: u32 = 20;

/// Scan position along one chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GapScan {
    index: u32,
    consecutive_empty: u32,
    gap_limit: u32,
}

impl GapScan {
    pub fn new(gap_limit: u32) -> Result<Self> {
        if gap_limit == 0 {
            return Err(Error::policy("gap limit must be positive"));
        }
        Ok(Self {
            index: 0,
            consecutive_empty: 0,
            gap_limit,
        })
    }

    /// Index to query next, `None` once the gap limit is reached.
    pub fn next_index(&self) -> Option<u32> {
        (self.consecutive_empty < self.gap_limit).then_some(self.index)
    }

    /// Advance past the current index given its transaction count.
    pub fn record(self, tx_count: u64) -> Self {
        Self {
            index: self.index + 1,
            consecutive_empty: if tx_count == 0 {
                self.consecutive_empty + 1
            } else {
                0
            },
            gap_limit: self.gap_limit,
        }
    }
}

/// Collect the unspent outputs of the wallet addresses on `chain`.
pub async fn scan_chain(
    indexer: &dyn Indexer,
    wallet_keys: &RootWalletKeys,
    chain: Chain,
    network: Network,
    gap_limit: u32,
) -> Result<Vec<UnspentOutput>> {
    let mut unspents = vec![];
    let mut scan = GapScan::new(gap_limit)?;
    while let Some(index) = scan.next_index() {
        let script = MultisigScript::from_wallet_keys(
            wallet_keys,
            chain.value(),
            index,
            chain.script_type,
            network,
        )?;
        let info = indexer
            .address_info(&script.address)
            .await
            .map_err(|e| Error::indexer(format!("querying address {}", script.address), e))?;
        debug!(
            chain = chain.value(),
            index,
            address = %script.address,
            tx_count = info.tx_count,
            balance = info.total_balance,
            "scanned address"
        );

        if info.tx_count > 0 && info.total_balance > 0 {
            let found = indexer
                .unspent_outputs(&script.address)
                .await
                .map_err(|e| Error::indexer(format!("fetching unspents of {}", script.address), e))?;
            unspents.extend(found.into_iter().map(|unspent| UnspentOutput {
                address: script.address.clone(),
                script: Some(script.clone()),
                chain_path: Some((chain.value(), index)),
                ..unspent
            }));
        }
        scan = scan.record(info.tx_count);
    }
    Ok(unspents)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gap_scan_terminates() {
        let mut scan = GapScan::new(3).unwrap();
        let mut queried = vec![];
        // indices 0 and 2 are used
        while let Some(index) = scan.next_index() {
            queried.push(index);
            scan = scan.record(if index == 0 || index == 2 { 1 } else { 0 });
        }
        assert_eq!(queried, vec![0, 1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_gap_scan_empty_wallet() {
        let mut scan = GapScan::new(DEFAULT_GAP_LIMIT).unwrap();
        let mut count = 0;
        while scan.next_index().is_some() {
            count += 1;
            scan = scan.record(0);
        }
        assert_eq!(count, DEFAULT_GAP_LIMIT);
    }

    #[test]
    fn test_zero_gap_limit() {
        assert!(GapScan::new(0).is_err());
    }
}
