use std::convert::TryInto;
use std::fmt;
use std::str::FromStr;

use crate::bitcoin::bip32::{ChildNumber, DerivationPath, Xpriv, Xpub};
use crate::bitcoin::secp256k1::{Secp256k1, Signing};
use crate::bitcoin::CompressedPublicKey;
use crate::error::{Error, Result};

pub type XpubTriple = [Xpub; 3];

pub type PubTriple = [CompressedPublicKey; 3];

pub fn to_pub_triple(xpubs: &XpubTriple) -> PubTriple {
    [xpubs[0].to_pub(), xpubs[1].to_pub(), xpubs[2].to_pub()]
}

/// BitGo wallet derivation prefix shared by all three keys.
pub fn default_derivation_prefix() -> DerivationPath {
    DerivationPath::from(vec![
        ChildNumber::Normal { index: 0 },
        ChildNumber::Normal { index: 0 },
    ])
}

pub fn derivation_path(prefix: &DerivationPath, chain: u32, index: u32) -> DerivationPath {
    prefix
        .child(ChildNumber::Normal { index: chain })
        .child(ChildNumber::Normal { index })
}

/// A hierarchical key in either public or private form.
///
/// `Debug` and `Display` never print private material, use
/// [`ExtendedKey::to_base58_private`] when the secret is needed.
#[derive(Clone, PartialEq, Eq)]
pub enum ExtendedKey {
    Public(Xpub),
    Private(Xpriv),
}

impl ExtendedKey {
    pub fn to_xpub<C: Signing>(&self, secp: &Secp256k1<C>) -> Xpub {
        match self {
            ExtendedKey::Public(xpub) => *xpub,
            ExtendedKey::Private(xprv) => Xpub::from_priv(secp, xprv),
        }
    }

    pub fn xpriv(&self) -> Option<&Xpriv> {
        match self {
            ExtendedKey::Public(_) => None,
            ExtendedKey::Private(xprv) => Some(xprv),
        }
    }

    pub fn is_private(&self) -> bool {
        matches!(self, ExtendedKey::Private(_))
    }

    /// Derive a child key. Private keys stay private.
    pub fn derive(&self, path: &DerivationPath) -> Result<ExtendedKey> {
        let secp = Secp256k1::new();
        Ok(match self {
            ExtendedKey::Public(xpub) => ExtendedKey::Public(xpub.derive_pub(&secp, path)?),
            ExtendedKey::Private(xprv) => ExtendedKey::Private(xprv.derive_priv(&secp, path)?),
        })
    }

    pub fn to_base58_private(&self) -> Option<String> {
        self.xpriv().map(|x| x.to_string())
    }
}

impl FromStr for ExtendedKey {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if let Ok(xprv) = Xpriv::from_str(s) {
            return Ok(ExtendedKey::Private(xprv));
        }
        Xpub::from_str(s)
            .map(ExtendedKey::Public)
            .map_err(|e| Error::Key(format!("invalid extended key: {}", e)))
    }
}

impl fmt::Debug for ExtendedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExtendedKey::Public(xpub) => write!(f, "ExtendedKey::Public({})", xpub),
            ExtendedKey::Private(xprv) => write!(
                f,
                "ExtendedKey::Private(fingerprint={})",
                xprv.fingerprint(&Secp256k1::new())
            ),
        }
    }
}

impl fmt::Display for ExtendedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_xpub(&Secp256k1::signing_only()))
    }
}

/// The user, backup and BitGo keys of a wallet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RootWalletKeys {
    pub xpubs: XpubTriple,
    pub derivation_prefixes: [DerivationPath; 3],
}

impl RootWalletKeys {
    pub fn new_with_derivation_prefixes(
        xpubs: XpubTriple,
        derivation_prefixes: [DerivationPath; 3],
    ) -> Self {
        Self {
            xpubs,
            derivation_prefixes,
        }
    }

    pub fn new(xpubs: XpubTriple) -> Self {
        Self::new_with_derivation_prefixes(
            xpubs,
            [
                default_derivation_prefix(),
                default_derivation_prefix(),
                default_derivation_prefix(),
            ],
        )
    }

    /// Build from any mix of public and private keys, ordered user, backup, bitgo.
    pub fn from_extended_keys(keys: &[ExtendedKey; 3]) -> Self {
        let secp = Secp256k1::signing_only();
        Self::new([
            keys[0].to_xpub(&secp),
            keys[1].to_xpub(&secp),
            keys[2].to_xpub(&secp),
        ])
    }

    pub fn user_key(&self) -> &Xpub {
        &self.xpubs[0]
    }

    pub fn backup_key(&self) -> &Xpub {
        &self.xpubs[1]
    }

    pub fn bitgo_key(&self) -> &Xpub {
        &self.xpubs[2]
    }

    pub fn derive_for_chain_and_index(&self, chain: u32, index: u32) -> Result<XpubTriple> {
        let ctx = Secp256k1::verification_only();

        self.xpubs
            .iter()
            .zip(self.derivation_prefixes.iter())
            .map(|(x, p)| {
                x.derive_pub(&ctx, &derivation_path(p, chain, index))
                    .map_err(|e| Error::Key(format!("error deriving xpub: {}", e)))
            })
            .collect::<Result<Vec<_>>>()?
            .try_into()
            .map_err(|_| Error::Key("expected exactly 3 derived xpubs".to_string()))
    }

    /// Derived compressed public keys at `m/0/0/{chain}/{index}`.
    pub fn derive_pub_triple(&self, chain: u32, index: u32) -> Result<PubTriple> {
        Ok(to_pub_triple(&self.derive_for_chain_and_index(chain, index)?))
    }

    /// Position of `xpub` in the key triple, if it is one of the wallet keys.
    pub fn position(&self, xpub: &Xpub) -> Option<usize> {
        self.xpubs.iter().position(|k| k == xpub)
    }
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use crate::bitcoin::bip32::Xpriv;
    use crate::bitcoin::hashes::{sha256, Hash};

    pub type XprivTriple = [Xpriv; 3];

    pub fn get_xpriv_from_seed(seed: &str) -> Xpriv {
        use crate::bitcoin::Network;

        // hash seed into 32 bytes
        let seed_hash = sha256::Hash::hash(seed.as_bytes()).to_byte_array();

        Xpriv::new_master(Network::Testnet, &seed_hash).expect("could not create xpriv from seed")
    }

    pub fn get_test_wallet_xprvs(seed: &str) -> XprivTriple {
        let a = get_xpriv_from_seed(&format!("{}/0", seed));
        let b = get_xpriv_from_seed(&format!("{}/1", seed));
        let c = get_xpriv_from_seed(&format!("{}/2", seed));
        [a, b, c]
    }

    pub fn get_test_wallet_keys(seed: &str) -> RootWalletKeys {
        let xprvs = get_test_wallet_xprvs(seed);
        let secp = Secp256k1::new();
        RootWalletKeys::new(xprvs.map(|x| Xpub::from_priv(&secp, &x)))
    }

    #[test]
    fn test_derivation_is_deterministic() {
        let keys = get_test_wallet_keys("test");
        let a = keys.derive_for_chain_and_index(0, 7).unwrap();
        let b = keys.derive_for_chain_and_index(0, 7).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, keys.derive_for_chain_and_index(1, 7).unwrap());
    }

    #[test]
    fn test_private_and_public_derivation_agree() {
        let xprvs = get_test_wallet_xprvs("test");
        let secp = Secp256k1::new();
        let path = derivation_path(&default_derivation_prefix(), 1, 3);

        let private = ExtendedKey::Private(xprvs[0]).derive(&path).unwrap();
        let public = ExtendedKey::Public(Xpub::from_priv(&secp, &xprvs[0]))
            .derive(&path)
            .unwrap();

        assert!(private.is_private());
        assert!(!public.is_private());
        assert_eq!(private.to_xpub(&secp), public.to_xpub(&secp));
    }

    #[test]
    fn test_extended_key_from_str() {
        let xprv = get_xpriv_from_seed("parse");
        let secp = Secp256k1::new();
        let xpub = Xpub::from_priv(&secp, &xprv);

        let parsed = ExtendedKey::from_str(&xprv.to_string()).unwrap();
        assert_eq!(parsed, ExtendedKey::Private(xprv));
        let parsed = ExtendedKey::from_str(&xpub.to_string()).unwrap();
        assert_eq!(parsed, ExtendedKey::Public(xpub));
        assert!(ExtendedKey::from_str("xpub-nonsense").is_err());
    }

    #[test]
    fn test_debug_does_not_leak_private_key() {
        let xprv = get_xpriv_from_seed("secret");
        let key = ExtendedKey::Private(xprv);
        let printed = format!("{:?} {}", key, key);
        assert!(!printed.contains(&xprv.to_string()));
        assert!(!printed.contains("tprv"));
    }

    #[test]
    fn test_position() {
        let keys = get_test_wallet_keys("test");
        assert_eq!(keys.position(keys.backup_key()), Some(1));
        let other = get_test_wallet_keys("other");
        assert_eq!(keys.position(other.user_key()), None);
    }
}
