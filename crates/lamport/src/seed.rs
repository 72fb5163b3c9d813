//! The 64-byte master seed that roots all Lamport derivations.

use std::fmt;

use bip39::Mnemonic;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Length of the master seed in bytes.
pub const SEED_LEN: usize = 64;

/// Errors arising when constructing a [`Seed`].
#[derive(Debug, thiserror::Error)]
pub enum SeedError {
    /// The mnemonic failed BIP-39 validation (word list or checksum).
    #[error("invalid mnemonic: {0}")]
    InvalidMnemonic(#[from] bip39::Error),
}

/// A 64-byte BIP-39 master seed.
///
/// The first half is used as the parent key and the second half as the chain
/// code, mirroring BIP-32 master key splitting. Constructible only at the
/// right length, so a malformed seed is unrepresentable. Zeroized on drop.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct Seed([u8; SEED_LEN]);

impl Seed {
    /// Wraps raw seed bytes.
    pub const fn new(bytes: [u8; SEED_LEN]) -> Self {
        Self(bytes)
    }

    /// Validates the mnemonic (including its checksum) and derives the seed
    /// from it with the given passphrase.
    pub fn from_mnemonic(phrase: &str, passphrase: &str) -> Result<Self, SeedError> {
        let mnemonic = Mnemonic::parse(phrase)?;
        Ok(Self(mnemonic.to_seed(passphrase)))
    }

    /// The parent key half of the seed.
    pub(crate) fn parent_key(&self) -> &[u8] {
        &self.0[..SEED_LEN / 2]
    }

    /// The chain code half of the seed.
    pub(crate) fn chain_code(&self) -> &[u8] {
        &self.0[SEED_LEN / 2..]
    }
}

impl fmt::Debug for Seed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Never print seed material.
        f.write_str("Seed(..)")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MNEMONIC: &str = "abandon abandon abandon abandon abandon abandon abandon abandon \
                            abandon abandon abandon about";

    #[test]
    fn mnemonic_derivation_is_deterministic() {
        let a = Seed::from_mnemonic(MNEMONIC, "").unwrap();
        let b = Seed::from_mnemonic(MNEMONIC, "").unwrap();
        assert_eq!(a.0, b.0);
    }

    #[test]
    fn passphrase_changes_the_seed() {
        let plain = Seed::from_mnemonic(MNEMONIC, "").unwrap();
        let salted = Seed::from_mnemonic(MNEMONIC, "hunter2").unwrap();
        assert_ne!(plain.0, salted.0);
    }

    #[test]
    fn bad_checksum_is_rejected() {
        // Same words, last one swapped so the checksum no longer matches.
        let phrase = "abandon abandon abandon abandon abandon abandon abandon abandon \
                      abandon abandon abandon abandon";
        assert!(matches!(
            Seed::from_mnemonic(phrase, ""),
            Err(SeedError::InvalidMnemonic(_))
        ));
    }

    #[test]
    fn debug_redacts_seed_material() {
        let seed = Seed::from_mnemonic(MNEMONIC, "").unwrap();
        assert_eq!(format!("{seed:?}"), "Seed(..)");
    }
}
