//! Lamport keypair and public key types.

use bitcoin::hashes::{sha256, Hash, HashEngine};
use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Number of one-time slots (bit positions) in a keypair.
pub const LAMPORT_KEY_SLOTS: usize = 508;

/// Length of a single preimage in bytes.
pub const LAMPORT_PREIMAGE_LEN: usize = 16;

/// Length of a single public hash (hash160 of the preimage) in bytes.
pub const LAMPORT_HASH_LEN: usize = 20;

/// A full Lamport keypair: one preimage/hash pair per bit branch per slot.
///
/// Preimages are the one-time secrets. They can only be produced by
/// [`derive_lamport_keypair`](crate::derive::derive_lamport_keypair), are
/// deliberately not serializable, and are zeroized when the keypair is
/// dropped. Create the keypair immediately before use and let it go out of
/// scope right after.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct LamportKeypair {
    false_preimages: Vec<[u8; LAMPORT_PREIMAGE_LEN]>,
    true_preimages: Vec<[u8; LAMPORT_PREIMAGE_LEN]>,
    #[zeroize(skip)]
    public: LamportPublicKey,
}

impl LamportKeypair {
    pub(crate) fn new(
        false_preimages: Vec<[u8; LAMPORT_PREIMAGE_LEN]>,
        true_preimages: Vec<[u8; LAMPORT_PREIMAGE_LEN]>,
        public: LamportPublicKey,
    ) -> Self {
        debug_assert_eq!(false_preimages.len(), LAMPORT_KEY_SLOTS);
        debug_assert_eq!(true_preimages.len(), LAMPORT_KEY_SLOTS);
        Self {
            false_preimages,
            true_preimages,
            public,
        }
    }

    /// The public half of the keypair. This is the only material that may be
    /// transmitted.
    pub fn public(&self) -> &LamportPublicKey {
        &self.public
    }

    /// The preimage committing to bit value `bit` at `slot`.
    ///
    /// Revealing a preimage uses the slot up; callers own that bookkeeping.
    ///
    /// # Panics
    ///
    /// Panics if `slot >= LAMPORT_KEY_SLOTS`; slot indices are fixed by the
    /// protocol so an out-of-range index is a programming error.
    pub fn preimage(&self, slot: usize, bit: bool) -> &[u8; LAMPORT_PREIMAGE_LEN] {
        if bit {
            &self.true_preimages[slot]
        } else {
            &self.false_preimages[slot]
        }
    }
}

impl std::fmt::Debug for LamportKeypair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Preimages stay out of logs; the public key identifies the pair.
        f.debug_struct("LamportKeypair")
            .field("public", &self.public)
            .finish_non_exhaustive()
    }
}

/// The public half of a Lamport keypair: the hash160 of every preimage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LamportPublicKey {
    /// Hashes committing to bit value 0, one per slot.
    #[serde(with = "hex_rows")]
    pub false_hashes: Vec<[u8; LAMPORT_HASH_LEN]>,

    /// Hashes committing to bit value 1, one per slot.
    #[serde(with = "hex_rows")]
    pub true_hashes: Vec<[u8; LAMPORT_HASH_LEN]>,
}

impl LamportPublicKey {
    /// The commitment registered on-chain for this public key: the sha256 of
    /// all false hashes followed by all true hashes.
    pub fn commitment(&self) -> sha256::Hash {
        let mut engine = sha256::Hash::engine();
        for row in self.false_hashes.iter().chain(self.true_hashes.iter()) {
            engine.input(row);
        }
        sha256::Hash::from_engine(engine)
    }
}

/// Serializes fixed-width hash rows as lists of hex strings, matching the
/// wire format the vault provider and registrar expect.
mod hex_rows {
    use serde::{de::Error as _, Deserialize, Deserializer, Serializer};

    use super::LAMPORT_HASH_LEN;

    pub(super) fn serialize<S: Serializer>(
        rows: &[[u8; LAMPORT_HASH_LEN]],
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(rows.iter().map(hex::encode))
    }

    pub(super) fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Vec<[u8; LAMPORT_HASH_LEN]>, D::Error> {
        let strings = Vec::<String>::deserialize(deserializer)?;
        strings
            .into_iter()
            .map(|s| {
                let bytes = hex::decode(&s).map_err(D::Error::custom)?;
                <[u8; LAMPORT_HASH_LEN]>::try_from(bytes.as_slice())
                    .map_err(|_| D::Error::custom("hash row must be 20 bytes"))
            })
            .collect()
    }
}
