//! Deterministic Lamport one-time-signature key derivation.
//!
//! Each deposit authenticates its fraud-proof commitments with a Lamport
//! keypair derived from the depositor's mnemonic seed and the vault context
//! (vault id, depositor BTC pubkey, application contract address). The same
//! inputs always reproduce the same keypair bit-for-bit, which is what makes
//! mnemonic-only recovery possible: nothing but the seed ever needs to be
//! backed up.
//!
//! Preimages are one-time secrets. They are derived on demand, never
//! serialized, and scrubbed from memory when the keypair is dropped. Only
//! the hash lists (the public key) leave this crate.

pub mod derive;
pub mod keypair;
pub mod seed;

pub use derive::{derive_lamport_keypair, derive_lamport_keypair_async, VaultContext};
pub use keypair::{
    LamportKeypair, LamportPublicKey, LAMPORT_HASH_LEN, LAMPORT_KEY_SLOTS, LAMPORT_PREIMAGE_LEN,
};
pub use seed::{Seed, SeedError};
