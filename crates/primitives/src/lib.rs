//! Shared protocol types for the TBV depositor.
//!
//! These are the types that cross crate boundaries: deposit statuses as seen
//! by the registrar contract and by the local resumable flow, identifiers for
//! vaults and counterparties, and the persisted [`PendingPeginRequest`]
//! record that makes a half-finished deposit recoverable after a crash.

pub mod pegin;
pub mod types;

pub use pegin::{Deposit, PendingPeginRequest};
pub use types::{
    ContractStatus, DepositorPubkey, EvmAddress, EvmTxHash, LocalStatus, VaultId, WalletUtxo,
};
