//! Identifier newtypes and status enums used throughout the deposit flow.

use std::fmt;

use bitcoin::{Amount, OutPoint};
use serde::{Deserialize, Serialize};

/// Status of a deposit as reported by the on-chain registrar contract.
///
/// The full enumeration on the live contract is larger than what the
/// depositor needs to act on. Anything the depositor does not recognize is
/// carried verbatim in [`ContractStatus::Other`] so that new contract states
/// degrade to a neutral display instead of a deserialization failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContractStatus {
    /// The deposit is registered but not yet verified by the contract.
    Pending,

    /// The contract has verified the deposit and the funding transaction may
    /// be broadcast.
    Verified,

    /// Any status the depositor does not act on directly.
    Other(String),
}

impl fmt::Display for ContractStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => f.write_str("pending"),
            Self::Verified => f.write_str("verified"),
            Self::Other(s) => f.write_str(s),
        }
    }
}

/// Local, resumable progress of a deposit as tracked by the orchestrator.
///
/// Only ever advanced after a step completes fully; a failed step leaves the
/// stored status untouched so a retry resumes from the same point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LocalStatus {
    /// The funding transaction is built but payouts are not yet signed.
    Pending,

    /// The depositor has signed the provider's presigned payout templates.
    PayoutSigned,

    /// The funding transaction has been broadcast to Bitcoin.
    Confirming,
}

/// Identifier of a vault instance.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct VaultId(pub String);

impl fmt::Display for VaultId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The depositor's BTC public key, hex-encoded as the provider and registrar
/// expect it on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DepositorPubkey(pub String);

impl fmt::Display for DepositorPubkey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A 0x-prefixed EVM address.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EvmAddress(pub String);

impl fmt::Display for EvmAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Hash of an EVM transaction, as returned by the registrar on submission.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EvmTxHash(pub String);

impl fmt::Display for EvmTxHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A spendable output in the depositor's wallet, as reported by the external
/// wallet/indexer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletUtxo {
    /// The outpoint funding this UTXO.
    pub outpoint: OutPoint,

    /// The value of the output.
    #[serde(with = "bitcoin::amount::serde::as_sat")]
    pub value: Amount,
}
