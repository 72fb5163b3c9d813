//! Unified error type for the deposit flow.

use std::time::Duration;

use bitcoin::Txid;
use tbv_chain::ChainError;
use tbv_keystore::KeystoreError;
use tbv_poll::PollError;
use tbv_provider::ProviderError;
use tbv_wallet::{ReserveError, SelectionError};

use crate::traits::WalletError;

/// Everything a deposit flow step can fail with.
///
/// A failed step never advances the persisted local status, so every
/// variant here is safe to retry from the caller's perspective unless noted
/// otherwise.
#[derive(Debug, thiserror::Error)]
pub enum DepositFlowError {
    /// The wallet declined to sign or broadcast. The persisted record is
    /// untouched; the user can retry immediately.
    #[error("wallet rejected the request: {0}")]
    WalletRejected(String),

    /// The wallet backend itself failed.
    #[error("wallet backend error: {0}")]
    Wallet(String),

    /// Vault provider error, already classified at the HTTP boundary.
    #[error(transparent)]
    Provider(#[from] ProviderError),

    /// Registrar chain error.
    #[error(transparent)]
    Chain(#[from] ChainError),

    /// Mnemonic vault error (wrong password, corrupted envelope).
    #[error(transparent)]
    Keystore(#[from] KeystoreError),

    /// Persistence failure.
    #[error(transparent)]
    Db(#[from] tbv_db::DbError),

    /// A persisted record failed to parse.
    #[error("corrupted deposit record at {key}: {source}")]
    CorruptedRecord {
        /// Storage key of the unreadable record.
        key: String,
        /// The underlying parse failure.
        source: serde_json::Error,
    },

    /// The wallet cannot cover the deposit plus fees.
    #[error(transparent)]
    Selection(#[from] SelectionError),

    /// The selected coins were claimed by a concurrent deposit.
    #[error(transparent)]
    Reservation(#[from] ReserveError),

    /// The peg-in transaction could not be constructed.
    #[error("failed to build pegin transaction: {0}")]
    TxBuild(String),

    /// The funded transaction hex did not parse.
    #[error("invalid funding transaction: {0}")]
    InvalidFundingTx(String),

    /// No pending record exists for this peg-in.
    #[error("no pending deposit for pegin txid {0}")]
    NotFound(Txid),

    /// A wait on a remote party exhausted its budget.
    #[error("timed out waiting for {stage} after {timeout:?}")]
    Timeout {
        /// What was being waited on.
        stage: &'static str,
        /// The poll budget that elapsed.
        timeout: Duration,
    },

    /// The flow was cancelled through [`abort`](crate::flow::DepositFlowOrchestrator::abort).
    #[error("deposit flow aborted")]
    Aborted,
}

impl From<WalletError> for DepositFlowError {
    fn from(err: WalletError) -> Self {
        match err {
            WalletError::Rejected(msg) => Self::WalletRejected(msg),
            WalletError::Backend(msg) => Self::Wallet(msg),
        }
    }
}

/// Collapses a poll failure into the flow error, folding the last observed
/// remote error into the result where one exists.
pub(crate) fn from_poll<E>(stage: &'static str, err: PollError<E>) -> DepositFlowError
where
    E: Into<DepositFlowError>,
{
    match err {
        PollError::Fatal(e) => e.into(),
        PollError::Timeout { timeout, last } => match last {
            // The last transient error explains the timeout better than the
            // timeout itself.
            Some(e) => e.into(),
            None => DepositFlowError::Timeout { stage, timeout },
        },
        PollError::Cancelled => DepositFlowError::Aborted,
    }
}
