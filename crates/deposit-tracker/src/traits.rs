//! Boundaries to the external parties the deposit flow drives.

use std::collections::HashSet;

use async_trait::async_trait;
use bitcoin::Txid;
use tbv_primitives::WalletUtxo;
use tbv_provider::{PayoutSignature, PresignBundle};

use crate::flow::NewDeposit;

/// Errors crossing the wallet boundary.
#[derive(Debug, Clone, thiserror::Error)]
pub enum WalletError {
    /// The user or wallet policy declined the request.
    #[error("rejected: {0}")]
    Rejected(String),

    /// The wallet backend failed.
    #[error("backend: {0}")]
    Backend(String),
}

/// The depositor's wallet. Custody, signing UIs and broadcast plumbing all
/// live on the far side of this trait.
#[async_trait]
pub trait WalletBackend: Send + Sync {
    /// The wallet's current spendable UTXOs.
    async fn list_utxos(&self) -> Result<Vec<WalletUtxo>, WalletError>;

    /// Attaches the given inputs (and a change output) to an unfunded peg-in
    /// template. Returns the funded, still unsigned, transaction hex.
    async fn fund_pegin_template(
        &self,
        template_hex: &str,
        inputs: &[WalletUtxo],
    ) -> Result<String, WalletError>;

    /// Signs an arbitrary message with the depositor key. Used for the
    /// proof of key possession.
    async fn sign_message(&self, message: &str) -> Result<String, WalletError>;

    /// Signs a complete transaction. Returns the signed hex.
    async fn sign_transaction(&self, tx_hex: &str) -> Result<String, WalletError>;

    /// Signs the provider's presigned claim/payout template pairs.
    async fn sign_payout_templates(
        &self,
        bundle: &PresignBundle,
    ) -> Result<Vec<PayoutSignature>, WalletError>;

    /// Broadcasts a signed transaction to Bitcoin.
    async fn broadcast(&self, signed_tx_hex: &str) -> Result<Txid, WalletError>;

    /// Txids this wallet has broadcast, used to tell "spent by us" apart
    /// from "spent out from under us".
    async fn broadcasted_txids(&self) -> Result<HashSet<Txid>, WalletError>;
}

/// Builds the unfunded peg-in transaction template for a deposit.
///
/// Taproot script construction is opaque to the flow; all it needs back is
/// hex it can hand to the wallet for funding.
pub trait PeginTxBuilder: Send + Sync {
    /// Returns the unfunded template hex for the deposit.
    fn build_template(&self, deposit: &NewDeposit) -> Result<String, String>;
}
