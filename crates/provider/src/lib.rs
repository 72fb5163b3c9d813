//! Client for the vault provider's depositor-facing RPC.
//!
//! The provider is the counterparty that co-signs deposits and produces the
//! presigned claim/payout transaction templates. This crate owns the single
//! boundary where provider responses are turned into typed, pre-classified
//! errors; the polling engine and the orchestrator never look at response
//! strings themselves.

pub mod errors;
pub mod http;
pub mod types;

use bitcoin::Txid;
use tbv_lamport::LamportPublicKey;
use tbv_primitives::DepositorPubkey;

pub use errors::ProviderError;
pub use http::HttpVaultProvider;
pub use types::{PayoutSignature, PresignBundle, PresignEntry, TxTemplate};

/// Depositor-side operations against the vault provider.
#[async_trait::async_trait]
pub trait VaultProviderClient {
    /// Fetches the presigned claim/payout transaction templates for a
    /// deposit. The bundle may be incomplete while the provider's pipeline
    /// is still running; see [`PresignBundle::is_ready`].
    async fn request_depositor_presign_transactions(
        &self,
        pegin_txid: &Txid,
        depositor_pk: &DepositorPubkey,
    ) -> Result<PresignBundle, ProviderError>;

    /// Submits the depositor's Lamport public key for a deposit.
    async fn submit_depositor_lamport_key(
        &self,
        pegin_txid: &Txid,
        depositor_pk: &DepositorPubkey,
        public_key: &LamportPublicKey,
    ) -> Result<(), ProviderError>;

    /// Submits the depositor's signatures over the payout templates.
    async fn submit_signatures(
        &self,
        pegin_txid: &Txid,
        depositor_pk: &DepositorPubkey,
        signatures: &[PayoutSignature],
    ) -> Result<(), ProviderError>;
}
