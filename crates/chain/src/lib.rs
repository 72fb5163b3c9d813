//! Client traits and errors for the EVM registration chain.
//!
//! Deposits are registered on an EVM contract before the Bitcoin side moves.
//! The actual RPC transport lives with the embedding application; this crate
//! fixes the operations the deposit flow needs and the error taxonomy the
//! polling engine classifies on.

pub mod errors;

use async_trait::async_trait;
use bitcoin::{Amount, Txid};
use tbv_primitives::{ContractStatus, DepositorPubkey, EvmAddress, EvmTxHash, VaultId};

pub use errors::{decode_revert, ChainError};

/// Everything the registration contract needs to accept a peg-in.
#[derive(Debug, Clone)]
pub struct PeginRegistration {
    /// Txid of the (not yet broadcast) funding transaction.
    pub pegin_txid: Txid,

    /// The vault being deposited into.
    pub vault_id: VaultId,

    /// The depositor's BTC public key.
    pub depositor_pk: DepositorPubkey,

    /// The application controller contract.
    pub app_contract_address: EvmAddress,

    /// Deposit amount.
    pub amount: Amount,

    /// Commitment to the depositor's Lamport public key, hex-encoded. The
    /// full key is revealed to the vault provider later; the chain only
    /// ever sees this digest.
    pub lamport_commitment: String,

    /// Signature proving possession of `depositor_pk`, hex-encoded.
    pub proof_of_possession: String,
}

/// Operations against the vault registration contract.
#[async_trait]
pub trait RegistrarClient {
    /// Submits the peg-in registration transaction. Returns the hash of the
    /// submitted EVM transaction; confirmation is a separate poll.
    async fn register_pegin(
        &self,
        registration: &PeginRegistration,
    ) -> Result<EvmTxHash, ChainError>;

    /// Whether the given registration transaction has been mined and
    /// confirmed. `Ok(false)` means keep waiting.
    async fn registration_confirmed(&self, tx: &EvmTxHash) -> Result<bool, ChainError>;

    /// The contract-side status of a deposit.
    async fn contract_status(&self, pegin_txid: &Txid) -> Result<ContractStatus, ChainError>;

    /// Whether this peg-in already has a live registration. Used to make
    /// registration idempotent across restarts.
    async fn is_registered(&self, pegin_txid: &Txid) -> Result<bool, ChainError>;
}
