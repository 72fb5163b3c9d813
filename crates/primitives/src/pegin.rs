//! Deposit records: the on-chain view and the local resumable request.

use bitcoin::{Amount, OutPoint, Txid};
use serde::{Deserialize, Serialize};

use crate::types::{ContractStatus, DepositorPubkey, EvmAddress, EvmTxHash, LocalStatus, VaultId};

/// A deposit as seen through the registrar contract, identified by its
/// peg-in transaction id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deposit {
    /// Transaction id of the peg-in funding transaction.
    pub pegin_txid: Txid,

    /// The amount locked into the vault output.
    #[serde(with = "bitcoin::amount::serde::as_sat")]
    pub amount: Amount,

    /// The depositor's BTC public key.
    pub depositor_pk: DepositorPubkey,

    /// The application controller contract address on the EVM side.
    pub app_contract_address: EvmAddress,

    /// Reference to the vault provider that co-signs this deposit.
    pub vault_id: VaultId,

    /// Current status reported by the registrar contract.
    pub contract_status: ContractStatus,
}

/// The locally persisted, resumable record of an in-flight deposit.
///
/// Keyed by depositor address and peg-in txid. Mutated only by the
/// orchestrator, and only after a step completes successfully. A failed step
/// never rolls this record back, so retrying re-executes exactly the step
/// that did not commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingPeginRequest {
    /// Transaction id of the (unsigned) funding transaction.
    pub pegin_txid: Txid,

    /// The depositor's wallet address, used to scope the persistence key.
    pub depositor_address: String,

    /// The depositor's BTC public key.
    pub depositor_pk: DepositorPubkey,

    /// The vault this deposit locks into.
    pub vault_id: VaultId,

    /// The application controller contract address on the EVM side.
    pub app_contract_address: EvmAddress,

    /// The deposit amount.
    #[serde(with = "bitcoin::amount::serde::as_sat")]
    pub amount: Amount,

    /// How far the local flow has committed.
    pub local_status: LocalStatus,

    /// Hex of the funded but unsigned funding transaction.
    pub unsigned_funding_tx_hex: String,

    /// Outpoints selected (and reserved) to fund this deposit.
    pub selected_utxos: Vec<OutPoint>,

    /// Proof-of-possession signature over the depositor key, once produced.
    pub pop_signature: Option<String>,

    /// Hash of the registrar transaction that registered this peg-in.
    pub registration_tx: Option<EvmTxHash>,

    /// The broadcast transaction id, once the funding tx hits the network.
    pub broadcast_txid: Option<Txid>,
}

impl PendingPeginRequest {
    /// The key under which this record is persisted.
    pub fn storage_key(&self) -> String {
        Self::storage_key_for(&self.depositor_address, &self.pegin_txid)
    }

    /// Computes the persistence key for a depositor address and peg-in txid.
    pub fn storage_key_for(depositor_address: &str, pegin_txid: &Txid) -> String {
        format!("pegin/{depositor_address}/{pegin_txid}")
    }
}
