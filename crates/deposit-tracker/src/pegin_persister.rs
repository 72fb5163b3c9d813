//! JSON persistence for pending peg-in records.

use std::sync::Arc;

use bitcoin::Txid;
use tbv_db::KvStore;
use tbv_primitives::PendingPeginRequest;
use tracing::debug;

use crate::errors::DepositFlowError;

/// Stores [`PendingPeginRequest`]s as JSON under
/// `pegin/<depositor_address>/<pegin_txid>`.
#[derive(Clone)]
pub struct PendingPeginPersister {
    store: Arc<dyn KvStore>,
}

impl std::fmt::Debug for PendingPeginPersister {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingPeginPersister").finish_non_exhaustive()
    }
}

impl PendingPeginPersister {
    /// Wraps a store.
    pub fn new(store: Arc<dyn KvStore>) -> Self {
        Self { store }
    }

    /// Persists the record, replacing any previous version.
    pub async fn save(&self, request: &PendingPeginRequest) -> Result<(), DepositFlowError> {
        let key = request.storage_key();
        let json = serde_json::to_vec(request)
            .map_err(|source| DepositFlowError::CorruptedRecord {
                key: key.clone(),
                source,
            })?;
        self.store.set(&key, &json).await?;
        debug!(%key, status = ?request.local_status, "persisted pending pegin");
        Ok(())
    }

    /// Loads the record for a depositor address and peg-in txid.
    pub async fn load(
        &self,
        depositor_address: &str,
        pegin_txid: &Txid,
    ) -> Result<Option<PendingPeginRequest>, DepositFlowError> {
        let key = PendingPeginRequest::storage_key_for(depositor_address, pegin_txid);
        match self.store.get(&key).await? {
            Some(bytes) => {
                let request = serde_json::from_slice(&bytes)
                    .map_err(|source| DepositFlowError::CorruptedRecord { key, source })?;
                Ok(Some(request))
            }
            None => Ok(None),
        }
    }

    /// All pending records for a depositor address.
    pub async fn list(
        &self,
        depositor_address: &str,
    ) -> Result<Vec<PendingPeginRequest>, DepositFlowError> {
        let prefix = format!("pegin/{depositor_address}/");
        let mut out = Vec::new();
        for (key, bytes) in self.store.scan_prefix(&prefix).await? {
            let request = serde_json::from_slice(&bytes)
                .map_err(|source| DepositFlowError::CorruptedRecord { key, source })?;
            out.push(request);
        }
        Ok(out)
    }

    /// Removes the record once the deposit is fully settled or abandoned.
    pub async fn delete(
        &self,
        depositor_address: &str,
        pegin_txid: &Txid,
    ) -> Result<(), DepositFlowError> {
        let key = PendingPeginRequest::storage_key_for(depositor_address, pegin_txid);
        self.store.delete(&key).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use bitcoin::Amount;
    use tbv_db::MemoryKv;
    use tbv_primitives::{DepositorPubkey, EvmAddress, LocalStatus, VaultId};

    use super::*;

    fn request(vault: &str) -> PendingPeginRequest {
        PendingPeginRequest {
            pegin_txid: Txid::from_str(
                "4a5e1e4baab89f3a32518a88c31bc87f618f76673e2cc77ab2127b7afdeda33b",
            )
            .unwrap(),
            depositor_address: "bc1qdepositor".to_string(),
            depositor_pk: DepositorPubkey("02abc".to_string()),
            vault_id: VaultId(vault.to_string()),
            app_contract_address: EvmAddress("0x1234".to_string()),
            amount: Amount::from_sat(100_000),
            local_status: LocalStatus::Pending,
            unsigned_funding_tx_hex: "0200".to_string(),
            selected_utxos: vec![],
            pop_signature: None,
            registration_tx: None,
            broadcast_txid: None,
        }
    }

    #[tokio::test]
    async fn save_load_roundtrip() {
        let persister = PendingPeginPersister::new(Arc::new(MemoryKv::new()));
        let req = request("vault-1");
        persister.save(&req).await.unwrap();

        let loaded = persister
            .load(&req.depositor_address, &req.pegin_txid)
            .await
            .unwrap();
        assert_eq!(loaded, Some(req));
    }

    #[tokio::test]
    async fn list_scopes_to_the_depositor() {
        let persister = PendingPeginPersister::new(Arc::new(MemoryKv::new()));
        let mine = request("vault-1");
        let mut other = request("vault-2");
        other.depositor_address = "bc1qother".to_string();
        persister.save(&mine).await.unwrap();
        persister.save(&other).await.unwrap();

        let listed = persister.list("bc1qdepositor").await.unwrap();
        assert_eq!(listed, vec![mine]);
    }

    #[tokio::test]
    async fn corrupted_record_is_reported_with_its_key() {
        let store = Arc::new(MemoryKv::new());
        let req = request("vault-1");
        store.set(&req.storage_key(), b"not json").await.unwrap();

        let persister = PendingPeginPersister::new(store);
        let err = persister
            .load(&req.depositor_address, &req.pegin_txid)
            .await
            .unwrap_err();
        assert!(matches!(err, DepositFlowError::CorruptedRecord { .. }));
    }
}
