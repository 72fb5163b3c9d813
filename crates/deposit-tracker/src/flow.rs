//! The deposit flow orchestrator.

use std::{collections::HashMap, sync::Arc};

use bitcoin::{consensus, Amount, FeeRate, OutPoint, Transaction, Txid};
use parking_lot::Mutex;
use tbv_chain::{ChainError, PeginRegistration, RegistrarClient};
use tbv_db::KvStore;
use tbv_keystore::MnemonicVault;
use tbv_lamport::{derive_lamport_keypair_async, VaultContext};
use tbv_poll::{poll_until, PollConfig, PollError};
use tbv_primitives::{
    ContractStatus, DepositorPubkey, EvmAddress, LocalStatus, PendingPeginRequest, VaultId,
};
use tbv_provider::{ProviderError, VaultProviderClient};
use tbv_wallet::{select_utxos, unavailable_deposits, SharedReservations};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::{
    errors::{from_poll, DepositFlowError},
    pegin_persister::PendingPeginPersister,
    traits::{PeginTxBuilder, WalletBackend},
};

/// Parameters for a deposit the user wants to start.
#[derive(Debug, Clone)]
pub struct NewDeposit {
    /// The depositor's wallet address.
    pub depositor_address: String,

    /// The depositor's BTC public key.
    pub depositor_pk: DepositorPubkey,

    /// The vault to deposit into.
    pub vault_id: VaultId,

    /// The application controller contract.
    pub app_contract_address: EvmAddress,

    /// Amount to lock.
    pub amount: Amount,
}

/// Drives deposits through the peg-in protocol.
///
/// Progress commits to the persister after each completed step; a failed
/// step changes nothing, so every public method can be retried. One
/// orchestrator serves all of a depositor's concurrent deposits, which is
/// why the UTXO reservation set lives here rather than per flow.
pub struct DepositFlowOrchestrator<W, B, P, R> {
    wallet: W,
    tx_builder: B,
    provider: P,
    registrar: R,
    persister: PendingPeginPersister,
    keystore: MnemonicVault<Arc<dyn KvStore>>,
    reservations: SharedReservations,
    flows: Mutex<HashMap<Txid, CancellationToken>>,
    fee_rate: FeeRate,
}

impl<W, B, P, R> std::fmt::Debug for DepositFlowOrchestrator<W, B, P, R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DepositFlowOrchestrator")
            .field("fee_rate", &self.fee_rate)
            .finish_non_exhaustive()
    }
}

impl<W, B, P, R> DepositFlowOrchestrator<W, B, P, R>
where
    W: WalletBackend,
    B: PeginTxBuilder,
    P: VaultProviderClient + Sync,
    R: RegistrarClient + Sync,
{
    /// Creates an orchestrator over the given collaborators.
    pub fn new(
        wallet: W,
        tx_builder: B,
        provider: P,
        registrar: R,
        persister: PendingPeginPersister,
        keystore: MnemonicVault<Arc<dyn KvStore>>,
        reservations: SharedReservations,
        fee_rate: FeeRate,
    ) -> Self {
        Self {
            wallet,
            tx_builder,
            provider,
            registrar,
            persister,
            keystore,
            reservations,
            flows: Mutex::new(HashMap::new()),
            fee_rate,
        }
    }

    /// The cancellation token for a peg-in, created on first use.
    fn flow_token(&self, pegin_txid: Txid) -> CancellationToken {
        self.flows.lock().entry(pegin_txid).or_default().clone()
    }

    fn release(&self, outpoints: &[OutPoint]) {
        self.reservations.lock().release_all(outpoints.iter());
    }

    async fn load_required(
        &self,
        depositor_address: &str,
        pegin_txid: &Txid,
    ) -> Result<PendingPeginRequest, DepositFlowError> {
        self.persister
            .load(depositor_address, pegin_txid)
            .await?
            .ok_or(DepositFlowError::NotFound(*pegin_txid))
    }

    /// The message the wallet signs to prove possession of the depositor key.
    pub fn possession_message(deposit: &NewDeposit) -> String {
        format!(
            "tbv:pegin:{}:{}:{}",
            deposit.vault_id, deposit.app_contract_address, deposit.depositor_pk
        )
    }

    /// Signs an intermediate split transaction. Only multi-vault deposits
    /// need this; single-vault deposits skip straight to [`sign_pop`].
    ///
    /// [`sign_pop`]: Self::sign_pop
    pub async fn sign_split_tx(&self, split_tx_hex: &str) -> Result<String, DepositFlowError> {
        Ok(self.wallet.sign_transaction(split_tx_hex).await?)
    }

    /// Has the wallet sign the proof of key possession for the deposit.
    pub async fn sign_pop(&self, deposit: &NewDeposit) -> Result<String, DepositFlowError> {
        let message = Self::possession_message(deposit);
        Ok(self.wallet.sign_message(&message).await?)
    }

    /// Builds and funds the peg-in transaction, persists the pending record
    /// and registers the deposit on the EVM chain.
    ///
    /// Re-running is safe: an unfinished record for the same deposit is
    /// resumed instead of funding a second transaction, and a deposit the
    /// contract already knows is not registered again.
    pub async fn submit_pegin(
        &self,
        deposit: &NewDeposit,
        pop_signature: &str,
        password: &str,
    ) -> Result<PendingPeginRequest, DepositFlowError> {
        let record = match self.find_resumable(deposit).await? {
            Some(existing) => {
                info!(pegin_txid = %existing.pegin_txid, "resuming pending pegin");
                self.reclaim_reservations(&existing)?;
                existing
            }
            None => self.fund_fresh_pegin(deposit, pop_signature).await?,
        };

        self.register_and_confirm(record, password).await
    }

    /// Finds an unfinished record matching this deposit, if any.
    async fn find_resumable(
        &self,
        deposit: &NewDeposit,
    ) -> Result<Option<PendingPeginRequest>, DepositFlowError> {
        let pending = self.persister.list(&deposit.depositor_address).await?;
        Ok(pending.into_iter().find(|r| {
            r.vault_id == deposit.vault_id
                && r.app_contract_address == deposit.app_contract_address
                && r.amount == deposit.amount
                && r.local_status == LocalStatus::Pending
                && r.broadcast_txid.is_none()
        }))
    }

    /// Re-reserves a resumed record's coins, e.g. after a restart emptied
    /// the in-memory reservation set.
    fn reclaim_reservations(
        &self,
        record: &PendingPeginRequest,
    ) -> Result<(), DepositFlowError> {
        let mut reservations = self.reservations.lock();
        reservations.release_all(record.selected_utxos.iter());
        reservations.reserve_all(record.selected_utxos.iter().copied())?;
        Ok(())
    }

    /// Selects and reserves coins, builds and funds the transaction, and
    /// persists the fresh record. Reservations are released again on any
    /// failure before the record is persisted.
    async fn fund_fresh_pegin(
        &self,
        deposit: &NewDeposit,
        pop_signature: &str,
    ) -> Result<PendingPeginRequest, DepositFlowError> {
        let template = self
            .tx_builder
            .build_template(deposit)
            .map_err(DepositFlowError::TxBuild)?;
        let utxos = self.wallet.list_utxos().await?;

        // Snapshot, select and reserve under one lock so a concurrent flow
        // cannot pick the same coins between our selection and reservation.
        let selected = {
            let mut reservations = self.reservations.lock();
            let selected =
                select_utxos(&utxos, &reservations.snapshot(), deposit.amount, self.fee_rate)?;
            reservations.reserve_all(selected.iter().map(|u| u.outpoint))?;
            selected
        };
        let outpoints: Vec<OutPoint> = selected.iter().map(|u| u.outpoint).collect();

        let funded = async {
            let funded_hex = self
                .wallet
                .fund_pegin_template(&template, &selected)
                .await?;
            let tx: Transaction = consensus::encode::deserialize_hex(&funded_hex)
                .map_err(|e| DepositFlowError::InvalidFundingTx(e.to_string()))?;
            Ok::<_, DepositFlowError>((funded_hex, tx.compute_txid()))
        }
        .await;
        let (funded_hex, pegin_txid) = match funded {
            Ok(v) => v,
            Err(err) => {
                self.release(&outpoints);
                return Err(err);
            }
        };

        let record = PendingPeginRequest {
            pegin_txid,
            depositor_address: deposit.depositor_address.clone(),
            depositor_pk: deposit.depositor_pk.clone(),
            vault_id: deposit.vault_id.clone(),
            app_contract_address: deposit.app_contract_address.clone(),
            amount: deposit.amount,
            local_status: LocalStatus::Pending,
            unsigned_funding_tx_hex: funded_hex,
            selected_utxos: outpoints.clone(),
            pop_signature: Some(pop_signature.to_string()),
            registration_tx: None,
            broadcast_txid: None,
        };
        if let Err(err) = self.persister.save(&record).await {
            self.release(&outpoints);
            return Err(err);
        }
        info!(%pegin_txid, inputs = outpoints.len(), "funded pegin transaction");
        Ok(record)
    }

    /// Registers the record on-chain (unless already registered) and waits
    /// for the registration to confirm.
    async fn register_and_confirm(
        &self,
        mut record: PendingPeginRequest,
        password: &str,
    ) -> Result<PendingPeginRequest, DepositFlowError> {
        if self.registrar.is_registered(&record.pegin_txid).await? {
            info!(pegin_txid = %record.pegin_txid, "pegin already registered");
            return Ok(record);
        }

        if record.registration_tx.is_none() {
            let commitment = {
                let seed = self
                    .keystore
                    .seed(&record.depositor_address, password)
                    .await?;
                let ctx = VaultContext::new(
                    record.vault_id.clone(),
                    record.depositor_pk.clone(),
                    record.app_contract_address.clone(),
                );
                let keypair = derive_lamport_keypair_async(&seed, &ctx).await;
                keypair.public().commitment().to_string()
            };
            let registration = PeginRegistration {
                pegin_txid: record.pegin_txid,
                vault_id: record.vault_id.clone(),
                depositor_pk: record.depositor_pk.clone(),
                app_contract_address: record.app_contract_address.clone(),
                amount: record.amount,
                lamport_commitment: commitment,
                proof_of_possession: record.pop_signature.clone().unwrap_or_default(),
            };
            let tx_hash = self.registrar.register_pegin(&registration).await?;
            info!(pegin_txid = %record.pegin_txid, %tx_hash, "submitted pegin registration");
            record.registration_tx = Some(tx_hash);
            self.persister.save(&record).await?;
        }

        if let Some(tx_hash) = record.registration_tx.clone() {
            let cancel = self.flow_token(record.pegin_txid);
            poll_until(PollConfig::evm_confirmation(), &cancel, || {
                let registrar = &self.registrar;
                let tx_hash = tx_hash.clone();
                async move {
                    registrar
                        .registration_confirmed(&tx_hash)
                        .await
                        .map(|confirmed| confirmed.then_some(()))
                }
            })
            .await
            .map_err(|e| from_poll("registration confirmation", e))?;
        }
        Ok(record)
    }

    /// Derives the Lamport keypair for the deposit and submits its public
    /// key to the vault provider. The preimages never leave this call.
    pub async fn submit_lamport_key(
        &self,
        depositor_address: &str,
        pegin_txid: &Txid,
        password: &str,
    ) -> Result<(), DepositFlowError> {
        let record = self.load_required(depositor_address, pegin_txid).await?;
        let seed = self.keystore.seed(depositor_address, password).await?;
        let ctx = VaultContext::new(
            record.vault_id.clone(),
            record.depositor_pk.clone(),
            record.app_contract_address.clone(),
        );
        let keypair = derive_lamport_keypair_async(&seed, &ctx).await;
        self.provider
            .submit_depositor_lamport_key(&record.pegin_txid, &record.depositor_pk, keypair.public())
            .await?;
        info!(%pegin_txid, "submitted lamport public key");
        Ok(())
    }

    /// Waits for the provider's presigned templates, signs them and submits
    /// the signatures. Commits `PayoutSigned` on success.
    pub async fn sign_payouts(
        &self,
        depositor_address: &str,
        pegin_txid: &Txid,
    ) -> Result<(), DepositFlowError> {
        let mut record = self.load_required(depositor_address, pegin_txid).await?;
        let cancel = self.flow_token(record.pegin_txid);

        let bundle = poll_until(PollConfig::payout_readiness(), &cancel, || {
            let provider = &self.provider;
            let txid = record.pegin_txid;
            let pk = record.depositor_pk.clone();
            async move {
                let bundle = provider
                    .request_depositor_presign_transactions(&txid, &pk)
                    .await?;
                Ok(bundle.is_ready().then_some(bundle))
            }
        })
        .await
        .map_err(|e: PollError<ProviderError>| from_poll("payout templates", e))?;

        let signatures = self.wallet.sign_payout_templates(&bundle).await?;
        self.provider
            .submit_signatures(&record.pegin_txid, &record.depositor_pk, &signatures)
            .await?;

        record.local_status = LocalStatus::PayoutSigned;
        self.persister.save(&record).await?;
        info!(%pegin_txid, "payout templates signed and submitted");
        Ok(())
    }

    /// Waits for the contract to report `Verified`, then signs and
    /// broadcasts the funding transaction. Commits `Confirming` and releases
    /// the funding reservations.
    pub async fn broadcast_btc(
        &self,
        depositor_address: &str,
        pegin_txid: &Txid,
    ) -> Result<Txid, DepositFlowError> {
        let mut record = self.load_required(depositor_address, pegin_txid).await?;
        let cancel = self.flow_token(record.pegin_txid);

        poll_until(PollConfig::evm_confirmation(), &cancel, || {
            let registrar = &self.registrar;
            let txid = record.pegin_txid;
            async move {
                let status = registrar.contract_status(&txid).await?;
                Ok((status == ContractStatus::Verified).then_some(()))
            }
        })
        .await
        .map_err(|e: PollError<ChainError>| from_poll("contract verification", e))?;

        let signed = self
            .wallet
            .sign_transaction(&record.unsigned_funding_tx_hex)
            .await?;
        let broadcast_txid = self.wallet.broadcast(&signed).await?;

        record.broadcast_txid = Some(broadcast_txid);
        record.local_status = LocalStatus::Confirming;
        self.persister.save(&record).await?;

        self.release(&record.selected_utxos);
        self.flows.lock().remove(&record.pegin_txid);
        info!(%pegin_txid, %broadcast_txid, "broadcast pegin funding transaction");
        Ok(broadcast_txid)
    }

    /// Resumes a persisted deposit from wherever it left off and drives it
    /// to completion.
    pub async fn run(
        &self,
        depositor_address: &str,
        pegin_txid: &Txid,
        password: &str,
    ) -> Result<(), DepositFlowError> {
        let record = self.load_required(depositor_address, pegin_txid).await?;
        match record.local_status {
            LocalStatus::Pending => {
                self.submit_lamport_key(depositor_address, pegin_txid, password)
                    .await?;
                self.sign_payouts(depositor_address, pegin_txid).await?;
                self.broadcast_btc(depositor_address, pegin_txid).await?;
                Ok(())
            }
            LocalStatus::PayoutSigned => {
                self.broadcast_btc(depositor_address, pegin_txid).await?;
                Ok(())
            }
            LocalStatus::Confirming => Ok(()),
        }
    }

    /// Cancels any in-flight wait for the deposit and releases its funding
    /// reservations. The persisted record stays; `run` can pick the deposit
    /// back up later.
    pub async fn abort(
        &self,
        depositor_address: &str,
        pegin_txid: &Txid,
    ) -> Result<(), DepositFlowError> {
        if let Some(token) = self.flows.lock().remove(pegin_txid) {
            token.cancel();
        }
        if let Some(record) = self.persister.load(depositor_address, pegin_txid).await? {
            self.release(&record.selected_utxos);
        }
        warn!(%pegin_txid, "deposit flow aborted");
        Ok(())
    }

    /// Reports deposits whose funding coins are no longer spendable by
    /// anything other than our own broadcast. Read-only; records are never
    /// mutated here.
    pub async fn scan_unavailable(
        &self,
        depositor_address: &str,
    ) -> Result<Vec<Txid>, DepositFlowError> {
        let pending = self.persister.list(depositor_address).await?;
        let available = self
            .wallet
            .list_utxos()
            .await?
            .iter()
            .map(|u| u.outpoint)
            .collect();
        let broadcasted = self.wallet.broadcasted_txids().await?;
        Ok(unavailable_deposits(&pending, &available, &broadcasted))
    }
}
