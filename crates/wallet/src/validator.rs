//! Detects pending deposits whose funding inputs were spent out from under
//! them.

use std::collections::HashSet;

use bitcoin::{OutPoint, Txid};
use tbv_primitives::PendingPeginRequest;
use tracing::warn;

/// Returns the peg-in txids of deposits whose funding inputs are no longer
/// fully present in the wallet's available UTXO set.
///
/// `pending` should contain the deposits still awaiting broadcast. A missing
/// input only means trouble if the deposit's own transaction is not the
/// spender: when the deposit's txid appears in `broadcasted`, its inputs were
/// consumed by its own broadcast and the deposit is simply confirming. Pure
/// and idempotent, suitable for a fixed polling cadence or on-demand runs;
/// it reports and never mutates the records.
pub fn unavailable_deposits<'a>(
    pending: impl IntoIterator<Item = &'a PendingPeginRequest>,
    available: &HashSet<OutPoint>,
    broadcasted: &HashSet<Txid>,
) -> Vec<Txid> {
    pending
        .into_iter()
        .filter(|request| {
            let input_missing = request
                .selected_utxos
                .iter()
                .any(|outpoint| !available.contains(outpoint));
            let spent_by_competitor =
                input_missing && !broadcasted.contains(&request.pegin_txid);
            if spent_by_competitor {
                warn!(pegin_txid = %request.pegin_txid, "funding input spent by another transaction");
            }
            spent_by_competitor
        })
        .map(|request| request.pegin_txid)
        .collect()
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use bitcoin::Amount;
    use tbv_primitives::{DepositorPubkey, EvmAddress, LocalStatus, VaultId};

    use super::*;

    fn txid(which: char) -> Txid {
        Txid::from_str(&which.to_string().repeat(64)).unwrap()
    }

    fn outpoint(which: char, vout: u32) -> OutPoint {
        OutPoint {
            txid: txid(which),
            vout,
        }
    }

    fn request(pegin: char, inputs: &[OutPoint]) -> PendingPeginRequest {
        PendingPeginRequest {
            pegin_txid: txid(pegin),
            depositor_address: "bc1qdepositor".to_string(),
            depositor_pk: DepositorPubkey("02abc".to_string()),
            vault_id: VaultId("vault-1".to_string()),
            app_contract_address: EvmAddress("0x1234".to_string()),
            amount: Amount::from_sat(100_000),
            local_status: LocalStatus::Pending,
            unsigned_funding_tx_hex: "0200".to_string(),
            selected_utxos: inputs.to_vec(),
            pop_signature: None,
            registration_tx: None,
            broadcast_txid: None,
        }
    }

    #[test]
    fn missing_input_without_own_broadcast_is_flagged() {
        let deposit = request('a', &[outpoint('b', 0), outpoint('b', 1)]);
        // Only one of the two inputs is still available.
        let available: HashSet<OutPoint> = [outpoint('b', 1)].into();
        let broadcasted = HashSet::new();

        let flagged = unavailable_deposits([&deposit], &available, &broadcasted);
        assert_eq!(flagged, vec![txid('a')]);
    }

    #[test]
    fn own_broadcast_consuming_inputs_is_not_flagged() {
        let deposit = request('a', &[outpoint('b', 0)]);
        let available = HashSet::new();
        let broadcasted: HashSet<Txid> = [txid('a')].into();

        let flagged = unavailable_deposits([&deposit], &available, &broadcasted);
        assert!(flagged.is_empty());
    }

    #[test]
    fn fully_available_inputs_are_not_flagged() {
        let deposit = request('a', &[outpoint('b', 0), outpoint('b', 1)]);
        let available: HashSet<OutPoint> = [outpoint('b', 0), outpoint('b', 1)].into();
        let broadcasted = HashSet::new();

        let flagged = unavailable_deposits([&deposit], &available, &broadcasted);
        assert!(flagged.is_empty());
    }

    #[test]
    fn only_the_affected_deposit_is_reported() {
        let starved = request('a', &[outpoint('c', 0)]);
        let healthy = request('b', &[outpoint('c', 1)]);
        let available: HashSet<OutPoint> = [outpoint('c', 1)].into();
        let broadcasted = HashSet::new();

        let flagged = unavailable_deposits([&starved, &healthy], &available, &broadcasted);
        assert_eq!(flagged, vec![txid('a')]);
    }
}
