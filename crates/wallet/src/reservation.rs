//! Cross-deposit UTXO reservations.

use std::{collections::BTreeSet, sync::Arc};

use bitcoin::OutPoint;
use parking_lot::Mutex;
use tracing::debug;

/// Handle to a reservation set shared between concurrent deposit flows.
///
/// The mutex scopes reserve/release to a single critical section, so two
/// flows interleaving their awaits can never both claim the same coin.
pub type SharedReservations = Arc<Mutex<ReservationSet>>;

/// Error returned when a reservation would double-book a UTXO.
#[derive(Debug, Clone, thiserror::Error)]
#[error("utxo {0} is already reserved by another deposit")]
pub struct ReserveError(pub OutPoint);

/// The set of outpoints currently allocated to in-flight deposits.
///
/// Invariant: an outpoint is held by at most one deposit at a time. Mirrors
/// how an operator wallet leases funding outpoints while a transaction that
/// spends them is in flight.
#[derive(Debug, Default)]
pub struct ReservationSet {
    reserved: BTreeSet<OutPoint>,
}

impl ReservationSet {
    /// Creates an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the outpoint is currently held by a deposit.
    pub fn is_reserved(&self, outpoint: &OutPoint) -> bool {
        self.reserved.contains(outpoint)
    }

    /// A copy of the currently reserved outpoints, for feeding the selector.
    pub fn snapshot(&self) -> BTreeSet<OutPoint> {
        self.reserved.clone()
    }

    /// Reserves every outpoint, or none of them if any is already held.
    pub fn reserve_all(
        &mut self,
        outpoints: impl IntoIterator<Item = OutPoint>,
    ) -> Result<(), ReserveError> {
        let outpoints: Vec<OutPoint> = outpoints.into_iter().collect();
        if let Some(conflict) = outpoints.iter().find(|o| self.reserved.contains(o)) {
            return Err(ReserveError(*conflict));
        }
        for outpoint in &outpoints {
            self.reserved.insert(*outpoint);
        }
        debug!(count = outpoints.len(), "reserved funding outpoints");
        Ok(())
    }

    /// Releases the outpoints on deposit completion or abandonment.
    ///
    /// Releasing an outpoint that is not held is a no-op, so release is safe
    /// to call from both the success and the abort path.
    pub fn release_all<'a>(&mut self, outpoints: impl IntoIterator<Item = &'a OutPoint>) {
        for outpoint in outpoints {
            self.reserved.remove(outpoint);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use bitcoin::Txid;

    use super::*;

    fn outpoint(vout: u32) -> OutPoint {
        let txid = Txid::from_str(
            "4a5e1e4baab89f3a32518a88c31bc87f618f76673e2cc77ab2127b7afdeda33b",
        )
        .unwrap();
        OutPoint { txid, vout }
    }

    #[test]
    fn reserve_then_release() {
        let mut set = ReservationSet::new();
        set.reserve_all([outpoint(0), outpoint(1)]).unwrap();
        assert!(set.is_reserved(&outpoint(0)));

        set.release_all(&[outpoint(0), outpoint(1)]);
        assert!(!set.is_reserved(&outpoint(0)));
        assert!(!set.is_reserved(&outpoint(1)));
    }

    #[test]
    fn conflicting_reservation_is_all_or_nothing() {
        let mut set = ReservationSet::new();
        set.reserve_all([outpoint(1)]).unwrap();

        let err = set.reserve_all([outpoint(0), outpoint(1)]).unwrap_err();
        assert_eq!(err.0, outpoint(1));
        // The non-conflicting outpoint must not have been taken.
        assert!(!set.is_reserved(&outpoint(0)));
    }

    #[test]
    fn releasing_unknown_outpoints_is_a_noop() {
        let mut set = ReservationSet::new();
        set.release_all(&[outpoint(9)]);
        assert!(!set.is_reserved(&outpoint(9)));
    }
}
