//! UTXO selection, reservation and liveness checking for deposit funding.
//!
//! The depositor's wallet is external; this crate works on the UTXO listings
//! it reports. Selection is a pure function, the [`ReservationSet`] is the
//! one piece of cross-deposit shared mutable state, and the validator is a
//! pure report over pending deposits; it never mutates records.

pub mod reservation;
pub mod selector;
pub mod validator;

pub use reservation::{ReservationSet, ReserveError, SharedReservations};
pub use selector::{estimate_fee, select_utxos, SelectionError};
pub use validator::unavailable_deposits;
