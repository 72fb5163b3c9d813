//! Orchestration of the depositor's peg-in flow.
//!
//! Drives a deposit from "the user wants to lock this amount" all the way to
//! a broadcast Bitcoin funding transaction, committing progress to the
//! key/value store after each completed step. Every external party (the
//! depositor's wallet, the Taproot transaction builder, the vault provider
//! and the EVM registrar) sits behind a trait so the flow logic is testable
//! without any of them.

pub mod errors;
pub mod flow;
pub mod pegin_persister;
pub mod traits;

pub use errors::DepositFlowError;
pub use flow::{DepositFlowOrchestrator, NewDeposit};
pub use pegin_persister::PendingPeginPersister;
pub use traits::{PeginTxBuilder, WalletBackend, WalletError};
