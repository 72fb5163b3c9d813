//! Pure decision table mapping deposit state to a displayable peg-in state.
//!
//! [`pegin_state`] is the single entry point. It is total (every
//! combination of contract status, local status and flags maps to a defined
//! state) and pure: no I/O, no hidden state, nothing stored. The surfaces
//! above recompute it whenever any input changes.

use tbv_primitives::{ContractStatus, LocalStatus};

/// The one action (if any) the depositor may take right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeginAction {
    /// Submit the one-time Lamport public key to the vault provider.
    SubmitLamportKey,

    /// Sign the provider's presigned payout transaction templates.
    SignPayoutTransactions,

    /// Sign the funding transaction and broadcast it to Bitcoin.
    SignAndBroadcastToBitcoin,

    /// Redeem the deposit out of the vault.
    Redeem,
}

/// Visual weight of a displayed state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateVariant {
    /// Nothing notable; no action available.
    Neutral,

    /// Progress information; the flow is advancing on its own.
    Info,

    /// Something needs attention before the deposit can proceed.
    Warning,
}

/// Inputs to the decision table beyond the two status enums.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PeginFlags {
    /// The vault provider has produced complete presigned payout templates.
    pub transactions_ready: bool,

    /// The deposit is currently backing an active vault position.
    pub is_in_use: bool,

    /// A selected funding input disappeared from the wallet's UTXO set.
    pub utxo_unavailable: bool,

    /// The viewing wallet is the depositor that owns this vault.
    pub owned: bool,

    /// The vault provider is waiting for the Lamport public key submission.
    pub needs_lamport_key: bool,
}

impl Default for PeginFlags {
    fn default() -> Self {
        Self {
            transactions_ready: false,
            is_in_use: false,
            utxo_unavailable: false,
            owned: true,
            needs_lamport_key: false,
        }
    }
}

/// A displayable peg-in state with its permitted action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PeginState {
    /// Short display label.
    pub label: &'static str,

    /// Visual weight.
    pub variant: StateVariant,

    /// One-line explanation of the state.
    pub message: &'static str,

    /// The primary action, when one is permitted.
    pub action: Option<PeginAction>,
}

impl PeginState {
    const fn action(label: &'static str, message: &'static str, action: PeginAction) -> Self {
        Self {
            label,
            variant: StateVariant::Info,
            message,
            action: Some(action),
        }
    }

    const fn info(label: &'static str, message: &'static str) -> Self {
        Self {
            label,
            variant: StateVariant::Info,
            message,
            action: None,
        }
    }

    const fn warning(label: &'static str, message: &'static str) -> Self {
        Self {
            label,
            variant: StateVariant::Warning,
            message,
            action: None,
        }
    }

    const fn neutral() -> Self {
        Self {
            label: "No action",
            variant: StateVariant::Neutral,
            message: "Nothing to do for this deposit right now",
            action: None,
        }
    }
}

/// Computes the displayable state for a deposit.
///
/// Evaluation is priority-ordered: safety blocks first (spent inputs,
/// foreign vaults), then protocol actions in flow order, then informational
/// states. Unrecognized combinations, including contract statuses this
/// client does not know, fall through to the neutral state rather than
/// failing.
pub fn pegin_state(
    contract_status: &ContractStatus,
    local_status: LocalStatus,
    flags: PeginFlags,
) -> PeginState {
    // Safety first: never offer an action on a deposit whose inputs are gone
    // or that belongs to someone else.
    if flags.utxo_unavailable {
        return PeginState::warning(
            "Inputs unavailable",
            "A selected funding input was spent by another transaction",
        );
    }
    if !flags.owned {
        return PeginState::warning(
            "Not your vault",
            "This deposit belongs to a different depositor key",
        );
    }

    if flags.needs_lamport_key {
        return PeginState::action(
            "Authentication required",
            "The vault provider is waiting for your one-time key",
            PeginAction::SubmitLamportKey,
        );
    }

    if *contract_status == ContractStatus::Pending && local_status != LocalStatus::PayoutSigned {
        return if flags.transactions_ready {
            PeginState::action(
                "Signature required",
                "Presigned payout transactions are ready to sign",
                PeginAction::SignPayoutTransactions,
            )
        } else {
            PeginState::info(
                "Preparing",
                "Awaiting presigned transactions from the vault provider",
            )
        };
    }

    if *contract_status == ContractStatus::Verified && local_status != LocalStatus::Confirming {
        return PeginState::action(
            "Ready to fund",
            "The contract verified the deposit; broadcast the funding transaction",
            PeginAction::SignAndBroadcastToBitcoin,
        );
    }

    if local_status == LocalStatus::Confirming {
        return PeginState::info("Confirming", "The funding transaction is confirming on Bitcoin");
    }

    if *contract_status == ContractStatus::Verified && !flags.is_in_use {
        return PeginState::action(
            "Redeemable",
            "This deposit is no longer in use and can be redeemed",
            PeginAction::Redeem,
        );
    }

    PeginState::neutral()
}
