//! Wire types for the vault-provider RPC.

use serde::{Deserialize, Serialize};

/// A transaction template as shipped by the provider: raw hex, possibly
/// empty while the presigning pipeline is still working.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxTemplate {
    /// Raw transaction hex; empty until the provider has produced it.
    pub tx_hex: String,
}

/// One claim/payout template pair.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresignEntry {
    /// The claim transaction template.
    pub claim_tx: TxTemplate,

    /// The payout transaction template.
    pub payout_tx: TxTemplate,
}

impl PresignEntry {
    /// Whether both halves of the pair have been produced.
    pub fn is_complete(&self) -> bool {
        !self.claim_tx.tx_hex.is_empty() && !self.payout_tx.tx_hex.is_empty()
    }
}

/// The full set of presign template pairs for a deposit.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresignBundle {
    /// Template pairs, one per payout path.
    pub txs: Vec<PresignEntry>,
}

impl PresignBundle {
    /// Ready iff the bundle is non-empty and every entry has non-empty hex
    /// for both the claim and the payout transaction.
    pub fn is_ready(&self) -> bool {
        !self.txs.is_empty() && self.txs.iter().all(PresignEntry::is_complete)
    }
}

/// The depositor's signature over one template pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayoutSignature {
    /// Schnorr signature over the claim template, hex-encoded.
    pub claim_sig: String,

    /// Schnorr signature over the payout template, hex-encoded.
    pub payout_sig: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(claim: &str, payout: &str) -> PresignEntry {
        PresignEntry {
            claim_tx: TxTemplate {
                tx_hex: claim.to_string(),
            },
            payout_tx: TxTemplate {
                tx_hex: payout.to_string(),
            },
        }
    }

    #[test]
    fn empty_bundle_is_not_ready() {
        assert!(!PresignBundle::default().is_ready());
    }

    #[test]
    fn bundle_with_a_missing_half_is_not_ready() {
        let bundle = PresignBundle {
            txs: vec![entry("0200", "0200"), entry("0200", "")],
        };
        assert!(!bundle.is_ready());
    }

    #[test]
    fn complete_bundle_is_ready() {
        let bundle = PresignBundle {
            txs: vec![entry("0200", "0200"), entry("0201", "0201")],
        };
        assert!(bundle.is_ready());
    }

    #[test]
    fn bundle_deserializes_from_provider_shape() {
        let json = r#"{"txs":[{"claim_tx":{"tx_hex":"02"},"payout_tx":{"tx_hex":""}}]}"#;
        let bundle: PresignBundle = serde_json::from_str(json).unwrap();
        assert_eq!(bundle.txs.len(), 1);
        assert!(!bundle.is_ready());
    }
}
