//! Chain-side error taxonomy and revert decoding.

use tbv_poll::{Classify, ErrorClass};

/// Solidity `Error(string)` selector, the first four bytes of
/// `keccak256("Error(string)")`.
const ERROR_STRING_SELECTOR: [u8; 4] = [0x08, 0xc3, 0x79, 0xa0];

/// Errors from the registration chain.
#[derive(Debug, thiserror::Error)]
pub enum ChainError {
    /// The RPC endpoint failed or the request never completed. Retryable.
    #[error("chain rpc error: {0}")]
    Rpc(String),

    /// The transaction executed and reverted. The contract has rejected the
    /// registration; retrying the same call cannot succeed.
    #[error("transaction reverted: {reason}")]
    Reverted {
        /// Decoded revert reason, or a hex dump when undecodable.
        reason: String,
    },

    /// The node refused the transaction for an underpriced gas setting.
    /// Surfaced immediately; re-submitting the identical transaction cannot
    /// succeed, the caller must re-price first.
    #[error("gas price too low: {0}")]
    GasTooLow(String),

    /// Another transaction with the same nonce is in flight. Surfaced
    /// immediately; the caller must resolve the competing transaction
    /// before submitting again.
    #[error("nonce conflict: {0}")]
    NonceConflict(String),
}

impl Classify for ChainError {
    fn class(&self) -> ErrorClass {
        match self {
            Self::Rpc(_) => ErrorClass::Transient,
            Self::Reverted { .. } | Self::GasTooLow(_) | Self::NonceConflict(_) => {
                ErrorClass::Terminal
            }
        }
    }
}

/// Decodes a standard `Error(string)` revert payload into its message.
///
/// Accepts the raw return data with or without a `0x` prefix. Returns `None`
/// when the payload is not a well-formed `Error(string)` encoding; callers
/// fall back to reporting the hex as-is.
pub fn decode_revert(data: &str) -> Option<String> {
    let raw = hex::decode(data.strip_prefix("0x").unwrap_or(data)).ok()?;
    if raw.len() < 4 + 32 + 32 || raw[..4] != ERROR_STRING_SELECTOR {
        return None;
    }

    // ABI layout after the selector: a 32-byte offset word, then a 32-byte
    // length word at that offset, then the UTF-8 bytes.
    let offset = abi_word_as_usize(&raw[4..36])?;
    let len_start = 4usize.checked_add(offset)?;
    let len_end = len_start.checked_add(32)?;
    let len = abi_word_as_usize(raw.get(len_start..len_end)?)?;
    let msg_end = len_end.checked_add(len)?;
    let msg = raw.get(len_end..msg_end)?;
    String::from_utf8(msg.to_vec()).ok()
}

fn abi_word_as_usize(word: &[u8]) -> Option<usize> {
    if word.len() != 32 || word[..24].iter().any(|b| *b != 0) {
        return None;
    }
    let mut buf = [0u8; 8];
    buf.copy_from_slice(&word[24..]);
    usize::try_from(u64::from_be_bytes(buf)).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    // Error("vault: already registered") as emitted by solc.
    fn encode_error_string(msg: &str) -> String {
        let mut out = Vec::new();
        out.extend_from_slice(&ERROR_STRING_SELECTOR);
        let mut offset = [0u8; 32];
        offset[31] = 0x20;
        out.extend_from_slice(&offset);
        let mut len = [0u8; 32];
        len[24..].copy_from_slice(&(msg.len() as u64).to_be_bytes());
        out.extend_from_slice(&len);
        out.extend_from_slice(msg.as_bytes());
        // solc pads the string to a 32-byte boundary.
        let pad = (32 - msg.len() % 32) % 32;
        out.extend_from_slice(&vec![0u8; pad]);
        hex::encode(out)
    }

    #[test]
    fn decodes_standard_revert_reason() {
        let data = encode_error_string("vault: already registered");
        assert_eq!(
            decode_revert(&data).as_deref(),
            Some("vault: already registered")
        );
    }

    #[test]
    fn accepts_0x_prefix() {
        let data = format!("0x{}", encode_error_string("nope"));
        assert_eq!(decode_revert(&data).as_deref(), Some("nope"));
    }

    #[test]
    fn rejects_wrong_selector() {
        let mut data = encode_error_string("nope");
        data.replace_range(..8, "deadbeef");
        assert_eq!(decode_revert(&data), None);
    }

    #[test]
    fn rejects_truncated_payload() {
        let data = encode_error_string("a long enough revert message");
        assert_eq!(decode_revert(&data[..data.len() - 16]), None);
    }

    #[test]
    fn rejects_non_hex() {
        assert_eq!(decode_revert("0xzz"), None);
    }

    #[test]
    fn rpc_errors_are_transient() {
        assert_eq!(
            ChainError::Rpc("connection reset".into()).class(),
            ErrorClass::Transient
        );
    }

    #[test]
    fn submission_rejections_abort_instead_of_retrying() {
        // Re-submitting the same transaction cannot fix any of these; a
        // poll loop must not burn its budget on them.
        let errors = [
            ChainError::Reverted {
                reason: "vault: already registered".into(),
            },
            ChainError::GasTooLow("underpriced".into()),
            ChainError::NonceConflict("nonce too low".into()),
        ];
        for err in errors {
            assert_eq!(err.class(), ErrorClass::Terminal);
        }
    }
}
