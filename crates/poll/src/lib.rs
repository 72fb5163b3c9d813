//! Resilient polling primitive for the deposit flow.
//!
//! Everything in the peg-in protocol that waits on a remote party (EVM
//! confirmations, the vault provider indexing a deposit, payout templates
//! becoming available) goes through [`poll_until`]. The engine knows nothing
//! about the remote parties themselves: errors arrive already classified as
//! transient or terminal through the [`Classify`] trait, which the adapter
//! crates implement at the single boundary that talks to each service.

use std::{future::Future, time::Duration};

use tokio::time::{sleep, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

/// Classification of an error raised by a poll probe.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum ErrorClass {
    /// The remote party has not finished processing yet; retry after the
    /// configured interval.
    Transient,

    /// The operation cannot succeed as constructed; stop immediately even if
    /// timeout budget remains.
    Terminal,
}

/// Trait for errors that carry their own retry classification.
///
/// Implemented by the adapter error types (vault provider, registrar) so that
/// message string matching never leaks into this engine.
pub trait Classify {
    /// Returns the retry classification for this error.
    fn class(&self) -> ErrorClass;
}

/// Interval/timeout configuration for a single [`poll_until`] call.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct PollConfig {
    /// Delay between probe invocations.
    pub interval: Duration,

    /// Overall wall-clock budget, independent of how many retries occur.
    pub timeout: Duration,
}

impl PollConfig {
    /// Creates a new config from an interval and an overall timeout.
    pub const fn new(interval: Duration, timeout: Duration) -> Self {
        Self { interval, timeout }
    }

    /// Preset for waiting on an EVM transaction confirmation.
    pub const fn evm_confirmation() -> Self {
        Self::new(Duration::from_secs(5), Duration::from_secs(120))
    }

    /// Preset for waiting on the vault provider to produce presigned payout
    /// transaction templates. The provider runs a deep presigning pipeline,
    /// hence the generous budget.
    pub const fn payout_readiness() -> Self {
        Self::new(Duration::from_secs(10), Duration::from_secs(20 * 60))
    }
}

/// Failure modes of [`poll_until`].
#[derive(Debug, thiserror::Error)]
pub enum PollError<E> {
    /// The wall-clock budget elapsed. Carries the last transient error
    /// observed, if any, so callers can report what the remote party last
    /// said.
    #[error("poll timed out after {timeout:?}")]
    Timeout {
        /// The configured timeout that elapsed.
        timeout: Duration,

        /// The last transient error seen before the deadline, if any.
        last: Option<E>,
    },

    /// The probe raised a terminal error; no retries were attempted after it.
    #[error("poll aborted: {0}")]
    Fatal(E),

    /// The cancellation token fired.
    #[error("poll cancelled")]
    Cancelled,
}

/// Repeatedly invokes `probe` until it yields a value, a terminal error, the
/// timeout elapses or the token is cancelled.
///
/// The probe returns `Ok(Some(v))` to resolve, `Ok(None)` for "not yet", or
/// an error which is dispatched on its [`Classify`] implementation: transient
/// errors are remembered and retried after `cfg.interval`, terminal errors
/// abort immediately as [`PollError::Fatal`].
///
/// Cancellation is checked before every probe invocation and raced against
/// every sleep, so an aborted deposit flow never sits out a full interval.
pub async fn poll_until<T, E, F, Fut>(
    cfg: PollConfig,
    cancel: &CancellationToken,
    mut probe: F,
) -> Result<T, PollError<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Option<T>, E>>,
    E: Classify,
{
    let deadline = Instant::now() + cfg.timeout;
    let mut last = None;

    loop {
        if cancel.is_cancelled() {
            return Err(PollError::Cancelled);
        }

        match probe().await {
            Ok(Some(value)) => return Ok(value),
            Ok(None) => trace!("probe not ready yet"),
            Err(err) => match err.class() {
                ErrorClass::Transient => {
                    trace!("probe raised a transient error, will retry");
                    last = Some(err);
                }
                ErrorClass::Terminal => return Err(PollError::Fatal(err)),
            },
        }

        // Sleeping past the deadline cannot produce a result, so fail now.
        if Instant::now() + cfg.interval > deadline {
            debug!(timeout = ?cfg.timeout, "poll budget exhausted");
            return Err(PollError::Timeout {
                timeout: cfg.timeout,
                last,
            });
        }

        tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(PollError::Cancelled),
            _ = sleep(cfg.interval) => {}
        }
    }
}
