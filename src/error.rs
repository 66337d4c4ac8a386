use thiserror::Error;

use crate::events::Channel;

/// Failures inside one scheduling tick. None of these is fatal: the gateway logs
/// the error, emits the matching outcome event and tries again on the next due
/// tick.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RelayError {
    /// The peripheral produced no terminator (`OK`, `ERROR`, `>`) before the deadline.
    #[error("no response to {command:?} within the deadline")]
    TransactionTimeout { command: String },

    /// A radio frame could not be decoded into a reading.
    #[error("malformed sensor frame: {0}")]
    DecodeFailure(String),

    /// The liveness probe did not answer `OK`.
    #[error("modem did not answer the liveness probe")]
    PeripheralFaulted,

    /// A relay step answered, but without the expected token.
    #[error("{channel} send aborted at {step}: expected {expected:?}")]
    SendAborted {
        channel: Channel,
        step: &'static str,
        expected: &'static str,
    },
}

/// Conditions that stop the gateway.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// The radio front-end could not be brought up; the gateway cannot receive
    /// anything and must not loop silently.
    #[error("radio initialization failed: {0}")]
    InitFatal(#[from] crate::radio::RadioError),
}
