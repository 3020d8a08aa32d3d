//! Error taxonomy for the token protocols
//!
//! Every failure is reported as one coarse category. Verification failures in
//! particular never carry a sub-reason: a caller (or an attacker relaying
//! errors) must not be able to tell which proof branch or which batch entry
//! was the one that failed.

use snafu::Snafu;

/// Errors surfaced by the protocol layer.
#[derive(Debug, Snafu, Clone, Copy, PartialEq, Eq)]
pub enum TokenError {
    /// Truncated or malformed wire input, unexpected trailing bytes, or an
    /// attempt to encode the point at infinity.
    #[snafu(display("malformed or truncated wire input"))]
    DecodeFailure,

    /// A key or point from a different protocol variant than expected.
    #[snafu(display("key does not belong to the expected protocol variant"))]
    GroupMismatch,

    /// Batched DLEQ/DLEQOR2 verification failed.
    #[snafu(display("batched proof verification failed"))]
    InvalidProof,

    /// Redemption-time validity point mismatch.
    #[snafu(display("token failed the validity check"))]
    BadValidityCheck,

    /// RNG exhaustion or key derivation failure.
    #[snafu(display("key generation or derivation failed"))]
    KeygenFailure,

    /// A caller-owned output buffer is too small for the encoding.
    #[snafu(display("output buffer too small"))]
    BufferTooSmall,
}

pub type Result<T> = core::result::Result<T, TokenError>;
