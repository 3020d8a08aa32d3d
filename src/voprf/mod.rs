//! Single-keypair token engine without a metadata bit
//!
//! The issuer holds one secret scalar and evaluates each blinded point
//! under it. Redemption recomputes the evaluation and compares; there is
//! nothing hidden in the token beyond its unlinkability.

pub mod keys;
pub mod tokens;

pub use keys::{ClientKey, IssuerKey};
pub use tokens::{blind, read, sign, unblind, PreToken, Token, NONCE_LEN};
