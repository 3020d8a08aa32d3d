//! Dual-keypair token engine carrying one private metadata bit
//!
//! The issuer publishes three keypair commitments (`pub0`, `pub1` and the
//! validity key `pubs`) and signs each batch with either keypair 0 or
//! keypair 1. Which one was used is hidden from the client by an OR-proof
//! and only recoverable by the issuer at redemption time.

pub mod keys;
pub mod tokens;

pub use keys::{ClientKey, IssuerKey};
pub use tokens::{blind, read, sign, unblind, PreToken, Token, NONCE_LEN};
