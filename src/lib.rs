//! # Anonymous tokens with a private metadata bit
//!
//! Blind-token issuance and redemption over NIST P-256. A client asks the
//! issuer to sign blinded points; after unblinding, the resulting tokens
//! are unlinkable to the issuance session. In the dual-keypair variant the
//! issuer additionally embeds one hidden bit per batch, recoverable only by
//! the issuer at redemption time.
//!
//! ```
//!     use atpmb::protocol::{Protocol, Variant};
//!     use atpmb::pmb;
//!
//!     let protocol = Protocol::new(Variant::PmbP256Sha256);
//!     let mut rng = rand_core::OsRng;
//!
//!     // Issuer side: a key with caller-assigned id 1.
//!     let issuer_key = pmb::IssuerKey::generate(&protocol, 1, &mut rng);
//!     // Client side: the public half.
//!     let client_key = issuer_key.client_key().clone();
//!
//!     // The client blinds three token requests.
//!     let (pretokens, request) = pmb::blind(&protocol, 3, None, &mut rng).unwrap();
//!
//!     // The issuer signs them with a hidden metadata bit.
//!     let response = pmb::sign(&protocol, &issuer_key, &request, 3, true, &mut rng).unwrap();
//!
//!     // The client verifies the batch proofs and unblinds.
//!     let tokens = pmb::unblind(&protocol, &client_key, &pretokens, &response).unwrap();
//!     assert_eq!(tokens.len(), 3);
//!
//!     // Later, the issuer redeems a token and recovers the bit.
//!     let (_nonce, bit) = pmb::read(&protocol, &issuer_key, &tokens[0], None).unwrap();
//!     assert!(bit);
//! ```
//!
//! ## Without the metadata bit
//!
//! The single-keypair variant in [`voprf`] has the same blind/sign/unblind
//! shape with one secret scalar and no bit; [`voprf::read`] returns only
//! the token nonce.

pub mod errors;
pub mod hash2curve;
pub mod pmb;
pub mod protocol;
pub mod registry;
pub mod voprf;

pub(crate) mod common;
pub(crate) mod dleq;
pub(crate) mod wire;

pub use errors::{Result, TokenError};
pub use protocol::{Protocol, Variant};
pub use registry::{ClientKeyRing, IssuerKeyRing};
