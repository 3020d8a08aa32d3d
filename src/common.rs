//! Common helpers used by both protocol engines

use p256::{elliptic_curve::sec1::ToEncodedPoint, NonZeroScalar, ProjectivePoint, Scalar};
use rand_core::CryptoRngCore;

/// Width of the client nonce salt and of the issuer's per-token salt.
pub const NONCE_LEN: usize = 32;

/// Fill some bytes with random data from the given CSPRNG.
pub(crate) fn fill_bytes<R: CryptoRngCore>(rng: &mut R, bytes: &mut [u8]) {
    rng.fill_bytes(bytes);
}

/// Sample a uniformly random nonzero scalar.
///
/// A sampled zero is resampled internally and never observed by callers;
/// blinding factors and proof commitments must be invertible.
pub(crate) fn random_nonzero_scalar<R: CryptoRngCore>(rng: &mut R) -> Scalar {
    *NonZeroScalar::random(rng).as_ref()
}

/// Canonical byte string for a point inside hashes and transcripts.
///
/// Always uncompressed SEC1, independent of the variant's wire format, so
/// that issuer and client hash identical bytes. The point at infinity
/// encodes as its single-byte SEC1 form; transcripts may contain it (a
/// combined batch point can be the identity), the wire codec may not.
pub(crate) fn point_bytes(point: &ProjectivePoint) -> Vec<u8> {
    point.to_affine().to_encoded_point(false).as_bytes().to_vec()
}
