//! Hashing arbitrary byte strings to curve points and scalars
//!
//! Implements the XMD expander, hash-to-field and the simplified SWU map for
//! P-256/SHA-256 following RFC 9380, on top of the field arithmetic exposed
//! by the group adapter. The map never divides in variable time and selects
//! its square-root candidate through a constant-time mask rather than a
//! branch.
//!
//! Every entry point takes a non-empty domain-separation tag; distinct tags
//! give unlinkable oracles over the same message.

use p256::{
    elliptic_curve::{
        sec1::FromEncodedPoint,
        subtle::{Choice, ConditionallySelectable, ConstantTimeEq},
        PrimeField,
    },
    AffinePoint, EncodedPoint, FieldElement, ProjectivePoint, Scalar,
};
use sha2::{Digest, Sha256};

use crate::errors::{Result, TokenError};

const DIGEST_LEN: usize = 32;
const BLOCK_LEN: usize = 64;
/// Expansion length per field element: ceil((256 + 128) / 8).
const FIELD_EXPAND_LEN: usize = 48;
/// Prefix hashed in front of an oversized domain-separation tag.
const OVERSIZE_DST_PREFIX: &[u8] = b"H2C-OVERSIZE-DST-";

/// (p - 3) / 4 as little-endian 64-bit limbs, the exponent of the
/// constant-time square root for p = 3 mod 4.
const SSWU_C1: [u64; 4] = [
    0xffff_ffff_ffff_ffff,
    0x0000_0000_3fff_ffff,
    0x4000_0000_0000_0000,
    0x3fff_ffff_c000_0000,
];

/// Curve coefficient b of P-256.
const CURVE_B: [u8; 32] = [
    0x5a, 0xc6, 0x35, 0xd8, 0xaa, 0x3a, 0x93, 0xe7, 0xb3, 0xeb, 0xbd, 0x55, 0x76, 0x98, 0x86,
    0xbc, 0x65, 0x1d, 0x06, 0xb0, 0xcc, 0x53, 0xb0, 0xf6, 0x3b, 0xce, 0x3c, 0x3e, 0x27, 0xd2,
    0x60, 0x4b,
];

/// sqrt(-Z) = sqrt(10) mod p, the non-residue correction of sqrt_ratio.
const SSWU_C2: [u8; 32] = [
    0xda, 0x53, 0x8e, 0x3b, 0xe1, 0xd8, 0x9b, 0x99, 0xc9, 0x78, 0xfc, 0x67, 0x51, 0x80, 0xaa,
    0xb2, 0x7b, 0x8d, 0x1f, 0xf8, 0x4c, 0x55, 0xd5, 0xb6, 0x2c, 0xcd, 0x34, 0x27, 0xe4, 0x33,
    0xc4, 0x7f,
];

/// Decode a compile-time field constant.
fn field_const(bytes: &[u8; 32]) -> FieldElement {
    // The constants above are canonical encodings below p; this cannot fail.
    FieldElement::from_repr((*bytes).into()).unwrap()
}

/// `expand_message_xmd` over SHA-256.
///
/// Produces `out_len` pseudorandom bytes from `msg` and `dst`. Fails on an
/// empty tag, on output lengths above 2^16 - 1 and on lengths that would
/// push the single-byte block counter past 255 blocks.
pub(crate) fn expand_message_xmd(msg: &[u8], dst: &[u8], out_len: usize) -> Result<Vec<u8>> {
    if dst.is_empty() {
        return Err(TokenError::DecodeFailure);
    }
    if out_len == 0 || out_len > u16::MAX as usize {
        return Err(TokenError::DecodeFailure);
    }
    let ell = out_len.div_ceil(DIGEST_LEN);
    if ell > 255 {
        return Err(TokenError::DecodeFailure);
    }

    // An oversized tag is hashed down before use.
    let short_dst;
    let dst = if dst.len() > 255 {
        let mut hasher = Sha256::new();
        hasher.update(OVERSIZE_DST_PREFIX);
        hasher.update(dst);
        short_dst = hasher.finalize();
        &short_dst[..]
    } else {
        dst
    };

    // b_0 = H(Z_pad || msg || l_i_b_str || 0x00 || DST')
    let mut hasher = Sha256::new();
    hasher.update([0u8; BLOCK_LEN]);
    hasher.update(msg);
    hasher.update((out_len as u16).to_be_bytes());
    hasher.update([0u8]);
    hasher.update(dst);
    hasher.update([dst.len() as u8]);
    let b0: [u8; DIGEST_LEN] = hasher.finalize().into();

    let mut out = Vec::with_capacity(ell * DIGEST_LEN);
    let mut prev = b0;
    for i in 1..=ell {
        // b_i = H((b_0 xor b_{i-1}) || i || DST'); b_0 xor b_0 = 0 for i = 1
        let mut block = [0u8; DIGEST_LEN];
        for (dst_byte, (a, b)) in block.iter_mut().zip(b0.iter().zip(prev.iter())) {
            *dst_byte = if i == 1 { *b } else { a ^ b };
        }
        let mut hasher = Sha256::new();
        hasher.update(block);
        hasher.update([i as u8]);
        hasher.update(dst);
        hasher.update([dst.len() as u8]);
        prev = hasher.finalize().into();
        out.extend_from_slice(&prev);
    }
    out.truncate(out_len);
    Ok(out)
}

/// Reduce a big-endian byte string modulo the field prime.
fn reduce_field(bytes: &[u8]) -> FieldElement {
    let radix = FieldElement::from(256u64);
    bytes
        .iter()
        .fold(FieldElement::ZERO, |acc, &b| acc * radix + FieldElement::from(u64::from(b)))
}

/// Reduce a big-endian byte string modulo the group order.
fn reduce_scalar(bytes: &[u8]) -> Scalar {
    let radix = Scalar::from(256u64);
    bytes
        .iter()
        .fold(Scalar::ZERO, |acc, &b| acc * radix + Scalar::from(u64::from(b)))
}

/// Derive two independent field elements from a message.
pub(crate) fn hash_to_field(msg: &[u8], dst: &[u8]) -> Result<[FieldElement; 2]> {
    let uniform = expand_message_xmd(msg, dst, 2 * FIELD_EXPAND_LEN)?;
    Ok([
        reduce_field(&uniform[..FIELD_EXPAND_LEN]),
        reduce_field(&uniform[FIELD_EXPAND_LEN..]),
    ])
}

/// Constant-time square root of a ratio for p = 3 mod 4.
///
/// Returns a mask telling whether `u/v` is a quadratic residue, together
/// with sqrt(u/v) when it is and sqrt(Z * u/v) when it is not. No branch
/// depends on the outcome.
fn sqrt_ratio(u: &FieldElement, v: &FieldElement) -> (Choice, FieldElement) {
    let tv1 = v.square();
    let tv2 = *u * v;
    let tv1 = tv1 * tv2;
    let y1 = tv1.pow_vartime(&SSWU_C1) * tv2;
    let y2 = y1 * field_const(&SSWU_C2);
    let tv3 = y1.square() * v;
    let is_qr = tv3.ct_eq(u);
    let y = FieldElement::conditional_select(&y2, &y1, is_qr);
    (is_qr, y)
}

/// Simplified SWU map for a = -3 curves, with Z = -10 for P-256.
///
/// The straight-line program keeps the would-be division in a separate
/// denominator until the very end, where it is removed with one
/// constant-time (Fermat) inversion of a value that is never zero.
pub(crate) fn map_to_curve_sswu(u: &FieldElement) -> ProjectivePoint {
    let a = -FieldElement::from(3u64);
    let b = field_const(&CURVE_B);
    let z = -FieldElement::from(10u64);

    let tv1 = z * u.square();
    let tv2 = tv1.square() + tv1;
    let tv3 = b * (tv2 + FieldElement::ONE);
    let tv4 = a * FieldElement::conditional_select(&(-tv2), &z, tv2.is_zero());

    // g(x1) as a ratio: num = tv3^3 + a * tv4^2 * tv3 + b * tv4^3, den = tv4^3
    let tv4_sq = tv4.square();
    let num = (tv3.square() + a * tv4_sq) * tv3 + b * tv4_sq * tv4;
    let den = tv4_sq * tv4;

    let x = tv1 * tv3;
    let (is_gx1_square, y1) = sqrt_ratio(&num, &den);
    let y = tv1 * u * y1;

    let x = FieldElement::conditional_select(&x, &tv3, is_gx1_square);
    let y = FieldElement::conditional_select(&y, &y1, is_gx1_square);

    // Fix the sign of y to follow the sign of u.
    let sign_matches = !(u.is_odd() ^ y.is_odd());
    let y = FieldElement::conditional_select(&(-y), &y, sign_matches);

    // tv4 is a * Z or a * (-tv2) with tv2 != 0, never zero.
    let x = x * tv4.invert().unwrap_or(FieldElement::ZERO);

    // (x, y) satisfies the curve equation by construction.
    let encoded = EncodedPoint::from_affine_coordinates(&x.to_repr(), &y.to_repr(), false);
    ProjectivePoint::from(AffinePoint::from_encoded_point(&encoded).unwrap())
}

/// Hash a message to a uniformly distributed curve point.
///
/// Two independent SSWU maps added together; a single map is
/// distinguishable from uniform, the sum is not.
pub fn hash_to_curve(msg: &[u8], dst: &[u8]) -> Result<ProjectivePoint> {
    let [u0, u1] = hash_to_field(msg, dst)?;
    Ok(map_to_curve_sswu(&u0) + map_to_curve_sswu(&u1))
}

/// Hash a message to a uniformly distributed scalar modulo the group order.
pub fn hash_to_scalar(msg: &[u8], dst: &[u8]) -> Result<Scalar> {
    let uniform = expand_message_xmd(msg, dst, FIELD_EXPAND_LEN)?;
    Ok(reduce_scalar(&uniform))
}
