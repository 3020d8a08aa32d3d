//! Token issuance and redemption for the dual-keypair engine

use p256::{ProjectivePoint, Scalar};
use rand_core::CryptoRngCore;
use sha2::{Digest, Sha256};
use subtle::{Choice, ConditionallySelectable, ConstantTimeEq};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::common::{fill_bytes, point_bytes, random_nonzero_scalar};
use crate::dleq::{
    indexed_coefficients, linear_combine, Dleq2Proof, DleqOr2Proof, DLEQ2_PROOF_LEN,
    DLEQOR2_PROOF_LEN,
};
use crate::errors::{Result, TokenError};
use crate::hash2curve::hash_to_curve;
use crate::pmb::keys::{ClientKey, IssuerKey};
use crate::protocol::Protocol;
use crate::wire::{copy_into, point_wire_len, Reader, Writer};

pub use crate::common::NONCE_LEN;

/// Combined length of the two batch proofs in an issuance response.
const PROOF_BLOB_LEN: usize = DLEQOR2_PROOF_LEN + DLEQ2_PROOF_LEN;

// {{{ pretoken and token

/// Client-side blinding state for one requested token.
///
/// Created by [`blind`], consumed exactly once by [`unblind`]. The blinding
/// scalar is wiped on drop.
#[derive(Debug, Clone, Zeroize, ZeroizeOnDrop)]
pub struct PreToken {
    salt: [u8; NONCE_LEN],
    r: Scalar,
    #[zeroize(skip)]
    tp: ProjectivePoint,
}

/// A finished token ready for redemption.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    key_id: u32,
    salt: [u8; NONCE_LEN],
    s: ProjectivePoint,
    w: ProjectivePoint,
    ws: ProjectivePoint,
}

impl Token {
    pub fn key_id(&self) -> u32 {
        self.key_id
    }

    pub fn salt(&self) -> &[u8; NONCE_LEN] {
        &self.salt
    }

    pub fn encode(&self, protocol: &Protocol) -> Result<Vec<u8>> {
        let mut writer =
            Writer::with_capacity(4 + NONCE_LEN + 3 * point_wire_len(protocol.point_format()));
        writer.put_u32(self.key_id);
        writer.put_bytes(&self.salt);
        for point in [&self.s, &self.w, &self.ws] {
            writer.put_point(protocol.point_format(), point)?;
        }
        Ok(writer.into_vec())
    }

    pub fn encode_into(&self, protocol: &Protocol, out: &mut [u8]) -> Result<usize> {
        copy_into(out, &self.encode(protocol)?)
    }

    pub fn decode(protocol: &Protocol, bytes: &[u8]) -> Result<Self> {
        let mut reader = Reader::new(bytes);
        let key_id = reader.get_u32()?;
        let salt: [u8; NONCE_LEN] =
            reader.take(NONCE_LEN)?.try_into().map_err(|_| TokenError::DecodeFailure)?;
        let s = reader.get_point(protocol.point_format())?;
        let w = reader.get_point(protocol.point_format())?;
        let ws = reader.get_point(protocol.point_format())?;
        reader.expect_end()?;
        Ok(Self { key_id, salt, s, w, ws })
    }
}

// }}}
// {{{ hashing helpers

/// Nonce bytes for a salt, optionally bound to a caller message.
fn token_nonce(salt: &[u8; NONCE_LEN], message: Option<&[u8]>) -> Vec<u8> {
    match message {
        None => salt.to_vec(),
        Some(message) => {
            let mut hasher = Sha256::new();
            hasher.update(salt);
            hasher.update(message);
            hasher.finalize().to_vec()
        }
    }
}

fn nonce_point(protocol: &Protocol, nonce: &[u8]) -> Result<ProjectivePoint> {
    hash_to_curve(nonce, protocol.dst().token)
}

/// The issuer's second per-token base: a hash of the blinded point and the
/// issuer's fresh salt, so neither side controls it alone.
fn response_base(
    protocol: &Protocol,
    tp: &ProjectivePoint,
    salt: &[u8; NONCE_LEN],
) -> Result<ProjectivePoint> {
    let mut input = point_bytes(tp);
    input.extend_from_slice(salt);
    hash_to_curve(&input, protocol.dst().response)
}

/// The coefficient transcript binds the public keys and every per-token
/// point, in issuance order. Issuer and client must build it identically.
fn batch_coefficients(
    protocol: &Protocol,
    key: &ClientKey,
    tps: &[ProjectivePoint],
    sps: &[ProjectivePoint],
    wps: &[ProjectivePoint],
    wsps: &[ProjectivePoint],
) -> Result<Vec<Scalar>> {
    let (pub0, pub1, pubs) = key.publics();
    let mut transcript: Vec<&ProjectivePoint> = vec![pub0, pub1, pubs];
    for i in 0..tps.len() {
        transcript.push(&tps[i]);
        transcript.push(&sps[i]);
        transcript.push(&wps[i]);
        transcript.push(&wsps[i]);
    }
    indexed_coefficients(protocol.dst().batch, &transcript, tps.len())
}

// }}}
// {{{ blind

/// Create `count` blinded token requests.
///
/// When `message` is given the token nonce is bound to it and [`read`] must
/// be called with the same message. Returns the retained pretokens and the
/// request bytes for the issuer.
pub fn blind<R: CryptoRngCore>(
    protocol: &Protocol,
    count: usize,
    message: Option<&[u8]>,
    rng: &mut R,
) -> Result<(Vec<PreToken>, Vec<u8>)> {
    if count == 0 || count > usize::from(u16::MAX) {
        return Err(TokenError::DecodeFailure);
    }

    let mut pretokens = Vec::with_capacity(count);
    let mut writer = Writer::with_capacity(count * point_wire_len(protocol.point_format()));
    for _ in 0..count {
        let mut salt = [0u8; NONCE_LEN];
        fill_bytes(rng, &mut salt);
        let nonce = token_nonce(&salt, message);
        let t = nonce_point(protocol, &nonce)?;

        let r = random_nonzero_scalar(rng);
        // r is nonzero, so inversion cannot fail.
        let r_inv = r.invert().unwrap();
        let tp = t * r_inv;

        writer.put_point(protocol.point_format(), &tp)?;
        pretokens.push(PreToken { salt, r, tp });
    }
    Ok((pretokens, writer.into_vec()))
}

// }}}
// {{{ sign

/// Issue the first `num_to_issue` requested tokens under the keypair
/// selected by `bit`.
///
/// Requested points beyond `num_to_issue` are left unconsumed so the client
/// can tell how many were issued. The whole batch is signed with a single
/// metadata bit; keypair selection never branches on it.
pub fn sign<R: CryptoRngCore>(
    protocol: &Protocol,
    key: &IssuerKey,
    request: &[u8],
    num_to_issue: usize,
    bit: bool,
    rng: &mut R,
) -> Result<Vec<u8>> {
    if num_to_issue == 0 || num_to_issue > usize::from(u16::MAX) {
        return Err(TokenError::DecodeFailure);
    }

    let mut reader = Reader::new(request);
    if reader.remaining() < num_to_issue * point_wire_len(protocol.point_format()) {
        return Err(TokenError::DecodeFailure);
    }
    let mut tps = Vec::with_capacity(num_to_issue);
    for _ in 0..num_to_issue {
        tps.push(reader.get_point(protocol.point_format())?);
    }

    let choice = Choice::from(u8::from(bit));
    let [x0, y0, x1, y1] = key.signing_scalars();
    let xb = Scalar::conditional_select(x0, x1, choice);
    let yb = Scalar::conditional_select(y0, y1, choice);
    let (xs, ys) = key.validity_scalars();

    let mut salts = Vec::with_capacity(num_to_issue);
    let mut sps = Vec::with_capacity(num_to_issue);
    let mut wps = Vec::with_capacity(num_to_issue);
    let mut wsps = Vec::with_capacity(num_to_issue);
    for tp in &tps {
        let mut salt = [0u8; NONCE_LEN];
        fill_bytes(rng, &mut salt);
        let sp = response_base(protocol, tp, &salt)?;
        wps.push(*tp * xb + sp * yb);
        wsps.push(*tp * xs + sp * ys);
        salts.push(salt);
        sps.push(sp);
    }

    let coefficients = batch_coefficients(protocol, key.client_key(), &tps, &sps, &wps, &wsps)?;
    let t_bar = linear_combine(&tps, &coefficients);
    let s_bar = linear_combine(&sps, &coefficients);
    let w_bar = linear_combine(&wps, &coefficients);
    let ws_bar = linear_combine(&wsps, &coefficients);

    let h = protocol.generator_h();
    let (pub0, pub1, pubs) = key.client_key().publics();
    let or_proof = DleqOr2Proof::prove(
        protocol.dst().challenge,
        h,
        pub0,
        pub1,
        &t_bar,
        &s_bar,
        &w_bar,
        &xb,
        &yb,
        choice,
        rng,
    )?;
    let validity_proof = Dleq2Proof::prove(
        protocol.dst().challenge,
        h,
        pubs,
        &t_bar,
        &s_bar,
        &ws_bar,
        xs,
        ys,
        rng,
    )?;

    let mut writer = Writer::new();
    writer.put_u16(num_to_issue as u16);
    for i in 0..num_to_issue {
        writer.put_bytes(&salts[i]);
        writer.put_point(protocol.point_format(), &wps[i])?;
        writer.put_point(protocol.point_format(), &wsps[i])?;
    }
    writer.put_u16(PROOF_BLOB_LEN as u16);
    or_proof.encode(&mut writer);
    validity_proof.encode(&mut writer);
    Ok(writer.into_vec())
}

// }}}
// {{{ unblind

/// Verify an issuance response and strip the blinding from every issued
/// token.
///
/// Verification is all-or-nothing: if either batch proof fails, no token is
/// returned.
pub fn unblind(
    protocol: &Protocol,
    key: &ClientKey,
    pretokens: &[PreToken],
    response: &[u8],
) -> Result<Vec<Token>> {
    let mut reader = Reader::new(response);
    let count = usize::from(reader.get_u16()?);
    if count == 0 || count > pretokens.len() {
        return Err(TokenError::DecodeFailure);
    }

    let tps: Vec<ProjectivePoint> = pretokens[..count].iter().map(|p| p.tp).collect();
    let mut salts = Vec::with_capacity(count);
    let mut sps = Vec::with_capacity(count);
    let mut wps = Vec::with_capacity(count);
    let mut wsps = Vec::with_capacity(count);
    for tp in &tps {
        let salt: [u8; NONCE_LEN] =
            reader.take(NONCE_LEN)?.try_into().map_err(|_| TokenError::DecodeFailure)?;
        sps.push(response_base(protocol, tp, &salt)?);
        wps.push(reader.get_point(protocol.point_format())?);
        wsps.push(reader.get_point(protocol.point_format())?);
        salts.push(salt);
    }

    let proof_len = usize::from(reader.get_u16()?);
    if proof_len != PROOF_BLOB_LEN {
        return Err(TokenError::DecodeFailure);
    }
    let or_proof = DleqOr2Proof::decode(&mut reader)?;
    let validity_proof = Dleq2Proof::decode(&mut reader)?;
    reader.expect_end()?;

    let coefficients = batch_coefficients(protocol, key, &tps, &sps, &wps, &wsps)?;
    let t_bar = linear_combine(&tps, &coefficients);
    let s_bar = linear_combine(&sps, &coefficients);
    let w_bar = linear_combine(&wps, &coefficients);
    let ws_bar = linear_combine(&wsps, &coefficients);

    let h = protocol.generator_h();
    let (pub0, pub1, pubs) = key.publics();
    or_proof.verify(protocol.dst().challenge, h, pub0, pub1, &t_bar, &s_bar, &w_bar)?;
    validity_proof.verify(protocol.dst().challenge, h, pubs, &t_bar, &s_bar, &ws_bar)?;

    let mut tokens = Vec::with_capacity(count);
    for i in 0..count {
        let r = &pretokens[i].r;
        tokens.push(Token {
            key_id: key.key_id(),
            salt: pretokens[i].salt,
            s: sps[i] * r,
            w: wps[i] * r,
            ws: wsps[i] * r,
        });
    }
    Ok(tokens)
}

// }}}
// {{{ read

/// Redeem a token, returning its nonce and the metadata bit it was issued
/// under.
///
/// Both candidate keypairs are always evaluated; exactly one must match,
/// and any other outcome is reported as the same coarse failure.
pub fn read(
    protocol: &Protocol,
    key: &IssuerKey,
    token: &Token,
    message: Option<&[u8]>,
) -> Result<(Vec<u8>, bool)> {
    if token.key_id != key.key_id() {
        return Err(TokenError::GroupMismatch);
    }

    let nonce = token_nonce(&token.salt, message);
    let t = nonce_point(protocol, &nonce)?;

    let (xs, ys) = key.validity_scalars();
    let ws_expected = t * xs + token.s * ys;
    if !bool::from(ws_expected.ct_eq(&token.ws)) {
        return Err(TokenError::BadValidityCheck);
    }

    let [x0, y0, x1, y1] = key.signing_scalars();
    let w0 = t * x0 + token.s * y0;
    let w1 = t * x1 + token.s * y1;
    let m0 = w0.ct_eq(&token.w);
    let m1 = w1.ct_eq(&token.w);
    if !bool::from(m0 ^ m1) {
        return Err(TokenError::BadValidityCheck);
    }
    Ok((nonce, bool::from(m1)))
}

// }}}
