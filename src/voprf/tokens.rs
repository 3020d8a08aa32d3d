//! Token issuance and redemption for the single-keypair engine

use p256::{ProjectivePoint, Scalar};
use rand_core::CryptoRngCore;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::common::{fill_bytes, point_bytes, random_nonzero_scalar};
use crate::dleq::{linear_combine, seeded_coefficients, DleqProof, DLEQ_PROOF_LEN};
use crate::errors::{Result, TokenError};
use crate::hash2curve::hash_to_curve;
pub use crate::common::NONCE_LEN;
use crate::protocol::Protocol;
use crate::voprf::keys::{ClientKey, IssuerKey};
use crate::wire::{copy_into, point_wire_len, Reader, Writer};

// {{{ pretoken and token

/// Client-side blinding state for one requested token.
#[derive(Debug, Clone, Zeroize, ZeroizeOnDrop)]
pub struct PreToken {
    salt: [u8; NONCE_LEN],
    r: Scalar,
    #[zeroize(skip)]
    tp: ProjectivePoint,
}

/// A finished token: the nonce seed and the issuer's evaluation of it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    key_id: u32,
    salt: [u8; NONCE_LEN],
    z: ProjectivePoint,
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
            Writer::with_capacity(4 + NONCE_LEN + point_wire_len(protocol.point_format()));
        writer.put_u32(self.key_id);
        writer.put_bytes(&self.salt);
        writer.put_point(protocol.point_format(), &self.z)?;
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
        let z = reader.get_point(protocol.point_format())?;
        reader.expect_end()?;
        Ok(Self { key_id, salt, z })
    }
}

// }}}
// {{{ hashing helpers

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

/// Seed input for the batch coefficients, bound to the issuer public key.
fn batch_seed(key: &ClientKey) -> Vec<u8> {
    let mut input = point_bytes(key.public_point());
    input.extend_from_slice(b"batch-seed");
    input
}

// }}}
// {{{ blind

/// Create `count` blinded token requests.
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

/// Evaluate the first `num_to_issue` requested points under the issuer key.
pub fn sign<R: CryptoRngCore>(
    protocol: &Protocol,
    key: &IssuerKey,
    request: &[u8],
    num_to_issue: usize,
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

    let xs = key.scalar();
    let zs: Vec<ProjectivePoint> = tps.iter().map(|tp| *tp * xs).collect();

    let coefficients =
        seeded_coefficients(protocol.dst().batch, &batch_seed(key.client_key()), &tps, &zs)?;
    let t_bar = linear_combine(&tps, &coefficients);
    let z_bar = linear_combine(&zs, &coefficients);

    let proof = DleqProof::prove(
        protocol.dst().challenge,
        key.client_key().public_point(),
        &t_bar,
        &z_bar,
        xs,
        rng,
    )?;

    let mut writer = Writer::new();
    writer.put_u16(num_to_issue as u16);
    for z in &zs {
        writer.put_point(protocol.point_format(), z)?;
    }
    writer.put_u16(DLEQ_PROOF_LEN as u16);
    proof.encode(&mut writer);
    Ok(writer.into_vec())
}

// }}}
// {{{ unblind

/// Verify an issuance response and strip the blinding. All-or-nothing.
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
    let mut zs = Vec::with_capacity(count);
    for _ in 0..count {
        zs.push(reader.get_point(protocol.point_format())?);
    }

    let proof_len = usize::from(reader.get_u16()?);
    if proof_len != DLEQ_PROOF_LEN {
        return Err(TokenError::DecodeFailure);
    }
    let proof = DleqProof::decode(&mut reader)?;
    reader.expect_end()?;

    let coefficients = seeded_coefficients(protocol.dst().batch, &batch_seed(key), &tps, &zs)?;
    let t_bar = linear_combine(&tps, &coefficients);
    let z_bar = linear_combine(&zs, &coefficients);
    proof.verify(protocol.dst().challenge, key.public_point(), &t_bar, &z_bar)?;

    let mut tokens = Vec::with_capacity(count);
    for i in 0..count {
        tokens.push(Token {
            key_id: key.key_id(),
            salt: pretokens[i].salt,
            z: zs[i] * pretokens[i].r,
        });
    }
    Ok(tokens)
}

// }}}
// {{{ read

/// Redeem a token, returning the nonce it was issued for.
pub fn read(
    protocol: &Protocol,
    key: &IssuerKey,
    token: &Token,
    message: Option<&[u8]>,
) -> Result<Vec<u8>> {
    if token.key_id != key.key_id() {
        return Err(TokenError::GroupMismatch);
    }

    let nonce = token_nonce(&token.salt, message);
    let t = nonce_point(protocol, &nonce)?;
    let expected = t * key.scalar();
    if bool::from(expected.ct_eq(&token.z)) {
        Ok(nonce)
    } else {
        Err(TokenError::BadValidityCheck)
    }
}

// }}}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::Variant;
    use rand_core::OsRng;

    fn setup() -> (Protocol, IssuerKey) {
        let protocol = Protocol::new(Variant::VoprfP256Sha256);
        let key = IssuerKey::generate(11, &mut OsRng);
        (protocol, key)
    }

    #[test]
    fn end_to_end_issues_and_redeems() {
        let (protocol, key) = setup();
        let client = key.client_key().clone();
        for trial in 0..100 {
            let count = 1 + trial % 4;
            let (pretokens, request) = blind(&protocol, count, None, &mut OsRng).unwrap();
            let response = sign(&protocol, &key, &request, count, &mut OsRng).unwrap();
            let tokens = unblind(&protocol, &client, &pretokens, &response).unwrap();
            assert_eq!(tokens.len(), count);
            for (token, pretoken) in tokens.iter().zip(pretokens.iter()) {
                let nonce = read(&protocol, &key, token, None).unwrap();
                assert_eq!(nonce, pretoken.salt.to_vec());
            }
        }
    }

    #[test]
    fn message_binding_is_enforced() {
        let (protocol, key) = setup();
        let client = key.client_key().clone();
        let message: &[u8] = b"one ticket";
        let (pretokens, request) = blind(&protocol, 1, Some(message), &mut OsRng).unwrap();
        let response = sign(&protocol, &key, &request, 1, &mut OsRng).unwrap();
        let tokens = unblind(&protocol, &client, &pretokens, &response).unwrap();

        read(&protocol, &key, &tokens[0], Some(message)).unwrap();
        assert_eq!(
            read(&protocol, &key, &tokens[0], Some(b"two tickets".as_slice())),
            Err(TokenError::BadValidityCheck)
        );
    }

    #[test]
    fn partial_issuance() {
        let (protocol, key) = setup();
        let client = key.client_key().clone();
        let (pretokens, request) = blind(&protocol, 3, None, &mut OsRng).unwrap();
        let response = sign(&protocol, &key, &request, 2, &mut OsRng).unwrap();
        let tokens = unblind(&protocol, &client, &pretokens, &response).unwrap();
        assert_eq!(tokens.len(), 2);
        for token in &tokens {
            read(&protocol, &key, token, None).unwrap();
        }
    }

    #[test]
    fn corrupt_response_never_unblinds() {
        let (protocol, key) = setup();
        let client = key.client_key().clone();
        let (pretokens, request) = blind(&protocol, 2, None, &mut OsRng).unwrap();
        let response = sign(&protocol, &key, &request, 2, &mut OsRng).unwrap();
        unblind(&protocol, &client, &pretokens, &response).unwrap();

        for i in 0..response.len() {
            let mut corrupt = response.clone();
            corrupt[i] ^= 0x01;
            assert!(
                unblind(&protocol, &client, &pretokens, &corrupt).is_err(),
                "byte {i} flip was accepted"
            );
        }
    }

    #[test]
    fn corrupt_token_never_reads() {
        let (protocol, key) = setup();
        let client = key.client_key().clone();
        let (pretokens, request) = blind(&protocol, 1, None, &mut OsRng).unwrap();
        let response = sign(&protocol, &key, &request, 1, &mut OsRng).unwrap();
        let tokens = unblind(&protocol, &client, &pretokens, &response).unwrap();
        let encoded = tokens[0].encode(&protocol).unwrap();

        for i in 0..encoded.len() {
            let mut corrupt = encoded.clone();
            corrupt[i] ^= 0x01;
            let outcome = Token::decode(&protocol, &corrupt)
                .and_then(|token| read(&protocol, &key, &token, None));
            assert!(outcome.is_err(), "byte {i} flip was accepted");
        }
    }

    #[test]
    fn foreign_response_entry_invalidates_the_batch() {
        let (protocol, key) = setup();
        let client = key.client_key().clone();
        let (pretokens_a, request_a) = blind(&protocol, 2, None, &mut OsRng).unwrap();
        let response_a = sign(&protocol, &key, &request_a, 2, &mut OsRng).unwrap();
        let (_, request_b) = blind(&protocol, 2, None, &mut OsRng).unwrap();
        let response_b = sign(&protocol, &key, &request_b, 2, &mut OsRng).unwrap();

        let entry_len = point_wire_len(protocol.point_format());
        let mut spliced = response_a.clone();
        spliced[2..2 + entry_len].copy_from_slice(&response_b[2..2 + entry_len]);
        assert_eq!(
            unblind(&protocol, &client, &pretokens_a, &spliced),
            Err(TokenError::InvalidProof)
        );
    }

    #[test]
    fn token_round_trip() {
        let (protocol, key) = setup();
        let client = key.client_key().clone();
        let (pretokens, request) = blind(&protocol, 1, None, &mut OsRng).unwrap();
        let response = sign(&protocol, &key, &request, 1, &mut OsRng).unwrap();
        let tokens = unblind(&protocol, &client, &pretokens, &response).unwrap();

        let encoded = tokens[0].encode(&protocol).unwrap();
        let decoded = Token::decode(&protocol, &encoded).unwrap();
        assert_eq!(decoded, tokens[0]);

        assert_eq!(
            Token::decode(&protocol, &encoded[..encoded.len() - 1]),
            Err(TokenError::DecodeFailure)
        );
    }
}
