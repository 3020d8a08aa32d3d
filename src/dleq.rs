//! Discrete-log equality proofs over batched issuance transcripts
//!
//! Three relations are proven in this crate, always over points that have
//! already been combined with batch coefficients:
//!
//! * [`DleqProof`]: a single witness ties `Pub = k*G` to `Z = k*M`.
//! * [`Dleq2Proof`]: a two-witness (Okamoto) variant ties
//!   `Pub = x*G + y*H` to `W = x*T + y*S`.
//! * [`DleqOr2Proof`]: an OR composition of two [`Dleq2Proof`] statements.
//!   The issuer proves that `W` was computed with one of two published
//!   keypairs without revealing which; the unused branch is simulated and
//!   all bit-dependent assignments go through constant-time selection.
//!
//! Challenges are Fiat-Shamir: the full point transcript is hashed to a
//! scalar under the variant's challenge tag.

use p256::{elliptic_curve::Field, ProjectivePoint, Scalar};
use rand_core::CryptoRngCore;
use sha2::{Digest, Sha256};
use subtle::{Choice, ConditionallySelectable, ConstantTimeEq};

use crate::common::{point_bytes, random_nonzero_scalar};
use crate::errors::{Result, TokenError};
use crate::hash2curve::hash_to_scalar;
use crate::wire::{Reader, Writer};

pub(crate) const DLEQ_PROOF_LEN: usize = 64;
pub(crate) const DLEQ2_PROOF_LEN: usize = 96;
pub(crate) const DLEQOR2_PROOF_LEN: usize = 192;

// {{{ transcript

/// Byte transcript hashed into a Fiat-Shamir challenge.
///
/// Every append is framed with the label and a length so that adjacent
/// messages cannot be reinterpreted across boundaries.
pub(crate) struct Transcript {
    data: Vec<u8>,
}

impl Transcript {
    pub fn new(label: &[u8]) -> Self {
        let mut t = Self { data: Vec::new() };
        t.append_message(b"proto", label);
        t
    }

    pub fn append_message(&mut self, label: &[u8], message: &[u8]) {
        self.data.extend_from_slice(&(label.len() as u16).to_be_bytes());
        self.data.extend_from_slice(label);
        self.data.extend_from_slice(&(message.len() as u32).to_be_bytes());
        self.data.extend_from_slice(message);
    }

    pub fn append_point(&mut self, label: &[u8], point: &ProjectivePoint) {
        let bytes = point_bytes(point);
        self.append_message(label, &bytes);
    }

    pub fn challenge_scalar(&self, challenge_dst: &[u8]) -> Result<Scalar> {
        hash_to_scalar(&self.data, challenge_dst)
    }
}

// }}}
// {{{ batch coefficients

/// Coefficients for the indexed strategy: digest the whole point transcript
/// once, then derive one scalar per index from the digest.
pub(crate) fn indexed_coefficients(
    batch_dst: &[u8],
    transcript: &[&ProjectivePoint],
    count: usize,
) -> Result<Vec<Scalar>> {
    let mut hasher = Sha256::new();
    for point in transcript {
        let bytes = point_bytes(point);
        hasher.update((bytes.len() as u16).to_be_bytes());
        hasher.update(&bytes);
    }
    let digest = hasher.finalize();

    (0..count)
        .map(|i| {
            let mut input = Vec::with_capacity(digest.len() + 2);
            input.extend_from_slice(&digest);
            input.extend_from_slice(&(i as u16).to_be_bytes());
            hash_to_scalar(&input, batch_dst)
        })
        .collect()
}

/// Coefficients for the seeded strategy: a seed bound to the public key,
/// then one scalar per entry from the seed, the index and the entry's own
/// points.
pub(crate) fn seeded_coefficients(
    batch_dst: &[u8],
    seed_input: &[u8],
    blinded: &[ProjectivePoint],
    evaluated: &[ProjectivePoint],
) -> Result<Vec<Scalar>> {
    debug_assert_eq!(blinded.len(), evaluated.len());
    let seed = Sha256::digest(seed_input);

    blinded
        .iter()
        .zip(evaluated.iter())
        .enumerate()
        .map(|(i, (bt, z))| {
            let mut input = Vec::new();
            input.extend_from_slice(&seed);
            input.extend_from_slice(&(i as u16).to_be_bytes());
            input.extend_from_slice(&point_bytes(bt));
            input.extend_from_slice(&point_bytes(z));
            hash_to_scalar(&input, batch_dst)
        })
        .collect()
}

/// Combine a point vector with its batch coefficients.
pub(crate) fn linear_combine(points: &[ProjectivePoint], coefficients: &[Scalar]) -> ProjectivePoint {
    debug_assert_eq!(points.len(), coefficients.len());
    points
        .iter()
        .zip(coefficients.iter())
        .fold(ProjectivePoint::IDENTITY, |acc, (point, e)| acc + *point * e)
}

// }}}
// {{{ single-witness DLEQ

/// Proof that `Pub = k*G` and `Z = k*M` share the witness `k`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct DleqProof {
    c: Scalar,
    u: Scalar,
}

impl DleqProof {
    pub fn prove<R: CryptoRngCore>(
        challenge_dst: &[u8],
        public: &ProjectivePoint,
        m: &ProjectivePoint,
        z: &ProjectivePoint,
        key: &Scalar,
        rng: &mut R,
    ) -> Result<Self> {
        let r = random_nonzero_scalar(rng);
        let a0 = ProjectivePoint::GENERATOR * r;
        let a1 = *m * r;
        let c = Self::challenge(challenge_dst, public, m, z, &a0, &a1)?;
        let u = r - c * key;
        Ok(Self { c, u })
    }

    pub fn verify(
        &self,
        challenge_dst: &[u8],
        public: &ProjectivePoint,
        m: &ProjectivePoint,
        z: &ProjectivePoint,
    ) -> Result<()> {
        let a0 = ProjectivePoint::GENERATOR * self.u + *public * self.c;
        let a1 = *m * self.u + *z * self.c;
        let expected = Self::challenge(challenge_dst, public, m, z, &a0, &a1)?;
        if bool::from(self.c.ct_eq(&expected)) {
            Ok(())
        } else {
            Err(TokenError::InvalidProof)
        }
    }

    fn challenge(
        challenge_dst: &[u8],
        public: &ProjectivePoint,
        m: &ProjectivePoint,
        z: &ProjectivePoint,
        a0: &ProjectivePoint,
        a1: &ProjectivePoint,
    ) -> Result<Scalar> {
        let mut t = Transcript::new(b"dleq");
        t.append_point(b"pub", public);
        t.append_point(b"m", m);
        t.append_point(b"z", z);
        t.append_point(b"a0", a0);
        t.append_point(b"a1", a1);
        t.challenge_scalar(challenge_dst)
    }

    pub fn encode(&self, writer: &mut Writer) {
        writer.put_scalar(&self.c);
        writer.put_scalar(&self.u);
    }

    pub fn decode(reader: &mut Reader<'_>) -> Result<Self> {
        let c = reader.get_scalar()?;
        let u = reader.get_scalar()?;
        Ok(Self { c, u })
    }
}

// }}}
// {{{ two-witness DLEQ

/// Proof that `Pub = x*G + y*H` and `W = x*T + y*S` share both witnesses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Dleq2Proof {
    c: Scalar,
    u: Scalar,
    v: Scalar,
}

impl Dleq2Proof {
    #[allow(clippy::too_many_arguments)]
    pub fn prove<R: CryptoRngCore>(
        challenge_dst: &[u8],
        h: &ProjectivePoint,
        public: &ProjectivePoint,
        t: &ProjectivePoint,
        s: &ProjectivePoint,
        w: &ProjectivePoint,
        x: &Scalar,
        y: &Scalar,
        rng: &mut R,
    ) -> Result<Self> {
        let k0 = random_nonzero_scalar(rng);
        let k1 = random_nonzero_scalar(rng);
        let a0 = ProjectivePoint::GENERATOR * k0 + *h * k1;
        let a1 = *t * k0 + *s * k1;
        let c = Self::challenge(challenge_dst, h, public, t, s, w, &a0, &a1)?;
        let u = k0 + c * x;
        let v = k1 + c * y;
        Ok(Self { c, u, v })
    }

    #[allow(clippy::too_many_arguments)]
    pub fn verify(
        &self,
        challenge_dst: &[u8],
        h: &ProjectivePoint,
        public: &ProjectivePoint,
        t: &ProjectivePoint,
        s: &ProjectivePoint,
        w: &ProjectivePoint,
    ) -> Result<()> {
        let a0 = ProjectivePoint::GENERATOR * self.u + *h * self.v - *public * self.c;
        let a1 = *t * self.u + *s * self.v - *w * self.c;
        let expected = Self::challenge(challenge_dst, h, public, t, s, w, &a0, &a1)?;
        if bool::from(self.c.ct_eq(&expected)) {
            Ok(())
        } else {
            Err(TokenError::InvalidProof)
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn challenge(
        challenge_dst: &[u8],
        h: &ProjectivePoint,
        public: &ProjectivePoint,
        t: &ProjectivePoint,
        s: &ProjectivePoint,
        w: &ProjectivePoint,
        a0: &ProjectivePoint,
        a1: &ProjectivePoint,
    ) -> Result<Scalar> {
        let mut transcript = Transcript::new(b"dleq2");
        transcript.append_point(b"h", h);
        transcript.append_point(b"pub", public);
        transcript.append_point(b"t", t);
        transcript.append_point(b"s", s);
        transcript.append_point(b"w", w);
        transcript.append_point(b"a0", a0);
        transcript.append_point(b"a1", a1);
        transcript.challenge_scalar(challenge_dst)
    }

    pub fn encode(&self, writer: &mut Writer) {
        writer.put_scalar(&self.c);
        writer.put_scalar(&self.u);
        writer.put_scalar(&self.v);
    }

    pub fn decode(reader: &mut Reader<'_>) -> Result<Self> {
        let c = reader.get_scalar()?;
        let u = reader.get_scalar()?;
        let v = reader.get_scalar()?;
        Ok(Self { c, u, v })
    }
}

// }}}
// {{{ OR composition

/// Proof that `W` opens under one of two published keypairs.
///
/// The verifier checks both branches and that the sub-challenges add up to
/// the transcript challenge; which branch was simulated is not derivable
/// from the proof.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct DleqOr2Proof {
    c0: Scalar,
    c1: Scalar,
    u0: Scalar,
    v0: Scalar,
    u1: Scalar,
    v1: Scalar,
}

impl DleqOr2Proof {
    /// Prove with the keypair selected by `bit`; `x` and `y` are that
    /// keypair's secrets. Branch assignment never branches on `bit`.
    #[allow(clippy::too_many_arguments)]
    pub fn prove<R: CryptoRngCore>(
        challenge_dst: &[u8],
        h: &ProjectivePoint,
        pub0: &ProjectivePoint,
        pub1: &ProjectivePoint,
        t: &ProjectivePoint,
        s: &ProjectivePoint,
        w: &ProjectivePoint,
        x: &Scalar,
        y: &Scalar,
        bit: Choice,
        rng: &mut R,
    ) -> Result<Self> {
        // Simulated branch: pick its challenge and responses first, then
        // solve for commitments that will verify.
        let cs = random_nonzero_scalar(rng);
        let us = Scalar::random(&mut *rng);
        let vs = Scalar::random(&mut *rng);
        let p_sim = ProjectivePoint::conditional_select(pub1, pub0, bit);
        let sim0 = ProjectivePoint::GENERATOR * us + *h * vs - p_sim * cs;
        let sim1 = *t * us + *s * vs - *w * cs;

        // Real branch commitments.
        let k0 = random_nonzero_scalar(rng);
        let k1 = random_nonzero_scalar(rng);
        let real0 = ProjectivePoint::GENERATOR * k0 + *h * k1;
        let real1 = *t * k0 + *s * k1;

        // Transcript order is fixed as branch 0 then branch 1.
        let a00 = ProjectivePoint::conditional_select(&real0, &sim0, bit);
        let a01 = ProjectivePoint::conditional_select(&real1, &sim1, bit);
        let a10 = ProjectivePoint::conditional_select(&sim0, &real0, bit);
        let a11 = ProjectivePoint::conditional_select(&sim1, &real1, bit);

        let c = Self::challenge(challenge_dst, h, pub0, pub1, t, s, w, &a00, &a01, &a10, &a11)?;
        let c_real = c - cs;
        let u_real = k0 + c_real * x;
        let v_real = k1 + c_real * y;

        Ok(Self {
            c0: Scalar::conditional_select(&c_real, &cs, bit),
            c1: Scalar::conditional_select(&cs, &c_real, bit),
            u0: Scalar::conditional_select(&u_real, &us, bit),
            v0: Scalar::conditional_select(&v_real, &vs, bit),
            u1: Scalar::conditional_select(&us, &u_real, bit),
            v1: Scalar::conditional_select(&vs, &v_real, bit),
        })
    }

    #[allow(clippy::too_many_arguments)]
    pub fn verify(
        &self,
        challenge_dst: &[u8],
        h: &ProjectivePoint,
        pub0: &ProjectivePoint,
        pub1: &ProjectivePoint,
        t: &ProjectivePoint,
        s: &ProjectivePoint,
        w: &ProjectivePoint,
    ) -> Result<()> {
        let a00 = ProjectivePoint::GENERATOR * self.u0 + *h * self.v0 - *pub0 * self.c0;
        let a01 = *t * self.u0 + *s * self.v0 - *w * self.c0;
        let a10 = ProjectivePoint::GENERATOR * self.u1 + *h * self.v1 - *pub1 * self.c1;
        let a11 = *t * self.u1 + *s * self.v1 - *w * self.c1;
        let c = Self::challenge(challenge_dst, h, pub0, pub1, t, s, w, &a00, &a01, &a10, &a11)?;
        if bool::from((self.c0 + self.c1).ct_eq(&c)) {
            Ok(())
        } else {
            Err(TokenError::InvalidProof)
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn challenge(
        challenge_dst: &[u8],
        h: &ProjectivePoint,
        pub0: &ProjectivePoint,
        pub1: &ProjectivePoint,
        t: &ProjectivePoint,
        s: &ProjectivePoint,
        w: &ProjectivePoint,
        a00: &ProjectivePoint,
        a01: &ProjectivePoint,
        a10: &ProjectivePoint,
        a11: &ProjectivePoint,
    ) -> Result<Scalar> {
        let mut transcript = Transcript::new(b"dleqor2");
        transcript.append_point(b"h", h);
        transcript.append_point(b"pub0", pub0);
        transcript.append_point(b"pub1", pub1);
        transcript.append_point(b"t", t);
        transcript.append_point(b"s", s);
        transcript.append_point(b"w", w);
        transcript.append_point(b"a00", a00);
        transcript.append_point(b"a01", a01);
        transcript.append_point(b"a10", a10);
        transcript.append_point(b"a11", a11);
        transcript.challenge_scalar(challenge_dst)
    }

    pub fn encode(&self, writer: &mut Writer) {
        writer.put_scalar(&self.c0);
        writer.put_scalar(&self.c1);
        writer.put_scalar(&self.u0);
        writer.put_scalar(&self.v0);
        writer.put_scalar(&self.u1);
        writer.put_scalar(&self.v1);
    }

    pub fn decode(reader: &mut Reader<'_>) -> Result<Self> {
        let c0 = reader.get_scalar()?;
        let c1 = reader.get_scalar()?;
        let u0 = reader.get_scalar()?;
        let v0 = reader.get_scalar()?;
        let u1 = reader.get_scalar()?;
        let v1 = reader.get_scalar()?;
        Ok(Self { c0, c1, u0, v0, u1, v1 })
    }
}

// }}}

#[cfg(test)]
mod tests {
    use super::*;
    use rand_core::OsRng;

    const CHALLENGE_DST: &[u8] = b"DLEQ-TESTS-V01-Challenge";
    const BATCH_DST: &[u8] = b"DLEQ-TESTS-V01-Batch";

    fn random_point(rng: &mut OsRng) -> ProjectivePoint {
        ProjectivePoint::GENERATOR * Scalar::random(rng)
    }

    #[test]
    fn dleq_round_trip() {
        let mut rng = OsRng;
        let key = Scalar::random(&mut rng);
        let public = ProjectivePoint::GENERATOR * key;
        let m = random_point(&mut rng);
        let z = m * key;

        let proof = DleqProof::prove(CHALLENGE_DST, &public, &m, &z, &key, &mut rng).unwrap();
        proof.verify(CHALLENGE_DST, &public, &m, &z).unwrap();

        // Evaluation under a different key must not verify.
        let z_bad = m * Scalar::random(&mut rng);
        assert_eq!(
            proof.verify(CHALLENGE_DST, &public, &m, &z_bad),
            Err(TokenError::InvalidProof)
        );
    }

    #[test]
    fn dleq2_round_trip() {
        let mut rng = OsRng;
        let h = random_point(&mut rng);
        let x = Scalar::random(&mut rng);
        let y = Scalar::random(&mut rng);
        let public = ProjectivePoint::GENERATOR * x + h * y;
        let t = random_point(&mut rng);
        let s = random_point(&mut rng);
        let w = t * x + s * y;

        let proof =
            Dleq2Proof::prove(CHALLENGE_DST, &h, &public, &t, &s, &w, &x, &y, &mut rng).unwrap();
        proof.verify(CHALLENGE_DST, &h, &public, &t, &s, &w).unwrap();

        let w_bad = w + ProjectivePoint::GENERATOR;
        assert_eq!(
            proof.verify(CHALLENGE_DST, &h, &public, &t, &s, &w_bad),
            Err(TokenError::InvalidProof)
        );
    }

    #[test]
    fn dleqor2_verifies_for_either_keypair() {
        let mut rng = OsRng;
        let h = random_point(&mut rng);
        let keys: Vec<(Scalar, Scalar)> =
            (0..2).map(|_| (Scalar::random(&mut rng), Scalar::random(&mut rng))).collect();
        let pubs: Vec<ProjectivePoint> =
            keys.iter().map(|(x, y)| ProjectivePoint::GENERATOR * x + h * y).collect();
        let t = random_point(&mut rng);
        let s = random_point(&mut rng);

        for bit in 0..2u8 {
            let (x, y) = keys[usize::from(bit)];
            let w = t * x + s * y;
            let proof = DleqOr2Proof::prove(
                CHALLENGE_DST,
                &h,
                &pubs[0],
                &pubs[1],
                &t,
                &s,
                &w,
                &x,
                &y,
                Choice::from(bit),
                &mut rng,
            )
            .unwrap();
            proof.verify(CHALLENGE_DST, &h, &pubs[0], &pubs[1], &t, &s, &w).unwrap();
        }
    }

    #[test]
    fn dleqor2_rejects_foreign_keypair() {
        let mut rng = OsRng;
        let h = random_point(&mut rng);
        let x = Scalar::random(&mut rng);
        let y = Scalar::random(&mut rng);
        let pub0 = random_point(&mut rng);
        let pub1 = random_point(&mut rng);
        let t = random_point(&mut rng);
        let s = random_point(&mut rng);
        // W uses witnesses matching neither published keypair.
        let w = t * x + s * y;

        let proof = DleqOr2Proof::prove(
            CHALLENGE_DST,
            &h,
            &pub0,
            &pub1,
            &t,
            &s,
            &w,
            &x,
            &y,
            Choice::from(0u8),
            &mut rng,
        )
        .unwrap();
        assert_eq!(
            proof.verify(CHALLENGE_DST, &h, &pub0, &pub1, &t, &s, &w),
            Err(TokenError::InvalidProof)
        );
    }

    #[test]
    fn proof_codecs_round_trip() {
        let mut rng = OsRng;
        let key = Scalar::random(&mut rng);
        let public = ProjectivePoint::GENERATOR * key;
        let m = random_point(&mut rng);
        let z = m * key;
        let proof = DleqProof::prove(CHALLENGE_DST, &public, &m, &z, &key, &mut rng).unwrap();

        let mut writer = Writer::new();
        proof.encode(&mut writer);
        let bytes = writer.into_vec();
        assert_eq!(bytes.len(), DLEQ_PROOF_LEN);
        let mut reader = Reader::new(&bytes);
        let decoded = DleqProof::decode(&mut reader).unwrap();
        reader.expect_end().unwrap();
        assert_eq!(decoded, proof);
        decoded.verify(CHALLENGE_DST, &public, &m, &z).unwrap();
    }

    #[test]
    fn indexed_coefficients_are_transcript_bound() {
        let mut rng = OsRng;
        let p1 = random_point(&mut rng);
        let p2 = random_point(&mut rng);

        let a = indexed_coefficients(BATCH_DST, &[&p1, &p2], 3).unwrap();
        let b = indexed_coefficients(BATCH_DST, &[&p1, &p2], 3).unwrap();
        assert_eq!(a, b);
        assert_ne!(a[0], a[1]);

        // Reordering the transcript changes every coefficient.
        let c = indexed_coefficients(BATCH_DST, &[&p2, &p1], 3).unwrap();
        assert_ne!(a[0], c[0]);
    }

    #[test]
    fn seeded_coefficients_depend_on_entries() {
        let mut rng = OsRng;
        let blinded: Vec<ProjectivePoint> = (0..2).map(|_| random_point(&mut rng)).collect();
        let evaluated: Vec<ProjectivePoint> = (0..2).map(|_| random_point(&mut rng)).collect();

        let a = seeded_coefficients(BATCH_DST, b"seed-a", &blinded, &evaluated).unwrap();
        let b = seeded_coefficients(BATCH_DST, b"seed-a", &blinded, &evaluated).unwrap();
        assert_eq!(a, b);

        let c = seeded_coefficients(BATCH_DST, b"seed-b", &blinded, &evaluated).unwrap();
        assert_ne!(a[0], c[0]);

        let mut swapped = blinded.clone();
        swapped.swap(0, 1);
        let d = seeded_coefficients(BATCH_DST, b"seed-a", &swapped, &evaluated).unwrap();
        assert_ne!(a[0], d[0]);
    }
}
