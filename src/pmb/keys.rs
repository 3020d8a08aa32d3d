//! Keys for the dual-keypair engine
//!
//! Usage:
//! ```
//!     use atpmb::protocol::{Protocol, Variant};
//!     use atpmb::pmb::keys::IssuerKey;
//!
//!     let protocol = Protocol::new(Variant::PmbP256Sha256);
//!     let issuer_key = IssuerKey::generate(&protocol, 7, &mut rand_core::OsRng);
//!     let client_key = issuer_key.client_key().clone();
//! ```

use p256::{elliptic_curve::Field, ProjectivePoint, Scalar};
use rand_core::CryptoRngCore;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::common::random_nonzero_scalar;
use crate::errors::{Result, TokenError};
use crate::hash2curve::hash_to_scalar;
use crate::protocol::Protocol;
use crate::wire::{copy_into, Reader, Writer, SCALAR_LEN};

/// Wire size of an encoded issuer key.
pub const ISSUER_KEY_LEN: usize = 4 + 6 * SCALAR_LEN;

/// The issuer's secret key: two signing keypairs and the validity keypair.
///
/// Scalars are wiped on drop; the derived public half is plain data.
#[derive(Debug, Clone, Zeroize, ZeroizeOnDrop)]
pub struct IssuerKey {
    key_id: u32,
    x0: Scalar,
    y0: Scalar,
    x1: Scalar,
    y1: Scalar,
    xs: Scalar,
    ys: Scalar,
    #[zeroize(skip)]
    public: ClientKey,
}

/// The client's view of an issuer key: the three public commitments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientKey {
    key_id: u32,
    pub0: ProjectivePoint,
    pub1: ProjectivePoint,
    pubs: ProjectivePoint,
}

impl IssuerKey {
    pub fn generate<R: CryptoRngCore>(protocol: &Protocol, key_id: u32, rng: &mut R) -> Self {
        let scalars: [Scalar; 6] = core::array::from_fn(|_| random_nonzero_scalar(rng));
        Self::from_scalars(protocol, key_id, scalars)
    }

    /// Deterministically derive a key from a caller-held secret.
    ///
    /// Each scalar gets its own domain-separated hash of the secret; a
    /// derived zero scalar makes the whole derivation fail rather than
    /// producing a degenerate keypair.
    pub fn derive_from_secret(protocol: &Protocol, key_id: u32, secret: &[u8]) -> Result<Self> {
        let mut scalars = [Scalar::ZERO; 6];
        for (i, slot) in scalars.iter_mut().enumerate() {
            let mut input = Vec::with_capacity(1 + secret.len());
            input.push(i as u8);
            input.extend_from_slice(secret);
            let scalar = hash_to_scalar(&input, protocol.dst().key)?;
            if bool::from(scalar.is_zero()) {
                return Err(TokenError::KeygenFailure);
            }
            *slot = scalar;
        }
        Ok(Self::from_scalars(protocol, key_id, scalars))
    }

    fn from_scalars(protocol: &Protocol, key_id: u32, scalars: [Scalar; 6]) -> Self {
        let [x0, y0, x1, y1, xs, ys] = scalars;
        let g = ProjectivePoint::GENERATOR;
        let h = *protocol.generator_h();
        let public = ClientKey {
            key_id,
            pub0: g * x0 + h * y0,
            pub1: g * x1 + h * y1,
            pubs: g * xs + h * ys,
        };
        Self { key_id, x0, y0, x1, y1, xs, ys, public }
    }

    pub fn key_id(&self) -> u32 {
        self.key_id
    }

    pub fn client_key(&self) -> &ClientKey {
        &self.public
    }

    pub(crate) fn signing_scalars(&self) -> [&Scalar; 4] {
        [&self.x0, &self.y0, &self.x1, &self.y1]
    }

    pub(crate) fn validity_scalars(&self) -> (&Scalar, &Scalar) {
        (&self.xs, &self.ys)
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut writer = Writer::with_capacity(ISSUER_KEY_LEN);
        writer.put_u32(self.key_id);
        for scalar in [&self.x0, &self.y0, &self.x1, &self.y1, &self.xs, &self.ys] {
            writer.put_scalar(scalar);
        }
        writer.into_vec()
    }

    pub fn encode_into(&self, out: &mut [u8]) -> Result<usize> {
        copy_into(out, &self.encode())
    }

    pub fn decode(protocol: &Protocol, bytes: &[u8]) -> Result<Self> {
        let mut reader = Reader::new(bytes);
        let key_id = reader.get_u32()?;
        let mut scalars = [Scalar::ZERO; 6];
        for slot in scalars.iter_mut() {
            *slot = reader.get_scalar()?;
        }
        reader.expect_end()?;
        Ok(Self::from_scalars(protocol, key_id, scalars))
    }
}

impl ClientKey {
    pub fn key_id(&self) -> u32 {
        self.key_id
    }

    pub(crate) fn publics(&self) -> (&ProjectivePoint, &ProjectivePoint, &ProjectivePoint) {
        (&self.pub0, &self.pub1, &self.pubs)
    }

    pub fn encode(&self, protocol: &Protocol) -> Result<Vec<u8>> {
        let mut writer = Writer::new();
        writer.put_u32(self.key_id);
        for point in [&self.pub0, &self.pub1, &self.pubs] {
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
        let pub0 = reader.get_point(protocol.point_format())?;
        let pub1 = reader.get_point(protocol.point_format())?;
        let pubs = reader.get_point(protocol.point_format())?;
        reader.expect_end()?;
        Ok(Self { key_id, pub0, pub1, pubs })
    }
}
