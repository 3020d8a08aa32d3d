//! Keys for the single-keypair engine

use p256::{elliptic_curve::Field, ProjectivePoint, Scalar};
use rand_core::CryptoRngCore;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::common::random_nonzero_scalar;
use crate::errors::{Result, TokenError};
use crate::hash2curve::hash_to_scalar;
use crate::protocol::Protocol;
use crate::wire::{copy_into, Reader, Writer, SCALAR_LEN};

/// Wire size of an encoded issuer key.
pub const ISSUER_KEY_LEN: usize = 4 + SCALAR_LEN;

/// The issuer's single evaluation scalar, wiped on drop.
#[derive(Debug, Clone, Zeroize, ZeroizeOnDrop)]
pub struct IssuerKey {
    key_id: u32,
    xs: Scalar,
    #[zeroize(skip)]
    public: ClientKey,
}

/// The public commitment `xs * G`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientKey {
    key_id: u32,
    pubs: ProjectivePoint,
}

impl IssuerKey {
    pub fn generate<R: CryptoRngCore>(key_id: u32, rng: &mut R) -> Self {
        Self::from_scalar(key_id, random_nonzero_scalar(rng))
    }

    /// Deterministically derive the key from a caller-held secret.
    pub fn derive_from_secret(protocol: &Protocol, key_id: u32, secret: &[u8]) -> Result<Self> {
        let xs = hash_to_scalar(secret, protocol.dst().key)?;
        if bool::from(xs.is_zero()) {
            return Err(TokenError::KeygenFailure);
        }
        Ok(Self::from_scalar(key_id, xs))
    }

    fn from_scalar(key_id: u32, xs: Scalar) -> Self {
        let public = ClientKey { key_id, pubs: ProjectivePoint::GENERATOR * xs };
        Self { key_id, xs, public }
    }

    pub fn key_id(&self) -> u32 {
        self.key_id
    }

    pub fn client_key(&self) -> &ClientKey {
        &self.public
    }

    pub(crate) fn scalar(&self) -> &Scalar {
        &self.xs
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut writer = Writer::with_capacity(ISSUER_KEY_LEN);
        writer.put_u32(self.key_id);
        writer.put_scalar(&self.xs);
        writer.into_vec()
    }

    pub fn encode_into(&self, out: &mut [u8]) -> Result<usize> {
        copy_into(out, &self.encode())
    }

    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let mut reader = Reader::new(bytes);
        let key_id = reader.get_u32()?;
        let xs = reader.get_scalar()?;
        reader.expect_end()?;
        Ok(Self::from_scalar(key_id, xs))
    }
}

impl ClientKey {
    pub fn key_id(&self) -> u32 {
        self.key_id
    }

    pub(crate) fn public_point(&self) -> &ProjectivePoint {
        &self.pubs
    }

    pub fn encode(&self, protocol: &Protocol) -> Result<Vec<u8>> {
        let mut writer = Writer::new();
        writer.put_u32(self.key_id);
        writer.put_point(protocol.point_format(), &self.pubs)?;
        Ok(writer.into_vec())
    }

    pub fn encode_into(&self, protocol: &Protocol, out: &mut [u8]) -> Result<usize> {
        copy_into(out, &self.encode(protocol)?)
    }

    pub fn decode(protocol: &Protocol, bytes: &[u8]) -> Result<Self> {
        let mut reader = Reader::new(bytes);
        let key_id = reader.get_u32()?;
        let pubs = reader.get_point(protocol.point_format())?;
        reader.expect_end()?;
        Ok(Self { key_id, pubs })
    }
}
