//! Strict binary codec
//!
//! All integers are big-endian. Points travel either as fixed-width
//! compressed SEC1 or as a 2-byte length prefix followed by uncompressed
//! SEC1, depending on the protocol variant. Scalars are 32 canonical bytes.
//! Decoding is strict: non-canonical scalars, off-curve points, the point at
//! infinity and trailing bytes are all rejected, and every rejection maps to
//! the same [`TokenError::DecodeFailure`].

use elliptic_curve::{
    sec1::{FromEncodedPoint, ToEncodedPoint},
    Group, PrimeField,
};
use p256::{AffinePoint, EncodedPoint, ProjectivePoint, Scalar};

use crate::errors::{Result, TokenError};
use crate::protocol::PointFormat;

pub(crate) const SCALAR_LEN: usize = 32;
pub(crate) const COMPRESSED_POINT_LEN: usize = 33;
pub(crate) const UNCOMPRESSED_POINT_LEN: usize = 65;

/// Bytes a single point occupies on the wire under `format`, including any
/// length prefix.
pub(crate) fn point_wire_len(format: PointFormat) -> usize {
    match format {
        PointFormat::Compressed => COMPRESSED_POINT_LEN,
        PointFormat::LengthPrefixedUncompressed => 2 + UNCOMPRESSED_POINT_LEN,
    }
}

// {{{ Writer

/// Append-only encoder over a growable buffer.
pub(crate) struct Writer {
    buf: Vec<u8>,
}

impl Writer {
    pub fn new() -> Self {
        Self { buf: Vec::new() }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self { buf: Vec::with_capacity(capacity) }
    }

    pub fn put_bytes(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    pub fn put_u16(&mut self, value: u16) {
        self.buf.extend_from_slice(&value.to_be_bytes());
    }

    pub fn put_u32(&mut self, value: u32) {
        self.buf.extend_from_slice(&value.to_be_bytes());
    }

    pub fn put_scalar(&mut self, scalar: &Scalar) {
        self.buf.extend_from_slice(&scalar.to_bytes());
    }

    /// Encode a point under the variant's wire format.
    ///
    /// The point at infinity has no encoding in either format and is refused.
    pub fn put_point(&mut self, format: PointFormat, point: &ProjectivePoint) -> Result<()> {
        if bool::from(point.is_identity()) {
            return Err(TokenError::DecodeFailure);
        }
        let affine = point.to_affine();
        match format {
            PointFormat::Compressed => {
                self.buf.extend_from_slice(affine.to_encoded_point(true).as_bytes());
            }
            PointFormat::LengthPrefixedUncompressed => {
                let encoded = affine.to_encoded_point(false);
                self.put_u16(encoded.len() as u16);
                self.buf.extend_from_slice(encoded.as_bytes());
            }
        }
        Ok(())
    }

    pub fn into_vec(self) -> Vec<u8> {
        self.buf
    }
}

// }}}
// {{{ Reader

/// Cursor over an immutable input slice.
///
/// Callers must finish with [`Reader::expect_end`]; a decode that leaves
/// unread bytes behind is malformed.
pub(crate) struct Reader<'a> {
    buf: &'a [u8],
}

impl<'a> Reader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf }
    }

    pub fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        if self.buf.len() < n {
            return Err(TokenError::DecodeFailure);
        }
        let (head, tail) = self.buf.split_at(n);
        self.buf = tail;
        Ok(head)
    }

    pub fn get_u16(&mut self) -> Result<u16> {
        let bytes = self.take(2)?;
        Ok(u16::from_be_bytes([bytes[0], bytes[1]]))
    }

    pub fn get_u32(&mut self) -> Result<u32> {
        let bytes = self.take(4)?;
        Ok(u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    /// Read a canonical 32-byte scalar. Values at or above the group order
    /// are rejected rather than reduced.
    pub fn get_scalar(&mut self) -> Result<Scalar> {
        let bytes = self.take(SCALAR_LEN)?;
        let repr: [u8; SCALAR_LEN] = bytes.try_into().map_err(|_| TokenError::DecodeFailure)?;
        Option::<Scalar>::from(Scalar::from_repr(repr.into())).ok_or(TokenError::DecodeFailure)
    }

    /// Read a point under the variant's wire format. Off-curve encodings and
    /// the point at infinity are rejected.
    pub fn get_point(&mut self, format: PointFormat) -> Result<ProjectivePoint> {
        let bytes = match format {
            PointFormat::Compressed => self.take(COMPRESSED_POINT_LEN)?,
            PointFormat::LengthPrefixedUncompressed => {
                let len = usize::from(self.get_u16()?);
                if len != UNCOMPRESSED_POINT_LEN {
                    return Err(TokenError::DecodeFailure);
                }
                self.take(len)?
            }
        };
        decode_point_bytes(bytes)
    }

    pub fn remaining(&self) -> usize {
        self.buf.len()
    }

    /// Reject trailing bytes after a complete structure.
    pub fn expect_end(&self) -> Result<()> {
        if self.buf.is_empty() {
            Ok(())
        } else {
            Err(TokenError::DecodeFailure)
        }
    }
}

// }}}

fn decode_point_bytes(bytes: &[u8]) -> Result<ProjectivePoint> {
    let encoded = EncodedPoint::from_bytes(bytes).map_err(|_| TokenError::DecodeFailure)?;
    if encoded.is_identity() {
        return Err(TokenError::DecodeFailure);
    }
    let affine = Option::<AffinePoint>::from(AffinePoint::from_encoded_point(&encoded))
        .ok_or(TokenError::DecodeFailure)?;
    Ok(ProjectivePoint::from(affine))
}

/// Copy a finished encoding into a caller-owned buffer, returning the number
/// of bytes written.
pub(crate) fn copy_into(dst: &mut [u8], src: &[u8]) -> Result<usize> {
    if dst.len() < src.len() {
        return Err(TokenError::BufferTooSmall);
    }
    dst[..src.len()].copy_from_slice(src);
    Ok(src.len())
}
