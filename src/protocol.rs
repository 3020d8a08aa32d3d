//! Protocol variant descriptors
//!
//! A [`Protocol`] value bundles everything a session needs to know about the
//! variant in use: hash domain-separation tags, the point wire format, the
//! batching transcript strategy and whether tokens carry a private metadata
//! bit. It also holds the variant's derived second generator, computed once
//! at construction and shared by reference afterwards; nothing here is ever
//! mutated.

use p256::ProjectivePoint;

use crate::hash2curve::hash_to_curve;

/// The closed set of supported protocol variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Variant {
    /// Dual-keypair issuance carrying one private metadata bit per batch.
    PmbP256Sha256,
    /// Single-keypair issuance without metadata.
    VoprfP256Sha256,
}

/// Wire encoding convention for points.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointFormat {
    /// Fixed-width compressed SEC1 (33 bytes).
    Compressed,
    /// 2-byte length prefix followed by uncompressed SEC1 (65 bytes).
    LengthPrefixedUncompressed,
}

/// Strategy for deriving batch-combination coefficients.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Batching {
    /// Per-index hashing of the full point transcript digest.
    Indexed,
    /// A seed derived from the public key, then per-entry coefficients.
    Seeded,
}

/// Domain-separation tags for one variant, all distinct and non-empty.
#[derive(Debug, Clone, Copy)]
pub(crate) struct DstSet {
    /// Token nonce to curve point.
    pub token: &'static [u8],
    /// Issuer's per-token response point (dual-keypair variant only).
    pub response: &'static [u8],
    /// Fiat-Shamir challenges.
    pub challenge: &'static [u8],
    /// Batch-combination coefficients.
    pub batch: &'static [u8],
    /// Key derivation from a caller-supplied secret.
    pub key: &'static [u8],
    /// The derived second generator.
    pub generator: &'static [u8],
}

const PMB_DST: DstSet = DstSet {
    token: b"ATPMB-V01-P256-SHA256-SSWU-RO-Token",
    response: b"ATPMB-V01-P256-SHA256-SSWU-RO-Response",
    challenge: b"ATPMB-V01-P256-SHA256-SSWU-RO-Challenge",
    batch: b"ATPMB-V01-P256-SHA256-SSWU-RO-Batch",
    key: b"ATPMB-V01-P256-SHA256-SSWU-RO-KeyDerive",
    generator: b"ATPMB-V01-P256-SHA256-SSWU-RO-GeneratorH",
};

const VOPRF_DST: DstSet = DstSet {
    token: b"ATVOPRF-V01-P256-SHA256-SSWU-RO-Token",
    response: b"ATVOPRF-V01-P256-SHA256-SSWU-RO-Response",
    challenge: b"ATVOPRF-V01-P256-SHA256-SSWU-RO-Challenge",
    batch: b"ATVOPRF-V01-P256-SHA256-SSWU-RO-Batch",
    key: b"ATVOPRF-V01-P256-SHA256-SSWU-RO-KeyDerive",
    generator: b"ATVOPRF-V01-P256-SHA256-SSWU-RO-GeneratorH",
};

/// Immutable per-variant configuration, created once and threaded by
/// reference through every issuer and client call.
#[derive(Debug, Clone)]
pub struct Protocol {
    variant: Variant,
    point_format: PointFormat,
    batching: Batching,
    private_metadata: bool,
    dst: DstSet,
    generator_h: ProjectivePoint,
}

impl Protocol {
    /// Build the configuration for a variant.
    pub fn new(variant: Variant) -> Self {
        let (point_format, batching, private_metadata, dst) = match variant {
            Variant::PmbP256Sha256 => {
                (PointFormat::LengthPrefixedUncompressed, Batching::Indexed, true, PMB_DST)
            }
            Variant::VoprfP256Sha256 => (PointFormat::Compressed, Batching::Seeded, false, VOPRF_DST),
        };
        // The tag is a non-empty compile-time constant; hash_to_curve cannot
        // fail on it.
        let generator_h = hash_to_curve(dst.generator, dst.generator).unwrap();
        Self { variant, point_format, batching, private_metadata, dst, generator_h }
    }

    pub fn variant(&self) -> Variant {
        self.variant
    }

    pub fn point_format(&self) -> PointFormat {
        self.point_format
    }

    pub fn batching(&self) -> Batching {
        self.batching
    }

    /// Whether tokens issued under this variant carry a private metadata bit.
    pub fn supports_private_metadata(&self) -> bool {
        self.private_metadata
    }

    /// The variant's second fixed generator, independent of the standard one.
    pub(crate) fn generator_h(&self) -> &ProjectivePoint {
        &self.generator_h
    }

    pub(crate) fn dst(&self) -> &DstSet {
        &self.dst
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use p256::elliptic_curve::Group;

    #[test]
    fn generators_are_independent() {
        let pmb = Protocol::new(Variant::PmbP256Sha256);
        let voprf = Protocol::new(Variant::VoprfP256Sha256);

        assert!(!bool::from(pmb.generator_h().is_identity()));
        assert!(!bool::from(voprf.generator_h().is_identity()));
        assert_ne!(pmb.generator_h().to_affine(), ProjectivePoint::GENERATOR.to_affine());
        assert_ne!(pmb.generator_h().to_affine(), voprf.generator_h().to_affine());
    }

    #[test]
    fn descriptor_matches_variant() {
        let pmb = Protocol::new(Variant::PmbP256Sha256);
        assert!(pmb.supports_private_metadata());
        assert_eq!(pmb.point_format(), PointFormat::LengthPrefixedUncompressed);
        assert_eq!(pmb.batching(), Batching::Indexed);

        let voprf = Protocol::new(Variant::VoprfP256Sha256);
        assert!(!voprf.supports_private_metadata());
        assert_eq!(voprf.point_format(), PointFormat::Compressed);
        assert_eq!(voprf.batching(), Batching::Seeded);
    }
}
