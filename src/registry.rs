//! Key rings for issuer and client sessions
//!
//! The issuer side maps caller-assigned 32-bit key ids to loaded secret
//! keys; public points are derived once at load time so repeated signing
//! reuses them. The client side holds a small list of public keys and looks
//! them up by the key id embedded in responses and tokens. Loading a
//! malformed blob never mutates a ring.

use std::collections::HashMap;

use crate::errors::{Result, TokenError};
use crate::pmb;
use crate::protocol::Protocol;
use crate::voprf;

#[derive(Debug, Clone)]
enum IssuerEntry {
    Pmb(pmb::IssuerKey),
    Voprf(voprf::IssuerKey),
}

#[derive(Debug, Clone)]
enum ClientEntry {
    Pmb(pmb::ClientKey),
    Voprf(voprf::ClientKey),
}

/// The issuer's key store.
#[derive(Debug, Default)]
pub struct IssuerKeyRing {
    keys: HashMap<u32, IssuerEntry>,
}

impl IssuerKeyRing {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Load a dual-keypair issuer key blob, returning its key id.
    pub fn load_pmb(&mut self, protocol: &Protocol, blob: &[u8]) -> Result<u32> {
        let key = pmb::IssuerKey::decode(protocol, blob)?;
        let key_id = key.key_id();
        self.keys.insert(key_id, IssuerEntry::Pmb(key));
        Ok(key_id)
    }

    /// Load a single-keypair issuer key blob, returning its key id.
    pub fn load_voprf(&mut self, blob: &[u8]) -> Result<u32> {
        let key = voprf::IssuerKey::decode(blob)?;
        let key_id = key.key_id();
        self.keys.insert(key_id, IssuerEntry::Voprf(key));
        Ok(key_id)
    }

    pub fn insert_pmb(&mut self, key: pmb::IssuerKey) -> u32 {
        let key_id = key.key_id();
        self.keys.insert(key_id, IssuerEntry::Pmb(key));
        key_id
    }

    pub fn insert_voprf(&mut self, key: voprf::IssuerKey) -> u32 {
        let key_id = key.key_id();
        self.keys.insert(key_id, IssuerEntry::Voprf(key));
        key_id
    }

    /// The dual-keypair key stored under `key_id`. A missing id or a key of
    /// the other kind is the same mismatch.
    pub fn pmb(&self, key_id: u32) -> Result<&pmb::IssuerKey> {
        match self.keys.get(&key_id) {
            Some(IssuerEntry::Pmb(key)) => Ok(key),
            _ => Err(TokenError::GroupMismatch),
        }
    }

    /// The single-keypair key stored under `key_id`.
    pub fn voprf(&self, key_id: u32) -> Result<&voprf::IssuerKey> {
        match self.keys.get(&key_id) {
            Some(IssuerEntry::Voprf(key)) => Ok(key),
            _ => Err(TokenError::GroupMismatch),
        }
    }

    /// Drop the key stored under `key_id`. Secret scalars are wiped as the
    /// entry is dropped. Returns whether a key was present.
    pub fn retire(&mut self, key_id: u32) -> bool {
        self.keys.remove(&key_id).is_some()
    }
}

/// The client's key store: sequential load order, looked up by key id.
#[derive(Debug, Default)]
pub struct ClientKeyRing {
    keys: Vec<ClientEntry>,
}

impl ClientKeyRing {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Load a dual-keypair client key blob, returning its ring index.
    pub fn load_pmb(&mut self, protocol: &Protocol, blob: &[u8]) -> Result<usize> {
        let key = pmb::ClientKey::decode(protocol, blob)?;
        self.keys.push(ClientEntry::Pmb(key));
        Ok(self.keys.len() - 1)
    }

    /// Load a single-keypair client key blob, returning its ring index.
    pub fn load_voprf(&mut self, protocol: &Protocol, blob: &[u8]) -> Result<usize> {
        let key = voprf::ClientKey::decode(protocol, blob)?;
        self.keys.push(ClientEntry::Voprf(key));
        Ok(self.keys.len() - 1)
    }

    /// Find the dual-keypair key matching the key id carried by a response
    /// or token.
    pub fn pmb_by_key_id(&self, key_id: u32) -> Result<&pmb::ClientKey> {
        self.keys
            .iter()
            .find_map(|entry| match entry {
                ClientEntry::Pmb(key) if key.key_id() == key_id => Some(key),
                _ => None,
            })
            .ok_or(TokenError::GroupMismatch)
    }

    /// Find the single-keypair key matching a carried key id.
    pub fn voprf_by_key_id(&self, key_id: u32) -> Result<&voprf::ClientKey> {
        self.keys
            .iter()
            .find_map(|entry| match entry {
                ClientEntry::Voprf(key) if key.key_id() == key_id => Some(key),
                _ => None,
            })
            .ok_or(TokenError::GroupMismatch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::Variant;
    use rand_core::OsRng;

    #[test]
    fn issuer_ring_loads_and_retires() {
        let protocol = Protocol::new(Variant::PmbP256Sha256);
        let key = pmb::IssuerKey::generate(&protocol, 5, &mut OsRng);
        let blob = key.encode();

        let mut ring = IssuerKeyRing::new();
        assert_eq!(ring.load_pmb(&protocol, &blob), Ok(5));
        assert_eq!(ring.len(), 1);
        assert_eq!(ring.pmb(5).unwrap().encode(), blob);

        assert!(ring.retire(5));
        assert!(!ring.retire(5));
        assert!(ring.is_empty());
        assert_eq!(ring.pmb(5).err(), Some(TokenError::GroupMismatch));
    }

    #[test]
    fn malformed_blob_does_not_mutate_the_ring() {
        let protocol = Protocol::new(Variant::PmbP256Sha256);
        let mut ring = IssuerKeyRing::new();
        assert_eq!(ring.load_pmb(&protocol, b"short"), Err(TokenError::DecodeFailure));
        assert!(ring.is_empty());

        let mut client_ring = ClientKeyRing::new();
        assert_eq!(
            client_ring.load_pmb(&protocol, b"short"),
            Err(TokenError::DecodeFailure)
        );
        assert!(client_ring.is_empty());
    }

    #[test]
    fn wrong_kind_accessor_is_a_mismatch() {
        let protocol = Protocol::new(Variant::PmbP256Sha256);
        let key = pmb::IssuerKey::generate(&protocol, 5, &mut OsRng);

        let mut ring = IssuerKeyRing::new();
        ring.insert_pmb(key);
        assert_eq!(ring.voprf(5).err(), Some(TokenError::GroupMismatch));
        assert!(ring.pmb(5).is_ok());
    }

    #[test]
    fn client_ring_finds_keys_by_carried_id() {
        let pmb_protocol = Protocol::new(Variant::PmbP256Sha256);
        let voprf_protocol = Protocol::new(Variant::VoprfP256Sha256);
        let pmb_key = pmb::IssuerKey::generate(&pmb_protocol, 21, &mut OsRng);
        let voprf_key = voprf::IssuerKey::generate(22, &mut OsRng);

        let mut ring = ClientKeyRing::new();
        let first = ring
            .load_pmb(&pmb_protocol, &pmb_key.client_key().encode(&pmb_protocol).unwrap())
            .unwrap();
        let second = ring
            .load_voprf(
                &voprf_protocol,
                &voprf_key.client_key().encode(&voprf_protocol).unwrap(),
            )
            .unwrap();
        assert_eq!((first, second), (0, 1));

        assert_eq!(ring.pmb_by_key_id(21).unwrap(), pmb_key.client_key());
        assert_eq!(ring.voprf_by_key_id(22).unwrap(), voprf_key.client_key());
        assert_eq!(ring.pmb_by_key_id(22).err(), Some(TokenError::GroupMismatch));
        assert_eq!(ring.voprf_by_key_id(23).err(), Some(TokenError::GroupMismatch));
    }

    #[test]
    fn issuer_ring_key_signs_after_load() {
        let protocol = Protocol::new(Variant::VoprfP256Sha256);
        let key = voprf::IssuerKey::generate(8, &mut OsRng);
        let client = key.client_key().clone();

        let mut ring = IssuerKeyRing::new();
        ring.load_voprf(&key.encode()).unwrap();

        let (pretokens, request) = voprf::blind(&protocol, 2, None, &mut OsRng).unwrap();
        let response =
            voprf::sign(&protocol, ring.voprf(8).unwrap(), &request, 2, &mut OsRng).unwrap();
        let tokens = voprf::unblind(&protocol, &client, &pretokens, &response).unwrap();
        assert_eq!(tokens.len(), 2);
    }
}
