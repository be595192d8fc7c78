// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Issuer signatures: Ed25519 over the document digest.
//
// The issuer's key pair is loaded once at startup and shared read-only. The
// verifier side never sees a private key: it holds an `IssuerRegistry` of
// public keys keyed by issuer id, passed explicitly into the engine.

use std::collections::HashMap;

use certitrust_core::config::TrustedIssuer;
use certitrust_core::error::{CertiTrustError, Result};
use certitrust_core::types::{Digest, Signature};
use ring::rand::SystemRandom;
use ring::signature::{ED25519, Ed25519KeyPair, KeyPair, UnparsedPublicKey};
use tracing::{debug, instrument};

/// Raw Ed25519 public key length.
pub const PUBLIC_KEY_LEN: usize = 32;

/// A distributable Ed25519 public key.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct PublicKey(pub [u8; PUBLIC_KEY_LEN]);

impl PublicKey {
    pub fn from_hex(s: &str) -> Result<Self> {
        let bytes = hex::decode(s)
            .map_err(|e| CertiTrustError::KeyMaterial(format!("public key is not hex: {e}")))?;
        Self::from_slice(&bytes)
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let array: [u8; PUBLIC_KEY_LEN] = bytes.try_into().map_err(|_| {
            CertiTrustError::KeyMaterial(format!(
                "public key must be {PUBLIC_KEY_LEN} bytes, got {}",
                bytes.len()
            ))
        })?;
        Ok(Self(array))
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl std::fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "PublicKey({})", self.to_hex())
    }
}

/// The issuer's Ed25519 key pair.
///
/// The private half never leaves this struct: there is no accessor for it and
/// `Debug` prints only the public key.
pub struct IssuerKeyPair {
    key_pair: Ed25519KeyPair,
    public_key: PublicKey,
}

impl IssuerKeyPair {
    /// Generate a fresh key pair using the OS CSPRNG.
    ///
    /// Returns the pair together with its PKCS#8 v2 DER encoding so the
    /// caller can persist it (e.g. sealed with age). The DER is the only
    /// copy of the secret that ever leaves this module.
    #[instrument]
    pub fn generate() -> Result<(Self, Vec<u8>)> {
        let rng = SystemRandom::new();
        let pkcs8 = Ed25519KeyPair::generate_pkcs8(&rng)
            .map_err(|_| CertiTrustError::KeyMaterial("key generation failed".into()))?;
        let pkcs8_der = pkcs8.as_ref().to_vec();
        let pair = Self::from_pkcs8(&pkcs8_der)?;
        debug!(public_key = %pair.public_key.to_hex(), "Ed25519 key pair generated");
        Ok((pair, pkcs8_der))
    }

    /// Parse a PKCS#8 DER private key (v1 without the public key, or v2).
    pub fn from_pkcs8(der: &[u8]) -> Result<Self> {
        let key_pair = Ed25519KeyPair::from_pkcs8_maybe_unchecked(der)
            .map_err(|e| CertiTrustError::KeyMaterial(format!("PKCS#8 rejected: {e}")))?;
        let public_key = PublicKey::from_slice(key_pair.public_key().as_ref())?;
        Ok(Self {
            key_pair,
            public_key,
        })
    }

    pub fn public_key(&self) -> PublicKey {
        self.public_key
    }

    /// Sign exactly the digest bytes. Ed25519 is deterministic.
    pub fn sign(&self, digest: &Digest) -> Signature {
        Signature(self.key_pair.sign(digest.as_bytes()).as_ref().to_vec())
    }
}

impl std::fmt::Debug for IssuerKeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IssuerKeyPair")
            .field("public_key", &self.public_key)
            .field("private_key", &"<redacted>")
            .finish()
    }
}

/// Check `signature` over `digest` with `public_key`.
///
/// Never errors: malformed or wrong-length signatures simply do not verify.
pub fn verify_signature(public_key: &PublicKey, digest: &Digest, signature: &Signature) -> bool {
    UnparsedPublicKey::new(&ED25519, public_key.0)
        .verify(digest.as_bytes(), signature.as_bytes())
        .is_ok()
}

/// Public keys the verifier trusts, keyed by issuer id.
#[derive(Debug, Clone, Default)]
pub struct IssuerRegistry {
    keys: HashMap<String, PublicKey>,
}

impl IssuerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from the `trusted_issuers` configuration section.
    pub fn from_config(trusted: &[TrustedIssuer]) -> Result<Self> {
        let mut registry = Self::new();
        for issuer in trusted {
            registry.insert(&issuer.issuer_id, PublicKey::from_hex(&issuer.public_key_hex)?);
        }
        Ok(registry)
    }

    pub fn insert(&mut self, issuer_id: impl Into<String>, public_key: PublicKey) {
        self.keys.insert(issuer_id.into(), public_key);
    }

    pub fn get(&self, issuer_id: &str) -> Option<&PublicKey> {
        self.keys.get(issuer_id)
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// `None` when the issuer is unknown, otherwise the signature check.
    pub fn verify(&self, issuer_id: &str, digest: &Digest, signature: &Signature) -> Option<bool> {
        self.get(issuer_id)
            .map(|key| verify_signature(key, digest, signature))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn digest(byte: u8) -> Digest {
        Digest([byte; 32])
    }

    #[test]
    fn generate_key_pair() {
        let (pair, der) = IssuerKeyPair::generate().expect("key generation failed");
        assert!(der.len() > 48, "PKCS#8 v2 DER looks too short");
        assert_eq!(pair.public_key().0.len(), PUBLIC_KEY_LEN);
    }

    #[test]
    fn sign_and_verify() {
        let (pair, _) = IssuerKeyPair::generate().unwrap();
        let sig = pair.sign(&digest(1));
        assert_eq!(sig.as_bytes().len(), 64);
        assert!(verify_signature(&pair.public_key(), &digest(1), &sig));
    }

    #[test]
    fn altered_digest_does_not_verify() {
        let (pair, _) = IssuerKeyPair::generate().unwrap();
        let sig = pair.sign(&digest(1));
        assert!(!verify_signature(&pair.public_key(), &digest(2), &sig));
    }

    #[test]
    fn other_key_does_not_verify() {
        let (a, _) = IssuerKeyPair::generate().unwrap();
        let (b, _) = IssuerKeyPair::generate().unwrap();
        let sig = b.sign(&digest(9));
        assert!(!verify_signature(&a.public_key(), &digest(9), &sig));
    }

    #[test]
    fn malformed_signature_returns_false() {
        let (pair, _) = IssuerKeyPair::generate().unwrap();
        for bad in [vec![], vec![0u8; 10], vec![0xffu8; 64], vec![1u8; 200]] {
            assert!(!verify_signature(&pair.public_key(), &digest(3), &Signature(bad)));
        }
    }

    #[test]
    fn signing_is_deterministic() {
        let (pair, _) = IssuerKeyPair::generate().unwrap();
        assert_eq!(pair.sign(&digest(4)), pair.sign(&digest(4)));
    }

    #[test]
    fn reload_from_pkcs8_keeps_identity() {
        let (pair, der) = IssuerKeyPair::generate().unwrap();
        let reloaded = IssuerKeyPair::from_pkcs8(&der).unwrap();
        assert_eq!(reloaded.public_key(), pair.public_key());
    }

    #[test]
    fn garbage_pkcs8_is_rejected_without_echoing_bytes() {
        let err = IssuerKeyPair::from_pkcs8(b"not a key at all").unwrap_err();
        assert!(matches!(err, CertiTrustError::KeyMaterial(_)));
        assert!(!err.to_string().contains("not a key at all"));
    }

    #[test]
    fn debug_redacts_private_key() {
        let (pair, _) = IssuerKeyPair::generate().unwrap();
        let rendered = format!("{pair:?}");
        assert!(rendered.contains("<redacted>"));
        assert!(rendered.contains(&pair.public_key().to_hex()));
    }

    #[test]
    fn registry_lookup_and_verify() {
        let (pair, _) = IssuerKeyPair::generate().unwrap();
        let registry = IssuerRegistry::from_config(&[TrustedIssuer {
            issuer_id: "registrar".into(),
            public_key_hex: pair.public_key().to_hex(),
        }])
        .unwrap();

        let sig = pair.sign(&digest(5));
        assert_eq!(registry.verify("registrar", &digest(5), &sig), Some(true));
        assert_eq!(registry.verify("registrar", &digest(6), &sig), Some(false));
        assert_eq!(registry.verify("stranger", &digest(5), &sig), None);
    }
}
