//! Public key material and the capabilities used to obtain and use it.
//!
//! Key resolution is out of scope for this crate: callers plug in a
//! [`PublicKeyFetcher`] which maps a verification method reference to raw key
//! bytes. Signing is only needed to produce tokens and proofs, and is
//! provided for Ed25519 and P-256 keys through [`ring`].

use ring::rand::SystemRandom;
use ring::signature::KeyPair;

use crate::error::Error;
use crate::jws::Algorithm;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyType {
    Ed25519,
    /// NIST P-256, uncompressed SEC1 point.
    P256,
    /// RSA, DER-encoded `RSAPublicKey`.
    Rsa,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublicKey {
    pub key_type: KeyType,
    pub value: Vec<u8>,
}

impl PublicKey {
    pub fn ed25519(value: impl Into<Vec<u8>>) -> Self {
        Self {
            key_type: KeyType::Ed25519,
            value: value.into(),
        }
    }

    pub fn p256(value: impl Into<Vec<u8>>) -> Self {
        Self {
            key_type: KeyType::P256,
            value: value.into(),
        }
    }
}

pub type FetchError = Box<dyn std::error::Error + Send + Sync>;

/// Resolves a verification method to the key that can check its signatures.
///
/// `issuer_id` is the part of the reference before `#` (or the token issuer
/// when the reference is a bare key id) and `key_id` the part after it.
pub trait PublicKeyFetcher: Send + Sync {
    fn fetch(&self, issuer_id: &str, key_id: &str) -> Result<PublicKey, FetchError>;
}

impl<F> PublicKeyFetcher for F
where
    F: Fn(&str, &str) -> Result<PublicKey, FetchError> + Send + Sync,
{
    fn fetch(&self, issuer_id: &str, key_id: &str) -> Result<PublicKey, FetchError> {
        self(issuer_id, key_id)
    }
}

/// Fetcher that answers every request with the same key.
#[derive(Debug, Clone)]
pub struct SingleKey(pub PublicKey);

impl PublicKeyFetcher for SingleKey {
    fn fetch(&self, _issuer_id: &str, _key_id: &str) -> Result<PublicKey, FetchError> {
        Ok(self.0.clone())
    }
}

/// Split `did:example:123#key-1` into `("did:example:123", "key-1")`.
pub fn split_verification_method(verification_method: &str) -> (&str, &str) {
    match verification_method.split_once('#') {
        Some((issuer_id, key_id)) => (issuer_id, key_id),
        None => (verification_method, ""),
    }
}

pub trait Signer {
    fn algorithm(&self) -> Algorithm;
    fn key_id(&self) -> Option<&str>;
    fn sign(&self, data: &[u8]) -> Result<Vec<u8>, Error>;
}

pub struct Ed25519Signer {
    key_pair: ring::signature::Ed25519KeyPair,
    key_id: Option<String>,
}

impl Ed25519Signer {
    pub fn generate(key_id: Option<String>) -> Result<Self, Error> {
        let rng = SystemRandom::new();
        let pkcs8 = ring::signature::Ed25519KeyPair::generate_pkcs8(&rng)
            .map_err(|e| Error::Signing(e.to_string()))?;
        Self::from_pkcs8(pkcs8.as_ref(), key_id)
    }

    pub fn from_pkcs8(pkcs8: &[u8], key_id: Option<String>) -> Result<Self, Error> {
        let key_pair = ring::signature::Ed25519KeyPair::from_pkcs8(pkcs8)
            .map_err(|e| Error::Signing(e.to_string()))?;
        Ok(Self { key_pair, key_id })
    }

    pub fn public_key(&self) -> PublicKey {
        PublicKey::ed25519(self.key_pair.public_key().as_ref())
    }
}

impl Signer for Ed25519Signer {
    fn algorithm(&self) -> Algorithm {
        Algorithm::EdDSA
    }

    fn key_id(&self) -> Option<&str> {
        self.key_id.as_deref()
    }

    fn sign(&self, data: &[u8]) -> Result<Vec<u8>, Error> {
        Ok(self.key_pair.sign(data).as_ref().to_vec())
    }
}

pub struct P256Signer {
    key_pair: ring::signature::EcdsaKeyPair,
    rng: SystemRandom,
    key_id: Option<String>,
}

impl P256Signer {
    pub fn generate(key_id: Option<String>) -> Result<Self, Error> {
        let rng = SystemRandom::new();
        let pkcs8 = ring::signature::EcdsaKeyPair::generate_pkcs8(
            &ring::signature::ECDSA_P256_SHA256_FIXED_SIGNING,
            &rng,
        )
        .map_err(|e| Error::Signing(e.to_string()))?;
        let key_pair = ring::signature::EcdsaKeyPair::from_pkcs8(
            &ring::signature::ECDSA_P256_SHA256_FIXED_SIGNING,
            pkcs8.as_ref(),
            &rng,
        )
        .map_err(|e| Error::Signing(e.to_string()))?;
        Ok(Self {
            key_pair,
            rng,
            key_id,
        })
    }

    pub fn public_key(&self) -> PublicKey {
        PublicKey::p256(self.key_pair.public_key().as_ref())
    }
}

impl Signer for P256Signer {
    fn algorithm(&self) -> Algorithm {
        Algorithm::ES256
    }

    fn key_id(&self) -> Option<&str> {
        self.key_id.as_deref()
    }

    fn sign(&self, data: &[u8]) -> Result<Vec<u8>, Error> {
        let signature = self
            .key_pair
            .sign(&self.rng, data)
            .map_err(|e| Error::Signing(e.to_string()))?;
        Ok(signature.as_ref().to_vec())
    }
}
