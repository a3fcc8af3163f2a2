use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use ring::digest;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::Error;
use crate::jws::Algorithm;
use crate::key::{split_verification_method, KeyType, PublicKey, PublicKeyFetcher, Signer};
use crate::vc::VCDateTime;

// https://w3c-ccg.github.io/ld-proofs/

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Proof {
    #[serde(rename = "@context")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<Value>,
    #[serde(rename = "type")]
    pub type_: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub proof_purpose: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub proof_value: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub challenge: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub creator: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verification_method: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created: Option<VCDateTime>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nonce: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jws: Option<String>,
    #[serde(flatten)]
    pub property_set: Map<String, Value>,
}

impl Proof {
    pub fn new(type_: &str) -> Self {
        Self {
            context: None,
            type_: type_.to_string(),
            proof_purpose: None,
            proof_value: None,
            challenge: None,
            creator: None,
            verification_method: None,
            created: None,
            domain: None,
            nonce: None,
            jws: None,
            property_set: Map::new(),
        }
    }

    pub fn with_verification_method(self, verification_method: &str) -> Self {
        Self {
            verification_method: Some(verification_method.to_string()),
            ..self
        }
    }

    pub fn with_proof_purpose(self, proof_purpose: &str) -> Self {
        Self {
            proof_purpose: Some(proof_purpose.to_string()),
            ..self
        }
    }

    pub fn with_created(self, created: VCDateTime) -> Self {
        Self {
            created: Some(created),
            ..self
        }
    }

    /// The key reference of this proof. Older proofs name it `creator`.
    pub fn verification_method(&self) -> Option<&str> {
        self.verification_method
            .as_deref()
            .or(self.creator.as_deref())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProofValidity {
    Valid,
    Invalid,
}

impl ProofValidity {
    pub fn is_valid(self) -> bool {
        matches!(self, Self::Valid)
    }
}

impl From<bool> for ProofValidity {
    fn from(valid: bool) -> Self {
        if valid {
            Self::Valid
        } else {
            Self::Invalid
        }
    }
}

/// Verification algorithm of one proof type.
pub trait SignatureSuite: Send + Sync {
    /// Check `proof` against `document`, the JCS canonical form of the
    /// document it was attached to with its `proof` member removed.
    ///
    /// `proof_object` is the proof as it appears in the document. Suites that
    /// hash the proof options must hash this form, not a reserialization of
    /// `proof`.
    fn verify(
        &self,
        document: &[u8],
        proof: &Proof,
        proof_object: &Value,
        key: &PublicKey,
    ) -> Result<ProofValidity, Error>;
}

/// Proof type name to suite bindings.
#[derive(Clone, Default)]
pub struct SuiteRegistry {
    suites: HashMap<String, Arc<dyn SignatureSuite>>,
}

impl SuiteRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding the suites implemented by this crate.
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        registry.insert(
            JcsEd25519Signature2020::TYPE,
            Arc::new(JcsEd25519Signature2020),
        );
        registry
    }

    pub fn insert(&mut self, proof_type: impl Into<String>, suite: Arc<dyn SignatureSuite>) {
        self.suites.insert(proof_type.into(), suite);
    }

    pub fn get(&self, proof_type: &str) -> Option<&Arc<dyn SignatureSuite>> {
        self.suites.get(proof_type)
    }

    pub fn len(&self) -> usize {
        self.suites.len()
    }

    pub fn is_empty(&self) -> bool {
        self.suites.is_empty()
    }
}

impl fmt::Debug for SuiteRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&String> = self.suites.keys().collect();
        names.sort();
        f.debug_tuple("SuiteRegistry").field(&names).finish()
    }
}

/// JCS canonical bytes of `document` without its `proof` member.
pub fn canonical_document(document: &Value) -> Result<Vec<u8>, Error> {
    let mut unsigned = document.clone();
    if let Some(object) = unsigned.as_object_mut() {
        object.remove("proof");
    }
    Ok(serde_jcs::to_vec(&unsigned)?)
}

/// Verify every embedded proof of `document`. All of them must hold.
pub fn verify_proofs(
    document: &Value,
    suites: &SuiteRegistry,
    fetcher: Option<&dyn PublicKeyFetcher>,
) -> Result<(), Error> {
    let proofs: Vec<&Value> = match document.get("proof") {
        None | Some(Value::Null) => return Err(Error::ProofMissing),
        Some(Value::Array(proofs)) => proofs.iter().collect(),
        Some(proof) => vec![proof],
    };
    if proofs.is_empty() {
        return Err(Error::ProofMissing);
    }
    let canonical = canonical_document(document)?;
    for proof_object in proofs {
        let proof: Proof = serde_json::from_value(proof_object.clone())?;
        let suite = suites
            .get(&proof.type_)
            .ok_or_else(|| Error::UnsupportedProofType(proof.type_.clone()))?;
        let verification_method = proof.verification_method().ok_or_else(|| {
            Error::InvalidProof(format!("{} proof has no verification method", proof.type_))
        })?;
        let fetcher = fetcher.ok_or(Error::MissingKeyResolver)?;
        let (issuer_id, key_id) = split_verification_method(verification_method);
        let key = fetcher
            .fetch(issuer_id, key_id)
            .map_err(|e| Error::KeyResolutionFailed {
                issuer_id: issuer_id.to_string(),
                key_id: key_id.to_string(),
                reason: e.to_string(),
            })?;
        if !suite.verify(&canonical, &proof, proof_object, &key)?.is_valid() {
            return Err(Error::InvalidProof(format!(
                "{} signature of {} does not verify",
                proof.type_, verification_method
            )));
        }
        log::debug!("verified {} proof by {}", proof.type_, verification_method);
    }
    Ok(())
}

/// Ed25519 signature over the JCS canonical forms of the proof options and the
/// document, carried base58btc-encoded in `proofValue`.
#[derive(Debug, Clone, Copy, Default)]
pub struct JcsEd25519Signature2020;

impl JcsEd25519Signature2020 {
    pub const TYPE: &'static str = "JcsEd25519Signature2020";

    /// Digest of the proof options (the proof object without `proofValue`)
    /// followed by the digest of the canonical document.
    fn signing_input(document: &[u8], proof_object: &Value) -> Result<Vec<u8>, Error> {
        let mut options = proof_object.clone();
        if let Some(object) = options.as_object_mut() {
            object.remove("proofValue");
        }
        let options = serde_jcs::to_vec(&options)?;
        let options_digest = digest::digest(&digest::SHA256, &options);
        let document_digest = digest::digest(&digest::SHA256, document);
        Ok([options_digest.as_ref(), document_digest.as_ref()].concat())
    }

    /// Create a proof of `document` from the given proof options.
    pub fn sign(document: &Value, options: Proof, signer: &dyn Signer) -> Result<Proof, Error> {
        if signer.algorithm() != Algorithm::EdDSA {
            return Err(Error::Signing(format!(
                "{} requires an EdDSA signer, got {}",
                Self::TYPE,
                signer.algorithm()
            )));
        }
        let mut proof = Proof {
            type_: Self::TYPE.to_string(),
            proof_value: None,
            ..options
        };
        let canonical = canonical_document(document)?;
        let options = serde_json::to_value(&proof)?;
        let signature = signer.sign(&Self::signing_input(&canonical, &options)?)?;
        proof.proof_value = Some(bs58::encode(signature).into_string());
        Ok(proof)
    }
}

impl SignatureSuite for JcsEd25519Signature2020 {
    fn verify(
        &self,
        document: &[u8],
        proof: &Proof,
        proof_object: &Value,
        key: &PublicKey,
    ) -> Result<ProofValidity, Error> {
        if key.key_type != KeyType::Ed25519 {
            return Err(Error::InvalidProof(format!(
                "{} requires an Ed25519 key",
                Self::TYPE
            )));
        }
        let proof_value = proof
            .proof_value
            .as_deref()
            .ok_or_else(|| Error::InvalidProof("missing proofValue".to_string()))?;
        let signature = bs58::decode(proof_value)
            .into_vec()
            .map_err(|e| Error::InvalidProof(format!("proofValue: {}", e)))?;
        let message = Self::signing_input(document, proof_object)?;
        let valid = ring::signature::UnparsedPublicKey::new(&ring::signature::ED25519, &key.value)
            .verify(&message, &signature)
            .is_ok();
        Ok(valid.into())
    }
}
