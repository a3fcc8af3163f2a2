//! Decode pipeline shared by credentials and presentations.
//!
//! Stages run in a fixed order and the first failing stage ends the decode:
//! format detection, token unwrapping (with the JWS signature check for
//! signed tokens), the proof presence check, schema validation, the strict
//! JSON-LD check and finally embedded proof verification.

use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::error::{DocumentKind, Error};
use crate::format::{self, Format};
use crate::jsonld::{self, ContextLoader, StaticLoader};
use crate::jwt;
use crate::key::PublicKeyFetcher;
use crate::ldp::{self, SignatureSuite, SuiteRegistry};
use crate::schema;

/// Options for decoding a credential or presentation.
#[derive(Clone)]
pub struct DecodeOptions {
    /// Resolves verification method references to public keys.
    pub fetcher: Option<Arc<dyn PublicKeyFetcher>>,
    /// Proof types accepted for embedded proofs.
    pub suites: SuiteRegistry,
    /// Skip every signature and proof check.
    pub disabled_proof_check: bool,
    /// Reject documents that change shape under JSON-LD compaction.
    pub strict_validation: bool,
    /// Resolves `@context` URLs for the strict check.
    pub loader: Arc<dyn ContextLoader>,
}

impl Default for DecodeOptions {
    fn default() -> Self {
        Self {
            fetcher: None,
            suites: SuiteRegistry::new(),
            disabled_proof_check: false,
            strict_validation: false,
            loader: Arc::new(StaticLoader),
        }
    }
}

impl fmt::Debug for DecodeOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DecodeOptions")
            .field("fetcher", &self.fetcher.as_ref().map(|_| "PublicKeyFetcher"))
            .field("suites", &self.suites)
            .field("disabled_proof_check", &self.disabled_proof_check)
            .field("strict_validation", &self.strict_validation)
            .finish()
    }
}

impl DecodeOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_public_key_fetcher(mut self, fetcher: Arc<dyn PublicKeyFetcher>) -> Self {
        self.fetcher = Some(fetcher);
        self
    }

    /// Replace the accepted proof types.
    pub fn with_signature_suites(mut self, suites: SuiteRegistry) -> Self {
        self.suites = suites;
        self
    }

    pub fn with_signature_suite(
        mut self,
        proof_type: impl Into<String>,
        suite: Arc<dyn SignatureSuite>,
    ) -> Self {
        self.suites.insert(proof_type, suite);
        self
    }

    pub fn with_disabled_proof_check(mut self) -> Self {
        self.disabled_proof_check = true;
        self
    }

    pub fn with_strict_validation(mut self) -> Self {
        self.strict_validation = true;
        self
    }

    pub fn with_context_loader(mut self, loader: Arc<dyn ContextLoader>) -> Self {
        self.loader = loader;
        self
    }
}

/// A document taken out of its encoding, both parsed and as JSON text.
///
/// For plain documents the text is the input itself, so embedded values can
/// be kept byte for byte.
#[derive(Debug, Clone)]
pub(crate) struct Document {
    pub(crate) value: Value,
    pub(crate) json: String,
}

impl Document {
    fn from_value(value: Value) -> Result<Self, Error> {
        let json = serde_json::to_string(&value)?;
        Ok(Self { value, json })
    }

    fn from_text(data: &[u8]) -> Result<Self, Error> {
        let value = serde_json::from_slice(data)?;
        let json = std::str::from_utf8(data)
            .map_err(|_| Error::UnsupportedCredentialFormat)?
            .trim()
            .to_string();
        Ok(Self { value, json })
    }
}

fn token_text(data: &[u8]) -> Result<&str, Error> {
    std::str::from_utf8(data).map_err(|e| Error::MalformedToken(e.to_string()))
}

fn has_proof(document: &Value) -> bool {
    match document.get("proof") {
        None | Some(Value::Null) => false,
        Some(Value::Array(proofs)) => !proofs.is_empty(),
        Some(_) => true,
    }
}

/// Detect the format and take the document out of its encoding, without
/// checking any signature.
pub(crate) fn unwrap_document(data: &[u8], kind: DocumentKind) -> Result<Document, Error> {
    let format = format::detect(data);
    log::debug!("{} input detected as {:?}", kind, format);
    match format {
        Format::PlainDocument => Document::from_text(data),
        Format::SignedToken | Format::UnsecuredToken => {
            let (_, claims) = jwt::decode_unverified(token_text(data)?)?;
            Document::from_value(claims.into_document(kind)?)
        }
    }
}

/// Run the whole pipeline for `kind` and return the validated document.
pub(crate) fn decode_document(
    data: &[u8],
    kind: DocumentKind,
    options: &DecodeOptions,
) -> Result<Document, Error> {
    let format = format::detect(data);
    log::debug!("{} input detected as {:?}", kind, format);
    let check_proofs = !options.disabled_proof_check;
    if !check_proofs {
        log::warn!("proof check is disabled, {} is not verified", kind);
    }

    let document = match format {
        Format::SignedToken => {
            let token = token_text(data)?;
            let (_, claims) = if check_proofs {
                let fetcher = options
                    .fetcher
                    .as_deref()
                    .ok_or(Error::MissingKeyResolver)?;
                jwt::decode_verify(token, fetcher)?
            } else {
                jwt::decode_unverified(token)?
            };
            Document::from_value(claims.into_document(kind)?)?
        }
        Format::UnsecuredToken => {
            let (_, claims) = jwt::decode_unverified(token_text(data)?)?;
            Document::from_value(claims.into_document(kind)?)?
        }
        Format::PlainDocument => Document::from_text(data)?,
    };

    // Only a plain document must carry an embedded proof. A signed token is
    // covered by its JWS signature and an unsecured token by nothing.
    if check_proofs && format == Format::PlainDocument && !has_proof(&document.value) {
        return Err(Error::ProofMissing);
    }
    let embedded_proofs =
        check_proofs && format != Format::SignedToken && has_proof(&document.value);

    schema::validate(&document.value, kind)?;
    if options.strict_validation {
        jsonld::check_equivalence(&document.value, options.loader.as_ref())?;
    }
    if embedded_proofs {
        ldp::verify_proofs(
            &document.value,
            &options.suites,
            options.fetcher.as_deref(),
        )?;
    }
    Ok(document)
}

fn validate(data: &[u8], kind: DocumentKind, options: &DecodeOptions) -> Result<(), Error> {
    let document = unwrap_document(data, kind)?;
    schema::validate(&document.value, kind)?;
    if options.strict_validation {
        jsonld::check_equivalence(&document.value, options.loader.as_ref())?;
    }
    Ok(())
}

/// Check a credential against the schema, and the JSON-LD context when
/// `options` asks for strict validation. Proofs are not checked.
pub fn validate_credential(data: &[u8], options: &DecodeOptions) -> Result<(), Error> {
    validate(data, DocumentKind::Credential, options)
}

/// Check a presentation against the schema, and the JSON-LD context when
/// `options` asks for strict validation. Proofs are not checked.
pub fn validate_presentation(data: &[u8], options: &DecodeOptions) -> Result<(), Error> {
    validate(data, DocumentKind::Presentation, options)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jwt::JwtClaims;
    use crate::key::{Ed25519Signer, FetchError, PublicKey, SingleKey};
    use crate::ldp::{JcsEd25519Signature2020, Proof};
    use serde_json::json;

    fn credential() -> Value {
        json!({
            "@context": [
                "https://www.w3.org/2018/credentials/v1",
                "https://www.w3.org/2018/credentials/examples/v1"
            ],
            "id": "http://example.edu/credentials/1872",
            "type": ["VerifiableCredential", "UniversityDegreeCredential"],
            "credentialSubject": {
                "id": "did:example:ebfeb1f712ebc6f1c276e12ec21",
                "degree": {"type": "BachelorDegree", "name": "Bachelor of Science and Arts"}
            },
            "issuer": "did:example:76e12ec712ebc6f1c221ebfeb1f",
            "issuanceDate": "2010-01-01T19:23:24Z"
        })
    }

    fn claims() -> JwtClaims {
        JwtClaims {
            issuer: Some("did:example:76e12ec712ebc6f1c221ebfeb1f".to_string()),
            verifiable_credential: Some(credential().as_object().unwrap().clone()),
            ..Default::default()
        }
    }

    fn unchecked() -> DecodeOptions {
        DecodeOptions::default().with_disabled_proof_check()
    }

    #[test]
    fn default_options() {
        let options = DecodeOptions::default();
        assert!(options.fetcher.is_none());
        assert!(options.suites.is_empty());
        assert!(!options.disabled_proof_check);
        assert!(!options.strict_validation);
        let debug = format!("{:?}", options.with_strict_validation());
        assert!(debug.contains("strict_validation: true"), "{}", debug);
    }

    #[test]
    fn plain_document_keeps_its_text() {
        let data = credential().to_string();
        let padded = format!("\n{}\n", data);
        let document =
            decode_document(padded.as_bytes(), DocumentKind::Credential, &unchecked()).unwrap();
        assert_eq!(document.json, data);
        assert_eq!(document.value, credential());
    }

    #[test]
    fn proof_missing_before_schema() {
        let mut vc = credential();
        vc.as_object_mut().unwrap().remove("type");
        let data = vc.to_string();
        let options = DecodeOptions::default();
        match decode_document(data.as_bytes(), DocumentKind::Credential, &options) {
            Err(Error::ProofMissing) => {}
            r => panic!("expected missing proof, got {:?}", r),
        }
        match decode_document(data.as_bytes(), DocumentKind::Credential, &unchecked()) {
            Err(Error::SchemaViolation { kind, .. }) => assert_eq!(kind, DocumentKind::Credential),
            r => panic!("expected schema violation, got {:?}", r),
        }
    }

    #[test]
    fn empty_proof_array_is_missing() {
        let mut vc = credential();
        vc["proof"] = json!([]);
        let data = vc.to_string();
        match decode_document(data.as_bytes(), DocumentKind::Credential, &DecodeOptions::default())
        {
            Err(Error::ProofMissing) => {}
            r => panic!("expected missing proof, got {:?}", r),
        }
    }

    #[test]
    fn signed_token_requires_fetcher() {
        let signer = Ed25519Signer::generate(Some(
            "did:example:76e12ec712ebc6f1c221ebfeb1f#key-1".to_string(),
        ))
        .unwrap();
        let token = claims().encode_signed(&signer).unwrap();
        match decode_document(token.as_bytes(), DocumentKind::Credential, &DecodeOptions::default())
        {
            Err(Error::MissingKeyResolver) => {}
            r => panic!("expected missing key resolver, got {:?}", r),
        }
        // without proof checks no fetcher is needed
        let document =
            decode_document(token.as_bytes(), DocumentKind::Credential, &unchecked()).unwrap();
        assert_eq!(document.value["id"], "http://example.edu/credentials/1872");
    }

    #[test]
    fn signed_token_verified_with_fetched_key() {
        let signer = Ed25519Signer::generate(Some(
            "did:example:76e12ec712ebc6f1c221ebfeb1f#key-1".to_string(),
        ))
        .unwrap();
        let token = claims().encode_signed(&signer).unwrap();
        let options = DecodeOptions::default()
            .with_public_key_fetcher(Arc::new(SingleKey(signer.public_key())));
        let document =
            decode_document(token.as_bytes(), DocumentKind::Credential, &options).unwrap();
        assert_eq!(document.value["issuer"], "did:example:76e12ec712ebc6f1c221ebfeb1f");

        let other = Ed25519Signer::generate(None).unwrap();
        let options = DecodeOptions::default()
            .with_public_key_fetcher(Arc::new(SingleKey(other.public_key())));
        match decode_document(token.as_bytes(), DocumentKind::Credential, &options) {
            Err(Error::InvalidProof(_)) => {}
            r => panic!("expected invalid proof, got {:?}", r),
        }

        let unknown = |issuer_id: &str, key_id: &str| -> Result<PublicKey, FetchError> {
            Err(format!("unknown key {}#{}", issuer_id, key_id).into())
        };
        let options = DecodeOptions::default().with_public_key_fetcher(Arc::new(unknown));
        match decode_document(token.as_bytes(), DocumentKind::Credential, &options) {
            Err(Error::KeyResolutionFailed { issuer_id, key_id, .. }) => {
                assert_eq!(issuer_id, "did:example:76e12ec712ebc6f1c221ebfeb1f");
                assert_eq!(key_id, "key-1");
            }
            r => panic!("expected key resolution failure, got {:?}", r),
        }
    }

    #[test]
    fn unsecured_token_without_proof() {
        let token = claims().encode_unsecured().unwrap();
        let document =
            decode_document(token.as_bytes(), DocumentKind::Credential, &DecodeOptions::default())
                .unwrap();
        assert_eq!(document.value["id"], "http://example.edu/credentials/1872");
        assert!(document.value.get("proof").is_none());

        // a proof it does carry is still verified
        let mut claims = claims();
        let vc = claims.verifiable_credential.as_mut().unwrap();
        vc.insert(
            "proof".to_string(),
            json!({
                "type": JcsEd25519Signature2020::TYPE,
                "verificationMethod": "did:example:76e12ec712ebc6f1c221ebfeb1f#key-1",
                "proofValue": "3yZe7d"
            }),
        );
        let token = claims.encode_unsecured().unwrap();
        match decode_document(token.as_bytes(), DocumentKind::Credential, &DecodeOptions::default())
        {
            Err(Error::UnsupportedProofType(t)) => assert_eq!(t, JcsEd25519Signature2020::TYPE),
            r => panic!("expected unsupported proof type, got {:?}", r),
        }
        decode_document(token.as_bytes(), DocumentKind::Credential, &unchecked()).unwrap();
    }

    #[test]
    fn embedded_proof_checked_after_schema() {
        let signer = Ed25519Signer::generate(None).unwrap();
        let mut vc = credential();
        let proof = JcsEd25519Signature2020::sign(
            &vc,
            Proof::new(JcsEd25519Signature2020::TYPE)
                .with_verification_method("did:example:76e12ec712ebc6f1c221ebfeb1f#key-1"),
            &signer,
        )
        .unwrap();
        vc["proof"] = serde_json::to_value(&proof).unwrap();
        let data = vc.to_string();

        // no suite registered
        match decode_document(data.as_bytes(), DocumentKind::Credential, &DecodeOptions::default())
        {
            Err(Error::UnsupportedProofType(t)) => assert_eq!(t, JcsEd25519Signature2020::TYPE),
            r => panic!("expected unsupported proof type, got {:?}", r),
        }

        let options = DecodeOptions::default()
            .with_signature_suites(SuiteRegistry::builtin())
            .with_public_key_fetcher(Arc::new(SingleKey(signer.public_key())));
        decode_document(data.as_bytes(), DocumentKind::Credential, &options).unwrap();

        vc["issuanceDate"] = json!("not a date");
        let data = vc.to_string();
        match decode_document(data.as_bytes(), DocumentKind::Credential, &options) {
            Err(Error::SchemaViolation { .. }) => {}
            r => panic!("expected schema violation, got {:?}", r),
        }
    }

    #[test]
    fn strict_validation() {
        let mut vc = credential();
        vc["favouriteColour"] = json!("blue");
        let data = vc.to_string();
        decode_document(data.as_bytes(), DocumentKind::Credential, &unchecked()).unwrap();
        match decode_document(
            data.as_bytes(),
            DocumentKind::Credential,
            &unchecked().with_strict_validation(),
        ) {
            Err(Error::JsonLdInconsistent { fields }) => {
                assert_eq!(fields, vec!["favouriteColour".to_string()])
            }
            r => panic!("expected JSON-LD inconsistency, got {:?}", r),
        }
    }

    #[test]
    fn validate_without_proofs() {
        let data = credential().to_string();
        validate_credential(data.as_bytes(), &DecodeOptions::default()).unwrap();
        let vp = json!({
            "@context": ["https://www.w3.org/2018/credentials/v1"],
            "type": "VerifiablePresentation"
        })
        .to_string();
        validate_presentation(vp.as_bytes(), &DecodeOptions::default().with_strict_validation())
            .unwrap();
        assert!(validate_presentation(data.as_bytes(), &DecodeOptions::default()).is_err());
    }
}
