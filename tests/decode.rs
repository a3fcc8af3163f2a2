use std::sync::Arc;

use serde_json::{json, Value};
use vcdm_codec::key::SingleKey;
use vcdm_codec::{
    Credential, CredentialItem, DecodeOptions, DocumentKind, Ed25519Signer, Error, Presentation,
    Proof, SuiteRegistry,
};

const UD_CREDENTIAL: &str = include_str!("ud-credential.json");
const UD_CREDENTIAL_WITHOUT_ID: &str = include_str!("ud-credential-without-id.json");
const UD_PRESENTATION: &str = include_str!("ud-presentation.json");
const UD_VERIFIABLE_PRESENTATION: &str = include_str!("ud-verifiable-presentation.json");

const ISSUER_KEY: &str = "did:example:76e12ec712ebc6f1c221ebfeb1f#keys-1";

fn init_logging() {
    // several tests may try to install the logger
    let _ = stderrlog::new().module("vcdm_codec").verbosity(4).init();
}

fn unchecked() -> DecodeOptions {
    DecodeOptions::default().with_disabled_proof_check()
}

fn signed_ud_credential(signer: &Ed25519Signer) -> Credential {
    let mut vc = Credential::decode_unverified(UD_CREDENTIAL.as_bytes()).unwrap();
    let proof = vc
        .generate_proof(
            Proof::new("JcsEd25519Signature2020")
                .with_verification_method(ISSUER_KEY)
                .with_proof_purpose("assertionMethod"),
            signer,
        )
        .unwrap();
    vc.add_proof(proof);
    vc
}

#[test]
fn embedded_proof_round_trip() {
    init_logging();
    let signer = Ed25519Signer::generate(None).unwrap();
    let vc = signed_ud_credential(&signer);
    let options = DecodeOptions::default()
        .with_signature_suites(SuiteRegistry::builtin())
        .with_public_key_fetcher(Arc::new(SingleKey(signer.public_key())));
    let decoded = Credential::decode(&vc.to_bytes().unwrap(), &options).unwrap();
    assert_eq!(decoded, vc);

    let mut tampered = vc.clone();
    tampered.credential_subject["degree"]["name"] = json!("Doctor of Philosophy");
    match Credential::decode(&tampered.to_bytes().unwrap(), &options) {
        Err(Error::InvalidProof(_)) => {}
        r => panic!("expected invalid proof, got {:?}", r),
    }
}

#[test]
fn unverified_decode_ignores_proofs() {
    // no proof at all
    Credential::decode_unverified(UD_CREDENTIAL.as_bytes()).unwrap();

    // a proof that does not verify
    let signer = Ed25519Signer::generate(None).unwrap();
    let mut vc = signed_ud_credential(&signer);
    vc.id = Some("http://example.edu/credentials/1873".to_string());
    let decoded = Credential::decode_unverified(&vc.to_bytes().unwrap()).unwrap();
    assert_eq!(decoded, vc);

    // a presentation proof of an unknown suite
    Presentation::decode_unverified(UD_VERIFIABLE_PRESENTATION.as_bytes()).unwrap();
}

#[test]
fn signed_token_without_fetcher() {
    let signer = Ed25519Signer::generate(Some(ISSUER_KEY.to_string())).unwrap();
    let vc = Credential::decode_unverified(UD_CREDENTIAL.as_bytes()).unwrap();
    let token = vc.jwt_claims(true).unwrap().encode_signed(&signer).unwrap();
    match Credential::decode(token.as_bytes(), &DecodeOptions::default()) {
        Err(Error::MissingKeyResolver) => {}
        r => panic!("expected missing key resolver, got {:?}", r),
    }

    let options =
        DecodeOptions::default().with_public_key_fetcher(Arc::new(SingleKey(signer.public_key())));
    let decoded = Credential::decode(token.as_bytes(), &options).unwrap();
    assert_eq!(decoded, vc);
}

#[test]
fn schema_violations_name_fields() {
    let mut vc: Value = serde_json::from_str(UD_CREDENTIAL).unwrap();
    vc.as_object_mut().unwrap().remove("type");
    match Credential::decode(vc.to_string().as_bytes(), &unchecked()) {
        Err(Error::SchemaViolation { kind, violations }) => {
            assert_eq!(kind, DocumentKind::Credential);
            assert_eq!(violations.0.len(), 1);
            assert!(violations.to_string().contains("\"type\""));
        }
        r => panic!("expected schema violation, got {:?}", r),
    }

    vc.as_object_mut().unwrap().remove("issuer");
    match Credential::decode(vc.to_string().as_bytes(), &unchecked()) {
        Err(Error::SchemaViolation { violations, .. }) => {
            let msg = violations.to_string();
            assert!(msg.contains("\"type\""), "{}", msg);
            assert!(msg.contains("\"issuer\""), "{}", msg);
        }
        r => panic!("expected schema violation, got {:?}", r),
    }
}

#[test]
fn university_degree_credential() {
    let vc = Credential::decode_unverified(UD_CREDENTIAL.as_bytes()).unwrap();
    assert_eq!(vc.id.as_deref(), Some("http://example.edu/credentials/1872"));
    let reencoded = Credential::decode_unverified(&vc.to_bytes().unwrap()).unwrap();
    assert_eq!(reencoded, vc);

    // strict mode accepts it: every term is defined by its contexts
    let options = unchecked().with_strict_validation();
    Credential::decode(UD_CREDENTIAL.as_bytes(), &options).unwrap();
}

#[test]
fn strict_validation_rejects_undefined_terms() {
    let mut vc: Value = serde_json::from_str(UD_CREDENTIAL).unwrap();
    vc["credentialSubject"]["favouriteColour"] = json!("blue");
    let data = vc.to_string();
    Credential::decode(data.as_bytes(), &unchecked()).unwrap();
    match Credential::decode(data.as_bytes(), &unchecked().with_strict_validation()) {
        Err(Error::JsonLdInconsistent { fields }) => {
            assert_eq!(fields, vec!["credentialSubject".to_string()]);
        }
        r => panic!("expected JSON-LD inconsistency, got {:?}", r),
    }
}

#[test]
fn strict_validation_rejects_protected_term_redefinition() {
    let mut vc: Value = serde_json::from_str(UD_CREDENTIAL).unwrap();
    vc["@context"]
        .as_array_mut()
        .unwrap()
        .push(json!({"credentialSubject": "https://evil.example/subject"}));
    let data = vc.to_string();
    Credential::decode(data.as_bytes(), &unchecked()).unwrap();
    match Credential::decode(data.as_bytes(), &unchecked().with_strict_validation()) {
        Err(Error::JsonLd(_)) => {}
        r => panic!("expected JSON-LD processing error, got {:?}", r),
    }
}

#[test]
fn dates_keep_their_form_through_signing() {
    let signer = Ed25519Signer::generate(None).unwrap();
    let mut document: Value = serde_json::from_str(UD_CREDENTIAL).unwrap();
    document["issuanceDate"] = json!("2010-01-01T19:23:24.000Z");
    document["expirationDate"] = json!("2020-01-01T19:23:24+00:00");
    let mut vc = Credential::decode_unverified(document.to_string().as_bytes()).unwrap();
    let proof = vc
        .generate_proof(
            Proof::new("JcsEd25519Signature2020")
                .with_verification_method(ISSUER_KEY)
                .with_created("2020-01-01T00:00:00.000Z".parse().unwrap()),
            &signer,
        )
        .unwrap();
    vc.add_proof(proof);

    let encoded = vc.to_bytes().unwrap();
    let text = String::from_utf8(encoded.clone()).unwrap();
    assert!(text.contains("\"2010-01-01T19:23:24.000Z\""));
    assert!(text.contains("\"2020-01-01T00:00:00.000Z\""));

    let options = DecodeOptions::default()
        .with_signature_suites(SuiteRegistry::builtin())
        .with_public_key_fetcher(Arc::new(SingleKey(signer.public_key())));
    let decoded = Credential::decode(&encoded, &options).unwrap();
    assert_eq!(decoded, vc);
    assert_eq!(decoded.to_bytes().unwrap(), encoded);
}

#[test]
fn empty_presentation() {
    let vp = json!({
        "@context": ["https://www.w3.org/2018/credentials/v1"],
        "type": "VerifiablePresentation"
    });
    let decoded = Presentation::decode(vp.to_string().as_bytes(), &unchecked()).unwrap();
    assert!(decoded.credentials().is_empty());
    let encoded: Value = serde_json::from_slice(&decoded.to_bytes().unwrap()).unwrap();
    assert!(encoded.get("verifiableCredential").is_none());
}

#[test]
fn presentation_fixtures() {
    let vp = Presentation::decode(
        UD_PRESENTATION.as_bytes(),
        &unchecked().with_strict_validation(),
    )
    .unwrap();
    assert_eq!(vp.credentials().len(), 1);
    assert_eq!(
        vp.credentials()[0].id.as_deref(),
        Some("https://example.com/credentials/9315d0fd-da93-436e-9e20-2121f2821df3")
    );
    assert!(vp.proof.is_none());

    let vp = Presentation::decode(UD_VERIFIABLE_PRESENTATION.as_bytes(), &unchecked()).unwrap();
    assert_eq!(vp.proof.as_ref().map(|p| p.len()), Some(1));

    // proof checks are on by default and nobody knows Ed25519Signature2018 here
    match Presentation::decode(
        UD_VERIFIABLE_PRESENTATION.as_bytes(),
        &DecodeOptions::default(),
    ) {
        Err(Error::UnsupportedProofType(t)) => assert_eq!(t, "Ed25519Signature2018"),
        r => panic!("expected unsupported proof type, got {:?}", r),
    }
    match Presentation::decode(UD_PRESENTATION.as_bytes(), &DecodeOptions::default()) {
        Err(Error::ProofMissing) => {}
        r => panic!("expected missing proof, got {:?}", r),
    }
}

#[test]
fn credential_without_id_in_presentation() {
    let credential: Value = serde_json::from_str(UD_CREDENTIAL_WITHOUT_ID).unwrap();
    let vp = json!({
        "@context": ["https://www.w3.org/2018/credentials/v1"],
        "type": ["VerifiablePresentation"],
        "verifiableCredential": [credential]
    });
    let vp = Presentation::decode(vp.to_string().as_bytes(), &unchecked()).unwrap();
    let vc = &vp.credentials()[0];
    assert!(vc.id.is_none());
    assert_eq!(
        vc.subject_id(),
        Some("did:example:ebfeb1f712ebc6f1c276e12ec21")
    );
    assert_eq!(
        vc.issuer.as_ref().map(|issuer| issuer.id()),
        Some("did:example:76e12ec712ebc6f1c221ebfeb1f")
    );
    assert!(vc.expiration_date.is_some());
}

#[test]
fn mixed_credential_forms() {
    let signer = Ed25519Signer::generate(Some(ISSUER_KEY.to_string())).unwrap();
    let vc = Credential::decode_unverified(UD_CREDENTIAL.as_bytes()).unwrap();
    let token = vc.jwt_claims(false).unwrap().encode_signed(&signer).unwrap();
    let object = r#"{"@context":["https://www.w3.org/2018/credentials/v1"],"type":"VerifiableCredential","issuer":"did:example:76e12ec712ebc6f1c221ebfeb1f","credentialSubject":{"id":"did:example:ebfeb1f712ebc6f1c276e12ec21"},"issuanceDate":"2010-01-01T19:23:24Z"}"#;

    let mut vp = Presentation::new();
    vp.holder = Some("did:example:ebfeb1f712ebc6f1c276e12ec21".to_string());
    vp.set_credentials(vec![
        CredentialItem::Bytes(object.as_bytes().to_vec()),
        CredentialItem::Token(token.clone()),
        CredentialItem::Credential(vc.clone()),
    ])
    .unwrap();
    let proof = vp
        .generate_proof(
            Proof::new("JcsEd25519Signature2020")
                .with_verification_method("did:example:ebfeb1f712ebc6f1c276e12ec21#keys-1"),
            &signer,
        )
        .unwrap();
    vp.add_proof(proof);

    let encoded = vp.to_bytes().unwrap();
    let text = String::from_utf8(encoded.clone()).unwrap();
    assert!(text.contains(object));
    assert!(text.contains(&format!("\"{}\"", token)));

    let options = DecodeOptions::default()
        .with_signature_suites(SuiteRegistry::builtin())
        .with_public_key_fetcher(Arc::new(SingleKey(signer.public_key())));
    let decoded = Presentation::decode(&encoded, &options).unwrap();
    assert_eq!(decoded.marshalled_credentials(), vp.marshalled_credentials());
    assert!(decoded.marshalled_credentials()[1].is_token());
    assert_eq!(decoded.credentials()[1], vc);
    assert_eq!(decoded.credentials()[2], vc);
    assert_eq!(decoded.to_bytes().unwrap(), encoded);
}

#[test]
fn presentation_token() {
    let signer = Ed25519Signer::generate(Some(
        "did:example:ebfeb1f712ebc6f1c276e12ec21#keys-1".to_string(),
    ))
    .unwrap();
    let vc = Credential::decode_unverified(UD_CREDENTIAL.as_bytes()).unwrap();
    let mut vp = vc.presentation().unwrap();
    vp.holder = Some("did:example:ebfeb1f712ebc6f1c276e12ec21".to_string());
    let claims = vp
        .jwt_claims(vec!["did:example:verifier".to_string()], true)
        .unwrap();
    let token = claims.encode_signed(&signer).unwrap();

    let options =
        DecodeOptions::default().with_public_key_fetcher(Arc::new(SingleKey(signer.public_key())));
    let decoded = Presentation::decode(token.as_bytes(), &options).unwrap();
    assert_eq!(decoded.holder, vp.holder);
    assert_eq!(decoded.credentials(), vp.credentials());

    let unsecured = claims.encode_unsecured().unwrap();
    let decoded = Presentation::decode_unverified(unsecured.as_bytes()).unwrap();
    assert_eq!(decoded, vp);
}
