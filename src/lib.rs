//! Decoding and validation of [W3C Verifiable Credentials][vc-data-model] and
//! Verifiable Presentations.
//!
//! Credentials and presentations are accepted in any of the encodings of the
//! data model:
//! - a JSON(-LD) document, optionally carrying embedded
//!   [Linked Data Proofs][ld-proofs];
//! - a [JWS][jws]-signed [JWT][jwt] with the document in its `vc` or `vp`
//!   claim; or
//! - an unsecured JWT (`"alg": "none"`).
//!
//! Decoding checks the document against the base JSON schema, optionally
//! checks that it survives JSON-LD compaction unchanged, and verifies its
//! signature or embedded proofs with keys supplied by a [`PublicKeyFetcher`].
//!
//! ```
//! use vcdm_codec::{Credential, DecodeOptions};
//!
//! let vc = r#"{
//!   "@context": ["https://www.w3.org/2018/credentials/v1"],
//!   "id": "http://example.edu/credentials/1872",
//!   "type": ["VerifiableCredential"],
//!   "credentialSubject": {"id": "did:example:ebfeb1f712ebc6f1c276e12ec21"},
//!   "issuer": "did:example:76e12ec712ebc6f1c221ebfeb1f",
//!   "issuanceDate": "2010-01-01T19:23:24Z"
//! }"#;
//! let options = DecodeOptions::default().with_disabled_proof_check();
//! let credential = Credential::decode(vc.as_bytes(), &options).unwrap();
//! assert_eq!(credential.id.as_deref(), Some("http://example.edu/credentials/1872"));
//! ```
//!
//! [vc-data-model]: <https://www.w3.org/TR/vc-data-model/>
//! [ld-proofs]: <https://w3c-ccg.github.io/ld-proofs/>
//! [jwt]: <https://www.rfc-editor.org/rfc/rfc7519>
//! [jws]: <https://www.rfc-editor.org/rfc/rfc7515>

pub mod decode;
pub mod error;
pub mod format;
pub mod jsonld;
pub mod jws;
pub mod jwt;
pub mod key;
pub mod ldp;
pub mod one_or_many;
pub mod schema;
pub mod vc;
pub mod vp;

pub use decode::{validate_credential, validate_presentation, DecodeOptions};
pub use error::{DocumentKind, Error};
pub use format::Format;
pub use jsonld::{ContextLoader, ContextMap, StaticLoader};
pub use jwt::{JwtClaims, NumericDate};
pub use key::{Ed25519Signer, P256Signer, PublicKey, PublicKeyFetcher, Signer};
pub use ldp::{JcsEd25519Signature2020, Proof, ProofValidity, SignatureSuite, SuiteRegistry};
pub use one_or_many::OneOrMany;
pub use vc::{Credential, Issuer, VCDateTime};
pub use vp::{CredentialItem, MarshalledCredential, Presentation};
