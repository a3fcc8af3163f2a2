use std::borrow::Cow;
use std::str::FromStr;

use chrono::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::decode::{self, DecodeOptions};
use crate::error::{DocumentKind, Error};
use crate::jsonld::CREDENTIALS_V1_CONTEXT;
use crate::jwt::{JwtClaims, NumericDate};
use crate::key::Signer;
use crate::ldp::{JcsEd25519Signature2020, Proof};
use crate::one_or_many::OneOrMany;
use crate::vp::{CredentialItem, Presentation};

// ********************************************
// * Data Structures for Verifiable Credentials
// * W3C Recommendation 19 November 2019
// * https://www.w3.org/TR/vc-data-model/
// ********************************************

pub const DEFAULT_CONTEXT: &str = CREDENTIALS_V1_CONTEXT;

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Credential {
    #[serde(rename = "@context")]
    pub context: Contexts,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(rename = "type")]
    pub type_: OneOrMany<String>,
    #[serde(default)]
    #[serde(skip_serializing_if = "Value::is_null")]
    pub credential_subject: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub issuer: Option<Issuer>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub issuance_date: Option<VCDateTime>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expiration_date: Option<VCDateTime>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub credential_status: Option<TypedObject>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub credential_schema: Option<OneOrMany<TypedObject>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub evidence: Option<OneOrMany<TypedObject>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub terms_of_use: Option<OneOrMany<TypedObject>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_service: Option<OneOrMany<TypedObject>>,
    // This field is populated only when using
    // embedded proofs such as LD-PROOF
    //   https://w3c-ccg.github.io/ld-proofs/
    #[serde(skip_serializing_if = "Option::is_none")]
    pub proof: Option<OneOrMany<Proof>>,
    #[serde(flatten)]
    pub property_set: Map<String, Value>,
}

pub type Contexts = OneOrMany<Context>;

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(untagged)]
pub enum Context {
    URI(String),
    Object(Map<String, Value>),
}

/// Context URIs in document order.
pub fn context_uris(contexts: &Contexts) -> Vec<&str> {
    contexts
        .iter()
        .filter_map(|context| match context {
            Context::URI(uri) => Some(uri.as_str()),
            Context::Object(_) => None,
        })
        .collect()
}

/// Inline (object) contexts in document order.
pub fn custom_contexts(contexts: &Contexts) -> Vec<&Map<String, Value>> {
    contexts
        .iter()
        .filter_map(|context| match context {
            Context::URI(_) => None,
            Context::Object(object) => Some(object),
        })
        .collect()
}

/// RFC3339 date-time as used in VC Data Model
/// <https://www.w3.org/TR/vc-data-model/#issuance-date>
/// <https://www.w3.org/TR/vc-data-model/#expiration>
///
/// A parsed value is written back exactly as it was read, so that fractional
/// zero seconds or a `+00:00` offset survive re-encoding.
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(try_from = "String")]
#[serde(into = "String")]
pub struct VCDateTime {
    /// The date-time
    date_time: DateTime<FixedOffset>,
    /// Whether to use "Z" or "+00:00" when formatting the date-time in UTC
    use_z: bool,
    /// The text this value was parsed from
    lexical: Option<String>,
}

impl VCDateTime {
    pub fn date_time(&self) -> DateTime<FixedOffset> {
        self.date_time
    }

    /// The serialized form: the parsed text, or the RFC3339 formatting of a
    /// value built from a [`DateTime`].
    pub fn lexical(&self) -> Cow<'_, str> {
        match &self.lexical {
            Some(lexical) => Cow::Borrowed(lexical),
            None => Cow::Owned(
                self.date_time
                    .to_rfc3339_opts(chrono::SecondsFormat::AutoSi, self.use_z),
            ),
        }
    }
}

impl PartialEq for VCDateTime {
    fn eq(&self, other: &Self) -> bool {
        self.lexical() == other.lexical()
    }
}

impl FromStr for VCDateTime {
    type Err = chrono::format::ParseError;
    fn from_str(date_time: &str) -> Result<Self, Self::Err> {
        let use_z = date_time.ends_with('Z');
        let lexical = Some(date_time.to_string());
        let date_time = DateTime::parse_from_rfc3339(date_time)?;
        Ok(VCDateTime {
            date_time,
            use_z,
            lexical,
        })
    }
}

impl TryFrom<String> for VCDateTime {
    type Error = chrono::format::ParseError;
    fn try_from(date_time: String) -> Result<Self, Self::Error> {
        Self::from_str(&date_time)
    }
}

impl From<VCDateTime> for String {
    fn from(z_date_time: VCDateTime) -> String {
        match z_date_time.lexical {
            Some(lexical) => lexical,
            None => z_date_time
                .date_time
                .to_rfc3339_opts(chrono::SecondsFormat::AutoSi, z_date_time.use_z),
        }
    }
}

impl<Tz: chrono::TimeZone> From<DateTime<Tz>> for VCDateTime
where
    chrono::DateTime<chrono::FixedOffset>: From<chrono::DateTime<Tz>>,
{
    fn from(date_time: DateTime<Tz>) -> Self {
        Self {
            date_time: date_time.into(),
            use_z: true,
            lexical: None,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(untagged)]
pub enum Issuer {
    URI(String),
    Object(ObjectWithId),
}

impl Issuer {
    /// Return this issuer's id URI
    pub fn id(&self) -> &str {
        match self {
            Self::URI(uri) => uri,
            Self::Object(object_with_id) => &object_with_id.id,
        }
    }

    pub fn name(&self) -> Option<&str> {
        match self {
            Self::URI(_) => None,
            Self::Object(object_with_id) => object_with_id
                .property_set
                .get("name")
                .and_then(Value::as_str),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ObjectWithId {
    pub id: String,
    #[serde(flatten)]
    pub property_set: Map<String, Value>,
}

/// Object with optional `id` and `type`, such as a credential status, a
/// refresh service, evidence or terms of use.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct TypedObject {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(rename = "type")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub type_: Option<OneOrMany<String>>,
    #[serde(flatten)]
    pub property_set: Map<String, Value>,
}

impl Credential {
    /// Decode and validate a credential from any supported encoding.
    pub fn decode(data: &[u8], options: &DecodeOptions) -> Result<Self, Error> {
        let document = decode::decode_document(data, DocumentKind::Credential, options)?;
        Self::from_document(document.value)
    }

    /// Decode a credential without validating it or checking its proofs.
    pub fn decode_unverified(data: &[u8]) -> Result<Self, Error> {
        let document = decode::unwrap_document(data, DocumentKind::Credential)?;
        Self::from_document(document.value)
    }

    pub(crate) fn from_document(document: Value) -> Result<Self, Error> {
        Ok(serde_json::from_value(document)?)
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, Error> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn context_uris(&self) -> Vec<&str> {
        context_uris(&self.context)
    }

    pub fn custom_contexts(&self) -> Vec<&Map<String, Value>> {
        custom_contexts(&self.context)
    }

    /// Id of the (first) credential subject.
    pub fn subject_id(&self) -> Option<&str> {
        let subject = match &self.credential_subject {
            Value::Array(subjects) => subjects.first()?,
            subject => subject,
        };
        subject.get("id").and_then(Value::as_str)
    }

    pub fn add_proof(&mut self, proof: Proof) {
        self.proof = match self.proof.take() {
            None => Some(OneOrMany::One(proof)),
            Some(OneOrMany::One(existing)) => Some(OneOrMany::Many(vec![existing, proof])),
            Some(OneOrMany::Many(mut proofs)) => {
                proofs.push(proof);
                Some(OneOrMany::Many(proofs))
            }
        };
    }

    /// Create a `JcsEd25519Signature2020` proof of this credential. Existing
    /// proofs are not covered.
    pub fn generate_proof(&self, options: Proof, signer: &dyn Signer) -> Result<Proof, Error> {
        let document = serde_json::to_value(self)?;
        JcsEd25519Signature2020::sign(&document, options, signer)
    }

    /// JWT claims carrying this credential in `vc`.
    ///
    /// With `minimize`, the fields represented by registered claims are
    /// removed from the embedded credential.
    pub fn jwt_claims(&self, minimize: bool) -> Result<JwtClaims, Error> {
        let subject = self.subject_id().map(ToOwned::to_owned);
        let not_before = self
            .issuance_date
            .as_ref()
            .map(NumericDate::try_from)
            .transpose()?;
        let expiration_time = self
            .expiration_date
            .as_ref()
            .map(NumericDate::try_from)
            .transpose()?;
        let mut vc = match serde_json::to_value(self)? {
            Value::Object(vc) => vc,
            _ => return Err(Error::UnsupportedCredentialFormat),
        };
        if minimize {
            vc.remove("id");
            vc.remove("issuanceDate");
            vc.remove("expirationDate");
            match vc.get_mut("issuer") {
                Some(Value::Object(issuer)) => {
                    issuer.remove("id");
                }
                Some(_) => {
                    vc.remove("issuer");
                }
                None => {}
            }
            if subject.is_some() {
                if let Some(Value::Object(subject)) = vc.get_mut("credentialSubject") {
                    subject.remove("id");
                }
            }
        }
        Ok(JwtClaims {
            issuer: self.issuer.as_ref().map(|issuer| issuer.id().to_string()),
            subject,
            jwt_id: self.id.clone(),
            not_before,
            expiration_time,
            verifiable_credential: Some(vc),
            ..Default::default()
        })
    }

    /// A presentation holding only this credential.
    pub fn presentation(&self) -> Result<Presentation, Error> {
        let mut presentation = Presentation::new();
        presentation.set_credentials(vec![CredentialItem::Credential(self.clone())])?;
        Ok(presentation)
    }
}
