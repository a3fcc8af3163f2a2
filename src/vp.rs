use serde::{Deserialize, Serialize, Serializer};
use serde_json::value::RawValue;
use serde_json::{Map, Value};

use crate::decode::{self, DecodeOptions};
use crate::error::{DocumentKind, Error};
use crate::format;
use crate::jwt::JwtClaims;
use crate::key::Signer;
use crate::ldp::{JcsEd25519Signature2020, Proof};
use crate::one_or_many::OneOrMany;
use crate::vc::{context_uris, custom_contexts, Context, Contexts, Credential, DEFAULT_CONTEXT};

/// A credential as embedded in a presentation: either a JSON object or a
/// compact token carried as a JSON string.
///
/// The text is kept exactly as it was read or produced so that the
/// presentation re-encodes it verbatim.
#[derive(Debug, Clone)]
pub struct MarshalledCredential(Box<RawValue>);

impl MarshalledCredential {
    /// The JSON text of this credential (an object, or a quoted token).
    pub fn as_json(&self) -> &str {
        self.0.get()
    }

    pub fn is_token(&self) -> bool {
        self.0.get().starts_with('"')
    }

    /// The credential in the form accepted by [`Credential::decode`]: object
    /// bytes, or the bare token.
    pub fn to_bytes(&self) -> Result<Vec<u8>, Error> {
        if self.is_token() {
            let token: String = serde_json::from_str(self.0.get())?;
            Ok(token.into_bytes())
        } else {
            Ok(self.0.get().as_bytes().to_vec())
        }
    }
}

impl PartialEq for MarshalledCredential {
    fn eq(&self, other: &Self) -> bool {
        if self.0.get() == other.0.get() {
            return true;
        }
        // same JSON written with a different key order or spacing
        match (
            serde_json::from_str::<Value>(self.0.get()),
            serde_json::from_str::<Value>(other.0.get()),
        ) {
            (Ok(a), Ok(b)) => a == b,
            _ => false,
        }
    }
}

/// Anything that can be placed in a presentation with
/// [`Presentation::set_credentials`].
#[derive(Debug, Clone)]
pub enum CredentialItem {
    Credential(Credential),
    /// A JSON object, a JSON string holding a token, or a bare token.
    Bytes(Vec<u8>),
    Token(String),
    /// A JSON object, or a JSON string holding a token.
    Json(Value),
}

impl CredentialItem {
    fn marshal(self) -> Result<(Credential, MarshalledCredential), Error> {
        match self {
            Self::Credential(credential) => {
                let raw = serde_json::value::to_raw_value(&credential)?;
                Ok((credential, MarshalledCredential(raw)))
            }
            Self::Token(token) => token_item(token),
            Self::Json(Value::String(token)) => token_item(token),
            Self::Json(value @ Value::Object(_)) => {
                let raw = serde_json::value::to_raw_value(&value)?;
                let credential = Credential::decode_unverified(raw.get().as_bytes())?;
                Ok((credential, MarshalledCredential(raw)))
            }
            Self::Json(_) => Err(Error::UnsupportedCredentialFormat),
            Self::Bytes(bytes) => bytes_item(bytes),
        }
    }
}

fn token_item(token: String) -> Result<(Credential, MarshalledCredential), Error> {
    let credential = Credential::decode_unverified(token.as_bytes())?;
    let raw = serde_json::value::to_raw_value(&token)?;
    Ok((credential, MarshalledCredential(raw)))
}

fn bytes_item(bytes: Vec<u8>) -> Result<(Credential, MarshalledCredential), Error> {
    let text = String::from_utf8(bytes).map_err(|_| Error::UnsupportedCredentialFormat)?;
    let text = text.trim();
    match text.chars().next() {
        Some('{') => {
            let raw = RawValue::from_string(text.to_string())?;
            let credential = Credential::decode_unverified(text.as_bytes())?;
            Ok((credential, MarshalledCredential(raw)))
        }
        Some('"') => token_item(serde_json::from_str(text)?),
        _ if format::detect(text.as_bytes()).is_token() => token_item(text.to_string()),
        _ => Err(Error::UnsupportedCredentialFormat),
    }
}

/// Split the raw `verifiableCredential` value into its items.
fn raw_items(raw: &RawValue) -> Result<Vec<Box<RawValue>>, Error> {
    let text = raw.get();
    match text.chars().next() {
        Some('[') => Ok(serde_json::from_str(text)?),
        Some('{') | Some('"') => Ok(vec![raw.to_owned()]),
        _ => Err(Error::UnsupportedCredentialFormat),
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawCredentials {
    #[serde(default)]
    verifiable_credential: Option<Box<RawValue>>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PresentationFields {
    #[serde(rename = "@context")]
    context: Contexts,
    id: Option<String>,
    #[serde(rename = "type")]
    type_: OneOrMany<String>,
    holder: Option<String>,
    proof: Option<OneOrMany<Proof>>,
    #[serde(flatten)]
    property_set: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Presentation {
    pub context: Contexts,
    pub id: Option<String>,
    pub type_: OneOrMany<String>,
    pub holder: Option<String>,
    pub proof: Option<OneOrMany<Proof>>,
    pub property_set: Map<String, Value>,
    credentials: Vec<Credential>,
    raw_credentials: Vec<MarshalledCredential>,
}

impl Default for Presentation {
    fn default() -> Self {
        Self::new()
    }
}

impl Presentation {
    /// An empty presentation with the base context and type.
    pub fn new() -> Self {
        Self {
            context: OneOrMany::Many(vec![Context::URI(DEFAULT_CONTEXT.to_string())]),
            id: None,
            type_: OneOrMany::Many(vec!["VerifiablePresentation".to_string()]),
            holder: None,
            proof: None,
            property_set: Map::new(),
            credentials: Vec::new(),
            raw_credentials: Vec::new(),
        }
    }

    pub fn from_credentials(items: Vec<CredentialItem>) -> Result<Self, Error> {
        let mut presentation = Self::new();
        presentation.set_credentials(items)?;
        Ok(presentation)
    }

    /// Decode and validate a presentation from any supported encoding.
    ///
    /// Embedded credentials are decoded without checking their proofs.
    pub fn decode(data: &[u8], options: &DecodeOptions) -> Result<Self, Error> {
        let document = decode::decode_document(data, DocumentKind::Presentation, options)?;
        Self::from_json(&document.json)
    }

    /// Decode a presentation without validating it or checking its proofs.
    pub fn decode_unverified(data: &[u8]) -> Result<Self, Error> {
        let document = decode::unwrap_document(data, DocumentKind::Presentation)?;
        Self::from_json(&document.json)
    }

    /// Build from JSON text. Embedded credentials keep their exact text.
    pub(crate) fn from_json(json: &str) -> Result<Self, Error> {
        let raw: RawCredentials = serde_json::from_str(json)?;
        let fields: PresentationFields = serde_json::from_str(json)?;
        let mut property_set = fields.property_set;
        property_set.remove("verifiableCredential");
        let mut presentation = Self {
            context: fields.context,
            id: fields.id,
            type_: fields.type_,
            holder: fields.holder,
            proof: fields.proof,
            property_set,
            credentials: Vec::new(),
            raw_credentials: Vec::new(),
        };
        if let Some(raw) = raw.verifiable_credential {
            let items = raw_items(&raw)?
                .into_iter()
                .map(|item| CredentialItem::Bytes(item.get().as_bytes().to_vec()))
                .collect();
            presentation.set_credentials(items)?;
        }
        Ok(presentation)
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, Error> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn credentials(&self) -> &[Credential] {
        &self.credentials
    }

    pub fn marshalled_credentials(&self) -> &[MarshalledCredential] {
        &self.raw_credentials
    }

    /// Replace the credentials of this presentation. On error the
    /// presentation is left unchanged.
    pub fn set_credentials(&mut self, items: Vec<CredentialItem>) -> Result<(), Error> {
        let mut credentials = Vec::with_capacity(items.len());
        let mut raw_credentials = Vec::with_capacity(items.len());
        for item in items {
            let (credential, raw) = item.marshal()?;
            credentials.push(credential);
            raw_credentials.push(raw);
        }
        self.credentials = credentials;
        self.raw_credentials = raw_credentials;
        Ok(())
    }

    pub fn context_uris(&self) -> Vec<&str> {
        context_uris(&self.context)
    }

    pub fn custom_contexts(&self) -> Vec<&Map<String, Value>> {
        custom_contexts(&self.context)
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

    /// Create a `JcsEd25519Signature2020` proof of this presentation,
    /// covering its credentials in their embedded form.
    pub fn generate_proof(&self, options: Proof, signer: &dyn Signer) -> Result<Proof, Error> {
        let document = serde_json::to_value(self)?;
        JcsEd25519Signature2020::sign(&document, options, signer)
    }

    /// JWT claims carrying this presentation in `vp`.
    ///
    /// With `minimize`, `id` and `holder` are only carried as `jti` and `iss`.
    pub fn jwt_claims(&self, audience: Vec<String>, minimize: bool) -> Result<JwtClaims, Error> {
        let mut vp = match serde_json::to_value(self)? {
            Value::Object(vp) => vp,
            _ => return Err(Error::UnsupportedCredentialFormat),
        };
        if minimize {
            vp.remove("id");
            vp.remove("holder");
        }
        let audience = match audience.len() {
            0 => None,
            1 => audience.into_iter().next().map(OneOrMany::One),
            _ => Some(OneOrMany::Many(audience)),
        };
        Ok(JwtClaims {
            issuer: self.holder.clone(),
            jwt_id: self.id.clone(),
            audience,
            verifiable_presentation: Some(vp),
            ..Default::default()
        })
    }
}

impl Serialize for Presentation {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        #[derive(Serialize)]
        #[serde(rename_all = "camelCase")]
        struct Encoded<'a> {
            #[serde(rename = "@context")]
            context: &'a Contexts,
            #[serde(skip_serializing_if = "Option::is_none")]
            id: Option<&'a str>,
            #[serde(rename = "type")]
            type_: &'a OneOrMany<String>,
            #[serde(skip_serializing_if = "Vec::is_empty")]
            verifiable_credential: Vec<&'a RawValue>,
            #[serde(skip_serializing_if = "Option::is_none")]
            holder: Option<&'a str>,
            #[serde(skip_serializing_if = "Option::is_none")]
            proof: Option<&'a OneOrMany<Proof>>,
            #[serde(flatten)]
            property_set: &'a Map<String, Value>,
        }

        Encoded {
            context: &self.context,
            id: self.id.as_deref(),
            type_: &self.type_,
            verifiable_credential: self.raw_credentials.iter().map(|raw| &*raw.0).collect(),
            holder: self.holder.as_deref(),
            proof: self.proof.as_ref(),
            property_set: &self.property_set,
        }
        .serialize(serializer)
    }
}
