use chrono::prelude::*;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Value};

use crate::error::{DocumentKind, Error};
use crate::jws::{self, Algorithm, Header};
use crate::key::{split_verification_method, PublicKeyFetcher, Signer};
use crate::one_or_many::OneOrMany;
use crate::vc::VCDateTime;

// RFC 7519 - JSON Web Token (JWT)

/// Seconds since the epoch, see RFC 7519 section 2.
///
/// Dates are kept with microsecond precision; finer fractions are dropped when
/// converting from a date-time.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, PartialOrd)]
pub struct NumericDate(#[serde(serialize_with = "interop_serialize")] f64);

/// Serialize as an integer when there are no fractional seconds, since many
/// JWT libraries only accept integers.
fn interop_serialize<S>(x: &f64, s: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    if x.fract() != 0.0 {
        s.serialize_f64(*x)
    } else {
        s.serialize_i64(*x as i64)
    }
}

impl NumericDate {
    /// 2^53 / 1_000_000, the largest value with full microsecond precision.
    pub const MAX: NumericDate = NumericDate(9_007_199_254.740_992);

    pub fn as_seconds(self) -> f64 {
        self.0
    }

    pub fn try_from_seconds(seconds: f64) -> Result<Self, Error> {
        if !seconds.is_finite() || seconds.abs() > Self::MAX.0 {
            Err(Error::InvalidDate(format!(
                "{} is out of the microsecond-precision range of NumericDate",
                seconds
            )))
        } else {
            Ok(NumericDate(seconds))
        }
    }

    pub fn to_date_time(self) -> Result<DateTime<Utc>, Error> {
        let whole_seconds = self.0.floor();
        let micros = ((self.0 - whole_seconds) * 1_000_000.0).round() as u32;
        let (whole_seconds, micros) = if micros >= 1_000_000 {
            (whole_seconds as i64 + 1, 0)
        } else {
            (whole_seconds as i64, micros)
        };
        Utc.timestamp_opt(whole_seconds, micros * 1_000)
            .single()
            .ok_or_else(|| Error::InvalidDate(format!("{} is not a valid timestamp", self.0)))
    }
}

impl TryFrom<DateTime<Utc>> for NumericDate {
    type Error = Error;
    fn try_from(dtu: DateTime<Utc>) -> Result<Self, Self::Error> {
        let whole_seconds = dtu.timestamp() as f64;
        let fractional_seconds = dtu.timestamp_subsec_micros() as f64 * 1.0e-6;
        Self::try_from_seconds(whole_seconds + fractional_seconds)
    }
}

impl TryFrom<&VCDateTime> for NumericDate {
    type Error = Error;
    fn try_from(date_time: &VCDateTime) -> Result<Self, Self::Error> {
        NumericDate::try_from(DateTime::<Utc>::from(date_time.date_time()))
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
pub struct JwtClaims {
    #[serde(rename = "iss")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub issuer: Option<String>,
    #[serde(rename = "sub")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    #[serde(rename = "aud")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audience: Option<OneOrMany<String>>,
    #[serde(rename = "exp")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expiration_time: Option<NumericDate>,
    #[serde(rename = "nbf")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub not_before: Option<NumericDate>,
    #[serde(rename = "iat")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub issued_at: Option<NumericDate>,
    #[serde(rename = "jti")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jwt_id: Option<String>,
    #[serde(rename = "vc")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verifiable_credential: Option<Map<String, Value>>,
    #[serde(rename = "vp")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verifiable_presentation: Option<Map<String, Value>>,
    #[serde(flatten)]
    pub property_set: Map<String, Value>,
}

impl JwtClaims {
    pub fn encode_signed(&self, signer: &dyn Signer) -> Result<String, Error> {
        let payload = serde_json::to_string(self)?;
        let header = Header {
            algorithm: signer.algorithm(),
            key_id: signer.key_id().map(ToOwned::to_owned),
            type_: Some("JWT".to_string()),
            ..Default::default()
        };
        jws::encode_sign_custom_header(&payload, signer, &header)
    }

    pub fn encode_unsecured(&self) -> Result<String, Error> {
        let payload = serde_json::to_string(self)?;
        jws::encode_unsigned(&payload)
    }

    /// Take the document out of the reserved claim for `kind`, filling in the
    /// registered claims it does not state itself.
    pub fn into_document(mut self, kind: DocumentKind) -> Result<Value, Error> {
        let document = match kind {
            DocumentKind::Credential => self.verifiable_credential.take(),
            DocumentKind::Presentation => self.verifiable_presentation.take(),
        }
        .ok_or_else(|| Error::MalformedToken(format!("missing {} claim", kind.claim_name())))?;
        match kind {
            DocumentKind::Credential => self.into_credential(document),
            DocumentKind::Presentation => self.into_presentation(document),
        }
    }

    fn into_credential(self, mut vc: Map<String, Value>) -> Result<Value, Error> {
        if let Some(jti) = self.jwt_id {
            vc.entry("id").or_insert(Value::String(jti));
        }
        if let Some(iss) = self.issuer {
            match vc.get_mut("issuer") {
                None => {
                    vc.insert("issuer".to_string(), Value::String(iss));
                }
                Some(Value::Object(issuer)) => {
                    issuer.entry("id").or_insert(Value::String(iss));
                }
                Some(_) => {}
            }
        }
        if let Some(nbf) = self.not_before.or(self.issued_at) {
            if !vc.contains_key("issuanceDate") {
                vc.insert("issuanceDate".to_string(), date_value(nbf)?);
            }
        }
        if let Some(exp) = self.expiration_time {
            if !vc.contains_key("expirationDate") {
                vc.insert("expirationDate".to_string(), date_value(exp)?);
            }
        }
        if let Some(sub) = self.subject {
            let subject = vc
                .entry("credentialSubject")
                .or_insert_with(|| Value::Object(Map::new()));
            if let Value::Object(subject) = subject {
                subject.entry("id").or_insert(Value::String(sub));
            }
        }
        Ok(Value::Object(vc))
    }

    fn into_presentation(self, mut vp: Map<String, Value>) -> Result<Value, Error> {
        if let Some(jti) = self.jwt_id {
            vp.entry("id").or_insert(Value::String(jti));
        }
        if let Some(iss) = self.issuer {
            vp.entry("holder").or_insert(Value::String(iss));
        }
        Ok(Value::Object(vp))
    }
}

fn date_value(date: NumericDate) -> Result<Value, Error> {
    let date_time = VCDateTime::from(date.to_date_time()?);
    Ok(Value::String(date_time.into()))
}

fn parse_claims(payload: &[u8]) -> Result<JwtClaims, Error> {
    serde_json::from_slice(payload).map_err(|e| Error::MalformedToken(format!("claims: {}", e)))
}

/// Issuer and key id used to look up the key that signed a token.
///
/// A `kid` of the form `did:example:123#key-1` names both; a bare `kid` is a
/// key of the `iss` claim.
fn key_reference(header: &Header, claims: &JwtClaims) -> (String, String) {
    let issuer = claims.issuer.clone().unwrap_or_default();
    match header.key_id.as_deref() {
        Some(kid) if kid.contains('#') => {
            let (issuer_id, key_id) = split_verification_method(kid);
            let issuer_id = if issuer_id.is_empty() {
                issuer
            } else {
                issuer_id.to_string()
            };
            (issuer_id, key_id.to_string())
        }
        Some(kid) => (issuer, kid.to_string()),
        None => (issuer, String::new()),
    }
}

/// Decode a signed or unsecured token without checking its signature.
pub fn decode_unverified(token: &str) -> Result<(Header, JwtClaims), Error> {
    let (header_b64, payload_enc, signature_b64) = jws::split_jws(token.trim())?;
    let decoded = jws::decode_jws_parts(header_b64, payload_enc.as_bytes(), signature_b64)?;
    match (&decoded.header.algorithm, signature_b64.is_empty()) {
        (Algorithm::None, false) => {
            return Err(Error::MalformedToken(
                "unsecured token must have an empty signature".to_string(),
            ))
        }
        (Algorithm::None, true) => {}
        (_, true) => {
            return Err(Error::MalformedToken(
                "signed token has an empty signature".to_string(),
            ))
        }
        (_, false) => {}
    }
    let claims = parse_claims(&decoded.payload)?;
    Ok((decoded.header, claims))
}

/// Decode a signed token, checking its signature with the key `fetcher`
/// returns for the token's key reference.
pub fn decode_verify(
    token: &str,
    fetcher: &dyn PublicKeyFetcher,
) -> Result<(Header, JwtClaims), Error> {
    let (header_b64, payload_enc, signature_b64) = jws::split_jws(token.trim())?;
    let decoded = jws::decode_jws_parts(header_b64, payload_enc.as_bytes(), signature_b64)?;
    if decoded.header.algorithm == Algorithm::None || signature_b64.is_empty() {
        return Err(Error::MalformedToken(
            "token is not signed".to_string(),
        ));
    }
    let claims = parse_claims(&decoded.payload)?;
    let (issuer_id, key_id) = key_reference(&decoded.header, &claims);
    let key = fetcher
        .fetch(&issuer_id, &key_id)
        .map_err(|e| Error::KeyResolutionFailed {
            issuer_id: issuer_id.clone(),
            key_id: key_id.clone(),
            reason: e.to_string(),
        })?;
    jws::verify_bytes(
        &decoded.header.algorithm,
        &decoded.signing_input,
        &key,
        &decoded.signature,
    )?;
    Ok((decoded.header, claims))
}
