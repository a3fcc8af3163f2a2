use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::key::{KeyType, PublicKey, Signer};

// RFC 7515 - JSON Web Signature (JWS)
// RFC 7518 - JSON Web Algorithms (JWA)

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq, Default)]
#[serde(from = "String", into = "String")]
pub enum Algorithm {
    EdDSA,
    ES256,
    RS256,
    PS256,
    #[default]
    None,
    /// Any algorithm this crate cannot verify. Kept so such tokens can still
    /// be decoded without verification.
    Other(String),
}

impl From<String> for Algorithm {
    fn from(name: String) -> Self {
        match name.as_str() {
            "EdDSA" => Self::EdDSA,
            "ES256" => Self::ES256,
            "RS256" => Self::RS256,
            "PS256" => Self::PS256,
            "none" => Self::None,
            _ => Self::Other(name),
        }
    }
}

impl From<Algorithm> for String {
    fn from(algorithm: Algorithm) -> String {
        algorithm.to_string()
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::EdDSA => "EdDSA",
            Self::ES256 => "ES256",
            Self::RS256 => "RS256",
            Self::PS256 => "PS256",
            Self::None => "none",
            Self::Other(name) => name,
        };
        f.write_str(name)
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
pub struct Header {
    #[serde(rename = "alg")]
    pub algorithm: Algorithm,

    #[serde(skip_serializing_if = "Option::is_none")]
    #[serde(rename = "kid")]
    pub key_id: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    #[serde(rename = "typ")]
    pub type_: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    #[serde(rename = "crit")]
    pub critical: Option<Vec<String>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    #[serde(rename = "b64")]
    pub base64urlencode_payload: Option<bool>,

    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    #[serde(flatten)]
    pub additional_parameters: BTreeMap<String, serde_json::Value>,
}

pub(crate) fn base64_encode_json<T: Serialize>(object: &T) -> Result<String, Error> {
    let json = serde_json::to_string(&object)?;
    Ok(base64::encode_config(json, base64::URL_SAFE_NO_PAD))
}

pub fn verify_bytes(
    algorithm: &Algorithm,
    data: &[u8],
    key: &PublicKey,
    signature: &[u8],
) -> Result<(), Error> {
    use ring::signature;
    let parameters: &'static dyn signature::VerificationAlgorithm = match (algorithm, key.key_type) {
        (Algorithm::EdDSA, KeyType::Ed25519) => &signature::ED25519,
        (Algorithm::ES256, KeyType::P256) => &signature::ECDSA_P256_SHA256_FIXED,
        (Algorithm::RS256, KeyType::Rsa) => &signature::RSA_PKCS1_2048_8192_SHA256,
        (Algorithm::PS256, KeyType::Rsa) => &signature::RSA_PSS_2048_8192_SHA256,
        (Algorithm::None, _) | (Algorithm::Other(_), _) => {
            return Err(Error::InvalidProof(format!(
                "unsupported algorithm: {}",
                algorithm
            )))
        }
        (_, key_type) => {
            return Err(Error::InvalidProof(format!(
                "algorithm {} does not match {:?} key",
                algorithm, key_type
            )))
        }
    };
    signature::UnparsedPublicKey::new(parameters, &key.value)
        .verify(data, signature)
        .map_err(|_| Error::InvalidProof("signature verification failed".to_string()))
}

pub fn encode_sign_custom_header(
    payload: &str,
    signer: &dyn Signer,
    header: &Header,
) -> Result<String, Error> {
    let header_b64 = base64_encode_json(header)?;
    let payload_b64 = base64::encode_config(payload, base64::URL_SAFE_NO_PAD);
    let signing_input = header_b64 + "." + &payload_b64;
    let sig = signer.sign(signing_input.as_bytes())?;
    let sig_b64 = base64::encode_config(sig, base64::URL_SAFE_NO_PAD);
    Ok([signing_input, sig_b64].join("."))
}

pub fn encode_unsigned(payload: &str) -> Result<String, Error> {
    let header = Header {
        algorithm: Algorithm::None,
        ..Default::default()
    };
    let header_b64 = base64_encode_json(&header)?;
    let payload_b64 = base64::encode_config(payload, base64::URL_SAFE_NO_PAD);
    Ok(header_b64 + "." + &payload_b64 + ".")
}

pub fn split_jws(jws: &str) -> Result<(&str, &str, &str), Error> {
    let mut parts = jws.splitn(3, '.');
    Ok(
        match (parts.next(), parts.next(), parts.next(), parts.next()) {
            (Some(a), Some(b), Some(c), None) if !c.contains('.') => (a, b, c),
            _ => {
                return Err(Error::MalformedToken(
                    "expected header, payload and signature segments".to_string(),
                ))
            }
        },
    )
}

pub struct DecodedJWS {
    pub header: Header,
    pub signing_input: Vec<u8>,
    pub payload: Vec<u8>,
    pub signature: Vec<u8>,
}

/// Decode JWS parts (JOSE header, payload, and signature) into useful values.
/// "crit" (critical) header parameters are checked and disallowed if unrecognized/unsupported.
pub fn decode_jws_parts(
    header_b64: &str,
    payload_enc: &[u8],
    signature_b64: &str,
) -> Result<DecodedJWS, Error> {
    let signature = base64::decode_config(signature_b64, base64::URL_SAFE_NO_PAD)?;
    let header_json = base64::decode_config(header_b64, base64::URL_SAFE_NO_PAD)?;
    let header: Header = serde_json::from_slice(&header_json)
        .map_err(|e| Error::MalformedToken(format!("header: {}", e)))?;
    let payload_vec;
    let payload = if header.base64urlencode_payload.unwrap_or(true) {
        payload_vec = base64::decode_config(payload_enc, base64::URL_SAFE_NO_PAD)?;
        payload_vec.as_slice()
    } else {
        payload_enc
    };
    for name in header.critical.iter().flatten() {
        match name.as_str() {
            "alg" | "jku" | "jwk" | "kid" | "x5u" | "x5c" | "x5t" | "x5t#S256" | "typ" | "cty"
            | "crit" => {
                return Err(Error::MalformedToken(
                    "invalid crit property in header".to_string(),
                ))
            }
            "b64" => {}
            _ => {
                return Err(Error::MalformedToken(format!(
                    "unknown critical header name: {}",
                    name
                )))
            }
        }
    }
    let signing_input = [header_b64.as_bytes(), b".", payload_enc].concat();
    Ok(DecodedJWS {
        header,
        signing_input,
        payload: payload.to_vec(),
        signature,
    })
}
