use serde_json::Value;

/// Encoding of an incoming credential or presentation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    /// JWS compact serialization of a JWT (`header.payload.signature`).
    SignedToken,
    /// JWT with `"alg": "none"` and an empty signature segment.
    UnsecuredToken,
    /// JSON(-LD) document, possibly carrying an embedded proof.
    PlainDocument,
}

impl Format {
    pub fn is_token(self) -> bool {
        !matches!(self, Self::PlainDocument)
    }
}

/// Classify input bytes without parsing the payload.
///
/// Input is a token when it has exactly three `.`-separated segments, the
/// header and payload segments are non-empty, and the header decodes as a
/// JSON object with a string `alg`. Anything else is a plain document.
pub fn detect(data: &[u8]) -> Format {
    let text = match std::str::from_utf8(data) {
        Ok(text) => text.trim(),
        Err(_) => return Format::PlainDocument,
    };
    let mut segments = text.split('.');
    let (header, payload) = match (
        segments.next(),
        segments.next(),
        segments.next(),
        segments.next(),
    ) {
        (Some(header), Some(payload), Some(_), None) => (header, payload),
        _ => return Format::PlainDocument,
    };
    if header.is_empty() || payload.is_empty() {
        return Format::PlainDocument;
    }
    match header_algorithm(header) {
        Some(alg) if alg == "none" => Format::UnsecuredToken,
        Some(_) => Format::SignedToken,
        None => Format::PlainDocument,
    }
}

fn header_algorithm(header_b64: &str) -> Option<String> {
    let header_json = base64::decode_config(header_b64, base64::URL_SAFE_NO_PAD).ok()?;
    match serde_json::from_slice(&header_json).ok()? {
        Value::Object(mut header) => match header.remove("alg") {
            Some(Value::String(alg)) => Some(alg),
            _ => None,
        },
        _ => None,
    }
}
