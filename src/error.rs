use std::fmt;

use thiserror::Error;

/// Which kind of document a validation failure refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    Credential,
    Presentation,
}

impl DocumentKind {
    /// Reserved JWT claim carrying the document.
    pub fn claim_name(self) -> &'static str {
        match self {
            Self::Credential => "vc",
            Self::Presentation => "vp",
        }
    }
}

impl fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Credential => f.write_str("verifiable credential"),
            Self::Presentation => f.write_str("verifiable presentation"),
        }
    }
}

/// A single JSON Schema violation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    /// JSON pointer to the offending value in the document.
    pub instance_path: String,
    /// JSON pointer to the schema keyword that failed.
    pub schema_path: String,
    pub message: String,
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.instance_path.is_empty() {
            write!(f, "(root): {}", self.message)
        } else {
            write!(f, "{}: {}", self.instance_path, self.message)
        }
    }
}

/// Every violation found while validating one document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violations(pub Vec<Violation>);

impl fmt::Display for Violations {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for violation in &self.0 {
            writeln!(f, "- {}", violation)?;
        }
        Ok(())
    }
}

/// Error type for decoding and validating credentials and presentations.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    #[error("{kind} is not valid:\n{violations}")]
    SchemaViolation {
        kind: DocumentKind,
        violations: Violations,
    },
    /// The document changes shape when compacted against its own context.
    #[error("JSON-LD doc has different structure after compaction: {}", fields.join(", "))]
    JsonLdInconsistent { fields: Vec<String> },
    #[error("Unsupported proof type: {0}")]
    UnsupportedProofType(String),
    #[error("embedded proof is missing")]
    ProofMissing,
    #[error("Invalid proof: {0}")]
    InvalidProof(String),
    #[error("public key fetcher is not defined")]
    MissingKeyResolver,
    #[error("Unable to fetch public key {key_id} of {issuer_id}: {reason}")]
    KeyResolutionFailed {
        issuer_id: String,
        key_id: String,
        reason: String,
    },
    #[error("Malformed token: {0}")]
    MalformedToken(String),
    #[error("unsupported credential format")]
    UnsupportedCredentialFormat,
    #[error("Unable to load context: {0}")]
    ContextLoading(String),
    #[error("Invalid JSON-LD context: {0}")]
    InvalidContext(String),
    /// Expansion or compaction failed, e.g. on a protected term redefinition.
    #[error("JSON-LD processing failed: {0}")]
    JsonLd(String),
    #[error("Unable to sign: {0}")]
    Signing(String),
    #[error("Invalid date: {0}")]
    InvalidDate(String),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl From<base64::DecodeError> for Error {
    fn from(e: base64::DecodeError) -> Self {
        Self::MalformedToken(e.to_string())
    }
}
