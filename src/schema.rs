//! Structural validation of raw documents against the base JSON schemas.

use jsonschema::{Draft, Validator};
use serde_json::Value;

use crate::error::{DocumentKind, Error, Violation, Violations};

const CREDENTIAL_SCHEMA: &str = include_str!("../schemas/credential.json");
const PRESENTATION_SCHEMA: &str = include_str!("../schemas/presentation.json");

fn compile(schema: &str) -> Validator {
    // The schemas are compiled into the binary; failing here is a build defect.
    let schema: Value = serde_json::from_str(schema).expect("base schema must be valid JSON");
    jsonschema::options()
        .with_draft(Draft::Draft7)
        .should_validate_formats(true)
        .build(&schema)
        .expect("base schema must compile")
}

lazy_static::lazy_static! {
    static ref CREDENTIAL_VALIDATOR: Validator = compile(CREDENTIAL_SCHEMA);
    static ref PRESENTATION_VALIDATOR: Validator = compile(PRESENTATION_SCHEMA);
}

fn validator(kind: DocumentKind) -> &'static Validator {
    match kind {
        DocumentKind::Credential => &CREDENTIAL_VALIDATOR,
        DocumentKind::Presentation => &PRESENTATION_VALIDATOR,
    }
}

/// Validate `document` against the schema for `kind`, collecting every violation.
pub fn validate(document: &Value, kind: DocumentKind) -> Result<(), Error> {
    let violations: Vec<Violation> = validator(kind)
        .iter_errors(document)
        .map(|e| Violation {
            instance_path: e.instance_path.to_string(),
            schema_path: e.schema_path.to_string(),
            message: e.to_string(),
        })
        .collect();
    if violations.is_empty() {
        return Ok(());
    }
    log::debug!("{} failed schema validation: {:?}", kind, violations);
    Err(Error::SchemaViolation {
        kind,
        violations: Violations(violations),
    })
}
