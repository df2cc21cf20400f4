use serde::Serialize;
use serde_json::{json, Value};

use grocer_core::errors::{ApplicationError, DomainError};

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct HandlerResponse {
    pub status_code: u16,
    pub body: Value,
}

impl HandlerResponse {
    pub fn ok(body: Value) -> Self {
        Self { status_code: 200, body }
    }

    pub fn bad_request(body: Value) -> Self {
        Self { status_code: 400, body }
    }

    pub fn internal(body: Value) -> Self {
        Self { status_code: 500, body }
    }

    /// Client errors carry `details`; everything else carries the error `type`.
    pub fn from_error(error: &ApplicationError) -> Self {
        match error {
            ApplicationError::Domain(DomainError::InvariantViolation(_)) => {
                Self::internal(json!({ "error": error.to_string(), "type": error.kind() }))
            }
            ApplicationError::Domain(domain) => Self::bad_request(json!({
                "error": "Validation error",
                "details": domain.to_string(),
            })),
            _ => Self::internal(json!({ "error": error.to_string(), "type": error.kind() })),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status_code)
    }
}
