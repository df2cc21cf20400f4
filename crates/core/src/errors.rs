use thiserror::Error;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error("{0}")]
    Validation(String),
    #[error("unknown order status `{0}`")]
    UnknownOrderStatus(String),
    #[error("domain invariant violation: {0}")]
    InvariantViolation(String),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ApplicationError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error("persistence failure: {0}")]
    Persistence(String),
    #[error("integration failure: {0}")]
    Integration(String),
    #[error("configuration failure: {0}")]
    Configuration(String),
}

impl ApplicationError {
    /// HTTP-style status code used by handler responses.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Domain(_) => 400,
            Self::Persistence(_) | Self::Integration(_) | Self::Configuration(_) => 500,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Domain(DomainError::Validation(_)) => "ValidationError",
            Self::Domain(DomainError::UnknownOrderStatus(_)) => "ValidationError",
            Self::Domain(DomainError::InvariantViolation(_)) => "InvariantViolation",
            Self::Persistence(_) => "PersistenceError",
            Self::Integration(_) => "IntegrationError",
            Self::Configuration(_) => "ConfigurationError",
        }
    }

    pub fn is_client_error(&self) -> bool {
        self.status_code() < 500
    }
}
