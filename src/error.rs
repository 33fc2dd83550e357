//! Error taxonomy for the exchange workflow

/// Per-rule validation failures, surfaced to callers as client errors.
#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum ValidationError {
    #[error("title must not be empty")]
    EmptyTitle,
    #[error("name must not be empty")]
    EmptyName,
    #[error("condition is not set")]
    MissingCondition,
    #[error("you already have an ad titled '{0}'")]
    DuplicateTitle(String),
    #[error("category '{0}' already exists")]
    DuplicateCategory(String),
    #[error("tag '{0}' already exists")]
    DuplicateTag(String),
    #[error("sender and receiver ads must differ")]
    SameAd,
    #[error("cannot propose an exchange to your own ad")]
    OwnReceiverAd,
    #[error("status must be 'accepted' or 'rejected', got '{0}'")]
    StatusNotAllowed(String),
    #[error("unknown status '{0}'")]
    UnknownStatus(String),
    #[error("unknown condition '{0}'")]
    UnknownCondition(String),
}

#[derive(thiserror::Error, Debug)]
pub enum WorkflowError {
    #[error("no authenticated user")]
    Unauthenticated,
    #[error("forbidden: {0}")]
    Forbidden(&'static str),
    #[error("{kind} '{id}' not found")]
    NotFound { kind: &'static str, id: String },
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("storage failure: {0}")]
    Storage(#[from] sled::Error),
    #[error("record encoding failed: {0}")]
    Encoding(String),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl WorkflowError {
    pub fn not_found(kind: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            id: id.into(),
        }
    }

    /// Response code a presentation layer should answer with. Unauthenticated
    /// maps to 403 rather than 401, matching the observed access-denied
    /// behavior of the original boundary.
    pub fn http_status(&self) -> u16 {
        match self {
            Self::Unauthenticated | Self::Forbidden(_) => 403,
            Self::NotFound { .. } => 404,
            Self::Validation(_) => 400,
            Self::Storage(_) | Self::Encoding(_) | Self::Internal(_) => 500,
        }
    }
}

impl From<minicbor::decode::Error> for WorkflowError {
    fn from(err: minicbor::decode::Error) -> Self {
        Self::Encoding(err.to_string())
    }
}

impl From<minicbor::encode::Error<std::convert::Infallible>> for WorkflowError {
    fn from(err: minicbor::encode::Error<std::convert::Infallible>) -> Self {
        Self::Encoding(err.to_string())
    }
}
