use formgrid_core::{FormError, RecordId, SchemaError};

use crate::traits::StoreError;

/// Failures of a [`BusinessService`](super::BusinessService) operation.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("business '{0}' not found")]
    UnknownBusiness(String),
    #[error("record {id} not found in '{business}'")]
    RecordNotFound { business: String, id: RecordId },
    #[error("business '{business}' has no field '{field}'")]
    UnknownField { business: String, field: String },
    #[error(transparent)]
    Form(#[from] FormError),
    #[error(transparent)]
    Schema(#[from] SchemaError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl ServiceError {
    /// Stable label used for the `outcome` of metrics and log events.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::UnknownBusiness(_) | Self::RecordNotFound { .. } | Self::UnknownField { .. } => {
                "not_found"
            }
            Self::Form(_) | Self::Schema(_) => "invalid",
            Self::Store(StoreError::NotFound { .. }) => "not_found",
            Self::Store(
                StoreError::AlreadyExists { .. }
                | StoreError::IdTaken { .. }
                | StoreError::IdSpaceExhausted { .. },
            ) => "conflict",
            Self::Store(StoreError::InvalidId { .. }) => "invalid",
            Self::Store(StoreError::Remote { .. } | StoreError::Backend(_)) => "backend",
        }
    }
}
