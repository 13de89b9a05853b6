//! Business-rule failures raised by the service layer.

use std::collections::BTreeMap;

use crate::db::repository::RepositoryError;

/// Field name to the Spanish messages collected for it.
pub type FieldErrors = BTreeMap<String, Vec<String>>;

#[derive(Debug, thiserror::Error)]
pub enum DomainError {
    /// Input failed validation; messages are grouped per field.
    #[error("Datos inválidos")]
    Validation(FieldErrors),

    #[error("{0}")]
    NotEligible(String),

    #[error("invalid status transition from {from} to {to}")]
    InvalidTransition { from: String, to: String },

    /// The user has not accepted the documents required for this action.
    #[error("Consent required: {0}")]
    ConsentRequired(String),

    /// The product or tier cannot be sold right now.
    #[error("{reason}")]
    Unavailable { reason: String, waitlist: bool },

    /// The acting user lacks the role or permission for this action.
    #[error("{0}")]
    Forbidden(String),

    /// The write clashes with existing state, such as a taken email.
    #[error("{0}")]
    Conflict(String),

    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl DomainError {
    /// Single-field validation failure.
    pub fn invalid(field: &str, message: impl Into<String>) -> Self {
        let mut errors = FieldErrors::new();
        errors.insert(field.to_string(), vec![message.into()]);
        DomainError::Validation(errors)
    }

    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        DomainError::NotFound {
            entity,
            id: id.to_string(),
        }
    }
}

pub type DomainResult<T> = Result<T, DomainError>;

/// Collects per-field validation messages before failing in one go.
#[derive(Debug, Default)]
pub struct FieldErrorsBuilder {
    errors: FieldErrors,
}

impl FieldErrorsBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, field: &str, message: impl Into<String>) {
        self.errors
            .entry(field.to_string())
            .or_default()
            .push(message.into());
    }

    pub fn check(&mut self, ok: bool, field: &str, message: &str) {
        if !ok {
            self.push(field, message);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn finish(self) -> DomainResult<()> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(DomainError::Validation(self.errors))
        }
    }
}
