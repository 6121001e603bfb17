use thiserror::Error;

use crate::services::cas::validator::TicketValidationError;

/// Errors the CAS layer surfaces to the pipeline.
///
/// Expected protocol outcomes (no ticket, bad ticket, already authenticated)
/// are state transitions, not errors. Only validation failure with
/// `exception_on_validation_failure` ends up here.
#[derive(Debug, Error)]
pub enum CasError {
    #[error("ticket validation failed: {0}")]
    TicketValidation(#[from] TicketValidationError),
}

/// Configuration problems.
///
/// At startup they are fatal; at request time the layer logs them and lets the
/// request through unauthenticated.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CasConfigError {
    #[error("missing CAS configuration: {0}")]
    Missing(&'static str),
    #[error("invalid CAS configuration: {0}")]
    Invalid(&'static str),
}
