use infra::models::TournamentStatus;
use infra::LedgerError;
use thiserror::Error;

use crate::lifecycle::transitions::Operation;

#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("capacity exceeded: {0}")]
    CapacityExceeded(String),

    #[error("precondition failed: {0}")]
    PreconditionFailed(String),

    #[error("precondition failed: tournament has no paid players")]
    NoPaidPlayers,

    #[error("precondition failed: cannot {operation} while tournament is {}", .status.as_str())]
    InvalidTransition {
        status: TournamentStatus,
        operation: Operation,
    },

    #[error("invariant violated: {0}")]
    InvariantViolation(String),

    /// A secondary effect failed after the primary write committed.
    #[error("{operation} degraded: {reason}")]
    NonCriticalDegradation { operation: String, reason: String },

    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

impl LifecycleError {
    pub fn not_found(what: &str, id: impl std::fmt::Display) -> Self {
        LifecycleError::NotFound(format!("{what} {id}"))
    }

    pub fn degraded(operation: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        LifecycleError::NonCriticalDegradation {
            operation: operation.into(),
            reason: reason.to_string(),
        }
    }

    /// True for every precondition failure, including the named ones.
    pub fn is_precondition_failed(&self) -> bool {
        matches!(
            self,
            LifecycleError::PreconditionFailed(_)
                | LifecycleError::NoPaidPlayers
                | LifecycleError::InvalidTransition { .. }
        )
    }
}

pub type LifecycleResult<T> = Result<T, LifecycleError>;

/// Value of an operation whose primary write committed, plus any secondary
/// effects that failed along the way.
#[derive(Debug)]
pub struct Outcome<T> {
    pub value: T,
    pub degradations: Vec<LifecycleError>,
}

impl<T> Outcome<T> {
    pub fn new(value: T, degradations: Vec<LifecycleError>) -> Self {
        Self {
            value,
            degradations,
        }
    }

    pub fn clean(value: T) -> Self {
        Self::new(value, Vec::new())
    }

    pub fn is_degraded(&self) -> bool {
        !self.degradations.is_empty()
    }

    pub fn into_value(self) -> T {
        self.value
    }
}
