use std::fmt::Debug;
use std::time::Duration;

use thiserror::Error as ThisError;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(ThisError, Debug)]
pub enum Error {
    /// Any error originating from the `kube-rs` crate
    #[error("Kubernetes reported error: {source}")]
    Kube {
        #[from]
        source: kube::Error,
    },
    #[error("{0}")]
    UserInput(String),
    #[error("Invalid JSONPath expression '{expression}': {reason}")]
    InvalidJsonPath { expression: String, reason: String },
    #[error("Invalid duration '{input}': {reason}")]
    InvalidDuration { input: String, reason: String },
    #[error("Failed to serialize resource body: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Wait timeout exceeded after {attempts} attempt(s) in {elapsed:?}: {condition}")]
    WaitTimeout {
        condition: String,
        attempts: u32,
        elapsed: Duration,
    },
    #[error("Wait cancelled after {attempts} attempt(s): {condition}")]
    WaitCancelled { condition: String, attempts: u32 },
    #[error("RwLock poisoned: {0}")]
    RwLockPoisoned(String),

    /// Can be used by implementors of `FetchState` to return their errors
    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

impl Error {
    pub(crate) fn invalid_jsonpath(expression: &str, reason: impl Into<String>) -> Self {
        Error::InvalidJsonPath {
            expression: expression.to_owned(),
            reason: reason.into(),
        }
    }

    /// Whether the error is a misconfiguration rather than a failure talking to the cluster.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Error::UserInput(_) | Error::InvalidJsonPath { .. } | Error::InvalidDuration { .. }
        )
    }
}

impl<T> From<std::sync::PoisonError<T>> for Error {
    fn from(e: std::sync::PoisonError<T>) -> Self {
        Error::RwLockPoisoned(e.to_string())
    }
}
