//! User-facing diagnostics for failed waits.
//!
//! Each failure class gets its own summary so a timeout never reads like a provider bug and a
//! transport failure never reads like a timeout.

use std::fmt;

use strum::AsRefStr;
use strum::Display as StrumDisplay;

use crate::error::Error;
use crate::poller::PollOutcome;
use crate::wait::WaitSpec;

pub const SUMMARY_TIMEOUT: &str = "Wait timeout exceeded";
pub const SUMMARY_CANCELLED: &str = "Wait cancelled";
pub const SUMMARY_INVALID_CONFIG: &str = "Invalid wait configuration";
pub const SUMMARY_READ_FAILED: &str = "Failed to read resource state";

#[derive(Debug, Clone, Copy, PartialEq, Eq, StrumDisplay, AsRefStr)]
pub enum Severity {
    Error,
    Warning,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub severity: Severity,
    pub summary: String,
    pub detail: String,
}

impl Diagnostic {
    pub fn error(summary: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            summary: summary.into(),
            detail: detail.into(),
        }
    }

    pub fn warning(summary: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            summary: summary.into(),
            detail: detail.into(),
        }
    }

    /// `None` for successful outcomes.
    pub fn from_outcome(outcome: &PollOutcome, spec: &WaitSpec) -> Option<Self> {
        match outcome {
            PollOutcome::Satisfied | PollOutcome::ResourceGone => None,
            PollOutcome::TimedOut { attempts, elapsed } => Some(Diagnostic::error(
                SUMMARY_TIMEOUT,
                format!(
                    "Waited {elapsed:?} ({attempts} check(s)) for {condition} without success.",
                    condition = spec.mode
                ),
            )),
            PollOutcome::Cancelled { attempts } => Some(Diagnostic::warning(
                SUMMARY_CANCELLED,
                format!(
                    "Stopped waiting for {condition} after {attempts} check(s).",
                    condition = spec.mode
                ),
            )),
            PollOutcome::Error(error) => Some(Diagnostic::from(error)),
        }
    }
}

impl From<&Error> for Diagnostic {
    fn from(error: &Error) -> Self {
        match error {
            Error::WaitTimeout { .. } => Diagnostic::error(SUMMARY_TIMEOUT, error.to_string()),
            Error::WaitCancelled { .. } => Diagnostic::warning(SUMMARY_CANCELLED, error.to_string()),
            e if e.is_configuration() => Diagnostic::error(SUMMARY_INVALID_CONFIG, e.to_string()),
            e => Diagnostic::error(SUMMARY_READ_FAILED, e.to_string()),
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}: {}", self.severity, self.summary, self.detail)
    }
}
