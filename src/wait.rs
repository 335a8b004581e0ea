//! Wait configuration: what to wait for, and for how long.
//!
//! The user-facing blocks [WaitForDelete] and [WaitForUpsert] carry durations as strings
//! (`"30s"`, `"5m"`, `"-1s"`) and are converted into a validated [WaitSpec] before any
//! polling starts.
//!
//! Timeout conventions:
//! - `0` checks the condition exactly once and never sleeps.
//! - a negative timeout waits for up to [MAX_TIMEOUT] (one week).

use std::fmt;
use std::time::Duration;

use chrono::TimeDelta;
use schemars::JsonSchema;
use serde::Deserialize;
use serde::Serialize;

use crate::error::Error;
use crate::error::Result;
use crate::jsonpath::JsonPath;

const DEFAULT_TIMEOUT_SECONDS: i64 = 30;
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Upper bound used for negative ("wait forever") timeouts.
pub const MAX_TIMEOUT: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// The condition a wait is looking for.
#[derive(Debug, Clone, PartialEq)]
pub enum WaitMode {
    /// The field at `path` exists and is non-empty, or equals `expected_value` if one is set.
    FieldValue {
        path: JsonPath,
        expected_value: Option<String>,
    },
    /// The resource no longer exists.
    Deletion,
}

impl fmt::Display for WaitMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WaitMode::FieldValue {
                path,
                expected_value: Some(expected),
            } => write!(f, "{path} == {expected:?}"),
            WaitMode::FieldValue {
                path,
                expected_value: None,
            } => write!(f, "{path} is set"),
            WaitMode::Deletion => f.write_str("resource is deleted"),
        }
    }
}

/// A single, fully resolved wait operation.
#[derive(Debug, Clone, PartialEq)]
pub struct WaitSpec {
    pub mode: WaitMode,
    /// Signed so that the "negative means one week" convention survives parsing.
    pub timeout: TimeDelta,
    pub poll_interval: Duration,
}

impl WaitSpec {
    /// Waits for a field value with the default 30s timeout and 5s poll interval.
    pub fn field_value(path: JsonPath, expected_value: Option<String>) -> Self {
        Self::with_defaults(WaitMode::FieldValue {
            path,
            expected_value: expected_value.filter(|v| !v.is_empty()),
        })
    }

    /// Waits for deletion with the default 30s timeout and 5s poll interval.
    pub fn deletion() -> Self {
        Self::with_defaults(WaitMode::Deletion)
    }

    fn with_defaults(mode: WaitMode) -> Self {
        WaitSpec {
            mode,
            timeout: TimeDelta::seconds(DEFAULT_TIMEOUT_SECONDS),
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    pub fn with_timeout(mut self, timeout: TimeDelta) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// The wall-clock budget the poller actually uses. See [clamp_timeout].
    pub fn effective_timeout(&self) -> Duration {
        clamp_timeout(self.timeout)
    }

    /// Rejects specs that would spin: a zero poll interval with a non-zero budget.
    pub fn validate(&self) -> Result<()> {
        if !self.effective_timeout().is_zero() && self.poll_interval.is_zero() {
            return Err(Error::UserInput(format!(
                "poll_interval must be greater than zero when timeout is not zero (waiting for {})",
                self.mode
            )));
        }
        Ok(())
    }
}

/// Maps a signed timeout onto the budget the poller uses: negative values become
/// [MAX_TIMEOUT], everything else is kept as is.
pub fn clamp_timeout(timeout: TimeDelta) -> Duration {
    timeout.to_std().unwrap_or(MAX_TIMEOUT)
}

/// Parses a Go-style duration string with an optional sign, e.g. `"30s"`, `"1m30s"`,
/// `"1.5s"`, `"0"` or `"-1s"`.
pub fn parse_signed_duration(input: &str) -> Result<TimeDelta> {
    let invalid = |reason: String| Error::InvalidDuration {
        input: input.to_owned(),
        reason,
    };

    let trimmed = input.trim();
    let (negative, magnitude) = match trimmed.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, trimmed.strip_prefix('+').unwrap_or(trimmed)),
    };
    if magnitude.is_empty() {
        return Err(invalid("empty duration".to_owned()));
    }
    // a bare zero is the only unitless duration
    if magnitude == "0" {
        return Ok(TimeDelta::zero());
    }

    let magnitude = whole_units(magnitude).map_err(invalid)?;
    let duration = duration_str::parse(&magnitude).map_err(|e| invalid(e.to_string()))?;
    let delta = TimeDelta::from_std(duration).map_err(|e| invalid(e.to_string()))?;

    Ok(if negative { -delta } else { delta })
}

/// Rewrites fractional terms such as `1.5s` into whole nanoseconds, leaving the rest as is.
fn whole_units(magnitude: &str) -> std::result::Result<String, String> {
    if !magnitude.contains('.') {
        return Ok(magnitude.to_owned());
    }

    let mut normalized = String::with_capacity(magnitude.len());
    let mut rest = magnitude;
    while !rest.is_empty() {
        let amount_end = rest.find(|c: char| !(c.is_ascii_digit() || c == '.')).unwrap_or(rest.len());
        let unit_end = rest[amount_end..]
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .map_or(rest.len(), |offset| amount_end + offset);
        let (amount, unit) = (&rest[..amount_end], rest[amount_end..unit_end].trim());
        rest = &rest[unit_end..];

        let Some((whole, fraction)) = amount.split_once('.') else {
            normalized.push_str(amount);
            normalized.push_str(unit);
            continue;
        };
        let nanos_per_unit: u128 = match unit {
            "ns" => 1,
            "us" | "µs" => 1_000,
            "ms" => 1_000_000,
            "s" => 1_000_000_000,
            "m" => 60_000_000_000,
            "h" => 3_600_000_000_000,
            _ => return Err(format!("unsupported unit '{unit}' for fractional amount '{amount}'")),
        };
        let nanos = fractional_nanos(whole, fraction, nanos_per_unit)
            .ok_or_else(|| format!("invalid amount '{amount}'"))?;
        normalized.push_str(&format!("{nanos}ns"));
    }

    Ok(normalized)
}

fn fractional_nanos(whole: &str, fraction: &str, nanos_per_unit: u128) -> Option<u128> {
    let digits = |part: &str| part.bytes().all(|b| b.is_ascii_digit());
    if (whole.is_empty() && fraction.is_empty()) || !digits(whole) || !digits(fraction) || fraction.len() > 18 {
        return None;
    }

    let scale = 10u128.pow(fraction.len() as u32);
    let whole: u128 = if whole.is_empty() { 0 } else { whole.parse().ok()? };
    let fraction: u128 = if fraction.is_empty() { 0 } else { fraction.parse().ok()? };

    whole
        .checked_mul(nanos_per_unit)?
        .checked_add(fraction * nanos_per_unit / scale)
}

fn parse_timeout(input: Option<&str>) -> Result<TimeDelta> {
    match non_empty(input) {
        Some(raw) => parse_signed_duration(raw),
        None => Ok(TimeDelta::seconds(DEFAULT_TIMEOUT_SECONDS)),
    }
}

fn parse_poll_interval(input: Option<&str>) -> Result<Duration> {
    let Some(raw) = non_empty(input) else {
        return Ok(DEFAULT_POLL_INTERVAL);
    };
    parse_signed_duration(raw)?
        .to_std()
        .map_err(|_| Error::UserInput(format!("poll_interval must not be negative, got '{raw}'")))
}

fn non_empty(input: Option<&str>) -> Option<&str> {
    input.map(str::trim).filter(|s| !s.is_empty())
}

/// Settings for waiting on a resource's removal after it was deleted.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default, JsonSchema)]
pub struct WaitForDelete {
    /// Defaults to `30s`. `0s` checks once, negative values wait up to a week.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<String>,
    /// Defaults to `5s`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub poll_interval: Option<String>,
}

impl TryFrom<&WaitForDelete> for WaitSpec {
    type Error = Error;

    fn try_from(block: &WaitForDelete) -> Result<Self> {
        let spec = WaitSpec::deletion()
            .with_timeout(parse_timeout(block.timeout.as_deref())?)
            .with_poll_interval(parse_poll_interval(block.poll_interval.as_deref())?);
        spec.validate()?;
        Ok(spec)
    }
}

/// One condition that must hold after a create or update.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default, JsonSchema)]
pub struct UpsertCondition {
    pub jsonpath: String,
    /// Exact value to wait for. When omitted the field only has to be present and non-empty.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub poll_interval: Option<String>,
}

impl TryFrom<&UpsertCondition> for WaitSpec {
    type Error = Error;

    fn try_from(condition: &UpsertCondition) -> Result<Self> {
        let path = JsonPath::parse(&condition.jsonpath)?;
        let spec = WaitSpec::field_value(path, condition.value.clone())
            .with_timeout(parse_timeout(condition.timeout.as_deref())?)
            .with_poll_interval(parse_poll_interval(condition.poll_interval.as_deref())?);
        spec.validate()?;
        Ok(spec)
    }
}

/// The list of conditions checked, in order, after a create or update.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default, JsonSchema)]
#[serde(transparent)]
pub struct WaitForUpsert(pub Vec<UpsertCondition>);

impl WaitForUpsert {
    /// Converts every condition, failing on the first invalid one.
    pub fn specs(&self) -> Result<Vec<WaitSpec>> {
        self.0.iter().map(WaitSpec::try_from).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
