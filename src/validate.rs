//! Validation for string-typed integer fields.
//!
//! Timeout-style parameters arrive as strings from the CLI and from
//! callers porting older tooling; they must pass an anchored integer
//! regex before being interpreted, and the rejection message is matched
//! verbatim by external test suites.

use std::{sync::OnceLock, time::Duration};

use regex::Regex;

use crate::error::GuardianError;

static NON_NEGATIVE_INT: OnceLock<Regex> = OnceLock::new();

fn non_negative_int() -> &'static Regex {
    NON_NEGATIVE_INT.get_or_init(|| Regex::new(r"^[0-9]+$").expect("static pattern"))
}

/// Parses a non-negative number of seconds out of `raw`.
///
/// Returns a [`GuardianError::Validation`] naming `field` when `raw` is
/// not a plain decimal integer.
pub fn seconds(field: &'static str, raw: &str) -> Result<Duration, GuardianError> {
    let trimmed = raw.trim();
    if !non_negative_int().is_match(trimmed) {
        return Err(GuardianError::Validation {
            field,
            value: raw.to_string(),
        });
    }
    let secs = trimmed.parse::<u64>().map_err(|_| GuardianError::Validation {
        field,
        value: raw.to_string(),
    })?;
    Ok(Duration::from_secs(secs))
}
