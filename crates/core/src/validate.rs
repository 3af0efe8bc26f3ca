//! Field checks shared by the domain services
//!
//! Messages follow the `<field> is required` convention so callers see the
//! same wording no matter which operation rejected the input.

use chrono::{DateTime, NaiveDate, Utc};

use crate::error::{LedgerError, LedgerResult};

/// Fail with `<field> is required` when the value is blank
pub fn require(field: &str, value: &str) -> LedgerResult<()> {
    if value.trim().is_empty() {
        return Err(LedgerError::required(field));
    }
    Ok(())
}

/// Check several `(field, value)` pairs in order, reporting the first blank one
pub fn require_all(fields: &[(&str, &str)]) -> LedgerResult<()> {
    for (field, value) in fields {
        require(field, value)?;
    }
    Ok(())
}

pub fn require_email(field: &str, value: &str) -> LedgerResult<()> {
    require(field, value)?;
    let mut parts = value.splitn(2, '@');
    let local = parts.next().unwrap_or_default();
    let domain = parts.next().unwrap_or_default();
    if local.is_empty() || !domain.contains('.') || domain.starts_with('.') {
        return Err(LedgerError::Validation(format!("{} is not a valid email address", field)));
    }
    Ok(())
}

/// Parse a `YYYY-MM-DD` date that must lie strictly before `now`
pub fn past_date(field: &str, value: &str, now: DateTime<Utc>) -> LedgerResult<NaiveDate> {
    require(field, value)?;
    let date = NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map_err(|_| LedgerError::Validation(format!("{} must be formatted YYYY-MM-DD", field)))?;
    if date >= now.date_naive() {
        return Err(LedgerError::Validation(format!("{} must be in the past", field)));
    }
    Ok(date)
}
