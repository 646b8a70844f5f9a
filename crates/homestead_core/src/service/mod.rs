//! Ledger use-case services.
//!
//! # Responsibility
//! - Validate caller input before it reaches the repositories.
//! - Map repository failures onto the public [`CoreError`] kinds.
//! - Emit one `ok` or `rejected` event line per write.

use crate::error::{CoreError, CoreResult, ErrorKind};
use crate::logging::sanitize_message;
use log::{error, info, warn};
use std::time::Instant;

pub mod billing_service;
pub mod household_service;
pub mod payment_service;
pub mod revenue_service;
pub mod user_service;

const MAX_LOGGED_ERROR_CHARS: usize = 200;

/// Logs the outcome of one write operation and passes the result through.
pub(crate) fn log_write<T>(
    event: &str,
    module: &str,
    fields: &str,
    started: Instant,
    result: CoreResult<T>,
) -> CoreResult<T> {
    let duration_ms = started.elapsed().as_millis();
    match &result {
        Ok(_) => info!("event={event} module={module} status=ok {fields} duration_ms={duration_ms}"),
        Err(err) if err.kind() == ErrorKind::Storage => error!(
            "event={event} module={module} status=error {fields} duration_ms={duration_ms} error_code={} error={}",
            err.code(),
            sanitize_message(&err.to_string(), MAX_LOGGED_ERROR_CHARS)
        ),
        Err(err) => warn!(
            "event={event} module={module} status=rejected {fields} duration_ms={duration_ms} error_code={}",
            err.code()
        ),
    }
    result
}

/// Trims `value` and rejects it when blank.
pub(crate) fn required_text(value: &str, field: &str) -> CoreResult<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(CoreError::validation(format!("{field} must not be blank")));
    }
    Ok(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::required_text;
    use crate::error::ErrorKind;

    #[test]
    fn required_text_trims_and_rejects_blank() {
        assert_eq!(required_text("  Block A  ", "name").unwrap(), "Block A");
        let err = required_text(" \t", "name").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert!(err.to_string().contains("name"));
    }
}
