//! Input validation helpers
//!
//! Centralized text length constants and validation functions.
//! Everything here runs before any state is touched.

use crate::core::{BookingError, BookingResult};

// ── Text length limits ──────────────────────────────────────────────

/// Entity names: tenant, service, resource
pub const MAX_NAME_LEN: usize = 200;

/// URL-safe slugs
pub const MAX_SLUG_LEN: usize = 64;

/// Opaque ids supplied by callers (customer ids, entity ids)
pub const MAX_ID_LEN: usize = 128;

/// Client-generated idempotency keys
pub const MAX_IDEMPOTENCY_KEY_LEN: usize = 128;

/// Cancellation reasons
pub const MAX_REASON_LEN: usize = 500;

/// Upper bound for a single service, one full day
pub const MAX_SERVICE_DURATION_MINUTES: u32 = 24 * 60;

// ── Validation helpers ──────────────────────────────────────────────

/// Validate that a required string is non-empty and within the length limit.
pub fn validate_required_text(value: &str, field: &str, max_len: usize) -> BookingResult<()> {
    if value.trim().is_empty() {
        return Err(BookingError::validation(format!("{field} must not be empty")));
    }
    check_length(value, field, max_len)
}

/// Validate that an optional string, if present, is within the length limit.
pub fn validate_optional_text(value: Option<&str>, field: &str, max_len: usize) -> BookingResult<()> {
    match value {
        Some(v) => check_length(v, field, max_len),
        None => Ok(()),
    }
}

/// Limits count characters, not UTF-8 bytes
fn check_length(value: &str, field: &str, max_len: usize) -> BookingResult<()> {
    let chars = value.chars().count();
    if chars > max_len {
        return Err(BookingError::validation(format!(
            "{field} is too long ({chars} chars, max {max_len})"
        )));
    }
    Ok(())
}

/// Slugs: lowercase ASCII letters, digits and `-`, not starting or ending with `-`
pub fn validate_slug(slug: &str, field: &str) -> BookingResult<()> {
    validate_required_text(slug, field, MAX_SLUG_LEN)?;
    let well_formed = slug
        .bytes()
        .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-')
        && !slug.starts_with('-')
        && !slug.ends_with('-');
    if !well_formed {
        return Err(BookingError::validation(format!(
            "{field} must contain only lowercase letters, digits and '-': {slug}"
        )));
    }
    Ok(())
}

/// IANA timezone name understood by chrono-tz
pub fn validate_timezone(timezone: &str) -> BookingResult<chrono_tz::Tz> {
    timezone
        .parse::<chrono_tz::Tz>()
        .map_err(|_| BookingError::validation(format!("unknown timezone: {timezone}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_required_text() {
        assert!(validate_required_text("ok", "name", 10).is_ok());
        assert!(validate_required_text("   ", "name", 10).is_err());
        assert!(validate_required_text("toolongvalue", "name", 5).is_err());
    }

    #[test]
    fn test_optional_text() {
        assert!(validate_optional_text(None, "reason", 3).is_ok());
        assert!(validate_optional_text(Some("abc"), "reason", 3).is_ok());
        assert!(validate_optional_text(Some("abcd"), "reason", 3).is_err());
    }

    #[test]
    fn test_length_counts_characters() {
        // 5 characters, 7 bytes
        let name = "ñandú";
        assert!(validate_required_text(name, "name", 5).is_ok());
        assert!(validate_optional_text(Some(name), "reason", 5).is_ok());

        match validate_required_text("ñandúes", "name", 5) {
            Err(BookingError::Validation(message)) => {
                assert_eq!(message, "name is too long (7 chars, max 5)");
            }
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn test_slug() {
        assert!(validate_slug("barber-shop-1", "slug").is_ok());
        assert!(validate_slug("Barber", "slug").is_err());
        assert!(validate_slug("-barber", "slug").is_err());
        assert!(validate_slug("bar ber", "slug").is_err());
        assert!(validate_slug("", "slug").is_err());
    }

    #[test]
    fn test_timezone() {
        assert_eq!(
            validate_timezone("Europe/Madrid").unwrap(),
            chrono_tz::Europe::Madrid
        );
        assert!(validate_timezone("Mars/Olympus").is_err());
    }
}
