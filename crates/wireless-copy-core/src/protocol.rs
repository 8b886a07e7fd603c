// SPDX-License-Identifier: AGPL-3.0
// Wireless File Copy Core - Wire protocol constants and helpers
//
// Both binaries build and parse requests through this module so the two
// sides cannot drift apart.

use std::time::{SystemTime, UNIX_EPOCH};

pub const AUTH_PATH: &str = "/auth/";
pub const INFO_PATH: &str = "/info/";
pub const UPLOAD_PATH: &str = "/upload/";
pub const LOGOUT_PATH: &str = "/logout/";

/// Header carrying `"<scheme> <token>"`
pub const AUTH_HEADER: &str = "Authentication";
/// Scheme announced by the server in `/auth/` responses
pub const DEFAULT_SCHEME: &str = "Bearer";

/// Query parameter naming the file on `/info/`
pub const INFO_PATH_PARAM: &str = "url";
/// Query parameter naming the file on `/upload/`
pub const UPLOAD_PATH_PARAM: &str = "path";
pub const LAST_EDIT_PARAM: &str = "last_edit";
pub const OVERWRITE_PARAM: &str = "overwrite";
/// Informational only; the server ignores it
pub const SYSTYPE_PARAM: &str = "systype";

/// Body reads on both sides never exceed this chunk size
pub const CHUNK_SIZE: usize = 8 * 1024;

/// Extract the token from a `"<scheme> <token>"` header value.
///
/// The scheme length is not assumed; the value is split on whitespace and
/// must contain exactly a scheme and a token.
pub fn parse_bearer(value: &str) -> Option<&str> {
    let mut parts = value.split_whitespace();
    let _scheme = parts.next()?;
    let token = parts.next()?;
    if parts.next().is_some() {
        return None;
    }
    Some(token)
}

/// Wire value of the overwrite flag
pub fn overwrite_flag(allow: bool) -> &'static str {
    if allow {
        "1"
    } else {
        "0"
    }
}

/// Only the literal `"1"` permits in-place replacement
pub fn overwrite_allowed(flag: &str) -> bool {
    flag == "1"
}

/// Parse a `last_edit` value into whole seconds, discarding any fraction.
pub fn parse_last_edit(value: &str) -> Option<i64> {
    let value = value.trim();
    let (whole, fraction) = match value.split_once('.') {
        Some((whole, fraction)) => (whole, fraction),
        None => (value, ""),
    };
    if !fraction.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    match whole {
        "" | "-" => None,
        _ => whole.parse().ok(),
    }
}

/// Format a modification time for the `last_edit` parameter
pub fn format_last_edit(mtime: f64) -> String {
    format!("{}", mtime)
}

/// Whole-second part of a fractional timestamp
pub fn whole_seconds(mtime: f64) -> i64 {
    mtime.trunc() as i64
}

/// Seconds since the epoch for a filesystem timestamp
pub fn epoch_seconds(time: SystemTime) -> f64 {
    match time.duration_since(UNIX_EPOCH) {
        Ok(d) => d.as_secs_f64(),
        Err(e) => -e.duration().as_secs_f64(),
    }
}

/// OS family reported in the `systype` parameter
pub fn system_type() -> &'static str {
    std::env::consts::FAMILY
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_parse_bearer_tolerates_any_scheme_length() {
        assert_eq!(parse_bearer("Bearer abc123"), Some("abc123"));
        assert_eq!(parse_bearer("Token abc123"), Some("abc123"));
        assert_eq!(parse_bearer("  Bearer   abc123  "), Some("abc123"));
    }

    #[test]
    fn test_parse_bearer_rejects_malformed() {
        assert_eq!(parse_bearer(""), None);
        assert_eq!(parse_bearer("Bearer"), None);
        assert_eq!(parse_bearer("Bearer "), None);
        assert_eq!(parse_bearer("Bearer a b"), None);
    }

    #[test]
    fn test_parse_last_edit_truncates_fraction() {
        assert_eq!(parse_last_edit("1700000000"), Some(1_700_000_000));
        assert_eq!(parse_last_edit("1700000000.987654"), Some(1_700_000_000));
        assert_eq!(parse_last_edit("1700000000."), Some(1_700_000_000));
        assert_eq!(parse_last_edit("-12.5"), Some(-12));
    }

    #[test]
    fn test_parse_last_edit_rejects_garbage() {
        assert_eq!(parse_last_edit(""), None);
        assert_eq!(parse_last_edit("abc"), None);
        assert_eq!(parse_last_edit(".5"), None);
        assert_eq!(parse_last_edit("12.x"), None);
        assert_eq!(parse_last_edit("1e9"), None);
    }

    #[test]
    fn test_last_edit_round_trip() {
        assert_eq!(format_last_edit(1_700_000_000.0), "1700000000");
        assert_eq!(
            parse_last_edit(&format_last_edit(1_700_000_000.25)),
            Some(1_700_000_000)
        );
    }

    #[test]
    fn test_overwrite_flag() {
        assert!(overwrite_allowed(overwrite_flag(true)));
        assert!(!overwrite_allowed(overwrite_flag(false)));
        assert!(!overwrite_allowed("true"));
    }

    #[test]
    fn test_epoch_seconds() {
        let t = UNIX_EPOCH + Duration::from_millis(1_700_000_000_500);
        assert_eq!(epoch_seconds(t), 1_700_000_000.5);
        assert_eq!(whole_seconds(1_700_000_000.5), 1_700_000_000);
    }
}
