use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::Once;

static LOGGER: Once = Once::new();

static EMAIL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\S+@\S+\.\S+$").unwrap_or_else(|e| panic!("invalid email pattern: {e}"))
});

/// Installs `env_logger` once; later calls are no-ops.
pub fn init_logging() {
    LOGGER.call_once(|| {
        let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
            .format_timestamp_millis()
            .try_init();
    });
}

pub fn is_valid_email(email: &str) -> bool {
    EMAIL_RE.is_match(email.trim())
}

/// Case-insensitive substring match; `needle` must already be lowercase.
pub fn contains_lower(haystack: Option<&str>, needle: &str) -> bool {
    haystack
        .map(|h| h.to_lowercase().contains(needle))
        .unwrap_or(false)
}

pub fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Local part of an address, used for compact labels.
pub fn email_handle(email: &str) -> &str {
    email.split('@').next().unwrap_or(email)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_email_validation() {
        assert!(is_valid_email("jane@corp.example"));
        assert!(is_valid_email("  ops@it.co  "));
        assert!(!is_valid_email("jane@corp"));
        assert!(!is_valid_email("not an email"));
        assert!(!is_valid_email(""));
    }

    #[test]
    fn test_contains_lower() {
        assert!(contains_lower(Some("Printer on FLOOR 3"), "floor"));
        assert!(!contains_lower(None, "floor"));
    }

    #[test]
    fn test_non_blank_and_handle() {
        assert_eq!(non_blank(Some("  ")), None);
        assert_eq!(non_blank(Some(" x ")), Some("x"));
        assert_eq!(email_handle("sam@desk.io"), "sam");
    }
}
