//! Unified error code interface.
//!
//! Every user-facing error in the consent workspace implements
//! [`ErrorCode`] so the transport layer can render a stable,
//! machine-readable code next to the human-readable message.
//!
//! # Example
//!
//! ```
//! use consent_types::ErrorCode;
//!
//! #[derive(Debug)]
//! enum LookupError {
//!     Missing,
//!     Unavailable,
//! }
//!
//! impl ErrorCode for LookupError {
//!     fn code(&self) -> &'static str {
//!         match self {
//!             Self::Missing => "LOOKUP_MISSING",
//!             Self::Unavailable => "LOOKUP_UNAVAILABLE",
//!         }
//!     }
//!
//!     fn is_recoverable(&self) -> bool {
//!         matches!(self, Self::Unavailable)
//!     }
//! }
//!
//! assert_eq!(LookupError::Missing.code(), "LOOKUP_MISSING");
//! assert!(LookupError::Unavailable.is_recoverable());
//! ```

/// Machine-readable error classification.
///
/// # Code Format
///
/// - **UPPER_SNAKE_CASE**, e.g. `"CONSENT_TOTAL_ACCURATE"`
/// - Prefixed with the owning crate's namespace (`CONSENT_`, `RULE_`, `CONFIG_`)
/// - Stable once published: clients match on these strings
pub trait ErrorCode {
    /// Returns the stable machine-readable code.
    fn code(&self) -> &'static str;

    /// Returns whether retrying or user action may resolve the error.
    ///
    /// Invalid request modifiers are not recoverable by retry; the
    /// client has to change the request.
    fn is_recoverable(&self) -> bool;
}

/// Asserts that an error code is non-empty, carries `expected_prefix`
/// and is UPPER_SNAKE_CASE.
///
/// # Panics
///
/// Panics with a descriptive message if any check fails.
///
/// # Example
///
/// ```
/// use consent_types::{assert_error_code, ErrorCode};
///
/// struct Denied;
///
/// impl ErrorCode for Denied {
///     fn code(&self) -> &'static str { "CONSENT_DENIED" }
///     fn is_recoverable(&self) -> bool { false }
/// }
///
/// assert_error_code(&Denied, "CONSENT_");
/// ```
pub fn assert_error_code<E: ErrorCode>(err: &E, expected_prefix: &str) {
    let code = err.code();

    assert!(!code.is_empty(), "Error code must not be empty");
    assert!(
        code.starts_with(expected_prefix),
        "Error code '{}' must start with prefix '{}'",
        code,
        expected_prefix
    );
    assert!(
        is_upper_snake_case(code),
        "Error code '{}' must be UPPER_SNAKE_CASE",
        code
    );
}

/// Runs [`assert_error_code`] over every given error.
pub fn assert_error_codes<E: ErrorCode>(errors: &[E], expected_prefix: &str) {
    for err in errors {
        assert_error_code(err, expected_prefix);
    }
}

fn is_upper_snake_case(s: &str) -> bool {
    if s.is_empty() || s.starts_with('_') || s.ends_with('_') || s.contains("__") {
        return false;
    }

    s.chars()
        .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    enum SampleError {
        Busy,
        Forbidden,
    }

    impl ErrorCode for SampleError {
        fn code(&self) -> &'static str {
            match self {
                Self::Busy => "SAMPLE_BUSY",
                Self::Forbidden => "SAMPLE_FORBIDDEN",
            }
        }

        fn is_recoverable(&self) -> bool {
            matches!(self, Self::Busy)
        }
    }

    #[test]
    fn codes_and_recoverability() {
        assert_eq!(SampleError::Busy.code(), "SAMPLE_BUSY");
        assert!(SampleError::Busy.is_recoverable());
        assert!(!SampleError::Forbidden.is_recoverable());
    }

    #[test]
    fn assert_error_codes_all_variants() {
        assert_error_codes(&[SampleError::Busy, SampleError::Forbidden], "SAMPLE_");
    }

    #[test]
    #[should_panic(expected = "must start with prefix")]
    fn wrong_prefix_panics() {
        assert_error_code(&SampleError::Busy, "OTHER_");
    }

    #[test]
    fn upper_snake_case_detection() {
        assert!(is_upper_snake_case("CONSENT_TOTAL_ACCURATE"));
        assert!(is_upper_snake_case("CODE_2037"));
        assert!(!is_upper_snake_case(""));
        assert!(!is_upper_snake_case("consent"));
        assert!(!is_upper_snake_case("_LEADING"));
        assert!(!is_upper_snake_case("TRAILING_"));
        assert!(!is_upper_snake_case("DOUBLE__UNDERSCORE"));
    }
}
