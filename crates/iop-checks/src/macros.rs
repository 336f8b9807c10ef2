//! ---
//! iop_section: "05-verification-suites"
//! iop_subsection: "module"
//! iop_type: "source"
//! iop_scope: "code"
//! iop_description: "Assertion macros returning check failures."
//! iop_version: "v0.1.0"
//! iop_owner: "tbd"
//! ---

/// Fail the enclosing check with a formatted message unless `cond` holds.
#[macro_export]
macro_rules! verify {
    ($cond:expr, $($arg:tt)+) => {
        if !$cond {
            return Err($crate::CheckFailure::Assertion(format!($($arg)+)));
        }
    };
}

/// Fail the enclosing check unless `haystack` contains `needle`.
#[macro_export]
macro_rules! verify_contains {
    ($haystack:expr, $needle:expr) => {{
        let haystack: &str = &$haystack;
        let needle: &str = &$needle;
        $crate::verify!(
            haystack.contains(needle),
            "expected '{}' in output: {}",
            needle,
            haystack.trim()
        );
    }};
}

/// End the enclosing check as skipped.
#[macro_export]
macro_rules! skip {
    ($($arg:tt)+) => {
        return Err($crate::CheckFailure::Skipped(format!($($arg)+)))
    };
}
