//! ---
//! iop_section: "03-logging"
//! iop_subsection: "module"
//! iop_type: "source"
//! iop_scope: "code"
//! iop_description: "Context-enriched logging macros."
//! iop_version: "v0.1.0"
//! iop_owner: "tbd"
//! ---

#[doc(hidden)]
#[macro_export]
macro_rules! __iop_event {
    ($level:expr, $ctx:expr, $($arg:tt)+) => {{
        let ctx = &$ctx;
        tracing::event!(
            $level,
            host = ctx.host.unwrap_or(""),
            suite = ctx.suite.unwrap_or(""),
            check = ctx.check.unwrap_or(""),
            user = ctx.user.unwrap_or(""),
            message = %format_args!($($arg)+)
        );
    }};
}

/// Emit an informational log enriched with check context.
#[macro_export]
macro_rules! iop_info {
    (context = $ctx:expr, $($arg:tt)+) => {
        $crate::__iop_event!(tracing::Level::INFO, $ctx, $($arg)+)
    };
    ($($arg:tt)+) => {
        $crate::__iop_event!(tracing::Level::INFO, $crate::LogContext::default(), $($arg)+)
    };
}

/// Emit a debug log enriched with check context.
#[macro_export]
macro_rules! iop_debug {
    (context = $ctx:expr, $($arg:tt)+) => {
        $crate::__iop_event!(tracing::Level::DEBUG, $ctx, $($arg)+)
    };
    ($($arg:tt)+) => {
        $crate::__iop_event!(tracing::Level::DEBUG, $crate::LogContext::default(), $($arg)+)
    };
}

/// Emit a warning enriched with check context.
#[macro_export]
macro_rules! iop_warn {
    (context = $ctx:expr, $($arg:tt)+) => {
        $crate::__iop_event!(tracing::Level::WARN, $ctx, $($arg)+)
    };
    ($($arg:tt)+) => {
        $crate::__iop_event!(tracing::Level::WARN, $crate::LogContext::default(), $($arg)+)
    };
}

/// Emit an error log enriched with check context.
#[macro_export]
macro_rules! iop_error {
    (context = $ctx:expr, $($arg:tt)+) => {
        $crate::__iop_event!(tracing::Level::ERROR, $ctx, $($arg)+)
    };
    ($($arg:tt)+) => {
        $crate::__iop_event!(tracing::Level::ERROR, $crate::LogContext::default(), $($arg)+)
    };
}
