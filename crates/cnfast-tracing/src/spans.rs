//! Span builder helpers for cnfast instrumentation.

/// Create the root span for one cnfast invocation.
///
/// Usage: `let _span = invocation_span!(invocation_id, "git", "clone").entered();`
///
/// `outcome` is recorded once the action finishes ("success" or "aborted").
#[macro_export]
macro_rules! invocation_span {
    ($invocation_id:expr, $family:expr, $subcommand:expr) => {
        tracing::info_span!(
            "invocation",
            invocation_id = %$invocation_id,
            family = %$family,
            subcommand = %$subcommand,
            outcome = tracing::field::Empty,
        )
    };
}

/// Create a span for a directory lookup of one service kind.
#[macro_export]
macro_rules! lookup_span {
    ($kind:expr) => {
        tracing::info_span!(
            "directory_lookup",
            kind = %$kind,
            endpoint_count = tracing::field::Empty,
            latency_ms = tracing::field::Empty,
        )
    };
}

/// Create a span for one endpoint trial inside the retry controller.
///
/// Only the endpoint id is recorded; the endpoint host is redacted from all
/// user-visible output and is kept out of telemetry as well.
#[macro_export]
macro_rules! trial_span {
    ($index:expr, $endpoint_id:expr, $score:expr) => {
        tracing::info_span!(
            "endpoint_trial",
            index = $index,
            endpoint_id = %$endpoint_id,
            score = $score,
            success = tracing::field::Empty,
        )
    };
}

/// Create a span for one external command execution.
#[macro_export]
macro_rules! child_process_span {
    ($program:expr) => {
        tracing::info_span!(
            "child_process",
            program = %$program,
            exit_code = tracing::field::Empty,
            duration_ms = tracing::field::Empty,
        )
    };
}
