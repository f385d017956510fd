//! Action builders: turn a requested sub-action plus an endpoint into a
//! concrete external command.
//!
//! Builders validate their sub-action when constructed, so an unsupported
//! command or a missing argument is reported before any endpoint is tried.

pub mod git;
pub mod image;

use crate::endpoint::Endpoint;
use crate::error::ActionError;
use crate::runner::CommandSpec;

/// Post-success step restoring the user-facing image name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Retag {
    /// Tags the routed reference with the original one. Runs exactly once.
    pub tag: CommandSpec,
    /// Removes the routed tag. Best effort.
    pub cleanup: CommandSpec,
}

/// Everything needed to run one trial against one endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub command: CommandSpec,
    /// Host to mask in the child's output.
    pub redact: Option<String>,
    pub retag: Option<Retag>,
}

/// Builds the per-endpoint invocation for one logical user action.
pub trait ActionBuilder {
    /// Short human-readable label, e.g. `git clone`.
    fn label(&self) -> String;

    fn build(&self, endpoint: &Endpoint) -> Result<Invocation, ActionError>;
}

/// Fail with `UnsupportedSubcommand` unless `subcommand` is in `allowed`.
pub(crate) fn ensure_supported(
    family: &'static str,
    subcommand: &str,
    allowed: &[&str],
) -> Result<(), ActionError> {
    if allowed.contains(&subcommand) {
        return Ok(());
    }
    Err(ActionError::UnsupportedSubcommand {
        family,
        subcommand: subcommand.to_string(),
        supported: allowed.join(", "),
    })
}

/// Redaction token for an endpoint: its host, or nothing when empty.
pub(crate) fn redaction_token(endpoint: &Endpoint) -> Option<String> {
    let host = endpoint.host();
    (!host.is_empty()).then_some(host)
}
