//! Retry controller: drives one user action across the ranked endpoints.
//!
//! States and transitions:
//!
//! ```text
//! TryingEndpoint(i) --run ok--------------------------> Success
//! TryingEndpoint(i) --run failed, i not last----------> AskRetry
//! TryingEndpoint(i) --run failed, i last--------------> Aborted (exhausted)
//! TryingEndpoint(i) --build failed--------------------> Aborted (construction)
//! AskRetry          --Decision::Retry-----------------> TryingEndpoint(i + 1)
//! AskRetry          --Decision::Abort-----------------> Aborted (declined)
//! ```
//!
//! The decision step is supplied by the caller through [`RetryDecider`].

use std::fmt;

use tracing::Instrument;

use crate::action::{ActionBuilder, Retag};
use crate::endpoint::{self, Endpoint};
use crate::error::{ActionError, RunError};
use crate::runner::Execute;

/// Answer to "try the next endpoint?".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Retry,
    Abort,
}

/// Decides whether to advance after an endpoint failed.
pub trait RetryDecider {
    fn decide(&mut self, failed: &Endpoint, error: &RunError) -> Decision;
}

/// Result of the post-pull retag step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetagReport {
    pub tagged: bool,
    pub cleaned_up: bool,
}

/// Why an action stopped without success.
#[derive(Debug)]
pub enum AbortReason {
    /// The command could not be built; no endpoint-specific retry applies.
    Construction(ActionError),
    /// The user declined to try the next endpoint.
    Declined { endpoint_id: String, error: RunError },
    /// The last endpoint failed.
    Exhausted { endpoint_id: String, error: RunError },
}

impl fmt::Display for AbortReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AbortReason::Construction(e) => write!(f, "failed to build command: {e}"),
            AbortReason::Declined { endpoint_id, error } => {
                write!(f, "cancelled after endpoint {endpoint_id} failed: {error}")
            }
            AbortReason::Exhausted { endpoint_id, error } => write!(
                f,
                "all endpoints failed, last error (endpoint {endpoint_id}): {error}"
            ),
        }
    }
}

/// Terminal result of one controller run.
#[derive(Debug)]
pub enum ActionOutcome {
    Succeeded {
        endpoint: Endpoint,
        retag: Option<RetagReport>,
    },
    Aborted(AbortReason),
}

impl ActionOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, ActionOutcome::Succeeded { .. })
    }

    pub fn exit_code(&self) -> i32 {
        if self.is_success() {
            0
        } else {
            1
        }
    }
}

/// Controller state. `AskRetry` remembers which endpoint failed and why.
#[derive(Debug)]
enum RetryState {
    TryingEndpoint(usize),
    AskRetry { failed: usize, error: RunError },
    Success { index: usize, retag: Option<RetagReport> },
    Aborted(AbortReason),
}

/// Sequences endpoint trials for one action.
pub struct RetryController<'a, E, D> {
    endpoints: Vec<Endpoint>,
    executor: &'a E,
    decider: &'a mut D,
}

impl<'a, E, D> RetryController<'a, E, D>
where
    E: Execute,
    D: RetryDecider,
{
    /// Rank `endpoints` and prepare a controller over them.
    pub fn new(
        endpoints: &[Endpoint],
        executor: &'a E,
        decider: &'a mut D,
    ) -> Result<Self, ActionError> {
        Ok(Self {
            endpoints: endpoint::rank(endpoints)?,
            executor,
            decider,
        })
    }

    /// The trial order.
    pub fn endpoints(&self) -> &[Endpoint] {
        &self.endpoints
    }

    /// Run the state machine to a terminal state.
    pub async fn run<B: ActionBuilder>(&mut self, builder: &B) -> ActionOutcome {
        let mut state = RetryState::TryingEndpoint(0);
        loop {
            state = match state {
                RetryState::TryingEndpoint(index) => self.try_endpoint(index, builder).await,
                RetryState::AskRetry { failed, error } => {
                    match self.decider.decide(&self.endpoints[failed], &error) {
                        Decision::Retry => {
                            println!("\nTrying the next endpoint...\n");
                            RetryState::TryingEndpoint(failed + 1)
                        }
                        Decision::Abort => RetryState::Aborted(AbortReason::Declined {
                            endpoint_id: self.endpoints[failed].id.clone(),
                            error,
                        }),
                    }
                }
                RetryState::Success { index, retag } => {
                    let endpoint = self.endpoints[index].clone();
                    println!("Endpoint {} completed {}", endpoint.id, builder.label());
                    return ActionOutcome::Succeeded { endpoint, retag };
                }
                RetryState::Aborted(reason) => return ActionOutcome::Aborted(reason),
            };
        }
    }

    async fn try_endpoint<B: ActionBuilder>(&self, index: usize, builder: &B) -> RetryState {
        let endpoint = &self.endpoints[index];
        let span = cnfast_tracing::trial_span!(index, &endpoint.id, endpoint.score);

        async {
            println!(
                "Using endpoint: {} (score: {}, {})",
                endpoint.display_name(),
                endpoint.score,
                endpoint.score_label()
            );

            let invocation = match builder.build(endpoint) {
                Ok(invocation) => invocation,
                Err(e) => return RetryState::Aborted(AbortReason::Construction(e)),
            };
            tracing::debug!(command = %invocation.command, "Executing");

            let redact = invocation.redact.as_deref();
            match self.executor.execute(&invocation.command, redact).await {
                Ok(()) => {
                    tracing::Span::current().record("success", true);
                    let retag = match &invocation.retag {
                        Some(retag) => Some(self.retag(retag, redact).await),
                        None => None,
                    };
                    RetryState::Success { index, retag }
                }
                Err(error) => {
                    tracing::Span::current().record("success", false);
                    tracing::info!(error = %error, "Endpoint trial failed");
                    if index + 1 < self.endpoints.len() {
                        RetryState::AskRetry {
                            failed: index,
                            error,
                        }
                    } else {
                        RetryState::Aborted(AbortReason::Exhausted {
                            endpoint_id: endpoint.id.clone(),
                            error,
                        })
                    }
                }
            }
        }
        .instrument(span)
        .await
    }

    /// Tag the routed image with its original name, then drop the routed tag.
    ///
    /// Failures are logged and reported, never propagated: the pull already
    /// succeeded. Cleanup is skipped when tagging failed so the pulled image
    /// keeps at least one name.
    async fn retag(&self, retag: &Retag, redact: Option<&str>) -> RetagReport {
        if let Err(e) = self.executor.execute(&retag.tag, redact).await {
            tracing::warn!(error = %e, "Failed to restore original image name");
            return RetagReport {
                tagged: false,
                cleaned_up: false,
            };
        }

        let cleaned_up = match self.executor.execute(&retag.cleanup, redact).await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to remove routed image tag");
                false
            }
        };

        RetagReport {
            tagged: true,
            cleaned_up,
        }
    }
}
