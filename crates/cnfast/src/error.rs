//! Error taxonomy for the execution core.
//!
//! [`ActionError`] covers construction-time failures: they are fatal and
//! bypass the retry loop. [`RunError`] covers execution-time failures of a
//! child process: they are endpoint-specific and retryable.

use std::process::ExitStatus;

/// Fatal input/configuration errors, reported before or instead of a trial.
#[derive(Debug, thiserror::Error)]
pub enum ActionError {
    #[error("no endpoints available")]
    EmptyEndpointSet,

    #[error("unsupported {family} command '{subcommand}' (supported: {supported})")]
    UnsupportedSubcommand {
        family: &'static str,
        subcommand: String,
        supported: String,
    },

    #[error("missing argument: {0}")]
    MissingArgument(&'static str),
}

/// Failure of one child-process execution.
#[derive(Debug, thiserror::Error)]
pub enum RunError {
    #[error("failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed waiting for {program}: {source}")]
    Wait {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{program} {}", describe_status(.status))]
    Exit { program: String, status: ExitStatus },
}

/// Render an exit status as "exited with status N" or "terminated by signal N".
fn describe_status(status: &ExitStatus) -> String {
    if let Some(code) = status.code() {
        return format!("exited with status {code}");
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return format!("terminated by signal {signal}");
        }
    }
    "terminated abnormally".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unsupported_subcommand_message_lists_allow_list() {
        let err = ActionError::UnsupportedSubcommand {
            family: "git",
            subcommand: "rebase".to_string(),
            supported: "clone, pull".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "unsupported git command 'rebase' (supported: clone, pull)"
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_exit_error_reports_code() {
        use std::os::unix::process::ExitStatusExt;
        let err = RunError::Exit {
            program: "git".to_string(),
            status: ExitStatus::from_raw(128 << 8),
        };
        assert_eq!(err.to_string(), "git exited with status 128");
    }

    #[cfg(unix)]
    #[test]
    fn test_exit_error_reports_signal() {
        use std::os::unix::process::ExitStatusExt;
        let err = RunError::Exit {
            program: "docker".to_string(),
            status: ExitStatus::from_raw(9),
        };
        assert_eq!(err.to_string(), "docker terminated by signal 9");
    }
}
