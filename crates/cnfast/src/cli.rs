//! Command-line dispatch.
//!
//! Only the leading words are interpreted here. Everything after the
//! sub-action is forwarded verbatim to the action builders, so flags meant
//! for git/docker are never parsed as ours.

/// A parsed invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Help,
    Version,
    Git { subcommand: String, args: Vec<String> },
    Docker { subcommand: String, args: Vec<String> },
    Compose { args: Vec<String> },
}

impl Command {
    /// `(family, subcommand)` for span labelling.
    pub fn labels(&self) -> (&str, &str) {
        match self {
            Command::Help => ("help", ""),
            Command::Version => ("version", ""),
            Command::Git { subcommand, .. } => ("git", subcommand.as_str()),
            Command::Docker { subcommand, .. } => ("docker", subcommand.as_str()),
            Command::Compose { .. } => ("docker-compose", ""),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UsageError {
    #[error("unsupported command: {0}")]
    UnknownCommand(String),

    #[error("missing command\nUsage: cnfast {0} <command> [arguments]")]
    MissingSubcommand(&'static str),
}

/// Parse the arguments after the program name.
pub fn parse(args: &[String]) -> Result<Command, UsageError> {
    let Some(first) = args.first() else {
        return Ok(Command::Help);
    };
    let rest = &args[1..];

    match first.to_ascii_lowercase().as_str() {
        "git" => {
            let (subcommand, args) = split_subcommand("git", rest)?;
            Ok(Command::Git { subcommand, args })
        }
        "docker" => {
            if rest
                .first()
                .is_some_and(|s| s.eq_ignore_ascii_case("compose"))
            {
                return Ok(Command::Compose {
                    args: rest[1..].to_vec(),
                });
            }
            let (subcommand, args) = split_subcommand("docker", rest)?;
            Ok(Command::Docker { subcommand, args })
        }
        "docker-compose" => Ok(Command::Compose {
            args: rest.to_vec(),
        }),
        "-v" | "--version" | "v" | "version" => Ok(Command::Version),
        "-h" | "--help" | "h" | "help" => Ok(Command::Help),
        other => Err(UsageError::UnknownCommand(other.to_string())),
    }
}

fn split_subcommand(
    family: &'static str,
    rest: &[String],
) -> Result<(String, Vec<String>), UsageError> {
    match rest.split_first() {
        Some((subcommand, args)) => Ok((subcommand.clone(), args.to_vec())),
        None => Err(UsageError::MissingSubcommand(family)),
    }
}

pub const USAGE_HINT: &str = "Usage: cnfast <command> [arguments]\nRun 'cnfast --help' for details.";

pub fn help_text() -> String {
    format!(
        "cnfast {version} - git and docker accelerator

Usage: cnfast <command> [arguments]

Commands:
  git <command>            Run git through a GitHub accelerator
    clone <repo> [dir]     Clone a GitHub repository
    pull | fetch | push    Run with the first GitHub URL argument routed
    down <url> [file]      Download a GitHub release file with curl

  docker <command>         Run docker through a registry accelerator
    pull <image>           Pull an image, then restore its original name
    push <image>           Push through the accelerated registry
    build ...              Build with arguments passed through

  docker-compose [-f FILE] Pull every image of a compose file
  docker compose [-f FILE] Same as docker-compose

  -v, --version            Show version
  -h, --help               Show this help

When an endpoint fails you are asked whether to try the next one.

Environment:
  CNFAST_API_HOST          Directory service URL
  CNFAST_TIMEOUT           Directory lookup timeout in seconds
  CNFAST_DEBUG             Show routed commands and debug logs
  CNFAST_CONFIG            Config file path (default: cnfast.toml)

Examples:
  cnfast git clone https://github.com/user/repo.git
  cnfast docker pull nginx:latest
  cnfast docker compose",
        version = env!("CARGO_PKG_VERSION")
    )
}

pub fn version_text() -> String {
    format!("cnfast v{}", env!("CARGO_PKG_VERSION"))
}
