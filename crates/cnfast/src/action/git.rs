//! Git action builder: `clone`/`pull`/`fetch`/`push` through `git`, and
//! `down` (release download) through `curl`.

use url::Url;

use super::{ensure_supported, redaction_token, ActionBuilder, Invocation};
use crate::endpoint::Endpoint;
use crate::error::ActionError;
use crate::rewrite;
use crate::runner::CommandSpec;

pub const SUPPORTED: &[&str] = &["clone", "pull", "fetch", "push", "down"];

/// File name used by `down` when the URL has no usable last segment.
const DEFAULT_DOWNLOAD_NAME: &str = "download";

#[derive(Debug, Clone, PartialEq, Eq)]
enum GitRequest {
    /// `git <subcommand> <args…> --progress`
    Git { subcommand: String, args: Vec<String> },
    /// `curl` download of one URL into `output`.
    Download { url: String, output: String },
}

/// A validated `cnfast git …` request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GitAction {
    request: GitRequest,
}

impl GitAction {
    /// Validate `subcommand` against the allow-list and capture its arguments.
    pub fn new(subcommand: &str, args: &[String]) -> Result<Self, ActionError> {
        ensure_supported("git", subcommand, SUPPORTED)?;

        let request = if subcommand == "down" {
            let url = args
                .first()
                .cloned()
                .ok_or(ActionError::MissingArgument("<url>"))?;
            let output = args
                .get(1)
                .cloned()
                .unwrap_or_else(|| download_name(&url));
            GitRequest::Download { url, output }
        } else {
            GitRequest::Git {
                subcommand: subcommand.to_string(),
                args: args.to_vec(),
            }
        };

        Ok(Self { request })
    }
}

/// Last non-empty path segment of `url`, without query or fragment.
fn download_name(url: &str) -> String {
    Url::parse(url)
        .ok()
        .and_then(|parsed| {
            let name = parsed
                .path_segments()
                .and_then(|segments| segments.filter(|s| !s.is_empty()).last())
                .map(str::to_string);
            name
        })
        .unwrap_or_else(|| DEFAULT_DOWNLOAD_NAME.to_string())
}

impl ActionBuilder for GitAction {
    fn label(&self) -> String {
        match &self.request {
            GitRequest::Git { subcommand, .. } => format!("git {subcommand}"),
            GitRequest::Download { .. } => "git down".to_string(),
        }
    }

    fn build(&self, endpoint: &Endpoint) -> Result<Invocation, ActionError> {
        let command = match &self.request {
            GitRequest::Git { subcommand, args } => {
                let (mut routed, target) = rewrite::rewrite_git_args(&endpoint.proxy_url, args);
                if let Some(i) = target {
                    tracing::debug!(original = %args[i], "Routing repository URL");
                }
                routed.insert(0, subcommand.clone());
                routed.push("--progress".to_string());
                CommandSpec::new("git", routed)
            }
            GitRequest::Download { url, output } => {
                let routed = if rewrite::is_repository_url(url) {
                    rewrite::route_repository_url(&endpoint.proxy_url, url)
                } else {
                    url.clone()
                };
                CommandSpec::new(
                    "curl",
                    vec![
                        "-L".to_string(),
                        "--fail".to_string(),
                        "--progress-bar".to_string(),
                        "-o".to_string(),
                        output.clone(),
                        routed,
                    ],
                )
            }
        };

        Ok(Invocation {
            command,
            redact: redaction_token(endpoint),
            retag: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::endpoint::endpoint;

    fn args(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_clone_routes_url_and_appends_progress() {
        let action = GitAction::new("clone", &args(&["https://github.com/user/repo.git", "dir"])).unwrap();
        let e = endpoint("p1", "https://gh.proxy.example.com", 10);

        let invocation = action.build(&e).unwrap();

        assert_eq!(invocation.command.program, "git");
        assert_eq!(
            invocation.command.args,
            args(&[
                "clone",
                "https://gh.proxy.example.com/https://github.com/user/repo.git",
                "dir",
                "--progress",
            ])
        );
        assert_eq!(invocation.redact.as_deref(), Some("gh.proxy.example.com"));
        assert!(invocation.retag.is_none());
        assert_eq!(action.label(), "git clone");
    }

    #[test]
    fn test_pull_without_url_keeps_args() {
        let action = GitAction::new("pull", &args(&["origin", "main"])).unwrap();
        let invocation = action.build(&endpoint("p1", "https://gh.proxy.example.com", 1)).unwrap();
        assert_eq!(
            invocation.command.args,
            args(&["pull", "origin", "main", "--progress"])
        );
    }

    #[test]
    fn test_each_endpoint_gets_its_own_route() {
        let action = GitAction::new("fetch", &args(&["https://github.com/a/b"])).unwrap();
        let first = action.build(&endpoint("p1", "https://one.example", 1)).unwrap();
        let second = action.build(&endpoint("p2", "https://two.example/", 1)).unwrap();
        assert_eq!(first.command.args[1], "https://one.example/https://github.com/a/b");
        assert_eq!(second.command.args[1], "https://two.example/https://github.com/a/b");
        assert_eq!(second.redact.as_deref(), Some("two.example"));
    }

    #[test]
    fn test_unsupported_subcommand_is_rejected() {
        let err = GitAction::new("rebase", &[]).unwrap_err();
        match err {
            ActionError::UnsupportedSubcommand {
                family,
                subcommand,
                supported,
            } => {
                assert_eq!(family, "git");
                assert_eq!(subcommand, "rebase");
                assert_eq!(supported, "clone, pull, fetch, push, down");
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_down_builds_curl_command() {
        let url = "https://github.com/o/r/releases/download/v1/tool.tar.gz";
        let action = GitAction::new("down", &args(&[url])).unwrap();
        let invocation = action.build(&endpoint("p1", "https://dl.proxy.example", 1)).unwrap();

        assert_eq!(invocation.command.program, "curl");
        assert_eq!(
            invocation.command.args,
            args(&[
                "-L",
                "--fail",
                "--progress-bar",
                "-o",
                "tool.tar.gz",
                "https://dl.proxy.example/https://github.com/o/r/releases/download/v1/tool.tar.gz",
            ])
        );
        assert_eq!(invocation.redact.as_deref(), Some("dl.proxy.example"));
    }

    #[test]
    fn test_down_honours_explicit_output() {
        let action = GitAction::new("down", &args(&["https://github.com/o/r/archive/main.zip", "src.zip"])).unwrap();
        let invocation = action.build(&endpoint("p1", "https://dl.proxy.example", 1)).unwrap();
        assert_eq!(invocation.command.args[4], "src.zip");
    }

    #[test]
    fn test_down_requires_url() {
        let err = GitAction::new("down", &[]).unwrap_err();
        assert!(matches!(err, ActionError::MissingArgument("<url>")));
    }

    #[test]
    fn test_download_name() {
        assert_eq!(download_name("https://github.com/o/r/raw/main/a.sh?x=1"), "a.sh");
        assert_eq!(download_name("https://github.com/"), "download");
        assert_eq!(download_name("https://github.com"), "download");
        assert_eq!(download_name("https://github.com/o/r/"), "r");
        assert_eq!(download_name("HTTPS://github.com:443/o/r/v1.zip#top"), "v1.zip");
        assert_eq!(download_name("not a url"), "download");
    }

    #[test]
    fn test_down_routes_credentialed_url() {
        let url = "https://token@github.com/o/r/releases/download/v1/tool.tar.gz";
        let action = GitAction::new("down", &args(&[url])).unwrap();
        let invocation = action.build(&endpoint("p1", "https://dl.proxy.example", 1)).unwrap();
        assert_eq!(invocation.command.args[4], "tool.tar.gz");
        assert_eq!(
            invocation.command.args[5],
            format!("https://dl.proxy.example/{url}")
        );
    }

    #[test]
    fn test_clone_routes_uppercase_scheme_and_default_port() {
        for url in ["HTTPS://github.com/a/b", "https://github.com:443/a/b"] {
            let action = GitAction::new("clone", &args(&[url])).unwrap();
            let invocation = action.build(&endpoint("p1", "https://gh.proxy.example.com", 1)).unwrap();
            assert_eq!(
                invocation.command.args[1],
                format!("https://gh.proxy.example.com/{url}")
            );
        }
    }
}
