//! Reference rewriting: route GitHub URLs and container image references
//! through an accelerator endpoint.
//!
//! Both rewriters are pure. The image rewriter takes an explicit
//! [`RewriteTable`] built from one base host; nothing here holds global state.

use url::Url;

/// Hosting domain whose repository URLs are routed by the git rewriter.
pub const GIT_HOSTING_DOMAIN: &str = "github.com";

/// Docker Hub namespace for official images.
const OFFICIAL_NAMESPACE: &str = "library";

/// Known upstream registries and the subdomain prefix of their routed host.
/// An empty prefix routes to the base host itself.
const UPSTREAM_REGISTRIES: &[(&str, &str)] = &[
    ("quay.io", "quay"),
    ("gcr.io", "gcr"),
    ("k8s.gcr.io", "k8s-gcr"),
    ("registry.k8s.io", "k8s"),
    ("ghcr.io", "ghcr"),
    ("docker.cloudsmith.io", "cloudsmith"),
    ("nvcr.io", "nvcr"),
    ("registry-1.docker.io", ""),
    ("docker.io", ""),
];

/// Upstream hosts that serve Docker Hub, where bare names live under `library/`.
const DOCKER_HUB_HOSTS: &[&str] = &["docker.io", "registry-1.docker.io"];

/// Registry mapping derived from one base accelerator host.
///
/// Built per endpoint and never mutated. Rebuilding for another base host
/// regenerates every entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RewriteTable {
    base_host: String,
    entries: Vec<(&'static str, String)>,
}

impl RewriteTable {
    pub fn new(base_host: impl Into<String>) -> Self {
        let base_host = base_host.into();
        let entries = UPSTREAM_REGISTRIES
            .iter()
            .map(|(upstream, prefix)| {
                let routed = if prefix.is_empty() {
                    base_host.clone()
                } else {
                    format!("{prefix}.{base_host}")
                };
                (*upstream, routed)
            })
            .collect();
        Self { base_host, entries }
    }

    /// Routed host for a known upstream registry.
    pub fn routed_host(&self, upstream: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(known, _)| *known == upstream)
            .map(|(_, routed)| routed.as_str())
    }

    /// Whether `host` is one of this table's routed hosts.
    fn is_routed_host(&self, host: &str) -> bool {
        self.entries.iter().any(|(_, routed)| routed == host)
    }

    /// Rewrite an image reference to pull through the accelerator.
    ///
    /// - `nginx` becomes `<base>/library/nginx`
    /// - `gcr.io/p/img` becomes `gcr.<base>/p/img`
    /// - `someuser/tool` becomes `<base>/someuser/tool`
    /// - an already routed reference is returned unchanged
    ///
    /// The left segment is classified as a registry host only by table
    /// membership, so a private registry outside the table is treated as a
    /// Docker Hub namespace.
    pub fn rewrite_image(&self, reference: &str) -> String {
        let Some((head, rest)) = reference.split_once('/') else {
            return format!("{}/{}/{}", self.base_host, OFFICIAL_NAMESPACE, reference);
        };

        if self.is_routed_host(head) {
            return reference.to_string();
        }

        match self.routed_host(head) {
            Some(routed) if DOCKER_HUB_HOSTS.contains(&head) && !rest.contains('/') => {
                format!("{routed}/{OFFICIAL_NAMESPACE}/{rest}")
            }
            Some(routed) => format!("{routed}/{rest}"),
            None => format!("{}/{}", self.base_host, reference),
        }
    }
}

/// Whether `arg` is an http(s) URL whose host is exactly the git hosting domain.
///
/// Credentials, scheme case and an explicit default port do not matter.
pub fn is_repository_url(arg: &str) -> bool {
    match Url::parse(arg) {
        Ok(url) => {
            matches!(url.scheme(), "http" | "https") && url.host_str() == Some(GIT_HOSTING_DOMAIN)
        }
        Err(_) => false,
    }
}

/// Route a repository URL through `base_url`.
pub fn route_repository_url(base_url: &str, url: &str) -> String {
    format!("{}/{}", base_url.trim_end_matches('/'), url)
}

/// Rewrite the first repository URL in `args`, leaving all others verbatim.
///
/// Returns the new argument list and the index of the rewritten argument.
pub fn rewrite_git_args(base_url: &str, args: &[String]) -> (Vec<String>, Option<usize>) {
    let target = args.iter().position(|arg| is_repository_url(arg));
    let rewritten = args
        .iter()
        .enumerate()
        .map(|(i, arg)| {
            if Some(i) == target {
                route_repository_url(base_url, arg)
            } else {
                arg.clone()
            }
        })
        .collect();
    (rewritten, target)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_table_derived_from_base_host() {
        let table = RewriteTable::new("h");
        assert_eq!(table.routed_host("gcr.io"), Some("gcr.h"));
        assert_eq!(table.routed_host("k8s.gcr.io"), Some("k8s-gcr.h"));
        assert_eq!(table.routed_host("registry.k8s.io"), Some("k8s.h"));
        assert_eq!(table.routed_host("docker.io"), Some("h"));
        assert_eq!(table.routed_host("registry-1.docker.io"), Some("h"));
        assert_eq!(table.routed_host("example.com"), None);
    }

    #[test]
    fn test_table_is_total_over_known_registries() {
        let table = RewriteTable::new("accel.example");
        for (upstream, _) in UPSTREAM_REGISTRIES {
            assert!(table.routed_host(upstream).is_some(), "{upstream} missing");
        }
    }

    #[test]
    fn test_rebuilding_regenerates_every_entry() {
        let old = RewriteTable::new("old.example");
        let new = RewriteTable::new("new.example");
        for (upstream, _) in UPSTREAM_REGISTRIES {
            let routed = new.routed_host(upstream).unwrap();
            assert!(routed.ends_with("new.example"));
            assert_ne!(Some(routed), old.routed_host(upstream));
        }
    }

    #[test]
    fn test_short_name_goes_to_official_namespace() {
        let table = RewriteTable::new("h");
        assert_eq!(table.rewrite_image("ubuntu"), "h/library/ubuntu");
        assert_eq!(table.rewrite_image("nginx:1.27"), "h/library/nginx:1.27");
    }

    #[test]
    fn test_rewrite_is_idempotent() {
        let table = RewriteTable::new("h");
        let once = table.rewrite_image("ubuntu");
        assert_eq!(table.rewrite_image(&once), once);

        let once = table.rewrite_image("gcr.io/project/image");
        assert_eq!(table.rewrite_image(&once), once);

        let once = table.rewrite_image("someuser/sometool:latest");
        assert_eq!(table.rewrite_image(&once), once);
    }

    #[test]
    fn test_known_registry_host_is_substituted() {
        let table = RewriteTable::new("h");
        assert_eq!(table.rewrite_image("gcr.io/project/image"), "gcr.h/project/image");
        assert_eq!(
            table.rewrite_image("ghcr.io/org/app@sha256:abc"),
            "ghcr.h/org/app@sha256:abc"
        );
        assert_eq!(
            table.rewrite_image("docker.io/library/redis"),
            "h/library/redis"
        );
    }

    #[test]
    fn test_docker_hub_single_segment_gains_library() {
        let table = RewriteTable::new("h");
        assert_eq!(table.rewrite_image("docker.io/redis:7"), "h/library/redis:7");
    }

    #[test]
    fn test_unknown_namespace_is_prefixed() {
        let table = RewriteTable::new("h");
        assert_eq!(
            table.rewrite_image("someuser/sometool:latest"),
            "h/someuser/sometool:latest"
        );
    }

    #[test]
    fn test_repository_url_detection() {
        assert!(is_repository_url("https://github.com/user/repo.git"));
        assert!(is_repository_url("http://github.com/user/repo"));
        assert!(!is_repository_url("git@github.com:user/repo.git"));
        assert!(!is_repository_url("https://gitlab.com/user/repo"));
        assert!(!is_repository_url("https://github.com.evil.example/user/repo"));
        assert!(!is_repository_url("ftp://github.com/user/repo"));
        assert!(!is_repository_url("--depth"));
    }

    #[test]
    fn test_repository_url_variants_are_recognised() {
        assert!(is_repository_url("https://token@github.com/a/b.git"));
        assert!(is_repository_url("HTTPS://github.com/a/b"));
        assert!(is_repository_url("https://github.com:443/a/b"));
        assert!(is_repository_url("https://GitHub.com/a/b"));
    }

    #[test]
    fn test_credentialed_url_is_routed() {
        let input = args(&["clone", "https://token@github.com/a/b.git"]);
        let (out, index) = rewrite_git_args("https://gh.proxy.example", &input);
        assert_eq!(index, Some(1));
        assert_eq!(out[1], "https://gh.proxy.example/https://token@github.com/a/b.git");
    }

    #[test]
    fn test_only_first_repository_url_is_rewritten() {
        let input = args(&[
            "clone",
            "--depth",
            "1",
            "https://github.com/a/one.git",
            "https://github.com/b/two.git",
        ]);
        let (out, index) = rewrite_git_args("https://gh.proxy.example/", &input);
        assert_eq!(index, Some(3));
        assert_eq!(
            out[3],
            "https://gh.proxy.example/https://github.com/a/one.git"
        );
        assert_eq!(out[4], "https://github.com/b/two.git");
        assert_eq!(&out[..3], &input[..3]);
    }

    #[test]
    fn test_git_args_without_url_pass_through() {
        let input = args(&["pull", "origin", "main"]);
        let (out, index) = rewrite_git_args("https://gh.proxy.example", &input);
        assert_eq!(index, None);
        assert_eq!(out, input);
    }

    #[test]
    fn test_routed_git_url_is_not_rewritten_again() {
        let routed = route_repository_url("https://gh.proxy.example", "https://github.com/a/b");
        assert!(!is_repository_url(&routed));
    }
}
