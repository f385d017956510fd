//! Endpoint model and score ranking.
//!
//! Endpoints come from the directory lookup once per invocation and are never
//! mutated afterwards. [`rank`] produces the trial order consumed by the
//! retry controller.

use std::fmt;

use serde::Deserialize;
use url::Url;

use crate::error::ActionError;

/// Kind of service an endpoint accelerates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceKind {
    Docker,
    Git,
}

impl ServiceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceKind::Docker => "docker",
            ServiceKind::Git => "git",
        }
    }
}

impl fmt::Display for ServiceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A candidate proxy/mirror endpoint as returned by the directory service.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Endpoint {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub use_type: i64,
    /// Base URL (git) or bare accelerator host (docker).
    #[serde(default)]
    pub proxy_url: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub score: i64,
    #[serde(default)]
    pub proxy_type: String,
}

impl Endpoint {
    /// Identity and base URL are present and the score is non-negative.
    pub fn is_usable(&self) -> bool {
        !self.id.is_empty() && !self.proxy_url.is_empty() && self.score >= 0
    }

    pub fn display_name(&self) -> &str {
        if self.name.is_empty() {
            &self.id
        } else {
            &self.name
        }
    }

    /// Coarse quality bucket shown next to the score.
    pub fn score_label(&self) -> &'static str {
        match self.score {
            s if s >= 90 => "excellent",
            s if s >= 70 => "good",
            s if s >= 50 => "fair",
            _ => "poor",
        }
    }

    /// Host part of `proxy_url`, with a non-default port if one is given.
    ///
    /// This is the string redacted from child-process output.
    pub fn host(&self) -> String {
        extract_host(&self.proxy_url)
    }
}

/// Extract the host (with port, if any) from a URL or a bare host string.
///
/// Docker endpoints list a bare accelerator host, so input without a scheme
/// is parsed as if it were `https://`. Input that still fails to parse is
/// returned as given.
pub fn extract_host(url: &str) -> String {
    let parsed = if url.contains("://") {
        Url::parse(url)
    } else {
        Url::parse(&format!("https://{url}"))
    };
    let Ok(parsed) = parsed else {
        return url.to_string();
    };
    match (parsed.host_str(), parsed.port()) {
        (Some(host), Some(port)) => format!("{host}:{port}"),
        (Some(host), None) => host.to_string(),
        (None, _) => url.to_string(),
    }
}

/// Order endpoints by score, highest first. Equal scores keep their input order.
pub fn rank(endpoints: &[Endpoint]) -> Result<Vec<Endpoint>, ActionError> {
    if endpoints.is_empty() {
        return Err(ActionError::EmptyEndpointSet);
    }
    let mut ranked = endpoints.to_vec();
    // `sort_by` is stable.
    ranked.sort_by(|a, b| b.score.cmp(&a.score));
    Ok(ranked)
}

#[cfg(test)]
pub(crate) fn endpoint(id: &str, proxy_url: &str, score: i64) -> Endpoint {
    Endpoint {
        id: id.to_string(),
        use_type: 1,
        proxy_url: proxy_url.to_string(),
        name: format!("{id}-name"),
        score,
        proxy_type: "git".to_string(),
    }
}
