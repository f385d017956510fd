//! Directory lookup: fetch the candidate endpoints for one service kind.
//!
//! The service answers `GET /api/proxy/list?type=<kind>` with an envelope
//! `{code, message, data}`. `code == 0` carries the endpoint array in `data`;
//! anything else is a business error.

use std::time::{Duration, Instant};

use serde::Deserialize;
use serde_json::Value;
use tracing::Instrument;

use crate::endpoint::{Endpoint, ServiceKind};

/// Header carrying the invocation id, for correlating directory logs.
pub const INVOCATION_HEADER: &str = "x-cnfast-request-id";

const LIST_PATH: &str = "/api/proxy/list";

#[derive(Debug, thiserror::Error)]
pub enum DirectoryError {
    #[error("directory request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("malformed directory response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("no endpoints available (directory error {code}: {message})")]
    Business { code: i64, message: String },

    #[error("directory returned an encrypted payload, which this build cannot read")]
    Encrypted,

    #[error("no {0} endpoints available")]
    NoEndpoints(ServiceKind),
}

/// Uniform response wrapper of the directory API.
#[derive(Debug, Deserialize)]
struct Envelope {
    code: i64,
    #[serde(default)]
    message: String,
    #[serde(default)]
    data: Value,
}

/// Client for the endpoint directory.
#[derive(Clone)]
pub struct DirectoryClient {
    client: reqwest::Client,
    base_url: String,
    invocation_id: String,
}

impl DirectoryClient {
    pub fn new(
        base_url: &str,
        timeout_secs: u64,
        invocation_id: String,
    ) -> Result<Self, DirectoryError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            invocation_id,
        })
    }

    /// Fetch the usable endpoints of `kind`.
    pub async fn list(&self, kind: ServiceKind) -> Result<Vec<Endpoint>, DirectoryError> {
        let span = cnfast_tracing::lookup_span!(kind);
        let start = Instant::now();

        async {
            let body = self
                .client
                .get(format!("{}{}", self.base_url, LIST_PATH))
                .query(&[("type", kind.as_str())])
                .header(INVOCATION_HEADER, &self.invocation_id)
                .send()
                .await?
                .bytes()
                .await?;

            tracing::Span::current().record("latency_ms", start.elapsed().as_millis() as u64);

            let endpoints = parse_listing(&body, kind)?;
            tracing::Span::current().record("endpoint_count", endpoints.len());
            tracing::debug!(count = endpoints.len(), "Fetched endpoints");
            Ok::<_, DirectoryError>(endpoints)
        }
        .instrument(span)
        .await
    }
}

/// Decode a listing envelope, keeping only usable endpoints.
pub fn parse_listing(body: &[u8], kind: ServiceKind) -> Result<Vec<Endpoint>, DirectoryError> {
    let envelope: Envelope = serde_json::from_slice(body)?;
    if envelope.code != 0 {
        return Err(DirectoryError::Business {
            code: envelope.code,
            message: envelope.message,
        });
    }

    let records: Vec<Endpoint> = match envelope.data {
        Value::Null => Vec::new(),
        Value::String(_) => return Err(DirectoryError::Encrypted),
        data => serde_json::from_value(data)?,
    };

    let endpoints: Vec<Endpoint> = records
        .into_iter()
        .filter(|e| {
            if !e.is_usable() {
                tracing::warn!(endpoint_id = %e.id, "Skipping unusable endpoint record");
            }
            e.is_usable()
        })
        .collect();

    if endpoints.is_empty() {
        return Err(DirectoryError::NoEndpoints(kind));
    }
    Ok(endpoints)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_successful_listing() {
        let body = br#"{
            "code": 0,
            "message": "ok",
            "data": [
                {"id": "a", "useType": 1, "proxyUrl": "https://a.example", "name": "A", "score": 70, "proxyType": "git"},
                {"id": "b", "useType": 1, "proxyUrl": "https://b.example", "name": "B", "score": 95, "proxyType": "git"}
            ]
        }"#;
        let endpoints = parse_listing(body, ServiceKind::Git).unwrap();
        assert_eq!(endpoints.len(), 2);
        assert_eq!(endpoints[1].id, "b");
        assert_eq!(endpoints[1].score, 95);
    }

    #[test]
    fn test_business_error_is_surfaced() {
        let body = br#"{"code": 5001, "message": "service paused", "data": null}"#;
        match parse_listing(body, ServiceKind::Docker).unwrap_err() {
            DirectoryError::Business { code, message } => {
                assert_eq!(code, 5001);
                assert_eq!(message, "service paused");
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_empty_or_null_data_means_no_endpoints() {
        let body = br#"{"code": 0, "message": "ok", "data": []}"#;
        assert!(matches!(
            parse_listing(body, ServiceKind::Git),
            Err(DirectoryError::NoEndpoints(ServiceKind::Git))
        ));
        let body = br#"{"code": 0, "message": "ok"}"#;
        assert!(matches!(
            parse_listing(body, ServiceKind::Docker),
            Err(DirectoryError::NoEndpoints(ServiceKind::Docker))
        ));
    }

    #[test]
    fn test_unusable_records_are_dropped() {
        let body = br#"{"code": 0, "message": "ok", "data": [
            {"id": "", "proxyUrl": "https://a.example", "score": 1},
            {"id": "b", "proxyUrl": "", "score": 1},
            {"id": "c", "proxyUrl": "c.example", "score": 3}
        ]}"#;
        let endpoints = parse_listing(body, ServiceKind::Docker).unwrap();
        assert_eq!(endpoints.len(), 1);
        assert_eq!(endpoints[0].id, "c");
    }

    #[test]
    fn test_encrypted_payload_is_rejected() {
        let body = br#"{"code": 0, "message": "ok", "data": "U2FsdGVkX1+abc"}"#;
        assert!(matches!(
            parse_listing(body, ServiceKind::Git),
            Err(DirectoryError::Encrypted)
        ));
    }

    #[test]
    fn test_malformed_body_is_decode_error() {
        assert!(matches!(
            parse_listing(b"<html>", ServiceKind::Git),
            Err(DirectoryError::Decode(_))
        ));
    }
}
