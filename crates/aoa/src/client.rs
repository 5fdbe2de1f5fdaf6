//! HTTP client for the AOA ranking service.
//!
//! The wire handling is split from the transport: response
//! interpretation is a pure function over (status, request id header,
//! body), so the success/error matrix is testable without a server.

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use courtier_core::config::AoaConfig;
use courtier_core::{ConsultantId, PerformanceMatrix};

pub const REQUEST_ID_HEADER: &str = "X-Request-Id";

const CREATED: u16 = 201;

/// One consultant's matrix as the ranking service expects it.
#[derive(Clone, Debug, Serialize)]
pub struct ConsultantMatrix {
    pub consultant_id: i64,
    pub performance_matrix: PerformanceMatrix,
}

#[derive(Debug, Serialize)]
struct RankRequest<'a> {
    category_ident: &'a str,
    consultants: &'a [ConsultantMatrix],
}

/// The service answers either with an allocation or with its error
/// shape; both arrive under HTTP 201.
#[derive(Debug, Default, Deserialize)]
struct RankResponseBody {
    #[serde(default)]
    allocated_consultants: Option<Vec<i64>>,
    #[serde(default)]
    code: Option<i64>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    name: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AoaRankResult {
    pub successful: bool,
    pub aoa_ranks: Vec<ConsultantId>,
    pub request_uuid: Option<String>,
    pub errors: Vec<String>,
}

impl AoaRankResult {
    fn failure(request_uuid: Option<String>, error: String) -> Self {
        Self { successful: false, aoa_ranks: Vec::new(), request_uuid, errors: vec![error] }
    }
}

/// Interprets one ranking response. A non-201 never carries a request
/// uuid; a 201 with a body-level error keeps the uuid for correlation
/// but stays unsuccessful.
pub fn parse_rank_response(
    status: u16,
    request_id: Option<String>,
    body: &str,
) -> AoaRankResult {
    if status != CREATED {
        return AoaRankResult::failure(None, format!("unexpected response status {status}"));
    }

    let parsed: RankResponseBody = match serde_json::from_str(body) {
        Ok(parsed) => parsed,
        Err(error) => {
            return AoaRankResult::failure(request_id, format!("malformed response body: {error}"))
        }
    };

    if let Some(code) = parsed.code {
        let name = parsed.name.unwrap_or_else(|| "error".to_owned());
        let description = parsed.description.unwrap_or_default();
        return AoaRankResult::failure(request_id, format!("{name} ({code}): {description}"));
    }

    match parsed.allocated_consultants {
        Some(ids) => AoaRankResult {
            successful: true,
            aoa_ranks: ids.into_iter().map(ConsultantId).collect(),
            request_uuid: request_id,
            errors: Vec::new(),
        },
        None => AoaRankResult::failure(
            request_id,
            "response carried neither an allocation nor an error".to_owned(),
        ),
    }
}

/// Seam for the allocation interactor; the HTTP client implements it,
/// tests bring their own.
#[async_trait]
pub trait AoaRankingApi: Send + Sync {
    async fn request_ranks(
        &self,
        category_ident: &str,
        consultants: &[ConsultantMatrix],
    ) -> AoaRankResult;
}

pub struct AoaClient {
    http: Client,
    api_url: String,
    api_token: Option<SecretString>,
}

impl AoaClient {
    pub fn new(config: &AoaConfig) -> Self {
        Self {
            http: Client::new(),
            api_url: config.api_url.clone(),
            api_token: config.api_token.clone(),
        }
    }

    /// Like [`AoaRankingApi::request_ranks`], with a hook that runs
    /// after the call regardless of outcome (logging, audit trails).
    pub async fn request_ranks_with<F>(
        &self,
        category_ident: &str,
        consultants: &[ConsultantMatrix],
        after: F,
    ) -> AoaRankResult
    where
        F: FnOnce(&AoaRankResult),
    {
        let result = self.send(category_ident, consultants).await;
        after(&result);
        result
    }

    async fn send(&self, category_ident: &str, consultants: &[ConsultantMatrix]) -> AoaRankResult {
        let outbound_request_id = Uuid::new_v4().to_string();
        let mut request = self
            .http
            .post(&self.api_url)
            .header(REQUEST_ID_HEADER, &outbound_request_id)
            .json(&RankRequest { category_ident, consultants });

        if let Some(token) = &self.api_token {
            request = request.bearer_auth(token.expose_secret());
        }

        match request.send().await {
            Ok(response) => {
                let status = response.status().as_u16();
                let request_id = response
                    .headers()
                    .get(REQUEST_ID_HEADER)
                    .and_then(|value| value.to_str().ok())
                    .map(str::to_owned);
                let body = response.text().await.unwrap_or_default();
                parse_rank_response(status, request_id, &body)
            }
            Err(error) => AoaRankResult::failure(None, format!("request failed: {error}")),
        }
    }
}

#[async_trait]
impl AoaRankingApi for AoaClient {
    async fn request_ranks(
        &self,
        category_ident: &str,
        consultants: &[ConsultantMatrix],
    ) -> AoaRankResult {
        self.request_ranks_with(category_ident, consultants, |_| {}).await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};

    use courtier_core::config::AoaConfig;
    use courtier_core::ConsultantId;

    use super::{parse_rank_response, AoaClient};

    #[test]
    fn created_with_allocation_is_successful() {
        let result = parse_rank_response(
            201,
            Some("req-123".to_owned()),
            r#"{"allocated_consultants": [3, 1, 2]}"#,
        );

        assert!(result.successful);
        assert_eq!(
            result.aoa_ranks,
            vec![ConsultantId(3), ConsultantId(1), ConsultantId(2)],
            "service ordering preserved"
        );
        assert_eq!(result.request_uuid.as_deref(), Some("req-123"));
        assert!(result.errors.is_empty());
    }

    #[test]
    fn created_with_error_body_keeps_the_request_uuid() {
        let result = parse_rank_response(
            201,
            Some("req-456".to_owned()),
            r#"{"code": 500, "description": "ranking model unavailable", "name": "InternalError"}"#,
        );

        assert!(!result.successful);
        assert!(result.aoa_ranks.is_empty());
        assert_eq!(result.request_uuid.as_deref(), Some("req-456"));
        assert_eq!(result.errors.len(), 1);
        assert!(result.errors[0].contains("500"));
    }

    #[test]
    fn non_created_status_has_no_request_uuid() {
        let result = parse_rank_response(503, Some("req-789".to_owned()), "");

        assert!(!result.successful);
        assert_eq!(result.request_uuid, None);
        assert!(result.errors[0].contains("503"));
    }

    #[test]
    fn malformed_body_is_a_body_level_error() {
        let result = parse_rank_response(201, Some("req-1".to_owned()), "not json");

        assert!(!result.successful);
        assert_eq!(result.request_uuid.as_deref(), Some("req-1"));
    }

    #[tokio::test]
    async fn hook_runs_even_when_the_request_fails() {
        let config = AoaConfig {
            api_url: "http://127.0.0.1:9/unroutable".to_owned(),
            ..test_config()
        };
        let client = AoaClient::new(&config);

        let hook_ran = AtomicBool::new(false);
        let result = client
            .request_ranks_with("bu", &[], |outcome| {
                hook_ran.store(true, Ordering::SeqCst);
                assert!(!outcome.successful);
            })
            .await;

        assert!(hook_ran.load(Ordering::SeqCst));
        assert!(!result.successful);
        assert_eq!(result.request_uuid, None);
    }

    fn test_config() -> AoaConfig {
        AoaConfig {
            api_url: "http://localhost:9292/api/ranks".to_owned(),
            api_token: None,
            test_group_percent: 50,
            algo_version: "v2".to_owned(),
            remember_window_size: 12,
            backfill_epoch: chrono::NaiveDate::from_ymd_opt(2023, 1, 1).unwrap(),
            bu_category_ident: "bu".to_owned(),
        }
    }
}
