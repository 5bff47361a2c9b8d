//! Financial-event source: the reporting API client.
//!
//! One `fetch` call retrieves every page of financial events posted inside a
//! time window, following the continuation token until the API stops handing
//! one back. Throttled pages are retried with bounded exponential backoff;
//! any other page failure stops pagination and the run proceeds with the
//! envelopes already collected.

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::time::Duration;
use tokio::time::sleep;

use crate::config::SpApiCredentials;
use crate::error::SyncError;
use crate::types::RawEvent;

const LWA_TOKEN_URL: &str = "https://api.amazon.com/auth/o2/token";
const FINANCIAL_EVENTS_PATH: &str = "/finances/v0/financialEvents";
const MAX_RESULTS_PER_PAGE: u32 = 100;

// Throttle retry budget, per page fetch
const RETRY_INITIAL_SECS: u64 = 2;
const RETRY_MAX_SECS: u64 = 60;
const RETRY_MAX_ATTEMPTS: u32 = 5;

/// Produces raw event envelopes for a time range.
#[async_trait]
pub trait EventSource {
    async fn fetch(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Vec<RawEvent>;
}

#[derive(Debug)]
struct ExponentialBackoff {
    initial_delay: u64,
    max_delay: u64,
    max_retries: u32,
    current_attempt: u32,
}

impl ExponentialBackoff {
    fn new(initial: u64, max: u64, retries: u32) -> Self {
        Self {
            initial_delay: initial,
            max_delay: max,
            max_retries: retries,
            current_attempt: 0,
        }
    }

    /// Sleep for the next backoff interval, or fail once the budget is spent.
    async fn sleep(&mut self) -> Result<(), SyncError> {
        if self.current_attempt >= self.max_retries {
            return Err(SyncError::Throttled);
        }

        let delay = std::cmp::min(
            self.initial_delay * 2_u64.pow(self.current_attempt),
            self.max_delay,
        );

        log::warn!(
            "⏳ Throttled, retry {} of {} in {}s",
            self.current_attempt + 1,
            self.max_retries,
            delay
        );

        sleep(Duration::from_secs(delay)).await;
        self.current_attempt += 1;
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Debug, Deserialize)]
struct ListFinancialEventsResponse {
    payload: Option<FinancialEventsPayload>,
}

#[derive(Debug, Default, Deserialize)]
struct FinancialEventsPayload {
    #[serde(rename = "FinancialEvents", default)]
    financial_events: Map<String, Value>,
    #[serde(rename = "NextToken")]
    next_token: Option<String>,
}

/// Split a FinancialEvents payload object into single-key event envelopes,
/// dropping empty lists and non-list entries.
fn extract_envelopes(financial_events: Map<String, Value>) -> Vec<RawEvent> {
    financial_events
        .into_iter()
        .filter(|(_, value)| value.as_array().is_some_and(|list| !list.is_empty()))
        .map(|(key, value)| Value::Object(Map::from_iter([(key, value)])))
        .collect()
}

/// Reporting-API implementation of [`EventSource`].
pub struct FinanceEventSource {
    http: reqwest::Client,
    endpoint: String,
    credentials: SpApiCredentials,
}

impl FinanceEventSource {
    pub fn new(
        credentials: SpApiCredentials,
        endpoint: impl Into<String>,
    ) -> Result<Self, SyncError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            http,
            endpoint: endpoint.into(),
            credentials,
        })
    }

    /// Exchange the refresh token for an access token (LWA refresh grant).
    async fn access_token(&self) -> Result<String, SyncError> {
        let params = [
            ("grant_type", "refresh_token"),
            ("refresh_token", self.credentials.refresh_token.as_str()),
            ("client_id", self.credentials.lwa_client_id.as_str()),
            ("client_secret", self.credentials.lwa_client_secret.as_str()),
        ];

        let response = self.http.post(LWA_TOKEN_URL).form(&params).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(SyncError::Api {
                status: status.as_u16(),
                message: response.text().await.unwrap_or_default(),
            });
        }

        let token: TokenResponse = response.json().await?;
        Ok(token.access_token)
    }

    /// Fetch one page, retrying throttled responses with fresh backoff state.
    async fn fetch_page(
        &self,
        access_token: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        next_token: Option<&str>,
    ) -> Result<FinancialEventsPayload, SyncError> {
        let url = format!("{}{}", self.endpoint, FINANCIAL_EVENTS_PATH);

        let query: Vec<(&str, String)> = match next_token {
            Some(token) => vec![("NextToken", token.to_string())],
            None => vec![
                ("PostedAfter", start.to_rfc3339_opts(SecondsFormat::Secs, true)),
                ("PostedBefore", end.to_rfc3339_opts(SecondsFormat::Secs, true)),
                ("MaxResultsPerPage", MAX_RESULTS_PER_PAGE.to_string()),
            ],
        };

        let mut backoff =
            ExponentialBackoff::new(RETRY_INITIAL_SECS, RETRY_MAX_SECS, RETRY_MAX_ATTEMPTS);

        loop {
            let response = self
                .http
                .get(&url)
                .header("x-amz-access-token", access_token)
                .query(&query)
                .send()
                .await?;

            let status = response.status();
            if status == StatusCode::TOO_MANY_REQUESTS {
                backoff.sleep().await?;
                continue;
            }
            if !status.is_success() {
                return Err(SyncError::Api {
                    status: status.as_u16(),
                    message: response.text().await.unwrap_or_default(),
                });
            }

            let body: ListFinancialEventsResponse = response.json().await?;
            return Ok(body.payload.unwrap_or_default());
        }
    }
}

#[async_trait]
impl EventSource for FinanceEventSource {
    async fn fetch(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Vec<RawEvent> {
        let access_token = match self.access_token().await {
            Ok(token) => token,
            Err(e) => {
                log::error!("❌ Failed to obtain API access token: {}", e);
                return Vec::new();
            }
        };

        let mut envelopes = Vec::new();
        let mut next_token: Option<String> = None;

        loop {
            match next_token.as_deref() {
                Some(token) => log::info!(
                    "📥 Fetching financial events page (NextToken: {}…)",
                    token.get(..20).unwrap_or(token)
                ),
                None => log::info!("📥 Fetching financial events (first page)"),
            }

            match self
                .fetch_page(&access_token, start, end, next_token.as_deref())
                .await
            {
                Ok(payload) => {
                    envelopes.extend(extract_envelopes(payload.financial_events));
                    next_token = payload.next_token;
                    if next_token.is_none() {
                        break;
                    }
                }
                Err(e) => {
                    log::error!("❌ Stopping pagination after error: {}", e);
                    break;
                }
            }
        }

        log::info!("Finished fetching. Total event envelopes: {}", envelopes.len());
        envelopes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_extract_envelopes_splits_per_kind() {
        let payload = json!({
            "ShipmentEventList": [{"AmazonOrderId": "X1"}],
            "RefundEventList": [{"AmazonOrderId": "X2"}, {"AmazonOrderId": "X3"}],
        });
        let Value::Object(map) = payload else { unreachable!() };

        let envelopes = extract_envelopes(map);
        assert_eq!(envelopes.len(), 2);
        for envelope in &envelopes {
            assert_eq!(envelope.as_object().unwrap().len(), 1);
        }
    }

    #[test]
    fn test_extract_envelopes_drops_empty_and_non_list_entries() {
        let payload = json!({
            "ShipmentEventList": [],
            "NextToken": "abc",
            "RefundEventList": [{"AmazonOrderId": "X1"}],
        });
        let Value::Object(map) = payload else { unreachable!() };

        let envelopes = extract_envelopes(map);
        assert_eq!(envelopes.len(), 1);
        assert!(envelopes[0].get("RefundEventList").is_some());
    }

    #[test]
    fn test_payload_deserialization() {
        let body: ListFinancialEventsResponse = serde_json::from_value(json!({
            "payload": {
                "FinancialEvents": {"ShipmentEventList": [{"AmazonOrderId": "X1"}]},
                "NextToken": "token-1"
            }
        }))
        .unwrap();

        let payload = body.payload.unwrap();
        assert_eq!(payload.next_token.as_deref(), Some("token-1"));
        assert_eq!(payload.financial_events.len(), 1);
    }

    #[tokio::test]
    async fn test_backoff_exhausts_after_budget() {
        let mut backoff = ExponentialBackoff::new(0, 0, 2);
        assert!(backoff.sleep().await.is_ok());
        assert!(backoff.sleep().await.is_ok());
        assert!(matches!(backoff.sleep().await, Err(SyncError::Throttled)));
    }
}
