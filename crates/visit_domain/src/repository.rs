use std::time::Duration;

use chrono::NaiveDateTime;
use reqwest::blocking::{Client, ClientBuilder, Response};
use reqwest::Url;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, error, instrument};

use crate::date_rules::format_for_api;
use crate::error::VisitError;

/// Remote source of visit records. The HTTP client is the production implementation.
pub trait VisitRepository: Send + Sync {
    /// Returns the undecoded list entries; each one is validated separately on ingestion.
    fn fetch_all(&self) -> Result<Vec<Value>, VisitError>;

    /// Records a visit at `visited_at` and returns the timestamp text that was stored.
    fn mark_visited(&self, id: &str, visited_at: NaiveDateTime) -> Result<String, VisitError>;
}

pub const DEFAULT_TIMEOUT_SECS: u64 = 10;

pub struct HttpVisitRepository {
    base_url: Url,
    client: Client,
    timeout_secs: u64,
}

#[derive(Serialize)]
struct MarkVisitedRequest<'a> {
    last_verified_date: &'a str,
}

impl HttpVisitRepository {
    pub fn new(base_url: &str, timeout_secs: u64) -> Result<Self, VisitError> {
        Self::with_client_builder(base_url, Client::builder(), timeout_secs)
    }

    /// Finishes a caller-configured client builder. The request timeout is applied here.
    pub fn with_client_builder(
        base_url: &str,
        builder: ClientBuilder,
        timeout_secs: u64,
    ) -> Result<Self, VisitError> {
        let trimmed = base_url.trim().trim_end_matches('/');
        let url = Url::parse(trimmed).map_err(|_| VisitError::InvalidBaseUrl(trimmed.to_string()))?;
        if url.cannot_be_a_base() {
            return Err(VisitError::InvalidBaseUrl(trimmed.to_string()));
        }
        let client = builder
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| VisitError::Transport(e.to_string()))?;
        Ok(Self {
            base_url: url,
            client,
            timeout_secs,
        })
    }

    pub fn base_url(&self) -> &str {
        self.base_url.as_str()
    }

    fn record_url(&self, id: &str) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().push(id);
        }
        url
    }

    fn transport_error(&self, err: reqwest::Error) -> VisitError {
        if err.is_timeout() {
            VisitError::Transport(format!(
                "request timed out after {}s",
                self.timeout_secs
            ))
        } else if err.is_connect() {
            VisitError::Transport(format!("cannot connect to {}", self.base_url))
        } else {
            VisitError::Transport(err.to_string())
        }
    }

    fn check_status(method: &'static str, response: Response) -> Result<Response, VisitError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let url = response.url().to_string();
        error!(method, %url, status = status.as_u16(), "visit service request failed");
        Err(VisitError::Status {
            method,
            url,
            status: status.as_u16(),
        })
    }
}

impl VisitRepository for HttpVisitRepository {
    #[instrument(skip(self), fields(url = %self.base_url))]
    fn fetch_all(&self) -> Result<Vec<Value>, VisitError> {
        debug!("fetching visit records");
        let response = self
            .client
            .get(self.base_url.clone())
            .send()
            .map_err(|e| self.transport_error(e))?;
        let response = Self::check_status("GET", response)?;
        let records: Vec<Value> = response
            .json()
            .map_err(|e| VisitError::Decode(e.to_string()))?;
        debug!(count = records.len(), "visit records fetched");
        Ok(records)
    }

    #[instrument(skip(self))]
    fn mark_visited(&self, id: &str, visited_at: NaiveDateTime) -> Result<String, VisitError> {
        let last_verified_date = format_for_api(visited_at);
        let url = self.record_url(id);
        debug!(%url, %last_verified_date, "sending visit update");
        let response = self
            .client
            .patch(url)
            .json(&MarkVisitedRequest {
                last_verified_date: &last_verified_date,
            })
            .send()
            .map_err(|e| self.transport_error(e))?;
        Self::check_status("PATCH", response)?;
        Ok(last_verified_date)
    }
}
