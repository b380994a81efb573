//! Fetch unit: one HTTP POST per date key
//!
//! A fetch either yields the response body (HTTP 200) or nothing. There is no
//! retry and no backoff: a date that fails — non-200 status, transport error,
//! timeout — is logged and permanently dropped for the run. The unit is
//! identical across all three strategies; only the execution context differs,
//! so there are two faces over the same request-building code: an async
//! [`Fetcher`] for the cooperative scheduler and a [`BlockingFetcher`] for
//! pool and rank worker threads.

use crate::config::EndpointConfig;
use crate::dates::DateKey;
use crate::error::Result;

/// Query parameters sent with every request: the target date plus the
/// endpoint's fixed table selector
fn query_params(date: DateKey) -> [(&'static str, String); 2] {
    [("d", date.to_string()), ("t", "1".to_string())]
}

/// Render the form body for one date
///
/// The endpoint wants the requested date in `YYYYMMDD` form alongside the
/// *previous* calendar day's day/month/year as separate fields.
fn form_body(config: &EndpointConfig, date: DateKey) -> String {
    let prev = date.prev_day();
    config
        .body_template
        .replace("{date}", &date.to_string())
        .replace("{day}", &prev.day().to_string())
        .replace("{month}", &prev.month().to_string())
        .replace("{year}", &prev.year().to_string())
}

/// Async fetch unit, used by the bounded-async strategy
pub struct Fetcher {
    client: reqwest::Client,
    config: EndpointConfig,
}

impl Fetcher {
    /// Build a fetcher with the endpoint's timeout and User-Agent baked into
    /// the client
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying HTTP client cannot be constructed.
    pub fn new(config: EndpointConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .user_agent(config.user_agent.clone())
            .build()?;
        Ok(Self { client, config })
    }

    /// Fetch the payload for one date
    ///
    /// Returns `Some(body)` on HTTP 200, `None` on any other status or
    /// transport failure.
    pub async fn fetch(&self, date: DateKey) -> Option<String> {
        let result = self
            .client
            .post(&self.config.url)
            .query(&query_params(date))
            .header(
                reqwest::header::CONTENT_TYPE,
                "application/x-www-form-urlencoded",
            )
            .body(form_body(&self.config, date))
            .send()
            .await;

        match result {
            Ok(response) if response.status() == reqwest::StatusCode::OK => {
                match response.text().await {
                    Ok(body) => Some(body),
                    Err(e) => {
                        tracing::warn!(date = %date, error = %e, "failed to read response body");
                        None
                    }
                }
            }
            Ok(response) => {
                tracing::warn!(date = %date, status = %response.status(), "fetch failed");
                None
            }
            Err(e) => {
                tracing::warn!(date = %date, error = %e, "fetch failed");
                None
            }
        }
    }
}

/// Blocking fetch unit, used inside pool and rank worker threads
pub struct BlockingFetcher {
    client: reqwest::blocking::Client,
    config: EndpointConfig,
}

impl BlockingFetcher {
    /// Build a blocking fetcher; see [`Fetcher::new`]
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying HTTP client cannot be constructed.
    pub fn new(config: EndpointConfig) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(config.timeout())
            .user_agent(config.user_agent.clone())
            .build()?;
        Ok(Self { client, config })
    }

    /// Fetch the payload for one date; same contract as [`Fetcher::fetch`]
    pub fn fetch(&self, date: DateKey) -> Option<String> {
        let result = self
            .client
            .post(&self.config.url)
            .query(&query_params(date))
            .header(
                reqwest::header::CONTENT_TYPE,
                "application/x-www-form-urlencoded",
            )
            .body(form_body(&self.config, date))
            .send();

        match result {
            Ok(response) if response.status() == reqwest::StatusCode::OK => {
                match response.text() {
                    Ok(body) => Some(body),
                    Err(e) => {
                        tracing::warn!(date = %date, error = %e, "failed to read response body");
                        None
                    }
                }
            }
            Ok(response) => {
                tracing::warn!(date = %date, status = %response.status(), "fetch failed");
                None
            }
            Err(e) => {
                tracing::warn!(date = %date, error = %e, "fetch failed");
                None
            }
        }
    }
}
