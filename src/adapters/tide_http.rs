//! HTTP tide gauge adapter.
//!
//! Implements [`TideSource`] against a flood-monitoring style "measures"
//! endpoint:
//!
//! ```text
//! { "items": [ { "latestReading": { "value": 1.625,
//!                                   "dateTime": "2018-07-01T12:15:00Z" } } ] }
//! ```
//!
//! The first item's `latestReading.value` is the current level.  The body
//! is deserialized into typed structs, so a shape mismatch fails fast as
//! [`FetchError::Malformed`] instead of deep inside a lookup chain.
//!
//! With a shutdown signal attached, the request runs on a detached
//! `tide-fetch` thread and [`TideSource::fetch`] returns
//! [`FetchError::Interrupted`] as soon as shutdown is requested.  The
//! abandoned request finishes or times out on its own.

use core::time::Duration;
use std::thread;

use chrono::{DateTime, Utc};
use crossbeam_channel::select;
use log::debug;
use serde::Deserialize;

use crate::app::model::TideReading;
use crate::app::ports::TideSource;
use crate::error::FetchError;
use crate::shutdown::ShutdownSignal;

#[derive(Debug, Deserialize)]
struct MeasuresResponse {
    items: Vec<MeasureItem>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MeasureItem {
    latest_reading: LatestReading,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LatestReading {
    value: f64,
    #[serde(default)]
    date_time: Option<DateTime<Utc>>,
}

/// Parse a measures body. `fetched_at` stands in for a missing `dateTime`.
pub fn parse_reading(body: &str, fetched_at: DateTime<Utc>) -> Result<TideReading, FetchError> {
    let response: MeasuresResponse =
        serde_json::from_str(body).map_err(|e| FetchError::Malformed(e.to_string()))?;
    let first = response
        .items
        .into_iter()
        .next()
        .ok_or_else(|| FetchError::Malformed("`items` is empty".into()))?;
    let reading = first.latest_reading;
    if !reading.value.is_finite() {
        return Err(FetchError::Malformed("reading value is not finite".into()));
    }
    Ok(TideReading {
        raw_value: reading.value,
        timestamp: reading.date_time.unwrap_or(fetched_at),
    })
}

/// Reject a reading older than `max_age_secs` relative to `now`.
pub fn check_freshness(
    reading: &TideReading,
    now: DateTime<Utc>,
    max_age_secs: Option<u64>,
) -> Result<(), FetchError> {
    let Some(max_age_secs) = max_age_secs else {
        return Ok(());
    };
    let age_secs = (now - reading.timestamp).num_seconds();
    if age_secs > i64::try_from(max_age_secs).unwrap_or(i64::MAX) {
        return Err(FetchError::Stale {
            age_secs,
            max_age_secs,
        });
    }
    Ok(())
}

fn get_body(agent: &ureq::Agent, url: &str) -> Result<String, FetchError> {
    let mut response = agent.get(url).call().map_err(|e| match e {
        ureq::Error::StatusCode(code) => FetchError::Status(code),
        other => FetchError::Network(other.to_string()),
    })?;
    response
        .body_mut()
        .read_to_string()
        .map_err(|e| FetchError::Network(e.to_string()))
}

/// Blocking HTTP client for the gauge feed.
pub struct HttpTideSource {
    agent: ureq::Agent,
    url: String,
    max_age_secs: Option<u64>,
    signal: Option<ShutdownSignal>,
}

impl HttpTideSource {
    /// `timeout` bounds the whole request, connect through body.
    pub fn new(url: impl Into<String>, timeout: Duration, max_age_secs: Option<u64>) -> Self {
        let config = ureq::Agent::config_builder()
            .timeout_global(Some(timeout))
            .build();
        Self {
            agent: ureq::Agent::new_with_config(config),
            url: url.into(),
            max_age_secs,
            signal: None,
        }
    }

    /// Abandon an in-flight request when `signal` fires.
    pub fn with_shutdown(mut self, signal: ShutdownSignal) -> Self {
        self.signal = Some(signal);
        self
    }

    fn get_interruptible(&self, signal: &ShutdownSignal) -> Result<String, FetchError> {
        let (tx, rx) = crossbeam_channel::bounded(1);
        let agent = self.agent.clone();
        let url = self.url.clone();
        thread::Builder::new()
            .name("tide-fetch".into())
            .spawn(move || {
                let _ = tx.send(get_body(&agent, &url));
            })
            .map_err(|e| FetchError::Network(e.to_string()))?;

        select! {
            recv(rx) -> body => body.unwrap_or_else(|_| {
                Err(FetchError::Network("fetch thread exited without a result".into()))
            }),
            recv(signal.receiver()) -> _ => {
                debug!("GET {} abandoned on shutdown", self.url);
                Err(FetchError::Interrupted)
            }
        }
    }
}

impl TideSource for HttpTideSource {
    fn fetch(&mut self) -> Result<TideReading, FetchError> {
        debug!("GET {}", self.url);
        let body = match &self.signal {
            Some(signal) => self.get_interruptible(signal)?,
            None => get_body(&self.agent, &self.url)?,
        };

        let now = Utc::now();
        let reading = parse_reading(&body, now)?;
        check_freshness(&reading, now, self.max_age_secs)?;
        Ok(reading)
    }
}
