use super::profile::{decode_profile, decode_profiles, ProfileRecord};
use super::{ScrapeFailure, ScrapeProvider};
use crate::config::ScraperSettings;
use anyhow::{Context, Result};
use serde_json::Value;
use std::thread;
use std::time::{Duration, Instant};

/// Blocking client for the provider's trigger/snapshot dataset API.
///
/// Every operation follows the same protocol: POST a trigger request,
/// wait out the provider's warm-up delay, then poll the snapshot until
/// it completes, fails, or the polling budget runs out.
pub struct ScrapeClient {
    client: reqwest::blocking::Client,
    settings: ScraperSettings,
    token: String,
}

impl ScrapeClient {
    pub fn from_config(settings: &ScraperSettings) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(settings.poll_interval_secs.max(30) * 2))
            .build()
            .context("Failed to create scraper HTTP client")?;
        Ok(Self {
            client,
            settings: settings.clone(),
            token: settings.resolved_token(),
        })
    }

    fn trigger_url(&self, dataset_id: &str) -> String {
        format!(
            "{}/datasets/v3/trigger?dataset_id={}&include_errors=true",
            self.settings.base_url.trim_end_matches('/'),
            dataset_id
        )
    }

    fn snapshot_url(&self, snapshot_id: &str) -> String {
        format!(
            "{}/datasets/v3/snapshot/{}",
            self.settings.base_url.trim_end_matches('/'),
            snapshot_id
        )
    }

    /// Triggers a job with a single input object. HTTP or body errors on
    /// the trigger are fatal for the call.
    fn trigger(&self, dataset_id: &str, input: Value) -> Result<String, ScrapeFailure> {
        let body = Value::Array(vec![input]);
        let response = self
            .client
            .post(self.trigger_url(dataset_id))
            .header("Authorization", format!("Bearer {}", self.token))
            .json(&body)
            .send()
            .map_err(|err| ScrapeFailure::Unavailable {
                status: 0,
                body: err.to_string(),
            })?;
        let status = response.status();
        let text = response.text().map_err(|err| ScrapeFailure::Unavailable {
            status: status.as_u16(),
            body: err.to_string(),
        })?;
        if !status.is_success() {
            return Err(ScrapeFailure::Unavailable {
                status: status.as_u16(),
                body: text,
            });
        }
        let json: Value = serde_json::from_str(&text)
            .map_err(|err| ScrapeFailure::Malformed(format!("trigger response: {err}")))?;
        if let Some(error) = json.get("error").and_then(|v| v.as_str()) {
            return Err(ScrapeFailure::Provider(error.to_string()));
        }
        json.get("snapshot_id")
            .and_then(|v| v.as_str())
            .map(|s| s.to_string())
            .ok_or_else(|| {
                ScrapeFailure::Malformed("trigger response missing snapshot_id".to_string())
            })
    }

    /// Polls the snapshot to completion. The provider needs warm-up, so
    /// the first poll waits out the configured initial delay; afterwards
    /// polls repeat at the configured interval until the budget elapses.
    fn wait_for_snapshot(&self, snapshot_id: &str) -> Result<Value, ScrapeFailure> {
        let started = Instant::now();
        let budget = Duration::from_secs(self.settings.poll_budget_secs);
        let interval = Duration::from_secs(self.settings.poll_interval_secs);
        thread::sleep(Duration::from_secs(self.settings.initial_delay_secs));

        loop {
            if started.elapsed() >= budget {
                return Err(ScrapeFailure::Timeout);
            }
            match self.poll_once(snapshot_id) {
                Ok(PollOutcome::Completed(data)) => return Ok(data),
                Ok(PollOutcome::Failed(message)) => return Err(ScrapeFailure::Provider(message)),
                // Malformed bodies, HTTP errors, and still-running
                // snapshots all wait one interval and retry.
                Ok(PollOutcome::Pending) | Err(_) => {}
            }
            if started.elapsed() + interval >= budget {
                return Err(ScrapeFailure::Timeout);
            }
            thread::sleep(interval);
        }
    }

    fn poll_once(&self, snapshot_id: &str) -> Result<PollOutcome, ScrapeFailure> {
        let response = self
            .client
            .get(self.snapshot_url(snapshot_id))
            .header("Authorization", format!("Bearer {}", self.token))
            .send()
            .map_err(|err| ScrapeFailure::Unavailable {
                status: 0,
                body: err.to_string(),
            })?;
        let status = response.status();
        let text = response.text().map_err(|err| ScrapeFailure::Unavailable {
            status: status.as_u16(),
            body: err.to_string(),
        })?;
        if !status.is_success() {
            return Err(ScrapeFailure::Unavailable {
                status: status.as_u16(),
                body: text,
            });
        }
        Ok(interpret_poll_body(&text))
    }

    fn run_job(&self, dataset_id: &str, input: Value) -> Result<Value, ScrapeFailure> {
        let snapshot_id = self.trigger(dataset_id, input)?;
        self.wait_for_snapshot(&snapshot_id)
    }
}

impl ScrapeProvider for ScrapeClient {
    fn scrape_profile(&self, url: &str) -> Result<ProfileRecord, ScrapeFailure> {
        let data = self.run_job(
            &self.settings.profile_dataset_id,
            serde_json::json!({ "url": url }),
        )?;
        decode_profile(&data)
    }

    fn scrape_company(&self, url: &str) -> Result<ProfileRecord, ScrapeFailure> {
        let data = self.run_job(
            &self.settings.company_dataset_id,
            serde_json::json!({ "url": url }),
        )?;
        decode_profile(&data)
    }

    fn search_profiles(
        &self,
        first_name: &str,
        last_name: &str,
    ) -> Result<Vec<ProfileRecord>, ScrapeFailure> {
        let data = self.run_job(
            &self.settings.search_dataset_id,
            serde_json::json!({ "first_name": first_name, "last_name": last_name }),
        )?;
        decode_profiles(&data)
    }

    fn search_web(&self, query: &str) -> Result<Value, ScrapeFailure> {
        self.run_job(
            &self.settings.serp_dataset_id,
            serde_json::json!({ "url": format!("https://www.google.com/search?q={}", urlencode(query)) }),
        )
    }
}

/// Interpretation of one snapshot poll body.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum PollOutcome {
    Completed(Value),
    Failed(String),
    Pending,
}

/// Classifies a poll body. A `status` field drives the outcome when
/// present; a statusless body that is a non-empty object or any array
/// *is* the data. Empty and malformed bodies stay pending for retry.
pub(crate) fn interpret_poll_body(body: &str) -> PollOutcome {
    if body.trim().is_empty() {
        return PollOutcome::Pending;
    }
    let json: Value = match serde_json::from_str(body) {
        Ok(json) => json,
        Err(_) => return PollOutcome::Pending,
    };
    if let Some(status) = json.get("status").and_then(|v| v.as_str()) {
        return match status {
            "completed" => {
                PollOutcome::Completed(json.get("data").cloned().unwrap_or(Value::Null))
            }
            "failed" => {
                let message = json
                    .get("error")
                    .and_then(|v| v.as_str())
                    .unwrap_or("provider reported failure")
                    .to_string();
                PollOutcome::Failed(message)
            }
            _ => PollOutcome::Pending,
        };
    }
    match &json {
        Value::Array(_) => PollOutcome::Completed(json),
        Value::Object(map) if !map.is_empty() => PollOutcome::Completed(json),
        _ => PollOutcome::Pending,
    }
}

fn urlencode(query: &str) -> String {
    let mut encoded = String::with_capacity(query.len());
    for byte in query.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                encoded.push(byte as char)
            }
            b' ' => encoded.push('+'),
            other => encoded.push_str(&format!("%{:02X}", other)),
        }
    }
    encoded
}
