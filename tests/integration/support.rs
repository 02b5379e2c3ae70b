use anyhow::{bail, Result};
use dossier::config::VectorSettings;
use dossier::llm::{ChatModel, ChatRequest};
use dossier::scraper::{ProfileRecord, ScrapeFailure, ScrapeProvider};
use dossier::store::{Embedder, VectorStore};
use serde_json::Value;
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicU32, Ordering};

/// Scripted scraping provider. Counts every trigger-equivalent call so
/// tests can assert the budget invariant.
pub struct FakeScraper {
    profiles: HashMap<String, Value>,
    search_results: Vec<Value>,
    fail_with_timeout: bool,
    trigger_calls: AtomicU32,
}

impl FakeScraper {
    pub fn new() -> Self {
        Self {
            profiles: HashMap::new(),
            search_results: Vec::new(),
            fail_with_timeout: false,
            trigger_calls: AtomicU32::new(0),
        }
    }

    pub fn with_profile(mut self, url: &str, payload: Value) -> Self {
        self.profiles.insert(url.to_string(), payload);
        self
    }

    pub fn with_search_results(mut self, results: Vec<Value>) -> Self {
        self.search_results = results;
        self
    }

    pub fn failing_with_timeout(mut self) -> Self {
        self.fail_with_timeout = true;
        self
    }

    pub fn trigger_calls(&self) -> u32 {
        self.trigger_calls.load(Ordering::SeqCst)
    }

    fn record_call(&self) -> Result<(), ScrapeFailure> {
        self.trigger_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_with_timeout {
            return Err(ScrapeFailure::Timeout);
        }
        Ok(())
    }

    fn profile_for(&self, url: &str) -> Result<ProfileRecord, ScrapeFailure> {
        let payload = self
            .profiles
            .get(url)
            .cloned()
            .unwrap_or_else(|| serde_json::json!({ "name": "Profile", "url": url }));
        serde_json::from_value(payload)
            .map_err(|err| ScrapeFailure::Malformed(err.to_string()))
    }
}

impl ScrapeProvider for FakeScraper {
    fn scrape_profile(&self, url: &str) -> Result<ProfileRecord, ScrapeFailure> {
        self.record_call()?;
        self.profile_for(url)
    }

    fn scrape_company(&self, url: &str) -> Result<ProfileRecord, ScrapeFailure> {
        self.record_call()?;
        self.profile_for(url)
    }

    fn search_profiles(
        &self,
        _first_name: &str,
        _last_name: &str,
    ) -> Result<Vec<ProfileRecord>, ScrapeFailure> {
        self.record_call()?;
        self.search_results
            .iter()
            .map(|payload| {
                serde_json::from_value(payload.clone())
                    .map_err(|err| ScrapeFailure::Malformed(err.to_string()))
            })
            .collect()
    }

    fn search_web(&self, query: &str) -> Result<Value, ScrapeFailure> {
        self.record_call()?;
        Ok(serde_json::json!({
            "query": query,
            "results": [{ "title": format!("About {query}"), "snippet": "context" }]
        }))
    }
}

/// Chat model that always answers with the same canned completion, or
/// always fails.
pub struct CannedModel {
    completion: Option<String>,
}

impl CannedModel {
    pub fn answering(completion: impl Into<String>) -> Self {
        Self {
            completion: Some(completion.into()),
        }
    }

    pub fn broken() -> Self {
        Self { completion: None }
    }
}

impl ChatModel for CannedModel {
    fn complete(&self, _request: &ChatRequest) -> Result<String> {
        match &self.completion {
            Some(completion) => Ok(completion.clone()),
            None => bail!("model offline"),
        }
    }
}

/// Deterministic embedder for vector-store coverage without a server.
pub struct StubEmbedder {
    dimension: usize,
}

impl StubEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self { dimension }
    }
}

impl Embedder for StubEmbedder {
    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut vector = vec![0.0f32; self.dimension];
        for (i, b) in text.bytes().enumerate() {
            vector[i % self.dimension] += b as f32;
        }
        Ok(vector)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

pub fn vector_store(workspace: &Path) -> VectorStore {
    let settings = VectorSettings {
        dimension: 16,
        max_embed_chars: 5_000,
    };
    VectorStore::new(
        workspace.join("vector"),
        Box::new(StubEmbedder::new(16)),
        &settings,
    )
}

/// The direct-URL happy-path payload used across scenarios.
pub fn alice_payload() -> Value {
    serde_json::json!({
        "name": "Alice",
        "current_company_name": "Acme",
        "city": "Paris",
        "country_code": "FR",
        "about": "Builds things.",
        "followers": 5000,
        "connections": 400,
        "experience": [{"title": "Engineer", "company": "Acme", "duration": "2020-Present"}],
        "education": [{"title": "MIT", "start_year": "2016", "end_year": "2020"}]
    })
}
