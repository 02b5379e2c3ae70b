use crate::config::{LlmSettings, VectorSettings};
use crate::model::{Claim, Evidence};
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;
use uuid::Uuid;

/// Produces fixed-width embedding vectors for arbitrary text.
pub trait Embedder: Send + Sync {
    fn embed(&self, text: &str) -> Result<Vec<f32>>;
    fn dimension(&self) -> usize;
}

/// Embedder backed by an OpenAI-compatible embeddings endpoint.
pub struct HttpEmbedder {
    client: reqwest::blocking::Client,
    base_url: String,
    model: String,
    api_key: Option<String>,
    dimension: usize,
}

impl HttpEmbedder {
    pub fn from_config(llm: &LlmSettings, vector: &VectorSettings) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(llm.timeout_secs))
            .build()
            .context("Failed to create embedding HTTP client")?;
        Ok(Self {
            client,
            base_url: llm.base_url.trim_end_matches('/').to_string(),
            model: llm.embedding_model.clone(),
            api_key: llm.resolved_api_key(),
            dimension: vector.dimension,
        })
    }
}

impl Embedder for HttpEmbedder {
    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let body = serde_json::json!({
            "model": self.model,
            "input": text,
        });
        let mut request = self
            .client
            .post(format!("{}/embeddings", self.base_url))
            .json(&body);
        if let Some(key) = &self.api_key {
            request = request.header("Authorization", format!("Bearer {}", key));
        }
        let response = request.send().context("Embedding request failed")?;
        let status = response.status();
        let text_body = response
            .text()
            .context("Failed to read embedding response")?;
        if !status.is_success() {
            bail!("Embedding endpoint returned {status}: {text_body}");
        }
        let json: serde_json::Value =
            serde_json::from_str(&text_body).context("Failed to parse embedding JSON")?;

        // Canonical shape is {data: [{embedding: [..]}]}; a bare
        // {data: [[..]]} or {embeddings: [[..]]} matrix is tolerated.
        let vector = json["data"]
            .get(0)
            .and_then(|item| item.get("embedding").or(Some(item)))
            .and_then(|v| v.as_array())
            .or_else(|| json["embeddings"].get(0).and_then(|v| v.as_array()))
            .context("Embedding response carried no vector")?
            .iter()
            .map(|v| v.as_f64().map(|f| f as f32))
            .collect::<Option<Vec<f32>>>()
            .context("Embedding vector contained non-numeric entries")?;

        if vector.len() != self.dimension {
            bail!(
                "Embedding width {} does not match configured dimension {}",
                vector.len(),
                self.dimension
            );
        }
        Ok(vector)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

/// One indexed record: key, vector, and mirrored identifying metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorRecord {
    pub key: String,
    pub vector: Vec<f32>,
    pub metadata: serde_json::Value,
}

/// A similarity match returned by `query`, score in [0, 1].
#[derive(Debug, Clone)]
pub struct VectorMatch {
    pub key: String,
    pub score: f64,
    pub metadata: serde_json::Value,
}

/// Best-effort embedding index for evidence and claims.
///
/// Derived, lossy copies of canonical records keyed `evidence_{id}` /
/// `claim_{id}`. Losing this file never corrupts the system; every
/// caller in the pipeline treats failures here as log-and-continue.
pub struct VectorStore {
    path: PathBuf,
    embedder: Box<dyn Embedder>,
    max_embed_chars: usize,
}

impl VectorStore {
    pub fn new(
        vector_dir: impl Into<PathBuf>,
        embedder: Box<dyn Embedder>,
        settings: &VectorSettings,
    ) -> Self {
        let vector_dir: PathBuf = vector_dir.into();
        Self {
            path: vector_dir.join("index.jsonl"),
            embedder,
            max_embed_chars: settings.max_embed_chars,
        }
    }

    /// Embeds text after truncation to the configured character cap.
    pub fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let clamped: String = if text.len() <= self.max_embed_chars {
            text.to_string()
        } else {
            text.chars().take(self.max_embed_chars).collect()
        };
        self.embedder.embed(&clamped)
    }

    pub fn upsert_evidence(&self, evidence: &Evidence) -> Result<()> {
        let vector = self.embed(&evidence.content)?;
        self.upsert(VectorRecord {
            key: evidence_key(&evidence.id),
            vector,
            metadata: serde_json::json!({
                "subject": evidence.subject,
                "source": evidence.source,
                "content_kind": evidence.content_kind,
            }),
        })
    }

    pub fn upsert_claim(&self, claim: &Claim) -> Result<()> {
        let vector = self.embed(&format!("{} {}", claim.predicate, claim.object))?;
        self.upsert(VectorRecord {
            key: claim_key(&claim.id),
            vector,
            metadata: serde_json::json!({
                "subject": claim.subject,
                "predicate": claim.predicate,
                "object": claim.object,
            }),
        })
    }

    fn upsert(&self, record: VectorRecord) -> Result<()> {
        if record.vector.len() != self.embedder.dimension() {
            bail!(
                "Vector width {} does not match index dimension {}",
                record.vector.len(),
                self.embedder.dimension()
            );
        }
        let mut records = self.load_all()?;
        if let Some(existing) = records.iter_mut().find(|r| r.key == record.key) {
            *existing = record;
        } else {
            records.push(record);
        }
        self.persist_all(&records)
    }

    /// Cosine-similarity search over the index, scores mapped to [0, 1].
    /// `subject_filter` restricts matches to records whose mirrored
    /// subject equals the given value.
    pub fn query(
        &self,
        vector: &[f32],
        subject_filter: Option<&str>,
        top_k: usize,
    ) -> Result<Vec<VectorMatch>> {
        let records = self.load_all()?;
        let mut matches: Vec<VectorMatch> = records
            .into_iter()
            .filter(|record| match subject_filter {
                Some(subject) => record
                    .metadata
                    .get("subject")
                    .and_then(|v| v.as_str())
                    .map(|s| s == subject)
                    .unwrap_or(false),
                None => true,
            })
            .map(|record| {
                let score = (1.0 + cosine(vector, &record.vector)) / 2.0;
                VectorMatch {
                    key: record.key,
                    score,
                    metadata: record.metadata,
                }
            })
            .collect();
        matches.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        matches.truncate(top_k);
        Ok(matches)
    }

    /// Convenience wrapper embedding the query text first.
    pub fn query_text(
        &self,
        text: &str,
        subject_filter: Option<&str>,
        top_k: usize,
    ) -> Result<Vec<VectorMatch>> {
        let vector = self.embed(text)?;
        self.query(&vector, subject_filter, top_k)
    }

    fn load_all(&self) -> Result<Vec<VectorRecord>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let data = fs::read_to_string(&self.path)
            .with_context(|| format!("Unable to read vector index {:?}", self.path))?;
        let mut records = Vec::new();
        for line in data.lines().filter(|l| !l.trim().is_empty()) {
            let record: VectorRecord = serde_json::from_str(line)
                .with_context(|| "Failed to parse vector index record")?;
            records.push(record);
        }
        Ok(records)
    }

    fn persist_all(&self, records: &[VectorRecord]) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut file = fs::File::create(&self.path)?;
        for record in records {
            file.write_all(serde_json::to_string(record)?.as_bytes())?;
            file.write_all(b"\n")?;
        }
        Ok(())
    }
}

pub fn evidence_key(id: &Uuid) -> String {
    format!("evidence_{id}")
}

pub fn claim_key(id: &Uuid) -> String {
    format!("claim_{id}")
}

fn cosine(a: &[f32], b: &[f32]) -> f64 {
    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;
    for (x, y) in a.iter().zip(b.iter()) {
        dot += (*x as f64) * (*y as f64);
        norm_a += (*x as f64) * (*x as f64);
        norm_b += (*y as f64) * (*y as f64);
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a.sqrt() * norm_b.sqrt())
}
