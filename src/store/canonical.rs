use crate::model::{Claim, Evidence, Run, RunStatus};
use anyhow::{Context, Result};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use uuid::Uuid;

const RUN_FILE: &str = "run.json";
const EVIDENCE_FILE: &str = "evidence.jsonl";
const CLAIMS_FILE: &str = "claims.jsonl";

/// Authoritative durable store for runs, evidence, and claims.
///
/// Rows are partitioned per run: each run owns a directory holding its
/// run row as JSON plus append-friendly JSONL tables for evidence and
/// claims. Readers of pipeline state use this store only; the vector
/// index is derived and lossy.
pub struct CanonicalStore {
    runs_dir: PathBuf,
}

impl CanonicalStore {
    pub fn new(runs_dir: impl Into<PathBuf>) -> Self {
        Self {
            runs_dir: runs_dir.into(),
        }
    }

    pub fn run_dir(&self, run_id: &Uuid) -> PathBuf {
        self.runs_dir.join(run_id.to_string())
    }

    fn run_path(&self, run_id: &Uuid) -> PathBuf {
        self.run_dir(run_id).join(RUN_FILE)
    }

    fn evidence_path(&self, run_id: &Uuid) -> PathBuf {
        self.run_dir(run_id).join(EVIDENCE_FILE)
    }

    fn claims_path(&self, run_id: &Uuid) -> PathBuf {
        self.run_dir(run_id).join(CLAIMS_FILE)
    }

    /// Persists a freshly created run row and returns it.
    pub fn create_run(&self, run: Run) -> Result<Run> {
        let dir = self.run_dir(&run.id);
        fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create run directory {:?}", dir))?;
        self.persist_run(&run)?;
        Ok(run)
    }

    pub fn get_run(&self, run_id: &Uuid) -> Result<Option<Run>> {
        let path = self.run_path(run_id);
        if !path.exists() {
            return Ok(None);
        }
        let data = fs::read(&path).with_context(|| format!("Failed to read run row {:?}", path))?;
        let run = serde_json::from_slice(&data)
            .with_context(|| format!("Failed to parse run row {:?}", path))?;
        Ok(Some(run))
    }

    /// Lists all run rows, oldest first.
    pub fn list_runs(&self) -> Result<Vec<Run>> {
        let mut runs = Vec::new();
        if self.runs_dir.exists() {
            for entry in fs::read_dir(&self.runs_dir)? {
                let entry = entry?;
                if !entry.file_type()?.is_dir() {
                    continue;
                }
                let row = entry.path().join(RUN_FILE);
                if row.exists() {
                    let run: Run = serde_json::from_slice(&fs::read(&row)?)
                        .with_context(|| format!("Failed to parse run row {:?}", row))?;
                    runs.push(run);
                }
            }
        }
        runs.sort_by_key(|r| r.created_at);
        Ok(runs)
    }

    /// Partial update of the run row. Always bumps `updated_at`; counters
    /// and the error message are only written when provided.
    pub fn update_run_status(
        &self,
        run_id: &Uuid,
        status: RunStatus,
        evidence_count: Option<u64>,
        claims_count: Option<u64>,
        error_message: Option<String>,
    ) -> Result<Run> {
        let mut run = self
            .get_run(run_id)?
            .with_context(|| format!("Run {run_id} not found"))?;
        run.mark_status(status);
        if let Some(count) = evidence_count {
            run.evidence_count = count;
        }
        if let Some(count) = claims_count {
            run.claims_count = count;
        }
        if let Some(message) = error_message {
            run.error_message = Some(message);
        }
        self.persist_run(&run)?;
        Ok(run)
    }

    fn persist_run(&self, run: &Run) -> Result<()> {
        let path = self.run_path(&run.id);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, serde_json::to_vec_pretty(run)?)
            .with_context(|| format!("Failed to write run row {:?}", path))?;
        Ok(())
    }

    /// Persists an evidence record.
    ///
    /// Writes are idempotent: a record whose `(run, content_hash)` pair is
    /// already present is a no-op, and a record re-persisted under an
    /// existing id (the extractor attaching its extraction) updates in
    /// place. Evidence is never duplicated or deleted.
    pub fn create_evidence(&self, evidence: &Evidence) -> Result<()> {
        let mut rows = self.load_evidence(&evidence.run_id)?;
        if let Some(existing) = rows.iter_mut().find(|row| row.id == evidence.id) {
            *existing = evidence.clone();
            return self.persist_evidence(&evidence.run_id, &rows);
        }
        if rows.iter().any(|row| row.content_hash == evidence.content_hash) {
            return Ok(());
        }
        self.append_jsonl(&self.evidence_path(&evidence.run_id), evidence)
    }

    /// Evidence for a run, most recently collected first.
    pub fn evidence_for_run(&self, run_id: &Uuid) -> Result<Vec<Evidence>> {
        let mut rows = self.load_evidence(run_id)?;
        rows.sort_by(|a, b| b.collected_at.cmp(&a.collected_at));
        Ok(rows)
    }

    fn load_evidence(&self, run_id: &Uuid) -> Result<Vec<Evidence>> {
        read_jsonl(&self.evidence_path(run_id))
    }

    fn persist_evidence(&self, run_id: &Uuid, rows: &[Evidence]) -> Result<()> {
        write_jsonl(&self.evidence_path(run_id), rows)
    }

    /// Persists a claim. No dedup at this layer; claim ids are unique and
    /// readers order by `last_verified_at`.
    pub fn create_claim(&self, claim: &Claim) -> Result<()> {
        self.append_jsonl(&self.claims_path(&claim.run_id), claim)
    }

    /// Claims for a run, most recently verified first.
    pub fn claims_for_run(&self, run_id: &Uuid) -> Result<Vec<Claim>> {
        let mut rows: Vec<Claim> = read_jsonl(&self.claims_path(run_id))?;
        rows.sort_by(|a, b| b.last_verified_at.cmp(&a.last_verified_at));
        Ok(rows)
    }

    fn append_jsonl<T: serde::Serialize>(&self, path: &Path, row: &T) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("Failed to open {:?} for append", path))?;
        file.write_all(serde_json::to_string(row)?.as_bytes())?;
        file.write_all(b"\n")?;
        Ok(())
    }
}

fn read_jsonl<T: serde::de::DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let data =
        fs::read_to_string(path).with_context(|| format!("Unable to read {:?}", path))?;
    let mut rows = Vec::new();
    for line in data.lines().filter(|l| !l.trim().is_empty()) {
        let row: T = serde_json::from_str(line)
            .with_context(|| format!("Failed to parse record in {:?}", path))?;
        rows.push(row);
    }
    Ok(rows)
}

fn write_jsonl<T: serde::Serialize>(path: &Path, rows: &[T]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut file = fs::File::create(path)?;
    for row in rows {
        file.write_all(serde_json::to_string(row)?.as_bytes())?;
        file.write_all(b"\n")?;
    }
    Ok(())
}
