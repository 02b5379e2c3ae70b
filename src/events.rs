use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Type of pipeline events that can be logged.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    RunCreated,
    StageEntered,
    HarvestCompleted,
    HarvestCallFailed,
    ExtractionCompleted,
    ExtractionFailed,
    ClaimRejected,
    ClaimsPersisted,
    VectorWriteSkipped,
    ReportSynthesized,
    RunCompleted,
    RunFailed,
    RunCancelled,
}

/// General-purpose pipeline event stored as JSONL alongside the run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineEvent {
    pub event_id: Uuid,
    pub run_id: Uuid,
    pub event_type: EventType,
    pub timestamp: DateTime<Utc>,
    pub details: serde_json::Value,
}

/// Wraps the event log path for one run.
pub struct EventLog {
    path: PathBuf,
}

impl EventLog {
    pub fn for_run_dir(run_dir: &Path) -> Self {
        Self {
            path: run_dir.join("events.jsonl"),
        }
    }

    pub fn append_event(&self, event: &PipelineEvent) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        file.write_all(serde_json::to_string(event)?.as_bytes())?;
        file.write_all(b"\n")?;
        Ok(())
    }

    pub fn load_events(&self) -> Result<Vec<PipelineEvent>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let data = fs::read_to_string(&self.path)?;
        let mut events = Vec::new();
        for line in data.lines().filter(|l| !l.trim().is_empty()) {
            let event: PipelineEvent = serde_json::from_str(line)?;
            events.push(event);
        }
        Ok(events)
    }
}

/// Append a pipeline event for a run. Failures to log are surfaced to the
/// caller; the orchestrator treats them as best-effort on non-fatal paths.
pub fn log_event(
    run_dir: &Path,
    run_id: Uuid,
    event_type: EventType,
    details: serde_json::Value,
) -> Result<()> {
    let event = PipelineEvent {
        event_id: Uuid::new_v4(),
        run_id,
        event_type,
        timestamp: Utc::now(),
        details,
    };
    let log = EventLog::for_run_dir(run_dir);
    log.append_event(&event)
}
