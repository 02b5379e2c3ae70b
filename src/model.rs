use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// Lifecycle states for a run. Advances linearly under success; `error`
/// is absorbing and reachable from every other state.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Intake,
    Discover,
    Fetch,
    Normalize,
    Extract,
    Verify,
    Upsert,
    Synthesize,
    Publish,
    Completed,
    Error,
}

impl RunStatus {
    /// Position in the success sequence; `Error` has none.
    pub fn sequence_rank(&self) -> Option<u8> {
        match self {
            RunStatus::Intake => Some(0),
            RunStatus::Discover => Some(1),
            RunStatus::Fetch => Some(2),
            RunStatus::Normalize => Some(3),
            RunStatus::Extract => Some(4),
            RunStatus::Verify => Some(5),
            RunStatus::Upsert => Some(6),
            RunStatus::Synthesize => Some(7),
            RunStatus::Publish => Some(8),
            RunStatus::Completed => Some(9),
            RunStatus::Error => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, RunStatus::Completed | RunStatus::Error)
    }

    pub fn label(&self) -> &'static str {
        match self {
            RunStatus::Intake => "intake",
            RunStatus::Discover => "discover",
            RunStatus::Fetch => "fetch",
            RunStatus::Normalize => "normalize",
            RunStatus::Extract => "extract",
            RunStatus::Verify => "verify",
            RunStatus::Upsert => "upsert",
            RunStatus::Synthesize => "synthesize",
            RunStatus::Publish => "publish",
            RunStatus::Completed => "completed",
            RunStatus::Error => "error",
        }
    }
}

/// How the subject string should be interpreted at intake.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum InputKind {
    DirectUrl,
    SearchQuery,
}

/// One analysis of one subject, with a durable status.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Run {
    pub id: Uuid,
    pub subject: String,
    /// Reserved for the REST layer; the pipeline never reads it.
    #[serde(default)]
    pub user_id: Option<String>,
    pub input_kind: InputKind,
    pub status: RunStatus,
    pub evidence_count: u64,
    pub claims_count: u64,
    /// Maximum provider trigger calls the harvest stage may spend.
    pub max_provider_calls: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub error_message: Option<String>,
}

impl Run {
    pub fn new(subject: impl Into<String>, input_kind: InputKind, max_provider_calls: u32) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            subject: subject.into(),
            user_id: None,
            input_kind,
            status: RunStatus::Intake,
            evidence_count: 0,
            claims_count: 0,
            max_provider_calls,
            created_at: now,
            updated_at: now,
            error_message: None,
        }
    }

    pub fn mark_status(&mut self, status: RunStatus) {
        self.status = status;
        self.updated_at = Utc::now();
    }
}

/// Media kind of a piece of evidence content.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ContentKind {
    Json,
    Html,
    Text,
}

/// One raw record returned by the scraper, with collection metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Evidence {
    pub id: Uuid,
    pub run_id: Uuid,
    pub subject: String,
    /// Source URL, or a synthetic scheme such as `provider://search`.
    pub source: String,
    pub collected_at: DateTime<Utc>,
    pub content: String,
    pub content_kind: ContentKind,
    /// SHA-256 hex digest of `content`; within a run no two records share one.
    pub content_hash: String,
    #[serde(default)]
    pub extraction: Option<ExtractionResult>,
}

impl Evidence {
    pub fn new(
        run_id: Uuid,
        subject: impl Into<String>,
        source: impl Into<String>,
        content: String,
        content_kind: ContentKind,
    ) -> Self {
        let content_hash = content_hash(&content);
        Self {
            id: Uuid::new_v4(),
            run_id,
            subject: subject.into(),
            source: source.into(),
            collected_at: Utc::now(),
            content,
            content_kind,
            content_hash,
            extraction: None,
        }
    }

    pub fn attach_extraction(&mut self, extraction: ExtractionResult) {
        self.extraction = Some(extraction);
    }
}

/// Extraction output persisted back onto the originating evidence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionResult {
    #[serde(default)]
    pub entities: Vec<String>,
    #[serde(default)]
    pub claims: Vec<ClaimCandidate>,
    pub extracted_at: DateTime<Utc>,
}

/// A predicate/object pair proposed by the extractor, pre-verification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClaimCandidate {
    pub predicate: String,
    pub object: String,
    pub confidence: f64,
}

/// Structured reference from a claim back to its originating evidence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Provenance {
    pub evidence_id: Uuid,
    pub source: String,
    pub extracted_at: DateTime<Utc>,
}

/// One typed predicate/object assertion extracted from evidence.
///
/// Every stored claim has passed verification and carries exactly one
/// `verified:*` tag plus at least one source tag.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claim {
    pub id: Uuid,
    pub run_id: Uuid,
    pub subject: String,
    pub predicate: String,
    pub object: String,
    pub confidence: f64,
    pub first_seen_at: DateTime<Utc>,
    pub last_verified_at: DateTime<Utc>,
    pub provenance: Provenance,
    #[serde(default)]
    pub policy_tags: Vec<String>,
}

impl Claim {
    pub fn from_candidate(
        candidate: &ClaimCandidate,
        evidence: &Evidence,
        initial_tag: &str,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            run_id: evidence.run_id,
            subject: evidence.subject.clone(),
            predicate: candidate.predicate.clone(),
            object: candidate.object.clone(),
            confidence: candidate.confidence.clamp(0.0, 1.0),
            first_seen_at: now,
            last_verified_at: now,
            provenance: Provenance {
                evidence_id: evidence.id,
                source: evidence.source.clone(),
                extracted_at: now,
            },
            policy_tags: vec![initial_tag.to_string()],
        }
    }
}

/// SHA-256 hex digest used for evidence identity within a run.
pub fn content_hash(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Predicates the synthesizer understands. The extractor may emit others;
/// these are the interoperable vocabulary.
pub const CANONICAL_PREDICATES: &[&str] = &[
    "has_name",
    "works_at",
    "has_title",
    "located_in",
    "has_about",
    "graduated_from",
    "has_degree",
    "has_skill",
    "has_followers",
    "has_connections",
    "graduation_year",
];
