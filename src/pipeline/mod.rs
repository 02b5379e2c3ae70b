pub mod extractor;
pub mod harvester;
pub mod orchestrator;
pub mod report;
pub mod synthesizer;
pub mod verifier;

pub use extractor::{ExtractOutcome, Extractor, EXTRACTED_AI_TAG, EXTRACTED_FALLBACK_TAG};
pub use harvester::{is_direct_profile_url, HarvestIssue, HarvestIssueReason, HarvestOutcome, Harvester};
pub use orchestrator::{RunPipeline, RunReport};
pub use report::{
    EngagementMetrics, ProfileAnalysis, ProfileStrength, Report, TimelineEntry, TractionRating,
};
pub use synthesizer::Synthesizer;
pub use verifier::{ConsentFlags, Verdict, Verifier};
