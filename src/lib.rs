pub mod api;
pub mod config;
pub mod events;
pub mod llm;
pub mod model;
pub mod pipeline;
pub mod scraper;
pub mod store;

// Re-export commonly used types for convenience.
pub use config::{AppConfig, WorkspacePaths};
pub use events::{EventLog, EventType, PipelineEvent};
pub use model::{Claim, Evidence, InputKind, Run, RunStatus};
pub use pipeline::{ConsentFlags, Report, RunPipeline, RunReport};
pub use scraper::{ScrapeClient, ScrapeProvider};
pub use store::{CanonicalStore, VectorStore};
