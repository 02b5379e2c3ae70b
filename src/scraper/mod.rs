pub mod client;
pub mod profile;

pub use client::ScrapeClient;
pub use profile::{EducationEntry, ExperienceEntry, ProfileRecord};

use thiserror::Error;

/// Synthetic source id recorded for web-search context evidence.
pub const WEB_SEARCH_SOURCE: &str = "provider://search";
/// Synthetic source id recorded for name-based profile discovery evidence.
pub const PROFILE_SEARCH_SOURCE: &str = "provider://profile-search";

/// Typed failure of a single provider call. Callers absorb these per
/// item; a failed call surfaces as missing evidence, never a run abort.
#[derive(Debug, Clone, Error)]
pub enum ScrapeFailure {
    #[error("scraper unavailable (HTTP {status}): {body}")]
    Unavailable { status: u16, body: String },
    #[error("scraper provider error: {0}")]
    Provider(String),
    #[error("scraper_timeout: snapshot polling exceeded its budget")]
    Timeout,
    #[error("scraper payload malformed: {0}")]
    Malformed(String),
}

/// The harvester-facing seam over the scraping provider.
///
/// Operations are independent; implementations expose no global mutex
/// and callers are responsible for bounding fan-out.
pub trait ScrapeProvider: Send + Sync {
    /// Scrapes one individual profile by URL.
    fn scrape_profile(&self, url: &str) -> Result<ProfileRecord, ScrapeFailure>;

    /// Scrapes one company page by URL.
    fn scrape_company(&self, url: &str) -> Result<ProfileRecord, ScrapeFailure>;

    /// Name-based profile discovery.
    fn search_profiles(
        &self,
        first_name: &str,
        last_name: &str,
    ) -> Result<Vec<ProfileRecord>, ScrapeFailure>;

    /// General web search used as context evidence for search subjects.
    fn search_web(&self, query: &str) -> Result<serde_json::Value, ScrapeFailure>;
}
