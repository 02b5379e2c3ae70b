use serde::{Deserialize, Serialize};

/// The final analysis artifact. Synthesized on demand from a run's
/// persisted evidence and claims; never stored by the pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    pub summary: String,
    pub key_roles: Vec<String>,
    pub timeline: Vec<TimelineEntry>,
    #[serde(default)]
    pub consent_badges: Vec<String>,
    pub confidence_score: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub linkedin_profile_analysis: Option<ProfileAnalysis>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimelineEntry {
    pub date: String,
    pub event: String,
    pub source: String,
}

/// Quality analysis block, produced whenever profile-shaped evidence
/// was available.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileAnalysis {
    pub completeness_score: f64,
    pub profile_strength: ProfileStrength,
    pub keyword_optimization: KeywordOptimization,
    pub engagement_metrics: EngagementMetrics,
    pub profile_sections: ProfileSections,
    pub recommendations: Vec<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ProfileStrength {
    Strong,
    Good,
    Moderate,
    Weak,
}

impl ProfileStrength {
    pub fn from_score(score: f64) -> Self {
        if score >= 0.8 {
            ProfileStrength::Strong
        } else if score >= 0.6 {
            ProfileStrength::Good
        } else if score >= 0.4 {
            ProfileStrength::Moderate
        } else {
            ProfileStrength::Weak
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum TractionRating {
    High,
    Medium,
    Low,
}

impl TractionRating {
    pub fn from_followers(followers: u64) -> Self {
        if followers >= 10_000 {
            TractionRating::High
        } else if followers >= 1_000 {
            TractionRating::Medium
        } else {
            TractionRating::Low
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeywordOptimization {
    pub score: f64,
    pub identified_keywords: Vec<String>,
    pub missing_keywords: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngagementMetrics {
    pub followers: u64,
    pub connections: u64,
    pub traction_rating: TractionRating,
    pub analysis: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileSections {
    pub headline: SectionFeedback,
    pub about: SectionFeedback,
    pub experience: SectionFeedback,
    pub education: EducationFeedback,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SectionFeedback {
    pub present: bool,
    pub quality: String,
    pub feedback: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EducationFeedback {
    pub count: usize,
    pub quality: String,
    pub feedback: String,
}
