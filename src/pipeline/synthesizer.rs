use super::report::{
    EducationFeedback, EngagementMetrics, KeywordOptimization, ProfileAnalysis, ProfileSections,
    ProfileStrength, Report, SectionFeedback, TimelineEntry, TractionRating,
};
use super::verifier::ConsentFlags;
use crate::config::LlmSettings;
use crate::llm::{extract_json_block, ChatModel, ChatRequest};
use crate::model::{Claim, ContentKind, Evidence};
use crate::scraper::ProfileRecord;

const TIMELINE_SOURCE: &str = "LinkedIn Profile";
const GENERIC_KEYWORDS: &[&str] = &["leadership", "management", "strategy", "innovation", "analytics"];

/// Produces the final report from a run's persisted state. The LLM path
/// is preferred; every failure mode lands in the deterministic fallback,
/// so synthesis itself never fails.
pub struct Synthesizer<'a> {
    model: Option<&'a dyn ChatModel>,
    settings: &'a LlmSettings,
}

impl<'a> Synthesizer<'a> {
    pub fn new(model: Option<&'a dyn ChatModel>, settings: &'a LlmSettings) -> Self {
        Self { model, settings }
    }

    pub fn synthesize(
        &self,
        subject: &str,
        evidence: &[Evidence],
        claims: &[Claim],
        consent: &ConsentFlags,
    ) -> Report {
        let profile = find_profile(evidence);
        let record = match profile {
            Some(record) => record,
            None => return minimal_report(subject, evidence.len(), claims, consent),
        };

        if let Some(model) = self.model {
            if let Some(mut report) = self.synthesize_via_llm(model, subject, &record, claims) {
                if report.consent_badges.is_empty() {
                    report.consent_badges = consent_badges(claims, consent);
                }
                report.confidence_score = report.confidence_score.clamp(0.0, 1.0);
                return report;
            }
        }

        fallback_report(subject, &record, claims, consent)
    }

    fn synthesize_via_llm(
        &self,
        model: &dyn ChatModel,
        subject: &str,
        record: &ProfileRecord,
        claims: &[Claim],
    ) -> Option<Report> {
        let mut ranked: Vec<&Claim> = claims.iter().collect();
        ranked.sort_by(|a, b| {
            b.confidence
                .partial_cmp(&a.confidence)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        let top_claims: Vec<String> = ranked
            .iter()
            .take(10)
            .map(|c| format!("{} = {} ({:.2})", c.predicate, c.object, c.confidence))
            .collect();

        let profile_json = serde_json::to_string(record).ok()?;
        let prompt = format!(
            "Subject: {subject}\n\nProfile data:\n{profile_json}\n\n\
             Verified claims (highest confidence first):\n{claims}\n\n\
             Write an analysis report. Respond with strict JSON matching:\n\
             {{\"summary\": \"...\", \"key_roles\": [\"...\"], \
             \"timeline\": [{{\"date\": \"...\", \"event\": \"...\", \"source\": \"...\"}}], \
             \"consent_badges\": [\"...\"], \"confidence_score\": 0.0, \
             \"linkedin_profile_analysis\": {{\"completeness_score\": 0.0, \
             \"profile_strength\": \"Strong|Good|Moderate|Weak\", \
             \"keyword_optimization\": {{\"score\": 0.0, \"identified_keywords\": [], \"missing_keywords\": []}}, \
             \"engagement_metrics\": {{\"followers\": 0, \"connections\": 0, \
             \"traction_rating\": \"High|Medium|Low\", \"analysis\": \"...\"}}, \
             \"profile_sections\": {{\"headline\": {{\"present\": true, \"quality\": \"...\", \"feedback\": \"...\"}}, \
             \"about\": {{\"present\": true, \"quality\": \"...\", \"feedback\": \"...\"}}, \
             \"experience\": {{\"present\": true, \"quality\": \"...\", \"feedback\": \"...\"}}, \
             \"education\": {{\"count\": 0, \"quality\": \"...\", \"feedback\": \"...\"}}}}, \
             \"recommendations\": [\"...\"]}}}}",
            subject = subject,
            profile_json = profile_json,
            claims = top_claims.join("\n"),
        );
        let request = ChatRequest::new(
            prompt,
            self.settings.synthesis_temperature,
            self.settings.synthesis_max_tokens,
        )
        .with_system("You write profile analysis reports. Answer with strict JSON only.");

        let completion = model.complete(&request).ok()?;
        let block = extract_json_block(&completion)?;
        serde_json::from_str(block).ok()
    }
}

/// First JSON evidence that parses to a profile-shaped payload.
fn find_profile(evidence: &[Evidence]) -> Option<ProfileRecord> {
    evidence
        .iter()
        .filter(|e| e.content_kind == ContentKind::Json)
        .find_map(|e| {
            let record: ProfileRecord = serde_json::from_str(&e.content).ok()?;
            record.is_profile_shaped().then_some(record)
        })
}

/// Deterministic reconstruction of the report from profile fields alone.
fn fallback_report(
    subject: &str,
    record: &ProfileRecord,
    claims: &[Claim],
    consent: &ConsentFlags,
) -> Report {
    let name = record.name.clone().unwrap_or_else(|| subject.to_string());
    let followers = record.followers.unwrap_or(0);
    let connections = record.connections.unwrap_or(0);
    let experience_count = record.experience.len();
    let education_count = record.education.len();
    let about = record.about.as_deref().unwrap_or("");

    let mut summary = String::new();
    let title = record
        .position
        .clone()
        .or_else(|| record.experience.first().and_then(|e| e.title.clone()));
    match (&title, &record.current_company_name) {
        (Some(title), Some(company)) => {
            summary.push_str(&format!("{name} is {title} at {company}"));
        }
        (None, Some(company)) => summary.push_str(&format!("{name} works at {company}")),
        (Some(title), None) => summary.push_str(&format!("{name} is {title}")),
        (None, None) => summary.push_str(&name),
    }
    match (&record.city, &record.country_code) {
        (Some(city), Some(country)) => summary.push_str(&format!(", based in {city}, {country}")),
        (Some(city), None) => summary.push_str(&format!(", based in {city}")),
        _ => {}
    }
    summary.push('.');
    if !about.is_empty() {
        let excerpt: String = about.chars().take(200).collect();
        summary.push_str(&format!(" {excerpt}"));
        if !excerpt.ends_with('.') {
            summary.push('.');
        }
    }
    summary.push_str(&format!(
        " Their profile shows {followers} followers ({qualifier}) and {connections} connections, \
         with {experience_count} experience {exp_noun} and {education_count} education {edu_noun}.",
        qualifier = follower_qualifier(followers),
        exp_noun = plural(experience_count, "entry", "entries"),
        edu_noun = plural(education_count, "entry", "entries"),
    ));

    let key_roles = build_key_roles(record);
    let timeline = build_timeline(record);
    let completeness = completeness_score(record);

    let analysis = ProfileAnalysis {
        completeness_score: completeness,
        profile_strength: ProfileStrength::from_score(completeness),
        keyword_optimization: keyword_optimization(record),
        engagement_metrics: EngagementMetrics {
            followers,
            connections,
            traction_rating: TractionRating::from_followers(followers),
            analysis: engagement_analysis(followers, connections),
        },
        profile_sections: profile_sections(record),
        recommendations: recommendations(record),
    };

    Report {
        summary,
        key_roles,
        timeline,
        consent_badges: consent_badges(claims, consent),
        confidence_score: 0.9,
        linkedin_profile_analysis: Some(analysis),
    }
}

/// Minimal report when no profile-shaped evidence exists at all.
fn minimal_report(
    subject: &str,
    evidence_count: usize,
    claims: &[Claim],
    consent: &ConsentFlags,
) -> Report {
    Report {
        summary: format!(
            "Analysis of {subject}: {evidence_count} evidence {ev_noun} and {claim_count} \
             verified {claim_noun} collected; no structured profile data was available.",
            ev_noun = plural(evidence_count, "record", "records"),
            claim_count = claims.len(),
            claim_noun = plural(claims.len(), "claim", "claims"),
        ),
        key_roles: Vec::new(),
        timeline: Vec::new(),
        consent_badges: consent_badges(claims, consent),
        confidence_score: 0.5,
        linkedin_profile_analysis: None,
    }
}

fn build_key_roles(record: &ProfileRecord) -> Vec<String> {
    let mut roles = Vec::new();
    let current = record.current_company_name.as_deref();
    if let Some(company) = current {
        match record
            .position
            .as_deref()
            .or_else(|| record.experience.first().and_then(|e| e.title.as_deref()))
        {
            Some(title) => roles.push(format!("{title} at {company} (current)")),
            None => roles.push(format!("{company} (current)")),
        }
    }
    let mut prior = 0;
    for experience in &record.experience {
        if prior >= 3 {
            break;
        }
        let company = match experience.company.as_deref() {
            Some(company) if Some(company) != current => company,
            _ => continue,
        };
        let title = experience.title.as_deref().unwrap_or("Role");
        roles.push(format!("{title} at {company}"));
        prior += 1;
    }
    if let Some(school) = record.education.first().and_then(|e| e.title.as_deref()) {
        roles.push(format!("Studied at {school}"));
    }
    roles
}

fn build_timeline(record: &ProfileRecord) -> Vec<TimelineEntry> {
    let mut timeline = Vec::new();
    for experience in record.experience.iter().take(5) {
        let date = experience
            .duration
            .clone()
            .or_else(|| year_span(experience.start_year.as_deref(), experience.end_year.as_deref()))
            .unwrap_or_else(|| "Unknown".to_string());
        let title = experience.title.as_deref().unwrap_or("Role");
        let company = experience.company.as_deref().unwrap_or("Unknown company");
        timeline.push(TimelineEntry {
            date,
            event: format!("{title} at {company}"),
            source: TIMELINE_SOURCE.to_string(),
        });
    }
    for education in &record.education {
        let date = year_span(education.start_year.as_deref(), education.end_year.as_deref())
            .unwrap_or_else(|| "Unknown".to_string());
        let school = education.title.as_deref().unwrap_or("Unknown institution");
        timeline.push(TimelineEntry {
            date,
            event: format!("Studied at {school}"),
            source: TIMELINE_SOURCE.to_string(),
        });
    }
    timeline
}

fn year_span(start: Option<&str>, end: Option<&str>) -> Option<String> {
    match (start, end) {
        (Some(start), Some(end)) => Some(format!("{start}-{end}")),
        (Some(start), None) => Some(format!("{start}-Present")),
        (None, Some(end)) => Some(end.to_string()),
        (None, None) => None,
    }
}

fn completeness_score(record: &ProfileRecord) -> f64 {
    let mut score: f64 = 0.0;
    if record.about.as_deref().map(|a| !a.is_empty()).unwrap_or(false) {
        score += 0.2;
    }
    if !record.experience.is_empty() {
        score += 0.3;
    }
    if !record.education.is_empty() {
        score += 0.2;
    }
    if record.followers.unwrap_or(0) > 0 {
        score += 0.15;
    }
    if record.connections.unwrap_or(0) > 0 {
        score += 0.15;
    }
    score.clamp(0.0, 1.0)
}

fn keyword_optimization(record: &ProfileRecord) -> KeywordOptimization {
    let mut identified: Vec<String> = Vec::new();
    let mut push_words = |text: &str| {
        for word in text.split_whitespace() {
            let word = word.trim_matches(|c: char| !c.is_alphanumeric());
            if word.len() > 3 && !identified.iter().any(|w| w.eq_ignore_ascii_case(word)) {
                identified.push(word.to_string());
            }
        }
    };
    if let Some(position) = &record.position {
        push_words(position);
    }
    for experience in &record.experience {
        if let Some(title) = &experience.title {
            push_words(title);
        }
    }
    if let Some(company) = &record.current_company_name {
        push_words(company);
    }
    let missing: Vec<String> = GENERIC_KEYWORDS
        .iter()
        .filter(|k| !identified.iter().any(|w| w.eq_ignore_ascii_case(k)))
        .map(|k| k.to_string())
        .collect();
    let score = (identified.len() as f64 / 10.0).clamp(0.0, 1.0);
    KeywordOptimization {
        score,
        identified_keywords: identified,
        missing_keywords: missing,
    }
}

fn engagement_analysis(followers: u64, connections: u64) -> String {
    match TractionRating::from_followers(followers) {
        TractionRating::High => format!(
            "A following of {followers} signals established reach; {connections} connections round out a strong network."
        ),
        TractionRating::Medium => format!(
            "A following of {followers} shows steady visibility; {connections} connections give room to grow."
        ),
        TractionRating::Low => format!(
            "With {followers} followers and {connections} connections, visibility is still building."
        ),
    }
}

fn profile_sections(record: &ProfileRecord) -> ProfileSections {
    let headline_present = record.position.is_some() || !record.experience.is_empty();
    let about_len = record.about.as_deref().map(|a| a.chars().count()).unwrap_or(0);
    let experience_count = record.experience.len();
    let education_count = record.education.len();

    ProfileSections {
        headline: SectionFeedback {
            present: headline_present,
            quality: if headline_present { "Good" } else { "Missing" }.to_string(),
            feedback: if headline_present {
                "Headline reflects a current role.".to_string()
            } else {
                "No headline or current role is visible.".to_string()
            },
        },
        about: SectionFeedback {
            present: about_len > 0,
            quality: if about_len >= 100 {
                "Good"
            } else if about_len > 0 {
                "Brief"
            } else {
                "Missing"
            }
            .to_string(),
            feedback: if about_len >= 100 {
                "The About section tells a substantive story.".to_string()
            } else if about_len > 0 {
                "The About section is present but short.".to_string()
            } else {
                "There is no About section.".to_string()
            },
        },
        experience: SectionFeedback {
            present: experience_count > 0,
            quality: if experience_count >= 3 {
                "Strong"
            } else if experience_count > 0 {
                "Limited"
            } else {
                "Missing"
            }
            .to_string(),
            feedback: format!("{experience_count} experience {} listed.", plural(experience_count, "entry", "entries")),
        },
        education: EducationFeedback {
            count: education_count,
            quality: if education_count > 0 { "Present" } else { "Missing" }.to_string(),
            feedback: format!("{education_count} education {} listed.", plural(education_count, "entry", "entries")),
        },
    }
}

/// Exactly five recommendations, each parameterized by the same signals
/// the scoring uses.
fn recommendations(record: &ProfileRecord) -> Vec<String> {
    let about_len = record.about.as_deref().map(|a| a.chars().count()).unwrap_or(0);
    let experience_count = record.experience.len();
    let education_count = record.education.len();
    let followers = record.followers.unwrap_or(0);
    let connections = record.connections.unwrap_or(0);

    vec![
        if about_len == 0 {
            "Add an About section that summarizes your focus and achievements.".to_string()
        } else if about_len < 100 {
            "Expand the About section beyond a one-liner; aim for a short narrative.".to_string()
        } else {
            "Keep the About section current as your focus shifts.".to_string()
        },
        if experience_count == 0 {
            "Add work experience entries so your track record is visible.".to_string()
        } else if experience_count < 3 {
            "Document earlier roles to show career progression.".to_string()
        } else {
            "Keep role descriptions specific about scope and outcomes.".to_string()
        },
        if followers < 1_000 {
            "Build visibility by publishing and engaging regularly in your field.".to_string()
        } else {
            "Maintain your posting cadence to keep your audience engaged.".to_string()
        },
        if education_count == 0 {
            "List your education and any relevant certifications.".to_string()
        } else {
            "Add honors, awards, or certifications alongside your education.".to_string()
        },
        if connections < 500 {
            "Grow your network by connecting with peers and collaborators.".to_string()
        } else {
            "Engage your existing network; warm introductions compound.".to_string()
        },
    ]
}

fn consent_badges(claims: &[Claim], consent: &ConsentFlags) -> Vec<String> {
    let mut badges: Vec<String> = Vec::new();
    for claim in claims {
        for tag in &claim.policy_tags {
            if let Some(badge) = tag.strip_prefix("consent:") {
                if !badges.iter().any(|b| b == badge) {
                    badges.push(badge.to_string());
                }
            }
        }
    }
    if badges.is_empty() && consent.profile {
        badges.push("public_data".to_string());
    }
    badges
}

fn follower_qualifier(followers: u64) -> &'static str {
    match TractionRating::from_followers(followers) {
        TractionRating::High => "a strong following",
        TractionRating::Medium => "solid traction",
        TractionRating::Low => "an emerging audience",
    }
}

fn plural<'a>(count: usize, singular: &'a str, plural: &'a str) -> &'a str {
    if count == 1 {
        singular
    } else {
        plural
    }
}
