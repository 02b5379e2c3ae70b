use crate::llm::{extract_json_block, ChatModel, ChatRequest};
use crate::model::Claim;
use crate::scraper::{PROFILE_SEARCH_SOURCE, WEB_SEARCH_SOURCE};
use anyhow::Result;
use serde::{Deserialize, Serialize};

/// Consent flags governing what may be stored about a subject. The
/// default models a web-scraped run with no user session: public
/// profile data is in, contact details are out.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsentFlags {
    pub profile: bool,
    pub email: bool,
    pub phone: bool,
    pub pii: bool,
}

impl Default for ConsentFlags {
    fn default() -> Self {
        Self {
            profile: true,
            email: false,
            phone: false,
            pii: false,
        }
    }
}

/// Verification decision for one claim. When approved, `object` is the
/// value to store (redacted where the claim was sensitive) and `tags`
/// is the complete policy tag set.
#[derive(Debug, Clone)]
pub struct Verdict {
    pub approved: bool,
    pub object: String,
    pub tags: Vec<String>,
    pub reason: Option<String>,
}

/// Advisory overlay answer; may only tighten the deterministic verdict.
#[derive(Debug, Deserialize)]
struct OverlayAnswer {
    approve: bool,
    #[serde(default)]
    tags: Vec<String>,
    #[serde(default)]
    reason: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Sensitivity {
    Email,
    Phone,
    Pii,
}

/// Applies the consent/sensitivity policy to extracted claims.
pub struct Verifier<'a> {
    model: Option<&'a dyn ChatModel>,
}

impl<'a> Verifier<'a> {
    pub fn new(model: Option<&'a dyn ChatModel>) -> Self {
        Self { model }
    }

    /// Decides approval and the policy tag set for one claim. The
    /// deterministic rules always run; the LLM overlay, when available,
    /// may reject an otherwise-approved claim or add tags, never loosen.
    pub fn verify(&self, claim: &Claim, consent: &ConsentFlags, existing: &[Claim]) -> Verdict {
        let mut verdict = match deterministic_verdict(claim, consent) {
            Ok(verdict) => verdict,
            Err(err) => {
                return Verdict {
                    approved: false,
                    object: claim.object.clone(),
                    tags: with_tag(claim.policy_tags.clone(), "sensitive:pii"),
                    reason: Some(format!("verification_failed: {err}")),
                }
            }
        };

        if verdict.approved {
            if let Some(model) = self.model {
                if let Ok(answer) = self.consult_overlay(model, claim, existing) {
                    for tag in answer.tags {
                        verdict.tags = with_tag(verdict.tags, &tag);
                    }
                    if !answer.approve {
                        verdict.approved = false;
                        verdict.reason = Some(
                            answer
                                .reason
                                .unwrap_or_else(|| "rejected by consistency review".to_string()),
                        );
                    }
                }
            }
        }

        verdict
    }

    fn consult_overlay(
        &self,
        model: &dyn ChatModel,
        claim: &Claim,
        existing: &[Claim],
    ) -> Result<OverlayAnswer> {
        let context: Vec<String> = existing
            .iter()
            .take(20)
            .map(|c| format!("{} = {}", c.predicate, c.object))
            .collect();
        let prompt = format!(
            "Claim under review: {} = {} (confidence {:.2})\n\
             Already-accepted claims about the same subject:\n{}\n\n\
             Is the claim consistent with the accepted set? Respond with strict JSON:\n\
             {{\"approve\": true, \"tags\": [], \"reason\": null}}",
            claim.predicate,
            claim.object,
            claim.confidence,
            context.join("\n"),
        );
        let request = ChatRequest::new(prompt, 0.0, 300)
            .with_system("You review claims for internal consistency. Answer with strict JSON only.");
        let completion = model.complete(&request)?;
        let block = extract_json_block(&completion)
            .ok_or_else(|| anyhow::anyhow!("overlay completion carried no JSON"))?;
        Ok(serde_json::from_str(block)?)
    }
}

fn deterministic_verdict(claim: &Claim, consent: &ConsentFlags) -> Result<Verdict> {
    let mut tags = claim.policy_tags.clone();
    tags = with_tag(tags, &verified_tag(claim.confidence));
    tags = with_tag(tags, &source_tag(&claim.provenance.source));

    match detect_sensitivity(&claim.predicate, &claim.object) {
        Some(sensitivity) => {
            let (granted, sensitive_tag) = match sensitivity {
                Sensitivity::Email => (consent.email, "sensitive:contact"),
                Sensitivity::Phone => (consent.phone, "sensitive:pii"),
                Sensitivity::Pii => (consent.pii, "sensitive:pii"),
            };
            tags = with_tag(tags, sensitive_tag);
            if !granted {
                return Ok(Verdict {
                    approved: false,
                    object: claim.object.clone(),
                    tags,
                    reason: Some(format!(
                        "consent not granted for {} data",
                        match sensitivity {
                            Sensitivity::Email => "email",
                            Sensitivity::Phone => "phone",
                            Sensitivity::Pii => "personal",
                        }
                    )),
                });
            }
            tags = with_tag(tags, "consent:explicit");
            Ok(Verdict {
                approved: true,
                object: redact(&claim.object, sensitivity),
                tags,
                reason: None,
            })
        }
        None => {
            if consent.profile {
                tags = with_tag(tags, "consent:public_data");
            }
            Ok(Verdict {
                approved: true,
                object: claim.object.clone(),
                tags,
                reason: None,
            })
        }
    }
}

fn detect_sensitivity(predicate: &str, object: &str) -> Option<Sensitivity> {
    let predicate = predicate.to_lowercase();
    let object_lower = object.to_lowercase();
    if predicate.contains("email") || looks_like_email(object) {
        return Some(Sensitivity::Email);
    }
    if predicate.contains("phone") || looks_like_phone(object) {
        return Some(Sensitivity::Phone);
    }
    const PII_MARKERS: &[&str] = &["address", "ssn", "social security", "personal", "private", "confidential"];
    if PII_MARKERS
        .iter()
        .any(|marker| predicate.contains(marker) || object_lower.contains(marker))
    {
        return Some(Sensitivity::Pii);
    }
    None
}

fn looks_like_email(object: &str) -> bool {
    match object.split_once('@') {
        Some((local, domain)) => !local.is_empty() && domain.contains('.'),
        None => false,
    }
}

fn looks_like_phone(object: &str) -> bool {
    let digits = object.chars().filter(|c| c.is_ascii_digit()).count();
    if digits < 7 {
        return false;
    }
    object
        .chars()
        .all(|c| c.is_ascii_digit() || matches!(c, '+' | '-' | '(' | ')' | '.' | ' '))
}

fn redact(object: &str, sensitivity: Sensitivity) -> String {
    match sensitivity {
        Sensitivity::Email => redact_email(object),
        Sensitivity::Phone => redact_phone(object),
        Sensitivity::Pii => {
            let prefix: String = object.chars().take(3).collect();
            format!("{prefix}***")
        }
    }
}

fn redact_email(object: &str) -> String {
    match object.split_once('@') {
        Some((local, domain)) => {
            let first = local.chars().next().map(String::from).unwrap_or_default();
            format!("{first}***@{domain}")
        }
        None => "***".to_string(),
    }
}

fn redact_phone(object: &str) -> String {
    let digits: String = object.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.len() >= 10 {
        let country = if digits.len() > 10 {
            &digits[..digits.len() - 10]
        } else {
            "1"
        };
        let area = &digits[digits.len() - 10..digits.len() - 7];
        format!("+{country}-{area}-***-****")
    } else {
        object
            .chars()
            .map(|c| if c.is_ascii_digit() { '*' } else { c })
            .collect()
    }
}

fn verified_tag(confidence: f64) -> String {
    let strength = if confidence >= 0.9 {
        "high"
    } else if confidence >= 0.6 {
        "medium"
    } else {
        "low"
    };
    format!("verified:{strength}")
}

fn source_tag(source: &str) -> String {
    if source == WEB_SEARCH_SOURCE {
        "source:web_search".to_string()
    } else if source == PROFILE_SEARCH_SOURCE {
        "source:profile_search".to_string()
    } else if source.contains("linkedin") {
        "source:linkedin_scraping".to_string()
    } else {
        "source:scraped".to_string()
    }
}

fn with_tag(mut tags: Vec<String>, tag: &str) -> Vec<String> {
    if !tags.iter().any(|t| t == tag) {
        tags.push(tag.to_string());
    }
    tags
}
