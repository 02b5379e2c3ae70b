use super::ScrapeFailure;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One profile payload as returned by the provider. Canonical fields are
/// typed; anything else the provider sends is retained in `extra`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProfileRecord {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub linkedin_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub country_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_company_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub about: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub experience: Vec<ExperienceEntry>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub education: Vec<EducationEntry>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub followers: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub connections: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub honors_and_awards: Vec<Value>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

impl ProfileRecord {
    /// A payload counts as profile-shaped when it carries a name or a
    /// provider profile id.
    pub fn is_profile_shaped(&self) -> bool {
        self.name.is_some() || self.linkedin_id.is_some()
    }

    /// The URL this record was scraped from, preferring the canonical
    /// profile URL over the echoed input URL.
    pub fn profile_url(&self) -> Option<&str> {
        self.url.as_deref().or(self.input_url.as_deref())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExperienceEntry {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub company: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_year: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_year: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EducationEntry {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_year: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_year: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

/// Decodes a single profile payload. Providers wrap single results in a
/// one-element array or return a bare object; both forms are accepted.
pub fn decode_profile(data: &Value) -> Result<ProfileRecord, ScrapeFailure> {
    let object = match data {
        Value::Array(items) => items
            .first()
            .ok_or_else(|| ScrapeFailure::Malformed("empty profile payload".to_string()))?,
        other => other,
    };
    serde_json::from_value(object.clone())
        .map_err(|err| ScrapeFailure::Malformed(format!("profile decode failed: {err}")))
}

/// Decodes a list-of-profiles payload (search results). A bare object is
/// accepted as a single-element list; an empty array is a valid empty
/// result.
pub fn decode_profiles(data: &Value) -> Result<Vec<ProfileRecord>, ScrapeFailure> {
    match data {
        Value::Array(items) => items
            .iter()
            .map(|item| {
                serde_json::from_value(item.clone()).map_err(|err| {
                    ScrapeFailure::Malformed(format!("profile list decode failed: {err}"))
                })
            })
            .collect(),
        Value::Object(_) => Ok(vec![decode_profile(data)?]),
        other => Err(ScrapeFailure::Malformed(format!(
            "expected profile list, got {other}"
        ))),
    }
}
