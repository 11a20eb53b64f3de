//! Response schemas, normalized at the network boundary.
//!
//! Required fields are plain (non-`Option`) so that a payload missing them fails to decode and is
//! reported as `Error::Malformed`, rather than limping along with defaults.

use crate::session::Role;
use crate::{Error, Result};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

fn null_as_default<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Pulls a human-readable message out of an error body: `message` if present, else `error`.
pub fn error_message(body: &Value) -> Option<String> {
    body["message"]
        .as_str()
        .or_else(|| body["error"].as_str())
        .map(|s| s.to_string())
}

/// Unwraps the common `{success, data, error}` envelope.
///
/// `success: false` becomes `Error::Rejected` with the server's message verbatim; a missing or
/// undecodable `data` is `Error::Malformed`.
pub fn decode_data<T: for<'de> Deserialize<'de>>(body: Value) -> Result<T> {
    if body["success"] == Value::Bool(false) {
        return Err(Error::Rejected(
            error_message(&body).unwrap_or_else(|| "request was rejected".to_string()),
        ));
    }
    match body.get("data") {
        Some(data) if !data.is_null() => serde_json::from_value(data.clone())
            .map_err(|e| Error::Malformed(format!("unexpected 'data' shape: {e}"))),
        _ => Err(Error::Malformed("response is missing 'data'".to_string())),
    }
}

/// Like `decode_data`, but for endpoints that only acknowledge (`{success, message}`).
pub fn decode_ack(body: Value) -> Result<String> {
    if body["success"] != Value::Bool(true) {
        return Err(Error::Rejected(
            error_message(&body).unwrap_or_else(|| "request was rejected".to_string()),
        ));
    }
    Ok(body["message"].as_str().unwrap_or("ok").to_string())
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct AuthUser {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
}

/// `data` of a login or registration response
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct AuthData {
    pub access_token: String,
    pub refresh_token: String,
    #[serde(default)]
    pub role: Option<String>,
    pub user: AuthUser,
}

impl AuthData {
    /// Role as reported by the server, looking at `data.role` then `data.user.role`.
    pub fn reported_role(&self) -> Option<Role> {
        self.role
            .as_deref()
            .or(self.user.role.as_deref())
            .map(Role::from_stored)
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct RefreshResponse {
    #[serde(default)]
    pub success: Option<bool>,
    pub access_token: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct ValidateResponse {
    pub valid: bool,
    #[serde(default)]
    pub user: Option<AuthUser>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct UploadResult {
    pub resume_id: String,
    pub filename: String,
    #[serde(default)]
    pub preview: String,
    #[serde(default)]
    pub word_count: u64,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ScoreComponent {
    pub score: f64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub label: String,
    #[serde(default)]
    pub weight: Option<f64>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct AtsScore {
    pub overall_score: f64,
    pub breakdown: BTreeMap<String, ScoreComponent>,
    #[serde(default)]
    pub score_label: Option<String>,
    #[serde(default)]
    pub recommendations: Vec<Value>,
}

#[derive(Debug, Default, Serialize, Deserialize, Clone, PartialEq)]
pub struct SkillCategory {
    #[serde(default, deserialize_with = "null_as_default")]
    pub skills: Vec<String>,
    #[serde(default)]
    pub score: Option<f64>,
    #[serde(default)]
    pub count: Option<u64>,
}

#[derive(Debug, Default, Serialize, Deserialize, Clone, PartialEq)]
pub struct MissingSkills {
    #[serde(default)]
    pub critical: Vec<String>,
    #[serde(default)]
    pub recommended: Vec<String>,
    #[serde(default)]
    pub soft: Vec<String>,
    #[serde(default)]
    pub match_percentage: f64,
    #[serde(default)]
    pub has_job_description: bool,
}

/// The analyzer reports missing skills either fully categorized or as a flat list.
#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(untagged)]
pub enum MissingSkillsPayload {
    Detailed(MissingSkills),
    Flat(Vec<String>),
}

impl Default for MissingSkillsPayload {
    fn default() -> Self {
        MissingSkillsPayload::Flat(Vec::new())
    }
}

impl MissingSkillsPayload {
    /// A flat list is treated as the critical bucket
    pub fn normalize(self, has_job_description: bool, match_score: Option<f64>) -> MissingSkills {
        match self {
            MissingSkillsPayload::Detailed(m) => m,
            MissingSkillsPayload::Flat(critical) => MissingSkills {
                critical,
                match_percentage: match_score.unwrap_or(0.0),
                has_job_description,
                ..Default::default()
            },
        }
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct SkillAnalysis {
    pub resume_id: String,
    pub skills: BTreeMap<String, SkillCategory>,
    #[serde(default)]
    pub missing_skills: MissingSkillsPayload,
    #[serde(default)]
    pub match_score: Option<f64>,
    #[serde(default)]
    pub total_skills: Option<u64>,
}

#[derive(Debug, Default, Serialize, Deserialize, Clone, PartialEq)]
pub struct Job {
    #[serde(default, deserialize_with = "null_as_default")]
    pub id: String,
    pub title: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub company: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub location: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub salary: String,
    #[serde(default)]
    pub match_score: Option<f64>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub apply_url: String,
}

/// Everything one "analyze" produces. Replaced wholesale by the next analysis.
#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct AnalysisResult {
    pub resume_id: String,
    pub ats_score: f64,
    pub breakdown: BTreeMap<String, ScoreComponent>,
    pub skills: BTreeMap<String, SkillCategory>,
    pub missing_skills: MissingSkills,
    pub recommended_jobs: Vec<Job>,
}

impl AnalysisResult {
    pub fn assemble(
        analysis: SkillAnalysis,
        score: AtsScore,
        jobs: Vec<Job>,
        has_job_description: bool,
    ) -> Result<Self> {
        if !(0.0..=100.0).contains(&score.overall_score) {
            return Err(Error::Malformed(format!(
                "ATS score out of range: {}",
                score.overall_score
            )));
        }
        let match_score = analysis.match_score;
        Ok(AnalysisResult {
            resume_id: analysis.resume_id,
            ats_score: score.overall_score,
            breakdown: score.breakdown,
            skills: analysis.skills,
            missing_skills: analysis
                .missing_skills
                .normalize(has_job_description, match_score),
            recommended_jobs: jobs,
        })
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ConvertResult {
    pub ats_resume: String,
    #[serde(default)]
    pub sections: Option<BTreeMap<String, String>>,
    #[serde(default)]
    pub original_length: u64,
    #[serde(default)]
    pub converted_length: u64,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct HistoryEntry {
    pub resume_id: String,
    pub filename: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub upload_date: String,
    #[serde(default)]
    pub analyzed: bool,
    #[serde(default)]
    pub ats_score: Option<f64>,
    #[serde(default)]
    pub skills_count: u64,
}

#[derive(Debug, Default, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct AdminStats {
    #[serde(default)]
    pub total_users: u64,
    #[serde(default)]
    pub total_resumes: u64,
    #[serde(default)]
    pub total_ats_conversions: u64,
    #[serde(default)]
    pub total_feedback: u64,
    #[serde(default)]
    pub total_ats_scores: u64,
    #[serde(default)]
    pub total_skill_analyses: u64,
    #[serde(default)]
    pub total_recommendations: u64,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct UserSummary {
    pub id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub email: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub role: String,
    #[serde(default)]
    pub status: Option<String>,
}

impl UserSummary {
    pub fn role(&self) -> Role {
        Role::from_stored(&self.role)
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct FeedbackItem {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub subject: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub message: String,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct AdminResume {
    pub id: String,
    pub filename: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub user_name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub user_email: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub upload_date: String,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub analyzed: bool,
    #[serde(default)]
    pub ats_score: Option<f64>,
}

#[derive(Debug, Default, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Pagination {
    #[serde(default)]
    pub total: u64,
    #[serde(default)]
    pub page: u64,
    #[serde(default)]
    pub limit: u64,
    #[serde(default)]
    pub pages: u64,
}

/// One page of an admin listing
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub pagination: Pagination,
}

impl<T: for<'de> Deserialize<'de>> Page<T> {
    /// Decodes `{success, data: [..], pagination}`. Unlike `data`, a bad `pagination` is never
    /// papered over with defaults.
    pub fn decode(body: Value) -> Result<Self> {
        let pagination = match body.get("pagination") {
            Some(p) if !p.is_null() => serde_json::from_value(p.clone())
                .map_err(|e| Error::Malformed(format!("unexpected 'pagination' shape: {e}")))?,
            _ => return Err(Error::Malformed("response is missing 'pagination'".to_string())),
        };
        Ok(Page {
            items: decode_data(body)?,
            pagination,
        })
    }
}

pub type AdminResumePage = Page<AdminResume>;

/// An ATS conversion as listed for admins
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct AtsResumeSummary {
    pub id: String,
    #[serde(default)]
    pub resume_id: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub user_name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub user_email: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub created_at: String,
}

// The next three are raw analytics documents; only the listed fields are relied on and anything
// else is carried along in `extra`.

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct RecommendationRecord {
    pub id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub user_name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub title: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub company: String,
    #[serde(default)]
    pub match_score: Option<f64>,
    #[serde(default)]
    pub recommended_at: Option<String>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct AtsScoreRecord {
    pub id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub user_name: String,
    #[serde(default)]
    pub overall_score: Option<f64>,
    #[serde(default)]
    pub scored_at: Option<String>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct SkillAnalysisRecord {
    pub id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub user_name: String,
    #[serde(default)]
    pub total_skills: Option<u64>,
    #[serde(default)]
    pub match_score: Option<f64>,
    #[serde(default)]
    pub analyzed_at: Option<String>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

/// `data` of a quick text-only analysis (no upload, nothing stored server-side)
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct TextAnalysis {
    pub skills: BTreeMap<String, SkillCategory>,
    #[serde(default)]
    pub experience: Value,
    #[serde(default)]
    pub education: Value,
    pub ats_score: f64,
    #[serde(default)]
    pub ats_breakdown: BTreeMap<String, ScoreComponent>,
    #[serde(default)]
    pub recommendations: Vec<Value>,
}

#[derive(Debug, PartialEq, Eq, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedbackKind {
    Feedback,
    Complaint,
    Suggestion,
    Bug,
}

impl FeedbackKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FeedbackKind::Feedback => "feedback",
            FeedbackKind::Complaint => "complaint",
            FeedbackKind::Suggestion => "suggestion",
            FeedbackKind::Bug => "bug",
        }
    }
}

impl FromStr for FeedbackKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "feedback" => Ok(FeedbackKind::Feedback),
            "complaint" => Ok(FeedbackKind::Complaint),
            "suggestion" => Ok(FeedbackKind::Suggestion),
            "bug" => Ok(FeedbackKind::Bug),
            _ => Err(Error::Validation(format!(
                "unknown feedback type: {} (expected feedback, complaint, suggestion or bug)",
                s
            ))),
        }
    }
}

impl fmt::Display for FeedbackKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decode_auth_data() {
        let body = json!({
            "success": true,
            "message": "Login successful",
            "data": {
                "user": {"id": "u1", "name": "Ada", "email": "ada@example.com", "role": "admin"},
                "access_token": "a",
                "refresh_token": "r",
            }
        });
        let data: AuthData = decode_data(body).unwrap();
        assert_eq!(data.reported_role(), Some(Role::Admin));
        assert_eq!(data.user.name.as_deref(), Some("Ada"));
    }

    #[test]
    fn test_missing_token_is_malformed() {
        let body = json!({
            "success": true,
            "data": {"user": {"name": "Ada"}, "access_token": "a"}
        });
        assert!(matches!(
            decode_data::<AuthData>(body),
            Err(Error::Malformed(_))
        ));
        assert!(matches!(
            decode_data::<AuthData>(json!({"success": true})),
            Err(Error::Malformed(_))
        ));
    }

    #[test]
    fn test_rejected_message_is_verbatim() {
        let body = json!({"success": false, "error": "Email already registered"});
        match decode_data::<AuthData>(body) {
            Err(Error::Rejected(msg)) => assert_eq!(msg, "Email already registered"),
            other => panic!("unexpected: {:?}", other),
        }
        assert!(decode_ack(json!({"success": false, "error": "nope"})).is_err());
        assert_eq!(
            decode_ack(json!({"success": true, "message": "Job saved successfully"})).unwrap(),
            "Job saved successfully"
        );
    }

    #[test]
    fn test_error_message_prefers_message() {
        let body = json!({"error": "Invalid file", "message": "Please upload a valid resume file"});
        assert_eq!(
            error_message(&body).as_deref(),
            Some("Please upload a valid resume file")
        );
        assert_eq!(error_message(&json!({"msg": "x"})), None);
    }

    #[test]
    fn test_job_tolerates_nulls() {
        let job: Job = serde_json::from_value(json!({
            "id": null,
            "title": "Rust Developer",
            "company": null,
            "location": "Remote",
            "salary": "INR 0 - 0",
            "apply_url": "https://jobs.example.com/1",
        }))
        .unwrap();
        assert_eq!(job.id, "");
        assert_eq!(job.company, "");
        assert_eq!(job.match_score, None);
        assert!(serde_json::from_value::<Job>(json!({"id": "1"})).is_err());
    }

    #[test]
    fn test_missing_skills_shapes() {
        let flat: MissingSkillsPayload = serde_json::from_value(json!(["Docker", "AWS"])).unwrap();
        let m = flat.normalize(true, Some(62.0));
        assert_eq!(m.critical, vec!["Docker".to_string(), "AWS".to_string()]);
        assert_eq!(m.match_percentage, 62.0);
        assert!(m.has_job_description);

        let detailed: MissingSkillsPayload = serde_json::from_value(json!({
            "critical": ["Kubernetes"],
            "recommended": ["Terraform"],
            "soft": ["Mentoring"],
            "match_percentage": 40,
            "has_job_description": false,
        }))
        .unwrap();
        let m = detailed.normalize(true, None);
        assert_eq!(m.recommended, vec!["Terraform".to_string()]);
        assert!(!m.has_job_description);
    }

    #[test]
    fn test_assemble_rejects_out_of_range_score() {
        let analysis = SkillAnalysis {
            resume_id: "r1".to_string(),
            skills: BTreeMap::new(),
            missing_skills: Default::default(),
            match_score: None,
            total_skills: None,
        };
        let score = AtsScore {
            overall_score: 140.0,
            breakdown: BTreeMap::new(),
            score_label: None,
            recommendations: vec![],
        };
        assert!(AnalysisResult::assemble(analysis, score, vec![], false).is_err());
    }

    #[test]
    fn test_page_requires_pagination() {
        let page: Page<AtsResumeSummary> = Page::decode(json!({
            "success": true,
            "data": [{"id": "a1", "resume_id": null, "user_name": "Ada", "created_at": "2024-05-01T10:00:00"}],
            "pagination": {"total": 11, "page": 2, "limit": 10, "pages": 2},
        }))
        .unwrap();
        assert_eq!(page.items[0].user_name, "Ada");
        assert_eq!(page.items[0].user_email, "");
        assert_eq!(page.pagination.pages, 2);

        for pagination in [json!("garbage"), json!(null)] {
            let body = json!({"success": true, "data": [], "pagination": pagination});
            assert!(matches!(
                Page::<AtsResumeSummary>::decode(body),
                Err(Error::Malformed(_))
            ));
        }
        assert!(matches!(
            Page::<AtsResumeSummary>::decode(json!({"success": true, "data": []})),
            Err(Error::Malformed(_))
        ));
    }

    #[test]
    fn test_record_keeps_extra_fields() {
        let rec: RecommendationRecord = serde_json::from_value(json!({
            "id": "r1",
            "user_name": "Grace",
            "title": "SRE",
            "company": "Acme",
            "match_score": 71.5,
            "location": "Pune",
        }))
        .unwrap();
        assert_eq!(rec.match_score, Some(71.5));
        assert_eq!(rec.extra.get("location"), Some(&json!("Pune")));
        assert!(!rec.extra.contains_key("title"));
    }

    #[test]
    fn test_feedback_kind() {
        assert_eq!(FeedbackKind::from_str("bug").unwrap(), FeedbackKind::Bug);
        assert!(FeedbackKind::from_str("praise").is_err());
        assert_eq!(
            serde_json::to_value(FeedbackKind::Suggestion).unwrap(),
            json!("suggestion")
        );
    }
}
