use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::UnknownVariant;
use super::template::TemplateType;
use crate::entities::{request_files, requests, templates, users};

pub const FILE_TYPE_AGENT_UPLOAD: &str = "agent_upload";
pub const FILE_TYPE_VA_COMPLETED: &str = "va_completed";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestStatus {
    New,
    Progress,
    Revision,
    Completed,
}

impl RequestStatus {
    pub const ALL: [Self; 4] = [Self::New, Self::Progress, Self::Revision, Self::Completed];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::New => "new",
            Self::Progress => "progress",
            Self::Revision => "revision",
            Self::Completed => "completed",
        }
    }

    /// Comma separated list of every accepted value, for error messages.
    #[must_use]
    pub fn allowed_values() -> String {
        Self::ALL
            .iter()
            .map(|s| s.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RequestStatus {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "new" => Ok(Self::New),
            "progress" => Ok(Self::Progress),
            "revision" => Ok(Self::Revision),
            "completed" => Ok(Self::Completed),
            other => Err(UnknownVariant {
                kind: "status",
                value: other.to_string(),
            }),
        }
    }
}

/// Single place deciding which status changes are permitted.
///
/// Staff may currently move a request between any two states (manual
/// override). Tighten here; callers go through this function only.
#[must_use]
pub const fn status_transition_allowed(_from: RequestStatus, _to: RequestStatus) -> bool {
    true
}

/// Accepts `YYYY-MM-DD` (midnight UTC) or a full RFC 3339 timestamp and
/// returns the stored form.
#[must_use]
pub fn parse_deadline(raw: &str) -> Option<String> {
    let raw = raw.trim();

    if let Ok(at) = DateTime::parse_from_rfc3339(raw) {
        return Some(crate::db::format_timestamp(at.with_timezone(&Utc)));
    }

    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|midnight| crate::db::format_timestamp(midnight.and_utc()))
}

#[derive(Debug, Clone, Serialize)]
pub struct AgentSummary {
    pub id: String,
    pub name: String,
    pub email: String,
}

impl From<users::Model> for AgentSummary {
    fn from(model: users::Model) -> Self {
        Self {
            id: model.id,
            name: model.name,
            email: model.email,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateSummary {
    pub id: String,
    pub title: String,
    pub category: String,
    #[serde(rename = "type")]
    pub template_type: TemplateType,
    pub canva_url: Option<String>,
    pub preview_url: Option<String>,
}

impl From<templates::Model> for TemplateSummary {
    fn from(model: templates::Model) -> Self {
        Self {
            template_type: model
                .template_type
                .parse()
                .unwrap_or(TemplateType::Residential),
            id: model.id,
            title: model.title,
            category: model.category,
            canva_url: model.canva_url,
            preview_url: model.preview_url,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestFile {
    pub id: String,
    pub request_id: String,
    pub file_url: String,
    pub file_type: String,
    pub created_at: String,
}

impl From<request_files::Model> for RequestFile {
    fn from(model: request_files::Model) -> Self {
        Self {
            id: model.id,
            request_id: model.request_id,
            file_url: model.file_url,
            file_type: model.file_type,
            created_at: model.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Request {
    pub id: String,
    pub agent_id: String,
    pub template_id: String,
    pub project_title: String,
    pub deadline: String,
    pub platforms: Vec<String>,
    pub dimensions: Option<String>,
    pub notes: Option<String>,
    pub status: RequestStatus,
    pub created_at: String,
    pub updated_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent: Option<AgentSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub template: Option<TemplateSummary>,
    pub files: Vec<RequestFile>,
}

impl From<requests::Model> for Request {
    fn from(model: requests::Model) -> Self {
        Self {
            platforms: serde_json::from_str(&model.platforms).unwrap_or_default(),
            status: model.status.parse().unwrap_or(RequestStatus::New),
            id: model.id,
            agent_id: model.agent_id,
            template_id: model.template_id,
            project_title: model.project_title,
            deadline: model.deadline,
            dimensions: model.dimensions,
            notes: model.notes,
            created_at: model.created_at,
            updated_at: model.updated_at,
            agent: None,
            template: None,
            files: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_parse() {
        assert_eq!("new".parse::<RequestStatus>().unwrap(), RequestStatus::New);
        assert_eq!(
            "completed".parse::<RequestStatus>().unwrap(),
            RequestStatus::Completed
        );
        assert!("done".parse::<RequestStatus>().is_err());
        assert!("".parse::<RequestStatus>().is_err());
    }

    #[test]
    fn test_parse_deadline() {
        assert_eq!(
            parse_deadline("2025-06-01").as_deref(),
            Some("2025-06-01T00:00:00.000Z")
        );
        assert_eq!(
            parse_deadline("2025-06-01T12:30:00+02:00").as_deref(),
            Some("2025-06-01T10:30:00.000Z")
        );
        assert!(parse_deadline("next friday").is_none());
        assert!(parse_deadline("2025-13-01").is_none());
        assert!(parse_deadline("").is_none());
    }

    #[test]
    fn test_every_transition_is_permitted() {
        for from in RequestStatus::ALL {
            for to in RequestStatus::ALL {
                assert!(status_transition_allowed(from, to), "{from} -> {to}");
            }
        }
    }

    #[test]
    fn test_allowed_values_message() {
        assert_eq!(
            RequestStatus::allowed_values(),
            "new, progress, revision, completed"
        );
    }

    #[test]
    fn test_request_from_model_decodes_platforms() {
        let model = requests::Model {
            id: "r1".into(),
            agent_id: "a1".into(),
            template_id: "t1".into(),
            project_title: "Spring Promo".into(),
            deadline: "2025-06-01T00:00:00+00:00".into(),
            platforms: r#"["instagram","facebook"]"#.into(),
            dimensions: None,
            notes: None,
            status: "revision".into(),
            created_at: "2025-01-01T00:00:00+00:00".into(),
            updated_at: "2025-01-01T00:00:00+00:00".into(),
        };

        let request = Request::from(model);
        assert_eq!(request.platforms, vec!["instagram", "facebook"]);
        assert_eq!(request.status, RequestStatus::Revision);
        assert!(request.files.is_empty());
    }
}
