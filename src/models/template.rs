use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::UnknownVariant;
use crate::entities::templates;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TemplateType {
    Residential,
    Commercial,
}

impl TemplateType {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Residential => "residential",
            Self::Commercial => "commercial",
        }
    }
}

impl fmt::Display for TemplateType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TemplateType {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "residential" => Ok(Self::Residential),
            "commercial" => Ok(Self::Commercial),
            other => Err(UnknownVariant {
                kind: "template type",
                value: other.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Template {
    pub id: String,
    pub title: String,
    pub category: String,
    #[serde(rename = "type")]
    pub template_type: TemplateType,
    pub canva_url: Option<String>,
    pub preview_url: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl From<templates::Model> for Template {
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
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}
