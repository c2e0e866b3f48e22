use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::UnknownVariant;
use crate::entities::users;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Agent,
    Va,
}

impl Role {
    pub const ALL: [Self; 3] = [Self::Admin, Self::Agent, Self::Va];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::Agent => "agent",
            Self::Va => "va",
        }
    }

    /// VA and admin accounts fulfil requests on behalf of agents.
    #[must_use]
    pub const fn is_staff(self) -> bool {
        matches!(self, Self::Admin | Self::Va)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(Self::Admin),
            "agent" => Ok(Self::Agent),
            "va" => Ok(Self::Va),
            other => Err(UnknownVariant {
                kind: "role",
                value: other.to_string(),
            }),
        }
    }
}

/// The authenticated caller, resolved from a verified access token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurrentUser {
    pub id: String,
    pub email: String,
    pub role: Role,
}

impl CurrentUser {
    #[must_use]
    pub fn is(&self, user_id: &str) -> bool {
        self.id == user_id
    }
}

/// User as exposed over the API (no credential material).
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicUser {
    pub id: String,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub is_active: bool,
    pub last_login_at: Option<String>,
    pub two_factor_enabled: bool,
    pub position: Option<String>,
    pub phone_number: Option<String>,
    pub website: Option<String>,
    pub about: Option<String>,
    pub profile_image: Option<String>,
    pub social_links: Option<serde_json::Value>,
    pub created_at: String,
    pub updated_at: String,
}

impl From<users::Model> for PublicUser {
    fn from(model: users::Model) -> Self {
        Self {
            // Rows are only ever written through `Role::as_str`.
            role: model.role.parse().unwrap_or(Role::Agent),
            social_links: model
                .social_links
                .as_deref()
                .and_then(|raw| serde_json::from_str(raw).ok()),
            id: model.id,
            name: model.name,
            email: model.email,
            is_active: model.is_active,
            last_login_at: model.last_login_at,
            two_factor_enabled: model.two_factor_enabled,
            position: model.position,
            phone_number: model.phone_number,
            website: model.website,
            about: model.about,
            profile_image: model.profile_image,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_round_trips_through_str() {
        for role in Role::ALL {
            assert_eq!(role.as_str().parse::<Role>().unwrap(), role);
        }
        assert!("superuser".parse::<Role>().is_err());
        assert!("Admin".parse::<Role>().is_err());
    }

    #[test]
    fn test_staff_roles() {
        assert!(Role::Admin.is_staff());
        assert!(Role::Va.is_staff());
        assert!(!Role::Agent.is_staff());
    }
}
