use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "users")]
pub struct Model {
    /// UUID v4
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    pub name: String,

    #[sea_orm(unique)]
    pub email: String,

    /// Argon2id password hash
    pub password_hash: String,

    /// `admin`, `agent` or `va`
    pub role: String,

    pub is_active: bool,

    pub last_login_at: Option<String>,

    pub two_factor_enabled: bool,

    /// SHA-256 (hex) of the outstanding reset token
    pub password_reset_token_hash: Option<String>,

    pub password_reset_expires: Option<String>,

    pub position: Option<String>,

    pub phone_number: Option<String>,

    pub website: Option<String>,

    pub about: Option<String>,

    pub profile_image: Option<String>,

    /// JSON object, e.g. {"linkedin": "..."}
    pub social_links: Option<String>,

    pub created_at: String,

    pub updated_at: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::requests::Entity")]
    Requests,
}

impl Related<super::requests::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Requests.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
