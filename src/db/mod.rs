use anyhow::Result;
use chrono::{DateTime, SecondsFormat, Utc};
use sea_orm::{ConnectOptions, ConnectionTrait, Database, DatabaseConnection, Statement};
use std::path::Path;
use std::time::Duration;
use tracing::info;

pub mod migrator;
pub mod repositories;

pub use repositories::request::{NewRequest, RequestChanges, StatusCounts};
pub use repositories::stats::{AgentRequestCount, MonthlyBucket, TemplateUsage};
pub use repositories::template::{NewTemplate, TemplateChanges, TemplateFilter};
pub use repositories::user::{NewUser, ProfileChanges, UserFilter, UserPage};

/// Timestamp format used for every stored date: fixed-width RFC 3339 in UTC,
/// so string comparison matches chronological order.
#[must_use]
pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

#[must_use]
pub fn now() -> String {
    format_timestamp(Utc::now())
}

#[must_use]
pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Whether `err` was caused by a unique-index violation.
#[must_use]
pub fn is_unique_violation(err: &anyhow::Error) -> bool {
    err.chain().any(|cause| {
        cause
            .downcast_ref::<sea_orm::DbErr>()
            .and_then(sea_orm::DbErr::sql_err)
            .is_some_and(|e| matches!(e, sea_orm::SqlErr::UniqueConstraintViolation(_)))
    })
}

/// Process-wide handle on the connection pool. Created once at boot and
/// cloned into every service.
#[derive(Clone)]
pub struct Store {
    pub conn: DatabaseConnection,
}

impl Store {
    pub async fn new(db_url: &str) -> Result<Self> {
        Self::with_pool_options(db_url, 5, 1).await
    }

    pub async fn with_pool_options(
        db_url: &str,
        max_connections: u32,
        min_connections: u32,
    ) -> Result<Self> {
        use sea_orm_migration::MigratorTrait;

        let in_memory = db_url.contains(":memory:");

        if db_url.starts_with("sqlite:") && !in_memory {
            let path_str = db_url
                .trim_start_matches("sqlite://")
                .trim_start_matches("sqlite:");
            let path_str = path_str.split('?').next().unwrap_or(path_str);
            if let Some(parent) = Path::new(path_str).parent() {
                tokio::fs::create_dir_all(parent).await.ok();
            }
            if !Path::new(path_str).exists() {
                std::fs::File::create(path_str)?;
            }
        }

        // Every pooled connection to an in-memory SQLite database would see its
        // own empty database.
        let (max_connections, min_connections) = if in_memory {
            (1, 1)
        } else {
            (max_connections, min_connections)
        };

        let mut opt = ConnectOptions::new(db_url.to_string());
        opt.max_connections(max_connections)
            .min_connections(min_connections)
            .connect_timeout(Duration::from_secs(10))
            .acquire_timeout(Duration::from_secs(10))
            .idle_timeout(Duration::from_secs(300))
            .max_lifetime(Duration::from_secs(600))
            .sqlx_logging(false);

        let conn = Database::connect(opt).await?;

        migrator::Migrator::up(&conn, None).await?;

        info!(
            "Database connected & migrations applied (pool: {}-{})",
            min_connections, max_connections
        );

        Ok(Self { conn })
    }

    pub async fn ping(&self) -> Result<()> {
        let backend = self.conn.get_database_backend();
        self.conn
            .query_one(Statement::from_string(backend, "SELECT 1".to_string()))
            .await?;
        Ok(())
    }

    /// Drains the pool. Called once on shutdown.
    pub async fn close(self) -> Result<()> {
        self.conn.close().await?;
        info!("Database pool closed");
        Ok(())
    }

    #[must_use]
    pub fn users(&self) -> repositories::user::UserRepository {
        repositories::user::UserRepository::new(self.conn.clone())
    }

    #[must_use]
    pub fn templates(&self) -> repositories::template::TemplateRepository {
        repositories::template::TemplateRepository::new(self.conn.clone())
    }

    #[must_use]
    pub fn requests(&self) -> repositories::request::RequestRepository {
        repositories::request::RequestRepository::new(self.conn.clone())
    }

    #[must_use]
    pub fn stats(&self) -> repositories::stats::StatsRepository {
        repositories::stats::StatsRepository::new(self.conn.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_timestamps_are_fixed_width() {
        let whole = Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap();
        let fractional = whole + chrono::Duration::milliseconds(5);

        let a = format_timestamp(whole);
        let b = format_timestamp(fractional);

        assert_eq!(a, "2025-06-01T00:00:00.000Z");
        assert_eq!(a.len(), b.len());
        assert!(a < b);
    }

    fn new_user(email: &str) -> NewUser {
        NewUser {
            name: "Dup".to_string(),
            email: email.to_string(),
            password_hash: "x".to_string(),
            role: crate::models::Role::Agent,
            is_active: true,
        }
    }

    #[tokio::test]
    async fn test_duplicate_email_is_unique_violation() {
        let store = Store::new("sqlite::memory:").await.unwrap();
        let users = store.users();

        users.create(new_user("dup@example.com")).await.unwrap();
        let err = users.create(new_user("dup@example.com")).await.unwrap_err();
        assert!(is_unique_violation(&err));

        assert!(!is_unique_violation(&anyhow::anyhow!("unrelated")));
    }
}
