use anyhow::{Context, Result};
use chrono::DateTime;
use sea_orm::sea_query::{Expr, JoinType};
use sea_orm::{
    ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder,
    QuerySelect, RelationTrait,
};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};

use crate::entities::{requests, templates, users};
use crate::models::{AgentSummary, RequestStatus, Template};

/// Request counts for one `YYYY-MM` month.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MonthlyBucket {
    pub month: String,
    pub total: u64,
    pub new: u64,
    pub progress: u64,
    pub revision: u64,
    pub completed: u64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateUsage {
    #[serde(flatten)]
    pub template: Template,
    pub usage_count: u64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentRequestCount {
    pub agent: Option<AgentSummary>,
    pub request_count: u64,
}

/// Groups `(created_at, status)` rows into one bucket per entry of `months`
/// (`YYYY-MM`, oldest first). Months without rows stay zeroed and rows
/// outside `months` are ignored.
#[must_use]
pub fn bucket_by_month(months: &[String], rows: &[(String, String)]) -> Vec<MonthlyBucket> {
    let mut buckets: BTreeMap<&str, MonthlyBucket> = months
        .iter()
        .map(|month| {
            (
                month.as_str(),
                MonthlyBucket {
                    month: month.clone(),
                    ..MonthlyBucket::default()
                },
            )
        })
        .collect();

    for (created_at, status) in rows {
        let Some(bucket) = created_at.get(..7).and_then(|m| buckets.get_mut(m)) else {
            continue;
        };

        bucket.total += 1;
        match status.parse::<RequestStatus>() {
            Ok(RequestStatus::New) => bucket.new += 1,
            Ok(RequestStatus::Progress) => bucket.progress += 1,
            Ok(RequestStatus::Revision) => bucket.revision += 1,
            Ok(RequestStatus::Completed) => bucket.completed += 1,
            Err(_) => {}
        }
    }

    buckets.into_values().collect()
}

/// Mean of `updated_at - created_at`, in whole hours (rounded). Zero when
/// there is nothing to average.
#[must_use]
pub fn average_hours(spans: &[(String, String)]) -> i64 {
    let durations: Vec<i64> = spans
        .iter()
        .filter_map(|(created, updated)| {
            let created = DateTime::parse_from_rfc3339(created).ok()?;
            let updated = DateTime::parse_from_rfc3339(updated).ok()?;
            Some((updated - created).num_milliseconds())
        })
        .collect();

    if durations.is_empty() {
        return 0;
    }

    #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
    let hours = (durations.iter().sum::<i64>() as f64
        / durations.len() as f64
        / 3_600_000.0)
        .round() as i64;
    hours
}

fn count_map(rows: Vec<(String, i64)>) -> BTreeMap<String, u64> {
    rows.into_iter()
        .map(|(key, count)| (key, u64::try_from(count).unwrap_or_default()))
        .collect()
}

pub struct StatsRepository {
    conn: DatabaseConnection,
}

impl StatsRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    pub async fn user_totals(&self) -> Result<(u64, u64)> {
        let total = users::Entity::find().count(&self.conn).await?;
        let active = users::Entity::find()
            .filter(users::Column::IsActive.eq(true))
            .count(&self.conn)
            .await?;
        Ok((total, active))
    }

    pub async fn users_by_role(&self) -> Result<BTreeMap<String, u64>> {
        let rows: Vec<(String, i64)> = users::Entity::find()
            .select_only()
            .column(users::Column::Role)
            .column_as(users::Column::Id.count(), "count")
            .group_by(users::Column::Role)
            .into_tuple()
            .all(&self.conn)
            .await
            .context("Failed to count users by role")?;

        Ok(count_map(rows))
    }

    pub async fn users_created_since(&self, since: &str) -> Result<u64> {
        Ok(users::Entity::find()
            .filter(users::Column::CreatedAt.gte(since))
            .count(&self.conn)
            .await?)
    }

    pub async fn recent_logins(&self, limit: u64) -> Result<Vec<users::Model>> {
        users::Entity::find()
            .filter(users::Column::LastLoginAt.is_not_null())
            .order_by_desc(users::Column::LastLoginAt)
            .limit(limit)
            .all(&self.conn)
            .await
            .context("Failed to query recent logins")
    }

    pub async fn template_total(&self) -> Result<u64> {
        Ok(templates::Entity::find().count(&self.conn).await?)
    }

    pub async fn templates_by_type(&self) -> Result<BTreeMap<String, u64>> {
        let rows: Vec<(String, i64)> = templates::Entity::find()
            .select_only()
            .column(templates::Column::TemplateType)
            .column_as(templates::Column::Id.count(), "count")
            .group_by(templates::Column::TemplateType)
            .into_tuple()
            .all(&self.conn)
            .await
            .context("Failed to count templates by type")?;

        Ok(count_map(rows))
    }

    pub async fn templates_by_category(&self) -> Result<BTreeMap<String, u64>> {
        let rows: Vec<(String, i64)> = templates::Entity::find()
            .select_only()
            .column(templates::Column::Category)
            .column_as(templates::Column::Id.count(), "count")
            .group_by(templates::Column::Category)
            .into_tuple()
            .all(&self.conn)
            .await
            .context("Failed to count templates by category")?;

        Ok(count_map(rows))
    }

    /// Templates ordered by how many requests reference them.
    pub async fn most_used_templates(&self, limit: u64) -> Result<Vec<TemplateUsage>> {
        let ranked: Vec<(String, i64)> = templates::Entity::find()
            .select_only()
            .column(templates::Column::Id)
            .column_as(requests::Column::Id.count(), "usage_count")
            .join(JoinType::LeftJoin, templates::Relation::Requests.def())
            .group_by(templates::Column::Id)
            .order_by_desc(Expr::cust("usage_count"))
            .limit(limit)
            .into_tuple()
            .all(&self.conn)
            .await
            .context("Failed to rank templates by usage")?;

        let ids: Vec<String> = ranked.iter().map(|(id, _)| id.clone()).collect();
        let mut by_id: HashMap<String, templates::Model> = templates::Entity::find()
            .filter(templates::Column::Id.is_in(ids))
            .all(&self.conn)
            .await?
            .into_iter()
            .map(|t| (t.id.clone(), t))
            .collect();

        Ok(ranked
            .into_iter()
            .filter_map(|(id, count)| {
                by_id.remove(&id).map(|model| TemplateUsage {
                    template: Template::from(model),
                    usage_count: u64::try_from(count).unwrap_or_default(),
                })
            })
            .collect())
    }

    pub async fn recent_templates(&self, limit: u64) -> Result<Vec<TemplateUsage>> {
        let models = templates::Entity::find()
            .order_by_desc(templates::Column::CreatedAt)
            .limit(limit)
            .all(&self.conn)
            .await
            .context("Failed to query recent templates")?;

        let ids: Vec<String> = models.iter().map(|t| t.id.clone()).collect();
        let counts: HashMap<String, i64> = requests::Entity::find()
            .select_only()
            .column(requests::Column::TemplateId)
            .column_as(requests::Column::Id.count(), "count")
            .filter(requests::Column::TemplateId.is_in(ids))
            .group_by(requests::Column::TemplateId)
            .into_tuple::<(String, i64)>()
            .all(&self.conn)
            .await?
            .into_iter()
            .collect();

        Ok(models
            .into_iter()
            .map(|model| {
                let usage = counts.get(&model.id).copied().unwrap_or_default();
                TemplateUsage {
                    template: Template::from(model),
                    usage_count: u64::try_from(usage).unwrap_or_default(),
                }
            })
            .collect())
    }

    pub async fn request_total(&self) -> Result<u64> {
        Ok(requests::Entity::find().count(&self.conn).await?)
    }

    /// Requests created since `since`, bucketed into `months`.
    pub async fn monthly_requests(
        &self,
        months: &[String],
        since: &str,
    ) -> Result<Vec<MonthlyBucket>> {
        let rows: Vec<(String, String)> = requests::Entity::find()
            .select_only()
            .column(requests::Column::CreatedAt)
            .column(requests::Column::Status)
            .filter(requests::Column::CreatedAt.gte(since))
            .into_tuple()
            .all(&self.conn)
            .await
            .context("Failed to query monthly requests")?;

        Ok(bucket_by_month(months, &rows))
    }

    /// Deadline passed and not completed.
    pub async fn overdue_requests(&self, now: &str) -> Result<u64> {
        Ok(requests::Entity::find()
            .filter(requests::Column::Deadline.lt(now))
            .filter(requests::Column::Status.ne(RequestStatus::Completed.as_str()))
            .count(&self.conn)
            .await?)
    }

    pub async fn average_completion_hours(&self) -> Result<i64> {
        let spans: Vec<(String, String)> = requests::Entity::find()
            .select_only()
            .column(requests::Column::CreatedAt)
            .column(requests::Column::UpdatedAt)
            .filter(requests::Column::Status.eq(RequestStatus::Completed.as_str()))
            .into_tuple()
            .all(&self.conn)
            .await
            .context("Failed to query completed requests")?;

        Ok(average_hours(&spans))
    }

    pub async fn top_agents(&self, limit: u64) -> Result<Vec<AgentRequestCount>> {
        let ranked: Vec<(String, i64)> = requests::Entity::find()
            .select_only()
            .column(requests::Column::AgentId)
            .column_as(requests::Column::Id.count(), "request_count")
            .group_by(requests::Column::AgentId)
            .order_by_desc(Expr::cust("request_count"))
            .limit(limit)
            .into_tuple()
            .all(&self.conn)
            .await
            .context("Failed to rank agents")?;

        let ids: Vec<String> = ranked.iter().map(|(id, _)| id.clone()).collect();
        let agents: HashMap<String, users::Model> = users::Entity::find()
            .filter(users::Column::Id.is_in(ids))
            .all(&self.conn)
            .await?
            .into_iter()
            .map(|u| (u.id.clone(), u))
            .collect();

        Ok(ranked
            .into_iter()
            .map(|(id, count)| AgentRequestCount {
                agent: agents.get(&id).cloned().map(AgentSummary::from),
                request_count: u64::try_from(count).unwrap_or_default(),
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(created_at: &str, status: &str) -> (String, String) {
        (created_at.to_string(), status.to_string())
    }

    #[test]
    fn test_bucket_by_month_orders_and_counts() {
        let months: Vec<String> = ["2025-01", "2025-02", "2025-03"]
            .into_iter()
            .map(String::from)
            .collect();
        let rows = vec![
            row("2025-03-14T10:00:00.000Z", "completed"),
            row("2025-01-02T10:00:00.000Z", "new"),
            row("2025-03-01T00:00:00.000Z", "new"),
            row("2025-03-30T23:59:59.000Z", "revision"),
        ];

        let buckets = bucket_by_month(&months, &rows);
        assert_eq!(buckets.len(), 3);
        assert_eq!(buckets[0].month, "2025-01");
        assert_eq!(buckets[0].total, 1);
        assert_eq!(buckets[1].month, "2025-02");
        assert_eq!(buckets[1], MonthlyBucket {
            month: "2025-02".to_string(),
            ..MonthlyBucket::default()
        });
        assert_eq!(buckets[2].month, "2025-03");
        assert_eq!(buckets[2].total, 3);
        assert_eq!(buckets[2].new, 1);
        assert_eq!(buckets[2].completed, 1);
        assert_eq!(buckets[2].revision, 1);
        assert_eq!(buckets[2].progress, 0);
    }

    #[test]
    fn test_bucket_by_month_ignores_rows_outside_window() {
        let months = vec!["2025-03".to_string()];
        let rows = vec![
            row("2024-12-31T23:59:59.000Z", "new"),
            row("2025-03-02T08:00:00.000Z", "progress"),
            row("bad", "new"),
        ];

        let buckets = bucket_by_month(&months, &rows);
        assert_eq!(buckets.len(), 1);
        assert_eq!(buckets[0].total, 1);
        assert_eq!(buckets[0].progress, 1);
    }

    #[test]
    fn test_average_hours_rounds() {
        let spans = vec![
            row("2025-01-01T00:00:00.000Z", "2025-01-01T10:00:00.000Z"),
            row("2025-01-01T00:00:00.000Z", "2025-01-01T11:00:00.000Z"),
        ];
        // 10.5h rounds up
        assert_eq!(average_hours(&spans), 11);
        assert_eq!(average_hours(&[]), 0);
    }
}
