//! Read-only dashboard rollups.

use chrono::{DateTime, Datelike, Months, NaiveTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use thiserror::Error;

use crate::db::{AgentRequestCount, MonthlyBucket, StatusCounts, TemplateUsage};
use crate::models::{PublicUser, Request, RequestStatus};
use crate::services::user_admin_service::UserCounts;

/// Trailing window of the monthly request chart.
pub const CHART_MONTHS: u32 = 6;

#[derive(Debug, Error)]
pub enum StatsError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<sea_orm::DbErr> for StatsError {
    fn from(err: sea_orm::DbErr) -> Self {
        Self::Database(err.to_string())
    }
}

impl From<anyhow::Error> for StatsError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(format!("{err:#}"))
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TemplateTypeCounts {
    pub total: u64,
    pub residential: u64,
    pub commercial: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct RequestTotals {
    pub total: u64,
    #[serde(flatten)]
    pub by_status: StatusCounts,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Charts {
    pub monthly_requests: Vec<MonthlyBucket>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Overview {
    pub users: UserCounts,
    pub templates: TemplateTypeCounts,
    pub requests: RequestTotals,
    pub recent_activity: Vec<Request>,
    pub charts: Charts,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserStats {
    #[serde(flatten)]
    pub counts: UserCounts,
    pub new_this_month: u64,
    pub recent_logins: Vec<PublicUser>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateStats {
    pub total: u64,
    pub residential: u64,
    pub commercial: u64,
    pub by_category: BTreeMap<String, u64>,
    pub most_used: Vec<TemplateUsage>,
    pub recent: Vec<TemplateUsage>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestStats {
    pub total: u64,
    #[serde(flatten)]
    pub by_status: StatusCounts,
    pub overdue: u64,
    pub avg_completion_time: i64,
    pub top_agents: Vec<AgentRequestCount>,
    pub monthly_data: Vec<MonthlyBucket>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardOverview {
    pub total_requests: u64,
    pub pending_requests: u64,
    pub in_progress_requests: u64,
    pub completed_requests: u64,
    pub this_week_requests: u64,
    pub this_month_completed: u64,
    pub last_month_completed: u64,
    pub month_trend: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct RecentRequest {
    pub id: String,
    pub title: String,
    pub status: RequestStatus,
    /// Relative to now, e.g. "3 days ago".
    pub date: String,
    pub template: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentDashboard {
    pub overview: DashboardOverview,
    pub status_breakdown: StatusCounts,
    pub recent_requests: Vec<RecentRequest>,
}

#[async_trait::async_trait]
pub trait StatsService: Send + Sync {
    async fn overview(&self) -> Result<Overview, StatsError>;

    async fn users(&self) -> Result<UserStats, StatsError>;

    async fn templates(&self) -> Result<TemplateStats, StatsError>;

    async fn requests(&self) -> Result<RequestStats, StatsError>;

    /// Personal dashboard for one agent.
    async fn agent_dashboard(&self, agent_id: &str) -> Result<AgentDashboard, StatsError>;
}

/// Midnight UTC on the first day of `now`'s month.
#[must_use]
pub fn start_of_month(now: DateTime<Utc>) -> DateTime<Utc> {
    now.date_naive()
        .with_day(1)
        .unwrap_or_else(|| now.date_naive())
        .and_time(NaiveTime::MIN)
        .and_utc()
}

/// First day of the month `months` before `now`'s month.
#[must_use]
pub fn months_back(now: DateTime<Utc>, months: u32) -> DateTime<Utc> {
    let start = start_of_month(now);
    start.checked_sub_months(Months::new(months)).unwrap_or(start)
}

/// `YYYY-MM` keys of the monthly chart: the current month and the
/// `CHART_MONTHS - 1` before it, oldest first.
#[must_use]
pub fn chart_months(now: DateTime<Utc>) -> Vec<String> {
    (0..CHART_MONTHS)
        .rev()
        .map(|back| months_back(now, back).format("%Y-%m").to_string())
        .collect()
}

/// Month-over-month change in percent. A month with completions after an
/// empty one counts as +100.
#[must_use]
pub fn month_trend(this_month: u64, last_month: u64) -> i64 {
    if last_month == 0 {
        return if this_month > 0 { 100 } else { 0 };
    }

    #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
    let trend = ((this_month as f64 - last_month as f64) / last_month as f64 * 100.0).round() as i64;
    trend
}

fn plural(n: i64, unit: &str) -> String {
    if n == 1 {
        format!("1 {unit} ago")
    } else {
        format!("{n} {unit}s ago")
    }
}

#[must_use]
pub fn relative_time(then: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let elapsed = now - then;
    let minutes = elapsed.num_minutes();
    let hours = elapsed.num_hours();
    let days = elapsed.num_days();

    match () {
        () if minutes < 1 => "Just now".to_string(),
        () if minutes < 60 => plural(minutes, "minute"),
        () if hours < 24 => plural(hours, "hour"),
        () if days < 7 => plural(days, "day"),
        () if days < 30 => plural(days / 7, "week"),
        () => plural(days / 30, "month"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn at(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 15, 30, 0).single().unwrap()
    }

    #[test]
    fn test_month_boundaries() {
        let now = at(2025, 3, 18);
        assert_eq!(
            crate::db::format_timestamp(start_of_month(now)),
            "2025-03-01T00:00:00.000Z"
        );
        assert_eq!(
            crate::db::format_timestamp(months_back(now, 1)),
            "2025-02-01T00:00:00.000Z"
        );
        assert_eq!(
            crate::db::format_timestamp(months_back(at(2025, 1, 31), 6)),
            "2024-07-01T00:00:00.000Z"
        );
    }

    #[test]
    fn test_chart_months_spans_six_months_ending_now() {
        let months = chart_months(at(2025, 2, 10));
        assert_eq!(months.len(), CHART_MONTHS as usize);
        assert_eq!(
            months,
            ["2024-09", "2024-10", "2024-11", "2024-12", "2025-01", "2025-02"]
        );
    }

    #[test]
    fn test_month_trend() {
        assert_eq!(month_trend(0, 0), 0);
        assert_eq!(month_trend(3, 0), 100);
        assert_eq!(month_trend(3, 2), 50);
        assert_eq!(month_trend(1, 3), -67);
    }

    #[test]
    fn test_relative_time() {
        let now = at(2025, 3, 18);
        assert_eq!(relative_time(now - Duration::seconds(20), now), "Just now");
        assert_eq!(relative_time(now - Duration::minutes(1), now), "1 minute ago");
        assert_eq!(relative_time(now - Duration::minutes(45), now), "45 minutes ago");
        assert_eq!(relative_time(now - Duration::hours(5), now), "5 hours ago");
        assert_eq!(relative_time(now - Duration::days(3), now), "3 days ago");
        assert_eq!(relative_time(now - Duration::days(14), now), "2 weeks ago");
        assert_eq!(relative_time(now - Duration::days(65), now), "2 months ago");
    }
}
