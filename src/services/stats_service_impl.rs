//! `SeaORM` implementation of the `StatsService` trait.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};

use crate::db::{Store, format_timestamp};
use crate::models::{PublicUser, TemplateType};
use crate::services::stats_service::{
    AgentDashboard, CHART_MONTHS, Charts, DashboardOverview, Overview, RecentRequest,
    RequestStats, RequestTotals, StatsError, StatsService, TemplateStats, TemplateTypeCounts,
    UserStats, chart_months, month_trend, months_back, relative_time, start_of_month,
};
use crate::services::user_admin_service::UserCounts;

const RECENT_LIMIT: u64 = 5;
const RANKING_LIMIT: u64 = 10;

pub struct SeaOrmStatsService {
    store: Store,
}

impl SeaOrmStatsService {
    #[must_use]
    pub const fn new(store: Store) -> Self {
        Self { store }
    }

    async fn user_counts(&self) -> anyhow::Result<UserCounts> {
        let stats = self.store.stats();
        let ((total, active), by_role) =
            tokio::try_join!(stats.user_totals(), stats.users_by_role())?;

        Ok(UserCounts {
            total,
            active,
            inactive: total.saturating_sub(active),
            by_role,
        })
    }
}

/// Month keys of the chart and the timestamp its window starts at.
fn chart_window(now: DateTime<Utc>) -> (Vec<String>, String) {
    let since = format_timestamp(months_back(now, CHART_MONTHS - 1));
    (chart_months(now), since)
}

#[async_trait]
impl StatsService for SeaOrmStatsService {
    async fn overview(&self) -> Result<Overview, StatsError> {
        let stats = self.store.stats();
        let requests = self.store.requests();
        let (months, since) = chart_window(Utc::now());

        let (users, template_total, by_type, request_total, by_status, recent_activity, monthly) =
            tokio::try_join!(
                self.user_counts(),
                stats.template_total(),
                stats.templates_by_type(),
                stats.request_total(),
                requests.status_counts(None),
                requests.recent(None, RECENT_LIMIT),
                stats.monthly_requests(&months, &since),
            )?;

        let type_count = |t: TemplateType| by_type.get(t.as_str()).copied().unwrap_or_default();

        Ok(Overview {
            users,
            templates: TemplateTypeCounts {
                total: template_total,
                residential: type_count(TemplateType::Residential),
                commercial: type_count(TemplateType::Commercial),
            },
            requests: RequestTotals {
                total: request_total,
                by_status,
            },
            recent_activity,
            charts: Charts {
                monthly_requests: monthly,
            },
        })
    }

    async fn users(&self) -> Result<UserStats, StatsError> {
        let stats = self.store.stats();
        let month_start = format_timestamp(start_of_month(Utc::now()));

        let (counts, new_this_month, recent_logins) = tokio::try_join!(
            self.user_counts(),
            stats.users_created_since(&month_start),
            stats.recent_logins(RANKING_LIMIT),
        )?;

        Ok(UserStats {
            counts,
            new_this_month,
            recent_logins: recent_logins.into_iter().map(PublicUser::from).collect(),
        })
    }

    async fn templates(&self) -> Result<TemplateStats, StatsError> {
        let stats = self.store.stats();

        let (total, by_type, by_category, most_used, recent) = tokio::try_join!(
            stats.template_total(),
            stats.templates_by_type(),
            stats.templates_by_category(),
            stats.most_used_templates(RANKING_LIMIT),
            stats.recent_templates(RECENT_LIMIT),
        )?;

        let type_count = |t: TemplateType| by_type.get(t.as_str()).copied().unwrap_or_default();

        Ok(TemplateStats {
            total,
            residential: type_count(TemplateType::Residential),
            commercial: type_count(TemplateType::Commercial),
            by_category,
            most_used,
            recent,
        })
    }

    async fn requests(&self) -> Result<RequestStats, StatsError> {
        let stats = self.store.stats();
        let requests = self.store.requests();
        let now = Utc::now();
        let now_stamp = format_timestamp(now);
        let (months, since) = chart_window(now);

        let (total, by_status, overdue, avg_completion_time, top_agents, monthly_data) = tokio::try_join!(
            stats.request_total(),
            requests.status_counts(None),
            stats.overdue_requests(&now_stamp),
            stats.average_completion_hours(),
            stats.top_agents(RANKING_LIMIT),
            stats.monthly_requests(&months, &since),
        )?;

        Ok(RequestStats {
            total,
            by_status,
            overdue,
            avg_completion_time,
            top_agents,
            monthly_data,
        })
    }

    async fn agent_dashboard(&self, agent_id: &str) -> Result<AgentDashboard, StatsError> {
        let requests = self.store.requests();
        let now = Utc::now();
        let this_month = format_timestamp(start_of_month(now));
        let last_month = format_timestamp(months_back(now, 1));
        let week_ago = format_timestamp(now - Duration::days(7));
        let scope = Some(agent_id);

        let (counts, this_month_completed, last_month_completed, this_week, recent) = tokio::try_join!(
            requests.status_counts(scope),
            requests.count_completed_created_between(scope, &this_month, None),
            requests.count_completed_created_between(scope, &last_month, Some(&this_month)),
            requests.count_created_since(scope, &week_ago),
            requests.recent(scope, RECENT_LIMIT),
        )?;

        let recent_requests = recent
            .into_iter()
            .map(|request| {
                let date = DateTime::parse_from_rfc3339(&request.created_at)
                    .map(|created| relative_time(created.with_timezone(&Utc), now))
                    .unwrap_or_default();
                RecentRequest {
                    id: request.id,
                    title: request.project_title,
                    status: request.status,
                    date,
                    template: request.template.map(|t| t.title),
                }
            })
            .collect();

        Ok(AgentDashboard {
            overview: DashboardOverview {
                total_requests: counts.total(),
                pending_requests: counts.new + counts.revision,
                in_progress_requests: counts.progress,
                completed_requests: counts.completed,
                this_week_requests: this_week,
                this_month_completed,
                last_month_completed,
                month_trend: month_trend(this_month_completed, last_month_completed),
            },
            status_breakdown: counts,
            recent_requests,
        })
    }
}
