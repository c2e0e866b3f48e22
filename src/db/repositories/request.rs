use anyhow::{Context, Result};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect, Select, Set, TransactionTrait,
};
use serde::Serialize;
use std::collections::HashMap;

use crate::db::{new_id, now};
use crate::entities::{request_files, requests, templates, users};
use crate::models::{AgentSummary, Request, RequestFile, RequestStatus, TemplateSummary};

#[derive(Debug, Clone)]
pub struct NewRequest {
    pub agent_id: String,
    pub template_id: String,
    pub project_title: String,
    /// Normalized RFC 3339
    pub deadline: String,
    pub platforms: Vec<String>,
    pub dimensions: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct RequestChanges {
    pub project_title: Option<String>,
    pub deadline: Option<String>,
    pub platforms: Option<Vec<String>>,
    pub dimensions: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatusCounts {
    pub new: u64,
    pub progress: u64,
    pub revision: u64,
    pub completed: u64,
}

impl StatusCounts {
    #[must_use]
    pub const fn total(&self) -> u64 {
        self.new + self.progress + self.revision + self.completed
    }

    fn record(&mut self, status: &str, count: i64) {
        let count = u64::try_from(count).unwrap_or_default();
        match status.parse::<RequestStatus>() {
            Ok(RequestStatus::New) => self.new += count,
            Ok(RequestStatus::Progress) => self.progress += count,
            Ok(RequestStatus::Revision) => self.revision += count,
            Ok(RequestStatus::Completed) => self.completed += count,
            Err(_) => {}
        }
    }
}

pub struct RequestRepository {
    conn: DatabaseConnection,
}

fn scoped(agent_id: Option<&str>) -> Select<requests::Entity> {
    let query = requests::Entity::find();
    match agent_id {
        Some(agent_id) => query.filter(requests::Column::AgentId.eq(agent_id)),
        None => query,
    }
}

fn encode_platforms(platforms: &[String]) -> String {
    serde_json::to_string(platforms).unwrap_or_else(|_| "[]".to_string())
}

impl RequestRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    /// Inserts the request together with its initial attachments.
    pub async fn create(
        &self,
        request: NewRequest,
        files: Vec<(String, String)>,
    ) -> Result<requests::Model> {
        let timestamp = now();
        let txn = self.conn.begin().await?;

        let model = requests::ActiveModel {
            id: Set(new_id()),
            agent_id: Set(request.agent_id),
            template_id: Set(request.template_id),
            project_title: Set(request.project_title),
            deadline: Set(request.deadline),
            platforms: Set(encode_platforms(&request.platforms)),
            dimensions: Set(request.dimensions),
            notes: Set(request.notes),
            status: Set(RequestStatus::New.as_str().to_string()),
            created_at: Set(timestamp.clone()),
            updated_at: Set(timestamp.clone()),
        }
        .insert(&txn)
        .await
        .context("Failed to insert request")?;

        if !files.is_empty() {
            let rows = files.into_iter().map(|(file_url, file_type)| {
                request_files::ActiveModel {
                    id: Set(new_id()),
                    request_id: Set(model.id.clone()),
                    file_url: Set(file_url),
                    file_type: Set(file_type),
                    created_at: Set(timestamp.clone()),
                }
            });
            request_files::Entity::insert_many(rows)
                .exec(&txn)
                .await
                .context("Failed to insert request files")?;
        }

        txn.commit().await?;
        Ok(model)
    }

    pub async fn get(&self, id: &str) -> Result<Option<requests::Model>> {
        requests::Entity::find_by_id(id.to_string())
            .one(&self.conn)
            .await
            .context("Failed to query request")
    }

    /// Request with agent, template and files attached.
    pub async fn get_detailed(&self, id: &str) -> Result<Option<Request>> {
        let Some(model) = self.get(id).await? else {
            return Ok(None);
        };
        Ok(self.hydrate(vec![model]).await?.pop())
    }

    /// Newest first.
    pub async fn list(
        &self,
        agent_id: Option<&str>,
        status: Option<RequestStatus>,
    ) -> Result<Vec<Request>> {
        let mut query = scoped(agent_id);
        if let Some(status) = status {
            query = query.filter(requests::Column::Status.eq(status.as_str()));
        }

        let models = query
            .order_by_desc(requests::Column::CreatedAt)
            .all(&self.conn)
            .await
            .context("Failed to list requests")?;

        self.hydrate(models).await
    }

    pub async fn recent(&self, agent_id: Option<&str>, limit: u64) -> Result<Vec<Request>> {
        let models = scoped(agent_id)
            .order_by_desc(requests::Column::CreatedAt)
            .limit(limit)
            .all(&self.conn)
            .await
            .context("Failed to query recent requests")?;

        self.hydrate(models).await
    }

    /// Batch-loads the related rows for `models`, preserving their order.
    async fn hydrate(&self, models: Vec<requests::Model>) -> Result<Vec<Request>> {
        if models.is_empty() {
            return Ok(Vec::new());
        }

        let agent_ids: Vec<String> = models.iter().map(|m| m.agent_id.clone()).collect();
        let template_ids: Vec<String> = models.iter().map(|m| m.template_id.clone()).collect();
        let request_ids: Vec<String> = models.iter().map(|m| m.id.clone()).collect();

        let agents: HashMap<String, users::Model> = users::Entity::find()
            .filter(users::Column::Id.is_in(agent_ids))
            .all(&self.conn)
            .await?
            .into_iter()
            .map(|u| (u.id.clone(), u))
            .collect();

        let templates: HashMap<String, templates::Model> = templates::Entity::find()
            .filter(templates::Column::Id.is_in(template_ids))
            .all(&self.conn)
            .await?
            .into_iter()
            .map(|t| (t.id.clone(), t))
            .collect();

        let mut files: HashMap<String, Vec<RequestFile>> = HashMap::new();
        for file in request_files::Entity::find()
            .filter(request_files::Column::RequestId.is_in(request_ids))
            .order_by_asc(request_files::Column::CreatedAt)
            .all(&self.conn)
            .await?
        {
            files
                .entry(file.request_id.clone())
                .or_default()
                .push(RequestFile::from(file));
        }

        Ok(models
            .into_iter()
            .map(|model| {
                let agent = agents.get(&model.agent_id).cloned().map(AgentSummary::from);
                let template = templates
                    .get(&model.template_id)
                    .cloned()
                    .map(TemplateSummary::from);
                let attached = files.remove(&model.id).unwrap_or_default();

                let mut request = Request::from(model);
                request.agent = agent;
                request.template = template;
                request.files = attached;
                request
            })
            .collect())
    }

    pub async fn update(
        &self,
        request: requests::Model,
        changes: RequestChanges,
    ) -> Result<requests::Model> {
        let mut active: requests::ActiveModel = request.into();

        if let Some(project_title) = changes.project_title {
            active.project_title = Set(project_title);
        }
        if let Some(deadline) = changes.deadline {
            active.deadline = Set(deadline);
        }
        if let Some(platforms) = changes.platforms {
            active.platforms = Set(encode_platforms(&platforms));
        }
        if let Some(dimensions) = changes.dimensions {
            active.dimensions = Set(Some(dimensions).filter(|d| !d.is_empty()));
        }
        if let Some(notes) = changes.notes {
            active.notes = Set(Some(notes).filter(|n| !n.is_empty()));
        }
        active.updated_at = Set(now());

        active
            .update(&self.conn)
            .await
            .context("Failed to update request")
    }

    pub async fn set_status(
        &self,
        request: requests::Model,
        status: RequestStatus,
    ) -> Result<requests::Model> {
        let mut active: requests::ActiveModel = request.into();
        active.status = Set(status.as_str().to_string());
        active.updated_at = Set(now());

        active
            .update(&self.conn)
            .await
            .context("Failed to update request status")
    }

    pub async fn add_file(
        &self,
        request_id: &str,
        file_url: String,
        file_type: String,
    ) -> Result<request_files::Model> {
        request_files::ActiveModel {
            id: Set(new_id()),
            request_id: Set(request_id.to_string()),
            file_url: Set(file_url),
            file_type: Set(file_type),
            created_at: Set(now()),
        }
        .insert(&self.conn)
        .await
        .context("Failed to insert request file")
    }

    pub async fn get_file(&self, id: &str) -> Result<Option<request_files::Model>> {
        request_files::Entity::find_by_id(id.to_string())
            .one(&self.conn)
            .await
            .context("Failed to query request file")
    }

    pub async fn delete_file(&self, id: &str) -> Result<()> {
        request_files::Entity::delete_by_id(id.to_string())
            .exec(&self.conn)
            .await
            .context("Failed to delete request file")?;
        Ok(())
    }

    pub async fn status_counts(&self, agent_id: Option<&str>) -> Result<StatusCounts> {
        let rows: Vec<(String, i64)> = scoped(agent_id)
            .select_only()
            .column(requests::Column::Status)
            .column_as(requests::Column::Id.count(), "count")
            .group_by(requests::Column::Status)
            .into_tuple()
            .all(&self.conn)
            .await
            .context("Failed to count requests by status")?;

        let mut counts = StatusCounts::default();
        for (status, count) in rows {
            counts.record(&status, count);
        }
        Ok(counts)
    }

    pub async fn count_created_since(&self, agent_id: Option<&str>, since: &str) -> Result<u64> {
        Ok(scoped(agent_id)
            .filter(requests::Column::CreatedAt.gte(since))
            .count(&self.conn)
            .await?)
    }

    /// Completed requests created within `[from, until)`.
    pub async fn count_completed_created_between(
        &self,
        agent_id: Option<&str>,
        from: &str,
        until: Option<&str>,
    ) -> Result<u64> {
        let mut window = Condition::all().add(requests::Column::CreatedAt.gte(from));
        if let Some(until) = until {
            window = window.add(requests::Column::CreatedAt.lt(until));
        }

        Ok(scoped(agent_id)
            .filter(requests::Column::Status.eq(RequestStatus::Completed.as_str()))
            .filter(window)
            .count(&self.conn)
            .await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_counts_ignore_unknown_rows() {
        let mut counts = StatusCounts::default();
        counts.record("new", 2);
        counts.record("completed", 3);
        counts.record("archived", 7);

        assert_eq!(counts.new, 2);
        assert_eq!(counts.completed, 3);
        assert_eq!(counts.total(), 5);
    }
}
