//! `SeaORM` implementation of the `RequestService` trait.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::{info, warn};

use crate::config::UploadConfig;
use crate::db::{NewRequest, RequestChanges, StatusCounts, Store};
use crate::entities::requests;
use crate::models::request::{
    FILE_TYPE_AGENT_UPLOAD, FILE_TYPE_VA_COMPLETED, parse_deadline, status_transition_allowed,
};
use crate::models::{CurrentUser, Request, RequestFile, RequestStatus, Role};
use crate::services::notifications::{NotificationDispatcher, NotificationEvent};
use crate::services::request_service::{
    AttachFile, CreateRequest, RequestError, RequestService, UpdateRequest, clean_platforms,
};
use crate::services::uploads::{UploadPolicy, UploadSink};

const ATTACHMENT_NAMESPACE: &str = "requests";

pub struct SeaOrmRequestService {
    store: Store,
    uploads: Arc<dyn UploadSink>,
    upload_config: UploadConfig,
    notifications: NotificationDispatcher,
}

impl SeaOrmRequestService {
    #[must_use]
    pub fn new(
        store: Store,
        uploads: Arc<dyn UploadSink>,
        upload_config: UploadConfig,
        notifications: NotificationDispatcher,
    ) -> Self {
        Self {
            store,
            uploads,
            upload_config,
            notifications,
        }
    }

    /// Loads the row and checks the caller may touch it.
    async fn load_for(
        &self,
        actor: &CurrentUser,
        id: &str,
    ) -> Result<requests::Model, RequestError> {
        let request = self
            .store
            .requests()
            .get(id)
            .await?
            .ok_or(RequestError::NotFound)?;

        if actor.role.is_staff() || actor.is(&request.agent_id) {
            Ok(request)
        } else {
            Err(RequestError::Forbidden)
        }
    }

    async fn detailed(&self, id: &str) -> Result<Request, RequestError> {
        self.store
            .requests()
            .get_detailed(id)
            .await?
            .ok_or(RequestError::NotFound)
    }

    async fn notify_completed(&self, request: &requests::Model) {
        match self.store.users().get_by_id(&request.agent_id).await {
            Ok(Some(agent)) => self.notifications.dispatch(NotificationEvent::RequestCompleted {
                agent_name: agent.name,
                agent_email: agent.email,
                request_title: request.project_title.clone(),
            }),
            Ok(None) => warn!(request_id = %request.id, "Owning agent missing, completion email skipped"),
            Err(e) => warn!(request_id = %request.id, error = %e, "Failed to load agent for completion email"),
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn deadline_or_invalid(raw: &str) -> Result<String, RequestError> {
    parse_deadline(raw).ok_or_else(|| RequestError::Validation("Invalid deadline format".to_string()))
}

#[async_trait]
impl RequestService for SeaOrmRequestService {
    async fn list(
        &self,
        actor: &CurrentUser,
        status: Option<RequestStatus>,
    ) -> Result<Vec<Request>, RequestError> {
        let scope = (actor.role == Role::Agent).then_some(actor.id.as_str());
        Ok(self.store.requests().list(scope, status).await?)
    }

    async fn get(&self, actor: &CurrentUser, id: &str) -> Result<Request, RequestError> {
        let request = self.detailed(id).await?;
        if actor.role.is_staff() || actor.is(&request.agent_id) {
            Ok(request)
        } else {
            Err(RequestError::Forbidden)
        }
    }

    async fn create(
        &self,
        actor: &CurrentUser,
        input: CreateRequest,
    ) -> Result<Request, RequestError> {
        let template_id = input.template_id.trim().to_string();
        let project_title = input.project_title.trim().to_string();
        if template_id.is_empty() || project_title.is_empty() {
            return Err(RequestError::Validation(
                "Template ID and project title are required".to_string(),
            ));
        }
        if input.deadline.trim().is_empty() {
            return Err(RequestError::Validation("Deadline is required".to_string()));
        }
        let platforms = clean_platforms(input.platforms);
        if platforms.is_empty() {
            return Err(RequestError::Validation(
                "At least one platform is required".to_string(),
            ));
        }

        if self.store.templates().get(&template_id).await?.is_none() {
            return Err(RequestError::TemplateNotFound);
        }
        let deadline = deadline_or_invalid(&input.deadline)?;

        let policy = UploadPolicy::attachment(&self.upload_config);
        for file in &input.uploads {
            self.uploads.validate(file, &policy)?;
        }

        let mut files: Vec<(String, String)> = input
            .file_urls
            .into_iter()
            .filter_map(|url| non_empty(Some(url)))
            .map(|url| (url, FILE_TYPE_AGENT_UPLOAD.to_string()))
            .collect();
        for file in &input.uploads {
            let location = self.uploads.store(ATTACHMENT_NAMESPACE, file).await?;
            files.push((location, FILE_TYPE_AGENT_UPLOAD.to_string()));
        }

        let model = self
            .store
            .requests()
            .create(
                NewRequest {
                    agent_id: actor.id.clone(),
                    template_id,
                    project_title,
                    deadline,
                    platforms,
                    dimensions: non_empty(input.dimensions),
                    notes: non_empty(input.notes),
                },
                files,
            )
            .await?;

        info!(request_id = %model.id, agent_id = %actor.id, "Request submitted");
        metrics::counter!("reqdesk_requests_created_total").increment(1);

        let request = self.detailed(&model.id).await?;
        self.notifications.dispatch(NotificationEvent::NewRequest {
            agent_name: request
                .agent
                .as_ref()
                .map_or_else(|| actor.email.clone(), |a| a.name.clone()),
            request_title: request.project_title.clone(),
        });

        Ok(request)
    }

    async fn update(
        &self,
        actor: &CurrentUser,
        id: &str,
        input: UpdateRequest,
    ) -> Result<Request, RequestError> {
        let existing = self.load_for(actor, id).await?;

        let project_title = match input.project_title {
            Some(title) if title.trim().is_empty() => {
                return Err(RequestError::Validation(
                    "Project title cannot be empty".to_string(),
                ));
            }
            other => other.map(|t| t.trim().to_string()),
        };
        let deadline = input
            .deadline
            .as_deref()
            .map(deadline_or_invalid)
            .transpose()?;
        let platforms = match input.platforms.map(clean_platforms) {
            Some(platforms) if platforms.is_empty() => {
                return Err(RequestError::Validation(
                    "At least one platform is required".to_string(),
                ));
            }
            other => other,
        };

        self.store
            .requests()
            .update(
                existing,
                RequestChanges {
                    project_title,
                    deadline,
                    platforms,
                    dimensions: input.dimensions.map(|d| d.trim().to_string()),
                    notes: input.notes.map(|n| n.trim().to_string()),
                },
            )
            .await?;

        self.detailed(id).await
    }

    async fn update_status(
        &self,
        actor: &CurrentUser,
        id: &str,
        status: RequestStatus,
    ) -> Result<Request, RequestError> {
        let existing = self.load_for(actor, id).await?;
        let from = existing
            .status
            .parse::<RequestStatus>()
            .unwrap_or(RequestStatus::New);

        if !status_transition_allowed(from, status) {
            return Err(RequestError::TransitionNotAllowed { from, to: status });
        }

        let updated = self.store.requests().set_status(existing, status).await?;
        info!(request_id = id, from = %from, to = %status, actor = %actor.id, "Request status updated");

        if status == RequestStatus::Completed {
            self.notify_completed(&updated).await;
        }

        self.detailed(id).await
    }

    async fn attach_file(
        &self,
        actor: &CurrentUser,
        id: &str,
        input: AttachFile,
    ) -> Result<RequestFile, RequestError> {
        self.load_for(actor, id).await?;

        let file_url = match (&input.upload, non_empty(input.file_url)) {
            (Some(file), _) => {
                self.uploads
                    .validate(file, &UploadPolicy::attachment(&self.upload_config))?;
                self.uploads.store(ATTACHMENT_NAMESPACE, file).await?
            }
            (None, Some(url)) => url,
            (None, None) => {
                return Err(RequestError::Validation("File URL is required".to_string()));
            }
        };
        let file_type =
            non_empty(input.file_type).unwrap_or_else(|| FILE_TYPE_VA_COMPLETED.to_string());

        let file = self
            .store
            .requests()
            .add_file(id, file_url, file_type)
            .await?;

        info!(request_id = id, file_id = %file.id, file_type = %file.file_type, "File attached");
        Ok(RequestFile::from(file))
    }

    async fn delete_file(
        &self,
        actor: &CurrentUser,
        id: &str,
        file_id: &str,
    ) -> Result<(), RequestError> {
        self.load_for(actor, id).await?;

        let requests = self.store.requests();
        let file = requests
            .get_file(file_id)
            .await?
            .ok_or(RequestError::FileNotFound)?;
        if file.request_id != id {
            return Err(RequestError::FileMismatch);
        }

        requests.delete_file(file_id).await?;
        info!(request_id = id, file_id, "File deleted");
        Ok(())
    }

    async fn stats(&self, actor: &CurrentUser) -> Result<StatusCounts, RequestError> {
        let scope = (actor.role == Role::Agent).then_some(actor.id.as_str());
        Ok(self.store.requests().status_counts(scope).await?)
    }
}
