//! `SeaORM` implementation of the `TemplateService` trait.

use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::info;

use crate::config::UploadConfig;
use crate::db::{NewTemplate, Store, TemplateFilter};
use crate::models::{Template, TemplateType};
use crate::services::template_service::{
    BulkOutcome, BulkTemplates, CreateTemplate, TemplateError, TemplateService, UpdateTemplate,
    bulk_title,
};
use crate::services::uploads::{UploadPolicy, UploadSink, UploadedFile};

const PREVIEW_NAMESPACE: &str = "templates";

pub struct SeaOrmTemplateService {
    store: Store,
    uploads: Arc<dyn UploadSink>,
    upload_config: UploadConfig,
}

impl SeaOrmTemplateService {
    #[must_use]
    pub fn new(store: Store, uploads: Arc<dyn UploadSink>, upload_config: UploadConfig) -> Self {
        Self {
            store,
            uploads,
            upload_config,
        }
    }

    fn preview_policy(&self) -> UploadPolicy {
        UploadPolicy::preview(&self.upload_config)
    }

    async fn store_preview(&self, file: &UploadedFile) -> Result<String, TemplateError> {
        self.uploads.validate(file, &self.preview_policy())?;
        Ok(self.uploads.store(PREVIEW_NAMESPACE, file).await?)
    }
}

fn required(value: &str, message: &str) -> Result<String, TemplateError> {
    let value = value.trim();
    if value.is_empty() {
        Err(TemplateError::Validation(message.to_string()))
    } else {
        Ok(value.to_string())
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

#[async_trait]
impl TemplateService for SeaOrmTemplateService {
    async fn list(&self, filter: TemplateFilter) -> Result<Vec<Template>, TemplateError> {
        let models = self.store.templates().list(&filter).await?;
        Ok(models.into_iter().map(Template::from).collect())
    }

    async fn get(&self, id: &str) -> Result<Template, TemplateError> {
        self.store
            .templates()
            .get(id)
            .await?
            .map(Template::from)
            .ok_or(TemplateError::NotFound)
    }

    async fn create(&self, input: CreateTemplate) -> Result<Template, TemplateError> {
        const MISSING: &str = "Title, category, and type are required";
        let title = required(&input.title, MISSING)?;
        let category = required(&input.category, MISSING)?;

        let preview_url = match &input.preview {
            Some(file) => Some(self.store_preview(file).await?),
            None => non_empty(input.preview_url),
        };

        let model = self
            .store
            .templates()
            .create(NewTemplate {
                title,
                category,
                template_type: input.template_type,
                canva_url: non_empty(input.canva_url),
                preview_url,
            })
            .await?;

        info!(template_id = %model.id, title = %model.title, "Template created");
        Ok(Template::from(model))
    }

    async fn update(&self, id: &str, input: UpdateTemplate) -> Result<Template, TemplateError> {
        let templates = self.store.templates();
        let existing = templates.get(id).await?.ok_or(TemplateError::NotFound)?;

        let mut changes = input.changes;
        if let Some(title) = &changes.title {
            changes.title = Some(required(title, "Title cannot be empty")?);
        }
        if let Some(category) = &changes.category {
            changes.category = Some(required(category, "Category cannot be empty")?);
        }
        if let Some(file) = &input.preview {
            changes.preview_url = Some(self.store_preview(file).await?);
        }

        let model = templates.update(existing, changes).await?;
        Ok(Template::from(model))
    }

    async fn delete(&self, id: &str) -> Result<(), TemplateError> {
        let templates = self.store.templates();
        if templates.get(id).await?.is_none() {
            return Err(TemplateError::NotFound);
        }

        let in_use = templates.usage_count(id).await?;
        if in_use > 0 {
            return Err(TemplateError::InUse(in_use));
        }

        templates.delete(id).await?;
        info!(template_id = id, "Template deleted");
        Ok(())
    }

    async fn categories(
        &self,
        template_type: Option<TemplateType>,
    ) -> Result<Vec<String>, TemplateError> {
        Ok(self.store.templates().categories(template_type).await?)
    }

    async fn bulk_create(&self, input: BulkTemplates) -> Result<BulkOutcome, TemplateError> {
        let category = required(&input.category, "Category and type are required")?;
        if input.previews.is_empty() {
            return Err(TemplateError::Validation(
                "At least one preview image is required".to_string(),
            ));
        }

        let policy = self.preview_policy();
        for file in &input.previews {
            self.uploads.validate(file, &policy)?;
        }

        let titled: Vec<(String, &UploadedFile)> = input
            .previews
            .iter()
            .enumerate()
            .map(|(i, file)| (bulk_title(input.title_prefix.as_deref(), i, file), file))
            .collect();

        let templates = self.store.templates();
        let titles: Vec<String> = titled.iter().map(|(t, _)| t.clone()).collect();
        let mut taken: HashSet<String> = templates
            .existing_titles(&category, input.template_type, &titles)
            .await?;

        let canva_url = non_empty(input.canva_url);
        let mut batch = Vec::new();
        let mut skipped = Vec::new();

        for (title, file) in titled {
            if !taken.insert(title.clone()) {
                skipped.push(title);
                continue;
            }

            batch.push(NewTemplate {
                preview_url: Some(self.uploads.store(PREVIEW_NAMESPACE, file).await?),
                title,
                category: category.clone(),
                template_type: input.template_type,
                canva_url: canva_url.clone(),
            });
        }

        let created = templates.create_many(batch).await?;
        info!(
            created = created.len(),
            skipped = skipped.len(),
            category = %category,
            "Bulk template upload finished"
        );

        Ok(BulkOutcome {
            created: created.into_iter().map(Template::from).collect(),
            skipped,
        })
    }
}
