use anyhow::{Context, Result};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect, Set, TransactionTrait,
};
use std::collections::HashSet;

use crate::db::{new_id, now};
use crate::entities::{requests, templates};
use crate::models::TemplateType;

#[derive(Debug, Clone)]
pub struct NewTemplate {
    pub title: String,
    pub category: String,
    pub template_type: TemplateType,
    pub canva_url: Option<String>,
    pub preview_url: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct TemplateChanges {
    pub title: Option<String>,
    pub category: Option<String>,
    pub template_type: Option<TemplateType>,
    pub canva_url: Option<String>,
    pub preview_url: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct TemplateFilter {
    pub category: Option<String>,
    pub template_type: Option<TemplateType>,
}

pub struct TemplateRepository {
    conn: DatabaseConnection,
}

fn active_model(template: NewTemplate) -> templates::ActiveModel {
    let timestamp = now();
    templates::ActiveModel {
        id: Set(new_id()),
        title: Set(template.title),
        category: Set(template.category),
        template_type: Set(template.template_type.as_str().to_string()),
        canva_url: Set(template.canva_url),
        preview_url: Set(template.preview_url),
        created_at: Set(timestamp.clone()),
        updated_at: Set(timestamp),
    }
}

impl TemplateRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    /// Newest first.
    pub async fn list(&self, filter: &TemplateFilter) -> Result<Vec<templates::Model>> {
        let mut query = templates::Entity::find();

        if let Some(category) = &filter.category {
            query = query.filter(templates::Column::Category.eq(category.as_str()));
        }
        if let Some(template_type) = filter.template_type {
            query = query.filter(templates::Column::TemplateType.eq(template_type.as_str()));
        }

        query
            .order_by_desc(templates::Column::CreatedAt)
            .all(&self.conn)
            .await
            .context("Failed to list templates")
    }

    pub async fn get(&self, id: &str) -> Result<Option<templates::Model>> {
        templates::Entity::find_by_id(id.to_string())
            .one(&self.conn)
            .await
            .context("Failed to query template")
    }

    pub async fn create(&self, template: NewTemplate) -> Result<templates::Model> {
        active_model(template)
            .insert(&self.conn)
            .await
            .context("Failed to insert template")
    }

    /// Inserts all rows or none.
    pub async fn create_many(&self, batch: Vec<NewTemplate>) -> Result<Vec<templates::Model>> {
        let txn = self.conn.begin().await?;

        let mut created = Vec::with_capacity(batch.len());
        for template in batch {
            created.push(active_model(template).insert(&txn).await?);
        }

        txn.commit().await.context("Failed to commit template batch")?;
        Ok(created)
    }

    /// Titles among `titles` that already exist for this category and type.
    pub async fn existing_titles(
        &self,
        category: &str,
        template_type: TemplateType,
        titles: &[String],
    ) -> Result<HashSet<String>> {
        if titles.is_empty() {
            return Ok(HashSet::new());
        }

        let found: Vec<String> = templates::Entity::find()
            .select_only()
            .column(templates::Column::Title)
            .filter(templates::Column::Category.eq(category))
            .filter(templates::Column::TemplateType.eq(template_type.as_str()))
            .filter(templates::Column::Title.is_in(titles.iter().cloned()))
            .into_tuple()
            .all(&self.conn)
            .await
            .context("Failed to query existing template titles")?;

        Ok(found.into_iter().collect())
    }

    pub async fn update(
        &self,
        template: templates::Model,
        changes: TemplateChanges,
    ) -> Result<templates::Model> {
        let mut active: templates::ActiveModel = template.into();

        if let Some(title) = changes.title {
            active.title = Set(title);
        }
        if let Some(category) = changes.category {
            active.category = Set(category);
        }
        if let Some(template_type) = changes.template_type {
            active.template_type = Set(template_type.as_str().to_string());
        }
        if let Some(canva_url) = changes.canva_url {
            active.canva_url = Set(Some(canva_url).filter(|u| !u.is_empty()));
        }
        if let Some(preview_url) = changes.preview_url {
            active.preview_url = Set(Some(preview_url).filter(|u| !u.is_empty()));
        }
        active.updated_at = Set(now());

        active
            .update(&self.conn)
            .await
            .context("Failed to update template")
    }

    pub async fn delete(&self, id: &str) -> Result<bool> {
        let result = templates::Entity::delete_by_id(id.to_string())
            .exec(&self.conn)
            .await
            .context("Failed to delete template")?;
        Ok(result.rows_affected > 0)
    }

    /// Distinct, sorted ascending.
    pub async fn categories(&self, template_type: Option<TemplateType>) -> Result<Vec<String>> {
        let mut query = templates::Entity::find()
            .select_only()
            .column(templates::Column::Category)
            .distinct();

        if let Some(template_type) = template_type {
            query = query.filter(templates::Column::TemplateType.eq(template_type.as_str()));
        }

        query
            .order_by_asc(templates::Column::Category)
            .into_tuple()
            .all(&self.conn)
            .await
            .context("Failed to list template categories")
    }

    /// Number of requests referencing the template.
    pub async fn usage_count(&self, id: &str) -> Result<u64> {
        Ok(requests::Entity::find()
            .filter(requests::Column::TemplateId.eq(id))
            .count(&self.conn)
            .await?)
    }
}
