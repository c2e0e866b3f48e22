//! Where uploaded bytes go.
//!
//! Handlers only see [`UploadSink`]; which implementation backs it is chosen
//! once at boot from `uploads.backend`.

use async_trait::async_trait;
use axum::body::Bytes;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::info;

use crate::config::{UploadBackend, UploadConfig};

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("File is empty")]
    Empty,

    #[error("File exceeds the {limit} byte limit")]
    TooLarge { limit: usize },

    #[error("Only image files are allowed (got {0})")]
    UnsupportedType(String),

    #[error("Failed to write upload: {0}")]
    Io(#[from] std::io::Error),

    #[error("Object storage request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Object storage rejected upload: status={0}")]
    Rejected(u16),
}

#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Bytes,
}

impl UploadedFile {
    /// Content type as sent, or guessed from the file name.
    #[must_use]
    pub fn effective_content_type(&self) -> String {
        if self.content_type.is_empty() || self.content_type == "application/octet-stream" {
            mime_guess::from_path(&self.file_name)
                .first_or_octet_stream()
                .to_string()
        } else {
            self.content_type.clone()
        }
    }

    /// File name without directory or extension.
    #[must_use]
    pub fn base_name(&self) -> String {
        let name = self
            .file_name
            .rsplit(['/', '\\'])
            .next()
            .unwrap_or(&self.file_name);
        match name.rsplit_once('.') {
            Some((stem, _)) if !stem.is_empty() => stem.to_string(),
            _ => name.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct UploadPolicy {
    pub max_bytes: usize,
    pub images_only: bool,
}

impl UploadPolicy {
    #[must_use]
    pub const fn preview(config: &UploadConfig) -> Self {
        Self {
            max_bytes: config.preview_max_bytes,
            images_only: true,
        }
    }

    #[must_use]
    pub const fn attachment(config: &UploadConfig) -> Self {
        Self {
            max_bytes: config.attachment_max_bytes,
            images_only: false,
        }
    }
}

/// Keeps ASCII alphanumerics, `.`, `-` and `_`.
#[must_use]
pub fn sanitize_file_name(name: &str) -> String {
    let name = name.rsplit(['/', '\\']).next().unwrap_or(name);
    let cleaned: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .take(100)
        .collect();

    let cleaned = cleaned.trim_matches('.').to_string();
    if cleaned.is_empty() {
        "file".to_string()
    } else {
        cleaned
    }
}

/// `<namespace>/<uuid>-<sanitized name>`
#[must_use]
pub fn object_key(namespace: &str, file_name: &str) -> String {
    format!(
        "{}/{}-{}",
        namespace.trim_matches('/'),
        uuid::Uuid::new_v4(),
        sanitize_file_name(file_name)
    )
}

#[async_trait]
pub trait UploadSink: Send + Sync {
    fn validate(&self, file: &UploadedFile, policy: &UploadPolicy) -> Result<(), UploadError> {
        if file.bytes.is_empty() {
            return Err(UploadError::Empty);
        }
        if file.bytes.len() > policy.max_bytes {
            return Err(UploadError::TooLarge {
                limit: policy.max_bytes,
            });
        }
        if policy.images_only {
            let content_type = file.effective_content_type();
            if !content_type.starts_with("image/") {
                return Err(UploadError::UnsupportedType(content_type));
            }
        }
        Ok(())
    }

    /// Persists the bytes and returns their public location.
    async fn store(&self, namespace: &str, file: &UploadedFile) -> Result<String, UploadError>;
}

/// Writes under `root/<namespace>/`; files are served at `/uploads`.
pub struct LocalDiskSink {
    root: PathBuf,
    public_base_url: String,
}

impl LocalDiskSink {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>, public_base_url: &str) -> Self {
        Self {
            root: root.into(),
            public_base_url: public_base_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl UploadSink for LocalDiskSink {
    async fn store(&self, namespace: &str, file: &UploadedFile) -> Result<String, UploadError> {
        let key = object_key(namespace, &file.file_name);
        let path = self.root.join(&key);

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, &file.bytes).await?;

        info!(path = %path.display(), bytes = file.bytes.len(), "Stored upload");
        Ok(format!("{}/uploads/{key}", self.public_base_url))
    }
}

/// HTTP `PUT <endpoint>/<bucket>/<key>` with an optional bearer token.
pub struct ObjectStorageSink {
    http: reqwest::Client,
    endpoint: String,
    bucket: String,
    token: Option<String>,
    public_url: String,
}

impl ObjectStorageSink {
    pub fn new(config: &UploadConfig) -> Result<Self, UploadError> {
        let endpoint = config.object_endpoint.trim_end_matches('/').to_string();
        let public_url = config
            .object_public_url
            .clone()
            .unwrap_or_else(|| format!("{endpoint}/{}", config.object_bucket));

        Ok(Self {
            http: reqwest::Client::builder()
                .timeout(Duration::from_secs(60))
                .build()?,
            endpoint,
            bucket: config.object_bucket.clone(),
            token: config.object_token.clone(),
            public_url: public_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl UploadSink for ObjectStorageSink {
    async fn store(&self, namespace: &str, file: &UploadedFile) -> Result<String, UploadError> {
        let key = object_key(namespace, &file.file_name);
        let url = format!("{}/{}/{key}", self.endpoint, self.bucket);

        let mut request = self
            .http
            .put(&url)
            .header(reqwest::header::CONTENT_TYPE, file.effective_content_type())
            .body(file.bytes.clone());
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        if !response.status().is_success() {
            return Err(UploadError::Rejected(response.status().as_u16()));
        }

        info!(key = %key, bytes = file.bytes.len(), "Stored upload in object storage");
        Ok(format!("{}/{key}", self.public_url))
    }
}

pub fn build_sink(config: &UploadConfig, public_base_url: &str) -> Result<Arc<dyn UploadSink>, UploadError> {
    Ok(match config.backend {
        UploadBackend::Local => Arc::new(LocalDiskSink::new(&config.local_dir, public_base_url)),
        UploadBackend::Object => Arc::new(ObjectStorageSink::new(config)?),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file(name: &str, content_type: &str, len: usize) -> UploadedFile {
        UploadedFile {
            file_name: name.to_string(),
            content_type: content_type.to_string(),
            bytes: Bytes::from(vec![7u8; len]),
        }
    }

    #[test]
    fn test_sanitize_file_name() {
        assert_eq!(sanitize_file_name("My Flyer (v2).png"), "My_Flyer__v2_.png");
        assert_eq!(sanitize_file_name("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_file_name("C:\\temp\\a.pdf"), "a.pdf");
        assert_eq!(sanitize_file_name(".."), "file");
        assert_eq!(sanitize_file_name(""), "file");
    }

    #[test]
    fn test_object_key_layout() {
        let key = object_key("templates", "a b.png");
        assert!(key.starts_with("templates/"));
        assert!(key.ends_with("-a_b.png"));
    }

    #[test]
    fn test_base_name() {
        assert_eq!(file("Open House.png", "", 1).base_name(), "Open House");
        assert_eq!(file("dir/flyer.tar.gz", "", 1).base_name(), "flyer.tar");
        assert_eq!(file("README", "", 1).base_name(), "README");
    }

    #[test]
    fn test_preview_policy() {
        let config = UploadConfig::default();
        let sink = LocalDiskSink::new("unused", "http://localhost");
        let policy = UploadPolicy::preview(&config);

        assert!(sink.validate(&file("a.png", "image/png", 10), &policy).is_ok());
        // type guessed from the extension
        assert!(sink.validate(&file("a.jpg", "", 10), &policy).is_ok());
        assert!(matches!(
            sink.validate(&file("a.pdf", "application/pdf", 10), &policy),
            Err(UploadError::UnsupportedType(_))
        ));
        assert!(matches!(
            sink.validate(&file("a.png", "image/png", config.preview_max_bytes + 1), &policy),
            Err(UploadError::TooLarge { .. })
        ));
        assert!(matches!(
            sink.validate(&file("a.png", "image/png", 0), &policy),
            Err(UploadError::Empty)
        ));
    }

    #[test]
    fn test_attachment_policy_accepts_any_type() {
        let config = UploadConfig::default();
        let sink = LocalDiskSink::new("unused", "http://localhost");
        let policy = UploadPolicy::attachment(&config);

        assert!(sink.validate(&file("brief.pdf", "application/pdf", 1024), &policy).is_ok());
    }

    #[tokio::test]
    async fn test_local_sink_writes_file() {
        let root = std::env::temp_dir().join(format!("reqdesk-test-{}", uuid::Uuid::new_v4()));
        let sink = LocalDiskSink::new(&root, "http://localhost:4000/");

        let location = sink
            .store("requests", &file("brief.pdf", "application/pdf", 3))
            .await
            .unwrap();

        assert!(location.starts_with("http://localhost:4000/uploads/requests/"));
        let key = location.trim_start_matches("http://localhost:4000/uploads/");
        let written = tokio::fs::read(root.join(key)).await.unwrap();
        assert_eq!(written, vec![7u8; 3]);

        tokio::fs::remove_dir_all(&root).await.ok();
    }

    #[test]
    fn test_object_sink_public_url_defaults_to_bucket() {
        let config = UploadConfig {
            backend: UploadBackend::Object,
            object_endpoint: "https://storage.example.com/".to_string(),
            ..UploadConfig::default()
        };
        let sink = ObjectStorageSink::new(&config).unwrap();
        assert_eq!(sink.public_url, "https://storage.example.com/reqdesk");
    }
}
