use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub general: GeneralConfig,

    pub server: ServerConfig,

    pub auth: AuthConfig,

    pub security: SecurityConfig,

    pub uploads: UploadConfig,

    pub mail: MailConfig,

    pub observability: ObservabilityConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            general: GeneralConfig::default(),
            server: ServerConfig::default(),
            auth: AuthConfig::default(),
            security: SecurityConfig::default(),
            uploads: UploadConfig::default(),
            mail: MailConfig::default(),
            observability: ObservabilityConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    pub database_path: String,

    pub log_level: String,

    /// "pretty" or "json"
    pub log_format: String,

    /// Number of tokio worker threads (default: 2)
    /// Set to 0 to use the number of CPU cores
    pub worker_threads: usize,

    pub max_db_connections: u32,

    pub min_db_connections: u32,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            database_path: "sqlite:data/reqdesk.db".to_string(),
            log_level: "info".to_string(),
            log_format: "pretty".to_string(),
            worker_threads: 2,
            max_db_connections: 5,
            min_db_connections: 1,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub port: u16,

    pub cors_allowed_origins: Vec<String>,

    /// Public origin of this API, used to build links to locally stored uploads.
    pub public_base_url: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 4000,
            cors_allowed_origins: vec!["*".to_string()],
            public_base_url: "http://localhost:4000".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    #[serde(skip_serializing)]
    pub access_secret: String,

    #[serde(skip_serializing)]
    pub refresh_secret: String,

    pub access_ttl_hours: i64,

    pub refresh_ttl_days: i64,

    pub reset_token_ttl_minutes: i64,

    /// Return the raw password-reset token in the forgot-password response.
    /// Development only.
    pub expose_reset_token: bool,

    /// Created at startup when no user with this email exists.
    pub bootstrap_admin_email: Option<String>,

    #[serde(skip_serializing)]
    pub bootstrap_admin_password: Option<String>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            access_secret: "change-me-access".to_string(),
            refresh_secret: "change-me-refresh".to_string(),
            access_ttl_hours: 12,
            refresh_ttl_days: 7,
            reset_token_ttl_minutes: 30,
            expose_reset_token: false,
            bootstrap_admin_email: None,
            bootstrap_admin_password: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Argon2 memory cost in KiB
    pub argon2_memory_cost_kib: u32,

    pub argon2_time_cost: u32,

    pub argon2_parallelism: u32,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            argon2_memory_cost_kib: 19 * 1024,
            argon2_time_cost: 2,
            argon2_parallelism: 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UploadBackend {
    Local,
    Object,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UploadConfig {
    pub backend: UploadBackend,

    /// Root directory for the local-disk sink, served under `/uploads`.
    pub local_dir: String,

    pub object_endpoint: String,

    pub object_bucket: String,

    #[serde(skip_serializing)]
    pub object_token: Option<String>,

    /// Public prefix of stored objects. Defaults to `<endpoint>/<bucket>`.
    pub object_public_url: Option<String>,

    pub preview_max_bytes: usize,

    pub attachment_max_bytes: usize,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            backend: UploadBackend::Local,
            local_dir: "uploads".to_string(),
            object_endpoint: String::new(),
            object_bucket: "reqdesk".to_string(),
            object_token: None,
            object_public_url: None,
            preview_max_bytes: 5 * 1024 * 1024,
            attachment_max_bytes: 20 * 1024 * 1024,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MailConfig {
    /// When disabled, rendered emails are only logged.
    pub enabled: bool,

    pub api_url: String,

    #[serde(skip_serializing)]
    pub api_key: Option<String>,

    pub from_email: String,

    pub from_name: String,

    /// Fixed recipient for new-request and completion notices.
    pub admin_email: String,

    /// Frontend origin used for the buttons in emails.
    pub dashboard_url: String,

    pub queue_size: usize,

    pub request_timeout_seconds: u64,
}

impl Default for MailConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            api_url: "https://api.sendgrid.com/v3/mail/send".to_string(),
            api_key: None,
            from_email: "no-reply@example.com".to_string(),
            from_name: "One West Group".to_string(),
            admin_email: "admin@account.com".to_string(),
            dashboard_url: "http://localhost:3000".to_string(),
            queue_size: 256,
            request_timeout_seconds: 15,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    pub metrics_enabled: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            metrics_enabled: true,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let mut config = Self::load_file()?;
        config.apply_env();
        Ok(config)
    }

    fn load_file() -> Result<Self> {
        for path in &Self::config_paths() {
            if path.exists() {
                info!("Loading config from: {}", path.display());
                return Self::load_from_path(path);
            }
        }

        info!("No config file found, using defaults");
        Ok(Self::default())
    }

    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Secrets and deployment knobs may come from the environment (or `.env`).
    fn apply_env(&mut self) {
        if let Ok(url) = std::env::var("DATABASE_URL") {
            self.general.database_path = url;
        }
        if let Ok(secret) = std::env::var("JWT_ACCESS_SECRET") {
            self.auth.access_secret = secret;
        }
        if let Ok(secret) = std::env::var("JWT_REFRESH_SECRET") {
            self.auth.refresh_secret = secret;
        }
        if let Ok(key) = std::env::var("MAIL_API_KEY") {
            self.mail.api_key = Some(key);
        }
        if let Ok(token) = std::env::var("OBJECT_STORAGE_TOKEN") {
            self.uploads.object_token = Some(token);
        }
        if let Some(port) = std::env::var("PORT").ok().and_then(|p| p.parse().ok()) {
            self.server.port = port;
        }
    }

    pub fn save_to_path(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        info!("Config saved to: {}", path.display());
        Ok(())
    }

    fn config_paths() -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from("config.toml")];

        if let Some(config_dir) = dirs::config_dir() {
            paths.push(config_dir.join("reqdesk").join("config.toml"));
        }

        if let Some(home) = dirs::home_dir() {
            paths.push(home.join(".reqdesk").join("config.toml"));
        }

        paths
    }

    fn default_config_path() -> PathBuf {
        PathBuf::from("config.toml")
    }

    pub fn create_default_if_missing() -> Result<bool> {
        let path = Self::default_config_path();
        if path.exists() {
            Ok(false)
        } else {
            Self::default().save_to_path(&path)?;
            info!("Created default config file: {}", path.display());
            Ok(true)
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.auth.access_secret.is_empty() || self.auth.refresh_secret.is_empty() {
            anyhow::bail!("JWT access and refresh secrets must be set");
        }

        if self.auth.access_secret == self.auth.refresh_secret {
            anyhow::bail!("JWT access and refresh secrets must differ");
        }

        if self.auth.access_ttl_hours <= 0 || self.auth.refresh_ttl_days <= 0 {
            anyhow::bail!("Token lifetimes must be positive");
        }

        if self.uploads.backend == UploadBackend::Object {
            if self.uploads.object_endpoint.is_empty() {
                anyhow::bail!("uploads.object_endpoint is required for the object backend");
            }
            url::Url::parse(&self.uploads.object_endpoint)
                .context("uploads.object_endpoint is not a valid URL")?;
        }

        url::Url::parse(&self.server.public_base_url)
            .context("server.public_base_url is not a valid URL")?;

        if self.mail.enabled && self.mail.api_key.as_deref().unwrap_or_default().is_empty() {
            anyhow::bail!("mail.api_key is required when mail is enabled");
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.auth.access_ttl_hours, 12);
        assert_eq!(config.auth.refresh_ttl_days, 7);
        assert_eq!(config.uploads.preview_max_bytes, 5 * 1024 * 1024);
        assert_eq!(config.uploads.attachment_max_bytes, 20 * 1024 * 1024);
        assert_eq!(config.uploads.backend, UploadBackend::Local);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_serialization_hides_secrets() {
        let config = Config::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        assert!(toml_str.contains("[general]"));
        assert!(toml_str.contains("[uploads]"));
        assert!(!toml_str.contains("change-me-access"));
    }

    #[test]
    fn test_config_deserialization() {
        let toml_str = r#"
            [general]
            log_level = "debug"

            [uploads]
            backend = "object"
            object_endpoint = "https://storage.example.com"
        "#;

        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.general.log_level, "debug");
        assert_eq!(config.uploads.backend, UploadBackend::Object);
        assert_eq!(config.mail.admin_email, "admin@account.com");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_shared_secrets() {
        let mut config = Config::default();
        config.auth.refresh_secret = config.auth.access_secret.clone();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_requires_object_endpoint() {
        let mut config = Config::default();
        config.uploads.backend = UploadBackend::Object;
        assert!(config.validate().is_err());
    }
}
