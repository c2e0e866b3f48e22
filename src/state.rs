use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::config::Config;
use crate::db::Store;
use crate::services::{
    AuthService, HttpMailer, LogMailer, Mailer, NotificationDispatcher, RequestService,
    SeaOrmAuthService, SeaOrmRequestService, SeaOrmStatsService, SeaOrmTemplateService,
    SeaOrmUserAdminService, StatsService, TemplateService, TokenService, UploadSink,
    UserAdminService, build_sink,
};

/// Picks the HTTP mail transport when mail is enabled and configured,
/// otherwise logs messages instead of sending them.
#[must_use]
pub fn default_mailer(config: &Config) -> Arc<dyn Mailer> {
    if !config.mail.enabled {
        return Arc::new(LogMailer);
    }

    match HttpMailer::new(&config.mail) {
        Ok(mailer) => Arc::new(mailer),
        Err(e) => {
            warn!(error = %e, "Mail transport unavailable, falling back to log-only delivery");
            Arc::new(LogMailer)
        }
    }
}

/// Everything the HTTP layer needs, built once at boot.
#[derive(Clone)]
pub struct SharedState {
    pub config: Arc<Config>,

    pub store: Store,

    pub tokens: Arc<TokenService>,

    pub notifications: NotificationDispatcher,

    pub uploads: Arc<dyn UploadSink>,

    pub auth_service: Arc<dyn AuthService>,

    pub template_service: Arc<dyn TemplateService>,

    pub request_service: Arc<dyn RequestService>,

    pub user_admin_service: Arc<dyn UserAdminService>,

    pub stats_service: Arc<dyn StatsService>,
}

impl SharedState {
    /// Opens the database and wires every service. The returned handle is
    /// the notification worker; it finishes once the state is dropped.
    pub async fn new(config: Config) -> anyhow::Result<(Self, JoinHandle<()>)> {
        let mailer = default_mailer(&config);
        Self::with_mailer(config, mailer).await
    }

    pub async fn with_mailer(
        config: Config,
        mailer: Arc<dyn Mailer>,
    ) -> anyhow::Result<(Self, JoinHandle<()>)> {
        let store = Store::with_pool_options(
            &config.general.database_path,
            config.general.max_db_connections,
            config.general.min_db_connections,
        )
        .await?;

        let tokens = Arc::new(TokenService::new(&config.auth));
        let (notifications, worker) = NotificationDispatcher::start(mailer, config.mail.clone());
        let uploads = build_sink(&config.uploads, &config.server.public_base_url)
            .map_err(|e| anyhow::anyhow!("Failed to initialise upload storage: {e}"))?;

        let auth_service = Arc::new(SeaOrmAuthService::new(
            store.clone(),
            tokens.clone(),
            config.auth.clone(),
            config.security.clone(),
            notifications.clone(),
        )) as Arc<dyn AuthService>;

        let template_service = Arc::new(SeaOrmTemplateService::new(
            store.clone(),
            uploads.clone(),
            config.uploads.clone(),
        )) as Arc<dyn TemplateService>;

        let request_service = Arc::new(SeaOrmRequestService::new(
            store.clone(),
            uploads.clone(),
            config.uploads.clone(),
            notifications.clone(),
        )) as Arc<dyn RequestService>;

        let user_admin_service = Arc::new(SeaOrmUserAdminService::new(
            store.clone(),
            config.security.clone(),
        )) as Arc<dyn UserAdminService>;

        let stats_service =
            Arc::new(SeaOrmStatsService::new(store.clone())) as Arc<dyn StatsService>;

        info!(
            database = %config.general.database_path,
            uploads = ?config.uploads.backend,
            mail_enabled = config.mail.enabled,
            "Application state initialised"
        );

        Ok((
            Self {
                config: Arc::new(config),
                store,
                tokens,
                notifications,
                uploads,
                auth_service,
                template_service,
                request_service,
                user_admin_service,
                stats_service,
            },
            worker,
        ))
    }
}
