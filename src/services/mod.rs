pub mod notifications;
pub use notifications::{
    Email, HttpMailer, LogMailer, MailError, Mailer, NotificationDispatcher, NotificationEvent,
};

pub mod password;

pub mod tokens;
pub use tokens::{Claims, TokenError, TokenKind, TokenPair, TokenService};

pub mod uploads;
pub use uploads::{UploadError, UploadPolicy, UploadSink, UploadedFile, build_sink};

pub mod auth_service;
pub mod auth_service_impl;
pub use auth_service::{AuthError, AuthService, AuthSession, RegisterInput};
pub use auth_service_impl::SeaOrmAuthService;

pub mod template_service;
pub mod template_service_impl;
pub use template_service::{
    BulkOutcome, BulkTemplates, CreateTemplate, TemplateError, TemplateService, UpdateTemplate,
};
pub use template_service_impl::SeaOrmTemplateService;

pub mod request_service;
pub mod request_service_impl;
pub use request_service::{
    AttachFile, CreateRequest, RequestError, RequestService, UpdateRequest,
};
pub use request_service_impl::SeaOrmRequestService;

pub mod user_admin_service;
pub mod user_admin_service_impl;
pub use user_admin_service::{
    AdminUpdate, CreateUser, UserAdminError, UserAdminService, UserCounts, UserDetail, UserList,
};
pub use user_admin_service_impl::SeaOrmUserAdminService;

pub mod stats_service;
pub mod stats_service_impl;
pub use stats_service::{StatsError, StatsService};
pub use stats_service_impl::SeaOrmStatsService;
