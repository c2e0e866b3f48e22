pub mod request;
pub mod template;
pub mod user;

pub use request::{AgentSummary, Request, RequestFile, RequestStatus, TemplateSummary};
pub use template::{Template, TemplateType};
pub use user::{CurrentUser, PublicUser, Role};

/// Raised when a string does not name a known enum variant.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid {kind}: {value}")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}
