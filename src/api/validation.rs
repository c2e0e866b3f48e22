use super::ApiError;
use crate::models::{RequestStatus, Role, TemplateType};

pub const DEFAULT_PAGE_SIZE: u64 = 10;
pub const MAX_PAGE_SIZE: u64 = 100;
/// Keeps `page * limit` well inside the range a SQL offset accepts.
pub const MAX_PAGE: u64 = 1_000_000;

/// Path ids are UUIDs; anything else cannot exist.
pub fn validate_id<'a>(id: &'a str, resource: &str) -> Result<&'a str, ApiError> {
    let trimmed = id.trim();
    if uuid::Uuid::parse_str(trimmed).is_err() {
        return Err(ApiError::NotFound(format!("{resource} not found")));
    }
    Ok(trimmed)
}

pub fn parse_role(raw: &str) -> Result<Role, ApiError> {
    raw.trim()
        .to_lowercase()
        .parse()
        .map_err(|_| ApiError::validation("Invalid role"))
}

pub fn parse_status(raw: &str) -> Result<RequestStatus, ApiError> {
    raw.trim().parse().map_err(|_| {
        ApiError::validation(format!(
            "Status must be one of: {}",
            RequestStatus::allowed_values()
        ))
    })
}

pub fn parse_template_type(raw: &str) -> Result<TemplateType, ApiError> {
    raw.trim()
        .to_lowercase()
        .parse()
        .map_err(|_| ApiError::validation("Type must be residential or commercial"))
}

/// Page defaults to 1 and is capped at `MAX_PAGE`; limit defaults to 10
/// and is capped at 100.
pub fn page_params(page: Option<u64>, limit: Option<u64>) -> (u64, u64) {
    let page = page.filter(|p| *p > 0).unwrap_or(1).min(MAX_PAGE);
    let limit = limit
        .filter(|l| *l > 0)
        .unwrap_or(DEFAULT_PAGE_SIZE)
        .min(MAX_PAGE_SIZE);
    (page, limit)
}

/// Blank search strings mean "no filter".
pub fn validate_search_query(query: Option<&str>) -> Option<String> {
    query
        .map(str::trim)
        .filter(|q| !q.is_empty())
        .map(str::to_string)
}

pub fn require_present<'a>(value: Option<&'a str>, message: &str) -> Result<&'a str, ApiError> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ApiError::validation(message))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_id() {
        assert!(validate_id("0b6f9a8e-3c1d-4f3e-9d8b-2a1c5e7f9b10", "Request").is_ok());
        assert!(matches!(
            validate_id("not-a-uuid", "Request"),
            Err(ApiError::NotFound(msg)) if msg == "Request not found"
        ));
    }

    #[test]
    fn test_parse_enums() {
        assert_eq!(parse_role("VA").unwrap(), Role::Va);
        assert!(parse_role("owner").is_err());
        assert_eq!(parse_status("completed").unwrap(), RequestStatus::Completed);
        assert!(matches!(
            parse_status("done"),
            Err(ApiError::ValidationError(msg)) if msg.starts_with("Status must be one of: new")
        ));
        assert_eq!(
            parse_template_type("Commercial").unwrap(),
            TemplateType::Commercial
        );
        assert!(parse_template_type("industrial").is_err());
    }

    #[test]
    fn test_page_params() {
        assert_eq!(page_params(None, None), (1, 10));
        assert_eq!(page_params(Some(0), Some(0)), (1, 10));
        assert_eq!(page_params(Some(3), Some(500)), (3, 100));
        assert_eq!(page_params(Some(u64::MAX), Some(100)), (MAX_PAGE, 100));
    }

    #[test]
    fn test_validate_search_query() {
        assert_eq!(validate_search_query(Some("  xena ")).as_deref(), Some("xena"));
        assert!(validate_search_query(Some("   ")).is_none());
        assert!(validate_search_query(None).is_none());
    }

    #[test]
    fn test_require_present() {
        assert_eq!(require_present(Some(" a "), "missing").unwrap(), "a");
        assert!(require_present(Some(""), "missing").is_err());
        assert!(require_present(None, "missing").is_err());
    }
}
