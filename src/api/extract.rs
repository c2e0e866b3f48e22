//! Body and query extractors that answer malformed input with the usual
//! `{"error": ...}` envelope. `FormData` takes either `multipart/form-data`
//! (when files are attached) or a plain JSON object.

use axum::{
    Json,
    body::Bytes,
    extract::{FromRequest, FromRequestParts, Multipart, Query, Request},
    http::{StatusCode, header, request::Parts},
};
use serde::de::DeserializeOwned;
use std::collections::HashMap;

use super::ApiError;
use crate::services::UploadedFile;

#[derive(Debug, Default)]
pub struct FormData {
    fields: HashMap<String, Vec<String>>,
    files: HashMap<String, Vec<UploadedFile>>,
}

/// `platforms[]` and `platforms` name the same field.
fn field_key(name: &str) -> String {
    name.trim_end_matches("[]").to_string()
}

fn body_error(status: StatusCode, detail: String) -> ApiError {
    if status == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::PayloadTooLarge("Upload exceeds the size limit".to_string())
    } else {
        ApiError::validation(format!("Invalid request body: {detail}"))
    }
}

impl FormData {
    fn push_text(&mut self, name: &str, value: String) {
        self.fields.entry(field_key(name)).or_default().push(value);
    }

    fn push_json(&mut self, name: &str, value: serde_json::Value) {
        match value {
            serde_json::Value::Null => {}
            serde_json::Value::String(s) => self.push_text(name, s),
            serde_json::Value::Array(items) => {
                // An empty list is still a supplied field.
                self.fields.entry(field_key(name)).or_default();
                for item in items {
                    self.push_json(name, item);
                }
            }
            other => self.push_text(name, other.to_string()),
        }
    }

    fn from_json(bytes: &[u8]) -> Result<Self, ApiError> {
        let mut form = Self::default();
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(form);
        }

        let value: serde_json::Value = serde_json::from_slice(bytes)
            .map_err(|e| ApiError::validation(format!("Invalid JSON body: {e}")))?;
        let serde_json::Value::Object(map) = value else {
            return Err(ApiError::validation("Request body must be a JSON object"));
        };

        for (name, value) in map {
            form.push_json(&name, value);
        }
        Ok(form)
    }

    async fn from_multipart(mut multipart: Multipart) -> Result<Self, ApiError> {
        let mut form = Self::default();

        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| body_error(e.status(), e.body_text()))?
        {
            let Some(name) = field.name().map(str::to_string) else {
                continue;
            };

            match field.file_name().map(str::to_string) {
                Some(file_name) => {
                    let content_type = field.content_type().unwrap_or_default().to_string();
                    let bytes = field
                        .bytes()
                        .await
                        .map_err(|e| body_error(e.status(), e.body_text()))?;
                    if file_name.is_empty() && bytes.is_empty() {
                        continue;
                    }
                    form.files
                        .entry(field_key(&name))
                        .or_default()
                        .push(UploadedFile {
                            file_name,
                            content_type,
                            bytes,
                        });
                }
                None => {
                    let text = field
                        .text()
                        .await
                        .map_err(|e| body_error(e.status(), e.body_text()))?;
                    form.push_text(&name, text);
                }
            }
        }

        Ok(form)
    }

    /// First value, trimmed; blank counts as absent.
    #[must_use]
    pub fn text(&self, name: &str) -> Option<&str> {
        self.fields
            .get(name)
            .and_then(|values| values.first())
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }

    #[must_use]
    pub fn owned(&self, name: &str) -> Option<String> {
        self.text(name).map(str::to_string)
    }

    /// Present at all, even if blank. Used for partial updates that may
    /// clear a value.
    #[must_use]
    pub fn raw(&self, name: &str) -> Option<String> {
        self.fields
            .get(name)
            .and_then(|values| values.first())
            .map(|v| v.trim().to_string())
    }

    /// Every value of a list field. Accepts repeated fields or a single
    /// JSON-encoded array (the usual shape inside multipart bodies).
    #[must_use]
    pub fn list(&self, name: &str) -> Option<Vec<String>> {
        let values = self.fields.get(name)?;

        Some(
            values
                .iter()
                .flat_map(|value| {
                    let trimmed = value.trim();
                    if trimmed.starts_with('[') {
                        serde_json::from_str::<Vec<String>>(trimmed)
                            .unwrap_or_else(|_| vec![trimmed.to_string()])
                    } else {
                        vec![trimmed.to_string()]
                    }
                })
                .collect(),
        )
    }

    pub fn take_file(&mut self, name: &str) -> Option<UploadedFile> {
        let files = self.files.get_mut(name)?;
        if files.is_empty() {
            None
        } else {
            Some(files.remove(0))
        }
    }

    pub fn take_files(&mut self, name: &str) -> Vec<UploadedFile> {
        self.files.remove(name).unwrap_or_default()
    }
}

impl<S> FromRequest<S> for FormData
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let is_multipart = req
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|ct| ct.starts_with("multipart/form-data"));

        if is_multipart {
            let multipart = Multipart::from_request(req, state)
                .await
                .map_err(|e| body_error(e.status(), e.body_text()))?;
            Self::from_multipart(multipart).await
        } else {
            let bytes = Bytes::from_request(req, state)
                .await
                .map_err(|e| body_error(e.status(), e.body_text()))?;
            Self::from_json(&bytes)
        }
    }
}

/// `Json<T>` with the API error envelope on rejection.
#[derive(Debug)]
pub struct ApiJson<T>(pub T);

impl<T, S> FromRequest<S> for ApiJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|e| body_error(e.status(), e.body_text()))?;
        Ok(Self(value))
    }
}

/// `Query<T>` with the API error envelope on rejection.
#[derive(Debug)]
pub struct ApiQuery<T>(pub T);

impl<T, S> FromRequestParts<S> for ApiQuery<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Query(value) = Query::<T>::from_request_parts(parts, state)
            .await
            .map_err(|e| ApiError::validation(e.body_text()))?;
        Ok(Self(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_body_flattens_arrays_and_scalars() {
        let form = FormData::from_json(
            br#"{"projectTitle":" Spring Promo ","platforms":["instagram","facebook"],"isActive":false,"notes":null}"#,
        )
        .unwrap();

        assert_eq!(form.text("projectTitle"), Some("Spring Promo"));
        assert_eq!(
            form.list("platforms").unwrap(),
            vec!["instagram".to_string(), "facebook".to_string()]
        );
        assert_eq!(form.text("isActive"), Some("false"));
        assert!(form.text("notes").is_none());
        assert!(form.list("fileUrls").is_none());
    }

    #[test]
    fn test_empty_json_array_is_supplied() {
        let form = FormData::from_json(br#"{"platforms":[]}"#).unwrap();
        assert_eq!(form.list("platforms"), Some(Vec::new()));
        assert!(form.text("platforms").is_none());
    }

    #[test]
    fn test_list_accepts_encoded_array() {
        let mut form = FormData::default();
        form.push_text("platforms[]", r#"["instagram","tiktok"]"#.to_string());
        assert_eq!(
            form.list("platforms").unwrap(),
            vec!["instagram".to_string(), "tiktok".to_string()]
        );
    }

    #[test]
    fn test_empty_and_non_object_bodies() {
        assert!(FormData::from_json(b"").unwrap().text("x").is_none());
        assert!(FormData::from_json(b"[1,2]").is_err());
        assert!(FormData::from_json(b"{oops").is_err());
    }

    #[test]
    fn test_raw_keeps_blank_values() {
        let form = FormData::from_json(br#"{"notes":"  "}"#).unwrap();
        assert_eq!(form.raw("notes").as_deref(), Some(""));
        assert!(form.text("notes").is_none());
    }
}
