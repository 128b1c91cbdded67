//! `Json` and `Path` extractors that reject with [`AppError`] instead of
//! axum's plain-text responses.

use axum::{
    async_trait,
    extract::{FromRequest, FromRequestParts, Path, Request},
    http::request::Parts,
    Json,
};
use serde::de::DeserializeOwned;

use crate::error::AppError;

pub struct AppJson<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for AppJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state).await?;
        Ok(AppJson(value))
    }
}

pub struct AppPath<T>(pub T);

#[async_trait]
impl<S, T> FromRequestParts<S> for AppPath<T>
where
    T: DeserializeOwned + Send,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(value) = Path::<T>::from_request_parts(parts, state).await?;
        Ok(AppPath(value))
    }
}

/// Decodes an optional JSON body: empty means `T::default()`, anything else must parse.
pub fn optional_json<T>(body: &[u8]) -> Result<T, AppError>
where
    T: DeserializeOwned + Default,
{
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    serde_json::from_slice(body)
        .map_err(|e| AppError::BadRequest(format!("Invalid request body: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classes::dto::EnrollRequest;

    #[test]
    fn empty_body_means_defaults() {
        let req: EnrollRequest = optional_json(b"").unwrap();
        assert!(req.user_id.is_none());
        let req: EnrollRequest = optional_json(b"  \n").unwrap();
        assert!(req.status.is_none());
    }

    #[test]
    fn malformed_body_is_rejected() {
        let err = optional_json::<EnrollRequest>(br#"{"userId":"abc"}"#).unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
        let err = optional_json::<EnrollRequest>(br#"{"status":"WAITLISTED"}"#).unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
        assert!(optional_json::<EnrollRequest>(b"not json").is_err());
    }
}
