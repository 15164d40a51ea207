//! Request extractors: strict JSON bodies, path identifiers and the
//! requesting user.

use axum::{
    body::Bytes,
    extract::{
        rejection::{BytesRejection, FailedToBufferBody},
        FromRequest, FromRequestParts, Request,
    },
    http::request::Parts,
    middleware::Next,
    response::Response,
};
use serde::de::DeserializeOwned;
use serde_json::error::Category;

use super::error::AppError;
use crate::models::{AcademicYear, SubjectTable};

/// Largest JSON request body accepted, in bytes.
pub const MAX_JSON_BODY_BYTES: usize = 1_048_576;

/// Header carrying the authenticated user's ID, set by the upstream gateway.
pub const USER_ID_HEADER: &str = "x-user-id";

/// JSON body decoded with strict rules: non-empty, a single value, no
/// unknown fields (enforced by the target type), at most
/// [`MAX_JSON_BODY_BYTES`].
#[derive(Debug, Clone)]
pub struct JsonBody<T>(pub T);

impl<T, S> FromRequest<S> for JsonBody<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let bytes = Bytes::from_request(req, state)
            .await
            .map_err(|rejection| match rejection {
                BytesRejection::FailedToBufferBody(FailedToBufferBody::LengthLimitError(_)) => {
                    AppError::BadRequest(format!(
                        "body must not be larger than {} bytes",
                        MAX_JSON_BODY_BYTES
                    ))
                }
                other => AppError::BadRequest(other.body_text()),
            })?;

        decode_json(&bytes).map(JsonBody)
    }
}

/// Decode `bytes` as exactly one JSON value of type `T`.
pub fn decode_json<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, AppError> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Err(AppError::BadRequest("body must not be empty".to_string()));
    }

    let mut de = serde_json::Deserializer::from_slice(bytes);
    let value = T::deserialize(&mut de).map_err(describe_json_error)?;
    de.end().map_err(|_| {
        AppError::BadRequest("body must only contain a single JSON value".to_string())
    })?;
    Ok(value)
}

fn describe_json_error(err: serde_json::Error) -> AppError {
    let message = match err.classify() {
        Category::Eof => "body contains badly-formed JSON".to_string(),
        Category::Syntax => format!(
            "body contains badly-formed JSON (at line {}, column {})",
            err.line(),
            err.column()
        ),
        Category::Data => {
            let text = err.to_string();
            match text.strip_prefix("unknown field ") {
                Some(rest) => {
                    let key = rest.split(',').next().unwrap_or(rest);
                    format!("body contains unknown key {}", key)
                }
                None => format!("body contains incorrect JSON type: {}", text),
            }
        }
        Category::Io => "body could not be read".to_string(),
    };
    AppError::BadRequest(message)
}

/// Parse a record identifier path segment; anything but an integer ≥ 1 is a 404.
pub fn parse_id(raw: &str) -> Result<i64, AppError> {
    raw.trim()
        .parse::<i64>()
        .ok()
        .filter(|id| *id >= 1)
        .ok_or(AppError::NotFound)
}

/// Parse the `{year}` path segment into its subject table.
pub fn parse_year(raw: &str) -> Result<SubjectTable, AppError> {
    AcademicYear::parse(raw)
        .map(SubjectTable::Year)
        .ok_or(AppError::NotFound)
}

/// The user on whose behalf the request is made.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CurrentUser {
    pub id: i64,
}

/// Middleware attaching a [`CurrentUser`] to requests that carry a valid
/// `X-User-Id` header.
pub async fn identify_user(mut req: Request, next: Next) -> Response {
    if let Some(value) = req.headers().get(USER_ID_HEADER) {
        let user = value
            .to_str()
            .ok()
            .and_then(|v| v.trim().parse::<i64>().ok())
            .filter(|id| *id >= 1);
        match user {
            Some(id) => {
                req.extensions_mut().insert(CurrentUser { id });
            }
            None => tracing::warn!(header = ?value, "ignoring malformed user header"),
        }
    }
    next.run(req).await
}

impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<CurrentUser>()
            .copied()
            .ok_or_else(|| AppError::Internal("missing user in request context".to_string()))
    }
}
