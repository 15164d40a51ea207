//! HTTP handlers for the REST API.
//!
//! Each handler parses its path and body, applies field validation, and
//! delegates storage to the repository held in [`AppState`].

use axum::{
    extract::{
        multipart::{MultipartError, MultipartRejection},
        Multipart, Path, Query, State,
    },
    http::StatusCode,
    Json,
};

use super::dto::{
    ExemptedEnvelope, ExemptedsEnvelope, HealthResponse, MessageEnvelope, StageQuery,
    StudentsExemptedsEnvelope, SubjectEnvelope, SubjectsEnvelope, SubjectsExemptedsEnvelope,
};
use super::error::{internal, AppError};
use super::extract::{parse_id, parse_year, CurrentUser, JsonBody};
use super::state::AppState;
use crate::db::repository::{
    ExemptedRepository, PrivilegeRepository, StudentRepository, SubjectRepository,
};
use crate::models::{
    validate_exempted, validate_subject, validate_subject_update, Exempted, NewExempted,
    NewSubject, Subject, SubjectPatch, SubjectTable,
};
use crate::services::{self, ImportReport};
use crate::validator::Validator;

/// Result type for handlers.
pub type HandlerResult<T> = Result<Json<T>, AppError>;

/// Result type for handlers answering 201 Created.
pub type CreatedResult<T> = Result<(StatusCode, Json<T>), AppError>;

/// Largest accepted import upload, in bytes.
pub const MAX_IMPORT_BYTES: usize = 10 * 1024 * 1024;

/// Multipart field holding the uploaded sheet.
pub const IMPORT_FIELD: &str = "file";

fn ensure_valid(v: Validator) -> Result<(), AppError> {
    if v.valid() {
        Ok(())
    } else {
        Err(AppError::FailedValidation(v.into_errors()))
    }
}

// =============================================================================
// Health Check
// =============================================================================

/// GET /health
pub async fn health_check(State(state): State<AppState>) -> HandlerResult<HealthResponse> {
    let db_status = match state.repository.health_check().await {
        Ok(true) => "connected".to_string(),
        Ok(false) => "disconnected".to_string(),
        Err(e) => {
            tracing::warn!(error = %e, "health check failed");
            "unavailable".to_string()
        }
    };

    Ok(Json(HealthResponse {
        status: "ok".to_string(),
        version: "v1".to_string(),
        database: db_status,
    }))
}

// =============================================================================
// Subjects
// =============================================================================

/// GET /v1/subjects/{year}?stage=<stage>
pub async fn list_subjects(
    State(state): State<AppState>,
    Path(year): Path<String>,
    Query(query): Query<StageQuery>,
) -> HandlerResult<SubjectsEnvelope> {
    let table = parse_year(&year)?;
    let subjects = state
        .repository
        .list_subjects(&table, query.filter())
        .await?;
    Ok(Json(SubjectsEnvelope { subjects }))
}

/// GET /v1/subjects/{year}/{id}
pub async fn get_subject(
    State(state): State<AppState>,
    Path((year, id)): Path<(String, String)>,
) -> HandlerResult<SubjectEnvelope> {
    let table = parse_year(&year)?;
    let id = parse_id(&id)?;
    let subject = state.repository.get_subject(&table, id).await?;
    Ok(Json(SubjectEnvelope { subject }))
}

/// POST /v1/subjects/{year}
///
/// Requires write access to `subjects_<year>` for the stage named in the body.
pub async fn create_subject(
    State(state): State<AppState>,
    Path(year): Path<String>,
    user: Result<CurrentUser, AppError>,
    JsonBody(input): JsonBody<NewSubject>,
) -> CreatedResult<SubjectEnvelope> {
    let table = parse_year(&year)?;
    let user = user?;

    let allowed = state
        .repository
        .check_write_access(user.id, &table.resource(), &input.stage)
        .await
        .map_err(internal)?;
    if !allowed {
        tracing::info!(user = user.id, table = %table, stage = %input.stage, "write denied");
        return Err(AppError::Unauthorized);
    }

    let mut subject = Subject::from(input);
    let mut v = Validator::new();
    validate_subject(&mut v, &subject);
    ensure_valid(v)?;

    state
        .repository
        .insert_subject(&table, &mut subject)
        .await
        .map_err(internal)?;

    Ok((StatusCode::CREATED, Json(SubjectEnvelope { subject })))
}

/// PATCH /v1/subjects/{year}/{id}
///
/// Only fields present in the body are changed.
pub async fn update_subject(
    State(state): State<AppState>,
    Path((year, id)): Path<(String, String)>,
    JsonBody(patch): JsonBody<SubjectPatch>,
) -> HandlerResult<SubjectEnvelope> {
    let table = parse_year(&year)?;
    let id = parse_id(&id)?;
    let mut subject = state.repository.get_subject(&table, id).await?;

    patch.apply(&mut subject);
    let mut v = Validator::new();
    validate_subject_update(&mut v, &subject);
    ensure_valid(v)?;

    state.repository.update_subject(&table, id, &subject).await?;
    Ok(Json(SubjectEnvelope { subject }))
}

/// DELETE /v1/subjects/{year}/{id}
pub async fn delete_subject(
    State(state): State<AppState>,
    Path((year, id)): Path<(String, String)>,
) -> HandlerResult<MessageEnvelope> {
    let table = parse_year(&year)?;
    let id = parse_id(&id)?;
    state.repository.delete_subject(&table, id).await?;
    Ok(Json(MessageEnvelope::new("subject successfully deleted")))
}

fn upload_error(err: MultipartError) -> AppError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::BadRequest(format!(
            "the uploaded file must not be larger than {} bytes",
            MAX_IMPORT_BYTES
        ))
    } else {
        AppError::BadRequest(format!("malformed multipart body: {}", err.body_text()))
    }
}

/// POST /v1/subjects/import
///
/// Multipart upload with the sheet in the `file` field. Rows go to the
/// current subject table.
pub async fn import_subjects(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> HandlerResult<ImportReport> {
    let mut multipart = multipart.map_err(|rejection| {
        tracing::debug!(error = %rejection, "rejected import request");
        AppError::BadRequest("request must be a multipart form upload".to_string())
    })?;

    let upload = loop {
        let field = multipart.next_field().await.map_err(upload_error)?;

        match field {
            None => return Err(AppError::BadRequest("no file was attached".to_string())),
            Some(field) if field.name() == Some(IMPORT_FIELD) => {
                break field.bytes().await.map_err(upload_error)?;
            }
            Some(_) => continue,
        }
    };

    let rows = services::parse_subjects_csv(&upload).map_err(|e| {
        tracing::warn!(error = %e, bytes = upload.len(), "rejected import file");
        AppError::BadRequest(
            "the file could not be processed; check its format and try again".to_string(),
        )
    })?;

    let report =
        services::import_subjects(state.repository.as_ref(), &SubjectTable::Current, rows)
            .await
            .map_err(internal)?;
    Ok(Json(report))
}

// =============================================================================
// Exemptions
// =============================================================================

/// GET /v1/exempteds
pub async fn list_exempteds(State(state): State<AppState>) -> HandlerResult<ExemptedsEnvelope> {
    let exempteds = state.repository.list_exempteds().await?;
    Ok(Json(ExemptedsEnvelope { exempteds }))
}

/// GET /v1/exempteds/{id}
pub async fn get_exempted(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> HandlerResult<ExemptedEnvelope> {
    let id = parse_id(&id)?;
    let exempted = state.repository.get_exempted(id).await?;
    Ok(Json(ExemptedEnvelope { exempted }))
}

/// GET /v1/exempteds/find/{student_id}/{subject_id}
pub async fn find_exempted(
    State(state): State<AppState>,
    Path((student_id, subject_id)): Path<(String, String)>,
) -> HandlerResult<ExemptedEnvelope> {
    let student_id = parse_id(&student_id)?;
    let subject_id = parse_id(&subject_id)?;
    let exempted = state
        .repository
        .find_exempted(student_id, subject_id)
        .await?;
    Ok(Json(ExemptedEnvelope { exempted }))
}

/// GET /v1/exempteds/students/{id}
///
/// Exemptions held by one student.
pub async fn list_student_exempteds(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> HandlerResult<SubjectsExemptedsEnvelope> {
    let student_id = parse_id(&id)?;
    let subjects_exempteds = state
        .repository
        .list_exempteds_for_student(student_id)
        .await?;
    Ok(Json(SubjectsExemptedsEnvelope { subjects_exempteds }))
}

/// GET /v1/exempteds/subjects/{id}
///
/// Students exempted from one subject.
pub async fn list_subject_exempteds(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> HandlerResult<StudentsExemptedsEnvelope> {
    let subject_id = parse_id(&id)?;
    let students_exempteds = state
        .repository
        .list_exempteds_for_subject(subject_id)
        .await?;
    Ok(Json(StudentsExemptedsEnvelope { students_exempteds }))
}

/// POST /v1/exempteds
///
/// The record is stored before the names are looked up, so a failed lookup
/// answers 500 while the exemption remains stored.
pub async fn create_exempted(
    State(state): State<AppState>,
    JsonBody(input): JsonBody<NewExempted>,
) -> CreatedResult<ExemptedEnvelope> {
    let mut exempted = Exempted::new(input.student_id, input.subject_id);
    let mut v = Validator::new();
    validate_exempted(&mut v, &exempted);
    ensure_valid(v)?;

    state
        .repository
        .insert_exempted(&mut exempted)
        .await
        .map_err(internal)?;

    let student = state
        .repository
        .get_student(exempted.student_id)
        .await
        .map_err(internal)?;
    let subject = state
        .repository
        .get_subject(&SubjectTable::Current, exempted.subject_id)
        .await
        .map_err(internal)?;

    exempted.student_name = student.student_name;
    exempted.subject_name = subject.subject_name;
    Ok((StatusCode::CREATED, Json(ExemptedEnvelope { exempted })))
}

/// DELETE /v1/exempteds/{id}
pub async fn delete_exempted(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> HandlerResult<MessageEnvelope> {
    let id = parse_id(&id)?;
    state.repository.delete_exempted(id).await?;
    Ok(Json(MessageEnvelope::new("exemption successfully deleted")))
}
