//! Shared helpers for integration tests.
#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    Router,
};
use serde_json::Value;
use tower::ServiceExt;

use collegecm::db::repositories::LocalRepository;
use collegecm::db::repository::FullRepository;
use collegecm::http::{create_router, AppState, USER_ID_HEADER};
use collegecm::models::{Student, Subject};

static ENV_LOCK: Mutex<()> = Mutex::new(());

/// Runs `f` with environment variables temporarily modified.
///
/// This is panic-safe (restores variables on unwind) and also serializes access to
/// process-global env vars to avoid flaky tests when Rust runs tests in parallel.
///
/// `changes` is a list of `(key, value)` pairs:
/// - `Some(v)` sets the variable to `v`
/// - `None` removes the variable
pub fn with_scoped_env<F, R>(changes: &[(&str, Option<&str>)], f: F) -> R
where
    F: FnOnce() -> R,
{
    let _lock = ENV_LOCK.lock().expect("ENV_LOCK poisoned");
    let _guard = ScopedEnv::new(changes);
    f()
}

struct ScopedEnv {
    snapshot: Vec<(String, Option<String>)>,
}

impl ScopedEnv {
    fn new(changes: &[(&str, Option<&str>)]) -> Self {
        let keys: HashSet<&str> = changes.iter().map(|(k, _)| *k).collect();
        let snapshot = keys
            .into_iter()
            .map(|k| (k.to_string(), std::env::var(k).ok()))
            .collect::<Vec<_>>();

        for (k, v) in changes {
            match v {
                Some(val) => std::env::set_var(k, val),
                None => std::env::remove_var(k),
            }
        }

        Self { snapshot }
    }
}

impl Drop for ScopedEnv {
    fn drop(&mut self) {
        for (k, v) in self.snapshot.drain(..) {
            match v {
                Some(val) => std::env::set_var(&k, val),
                None => std::env::remove_var(&k),
            }
        }
    }
}

// =============================================================================
// Fixtures
// =============================================================================

/// User granted write access in [`seeded_app`].
pub const WRITER: i64 = 7;

/// User with no privileges.
pub const READER: i64 = 8;

pub fn subject(name: &str, stage: &str) -> Subject {
    Subject {
        id: 0,
        subject_name: name.to_string(),
        subject_name_english: name.to_string(),
        stage: stage.to_string(),
        semester: "1".to_string(),
        department: "Computer Science".to_string(),
        max_theory_mark: 40,
        max_lab_mark: 20,
        max_semester_mark: 40,
        max_final_exam: 60,
        credits: 6,
        active: "true".to_string(),
        ministerial: "false".to_string(),
    }
}

pub fn subject_json(name: &str, stage: &str) -> Value {
    serde_json::to_value(subject(name, stage)).expect("subject serializes")
}

pub fn student(id: i64, name: &str) -> Student {
    Student {
        id,
        student_name: name.to_string(),
        stage: "first".to_string(),
    }
}

/// Router over a fresh in-memory repository, which is returned for setup
/// and inspection.
pub fn app() -> (Router, LocalRepository) {
    let repo = LocalRepository::new();
    let shared = Arc::new(repo.clone()) as Arc<dyn FullRepository>;
    (create_router(AppState::new(shared)), repo)
}

/// Like [`app`], with two students and write access for [`WRITER`] on the
/// `first` stage of `subjects_2024` and on every stage of `subjects`.
pub fn seeded_app() -> (Router, LocalRepository) {
    let (router, repo) = app();
    repo.insert_student(student(1, "Ali Hassan"));
    repo.insert_student(student(2, "Zainab Kareem"));
    repo.grant_write_access(WRITER, "subjects_2024", "first");
    repo.grant_write_access(WRITER, "subjects", "*");
    (router, repo)
}

// =============================================================================
// Requests
// =============================================================================

/// Send `request` and decode the JSON response body (`Value::Null` if empty).
pub async fn send(router: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = router
        .clone()
        .oneshot(request)
        .await
        .expect("router is infallible");
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body readable");
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).expect("response body is JSON")
    };
    (status, body)
}

pub fn get(uri: &str) -> Request<Body> {
    Request::get(uri).body(Body::empty()).expect("valid request")
}

pub fn delete(uri: &str) -> Request<Body> {
    Request::delete(uri).body(Body::empty()).expect("valid request")
}

/// Request with a raw body, optionally on behalf of `user`.
pub fn raw(method: &str, uri: &str, body: impl Into<Body>, user: Option<i64>) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json");
    if let Some(user) = user {
        builder = builder.header(USER_ID_HEADER, user.to_string());
    }
    builder.body(body.into()).expect("valid request")
}

pub fn json(method: &str, uri: &str, body: &Value, user: Option<i64>) -> Request<Body> {
    raw(method, uri, body.to_string(), user)
}

pub const BOUNDARY: &str = "collegecm-test-boundary";

/// `multipart/form-data` upload with a single file field.
pub fn multipart(uri: &str, field: &str, contents: &[u8]) -> Request<Body> {
    let mut body = Vec::new();
    body.extend_from_slice(
        format!(
            "--{b}\r\nContent-Disposition: form-data; name=\"{f}\"; filename=\"subjects.csv\"\r\n\
             Content-Type: text/csv\r\n\r\n",
            b = BOUNDARY,
            f = field
        )
        .as_bytes(),
    );
    body.extend_from_slice(contents);
    body.extend_from_slice(format!("\r\n--{}--\r\n", BOUNDARY).as_bytes());

    Request::post(uri)
        .header(
            "content-type",
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .body(Body::from(body))
        .expect("valid request")
}
