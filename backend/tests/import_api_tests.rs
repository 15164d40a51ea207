mod support;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::json;

use collegecm::models::SubjectTable;
use support::*;

const HEADER: &str = "subject_id,subject_name,subject_name_english,stage,semester,department,\
max_theory_mark,max_lab_mark,max_semester_mark,max_final_exam,credits,active,ministerial";

#[tokio::test]
async fn test_import_inserts_valid_rows_and_reports_the_rest() {
    let (router, repo) = app();
    let csv = format!(
        "{}\n\
         ,Algebra,Algebra,first,1,Math,40,0,40,60,6,true,false\n\
         ,Physics,Physics,first,1,Science,40,150,40,60,6,true,false\n\
         ,Biology,Biology,second,2,Science,40,20,40,60,4,false,true\n",
        HEADER
    );

    let (status, body) = send(
        &router,
        multipart("/v1/subjects/import", "file", csv.as_bytes()),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body["errors"],
        json!({"row-2": "max_lab_mark: must be between 0 and 100"})
    );
    let names: Vec<_> = body["subjects"]
        .as_array()
        .unwrap()
        .iter()
        .map(|s| s["subject_name"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(names, vec!["Algebra", "Biology"]);
    assert_eq!(repo.subject_count(&SubjectTable::Current), 2);
}

#[tokio::test]
async fn test_clean_import_has_no_errors_key() {
    let (router, _repo) = app();
    let csv = "subject_name,stage,semester,credits,active,ministerial\n\
               \"Logic, Sets and Proofs\",first,1,4,true,false\n";

    let (status, body) = send(
        &router,
        multipart("/v1/subjects/import", "file", csv.as_bytes()),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert!(body.get("errors").is_none());
    assert_eq!(body["subjects"][0]["subject_name"], "Logic, Sets and Proofs");
    assert_eq!(body["subjects"][0]["subject_id"], 1);
}

#[tokio::test]
async fn test_import_without_file_field_is_400() {
    let (router, repo) = app();
    let (status, body) = send(
        &router,
        multipart("/v1/subjects/import", "attachment", b"subject_name\nLogic\n"),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "no file was attached");
    assert_eq!(repo.subject_count(&SubjectTable::Current), 0);
}

#[tokio::test]
async fn test_import_rejects_unreadable_files() {
    let (router, repo) = app();
    for contents in [
        b"".as_slice(),
        b"stage,credits\nfirst,3\n".as_slice(),
        b"subject_name,credits\nLogic,three\n".as_slice(),
        b"\xff\xfe\x00".as_slice(),
    ] {
        let (status, body) = send(
            &router,
            multipart("/v1/subjects/import", "file", contents),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(
            body["error"],
            "the file could not be processed; check its format and try again"
        );
    }
    assert_eq!(repo.subject_count(&SubjectTable::Current), 0);
}

#[tokio::test]
async fn test_import_requires_multipart_body() {
    let (router, _repo) = app();
    let request = Request::post("/v1/subjects/import")
        .header("content-type", "text/csv")
        .body(Body::from("subject_name\nLogic\n"))
        .unwrap();

    let (status, body) = send(&router, request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "request must be a multipart form upload");
}

// A storage failure mid-file aborts the import; rows already inserted stay.
#[tokio::test]
async fn test_insert_failure_keeps_earlier_rows() {
    let (router, repo) = app();
    let csv = format!(
        "{}\n\
         5,Algebra,Algebra,first,1,Math,40,0,40,60,6,true,false\n\
         5,Physics,Physics,first,1,Science,40,20,40,60,6,true,false\n\
         6,Biology,Biology,second,2,Science,40,20,40,60,4,false,true\n",
        HEADER
    );

    let (status, body) = send(
        &router,
        multipart("/v1/subjects/import", "file", csv.as_bytes()),
    )
    .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        body["error"],
        "the server encountered a problem and could not process your request"
    );
    assert_eq!(repo.subject_count(&SubjectTable::Current), 1);
}

#[tokio::test]
async fn test_import_is_not_limited_to_the_json_body_size() {
    let (router, repo) = app();
    // `notes` is not a subject column and is skipped.
    let mut csv = String::from("subject_name,stage,semester,notes,active,ministerial\n");
    let notes = "n".repeat(1000);
    for i in 0..1500 {
        csv.push_str(&format!("Subject {},first,1,{},true,false\n", i, notes));
    }
    assert!(csv.len() > 1_048_576);

    let (status, _) = send(
        &router,
        multipart("/v1/subjects/import", "file", csv.as_bytes()),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(repo.subject_count(&SubjectTable::Current), 1500);
}

#[tokio::test]
async fn test_import_with_largest_subject_id_keeps_the_store_usable() {
    let (router, repo) = app();
    let csv = format!(
        "{}\n\
         9223372036854775807,Algebra,Algebra,first,1,Math,40,0,40,60,6,true,false\n\
         ,Physics,Physics,first,1,Science,40,20,40,60,6,true,false\n",
        HEADER
    );

    let (status, _) = send(
        &router,
        multipart("/v1/subjects/import", "file", csv.as_bytes()),
    )
    .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(repo.subject_count(&SubjectTable::Current), 1);

    let (status, body) = send(&router, get("/v1/exempteds")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"exempteds": []}));
}
