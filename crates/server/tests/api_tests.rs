//! Router-level tests: reference data, live reports, consolidation and
//! submission dispatch against the mock core-banking API and mailer.

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use chrono::NaiveDate;
use rekon_email::MockMailer;
use rekon_import::MockCoreBanking;
use rekon_server::{build_router, AppState, ServerConfig};
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;
use tower::util::ServiceExt; // for `oneshot`

struct TestApp {
    router: Router,
    mailer: Arc<MockMailer>,
    _dir: TempDir,
}

fn day(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 3, d).unwrap()
}

fn march_api() -> MockCoreBanking {
    MockCoreBanking::new()
        .with_day(
            day(1),
            json!({"data": [
                {"rc": "00", "date": "20240301", "bill": "BILL-0001", "amount": 150000},
                {"rc": "51", "date": "20240301", "bill": "BILL-0002", "amount": 99000}
            ]}),
        )
        .with_day(
            day(2),
            json!({"data": [{"rc": "00", "date": "20240302", "bill": "BILL-0003", "amount": 50000}]}),
        )
}

async fn setup(api: MockCoreBanking, mailer: MockMailer) -> TestApp {
    setup_with_attachments(api, mailer, |dir| dir.join("attachments")).await
}

async fn setup_with_attachments(
    api: MockCoreBanking,
    mailer: MockMailer,
    attachments_dir: impl FnOnce(&Path) -> PathBuf,
) -> TestApp {
    let db = rekon_storage::connect_in_memory().await.expect("Should open database");
    let dir = tempfile::tempdir().unwrap();
    let config = ServerConfig {
        attachments_dir: attachments_dir(dir.path()),
        max_range_days: 31,
        ..ServerConfig::default()
    };
    let mailer = Arc::new(mailer);
    let state = AppState::new(db, Arc::new(api), mailer.clone(), config);
    TestApp { router: build_router(state), mailer, _dir: dir }
}

async fn call(app: &TestApp, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let request = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(json) => request
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(json.to_string())),
        None => request.body(Body::empty()),
    }
    .unwrap();

    let response = app.router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("Should read body");
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into()))
    };
    (status, json)
}

fn template_definition() -> Value {
    json!({
        "data_path": "data",
        "response_code_path": "rc",
        "valid_codes": ["00"],
        "amount_path": "amount",
        "columns": [
            {"label": "Date", "path": "date", "type": "date", "input_format": "%Y%m%d"},
            {"label": "Bill", "path": "bill"},
            {"label": "Amount", "path": "amount", "type": "currency"}
        ],
        "receipt": {
            "title": "PAYMENT RECEIPT",
            "lines": [
                {"label": "Bill", "path": "bill"},
                {"label": "Amount", "path": "amount", "type": "currency"}
            ],
            "footer": "Thank you"
        }
    })
}

/// Vendor, template, proccode and district; returns (district_id, proccode_id).
async fn seed(app: &TestApp) -> (i64, i64) {
    let (status, vendor) = call(
        app,
        "POST",
        "/api/vendors",
        Some(json!({"code": "PDAM", "name": "Water utility", "api_endpoint": "pdam/inquiry"})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, template) = call(
        app,
        "POST",
        "/api/templates",
        Some(json!({"name": "pdam-default", "definition": template_definition()})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{template}");

    let (status, proccode) = call(
        app,
        "POST",
        "/api/proccodes",
        Some(json!({
            "vendor_id": vendor["id"],
            "template_id": template["id"],
            "code": "180V70",
            "api_params": {"channel": "TELLER"}
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{proccode}");

    let (status, district) = call(
        app,
        "POST",
        "/api/districts",
        Some(json!({"code": "BDG", "name": "Bandung", "email": "finance@bdg.example"})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    (district["id"].as_i64().unwrap(), proccode["id"].as_i64().unwrap())
}

async fn consolidate(app: &TestApp, district: i64, proccode: i64) -> Value {
    let (status, batch) = call(
        app,
        "POST",
        "/api/consolidations",
        Some(json!({"district_id": district, "proccode_id": proccode, "start": "2024-03-01", "end": "2024-03-03"})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{batch}");
    batch
}

// =============================================================================
// Health and reference data
// =============================================================================

#[tokio::test]
async fn health_reports_ok() {
    let app = setup(MockCoreBanking::new(), MockMailer::new()).await;
    let (status, body) = call(&app, "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["database"], true);
}

#[tokio::test]
async fn duplicate_vendor_code_is_conflict() {
    let app = setup(MockCoreBanking::new(), MockMailer::new()).await;
    let vendor = json!({"code": "PLN", "name": "Electricity", "api_endpoint": "pln"});
    let (status, _) = call(&app, "POST", "/api/vendors", Some(vendor.clone())).await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = call(&app, "POST", "/api/vendors", Some(vendor)).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn blank_vendor_name_is_bad_request() {
    let app = setup(MockCoreBanking::new(), MockMailer::new()).await;
    let (status, body) = call(
        &app,
        "POST",
        "/api/vendors",
        Some(json!({"code": "PLN", "name": "  ", "api_endpoint": "pln"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "name is required");
}

#[tokio::test]
async fn missing_vendor_is_not_found() {
    let app = setup(MockCoreBanking::new(), MockMailer::new()).await;
    let (status, _) = call(&app, "GET", "/api/vendors/42", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = call(&app, "DELETE", "/api/vendors/42", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn template_validation_endpoint_lists_issues() {
    let app = setup(MockCoreBanking::new(), MockMailer::new()).await;

    let (status, body) = call(&app, "POST", "/api/templates/validate", Some(template_definition())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["valid"], true);

    let (status, body) = call(
        &app,
        "POST",
        "/api/templates/validate",
        Some(json!({"data_path": "data", "columns": []})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["valid"], false);
    assert!(!body["issues"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn invalid_template_is_not_saved() {
    let app = setup(MockCoreBanking::new(), MockMailer::new()).await;
    let (status, body) = call(
        &app,
        "POST",
        "/api/templates",
        Some(json!({"name": "broken", "definition": {"data_path": "data", "columns": []}})),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["issues"].is_array());

    let (_, list) = call(&app, "GET", "/api/templates", None).await;
    assert_eq!(list.as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn proccode_needs_existing_vendor() {
    let app = setup(MockCoreBanking::new(), MockMailer::new()).await;
    let (status, body) = call(
        &app,
        "POST",
        "/api/proccodes",
        Some(json!({"vendor_id": 9, "template_id": 9, "code": "X"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "vendor 9 does not exist");
}

#[tokio::test]
async fn vendor_in_use_cannot_be_deleted() {
    let app = setup(MockCoreBanking::new(), MockMailer::new()).await;
    seed(&app).await;
    let (_, vendors) = call(&app, "GET", "/api/vendors", None).await;
    let id = vendors[0]["id"].as_i64().unwrap();

    let (status, _) = call(&app, "DELETE", &format!("/api/vendors/{id}"), None).await;
    assert_eq!(status, StatusCode::CONFLICT);
}

// =============================================================================
// Reports and consolidation
// =============================================================================

#[tokio::test]
async fn transaction_report_maps_and_classifies() {
    let app = setup(march_api(), MockMailer::new()).await;
    let (_, proccode) = seed(&app).await;

    let (status, report) = call(
        &app,
        "POST",
        "/api/reports/transactions",
        Some(json!({"proccode_id": proccode, "start": "2024-03-01", "end": "2024-03-03"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{report}");
    assert_eq!(report["complete"], true);
    assert_eq!(report["valid_count"], 2);
    assert_eq!(report["invalid_count"], 1);
    assert_eq!(report["days"].as_array().unwrap().len(), 3);

    let rows = report["table"]["rows"].as_array().unwrap();
    assert_eq!(rows.len(), 3);
    assert_eq!(rows[0]["cells"][0]["display"], "01-03-2024");
    assert_eq!(rows[0]["cells"][2]["display"], "Rp 150.000,00");
    assert_eq!(rows[1]["valid"], false);
    assert_eq!(report["table"]["totals"][0]["display"], "Rp 200.000,00");
}

#[tokio::test]
async fn inverted_range_is_bad_request() {
    let app = setup(march_api(), MockMailer::new()).await;
    let (_, proccode) = seed(&app).await;
    let (status, _) = call(
        &app,
        "POST",
        "/api/reports/transactions",
        Some(json!({"proccode_id": proccode, "start": "2024-03-05", "end": "2024-03-01"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn consolidation_lifecycle() {
    let app = setup(march_api(), MockMailer::new()).await;
    let (district, proccode) = seed(&app).await;

    let batch = consolidate(&app, district, proccode).await;
    assert_eq!(batch["item_count"], 3);
    assert_eq!(batch["valid_count"], 2);
    assert_eq!(batch["complete"], true);
    let id = batch["id"].as_i64().unwrap();

    let (status, detail) = call(&app, "GET", &format!("/api/consolidations/{id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(detail["items"].as_array().unwrap().len(), 3);
    assert_eq!(detail["table"]["rows"].as_array().unwrap().len(), 3);

    let (status, list) = call(&app, "GET", &format!("/api/consolidations?district_id={district}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(list.as_array().unwrap().len(), 1);

    let (status, summary) = call(
        &app,
        "GET",
        "/api/reports/consolidation-summary?start=2024-03-01&end=2024-03-31",
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(summary[0]["district_name"], "Bandung");
    assert_eq!(summary[0]["valid_count"], 2);

    let (status, _) = call(&app, "DELETE", &format!("/api/consolidations/{id}"), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = call(&app, "GET", &format!("/api/consolidations/{id}"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn failed_day_marks_batch_incomplete() {
    let api = march_api().failing_on(day(3));
    let app = setup(api, MockMailer::new()).await;
    let (district, proccode) = seed(&app).await;

    let batch = consolidate(&app, district, proccode).await;
    assert_eq!(batch["complete"], false);
    assert_eq!(batch["item_count"], 3);
    assert!(batch["days"][2]["error"].is_string());
}

#[tokio::test]
async fn export_returns_csv_attachment() {
    let app = setup(march_api(), MockMailer::new()).await;
    let (district, proccode) = seed(&app).await;
    let id = consolidate(&app, district, proccode).await["id"].as_i64().unwrap();

    let request = Request::builder()
        .uri(format!("/api/consolidations/{id}/export"))
        .body(Body::empty())
        .unwrap();
    let response = app.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "text/csv");
    let disposition = response.headers()[header::CONTENT_DISPOSITION].to_str().unwrap().to_string();
    assert!(disposition.contains("BDG_180V70_20240301_20240303.csv"));

    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let text = String::from_utf8(bytes.to_vec()).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines[0], "Date,Bill,Amount,Status");
    assert_eq!(lines.len(), 5);
    assert!(lines[2].ends_with("INVALID"));
    assert!(lines[4].ends_with("TOTAL"));
}

#[tokio::test]
async fn receipt_for_stored_item() {
    let app = setup(march_api(), MockMailer::new()).await;
    let (district, proccode) = seed(&app).await;
    let id = consolidate(&app, district, proccode).await["id"].as_i64().unwrap();

    let (_, detail) = call(&app, "GET", &format!("/api/consolidations/{id}"), None).await;
    let item = detail["items"][0]["id"].as_i64().unwrap();

    let (status, receipt) = call(&app, "GET", &format!("/api/consolidations/{id}/items/{item}/receipt"), None).await;
    assert_eq!(status, StatusCode::OK, "{receipt}");
    assert_eq!(receipt["title"], "PAYMENT RECEIPT");
    assert_eq!(receipt["lines"][0]["value"], "BILL-0001");
    assert!(receipt["text"].as_str().unwrap().contains("Thank you"));
}

// =============================================================================
// Submissions
// =============================================================================

#[tokio::test]
async fn submission_sends_to_every_recipient() {
    let app = setup(march_api(), MockMailer::new()).await;
    let (district, proccode) = seed(&app).await;
    let batch = consolidate(&app, district, proccode).await;

    let (status, sub) = call(
        &app,
        "POST",
        "/api/submissions",
        Some(json!({
            "subject": "March reconciliation",
            "body": "Please review the attached files.",
            "batch_ids": [batch["id"]],
            "recipients": [
                {"email": "finance@bdg.example", "name": "Finance"},
                {"email": "FINANCE@bdg.example"},
                {"email": "audit@bank.example"}
            ]
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{sub}");
    assert_eq!(sub["status"], "sent");
    assert!(sub["sent_at"].is_string());
    assert_eq!(sub["destinations"].as_array().unwrap().len(), 2);
    assert_eq!(sub["files"][0]["file_name"], "BDG_180V70_20240301_20240303.csv");

    let sent = app.mailer.sent();
    assert_eq!(sent.len(), 2);
    assert_eq!(sent[0].attachments.len(), 1);
    assert!(sent[0].subject.ends_with("March reconciliation"));
}

#[tokio::test]
async fn partial_delivery_then_retry() {
    let mailer = MockMailer::new().failing_for("down@bank.example");
    let app = setup(march_api(), mailer).await;
    let (district, proccode) = seed(&app).await;
    let batch = consolidate(&app, district, proccode).await;

    let (status, sub) = call(
        &app,
        "POST",
        "/api/submissions",
        Some(json!({
            "subject": "March",
            "batch_ids": [batch["id"]],
            "recipients": [
                {"email": "ok@bank.example"},
                {"email": "down@bank.example"},
                {"email": "not an address"}
            ]
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(sub["status"], "partial");

    let destinations = sub["destinations"].as_array().unwrap();
    assert_eq!(destinations[0]["status"], "sent");
    assert_eq!(destinations[1]["status"], "failed");
    assert_eq!(destinations[2]["status"], "failed");
    assert!(destinations[2]["error"].as_str().unwrap().contains("Invalid address"));
    // the malformed address never reached the transport
    assert_eq!(app.mailer.sent().len(), 1);

    let id = sub["id"].as_i64().unwrap();
    let (status, retried) = call(&app, "POST", &format!("/api/submissions/{id}/retry"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(retried["status"], "partial");
    assert_eq!(app.mailer.sent().len(), 1);

    let (status, listed) = call(&app, "GET", "/api/submissions?status=partial", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(listed.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn retry_after_recovery_rolls_up_to_sent() {
    let mailer = MockMailer::new().failing_for("down@bank.example");
    let app = setup(march_api(), mailer).await;
    let (district, proccode) = seed(&app).await;
    let batch = consolidate(&app, district, proccode).await;

    let (_, sub) = call(
        &app,
        "POST",
        "/api/submissions",
        Some(json!({
            "subject": "March",
            "batch_ids": [batch["id"]],
            "recipients": [{"email": "ok@bank.example"}, {"email": "down@bank.example"}]
        })),
    )
    .await;
    assert_eq!(sub["status"], "partial");
    let first_sent_at = sub["sent_at"].clone();

    app.mailer.recover("down@bank.example");
    let id = sub["id"].as_i64().unwrap();
    let (status, retried) = call(&app, "POST", &format!("/api/submissions/{id}/retry"), None).await;
    assert_eq!(status, StatusCode::OK, "{retried}");
    assert_eq!(retried["status"], "sent");
    assert_eq!(retried["sent_at"], first_sent_at);

    let destinations = retried["destinations"].as_array().unwrap();
    assert!(destinations.iter().all(|d| d["status"] == "sent" && d["error"].is_null()));
    // only the recovered address was mailed again
    let sent = app.mailer.sent();
    assert_eq!(sent.len(), 2);
    assert_eq!(sent[1].to, "down@bank.example");

    let (status, _) = call(&app, "POST", &format!("/api/submissions/{id}/retry"), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn unwritable_attachment_store_leaves_no_submission() {
    let app = setup_with_attachments(march_api(), MockMailer::new(), |dir| {
        let blocked = dir.join("blocked");
        std::fs::write(&blocked, b"not a directory").unwrap();
        blocked
    })
    .await;
    let (district, proccode) = seed(&app).await;
    let batch = consolidate(&app, district, proccode).await;

    let (status, _) = call(
        &app,
        "POST",
        "/api/submissions",
        Some(json!({"subject": "March", "batch_ids": [batch["id"]], "recipients": [{"email": "ok@bank.example"}]})),
    )
    .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);

    let (_, list) = call(&app, "GET", "/api/submissions", None).await;
    assert_eq!(list.as_array().unwrap().len(), 0);
    assert!(app.mailer.sent().is_empty());
}

#[tokio::test]
async fn all_failed_submission_is_failed() {
    let mailer = MockMailer::new().failing_for("down@bank.example");
    let app = setup(march_api(), mailer).await;
    let (district, proccode) = seed(&app).await;
    let batch = consolidate(&app, district, proccode).await;

    let (_, sub) = call(
        &app,
        "POST",
        "/api/submissions",
        Some(json!({
            "subject": "March",
            "batch_ids": [batch["id"]],
            "recipients": [{"email": "down@bank.example"}]
        })),
    )
    .await;
    assert_eq!(sub["status"], "failed");
    assert!(sub["sent_at"].is_null());
}

#[tokio::test]
async fn submission_requires_recipients() {
    let app = setup(march_api(), MockMailer::new()).await;
    let (district, proccode) = seed(&app).await;
    let batch = consolidate(&app, district, proccode).await;

    let (status, body) = call(
        &app,
        "POST",
        "/api/submissions",
        Some(json!({"subject": "March", "batch_ids": [batch["id"]], "recipients": [{"email": "  "}]})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "at least one recipient is required");

    let (_, list) = call(&app, "GET", "/api/submissions", None).await;
    assert_eq!(list.as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn retry_without_failures_is_rejected() {
    let app = setup(march_api(), MockMailer::new()).await;
    let (district, proccode) = seed(&app).await;
    let batch = consolidate(&app, district, proccode).await;
    let (_, sub) = call(
        &app,
        "POST",
        "/api/submissions",
        Some(json!({"subject": "March", "batch_ids": [batch["id"]], "recipients": [{"email": "ok@bank.example"}]})),
    )
    .await;

    let id = sub["id"].as_i64().unwrap();
    let (status, _) = call(&app, "POST", &format!("/api/submissions/{id}/retry"), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn acting_user_is_recorded() {
    let app = setup(march_api(), MockMailer::new()).await;
    let (district, proccode) = seed(&app).await;
    let (status, user) = call(
        &app,
        "POST",
        "/api/users",
        Some(json!({"username": "siti", "full_name": "Siti Rahma", "role": "operator"})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{user}");

    let request = Request::builder()
        .method("POST")
        .uri("/api/consolidations")
        .header(header::CONTENT_TYPE, "application/json")
        .header("x-rekon-user", "siti")
        .body(Body::from(
            json!({"district_id": district, "proccode_id": proccode, "start": "2024-03-01", "end": "2024-03-01"})
                .to_string(),
        ))
        .unwrap();
    let response = app.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let batch: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(batch["created_by"], user["id"]);

    let request = Request::builder()
        .uri("/api/consolidations")
        .method("POST")
        .header(header::CONTENT_TYPE, "application/json")
        .header("x-rekon-user", "nobody")
        .body(Body::from(json!({"district_id": district, "proccode_id": proccode, "start": "2024-03-01", "end": "2024-03-01"}).to_string()))
        .unwrap();
    let response = app.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}
