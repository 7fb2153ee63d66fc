//! Vendors, districts, templates, proccodes and users.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use rekon_core::{
    District, DistrictId, DistrictInput, Proccode, ProccodeId, ProccodeInput, Template, TemplateId,
    TemplateInput, User, UserId, UserInput, Vendor, VendorId, VendorInput,
};
use rekon_import::TemplateDefinition;
use rekon_storage as storage;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ApiError;
use crate::AppState;

pub fn reference_routes() -> Router<AppState> {
    Router::new()
        .route("/api/vendors", get(list_vendors).post(create_vendor))
        .route("/api/vendors/{id}", get(get_vendor).put(update_vendor).delete(delete_vendor))
        .route("/api/districts", get(list_districts).post(create_district))
        .route(
            "/api/districts/{id}",
            get(get_district).put(update_district).delete(delete_district),
        )
        .route("/api/templates", get(list_templates).post(create_template))
        .route("/api/templates/validate", post(validate_template))
        .route(
            "/api/templates/{id}",
            get(get_template).put(update_template).delete(delete_template),
        )
        .route("/api/proccodes", get(list_proccodes).post(create_proccode))
        .route(
            "/api/proccodes/{id}",
            get(get_proccode).put(update_proccode).delete(delete_proccode),
        )
        .route("/api/users", get(list_users).post(create_user))
        .route("/api/users/{id}", get(get_user).put(update_user).delete(delete_user))
}

fn deleted(found: bool, kind: &str, id: i64) -> Result<StatusCode, ApiError> {
    if found {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::not_found(kind, id))
    }
}

// ── Vendors ───────────────────────────────────────────────────────────────────

async fn list_vendors(State(state): State<AppState>) -> Result<Json<Vec<Vendor>>, ApiError> {
    Ok(Json(storage::list_vendors(&state.db).await?))
}

async fn get_vendor(State(state): State<AppState>, Path(id): Path<i64>) -> Result<Json<Vendor>, ApiError> {
    storage::get_vendor(&state.db, VendorId(id))
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found("vendor", id))
}

async fn create_vendor(
    State(state): State<AppState>,
    Json(input): Json<VendorInput>,
) -> Result<(StatusCode, Json<Vendor>), ApiError> {
    input.validate()?;
    let vendor = storage::insert_vendor(&state.db, &input).await?;
    tracing::info!(vendor = %vendor.code, "Vendor created");
    Ok((StatusCode::CREATED, Json(vendor)))
}

async fn update_vendor(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(input): Json<VendorInput>,
) -> Result<Json<Vendor>, ApiError> {
    input.validate()?;
    storage::update_vendor(&state.db, VendorId(id), &input)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found("vendor", id))
}

async fn delete_vendor(State(state): State<AppState>, Path(id): Path<i64>) -> Result<StatusCode, ApiError> {
    deleted(storage::delete_vendor(&state.db, VendorId(id)).await?, "vendor", id)
}

// ── Districts ─────────────────────────────────────────────────────────────────

async fn list_districts(State(state): State<AppState>) -> Result<Json<Vec<District>>, ApiError> {
    Ok(Json(storage::list_districts(&state.db).await?))
}

async fn get_district(State(state): State<AppState>, Path(id): Path<i64>) -> Result<Json<District>, ApiError> {
    storage::get_district(&state.db, DistrictId(id))
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found("district", id))
}

async fn create_district(
    State(state): State<AppState>,
    Json(input): Json<DistrictInput>,
) -> Result<(StatusCode, Json<District>), ApiError> {
    input.validate()?;
    Ok((StatusCode::CREATED, Json(storage::insert_district(&state.db, &input).await?)))
}

async fn update_district(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(input): Json<DistrictInput>,
) -> Result<Json<District>, ApiError> {
    input.validate()?;
    storage::update_district(&state.db, DistrictId(id), &input)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found("district", id))
}

async fn delete_district(State(state): State<AppState>, Path(id): Path<i64>) -> Result<StatusCode, ApiError> {
    deleted(storage::delete_district(&state.db, DistrictId(id)).await?, "district", id)
}

// ── Templates ─────────────────────────────────────────────────────────────────

/// Stored template with its definition as a JSON object rather than text.
#[derive(Debug, Serialize)]
pub struct TemplateView {
    pub id: TemplateId,
    pub name: String,
    pub definition: Value,
}

impl From<Template> for TemplateView {
    fn from(t: Template) -> Self {
        let definition = serde_json::from_str(&t.definition).unwrap_or(Value::String(t.definition));
        Self { id: t.id, name: t.name, definition }
    }
}

#[derive(Debug, Serialize)]
pub struct TemplateCheck {
    pub valid: bool,
    pub issues: Vec<String>,
}

fn check_definition(definition: &Value) -> TemplateCheck {
    let issues = match serde_json::from_value::<TemplateDefinition>(definition.clone()) {
        Ok(def) => def.validate(),
        Err(e) => vec![e.to_string()],
    };
    TemplateCheck { valid: issues.is_empty(), issues }
}

/// Validated definition, re-serialized for storage.
fn definition_text(input: &TemplateInput) -> Result<String, ApiError> {
    input.validate()?;
    TemplateDefinition::from_value(input.definition.clone())?;
    Ok(input.definition.to_string())
}

async fn validate_template(Json(definition): Json<Value>) -> Json<TemplateCheck> {
    Json(check_definition(&definition))
}

async fn list_templates(State(state): State<AppState>) -> Result<Json<Vec<TemplateView>>, ApiError> {
    let templates = storage::list_templates(&state.db).await?;
    Ok(Json(templates.into_iter().map(TemplateView::from).collect()))
}

async fn get_template(State(state): State<AppState>, Path(id): Path<i64>) -> Result<Json<TemplateView>, ApiError> {
    storage::get_template(&state.db, TemplateId(id))
        .await?
        .map(|t| Json(t.into()))
        .ok_or_else(|| ApiError::not_found("template", id))
}

async fn create_template(
    State(state): State<AppState>,
    Json(input): Json<TemplateInput>,
) -> Result<(StatusCode, Json<TemplateView>), ApiError> {
    let definition = definition_text(&input)?;
    let template = storage::insert_template(&state.db, input.name.trim(), &definition).await?;
    tracing::info!(template = %template.name, "Template created");
    Ok((StatusCode::CREATED, Json(template.into())))
}

async fn update_template(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(input): Json<TemplateInput>,
) -> Result<Json<TemplateView>, ApiError> {
    let definition = definition_text(&input)?;
    storage::update_template(&state.db, TemplateId(id), input.name.trim(), &definition)
        .await?
        .map(|t| Json(t.into()))
        .ok_or_else(|| ApiError::not_found("template", id))
}

async fn delete_template(State(state): State<AppState>, Path(id): Path<i64>) -> Result<StatusCode, ApiError> {
    deleted(storage::delete_template(&state.db, TemplateId(id)).await?, "template", id)
}

// ── Proccodes ─────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct ProccodeFilter {
    vendor_id: Option<i64>,
}

async fn check_proccode_refs(state: &AppState, input: &ProccodeInput) -> Result<(), ApiError> {
    input.validate()?;
    if storage::get_vendor(&state.db, input.vendor_id).await?.is_none() {
        return Err(ApiError::BadRequest(format!("vendor {} does not exist", input.vendor_id)));
    }
    if storage::get_template(&state.db, input.template_id).await?.is_none() {
        return Err(ApiError::BadRequest(format!("template {} does not exist", input.template_id)));
    }
    Ok(())
}

async fn list_proccodes(
    State(state): State<AppState>,
    Query(filter): Query<ProccodeFilter>,
) -> Result<Json<Vec<Proccode>>, ApiError> {
    Ok(Json(storage::list_proccodes(&state.db, filter.vendor_id.map(VendorId)).await?))
}

async fn get_proccode(State(state): State<AppState>, Path(id): Path<i64>) -> Result<Json<Proccode>, ApiError> {
    storage::get_proccode(&state.db, ProccodeId(id))
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found("proccode", id))
}

async fn create_proccode(
    State(state): State<AppState>,
    Json(input): Json<ProccodeInput>,
) -> Result<(StatusCode, Json<Proccode>), ApiError> {
    check_proccode_refs(&state, &input).await?;
    let proccode = storage::insert_proccode(&state.db, &input).await?;
    tracing::info!(proccode = %proccode.code, "Proccode created");
    Ok((StatusCode::CREATED, Json(proccode)))
}

async fn update_proccode(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(input): Json<ProccodeInput>,
) -> Result<Json<Proccode>, ApiError> {
    check_proccode_refs(&state, &input).await?;
    storage::update_proccode(&state.db, ProccodeId(id), &input)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found("proccode", id))
}

async fn delete_proccode(State(state): State<AppState>, Path(id): Path<i64>) -> Result<StatusCode, ApiError> {
    deleted(storage::delete_proccode(&state.db, ProccodeId(id)).await?, "proccode", id)
}

// ── Users ─────────────────────────────────────────────────────────────────────

async fn list_users(State(state): State<AppState>) -> Result<Json<Vec<User>>, ApiError> {
    Ok(Json(storage::list_users(&state.db).await?))
}

async fn get_user(State(state): State<AppState>, Path(id): Path<i64>) -> Result<Json<User>, ApiError> {
    storage::get_user(&state.db, UserId(id))
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found("user", id))
}

async fn create_user(
    State(state): State<AppState>,
    Json(input): Json<UserInput>,
) -> Result<(StatusCode, Json<User>), ApiError> {
    input.validate()?;
    Ok((StatusCode::CREATED, Json(storage::insert_user(&state.db, &input).await?)))
}

async fn update_user(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(input): Json<UserInput>,
) -> Result<Json<User>, ApiError> {
    input.validate()?;
    storage::update_user(&state.db, UserId(id), &input)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found("user", id))
}

async fn delete_user(State(state): State<AppState>, Path(id): Path<i64>) -> Result<StatusCode, ApiError> {
    deleted(storage::delete_user(&state.db, UserId(id)).await?, "user", id)
}
