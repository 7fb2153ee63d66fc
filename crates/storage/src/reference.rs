use rekon_core::{
    District, DistrictId, DistrictInput, Proccode, ProccodeId, ProccodeInput, Template, TemplateId,
    User, UserId, UserInput, Vendor, VendorId, VendorInput,
};
use serde_json::{Map, Value};

use crate::db::DbPool;
use crate::error::StorageError;

// ── Vendors ───────────────────────────────────────────────────────────────────

type VendorRow = (i64, String, String, String, i64);

fn vendor_from_row(r: VendorRow) -> Vendor {
    Vendor { id: VendorId(r.0), code: r.1, name: r.2, api_endpoint: r.3, is_active: r.4 != 0 }
}

pub async fn list_vendors(pool: &DbPool) -> Result<Vec<Vendor>, StorageError> {
    let rows = sqlx::query_as::<_, VendorRow>(
        "SELECT id, code, name, api_endpoint, is_active FROM vendors ORDER BY code",
    )
    .fetch_all(pool)
    .await?;
    Ok(rows.into_iter().map(vendor_from_row).collect())
}

pub async fn get_vendor(pool: &DbPool, id: VendorId) -> Result<Option<Vendor>, StorageError> {
    let row = sqlx::query_as::<_, VendorRow>(
        "SELECT id, code, name, api_endpoint, is_active FROM vendors WHERE id = ?",
    )
    .bind(id.0)
    .fetch_optional(pool)
    .await?;
    Ok(row.map(vendor_from_row))
}

pub async fn insert_vendor(pool: &DbPool, input: &VendorInput) -> Result<Vendor, StorageError> {
    let row = sqlx::query_as::<_, VendorRow>(
        "INSERT INTO vendors (code, name, api_endpoint, is_active) VALUES (?, ?, ?, ?) RETURNING id, code, name, api_endpoint, is_active",
    )
    .bind(input.code.trim())
    .bind(input.name.trim())
    .bind(input.api_endpoint.trim())
    .bind(input.is_active)
    .fetch_one(pool)
    .await?;
    Ok(vendor_from_row(row))
}

pub async fn update_vendor(
    pool: &DbPool,
    id: VendorId,
    input: &VendorInput,
) -> Result<Option<Vendor>, StorageError> {
    let row = sqlx::query_as::<_, VendorRow>(
        "UPDATE vendors SET code = ?, name = ?, api_endpoint = ?, is_active = ? WHERE id = ? RETURNING id, code, name, api_endpoint, is_active",
    )
    .bind(input.code.trim())
    .bind(input.name.trim())
    .bind(input.api_endpoint.trim())
    .bind(input.is_active)
    .bind(id.0)
    .fetch_optional(pool)
    .await?;
    Ok(row.map(vendor_from_row))
}

pub async fn delete_vendor(pool: &DbPool, id: VendorId) -> Result<bool, StorageError> {
    let result = sqlx::query("DELETE FROM vendors WHERE id = ?").bind(id.0).execute(pool).await?;
    Ok(result.rows_affected() > 0)
}

// ── Districts ─────────────────────────────────────────────────────────────────

type DistrictRow = (i64, String, String, Option<String>);

fn district_from_row(r: DistrictRow) -> District {
    District { id: DistrictId(r.0), code: r.1, name: r.2, email: r.3 }
}

pub async fn list_districts(pool: &DbPool) -> Result<Vec<District>, StorageError> {
    let rows = sqlx::query_as::<_, DistrictRow>("SELECT id, code, name, email FROM districts ORDER BY code")
        .fetch_all(pool)
        .await?;
    Ok(rows.into_iter().map(district_from_row).collect())
}

pub async fn get_district(pool: &DbPool, id: DistrictId) -> Result<Option<District>, StorageError> {
    let row = sqlx::query_as::<_, DistrictRow>("SELECT id, code, name, email FROM districts WHERE id = ?")
        .bind(id.0)
        .fetch_optional(pool)
        .await?;
    Ok(row.map(district_from_row))
}

pub async fn insert_district(pool: &DbPool, input: &DistrictInput) -> Result<District, StorageError> {
    let row = sqlx::query_as::<_, DistrictRow>(
        "INSERT INTO districts (code, name, email) VALUES (?, ?, ?) RETURNING id, code, name, email",
    )
    .bind(input.code.trim())
    .bind(input.name.trim())
    .bind(&input.email)
    .fetch_one(pool)
    .await?;
    Ok(district_from_row(row))
}

pub async fn update_district(
    pool: &DbPool,
    id: DistrictId,
    input: &DistrictInput,
) -> Result<Option<District>, StorageError> {
    let row = sqlx::query_as::<_, DistrictRow>(
        "UPDATE districts SET code = ?, name = ?, email = ? WHERE id = ? RETURNING id, code, name, email",
    )
    .bind(input.code.trim())
    .bind(input.name.trim())
    .bind(&input.email)
    .bind(id.0)
    .fetch_optional(pool)
    .await?;
    Ok(row.map(district_from_row))
}

pub async fn delete_district(pool: &DbPool, id: DistrictId) -> Result<bool, StorageError> {
    let result = sqlx::query("DELETE FROM districts WHERE id = ?").bind(id.0).execute(pool).await?;
    Ok(result.rows_affected() > 0)
}

// ── Templates ─────────────────────────────────────────────────────────────────

type TemplateRow = (i64, String, String);

fn template_from_row(r: TemplateRow) -> Template {
    Template { id: TemplateId(r.0), name: r.1, definition: r.2 }
}

pub async fn list_templates(pool: &DbPool) -> Result<Vec<Template>, StorageError> {
    let rows = sqlx::query_as::<_, TemplateRow>("SELECT id, name, definition FROM templates ORDER BY name")
        .fetch_all(pool)
        .await?;
    Ok(rows.into_iter().map(template_from_row).collect())
}

pub async fn get_template(pool: &DbPool, id: TemplateId) -> Result<Option<Template>, StorageError> {
    let row = sqlx::query_as::<_, TemplateRow>("SELECT id, name, definition FROM templates WHERE id = ?")
        .bind(id.0)
        .fetch_optional(pool)
        .await?;
    Ok(row.map(template_from_row))
}

/// `definition` must already be validated JSON; storage does not parse it.
pub async fn insert_template(pool: &DbPool, name: &str, definition: &str) -> Result<Template, StorageError> {
    let row = sqlx::query_as::<_, TemplateRow>(
        "INSERT INTO templates (name, definition) VALUES (?, ?) RETURNING id, name, definition",
    )
    .bind(name.trim())
    .bind(definition)
    .fetch_one(pool)
    .await?;
    Ok(template_from_row(row))
}

pub async fn update_template(
    pool: &DbPool,
    id: TemplateId,
    name: &str,
    definition: &str,
) -> Result<Option<Template>, StorageError> {
    let row = sqlx::query_as::<_, TemplateRow>(
        "UPDATE templates SET name = ?, definition = ? WHERE id = ? RETURNING id, name, definition",
    )
    .bind(name.trim())
    .bind(definition)
    .bind(id.0)
    .fetch_optional(pool)
    .await?;
    Ok(row.map(template_from_row))
}

pub async fn delete_template(pool: &DbPool, id: TemplateId) -> Result<bool, StorageError> {
    let result = sqlx::query("DELETE FROM templates WHERE id = ?").bind(id.0).execute(pool).await?;
    Ok(result.rows_affected() > 0)
}

// ── Proccodes ─────────────────────────────────────────────────────────────────

type ProccodeRow = (i64, i64, i64, String, String, String, i64);

const PROCCODE_COLUMNS: &str = "id, vendor_id, template_id, code, description, api_params, is_active";

fn proccode_from_row(r: ProccodeRow) -> Result<Proccode, StorageError> {
    let api_params: Map<String, Value> = serde_json::from_str(&r.5)?;
    Ok(Proccode {
        id: ProccodeId(r.0),
        vendor_id: VendorId(r.1),
        template_id: TemplateId(r.2),
        code: r.3,
        description: r.4,
        api_params,
        is_active: r.6 != 0,
    })
}

pub async fn list_proccodes(pool: &DbPool, vendor: Option<VendorId>) -> Result<Vec<Proccode>, StorageError> {
    let sql = format!(
        "SELECT {PROCCODE_COLUMNS} FROM proccodes WHERE (?1 IS NULL OR vendor_id = ?1) ORDER BY code"
    );
    let rows = sqlx::query_as::<_, ProccodeRow>(&sql)
        .bind(vendor.map(|v| v.0))
        .fetch_all(pool)
        .await?;
    rows.into_iter().map(proccode_from_row).collect()
}

pub async fn get_proccode(pool: &DbPool, id: ProccodeId) -> Result<Option<Proccode>, StorageError> {
    let sql = format!("SELECT {PROCCODE_COLUMNS} FROM proccodes WHERE id = ?");
    let row = sqlx::query_as::<_, ProccodeRow>(&sql).bind(id.0).fetch_optional(pool).await?;
    row.map(proccode_from_row).transpose()
}

pub async fn insert_proccode(pool: &DbPool, input: &ProccodeInput) -> Result<Proccode, StorageError> {
    let sql = format!(
        "INSERT INTO proccodes (vendor_id, template_id, code, description, api_params, is_active) VALUES (?, ?, ?, ?, ?, ?) RETURNING {PROCCODE_COLUMNS}"
    );
    let row = sqlx::query_as::<_, ProccodeRow>(&sql)
        .bind(input.vendor_id.0)
        .bind(input.template_id.0)
        .bind(input.code.trim())
        .bind(input.description.trim())
        .bind(Value::Object(input.params()).to_string())
        .bind(input.is_active)
        .fetch_one(pool)
        .await?;
    proccode_from_row(row)
}

pub async fn update_proccode(
    pool: &DbPool,
    id: ProccodeId,
    input: &ProccodeInput,
) -> Result<Option<Proccode>, StorageError> {
    let sql = format!(
        "UPDATE proccodes SET vendor_id = ?, template_id = ?, code = ?, description = ?, api_params = ?, is_active = ? WHERE id = ? RETURNING {PROCCODE_COLUMNS}"
    );
    let row = sqlx::query_as::<_, ProccodeRow>(&sql)
        .bind(input.vendor_id.0)
        .bind(input.template_id.0)
        .bind(input.code.trim())
        .bind(input.description.trim())
        .bind(Value::Object(input.params()).to_string())
        .bind(input.is_active)
        .bind(id.0)
        .fetch_optional(pool)
        .await?;
    row.map(proccode_from_row).transpose()
}

pub async fn delete_proccode(pool: &DbPool, id: ProccodeId) -> Result<bool, StorageError> {
    let result = sqlx::query("DELETE FROM proccodes WHERE id = ?").bind(id.0).execute(pool).await?;
    Ok(result.rows_affected() > 0)
}

// ── Users ─────────────────────────────────────────────────────────────────────

type UserRow = (i64, String, String, Option<String>, String, Option<i64>, i64);

const USER_COLUMNS: &str = "id, username, full_name, email, role, district_id, is_active";

fn user_from_row(r: UserRow) -> Result<User, StorageError> {
    Ok(User {
        id: UserId(r.0),
        username: r.1,
        full_name: r.2,
        email: r.3,
        role: r.4.parse()?,
        district_id: r.5.map(DistrictId),
        is_active: r.6 != 0,
    })
}

pub async fn list_users(pool: &DbPool) -> Result<Vec<User>, StorageError> {
    let sql = format!("SELECT {USER_COLUMNS} FROM users ORDER BY username");
    let rows = sqlx::query_as::<_, UserRow>(&sql).fetch_all(pool).await?;
    rows.into_iter().map(user_from_row).collect()
}

pub async fn get_user(pool: &DbPool, id: UserId) -> Result<Option<User>, StorageError> {
    let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?");
    let row = sqlx::query_as::<_, UserRow>(&sql).bind(id.0).fetch_optional(pool).await?;
    row.map(user_from_row).transpose()
}

pub async fn get_user_by_username(pool: &DbPool, username: &str) -> Result<Option<User>, StorageError> {
    let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE username = ?");
    let row = sqlx::query_as::<_, UserRow>(&sql).bind(username).fetch_optional(pool).await?;
    row.map(user_from_row).transpose()
}

pub async fn insert_user(pool: &DbPool, input: &UserInput) -> Result<User, StorageError> {
    let sql = format!(
        "INSERT INTO users (username, full_name, email, role, district_id, is_active) VALUES (?, ?, ?, ?, ?, ?) RETURNING {USER_COLUMNS}"
    );
    let row = sqlx::query_as::<_, UserRow>(&sql)
        .bind(input.username.trim())
        .bind(input.full_name.trim())
        .bind(&input.email)
        .bind(input.role.to_string())
        .bind(input.district_id.map(|d| d.0))
        .bind(input.is_active)
        .fetch_one(pool)
        .await?;
    user_from_row(row)
}

pub async fn update_user(pool: &DbPool, id: UserId, input: &UserInput) -> Result<Option<User>, StorageError> {
    let sql = format!(
        "UPDATE users SET username = ?, full_name = ?, email = ?, role = ?, district_id = ?, is_active = ? WHERE id = ? RETURNING {USER_COLUMNS}"
    );
    let row = sqlx::query_as::<_, UserRow>(&sql)
        .bind(input.username.trim())
        .bind(input.full_name.trim())
        .bind(&input.email)
        .bind(input.role.to_string())
        .bind(input.district_id.map(|d| d.0))
        .bind(input.is_active)
        .bind(id.0)
        .fetch_optional(pool)
        .await?;
    row.map(user_from_row).transpose()
}

pub async fn delete_user(pool: &DbPool, id: UserId) -> Result<bool, StorageError> {
    let result = sqlx::query("DELETE FROM users WHERE id = ?").bind(id.0).execute(pool).await?;
    Ok(result.rows_affected() > 0)
}
