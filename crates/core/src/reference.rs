use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

use crate::error::CoreError;

macro_rules! id_type {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub i64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

id_type!(VendorId);
id_type!(DistrictId);
id_type!(ProccodeId);
id_type!(TemplateId);
id_type!(UserId);

fn require(value: &str, field: &'static str) -> Result<(), CoreError> {
    if value.trim().is_empty() {
        return Err(CoreError::Required(field));
    }
    Ok(())
}

/// Upstream biller whose transactions arrive through the core-banking API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vendor {
    pub id: VendorId,
    pub code: String,
    pub name: String,
    /// Path appended to the core-banking base URL for this vendor's inquiries.
    pub api_endpoint: String,
    pub is_active: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VendorInput {
    pub code: String,
    pub name: String,
    pub api_endpoint: String,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

impl VendorInput {
    pub fn validate(&self) -> Result<(), CoreError> {
        require(&self.code, "code")?;
        require(&self.name, "name")?;
        require(&self.api_endpoint, "api_endpoint")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct District {
    pub id: DistrictId,
    pub code: String,
    pub name: String,
    pub email: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DistrictInput {
    pub code: String,
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
}

impl DistrictInput {
    pub fn validate(&self) -> Result<(), CoreError> {
        require(&self.code, "code")?;
        require(&self.name, "name")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Proccode {
    pub id: ProccodeId,
    pub vendor_id: VendorId,
    pub template_id: TemplateId,
    pub code: String,
    pub description: String,
    /// Extra request parameters merged into every inquiry for this proccode.
    pub api_params: Map<String, Value>,
    pub is_active: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProccodeInput {
    pub vendor_id: VendorId,
    pub template_id: TemplateId,
    pub code: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "empty_object")]
    pub api_params: Value,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

impl ProccodeInput {
    pub fn validate(&self) -> Result<(), CoreError> {
        require(&self.code, "code")?;
        if !self.api_params.is_object() {
            return Err(CoreError::ParamsNotObject);
        }
        Ok(())
    }

    pub fn params(&self) -> Map<String, Value> {
        self.api_params.as_object().cloned().unwrap_or_default()
    }
}

/// Stored field-mapping template. The definition is kept as raw JSON and
/// parsed by the mapping layer when used.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Template {
    pub id: TemplateId,
    pub name: String,
    pub definition: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemplateInput {
    pub name: String,
    pub definition: Value,
}

impl TemplateInput {
    pub fn validate(&self) -> Result<(), CoreError> {
        require(&self.name, "name")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    Admin,
    Operator,
}

impl fmt::Display for UserRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UserRole::Admin => write!(f, "admin"),
            UserRole::Operator => write!(f, "operator"),
        }
    }
}

impl FromStr for UserRole {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(UserRole::Admin),
            "operator" => Ok(UserRole::Operator),
            other => Err(CoreError::UnknownVariant { kind: "user role", value: other.to_string() }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub username: String,
    pub full_name: String,
    pub email: Option<String>,
    pub role: UserRole,
    pub district_id: Option<DistrictId>,
    pub is_active: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserInput {
    pub username: String,
    pub full_name: String,
    #[serde(default)]
    pub email: Option<String>,
    pub role: UserRole,
    #[serde(default)]
    pub district_id: Option<DistrictId>,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

impl UserInput {
    pub fn validate(&self) -> Result<(), CoreError> {
        require(&self.username, "username")?;
        require(&self.full_name, "full_name")
    }
}

fn default_true() -> bool {
    true
}

fn empty_object() -> Value {
    Value::Object(Map::new())
}
