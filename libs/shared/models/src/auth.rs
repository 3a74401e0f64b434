use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize)]
pub struct JwtClaims {
    pub sub: String,
    pub exp: Option<u64>,
    pub email: Option<String>,
    pub role: Option<String>,
    pub app_metadata: Option<serde_json::Value>,
    pub user_metadata: Option<serde_json::Value>,
    pub aud: Option<String>,
    pub iat: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub email: Option<String>,
    pub role: Option<String>,
    pub metadata: Option<serde_json::Value>,
    pub created_at: Option<DateTime<Utc>>,
}

/// Caller role as asserted by the upstream identity provider.
///
/// The backend trusts the role claim; it only decides which foreign key a
/// listing matches and which mutations the caller may perform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Patient,
    Practitioner,
    Admin,
}

impl User {
    pub fn role(&self) -> Option<Role> {
        match self.role.as_deref() {
            Some("patient") => Some(Role::Patient),
            Some("practitioner") => Some(Role::Practitioner),
            Some("admin") => Some(Role::Admin),
            _ => None,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role() == Some(Role::Admin)
    }

    pub fn is_practitioner(&self) -> bool {
        self.role() == Some(Role::Practitioner)
    }
}
