use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

use super::department::DepartmentSummary;
use crate::authz::Role;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct User {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub department_id: i64,
    pub department: DepartmentSummary,
    pub roles: Vec<Role>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow)]
pub struct DbUser {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub department_id: i64,
    pub department_name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl DbUser {
    pub fn into_user(self, roles: Vec<Role>) -> User {
        User {
            id: self.id,
            name: self.name,
            email: self.email,
            department_id: self.department_id,
            department: DepartmentSummary {
                id: self.department_id,
                name: self.department_name,
            },
            roles,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

/// Uploader details embedded in document responses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct UploaderSummary {
    pub id: i64,
    pub name: String,
    pub email: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct RegisterRequest {
    #[schema(example = "Ada Lovelace")]
    pub name: Option<String>,
    #[schema(example = "ada@example.com")]
    pub email: Option<String>,
    #[schema(example = "S3cureP@ssw0rd")]
    pub password: Option<String>,
    #[schema(example = "S3cureP@ssw0rd")]
    pub password_confirmation: Option<String>,
    #[schema(example = 1)]
    pub department_id: Option<i64>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct LoginRequest {
    #[schema(example = "ada@example.com")]
    pub email: Option<String>,
    #[schema(example = "S3cureP@ssw0rd")]
    pub password: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AuthResponse {
    pub message: String,
    pub user: User,
    pub token: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct UserEnvelope {
    pub user: User,
}
