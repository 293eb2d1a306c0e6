//! Authorization module - document access policy
//!
//! This module implements the document access model:
//! - Role resolution (`admin > manager > employee`)
//! - Per-document decisions (view / edit / delete / upload)
//! - Visibility predicates consumed by listings and the dashboard
//! - The mutation gate applied before writes and downloads

pub mod gate;
pub mod policy;
mod predicate;
mod principal;
mod role;

pub use policy::{can_delete, can_edit, can_upload, can_view, visibility_predicate};
pub use predicate::Predicate;
pub use principal::{DocumentContext, Principal};
pub use role::{effective_role, Role, UnknownRole};

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Per-document visibility tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum AccessLevel {
    Public,
    Department,
    Private,
}

impl AccessLevel {
    pub const ALL: [AccessLevel; 3] = [AccessLevel::Public, AccessLevel::Department, AccessLevel::Private];

    pub fn as_str(&self) -> &'static str {
        match self {
            AccessLevel::Public => "public",
            AccessLevel::Department => "department",
            AccessLevel::Private => "private",
        }
    }
}

impl fmt::Display for AccessLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AccessLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "public" => Ok(AccessLevel::Public),
            "department" => Ok(AccessLevel::Department),
            "private" => Ok(AccessLevel::Private),
            other => Err(format!("access_level must be one of public, department, private (got '{other}')")),
        }
    }
}
