use std::collections::BTreeSet;

use super::role::{effective_role, Role};
use super::AccessLevel;
use crate::errors::{AppError, AppResult};

/// The caller of a request: identity, department and resolved role set.
///
/// Constructing a `Principal` resolves the effective role once, so an empty
/// role set is rejected at the boundary and every policy check after that is
/// infallible.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub user_id: i64,
    pub department_id: i64,
    roles: BTreeSet<Role>,
    role: Role,
}

impl Principal {
    pub fn new(user_id: i64, department_id: i64, roles: impl IntoIterator<Item = Role>) -> AppResult<Self> {
        let roles: BTreeSet<Role> = roles.into_iter().collect();
        let role = effective_role(&roles).ok_or(AppError::InvalidRoleState(user_id))?;

        Ok(Self {
            user_id,
            department_id,
            roles,
            role,
        })
    }

    /// Builds a principal from stored role names. Unrecognized names are
    /// skipped; a user left without any recognized role is an invalid state.
    pub fn from_role_names<S: AsRef<str>>(user_id: i64, department_id: i64, names: &[S]) -> AppResult<Self> {
        let roles = names.iter().filter_map(|name| match name.as_ref().parse::<Role>() {
            Ok(role) => Some(role),
            Err(err) => {
                tracing::warn!(user_id, %err, "ignoring unrecognized role");
                None
            }
        });

        Self::new(user_id, department_id, roles)
    }

    pub fn effective_role(&self) -> Role {
        self.role
    }

    pub fn roles(&self) -> &BTreeSet<Role> {
        &self.roles
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    pub fn is_manager(&self) -> bool {
        self.role == Role::Manager
    }
}

/// The attributes of a document that access decisions depend on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DocumentContext {
    pub document_id: i64,
    pub department_id: i64,
    pub uploaded_by: i64,
    pub access_level: AccessLevel,
}
