//! Authorization applied before document side effects.

use super::policy;
use super::principal::{DocumentContext, Principal};
use crate::errors::{AppError, AppResult};

pub fn authorize_view(principal: &Principal, doc: &DocumentContext) -> AppResult<()> {
    if policy::can_view(principal, doc) {
        Ok(())
    } else {
        Err(AppError::forbidden("not authorized to view this document"))
    }
}

/// First upload check, made before the form is validated.
pub fn authorize_upload(principal: &Principal) -> AppResult<()> {
    if policy::can_upload(principal) {
        Ok(())
    } else {
        Err(AppError::forbidden("only admins and managers can upload documents"))
    }
}

/// Managers may only file uploads under their own department.
pub fn authorize_upload_department(principal: &Principal, department_id: i64) -> AppResult<()> {
    if principal.is_manager() && department_id != principal.department_id {
        tracing::debug!(user_id = principal.user_id, department_id, "cross-department upload rejected");
        return Err(AppError::forbidden("managers can only upload to their own department"));
    }
    Ok(())
}

pub fn authorize_update(principal: &Principal, doc: &DocumentContext) -> AppResult<()> {
    if policy::can_edit(principal, doc) {
        Ok(())
    } else {
        Err(AppError::forbidden("not authorized to edit this document"))
    }
}

/// Managers may only move documents into their own department; admins move freely.
pub fn authorize_department_change(principal: &Principal, department_id: Option<i64>) -> AppResult<()> {
    match department_id {
        Some(id) if principal.is_manager() && id != principal.department_id => {
            tracing::debug!(user_id = principal.user_id, department_id = id, "cross-department move rejected");
            Err(AppError::forbidden("managers can only assign documents to their own department"))
        }
        _ => Ok(()),
    }
}

pub fn authorize_delete(principal: &Principal, doc: &DocumentContext) -> AppResult<()> {
    if policy::can_delete(principal, doc) {
        Ok(())
    } else {
        Err(AppError::forbidden("not authorized to delete this document"))
    }
}

pub fn authorize_download(principal: &Principal, doc: &DocumentContext) -> AppResult<()> {
    if policy::can_view(principal, doc) {
        Ok(())
    } else {
        Err(AppError::forbidden("not authorized to download this document"))
    }
}
