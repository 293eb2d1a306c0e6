//! Per-caller document statistics and the most recent visible uploads.

use serde::Serialize;
use sqlx::SqlitePool;
use utoipa::ToSchema;

use crate::authz::{visibility_predicate, Predicate, Principal};
use crate::db::documents::{count_documents, latest_documents};
use crate::errors::AppResult;
use crate::models::document::Document;

pub const RECENT_DOCUMENTS_LIMIT: i64 = 5;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct DashboardStats {
    /// Documents the caller may list
    pub total_documents: i64,
    /// Listable documents of the caller's department
    pub department_documents: i64,
    /// Documents the caller uploaded
    pub my_uploads: i64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct DashboardResponse {
    pub stats: DashboardStats,
    pub recent_documents: Vec<Document>,
}

pub async fn build_dashboard(pool: &SqlitePool, principal: &Principal) -> AppResult<DashboardResponse> {
    let visible = visibility_predicate(principal);

    let stats = DashboardStats {
        total_documents: count_documents(pool, &visible).await?,
        department_documents: count_documents(
            pool,
            &visible.clone().and(Predicate::Department(principal.department_id)),
        )
        .await?,
        my_uploads: count_documents(pool, &Predicate::UploadedBy(principal.user_id)).await?,
    };

    let recent_documents = latest_documents(pool, &visible, RECENT_DOCUMENTS_LIMIT)
        .await?
        .into_iter()
        .map(Document::from)
        .collect();

    Ok(DashboardResponse {
        stats,
        recent_documents,
    })
}
