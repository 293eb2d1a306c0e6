use serde::Serialize;
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use utoipa::ToSchema;

use super::params::ListingRequest;
use crate::authz::{visibility_predicate, Principal};
use crate::db::documents::DOCUMENT_ROW_SELECT;
use crate::db::filter::push_predicate;
use crate::errors::AppResult;
use crate::models::document::{Document, DocumentRow};
use crate::utils::fold_case;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct PageMeta {
    pub current_page: i64,
    pub last_page: i64,
    pub per_page: i64,
    pub total: i64,
}

impl PageMeta {
    pub fn new(current_page: i64, per_page: i64, total: i64) -> Self {
        let last_page = ((total + per_page - 1) / per_page).max(1);
        Self {
            current_page,
            last_page,
            per_page,
            total,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct DocumentPage {
    pub data: Vec<Document>,
    pub meta: PageMeta,
}

/// One page of the documents `principal` may list. The visibility predicate
/// is applied before any caller filter, so filters only ever narrow it.
pub async fn list_documents(
    pool: &SqlitePool,
    principal: &Principal,
    request: &ListingRequest,
) -> AppResult<DocumentPage> {
    let mut count = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM documents doc");
    push_conditions(&mut count, principal, request);
    let total = count.build_query_scalar::<i64>().fetch_one(pool).await?;

    let mut select = QueryBuilder::<Sqlite>::new(DOCUMENT_ROW_SELECT);
    push_conditions(&mut select, principal, request);
    let direction = request.sort_order.keyword();
    select
        .push(format!(" ORDER BY {} {direction}, doc.id {direction}", request.sort_by.column()))
        .push(" LIMIT ")
        .push_bind(request.per_page)
        .push(" OFFSET ")
        .push_bind(request.offset());

    let rows = select.build_query_as::<DocumentRow>().fetch_all(pool).await?;

    tracing::debug!(
        user_id = principal.user_id,
        role = %principal.effective_role(),
        total,
        page = request.page,
        "listed documents"
    );

    Ok(DocumentPage {
        data: rows.into_iter().map(Document::from).collect(),
        meta: PageMeta::new(request.page, request.per_page, total),
    })
}

fn push_conditions(qb: &mut QueryBuilder<'_, Sqlite>, principal: &Principal, request: &ListingRequest) {
    qb.push(" WHERE (");
    push_predicate(qb, &visibility_predicate(principal));
    qb.push(")");

    if let Some(search) = &request.search {
        let pattern = format!("%{}%", escape_like(&fold_case(search)));
        qb.push(" AND (doc.title_folded LIKE ")
            .push_bind(pattern.clone())
            .push(" ESCAPE '\\' OR doc.description_folded LIKE ")
            .push_bind(pattern)
            .push(" ESCAPE '\\')");
    }
    if let Some(category_id) = request.category_id {
        qb.push(" AND doc.category_id = ").push_bind(category_id);
    }
    if let Some(department_id) = request.department_id {
        qb.push(" AND doc.department_id = ").push_bind(department_id);
    }
    if let Some(level) = request.access_level {
        qb.push(" AND doc.access_level = ").push_bind(level.as_str());
    }
}

/// Makes `%`, `_` and `\` match literally inside a LIKE pattern.
fn escape_like(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len());
    for ch in term.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}
