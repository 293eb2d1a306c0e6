use sqlx::{QueryBuilder, Sqlite, SqlitePool};

use super::filter::push_predicate;
use crate::authz::Predicate;
use crate::errors::{AppError, AppResult};
use crate::models::document::{DbDocument, DocumentChanges, DocumentRow, NewDocument};
use crate::utils::{fold_case, utc_now};

/// Select list and joins producing `DocumentRow`s.
pub const DOCUMENT_ROW_SELECT: &str = "SELECT doc.id AS id, doc.title AS title, doc.description AS description, \
     doc.file_name AS file_name, doc.file_path AS file_path, doc.file_type AS file_type, doc.file_size AS file_size, \
     doc.category_id AS category_id, doc.department_id AS department_id, doc.uploaded_by AS uploaded_by, \
     doc.access_level AS access_level, doc.download_count AS download_count, \
     doc.created_at AS created_at, doc.updated_at AS updated_at, \
     c.title AS category_title, c.description AS category_description, dep.name AS department_name, \
     u.name AS uploader_name, u.email AS uploader_email \
     FROM documents doc \
     JOIN categories c ON c.id = doc.category_id \
     JOIN departments dep ON dep.id = doc.department_id \
     JOIN users u ON u.id = doc.uploaded_by";

pub async fn fetch_document(pool: &SqlitePool, document_id: i64) -> AppResult<DbDocument> {
    fetch_document_row(pool, document_id).await.map(|row| row.document)
}

pub async fn fetch_document_row(pool: &SqlitePool, document_id: i64) -> AppResult<DocumentRow> {
    sqlx::query_as::<_, DocumentRow>(&format!("{DOCUMENT_ROW_SELECT} WHERE doc.id = ?"))
        .bind(document_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::not_found("document not found"))
}

pub async fn insert_document(
    pool: &SqlitePool,
    doc: &NewDocument,
    file_path: &str,
    file_size: i64,
    uploaded_by: i64,
) -> AppResult<i64> {
    let now = utc_now();
    let id = sqlx::query(
        "INSERT INTO documents (title, description, title_folded, description_folded, file_name, file_path, \
         file_type, file_size, category_id, department_id, uploaded_by, access_level, download_count, \
         created_at, updated_at) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 0, ?, ?)",
    )
    .bind(&doc.title)
    .bind(&doc.description)
    .bind(fold_case(&doc.title))
    .bind(doc.description.as_deref().map(fold_case))
    .bind(&doc.file_name)
    .bind(file_path)
    .bind(&doc.file_type)
    .bind(file_size)
    .bind(doc.category_id)
    .bind(doc.department_id)
    .bind(uploaded_by)
    .bind(doc.access_level.as_str())
    .bind(now)
    .bind(now)
    .execute(pool)
    .await?
    .last_insert_rowid();
    Ok(id)
}

/// Writes only the columns present in `changes`, plus `updated_at`.
pub async fn update_document(pool: &SqlitePool, document_id: i64, changes: &DocumentChanges) -> AppResult<()> {
    let mut qb = update_query(document_id, changes);
    let affected = qb.build().execute(pool).await?.rows_affected();
    if affected == 0 {
        return Err(AppError::not_found("document not found"));
    }
    Ok(())
}

fn update_query(document_id: i64, changes: &DocumentChanges) -> QueryBuilder<'static, Sqlite> {
    let mut qb = QueryBuilder::<Sqlite>::new("UPDATE documents SET ");
    {
        let mut set = qb.separated(", ");
        if let Some(title) = &changes.title {
            set.push("title = ").push_bind_unseparated(title.clone());
            set.push("title_folded = ").push_bind_unseparated(fold_case(title));
        }
        if let Some(description) = &changes.description {
            set.push("description = ").push_bind_unseparated(description.clone());
            set.push("description_folded = ")
                .push_bind_unseparated(description.as_deref().map(fold_case));
        }
        if let Some(category_id) = changes.category_id {
            set.push("category_id = ").push_bind_unseparated(category_id);
        }
        if let Some(department_id) = changes.department_id {
            set.push("department_id = ").push_bind_unseparated(department_id);
        }
        if let Some(access_level) = changes.access_level {
            set.push("access_level = ").push_bind_unseparated(access_level.as_str());
        }
        set.push("updated_at = ").push_bind_unseparated(utc_now());
    }
    qb.push(" WHERE id = ").push_bind(document_id);
    qb
}

pub async fn delete_document(pool: &SqlitePool, document_id: i64) -> AppResult<()> {
    sqlx::query("DELETE FROM documents WHERE id = ?")
        .bind(document_id)
        .execute(pool)
        .await?;
    Ok(())
}

/// Single-statement increment so concurrent downloads never lose a count.
pub async fn increment_download_count(pool: &SqlitePool, document_id: i64) -> AppResult<()> {
    let affected = sqlx::query("UPDATE documents SET download_count = download_count + 1 WHERE id = ?")
        .bind(document_id)
        .execute(pool)
        .await?
        .rows_affected();
    if affected == 0 {
        return Err(AppError::not_found("document not found"));
    }
    Ok(())
}

pub async fn count_documents(pool: &SqlitePool, predicate: &Predicate) -> AppResult<i64> {
    let mut qb = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM documents doc WHERE ");
    push_predicate(&mut qb, predicate);
    let count = qb.build_query_scalar::<i64>().fetch_one(pool).await?;
    Ok(count)
}

/// Newest documents matching `predicate`, ties broken by id.
pub async fn latest_documents(pool: &SqlitePool, predicate: &Predicate, limit: i64) -> AppResult<Vec<DocumentRow>> {
    let mut qb = QueryBuilder::<Sqlite>::new(DOCUMENT_ROW_SELECT);
    qb.push(" WHERE ");
    push_predicate(&mut qb, predicate);
    qb.push(" ORDER BY doc.created_at DESC, doc.id DESC LIMIT ").push_bind(limit);
    let rows = qb.build_query_as::<DocumentRow>().fetch_all(pool).await?;
    Ok(rows)
}
