use sqlx::SqlitePool;

use crate::errors::AppResult;
use crate::models::category::Category;
use crate::utils::utc_now;

pub async fn list_categories(pool: &SqlitePool) -> AppResult<Vec<Category>> {
    let categories = sqlx::query_as::<_, Category>(
        "SELECT id, title, description, created_at, updated_at FROM categories ORDER BY id",
    )
    .fetch_all(pool)
    .await?;
    Ok(categories)
}

pub async fn category_exists(pool: &SqlitePool, category_id: i64) -> AppResult<bool> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(1) FROM categories WHERE id = ?")
        .bind(category_id)
        .fetch_one(pool)
        .await?;
    Ok(count > 0)
}

pub async fn create_category(pool: &SqlitePool, title: &str, description: Option<&str>) -> AppResult<i64> {
    let now = utc_now();
    let id = sqlx::query("INSERT INTO categories (title, description, created_at, updated_at) VALUES (?, ?, ?, ?)")
        .bind(title)
        .bind(description)
        .bind(now)
        .bind(now)
        .execute(pool)
        .await?
        .last_insert_rowid();
    Ok(id)
}
