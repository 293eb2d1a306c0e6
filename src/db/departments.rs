use sqlx::SqlitePool;

use crate::errors::AppResult;
use crate::models::department::Department;
use crate::utils::utc_now;

pub async fn list_departments(pool: &SqlitePool) -> AppResult<Vec<Department>> {
    let departments = sqlx::query_as::<_, Department>(
        "SELECT id, name, created_at, updated_at FROM departments ORDER BY id",
    )
    .fetch_all(pool)
    .await?;
    Ok(departments)
}

pub async fn department_exists(pool: &SqlitePool, department_id: i64) -> AppResult<bool> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(1) FROM departments WHERE id = ?")
        .bind(department_id)
        .fetch_one(pool)
        .await?;
    Ok(count > 0)
}

pub async fn find_department_by_name(pool: &SqlitePool, name: &str) -> AppResult<Option<i64>> {
    let id = sqlx::query_scalar("SELECT id FROM departments WHERE name = ?")
        .bind(name)
        .fetch_optional(pool)
        .await?;
    Ok(id)
}

pub async fn create_department(pool: &SqlitePool, name: &str) -> AppResult<i64> {
    let now = utc_now();
    let id = sqlx::query("INSERT INTO departments (name, created_at, updated_at) VALUES (?, ?, ?)")
        .bind(name)
        .bind(now)
        .bind(now)
        .execute(pool)
        .await?
        .last_insert_rowid();
    Ok(id)
}
