use sqlx::SqlitePool;

use crate::authz::{Principal, Role};
use crate::errors::{AppError, AppResult};
use crate::models::user::{DbUser, User};
use crate::utils::utc_now;

const USER_SELECT: &str = "SELECT u.id AS id, u.name AS name, u.email AS email, u.password_hash AS password_hash, \
     u.department_id AS department_id, d.name AS department_name, u.created_at AS created_at, u.updated_at AS updated_at \
     FROM users u JOIN departments d ON d.id = u.department_id";

pub struct NewUser<'a> {
    pub name: &'a str,
    pub email: &'a str,
    pub password_hash: &'a str,
    pub department_id: i64,
}

pub async fn fetch_user_by_email(pool: &SqlitePool, email: &str) -> AppResult<Option<DbUser>> {
    let user = sqlx::query_as::<_, DbUser>(&format!("{USER_SELECT} WHERE u.email = ?"))
        .bind(email)
        .fetch_optional(pool)
        .await?;
    Ok(user)
}

pub async fn fetch_user_by_id(pool: &SqlitePool, user_id: i64) -> AppResult<DbUser> {
    sqlx::query_as::<_, DbUser>(&format!("{USER_SELECT} WHERE u.id = ?"))
        .bind(user_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::not_found("user not found"))
}

pub async fn email_taken(pool: &SqlitePool, email: &str) -> AppResult<bool> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(1) FROM users WHERE email = ?")
        .bind(email)
        .fetch_one(pool)
        .await?;
    Ok(count > 0)
}

pub async fn fetch_role_names(pool: &SqlitePool, user_id: i64) -> AppResult<Vec<String>> {
    let names = sqlx::query_scalar::<_, String>(
        "SELECT r.name FROM roles r JOIN user_roles ur ON ur.role_id = r.id WHERE ur.user_id = ? ORDER BY r.id",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;
    Ok(names)
}

/// Identity and roles of a stored user, as consumed by the access policy.
pub async fn load_principal(pool: &SqlitePool, user_id: i64) -> AppResult<Principal> {
    let department_id: i64 = sqlx::query_scalar("SELECT department_id FROM users WHERE id = ?")
        .bind(user_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::not_found("user not found"))?;

    let names = fetch_role_names(pool, user_id).await?;
    Principal::from_role_names(user_id, department_id, names.as_slice())
}

/// The public user resource, roles listed highest first.
pub async fn load_user(pool: &SqlitePool, user_id: i64) -> AppResult<User> {
    let db_user = fetch_user_by_id(pool, user_id).await?;
    let principal = load_principal(pool, user_id).await?;
    let roles = principal.roles().iter().rev().copied().collect();
    Ok(db_user.into_user(roles))
}

/// Inserts the user together with its role assignments.
pub async fn create_user(pool: &SqlitePool, user: NewUser<'_>, roles: &[Role]) -> AppResult<i64> {
    let now = utc_now();
    let mut tx = pool.begin().await?;

    let user_id = sqlx::query(
        "INSERT INTO users (name, email, password_hash, department_id, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(user.name)
    .bind(user.email)
    .bind(user.password_hash)
    .bind(user.department_id)
    .bind(now)
    .bind(now)
    .execute(&mut *tx)
    .await?
    .last_insert_rowid();

    for role in roles {
        let assigned = sqlx::query("INSERT INTO user_roles (user_id, role_id) SELECT ?, id FROM roles WHERE name = ?")
            .bind(user_id)
            .bind(role.as_str())
            .execute(&mut *tx)
            .await?
            .rows_affected();
        if assigned == 0 {
            return Err(AppError::internal(format!("role '{role}' is not seeded")));
        }
    }

    tx.commit().await?;
    tracing::info!(user_id, email = user.email, "user created");
    Ok(user_id)
}
