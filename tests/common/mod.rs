#![allow(dead_code)]

use std::sync::Arc;

use anyhow::{Context, Result};
use axum::body::{self, Body};
use axum::http::{HeaderMap, Request, StatusCode};
use axum::Router;
use chrono::{DateTime, Duration, TimeZone, Utc};
use serde_json::Value;
use sqlx::sqlite::SqliteConnectOptions;
use sqlx::SqlitePool;
use tempfile::TempDir;
use tower::util::ServiceExt; // for `oneshot`

use doc_vault::authz::{AccessLevel, Role};
use doc_vault::db;
use doc_vault::jwt::JwtConfig;
use doc_vault::session::{AuthSession, SqliteSessions};
use doc_vault::storage::{BlobStore, MemoryBlobStore};
use doc_vault::utils::{fold_case, hash_password};
use doc_vault::{router, AppState};

pub const PASSWORD: &str = "password123";
const BOUNDARY: &str = "doc-vault-test-boundary";

pub struct TestApp {
    pub app: Router,
    pub pool: SqlitePool,
    pub blobs: Arc<MemoryBlobStore>,
    pub sessions: Arc<SqliteSessions>,
    password_hash: String,
    _dir: TempDir,
}

pub struct Reply {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub bytes: Vec<u8>,
}

impl Reply {
    pub fn json(&self) -> Value {
        serde_json::from_slice(&self.bytes).unwrap_or(Value::Null)
    }
}

#[derive(Debug, Clone)]
pub struct DocSeed {
    pub title: String,
    pub description: Option<String>,
    pub category_id: i64,
    pub department_id: i64,
    pub uploaded_by: i64,
    pub access_level: AccessLevel,
    pub file_size: i64,
    pub download_count: i64,
    /// Seconds after a fixed epoch; larger is newer.
    pub created_offset: i64,
}

impl DocSeed {
    pub fn new(title: &str, category_id: i64, department_id: i64, uploaded_by: i64, access_level: AccessLevel) -> Self {
        Self {
            title: title.to_string(),
            description: None,
            category_id,
            department_id,
            uploaded_by,
            access_level,
            file_size: 0,
            download_count: 0,
            created_offset: 0,
        }
    }
}

fn base_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 1, 1, 9, 0, 0).single().unwrap_or_else(Utc::now)
}

pub async fn spawn() -> Result<TestApp> {
    let dir = tempfile::tempdir().context("failed to create tempdir")?;
    let opts = SqliteConnectOptions::new()
        .filename(dir.path().join("test.db"))
        .create_if_missing(true)
        .foreign_keys(true);
    let pool = SqlitePool::connect_with(opts).await?;

    let migrator =
        sqlx::migrate::Migrator::new(std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("migrations")).await?;
    migrator.run(&pool).await?;

    let sessions = Arc::new(SqliteSessions::new(pool.clone(), JwtConfig::new("test-secret", 1)));
    let blobs = Arc::new(MemoryBlobStore::new());
    let app = router(AppState::new(pool.clone(), sessions.clone(), blobs.clone()));

    Ok(TestApp {
        app,
        pool,
        blobs,
        sessions,
        password_hash: hash_password(PASSWORD)?,
        _dir: dir,
    })
}

impl TestApp {
    pub async fn department(&self, name: &str) -> Result<i64> {
        Ok(db::departments::create_department(&self.pool, name).await?)
    }

    pub async fn category(&self, title: &str) -> Result<i64> {
        Ok(db::categories::create_category(&self.pool, title, Some("seeded")).await?)
    }

    /// Creates a user whose password is `PASSWORD` and returns `(id, bearer token)`.
    pub async fn user(&self, email: &str, department_id: i64, roles: &[Role]) -> Result<(i64, String)> {
        let id = db::users::create_user(
            &self.pool,
            db::users::NewUser {
                name: email.split('@').next().unwrap_or(email),
                email,
                password_hash: &self.password_hash,
                department_id,
            },
            roles,
        )
        .await?;
        let token = self.sessions.issue_token(id).await?;
        Ok((id, token))
    }

    /// Inserts a document record backed by a stored blob.
    pub async fn document(&self, seed: DocSeed) -> Result<i64> {
        let path = self.blobs.put(format!("contents of {}", seed.title).into_bytes(), "pdf").await?;
        let created_at = base_time() + Duration::seconds(seed.created_offset);
        let id = sqlx::query(
            "INSERT INTO documents (title, description, title_folded, description_folded, file_name, file_path, \
             file_type, file_size, category_id, department_id, uploaded_by, access_level, download_count, \
             created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, 'pdf', ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&seed.title)
        .bind(&seed.description)
        .bind(fold_case(&seed.title))
        .bind(seed.description.as_deref().map(fold_case))
        .bind(format!("{}.pdf", seed.title))
        .bind(&path)
        .bind(seed.file_size)
        .bind(seed.category_id)
        .bind(seed.department_id)
        .bind(seed.uploaded_by)
        .bind(seed.access_level.as_str())
        .bind(seed.download_count)
        .bind(created_at)
        .bind(created_at)
        .execute(&self.pool)
        .await?
        .last_insert_rowid();
        Ok(id)
    }

    pub async fn file_path(&self, document_id: i64) -> Result<String> {
        Ok(sqlx::query_scalar("SELECT file_path FROM documents WHERE id = ?")
            .bind(document_id)
            .fetch_one(&self.pool)
            .await?)
    }

    pub async fn download_count(&self, document_id: i64) -> Result<i64> {
        Ok(sqlx::query_scalar("SELECT download_count FROM documents WHERE id = ?")
            .bind(document_id)
            .fetch_one(&self.pool)
            .await?)
    }

    pub async fn send(&self, req: Request<Body>) -> Result<Reply> {
        let resp = self.app.clone().oneshot(req).await?;
        let status = resp.status();
        let headers = resp.headers().clone();
        let bytes = body::to_bytes(resp.into_body(), 32 * 1024 * 1024).await?.to_vec();
        Ok(Reply { status, headers, bytes })
    }

    pub async fn get(&self, uri: &str, token: Option<&str>) -> Result<Reply> {
        let mut builder = Request::builder().method("GET").uri(uri);
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {token}"));
        }
        self.send(builder.body(Body::empty())?).await
    }

    pub async fn delete(&self, uri: &str, token: &str) -> Result<Reply> {
        let req = Request::builder()
            .method("DELETE")
            .uri(uri)
            .header("authorization", format!("Bearer {token}"))
            .body(Body::empty())?;
        self.send(req).await
    }

    pub async fn json(&self, method: &str, uri: &str, token: Option<&str>, body: Value) -> Result<Reply> {
        let mut builder = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json");
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {token}"));
        }
        self.send(builder.body(Body::from(body.to_string()))?).await
    }

    pub async fn upload(&self, token: &str, fields: &[(&str, &str)], file: Option<(&str, &[u8])>) -> Result<Reply> {
        let req = Request::builder()
            .method("POST")
            .uri("/api/v1/documents")
            .header("authorization", format!("Bearer {token}"))
            .header("content-type", format!("multipart/form-data; boundary={BOUNDARY}"))
            .body(Body::from(multipart_body(fields, file)))?;
        self.send(req).await
    }
}

pub fn multipart_body(fields: &[(&str, &str)], file: Option<(&str, &[u8])>) -> Vec<u8> {
    let mut body = Vec::new();
    for (name, value) in fields {
        body.extend_from_slice(
            format!("--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n").as_bytes(),
        );
    }
    if let Some((file_name, bytes)) = file {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{file_name}\"\r\n\
                 Content-Type: application/octet-stream\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(bytes);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

/// Ids of the documents in a listing response, in order.
pub fn ids(reply: &Reply) -> Vec<i64> {
    reply.json()["data"]
        .as_array()
        .map(|docs| docs.iter().filter_map(|doc| doc["id"].as_i64()).collect())
        .unwrap_or_default()
}
