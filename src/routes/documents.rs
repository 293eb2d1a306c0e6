use axum::extract::multipart::MultipartError;
use axum::extract::{Multipart, Path, Query, State};
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::Json;
use sqlx::SqlitePool;

use crate::app::AppState;
use crate::authz::gate;
use crate::db;
use crate::errors::{AppError, AppResult, FieldErrors};
use crate::extract::JsonBody;
use crate::jwt::AuthUser;
use crate::models::document::{
    Document, DocumentEnvelope, DocumentMutationResponse, DocumentUpdateRequest, DocumentUploadForm, UploadFields,
    UploadedFile, MAX_FILE_SIZE,
};
use crate::models::MessageResponse;
use crate::query::{list_documents, DocumentListQuery, DocumentPage};

#[utoipa::path(
    get,
    path = "/api/v1/documents",
    tag = "Documents",
    security(("bearerAuth" = [])),
    params(DocumentListQuery),
    responses(
        (status = 200, description = "Visible documents, paginated", body = DocumentPage),
        (status = 422, description = "Malformed listing parameters")
    )
)]
pub async fn index(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(query): Query<DocumentListQuery>,
) -> AppResult<Json<DocumentPage>> {
    let request = query.normalize().map_err(AppError::Validation)?;

    if let Some(category_id) = request.category_id {
        if !db::categories::category_exists(&state.pool, category_id).await? {
            return Err(AppError::validation("category_id", "the selected category_id is invalid"));
        }
    }

    let page = list_documents(&state.pool, &auth.principal, &request).await?;
    Ok(Json(page))
}

#[utoipa::path(
    post,
    path = "/api/v1/documents",
    tag = "Documents",
    security(("bearerAuth" = [])),
    request_body(content = DocumentUploadForm, content_type = "multipart/form-data"),
    responses(
        (status = 201, description = "Document uploaded", body = DocumentMutationResponse),
        (status = 403, description = "Caller may not upload here"),
        (status = 422, description = "Validation failed")
    )
)]
pub async fn store(
    State(state): State<AppState>,
    auth: AuthUser,
    multipart: Multipart,
) -> AppResult<(StatusCode, Json<DocumentMutationResponse>)> {
    let principal = &auth.principal;
    gate::authorize_upload(principal)?;

    let fields = read_upload_fields(multipart).await?;

    let mut errors = FieldErrors::new();
    let new_doc = fields.validate(&mut errors);
    let Some(mut new_doc) = new_doc else {
        return Err(AppError::Validation(errors));
    };
    check_references(&state.pool, Some(new_doc.category_id), Some(new_doc.department_id), &mut errors).await?;
    errors.into_result()?;

    gate::authorize_upload_department(principal, new_doc.department_id)?;

    let bytes = std::mem::take(&mut new_doc.bytes);
    let file_size = bytes.len() as i64;
    let file_path = state.blobs.put(bytes, &new_doc.file_type).await?;
    let inserted = db::documents::insert_document(&state.pool, &new_doc, &file_path, file_size, principal.user_id).await;
    let document_id = match inserted {
        Ok(id) => id,
        Err(err) => {
            if let Err(cleanup) = state.blobs.delete(&file_path).await {
                tracing::error!(file_path = %file_path, error = %cleanup, "failed to release blob after insert failure");
            }
            return Err(err);
        }
    };

    tracing::info!(
        document_id,
        user_id = principal.user_id,
        department_id = new_doc.department_id,
        file_size,
        "document uploaded"
    );

    let document: Document = db::documents::fetch_document_row(&state.pool, document_id).await?.into();
    Ok((
        StatusCode::CREATED,
        Json(DocumentMutationResponse {
            message: "Document uploaded successfully".to_string(),
            data: document,
        }),
    ))
}

#[utoipa::path(
    get,
    path = "/api/v1/documents/{id}",
    tag = "Documents",
    security(("bearerAuth" = [])),
    params(("id" = i64, Path, description = "Document id")),
    responses(
        (status = 200, description = "Document detail", body = DocumentEnvelope),
        (status = 403, description = "Not authorized to view"),
        (status = 404, description = "Document not found")
    )
)]
pub async fn show(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<i64>,
) -> AppResult<Json<DocumentEnvelope>> {
    let row = db::documents::fetch_document_row(&state.pool, id).await?;
    gate::authorize_view(&auth.principal, &row.document.context())?;
    Ok(Json(DocumentEnvelope { data: row.into() }))
}

#[utoipa::path(
    patch,
    path = "/api/v1/documents/{id}",
    tag = "Documents",
    security(("bearerAuth" = [])),
    params(("id" = i64, Path, description = "Document id")),
    request_body = DocumentUpdateRequest,
    responses(
        (status = 200, description = "Document updated", body = DocumentMutationResponse),
        (status = 403, description = "Not authorized to edit"),
        (status = 404, description = "Document not found"),
        (status = 422, description = "Validation failed")
    )
)]
pub async fn update(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<i64>,
    JsonBody(payload): JsonBody<DocumentUpdateRequest>,
) -> AppResult<Json<DocumentMutationResponse>> {
    let principal = &auth.principal;
    let doc = db::documents::fetch_document(&state.pool, id).await?;
    gate::authorize_update(principal, &doc.context())?;

    let mut errors = FieldErrors::new();
    let changes = payload.validate(&mut errors);
    check_references(&state.pool, changes.category_id, changes.department_id, &mut errors).await?;
    errors.into_result()?;

    gate::authorize_department_change(principal, changes.department_id)?;

    db::documents::update_document(&state.pool, id, &changes).await?;

    tracing::info!(document_id = id, user_id = principal.user_id, "document updated");

    let document: Document = db::documents::fetch_document_row(&state.pool, id).await?.into();
    Ok(Json(DocumentMutationResponse {
        message: "Document updated successfully".to_string(),
        data: document,
    }))
}

#[utoipa::path(
    delete,
    path = "/api/v1/documents/{id}",
    tag = "Documents",
    security(("bearerAuth" = [])),
    params(("id" = i64, Path, description = "Document id")),
    responses(
        (status = 200, description = "Document and file removed", body = MessageResponse),
        (status = 403, description = "Not authorized to delete"),
        (status = 404, description = "Document not found")
    )
)]
pub async fn destroy(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<i64>,
) -> AppResult<Json<MessageResponse>> {
    let principal = &auth.principal;
    let doc = db::documents::fetch_document(&state.pool, id).await?;
    gate::authorize_delete(principal, &doc.context())?;

    // The record goes only once its file is gone.
    if let Err(err) = state.blobs.delete(&doc.file_path).await {
        tracing::error!(document_id = id, file_path = %doc.file_path, error = %err, "failed to release blob");
        return Err(err.into());
    }
    db::documents::delete_document(&state.pool, id).await?;

    tracing::info!(document_id = id, user_id = principal.user_id, "document deleted");
    Ok(Json(MessageResponse::new("Document deleted successfully")))
}

#[utoipa::path(
    get,
    path = "/api/v1/documents/{id}/download",
    tag = "Documents",
    security(("bearerAuth" = [])),
    params(("id" = i64, Path, description = "Document id")),
    responses(
        (status = 200, description = "File contents as application/octet-stream"),
        (status = 403, description = "Not authorized to download"),
        (status = 404, description = "Document or file not found")
    )
)]
pub async fn download(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<i64>,
) -> AppResult<impl IntoResponse> {
    let doc = db::documents::fetch_document(&state.pool, id).await?;
    gate::authorize_download(&auth.principal, &doc.context())?;

    if !state.blobs.exists(&doc.file_path).await? {
        tracing::warn!(document_id = id, file_path = %doc.file_path, "stored file is missing");
        return Err(AppError::not_found("file not found"));
    }
    let bytes = state.blobs.get(&doc.file_path).await?;
    db::documents::increment_download_count(&state.pool, id).await?;

    tracing::info!(document_id = id, user_id = auth.principal.user_id, "document downloaded");

    let headers = [
        (header::CONTENT_TYPE, "application/octet-stream".to_string()),
        (
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{}\"", disposition_filename(&doc.file_name)),
        ),
    ];
    Ok((headers, bytes))
}

async fn read_upload_fields(mut multipart: Multipart) -> AppResult<UploadFields> {
    let mut fields = UploadFields::default();

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let Some(name) = field.name().map(str::to_string) else {
            continue;
        };

        if name == "file" {
            let file_name = field.file_name().unwrap_or_default().to_string();
            let bytes = field.bytes().await.map_err(multipart_error)?;
            fields.file = Some(UploadedFile {
                name: file_name,
                bytes: bytes.to_vec(),
            });
            continue;
        }

        let value = field.text().await.map_err(multipart_error)?;
        match name.as_str() {
            "title" => fields.title = Some(value),
            "description" => fields.description = Some(value),
            "category_id" => fields.category_id = Some(value),
            "department_id" => fields.department_id = Some(value),
            "access_level" => fields.access_level = Some(value),
            _ => {}
        }
    }

    Ok(fields)
}

fn multipart_error(err: MultipartError) -> AppError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        return AppError::validation(
            "file",
            format!("the file may not be greater than {} kilobytes", MAX_FILE_SIZE / 1024),
        );
    }
    AppError::bad_request(err.body_text())
}

async fn check_references(
    pool: &SqlitePool,
    category_id: Option<i64>,
    department_id: Option<i64>,
    errors: &mut FieldErrors,
) -> AppResult<()> {
    if let Some(id) = category_id {
        if !db::categories::category_exists(pool, id).await? {
            errors.add("category_id", "the selected category_id is invalid");
        }
    }
    if let Some(id) = department_id {
        if !db::departments::department_exists(pool, id).await? {
            errors.add("department_id", "the selected department_id is invalid");
        }
    }
    Ok(())
}

fn disposition_filename(name: &str) -> String {
    name.chars()
        .map(|c| if c == '"' || c == '\\' || c.is_control() { '_' } else { c })
        .collect()
}
