use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

use super::category::CategorySummary;
use super::department::DepartmentSummary;
use super::double_option;
use super::user::UploaderSummary;
use crate::authz::{AccessLevel, DocumentContext};
use crate::errors::FieldErrors;

pub const MAX_TITLE_LENGTH: usize = 255;
pub const MAX_DESCRIPTION_LENGTH: usize = 1000;
pub const MAX_FILE_SIZE: usize = 10 * 1024 * 1024;
pub const ALLOWED_EXTENSIONS: [&str; 6] = ["pdf", "docx", "xlsx", "jpg", "jpeg", "png"];

/// A document as stored, including the blob path.
#[derive(Debug, Clone, FromRow)]
pub struct DbDocument {
    pub id: i64,
    pub title: String,
    pub description: Option<String>,
    pub file_name: String,
    pub file_path: String,
    pub file_type: String,
    pub file_size: i64,
    pub category_id: i64,
    pub department_id: i64,
    pub uploaded_by: i64,
    pub access_level: AccessLevel,
    pub download_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl DbDocument {
    pub fn context(&self) -> DocumentContext {
        DocumentContext {
            document_id: self.id,
            department_id: self.department_id,
            uploaded_by: self.uploaded_by,
            access_level: self.access_level,
        }
    }
}

/// A stored document joined with its category, department and uploader.
#[derive(Debug, Clone, FromRow)]
pub struct DocumentRow {
    #[sqlx(flatten)]
    pub document: DbDocument,
    pub category_title: String,
    pub category_description: Option<String>,
    pub department_name: String,
    pub uploader_name: String,
    pub uploader_email: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Document {
    pub id: i64,
    pub title: String,
    pub description: Option<String>,
    #[schema(example = "handbook.pdf")]
    pub file_name: String,
    #[schema(example = "pdf")]
    pub file_type: String,
    pub file_size: i64,
    pub category_id: i64,
    pub category: CategorySummary,
    pub department_id: i64,
    pub department: DepartmentSummary,
    pub uploaded_by: i64,
    pub uploader: UploaderSummary,
    pub access_level: AccessLevel,
    pub download_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<DocumentRow> for Document {
    fn from(row: DocumentRow) -> Self {
        let doc = row.document;
        Document {
            id: doc.id,
            title: doc.title,
            description: doc.description,
            file_name: doc.file_name,
            file_type: doc.file_type,
            file_size: doc.file_size,
            category_id: doc.category_id,
            category: CategorySummary {
                id: doc.category_id,
                title: row.category_title,
                description: row.category_description,
            },
            department_id: doc.department_id,
            department: DepartmentSummary {
                id: doc.department_id,
                name: row.department_name,
            },
            uploaded_by: doc.uploaded_by,
            uploader: UploaderSummary {
                id: doc.uploaded_by,
                name: row.uploader_name,
                email: row.uploader_email,
            },
            access_level: doc.access_level,
            download_count: doc.download_count,
            created_at: doc.created_at,
            updated_at: doc.updated_at,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct DocumentEnvelope {
    pub data: Document,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct DocumentMutationResponse {
    pub message: String,
    pub data: Document,
}

/// Multipart upload body, documented for OpenAPI only.
#[derive(Debug, ToSchema)]
#[allow(dead_code)]
pub struct DocumentUploadForm {
    #[schema(example = "Employee Handbook")]
    title: String,
    description: Option<String>,
    category_id: i64,
    department_id: i64,
    access_level: AccessLevel,
    #[schema(value_type = String, format = Binary)]
    file: Vec<u8>,
}

#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub name: String,
    pub bytes: Vec<u8>,
}

/// Raw multipart fields as received.
#[derive(Debug, Clone, Default)]
pub struct UploadFields {
    pub title: Option<String>,
    pub description: Option<String>,
    pub category_id: Option<String>,
    pub department_id: Option<String>,
    pub access_level: Option<String>,
    pub file: Option<UploadedFile>,
}

/// A validated upload, ready to be stored.
#[derive(Debug, Clone)]
pub struct NewDocument {
    pub title: String,
    pub description: Option<String>,
    pub category_id: i64,
    pub department_id: i64,
    pub access_level: AccessLevel,
    pub file_name: String,
    pub file_type: String,
    pub bytes: Vec<u8>,
}

impl UploadFields {
    /// Shape checks on every field. Returns the parsed document only when no
    /// field failed; reference checks against the database come afterwards.
    pub fn validate(self, errors: &mut FieldErrors) -> Option<NewDocument> {
        let title = required_title(self.title.as_deref(), errors);
        let description = optional_description(self.description.as_deref(), errors);
        let category_id = required_id("category_id", self.category_id.as_deref(), errors);
        let department_id = required_id("department_id", self.department_id.as_deref(), errors);
        let access_level = required_access_level(self.access_level.as_deref(), errors);
        let file = check_file(self.file, errors);

        if !errors.is_empty() {
            return None;
        }
        let (file, file_type) = file?;

        Some(NewDocument {
            title: title?,
            description,
            category_id: category_id?,
            department_id: department_id?,
            access_level: access_level?,
            file_name: file.name,
            file_type,
            bytes: file.bytes,
        })
    }
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct DocumentUpdateRequest {
    #[serde(default, deserialize_with = "double_option")]
    #[schema(value_type = Option<String>)]
    pub title: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    #[schema(value_type = Option<String>)]
    pub description: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    #[schema(value_type = Option<i64>)]
    pub category_id: Option<Option<i64>>,
    #[serde(default, deserialize_with = "double_option")]
    #[schema(value_type = Option<i64>)]
    pub department_id: Option<Option<i64>>,
    #[serde(default, deserialize_with = "double_option")]
    #[schema(value_type = Option<String>)]
    pub access_level: Option<Option<String>>,
}

/// Validated metadata changes; `None` leaves the stored value untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DocumentChanges {
    pub title: Option<String>,
    pub description: Option<Option<String>>,
    pub category_id: Option<i64>,
    pub department_id: Option<i64>,
    pub access_level: Option<AccessLevel>,
}

impl DocumentUpdateRequest {
    pub fn validate(self, errors: &mut FieldErrors) -> DocumentChanges {
        let title = self.title.and_then(|title| required_title(title.as_deref(), errors));
        let description = self
            .description
            .map(|description| optional_description(description.as_deref(), errors));
        let category_id = self.category_id.and_then(|id| not_null("category_id", id, errors));
        let department_id = self.department_id.and_then(|id| not_null("department_id", id, errors));
        let access_level = self
            .access_level
            .and_then(|level| required_access_level(level.as_deref(), errors));

        DocumentChanges {
            title,
            description,
            category_id,
            department_id,
            access_level,
        }
    }
}

fn required_title(value: Option<&str>, errors: &mut FieldErrors) -> Option<String> {
    match value.map(str::trim).filter(|v| !v.is_empty()) {
        None => {
            errors.add("title", "the title field is required");
            None
        }
        Some(title) if title.chars().count() > MAX_TITLE_LENGTH => {
            errors.add("title", format!("the title may not be greater than {MAX_TITLE_LENGTH} characters"));
            None
        }
        Some(title) => Some(title.to_string()),
    }
}

fn optional_description(value: Option<&str>, errors: &mut FieldErrors) -> Option<String> {
    let description = value.map(str::trim).filter(|v| !v.is_empty())?;
    if description.chars().count() > MAX_DESCRIPTION_LENGTH {
        errors.add(
            "description",
            format!("the description may not be greater than {MAX_DESCRIPTION_LENGTH} characters"),
        );
        return None;
    }
    Some(description.to_string())
}

fn required_id(field: &str, value: Option<&str>, errors: &mut FieldErrors) -> Option<i64> {
    match value.map(str::trim).filter(|v| !v.is_empty()) {
        None => {
            errors.add(field, format!("the {field} field is required"));
            None
        }
        Some(raw) => match raw.parse::<i64>() {
            Ok(id) => Some(id),
            Err(_) => {
                errors.add(field, format!("the {field} must be an integer"));
                None
            }
        },
    }
}

fn required_access_level(value: Option<&str>, errors: &mut FieldErrors) -> Option<AccessLevel> {
    match value.map(str::trim).filter(|v| !v.is_empty()) {
        None => {
            errors.add("access_level", "the access_level field is required");
            None
        }
        Some(raw) => match raw.parse::<AccessLevel>() {
            Ok(level) => Some(level),
            Err(message) => {
                errors.add("access_level", message);
                None
            }
        },
    }
}

fn not_null<T>(field: &str, value: Option<T>, errors: &mut FieldErrors) -> Option<T> {
    if value.is_none() {
        errors.add(field, format!("the {field} field may not be null"));
    }
    value
}

/// Returns the file with its lowercased extension.
fn check_file(file: Option<UploadedFile>, errors: &mut FieldErrors) -> Option<(UploadedFile, String)> {
    let Some(file) = file else {
        errors.add("file", "the file field is required");
        return None;
    };

    let extension = Path::new(&file.name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();

    let mut ok = true;
    if !ALLOWED_EXTENSIONS.contains(&extension.as_str()) {
        errors.add(
            "file",
            format!("the file must be a file of type: {}", ALLOWED_EXTENSIONS.join(", ")),
        );
        ok = false;
    }
    if file.bytes.len() > MAX_FILE_SIZE {
        errors.add("file", format!("the file may not be greater than {} kilobytes", MAX_FILE_SIZE / 1024));
        ok = false;
    }

    ok.then_some((file, extension))
}
