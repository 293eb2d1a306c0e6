use serde::Deserialize;
use utoipa::IntoParams;

use crate::authz::AccessLevel;
use crate::errors::FieldErrors;
use crate::utils::filled;

pub const DEFAULT_PER_PAGE: i64 = 20;
pub const MAX_PER_PAGE: i64 = 100;

/// Raw listing parameters. Values arrive as strings so malformed numbers are
/// reported as field errors instead of a generic rejection.
#[derive(Debug, Default, Clone, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct DocumentListQuery {
    /// Case-insensitive substring of title or description
    pub search: Option<String>,
    #[param(value_type = Option<i64>)]
    pub category_id: Option<String>,
    #[param(value_type = Option<i64>)]
    pub department_id: Option<String>,
    #[param(value_type = Option<AccessLevel>)]
    pub access_level: Option<String>,
    /// title, created_at, file_size or download_count
    pub sort_by: Option<String>,
    /// asc or desc
    pub sort_order: Option<String>,
    #[param(value_type = Option<i64>)]
    pub page: Option<String>,
    #[param(value_type = Option<i64>)]
    pub per_page: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortField {
    Title,
    CreatedAt,
    FileSize,
    DownloadCount,
}

impl SortField {
    /// Unknown fields fall back to `created_at`.
    pub fn parse(value: Option<&str>) -> Self {
        match value {
            Some("title") => SortField::Title,
            Some("file_size") => SortField::FileSize,
            Some("download_count") => SortField::DownloadCount,
            _ => SortField::CreatedAt,
        }
    }

    pub fn column(&self) -> &'static str {
        match self {
            SortField::Title => "doc.title COLLATE NOCASE",
            SortField::CreatedAt => "doc.created_at",
            SortField::FileSize => "doc.file_size",
            SortField::DownloadCount => "doc.download_count",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Asc,
    Desc,
}

impl SortOrder {
    /// Anything other than `asc` sorts descending.
    pub fn parse(value: Option<&str>) -> Self {
        match value {
            Some(order) if order.eq_ignore_ascii_case("asc") => SortOrder::Asc,
            _ => SortOrder::Desc,
        }
    }

    pub fn keyword(&self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }
}

/// Normalized listing request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingRequest {
    pub search: Option<String>,
    pub category_id: Option<i64>,
    pub department_id: Option<i64>,
    pub access_level: Option<AccessLevel>,
    pub sort_by: SortField,
    pub sort_order: SortOrder,
    pub page: i64,
    pub per_page: i64,
}

impl Default for ListingRequest {
    fn default() -> Self {
        Self {
            search: None,
            category_id: None,
            department_id: None,
            access_level: None,
            sort_by: SortField::CreatedAt,
            sort_order: SortOrder::Desc,
            page: 1,
            per_page: DEFAULT_PER_PAGE,
        }
    }
}

impl ListingRequest {
    pub fn offset(&self) -> i64 {
        (self.page - 1).saturating_mul(self.per_page)
    }
}

impl DocumentListQuery {
    /// Empty values count as absent; `page` is raised to 1 and `per_page`
    /// clamped to `1..=MAX_PER_PAGE`. Non-integers and unknown access levels
    /// are field errors.
    pub fn normalize(&self) -> Result<ListingRequest, FieldErrors> {
        let mut errors = FieldErrors::new();

        let category_id = integer_param("category_id", self.category_id.as_deref(), &mut errors);
        let department_id = integer_param("department_id", self.department_id.as_deref(), &mut errors);
        let page = integer_param("page", self.page.as_deref(), &mut errors);
        let per_page = integer_param("per_page", self.per_page.as_deref(), &mut errors);

        let access_level = match filled(self.access_level.as_deref()) {
            None => None,
            Some(raw) => match raw.parse::<AccessLevel>() {
                Ok(level) => Some(level),
                Err(message) => {
                    errors.add("access_level", message);
                    None
                }
            },
        };

        if !errors.is_empty() {
            return Err(errors);
        }

        Ok(ListingRequest {
            search: filled(self.search.as_deref()).map(str::to_string),
            category_id,
            department_id,
            access_level,
            sort_by: SortField::parse(filled(self.sort_by.as_deref())),
            sort_order: SortOrder::parse(filled(self.sort_order.as_deref())),
            page: page.unwrap_or(1).max(1),
            per_page: per_page.unwrap_or(DEFAULT_PER_PAGE).clamp(1, MAX_PER_PAGE),
        })
    }
}

fn integer_param(field: &str, value: Option<&str>, errors: &mut FieldErrors) -> Option<i64> {
    let raw = filled(value)?;
    match raw.parse::<i64>() {
        Ok(value) => Some(value),
        Err(_) => {
            errors.add(field, format!("the {field} must be an integer"));
            None
        }
    }
}
