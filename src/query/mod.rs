//! Filtered, searched, sorted and paginated document listings.

mod engine;
mod params;

pub use engine::{list_documents, DocumentPage, PageMeta};
pub use params::{
    DocumentListQuery, ListingRequest, SortField, SortOrder, DEFAULT_PER_PAGE, MAX_PER_PAGE,
};
