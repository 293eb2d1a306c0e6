pub mod app;
pub mod authz;
pub mod dashboard;
pub mod db;
pub mod docs;
pub mod errors;
pub mod extract;
pub mod jwt;
pub mod models;
pub mod query;
pub mod routes;
pub mod session;
pub mod storage;
pub mod utils;

pub use app::{create_app, router, AppState};
