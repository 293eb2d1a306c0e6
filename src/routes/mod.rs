pub mod auth;
pub mod categories;
pub mod dashboard;
pub mod departments;
pub mod documents;
pub mod health;
