use std::sync::Arc;

use axum::{routing::get, Json, Router};
use utoipa::openapi::security::{Http, HttpAuthScheme, SecurityScheme};
use utoipa::openapi::Server;
use utoipa::{Modify, OpenApi};
use utoipa_swagger_ui::SwaggerUi;

use crate::authz::{AccessLevel, Role};
use crate::dashboard::{DashboardResponse, DashboardStats};
use crate::models;
use crate::query::{DocumentPage, PageMeta};
use crate::routes;

#[derive(OpenApi)]
#[openapi(
    paths(
        routes::health::health,
        routes::auth::register,
        routes::auth::login,
        routes::auth::logout,
        routes::auth::me,
        routes::departments::list_departments,
        routes::categories::list_categories,
        routes::dashboard::dashboard,
        routes::documents::index,
        routes::documents::store,
        routes::documents::show,
        routes::documents::update,
        routes::documents::destroy,
        routes::documents::download
    ),
    components(
        schemas(
            AccessLevel,
            Role,
            models::MessageResponse,
            models::user::User,
            models::user::UploaderSummary,
            models::user::AuthResponse,
            models::user::UserEnvelope,
            models::user::LoginRequest,
            models::user::RegisterRequest,
            models::department::Department,
            models::department::DepartmentSummary,
            models::department::DepartmentList,
            models::category::Category,
            models::category::CategorySummary,
            models::category::CategoryList,
            models::document::Document,
            models::document::DocumentEnvelope,
            models::document::DocumentMutationResponse,
            models::document::DocumentUploadForm,
            models::document::DocumentUpdateRequest,
            DocumentPage,
            PageMeta,
            DashboardStats,
            DashboardResponse,
            routes::health::HealthResponse
        )
    ),
    modifiers(&BearerAuth),
    tags(
        (name = "Auth", description = "Registration, login and bearer tokens"),
        (name = "Documents", description = "Document listing, upload and management"),
        (name = "Dashboard", description = "Per-user document statistics"),
        (name = "Reference", description = "Departments and categories"),
        (name = "Health", description = "Service health")
    )
)]
pub struct ApiDoc;

struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        let mut scheme = Http::new(HttpAuthScheme::Bearer);
        scheme.bearer_format = Some("JWT".to_string());
        components.add_security_scheme("bearerAuth", SecurityScheme::Http(scheme));
    }
}

pub fn build_openapi(port: u16) -> utoipa::openapi::OpenApi {
    let mut doc = ApiDoc::openapi();
    doc.servers = Some(vec![Server::new(format!("http://localhost:{port}"))]);
    doc
}

pub fn swagger_routes(doc: utoipa::openapi::OpenApi) -> Router {
    let swagger_config = utoipa_swagger_ui::Config::new(["/api-docs/openapi.json"])
        .try_it_out_enabled(true)
        .with_credentials(true)
        .persist_authorization(true);

    let doc = Arc::new(doc);
    let json_route = get(move || {
        let doc = Arc::clone(&doc);
        async move { Json(doc.as_ref().clone()) }
    });

    Router::new()
        .route("/api-docs/openapi.json", json_route)
        .merge(SwaggerUi::new("/docs").config(swagger_config))
}
