use axum::extract::State;
use axum::Json;

use crate::app::AppState;
use crate::dashboard::{build_dashboard, DashboardResponse};
use crate::errors::AppResult;
use crate::jwt::AuthUser;

#[utoipa::path(
    get,
    path = "/api/v1/dashboard",
    tag = "Dashboard",
    security(("bearerAuth" = [])),
    responses((status = 200, description = "Document counts and recent uploads", body = DashboardResponse))
)]
pub async fn dashboard(State(state): State<AppState>, auth: AuthUser) -> AppResult<Json<DashboardResponse>> {
    let dashboard = build_dashboard(&state.pool, &auth.principal).await?;
    Ok(Json(dashboard))
}
