use axum::extract::State;
use axum::Json;

use crate::app::AppState;
use crate::db;
use crate::errors::AppResult;
use crate::models::department::DepartmentList;

/// Public so the registration form can offer a department.
#[utoipa::path(
    get,
    path = "/api/v1/departments",
    tag = "Reference",
    responses((status = 200, description = "All departments", body = DepartmentList))
)]
pub async fn list_departments(State(state): State<AppState>) -> AppResult<Json<DepartmentList>> {
    let data = db::departments::list_departments(&state.pool).await?;
    Ok(Json(DepartmentList { data }))
}
