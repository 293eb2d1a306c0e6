use axum::extract::State;
use axum::Json;

use crate::app::AppState;
use crate::db;
use crate::errors::AppResult;
use crate::jwt::AuthUser;
use crate::models::category::CategoryList;

#[utoipa::path(
    get,
    path = "/api/v1/categories",
    tag = "Reference",
    security(("bearerAuth" = [])),
    responses((status = 200, description = "All categories", body = CategoryList))
)]
pub async fn list_categories(State(state): State<AppState>, _auth: AuthUser) -> AppResult<Json<CategoryList>> {
    let data = db::categories::list_categories(&state.pool).await?;
    Ok(Json(CategoryList { data }))
}
