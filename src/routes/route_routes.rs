use axum::{
    extract::{rejection::PathRejection, Path, State},
    routing::{get, post},
    Json, Router,
};
use uuid::Uuid;

use crate::controllers::RouteController;
use crate::dto::route_dto::RouteResponse;
use crate::middleware::OrganizationContext;
use crate::state::AppState;
use crate::utils::errors::AppError;

pub fn create_route_router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_routes))
        .route("/optimize", post(optimize_routes))
        .route("/:id", get(get_route))
}

fn controller(state: &AppState) -> RouteController {
    RouteController::new(state.store.clone(), state.optimizer.clone())
}

async fn optimize_routes(
    State(state): State<AppState>,
    context: OrganizationContext,
) -> Result<Json<Vec<RouteResponse>>, AppError> {
    let response = controller(&state).optimize(context.organization_id).await?;
    Ok(Json(response))
}

async fn list_routes(
    State(state): State<AppState>,
    context: OrganizationContext,
) -> Result<Json<Vec<RouteResponse>>, AppError> {
    let response = controller(&state).list(context.organization_id).await?;
    Ok(Json(response))
}

async fn get_route(
    State(state): State<AppState>,
    context: OrganizationContext,
    path: Result<Path<Uuid>, PathRejection>,
) -> Result<Json<RouteResponse>, AppError> {
    let Path(id) = path.map_err(|e| AppError::BadRequest(format!("Invalid route id: {}", e.body_text())))?;
    let response = controller(&state).get_by_id(context.organization_id, id).await?;
    Ok(Json(response))
}
