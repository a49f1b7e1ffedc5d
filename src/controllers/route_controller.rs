use std::sync::Arc;
use uuid::Uuid;

use crate::dto::route_dto::RouteResponse;
use crate::models::OrganizationId;
use crate::repositories::EntityStore;
use crate::services::RouteOptimizationService;
use crate::utils::errors::{internal_error, not_found_error, AppResult};

pub struct RouteController {
    store: Arc<dyn EntityStore>,
    optimizer: Arc<RouteOptimizationService>,
}

impl RouteController {
    pub fn new(store: Arc<dyn EntityStore>, optimizer: Arc<RouteOptimizationService>) -> Self {
        Self { store, optimizer }
    }

    /// Lanzar una ejecución de optimización para la organización.
    ///
    /// La ejecución corre en su propia tarea: si el cliente corta la conexión
    /// la ejecución termina igualmente y sus claims nunca quedan colgados.
    pub async fn optimize(&self, organization_id: OrganizationId) -> AppResult<Vec<RouteResponse>> {
        let optimizer = self.optimizer.clone();
        let run = tokio::spawn(async move { optimizer.optimize_routes(organization_id).await });

        let routes = run.await.map_err(|e| {
            log::error!("❌ La tarea de optimización terminó de forma anómala: {}", e);
            internal_error("Optimization task aborted")
        })??;

        Ok(routes.into_iter().map(RouteResponse::from).collect())
    }

    pub async fn list(&self, organization_id: OrganizationId) -> AppResult<Vec<RouteResponse>> {
        let routes = self.store.list_routes(organization_id).await?;
        Ok(routes.into_iter().map(RouteResponse::from).collect())
    }

    pub async fn get_by_id(&self, organization_id: OrganizationId, id: Uuid) -> AppResult<RouteResponse> {
        self.store
            .find_route(organization_id, id)
            .await?
            .map(RouteResponse::from)
            .ok_or_else(|| not_found_error("Route", &id.to_string()))
    }
}
