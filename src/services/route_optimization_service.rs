//! Orquestador de optimización de rutas
//!
//! Una ejecución por llamada: reclama los pedidos UNASSIGNED de la
//! organización, consulta al solver, enlaza las paradas y persiste la ruta
//! resultante en una única transacción. Cualquier salida que no sea un commit
//! devuelve los pedidos reclamados a UNASSIGNED.
//!
//! Una ejecución produce como mucho una ruta ligada a un único vehículo (el
//! primero de la organización), aunque el solver reciba todos los vehículos.

use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use crate::clients::solver_client::RouteSolver;
use crate::dto::solver_dto::SolverRequest;
use crate::models::{DeliveryOrder, OrganizationId, RouteDetails, Vehicle};
use crate::repositories::{EntityStore, RoutePlan};
use crate::services::order_route_linker::link_stops;
use crate::utils::errors::{AppError, AppResult};

pub struct RouteOptimizationService {
    store: Arc<dyn EntityStore>,
    solver: Arc<dyn RouteSolver>,
    claim_ttl: Duration,
}

impl RouteOptimizationService {
    pub fn new(store: Arc<dyn EntityStore>, solver: Arc<dyn RouteSolver>, claim_ttl: Duration) -> Self {
        Self {
            store,
            solver,
            claim_ttl,
        }
    }

    /// Optimizar las rutas de una organización.
    ///
    /// Devuelve las rutas creadas (cero o una). Sin pedidos, sin vehículos o
    /// sin solución el resultado es vacío y el almacén queda igual.
    pub async fn optimize_routes(&self, organization_id: OrganizationId) -> AppResult<Vec<RouteDetails>> {
        let run_id = Uuid::new_v4();
        log::info!("🚀 Optimización {} para organización {}", run_id, organization_id);

        let vehicles = self.store.list_vehicles(organization_id).await?;
        if vehicles.is_empty() {
            log::info!("📭 Organización {} sin vehículos, nada que optimizar", organization_id);
            return Ok(Vec::new());
        }

        // Los claims caducados vuelven a ser elegibles para esta misma ejecución
        self.recover_stale_claims(organization_id).await?;

        let orders = self.store.claim_unassigned_orders(organization_id, run_id).await?;
        if orders.is_empty() {
            log::info!("📭 Organización {} sin pedidos pendientes, nada que optimizar", organization_id);
            return Ok(Vec::new());
        }

        log::info!(
            "📦 Ejecución {} reclamó {} pedidos; {} vehículos disponibles",
            run_id,
            orders.len(),
            vehicles.len()
        );

        match self.plan_and_commit(organization_id, run_id, &orders, &vehicles).await {
            Ok(Some(details)) => {
                log::info!(
                    "✅ Ejecución {} creó la ruta {} con {} pedidos (vehículo {})",
                    run_id,
                    details.route.id(),
                    details.orders.len(),
                    details.vehicle.name
                );
                Ok(vec![details])
            }
            Ok(None) => {
                self.release(organization_id, run_id).await?;
                Ok(Vec::new())
            }
            Err(e) => {
                // El error original tiene prioridad sobre un fallo al liberar
                if let Err(release_error) = self.release(organization_id, run_id).await {
                    log::error!(
                        "❌ No se pudieron liberar los pedidos de la ejecución {}: {}",
                        run_id,
                        release_error
                    );
                }
                Err(e)
            }
        }
    }

    async fn plan_and_commit(
        &self,
        organization_id: OrganizationId,
        run_id: Uuid,
        orders: &[DeliveryOrder],
        vehicles: &[Vehicle],
    ) -> AppResult<Option<RouteDetails>> {
        let request = SolverRequest::from_entities(orders, vehicles);
        let solution = self.solver.solve(&request).await?;

        if solution.is_empty() {
            log::info!("🤷 El solver no encontró solución para la ejecución {}", run_id);
            return Ok(None);
        }

        let linked = link_stops(&solution.stops, orders);
        if !linked.skipped.is_empty() {
            log::warn!(
                "⚠️ Ejecución {}: {} de {} paradas descartadas",
                run_id,
                linked.skipped.len(),
                solution.stops.len()
            );
        }
        if linked.is_empty() {
            log::info!("🤷 Ninguna parada del solver corresponde a un pedido de la ejecución {}", run_id);
            return Ok(None);
        }

        let vehicle = vehicles
            .first()
            .ok_or_else(|| AppError::Internal("No vehicle available for the route".to_string()))?;

        let details = self
            .store
            .commit_route(RoutePlan {
                organization_id,
                run_id,
                vehicle_id: vehicle.id(),
                order_ids: linked.order_ids,
            })
            .await?;

        Ok(Some(details))
    }

    async fn release(&self, organization_id: OrganizationId, run_id: Uuid) -> AppResult<()> {
        let released = self.store.release_claims(organization_id, run_id).await?;
        log::info!("↩️ Ejecución {} devolvió {} pedidos a UNASSIGNED", run_id, released);
        Ok(())
    }

    async fn recover_stale_claims(&self, organization_id: OrganizationId) -> AppResult<()> {
        let ttl = chrono::Duration::from_std(self.claim_ttl)
            .map_err(|e| AppError::Internal(format!("Invalid claim TTL: {}", e)))?;

        let recovered = self
            .store
            .release_stale_claims(organization_id, Utc::now() - ttl)
            .await?;

        if recovered > 0 {
            log::warn!(
                "🧹 {} pedidos con claim caducado devueltos a UNASSIGNED en organización {}",
                recovered,
                organization_id
            );
        }
        Ok(())
    }
}
