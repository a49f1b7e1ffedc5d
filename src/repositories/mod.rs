//! Repositorios
//!
//! `EntityStore` es la frontera de persistencia del orquestador. Todas las
//! operaciones reciben la organización de forma explícita y nunca mezclan
//! filas de organizaciones distintas.

pub mod memory_store;
pub mod postgres_store;

pub use memory_store::InMemoryEntityStore;
pub use postgres_store::PgEntityStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::models::{DeliveryOrder, OrganizationId, RouteDetails, Vehicle};
use crate::utils::errors::AppResult;

/// Asignación a persistir en una única transacción
#[derive(Debug, Clone)]
pub struct RoutePlan {
    pub organization_id: OrganizationId,
    pub run_id: Uuid,
    pub vehicle_id: Uuid,
    /// Pedidos en orden de visita; el índice es el `stop_sequence`
    pub order_ids: Vec<Uuid>,
}

#[async_trait]
pub trait EntityStore: Send + Sync {
    /// Vehículos de la organización en orden estable (`created_at`, `id`)
    async fn list_vehicles(&self, organization_id: OrganizationId) -> AppResult<Vec<Vehicle>>;

    /// Pasar atómicamente todos los pedidos UNASSIGNED a PLANNING bajo `run_id`
    /// y devolverlos. Dos ejecuciones concurrentes reciben conjuntos disjuntos.
    async fn claim_unassigned_orders(
        &self,
        organization_id: OrganizationId,
        run_id: Uuid,
    ) -> AppResult<Vec<DeliveryOrder>>;

    /// Devolver a UNASSIGNED los pedidos que `run_id` sigue reclamando
    async fn release_claims(&self, organization_id: OrganizationId, run_id: Uuid) -> AppResult<u64>;

    /// Devolver a UNASSIGNED los claims anteriores a `claimed_before`
    async fn release_stale_claims(
        &self,
        organization_id: OrganizationId,
        claimed_before: DateTime<Utc>,
    ) -> AppResult<u64>;

    /// Crear la ruta PLANNED, asignar sus pedidos y liberar el resto de claims
    /// de la ejecución, todo o nada.
    ///
    /// Falla con `AppError::ConcurrentAssignment` si algún pedido del plan ya no
    /// está reclamado por `plan.run_id`.
    async fn commit_route(&self, plan: RoutePlan) -> AppResult<RouteDetails>;

    /// Rutas de la organización, más recientes primero
    async fn list_routes(&self, organization_id: OrganizationId) -> AppResult<Vec<RouteDetails>>;

    async fn find_route(
        &self,
        organization_id: OrganizationId,
        route_id: Uuid,
    ) -> AppResult<Option<RouteDetails>>;
}
