//! `EntityStore` en memoria
//!
//! Misma semántica que la implementación PostgreSQL (claims atómicos, commit
//! todo o nada) sobre mapas protegidos por un `RwLock`. Lo usan los tests y
//! los experimentos locales sin base de datos.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{EntityStore, RoutePlan};
use crate::models::{DeliveryOrder, OrderStatus, OrganizationId, Route, RouteDetails, Vehicle};
use crate::utils::errors::{AppError, AppResult};

#[derive(Default)]
struct MemoryState {
    vehicles: HashMap<Uuid, Vehicle>,
    orders: HashMap<Uuid, DeliveryOrder>,
    routes: HashMap<Uuid, Route>,
}

impl MemoryState {
    fn details(&self, route: &Route) -> AppResult<RouteDetails> {
        let vehicle = self
            .vehicles
            .get(&route.vehicle_id)
            .filter(|v| v.meta.belongs_to(route.meta.organization_id))
            .cloned()
            .ok_or_else(|| {
                AppError::Internal(format!("Route {} references an unknown vehicle", route.id()))
            })?;

        let mut orders: Vec<DeliveryOrder> = self
            .orders
            .values()
            .filter(|o| o.route_id == Some(route.id()) && o.meta.belongs_to(route.meta.organization_id))
            .cloned()
            .collect();
        orders.sort_by_key(|o| o.stop_sequence);

        Ok(RouteDetails {
            route: route.clone(),
            vehicle,
            orders,
        })
    }
}

#[derive(Default)]
pub struct InMemoryEntityStore {
    state: RwLock<MemoryState>,
}

impl InMemoryEntityStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert_vehicle(&self, vehicle: Vehicle) {
        self.state.write().await.vehicles.insert(vehicle.id(), vehicle);
    }

    pub async fn insert_order(&self, order: DeliveryOrder) {
        self.state.write().await.orders.insert(order.id(), order);
    }

    pub async fn order(&self, id: Uuid) -> Option<DeliveryOrder> {
        self.state.read().await.orders.get(&id).cloned()
    }

    /// Lectura sin claim de los pedidos UNASSIGNED: lo que haría una ejecución
    /// sin la puerta PLANNING.
    pub async fn unassigned_snapshot(&self, organization_id: OrganizationId) -> Vec<DeliveryOrder> {
        self.state
            .read()
            .await
            .orders
            .values()
            .filter(|o| o.meta.belongs_to(organization_id) && o.status == OrderStatus::Unassigned)
            .cloned()
            .collect()
    }

    pub async fn route_count(&self) -> usize {
        self.state.read().await.routes.len()
    }

    /// Cambiar el estado de un pedido desde fuera del orquestador (p. ej. entrega)
    pub async fn set_order_status(&self, id: Uuid, status: OrderStatus) {
        if let Some(order) = self.state.write().await.orders.get_mut(&id) {
            if status != OrderStatus::Planning {
                order.planning_run_id = None;
                order.claimed_at = None;
            }
            order.status = status;
            order.meta.touch();
        }
    }

    /// Envejecer el claim de un pedido para simular una ejecución abandonada
    pub async fn backdate_claim(&self, id: Uuid, claimed_at: DateTime<Utc>) {
        if let Some(order) = self.state.write().await.orders.get_mut(&id) {
            if order.status == OrderStatus::Planning {
                order.claimed_at = Some(claimed_at);
            }
        }
    }
}

#[async_trait]
impl EntityStore for InMemoryEntityStore {
    async fn list_vehicles(&self, organization_id: OrganizationId) -> AppResult<Vec<Vehicle>> {
        let state = self.state.read().await;
        let mut vehicles: Vec<Vehicle> = state
            .vehicles
            .values()
            .filter(|v| v.meta.belongs_to(organization_id))
            .cloned()
            .collect();
        vehicles.sort_by(|a, b| (a.meta.created_at, a.meta.id).cmp(&(b.meta.created_at, b.meta.id)));
        Ok(vehicles)
    }

    async fn claim_unassigned_orders(
        &self,
        organization_id: OrganizationId,
        run_id: Uuid,
    ) -> AppResult<Vec<DeliveryOrder>> {
        let mut state = self.state.write().await;
        let now = Utc::now();

        let mut claimed: Vec<DeliveryOrder> = state
            .orders
            .values_mut()
            .filter(|o| o.meta.belongs_to(organization_id) && o.status == OrderStatus::Unassigned)
            .map(|o| {
                o.claim(run_id, now);
                o.clone()
            })
            .collect();

        claimed.sort_by(|a, b| (a.meta.created_at, a.meta.id).cmp(&(b.meta.created_at, b.meta.id)));
        Ok(claimed)
    }

    async fn release_claims(&self, organization_id: OrganizationId, run_id: Uuid) -> AppResult<u64> {
        let mut state = self.state.write().await;
        let mut released = 0;
        for order in state.orders.values_mut() {
            if order.meta.belongs_to(organization_id) && order.is_claimed_by(run_id) {
                order.release();
                released += 1;
            }
        }
        Ok(released)
    }

    async fn release_stale_claims(
        &self,
        organization_id: OrganizationId,
        claimed_before: DateTime<Utc>,
    ) -> AppResult<u64> {
        let mut state = self.state.write().await;
        let mut released = 0;
        for order in state.orders.values_mut() {
            let stale = order.status == OrderStatus::Planning
                && order.claimed_at.map_or(false, |at| at < claimed_before);
            if order.meta.belongs_to(organization_id) && stale {
                order.release();
                released += 1;
            }
        }
        Ok(released)
    }

    async fn commit_route(&self, plan: RoutePlan) -> AppResult<RouteDetails> {
        if plan.order_ids.is_empty() {
            return Err(AppError::Internal("Refusing to persist a route without orders".to_string()));
        }

        let org = plan.organization_id;
        let mut state = self.state.write().await;

        match state.vehicles.get(&plan.vehicle_id) {
            Some(vehicle) if vehicle.meta.belongs_to(org) => {}
            _ => {
                return Err(AppError::NotFound(format!(
                    "Vehicle with id '{}' not found in organization {}",
                    plan.vehicle_id, org
                )))
            }
        }

        // Validar todo antes de mutar nada
        let still_claimed = plan
            .order_ids
            .iter()
            .filter(|id| {
                state
                    .orders
                    .get(id)
                    .map_or(false, |o| o.meta.belongs_to(org) && o.is_claimed_by(plan.run_id))
            })
            .count();

        if still_claimed != plan.order_ids.len() {
            return Err(AppError::ConcurrentAssignment(format!(
                "only {} of {} orders were still claimed by run {}",
                still_claimed,
                plan.order_ids.len(),
                plan.run_id
            )));
        }

        let route = Route::planned(org, plan.vehicle_id);
        for (sequence, id) in plan.order_ids.iter().enumerate() {
            if let Some(order) = state.orders.get_mut(id) {
                order.assign(route.id(), sequence as i32);
            }
        }
        for order in state.orders.values_mut() {
            if order.meta.belongs_to(org) && order.is_claimed_by(plan.run_id) {
                order.release();
            }
        }
        state.routes.insert(route.id(), route.clone());

        state.details(&route)
    }

    async fn list_routes(&self, organization_id: OrganizationId) -> AppResult<Vec<RouteDetails>> {
        let state = self.state.read().await;
        let mut routes: Vec<&Route> = state
            .routes
            .values()
            .filter(|r| r.meta.belongs_to(organization_id))
            .collect();
        routes.sort_by(|a, b| b.meta.created_at.cmp(&a.meta.created_at).then(a.meta.id.cmp(&b.meta.id)));

        routes.into_iter().map(|route| state.details(route)).collect()
    }

    async fn find_route(
        &self,
        organization_id: OrganizationId,
        route_id: Uuid,
    ) -> AppResult<Option<RouteDetails>> {
        let state = self.state.read().await;
        match state.routes.get(&route_id) {
            Some(route) if route.meta.belongs_to(organization_id) => Ok(Some(state.details(route)?)),
            _ => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn seeded(org: OrganizationId, orders: usize) -> (InMemoryEntityStore, Vehicle, Vec<DeliveryOrder>) {
        let store = InMemoryEntityStore::new();
        let vehicle = Vehicle::new(org, "Van 001", 500, 540, 1020);
        store.insert_vehicle(vehicle.clone()).await;

        let mut created = Vec::new();
        for i in 0..orders {
            let order = DeliveryOrder::new(org, 40.7 + i as f64 * 0.01, -74.0, 5, 10);
            store.insert_order(order.clone()).await;
            created.push(order);
        }
        (store, vehicle, created)
    }

    #[tokio::test]
    async fn test_snapshot_reads_overlap_but_claims_are_disjoint() {
        let org = OrganizationId::new(Uuid::new_v4());
        let (store, _, orders) = seeded(org, 3).await;

        // Sin puerta: dos lecturas antes de cualquier commit ven los mismos pedidos
        let first = store.unassigned_snapshot(org).await;
        let second = store.unassigned_snapshot(org).await;
        assert_eq!(first.len(), 3);
        assert_eq!(second.len(), 3);

        // Con puerta: el segundo claim no obtiene nada
        let claimed = store.claim_unassigned_orders(org, Uuid::new_v4()).await.unwrap();
        let claimed_again = store.claim_unassigned_orders(org, Uuid::new_v4()).await.unwrap();
        assert_eq!(claimed.len(), orders.len());
        assert!(claimed_again.is_empty());
    }

    #[tokio::test]
    async fn test_claims_are_scoped_by_organization() {
        let org = OrganizationId::new(Uuid::new_v4());
        let other = OrganizationId::new(Uuid::new_v4());
        let (store, _, _) = seeded(org, 2).await;
        store.insert_order(DeliveryOrder::new(other, 1.0, 1.0, 1, 1)).await;

        let claimed = store.claim_unassigned_orders(org, Uuid::new_v4()).await.unwrap();
        assert_eq!(claimed.len(), 2);
        assert!(claimed.iter().all(|o| o.meta.organization_id == org));
        assert_eq!(store.unassigned_snapshot(other).await.len(), 1);
    }

    #[tokio::test]
    async fn test_commit_assigns_in_order_and_releases_leftovers() {
        let org = OrganizationId::new(Uuid::new_v4());
        let (store, vehicle, orders) = seeded(org, 3).await;
        let run_id = Uuid::new_v4();
        store.claim_unassigned_orders(org, run_id).await.unwrap();

        let details = store
            .commit_route(RoutePlan {
                organization_id: org,
                run_id,
                vehicle_id: vehicle.id(),
                order_ids: vec![orders[2].id(), orders[0].id()],
            })
            .await
            .unwrap();

        assert_eq!(details.order_ids(), vec![orders[2].id(), orders[0].id()]);
        assert_eq!(details.orders[0].stop_sequence, Some(0));
        assert_eq!(details.orders[1].stop_sequence, Some(1));

        let leftover = store.order(orders[1].id()).await.unwrap();
        assert_eq!(leftover.status, OrderStatus::Unassigned);
        assert_eq!(leftover.planning_run_id, None);
        assert_eq!(leftover.route_id, None);
    }

    #[tokio::test]
    async fn test_commit_is_all_or_nothing_when_a_claim_was_lost() {
        let org = OrganizationId::new(Uuid::new_v4());
        let (store, vehicle, orders) = seeded(org, 2).await;
        let run_id = Uuid::new_v4();
        store.claim_unassigned_orders(org, run_id).await.unwrap();
        store.set_order_status(orders[1].id(), OrderStatus::Completed).await;

        let result = store
            .commit_route(RoutePlan {
                organization_id: org,
                run_id,
                vehicle_id: vehicle.id(),
                order_ids: vec![orders[0].id(), orders[1].id()],
            })
            .await;

        assert!(matches!(result, Err(AppError::ConcurrentAssignment(_))));
        assert_eq!(store.route_count().await, 0);
        assert!(store.order(orders[0].id()).await.unwrap().is_claimed_by(run_id));
    }

    #[tokio::test]
    async fn test_commit_rejects_vehicle_from_other_organization() {
        let org = OrganizationId::new(Uuid::new_v4());
        let (store, _, orders) = seeded(org, 1).await;
        let foreign = Vehicle::new(OrganizationId::new(Uuid::new_v4()), "Foreign", 100, 0, 600);
        store.insert_vehicle(foreign.clone()).await;
        let run_id = Uuid::new_v4();
        store.claim_unassigned_orders(org, run_id).await.unwrap();

        let result = store
            .commit_route(RoutePlan {
                organization_id: org,
                run_id,
                vehicle_id: foreign.id(),
                order_ids: vec![orders[0].id()],
            })
            .await;

        assert!(matches!(result, Err(AppError::NotFound(_))));
        assert_eq!(store.route_count().await, 0);
    }

    #[tokio::test]
    async fn test_release_stale_claims_only_touches_old_claims() {
        let org = OrganizationId::new(Uuid::new_v4());
        let (store, _, orders) = seeded(org, 2).await;
        store.claim_unassigned_orders(org, Uuid::new_v4()).await.unwrap();
        store
            .backdate_claim(orders[0].id(), Utc::now() - chrono::Duration::minutes(30))
            .await;

        let released = store
            .release_stale_claims(org, Utc::now() - chrono::Duration::minutes(5))
            .await
            .unwrap();

        assert_eq!(released, 1);
        assert_eq!(store.order(orders[0].id()).await.unwrap().status, OrderStatus::Unassigned);
        assert_eq!(store.order(orders[1].id()).await.unwrap().status, OrderStatus::Planning);
    }
}
