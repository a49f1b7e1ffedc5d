use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Transaction};
use std::collections::HashMap;
use uuid::Uuid;

use super::{EntityStore, RoutePlan};
use crate::models::{DeliveryOrder, OrderStatus, OrganizationId, Route, RouteDetails, RouteStatus, Vehicle};
use crate::utils::errors::{AppError, AppResult};

/// Implementación PostgreSQL de `EntityStore`
#[derive(Clone)]
pub struct PgEntityStore {
    pool: PgPool,
}

impl PgEntityStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn hydrate_routes(
        &self,
        organization_id: OrganizationId,
        routes: Vec<Route>,
    ) -> AppResult<Vec<RouteDetails>> {
        if routes.is_empty() {
            return Ok(Vec::new());
        }

        let vehicles: HashMap<Uuid, Vehicle> = self
            .list_vehicles(organization_id)
            .await?
            .into_iter()
            .map(|v| (v.id(), v))
            .collect();

        let route_ids: Vec<Uuid> = routes.iter().map(Route::id).collect();
        let orders = sqlx::query_as::<_, DeliveryOrder>(
            r#"
            SELECT * FROM delivery_orders
            WHERE organization_id = $1 AND route_id = ANY($2)
            ORDER BY route_id, stop_sequence
            "#,
        )
        .bind(organization_id)
        .bind(&route_ids)
        .fetch_all(&self.pool)
        .await?;

        let mut orders_by_route: HashMap<Uuid, Vec<DeliveryOrder>> = HashMap::new();
        for order in orders {
            if let Some(route_id) = order.route_id {
                orders_by_route.entry(route_id).or_default().push(order);
            }
        }

        routes
            .into_iter()
            .map(|route| {
                let vehicle = vehicles.get(&route.vehicle_id).cloned().ok_or_else(|| {
                    AppError::Internal(format!(
                        "Route {} references vehicle {} outside organization {}",
                        route.id(),
                        route.vehicle_id,
                        organization_id
                    ))
                })?;
                let orders = orders_by_route.remove(&route.id()).unwrap_or_default();
                Ok(RouteDetails { route, vehicle, orders })
            })
            .collect()
    }
}

/// Devolver a UNASSIGNED los claims restantes de una ejecución dentro de `tx`
async fn release_run_claims(
    tx: &mut Transaction<'_, Postgres>,
    organization_id: OrganizationId,
    run_id: Uuid,
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        r#"
        UPDATE delivery_orders
        SET status = $3, planning_run_id = NULL, claimed_at = NULL
        WHERE organization_id = $1 AND planning_run_id = $2 AND status = $4
        "#,
    )
    .bind(organization_id)
    .bind(run_id)
    .bind(OrderStatus::Unassigned)
    .bind(OrderStatus::Planning)
    .execute(&mut **tx)
    .await?;

    Ok(result.rows_affected())
}

#[async_trait]
impl EntityStore for PgEntityStore {
    async fn list_vehicles(&self, organization_id: OrganizationId) -> AppResult<Vec<Vehicle>> {
        let vehicles = sqlx::query_as::<_, Vehicle>(
            "SELECT * FROM vehicles WHERE organization_id = $1 ORDER BY created_at, id",
        )
        .bind(organization_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(vehicles)
    }

    async fn claim_unassigned_orders(
        &self,
        organization_id: OrganizationId,
        run_id: Uuid,
    ) -> AppResult<Vec<DeliveryOrder>> {
        // Bajo READ COMMITTED una ejecución concurrente que toque las mismas filas
        // espera y reevalúa el WHERE, así que ve el estado PLANNING y las salta.
        let mut orders = sqlx::query_as::<_, DeliveryOrder>(
            r#"
            UPDATE delivery_orders
            SET status = $3, planning_run_id = $2, claimed_at = $4
            WHERE organization_id = $1 AND status = $5
            RETURNING *
            "#,
        )
        .bind(organization_id)
        .bind(run_id)
        .bind(OrderStatus::Planning)
        .bind(Utc::now())
        .bind(OrderStatus::Unassigned)
        .fetch_all(&self.pool)
        .await?;

        orders.sort_by(|a, b| {
            (a.meta.created_at, a.meta.id).cmp(&(b.meta.created_at, b.meta.id))
        });
        Ok(orders)
    }

    async fn release_claims(&self, organization_id: OrganizationId, run_id: Uuid) -> AppResult<u64> {
        let mut tx = self.pool.begin().await?;
        let released = release_run_claims(&mut tx, organization_id, run_id).await?;
        tx.commit().await?;
        Ok(released)
    }

    async fn release_stale_claims(
        &self,
        organization_id: OrganizationId,
        claimed_before: DateTime<Utc>,
    ) -> AppResult<u64> {
        let result = sqlx::query(
            r#"
            UPDATE delivery_orders
            SET status = $2, planning_run_id = NULL, claimed_at = NULL
            WHERE organization_id = $1 AND status = $3 AND claimed_at < $4
            "#,
        )
        .bind(organization_id)
        .bind(OrderStatus::Unassigned)
        .bind(OrderStatus::Planning)
        .bind(claimed_before)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    async fn commit_route(&self, plan: RoutePlan) -> AppResult<RouteDetails> {
        if plan.order_ids.is_empty() {
            return Err(AppError::Internal("Refusing to persist a route without orders".to_string()));
        }

        let org = plan.organization_id;
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        // INSERT ... SELECT garantiza que el vehículo es de la misma organización
        let route = sqlx::query_as::<_, Route>(
            r#"
            INSERT INTO routes (id, organization_id, vehicle_id, status, created_at, updated_at)
            SELECT $1, v.organization_id, v.id, $4, $5, $5
            FROM vehicles v
            WHERE v.id = $3 AND v.organization_id = $2
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(org)
        .bind(plan.vehicle_id)
        .bind(RouteStatus::Planned)
        .bind(now)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| {
            AppError::NotFound(format!(
                "Vehicle with id '{}' not found in organization {}",
                plan.vehicle_id, org
            ))
        })?;

        let sequences: Vec<i32> = (0..plan.order_ids.len() as i32).collect();
        let assigned = sqlx::query(
            r#"
            UPDATE delivery_orders AS o
            SET status = $1,
                route_id = $2,
                stop_sequence = s.seq,
                planning_run_id = NULL,
                claimed_at = NULL,
                updated_at = $3
            FROM UNNEST($4::uuid[], $5::int4[]) AS s(id, seq)
            WHERE o.id = s.id
              AND o.organization_id = $6
              AND o.status = $7
              AND o.planning_run_id = $8
            "#,
        )
        .bind(OrderStatus::Assigned)
        .bind(route.id())
        .bind(now)
        .bind(&plan.order_ids)
        .bind(&sequences)
        .bind(org)
        .bind(OrderStatus::Planning)
        .bind(plan.run_id)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        if assigned != plan.order_ids.len() as u64 {
            // `tx` se descarta sin commit: rollback
            return Err(AppError::ConcurrentAssignment(format!(
                "only {} of {} orders were still claimed by run {}",
                assigned,
                plan.order_ids.len(),
                plan.run_id
            )));
        }

        let released = release_run_claims(&mut tx, org, plan.run_id).await?;

        let vehicle = sqlx::query_as::<_, Vehicle>(
            "SELECT * FROM vehicles WHERE id = $1 AND organization_id = $2",
        )
        .bind(plan.vehicle_id)
        .bind(org)
        .fetch_one(&mut *tx)
        .await?;

        let orders = sqlx::query_as::<_, DeliveryOrder>(
            r#"
            SELECT * FROM delivery_orders
            WHERE route_id = $1 AND organization_id = $2
            ORDER BY stop_sequence
            "#,
        )
        .bind(route.id())
        .bind(org)
        .fetch_all(&mut *tx)
        .await?;

        tx.commit().await?;

        log::debug!(
            "💾 Ruta {} persistida con {} pedidos ({} claims liberados)",
            route.id(),
            orders.len(),
            released
        );

        Ok(RouteDetails { route, vehicle, orders })
    }

    async fn list_routes(&self, organization_id: OrganizationId) -> AppResult<Vec<RouteDetails>> {
        let routes = sqlx::query_as::<_, Route>(
            "SELECT * FROM routes WHERE organization_id = $1 ORDER BY created_at DESC, id",
        )
        .bind(organization_id)
        .fetch_all(&self.pool)
        .await?;

        self.hydrate_routes(organization_id, routes).await
    }

    async fn find_route(
        &self,
        organization_id: OrganizationId,
        route_id: Uuid,
    ) -> AppResult<Option<RouteDetails>> {
        let route = sqlx::query_as::<_, Route>(
            "SELECT * FROM routes WHERE id = $1 AND organization_id = $2",
        )
        .bind(route_id)
        .bind(organization_id)
        .fetch_optional(&self.pool)
        .await?;

        match route {
            Some(route) => Ok(self.hydrate_routes(organization_id, vec![route]).await?.pop()),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DatabaseConfig;
    use crate::database::run_migrations;

    async fn test_store() -> Option<(PgEntityStore, PgPool)> {
        let url = match std::env::var("TEST_DATABASE_URL") {
            Ok(url) => url,
            Err(_) => {
                println!("⚠️ Skipping test: TEST_DATABASE_URL not set");
                return None;
            }
        };
        let pool = DatabaseConfig::create_test_pool(&url).await.unwrap();
        run_migrations(&pool).await.unwrap();
        Some((PgEntityStore::new(pool.clone()), pool))
    }

    async fn insert_vehicle(pool: &PgPool, vehicle: &Vehicle) {
        sqlx::query(
            r#"
            INSERT INTO vehicles (id, organization_id, name, capacity_kg, start_shift_minutes,
                                  end_shift_minutes, start_lat, start_lon, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(vehicle.meta.id)
        .bind(vehicle.meta.organization_id)
        .bind(&vehicle.name)
        .bind(vehicle.capacity_kg)
        .bind(vehicle.start_shift_minutes)
        .bind(vehicle.end_shift_minutes)
        .bind(vehicle.start_lat)
        .bind(vehicle.start_lon)
        .bind(vehicle.meta.created_at)
        .bind(vehicle.meta.updated_at)
        .execute(pool)
        .await
        .unwrap();
    }

    async fn insert_order(pool: &PgPool, order: &DeliveryOrder) {
        sqlx::query(
            r#"
            INSERT INTO delivery_orders (id, organization_id, latitude, longitude, weight_kg,
                                         service_duration_min, status, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(order.meta.id)
        .bind(order.meta.organization_id)
        .bind(order.latitude)
        .bind(order.longitude)
        .bind(order.weight_kg)
        .bind(order.service_duration_min)
        .bind(order.status)
        .bind(order.meta.created_at)
        .bind(order.meta.updated_at)
        .execute(pool)
        .await
        .unwrap();
    }

    async fn fetch_order(pool: &PgPool, id: Uuid) -> DeliveryOrder {
        sqlx::query_as::<_, DeliveryOrder>("SELECT * FROM delivery_orders WHERE id = $1")
            .bind(id)
            .fetch_one(pool)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_claim_commit_and_release_against_postgres() {
        let Some((store, pool)) = test_store().await else { return };
        let org = OrganizationId::new(Uuid::new_v4());

        let vehicle = Vehicle::new(org, "Van 001", 500, 540, 1020);
        insert_vehicle(&pool, &vehicle).await;
        let a = DeliveryOrder::new(org, 40.71, -74.0, 5, 10);
        let b = DeliveryOrder::new(org, 40.72, -74.1, 5, 10);
        let c = DeliveryOrder::new(org, 40.73, -74.2, 5, 10);
        for order in [&a, &b, &c] {
            insert_order(&pool, order).await;
        }

        let run_id = Uuid::new_v4();
        let claimed = store.claim_unassigned_orders(org, run_id).await.unwrap();
        assert_eq!(claimed.len(), 3);
        assert!(store.claim_unassigned_orders(org, Uuid::new_v4()).await.unwrap().is_empty());

        let details = store
            .commit_route(RoutePlan {
                organization_id: org,
                run_id,
                vehicle_id: vehicle.id(),
                order_ids: vec![b.id(), a.id()],
            })
            .await
            .unwrap();

        assert_eq!(details.route.status, RouteStatus::Planned);
        assert_eq!(details.order_ids(), vec![b.id(), a.id()]);

        let c_after = fetch_order(&pool, c.id()).await;
        assert_eq!(c_after.status, OrderStatus::Unassigned);
        assert_eq!(c_after.planning_run_id, None);

        let found = store.find_route(org, details.route.id()).await.unwrap().unwrap();
        assert_eq!(found.order_ids(), vec![b.id(), a.id()]);

        let other_org = OrganizationId::new(Uuid::new_v4());
        assert!(store.find_route(other_org, details.route.id()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_commit_rolls_back_when_claim_was_lost() {
        let Some((store, pool)) = test_store().await else { return };
        let org = OrganizationId::new(Uuid::new_v4());

        let vehicle = Vehicle::new(org, "Van 002", 500, 540, 1020);
        insert_vehicle(&pool, &vehicle).await;
        let a = DeliveryOrder::new(org, 40.71, -74.0, 5, 10);
        insert_order(&pool, &a).await;

        let run_id = Uuid::new_v4();
        store.claim_unassigned_orders(org, run_id).await.unwrap();
        store.release_claims(org, run_id).await.unwrap();

        let result = store
            .commit_route(RoutePlan {
                organization_id: org,
                run_id,
                vehicle_id: vehicle.id(),
                order_ids: vec![a.id()],
            })
            .await;

        assert!(matches!(result, Err(AppError::ConcurrentAssignment(_))));
        assert!(store.list_routes(org).await.unwrap().is_empty());
        assert_eq!(fetch_order(&pool, a.id()).await.status, OrderStatus::Unassigned);
    }
}
