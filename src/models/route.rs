//! Modelo de Route
//!
//! Mapea la tabla `routes`. Solo el orquestador crea rutas y siempre en PLANNED.

use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type};
use uuid::Uuid;

use super::common::{EntityMeta, OrganizationId};
use super::delivery_order::DeliveryOrder;
use super::vehicle::Vehicle;

/// Estado de la ruta - mapea al ENUM route_status
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Type, PartialEq, Eq)]
#[sqlx(type_name = "route_status", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RouteStatus {
    Planned,
    InProgress,
    Completed,
}

#[derive(Debug, Clone, FromRow)]
pub struct Route {
    #[sqlx(flatten)]
    pub meta: EntityMeta,
    pub vehicle_id: Uuid,
    pub status: RouteStatus,
}

impl Route {
    pub fn planned(organization_id: OrganizationId, vehicle_id: Uuid) -> Self {
        Self {
            meta: EntityMeta::new(organization_id),
            vehicle_id,
            status: RouteStatus::Planned,
        }
    }

    pub fn id(&self) -> Uuid {
        self.meta.id
    }
}

/// Ruta con su vehículo y sus pedidos ordenados por `stop_sequence`
#[derive(Debug, Clone)]
pub struct RouteDetails {
    pub route: Route,
    pub vehicle: Vehicle,
    pub orders: Vec<DeliveryOrder>,
}

impl RouteDetails {
    pub fn order_ids(&self) -> Vec<Uuid> {
        self.orders.iter().map(DeliveryOrder::id).collect()
    }
}
