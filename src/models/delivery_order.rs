//! Modelo de DeliveryOrder
//!
//! Mapea la tabla `delivery_orders`. Los pedidos nacen UNASSIGNED fuera de
//! este servicio; el orquestador los reclama (PLANNING) y los asigna.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type};
use uuid::Uuid;

use super::common::{EntityMeta, OrganizationId};

/// Estado del pedido - mapea al ENUM order_status
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Type, PartialEq, Eq)]
#[sqlx(type_name = "order_status", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    Unassigned,
    /// Reclamado por una ejecución de optimización en curso
    Planning,
    Assigned,
    Completed,
}

#[derive(Debug, Clone, FromRow)]
pub struct DeliveryOrder {
    #[sqlx(flatten)]
    pub meta: EntityMeta,
    pub latitude: f64,
    pub longitude: f64,
    pub weight_kg: i32,
    pub service_duration_min: i32,
    pub status: OrderStatus,
    pub route_id: Option<Uuid>,
    /// Posición dentro de la ruta (0 = primera parada)
    pub stop_sequence: Option<i32>,
    pub planning_run_id: Option<Uuid>,
    pub claimed_at: Option<DateTime<Utc>>,
}

impl DeliveryOrder {
    pub fn new(
        organization_id: OrganizationId,
        latitude: f64,
        longitude: f64,
        weight_kg: i32,
        service_duration_min: i32,
    ) -> Self {
        Self {
            meta: EntityMeta::new(organization_id),
            latitude,
            longitude,
            weight_kg,
            service_duration_min,
            status: OrderStatus::Unassigned,
            route_id: None,
            stop_sequence: None,
            planning_run_id: None,
            claimed_at: None,
        }
    }

    pub fn id(&self) -> Uuid {
        self.meta.id
    }

    pub fn is_claimed_by(&self, run_id: Uuid) -> bool {
        self.status == OrderStatus::Planning && self.planning_run_id == Some(run_id)
    }

    /// Marca el pedido como reclamado por `run_id`
    pub(crate) fn claim(&mut self, run_id: Uuid, at: DateTime<Utc>) {
        self.status = OrderStatus::Planning;
        self.planning_run_id = Some(run_id);
        self.claimed_at = Some(at);
    }

    /// Devuelve el pedido a UNASSIGNED sin tocar `updated_at`
    pub(crate) fn release(&mut self) {
        self.status = OrderStatus::Unassigned;
        self.planning_run_id = None;
        self.claimed_at = None;
    }

    pub(crate) fn assign(&mut self, route_id: Uuid, stop_sequence: i32) {
        self.status = OrderStatus::Assigned;
        self.route_id = Some(route_id);
        self.stop_sequence = Some(stop_sequence);
        self.planning_run_id = None;
        self.claimed_at = None;
        self.meta.touch();
    }
}
