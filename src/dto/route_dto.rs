//! DTOs de salida para rutas

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::models::{DeliveryOrder, OrderStatus, RouteDetails, RouteStatus, Vehicle};

/// Response de ruta para la API
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteResponse {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub status: RouteStatus,
    pub vehicle: RouteVehicleResponse,
    pub orders: Vec<RouteOrderResponse>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteVehicleResponse {
    pub id: Uuid,
    pub name: String,
    pub capacity_kg: i32,
    pub start_shift_minutes: i32,
    pub end_shift_minutes: i32,
}

/// Pedido dentro de una ruta, en orden de visita
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteOrderResponse {
    pub id: Uuid,
    pub stop_sequence: Option<i32>,
    pub latitude: f64,
    pub longitude: f64,
    pub weight_kg: i32,
    pub service_duration_min: i32,
    pub status: OrderStatus,
}

impl From<Vehicle> for RouteVehicleResponse {
    fn from(vehicle: Vehicle) -> Self {
        Self {
            id: vehicle.meta.id,
            name: vehicle.name,
            capacity_kg: vehicle.capacity_kg,
            start_shift_minutes: vehicle.start_shift_minutes,
            end_shift_minutes: vehicle.end_shift_minutes,
        }
    }
}

impl From<DeliveryOrder> for RouteOrderResponse {
    fn from(order: DeliveryOrder) -> Self {
        Self {
            id: order.meta.id,
            stop_sequence: order.stop_sequence,
            latitude: order.latitude,
            longitude: order.longitude,
            weight_kg: order.weight_kg,
            service_duration_min: order.service_duration_min,
            status: order.status,
        }
    }
}

impl From<RouteDetails> for RouteResponse {
    fn from(details: RouteDetails) -> Self {
        let RouteDetails { route, vehicle, orders } = details;
        Self {
            id: route.meta.id,
            organization_id: route.meta.organization_id.as_uuid(),
            status: route.status,
            vehicle: vehicle.into(),
            orders: orders.into_iter().map(RouteOrderResponse::from).collect(),
            created_at: route.meta.created_at,
            updated_at: route.meta.updated_at,
        }
    }
}
