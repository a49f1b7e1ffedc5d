//! DTOs para el solver externo de rutas
//!
//! Request: `{ "orders": [...], "vehicles": [...] }`
//! Response: `{ "route": [{ "id": "<order-id>", ... }, ...] }`

use serde::Serialize;
use serde_json::Value;

use crate::models::{DeliveryOrder, Vehicle};

/// Pedido tal como lo espera el solver
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SolverOrder {
    pub id: String,
    pub lat: f64,
    pub lon: f64,
    pub weight_kg: i32,
    pub service_duration_min: i32,
}

/// Vehículo tal como lo espera el solver
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SolverVehicle {
    pub id: String,
    pub capacity_kg: i32,
    pub start_shift_minutes: i32,
    pub end_shift_minutes: i32,
    pub start_lat: Option<f64>,
    pub start_lon: Option<f64>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SolverRequest {
    pub orders: Vec<SolverOrder>,
    pub vehicles: Vec<SolverVehicle>,
}

impl From<&DeliveryOrder> for SolverOrder {
    fn from(order: &DeliveryOrder) -> Self {
        Self {
            id: order.id().to_string(),
            lat: order.latitude,
            lon: order.longitude,
            weight_kg: order.weight_kg,
            service_duration_min: order.service_duration_min,
        }
    }
}

impl From<&Vehicle> for SolverVehicle {
    fn from(vehicle: &Vehicle) -> Self {
        Self {
            id: vehicle.id().to_string(),
            capacity_kg: vehicle.capacity_kg,
            start_shift_minutes: vehicle.start_shift_minutes,
            end_shift_minutes: vehicle.end_shift_minutes,
            start_lat: vehicle.start_lat,
            start_lon: vehicle.start_lon,
        }
    }
}

impl SolverRequest {
    pub fn from_entities(orders: &[DeliveryOrder], vehicles: &[Vehicle]) -> Self {
        Self {
            orders: orders.iter().map(SolverOrder::from).collect(),
            vehicles: vehicles.iter().map(SolverVehicle::from).collect(),
        }
    }
}

/// Parada devuelta por el solver. El id todavía no se ha validado.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SolverStop {
    pub id: String,
}

impl SolverStop {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }
}

/// Secuencia ordenada de paradas; vacía significa "sin solución"
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SolverSolution {
    pub stops: Vec<SolverStop>,
}

impl SolverSolution {
    pub fn no_solution() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.stops.is_empty()
    }

    /// Interpretar el cuerpo de la respuesta del solver.
    ///
    /// Nunca falla: un cuerpo vacío, JSON inválido, un campo `route` ausente o
    /// que no sea una lista se tratan como "sin solución". Las entradas sin un
    /// `id` de tipo string se descartan una a una.
    pub fn parse(body: &str) -> Self {
        if body.trim().is_empty() {
            log::warn!("⚠️ Respuesta vacía del solver");
            return Self::no_solution();
        }

        let value: Value = match serde_json::from_str(body) {
            Ok(value) => value,
            Err(e) => {
                log::warn!("⚠️ Respuesta del solver no es JSON válido: {}", e);
                return Self::no_solution();
            }
        };

        let entries = match value.get("route") {
            Some(Value::Array(entries)) => entries,
            Some(Value::Null) | None => {
                log::info!("📭 El solver no devolvió campo 'route'");
                return Self::no_solution();
            }
            Some(other) => {
                log::warn!("⚠️ Campo 'route' con forma inesperada: {}", type_name(other));
                return Self::no_solution();
            }
        };

        let mut dropped = 0usize;
        let stops: Vec<SolverStop> = entries
            .iter()
            .filter_map(|entry| match entry.get("id").and_then(Value::as_str) {
                Some(id) => Some(SolverStop::new(id)),
                None => {
                    dropped += 1;
                    None
                }
            })
            .collect();

        if dropped > 0 {
            log::warn!("⚠️ {} paradas descartadas por no tener un 'id' string", dropped);
        }

        Self { stops }
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
