//! Modelo de Vehicle
//!
//! Mapea la tabla `vehicles`. El orquestador solo lee vehículos; su alta y
//! edición pertenecen a otro subsistema.

use sqlx::FromRow;
use uuid::Uuid;

use super::common::{EntityMeta, OrganizationId};

/// Vehículo de reparto con capacidad y turno
#[derive(Debug, Clone, FromRow)]
pub struct Vehicle {
    #[sqlx(flatten)]
    pub meta: EntityMeta,
    pub name: String,
    pub capacity_kg: i32,
    /// Minutos desde medianoche, p. ej. 540 = 09:00
    pub start_shift_minutes: i32,
    pub end_shift_minutes: i32,
    pub start_lat: Option<f64>,
    pub start_lon: Option<f64>,
}

impl Vehicle {
    pub fn new(
        organization_id: OrganizationId,
        name: impl Into<String>,
        capacity_kg: i32,
        start_shift_minutes: i32,
        end_shift_minutes: i32,
    ) -> Self {
        Self {
            meta: EntityMeta::new(organization_id),
            name: name.into(),
            capacity_kg,
            start_shift_minutes,
            end_shift_minutes,
            start_lat: None,
            start_lon: None,
        }
    }

    pub fn with_start_location(mut self, lat: f64, lon: f64) -> Self {
        self.start_lat = Some(lat);
        self.start_lon = Some(lon);
        self
    }

    pub fn id(&self) -> Uuid {
        self.meta.id
    }
}
