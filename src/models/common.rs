//! Campos compartidos por todas las entidades
//!
//! Cada registro embebe un `EntityMeta` en lugar de heredar de una entidad base.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use uuid::Uuid;

/// Identificador de organización (tenant).
///
/// Toda lectura y escritura del orquestador se filtra por este valor; nunca
/// se deriva de una constante global.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(transparent)]
#[sqlx(transparent)]
pub struct OrganizationId(pub Uuid);

impl OrganizationId {
    pub fn new(id: Uuid) -> Self {
        Self(id)
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl fmt::Display for OrganizationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Identificador, organización y timestamps de un registro
#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct EntityMeta {
    pub id: Uuid,
    pub organization_id: OrganizationId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl EntityMeta {
    pub fn new(organization_id: OrganizationId) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            organization_id,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn belongs_to(&self, organization_id: OrganizationId) -> bool {
        self.organization_id == organization_id
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}
