//! Modelos del sistema
//!
//! Este módulo contiene los modelos de datos que mapean al schema PostgreSQL.
//! Todos los registros están acotados por organización.

pub mod common;
pub mod delivery_order;
pub mod route;
pub mod vehicle;

pub use common::{EntityMeta, OrganizationId};
pub use delivery_order::{DeliveryOrder, OrderStatus};
pub use route::{Route, RouteDetails, RouteStatus};
pub use vehicle::Vehicle;
