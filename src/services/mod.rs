//! Services module
//!
//! Este módulo contiene la lógica de negocio: el orquestador de optimización
//! y el enlace de paradas del solver con pedidos.

pub mod order_route_linker;
pub mod route_optimization_service;

pub use route_optimization_service::RouteOptimizationService;
