//! Controllers module
//!
//! Este módulo contiene los controladores que manejan la lógica de las
//! requests HTTP y coordinan servicios y repositorios.

pub mod route_controller;

pub use route_controller::RouteController;
