//! Delivery dispatch backend
//!
//! Orquestador de optimización de rutas: reclama los pedidos pendientes de una
//! organización, consulta un solver externo y persiste la ruta resultante.

pub mod clients;
pub mod config;
pub mod controllers;
pub mod database;
pub mod dto;
pub mod middleware;
pub mod models;
pub mod repositories;
pub mod routes;
pub mod services;
pub mod state;
pub mod utils;
