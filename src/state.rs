//! Shared application state
//!
//! Este módulo define el estado compartido de la aplicación que se pasa
//! a través del router de Axum.

use std::sync::Arc;

use crate::clients::RouteSolver;
use crate::config::AppConfig;
use crate::repositories::EntityStore;
use crate::services::RouteOptimizationService;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub store: Arc<dyn EntityStore>,
    pub optimizer: Arc<RouteOptimizationService>,
}

impl AppState {
    pub fn new(config: AppConfig, store: Arc<dyn EntityStore>, solver: Arc<dyn RouteSolver>) -> Self {
        let optimizer = RouteOptimizationService::new(store.clone(), solver, config.planning_claim_ttl());

        Self {
            config: Arc::new(config),
            store,
            optimizer: Arc::new(optimizer),
        }
    }
}
