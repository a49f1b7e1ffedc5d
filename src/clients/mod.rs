//! Clientes de servicios externos

pub mod solver_client;

pub use solver_client::{HttpSolverClient, RouteSolver, SolverError};
