//! Sistema de manejo de errores
//!
//! Este módulo define los tipos de errores del sistema
//! y su conversión a respuestas HTTP apropiadas.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::clients::solver_client::SolverError;

/// Errores principales de la aplicación
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Concurrent assignment conflict: {0}")]
    ConcurrentAssignment(String),

    #[error("Solver error: {0}")]
    Solver(#[from] SolverError),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl AppError {
    /// Indica si el cliente puede reintentar la misma operación sin cambios
    pub fn is_retryable(&self) -> bool {
        match self {
            AppError::ConcurrentAssignment(_) => true,
            AppError::Solver(e) => e.is_retryable(),
            _ => false,
        }
    }
}

/// Respuesta de error para la API
#[derive(Debug, serde::Serialize)]
struct ErrorResponse {
    error: String,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    code: Option<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let retryable = self.is_retryable();

        let (status, error_response) = match self {
            AppError::Database(e) => {
                log::error!("Database error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorResponse {
                        error: "Database Error".to_string(),
                        message: "An error occurred while accessing the database".to_string(),
                        details: None,
                        code: Some("DB_ERROR".to_string()),
                    },
                )
            }

            AppError::Unauthorized(msg) => {
                log::warn!("Unauthorized access: {}", msg);
                (
                    StatusCode::UNAUTHORIZED,
                    ErrorResponse {
                        error: "Unauthorized".to_string(),
                        message: msg,
                        details: None,
                        code: Some("UNAUTHORIZED".to_string()),
                    },
                )
            }

            AppError::NotFound(msg) => {
                log::warn!("Resource not found: {}", msg);
                (
                    StatusCode::NOT_FOUND,
                    ErrorResponse {
                        error: "Not Found".to_string(),
                        message: msg,
                        details: None,
                        code: Some("NOT_FOUND".to_string()),
                    },
                )
            }

            AppError::BadRequest(msg) => {
                log::warn!("Bad request: {}", msg);
                (
                    StatusCode::BAD_REQUEST,
                    ErrorResponse {
                        error: "Bad Request".to_string(),
                        message: msg,
                        details: None,
                        code: Some("BAD_REQUEST".to_string()),
                    },
                )
            }

            AppError::ConcurrentAssignment(msg) => {
                log::warn!("Concurrent assignment conflict: {}", msg);
                (
                    StatusCode::CONFLICT,
                    ErrorResponse {
                        error: "Conflict".to_string(),
                        message: msg,
                        details: Some(json!({ "retryable": retryable })),
                        code: Some("CONCURRENT_ASSIGNMENT_CONFLICT".to_string()),
                    },
                )
            }

            AppError::Solver(e) => {
                log::error!("Solver error: {}", e);
                let (status, code) = match &e {
                    SolverError::Timeout(_) => (StatusCode::GATEWAY_TIMEOUT, "SOLVER_TIMEOUT"),
                    SolverError::Unreachable(_) => (StatusCode::BAD_GATEWAY, "SOLVER_UNREACHABLE"),
                    SolverError::Status { .. } => (StatusCode::BAD_GATEWAY, "SOLVER_ERROR"),
                };
                (
                    status,
                    ErrorResponse {
                        error: "External API Error".to_string(),
                        message: "An error occurred while communicating with the route solver".to_string(),
                        details: Some(json!({ "solver_error": e.to_string(), "retryable": retryable })),
                        code: Some(code.to_string()),
                    },
                )
            }

            AppError::Internal(msg) => {
                log::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorResponse {
                        error: "Internal Server Error".to_string(),
                        message: "An unexpected error occurred".to_string(),
                        details: Some(json!({ "internal_error": msg })),
                        code: Some("INTERNAL_ERROR".to_string()),
                    },
                )
            }
        };

        (status, Json(error_response)).into_response()
    }
}

/// Resultado tipado para operaciones que pueden fallar
pub type AppResult<T> = Result<T, AppError>;

/// Función helper para crear errores de recurso no encontrado
pub fn not_found_error(resource: &str, id: &str) -> AppError {
    AppError::NotFound(format!("{} with id '{}' not found", resource, id))
}

/// Función helper para crear errores internos
pub fn internal_error(message: &str) -> AppError {
    AppError::Internal(message.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_solver_timeout_maps_to_gateway_timeout() {
        let response = AppError::Solver(SolverError::Timeout(Duration::from_secs(5))).into_response();
        assert_eq!(response.status(), StatusCode::GATEWAY_TIMEOUT);
    }

    #[test]
    fn test_conflict_is_retryable() {
        let error = AppError::ConcurrentAssignment("order already claimed".to_string());
        assert!(error.is_retryable());
        assert_eq!(error.into_response().status(), StatusCode::CONFLICT);
    }

    #[test]
    fn test_not_found_helper() {
        let error = not_found_error("Route", "abc");
        assert_eq!(error.to_string(), "Not found: Route with id 'abc' not found");
    }
}
