//! Configuración de variables de entorno
//!
//! Este módulo carga y valida la configuración del servicio. Los valores
//! inválidos o ausentes fallan el arranque con un error, nunca con un panic.

use anyhow::{anyhow, Context, Result};
use std::env;
use std::str::FromStr;
use std::time::Duration;
use validator::Validate;

/// Configuración del cliente del solver
#[derive(Debug, Clone, Validate)]
pub struct SolverConfig {
    #[validate(url)]
    pub base_url: String,
    #[validate(range(min = 1, max = 120))]
    pub timeout_secs: u64,
    #[validate(range(max = 10))]
    pub max_retries: u32,
    #[validate(range(min = 10, max = 10000))]
    pub initial_backoff_ms: u64,
    #[validate(range(min = 10, max = 60000))]
    pub max_backoff_ms: u64,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8000".to_string(),
            timeout_secs: 10,
            max_retries: 2,
            initial_backoff_ms: 250,
            max_backoff_ms: 2000,
        }
    }
}

impl SolverConfig {
    pub fn solve_url(&self) -> String {
        format!("{}/solve", self.base_url.trim_end_matches('/'))
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn initial_backoff(&self) -> Duration {
        Duration::from_millis(self.initial_backoff_ms)
    }

    pub fn max_backoff(&self) -> Duration {
        Duration::from_millis(self.max_backoff_ms)
    }

    /// Peor caso de una llamada completa: todos los intentos agotan el timeout
    /// y cada espera entre intentos llega al máximo de backoff. Exacto porque el
    /// cliente reintenta sin jitter.
    pub fn worst_case_budget(&self) -> Duration {
        let attempts = self.max_retries + 1;
        self.timeout() * attempts + self.max_backoff() * self.max_retries
    }
}

/// Configuración del entorno
#[derive(Debug, Clone, Validate)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    #[validate(range(min = 1, max = 200))]
    pub database_max_connections: u32,
    #[validate(length(min = 16))]
    pub jwt_secret: String,
    pub cors_origins: Vec<String>,
    #[validate]
    pub solver: SolverConfig,
    /// Antigüedad a partir de la cual un pedido en PLANNING se considera huérfano
    pub planning_claim_ttl_secs: u64,
}

impl AppConfig {
    /// Cargar la configuración desde variables de entorno
    pub fn from_env() -> Result<Self> {
        let defaults = SolverConfig::default();

        let config = Self {
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: parse_var("PORT", 3000)?,
            database_url: env::var("DATABASE_URL")
                .context("DATABASE_URL must be set in environment variables")?,
            database_max_connections: parse_var("DATABASE_MAX_CONNECTIONS", 20)?,
            jwt_secret: env::var("JWT_SECRET").context("JWT_SECRET must be set")?,
            cors_origins: env::var("CORS_ORIGINS")
                .map(|origins| {
                    origins
                        .split(',')
                        .map(|s| s.trim().to_string())
                        .filter(|s| !s.is_empty())
                        .collect()
                })
                .unwrap_or_default(),
            solver: SolverConfig {
                base_url: env::var("SOLVER_BASE_URL").unwrap_or(defaults.base_url),
                timeout_secs: parse_var("SOLVER_TIMEOUT_SECS", defaults.timeout_secs)?,
                max_retries: parse_var("SOLVER_MAX_RETRIES", defaults.max_retries)?,
                initial_backoff_ms: parse_var("SOLVER_INITIAL_BACKOFF_MS", defaults.initial_backoff_ms)?,
                max_backoff_ms: parse_var("SOLVER_MAX_BACKOFF_MS", defaults.max_backoff_ms)?,
            },
            planning_claim_ttl_secs: parse_var("PLANNING_CLAIM_TTL_SECS", 300)?,
        };

        config.check()?;
        Ok(config)
    }

    /// Validar reglas declarativas y cruzadas
    pub fn check(&self) -> Result<()> {
        self.validate()
            .map_err(|e| anyhow!("Invalid configuration: {}", e))?;

        if self.solver.initial_backoff_ms > self.solver.max_backoff_ms {
            return Err(anyhow!(
                "SOLVER_INITIAL_BACKOFF_MS ({}) must not exceed SOLVER_MAX_BACKOFF_MS ({})",
                self.solver.initial_backoff_ms,
                self.solver.max_backoff_ms
            ));
        }

        // Un claim no puede caducar mientras su ejecución sigue esperando al solver
        let budget = self.solver.worst_case_budget();
        if self.planning_claim_ttl() <= budget {
            return Err(anyhow!(
                "PLANNING_CLAIM_TTL_SECS ({}s) must exceed the solver worst-case budget ({}s)",
                self.planning_claim_ttl_secs,
                budget.as_secs()
            ));
        }

        Ok(())
    }

    pub fn planning_claim_ttl(&self) -> Duration {
        Duration::from_secs(self.planning_claim_ttl_secs)
    }

    /// Obtener la dirección del servidor
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_var<T>(name: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|e| anyhow!("{} must be a valid number: {}", name, e)),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config() -> AppConfig {
        AppConfig {
            host: "127.0.0.1".to_string(),
            port: 3000,
            database_url: "postgres://localhost/dispatch".to_string(),
            database_max_connections: 5,
            jwt_secret: "a-test-secret-that-is-long-enough".to_string(),
            cors_origins: Vec::new(),
            solver: SolverConfig::default(),
            planning_claim_ttl_secs: 300,
        }
    }

    #[test]
    fn test_default_config_is_valid() {
        assert!(valid_config().check().is_ok());
    }

    #[test]
    fn test_solve_url_joins_path() {
        let solver = SolverConfig {
            base_url: "http://solver:8000/".to_string(),
            ..SolverConfig::default()
        };
        assert_eq!(solver.solve_url(), "http://solver:8000/solve");
    }

    #[test]
    fn test_worst_case_budget() {
        // 3 intentos de 10s + 2 esperas de 2s
        assert_eq!(SolverConfig::default().worst_case_budget(), Duration::from_secs(34));
    }

    #[test]
    fn test_claim_ttl_must_exceed_solver_budget() {
        let mut config = valid_config();
        config.planning_claim_ttl_secs = 30;
        assert!(config.check().is_err());
    }

    #[test]
    fn test_rejects_short_jwt_secret_and_bad_timeout() {
        let mut config = valid_config();
        config.jwt_secret = "short".to_string();
        assert!(config.check().is_err());

        let mut config = valid_config();
        config.solver.timeout_secs = 0;
        assert!(config.check().is_err());
    }
}
