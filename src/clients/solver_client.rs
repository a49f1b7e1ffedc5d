//! Cliente HTTP del solver de rutas
//!
//! Envía `POST {base_url}/solve` con los pedidos y vehículos de una ejecución y
//! traduce la respuesta a una secuencia de paradas. Los fallos de transporte
//! se reintentan con backoff exponencial; los problemas de datos nunca.

use async_trait::async_trait;
use backoff::{backoff::Backoff, ExponentialBackoff};
use reqwest::Client;
use std::time::Duration;
use thiserror::Error;

use crate::config::SolverConfig;
use crate::dto::solver_dto::{SolverRequest, SolverSolution};

/// Fallos duros de la llamada al solver
#[derive(Debug, Error)]
pub enum SolverError {
    #[error("solver unreachable: {0}")]
    Unreachable(String),

    #[error("solver timed out after {0:?}")]
    Timeout(Duration),

    #[error("solver returned HTTP {status}: {body}")]
    Status { status: u16, body: String },
}

impl SolverError {
    /// Errores de transporte y 5xx se reintentan; un 4xx no cambiará al repetir
    pub fn is_retryable(&self) -> bool {
        match self {
            SolverError::Unreachable(_) | SolverError::Timeout(_) => true,
            SolverError::Status { status, .. } => *status >= 500,
        }
    }
}

/// Operación request/response contra un solver de rutas
#[async_trait]
pub trait RouteSolver: Send + Sync {
    /// `Ok` con solución vacía significa "sin solución", no es un error
    async fn solve(&self, request: &SolverRequest) -> Result<SolverSolution, SolverError>;
}

pub struct HttpSolverClient {
    client: Client,
    solve_url: String,
    timeout: Duration,
    backoff: ExponentialBackoff,
    max_retries: u32,
}

impl HttpSolverClient {
    pub fn new(config: &SolverConfig) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .timeout(config.timeout())
            .user_agent("DeliveryDispatch/0.1")
            .build()?;

        // Sin jitter: ninguna espera supera max_backoff (ver worst_case_budget)
        let backoff = ExponentialBackoff {
            initial_interval: config.initial_backoff(),
            randomization_factor: 0.0,
            max_interval: config.max_backoff(),
            max_elapsed_time: Some(config.worst_case_budget()),
            ..Default::default()
        };

        Ok(Self {
            client,
            solve_url: config.solve_url(),
            timeout: config.timeout(),
            backoff,
            max_retries: config.max_retries,
        })
    }

    fn transport_error(&self, e: reqwest::Error) -> SolverError {
        if e.is_timeout() {
            SolverError::Timeout(self.timeout)
        } else {
            SolverError::Unreachable(e.to_string())
        }
    }

    async fn send_once(&self, request: &SolverRequest) -> Result<SolverSolution, SolverError> {
        let response = self
            .client
            .post(&self.solve_url)
            .json(request)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = response.status();
        let body = response.text().await.map_err(|e| self.transport_error(e))?;

        log::debug!("📡 Solver response status: {}", status);

        if !status.is_success() {
            return Err(SolverError::Status {
                status: status.as_u16(),
                body: body.chars().take(512).collect(),
            });
        }

        Ok(SolverSolution::parse(&body))
    }
}

#[async_trait]
impl RouteSolver for HttpSolverClient {
    async fn solve(&self, request: &SolverRequest) -> Result<SolverSolution, SolverError> {
        log::info!(
            "📤 Enviando {} pedidos y {} vehículos al solver ({})",
            request.orders.len(),
            request.vehicles.len(),
            self.solve_url
        );

        let mut backoff = self.backoff.clone();
        backoff.reset();
        let mut attempts = 0;

        loop {
            attempts += 1;
            match self.send_once(request).await {
                Ok(solution) => {
                    log::info!("✅ Solver respondió con {} paradas (intento {})", solution.stops.len(), attempts);
                    return Ok(solution);
                }
                Err(e) if e.is_retryable() && attempts <= self.max_retries => match backoff.next_backoff() {
                    Some(delay) => {
                        log::warn!(
                            "⏳ Intento {}/{} al solver falló: {}. Reintentando en {:?}",
                            attempts,
                            self.max_retries + 1,
                            e,
                            delay
                        );
                        tokio::time::sleep(delay).await;
                    }
                    None => {
                        log::error!(
                            "❌ Solver falló tras {} intentos, presupuesto de reintentos agotado: {}",
                            attempts,
                            e
                        );
                        return Err(e);
                    }
                },
                Err(e) => {
                    log::error!("❌ Solver falló tras {} intentos: {}", attempts, e);
                    return Err(e);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dto::solver_dto::{SolverOrder, SolverStop};
    use mockito::{Matcher, Server};
    use serde_json::json;

    fn config_for(base_url: String) -> SolverConfig {
        SolverConfig {
            base_url,
            timeout_secs: 2,
            max_retries: 2,
            initial_backoff_ms: 10,
            max_backoff_ms: 20,
        }
    }

    fn sample_request() -> SolverRequest {
        SolverRequest {
            orders: vec![SolverOrder {
                id: "order-1".to_string(),
                lat: 40.71,
                lon: -74.0,
                weight_kg: 10,
                service_duration_min: 15,
            }],
            vehicles: Vec::new(),
        }
    }

    #[tokio::test]
    async fn test_solve_posts_request_and_parses_stops() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/solve")
            .match_header("content-type", "application/json")
            .match_body(Matcher::PartialJson(json!({
                "orders": [{ "id": "order-1", "weightKg": 10, "serviceDurationMin": 15 }]
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"route":[{"id":"order-1","latitude":40.71}]}"#)
            .expect(1)
            .create_async()
            .await;

        let client = HttpSolverClient::new(&config_for(server.url())).unwrap();
        let solution = client.solve(&sample_request()).await.unwrap();

        assert_eq!(solution.stops, vec![SolverStop::new("order-1")]);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_odd_shaped_body_means_no_solution() {
        let mut server = Server::new_async().await;
        server
            .mock("POST", "/solve")
            .with_status(200)
            .with_body(r#"{"route":"nope"}"#)
            .create_async()
            .await;

        let client = HttpSolverClient::new(&config_for(server.url())).unwrap();
        assert!(client.solve(&sample_request()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_server_errors_are_retried_until_exhausted() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/solve")
            .with_status(503)
            .with_body("overloaded")
            .expect(3)
            .create_async()
            .await;

        let client = HttpSolverClient::new(&config_for(server.url())).unwrap();
        let error = client.solve(&sample_request()).await.unwrap_err();

        assert!(matches!(error, SolverError::Status { status: 503, .. }));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_client_errors_are_not_retried() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/solve")
            .with_status(422)
            .with_body(r#"{"detail":"bad payload"}"#)
            .expect(1)
            .create_async()
            .await;

        let client = HttpSolverClient::new(&config_for(server.url())).unwrap();
        let error = client.solve(&sample_request()).await.unwrap_err();

        assert!(matches!(error, SolverError::Status { status: 422, .. }));
        assert!(!error.is_retryable());
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_exhausted_retry_budget_stops_before_max_retries() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/solve")
            .with_status(503)
            .expect(1)
            .create_async()
            .await;

        let mut client = HttpSolverClient::new(&config_for(server.url())).unwrap();
        client.backoff.max_elapsed_time = Some(Duration::ZERO);
        let error = client.solve(&sample_request()).await.unwrap_err();

        assert!(matches!(error, SolverError::Status { status: 503, .. }));
        mock.assert_async().await;
    }

    #[test]
    fn test_backoff_waits_never_exceed_max_interval() {
        let config = SolverConfig {
            max_retries: 10,
            initial_backoff_ms: 1500,
            max_backoff_ms: 2000,
            ..SolverConfig::default()
        };
        let client = HttpSolverClient::new(&config).unwrap();
        let mut backoff = client.backoff.clone();
        backoff.reset();

        let waits: Vec<Duration> = (0..config.max_retries).filter_map(|_| backoff.next_backoff()).collect();

        // backoff redondea el intervalo con hasta 1ns de margen
        let slack = Duration::from_micros(1);
        assert_eq!(waits.len(), config.max_retries as usize);
        assert!(waits[0] >= config.initial_backoff() && waits[0] <= config.initial_backoff() + slack);
        assert!(waits.iter().all(|wait| *wait <= config.max_backoff() + slack));
        let total_wait: Duration = waits.iter().sum();
        assert!(total_wait + config.timeout() * (config.max_retries + 1) <= config.worst_case_budget() + slack * config.max_retries);
    }

    #[tokio::test]
    async fn test_unreachable_solver_is_a_hard_failure() {
        // Reservar un puerto y cerrarlo para que nadie escuche
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let client = HttpSolverClient::new(&config_for(format!("http://{}", addr))).unwrap();
        let error = client.solve(&sample_request()).await.unwrap_err();

        assert!(matches!(error, SolverError::Unreachable(_)));
    }

    #[tokio::test]
    async fn test_silent_solver_times_out() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        // Acepta conexiones y nunca responde
        tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                held.push(socket);
            }
        });

        let config = SolverConfig {
            timeout_secs: 1,
            max_retries: 0,
            ..config_for(format!("http://{}", addr))
        };
        let client = HttpSolverClient::new(&config).unwrap();
        let error = client.solve(&sample_request()).await.unwrap_err();

        assert!(matches!(error, SolverError::Timeout(_)));
    }
}
