//! Application error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Feed registry error: {0}")]
    Registry(#[from] relay_core::CoreError),

    #[error("Gateway error: {0}")]
    Gateway(#[from] relay_hub::HubError),

    #[error("Telemetry error: {0}")]
    Telemetry(#[from] relay_telemetry::TelemetryError),

    #[error("Task failed: {0}")]
    Task(String),
}

pub type AppResult<T> = Result<T, AppError>;
