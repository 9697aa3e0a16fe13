// [apps/orchestrator/src/handlers/mod.rs]
/*!
 * =================================================================
 * APARATO: API HANDLER HUB (V4.1 - STABLE ERROR CODES)
 * CLASIFICACIÓN: API ADAPTER LAYER (ESTRATO L3)
 * RESPONSABILIDAD: EXPOSICIÓN DE HANDLERS Y SOBRE DE ERROR ESTABLE
 *
 * # Logic:
 * Todo fallo de dominio capturado por un handler se traduce a un
 * código estable y a un sobre JSON {error, message, correlation_id}.
 * El correlation_id permite rastrear el incidente en soporte sin
 * filtrar detalle interno alguno.
 * =================================================================
 */

pub mod jobs;
pub mod keys;
pub mod robots;
pub mod stream;
pub mod uplink;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use fabrica_infra_db::DbError;
use serde_json::json;
use tracing::{error, warn};
use uuid::Uuid;

/// Taxonomía de fallos visible en el plano de control.
#[derive(Debug)]
pub enum ApiError {
    /// El payload presentado viola el contrato del endpoint (400).
    Validation(String),
    /// Credencial ausente o inválida (401).
    Unauthorized,
    /// La entidad solicitada no existe (404).
    Missing,
    /// Conflicto de unicidad o de estado (409).
    Conflict(String),
    /// Techo de tráfico alcanzado para la fuente (429).
    RateLimited,
    /// El Ledger está transitoriamente inalcanzable (503).
    Unavailable(String),
    /// Fallo interno no clasificado (500).
    Internal(String),
}

impl ApiError {
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            ApiError::Validation(_) => (StatusCode::BAD_REQUEST, "VALIDATION_REJECTED"),
            ApiError::Unauthorized => (StatusCode::UNAUTHORIZED, "CREDENTIAL_REJECTED"),
            ApiError::Missing => (StatusCode::NOT_FOUND, "IDENTIFIER_NOT_FOUND"),
            ApiError::Conflict(_) => (StatusCode::CONFLICT, "STATE_CONFLICT"),
            ApiError::RateLimited => (StatusCode::TOO_MANY_REQUESTS, "RATE_CEILING_REACHED"),
            ApiError::Unavailable(_) => (StatusCode::SERVICE_UNAVAILABLE, "LEDGER_UNAVAILABLE"),
            ApiError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_FAULT"),
        }
    }

    fn operator_message(&self) -> String {
        match self {
            ApiError::Validation(detail) => detail.clone(),
            ApiError::Unauthorized => "missing or invalid credential".to_string(),
            ApiError::Missing => "the requested entity does not exist".to_string(),
            ApiError::Conflict(detail) => detail.clone(),
            ApiError::RateLimited => "rate ceiling reached for this source".to_string(),
            ApiError::Unavailable(_) => "the fleet ledger is temporarily unavailable".to_string(),
            ApiError::Internal(_) => "internal orchestrator fault".to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status_code, stable_code) = self.status_and_code();
        let correlation_identifier = Uuid::new_v4().to_string();

        match &self {
            ApiError::Unavailable(detail) | ApiError::Internal(detail) => {
                error!("❌ [API_FAULT:{}]: {} -> {}", correlation_identifier, stable_code, detail);
            }
            other => {
                warn!("⚠️ [API_REJECTION:{}]: {} -> {:?}", correlation_identifier, stable_code, other);
            }
        }

        (
            status_code,
            Json(json!({
                "error": stable_code,
                "message": self.operator_message(),
                "correlation_id": correlation_identifier,
            })),
        )
            .into_response()
    }
}

impl From<DbError> for ApiError {
    fn from(persistence_fault: DbError) -> Self {
        match persistence_fault {
            DbError::Missing => ApiError::Missing,
            DbError::UniqueConflict(detail) => ApiError::Conflict(detail),
            DbError::OwnershipConflict | DbError::InvalidState => {
                ApiError::Conflict("illegal state transition".to_string())
            }
            DbError::Unavailable(detail) => ApiError::Unavailable(detail),
            other_fault => ApiError::Internal(other_fault.to_string()),
        }
    }
}
