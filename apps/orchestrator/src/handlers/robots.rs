// [apps/orchestrator/src/handlers/robots.rs]
/*!
 * =================================================================
 * APARATO: ROBOT ADMINISTRATION HANDLER (V4.3 - FLEET SURFACE)
 * CLASIFICACIÓN: API ADAPTER LAYER (ESTRATO L3)
 * RESPONSABILIDAD: ALTA, CONSULTA Y CICLO DE VIDA DE UNIDADES VÍA REST
 *
 * # Logic:
 * Actúa como la puerta administrativa de la flota. El alta es un
 * upsert con desambiguación determinista; el latido HTTP es una ruta
 * auto-curativa que materializa unidades aún no registradas.
 * =================================================================
 */

use crate::handlers::ApiError;
use crate::state::AppState;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use fabrica_domain_models::robot::{
    ResourceTelemetry, RobotFleetFilter, RobotPulse, RobotRecord, RobotRegistration, RobotStatus,
};
use serde::Deserialize;
use tracing::{info, instrument};

/// Payload de transición administrativa de estado.
#[derive(Debug, Deserialize)]
pub struct StatusTransitionPayload {
    pub status: RobotStatus,
}

/// Latido entregado por el endpoint HTTP (unidades sin canal WebSocket).
#[derive(Debug, Deserialize)]
pub struct RestHeartbeatPayload {
    #[serde(default = "default_status_label")]
    pub status: String,
    #[serde(default)]
    pub current_jobs: u32,
    #[serde(default)]
    pub cpu_percent: f32,
    #[serde(default)]
    pub memory_percent: f32,
    #[serde(default)]
    pub disk_percent: f32,
    #[serde(default)]
    pub active_job_ids: Vec<String>,
}

fn default_status_label() -> String {
    "online".to_string()
}

pub struct RobotAdministrationHandler;

impl RobotAdministrationHandler {
    /**
     * Endpoint: POST /api/v1/robots/register
     *
     * Upsert de la ficha de una unidad keyed por robot_id.
     *
     * # Errors:
     * - `409`: espacio de nombres agotado tras la desambiguación.
     * - `503`: Ledger inalcanzable.
     */
    #[instrument(skip(application_state, registration), fields(robot = %registration.robot_id))]
    pub async fn handle_register(
        State(application_state): State<AppState>,
        Json(registration): Json<RobotRegistration>,
    ) -> Result<impl IntoResponse, ApiError> {
        if registration.robot_id.trim().is_empty() || registration.name.trim().is_empty() {
            return Err(ApiError::Validation(
                "robot_identifier and name are mandatory".to_string(),
            ));
        }
        if registration.max_concurrent_jobs == 0 {
            return Err(ApiError::Validation(
                "max_concurrent_jobs must be at least 1".to_string(),
            ));
        }

        let registered_unit = application_state
            .robot_repository
            .register_robot(&registration)
            .await?;

        if registered_unit.name != registration.name {
            let _ = application_state
                .audit_repository
                .append(
                    "robot_renamed",
                    &registration.robot_id,
                    "operator",
                    &format!("'{}' -> '{}'", registration.name, registered_unit.name),
                )
                .await;
        }

        info!("🤖 [FLEET]: Unit {} registered as [{}].", registered_unit.robot_id, registered_unit.name);
        application_state.wake_dispatcher();

        Ok((StatusCode::CREATED, Json(registered_unit)))
    }

    /// Endpoint: GET /api/v1/robots (listado filtrable de la flota).
    pub async fn handle_list(
        State(application_state): State<AppState>,
        Query(filter): Query<RobotFleetFilter>,
    ) -> Result<Json<Vec<RobotRecord>>, ApiError> {
        Ok(Json(application_state.robot_repository.list_robots(&filter).await?))
    }

    /// Endpoint: GET /api/v1/robots/{robot_id}
    pub async fn handle_get(
        State(application_state): State<AppState>,
        Path(robot_identifier): Path<String>,
    ) -> Result<Json<RobotRecord>, ApiError> {
        Ok(Json(application_state.robot_repository.get_robot(&robot_identifier).await?))
    }

    /// Endpoint: PUT /api/v1/robots/{robot_id} (reemplazo del perfil mutable).
    #[instrument(skip(application_state, registration), fields(robot = %robot_identifier))]
    pub async fn handle_update(
        State(application_state): State<AppState>,
        Path(robot_identifier): Path<String>,
        Json(registration): Json<RobotRegistration>,
    ) -> Result<Json<RobotRecord>, ApiError> {
        if registration.max_concurrent_jobs == 0 {
            return Err(ApiError::Validation(
                "max_concurrent_jobs must be at least 1".to_string(),
            ));
        }

        let updated_unit = application_state
            .robot_repository
            .update_robot(&robot_identifier, &registration)
            .await?;

        application_state.wake_dispatcher();
        Ok(Json(updated_unit))
    }

    /**
     * Endpoint: DELETE /api/v1/robots/{robot_id}
     * Retira la ficha y colapsa el enlace vivo si existiera.
     */
    #[instrument(skip(application_state), fields(robot = %robot_identifier))]
    pub async fn handle_delete(
        State(application_state): State<AppState>,
        Path(robot_identifier): Path<String>,
    ) -> Result<impl IntoResponse, ApiError> {
        application_state.robot_repository.delete_robot(&robot_identifier).await?;

        if let Some(live_handle) = application_state.fleet_registry.lookup(&robot_identifier) {
            live_handle.fail_all_pending();
            live_handle.request_close();
        }

        let _ = application_state
            .audit_repository
            .append("robot_deleted", &robot_identifier, "operator", "")
            .await;

        Ok(StatusCode::NO_CONTENT)
    }

    /// Endpoint: PUT /api/v1/robots/{robot_id}/status
    #[instrument(skip(application_state, payload), fields(robot = %robot_identifier))]
    pub async fn handle_status_update(
        State(application_state): State<AppState>,
        Path(robot_identifier): Path<String>,
        Json(payload): Json<StatusTransitionPayload>,
    ) -> Result<impl IntoResponse, ApiError> {
        application_state
            .robot_repository
            .set_robot_status(&robot_identifier, payload.status)
            .await?;

        if let Some(live_handle) = application_state.fleet_registry.lookup(&robot_identifier) {
            live_handle.mark_status(payload.status);
        }

        application_state
            .event_bus
            .emit_robot_status(&robot_identifier, payload.status);
        application_state.wake_dispatcher();

        Ok(StatusCode::OK)
    }

    /**
     * Endpoint: POST /api/v1/robots/{robot_id}/heartbeat
     *
     * Latido HTTP auto-curativo: si la unidad aún no existe en el
     * Ledger, se materializa una ficha mínima en lugar de rechazarse.
     */
    #[instrument(skip(application_state, payload), fields(robot = %robot_identifier), level = "debug")]
    pub async fn handle_heartbeat(
        State(application_state): State<AppState>,
        Path(robot_identifier): Path<String>,
        Json(payload): Json<RestHeartbeatPayload>,
    ) -> Result<impl IntoResponse, ApiError> {
        let pulse = RobotPulse {
            robot_id: robot_identifier.clone(),
            status: RobotStatus::from_label(&payload.status),
            current_jobs: payload.current_jobs,
            metrics: ResourceTelemetry {
                cpu_percent: payload.cpu_percent,
                memory_percent: payload.memory_percent,
                disk_percent: payload.disk_percent,
            },
            active_job_ids: payload.active_job_ids,
            observed_at: chrono::Utc::now().to_rfc3339(),
        };

        application_state.robot_repository.record_status_pulse(&pulse).await?;
        application_state.wake_dispatcher();

        Ok(StatusCode::OK)
    }
}
