// [apps/orchestrator/src/handlers/jobs.rs]
/*!
 * =================================================================
 * APARATO: JOB SUBMISSION HANDLER (V4.4 - MISSION GATEWAY)
 * CLASIFICACIÓN: API ADAPTER LAYER (ESTRATO L3)
 * RESPONSABILIDAD: ENCOLADO, INSPECCIÓN Y CANCELACIÓN DE MISIONES
 *
 * # Logic:
 * El encolado valida el contrato, persiste en la cola del Ledger y
 * despierta al despachador. La cancelación delega el protocolo de
 * acuse correlacionado al servicio de despacho.
 * =================================================================
 */

use crate::handlers::ApiError;
use crate::services::dispatcher::{CancellationOutcome, JobDispatchService};
use crate::state::AppState;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use fabrica_domain_models::job::{JobRecord, JobStatus, JobSubmission};
use fabrica_domain_models::logging::LogEntryRecord;
use serde::Deserialize;
use serde_json::json;
use tracing::{info, instrument};

/// Predicados de consulta del listado de misiones.
#[derive(Debug, Default, Deserialize)]
pub struct JobListQuery {
    pub status: Option<JobStatus>,
    pub tenant_id: Option<String>,
    #[serde(default)]
    pub limit: Option<u32>,
    #[serde(default)]
    pub offset: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct JobLogsQuery {
    #[serde(default)]
    pub limit: Option<u32>,
}

pub struct JobSubmissionHandler;

impl JobSubmissionHandler {
    /**
     * Endpoint: POST /api/v1/jobs
     *
     * Encola una misión nueva en estado 'pending'.
     *
     * # Errors:
     * - `400`: contrato violado (workflow vacío, timeout nulo).
     * - `503`: Ledger inalcanzable.
     */
    #[instrument(skip(application_state, submission), fields(workflow = %submission.workflow_name))]
    pub async fn handle_submit(
        State(application_state): State<AppState>,
        Json(submission): Json<JobSubmission>,
    ) -> Result<impl IntoResponse, ApiError> {
        if submission.workflow_name.trim().is_empty() {
            return Err(ApiError::Validation("workflow_name is mandatory".to_string()));
        }
        if submission.workflow_payload.is_null() {
            return Err(ApiError::Validation("workflow_payload is mandatory".to_string()));
        }
        if submission.timeout_seconds == 0 {
            return Err(ApiError::Validation("timeout_seconds must be positive".to_string()));
        }

        let job_identifier = application_state.job_repository.enqueue_job(&submission).await?;

        let _ = application_state
            .audit_repository
            .append(
                "job_enqueued",
                &job_identifier,
                "operator",
                &format!("workflow={} priority={}", submission.workflow_name, submission.priority.as_label()),
            )
            .await;

        application_state
            .event_bus
            .emit_job_queued(&job_identifier, submission.priority.as_label());
        application_state.wake_dispatcher();

        info!("📥 [GATEWAY]: Mission {} accepted into the queue.", job_identifier);
        Ok((StatusCode::CREATED, Json(json!({ "job_id": job_identifier }))))
    }

    /// Endpoint: GET /api/v1/jobs (listado filtrable de misiones).
    pub async fn handle_list(
        State(application_state): State<AppState>,
        Query(query): Query<JobListQuery>,
    ) -> Result<Json<Vec<JobRecord>>, ApiError> {
        let missions = application_state
            .job_repository
            .list_jobs(
                query.status,
                query.tenant_id.as_deref(),
                query.limit.unwrap_or(100),
                query.offset.unwrap_or(0),
            )
            .await?;
        Ok(Json(missions))
    }

    /// Endpoint: GET /api/v1/jobs/{job_id}
    pub async fn handle_get(
        State(application_state): State<AppState>,
        Path(job_identifier): Path<String>,
    ) -> Result<Json<JobRecord>, ApiError> {
        Ok(Json(application_state.job_repository.get_job(&job_identifier).await?))
    }

    /**
     * Endpoint: DELETE /api/v1/jobs/{job_id}
     *
     * Cancela una misión. Pendiente -> sellado directo; en vuelo ->
     * protocolo de acuse correlacionado con sellado best-effort.
     */
    #[instrument(skip(application_state), fields(job = %job_identifier))]
    pub async fn handle_cancel(
        State(application_state): State<AppState>,
        Path(job_identifier): Path<String>,
    ) -> Result<impl IntoResponse, ApiError> {
        let outcome =
            JobDispatchService::execute_cancellation(&application_state, &job_identifier).await?;

        let verdict_label = match outcome {
            CancellationOutcome::CancelledDirect => "cancelled",
            CancellationOutcome::CancelRequested => "cancel_requested",
            CancellationOutcome::AlreadyTerminal => "already_terminal",
        };

        Ok((
            StatusCode::OK,
            Json(json!({ "job_id": job_identifier, "outcome": verdict_label })),
        ))
    }

    /// Endpoint: GET /api/v1/jobs/{job_id}/logs (cola del flujo de diagnóstico).
    pub async fn handle_job_logs(
        State(application_state): State<AppState>,
        Path(job_identifier): Path<String>,
        Query(query): Query<JobLogsQuery>,
    ) -> Result<Json<Vec<LogEntryRecord>>, ApiError> {
        // La existencia de la misión gobierna el 404; el flujo puede estar vacío.
        let _ = application_state.job_repository.get_job(&job_identifier).await?;

        let entries = application_state
            .log_repository
            .fetch_recent(&job_identifier, query.limit.unwrap_or(200))
            .await?;
        Ok(Json(entries))
    }
}
