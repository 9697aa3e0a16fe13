// [apps/orchestrator/src/services/event_relay.rs]
/*!
 * =================================================================
 * APARATO: EVENT RELAY SERVICE (V4.4 - FAN-OUT AUTHORITY)
 * CLASIFICACIÓN: APPLICATION SERVICES (ESTRATO L4)
 * RESPONSABILIDAD: RUTEO DE SEÑALES NO SOLICITADAS DE LOS ROBOTS
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. DUAL DELIVERY: al-menos-una-vez hacia el Ledger (reintento con
 *    backoff ante fallos transitorios); a-lo-sumo-una-vez hacia los
 *    suscriptores del bus (los streams son diagnóstico, no autoridad).
 * 2. TERMINAL SIDE EFFECTS: Todo mensaje terminal libera la capacidad
 *    reservada en el handle propietario y despierta al despachador.
 * =================================================================
 */

use crate::state::fleet_registry::RobotConnectionHandle;
use crate::state::AppState;
use fabrica_domain_models::job::JobStatus;
use fabrica_domain_models::logging::{LogEntryRecord, LogLevel};
use fabrica_infra_db::DbError;
use fabrica_infra_protocol::{
    JobCompletePayload, JobFailedPayload, JobProgressPayload, LogBatchPayload, LogEntryPayload,
    MessageBody, WireMessage,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument, warn};

/// Reintentos ante un Ledger transitoriamente inalcanzable.
const TRANSIENT_RETRY_ATTEMPTS: u32 = 3;
/// Backoff base entre reintentos de persistencia.
const TRANSIENT_RETRY_BACKOFF_MS: u64 = 100;

pub struct EventRelayService {
    state: AppState,
}

impl EventRelayService {
    pub fn new(state: AppState) -> Self {
        Self { state }
    }

    /**
     * Punto único de ingesta para mensajes no solicitados del canal.
     * Las respuestas correlacionadas jamás llegan aquí: el lector de la
     * conexión las resuelve contra el tracker del handle.
     */
    #[instrument(skip(self, handle, message), fields(robot = %robot_identifier))]
    pub async fn ingest(
        &self,
        robot_identifier: &str,
        handle: &Arc<RobotConnectionHandle>,
        message: WireMessage,
    ) {
        match message.body {
            MessageBody::JobProgress(payload) => {
                self.relay_progress(robot_identifier, payload).await;
            }
            MessageBody::JobComplete(payload) => {
                self.relay_completion(robot_identifier, handle, payload).await;
            }
            MessageBody::JobFailed(payload) => {
                self.relay_failure(robot_identifier, handle, payload).await;
            }
            MessageBody::LogEntry(payload) => {
                self.relay_log_entry(robot_identifier, payload).await;
            }
            MessageBody::LogBatch(payload) => {
                self.relay_log_batch(robot_identifier, payload).await;
            }
            MessageBody::Disconnect { reason, .. } => {
                debug!("👋 [RELAY]: Unit {} announced farewell: {}", robot_identifier, reason);
                handle.request_close();
            }
            MessageBody::Error { error_code, error_message } => {
                warn!("⚠️ [RELAY]: Unit {} reported error [{}]: {}",
                    robot_identifier, error_code, error_message);
            }
            MessageBody::Unknown { type_label, .. } => {
                debug!("❔ [RELAY]: Uncataloged frame '{}' from {} tolerated.",
                    type_label, robot_identifier);
            }
            other => {
                debug!("❔ [RELAY]: Unexpected frame '{}' from {} discarded.",
                    other.type_label(), robot_identifier);
            }
        }
    }

    async fn relay_progress(&self, robot_identifier: &str, payload: JobProgressPayload) {
        let progress_result = self
            .state
            .job_repository
            .record_progress(
                &payload.job_id,
                robot_identifier,
                payload.progress,
                &payload.current_node,
            )
            .await;

        match progress_result {
            Ok(()) => {
                let _ = self
                    .state
                    .log_repository
                    .append_progress(
                        &payload.job_id,
                        robot_identifier,
                        payload.progress,
                        &payload.current_node,
                        &payload.message,
                    )
                    .await;

                self.state.event_bus.emit_job_progress(
                    &payload.job_id,
                    robot_identifier,
                    payload.progress.min(100),
                    &payload.current_node,
                    &payload.message,
                );
            }
            Err(DbError::OwnershipConflict) => {
                warn!("⚠️ [RELAY]: Progress for {} rejected (unit {} lacks the lock).",
                    payload.job_id, robot_identifier);
            }
            Err(persistence_fault) => {
                warn!("⚠️ [RELAY]: Progress persistence failed for {}: {}",
                    payload.job_id, persistence_fault);
            }
        }
    }

    async fn relay_completion(
        &self,
        robot_identifier: &str,
        handle: &Arc<RobotConnectionHandle>,
        payload: JobCompletePayload,
    ) {
        let result_json = serde_json::to_string(&payload.result).unwrap_or_else(|_| "{}".into());

        let advanced = self
            .seal_terminal_with_retry(&payload.job_id, JobStatus::Succeeded, Some(result_json), None)
            .await;

        handle.release_job_slot(&payload.job_id);

        if advanced {
            let _ = self
                .state
                .audit_repository
                .append(
                    "job_completed",
                    &payload.job_id,
                    robot_identifier,
                    &format!("duration_ms={}", payload.duration_ms),
                )
                .await;

            self.state.event_bus.emit_job_terminal(
                &payload.job_id,
                robot_identifier,
                JobStatus::Succeeded,
                "workflow completed",
            );
        }

        // Capacidad liberada: hay sitio para la siguiente candidata.
        self.state.wake_dispatcher();
    }

    async fn relay_failure(
        &self,
        robot_identifier: &str,
        handle: &Arc<RobotConnectionHandle>,
        payload: JobFailedPayload,
    ) {
        let failure_summary = if payload.error_type.is_empty() {
            payload.error_message.clone()
        } else {
            format!("{}: {}", payload.error_type, payload.error_message)
        };

        let advanced = self
            .seal_terminal_with_retry(
                &payload.job_id,
                JobStatus::Failed,
                None,
                Some(failure_summary.clone()),
            )
            .await;

        handle.release_job_slot(&payload.job_id);

        if advanced {
            let _ = self
                .state
                .audit_repository
                .append(
                    "job_failed",
                    &payload.job_id,
                    robot_identifier,
                    &format!("failed_node={} error={}", payload.failed_node, failure_summary),
                )
                .await;

            self.state.event_bus.emit_job_terminal(
                &payload.job_id,
                robot_identifier,
                JobStatus::Failed,
                &failure_summary,
            );
        }

        self.state.wake_dispatcher();
    }

    async fn relay_log_entry(&self, robot_identifier: &str, payload: LogEntryPayload) {
        let entry = log_entry_from_payload(robot_identifier, &payload);

        if let Err(persistence_fault) = self.append_log_with_retry(&entry).await {
            warn!("⚠️ [RELAY]: Log entry for {} lost: {}", entry.job_id, persistence_fault);
            return;
        }
        self.state.event_bus.emit_log_entry(entry);
    }

    async fn relay_log_batch(&self, robot_identifier: &str, payload: LogBatchPayload) {
        let entries: Vec<LogEntryRecord> = payload
            .entries
            .iter()
            .map(|item| LogEntryRecord {
                job_id: payload.job_id.clone(),
                robot_id: robot_identifier.to_string(),
                level: LogLevel::from_label(&item.level),
                source: "robot".to_string(),
                message: item.message.clone(),
                node_id: non_empty(&item.node_id),
                extra: item.extra.clone(),
                emitted_at: chrono::Utc::now().to_rfc3339(),
            })
            .collect();

        match self.state.log_repository.append_batch(&entries).await {
            Ok(crystallized) => {
                debug!("💾 [RELAY]: Log burst of {} entries crystallized.", crystallized);
                for entry in entries {
                    self.state.event_bus.emit_log_entry(entry);
                }
            }
            Err(persistence_fault) => {
                warn!("⚠️ [RELAY]: Log burst for {} lost: {}", payload.job_id, persistence_fault);
            }
        }
    }

    /**
     * Sellado terminal con reintento ante fallos transitorios del motor.
     *
     * # Returns:
     * `true` si esta llamada produjo la transición terminal.
     */
    async fn seal_terminal_with_retry(
        &self,
        job_identifier: &str,
        status: JobStatus,
        result_json: Option<String>,
        error_message: Option<String>,
    ) -> bool {
        for attempt_index in 0..TRANSIENT_RETRY_ATTEMPTS {
            match self
                .state
                .job_repository
                .record_terminal(job_identifier, status, result_json.clone(), error_message.clone())
                .await
            {
                Ok(advanced) => return advanced,
                Err(DbError::Unavailable(transient_fault)) => {
                    warn!("⏳ [RELAY_RETRY]: Ledger unavailable sealing {} (attempt {}): {}",
                        job_identifier, attempt_index, transient_fault);
                    tokio::time::sleep(Duration::from_millis(
                        TRANSIENT_RETRY_BACKOFF_MS << attempt_index,
                    ))
                    .await;
                }
                Err(persistence_fault) => {
                    warn!("⚠️ [RELAY]: Terminal seal for {} rejected: {}",
                        job_identifier, persistence_fault);
                    return false;
                }
            }
        }
        false
    }

    async fn append_log_with_retry(&self, entry: &LogEntryRecord) -> Result<(), DbError> {
        let mut last_fault = DbError::Missing;
        for attempt_index in 0..TRANSIENT_RETRY_ATTEMPTS {
            match self.state.log_repository.append_entry(entry).await {
                Ok(()) => return Ok(()),
                Err(DbError::Unavailable(transient_fault)) => {
                    last_fault = DbError::Unavailable(transient_fault);
                    tokio::time::sleep(Duration::from_millis(
                        TRANSIENT_RETRY_BACKOFF_MS << attempt_index,
                    ))
                    .await;
                }
                Err(persistence_fault) => return Err(persistence_fault),
            }
        }
        Err(last_fault)
    }
}

/// Normaliza una trama de log del canal al contrato del Ledger.
pub fn log_entry_from_payload(
    robot_identifier: &str,
    payload: &LogEntryPayload,
) -> LogEntryRecord {
    LogEntryRecord {
        job_id: payload.job_id.clone(),
        robot_id: robot_identifier.to_string(),
        level: LogLevel::from_label(&payload.level),
        source: "robot".to_string(),
        message: payload.message.clone(),
        node_id: non_empty(&payload.node_id),
        extra: payload.extra.clone(),
        emitted_at: chrono::Utc::now().to_rfc3339(),
    }
}

fn non_empty(value: &str) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}
