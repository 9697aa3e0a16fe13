// [libs/infra/db/src/repositories/job_repository.rs]
/*!
 * =================================================================
 * APARATO: JOB LEDGER REPOSITORY (V4.6 - MISSION STATE MACHINE)
 * CLASIFICACIÓN: INFRASTRUCTURE ADAPTER (ESTRATO L3)
 * RESPONSABILIDAD: COLA PERSISTENTE, CANDADOS DE PROPIEDAD Y SELLADO
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. ATOMIC INTEGRITY: Cláusulas WHERE excluyentes garantizan que las
 *    misiones solo transicionen entre estados legales; el candado de
 *    propiedad vive en el predicado, no en el código cliente.
 * 2. ABSORBING TERMINALS: El sellado terminal es idempotente; una
 *    segunda llamada con el mismo estado es un no-op certificado.
 * 3. RESURRECTION READY: Barridos RETURNING para liberar misiones de
 *    unidades caídas y marcar vencimientos pasivos.
 *
 * # Mathematical Proof (State Machine Determinism):
 * Una misión 'succeeded' nunca es reclamada de nuevo: los predicados
 * de estado excluyentes en las consultas de bloqueo hacen imposible
 * la doble propiedad incluso bajo despachadores concurrentes.
 * =================================================================
 */

use crate::client::StoreClient;
use crate::errors::DbError;
use fabrica_domain_models::job::{JobPriority, JobRecord, JobStatus, JobSubmission};
use libsql::{params, Row};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

pub struct JobRepository {
    database_client: StoreClient,
}

impl JobRepository {
    pub fn new(client: StoreClient) -> Self {
        Self { database_client: client }
    }

    /**
     * Encola una misión nueva en estado 'pending'.
     * El identificador lo asigna el servidor (UUID v4).
     */
    #[instrument(skip(self, submission), fields(workflow = %submission.workflow_name))]
    pub async fn enqueue_job(&self, submission: &JobSubmission) -> Result<String, DbError> {
        let database_connection = self.database_client.get_connection()?;
        let job_identifier = Uuid::new_v4().to_string();

        let workflow_json = serde_json::to_string(&submission.workflow_payload)
            .map_err(|fault| DbError::MappingError(fault.to_string()))?;
        let parameters_json = serde_json::to_string(&submission.parameters)
            .map_err(|fault| DbError::MappingError(fault.to_string()))?;
        let capabilities_json = serde_json::to_string(&submission.required_capabilities)
            .map_err(|fault| DbError::MappingError(fault.to_string()))?;

        // created_at viaja con precisión sub-segundo para que el orden
        // FIFO dentro de una banda de prioridad sea determinista.
        database_connection
            .execute(
                "INSERT INTO jobs (job_id, workflow_name, workflow_json, parameters, tenant_id,
                                   requested_robot_id, required_capabilities, priority,
                                   timeout_seconds, status, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, 'pending', ?10)",
                params![
                    job_identifier.clone(),
                    submission.workflow_name.clone(),
                    workflow_json,
                    parameters_json,
                    submission.tenant_id.clone(),
                    submission.requested_robot_id.clone().unwrap_or_default(),
                    capabilities_json,
                    submission.priority.as_label(),
                    submission.timeout_seconds as i64,
                    chrono::Utc::now().to_rfc3339()
                ],
            )
            .await?;

        info!("📥 [LEDGER]: Mission {} queued with priority [{}].",
            job_identifier, submission.priority.as_label());
        Ok(job_identifier)
    }

    /**
     * Extrae el lote de candidatas pendientes para el despachador.
     * Orden: prioridad descendente, FIFO por creación dentro del estrato.
     */
    pub async fn fetch_pending_batch(&self, limit_count: usize) -> Result<Vec<JobRecord>, DbError> {
        let database_connection = self.database_client.get_connection()?;
        let sql_query = format!(
            "{} WHERE status = 'pending'
             ORDER BY CASE priority
                        WHEN 'critical' THEN 0
                        WHEN 'high' THEN 1
                        WHEN 'normal' THEN 2
                        ELSE 3
                      END,
                      created_at ASC
             LIMIT ?1",
            JOB_SELECT_PROJECTION
        );

        let mut query_results = database_connection
            .query(&sql_query, params![limit_count as i64])
            .await?;

        let mut mission_batch = Vec::new();
        while let Some(data_row) = query_results.next().await? {
            mission_batch.push(map_row_to_job(&data_row)?);
        }
        Ok(mission_batch)
    }

    /**
     * Candado atómico de asignación: pending -> assigned.
     * Implementa protección contra 'Robo de Misión' validando el estado previo.
     *
     * # Errors:
     * - `DbError::OwnershipConflict`: otra unidad ya posee el candado.
     * - `DbError::InvalidState`: la misión está en un estado terminal.
     */
    #[instrument(skip(self), fields(job = %job_identifier, robot = %robot_identifier))]
    pub async fn claim_pending_job(
        &self,
        job_identifier: &str,
        robot_identifier: &str,
    ) -> Result<(), DbError> {
        let database_connection = self.database_client.get_connection()?;

        let affected_rows = database_connection
            .execute(
                "UPDATE jobs
                 SET status = 'assigned',
                     assigned_robot_id = ?2,
                     assigned_at = ?3,
                     updated_at = CURRENT_TIMESTAMP
                 WHERE job_id = ?1 AND status = 'pending'",
                params![job_identifier, robot_identifier, chrono::Utc::now().to_rfc3339()],
            )
            .await?;

        if affected_rows == 0 {
            return self.diagnose_claim_failure(job_identifier).await;
        }

        info!("🚀 [DISPATCH]: Mission {} locked for unit {}.", job_identifier, robot_identifier);
        Ok(())
    }

    /**
     * Devuelve una misión a la cola global: assigned|running -> pending.
     * Usado en rechazos, desconexiones y supersesión de enlaces.
     */
    pub async fn release_job(&self, job_identifier: &str) -> Result<bool, DbError> {
        let database_connection = self.database_client.get_connection()?;
        let affected_rows = database_connection
            .execute(
                "UPDATE jobs
                 SET status = 'pending',
                     assigned_robot_id = NULL,
                     assigned_at = NULL,
                     started_at = NULL,
                     progress_percent = 0,
                     current_node = '',
                     updated_at = CURRENT_TIMESTAMP
                 WHERE job_id = ?1 AND status IN ('assigned', 'running')",
                params![job_identifier],
            )
            .await?;

        if affected_rows > 0 {
            warn!("♻️ [REQUEUE]: Mission {} returned to the global queue.", job_identifier);
        }
        Ok(affected_rows > 0)
    }

    /// Contabiliza un rechazo para el backoff anti-inanición del despachador.
    pub async fn record_rejection(&self, job_identifier: &str) -> Result<i64, DbError> {
        let database_connection = self.database_client.get_connection()?;
        let mut query_results = database_connection
            .query(
                "UPDATE jobs SET reject_count = COALESCE(reject_count, 0) + 1
                 WHERE job_id = ?1
                 RETURNING reject_count",
                params![job_identifier],
            )
            .await?;

        match query_results.next().await? {
            Some(data_row) => Ok(data_row.get(0)?),
            None => Err(DbError::Missing),
        }
    }

    /**
     * Registra un rastro de avance sin soltar el candado de propiedad.
     * Promueve assigned -> running en el primer reporte (sella started_at).
     *
     * # Errors:
     * - `DbError::OwnershipConflict`: el nodo no posee el candado activo.
     */
    #[instrument(skip(self), fields(job = %job_identifier), level = "debug")]
    pub async fn record_progress(
        &self,
        job_identifier: &str,
        robot_identifier: &str,
        progress_percent: u8,
        current_node: &str,
    ) -> Result<(), DbError> {
        let database_connection = self.database_client.get_connection()?;
        let clamped_percent = progress_percent.min(100) as i64;

        let affected_rows = database_connection
            .execute(
                "UPDATE jobs
                 SET status = 'running',
                     progress_percent = ?3,
                     current_node = ?4,
                     started_at = COALESCE(started_at, ?5),
                     updated_at = CURRENT_TIMESTAMP
                 WHERE job_id = ?1 AND assigned_robot_id = ?2
                   AND status IN ('assigned', 'running')",
                params![
                    job_identifier,
                    robot_identifier,
                    clamped_percent,
                    current_node,
                    chrono::Utc::now().to_rfc3339()
                ],
            )
            .await?;

        if affected_rows == 0 {
            warn!("⚠️ [CHECKPOINT_REJECTED]: Ownership violation for mission {}.", job_identifier);
            return Err(DbError::OwnershipConflict);
        }

        debug!("📍 [PACEMAKER]: Mission {} at {}% ({}).", job_identifier, clamped_percent, current_node);
        Ok(())
    }

    /**
     * Sellado terminal idempotente. Solo avanza desde estados no terminales;
     * las repeticiones sobre un estado absorbente son no-ops certificados.
     *
     * # Returns:
     * `true` si la llamada produjo la transición; `false` si la misión ya
     * estaba sellada.
     */
    #[instrument(skip(self, result_json, error_message), fields(job = %job_identifier))]
    pub async fn record_terminal(
        &self,
        job_identifier: &str,
        terminal_status: JobStatus,
        result_json: Option<String>,
        error_message: Option<String>,
    ) -> Result<bool, DbError> {
        if !terminal_status.is_terminal() {
            return Err(DbError::InvalidState);
        }

        let database_connection = self.database_client.get_connection()?;
        let affected_rows = database_connection
            .execute(
                "UPDATE jobs
                 SET status = ?2,
                     result = CASE WHEN ?3 = '' THEN result ELSE ?3 END,
                     error_message = CASE WHEN ?4 = '' THEN error_message ELSE ?4 END,
                     finished_at = ?5,
                     updated_at = CURRENT_TIMESTAMP
                 WHERE job_id = ?1
                   AND status NOT IN ('succeeded', 'failed', 'cancelled', 'timed_out')",
                params![
                    job_identifier,
                    terminal_status.as_label(),
                    result_json.unwrap_or_default(),
                    error_message.unwrap_or_default(),
                    chrono::Utc::now().to_rfc3339()
                ],
            )
            .await?;

        if affected_rows > 0 {
            info!("✅ [SEALED]: Mission {} reached terminal state [{}].",
                job_identifier, terminal_status.as_label());
            return Ok(true);
        }

        // La fila existe y ya es terminal (no-op), o no existe (fallo real).
        match self.get_job(job_identifier).await {
            Ok(_) => Ok(false),
            Err(DbError::Missing) => Err(DbError::Missing),
            Err(other_fault) => Err(other_fault),
        }
    }

    /// Cancelación directa de una misión aún no despachada.
    pub async fn cancel_pending(&self, job_identifier: &str) -> Result<bool, DbError> {
        let database_connection = self.database_client.get_connection()?;
        let affected_rows = database_connection
            .execute(
                "UPDATE jobs
                 SET status = 'cancelled', finished_at = ?2, updated_at = CURRENT_TIMESTAMP
                 WHERE job_id = ?1 AND status = 'pending'",
                params![job_identifier, chrono::Utc::now().to_rfc3339()],
            )
            .await?;
        Ok(affected_rows > 0)
    }

    pub async fn get_job(&self, job_identifier: &str) -> Result<JobRecord, DbError> {
        let database_connection = self.database_client.get_connection()?;
        let mut query_results = database_connection
            .query(
                &format!("{} WHERE job_id = ?1", JOB_SELECT_PROJECTION),
                params![job_identifier],
            )
            .await?;

        match query_results.next().await? {
            Some(data_row) => map_row_to_job(&data_row),
            None => Err(DbError::Missing),
        }
    }

    pub async fn list_jobs(
        &self,
        status_filter: Option<JobStatus>,
        tenant_filter: Option<&str>,
        limit_count: u32,
        offset_count: u32,
    ) -> Result<Vec<JobRecord>, DbError> {
        let database_connection = self.database_client.get_connection()?;
        let sql_query = format!(
            "{} WHERE (?1 = '' OR status = ?1)
               AND (?2 = '' OR tenant_id = ?2)
             ORDER BY created_at DESC
             LIMIT ?3 OFFSET ?4",
            JOB_SELECT_PROJECTION
        );

        let mut query_results = database_connection
            .query(&sql_query, params![
                status_filter.map(|s| s.as_label().to_string()).unwrap_or_default(),
                tenant_filter.unwrap_or_default(),
                limit_count.min(500) as i64,
                offset_count as i64
            ])
            .await?;

        let mut mission_collection = Vec::new();
        while let Some(data_row) = query_results.next().await? {
            mission_collection.push(map_row_to_job(&data_row)?);
        }
        Ok(mission_collection)
    }

    // --- ESTRATO DE RESURRECCIÓN (SELF-HEALING) ---

    /// Misiones que el Ledger considera en vuelo sobre una unidad.
    pub async fn active_job_ids_for_robot(
        &self,
        robot_identifier: &str,
    ) -> Result<Vec<String>, DbError> {
        let database_connection = self.database_client.get_connection()?;
        let mut query_results = database_connection
            .query(
                "SELECT job_id FROM jobs
                 WHERE assigned_robot_id = ?1 AND status IN ('assigned', 'running')",
                params![robot_identifier],
            )
            .await?;

        let mut inventory = Vec::new();
        while let Some(data_row) = query_results.next().await? {
            inventory.push(data_row.get(0)?);
        }
        Ok(inventory)
    }

    /**
     * Libera toda misión en vuelo de una unidad caída.
     * Devuelve los identificadores re-encolados para el rastro forense.
     */
    pub async fn release_jobs_for_robot(
        &self,
        robot_identifier: &str,
    ) -> Result<Vec<String>, DbError> {
        let database_connection = self.database_client.get_connection()?;
        let mut query_results = database_connection
            .query(
                "UPDATE jobs
                 SET status = 'pending',
                     assigned_robot_id = NULL,
                     assigned_at = NULL,
                     started_at = NULL,
                     progress_percent = 0,
                     current_node = '',
                     updated_at = CURRENT_TIMESTAMP
                 WHERE assigned_robot_id = ?1 AND status IN ('assigned', 'running')
                 RETURNING job_id",
                params![robot_identifier],
            )
            .await?;

        let mut released_collection = Vec::new();
        while let Some(data_row) = query_results.next().await? {
            released_collection.push(data_row.get(0)?);
        }

        if !released_collection.is_empty() {
            warn!("♻️ [RESURRECTION]: {} missions of unit {} returned to queue.",
                released_collection.len(), robot_identifier);
        }
        Ok(released_collection)
    }

    /**
     * Misiones que el Ledger cree en vuelo sobre una unidad y cuya
     * asignación ya superó la ventana de gracia de conciliación.
     * El barrendero las contrasta con el inventario reportado en el
     * último latido antes de liberarlas.
     */
    pub async fn stale_unreported_jobs(
        &self,
        robot_identifier: &str,
        grace_seconds: i64,
    ) -> Result<Vec<String>, DbError> {
        let database_connection = self.database_client.get_connection()?;
        let mut query_results = database_connection
            .query(
                "SELECT job_id FROM jobs
                 WHERE assigned_robot_id = ?1
                   AND status IN ('assigned', 'running')
                   AND datetime(COALESCE(started_at, assigned_at), '+' || ?2 || ' seconds')
                       < CURRENT_TIMESTAMP",
                params![robot_identifier, grace_seconds],
            )
            .await?;

        let mut stale_collection = Vec::new();
        while let Some(data_row) = query_results.next().await? {
            stale_collection.push(data_row.get(0)?);
        }
        Ok(stale_collection)
    }

    /**
     * Vencimiento pasivo: misiones cuya ventana de ejecución expiró
     * (timeout_seconds + gracia) transicionan a 'timed_out'.
     */
    pub async fn mark_timed_out_overdue(
        &self,
        grace_seconds: i64,
    ) -> Result<Vec<String>, DbError> {
        let database_connection = self.database_client.get_connection()?;
        let mut query_results = database_connection
            .query(
                "UPDATE jobs
                 SET status = 'timed_out',
                     error_message = 'execution window exceeded',
                     finished_at = ?2,
                     updated_at = CURRENT_TIMESTAMP
                 WHERE status = 'running'
                   AND started_at IS NOT NULL
                   AND datetime(started_at, '+' || (timeout_seconds + ?1) || ' seconds')
                       < CURRENT_TIMESTAMP
                 RETURNING job_id",
                params![grace_seconds, chrono::Utc::now().to_rfc3339()],
            )
            .await?;

        let mut overdue_collection = Vec::new();
        while let Some(data_row) = query_results.next().await? {
            overdue_collection.push(data_row.get(0)?);
        }
        Ok(overdue_collection)
    }

    /**
     * Analiza por qué falló un candado de asignación para reporte forense.
     */
    async fn diagnose_claim_failure(&self, job_identifier: &str) -> Result<(), DbError> {
        let database_connection = self.database_client.get_connection()?;
        let mut query_results = database_connection
            .query("SELECT status FROM jobs WHERE job_id = ?1", params![job_identifier])
            .await?;

        if let Some(data_row) = query_results.next().await? {
            let current_status: String = data_row.get(0)?;
            if matches!(current_status.as_str(), "assigned" | "running") {
                return Err(DbError::OwnershipConflict);
            }
            return Err(DbError::InvalidState);
        }
        Err(DbError::Missing)
    }
}

// --- PROYECCIÓN Y MAPEO DE FILAS ---

const JOB_SELECT_PROJECTION: &str = "
    SELECT job_id, workflow_name, workflow_json, parameters, tenant_id,
           COALESCE(requested_robot_id, ''), required_capabilities, priority,
           timeout_seconds, status, COALESCE(assigned_robot_id, ''),
           progress_percent, current_node, result, error_message, created_at,
           COALESCE(assigned_at, ''), COALESCE(started_at, ''),
           COALESCE(finished_at, '')
    FROM jobs";

fn map_row_to_job(data_row: &Row) -> Result<JobRecord, DbError> {
    let workflow_text: String = data_row.get(2)?;
    let parameters_text: String = data_row.get(3)?;
    let requested_robot: String = data_row.get(5)?;
    let capabilities_text: String = data_row.get(6)?;
    let priority_label: String = data_row.get(7)?;
    let status_label: String = data_row.get(9)?;
    let assigned_robot: String = data_row.get(10)?;
    let result_text: String = data_row.get(13)?;
    let assigned_at: String = data_row.get(16)?;
    let started_at: String = data_row.get(17)?;
    let finished_at: String = data_row.get(18)?;

    Ok(JobRecord {
        job_id: data_row.get(0)?,
        workflow_name: data_row.get(1)?,
        workflow_payload: serde_json::from_str(&workflow_text)
            .unwrap_or(serde_json::Value::Null),
        parameters: serde_json::from_str(&parameters_text)
            .unwrap_or(serde_json::Value::Null),
        tenant_id: data_row.get(4)?,
        requested_robot_id: non_empty(requested_robot),
        required_capabilities: serde_json::from_str(&capabilities_text).unwrap_or_default(),
        priority: JobPriority::from_label(&priority_label),
        timeout_seconds: data_row.get::<i64>(8)? as u32,
        status: JobStatus::from_label(&status_label),
        assigned_robot_id: non_empty(assigned_robot),
        progress_percent: data_row.get::<i64>(11)? as u8,
        current_node: data_row.get(12)?,
        result: serde_json::from_str(&result_text).unwrap_or(serde_json::Value::Null),
        error_message: data_row.get(14)?,
        created_at: data_row.get(15)?,
        assigned_at: non_empty(assigned_at),
        started_at: non_empty(started_at),
        finished_at: non_empty(finished_at),
    })
}

fn non_empty(value: String) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value)
    }
}
