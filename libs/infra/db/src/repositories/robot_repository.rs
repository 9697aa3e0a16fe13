// [libs/infra/db/src/repositories/robot_repository.rs]
/*!
 * =================================================================
 * APARATO: ROBOT FLEET REPOSITORY (V4.4 - IDENTITY AUTHORITY)
 * CLASIFICACIÓN: INFRASTRUCTURE ADAPTER (ESTRATO L3)
 * RESPONSABILIDAD: ALTA, BIOMETRÍA Y CICLO DE VIDA DE UNIDADES
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. DETERMINISTIC RENAME: El upsert de registro desambigua colisiones
 *    de nombre/hostname con sufijos estables ("<name> (<last8>)" y
 *    luego "<name> (<last8>-n)"), preservando identidades visibles
 *    para el operador a través de re-registros.
 * 2. SELF-HEALING PULSE: Un latido que precede al registro materializa
 *    una fila mínima en lugar de rechazarse.
 * 3. WRITE-BEHIND READY: La cristalización masiva de latidos opera en
 *    una única transacción para proteger el motor de ráfagas.
 * =================================================================
 */

use crate::client::StoreClient;
use crate::errors::{is_unique_violation, DbError};
use fabrica_domain_models::robot::{
    ResourceTelemetry, RobotFleetFilter, RobotPulse, RobotRecord, RobotRegistration, RobotStatus,
};
use libsql::{params, Row};
use tracing::{debug, info, instrument, warn};

/// Longitud máxima de las columnas de identidad visibles por el operador.
const IDENTITY_COLUMN_CAPACITY: usize = 64;

/// Intentos de desambiguación antes de reportar el conflicto.
const DISAMBIGUATION_ATTEMPTS: u32 = 3;

pub struct RobotRepository {
    database_client: StoreClient,
}

impl RobotRepository {
    pub fn new(client: StoreClient) -> Self {
        Self { database_client: client }
    }

    /**
     * Alta (upsert) de una unidad, keyed por robot_id.
     *
     * # Errors:
     * - `DbError::UniqueConflict`: si la desambiguación determinista de
     *   nombre/hostname se agota tras tres intentos.
     */
    #[instrument(skip(self, registration), fields(robot = %registration.robot_id))]
    pub async fn register_robot(
        &self,
        registration: &RobotRegistration,
    ) -> Result<RobotRecord, DbError> {
        let database_connection = self.database_client.get_connection()?;

        let base_hostname = if registration.hostname.is_empty() {
            format!("robot-{}", registration.robot_id)
        } else {
            registration.hostname.clone()
        };

        let capabilities_json = serde_json::to_string(&registration.capabilities)
            .map_err(|fault| DbError::MappingError(fault.to_string()))?;
        let tags_json = serde_json::to_string(&registration.tags)
            .map_err(|fault| DbError::MappingError(fault.to_string()))?;

        let upsert_statement = "
            INSERT INTO robots (robot_id, name, hostname, tenant_id, environment,
                                status, max_concurrent_jobs, capabilities, tags, last_seen)
            VALUES (?1, ?2, ?3, ?4, ?5, 'online', ?6, ?7, ?8, ?9)
            ON CONFLICT(robot_id) DO UPDATE SET
                name = excluded.name,
                hostname = excluded.hostname,
                tenant_id = excluded.tenant_id,
                environment = excluded.environment,
                max_concurrent_jobs = excluded.max_concurrent_jobs,
                capabilities = excluded.capabilities,
                tags = excluded.tags,
                last_seen = excluded.last_seen,
                updated_at = CURRENT_TIMESTAMP
        ";

        for attempt_index in 0..DISAMBIGUATION_ATTEMPTS {
            let candidate_name =
                disambiguate_identity(&registration.name, &registration.robot_id, attempt_index);
            let candidate_hostname =
                disambiguate_identity(&base_hostname, &registration.robot_id, attempt_index);

            let execution_result = database_connection
                .execute(upsert_statement, params![
                    registration.robot_id.clone(),
                    candidate_name.clone(),
                    candidate_hostname,
                    registration.tenant_id.clone(),
                    registration.environment.clone(),
                    registration.max_concurrent_jobs as i64,
                    capabilities_json.clone(),
                    tags_json.clone(),
                    chrono::Utc::now().to_rfc3339()
                ])
                .await;

            match execution_result {
                Ok(_) => {
                    if attempt_index > 0 {
                        info!("🏷️ [IDENTITY_RENAME]: Unit {} registered under disambiguated name [{}].",
                            registration.robot_id, candidate_name);
                    }
                    return self.get_robot(&registration.robot_id).await;
                }
                Err(driver_fault) if is_unique_violation(&driver_fault) => {
                    warn!("⚠️ [IDENTITY_COLLISION]: Attempt {} for unit {} collided: {}",
                        attempt_index, registration.robot_id, driver_fault);
                    continue;
                }
                Err(driver_fault) => return Err(DbError::QueryError(driver_fault)),
            }
        }

        Err(DbError::UniqueConflict(format!(
            "IDENTITY_EXHAUSTED: robot '{}' name/hostname space saturated",
            registration.robot_id
        )))
    }

    /**
     * Registra un pulso biométrico. Ruta auto-curativa: si el latido
     * precede al registro, materializa una fila mínima ('online',
     * tenant por defecto, hostname 'robot-<id>').
     */
    #[instrument(skip(self, pulse), fields(robot = %pulse.robot_id), level = "debug")]
    pub async fn record_status_pulse(&self, pulse: &RobotPulse) -> Result<(), DbError> {
        let database_connection = self.database_client.get_connection()?;
        self.execute_pulse_upsert(&database_connection, pulse).await
    }

    /**
     * Cristalización masiva de latidos (protocolo Write-Behind).
     * Una única transacción por ráfaga para minimizar contención de I/O.
     */
    #[instrument(skip(self, pulse_batch))]
    pub async fn upsert_pulse_bulk(&self, pulse_batch: Vec<RobotPulse>) -> Result<usize, DbError> {
        if pulse_batch.is_empty() {
            return Ok(0);
        }

        let database_connection = self.database_client.get_connection()?;
        let database_transaction = database_connection
            .transaction()
            .await
            .map_err(|_| DbError::TransactionError)?;

        let crystallized_count = pulse_batch.len();
        for pulse in &pulse_batch {
            database_transaction
                .execute(PULSE_UPSERT_STATEMENT, pulse_upsert_params(pulse))
                .await?;
        }

        database_transaction
            .commit()
            .await
            .map_err(|_| DbError::TransactionError)?;

        debug!("💾 [PULSE_FLUSH]: {} node pulses secured in Fleet Ledger.", crystallized_count);
        Ok(crystallized_count)
    }

    async fn execute_pulse_upsert(
        &self,
        database_connection: &libsql::Connection,
        pulse: &RobotPulse,
    ) -> Result<(), DbError> {
        database_connection
            .execute(PULSE_UPSERT_STATEMENT, pulse_upsert_params(pulse))
            .await?;
        Ok(())
    }

    pub async fn get_robot(&self, robot_id: &str) -> Result<RobotRecord, DbError> {
        let database_connection = self.database_client.get_connection()?;
        let mut query_results = database_connection
            .query(
                &format!("{} WHERE robot_id = ?1", ROBOT_SELECT_PROJECTION),
                params![robot_id],
            )
            .await?;

        match query_results.next().await? {
            Some(data_row) => map_row_to_robot(&data_row),
            None => Err(DbError::Missing),
        }
    }

    /**
     * Listado filtrable de flota. Los predicados vacíos no restringen.
     */
    pub async fn list_robots(&self, filter: &RobotFleetFilter) -> Result<Vec<RobotRecord>, DbError> {
        let database_connection = self.database_client.get_connection()?;

        let status_predicate = filter
            .status
            .map(|status| status.as_label().to_string())
            .unwrap_or_default();
        let tenant_predicate = filter.tenant_id.clone().unwrap_or_default();
        let capability_predicate = filter.capability.clone().unwrap_or_default();
        let limit_magnitude = filter.limit.unwrap_or(100).min(500) as i64;
        let offset_magnitude = filter.offset.unwrap_or(0) as i64;

        let sql_query = format!(
            "{} WHERE (?1 = '' OR status = ?1)
               AND (?2 = '' OR tenant_id = ?2)
               AND (?3 = '' OR capabilities LIKE '%\"' || ?3 || '\"%')
             ORDER BY name ASC
             LIMIT ?4 OFFSET ?5",
            ROBOT_SELECT_PROJECTION
        );

        let mut query_results = database_connection
            .query(&sql_query, params![
                status_predicate,
                tenant_predicate,
                capability_predicate,
                limit_magnitude,
                offset_magnitude
            ])
            .await?;

        let mut fleet_collection = Vec::new();
        while let Some(data_row) = query_results.next().await? {
            fleet_collection.push(map_row_to_robot(&data_row)?);
        }
        Ok(fleet_collection)
    }

    /// Reemplazo de los campos mutables del perfil de una unidad.
    #[instrument(skip(self, registration), fields(robot = %robot_id))]
    pub async fn update_robot(
        &self,
        robot_id: &str,
        registration: &RobotRegistration,
    ) -> Result<RobotRecord, DbError> {
        let database_connection = self.database_client.get_connection()?;

        let capabilities_json = serde_json::to_string(&registration.capabilities)
            .map_err(|fault| DbError::MappingError(fault.to_string()))?;
        let tags_json = serde_json::to_string(&registration.tags)
            .map_err(|fault| DbError::MappingError(fault.to_string()))?;

        let affected_rows = database_connection
            .execute(
                "UPDATE robots
                 SET name = ?2, tenant_id = ?3, environment = ?4,
                     max_concurrent_jobs = ?5, capabilities = ?6, tags = ?7,
                     updated_at = CURRENT_TIMESTAMP
                 WHERE robot_id = ?1",
                params![
                    robot_id,
                    registration.name.clone(),
                    registration.tenant_id.clone(),
                    registration.environment.clone(),
                    registration.max_concurrent_jobs as i64,
                    capabilities_json,
                    tags_json
                ],
            )
            .await
            .map_err(|driver_fault| {
                if is_unique_violation(&driver_fault) {
                    DbError::UniqueConflict(driver_fault.to_string())
                } else {
                    DbError::QueryError(driver_fault)
                }
            })?;

        if affected_rows == 0 {
            return Err(DbError::Missing);
        }
        self.get_robot(robot_id).await
    }

    pub async fn set_robot_status(
        &self,
        robot_id: &str,
        status: RobotStatus,
    ) -> Result<(), DbError> {
        let database_connection = self.database_client.get_connection()?;
        let affected_rows = database_connection
            .execute(
                "UPDATE robots
                 SET status = ?2, last_seen = ?3, updated_at = CURRENT_TIMESTAMP
                 WHERE robot_id = ?1",
                params![robot_id, status.as_label(), chrono::Utc::now().to_rfc3339()],
            )
            .await?;

        if affected_rows == 0 {
            return Err(DbError::Missing);
        }
        Ok(())
    }

    pub async fn delete_robot(&self, robot_id: &str) -> Result<(), DbError> {
        let database_connection = self.database_client.get_connection()?;
        if database_connection
            .execute("DELETE FROM robots WHERE robot_id = ?1", params![robot_id])
            .await?
            == 0
        {
            return Err(DbError::Missing);
        }
        info!("🗑️ [FLEET]: Unit {} decommissioned from the Ledger.", robot_id);
        Ok(())
    }

    /**
     * Barrido de vida: marca 'offline' toda unidad cuyo latido expiró.
     * Devuelve los identificadores afectados para la conciliación de misiones.
     */
    pub async fn mark_offline_stale(&self, timeout_seconds: i64) -> Result<Vec<String>, DbError> {
        let database_connection = self.database_client.get_connection()?;
        let mut query_results = database_connection
            .query(
                "UPDATE robots
                 SET status = 'offline', updated_at = CURRENT_TIMESTAMP
                 WHERE status IN ('online', 'busy', 'error')
                   AND (last_heartbeat IS NULL
                        OR datetime(last_heartbeat, '+' || ?1 || ' seconds') < CURRENT_TIMESTAMP)
                 RETURNING robot_id",
                params![timeout_seconds],
            )
            .await?;

        let mut stale_collection = Vec::new();
        while let Some(data_row) = query_results.next().await? {
            stale_collection.push(data_row.get(0)?);
        }
        Ok(stale_collection)
    }

    /// Sincroniza el inventario de misiones en vuelo de una unidad.
    pub async fn sync_current_jobs(
        &self,
        robot_id: &str,
        job_ids: &[String],
    ) -> Result<(), DbError> {
        let database_connection = self.database_client.get_connection()?;
        let inventory_json = serde_json::to_string(job_ids)
            .map_err(|fault| DbError::MappingError(fault.to_string()))?;
        database_connection
            .execute(
                "UPDATE robots SET current_job_ids = ?2, updated_at = CURRENT_TIMESTAMP
                 WHERE robot_id = ?1",
                params![robot_id, inventory_json],
            )
            .await?;
        Ok(())
    }
}

// --- PROYECCIÓN Y MAPEO DE FILAS ---

const ROBOT_SELECT_PROJECTION: &str = "
    SELECT robot_id, name, hostname, tenant_id, COALESCE(environment, 'default'),
           status, max_concurrent_jobs, capabilities, tags, current_job_ids, metrics,
           COALESCE(last_seen, ''), COALESCE(last_heartbeat, ''), created_at
    FROM robots";

const PULSE_UPSERT_STATEMENT: &str = "
    INSERT INTO robots (robot_id, name, hostname, status, current_job_ids,
                        metrics, last_seen, last_heartbeat)
    VALUES (?1, 'robot-' || ?1, 'robot-' || ?1, ?2, ?3, ?4, ?5, ?5)
    ON CONFLICT(robot_id) DO UPDATE SET
        status = excluded.status,
        current_job_ids = excluded.current_job_ids,
        metrics = excluded.metrics,
        last_seen = excluded.last_seen,
        last_heartbeat = excluded.last_heartbeat,
        updated_at = CURRENT_TIMESTAMP";

fn pulse_upsert_params(pulse: &RobotPulse) -> impl libsql::params::IntoParams {
    params![
        pulse.robot_id.clone(),
        pulse.status.as_label(),
        serde_json::to_string(&pulse.active_job_ids).unwrap_or_else(|_| "[]".into()),
        serde_json::to_string(&pulse.metrics).unwrap_or_else(|_| "{}".into()),
        pulse.observed_at.clone()
    ]
}

fn map_row_to_robot(data_row: &Row) -> Result<RobotRecord, DbError> {
    let status_label: String = data_row.get(5)?;
    let capabilities_json: String = data_row.get(7)?;
    let tags_json: String = data_row.get(8)?;
    let inventory_json: String = data_row.get(9)?;
    let metrics_json: String = data_row.get(10)?;

    Ok(RobotRecord {
        robot_id: data_row.get(0)?,
        name: data_row.get(1)?,
        hostname: data_row.get(2)?,
        tenant_id: data_row.get(3)?,
        environment: data_row.get(4)?,
        status: RobotStatus::from_label(&status_label),
        max_concurrent_jobs: data_row.get::<i64>(6)? as u32,
        capabilities: serde_json::from_str(&capabilities_json).unwrap_or_default(),
        tags: serde_json::from_str(&tags_json).unwrap_or_default(),
        current_job_ids: serde_json::from_str(&inventory_json).unwrap_or_default(),
        metrics: serde_json::from_str::<ResourceTelemetry>(&metrics_json).unwrap_or_default(),
        last_seen: data_row.get(11)?,
        last_heartbeat: data_row.get(12)?,
        created_at: data_row.get(13)?,
    })
}

/// Deriva la identidad candidata para el intento N de desambiguación.
///
/// Intento 0: valor original. Intento 1: "<base> (<last8>)".
/// Intento n>1: "<base> (<last8>-n)". Siempre acotado a la capacidad
/// de columna para que el renombre sea estable entre ejecuciones.
fn disambiguate_identity(base_value: &str, robot_id: &str, attempt_index: u32) -> String {
    if attempt_index == 0 {
        return truncate_identity(base_value, IDENTITY_COLUMN_CAPACITY);
    }

    let id_tail: String = robot_id
        .chars()
        .rev()
        .take(8)
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
        .collect();

    let suffix = if attempt_index == 1 {
        format!(" ({})", id_tail)
    } else {
        format!(" ({}-{})", id_tail, attempt_index)
    };

    let base_capacity = IDENTITY_COLUMN_CAPACITY.saturating_sub(suffix.len());
    format!("{}{}", truncate_identity(base_value, base_capacity), suffix)
}

fn truncate_identity(value: &str, capacity: usize) -> String {
    value.chars().take(capacity).collect()
}
