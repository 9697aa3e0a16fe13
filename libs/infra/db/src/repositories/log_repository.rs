// [libs/infra/db/src/repositories/log_repository.rs]
/*!
 * =================================================================
 * APARATO: DIAGNOSTIC LOG REPOSITORY (V4.2 - APPEND ONLY STREAM)
 * CLASIFICACIÓN: INFRASTRUCTURE ADAPTER (ESTRATO L3)
 * RESPONSABILIDAD: PERSISTENCIA DEL FLUJO DE DIAGNÓSTICO POR MISIÓN
 *
 * # Logic:
 * El flujo es append-only y amistoso con inserciones masivas: las
 * ráfagas (LogBatch) se comprometen en una única transacción.
 * =================================================================
 */

use crate::client::StoreClient;
use crate::errors::DbError;
use fabrica_domain_models::logging::{LogEntryRecord, LogLevel};
use libsql::{params, Row};
use tracing::{debug, instrument};

pub struct LogRepository {
    database_client: StoreClient,
}

impl LogRepository {
    pub fn new(client: StoreClient) -> Self {
        Self { database_client: client }
    }

    #[instrument(skip(self, entry), fields(job = %entry.job_id), level = "debug")]
    pub async fn append_entry(&self, entry: &LogEntryRecord) -> Result<(), DbError> {
        let database_connection = self.database_client.get_connection()?;
        database_connection
            .execute(LOG_INSERT_STATEMENT, log_insert_params(entry)?)
            .await?;
        Ok(())
    }

    /**
     * Inserción masiva de una ráfaga de entradas bajo una transacción.
     */
    #[instrument(skip(self, entries))]
    pub async fn append_batch(&self, entries: &[LogEntryRecord]) -> Result<usize, DbError> {
        if entries.is_empty() {
            return Ok(0);
        }

        let database_connection = self.database_client.get_connection()?;
        let database_transaction = database_connection
            .transaction()
            .await
            .map_err(|_| DbError::TransactionError)?;

        for entry in entries {
            database_transaction
                .execute(LOG_INSERT_STATEMENT, log_insert_params(entry)?)
                .await?;
        }

        database_transaction
            .commit()
            .await
            .map_err(|_| DbError::TransactionError)?;

        debug!("💾 [LOG_BATCH]: {} entries crystallized.", entries.len());
        Ok(entries.len())
    }

    /**
     * Rastro de avance: el checkpoint de progreso se persiste como
     * entrada del flujo con origen 'progress'.
     */
    pub async fn append_progress(
        &self,
        job_identifier: &str,
        robot_identifier: &str,
        progress_percent: u8,
        current_node: &str,
        message: &str,
    ) -> Result<(), DbError> {
        let database_connection = self.database_client.get_connection()?;
        database_connection
            .execute(
                "INSERT INTO log_entries (job_id, robot_id, level, source, message, node_id, emitted_at)
                 VALUES (?1, ?2, 'INFO', 'progress', ?3, ?4, ?5)",
                params![
                    job_identifier,
                    robot_identifier,
                    format!("{}% {}", progress_percent.min(100), message),
                    current_node,
                    chrono::Utc::now().to_rfc3339()
                ],
            )
            .await?;
        Ok(())
    }

    pub async fn fetch_recent(
        &self,
        job_identifier: &str,
        limit_count: u32,
    ) -> Result<Vec<LogEntryRecord>, DbError> {
        let database_connection = self.database_client.get_connection()?;
        let mut query_results = database_connection
            .query(
                "SELECT job_id, robot_id, level, source, message,
                        COALESCE(node_id, ''), COALESCE(extra, ''), COALESCE(emitted_at, '')
                 FROM log_entries
                 WHERE job_id = ?1
                 ORDER BY id DESC
                 LIMIT ?2",
                params![job_identifier, limit_count.min(1000) as i64],
            )
            .await?;

        let mut entry_collection = Vec::new();
        while let Some(data_row) = query_results.next().await? {
            entry_collection.push(map_row_to_log_entry(&data_row)?);
        }
        entry_collection.reverse();
        Ok(entry_collection)
    }
}

const LOG_INSERT_STATEMENT: &str = "
    INSERT INTO log_entries (job_id, robot_id, level, source, message, node_id, extra, emitted_at)
    VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)";

fn log_insert_params(entry: &LogEntryRecord) -> Result<impl libsql::params::IntoParams, DbError> {
    let extra_json = match &entry.extra {
        Some(value) => serde_json::to_string(value)
            .map_err(|fault| DbError::MappingError(fault.to_string()))?,
        None => String::new(),
    };

    Ok(params![
        entry.job_id.clone(),
        entry.robot_id.clone(),
        entry.level.as_label(),
        entry.source.clone(),
        entry.message.clone(),
        entry.node_id.clone().unwrap_or_default(),
        extra_json,
        entry.emitted_at.clone()
    ])
}

fn map_row_to_log_entry(data_row: &Row) -> Result<LogEntryRecord, DbError> {
    let level_label: String = data_row.get(2)?;
    let node_label: String = data_row.get(5)?;
    let extra_text: String = data_row.get(6)?;

    Ok(LogEntryRecord {
        job_id: data_row.get(0)?,
        robot_id: data_row.get(1)?,
        level: LogLevel::from_label(&level_label),
        source: data_row.get(3)?,
        message: data_row.get(4)?,
        node_id: if node_label.is_empty() { None } else { Some(node_label) },
        extra: if extra_text.is_empty() {
            None
        } else {
            serde_json::from_str(&extra_text).ok()
        },
        emitted_at: data_row.get(7)?,
    })
}
