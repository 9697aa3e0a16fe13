// [libs/infra/db/src/repositories/audit_repository.rs]
/*!
 * =================================================================
 * APARATO: AUDIT TRAIL REPOSITORY (V4.0 - FORENSIC LEDGER)
 * CLASIFICACIÓN: INFRASTRUCTURE ADAPTER (ESTRATO L3)
 * RESPONSABILIDAD: RASTRO INMUTABLE DE DECISIONES DEL ORQUESTADOR
 * =================================================================
 */

use crate::client::StoreClient;
use crate::errors::DbError;
use libsql::params;
use tracing::instrument;

pub struct AuditRepository {
    database_client: StoreClient,
}

impl AuditRepository {
    pub fn new(client: StoreClient) -> Self {
        Self { database_client: client }
    }

    /**
     * Registra un evento auditado (rechazos de despacho, cancelaciones,
     * ciclo de vida de credenciales, renombres de identidad).
     */
    #[instrument(skip(self, detail), level = "debug")]
    pub async fn append(
        &self,
        event_kind: &str,
        subject_identifier: &str,
        actor: &str,
        detail: &str,
    ) -> Result<(), DbError> {
        let database_connection = self.database_client.get_connection()?;
        database_connection
            .execute(
                "INSERT INTO audit_log (event_kind, subject_id, actor, detail)
                 VALUES (?1, ?2, ?3, ?4)",
                params![event_kind, subject_identifier, actor, detail],
            )
            .await?;
        Ok(())
    }

    /// Entradas recientes de un sujeto, más nuevas primero.
    pub async fn recent_for_subject(
        &self,
        subject_identifier: &str,
        limit_count: u32,
    ) -> Result<Vec<(String, String, String)>, DbError> {
        let database_connection = self.database_client.get_connection()?;
        let mut query_results = database_connection
            .query(
                "SELECT event_kind, detail, created_at
                 FROM audit_log
                 WHERE subject_id = ?1
                 ORDER BY id DESC
                 LIMIT ?2",
                params![subject_identifier, limit_count.min(500) as i64],
            )
            .await?;

        let mut trail_collection = Vec::new();
        while let Some(data_row) = query_results.next().await? {
            trail_collection.push((data_row.get(0)?, data_row.get(1)?, data_row.get(2)?));
        }
        Ok(trail_collection)
    }
}
