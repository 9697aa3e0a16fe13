// [libs/infra/db/src/repositories/api_key_repository.rs]
/*!
 * =================================================================
 * APARATO: API KEY VAULT REPOSITORY (V4.3 - CREDENTIAL GOVERNANCE)
 * CLASIFICACIÓN: INFRASTRUCTURE ADAPTER (ESTRATO L3)
 * RESPONSABILIDAD: EMISIÓN, VERIFICACIÓN Y REVOCACIÓN DE LLAVES
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. SECRET ONCE: El material en claro viaja una sola vez dentro del
 *    sobre de emisión; la bóveda custodia exclusivamente el hash PBKDF2.
 * 2. CONSTANT TIME: La verificación delega en el verificador PBKDF2,
 *    inmune a ataques de temporización sobre el secreto presentado.
 * 3. FORENSIC TRAIL: Cada verificación exitosa estampa last_used_at y
 *    last_used_ip para el rastro del Panóptico.
 * =================================================================
 */

use crate::client::StoreClient;
use crate::errors::DbError;
use fabrica_domain_models::api_key::{ApiKeyRecord, ApiKeyStatus, MintedApiKey};
use libsql::{params, Row};
use pbkdf2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use pbkdf2::password_hash::rand_core::OsRng;
use pbkdf2::Pbkdf2;
use rand::distributions::Alphanumeric;
use rand::Rng;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

/// Longitud del material secreto aleatorio emitido por llave.
const SECRET_MATERIAL_LENGTH: usize = 40;

pub struct ApiKeyRepository {
    database_client: StoreClient,
}

impl ApiKeyRepository {
    pub fn new(client: StoreClient) -> Self {
        Self { database_client: client }
    }

    /**
     * Acuña una credencial nueva para una unidad.
     *
     * # Returns:
     * El sobre de emisión con el secreto en claro. Esta es la única
     * ocasión en la que el material abandona la bóveda.
     */
    #[instrument(skip(self, expires_at), fields(robot = %robot_identifier))]
    pub async fn create_api_key(
        &self,
        robot_identifier: &str,
        expires_at: Option<String>,
    ) -> Result<MintedApiKey, DbError> {
        let database_connection = self.database_client.get_connection()?;

        let key_identifier = format!("ak_{}", Uuid::new_v4().simple());
        let secret_material: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(SECRET_MATERIAL_LENGTH)
            .map(char::from)
            .collect();
        let secret_cleartext = format!("rsk_{}", secret_material);

        let salt = SaltString::generate(&mut OsRng);
        let secret_hash = Pbkdf2
            .hash_password(secret_cleartext.as_bytes(), &salt)
            .map_err(|derivation_fault| {
                DbError::CredentialFault(format!("HASH_DERIVATION: {}", derivation_fault))
            })?
            .to_string();

        let creation_timestamp = chrono::Utc::now().to_rfc3339();

        database_connection
            .execute(
                "INSERT INTO api_keys (key_id, robot_id, secret_hash, status, expires_at, created_at)
                 VALUES (?1, ?2, ?3, 'valid', ?4, ?5)",
                params![
                    key_identifier.clone(),
                    robot_identifier,
                    secret_hash,
                    expires_at.clone().unwrap_or_default(),
                    creation_timestamp.clone()
                ],
            )
            .await?;

        info!("🔑 [VAULT]: Credential {} minted for unit {}.", key_identifier, robot_identifier);

        Ok(MintedApiKey {
            record: ApiKeyRecord {
                key_id: key_identifier,
                robot_id: robot_identifier.to_string(),
                status: ApiKeyStatus::Valid,
                expires_at,
                last_used_at: None,
                last_used_ip: None,
                created_at: creation_timestamp,
            },
            secret: secret_cleartext,
        })
    }

    /**
     * Verifica un secreto presentado contra las llaves vigentes de la unidad.
     *
     * # Returns:
     * La credencial que autenticó, o None si ninguna llave válida coincide.
     *
     * # Mathematical Proof (Timing Resistance):
     * Cada candidata pasa por el verificador PBKDF2 completo; el costo
     * de la comparación es independiente del prefijo coincidente.
     */
    #[instrument(skip(self, presented_secret, source_ip), fields(robot = %robot_identifier))]
    pub async fn verify_presented_secret(
        &self,
        robot_identifier: &str,
        presented_secret: &str,
        source_ip: Option<&str>,
    ) -> Result<Option<ApiKeyRecord>, DbError> {
        let database_connection = self.database_client.get_connection()?;
        let mut query_results = database_connection
            .query(
                "SELECT key_id, robot_id, secret_hash, status, COALESCE(expires_at, ''),
                        COALESCE(last_used_at, ''), COALESCE(last_used_ip, ''), created_at
                 FROM api_keys
                 WHERE robot_id = ?1 AND status = 'valid'",
                params![robot_identifier],
            )
            .await?;

        let now_utc = chrono::Utc::now();

        while let Some(data_row) = query_results.next().await? {
            let secret_hash: String = data_row.get(2)?;
            let expires_label: String = data_row.get(4)?;
            let key_identifier: String = data_row.get(0)?;

            // Expiración perezosa: la llave caduca en el momento de uso.
            if !expires_label.is_empty() {
                if let Ok(expiry_timestamp) = chrono::DateTime::parse_from_rfc3339(&expires_label) {
                    if expiry_timestamp.with_timezone(&chrono::Utc) < now_utc {
                        warn!("⌛ [VAULT]: Credential {} expired. Sealing status.", key_identifier);
                        let _ = database_connection
                            .execute(
                                "UPDATE api_keys SET status = 'expired' WHERE key_id = ?1",
                                params![key_identifier.clone()],
                            )
                            .await;
                        continue;
                    }
                }
            }

            let parsed_hash = match PasswordHash::new(&secret_hash) {
                Ok(hash) => hash,
                Err(parse_fault) => {
                    warn!("⚠️ [VAULT]: Stored hash for {} unreadable: {}", key_identifier, parse_fault);
                    continue;
                }
            };

            if Pbkdf2.verify_password(presented_secret.as_bytes(), &parsed_hash).is_ok() {
                let verification_timestamp = chrono::Utc::now().to_rfc3339();
                database_connection
                    .execute(
                        "UPDATE api_keys SET last_used_at = ?2, last_used_ip = ?3
                         WHERE key_id = ?1",
                        params![
                            key_identifier.clone(),
                            verification_timestamp.clone(),
                            source_ip.unwrap_or_default()
                        ],
                    )
                    .await?;

                debug!("🔓 [VAULT]: Unit {} authenticated via {}.", robot_identifier, key_identifier);
                return Ok(Some(map_row_to_api_key(&data_row)?));
            }
        }

        Ok(None)
    }

    /**
     * Revoca una credencial. Operación idempotente: revocar dos veces
     * es un no-op; revocar una llave inexistente es `DbError::Missing`.
     */
    #[instrument(skip(self), fields(key = %key_identifier))]
    pub async fn revoke_api_key(&self, key_identifier: &str) -> Result<(), DbError> {
        let database_connection = self.database_client.get_connection()?;
        let affected_rows = database_connection
            .execute(
                "UPDATE api_keys SET status = 'revoked' WHERE key_id = ?1 AND status != 'revoked'",
                params![key_identifier],
            )
            .await?;

        if affected_rows > 0 {
            info!("🚫 [VAULT]: Credential {} revoked.", key_identifier);
            return Ok(());
        }

        // Distinguir ausencia de idempotencia.
        let mut existence_probe = database_connection
            .query("SELECT 1 FROM api_keys WHERE key_id = ?1", params![key_identifier])
            .await?;
        match existence_probe.next().await? {
            Some(_) => Ok(()),
            None => Err(DbError::Missing),
        }
    }

    pub async fn list_for_robot(
        &self,
        robot_identifier: &str,
    ) -> Result<Vec<ApiKeyRecord>, DbError> {
        let database_connection = self.database_client.get_connection()?;
        let mut query_results = database_connection
            .query(
                "SELECT key_id, robot_id, secret_hash, status, COALESCE(expires_at, ''),
                        COALESCE(last_used_at, ''), COALESCE(last_used_ip, ''), created_at
                 FROM api_keys
                 WHERE robot_id = ?1
                 ORDER BY created_at DESC",
                params![robot_identifier],
            )
            .await?;

        let mut credential_collection = Vec::new();
        while let Some(data_row) = query_results.next().await? {
            credential_collection.push(map_row_to_api_key(&data_row)?);
        }
        Ok(credential_collection)
    }
}

fn map_row_to_api_key(data_row: &Row) -> Result<ApiKeyRecord, DbError> {
    let status_label: String = data_row.get(3)?;
    let expires_label: String = data_row.get(4)?;
    let last_used_label: String = data_row.get(5)?;
    let last_ip_label: String = data_row.get(6)?;

    Ok(ApiKeyRecord {
        key_id: data_row.get(0)?,
        robot_id: data_row.get(1)?,
        status: ApiKeyStatus::from_label(&status_label),
        expires_at: non_empty(expires_label),
        last_used_at: non_empty(last_used_label),
        last_used_ip: non_empty(last_ip_label),
        created_at: data_row.get(7)?,
    })
}

fn non_empty(value: String) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value)
    }
}
