// [libs/infra/db/src/client.rs]
/*!
 * =================================================================
 * APARATO: FLEET STORE CLIENT (V5.0 - TOPOLOGY AWARE)
 * CLASIFICACIÓN: INFRASTRUCTURE LAYER (ESTRATO L3)
 * RESPONSABILIDAD: CLASIFICACIÓN DE TOPOLOGÍA, IGNICIÓN Y SONDEO
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. TOPOLOGY FIRST: La URL se clasifica en una topología explícita
 *    (remota, RAM compartida, archivo local) ANTES de tocar el driver;
 *    cada fallo de configuración tiene su variante propia en el
 *    catálogo, no un mensaje genérico de red.
 * 2. KEEPER DISCIPLINE: Una única conexión guardiana solidifica el
 *    esquema y sondea la ruta de consulta; en topología de RAM se
 *    retiene de por vida, porque liberar la última conexión evapora
 *    el segmento compartido.
 * 3. FAIL LOUD AT IGNITION: Un Ledger que acepta el enlace físico
 *    pero rechaza consultas (token caducado, réplica fría) se detecta
 *    en el arranque mediante el sondeo, no en la primera misión.
 * =================================================================
 */

use crate::errors::DbError;
use crate::schema::apply_full_fleet_schema;
use libsql::{Builder, Connection, Database};
use std::sync::Arc;
use tracing::{debug, error, info, instrument};

/// Topología de almacenamiento derivada de la URL de conexión.
#[derive(Debug)]
enum StorageTopology {
    /// Cluster libSQL remoto (libsql:// o https://); exige token.
    Remote { url: String, access_token: String },
    /// Segmento de RAM compartido entre conexiones (bancos de prueba).
    SharedMemory { url: String },
    /// Archivo SQLite local (despliegues de una sola caja).
    LocalFile { path: String },
}

/**
 * Clasifica la URL de conexión en su topología de almacenamiento.
 *
 * # Errors:
 * - `DbError::InvalidTopology`: URL vacía o irreconocible.
 * - `DbError::RemoteAuthMissing`: topología remota sin token.
 */
fn classify_topology(
    database_connection_url: &str,
    database_access_token: Option<String>,
) -> Result<StorageTopology, DbError> {
    let trimmed_url = database_connection_url.trim();

    if trimmed_url.is_empty() {
        return Err(DbError::InvalidTopology("DATABASE_URL_UNDEFINED".into()));
    }

    if trimmed_url.starts_with("libsql://") || trimmed_url.starts_with("https://") {
        let access_token = database_access_token
            .filter(|token| !token.is_empty())
            .ok_or(DbError::RemoteAuthMissing)?;
        return Ok(StorageTopology::Remote {
            url: trimmed_url.to_string(),
            access_token,
        });
    }

    if trimmed_url.contains(":memory:") || trimmed_url.contains("mode=memory") {
        return Ok(StorageTopology::SharedMemory {
            url: trimmed_url.to_string(),
        });
    }

    Ok(StorageTopology::LocalFile {
        path: trimmed_url.to_string(),
    })
}

#[derive(Clone)]
pub struct StoreClient {
    internal_database_driver: Arc<Database>,
    /// En topología de RAM, la conexión guardiana impide que SQLite
    /// purgue el segmento compartido mientras el proceso viva.
    _shared_memory_keeper: Option<Arc<Connection>>,
}

impl StoreClient {
    /**
     * Establece el enlace al Ledger de flota: clasifica la topología,
     * enciende el driver, solidifica el esquema sobre la conexión
     * guardiana y sondea la ruta de consulta antes de entregar el cliente.
     *
     * # Errors:
     * - `DbError::InvalidTopology` / `RemoteAuthMissing`: configuración.
     * - `DbError::SchemaDrift`: el esquema no pudo solidificarse.
     * - `DbError::Unavailable`: el driver o la ruta de consulta fallan.
     */
    #[instrument(skip(database_access_token))]
    pub async fn connect(
        database_connection_url: &str,
        database_access_token: Option<String>,
    ) -> Result<Self, DbError> {
        let storage_topology =
            classify_topology(database_connection_url, database_access_token)?;

        let database_driver = match &storage_topology {
            StorageTopology::Remote { url, access_token } => {
                info!("🔌 [DATABASE]: Linking remote fleet ledger at [{}]", url);
                Builder::new_remote(url.clone(), access_token.clone()).build().await
            }
            StorageTopology::SharedMemory { url } => {
                info!("🔌 [DATABASE]: Materializing shared-memory ledger [{}]", url);
                Builder::new_local(url).build().await
            }
            StorageTopology::LocalFile { path } => {
                info!("🔌 [DATABASE]: Opening local ledger file [{}]", path);
                Builder::new_local(path).build().await
            }
        }
        .map_err(|driver_fault| {
            DbError::Unavailable(format!("DRIVER_IGNITION_FAILURE: {}", driver_fault))
        })?;

        let shared_driver = Arc::new(database_driver);

        // Conexión guardiana: esquema y sondeo viajan por el mismo
        // enlace que, en RAM, anclará el segmento compartido.
        let keeper_connection = shared_driver.connect().map_err(|link_fault| {
            DbError::Unavailable(format!("KEEPER_LINK_FAULT: {}", link_fault))
        })?;

        apply_full_fleet_schema(&keeper_connection).await?;
        probe_query_path(&keeper_connection).await?;

        let shared_memory_keeper = match storage_topology {
            StorageTopology::SharedMemory { .. } => {
                debug!("⚓ [DATABASE]: Memory keeper anchored for the process lifetime.");
                Some(Arc::new(keeper_connection))
            }
            _ => None,
        };

        info!("✅ [DATABASE]: Fleet ledger level and reachable.");
        Ok(Self {
            internal_database_driver: shared_driver,
            _shared_memory_keeper: shared_memory_keeper,
        })
    }

    pub fn get_connection(&self) -> Result<Connection, DbError> {
        self.internal_database_driver.connect().map_err(|pool_fault| {
            error!("⚠️ [POOL_FAULT]: Connection allocation failed: {}", pool_fault);
            DbError::Unavailable(pool_fault.to_string())
        })
    }
}

/**
 * Sondeo mínimo de la ruta de consulta. Un driver puede aceptar el
 * enlace físico y aun así rechazar consultas (token caducado, réplica
 * sin hidratar); este fallo debe aflorar en la ignición.
 */
async fn probe_query_path(connection: &Connection) -> Result<(), DbError> {
    connection
        .query("SELECT 1", ())
        .await
        .map(|_| ())
        .map_err(|probe_fault| {
            DbError::Unavailable(format!("QUERY_PATH_PROBE_REJECTED: {}", probe_fault))
        })
}
