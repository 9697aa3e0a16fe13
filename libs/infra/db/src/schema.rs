// [libs/infra/db/src/schema.rs]
/**
 * =================================================================
 * APARATO: FLEET DATABASE SCHEMA (V4.3 - LEDGER STRATA)
 * CLASIFICACIÓN: INFRASTRUCTURE LAYER (ESTRATO L3)
 * RESPONSABILIDAD: GOBERNANZA ESTRUCTURAL E IDEMPOTENCIA TOTAL
 *
 * VISION HIPER-HOLÍSTICA:
 * 1. FLEET ENTITIES: robots, jobs, api_keys, log_entries, audit_log.
 * 2. IDEMPOTENCIA: Gestión de errores para migraciones en caliente.
 * 3. PERFORMANCE: Índices de aceleración para el despacho masivo.
 * =================================================================
 */

use crate::errors::DbError;
use libsql::Connection;
use tracing::{debug, info, instrument, warn};

/**
 * ESTRATO 1: SOLIDIFICACIÓN (Génesis de Tablas)
 * Define las entidades base del ecosistema Fábrica.
 */
const FLEET_TABLES: &[(&str, &str)] = &[
    ("TABLE_ROBOTS", r#"
        CREATE TABLE IF NOT EXISTS robots (
            robot_id TEXT PRIMARY KEY,
            name TEXT NOT NULL UNIQUE,
            hostname TEXT NOT NULL UNIQUE,
            tenant_id TEXT NOT NULL DEFAULT 'default',
            status TEXT NOT NULL DEFAULT 'offline',
            max_concurrent_jobs INTEGER NOT NULL DEFAULT 1,
            capabilities TEXT NOT NULL DEFAULT '[]',
            tags TEXT NOT NULL DEFAULT '[]',
            current_job_ids TEXT NOT NULL DEFAULT '[]',
            metrics TEXT NOT NULL DEFAULT '{}',
            last_seen TEXT,
            last_heartbeat TEXT,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
            updated_at DATETIME DEFAULT CURRENT_TIMESTAMP
        );
    "#),
    ("TABLE_JOBS", r#"
        CREATE TABLE IF NOT EXISTS jobs (
            job_id TEXT PRIMARY KEY,
            workflow_name TEXT NOT NULL,
            workflow_json TEXT NOT NULL DEFAULT '{}',
            parameters TEXT NOT NULL DEFAULT '{}',
            tenant_id TEXT NOT NULL DEFAULT 'default',
            requested_robot_id TEXT,
            required_capabilities TEXT NOT NULL DEFAULT '[]',
            priority TEXT NOT NULL DEFAULT 'normal',
            timeout_seconds INTEGER NOT NULL DEFAULT 3600,
            status TEXT NOT NULL DEFAULT 'pending',
            assigned_robot_id TEXT,
            progress_percent INTEGER NOT NULL DEFAULT 0,
            current_node TEXT NOT NULL DEFAULT '',
            result TEXT NOT NULL DEFAULT '{}',
            error_message TEXT NOT NULL DEFAULT '',
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
            assigned_at TEXT,
            started_at TEXT,
            finished_at TEXT,
            updated_at DATETIME DEFAULT CURRENT_TIMESTAMP
        );
    "#),
    ("TABLE_API_KEYS", r#"
        CREATE TABLE IF NOT EXISTS api_keys (
            key_id TEXT PRIMARY KEY,
            robot_id TEXT NOT NULL,
            secret_hash TEXT NOT NULL,
            status TEXT NOT NULL DEFAULT 'valid',
            expires_at TEXT,
            last_used_at TEXT,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP
        );
    "#),
    ("TABLE_LOG_ENTRIES", r#"
        CREATE TABLE IF NOT EXISTS log_entries (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            job_id TEXT NOT NULL,
            robot_id TEXT NOT NULL DEFAULT '',
            level TEXT NOT NULL DEFAULT 'INFO',
            source TEXT NOT NULL DEFAULT 'robot',
            message TEXT NOT NULL,
            node_id TEXT,
            emitted_at TEXT,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP
        );
    "#),
    ("TABLE_AUDIT_LOG", r#"
        CREATE TABLE IF NOT EXISTS audit_log (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            event_kind TEXT NOT NULL,
            subject_id TEXT NOT NULL DEFAULT '',
            actor TEXT NOT NULL DEFAULT 'system',
            detail TEXT NOT NULL DEFAULT '',
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP
        );
    "#),
];

/**
 * ESTRATO 2: EVOLUCIÓN (Mutaciones de Columna)
 * Asegura que las tablas existentes se adapten a las nuevas capacidades.
 */
const EVOLUTIONARY_STRATA: &[(&str, &str)] = &[
    // --- SOPORTE DE BACKOFF DE DESPACHO ---
    ("JOB_REJECT_COUNT", "ALTER TABLE jobs ADD COLUMN reject_count INTEGER DEFAULT 0"),

    // --- SEGREGACIÓN DE ENTORNOS DE FLOTA ---
    ("ROBOT_ENVIRONMENT", "ALTER TABLE robots ADD COLUMN environment TEXT DEFAULT 'default'"),

    // --- FORENSE DE CREDENCIALES ---
    ("API_KEY_LAST_IP", "ALTER TABLE api_keys ADD COLUMN last_used_ip TEXT"),

    // --- METADATOS ESTRUCTURADOS EN DIAGNÓSTICO ---
    ("LOG_ENTRY_EXTRA", "ALTER TABLE log_entries ADD COLUMN extra TEXT"),
];

/**
 * ESTRATO 3: ENDURECIMIENTO (Índices de Aceleración)
 * Optimiza el acceso para el bucle de despacho y los streams de logs.
 */
const ACCELERATION_INDEXES: &[(&str, &str)] = &[
    ("IDX_JOBS_DISPATCH", "CREATE INDEX IF NOT EXISTS idx_jobs_dispatch ON jobs(status, created_at);"),
    ("IDX_JOBS_ROBOT", "CREATE INDEX IF NOT EXISTS idx_jobs_robot ON jobs(assigned_robot_id);"),
    ("IDX_ROBOTS_STATUS", "CREATE INDEX IF NOT EXISTS idx_robots_status ON robots(status);"),
    ("IDX_ROBOTS_TENANT", "CREATE INDEX IF NOT EXISTS idx_robots_tenant ON robots(tenant_id);"),
    ("IDX_API_KEYS_ROBOT", "CREATE INDEX IF NOT EXISTS idx_api_keys_robot ON api_keys(robot_id);"),
    ("IDX_LOGS_JOB", "CREATE INDEX IF NOT EXISTS idx_log_entries_job ON log_entries(job_id);"),
    ("IDX_AUDIT_SUBJECT", "CREATE INDEX IF NOT EXISTS idx_audit_subject ON audit_log(subject_id);"),
];

/**
 * Ejecuta la secuencia maestra de sincronización del esquema estructural.
 *
 * # Errors:
 * Retorna error si alguna tabla base falla en solidificarse, indicando
 * un colapso en el enlace con el motor libSQL.
 */
#[instrument(skip(database_connection))]
pub async fn apply_full_fleet_schema(database_connection: &Connection) -> Result<(), DbError> {
    info!("🏗️ [SCHEMA_ENGINE]: Initiating structural synchronization V4.3...");

    solidify_base_strata(database_connection).await?;
    execute_evolutionary_repair(database_connection).await?;
    harden_access_layer(database_connection).await?;

    info!("✅ [SCHEMA_ENGINE]: Fleet Ledger V4.3 level and certified.");
    Ok(())
}

async fn solidify_base_strata(db: &Connection) -> Result<(), DbError> {
    for (identifier, sql) in FLEET_TABLES {
        debug!("  ↳ Solidifying: {}", identifier);
        db.execute(*sql, ()).await.map_err(|solidification_fault| {
            DbError::SchemaDrift(format!(
                "CRITICAL_SOLIDIFICATION_FAULT [{}]: {}",
                identifier, solidification_fault
            ))
        })?;
    }
    Ok(())
}

async fn execute_evolutionary_repair(db: &Connection) -> Result<(), DbError> {
    for (identifier, sql) in EVOLUTIONARY_STRATA {
        match db.execute(*sql, ()).await {
            Ok(_) => debug!("  🟢 [REPAIR_OK]: Applied evolutionary stratum {}", identifier),
            Err(repair_fault) => {
                let message = repair_fault.to_string();
                if message.contains("duplicate column name") {
                    debug!("  ⚪ [REPAIR_SKIP]: {} already level.", identifier);
                } else {
                    warn!("  ⚠️ [REPAIR_BYPASS]: {} check incomplete: {}", identifier, message);
                }
            }
        }
    }
    Ok(())
}

async fn harden_access_layer(db: &Connection) -> Result<(), DbError> {
    for (identifier, sql) in ACCELERATION_INDEXES {
        debug!("  ↳ Hardening: {}", identifier);
        db.execute(*sql, ()).await.map_err(|hardening_fault| {
            DbError::SchemaDrift(format!(
                "CRITICAL_HARDENING_FAULT [{}]: {}",
                identifier, hardening_fault
            ))
        })?;
    }
    Ok(())
}
