// [libs/infra/db/src/errors.rs]
/*!
 * =================================================================
 * APARATO: DATABASE ERROR CATALOG (V4.1 - SOBERANO)
 * CLASIFICACIÓN: INFRASTRUCTURE CORE (ESTRATO L3)
 * RESPONSABILIDAD: CATALOGACIÓN SEMÁNTICA DE FALLOS DE PERSISTENCIA
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. CALLER-DECIDES RECOVERY: El catálogo distingue fallos transitorios
 *    (Unavailable), conflictos de unicidad (UniqueConflict) y ausencias
 *    (Missing) para que cada estrato elija su estrategia de recuperación.
 * 2. PANOPTICON COMPLIANCE: Prefijos de estrato para renderizado
 *    cromático en el Dashboard de flota.
 * =================================================================
 */

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DbError {
    /// Error de enlace físico o de red con el motor libSQL.
    #[error("[L3_DB_NET_FAULT]: DATABASE_UPLINK_SEVERED -> {0}")]
    Unavailable(String),

    // --- ESTRATO DE TOPOLOGÍA DE ALMACENAMIENTO (IGNICIÓN) ---

    /// La URL de conexión no describe una topología reconocible.
    #[error("[L3_DB_TOPOLOGY_FAULT]: STORAGE_URL_REJECTED -> {0}")]
    InvalidTopology(String),

    /// Se solicitó una topología remota sin el token de acceso.
    #[error("[L3_DB_AUTH_FAULT]: REMOTE_TOKEN_MISSING")]
    RemoteAuthMissing,

    /// El esquema estructural no pudo solidificarse en el motor.
    #[error("[L3_DB_SCHEMA_FAULT]: SCHEMA_SYNC_REJECTED -> {0}")]
    SchemaDrift(String),

    /// Error de sintaxis o ejecución devuelto por el motor libSQL.
    #[error("[L3_DB_QUERY_FAULT]: SQL_QUERY_REJECTED -> {0}")]
    QueryError(#[from] libsql::Error),

    /// Fallo en la transformación de tipos entre SQLite y el Dominio Rust.
    #[error("[L3_DB_MAPPING_FAULT]: DATA_MAPPING_VIOLATION -> {0}")]
    MappingError(String),

    /// Violación de una restricción UNIQUE tras agotar la desambiguación.
    #[error("[L3_DB_CONFLICT_FAULT]: UNIQUE_CONSTRAINT_EXHAUSTED -> {0}")]
    UniqueConflict(String),

    /// La entidad solicitada no existe en las tablas activas.
    #[error("[L3_LEDGER_FAULT]: IDENTIFIER_NOT_FOUND")]
    Missing,

    // --- ESTRATO DE CONTROL DE MISIONES ---

    /// Conflicto de propiedad: la misión ya tiene un candado de otra unidad.
    #[error("[L3_LEDGER_FAULT]: OWNERSHIP_VIOLATION")]
    OwnershipConflict,

    /// La misión no se encuentra en un estado apto para la operación.
    #[error("[L3_LEDGER_FAULT]: INVALID_STATE_TRANSITION")]
    InvalidState,

    /// Error al comprometer cambios en una secuencia multi-tabla.
    #[error("[L3_DB_FAULT]: TRANSACTION_COLLAPSE")]
    TransactionError,

    // --- ESTRATO DE GOBERNANZA DE CREDENCIALES ---

    /// El material criptográfico no pudo ser derivado o verificado.
    #[error("[L3_VAULT_FAULT]: CREDENTIAL_MATERIAL_REJECTED -> {0}")]
    CredentialFault(String),
}

/// Clasifica un fallo del driver como violación de unicidad.
pub fn is_unique_violation(driver_fault: &libsql::Error) -> bool {
    driver_fault.to_string().contains("UNIQUE constraint failed")
}
