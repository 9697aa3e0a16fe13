// [libs/domain/models/src/lib.rs]
/*!
 * =================================================================
 * APARATO: DOMAIN MODELS ROOT (V4.0 - FLEET CONTRACTS)
 * CLASIFICACIÓN: DOMAIN MODELS (ESTRATO L2)
 * RESPONSABILIDAD: AUTORIDAD ÚNICA DE CONTRATOS DEL ENJAMBRE RPA
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. SINGLE SOURCE OF TRUTH: Toda entidad que cruza un límite de
 *    proceso (REST, WebSocket, Ledger) se define aquí una sola vez.
 * 2. TYPESHARE SYNERGY: Mapeo determinista de tipos para el
 *    Dashboard de flota, garantizando paridad en la tríada.
 * 3. HYGIENE: Sin lógica de infraestructura. Contratos puros.
 * =================================================================
 */

pub mod api_key;
pub mod events;
pub mod job;
pub mod logging;
pub mod robot;

pub use api_key::{ApiKeyRecord, ApiKeyStatus, MintedApiKey};
pub use events::FleetEvent;
pub use job::{JobPriority, JobRecord, JobStatus, JobSubmission};
pub use logging::{LogEntryRecord, LogLevel};
pub use robot::{
    ResourceTelemetry, RobotFleetFilter, RobotPulse, RobotRecord, RobotRegistration, RobotStatus,
};

#[cfg(test)]
mod tests_serialization;
