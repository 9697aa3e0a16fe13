// [libs/infra/robot-client/src/events.rs]
/*!
 * =================================================================
 * APARATO: ROBOT CHANNEL EVENTS (V4.1 - TYPED OBSERVATIONS)
 * CLASIFICACIÓN: INFRASTRUCTURE ADAPTER (ESTRATO L3)
 * RESPONSABILIDAD: OBSERVACIONES TIPADAS DEL CICLO DE VIDA DEL ENLACE
 *
 * # Logic:
 * El consumidor del cliente recibe estas señales por un único canal
 * mpsc y decide su política de ejecución. El cliente ya resolvió la
 * aceptación o rechazo de misiones antes de emitir 'JobAssigned'.
 * =================================================================
 */

use serde_json::Value;

/// Directiva de misión aceptada por el gestor de conexión.
#[derive(Debug, Clone)]
pub struct JobAssignmentDirective {
    pub job_id: String,
    pub workflow_name: String,
    /// Definición opaca del workflow, lista para el motor de ejecución.
    pub workflow_json: Value,
    pub priority: String,
    pub timeout_seconds: u32,
    pub parameters: Value,
}

/// Señales tipadas emitidas por el bucle interno del enlace.
#[derive(Debug, Clone)]
pub enum RobotChannelEvent {
    /// Registro confirmado; transporta la configuración negociada.
    LinkEstablished { heartbeat_interval_seconds: u64 },
    /// El enlace físico se perdió; el supervisor reintentará.
    LinkLost { reason: String },
    /// El orquestador vetó la identidad presentada (sin reintento).
    RegistrationRejected { message: String },
    /// Misión aceptada y reservada en el inventario local.
    JobAssigned(JobAssignmentDirective),
    /// El orquestador solicitó abortar una misión en vuelo.
    JobCancelRequested { job_id: String, reason: String },
    PauseRequested,
    ResumeRequested,
    ShutdownRequested { graceful: bool },
    /// Trama de error tipada recibida del orquestador.
    OrchestratorError { code: String, message: String },
}
