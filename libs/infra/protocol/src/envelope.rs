// [libs/infra/protocol/src/envelope.rs]
/*!
 * =================================================================
 * APARATO: WIRE MESSAGE CATALOG (V4.2 - FULL DUPLEX GRAMMAR)
 * CLASIFICACIÓN: INFRASTRUCTURE TRANSPORT (ESTRATO L3)
 * RESPONSABILIDAD: GRAMÁTICA COMPLETA DEL CANAL ORQUESTADOR <-> ROBOT
 *
 * # Logic:
 * 'WireMessage' es el sobre lógico: identidad, marca temporal,
 * correlación opcional y cuerpo tipado. 'MessageBody' enumera el
 * catálogo completo; la variante 'Unknown' transporta tipos futuros
 * de forma opaca para no romper la compatibilidad entre versiones.
 * =================================================================
 */

use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Sobre lógico de una trama del canal de robots.
#[derive(Debug, Clone, PartialEq)]
pub struct WireMessage {
    /// Identidad unívoca del mensaje (llave del tracker de respuestas).
    pub message_id: Uuid,
    /// Marca ISO-8601 UTC estampada por el emisor.
    pub emitted_at: String,
    /// Si está presente, este mensaje responde a la petición referida.
    pub correlation_id: Option<Uuid>,
    pub body: MessageBody,
}

impl WireMessage {
    /// Forja un mensaje nuevo con identidad y marca temporal frescas.
    pub fn fresh(body: MessageBody) -> Self {
        Self {
            message_id: Uuid::new_v4(),
            emitted_at: Utc::now().to_rfc3339(),
            correlation_id: None,
            body,
        }
    }

    /// Forja una respuesta correlacionada a una petición previa.
    pub fn reply_to(request_message_id: Uuid, body: MessageBody) -> Self {
        Self {
            message_id: Uuid::new_v4(),
            emitted_at: Utc::now().to_rfc3339(),
            correlation_id: Some(request_message_id),
            body,
        }
    }

    /// Determina si el emisor debe registrar un futuro pendiente
    /// esperando la respuesta correlacionada de la contraparte.
    pub fn expects_reply(&self) -> bool {
        matches!(
            self.body,
            MessageBody::JobAssign(_) | MessageBody::JobCancel { .. } | MessageBody::StatusRequest
        )
    }
}

// --- CUERPOS DE MENSAJE DEL CATÁLOGO ---

/// Auto-declaración de identidad de una unidad (primer mensaje obligatorio).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RegisterPayload {
    #[serde(default)]
    pub robot_id: String,
    pub robot_name: String,
    #[serde(default)]
    pub hostname: String,
    #[serde(default)]
    pub tenant_id: String,
    #[serde(default)]
    pub environment: String,
    #[serde(default = "default_capacity")]
    pub max_concurrent_jobs: u32,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub capabilities: Vec<String>,
    /// Alternativa de autenticación cuando el secreto no viajó en la URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_token: Option<String>,
}

fn default_capacity() -> u32 {
    1
}

/// Configuración inyectada por el orquestador en el acuse de registro.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RegisterAckConfig {
    #[serde(default)]
    pub heartbeat_interval: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RegisterAckPayload {
    pub success: bool,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub config: RegisterAckConfig,
}

/// Latido biométrico periódico de la unidad.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HeartbeatPayload {
    #[serde(default)]
    pub robot_id: String,
    pub status: String,
    #[serde(default)]
    pub current_jobs: u32,
    #[serde(default)]
    pub cpu_percent: f32,
    #[serde(default)]
    pub memory_percent: f32,
    #[serde(default)]
    pub disk_percent: f32,
    #[serde(default)]
    pub active_job_ids: Vec<String>,
}

/// Directiva de asignación de misión (espera respuesta correlacionada).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JobAssignPayload {
    pub job_id: String,
    #[serde(default)]
    pub workflow_id: String,
    pub workflow_name: String,
    /// Definición opaca del workflow tal como la custodió el Ledger.
    pub workflow_json: serde_json::Value,
    #[serde(default)]
    pub priority: String,
    #[serde(default)]
    pub timeout_seconds: u32,
    #[serde(default)]
    pub parameters: serde_json::Value,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JobProgressPayload {
    pub job_id: String,
    #[serde(default)]
    pub robot_id: String,
    /// Avance 0..100 reportado por la unidad ejecutora.
    pub progress: u8,
    #[serde(default)]
    pub current_node: String,
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JobCompletePayload {
    pub job_id: String,
    #[serde(default)]
    pub robot_id: String,
    #[serde(default)]
    pub result: serde_json::Value,
    #[serde(default)]
    pub duration_ms: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JobFailedPayload {
    pub job_id: String,
    #[serde(default)]
    pub robot_id: String,
    pub error_message: String,
    #[serde(default)]
    pub error_type: String,
    #[serde(default)]
    pub stack_trace: String,
    #[serde(default)]
    pub failed_node: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LogEntryPayload {
    pub job_id: String,
    #[serde(default)]
    pub robot_id: String,
    #[serde(default)]
    pub level: String,
    pub message: String,
    #[serde(default)]
    pub node_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extra: Option<serde_json::Value>,
}

/// Entrada individual dentro de una ráfaga de logs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LogBatchItem {
    #[serde(default)]
    pub level: String,
    pub message: String,
    #[serde(default)]
    pub node_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extra: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LogBatchPayload {
    pub job_id: String,
    #[serde(default)]
    pub robot_id: String,
    #[serde(default)]
    pub entries: Vec<LogBatchItem>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatusResponsePayload {
    #[serde(default)]
    pub robot_id: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub current_jobs: u32,
    #[serde(default)]
    pub active_job_ids: Vec<String>,
    #[serde(default)]
    pub uptime_seconds: u64,
    #[serde(default)]
    pub system_info: serde_json::Value,
}

/// Catálogo completo de cuerpos del canal.
#[derive(Debug, Clone, PartialEq)]
pub enum MessageBody {
    // --- robot -> orquestador ---
    Register(RegisterPayload),
    Heartbeat(HeartbeatPayload),
    JobAccept { job_id: String, robot_id: String },
    JobReject { job_id: String, robot_id: String, reason: String },
    JobProgress(JobProgressPayload),
    JobComplete(JobCompletePayload),
    JobFailed(JobFailedPayload),
    JobCancelled { job_id: String, robot_id: String },
    LogEntry(LogEntryPayload),
    LogBatch(LogBatchPayload),
    StatusResponse(StatusResponsePayload),
    Disconnect { robot_id: String, reason: String },

    // --- orquestador -> robot ---
    RegisterAck(RegisterAckPayload),
    HeartbeatAck,
    JobAssign(JobAssignPayload),
    JobCancel { job_id: String, reason: String },
    StatusRequest,
    Pause,
    Resume,
    Shutdown { graceful: bool },

    // --- bidireccional ---
    Error { error_code: String, error_message: String },

    /// Tipo futuro no catalogado: se transporta de forma opaca.
    Unknown {
        type_label: String,
        payload: serde_json::Value,
    },
}

impl MessageBody {
    /// Etiqueta textual del tipo tal como viaja en el sobre.
    pub fn type_label(&self) -> &str {
        match self {
            MessageBody::Register(_) => "register",
            MessageBody::RegisterAck(_) => "register_ack",
            MessageBody::Heartbeat(_) => "heartbeat",
            MessageBody::HeartbeatAck => "heartbeat_ack",
            MessageBody::JobAssign(_) => "job_assign",
            MessageBody::JobAccept { .. } => "job_accept",
            MessageBody::JobReject { .. } => "job_reject",
            MessageBody::JobProgress(_) => "job_progress",
            MessageBody::JobComplete(_) => "job_complete",
            MessageBody::JobFailed(_) => "job_failed",
            MessageBody::JobCancel { .. } => "job_cancel",
            MessageBody::JobCancelled { .. } => "job_cancelled",
            MessageBody::LogEntry(_) => "log_entry",
            MessageBody::LogBatch(_) => "log_batch",
            MessageBody::StatusRequest => "status_request",
            MessageBody::StatusResponse(_) => "status_response",
            MessageBody::Pause => "pause",
            MessageBody::Resume => "resume",
            MessageBody::Shutdown { .. } => "shutdown",
            MessageBody::Disconnect { .. } => "disconnect",
            MessageBody::Error { .. } => "error",
            MessageBody::Unknown { type_label, .. } => type_label,
        }
    }
}
