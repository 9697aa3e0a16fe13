// [libs/infra/protocol/src/codec.rs]
/*!
 * =================================================================
 * APARATO: FRAME CODEC ENGINE (V4.1 - BIJECTIVE TRANSPORT)
 * CLASIFICACIÓN: INFRASTRUCTURE TRANSPORT (ESTRATO L3)
 * RESPONSABILIDAD: CODIFICACIÓN Y DECODIFICACIÓN DEL SOBRE JSON
 *
 * # Mathematical Proof (Bijection):
 * Sobre el subconjunto de mensajes bien formados se cumple
 * decode_frame ∘ encode_frame = id: el sobre preserva identidad,
 * marca temporal, correlación y payload bit-a-bit, incluida la
 * variante opaca 'Unknown'.
 * =================================================================
 */

use crate::envelope::{
    HeartbeatPayload, JobAssignPayload, JobCompletePayload, JobFailedPayload, JobProgressPayload,
    LogBatchPayload, LogEntryPayload, MessageBody, RegisterAckPayload, RegisterPayload,
    StatusResponsePayload, WireMessage,
};
use crate::errors::CodecError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Techo de tamaño de trama: protección contra agotamiento de memoria.
pub const MAXIMUM_FRAME_BYTES: usize = 10 * 1024 * 1024;

/// Sobre físico tal como viaja en la trama de texto.
#[derive(Debug, Serialize, Deserialize)]
struct RawEnvelope {
    id: Uuid,
    #[serde(rename = "type")]
    type_label: String,
    ts: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    correlation_id: Option<Uuid>,
    #[serde(default)]
    payload: Value,
}

// --- ESPEJOS DE CAMPOS PARA VARIANTES ESTRUCTURALES ---

#[derive(Debug, Default, Serialize, Deserialize)]
struct JobReplyFields {
    #[serde(default)]
    job_id: String,
    #[serde(default)]
    robot_id: String,
    #[serde(default)]
    reason: String,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct JobCancelFields {
    job_id: String,
    #[serde(default)]
    reason: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct ShutdownFields {
    #[serde(default = "default_graceful")]
    graceful: bool,
}

fn default_graceful() -> bool {
    true
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct DisconnectFields {
    #[serde(default)]
    robot_id: String,
    #[serde(default)]
    reason: String,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct ErrorFields {
    #[serde(default)]
    error_code: String,
    #[serde(default)]
    error_message: String,
}

/**
 * Codifica un mensaje lógico en su trama de texto JSON.
 *
 * # Errors:
 * - `CodecError::MalformedEnvelope` si la serialización interna colapsa
 *   (payloads con números no representables).
 */
pub fn encode_frame(message: &WireMessage) -> Result<String, CodecError> {
    let (type_label, payload_value) = body_to_parts(&message.body)?;

    let raw_envelope = RawEnvelope {
        id: message.message_id,
        type_label,
        ts: message.emitted_at.clone(),
        correlation_id: message.correlation_id,
        payload: payload_value,
    };

    Ok(serde_json::to_string(&raw_envelope)?)
}

/**
 * Decodifica una trama de texto en el mensaje lógico tipado.
 *
 * # Errors:
 * - `CodecError::FrameOverflow` si la trama supera el techo de 10MB.
 * - `CodecError::MalformedEnvelope` si el sobre exterior es ilegible.
 * - `CodecError::PayloadSchema` si el payload traiciona su tipo declarado.
 */
pub fn decode_frame(raw_frame: &str) -> Result<WireMessage, CodecError> {
    if raw_frame.len() > MAXIMUM_FRAME_BYTES {
        return Err(CodecError::FrameOverflow {
            actual_bytes: raw_frame.len(),
            limit_bytes: MAXIMUM_FRAME_BYTES,
        });
    }

    let raw_envelope: RawEnvelope = serde_json::from_str(raw_frame)?;

    // Payloads ausentes se normalizan a objeto vacío para que los
    // defaults de serde hidraten los campos opcionales.
    let payload_value = if raw_envelope.payload.is_null() {
        Value::Object(serde_json::Map::new())
    } else {
        raw_envelope.payload
    };

    let body = body_from_parts(&raw_envelope.type_label, payload_value)?;

    Ok(WireMessage {
        message_id: raw_envelope.id,
        emitted_at: raw_envelope.ts,
        correlation_id: raw_envelope.correlation_id,
        body,
    })
}

fn body_to_parts(body: &MessageBody) -> Result<(String, Value), CodecError> {
    let parts = match body {
        MessageBody::Register(payload) => ("register", serde_json::to_value(payload)?),
        MessageBody::RegisterAck(payload) => ("register_ack", serde_json::to_value(payload)?),
        MessageBody::Heartbeat(payload) => ("heartbeat", serde_json::to_value(payload)?),
        MessageBody::HeartbeatAck => ("heartbeat_ack", Value::Object(Default::default())),
        MessageBody::JobAssign(payload) => ("job_assign", serde_json::to_value(payload)?),
        MessageBody::JobAccept { job_id, robot_id } => (
            "job_accept",
            serde_json::to_value(JobReplyFields {
                job_id: job_id.clone(),
                robot_id: robot_id.clone(),
                reason: String::new(),
            })?,
        ),
        MessageBody::JobReject {
            job_id,
            robot_id,
            reason,
        } => (
            "job_reject",
            serde_json::to_value(JobReplyFields {
                job_id: job_id.clone(),
                robot_id: robot_id.clone(),
                reason: reason.clone(),
            })?,
        ),
        MessageBody::JobProgress(payload) => ("job_progress", serde_json::to_value(payload)?),
        MessageBody::JobComplete(payload) => ("job_complete", serde_json::to_value(payload)?),
        MessageBody::JobFailed(payload) => ("job_failed", serde_json::to_value(payload)?),
        MessageBody::JobCancel { job_id, reason } => (
            "job_cancel",
            serde_json::to_value(JobCancelFields {
                job_id: job_id.clone(),
                reason: reason.clone(),
            })?,
        ),
        MessageBody::JobCancelled { job_id, robot_id } => (
            "job_cancelled",
            serde_json::to_value(JobReplyFields {
                job_id: job_id.clone(),
                robot_id: robot_id.clone(),
                reason: String::new(),
            })?,
        ),
        MessageBody::LogEntry(payload) => ("log_entry", serde_json::to_value(payload)?),
        MessageBody::LogBatch(payload) => ("log_batch", serde_json::to_value(payload)?),
        MessageBody::StatusRequest => ("status_request", Value::Object(Default::default())),
        MessageBody::StatusResponse(payload) => {
            ("status_response", serde_json::to_value(payload)?)
        }
        MessageBody::Pause => ("pause", Value::Object(Default::default())),
        MessageBody::Resume => ("resume", Value::Object(Default::default())),
        MessageBody::Shutdown { graceful } => (
            "shutdown",
            serde_json::to_value(ShutdownFields { graceful: *graceful })?,
        ),
        MessageBody::Disconnect { robot_id, reason } => (
            "disconnect",
            serde_json::to_value(DisconnectFields {
                robot_id: robot_id.clone(),
                reason: reason.clone(),
            })?,
        ),
        MessageBody::Error {
            error_code,
            error_message,
        } => (
            "error",
            serde_json::to_value(ErrorFields {
                error_code: error_code.clone(),
                error_message: error_message.clone(),
            })?,
        ),
        MessageBody::Unknown {
            type_label,
            payload,
        } => return Ok((type_label.clone(), payload.clone())),
    };

    Ok((parts.0.to_string(), parts.1))
}

fn body_from_parts(type_label: &str, payload: Value) -> Result<MessageBody, CodecError> {
    fn typed<T: serde::de::DeserializeOwned>(
        type_label: &str,
        payload: Value,
    ) -> Result<T, CodecError> {
        serde_json::from_value(payload).map_err(|schema_fault| CodecError::PayloadSchema {
            type_label: type_label.to_string(),
            detail: schema_fault.to_string(),
        })
    }

    let body = match type_label {
        "register" => MessageBody::Register(typed::<RegisterPayload>(type_label, payload)?),
        "register_ack" => {
            MessageBody::RegisterAck(typed::<RegisterAckPayload>(type_label, payload)?)
        }
        "heartbeat" => MessageBody::Heartbeat(typed::<HeartbeatPayload>(type_label, payload)?),
        "heartbeat_ack" => MessageBody::HeartbeatAck,
        "job_assign" => MessageBody::JobAssign(typed::<JobAssignPayload>(type_label, payload)?),
        "job_accept" => {
            let fields: JobReplyFields = typed(type_label, payload)?;
            MessageBody::JobAccept {
                job_id: fields.job_id,
                robot_id: fields.robot_id,
            }
        }
        "job_reject" => {
            let fields: JobReplyFields = typed(type_label, payload)?;
            MessageBody::JobReject {
                job_id: fields.job_id,
                robot_id: fields.robot_id,
                reason: fields.reason,
            }
        }
        "job_progress" => {
            MessageBody::JobProgress(typed::<JobProgressPayload>(type_label, payload)?)
        }
        "job_complete" => {
            MessageBody::JobComplete(typed::<JobCompletePayload>(type_label, payload)?)
        }
        "job_failed" => MessageBody::JobFailed(typed::<JobFailedPayload>(type_label, payload)?),
        "job_cancel" => {
            let fields: JobCancelFields = typed(type_label, payload)?;
            MessageBody::JobCancel {
                job_id: fields.job_id,
                reason: fields.reason,
            }
        }
        "job_cancelled" => {
            let fields: JobReplyFields = typed(type_label, payload)?;
            MessageBody::JobCancelled {
                job_id: fields.job_id,
                robot_id: fields.robot_id,
            }
        }
        "log_entry" => MessageBody::LogEntry(typed::<LogEntryPayload>(type_label, payload)?),
        "log_batch" => MessageBody::LogBatch(typed::<LogBatchPayload>(type_label, payload)?),
        "status_request" => MessageBody::StatusRequest,
        "status_response" => {
            MessageBody::StatusResponse(typed::<StatusResponsePayload>(type_label, payload)?)
        }
        "pause" => MessageBody::Pause,
        "resume" => MessageBody::Resume,
        "shutdown" => {
            let fields: ShutdownFields = typed(type_label, payload)?;
            MessageBody::Shutdown {
                graceful: fields.graceful,
            }
        }
        "disconnect" => {
            let fields: DisconnectFields = typed(type_label, payload)?;
            MessageBody::Disconnect {
                robot_id: fields.robot_id,
                reason: fields.reason,
            }
        }
        "error" => {
            let fields: ErrorFields = typed(type_label, payload)?;
            MessageBody::Error {
                error_code: fields.error_code,
                error_message: fields.error_message,
            }
        }
        // Tipo futuro: se preserva de forma opaca para el reenvío.
        _ => MessageBody::Unknown {
            type_label: type_label.to_string(),
            payload,
        },
    };

    Ok(body)
}
