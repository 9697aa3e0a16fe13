// [libs/infra/protocol/src/errors.rs]
/*!
 * =================================================================
 * APARATO: PROTOCOL ERROR CATALOG (V4.0 - SOBERANO)
 * CLASIFICACIÓN: INFRASTRUCTURE TRANSPORT (ESTRATO L3)
 * RESPONSABILIDAD: CATALOGACIÓN SEMÁNTICA DE FALLOS DE CODIFICACIÓN
 * =================================================================
 */

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CodecError {
    /// La trama excede el límite de tamaño del canal (protección DoS).
    #[error("[L3_WIRE_FAULT]: FRAME_OVERFLOW -> {actual_bytes} bytes exceed the {limit_bytes} byte ceiling")]
    FrameOverflow {
        actual_bytes: usize,
        limit_bytes: usize,
    },

    /// El sobre exterior no es JSON válido o carece de campos obligatorios.
    #[error("[L3_WIRE_FAULT]: MALFORMED_ENVELOPE -> {0}")]
    MalformedEnvelope(#[from] serde_json::Error),

    /// El payload no satisface el esquema del tipo declarado.
    #[error("[L3_WIRE_FAULT]: PAYLOAD_SCHEMA_DRIFT on '{type_label}' -> {detail}")]
    PayloadSchema { type_label: String, detail: String },

    /// El canal habla tramas de texto UTF-8; las tramas binarias
    /// quedan fuera de la gramática y se rechazan con diagnóstico.
    #[error("[L3_WIRE_FAULT]: NON_UTF8_FRAME -> the channel speaks UTF-8 text frames only")]
    NonUtf8Frame,
}
