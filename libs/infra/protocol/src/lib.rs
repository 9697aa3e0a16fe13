// [libs/infra/protocol/src/lib.rs]
/*!
 * =================================================================
 * APARATO: ROBOT CHANNEL PROTOCOL ROOT (V4.0 - WIRE AUTHORITY)
 * CLASIFICACIÓN: INFRASTRUCTURE TRANSPORT (ESTRATO L3)
 * RESPONSABILIDAD: CATÁLOGO DE MENSAJES Y CODEC DEL CANAL DE ROBOTS
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. SELF-DESCRIBING FRAMES: Cada trama WebSocket transporta un sobre
 *    JSON {id, type, ts, correlation_id?, payload} auto-descriptivo.
 * 2. FORWARD COMPATIBILITY: Los tipos desconocidos decodifican como
 *    variante opaca 'Unknown' y re-codifican sin pérdida, permitiendo
 *    que un lado evolucione el catálogo sin romper al otro.
 * 3. CORRELATION DISCIPLINE: Las respuestas viajan con el 'id' de la
 *    petición en 'correlation_id'; el tracker del registro resuelve
 *    los futuros pendientes con esa llave.
 * =================================================================
 */

pub mod codec;
pub mod envelope;
pub mod errors;

pub use codec::{decode_frame, encode_frame, MAXIMUM_FRAME_BYTES};
pub use envelope::{
    HeartbeatPayload, JobAssignPayload, JobCompletePayload, JobFailedPayload, JobProgressPayload,
    LogBatchItem, LogBatchPayload, LogEntryPayload, MessageBody, RegisterAckConfig,
    RegisterAckPayload, RegisterPayload, StatusResponsePayload, WireMessage,
};
pub use errors::CodecError;
