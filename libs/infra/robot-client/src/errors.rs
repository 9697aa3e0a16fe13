// [libs/infra/robot-client/src/errors.rs]
/*!
 * =================================================================
 * APARATO: UPLINK ERROR CATALOG (V4.0 - SOBERANO)
 * CLASIFICACIÓN: INFRASTRUCTURE ADAPTER (ESTRATO L3)
 * RESPONSABILIDAD: CATALOGACIÓN SEMÁNTICA DE FALLOS DE ENLACE
 * =================================================================
 */

use thiserror::Error;

#[derive(Error, Debug)]
pub enum UplinkError {
    /// La configuración del enlace es sintácticamente inválida.
    #[error("[L3_UPLINK_FAULT]: CONFIGURATION_VOID -> {0}")]
    ConfigFault(String),

    /// Fallo de la capa física WebSocket (socket cerrado, TLS, DNS).
    #[error("[L3_UPLINK_FAULT]: TRANSPORT_SEVERED -> {0}")]
    TransportFault(#[from] tokio_tungstenite::tungstenite::Error),

    /// La trama recibida traiciona el catálogo del protocolo.
    #[error("[L3_UPLINK_FAULT]: CODEC_REJECTION -> {0}")]
    CodecFault(#[from] fabrica_infra_protocol::CodecError),

    /// El canal interno de salida colapsó (el enlace ya no existe).
    #[error("[L3_UPLINK_FAULT]: OUTBOUND_CHANNEL_SEVERED")]
    ChannelSevered,

    /// El orquestador rechazó el registro de la unidad.
    #[error("[L3_UPLINK_FAULT]: REGISTRATION_REJECTED -> {0}")]
    RegistrationRejected(String),
}
