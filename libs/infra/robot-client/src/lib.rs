// [libs/infra/robot-client/src/lib.rs]
/*!
 * =================================================================
 * APARATO: ROBOT UPLINK LIBRARY ROOT (V4.0 - SOVEREIGN CHANNEL)
 * CLASIFICACIÓN: INFRASTRUCTURE ADAPTER (ESTRATO L3)
 * RESPONSABILIDAD: GESTOR DE CONEXIÓN DEL LADO DEL ROBOT
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. EVENT STREAM: El consumidor observa el canal mediante eventos
 *    tipados sobre un único canal de entrada, no mediante callbacks
 *    registrados. El bucle interno procesa las tramas en orden.
 * 2. SELF-HEALING LINK: Reconexión autónoma con backoff exponencial
 *    y re-registro transparente.
 * =================================================================
 */

pub mod client;
pub mod errors;
pub mod events;

pub use client::{RobotChannelClient, RobotChannelSettings};
pub use errors::UplinkError;
pub use events::{JobAssignmentDirective, RobotChannelEvent};
