// [libs/domain/models/src/events.rs]
/*!
 * =================================================================
 * APARATO: FLEET EVENT CONTRACT (V4.3 - NEURAL BROADCAST)
 * CLASIFICACIÓN: DOMAIN MODELS (ESTRATO L2)
 * RESPONSABILIDAD: UNIÓN DISCRIMINADA DE SEÑALES EN TIEMPO REAL
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. COMPACT DISCRIMINATORS: Etiquetas cortas ("t"/"p") para minimizar
 *    el peso de cada trama en el túnel WebSocket de operadores.
 * 2. AT-MOST-ONCE: El contrato asume difusión con pérdida tolerada;
 *    el Ledger es la única fuente autoritativa.
 * =================================================================
 */

use crate::job::JobStatus;
use crate::logging::LogEntryRecord;
use crate::robot::RobotStatus;
use serde::{Deserialize, Serialize};
use typeshare::typeshare;

/// UNIÓN DISCRIMINADA SOBERANA (FleetEvent)
/// Orquestador central de todas las señales hacia los suscriptores.
#[typeshare]
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "t", content = "p")]
pub enum FleetEvent {
    /// Robot Connected: una unidad completó el handshake de registro.
    #[serde(rename = "rc")]
    RobotConnected {
        robot_identifier: String,
        tenant_id: String,
    },

    /// Robot Disconnected: el enlace de una unidad se cerró.
    #[serde(rename = "rd")]
    RobotDisconnected {
        robot_identifier: String,
        reason: String,
    },

    /// Robot Status: transición de estado operativo de una unidad.
    #[serde(rename = "rs")]
    RobotStatusChanged {
        robot_identifier: String,
        status: RobotStatus,
    },

    /// Job Queued: misión aceptada en la cola persistente.
    #[serde(rename = "jq")]
    JobQueued {
        job_identifier: String,
        priority: String,
    },

    /// Job Assigned: misión entregada y aceptada por una unidad.
    #[serde(rename = "ja")]
    JobAssigned {
        job_identifier: String,
        robot_identifier: String,
    },

    /// Job Progress: avance reportado por la unidad ejecutora.
    #[serde(rename = "jp")]
    JobProgressUpdate {
        job_identifier: String,
        robot_identifier: String,
        progress_percent: u8,
        current_node: String,
        message: String,
    },

    /// Job Terminal: la misión alcanzó un estado absorbente.
    #[serde(rename = "jt")]
    JobTerminal {
        job_identifier: String,
        robot_identifier: String,
        status: JobStatus,
        summary: String,
    },

    /// Log Emission: entrada del flujo de diagnóstico de una misión.
    #[serde(rename = "le")]
    LogEmission(LogEntryRecord),
}
