// [libs/domain/models/src/logging.rs]
/*!
 * =================================================================
 * APARATO: DIAGNOSTIC STREAM CONTRACTS (V4.0 - PANOPTICON FEED)
 * CLASIFICACIÓN: DOMAIN MODELS (ESTRATO L2)
 * RESPONSABILIDAD: ENTRADAS DE DIAGNÓSTICO APPEND-ONLY POR MISIÓN
 * =================================================================
 */

use serde::{Deserialize, Serialize};
use typeshare::typeshare;

/// Severidad semántica de una entrada de diagnóstico.
#[typeshare]
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogLevel {
    Debug,
    Info,
    Warning,
    Error,
}

impl LogLevel {
    pub fn as_label(&self) -> &'static str {
        match self {
            LogLevel::Debug => "DEBUG",
            LogLevel::Info => "INFO",
            LogLevel::Warning => "WARNING",
            LogLevel::Error => "ERROR",
        }
    }

    /// Interpretación tolerante: etiquetas desconocidas degradan a INFO.
    pub fn from_label(label: &str) -> Self {
        match label.to_ascii_uppercase().as_str() {
            "DEBUG" => LogLevel::Debug,
            "WARNING" | "WARN" => LogLevel::Warning,
            "ERROR" | "CRITICAL" => LogLevel::Error,
            _ => LogLevel::Info,
        }
    }

    /// Rango creciente de severidad para el filtrado de suscriptores.
    pub fn severity_rank(&self) -> u8 {
        match self {
            LogLevel::Debug => 0,
            LogLevel::Info => 1,
            LogLevel::Warning => 2,
            LogLevel::Error => 3,
        }
    }
}

/// Entrada del flujo de diagnóstico append-only de una misión.
#[typeshare]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntryRecord {
    #[serde(rename = "job_identifier")]
    pub job_id: String,
    #[serde(rename = "robot_identifier")]
    pub robot_id: String,
    pub level: LogLevel,
    /// Origen de la señal: "robot", "orchestrator", "progress".
    pub source: String,
    pub message: String,
    #[serde(default)]
    pub node_id: Option<String>,
    #[serde(default)]
    pub extra: Option<serde_json::Value>,
    /// Marca ISO-8601 del emisor original.
    pub emitted_at: String,
}
