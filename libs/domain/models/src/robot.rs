// [libs/domain/models/src/robot.rs]
/*!
 * =================================================================
 * APARATO: ROBOT DOMAIN CONTRACTS (V4.1 - FLEET IDENTITY)
 * CLASIFICACIÓN: DOMAIN MODELS (ESTRATO L2)
 * RESPONSABILIDAD: IDENTIDAD, CAPACIDAD Y BIOMETRÍA DE UNIDADES RPA
 *
 * # Mathematical Proof (Capacity Invariant):
 * Para toda unidad registrada se cumple
 * |current_job_ids| <= max_concurrent_jobs. El registro en RAM y el
 * Ledger aplican el invariante de forma independiente; la conciliación
 * de latidos repara cualquier deriva entre ambos estratos.
 * =================================================================
 */

use serde::{Deserialize, Serialize};
use typeshare::typeshare;

/// Estado operativo de una unidad de la flota.
#[typeshare]
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RobotStatus {
    /// La unidad reporta latido y dispone de capacidad.
    Online,
    /// La unidad está saturada de misiones concurrentes.
    Busy,
    /// La unidad no reporta latido dentro de la ventana de expiración.
    Offline,
    /// La unidad fue penalizada por un fallo de despacho (un ciclo).
    Error,
    /// La unidad fue retirada administrativamente de la rotación.
    Maintenance,
}

impl RobotStatus {
    pub fn as_label(&self) -> &'static str {
        match self {
            RobotStatus::Online => "online",
            RobotStatus::Busy => "busy",
            RobotStatus::Offline => "offline",
            RobotStatus::Error => "error",
            RobotStatus::Maintenance => "maintenance",
        }
    }

    /// Interpreta una etiqueta textual tolerando valores desconocidos como 'offline'.
    pub fn from_label(label: &str) -> Self {
        match label {
            "online" => RobotStatus::Online,
            "busy" => RobotStatus::Busy,
            "error" => RobotStatus::Error,
            "maintenance" | "paused" => RobotStatus::Maintenance,
            _ => RobotStatus::Offline,
        }
    }
}

/// Biometría de silicio reportada en cada latido.
#[typeshare]
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ResourceTelemetry {
    #[serde(rename = "cpu_load_percentage")]
    pub cpu_percent: f32,
    #[serde(rename = "memory_usage_percentage")]
    pub memory_percent: f32,
    #[serde(rename = "disk_usage_percentage")]
    pub disk_percent: f32,
}

/// Entidad persistida de una unidad registrada en el Ledger de flota.
#[typeshare]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RobotRecord {
    #[serde(rename = "robot_identifier")]
    pub robot_id: String,
    pub name: String,
    pub hostname: String,
    pub tenant_id: String,
    pub environment: String,
    pub status: RobotStatus,
    pub max_concurrent_jobs: u32,
    /// Etiquetas de capacidad declaradas (browser, desktop, gpu...).
    pub capabilities: Vec<String>,
    /// Etiquetas libres de afinidad operativa.
    pub tags: Vec<String>,
    /// Misiones actualmente en vuelo según el Ledger.
    pub current_job_ids: Vec<String>,
    pub metrics: ResourceTelemetry,
    /// Marca ISO-8601 del último contacto de cualquier tipo.
    pub last_seen: String,
    /// Marca ISO-8601 del último latido biométrico.
    pub last_heartbeat: String,
    pub created_at: String,
}

impl RobotRecord {
    /// Evalúa si la unidad satisface un conjunto de capacidades requeridas.
    pub fn satisfies_capabilities(&self, required: &[String]) -> bool {
        required
            .iter()
            .all(|capability| self.capabilities.iter().any(|owned| owned == capability))
    }
}

/// Solicitud de alta (upsert) de una unidad vía REST o canal WebSocket.
#[typeshare]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RobotRegistration {
    #[serde(rename = "robot_identifier")]
    pub robot_id: String,
    pub name: String,
    #[serde(default)]
    pub hostname: String,
    #[serde(default = "default_tenant")]
    pub tenant_id: String,
    #[serde(default = "default_environment")]
    pub environment: String,
    #[serde(default = "default_max_concurrent_jobs")]
    pub max_concurrent_jobs: u32,
    #[serde(default)]
    pub capabilities: Vec<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

fn default_tenant() -> String {
    "default".to_string()
}

fn default_environment() -> String {
    "default".to_string()
}

fn default_max_concurrent_jobs() -> u32 {
    1
}

/// Latido de vida normalizado, compartido entre el canal WebSocket,
/// el endpoint REST de latidos y el buffer Write-Behind.
#[typeshare]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RobotPulse {
    #[serde(rename = "robot_identifier")]
    pub robot_id: String,
    pub status: RobotStatus,
    pub current_jobs: u32,
    pub metrics: ResourceTelemetry,
    #[serde(default)]
    pub active_job_ids: Vec<String>,
    /// Marca ISO-8601 asignada por el receptor del pulso.
    pub observed_at: String,
}

/// Predicados de consulta para el listado de flota.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RobotFleetFilter {
    pub status: Option<RobotStatus>,
    pub tenant_id: Option<String>,
    pub capability: Option<String>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}
