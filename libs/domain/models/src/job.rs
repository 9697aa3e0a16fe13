// [libs/domain/models/src/job.rs]
/*!
 * =================================================================
 * APARATO: JOB DOMAIN CONTRACTS (V4.2 - MISSION LEDGER)
 * CLASIFICACIÓN: DOMAIN MODELS (ESTRATO L2)
 * RESPONSABILIDAD: CICLO DE VIDA Y ENRUTAMIENTO DE MISIONES RPA
 *
 * # Mathematical Proof (Absorbing Terminal States):
 * El conjunto {succeeded, failed, cancelled, timed_out} es absorbente:
 * ninguna transición legal parte de él. La única transición regresiva
 * permitida es assigned -> pending (rechazo o desconexión antes del
 * arranque), lo que garantiza re-despacho sin duplicidad de propiedad.
 * =================================================================
 */

use serde::{Deserialize, Serialize};
use typeshare::typeshare;

/// Estado de una misión dentro del Ledger.
#[typeshare]
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Assigned,
    Running,
    Succeeded,
    Failed,
    Cancelled,
    TimedOut,
}

impl JobStatus {
    pub fn as_label(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Assigned => "assigned",
            JobStatus::Running => "running",
            JobStatus::Succeeded => "succeeded",
            JobStatus::Failed => "failed",
            JobStatus::Cancelled => "cancelled",
            JobStatus::TimedOut => "timed_out",
        }
    }

    pub fn from_label(label: &str) -> Self {
        match label {
            "assigned" => JobStatus::Assigned,
            "running" => JobStatus::Running,
            "succeeded" => JobStatus::Succeeded,
            "failed" => JobStatus::Failed,
            "cancelled" => JobStatus::Cancelled,
            "timed_out" => JobStatus::TimedOut,
            _ => JobStatus::Pending,
        }
    }

    /// Un estado terminal nunca vuelve a mutar.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobStatus::Succeeded | JobStatus::Failed | JobStatus::Cancelled | JobStatus::TimedOut
        )
    }
}

/// Prioridad de despacho. El orden numérico gobierna la cola.
#[typeshare]
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum JobPriority {
    Low,
    Normal,
    High,
    Critical,
}

impl JobPriority {
    pub fn as_label(&self) -> &'static str {
        match self {
            JobPriority::Low => "low",
            JobPriority::Normal => "normal",
            JobPriority::High => "high",
            JobPriority::Critical => "critical",
        }
    }

    pub fn from_label(label: &str) -> Self {
        match label {
            "low" => JobPriority::Low,
            "high" => JobPriority::High,
            "critical" => JobPriority::Critical,
            _ => JobPriority::Normal,
        }
    }

    /// Rango numérico para el ORDER BY del despachador (mayor gana).
    pub fn dispatch_rank(&self) -> i64 {
        match self {
            JobPriority::Low => 0,
            JobPriority::Normal => 1,
            JobPriority::High => 2,
            JobPriority::Critical => 3,
        }
    }
}

impl Default for JobPriority {
    fn default() -> Self {
        JobPriority::Normal
    }
}

/// Entidad persistida de una ejecución de workflow sobre una unidad.
#[typeshare]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobRecord {
    #[serde(rename = "job_identifier")]
    pub job_id: String,
    pub workflow_name: String,
    /// Definición del workflow, opaca para el orquestador (JSON crudo).
    pub workflow_payload: serde_json::Value,
    pub parameters: serde_json::Value,
    pub tenant_id: String,
    /// Afinidad dura: si está presente, solo esa unidad es elegible.
    pub requested_robot_id: Option<String>,
    pub required_capabilities: Vec<String>,
    pub priority: JobPriority,
    pub timeout_seconds: u32,
    pub status: JobStatus,
    pub assigned_robot_id: Option<String>,
    pub progress_percent: u8,
    pub current_node: String,
    pub result: serde_json::Value,
    pub error_message: String,
    pub created_at: String,
    pub assigned_at: Option<String>,
    pub started_at: Option<String>,
    pub finished_at: Option<String>,
}

/// Solicitud de encolado de una misión vía API de control.
#[typeshare]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobSubmission {
    pub workflow_name: String,
    /// Definición opaca del workflow tal como la produjo el diseñador.
    pub workflow_payload: serde_json::Value,
    #[serde(default)]
    pub parameters: serde_json::Value,
    #[serde(default = "default_tenant")]
    pub tenant_id: String,
    #[serde(default)]
    pub requested_robot_id: Option<String>,
    #[serde(default)]
    pub required_capabilities: Vec<String>,
    #[serde(default)]
    pub priority: JobPriority,
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u32,
}

fn default_tenant() -> String {
    "default".to_string()
}

fn default_timeout_seconds() -> u32 {
    3600
}
