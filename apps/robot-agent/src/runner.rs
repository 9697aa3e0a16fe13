// [apps/robot-agent/src/runner.rs]
/*!
 * =================================================================
 * APARATO: WORKFLOW RUNNER SEAM (V4.1 - EXECUTION BOUNDARY)
 * CLASIFICACIÓN: APPLICATION LAYER (ESTRATO L1-WORKER)
 * RESPONSABILIDAD: COSTURA HACIA EL MOTOR DE EJECUCIÓN DE WORKFLOWS
 *
 * # Logic:
 * El motor de ejecución real (nodos de navegador, PDF, scripts) es un
 * colaborador externo. Este aparato define el contrato que ese motor
 * satisface y provee un runner simulado para ensayos de flota: camina
 * los nodos de la definición, reporta avance y respeta la cancelación
 * cooperativa entre pasos.
 * =================================================================
 */

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

/// Fallo de ejecución reportable al orquestador como 'job_failed'.
#[derive(Error, Debug, Clone)]
#[error("[L1_RUNNER_FAULT]: {error_type} at '{failed_node}' -> {message}")]
pub struct WorkflowFault {
    pub error_type: String,
    pub message: String,
    pub failed_node: String,
}

/// Observador de avance inyectado al runner por el motor de misiones.
pub struct ProgressProbe {
    /// Señal cooperativa de aborto (encendida por 'job_cancel').
    pub cancellation_flag: Arc<AtomicBool>,
    reporter: tokio::sync::mpsc::Sender<ProgressTick>,
}

/// Un latido de avance camino al orquestador.
#[derive(Debug, Clone)]
pub struct ProgressTick {
    pub progress_percent: u8,
    pub current_node: String,
    pub message: String,
}

impl ProgressProbe {
    pub fn new(
        cancellation_flag: Arc<AtomicBool>,
        reporter: tokio::sync::mpsc::Sender<ProgressTick>,
    ) -> Self {
        Self { cancellation_flag, reporter }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancellation_flag.load(Ordering::SeqCst)
    }

    pub async fn report(&self, progress_percent: u8, current_node: &str, message: &str) {
        let _ = self
            .reporter
            .send(ProgressTick {
                progress_percent: progress_percent.min(100),
                current_node: current_node.to_string(),
                message: message.to_string(),
            })
            .await;
    }
}

/**
 * Contrato del motor de ejecución de workflows.
 * La definición llega opaca (JSON del diseñador); el resultado es el
 * mapa que viajará en 'job_complete'.
 */
pub trait WorkflowRunner: Send + Sync + 'static {
    fn execute(
        &self,
        workflow_name: String,
        workflow_definition: serde_json::Value,
        parameters: serde_json::Value,
        probe: ProgressProbe,
    ) -> impl Future<Output = Result<serde_json::Value, WorkflowFault>> + Send;
}

/**
 * Runner de ensayo: camina los nodos declarados en la definición con
 * una pausa fija por nodo. Útil para certificar el protocolo de
 * extremo a extremo sin arrastrar el motor real.
 */
pub struct SimulatedWorkflowRunner {
    /// Pausa por nodo simulado.
    pub step_delay: Duration,
}

impl SimulatedWorkflowRunner {
    pub fn new(step_delay: Duration) -> Self {
        Self { step_delay }
    }

    fn node_labels(workflow_definition: &serde_json::Value) -> Vec<String> {
        let declared_nodes = workflow_definition
            .get("nodes")
            .and_then(|nodes| nodes.as_array())
            .map(|nodes| {
                nodes
                    .iter()
                    .enumerate()
                    .map(|(index, node)| {
                        node.get("id")
                            .and_then(|id| id.as_str())
                            .map(|id| id.to_string())
                            .unwrap_or_else(|| format!("node-{}", index))
                    })
                    .collect::<Vec<_>>()
            })
            .unwrap_or_default();

        if declared_nodes.is_empty() {
            // Definiciones sin nodos declarados ensayan un paso único.
            vec!["node-0".to_string()]
        } else {
            declared_nodes
        }
    }
}

impl WorkflowRunner for SimulatedWorkflowRunner {
    async fn execute(
        &self,
        workflow_name: String,
        workflow_definition: serde_json::Value,
        _parameters: serde_json::Value,
        probe: ProgressProbe,
    ) -> Result<serde_json::Value, WorkflowFault> {
        let node_labels = Self::node_labels(&workflow_definition);
        let total_nodes = node_labels.len();

        info!("🎬 [RUNNER]: Rehearsing workflow '{}' across {} nodes.", workflow_name, total_nodes);

        for (node_index, node_label) in node_labels.iter().enumerate() {
            if probe.is_cancelled() {
                debug!("🛑 [RUNNER]: Rehearsal of '{}' aborted at {}.", workflow_name, node_label);
                return Err(WorkflowFault {
                    error_type: "Cancelled".to_string(),
                    message: "cancelled by orchestrator".to_string(),
                    failed_node: node_label.clone(),
                });
            }

            tokio::time::sleep(self.step_delay).await;

            let progress_percent = (((node_index + 1) * 100) / total_nodes) as u8;
            probe
                .report(progress_percent, node_label, &format!("executing {}", node_label))
                .await;
        }

        Ok(serde_json::json!({
            "workflow": workflow_name,
            "nodes_executed": total_nodes,
        }))
    }
}
