// [apps/robot-agent/src/main.rs]
/*!
 * =================================================================
 * APARATO: ROBOT AGENT SHELL (V4.1 - ZENITH SHELL)
 * CLASIFICACIÓN: APPLICATION LAYER (ENTRY POINT)
 * RESPONSABILIDAD: BOOTSTRAP DE ENTORNO E IGNICIÓN DEL MOTOR
 *
 * # Logic:
 * El caparazón solo parsea directivas, arma el enlace táctico y cede
 * el control al motor de misiones. La ejecución real de workflows
 * entra por la costura 'WorkflowRunner'.
 * =================================================================
 */

use anyhow::Result;
use clap::Parser;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tracing::{info, warn};

use fabrica_infra_robot_client::{RobotChannelClient, RobotChannelSettings};
use fabrica_robot_lib::engine::RobotEngine;
use fabrica_robot_lib::runner::SimulatedWorkflowRunner;

/**
 * Directivas de mando para la unidad soberana.
 * Configuración inyectada vía CLI o variables de entorno.
 */
#[derive(Parser, Debug)]
#[command(
    author = "Fábrica Platform Engineering",
    version,
    about = "Fabrica RPA Robot Agent // Sovereign fleet unit"
)]
struct RobotAgentDirectives {
    /// Endpoint del canal de robots (ws://host:puerto/api/v1/ws/robot).
    #[arg(long, env = "ORCHESTRATOR_WS_URL")]
    orchestrator_endpoint: String,

    /// Identificador unívoco de la unidad en la rejilla de flota.
    #[arg(long, env = "ROBOT_ID")]
    robot_identifier: String,

    /// Nombre legible de la unidad.
    #[arg(long, env = "ROBOT_NAME", default_value = "fabrica-unit")]
    robot_name: String,

    /// Credencial del canal emitida por la bóveda del orquestador.
    #[arg(long, env = "ROBOT_API_KEY")]
    api_key: String,

    #[arg(long, env = "ROBOT_TENANT", default_value = "default")]
    tenant_id: String,

    #[arg(long, env = "ROBOT_ENVIRONMENT", default_value = "default")]
    environment: String,

    #[arg(long, env = "ROBOT_MAX_CONCURRENT_JOBS", default_value_t = 1)]
    max_concurrent_jobs: u32,

    /// Capacidades declaradas, separadas por coma (browser,desktop,gpu).
    #[arg(long, env = "ROBOT_CAPABILITIES", default_value = "")]
    capabilities: String,

    /// Etiquetas libres de afinidad, separadas por coma.
    #[arg(long, env = "ROBOT_TAGS", default_value = "")]
    tags: String,

    #[arg(long, env = "ROBOT_HEARTBEAT_INTERVAL", default_value_t = 30)]
    heartbeat_interval_seconds: u64,

    /// Pausa por nodo del runner de ensayo, en milisegundos.
    #[arg(long, env = "ROBOT_REHEARSAL_STEP_MS", default_value_t = 500)]
    rehearsal_step_ms: u64,
}

fn split_labels(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|label| label.trim().to_string())
        .filter(|label| !label.is_empty())
        .collect()
}

#[tokio::main]
async fn main() -> Result<()> {
    // 1. INICIALIZACIÓN DEL SISTEMA DE OBSERVABILIDAD
    tracing_subscriber::fmt::init();

    info!("💠 [SHELL]: Unit ignition sequence V4.1 starting...");

    // 2. PARSEO DE DIRECTIVAS ESTRATÉGICAS
    let directives = RobotAgentDirectives::parse();

    // 3. CONSTRUCCIÓN DEL ENLACE TÁCTICO (UPLINK)
    let (channel_client, event_receiver) = RobotChannelClient::new(RobotChannelSettings {
        orchestrator_url: directives.orchestrator_endpoint,
        robot_id: directives.robot_identifier.clone(),
        robot_name: directives.robot_name,
        hostname: std::env::var("HOSTNAME").unwrap_or_default(),
        tenant_id: directives.tenant_id,
        environment: directives.environment,
        api_key: directives.api_key,
        max_concurrent_jobs: directives.max_concurrent_jobs,
        tags: split_labels(&directives.tags),
        capabilities: split_labels(&directives.capabilities),
        heartbeat_interval_seconds: directives.heartbeat_interval_seconds,
    });

    let channel_client = Arc::new(channel_client);
    let uplink_supervisor = channel_client.spawn_uplink();

    // 4. PROTOCOLO DE SEÑALES DE SISTEMA (Terminación Ordenada)
    let shutdown_signal = Arc::new(Notify::new());
    let signal_reference = Arc::clone(&shutdown_signal);
    let signal_uplink = Arc::clone(&channel_client);

    tokio::spawn(async move {
        if (tokio::signal::ctrl_c().await).is_ok() {
            warn!("⚠️ [SIGNAL]: Termination requested by host. Sealing current strata...");
            signal_uplink.request_disconnect("host shutdown").await;
            signal_reference.notify_waiters();
        }
    });

    // 5. INSTANCIACIÓN E IGNICIÓN DEL MOTOR DE MISIONES
    let rehearsal_runner = Arc::new(SimulatedWorkflowRunner::new(Duration::from_millis(
        directives.rehearsal_step_ms,
    )));

    let mission_engine = RobotEngine::new(
        Arc::clone(&channel_client),
        event_receiver,
        rehearsal_runner,
        shutdown_signal,
    );

    info!("🚀 [SHELL]: Handing control to RobotEngine. Unit {} OPERATIONAL.",
        directives.robot_identifier);

    mission_engine.ignite_mission_loop().await;

    // 6. CIERRE DETERMINISTA
    uplink_supervisor.abort();
    let _ = uplink_supervisor.await;

    info!("💀 [SHELL]: Unit retired. Resources released.");
    Ok(())
}
