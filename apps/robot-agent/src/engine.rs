// [apps/robot-agent/src/engine.rs]
/*!
 * =================================================================
 * APARATO: ROBOT MISSION ENGINE (V4.2 - EVENT LOOP AUTHORITY)
 * CLASIFICACIÓN: APPLICATION LAYER (ESTRATO L1-WORKER)
 * RESPONSABILIDAD: PUENTE ENTRE EL ENLACE TÁCTICO Y EL EJECUTOR
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. EVENT DRIVEN: El motor consume el canal de observaciones del
 *    enlace; cada misión aceptada se ejecuta en su propia tarea con
 *    cancelación cooperativa por bandera atómica.
 * 2. GRACEFUL RETREAT: Un 'shutdown' ordenado deja drenar las
 *    misiones en vuelo antes de la despedida.
 * =================================================================
 */

use crate::runner::{ProgressProbe, WorkflowRunner};
use fabrica_infra_robot_client::{RobotChannelClient, RobotChannelEvent};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::{mpsc, Notify};
use tracing::{error, info, warn};

/// Capacidad del canal interno de latidos de avance por misión.
const PROGRESS_TICK_CAPACITY: usize = 16;

pub struct RobotEngine<R: WorkflowRunner> {
    uplink: Arc<RobotChannelClient>,
    event_receiver: mpsc::Receiver<RobotChannelEvent>,
    runner: Arc<R>,
    /// Banderas de cancelación cooperativa por misión en vuelo.
    cancellation_flags: Arc<Mutex<HashMap<String, Arc<AtomicBool>>>>,
    shutdown_signal: Arc<Notify>,
}

impl<R: WorkflowRunner> RobotEngine<R> {
    pub fn new(
        uplink: Arc<RobotChannelClient>,
        event_receiver: mpsc::Receiver<RobotChannelEvent>,
        runner: Arc<R>,
        shutdown_signal: Arc<Notify>,
    ) -> Self {
        Self {
            uplink,
            event_receiver,
            runner,
            cancellation_flags: Arc::new(Mutex::new(HashMap::new())),
            shutdown_signal,
        }
    }

    /**
     * Bucle principal del motor: vive hasta la señal de apagado, el
     * veto de registro o el colapso del canal de observaciones.
     */
    pub async fn ignite_mission_loop(mut self) {
        info!("💠 [ENGINE]: Mission loop armed. Awaiting directives.");
        let shutdown_signal = Arc::clone(&self.shutdown_signal);

        loop {
            tokio::select! {
                _ = shutdown_signal.notified() => {
                    info!("⚠️ [ENGINE]: Shutdown signal observed. Retreating.");
                    break;
                }
                observed_event = self.event_receiver.recv() => {
                    match observed_event {
                        Some(event) => {
                            if !self.process_event(event).await {
                                break;
                            }
                        }
                        None => {
                            warn!("💀 [ENGINE]: Observation channel collapsed. Retreating.");
                            break;
                        }
                    }
                }
            }
        }
    }

    /// Devuelve `false` cuando el motor debe retirarse.
    async fn process_event(&self, event: RobotChannelEvent) -> bool {
        match event {
            RobotChannelEvent::LinkEstablished { heartbeat_interval_seconds } => {
                info!("🔗 [ENGINE]: Link established (heartbeat every {}s).", heartbeat_interval_seconds);
                true
            }

            RobotChannelEvent::LinkLost { reason } => {
                warn!("🔌 [ENGINE]: Link lost ({}). Supervisor will retry.", reason);
                true
            }

            RobotChannelEvent::RegistrationRejected { message } => {
                error!("🛑 [ENGINE]: Identity vetoed by orchestrator: {}. Retiring.", message);
                false
            }

            RobotChannelEvent::JobAssigned(directive) => {
                self.launch_mission_task(directive);
                true
            }

            RobotChannelEvent::JobCancelRequested { job_id, reason } => {
                info!("🛑 [ENGINE]: Cancellation of {} requested: {}", job_id, reason);
                if let Ok(flags_guard) = self.cancellation_flags.lock() {
                    if let Some(flag) = flags_guard.get(&job_id) {
                        flag.store(true, Ordering::SeqCst);
                    }
                }
                true
            }

            RobotChannelEvent::PauseRequested => {
                info!("⏸️ [ENGINE]: Pause commanded. New assignments will be rejected.");
                true
            }

            RobotChannelEvent::ResumeRequested => {
                info!("▶️ [ENGINE]: Resume commanded. Accepting assignments again.");
                true
            }

            RobotChannelEvent::ShutdownRequested { graceful } => {
                if graceful {
                    info!("🌙 [ENGINE]: Graceful shutdown commanded. Draining missions.");
                    self.await_mission_drain().await;
                }
                self.uplink.request_disconnect("shutdown commanded").await;
                false
            }

            RobotChannelEvent::OrchestratorError { code, message } => {
                warn!("⚠️ [ENGINE]: Orchestrator error [{}]: {}", code, message);
                true
            }
        }
    }

    /**
     * Lanza la ejecución de una misión aceptada en su propia tarea.
     */
    fn launch_mission_task(&self, directive: fabrica_infra_robot_client::JobAssignmentDirective) {
        let job_identifier = directive.job_id.clone();
        let cancellation_flag = Arc::new(AtomicBool::new(false));

        if let Ok(mut flags_guard) = self.cancellation_flags.lock() {
            flags_guard.insert(job_identifier.clone(), Arc::clone(&cancellation_flag));
        }

        let (tick_sender, mut tick_receiver) = mpsc::channel(PROGRESS_TICK_CAPACITY);
        let probe = ProgressProbe::new(Arc::clone(&cancellation_flag), tick_sender);

        // Reenviador de avance: runner -> orquestador.
        let progress_uplink = Arc::clone(&self.uplink);
        let progress_job = job_identifier.clone();
        tokio::spawn(async move {
            while let Some(tick) = tick_receiver.recv().await {
                let _ = progress_uplink
                    .report_progress(
                        &progress_job,
                        tick.progress_percent,
                        &tick.current_node,
                        &tick.message,
                    )
                    .await;
            }
        });

        let runner = Arc::clone(&self.runner);
        let uplink = Arc::clone(&self.uplink);
        let flags_registry = Arc::clone(&self.cancellation_flags);

        tokio::spawn(async move {
            let execution_outcome = runner
                .execute(
                    directive.workflow_name.clone(),
                    directive.workflow_json,
                    directive.parameters,
                    probe,
                )
                .await;

            match execution_outcome {
                Ok(result) => {
                    let _ = uplink.report_job_complete(&job_identifier, result).await;
                }
                Err(fault) if fault.error_type == "Cancelled" => {
                    // El acuse 'job_cancelled' ya viajó; el orquestador sella.
                    info!("🛑 [ENGINE]: Mission {} cancelled cooperatively.", job_identifier);
                }
                Err(fault) => {
                    let _ = uplink
                        .report_job_failed(
                            &job_identifier,
                            &fault.message,
                            &fault.error_type,
                            "",
                            &fault.failed_node,
                        )
                        .await;
                }
            }

            if let Ok(mut flags_guard) = flags_registry.lock() {
                flags_guard.remove(&job_identifier);
            }
        });
    }

    /// Espera pasiva al drenado de misiones en vuelo (apagado ordenado).
    async fn await_mission_drain(&self) {
        while self.uplink.active_job_count() > 0 {
            tokio::time::sleep(std::time::Duration::from_millis(250)).await;
        }
    }
}
