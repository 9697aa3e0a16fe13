// [apps/orchestrator/src/services/event_bus.rs]
/*!
 * =================================================================
 * APARATO: FLEET EVENT BUS SERVICE (V4.2 - NEURAL BROADCASTER)
 * CLASIFICACIÓN: APPLICATION SERVICES (ESTRATO L4)
 * RESPONSABILIDAD: DIFUSIÓN DE SEÑALES Y VIGILANCIA DE ENLACE
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. AT-MOST-ONCE: Los suscriptores lentos pierden las tramas más
 *    antiguas (semántica Lagged del canal broadcast); el Ledger es la
 *    única fuente autoritativa, el bus es diagnóstico.
 * 2. DISPATCH MONITORING: Analiza el conteo de suscriptores en cada
 *    ráfaga para detectar estados de 'Ceguera de Mando'.
 *
 * # Mathematical Proof (Signal Propagation):
 * El Bus garantiza un tiempo de despacho O(1) independientemente del
 * número de receptores. La pérdida de un suscriptor no afecta el
 * determinismo del reactor asíncrono principal.
 * =================================================================
 */

use fabrica_domain_models::events::FleetEvent;
use fabrica_domain_models::job::JobStatus;
use fabrica_domain_models::logging::LogEntryRecord;
use fabrica_domain_models::robot::RobotStatus;
use tokio::sync::broadcast;
use tracing::{error, info, trace, warn};

/// Capacidad del canal de difusión soberano.
/// Sintonizado para absorber ráfagas de logs sin disparar 'Lagging'.
const BROADCAST_CHANNEL_CAPACITY: usize = 4096;

/**
 * Orquestador central de señales en tiempo real (El Sistema Nervioso).
 */
#[derive(Debug, Clone)]
pub struct EventBus {
    internal_transmission_channel: broadcast::Sender<FleetEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(BROADCAST_CHANNEL_CAPACITY);
        Self { internal_transmission_channel: sender }
    }

    /**
     * Genera un nuevo receptor para el túnel de logs de operadores.
     *
     * # Performance:
     * El coste de suscripción es despreciable; el motor de Tokio rutea
     * punteros de memoria evitando copias de payloads pesados.
     */
    pub fn subscribe(&self) -> broadcast::Receiver<FleetEvent> {
        self.internal_transmission_channel.subscribe()
    }

    // --- ESTRATO DE FLOTA ---

    pub fn emit_robot_connected(&self, robot_identifier: &str, tenant_id: &str) {
        self.dispatch_event(FleetEvent::RobotConnected {
            robot_identifier: robot_identifier.to_string(),
            tenant_id: tenant_id.to_string(),
        });
    }

    pub fn emit_robot_disconnected(&self, robot_identifier: &str, reason: &str) {
        self.dispatch_event(FleetEvent::RobotDisconnected {
            robot_identifier: robot_identifier.to_string(),
            reason: reason.to_string(),
        });
    }

    pub fn emit_robot_status(&self, robot_identifier: &str, status: RobotStatus) {
        self.dispatch_event(FleetEvent::RobotStatusChanged {
            robot_identifier: robot_identifier.to_string(),
            status,
        });
    }

    // --- ESTRATO DE MISIONES ---

    pub fn emit_job_queued(&self, job_identifier: &str, priority_label: &str) {
        self.dispatch_event(FleetEvent::JobQueued {
            job_identifier: job_identifier.to_string(),
            priority: priority_label.to_string(),
        });
    }

    pub fn emit_job_assigned(&self, job_identifier: &str, robot_identifier: &str) {
        self.dispatch_event(FleetEvent::JobAssigned {
            job_identifier: job_identifier.to_string(),
            robot_identifier: robot_identifier.to_string(),
        });
    }

    pub fn emit_job_progress(
        &self,
        job_identifier: &str,
        robot_identifier: &str,
        progress_percent: u8,
        current_node: &str,
        message: &str,
    ) {
        self.dispatch_event(FleetEvent::JobProgressUpdate {
            job_identifier: job_identifier.to_string(),
            robot_identifier: robot_identifier.to_string(),
            progress_percent,
            current_node: current_node.to_string(),
            message: message.to_string(),
        });
    }

    /**
     * Notifica el sellado terminal de una misión.
     */
    pub fn emit_job_terminal(
        &self,
        job_identifier: &str,
        robot_identifier: &str,
        status: JobStatus,
        summary: &str,
    ) {
        info!("📢 [EVENT_BUS]: Mission {} sealed as [{}].", job_identifier, status.as_label());
        self.dispatch_event(FleetEvent::JobTerminal {
            job_identifier: job_identifier.to_string(),
            robot_identifier: robot_identifier.to_string(),
            status,
            summary: summary.to_string(),
        });
    }

    // --- ESTRATO DE OBSERVABILIDAD UNIFICADA ---

    /// Inyecta una entrada del flujo de diagnóstico en el túnel.
    pub fn emit_log_entry(&self, entry: LogEntryRecord) {
        self.dispatch_event(FleetEvent::LogEmission(entry));
    }

    // --- ESTRATO DE DESPACHO INTERNO ---

    /**
     * Motor interno de despacho con auditoría de congestión.
     * Si no hay suscriptores activos el mensaje se descarta en silencio.
     */
    fn dispatch_event(&self, event_artifact: FleetEvent) {
        match self.internal_transmission_channel.send(event_artifact) {
            Ok(subscriber_count) => {
                if subscriber_count == 0 {
                    trace!("💤 [EVENT_BUS]: Signal discarded. No active operator links.");
                } else {
                    trace!("📡 [EVENT_BUS]: Signal broadcasted to {} active links.", subscriber_count);
                }
            }
            Err(_) => {
                // El canal se ha cerrado físicamente (condición catastrófica).
                error!("💀 [EVENT_BUS_FATAL]: Internal transmission channel collapsed.");
            }
        }
    }

    /// Rastro de congestión reportado por los túneles de suscriptores.
    pub fn report_subscriber_lag(&self, subscriber_label: &str, missed_frames: u64) {
        warn!("🐢 [EVENT_BUS_LAG]: Subscriber {} skipped {} frames due to congestion.",
            subscriber_label, missed_frames);
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
