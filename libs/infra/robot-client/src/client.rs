// [libs/infra/robot-client/src/client.rs]
/*!
 * =================================================================
 * APARATO: SOVEREIGN ROBOT UPLINK (V4.5 - GOLD MASTER)
 * CLASIFICACIÓN: INFRASTRUCTURE ADAPTER (ESTRATO L3)
 * RESPONSABILIDAD: ENLACE FULL-DUPLEX ROBOT -> ORQUESTADOR
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. SELF-HEALING LINK: Supervisor de conexión con backoff exponencial
 *    (1s -> 60s, factor 2) y reinicio del contador tras enlace estable.
 * 2. IN-ORDER PIPELINE: Un único bucle de lectura procesa las tramas
 *    en orden de llegada y emite observaciones tipadas al consumidor.
 * 3. CAPACITY GATE: La decisión de aceptación de misiones (pausa y
 *    saturación) vive en el cliente; el motor de ejecución solo ve
 *    directivas ya reservadas en el inventario local.
 *
 * # Mathematical Proof (Correlation Discipline):
 * Toda respuesta a 'job_assign'/'job_cancel'/'status_request' viaja
 * con el id de la petición como correlation_id, permitiendo que el
 * tracker del orquestador resuelva su futuro pendiente en O(1).
 * =================================================================
 */

use crate::errors::UplinkError;
use crate::events::{JobAssignmentDirective, RobotChannelEvent};
use fabrica_infra_protocol::{
    decode_frame, encode_frame, CodecError, HeartbeatPayload, JobCompletePayload,
    JobFailedPayload, JobProgressPayload, LogBatchItem, LogBatchPayload, LogEntryPayload,
    MessageBody, RegisterPayload, StatusResponsePayload, WireMessage,
};
use futures_util::{SinkExt, StreamExt};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite::Message as WsFrame};
use tracing::{debug, error, info, instrument, warn};

/// Backoff inicial del supervisor de reconexión.
const INITIAL_BACKOFF_SECONDS: u64 = 1;
/// Techo del backoff exponencial.
const MAXIMUM_BACKOFF_SECONDS: u64 = 60;
/// Capacidad del buffer de tramas salientes.
const OUTBOUND_BUFFER_CAPACITY: usize = 64;
/// Capacidad del canal de observaciones hacia el consumidor.
const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Directivas de configuración del enlace táctico.
#[derive(Debug, Clone)]
pub struct RobotChannelSettings {
    /// Endpoint base del canal: ws://host:puerto/api/v1/ws/robot
    pub orchestrator_url: String,
    pub robot_id: String,
    pub robot_name: String,
    pub hostname: String,
    pub tenant_id: String,
    pub environment: String,
    pub api_key: String,
    pub max_concurrent_jobs: u32,
    pub tags: Vec<String>,
    pub capabilities: Vec<String>,
    /// Intervalo de latido inicial; el RegisterAck puede sobreescribirlo.
    pub heartbeat_interval_seconds: u64,
}

/// Estado compartido entre el supervisor, los reporteros y el consumidor.
struct UplinkShared {
    settings: RobotChannelSettings,
    running: AtomicBool,
    connected: AtomicBool,
    paused: AtomicBool,
    heartbeat_interval_seconds: AtomicU64,
    /// Inventario local de misiones aceptadas (job_id -> instante de arranque).
    active_missions: Mutex<HashMap<String, Instant>>,
    outbound_sender: Mutex<Option<mpsc::Sender<WireMessage>>>,
    telemetry: Mutex<(f32, f32, f32)>,
    ignition_instant: Instant,
}

/// Resultado de una sesión de enlace individual.
enum SessionOutcome {
    /// El socket cayó; el supervisor debe reintentar.
    Retry(String),
    /// Terminación definitiva (registro vetado o apagado inmediato).
    Fatal(String),
}

pub struct RobotChannelClient {
    shared: Arc<UplinkShared>,
    event_sender: mpsc::Sender<RobotChannelEvent>,
}

impl RobotChannelClient {
    /**
     * Construye el cliente y el canal de observaciones del consumidor.
     */
    pub fn new(
        settings: RobotChannelSettings,
    ) -> (Self, mpsc::Receiver<RobotChannelEvent>) {
        let (event_sender, event_receiver) = mpsc::channel(EVENT_CHANNEL_CAPACITY);

        let heartbeat_interval = settings.heartbeat_interval_seconds.max(1);
        let shared = Arc::new(UplinkShared {
            settings,
            running: AtomicBool::new(true),
            connected: AtomicBool::new(false),
            paused: AtomicBool::new(false),
            heartbeat_interval_seconds: AtomicU64::new(heartbeat_interval),
            active_missions: Mutex::new(HashMap::new()),
            outbound_sender: Mutex::new(None),
            telemetry: Mutex::new((0.0, 0.0, 0.0)),
            ignition_instant: Instant::now(),
        });

        (Self { shared, event_sender }, event_receiver)
    }

    /**
     * Lanza el supervisor de enlace en el runtime de Tokio.
     * El supervisor vive hasta 'request_disconnect' o un veto de registro.
     */
    pub fn spawn_uplink(&self) -> tokio::task::JoinHandle<()> {
        let shared = Arc::clone(&self.shared);
        let event_sender = self.event_sender.clone();

        tokio::spawn(async move {
            let channel_url = format!(
                "{}/{}?api_key={}",
                shared.settings.orchestrator_url.trim_end_matches('/'),
                shared.settings.robot_id,
                shared.settings.api_key
            );

            let mut reconnect_backoff_seconds = INITIAL_BACKOFF_SECONDS;

            while shared.running.load(Ordering::SeqCst) {
                info!("🔌 [UPLINK]: Negotiating channel to orchestrator...");

                match connect_async(channel_url.as_str()).await {
                    Ok((socket, _handshake_response)) => {
                        reconnect_backoff_seconds = INITIAL_BACKOFF_SECONDS;
                        shared.connected.store(true, Ordering::SeqCst);

                        let outcome =
                            run_link_session(Arc::clone(&shared), event_sender.clone(), socket)
                                .await;

                        shared.connected.store(false, Ordering::SeqCst);
                        if let Ok(mut sender_guard) = shared.outbound_sender.lock() {
                            *sender_guard = None;
                        }

                        match outcome {
                            SessionOutcome::Retry(reason) => {
                                warn!("⚠️ [UPLINK_SEVERED]: {}", reason);
                                let _ = event_sender
                                    .send(RobotChannelEvent::LinkLost { reason })
                                    .await;
                            }
                            SessionOutcome::Fatal(reason) => {
                                error!("🛑 [UPLINK_TERMINAL]: {}", reason);
                                shared.running.store(false, Ordering::SeqCst);
                                break;
                            }
                        }
                    }
                    Err(connect_fault) => {
                        warn!("⚠️ [UPLINK_RETRY]: Connection failed: {}. Next attempt in {}s.",
                            connect_fault, reconnect_backoff_seconds);
                    }
                }

                if !shared.running.load(Ordering::SeqCst) {
                    break;
                }

                tokio::time::sleep(Duration::from_secs(reconnect_backoff_seconds)).await;
                reconnect_backoff_seconds =
                    (reconnect_backoff_seconds * 2).min(MAXIMUM_BACKOFF_SECONDS);
            }

            info!("💀 [UPLINK]: Supervisor retired. Channel resources released.");
        })
    }

    // --- API PÚBLICA DE REPORTE ---

    #[instrument(skip(self, message), fields(job = %job_id), level = "debug")]
    pub async fn report_progress(
        &self,
        job_id: &str,
        progress: u8,
        current_node: &str,
        message: &str,
    ) -> Result<(), UplinkError> {
        self.send_frame(WireMessage::fresh(MessageBody::JobProgress(JobProgressPayload {
            job_id: job_id.to_string(),
            robot_id: self.shared.settings.robot_id.clone(),
            progress: progress.min(100),
            current_node: current_node.to_string(),
            message: message.to_string(),
        })))
        .await
    }

    /**
     * Sella una misión con éxito y libera su reserva local.
     * La duración se deriva del instante de aceptación registrado.
     */
    #[instrument(skip(self, result), fields(job = %job_id))]
    pub async fn report_job_complete(
        &self,
        job_id: &str,
        result: serde_json::Value,
    ) -> Result<(), UplinkError> {
        let duration_ms = self.surrender_mission(job_id);
        self.send_frame(WireMessage::fresh(MessageBody::JobComplete(JobCompletePayload {
            job_id: job_id.to_string(),
            robot_id: self.shared.settings.robot_id.clone(),
            result,
            duration_ms,
        })))
        .await
    }

    #[instrument(skip(self, error_message, stack_trace), fields(job = %job_id))]
    pub async fn report_job_failed(
        &self,
        job_id: &str,
        error_message: &str,
        error_type: &str,
        stack_trace: &str,
        failed_node: &str,
    ) -> Result<(), UplinkError> {
        self.surrender_mission(job_id);
        self.send_frame(WireMessage::fresh(MessageBody::JobFailed(JobFailedPayload {
            job_id: job_id.to_string(),
            robot_id: self.shared.settings.robot_id.clone(),
            error_message: error_message.to_string(),
            error_type: error_type.to_string(),
            stack_trace: stack_trace.to_string(),
            failed_node: failed_node.to_string(),
        })))
        .await
    }

    pub async fn send_log(
        &self,
        job_id: &str,
        level: &str,
        message: &str,
        node_id: &str,
    ) -> Result<(), UplinkError> {
        self.send_frame(WireMessage::fresh(MessageBody::LogEntry(LogEntryPayload {
            job_id: job_id.to_string(),
            robot_id: self.shared.settings.robot_id.clone(),
            level: level.to_string(),
            message: message.to_string(),
            node_id: node_id.to_string(),
            extra: None,
        })))
        .await
    }

    pub async fn send_log_batch(
        &self,
        job_id: &str,
        entries: Vec<LogBatchItem>,
    ) -> Result<(), UplinkError> {
        self.send_frame(WireMessage::fresh(MessageBody::LogBatch(LogBatchPayload {
            job_id: job_id.to_string(),
            robot_id: self.shared.settings.robot_id.clone(),
            entries,
        })))
        .await
    }

    /// Actualiza la biometría que viajará en el próximo latido.
    pub fn update_telemetry(&self, cpu_percent: f32, memory_percent: f32, disk_percent: f32) {
        if let Ok(mut telemetry_guard) = self.shared.telemetry.lock() {
            *telemetry_guard = (cpu_percent, memory_percent, disk_percent);
        }
    }

    /**
     * Cierre ordenado: anuncia la despedida y retira el supervisor.
     */
    pub async fn request_disconnect(&self, reason: &str) {
        self.shared.running.store(false, Ordering::SeqCst);
        let _ = self
            .send_frame(WireMessage::fresh(MessageBody::Disconnect {
                robot_id: self.shared.settings.robot_id.clone(),
                reason: reason.to_string(),
            }))
            .await;
    }

    pub fn is_connected(&self) -> bool {
        self.shared.connected.load(Ordering::SeqCst)
    }

    pub fn is_paused(&self) -> bool {
        self.shared.paused.load(Ordering::SeqCst)
    }

    pub fn active_job_count(&self) -> usize {
        self.shared
            .active_missions
            .lock()
            .map(|inventory| inventory.len())
            .unwrap_or(0)
    }

    /// Disponibilidad para nuevas misiones según el invariante de capacidad.
    pub fn is_available(&self) -> bool {
        self.is_connected()
            && !self.is_paused()
            && (self.active_job_count() as u32) < self.shared.settings.max_concurrent_jobs
    }

    async fn send_frame(&self, message: WireMessage) -> Result<(), UplinkError> {
        let sender = {
            let sender_guard = self
                .shared
                .outbound_sender
                .lock()
                .map_err(|_| UplinkError::ChannelSevered)?;
            sender_guard.clone()
        };

        match sender {
            Some(active_sender) => active_sender
                .send(message)
                .await
                .map_err(|_| UplinkError::ChannelSevered),
            None => Err(UplinkError::ChannelSevered),
        }
    }

    fn surrender_mission(&self, job_id: &str) -> u64 {
        self.shared
            .active_missions
            .lock()
            .ok()
            .and_then(|mut inventory| inventory.remove(job_id))
            .map(|started| started.elapsed().as_millis() as u64)
            .unwrap_or(0)
    }
}

/**
 * Decisión pura de aceptación de una directiva de asignación.
 *
 * # Returns:
 * `None` si la misión puede aceptarse; `Some(razón)` para el rechazo.
 */
pub fn evaluate_assignment_gate(
    is_paused: bool,
    active_mission_count: usize,
    max_concurrent_jobs: u32,
) -> Option<&'static str> {
    if is_paused {
        return Some("Robot is paused");
    }
    if active_mission_count as u32 >= max_concurrent_jobs {
        return Some("Maximum concurrent jobs reached");
    }
    None
}

// --- SESIÓN DE ENLACE ---

async fn run_link_session(
    shared: Arc<UplinkShared>,
    event_sender: mpsc::Sender<RobotChannelEvent>,
    socket: tokio_tungstenite::WebSocketStream<
        tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
    >,
) -> SessionOutcome {
    let (mut socket_sink, mut socket_stream) = socket.split();
    let (outbound_sender, mut outbound_receiver) =
        mpsc::channel::<WireMessage>(OUTBOUND_BUFFER_CAPACITY);

    if let Ok(mut sender_guard) = shared.outbound_sender.lock() {
        *sender_guard = Some(outbound_sender.clone());
    }

    // TAREA 1: WRITER (canal interno -> socket)
    let mut writer_task = tokio::spawn(async move {
        while let Some(message) = outbound_receiver.recv().await {
            match encode_frame(&message) {
                Ok(text_frame) => {
                    if socket_sink.send(WsFrame::Text(text_frame)).await.is_err() {
                        break;
                    }
                }
                Err(codec_fault) => {
                    error!("❌ [UPLINK_CODEC]: Outbound frame rejected: {}", codec_fault);
                }
            }
        }
    });

    // HANDSHAKE: el primer mensaje de aplicación es siempre 'register'.
    let registration = WireMessage::fresh(MessageBody::Register(RegisterPayload {
        robot_id: shared.settings.robot_id.clone(),
        robot_name: shared.settings.robot_name.clone(),
        hostname: shared.settings.hostname.clone(),
        tenant_id: shared.settings.tenant_id.clone(),
        environment: shared.settings.environment.clone(),
        max_concurrent_jobs: shared.settings.max_concurrent_jobs,
        tags: shared.settings.tags.clone(),
        capabilities: shared.settings.capabilities.clone(),
        auth_token: Some(shared.settings.api_key.clone()),
    }));

    if outbound_sender.send(registration).await.is_err() {
        writer_task.abort();
        return SessionOutcome::Retry("registration frame could not be queued".into());
    }

    // TAREA 2: HEARTBEAT (latido periódico con biometría)
    let heartbeat_shared = Arc::clone(&shared);
    let heartbeat_sender = outbound_sender.clone();
    let mut heartbeat_task = tokio::spawn(async move {
        loop {
            let interval_seconds = heartbeat_shared
                .heartbeat_interval_seconds
                .load(Ordering::SeqCst)
                .max(1);
            tokio::time::sleep(Duration::from_secs(interval_seconds)).await;

            let pulse = build_heartbeat(&heartbeat_shared);
            if heartbeat_sender
                .send(WireMessage::fresh(MessageBody::Heartbeat(pulse)))
                .await
                .is_err()
            {
                break;
            }
        }
    });

    // BUCLE DE LECTURA EN ORDEN (la sesión vive mientras lea)
    let outcome = loop {
        match socket_stream.next().await {
            Some(Ok(WsFrame::Text(raw_frame))) => {
                match decode_frame(&raw_frame) {
                    Ok(message) => {
                        match process_inbound(&shared, &event_sender, &outbound_sender, message)
                            .await
                        {
                            InboundVerdict::Continue => {}
                            InboundVerdict::EndSession(reason) => {
                                break SessionOutcome::Retry(reason)
                            }
                            InboundVerdict::Fatal(reason) => break SessionOutcome::Fatal(reason),
                        }
                    }
                    Err(codec_fault) => {
                        warn!("⚠️ [UPLINK_CODEC]: Inbound frame discarded: {}", codec_fault);
                    }
                }
            }
            Some(Ok(WsFrame::Binary(_))) => {
                // El canal habla texto UTF-8; una trama binaria es un
                // fallo de codec, no un fallo de transporte.
                warn!("⚠️ [UPLINK_CODEC]: Inbound frame discarded: {}",
                    UplinkError::CodecFault(CodecError::NonUtf8Frame));
            }
            Some(Ok(WsFrame::Close(_))) => {
                break SessionOutcome::Retry("orchestrator closed the channel".into())
            }
            Some(Ok(_)) => {} // Ping/Pong se gestionan en la capa física
            Some(Err(physical_fault)) => {
                break SessionOutcome::Retry(format!("physical layer fault: {}", physical_fault))
            }
            None => break SessionOutcome::Retry("stream exhausted".into()),
        }
    };

    writer_task.abort();
    heartbeat_task.abort();
    let _ = (&mut writer_task).await;
    let _ = (&mut heartbeat_task).await;

    outcome
}

enum InboundVerdict {
    Continue,
    EndSession(String),
    Fatal(String),
}

async fn process_inbound(
    shared: &Arc<UplinkShared>,
    event_sender: &mpsc::Sender<RobotChannelEvent>,
    outbound_sender: &mpsc::Sender<WireMessage>,
    message: WireMessage,
) -> InboundVerdict {
    match message.body {
        MessageBody::RegisterAck(acknowledgement) => {
            if !acknowledgement.success {
                let _ = event_sender
                    .send(RobotChannelEvent::RegistrationRejected {
                        message: acknowledgement.message.clone(),
                    })
                    .await;
                return InboundVerdict::Fatal(format!(
                    "registration vetoed: {}",
                    acknowledgement.message
                ));
            }

            if acknowledgement.config.heartbeat_interval > 0 {
                shared
                    .heartbeat_interval_seconds
                    .store(acknowledgement.config.heartbeat_interval, Ordering::SeqCst);
            }

            info!("✅ [UPLINK]: Registration acknowledged. Heartbeat every {}s.",
                shared.heartbeat_interval_seconds.load(Ordering::SeqCst));

            let _ = event_sender
                .send(RobotChannelEvent::LinkEstablished {
                    heartbeat_interval_seconds: shared
                        .heartbeat_interval_seconds
                        .load(Ordering::SeqCst),
                })
                .await;
            InboundVerdict::Continue
        }

        MessageBody::HeartbeatAck => InboundVerdict::Continue,

        MessageBody::JobAssign(directive) => {
            let gate_rejection = {
                let inventory_guard = shared.active_missions.lock();
                match inventory_guard {
                    Ok(inventory) => evaluate_assignment_gate(
                        shared.paused.load(Ordering::SeqCst),
                        inventory.len(),
                        shared.settings.max_concurrent_jobs,
                    ),
                    Err(_) => Some("local inventory poisoned"),
                }
            };

            if let Some(rejection_reason) = gate_rejection {
                debug!("🚫 [UPLINK]: Mission {} rejected: {}", directive.job_id, rejection_reason);
                let _ = outbound_sender
                    .send(WireMessage::reply_to(
                        message.message_id,
                        MessageBody::JobReject {
                            job_id: directive.job_id,
                            robot_id: shared.settings.robot_id.clone(),
                            reason: rejection_reason.to_string(),
                        },
                    ))
                    .await;
                return InboundVerdict::Continue;
            }

            if let Ok(mut inventory) = shared.active_missions.lock() {
                inventory.insert(directive.job_id.clone(), Instant::now());
            }

            let _ = outbound_sender
                .send(WireMessage::reply_to(
                    message.message_id,
                    MessageBody::JobAccept {
                        job_id: directive.job_id.clone(),
                        robot_id: shared.settings.robot_id.clone(),
                    },
                ))
                .await;

            info!("🎯 [UPLINK]: Mission {} accepted ({} in flight).",
                directive.job_id,
                shared.active_missions.lock().map(|i| i.len()).unwrap_or(0));

            let _ = event_sender
                .send(RobotChannelEvent::JobAssigned(JobAssignmentDirective {
                    job_id: directive.job_id,
                    workflow_name: directive.workflow_name,
                    workflow_json: directive.workflow_json,
                    priority: directive.priority,
                    timeout_seconds: directive.timeout_seconds,
                    parameters: directive.parameters,
                }))
                .await;
            InboundVerdict::Continue
        }

        MessageBody::JobCancel { job_id, reason } => {
            if let Ok(mut inventory) = shared.active_missions.lock() {
                inventory.remove(&job_id);
            }

            let _ = outbound_sender
                .send(WireMessage::reply_to(
                    message.message_id,
                    MessageBody::JobCancelled {
                        job_id: job_id.clone(),
                        robot_id: shared.settings.robot_id.clone(),
                    },
                ))
                .await;

            let _ = event_sender
                .send(RobotChannelEvent::JobCancelRequested { job_id, reason })
                .await;
            InboundVerdict::Continue
        }

        MessageBody::StatusRequest => {
            let telemetry = shared
                .telemetry
                .lock()
                .map(|guard| *guard)
                .unwrap_or((0.0, 0.0, 0.0));
            let active_job_ids: Vec<String> = shared
                .active_missions
                .lock()
                .map(|inventory| inventory.keys().cloned().collect())
                .unwrap_or_default();

            let status_label = if shared.paused.load(Ordering::SeqCst) {
                "paused"
            } else {
                "online"
            };

            let _ = outbound_sender
                .send(WireMessage::reply_to(
                    message.message_id,
                    MessageBody::StatusResponse(StatusResponsePayload {
                        robot_id: shared.settings.robot_id.clone(),
                        status: status_label.to_string(),
                        current_jobs: active_job_ids.len() as u32,
                        active_job_ids,
                        uptime_seconds: shared.ignition_instant.elapsed().as_secs(),
                        system_info: serde_json::json!({
                            "cpu_percent": telemetry.0,
                            "memory_percent": telemetry.1,
                            "disk_percent": telemetry.2,
                        }),
                    }),
                ))
                .await;
            InboundVerdict::Continue
        }

        MessageBody::Pause => {
            shared.paused.store(true, Ordering::SeqCst);
            let _ = event_sender.send(RobotChannelEvent::PauseRequested).await;
            InboundVerdict::Continue
        }

        MessageBody::Resume => {
            shared.paused.store(false, Ordering::SeqCst);
            let _ = event_sender.send(RobotChannelEvent::ResumeRequested).await;
            InboundVerdict::Continue
        }

        MessageBody::Shutdown { graceful } => {
            let _ = event_sender
                .send(RobotChannelEvent::ShutdownRequested { graceful })
                .await;
            if graceful {
                // El consumidor decide cuándo retirarse; dejamos de aceptar.
                shared.paused.store(true, Ordering::SeqCst);
                InboundVerdict::Continue
            } else {
                shared.running.store(false, Ordering::SeqCst);
                InboundVerdict::Fatal("immediate shutdown commanded".into())
            }
        }

        MessageBody::Error {
            error_code,
            error_message,
        } => {
            warn!("⚠️ [UPLINK]: Orchestrator error [{}]: {}", error_code, error_message);
            let _ = event_sender
                .send(RobotChannelEvent::OrchestratorError {
                    code: error_code,
                    message: error_message,
                })
                .await;
            InboundVerdict::Continue
        }

        MessageBody::Unknown { type_label, .. } => {
            debug!("❔ [UPLINK]: Uncataloged frame type '{}' ignored.", type_label);
            InboundVerdict::Continue
        }

        // Mensajes robot->orquestador jamás deberían llegar aquí.
        other => {
            warn!("⚠️ [UPLINK]: Unexpected inbound frame '{}' discarded.", other.type_label());
            InboundVerdict::Continue
        }
    }
}

fn build_heartbeat(shared: &Arc<UplinkShared>) -> HeartbeatPayload {
    let (cpu_percent, memory_percent, disk_percent) = shared
        .telemetry
        .lock()
        .map(|guard| *guard)
        .unwrap_or((0.0, 0.0, 0.0));

    let active_job_ids: Vec<String> = shared
        .active_missions
        .lock()
        .map(|inventory| inventory.keys().cloned().collect())
        .unwrap_or_default();

    let status_label = if shared.paused.load(Ordering::SeqCst) {
        "paused"
    } else if active_job_ids.len() as u32 >= shared.settings.max_concurrent_jobs {
        "busy"
    } else {
        "online"
    };

    HeartbeatPayload {
        robot_id: shared.settings.robot_id.clone(),
        status: status_label.to_string(),
        current_jobs: active_job_ids.len() as u32,
        cpu_percent,
        memory_percent,
        disk_percent,
        active_job_ids,
    }
}
