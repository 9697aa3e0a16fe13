// [apps/orchestrator/src/state/fleet_registry.rs]
/*!
 * =================================================================
 * APARATO: FLEET CONNECTION REGISTRY (V4.6 - SINGLE HANDLE LAW)
 * CLASIFICACIÓN: APPLICATION STATE (ESTRATO L3)
 * RESPONSABILIDAD: MAPA robot_id -> ENLACE VIVO Y TRACKER DE RESPUESTAS
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. SINGLE HANDLE LAW: En todo instante existe a lo sumo un handle
 *    vivo por robot_id; un registro nuevo supersede al anterior
 *    (socket cerrado, futuros fallados, capacidad rendida).
 * 2. LOCK DISCIPLINE: cerrojo de mapa -> cerrojo de handle -> canal de
 *    salida. Jamás se retiene un cerrojo de handle a través de una
 *    llamada al Ledger.
 * 3. EPHEMERAL BY DESIGN: Nada de este aparato se persiste; tras un
 *    colapso del proceso el mapa se reconstruye con las reconexiones.
 *
 * # Mathematical Proof (Capacity Reservation):
 * La reserva de slots es una sección crítica sobre el mutex del
 * handle: |reserved| < max_concurrent_jobs se evalúa y muta bajo el
 * mismo cerrojo, por lo que el invariante de capacidad no puede
 * violarse por despachadores concurrentes.
 * =================================================================
 */

use fabrica_domain_models::robot::{ResourceTelemetry, RobotPulse, RobotStatus};
use fabrica_infra_protocol::{HeartbeatPayload, WireMessage};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, oneshot, Notify};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Capacidad del buffer de tramas salientes por conexión.
pub const OUTBOUND_FRAME_CAPACITY: usize = 64;

/// Fase del ciclo de vida de un enlace. CLOSED es terminal: una
/// reconexión construye siempre un handle fresco.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandleLifecycle {
    /// Handshake de registro completado; aún sin latido.
    Registered,
    /// Primer latido recibido; la unidad es elegible para despacho.
    Active,
    /// Enlace cerrado (supersesión, expiración o cierre del socket).
    Closed,
}

/// Identidad inmutable declarada por la unidad en el registro.
#[derive(Debug, Clone)]
pub struct HandleIdentity {
    pub robot_id: String,
    pub robot_name: String,
    pub tenant_id: String,
    pub capabilities: Vec<String>,
    pub tags: Vec<String>,
    pub max_concurrent_jobs: u32,
}

/// Estado mutable del enlace, protegido por el cerrojo del handle.
struct HandleRuntime {
    status: RobotStatus,
    lifecycle: HandleLifecycle,
    last_heartbeat_monotonic: Instant,
    last_heartbeat_label: String,
    metrics: ResourceTelemetry,
    /// Reservas de capacidad hechas por el despachador.
    reserved_job_ids: HashSet<String>,
    /// Inventario de misiones reportado por la unidad en su último latido.
    reported_job_ids: Vec<String>,
}

/**
 * Representación en RAM de un socket vivo más la identidad cacheada
 * de la unidad y sus contadores de capacidad. Su vida es exactamente
 * la de la conexión WebSocket.
 */
pub struct RobotConnectionHandle {
    pub identity: HandleIdentity,
    /// Distingue este enlace de sus sucesores tras una supersesión.
    pub connection_uid: Uuid,
    outbound_sender: mpsc::Sender<WireMessage>,
    close_notify: Notify,
    closed: AtomicBool,
    runtime: Mutex<HandleRuntime>,
    /// Tracker de respuestas: id de petición -> futuro del despachador.
    pending_replies: Mutex<HashMap<Uuid, oneshot::Sender<WireMessage>>>,
}

impl RobotConnectionHandle {
    /**
     * Forja un handle fresco junto con el extremo de lectura del canal
     * de salida que consumirá la tarea escritora de la conexión.
     */
    pub fn new(identity: HandleIdentity) -> (Arc<Self>, mpsc::Receiver<WireMessage>) {
        let (outbound_sender, outbound_receiver) = mpsc::channel(OUTBOUND_FRAME_CAPACITY);

        let handle = Arc::new(Self {
            identity,
            connection_uid: Uuid::new_v4(),
            outbound_sender,
            close_notify: Notify::new(),
            closed: AtomicBool::new(false),
            runtime: Mutex::new(HandleRuntime {
                status: RobotStatus::Online,
                lifecycle: HandleLifecycle::Registered,
                last_heartbeat_monotonic: Instant::now(),
                last_heartbeat_label: chrono::Utc::now().to_rfc3339(),
                metrics: ResourceTelemetry::default(),
                reserved_job_ids: HashSet::new(),
                reported_job_ids: Vec::new(),
            }),
            pending_replies: Mutex::new(HashMap::new()),
        });

        (handle, outbound_receiver)
    }

    // --- CAPACIDAD ---

    /**
     * Reserva un slot de ejecución si el invariante de capacidad lo permite.
     */
    pub fn try_reserve_job_slot(&self, job_identifier: &str) -> bool {
        let mut runtime_guard = self.runtime.lock().expect("LOCK_POISONED");
        if runtime_guard.reserved_job_ids.len() as u32 >= self.identity.max_concurrent_jobs {
            return false;
        }
        runtime_guard.reserved_job_ids.insert(job_identifier.to_string())
    }

    pub fn release_job_slot(&self, job_identifier: &str) {
        let mut runtime_guard = self.runtime.lock().expect("LOCK_POISONED");
        runtime_guard.reserved_job_ids.remove(job_identifier);
    }

    pub fn active_job_count(&self) -> usize {
        self.runtime.lock().expect("LOCK_POISONED").reserved_job_ids.len()
    }

    pub fn reserved_job_ids(&self) -> Vec<String> {
        self.runtime
            .lock()
            .expect("LOCK_POISONED")
            .reserved_job_ids
            .iter()
            .cloned()
            .collect()
    }

    // --- BIOMETRÍA ---

    /**
     * Absorbe un latido: actualiza estado, métricas e inventario
     * reportado, y devuelve el pulso normalizado para el Write-Behind.
     */
    pub fn absorb_heartbeat(&self, payload: &HeartbeatPayload) -> RobotPulse {
        let observed_at = chrono::Utc::now().to_rfc3339();
        let mut runtime_guard = self.runtime.lock().expect("LOCK_POISONED");

        runtime_guard.status = RobotStatus::from_label(&payload.status);
        runtime_guard.lifecycle = HandleLifecycle::Active;
        runtime_guard.last_heartbeat_monotonic = Instant::now();
        runtime_guard.last_heartbeat_label = observed_at.clone();
        runtime_guard.metrics = ResourceTelemetry {
            cpu_percent: payload.cpu_percent,
            memory_percent: payload.memory_percent,
            disk_percent: payload.disk_percent,
        };
        runtime_guard.reported_job_ids = payload.active_job_ids.clone();

        RobotPulse {
            robot_id: self.identity.robot_id.clone(),
            status: runtime_guard.status,
            current_jobs: payload.current_jobs,
            metrics: runtime_guard.metrics.clone(),
            active_job_ids: payload.active_job_ids.clone(),
            observed_at,
        }
    }

    pub fn heartbeat_age(&self) -> Duration {
        self.runtime
            .lock()
            .expect("LOCK_POISONED")
            .last_heartbeat_monotonic
            .elapsed()
    }

    pub fn snapshot_status(&self) -> RobotStatus {
        self.runtime.lock().expect("LOCK_POISONED").status
    }

    pub fn lifecycle(&self) -> HandleLifecycle {
        self.runtime.lock().expect("LOCK_POISONED").lifecycle
    }

    pub fn reported_job_ids(&self) -> Vec<String> {
        self.runtime.lock().expect("LOCK_POISONED").reported_job_ids.clone()
    }

    pub fn mark_status(&self, status: RobotStatus) {
        self.runtime.lock().expect("LOCK_POISONED").status = status;
    }

    // --- TRACKER DE RESPUESTAS CORRELACIONADAS ---

    /**
     * Registra un futuro pendiente keyed por el id del mensaje enviado.
     * El llamador acota la espera con su propio timeout.
     */
    pub fn register_pending_reply(&self, message_id: Uuid) -> oneshot::Receiver<WireMessage> {
        let (reply_sender, reply_receiver) = oneshot::channel();
        self.pending_replies
            .lock()
            .expect("LOCK_POISONED")
            .insert(message_id, reply_sender);
        reply_receiver
    }

    /**
     * Completa el futuro cuyo id coincide con el correlation_id recibido.
     *
     * # Returns:
     * `false` si ninguna petición esperaba esta respuesta (se ignora).
     */
    pub fn resolve_pending_reply(&self, correlation_id: &Uuid, message: WireMessage) -> bool {
        let pending_sender = self
            .pending_replies
            .lock()
            .expect("LOCK_POISONED")
            .remove(correlation_id);

        match pending_sender {
            Some(reply_sender) => reply_sender.send(message).is_ok(),
            None => {
                debug!("❔ [TRACKER]: Uncorrelated reply {} ignored.", correlation_id);
                false
            }
        }
    }

    /// Abandona un futuro registrado cuyo envío falló antes de viajar.
    pub fn abandon_pending_reply(&self, message_id: &Uuid) {
        self.pending_replies
            .lock()
            .expect("LOCK_POISONED")
            .remove(message_id);
    }

    /**
     * Falla todo futuro pendiente (desconexión o supersesión).
     * Los lados receptores observan un RecvError reintentable.
     */
    pub fn fail_all_pending(&self) {
        let mut pending_guard = self.pending_replies.lock().expect("LOCK_POISONED");
        let abandoned_count = pending_guard.len();
        pending_guard.clear();

        if abandoned_count > 0 {
            warn!("⚠️ [TRACKER]: {} pending replies failed for unit {}.",
                abandoned_count, self.identity.robot_id);
        }
    }

    // --- CICLO DE VIDA ---

    /// Solicita el colapso ordenado de las tareas de la conexión.
    pub fn request_close(&self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            self.runtime.lock().expect("LOCK_POISONED").lifecycle = HandleLifecycle::Closed;
            self.close_notify.notify_waiters();
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Señal de cierre para las tareas lectora/escritora/vigilante.
    pub async fn wait_close_signal(&self) {
        self.close_notify.notified().await
    }

    /**
     * Encola una trama hacia la tarea escritora de la conexión.
     */
    pub async fn send_frame(&self, message: WireMessage) -> Result<(), ()> {
        if self.is_closed() {
            return Err(());
        }
        self.outbound_sender.send(message).await.map_err(|_| ())
    }
}

/// Instantánea de elegibilidad usada por el ciclo de despacho.
pub struct DispatchCandidate {
    pub robot_id: String,
    pub active_jobs: usize,
    pub heartbeat_age: Duration,
    pub handle: Arc<RobotConnectionHandle>,
}

/**
 * Autoridad única del mapa de conexiones vivas de la flota.
 */
pub struct FleetRegistryManager {
    live_handles: RwLock<HashMap<String, Arc<RobotConnectionHandle>>>,
}

impl Default for FleetRegistryManager {
    fn default() -> Self {
        Self::new()
    }
}

impl FleetRegistryManager {
    pub fn new() -> Self {
        Self {
            live_handles: RwLock::new(HashMap::new()),
        }
    }

    /**
     * Registra un handle fresco. Si la unidad ya tenía un enlace vivo,
     * el anterior es devuelto para su supersesión: el llamador debe
     * fallar sus futuros y cerrar su socket.
     */
    pub fn register_connection(
        &self,
        handle: Arc<RobotConnectionHandle>,
    ) -> Option<Arc<RobotConnectionHandle>> {
        let mut map_guard = self.live_handles.write().expect("LOCK_POISONED");
        let superseded = map_guard.insert(handle.identity.robot_id.clone(), handle);

        if superseded.is_some() {
            info!("♻️ [REGISTRY]: Prior link superseded by fresh registration.");
        }
        superseded
    }

    /**
     * Retira un handle del mapa solo si sigue siendo el enlace vigente.
     * Un handle superseded no puede arrastrar a su sucesor.
     */
    pub fn remove_connection(&self, robot_id: &str, connection_uid: Uuid) -> bool {
        let mut map_guard = self.live_handles.write().expect("LOCK_POISONED");
        match map_guard.get(robot_id) {
            Some(current) if current.connection_uid == connection_uid => {
                map_guard.remove(robot_id);
                true
            }
            _ => false,
        }
    }

    pub fn lookup(&self, robot_id: &str) -> Option<Arc<RobotConnectionHandle>> {
        self.live_handles
            .read()
            .expect("LOCK_POISONED")
            .get(robot_id)
            .cloned()
    }

    pub fn connected_count(&self) -> usize {
        self.live_handles.read().expect("LOCK_POISONED").len()
    }

    pub fn snapshot_handles(&self) -> Vec<Arc<RobotConnectionHandle>> {
        self.live_handles
            .read()
            .expect("LOCK_POISONED")
            .values()
            .cloned()
            .collect()
    }

    /**
     * Instantánea de unidades elegibles para una misión concreta:
     * online, con capacidad libre, capacidades requeridas cubiertas,
     * afinidad dura respetada y sin penalización vigente.
     */
    pub fn eligible_candidates(
        &self,
        required_capabilities: &[String],
        requested_robot_id: Option<&str>,
        penalized_units: &HashSet<String>,
    ) -> Vec<DispatchCandidate> {
        let handles_snapshot = self.snapshot_handles();
        let mut candidates = Vec::new();

        for handle in handles_snapshot {
            if handle.is_closed() {
                continue;
            }
            if penalized_units.contains(&handle.identity.robot_id) {
                continue;
            }
            if let Some(requested) = requested_robot_id {
                if requested != handle.identity.robot_id {
                    continue;
                }
            }

            let (status, active_jobs, heartbeat_age) = {
                let runtime_guard = handle.runtime.lock().expect("LOCK_POISONED");
                (
                    runtime_guard.status,
                    runtime_guard.reserved_job_ids.len(),
                    runtime_guard.last_heartbeat_monotonic.elapsed(),
                )
            };

            if status != RobotStatus::Online {
                continue;
            }
            if active_jobs as u32 >= handle.identity.max_concurrent_jobs {
                continue;
            }
            if !required_capabilities
                .iter()
                .all(|capability| handle.identity.capabilities.contains(capability))
            {
                continue;
            }

            candidates.push(DispatchCandidate {
                robot_id: handle.identity.robot_id.clone(),
                active_jobs,
                heartbeat_age,
                handle,
            });
        }

        candidates
    }

    /// Handles cuyo latido superó la ventana de expiración.
    pub fn collect_stale(&self, heartbeat_timeout: Duration) -> Vec<Arc<RobotConnectionHandle>> {
        self.snapshot_handles()
            .into_iter()
            .filter(|handle| !handle.is_closed() && handle.heartbeat_age() > heartbeat_timeout)
            .collect()
    }

    /**
     * Cierre global ordenado (apagado del proceso): todo futuro se
     * falla y todo socket recibe su señal de colapso.
     */
    pub fn close_all(&self, reason: &str) {
        let drained_handles: Vec<Arc<RobotConnectionHandle>> = {
            let mut map_guard = self.live_handles.write().expect("LOCK_POISONED");
            map_guard.drain().map(|(_, handle)| handle).collect()
        };

        info!("💀 [REGISTRY]: Closing {} live links ({}).", drained_handles.len(), reason);
        for handle in drained_handles {
            handle.fail_all_pending();
            handle.request_close();
        }
    }
}
