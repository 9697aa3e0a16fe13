// [apps/orchestrator/src/services/dispatcher.rs]
/*!
 * =================================================================
 * APARATO: JOB DISPATCH SERVICE (V4.7 - MATCHMAKING AUTHORITY)
 * CLASIFICACIÓN: APPLICATION SERVICES (ESTRATO L4)
 * RESPONSABILIDAD: EMPAREJAMIENTO MISIÓN <-> UNIDAD BAJO CONTRATO
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. SERIALIZED CLAIM: El candado pending -> assigned vive en el
 *    predicado SQL del Ledger; la reserva de capacidad vive en el
 *    mutex del handle. Jamás se retiene un cerrojo de handle a través
 *    de una llamada al Ledger.
 * 2. CORRELATED HANDSHAKE: Cada 'job_assign' registra un futuro en el
 *    tracker del handle; un vigilante desacoplado resuelve aceptación,
 *    rechazo o timeout sin estancar el ciclo de despacho.
 * 3. STARVATION SHIELD: Una misión rechazada por toda unidad elegible
 *    en una ronda queda en backoff exponencial; una unidad que agota
 *    el timeout de respuesta queda penalizada un ciclo como 'error'.
 * 4. WAKE DISCIPLINE: El bucle duerme con backoff acotado (2s) y
 *    despierta ante encolados y cambios de capacidad.
 *
 * # Mathematical Proof (Ordering Guarantee):
 * Para (prioridad, tenant) fijos el orden de despacho es FIFO por
 * created_at; entre prioridades la mayor gana siempre el siguiente
 * slot. No existe guardia de inanición entre prioridades.
 * =================================================================
 */

use crate::state::fleet_registry::{DispatchCandidate, RobotConnectionHandle};
use crate::state::AppState;
use fabrica_domain_models::job::{JobRecord, JobStatus};
use fabrica_domain_models::robot::RobotStatus;
use fabrica_infra_db::DbError;
use fabrica_infra_protocol::{JobAssignPayload, MessageBody, WireMessage};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing::{debug, info, instrument, warn};

/// Backoff mínimo del bucle ante un ciclo sin colocaciones.
const IDLE_BACKOFF_FLOOR_MS: u64 = 50;
/// Techo del backoff de una misión rechazada por toda la flota elegible.
const REJECTION_BACKOFF_CAP_SECONDS: u64 = 60;

/// Rastro anti-inanición de una misión rechazada.
struct RejectionLedgerEntry {
    /// Unidades que rechazaron la misión en la ronda vigente.
    rejected_by: HashSet<String>,
    /// Rondas consecutivas en las que toda la flota elegible rechazó.
    consecutive_rounds: u32,
    /// Instante a partir del cual la misión vuelve a ser candidata.
    next_eligible: Option<Instant>,
}

/// Veredicto del cierre de una cancelación solicitada por el operador.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancellationOutcome {
    /// La misión estaba 'pending' y se selló directamente.
    CancelledDirect,
    /// La misión estaba en vuelo; se envió 'job_cancel' y un vigilante
    /// sellará el estado al recibir el acuse o agotar el timeout.
    CancelRequested,
    /// La misión ya estaba en un estado absorbente.
    AlreadyTerminal,
}

pub struct JobDispatchService {
    state: AppState,
    rejection_ledger: Mutex<HashMap<String, RejectionLedgerEntry>>,
    /// Penalizaciones de un ciclo por timeout de respuesta: unidad -> hasta.
    unit_penalties: Mutex<HashMap<String, Instant>>,
}

impl JobDispatchService {
    pub fn new(state: AppState) -> Arc<Self> {
        Arc::new(Self {
            state,
            rejection_ledger: Mutex::new(HashMap::new()),
            unit_penalties: Mutex::new(HashMap::new()),
        })
    }

    /**
     * Lanza el daemon de despacho perpetuo en el runtime de Tokio.
     */
    pub fn spawn_dispatch_daemon(self: &Arc<Self>) {
        let service = Arc::clone(self);
        tokio::spawn(async move {
            info!("🧠 [DISPATCH_DAEMON]: Matchmaking engine V4.7 operational.");
            let backoff_ceiling =
                Duration::from_millis(service.state.config.dispatch_idle_backoff_cap_ms.max(100));
            let mut idle_backoff = Duration::from_millis(IDLE_BACKOFF_FLOOR_MS);

            loop {
                let placed_count = service.execute_dispatch_cycle().await;

                if placed_count > 0 {
                    idle_backoff = Duration::from_millis(IDLE_BACKOFF_FLOOR_MS);
                    continue;
                }

                // Sin colocaciones: dormir con backoff, despertar ante señal.
                tokio::select! {
                    _ = service.state.dispatch_notifier.notified() => {
                        idle_backoff = Duration::from_millis(IDLE_BACKOFF_FLOOR_MS);
                    }
                    _ = tokio::time::sleep(idle_backoff) => {
                        idle_backoff = (idle_backoff * 2).min(backoff_ceiling);
                    }
                }
            }
        });
    }

    /**
     * Un ciclo de emparejamiento: lote de candidatas contra la
     * instantánea del registro. Devuelve el número de misiones enviadas.
     */
    pub async fn execute_dispatch_cycle(self: &Arc<Self>) -> usize {
        let candidate_batch = match self
            .state
            .job_repository
            .fetch_pending_batch(self.state.config.dispatch_batch_size)
            .await
        {
            Ok(batch) => batch,
            Err(ledger_fault) => {
                warn!("⚠️ [DISPATCH]: Pending batch unavailable: {}", ledger_fault);
                return 0;
            }
        };

        if candidate_batch.is_empty() {
            return 0;
        }

        let penalized_units = self.sweep_active_penalties();
        let mut placed_count = 0;

        for job in &candidate_batch {
            if self.rejection_backoff_active(&job.job_id) {
                continue;
            }

            match self.attempt_placement(job, &penalized_units).await {
                PlacementVerdict::Dispatched => placed_count += 1,
                PlacementVerdict::NoEligibleUnit => continue,
                PlacementVerdict::ClaimLost => continue,
                PlacementVerdict::LedgerUnavailable => break,
            }
        }

        placed_count
    }

    /**
     * Intenta colocar una misión: elegibilidad, candado, reserva, envío.
     */
    #[instrument(skip(self, job, penalized_units), fields(job = %job.job_id))]
    async fn attempt_placement(
        self: &Arc<Self>,
        job: &JobRecord,
        penalized_units: &HashSet<String>,
    ) -> PlacementVerdict {
        let all_candidates = self.state.fleet_registry.eligible_candidates(
            &job.required_capabilities,
            job.requested_robot_id.as_deref(),
            penalized_units,
        );

        if all_candidates.is_empty() {
            return PlacementVerdict::NoEligibleUnit;
        }

        // Filtrado anti-tormenta: descartar unidades que ya rechazaron
        // esta misión en la ronda vigente.
        let rejected_units = self.rejected_units_for(&job.job_id);
        let viable_candidates: Vec<DispatchCandidate> = all_candidates
            .into_iter()
            .filter(|candidate| !rejected_units.contains(&candidate.robot_id))
            .collect();

        if viable_candidates.is_empty() {
            // Toda la flota elegible rechazó: escalar el backoff.
            self.escalate_rejection_round(&job.job_id);
            return PlacementVerdict::NoEligibleUnit;
        }

        let profiles: Vec<CandidateProfile> = viable_candidates
            .iter()
            .map(|candidate| CandidateProfile {
                robot_id: candidate.robot_id.clone(),
                active_jobs: candidate.active_jobs,
                heartbeat_age_ms: candidate.heartbeat_age.as_millis(),
            })
            .collect();

        let chosen_index = match select_candidate_index(&profiles) {
            Some(index) => index,
            None => return PlacementVerdict::NoEligibleUnit,
        };
        let chosen = &viable_candidates[chosen_index];

        // 1. Candado atómico en el Ledger (sección crítica serializada).
        match self
            .state
            .job_repository
            .claim_pending_job(&job.job_id, &chosen.robot_id)
            .await
        {
            Ok(()) => {}
            Err(DbError::Unavailable(transient_fault)) => {
                warn!("⚠️ [DISPATCH]: Ledger unavailable claiming {}: {}",
                    job.job_id, transient_fault);
                return PlacementVerdict::LedgerUnavailable;
            }
            Err(claim_fault) => {
                debug!("🔒 [DISPATCH]: Claim lost for {}: {}", job.job_id, claim_fault);
                return PlacementVerdict::ClaimLost;
            }
        }

        // 2. Reserva de capacidad en RAM (fuera de la transacción).
        if !chosen.handle.try_reserve_job_slot(&job.job_id) {
            let _ = self.state.job_repository.release_job(&job.job_id).await;
            return PlacementVerdict::ClaimLost;
        }

        // 3. Envío con futuro correlacionado y vigilante desacoplado.
        let assignment = WireMessage::fresh(MessageBody::JobAssign(JobAssignPayload {
            job_id: job.job_id.clone(),
            workflow_id: job.job_id.clone(),
            workflow_name: job.workflow_name.clone(),
            workflow_json: job.workflow_payload.clone(),
            priority: job.priority.as_label().to_string(),
            timeout_seconds: job.timeout_seconds,
            parameters: job.parameters.clone(),
        }));

        let reply_receiver = chosen.handle.register_pending_reply(assignment.message_id);
        let assignment_id = assignment.message_id;

        if chosen.handle.send_frame(assignment).await.is_err() {
            chosen.handle.abandon_pending_reply(&assignment_id);
            chosen.handle.release_job_slot(&job.job_id);
            let _ = self.state.job_repository.release_job(&job.job_id).await;
            return PlacementVerdict::ClaimLost;
        }

        info!("🚀 [DISPATCH]: Mission {} in flight towards unit {}.", job.job_id, chosen.robot_id);
        self.spawn_reply_watcher(job.job_id.clone(), Arc::clone(&chosen.handle), reply_receiver);

        PlacementVerdict::Dispatched
    }

    /**
     * Vigilante del handshake: resuelve aceptación, rechazo o timeout
     * sin estancar el ciclo de despacho.
     */
    fn spawn_reply_watcher(
        self: &Arc<Self>,
        job_identifier: String,
        handle: Arc<RobotConnectionHandle>,
        reply_receiver: tokio::sync::oneshot::Receiver<WireMessage>,
    ) {
        let service = Arc::clone(self);

        tokio::spawn(async move {
            let reply_window = Duration::from_secs(service.state.config.reply_timeout_seconds);
            let robot_identifier = handle.identity.robot_id.clone();

            match tokio::time::timeout(reply_window, reply_receiver).await {
                Ok(Ok(reply)) => match reply.body {
                    MessageBody::JobAccept { .. } => {
                        service.clear_rejection_trail(&job_identifier);
                        let _ = service
                            .state
                            .audit_repository
                            .append("job_accepted", &job_identifier, &robot_identifier, "")
                            .await;
                        service
                            .state
                            .event_bus
                            .emit_job_assigned(&job_identifier, &robot_identifier);
                    }
                    MessageBody::JobReject { reason, .. } => {
                        warn!("🚫 [DISPATCH]: Unit {} rejected mission {}: {}",
                            robot_identifier, job_identifier, reason);
                        service
                            .surrender_placement(&job_identifier, &handle)
                            .await;
                        service.note_unit_rejection(&job_identifier, &robot_identifier);
                        let _ = service.state.job_repository.record_rejection(&job_identifier).await;
                        let _ = service
                            .state
                            .audit_repository
                            .append("job_rejected", &job_identifier, &robot_identifier, &reason)
                            .await;
                        service.state.wake_dispatcher();
                    }
                    other => {
                        warn!("❔ [DISPATCH]: Malformed handshake reply '{}' for {}.",
                            other.type_label(), job_identifier);
                        service.surrender_placement(&job_identifier, &handle).await;
                        service.state.wake_dispatcher();
                    }
                },
                // Futuro fallado (desconexión) o ventana agotada: misma ruta,
                // con penalización de un ciclo para la unidad.
                Ok(Err(_)) | Err(_) => {
                    warn!("⏱️ [DISPATCH]: Assignment handshake for {} expired on unit {}.",
                        job_identifier, robot_identifier);
                    service.surrender_placement(&job_identifier, &handle).await;
                    service.penalize_unit(&robot_identifier);
                    handle.mark_status(RobotStatus::Error);
                    let _ = service
                        .state
                        .audit_repository
                        .append("job_assign_timeout", &job_identifier, &robot_identifier, "")
                        .await;
                    service.state.wake_dispatcher();
                }
            }
        });
    }

    /// Devuelve capacidad y candado tras un handshake fallido.
    async fn surrender_placement(&self, job_identifier: &str, handle: &Arc<RobotConnectionHandle>) {
        handle.release_job_slot(job_identifier);
        let _ = self.state.job_repository.release_job(job_identifier).await;
    }

    // --- LEDGER ANTI-INANICIÓN ---

    fn rejected_units_for(&self, job_identifier: &str) -> HashSet<String> {
        self.rejection_ledger
            .lock()
            .expect("LOCK_POISONED")
            .get(job_identifier)
            .map(|entry| entry.rejected_by.clone())
            .unwrap_or_default()
    }

    fn note_unit_rejection(&self, job_identifier: &str, robot_identifier: &str) {
        let mut ledger_guard = self.rejection_ledger.lock().expect("LOCK_POISONED");
        let entry = ledger_guard
            .entry(job_identifier.to_string())
            .or_insert_with(|| RejectionLedgerEntry {
                rejected_by: HashSet::new(),
                consecutive_rounds: 0,
                next_eligible: None,
            });
        entry.rejected_by.insert(robot_identifier.to_string());
    }

    fn escalate_rejection_round(&self, job_identifier: &str) {
        let mut ledger_guard = self.rejection_ledger.lock().expect("LOCK_POISONED");
        if let Some(entry) = ledger_guard.get_mut(job_identifier) {
            entry.consecutive_rounds += 1;
            let backoff_seconds =
                (1u64 << entry.consecutive_rounds.min(6)).min(REJECTION_BACKOFF_CAP_SECONDS);
            entry.next_eligible = Some(Instant::now() + Duration::from_secs(backoff_seconds));
            entry.rejected_by.clear();

            debug!("🛡️ [STARVATION_SHIELD]: Mission {} held for {}s (round {}).",
                job_identifier, backoff_seconds, entry.consecutive_rounds);
        }
    }

    fn rejection_backoff_active(&self, job_identifier: &str) -> bool {
        self.rejection_ledger
            .lock()
            .expect("LOCK_POISONED")
            .get(job_identifier)
            .and_then(|entry| entry.next_eligible)
            .map(|eligible_at| eligible_at > Instant::now())
            .unwrap_or(false)
    }

    fn clear_rejection_trail(&self, job_identifier: &str) {
        self.rejection_ledger
            .lock()
            .expect("LOCK_POISONED")
            .remove(job_identifier);
    }

    // --- PENALIZACIONES DE UNIDAD ---

    fn penalize_unit(&self, robot_identifier: &str) {
        let penalty_window =
            Duration::from_secs(self.state.config.dispatch_error_penalty_seconds.max(1));
        self.unit_penalties
            .lock()
            .expect("LOCK_POISONED")
            .insert(robot_identifier.to_string(), Instant::now() + penalty_window);
    }

    fn sweep_active_penalties(&self) -> HashSet<String> {
        let now = Instant::now();
        let mut penalties_guard = self.unit_penalties.lock().expect("LOCK_POISONED");
        penalties_guard.retain(|_, until| *until > now);
        penalties_guard.keys().cloned().collect()
    }

    // --- CANCELACIÓN ---

    /**
     * Ejecuta la cancelación solicitada por el operador.
     *
     * Pending -> sellado directo. En vuelo -> 'job_cancel' correlacionado;
     * el sellado ocurre al recibir el acuse o, en su defecto, al agotar
     * la ventana (nota de auditoría 'cancel_ack_missing').
     */
    #[instrument(skip(state), fields(job = %job_identifier))]
    pub async fn execute_cancellation(
        state: &AppState,
        job_identifier: &str,
    ) -> Result<CancellationOutcome, DbError> {
        let job = state.job_repository.get_job(job_identifier).await?;

        if job.status.is_terminal() {
            return Ok(CancellationOutcome::AlreadyTerminal);
        }

        // Ruta directa: la misión aún no fue despachada.
        if job.status == JobStatus::Pending
            && state.job_repository.cancel_pending(job_identifier).await?
        {
            let _ = state
                .audit_repository
                .append("job_cancelled", job_identifier, "operator", "cancelled while pending")
                .await;
            state.event_bus.emit_job_terminal(
                job_identifier,
                job.assigned_robot_id.as_deref().unwrap_or(""),
                JobStatus::Cancelled,
                "cancelled before dispatch",
            );
            return Ok(CancellationOutcome::CancelledDirect);
        }

        // Ruta en vuelo: localizar a la unidad propietaria.
        let owning_robot = match &job.assigned_robot_id {
            Some(robot_identifier) => robot_identifier.clone(),
            None => {
                // Carrera con el despachador: reintentar la ruta directa.
                if state.job_repository.cancel_pending(job_identifier).await? {
                    return Ok(CancellationOutcome::CancelledDirect);
                }
                return Err(DbError::InvalidState);
            }
        };

        let handle = state.fleet_registry.lookup(&owning_robot);

        match handle {
            Some(handle) if !handle.is_closed() => {
                let cancel_message = WireMessage::fresh(MessageBody::JobCancel {
                    job_id: job_identifier.to_string(),
                    reason: "cancelled by operator".to_string(),
                });
                let reply_receiver = handle.register_pending_reply(cancel_message.message_id);
                let cancel_id = cancel_message.message_id;

                if handle.send_frame(cancel_message).await.is_err() {
                    handle.abandon_pending_reply(&cancel_id);
                    return seal_cancellation(state, job_identifier, &owning_robot, false).await;
                }

                // Vigilante de acuse: el handler HTTP responde de inmediato.
                let watcher_state = state.clone();
                let watcher_job = job_identifier.to_string();
                let watcher_handle = handle;
                tokio::spawn(async move {
                    let reply_window =
                        Duration::from_secs(watcher_state.config.reply_timeout_seconds);
                    let acknowledged = matches!(
                        tokio::time::timeout(reply_window, reply_receiver).await,
                        Ok(Ok(WireMessage { body: MessageBody::JobCancelled { .. }, .. }))
                    );

                    watcher_handle.release_job_slot(&watcher_job);
                    let _ = seal_cancellation(
                        &watcher_state,
                        &watcher_job,
                        &watcher_handle.identity.robot_id,
                        acknowledged,
                    )
                    .await;
                    watcher_state.wake_dispatcher();
                });

                Ok(CancellationOutcome::CancelRequested)
            }
            // La unidad está desconectada: sellado best-effort inmediato.
            _ => seal_cancellation(state, job_identifier, &owning_robot, false).await,
        }
    }
}

/// Sella la cancelación y deja el rastro de auditoría correspondiente.
async fn seal_cancellation(
    state: &AppState,
    job_identifier: &str,
    robot_identifier: &str,
    acknowledged: bool,
) -> Result<CancellationOutcome, DbError> {
    let advanced = state
        .job_repository
        .record_terminal(
            job_identifier,
            JobStatus::Cancelled,
            None,
            Some("cancelled by operator".to_string()),
        )
        .await?;

    if advanced {
        let audit_note = if acknowledged { "acknowledged" } else { "cancel_ack_missing" };
        let _ = state
            .audit_repository
            .append("job_cancelled", job_identifier, robot_identifier, audit_note)
            .await;
        state.event_bus.emit_job_terminal(
            job_identifier,
            robot_identifier,
            JobStatus::Cancelled,
            audit_note,
        );
    }

    Ok(CancellationOutcome::CancelledDirect)
}

// --- SELECCIÓN PURA DE CANDIDATAS ---

/// Perfil mínimo de una candidata para el desempate determinista.
#[derive(Debug, Clone)]
pub struct CandidateProfile {
    pub robot_id: String,
    pub active_jobs: usize,
    pub heartbeat_age_ms: u128,
}

/**
 * Desempate del despachador: menos misiones en vuelo, latido más
 * reciente, y orden estable por robot_id.
 */
pub fn select_candidate_index(profiles: &[CandidateProfile]) -> Option<usize> {
    if profiles.is_empty() {
        return None;
    }

    let mut best_index = 0;
    for current_index in 1..profiles.len() {
        let best = &profiles[best_index];
        let current = &profiles[current_index];

        let current_wins = match current.active_jobs.cmp(&best.active_jobs) {
            std::cmp::Ordering::Less => true,
            std::cmp::Ordering::Greater => false,
            std::cmp::Ordering::Equal => match current.heartbeat_age_ms.cmp(&best.heartbeat_age_ms)
            {
                std::cmp::Ordering::Less => true,
                std::cmp::Ordering::Greater => false,
                std::cmp::Ordering::Equal => current.robot_id < best.robot_id,
            },
        };

        if current_wins {
            best_index = current_index;
        }
    }

    Some(best_index)
}

enum PlacementVerdict {
    Dispatched,
    NoEligibleUnit,
    ClaimLost,
    LedgerUnavailable,
}
