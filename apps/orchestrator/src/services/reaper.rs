// [apps/orchestrator/src/services/reaper.rs]
/**
 * =================================================================
 * APARATO: THE REAPER SYSTEM SERVICE (V4.5 - LIVENESS SWEEPER)
 * CLASIFICACIÓN: BACKGROUND INFRASTRUCTURE (ESTRATO L4)
 * RESPONSABILIDAD: EXPIRACIÓN DE LATIDOS Y CONCILIACIÓN DEL LEDGER
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. HALF-INTERVAL SCAN: El barrido corre cada media ventana de
 *    expiración; un enlace sin latido dentro de la ventana colapsa,
 *    sus futuros fallan y sus misiones vuelven a la cola.
 * 2. LEDGER RECONCILIATION: Filas 'online' sin enlace vivo se marcan
 *    'offline' y sus misiones huérfanas se liberan; misiones que la
 *    unidad dejó de reportar pasada la gracia también se liberan.
 * 3. PASSIVE TIMEOUT: Las misiones que exceden su ventana de ejecución
 *    se sellan 'timed_out'; el orquestador no mata ejecuciones remotas
 *    salvo que el modo de cancelación activa esté configurado.
 * 4. RESILIENCE: El daemon registra y continúa; jamás termina el
 *    proceso por un fallo individual.
 * =================================================================
 */

use crate::state::AppState;
use fabrica_domain_models::job::JobStatus;
use fabrica_infra_protocol::{MessageBody, WireMessage};
use std::time::Duration;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

/**
 * Inicia el servicio de barrido perpetuo en el runtime de Tokio.
 *
 * @param application_state Referencia al estado neural inyectado.
 */
pub async fn spawn_reaper(application_state: AppState) {
    let heartbeat_timeout =
        Duration::from_secs(application_state.config.heartbeat_timeout_seconds.max(2));
    let mut sweep_ticker = interval(heartbeat_timeout / 2);
    sweep_ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    tokio::spawn(async move {
        info!("💀 [REAPER_ACTIVE]: Liveness sweeper armed (window {}s).",
            heartbeat_timeout.as_secs());

        loop {
            sweep_ticker.tick().await;
            execute_sweep_cycle(&application_state, heartbeat_timeout).await;
        }
    });
}

/**
 * Un barrido completo: purga de enlaces expirados, conciliación del
 * Ledger, reparación de inventario y vencimiento pasivo. Expuesto
 * para los aparatos de prueba del espejo.
 */
pub async fn execute_sweep_cycle(application_state: &AppState, heartbeat_timeout: Duration) {
    let mut capacity_released = false;

    // 1. PURGA DE ENLACES EXPIRADOS (RAM Stratum)
    // El colapso de cada enlace dispara su limpieza en el handler de
    // conexión: offline en el Ledger, futuros fallados, misiones sueltas.
    let stale_handles = application_state.fleet_registry.collect_stale(heartbeat_timeout);
    for stale_handle in stale_handles {
        warn!("💀 [REAPER_SWARM]: Unit {} heartbeat expired. Severing link.",
            stale_handle.identity.robot_id);
        stale_handle.fail_all_pending();
        stale_handle.request_close();
        capacity_released = true;
    }

    // 2. CONCILIACIÓN DE FILAS SIN ENLACE (Ledger Stratum)
    // Cubre el colapso del proceso y las conexiones jamás reconstruidas.
    match application_state
        .robot_repository
        .mark_offline_stale(heartbeat_timeout.as_secs() as i64)
        .await
    {
        Ok(stale_units) => {
            for stale_unit in stale_units {
                if application_state.fleet_registry.lookup(&stale_unit).is_some() {
                    continue;
                }
                application_state
                    .event_bus
                    .emit_robot_status(&stale_unit, fabrica_domain_models::robot::RobotStatus::Offline);

                match application_state
                    .job_repository
                    .release_jobs_for_robot(&stale_unit)
                    .await
                {
                    Ok(released_missions) if !released_missions.is_empty() => {
                        capacity_released = true;
                        for mission in released_missions {
                            let _ = application_state
                                .audit_repository
                                .append("job_released", &mission, "reaper", "owning unit offline")
                                .await;
                        }
                    }
                    Ok(_) => {}
                    Err(release_fault) => {
                        warn!("⚠️ [REAPER]: Orphan release for {} failed: {}",
                            stale_unit, release_fault);
                    }
                }
            }
        }
        Err(sweep_fault) => {
            warn!("⚠️ [REAPER]: Stale unit sweep incomplete: {}", sweep_fault);
        }
    }

    // 3. CONCILIACIÓN DE INVENTARIO REPORTADO (Heartbeat vs Ledger)
    // Una misión que el Ledger cree en vuelo pero que la unidad dejó de
    // reportar pasada la gracia vuelve a la cola (escenario reconexión);
    // tras la liberación, la fila de la unidad se repara para reflejar
    // el inventario superviviente del Ledger.
    for handle in application_state.fleet_registry.snapshot_handles() {
        if handle.is_closed() {
            continue;
        }
        let robot_identifier = handle.identity.robot_id.clone();

        // Mitad Ledger del invariante: misiones en vuelo según las tablas.
        let ledger_active_inventory = match application_state
            .job_repository
            .active_job_ids_for_robot(&robot_identifier)
            .await
        {
            Ok(missions) => missions,
            Err(reconcile_fault) => {
                debug!("⚠️ [REAPER]: Ledger inventory read failed for {}: {}",
                    robot_identifier, reconcile_fault);
                continue;
            }
        };
        if ledger_active_inventory.is_empty() {
            continue;
        }

        // Solo las asignaciones que superaron la gracia son juzgables.
        let overdue_candidates = match application_state
            .job_repository
            .stale_unreported_jobs(
                &robot_identifier,
                application_state.config.reconcile_grace_seconds,
            )
            .await
        {
            Ok(missions) => missions,
            Err(reconcile_fault) => {
                debug!("⚠️ [REAPER]: Reconciliation read failed for {}: {}",
                    robot_identifier, reconcile_fault);
                continue;
            }
        };

        let reported_inventory = handle.reported_job_ids();
        let mut released_missions: Vec<String> = Vec::new();

        for mission in overdue_candidates {
            if reported_inventory.contains(&mission) {
                continue;
            }
            warn!("♻️ [REAPER_RECONCILE]: Mission {} vanished from unit {} inventory. Requeueing.",
                mission, robot_identifier);
            handle.release_job_slot(&mission);
            if application_state
                .job_repository
                .release_job(&mission)
                .await
                .unwrap_or(false)
            {
                let _ = application_state
                    .audit_repository
                    .append("job_released", &mission, "reaper", "unreported by owning unit")
                    .await;
                released_missions.push(mission);
            }
        }

        if released_missions.is_empty() {
            continue;
        }
        capacity_released = true;

        // Reparación de deriva: la ficha de la unidad vuelve a coincidir
        // con el inventario que el Ledger reconoce tras la purga.
        let surviving_inventory: Vec<String> = ledger_active_inventory
            .into_iter()
            .filter(|mission| !released_missions.contains(mission))
            .collect();

        if let Err(repair_fault) = application_state
            .robot_repository
            .sync_current_jobs(&robot_identifier, &surviving_inventory)
            .await
        {
            warn!("⚠️ [REAPER]: Inventory repair for {} failed: {}",
                robot_identifier, repair_fault);
        }
    }

    // 4. VENCIMIENTO PASIVO DE VENTANAS DE EJECUCIÓN
    match application_state
        .job_repository
        .mark_timed_out_overdue(application_state.config.job_timeout_grace_seconds)
        .await
    {
        Ok(overdue_missions) => {
            for mission in overdue_missions {
                warn!("⏱️ [REAPER_TIMEOUT]: Mission {} exceeded its execution window.", mission);
                let _ = application_state
                    .audit_repository
                    .append("job_timed_out", &mission, "reaper", "")
                    .await;
                application_state.event_bus.emit_job_terminal(
                    &mission,
                    "",
                    JobStatus::TimedOut,
                    "execution window exceeded",
                );

                // Modo activo opcional: ordenar el aborto a la unidad dueña.
                if application_state.config.active_timeout_kill {
                    if let Ok(job) = application_state.job_repository.get_job(&mission).await {
                        if let Some(owner) = job.assigned_robot_id {
                            if let Some(handle) = application_state.fleet_registry.lookup(&owner) {
                                handle.release_job_slot(&mission);
                                let _ = handle
                                    .send_frame(WireMessage::fresh(MessageBody::JobCancel {
                                        job_id: mission.clone(),
                                        reason: "execution window exceeded".to_string(),
                                    }))
                                    .await;
                            }
                        }
                    }
                }
                capacity_released = true;
            }
        }
        Err(timeout_fault) => {
            warn!("⚠️ [REAPER]: Overdue sweep incomplete: {}", timeout_fault);
        }
    }

    if capacity_released {
        application_state.wake_dispatcher();
    }
}
