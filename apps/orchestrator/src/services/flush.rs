// [apps/orchestrator/src/services/flush.rs]
/*!
 * =================================================================
 * APARATO: HEARTBEAT PERSISTENCE FLUSH DAEMON (V4.2 - WRITE BEHIND)
 * CLASIFICACIÓN: BACKGROUND INFRASTRUCTURE SERVICE (ESTRATO L4)
 * RESPONSABILIDAD: CRISTALIZACIÓN DE LATIDOS EN EL LEDGER DE FLOTA
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. ATOMIC DRAIN: Patrón 'Take & Clear' para minimizar el tiempo de
 *    bloqueo del Mutex sobre el buffer de latidos.
 * 2. SAMPLING POLICY: Solo el pulso más reciente por unidad sobrevive
 *    al intervalo; la biometría por-latido vive únicamente en RAM.
 *
 * # Mathematical Proof (Write-Behind Efficiency):
 * Al diferir la escritura de latidos individuales hacia ráfagas de
 * lote cada 5s, la contención de I/O sobre el motor se reduce en un
 * factor de N:1, donde N es el número de latidos del intervalo.
 * =================================================================
 */

use crate::state::AppState;
use fabrica_domain_models::robot::RobotPulse;
use std::time::Duration;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info, instrument};

/// Intervalo nominal de sincronización con el Ledger (5 segundos).
const PERSISTENCE_SYNC_INTERVAL_SECONDS: u64 = 5;

/**
 * Lanza el servicio de persistencia asíncrona en el reactor de Tokio.
 *
 * # Logic:
 * Bucle infinito que monitoriza el buffer de RAM. Si detecta actividad,
 * drena los datos y ejecuta una transacción masiva en el motor.
 *
 * @param application_state Referencia compartida al estado neural.
 */
#[instrument(skip(application_state))]
pub async fn spawn_flush_service(application_state: AppState) {
    let mut synchronization_timer =
        interval(Duration::from_secs(PERSISTENCE_SYNC_INTERVAL_SECONDS));

    // Ignorar ticks perdidos ante congestión de CPU, priorizando la
    // frescura de los datos sobre la cantidad de ejecuciones.
    synchronization_timer.set_missed_tick_behavior(MissedTickBehavior::Skip);

    tokio::spawn(async move {
        info!("💾 [FLUSH_DAEMON]: Heartbeat persistence engine V4.2 operational.");

        loop {
            synchronization_timer.tick().await;

            // --- FASE 1: DRENAJE ATÓMICO (MEMORY STRATA) ---
            let pending_updates_collection: Vec<RobotPulse> = {
                match application_state.heartbeat_buffer.lock() {
                    Ok(mut buffer_exclusive_guard) => {
                        if buffer_exclusive_guard.is_empty() {
                            continue;
                        }
                        buffer_exclusive_guard
                            .drain()
                            .map(|(_, pulse)| pulse)
                            .collect()
                    }
                    Err(lock_poison_fault) => {
                        error!("❌ [FLUSH_CRITICAL_FAULT]: Heartbeat buffer lock poisoned: {}",
                            lock_poison_fault);
                        break;
                    }
                }
            };

            let pending_records_volume = pending_updates_collection.len();
            debug!("💾 [FLUSH_EXECUTION]: Initiating burst for {} unit pulses...",
                pending_records_volume);

            // --- FASE 2: CRISTALIZACIÓN (IO STRATA) ---
            match application_state
                .robot_repository
                .upsert_pulse_bulk(pending_updates_collection)
                .await
            {
                Ok(crystallized_records_count) => {
                    if crystallized_records_count > 0 {
                        debug!("✅ [FLUSH_SUCCESS]: {} records secured in Fleet Ledger.",
                            crystallized_records_count);
                    }
                }
                Err(persistence_fault) => {
                    error!("⚠️  [FLUSH_REJECTED]: Strata synchronization failed: {}. Potential signal loss.",
                        persistence_fault);
                }
            }
        }
    });
}
