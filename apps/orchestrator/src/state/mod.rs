// [apps/orchestrator/src/state/mod.rs]
/*!
 * =================================================================
 * APARATO: SOVEREIGN STATE ORCHESTRATOR (V4.3 - FLEET HUB)
 * CLASIFICACIÓN: APPLICATION STATE (ESTRATO L1-APP)
 * RESPONSABILIDAD: ORQUESTACIÓN DE REPOSITORIOS, REGISTRO Y SEÑALES
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. COMPOSITION ROOT: Centraliza el rastro de los repositorios del
 *    Ledger, el registro de conexiones y el bus de eventos; todo viaja
 *    como servicio explícito inyectado, sin estado global de módulo.
 * 2. WRITE-BEHIND: El buffer de latidos protege el motor de ráfagas
 *    de alta frecuencia; el daemon de flush lo cristaliza cada 5s.
 * =================================================================
 */

pub mod fleet_registry;

use crate::bootstrap::OrchestratorConfig;
use crate::services::event_bus::EventBus;
use fabrica_domain_models::robot::RobotPulse;
use fabrica_infra_db::repositories::{
    ApiKeyRepository, AuditRepository, JobRepository, LogRepository, RobotRepository,
};
use fabrica_infra_db::StoreClient;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;
use tracing::{debug, error};

/**
 * Contenedor de estado compartido (Thread-Safe) para el Orquestador.
 * Actúa como la placa base donde se conectan todos los estratos.
 */
#[derive(Clone)]
pub struct AppState {
    /// Cliente táctico hacia el Ledger de flota (libSQL).
    pub database_client: StoreClient,
    /// Configuración inmutable del proceso.
    pub config: Arc<OrchestratorConfig>,
    /// Bus de eventos para la difusión de señales en tiempo real.
    pub event_bus: Arc<EventBus>,
    /// Registro de conexiones vivas: robot_id -> handle.
    pub fleet_registry: Arc<fleet_registry::FleetRegistryManager>,
    /// Señal de despertar del bucle de despacho (encolado, capacidad).
    pub dispatch_notifier: Arc<Notify>,
    /// Buffer de latidos para el protocolo Write-Behind.
    pub heartbeat_buffer: Arc<Mutex<HashMap<String, RobotPulse>>>,

    // --- REPOSITORIOS PRE-HIDRATADOS DEL LEDGER ---
    pub robot_repository: Arc<RobotRepository>,
    pub job_repository: Arc<JobRepository>,
    pub api_key_repository: Arc<ApiKeyRepository>,
    pub log_repository: Arc<LogRepository>,
    pub audit_repository: Arc<AuditRepository>,
}

impl AppState {
    /**
     * Forja una nueva instancia del Estado Maestro inyectando todas
     * las dependencias a partir del cliente táctico.
     */
    pub fn new(database_client: StoreClient, config: OrchestratorConfig) -> Self {
        debug!("🧬 [APP_STATE]: Executing sovereign ignition sequence V4.3...");

        Self {
            database_client: database_client.clone(),
            config: Arc::new(config),
            event_bus: Arc::new(EventBus::new()),
            fleet_registry: Arc::new(fleet_registry::FleetRegistryManager::new()),
            dispatch_notifier: Arc::new(Notify::new()),
            heartbeat_buffer: Arc::new(Mutex::new(HashMap::with_capacity(256))),

            robot_repository: Arc::new(RobotRepository::new(database_client.clone())),
            job_repository: Arc::new(JobRepository::new(database_client.clone())),
            api_key_repository: Arc::new(ApiKeyRepository::new(database_client.clone())),
            log_repository: Arc::new(LogRepository::new(database_client.clone())),
            audit_repository: Arc::new(AuditRepository::new(database_client)),
        }
    }

    /// Despierta al despachador ante un cambio de cola o capacidad.
    pub fn wake_dispatcher(&self) {
        self.dispatch_notifier.notify_one();
    }

    /**
     * Deposita el último pulso de una unidad en el buffer Write-Behind.
     * Solo se retiene el latido más reciente por unidad.
     */
    pub fn buffer_pulse(&self, pulse: RobotPulse) {
        match self.heartbeat_buffer.lock() {
            Ok(mut buffer_guard) => {
                buffer_guard.insert(pulse.robot_id.clone(), pulse);
            }
            Err(lock_poison_fault) => {
                error!("💀 [APP_STATE]: Heartbeat buffer lock poisoned: {}", lock_poison_fault);
            }
        }
    }
}
