// [apps/orchestrator/src/services/mod.rs]
/**
 * =================================================================
 * APARATO: SERVICE ORCHESTRATION HUB (V4.0 - FLEET DAEMONS)
 * CLASIFICACIÓN: APPLICATION SERVICES (ESTRATO L4)
 * RESPONSABILIDAD: EXPOSICIÓN NOMINAL DE DAEMONS Y MOTORES
 *
 * VISION HIPER-HOLÍSTICA:
 * 1. MODULARIDAD: Cada servicio opera como una unidad atómica aislada;
 *    ninguno termina el proceso ante un fallo individual.
 * 2. TYPE SAFETY: Garantiza la visibilidad de los tipos de servicio
 *    para los handlers y los aparatos de prueba del espejo.
 * =================================================================
 */

pub mod dispatcher;
pub mod event_bus;
pub mod event_relay;
pub mod flush;
pub mod reaper;

// --- RE-EXPORTACIONES SOBERANAS (NOMINAL ACCESS) ---

pub use dispatcher::JobDispatchService;
pub use event_bus::EventBus;
pub use event_relay::EventRelayService;
pub use flush::spawn_flush_service;
pub use reaper::spawn_reaper;
