// [apps/orchestrator/src/lib.rs]
/*!
 * =================================================================
 * APARATO: ORCHESTRATOR LIBRARY ROOT (V4.1 - SOVEREIGN AUTHORITY)
 * CLASIFICACIÓN: CRATE ROOT (ESTRATO L3)
 * RESPONSABILIDAD: DEFINICIÓN SUPREMA DEL ÁRBOL DE MÓDULOS
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. MODULE HIERARCHY HARDENING: Autoridad única de módulos para que
 *    'crate::' se resuelva de forma determinista en librería y binario.
 * 2. PUBLIC INTERFACE: Expone 'prelude' para la ignición del Kernel
 *    desde el binario y desde los aparatos de prueba del espejo.
 * =================================================================
 */

// --- ESTRATO DE INFRAESTRUCTURA Y ARRANQUE ---
/// Hidratación de la configuración soberana desde el entorno.
pub mod bootstrap;

// --- ESTRATO DE DATOS Y ESTADO ---
/// Gestor del sistema nervioso central del orquestador.
pub mod state;

// --- ESTRATO DE TRANSPORTE Y ACCIÓN ---
/// Adaptadores de entrada para ráfagas HTTP y WebSockets.
pub mod handlers;
/// Núcleo de mando y control para la ignición de servicios.
pub mod kernel;
/// El túnel de mando: definición de rutas y topología de red.
pub mod routes;

// --- ESTRATO DE SEGURIDAD Y SOPORTE ---
/// Guardianes perimetrales de autenticación y control de tráfico.
pub mod middleware;
/// Daemons de fondo: despachador, relevo de eventos, reaper y flush.
pub mod services;

/**
 * PRELUDIO DEL ORQUESTADOR
 *
 * Re-exportación estratégica de los componentes necesarios para la
 * ignición mínima del sistema.
 */
pub mod prelude {
    pub use crate::bootstrap::OrchestratorConfig;
    pub use crate::kernel::OrchestratorKernel;
    pub use crate::state::AppState;
}
