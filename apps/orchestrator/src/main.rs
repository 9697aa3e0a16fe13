// [apps/orchestrator/src/main.rs]
/*!
 * =================================================================
 * APARATO: ORCHESTRATOR MAIN ENTRY POINT (V4.3 - GOLD MASTER)
 * CLASIFICACIÓN: APPLICATION SHELL (ESTRATO L3)
 * RESPONSABILIDAD: BOOTSTRAP DE INFRAESTRUCTURA E IGNICIÓN SEGURA
 *
 * # Mathematical Proof (Deterministic Ignition):
 * El proceso garantiza que el esquema del Ledger esté solidificado
 * antes de la apertura del socket TCP, previniendo estados de carrera
 * donde una unidad se registre contra tablas aún no cristalizadas.
 * =================================================================
 */

use fabrica_orchestrator::prelude::*;

use dotenvy::dotenv;
use fabrica_shared_atalaya::init_tracing;
use tracing::info;

/**
 * Punto de ignición supremo del binario del Orquestador.
 */
fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 1. CARGA DE ENTORNO SOBERANO
    dotenv().ok();

    // 2. INICIALIZACIÓN DE OBSERVABILIDAD NEURAL (ATALAYA)
    init_tracing("fabrica_orchestrator");

    // 3. CONFIGURACIÓN DEL RUNTIME SOBERANO
    let runtime_orchestrator = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    runtime_orchestrator.block_on(async {
        info!("🛰️  [COMMAND_CENTER]: Global ignition sequence starting...");

        // 4. ADQUISICIÓN DE COORDENADAS TÁCTICAS
        let database_connection_url = std::env::var("DATABASE_URL")
            .expect("CRITICAL_FAULT: DATABASE_URL not defined in runtime environment.");

        let database_access_token = std::env::var("DATABASE_AUTH_TOKEN").ok();

        let orchestrator_config = OrchestratorConfig::from_environment();
        let listening_port = orchestrator_config.listening_port;

        // 5. CONSTRUCCIÓN DEL KERNEL SOBERANO (ESTRATO L1-APP)
        let kernel_instance = OrchestratorKernel::ignite(
            &database_connection_url,
            database_access_token,
            orchestrator_config,
        )
        .await;

        // 6. IGNICIÓN DE OPERACIONES DE FLOTA
        info!("🚀 [FABRICA_ONLINE]: System fully operational on port {}.", listening_port);
        kernel_instance.launch_fleet_operations().await;

        Ok(())
    })
}
