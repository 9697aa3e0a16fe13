// [apps/orchestrator/src/kernel.rs]
/**
 * =================================================================
 * APARATO: ORCHESTRATOR SOVEREIGN KERNEL (V4.6 - FLEET IGNITION)
 * CLASIFICACIÓN: COMPOSITION ROOT (ESTRATO L1-APP)
 * RESPONSABILIDAD: BOOTSTRAP DE INFRAESTRUCTURA E IGNICIÓN SEGURA
 *
 * VISION HIPER-HOLÍSTICA:
 * Actúa como la placa base donde se conectan todos los servicios:
 * Ledger, registro de conexiones, daemons de mantenimiento y el
 * transporte HTTP/WebSocket. El apagado es ordenado: el servidor
 * drena las peticiones en vuelo y todo enlace de robot recibe su
 * señal de cierre con razón 'server shutdown'.
 * =================================================================
 */

use crate::bootstrap::OrchestratorConfig;
use crate::middleware::RateLimitMatrix;
use crate::routes::create_fleet_router;
use crate::services::{spawn_flush_service, spawn_reaper, JobDispatchService};
use crate::state::AppState;
use fabrica_infra_db::StoreClient;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use tracing::{error, info, instrument};

pub struct OrchestratorKernel {
    pub application_shared_state: AppState,
}

impl OrchestratorKernel {
    /**
     * Realiza la ignición del cliente táctico y el estado neural.
     * Establece la conexión al Ledger antes de levantar servicios.
     */
    #[instrument(skip(database_access_token, config))]
    pub async fn ignite(
        database_connection_url: &str,
        database_access_token: Option<String>,
        config: OrchestratorConfig,
    ) -> Self {
        let database_client = StoreClient::connect(database_connection_url, database_access_token)
            .await
            .expect("FATAL: Database link collapse. Ignition aborted.");

        Self {
            application_shared_state: AppState::new(database_client, config),
        }
    }

    /**
     * Lanza los daemons autónomos de la flota y el servidor HTTP.
     */
    pub async fn launch_fleet_operations(self) {
        let shared_application_state = self.application_shared_state.clone();

        // --- 1. DAEMON DE PERSISTENCIA DE LATIDOS (Write-Behind) ---
        spawn_flush_service(shared_application_state.clone()).await;

        // --- 2. BARRENDERO DE VIDA (Expiración y Conciliación) ---
        spawn_reaper(shared_application_state.clone()).await;

        // --- 3. MOTOR DE DESPACHO (Matchmaking Misión <-> Unidad) ---
        let dispatch_service = JobDispatchService::new(shared_application_state.clone());
        dispatch_service.spawn_dispatch_daemon();

        // --- 4. IGNICIÓN DEL TRANSPORTE HTTP (AXUM) ---
        let rate_limit_matrix = Arc::new(RateLimitMatrix::new());
        let fleet_router = create_fleet_router(shared_application_state.clone(), rate_limit_matrix);

        let bind_address = SocketAddr::new(
            "0.0.0.0".parse::<IpAddr>().expect("FATAL: invalid bind address"),
            shared_application_state.config.listening_port,
        );

        info!("🚀 [KERNEL_ONLINE]: Fleet Command Center listening at {}", bind_address);

        let tcp_listener = tokio::net::TcpListener::bind(bind_address)
            .await
            .expect("CRITICAL_FAULT: Failed to bind network port.");

        // El escudo de apagado drena las peticiones en vuelo ante SIGINT.
        let serve_result = axum::serve(
            tcp_listener,
            fleet_router.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("⚠️ [KERNEL]: Termination requested by host. Draining strata...");
        })
        .await;

        // --- 5. COLAPSO ORDENADO DE ENLACES ---
        shared_application_state
            .fleet_registry
            .close_all("server shutdown");

        if let Err(server_error) = serve_result {
            error!("💀 [KERNEL_COLLAPSE]: Runtime failure: {}", server_error);
            std::process::exit(1);
        }

        info!("💀 [KERNEL_RETIRED]: Fleet Command Center shut down cleanly.");
    }
}
