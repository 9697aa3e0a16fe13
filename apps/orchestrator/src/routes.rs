// [apps/orchestrator/src/routes.rs]
/*!
 * =================================================================
 * APARATO: SOVEREIGN ROUTING MATRIX (V4.5 - FLEET TOPOLOGY)
 * CLASIFICACIÓN: API ADAPTER LAYER (ESTRATO L3)
 * RESPONSABILIDAD: TOPOLOGÍA DE RED DEL PLANO DE CONTROL Y CANALES
 *
 * VISION HIPER-HOLÍSTICA:
 * La topología soporta:
 * 1. REST de control (flota, misiones, credenciales) tras el Bearer.
 * 2. Canal WebSocket de robots (autenticación por API key).
 * 3. Túnel WebSocket de operadores (secreto de administración).
 * Todo el estrato /api/v1 atraviesa la matriz de control de tráfico.
 * =================================================================
 */

use crate::handlers::jobs::JobSubmissionHandler;
use crate::handlers::keys::ApiKeyGovernanceHandler;
use crate::handlers::robots::RobotAdministrationHandler;
use crate::handlers::{stream, uplink};
use crate::middleware::{control_plane_guard, rate_limit_guard, RateLimitMatrix};
use crate::state::AppState;
use axum::http::{header, Method};
use axum::middleware;
use axum::routing::{delete, get, post, put};
use axum::Router;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub fn create_fleet_router(
    application_shared_state: AppState,
    rate_limit_matrix: Arc<RateLimitMatrix>,
) -> Router {
    // Escudo de Red: CORS para el Dashboard de flota y herramientas de Ops
    let network_security_shield = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .max_age(Duration::from_secs(3600));

    // ESTRATO DE CONTROL: Flota, Misiones y Credenciales (Bearer)
    let control_plane_stratum = Router::new()
        // Gestión de flota
        .route("/robots/register", post(RobotAdministrationHandler::handle_register))
        .route("/robots", get(RobotAdministrationHandler::handle_list))
        .route(
            "/robots/:robot_id",
            get(RobotAdministrationHandler::handle_get)
                .put(RobotAdministrationHandler::handle_update)
                .delete(RobotAdministrationHandler::handle_delete),
        )
        .route("/robots/:robot_id/status", put(RobotAdministrationHandler::handle_status_update))
        .route("/robots/:robot_id/heartbeat", post(RobotAdministrationHandler::handle_heartbeat))

        // Cola de misiones
        .route(
            "/jobs",
            post(JobSubmissionHandler::handle_submit).get(JobSubmissionHandler::handle_list),
        )
        .route(
            "/jobs/:job_id",
            get(JobSubmissionHandler::handle_get).delete(JobSubmissionHandler::handle_cancel),
        )
        .route("/jobs/:job_id/logs", get(JobSubmissionHandler::handle_job_logs))

        // Bóveda de credenciales
        .route(
            "/keys",
            post(ApiKeyGovernanceHandler::handle_mint).get(ApiKeyGovernanceHandler::handle_list),
        )
        .route("/keys/:key_id", delete(ApiKeyGovernanceHandler::handle_revoke))
        .layer(middleware::from_fn_with_state(
            application_shared_state.clone(),
            control_plane_guard,
        ));

    // ESTRATO DE CANALES: sockets de robots y túnel de operadores.
    // Autentican por su propio mecanismo; no atraviesan el Bearer.
    let channel_stratum = Router::new()
        .route("/ws/robot/:robot_id", get(uplink::establish_robot_channel))
        .route("/ws/logs", get(stream::establish_operator_stream));

    // COMPOSICIÓN GLOBAL (Root Topology)
    Router::new()
        .route("/health", get(|| async { "STATUS_OK" }))
        .nest(
            "/api/v1",
            Router::new()
                .merge(control_plane_stratum)
                .merge(channel_stratum)
                // Matriz de control de tráfico por (etiqueta, IP de origen)
                .layer(middleware::from_fn_with_state(rate_limit_matrix, rate_limit_guard)),
        )
        .layer(TraceLayer::new_for_http())
        .layer(network_security_shield)
        .with_state(application_shared_state)
}
