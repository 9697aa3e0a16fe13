// [apps/orchestrator/src/handlers/stream.rs]
/*!
 * =================================================================
 * APARATO: OPERATOR LOG STREAM SOCKET (V4.3 - PANOPTICON TUNNEL)
 * CLASIFICACIÓN: API HANDLER (ESTRATO L4)
 * RESPONSABILIDAD: DIFUSIÓN FILTRADA DE EVENTOS A OPERADORES ADMIN
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. SEPARATE SECRET: El túnel autentica con el secreto de
 *    administración, independiente del Bearer del plano de control.
 * 2. LOSSY BY CONTRACT: Un suscriptor congestionado pierde las tramas
 *    más antiguas (semántica Lagged) y recibe el conteo de pérdida;
 *    el flujo es diagnóstico, el Ledger es la autoridad.
 * 3. SERVER-SIDE FILTERING: robot_id, tenant_id y nivel mínimo se
 *    aplican antes de serializar, ahorrando ancho de banda.
 * =================================================================
 */

use crate::state::AppState;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use fabrica_domain_models::events::FleetEvent;
use fabrica_domain_models::logging::LogLevel;
use serde::Deserialize;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tokio::time::interval;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

/// Intervalo de keep-alive del túnel de operadores.
const KEEPALIVE_INTERVAL_SECONDS: u64 = 25;

#[derive(Debug, Default, Deserialize)]
pub struct OperatorStreamQuery {
    #[serde(default)]
    pub admin_secret: Option<String>,
    #[serde(default)]
    pub robot_id: Option<String>,
    #[serde(default)]
    pub tenant_id: Option<String>,
    /// Severidad mínima de las emisiones de log ("DEBUG".."ERROR").
    #[serde(default)]
    pub min_level: Option<String>,
}

/**
 * Punto de entrada del túnel de operadores: GET /api/v1/ws/logs
 */
#[instrument(skip(websocket_upgrade, application_state, stream_query))]
pub async fn establish_operator_stream(
    Query(stream_query): Query<OperatorStreamQuery>,
    State(application_state): State<AppState>,
    websocket_upgrade: WebSocketUpgrade,
) -> Response {
    let presented_secret = stream_query.admin_secret.clone().unwrap_or_default();
    if presented_secret != application_state.config.admin_stream_secret {
        warn!("❌ [STREAM_AUTH]: Operator tunnel rejected (invalid admin secret).");
        return StatusCode::UNAUTHORIZED.into_response();
    }

    websocket_upgrade
        .on_upgrade(move |socket| run_operator_stream(socket, application_state, stream_query))
}

/**
 * Bucle de difusión de la sesión del operador.
 */
async fn run_operator_stream(
    mut socket: WebSocket,
    application_state: AppState,
    stream_query: OperatorStreamQuery,
) {
    let session_identifier = Uuid::new_v4().to_string();
    let mut event_subscriber = application_state.event_bus.subscribe();
    let mut keepalive_timer = interval(Duration::from_secs(KEEPALIVE_INTERVAL_SECONDS));

    let minimum_severity = stream_query
        .min_level
        .as_deref()
        .map(LogLevel::from_label)
        .map(|level| level.severity_rank())
        .unwrap_or(0);

    info!("⚡ [STREAM_OPEN]: Operator session {} established (robot={:?} tenant={:?}).",
        session_identifier, stream_query.robot_id, stream_query.tenant_id);

    loop {
        tokio::select! {
            // Brazo 1: keep-alive físico
            _ = keepalive_timer.tick() => {
                if socket.send(Message::Ping(Vec::new())).await.is_err() {
                    break;
                }
            },

            // Brazo 2: sifón del bus de eventos
            bus_reception = event_subscriber.recv() => {
                match bus_reception {
                    Ok(fleet_event) => {
                        if !event_passes_filter(&fleet_event, &stream_query, minimum_severity) {
                            continue;
                        }
                        match serde_json::to_string(&fleet_event) {
                            Ok(serialized_event) => {
                                if socket.send(Message::Text(serialized_event)).await.is_err() {
                                    break;
                                }
                            }
                            Err(serialization_fault) => {
                                warn!("❌ [STREAM]: Event serialization collapsed: {}", serialization_fault);
                            }
                        }
                    }
                    Err(RecvError::Lagged(missed_frames_count)) => {
                        application_state
                            .event_bus
                            .report_subscriber_lag(&session_identifier, missed_frames_count);
                    }
                    Err(RecvError::Closed) => {
                        debug!("💀 [STREAM]: Event bus channel closed for session {}.", session_identifier);
                        break;
                    }
                }
            },

            // Brazo 3: señales entrantes del operador (cierre)
            inbound = socket.recv() => {
                match inbound {
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(_)) => break,
                }
            },
        }
    }

    info!("💀 [STREAM_TERMINATED]: Operator session {} resources released.", session_identifier);
}

/**
 * Predicado de filtrado del túnel: identidad de unidad, tenant y
 * severidad mínima para las emisiones de log.
 */
pub fn event_passes_filter(
    event: &FleetEvent,
    stream_query: &OperatorStreamQuery,
    minimum_severity: u8,
) -> bool {
    if let Some(robot_filter) = &stream_query.robot_id {
        let event_robot = match event {
            FleetEvent::RobotConnected { robot_identifier, .. }
            | FleetEvent::RobotDisconnected { robot_identifier, .. }
            | FleetEvent::RobotStatusChanged { robot_identifier, .. }
            | FleetEvent::JobAssigned { robot_identifier, .. }
            | FleetEvent::JobProgressUpdate { robot_identifier, .. }
            | FleetEvent::JobTerminal { robot_identifier, .. } => Some(robot_identifier.as_str()),
            FleetEvent::LogEmission(entry) => Some(entry.robot_id.as_str()),
            FleetEvent::JobQueued { .. } => None,
        };

        if let Some(event_robot) = event_robot {
            if event_robot != robot_filter {
                return false;
            }
        }
    }

    if let Some(tenant_filter) = &stream_query.tenant_id {
        if let FleetEvent::RobotConnected { tenant_id, .. } = event {
            if tenant_id != tenant_filter {
                return false;
            }
        }
    }

    if let FleetEvent::LogEmission(entry) = event {
        if entry.level.severity_rank() < minimum_severity {
            return false;
        }
    }

    true
}
