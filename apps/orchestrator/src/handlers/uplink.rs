// [apps/orchestrator/src/handlers/uplink.rs]
/*!
 * =================================================================
 * APARATO: ROBOT CHANNEL SOCKET (V4.8 - FULL DUPLEX COMMAND LINK)
 * CLASIFICACIÓN: API HANDLER (ESTRATO L4)
 * RESPONSABILIDAD: AUTENTICACIÓN, HANDSHAKE Y CICLO DE VIDA DEL ENLACE
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. TRIPLE TASK ORCHESTRATION: Escritor (canal interno -> socket con
 *    keep-alive), lector (procesamiento en orden) y vigilante de
 *    latidos, con colapso determinista del trío vía select-abort.
 * 2. DUAL AUTH PATH: El secreto viaja como query param (verificado
 *    antes del upgrade) o como 'auth_token' del primer 'register'.
 * 3. SUPERSEDE LAW: Un 'register' de una unidad ya conectada colapsa
 *    el enlace anterior; jamás existen dos handles vivos por unidad.
 *
 * # Mathematical Proof (Asynchronous Determinism):
 * El canal mpsc interno desacopla la recepción de red de la lógica
 * pesada sobre el Ledger: el procesamiento de una orden no bloquea el
 * envío de acuses ni el keep-alive del socket.
 * =================================================================
 */

use crate::services::event_relay::EventRelayService;
use crate::state::fleet_registry::{HandleIdentity, RobotConnectionHandle};
use crate::state::AppState;
use axum::extract::ws::{close_code, CloseFrame, Message, WebSocket, WebSocketUpgrade};
use axum::extract::{ConnectInfo, Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use fabrica_domain_models::robot::{RobotRegistration, RobotStatus};
use fabrica_infra_protocol::{
    decode_frame, encode_frame, CodecError, MessageBody, RegisterAckConfig, RegisterAckPayload,
    RegisterPayload, WireMessage,
};
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::interval;
use tracing::{debug, info, instrument, warn};

/// Ventana máxima para recibir el 'register' tras abrir el socket.
const REGISTRATION_DEADLINE_SECONDS: u64 = 10;

/// Intervalo de keep-alive físico (Ping) del escritor.
const KEEPALIVE_INTERVAL_SECONDS: u64 = 25;

#[derive(Debug, Deserialize)]
pub struct ChannelAuthQuery {
    #[serde(default)]
    pub api_key: Option<String>,
}

/**
 * Punto de entrada del canal: GET /api/v1/ws/robot/{robot_id}?api_key=
 * Realiza la transición de protocolo HTTP a WebSocket (RFC 6455).
 */
#[instrument(skip(websocket_upgrade, application_state, auth_query), fields(robot = %robot_identifier))]
pub async fn establish_robot_channel(
    Path(robot_identifier): Path<String>,
    Query(auth_query): Query<ChannelAuthQuery>,
    State(application_state): State<AppState>,
    ConnectInfo(remote_address): ConnectInfo<SocketAddr>,
    websocket_upgrade: WebSocketUpgrade,
) -> Response {
    // RUTA ALFA: el secreto viajó en la URL; se verifica antes del upgrade.
    let pre_authenticated = match &auth_query.api_key {
        Some(presented_secret) => {
            match application_state
                .api_key_repository
                .verify_presented_secret(
                    &robot_identifier,
                    presented_secret,
                    Some(&remote_address.ip().to_string()),
                )
                .await
            {
                Ok(Some(_credential)) => true,
                Ok(None) => {
                    warn!("❌ [CHANNEL_AUTH]: Unit {} presented an invalid secret.", robot_identifier);
                    return StatusCode::UNAUTHORIZED.into_response();
                }
                Err(vault_fault) => {
                    warn!("⚠️ [CHANNEL_AUTH]: Vault unavailable for {}: {}", robot_identifier, vault_fault);
                    return StatusCode::SERVICE_UNAVAILABLE.into_response();
                }
            }
        }
        None => false,
    };

    debug!("🔌 [SOCKET_UPGRADE]: Negotiating protocol transition for unit {}...", robot_identifier);
    websocket_upgrade.on_upgrade(move |socket| {
        handle_robot_link(
            socket,
            application_state,
            robot_identifier,
            pre_authenticated,
            remote_address,
        )
    })
}

/**
 * Orquestador soberano de la sesión del canal de una unidad.
 */
async fn handle_robot_link(
    mut socket: WebSocket,
    application_state: AppState,
    robot_identifier: String,
    pre_authenticated: bool,
    remote_address: SocketAddr,
) {
    // --- FASE 1: HANDSHAKE DE REGISTRO (primer mensaje obligatorio) ---
    let registration_payload = match await_registration_frame(&mut socket).await {
        Ok(payload) => payload,
        Err(handshake_fault) => {
            warn!("❌ [CHANNEL_HANDSHAKE]: Unit {} rejected: {}", robot_identifier, handshake_fault);
            reject_and_close(socket, "PROTOCOL_VIOLATION", &handshake_fault).await;
            return;
        }
    };

    // --- FASE 2: AUTENTICACIÓN DIFERIDA (secreto en el primer mensaje) ---
    if !pre_authenticated {
        let presented_token = registration_payload.auth_token.clone().unwrap_or_default();
        let verification = application_state
            .api_key_repository
            .verify_presented_secret(
                &robot_identifier,
                &presented_token,
                Some(&remote_address.ip().to_string()),
            )
            .await;

        match verification {
            Ok(Some(_credential)) => {}
            Ok(None) => {
                warn!("❌ [CHANNEL_AUTH]: Unit {} first-message token rejected.", robot_identifier);
                reject_and_close(socket, "AUTH_REJECTED", "invalid credential").await;
                return;
            }
            Err(vault_fault) => {
                reject_and_close(socket, "VAULT_UNAVAILABLE", &vault_fault.to_string()).await;
                return;
            }
        }
    }

    // --- FASE 3: UPSERT DE IDENTIDAD EN EL LEDGER ---
    let ledger_registration = RobotRegistration {
        robot_id: robot_identifier.clone(),
        name: if registration_payload.robot_name.is_empty() {
            robot_identifier.clone()
        } else {
            registration_payload.robot_name.clone()
        },
        hostname: registration_payload.hostname.clone(),
        tenant_id: if registration_payload.tenant_id.is_empty() {
            "default".to_string()
        } else {
            registration_payload.tenant_id.clone()
        },
        environment: if registration_payload.environment.is_empty() {
            "default".to_string()
        } else {
            registration_payload.environment.clone()
        },
        max_concurrent_jobs: registration_payload.max_concurrent_jobs.max(1),
        capabilities: registration_payload.capabilities.clone(),
        tags: registration_payload.tags.clone(),
    };

    if let Err(ledger_fault) = application_state
        .robot_repository
        .register_robot(&ledger_registration)
        .await
    {
        warn!("⚠️ [CHANNEL]: Ledger rejected registration of {}: {}", robot_identifier, ledger_fault);
        reject_and_close(socket, "REGISTRATION_FAILED", &ledger_fault.to_string()).await;
        return;
    }

    // --- FASE 4: ALTA EN EL REGISTRO (LEY DEL HANDLE ÚNICO) ---
    let (handle, mut outbound_receiver) = RobotConnectionHandle::new(HandleIdentity {
        robot_id: robot_identifier.clone(),
        robot_name: ledger_registration.name.clone(),
        tenant_id: ledger_registration.tenant_id.clone(),
        capabilities: ledger_registration.capabilities.clone(),
        tags: ledger_registration.tags.clone(),
        max_concurrent_jobs: ledger_registration.max_concurrent_jobs,
    });

    if let Some(superseded_handle) = application_state
        .fleet_registry
        .register_connection(Arc::clone(&handle))
    {
        info!("♻️ [CHANNEL]: Unit {} reconnected. Prior link superseded.", robot_identifier);
        superseded_handle.fail_all_pending();
        superseded_handle.request_close();
        application_state
            .event_bus
            .emit_robot_disconnected(&robot_identifier, "superseded by fresh registration");
    }

    // Acuse de registro con la configuración negociada.
    let register_acknowledgement = WireMessage::fresh(MessageBody::RegisterAck(RegisterAckPayload {
        success: true,
        message: format!("unit {} registered", robot_identifier),
        config: RegisterAckConfig {
            heartbeat_interval: application_state.config.heartbeat_interval_seconds,
        },
    }));
    let _ = handle.send_frame(register_acknowledgement).await;

    let _ = application_state
        .robot_repository
        .set_robot_status(&robot_identifier, RobotStatus::Online)
        .await;
    application_state
        .event_bus
        .emit_robot_connected(&robot_identifier, &ledger_registration.tenant_id);
    application_state.wake_dispatcher();

    info!("⚡ [CHANNEL_OPEN]: Unit {} link {} established from {}.",
        robot_identifier, handle.connection_uid, remote_address);

    let (mut socket_sink, mut socket_stream) = socket.split();

    // --- TAREA 1: ESCRITOR (canal interno -> socket + keep-alive) ---
    let writer_handle_reference = Arc::clone(&handle);
    let mut writer_task = tokio::spawn(async move {
        let mut keepalive_timer = interval(Duration::from_secs(KEEPALIVE_INTERVAL_SECONDS));

        loop {
            if writer_handle_reference.is_closed() {
                let _ = socket_sink
                    .send(Message::Close(Some(CloseFrame {
                        code: close_code::NORMAL,
                        reason: "link closed by orchestrator".into(),
                    })))
                    .await;
                break;
            }

            tokio::select! {
                // Brazo 1: Pulso de vida físico (Ping-Pong)
                _ = keepalive_timer.tick() => {
                    if socket_sink.send(Message::Ping(Vec::new())).await.is_err() {
                        break;
                    }
                },

                // Brazo 2: Tramas lógicas encoladas por el orquestador
                outbound_frame = outbound_receiver.recv() => {
                    match outbound_frame {
                        Some(message) => match encode_frame(&message) {
                            Ok(text_frame) => {
                                if socket_sink.send(Message::Text(text_frame)).await.is_err() {
                                    break;
                                }
                            }
                            Err(codec_fault) => {
                                warn!("❌ [CHANNEL_CODEC]: Outbound frame rejected: {}", codec_fault);
                            }
                        },
                        None => break,
                    }
                },

                // Brazo 3: Señal de colapso ordenado
                _ = writer_handle_reference.wait_close_signal() => {
                    let _ = socket_sink
                        .send(Message::Close(Some(CloseFrame {
                            code: close_code::NORMAL,
                            reason: "link closed by orchestrator".into(),
                        })))
                        .await;
                    break;
                },
            }
        }
    });

    // --- TAREA 2: LECTOR (procesamiento en orden por conexión) ---
    let reader_state = application_state.clone();
    let reader_handle = Arc::clone(&handle);
    let reader_robot = robot_identifier.clone();
    let mut reader_task = tokio::spawn(async move {
        let relay_service = EventRelayService::new(reader_state.clone());

        while let Some(frame_result) = socket_stream.next().await {
            if reader_handle.is_closed() {
                break;
            }

            match frame_result {
                Ok(Message::Text(raw_frame)) => match decode_frame(&raw_frame) {
                    Ok(message) => {
                        process_robot_frame(
                            &reader_state,
                            &reader_handle,
                            &relay_service,
                            &reader_robot,
                            message,
                        )
                        .await;
                    }
                    Err(codec_fault) => {
                        warn!("⚠️ [CHANNEL_CODEC]: Frame from {} discarded: {}", reader_robot, codec_fault);
                        let _ = reader_handle
                            .send_frame(WireMessage::fresh(MessageBody::Error {
                                error_code: "DECODE_REJECTED".to_string(),
                                error_message: codec_fault.to_string(),
                            }))
                            .await;
                    }
                },
                Ok(Message::Binary(_)) => {
                    // Fuera de la gramática del canal: mismo diagnóstico
                    // tipado que una trama de texto ilegible.
                    let codec_fault = CodecError::NonUtf8Frame;
                    warn!("⚠️ [CHANNEL_CODEC]: Binary frame from {} rejected: {}",
                        reader_robot, codec_fault);
                    let _ = reader_handle
                        .send_frame(WireMessage::fresh(MessageBody::Error {
                            error_code: "DECODE_REJECTED".to_string(),
                            error_message: codec_fault.to_string(),
                        }))
                        .await;
                }
                Ok(Message::Close(_)) => {
                    debug!("🔌 [CHANNEL]: Unit {} sent termination signal.", reader_robot);
                    break;
                }
                Ok(_) => {} // Ping/Pong gestionados por la capa física
                Err(physical_fault) => {
                    warn!("❌ [CHANNEL]: Unit {} physical fault: {}", reader_robot, physical_fault);
                    break;
                }
            }
        }
    });

    // --- TAREA 3: VIGILANTE DE LATIDOS (expiración local del enlace) ---
    let watcher_handle_reference = Arc::clone(&handle);
    let heartbeat_timeout =
        Duration::from_secs(application_state.config.heartbeat_timeout_seconds.max(2));
    let mut watcher_task = tokio::spawn(async move {
        let mut watch_timer = interval(heartbeat_timeout / 2);
        loop {
            watch_timer.tick().await;
            if watcher_handle_reference.is_closed() {
                break;
            }
            if watcher_handle_reference.heartbeat_age() > heartbeat_timeout {
                warn!("💀 [CHANNEL_WATCH]: Unit {} heartbeat expired. Collapsing link.",
                    watcher_handle_reference.identity.robot_id);
                watcher_handle_reference.request_close();
                break;
            }
        }
    });

    // --- LIMPIEZA ATÓMICA DEL TRÍO ---
    // El primer centinela que finalice dispara el colapso de los otros dos.
    tokio::select! {
        _ = (&mut writer_task) => {
            reader_task.abort();
            watcher_task.abort();
        },
        _ = (&mut reader_task) => {
            writer_task.abort();
            watcher_task.abort();
        },
        _ = (&mut watcher_task) => {
            writer_task.abort();
            reader_task.abort();
        },
    };

    finalize_robot_link(&application_state, &robot_identifier, &handle).await;
}

/**
 * Limpieza determinista del enlace: retiro del registro, futuros
 * fallados, unidad offline y misiones en vuelo devueltas a la cola.
 * Un handle superseded no arrastra al enlace sucesor.
 */
async fn finalize_robot_link(
    application_state: &AppState,
    robot_identifier: &str,
    handle: &Arc<RobotConnectionHandle>,
) {
    handle.fail_all_pending();
    handle.request_close();

    let was_current_link = application_state
        .fleet_registry
        .remove_connection(robot_identifier, handle.connection_uid);

    if !was_current_link {
        debug!("💀 [CHANNEL]: Superseded link {} of unit {} retired.",
            handle.connection_uid, robot_identifier);
        return;
    }

    let _ = application_state
        .robot_repository
        .set_robot_status(robot_identifier, RobotStatus::Offline)
        .await;

    match application_state
        .job_repository
        .release_jobs_for_robot(robot_identifier)
        .await
    {
        Ok(released_missions) => {
            for mission in &released_missions {
                let _ = application_state
                    .audit_repository
                    .append("job_released", mission, "channel", "owning link collapsed")
                    .await;
            }
            if !released_missions.is_empty() {
                application_state.wake_dispatcher();
            }
        }
        Err(release_fault) => {
            warn!("⚠️ [CHANNEL]: Mission release for {} failed: {}", robot_identifier, release_fault);
        }
    }

    application_state
        .event_bus
        .emit_robot_disconnected(robot_identifier, "link closed");

    info!("💀 [CHANNEL_TERMINATED]: Unit {} link {} resources released.",
        robot_identifier, handle.connection_uid);
}

/**
 * Ruteo en orden de las tramas de una unidad autenticada.
 */
async fn process_robot_frame(
    application_state: &AppState,
    handle: &Arc<RobotConnectionHandle>,
    relay_service: &EventRelayService,
    robot_identifier: &str,
    message: WireMessage,
) {
    // Las respuestas correlacionadas pertenecen al tracker del handle;
    // una respuesta sin petición pendiente se ignora por contrato.
    if let Some(correlation_id) = message.correlation_id {
        handle.resolve_pending_reply(&correlation_id, message);
        return;
    }

    match message.body {
        MessageBody::Heartbeat(ref pulse_payload) => {
            let normalized_pulse = handle.absorb_heartbeat(pulse_payload);
            application_state.buffer_pulse(normalized_pulse);

            let _ = handle
                .send_frame(WireMessage::reply_to(message.message_id, MessageBody::HeartbeatAck))
                .await;

            // Un latido puede reabrir capacidad: despertar al despachador.
            application_state.wake_dispatcher();
        }

        // Un 'register' repetido sobre el mismo socket se re-acusa sin
        // reconstruir el handle (la supersesión aplica a sockets nuevos).
        MessageBody::Register(_) => {
            let _ = handle
                .send_frame(WireMessage::reply_to(
                    message.message_id,
                    MessageBody::RegisterAck(RegisterAckPayload {
                        success: true,
                        message: "already registered".to_string(),
                        config: RegisterAckConfig {
                            heartbeat_interval: application_state.config.heartbeat_interval_seconds,
                        },
                    }),
                ))
                .await;
        }

        _ => relay_service.ingest(robot_identifier, handle, message).await,
    }
}

/**
 * Espera el primer mensaje de aplicación, que DEBE ser 'register'.
 */
async fn await_registration_frame(socket: &mut WebSocket) -> Result<RegisterPayload, String> {
    let deadline = Duration::from_secs(REGISTRATION_DEADLINE_SECONDS);

    loop {
        let frame = tokio::time::timeout(deadline, socket.recv())
            .await
            .map_err(|_| "registration deadline exceeded".to_string())?
            .ok_or_else(|| "socket closed before registration".to_string())?
            .map_err(|physical_fault| format!("physical fault: {}", physical_fault))?;

        match frame {
            Message::Text(raw_frame) => {
                let message = decode_frame(&raw_frame)
                    .map_err(|codec_fault| format!("malformed first frame: {}", codec_fault))?;
                return match message.body {
                    MessageBody::Register(payload) => Ok(payload),
                    other => Err(format!(
                        "first frame must be 'register', received '{}'",
                        other.type_label()
                    )),
                };
            }
            Message::Ping(_) | Message::Pong(_) => continue,
            Message::Close(_) => return Err("socket closed before registration".to_string()),
            Message::Binary(_) => return Err(CodecError::NonUtf8Frame.to_string()),
        }
    }
}

/**
 * Emite una trama 'error' de diagnóstico y cierra con violación de política.
 */
async fn reject_and_close(mut socket: WebSocket, error_code: &str, error_message: &str) {
    let diagnostic_frame = WireMessage::fresh(MessageBody::Error {
        error_code: error_code.to_string(),
        error_message: error_message.to_string(),
    });

    if let Ok(text_frame) = encode_frame(&diagnostic_frame) {
        let _ = socket.send(Message::Text(text_frame)).await;
    }

    let _ = socket
        .send(Message::Close(Some(CloseFrame {
            code: close_code::POLICY,
            reason: "policy violation".into(),
        })))
        .await;
}
