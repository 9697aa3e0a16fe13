// [tests/mirror/apps/orchestrator/services/event_relay.test.rs]
/*!
 * =================================================================
 * APARATO: CERTIFICADOR DEL RELEVO DE EVENTOS (V4.2 - FAN-OUT)
 * CLASIFICACIÓN: TRINITY EVIDENCE // ESTRATO L4-MIRROR
 * RESPONSABILIDAD: PERSISTENCIA AL-MENOS-UNA-VEZ Y DIFUSIÓN DIAGNÓSTICA
 *
 * # Logic:
 * Un mensaje terminal debe (a) sellar el Ledger, (b) liberar la
 * capacidad reservada del handle propietario y (c) difundirse a los
 * suscriptores exactamente mientras avanza, jamás en repeticiones.
 * =================================================================
 */

use fabrica_domain_models::events::FleetEvent;
use fabrica_domain_models::job::{JobPriority, JobStatus, JobSubmission};
use fabrica_infra_db::StoreClient;
use fabrica_infra_protocol::{
    JobCompletePayload, JobProgressPayload, LogEntryPayload, MessageBody, WireMessage,
};
use fabrica_orchestrator::bootstrap::OrchestratorConfig;
use fabrica_orchestrator::services::event_relay::EventRelayService;
use fabrica_orchestrator::state::fleet_registry::{HandleIdentity, RobotConnectionHandle};
use fabrica_orchestrator::state::AppState;
use serde_json::json;

fn rehearsal_config() -> OrchestratorConfig {
    OrchestratorConfig {
        listening_port: 0,
        control_plane_secret: "cp-secret".to_string(),
        admin_stream_secret: "admin-secret".to_string(),
        heartbeat_interval_seconds: 30,
        heartbeat_timeout_seconds: 60,
        reply_timeout_seconds: 2,
        dispatch_batch_size: 16,
        dispatch_idle_backoff_cap_ms: 2000,
        dispatch_error_penalty_seconds: 5,
        job_timeout_grace_seconds: 60,
        reconcile_grace_seconds: 30,
        active_timeout_kill: false,
    }
}

async fn rehearsal_state(anchor: &str) -> AppState {
    let database_client = StoreClient::connect(anchor, None)
        .await
        .expect("CRITICAL_FAULT: memory anchor");
    AppState::new(database_client, rehearsal_config())
}

#[tokio::test(flavor = "multi_thread")]
async fn certify_terminal_relay_side_effects() {
    println!("\n📨 [INICIO]: Auditoría del relevo de eventos V4.2...");

    let state = rehearsal_state("file:mem_relay_terminal_v42?mode=memory&cache=shared").await;
    let relay = EventRelayService::new(state.clone());
    let mut bus_subscriber = state.event_bus.subscribe();

    // Génesis: misión reclamada por la unidad con capacidad reservada.
    let job_identifier = state
        .job_repository
        .enqueue_job(&JobSubmission {
            workflow_name: "demo".to_string(),
            workflow_payload: json!({"nodes": []}),
            parameters: json!({}),
            tenant_id: "default".to_string(),
            requested_robot_id: None,
            required_capabilities: Vec::new(),
            priority: JobPriority::Normal,
            timeout_seconds: 600,
        })
        .await
        .expect("enqueue");
    state
        .job_repository
        .claim_pending_job(&job_identifier, "unit-alpha-01")
        .await
        .expect("claim");

    let (handle, _outbound) = RobotConnectionHandle::new(HandleIdentity {
        robot_id: "unit-alpha-01".to_string(),
        robot_name: "Alpha 01".to_string(),
        tenant_id: "default".to_string(),
        capabilities: Vec::new(),
        tags: Vec::new(),
        max_concurrent_jobs: 1,
    });
    assert!(handle.try_reserve_job_slot(&job_identifier));

    // 1. AVANCE: promueve a running y difunde el checkpoint.
    relay
        .ingest(
            "unit-alpha-01",
            &handle,
            WireMessage::fresh(MessageBody::JobProgress(JobProgressPayload {
                job_id: job_identifier.clone(),
                robot_id: "unit-alpha-01".to_string(),
                progress: 40,
                current_node: "open-browser".to_string(),
                message: "navigating".to_string(),
            })),
        )
        .await;

    let running = state.job_repository.get_job(&job_identifier).await.expect("read");
    assert_eq!(running.status, JobStatus::Running);
    assert_eq!(running.progress_percent, 40);

    match bus_subscriber.recv().await.expect("progress event") {
        FleetEvent::JobProgressUpdate { progress_percent, .. } => assert_eq!(progress_percent, 40),
        other => panic!("unexpected bus frame: {:?}", other),
    }

    // 2. SELLADO: terminal + liberación de capacidad + difusión única.
    relay
        .ingest(
            "unit-alpha-01",
            &handle,
            WireMessage::fresh(MessageBody::JobComplete(JobCompletePayload {
                job_id: job_identifier.clone(),
                robot_id: "unit-alpha-01".to_string(),
                result: json!({"rows": 12}),
                duration_ms: 900,
            })),
        )
        .await;

    let sealed = state.job_repository.get_job(&job_identifier).await.expect("read");
    assert_eq!(sealed.status, JobStatus::Succeeded);
    assert_eq!(sealed.result, json!({"rows": 12}));
    assert_eq!(handle.active_job_count(), 0, "terminal must release the reserved slot");

    match bus_subscriber.recv().await.expect("terminal event") {
        FleetEvent::JobTerminal { status, .. } => assert_eq!(status, JobStatus::Succeeded),
        other => panic!("unexpected bus frame: {:?}", other),
    }

    // 3. IDEMPOTENCIA: el duplicado no re-difunde ni retrocede el estado.
    relay
        .ingest(
            "unit-alpha-01",
            &handle,
            WireMessage::fresh(MessageBody::JobComplete(JobCompletePayload {
                job_id: job_identifier.clone(),
                robot_id: "unit-alpha-01".to_string(),
                result: json!({"rows": 999}),
                duration_ms: 1,
            })),
        )
        .await;

    assert_eq!(
        state.job_repository.get_job(&job_identifier).await.expect("read").result,
        json!({"rows": 12}),
        "absorbed terminal must keep its original result"
    );
    assert!(
        bus_subscriber.try_recv().is_err(),
        "duplicate terminal must not broadcast again"
    );

    println!("   ✅ [SUCCESS]: Terminal relay side effects certified.");
}

#[tokio::test(flavor = "multi_thread")]
async fn certify_log_relay_dual_delivery() {
    let state = rehearsal_state("file:mem_relay_logs_v42?mode=memory&cache=shared").await;
    let relay = EventRelayService::new(state.clone());
    let mut bus_subscriber = state.event_bus.subscribe();

    let (handle, _outbound) = RobotConnectionHandle::new(HandleIdentity {
        robot_id: "unit-alpha-01".to_string(),
        robot_name: "Alpha 01".to_string(),
        tenant_id: "default".to_string(),
        capabilities: Vec::new(),
        tags: Vec::new(),
        max_concurrent_jobs: 1,
    });

    relay
        .ingest(
            "unit-alpha-01",
            &handle,
            WireMessage::fresh(MessageBody::LogEntry(LogEntryPayload {
                job_id: "j-1".to_string(),
                robot_id: "unit-alpha-01".to_string(),
                level: "WARNING".to_string(),
                message: "retrying selector".to_string(),
                node_id: "click-submit".to_string(),
                extra: None,
            })),
        )
        .await;

    // (a) Ledger: al-menos-una-vez.
    let persisted = state.log_repository.fetch_recent("j-1", 10).await.expect("fetch");
    assert_eq!(persisted.len(), 1);
    assert_eq!(persisted[0].message, "retrying selector");

    // (b) Suscriptores: difusión diagnóstica.
    match bus_subscriber.recv().await.expect("log event") {
        FleetEvent::LogEmission(entry) => {
            assert_eq!(entry.job_id, "j-1");
            assert_eq!(entry.node_id.as_deref(), Some("click-submit"));
        }
        other => panic!("unexpected bus frame: {:?}", other),
    }
}
