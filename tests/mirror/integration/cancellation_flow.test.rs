// [tests/mirror/integration/cancellation_flow.test.rs]
/*!
 * =================================================================
 * APARATO: CERTIFICADOR DEL PROTOCOLO DE CANCELACIÓN (V4.2)
 * CLASIFICACIÓN: TRINITY EVIDENCE // ESTRATO INTEGRACIÓN
 * RESPONSABILIDAD: CANCELACIÓN PENDIENTE, EN VUELO Y SIN ACUSE
 * =================================================================
 */

use fabrica_domain_models::job::{JobPriority, JobStatus, JobSubmission};
use fabrica_infra_db::StoreClient;
use fabrica_infra_protocol::{MessageBody, WireMessage};
use fabrica_orchestrator::bootstrap::OrchestratorConfig;
use fabrica_orchestrator::services::dispatcher::{CancellationOutcome, JobDispatchService};
use fabrica_orchestrator::state::fleet_registry::{HandleIdentity, RobotConnectionHandle};
use fabrica_orchestrator::state::AppState;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

fn rehearsal_config() -> OrchestratorConfig {
    OrchestratorConfig {
        listening_port: 0,
        control_plane_secret: "cp-secret".to_string(),
        admin_stream_secret: "admin-secret".to_string(),
        heartbeat_interval_seconds: 30,
        heartbeat_timeout_seconds: 60,
        reply_timeout_seconds: 1,
        dispatch_batch_size: 16,
        dispatch_idle_backoff_cap_ms: 2000,
        dispatch_error_penalty_seconds: 5,
        job_timeout_grace_seconds: 60,
        reconcile_grace_seconds: 30,
        active_timeout_kill: false,
    }
}

async fn rehearsal_state(anchor: &str) -> AppState {
    let database_client = StoreClient::connect(anchor, None).await.expect("memory anchor");
    AppState::new(database_client, rehearsal_config())
}

async fn enqueue_demo(state: &AppState) -> String {
    state
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
        .expect("enqueue")
}

fn rehearsal_unit(robot_id: &str) -> HandleIdentity {
    HandleIdentity {
        robot_id: robot_id.to_string(),
        robot_name: robot_id.to_string(),
        tenant_id: "default".to_string(),
        capabilities: Vec::new(),
        tags: Vec::new(),
        max_concurrent_jobs: 1,
    }
}

/**
 * CANCELACIÓN PENDIENTE: misión aún no despachada, sellado
 * directo, sin trama 'job_cancel', con rastro de auditoría.
 */
#[tokio::test(flavor = "multi_thread")]
async fn certify_cancel_pending_mission() {
    println!("\n🛑 [INICIO]: Ensayo de cancelación pendiente...");

    let state = rehearsal_state("file:mem_cancel_pending_v42?mode=memory&cache=shared").await;
    let job_identifier = enqueue_demo(&state).await;

    let outcome = JobDispatchService::execute_cancellation(&state, &job_identifier)
        .await
        .expect("cancellation");
    assert_eq!(outcome, CancellationOutcome::CancelledDirect);

    let sealed = state.job_repository.get_job(&job_identifier).await.expect("read");
    assert_eq!(sealed.status, JobStatus::Cancelled);

    let trail = state
        .audit_repository
        .recent_for_subject(&job_identifier, 10)
        .await
        .expect("trail");
    assert!(trail.iter().any(|(kind, _, _)| kind == "job_cancelled"));

    // La cancelación repetida observa el estado absorbente.
    assert_eq!(
        JobDispatchService::execute_cancellation(&state, &job_identifier)
            .await
            .expect("re-cancel"),
        CancellationOutcome::AlreadyTerminal
    );

    println!("   ✅ [SUCCESS]: Pending cancellation certified.");
}

/**
 * CANCELACIÓN EN VUELO CON ACUSE: 'job_cancel'
 * correlacionado, sellado al recibir 'job_cancelled'.
 */
#[tokio::test(flavor = "multi_thread")]
async fn certify_cancel_running_with_acknowledgement() {
    let state = rehearsal_state("file:mem_cancel_running_v42?mode=memory&cache=shared").await;
    let job_identifier = enqueue_demo(&state).await;

    let (handle, mut outbound) = RobotConnectionHandle::new(rehearsal_unit("unit-r1"));
    state.fleet_registry.register_connection(Arc::clone(&handle));

    state
        .job_repository
        .claim_pending_job(&job_identifier, "unit-r1")
        .await
        .expect("claim");
    assert!(handle.try_reserve_job_slot(&job_identifier));
    state
        .job_repository
        .record_progress(&job_identifier, "unit-r1", 40, "n-1")
        .await
        .expect("running");

    let outcome = JobDispatchService::execute_cancellation(&state, &job_identifier)
        .await
        .expect("cancellation");
    assert_eq!(outcome, CancellationOutcome::CancelRequested);

    // La trama de aborto viaja con identidad correlacionable.
    let cancel_frame = outbound.recv().await.expect("job_cancel frame");
    match &cancel_frame.body {
        MessageBody::JobCancel { job_id, .. } => assert_eq!(job_id, &job_identifier),
        other => panic!("unexpected frame: {}", other.type_label()),
    }

    handle.resolve_pending_reply(
        &cancel_frame.message_id,
        WireMessage::reply_to(
            cancel_frame.message_id,
            MessageBody::JobCancelled {
                job_id: job_identifier.clone(),
                robot_id: "unit-r1".to_string(),
            },
        ),
    );
    tokio::time::sleep(Duration::from_millis(200)).await;

    let sealed = state.job_repository.get_job(&job_identifier).await.expect("read");
    assert_eq!(sealed.status, JobStatus::Cancelled);
    assert_eq!(handle.active_job_count(), 0);

    let trail = state
        .audit_repository
        .recent_for_subject(&job_identifier, 10)
        .await
        .expect("trail");
    assert!(trail
        .iter()
        .any(|(kind, detail, _)| kind == "job_cancelled" && detail == "acknowledged"));
}

/**
 * ACUSE AUSENTE: la misión igualmente sella
 * 'cancelled' con la nota forense 'cancel_ack_missing'.
 */
#[tokio::test(flavor = "multi_thread")]
async fn certify_cancel_running_without_acknowledgement() {
    let state = rehearsal_state("file:mem_cancel_mute_v42?mode=memory&cache=shared").await;
    let job_identifier = enqueue_demo(&state).await;

    let (handle, mut outbound) = RobotConnectionHandle::new(rehearsal_unit("unit-mute"));
    state.fleet_registry.register_connection(Arc::clone(&handle));

    state
        .job_repository
        .claim_pending_job(&job_identifier, "unit-mute")
        .await
        .expect("claim");
    assert!(handle.try_reserve_job_slot(&job_identifier));

    let outcome = JobDispatchService::execute_cancellation(&state, &job_identifier)
        .await
        .expect("cancellation");
    assert_eq!(outcome, CancellationOutcome::CancelRequested);

    let _unanswered_cancel = outbound.recv().await.expect("job_cancel frame");

    // La ventana de acuse (1s) expira en silencio.
    tokio::time::sleep(Duration::from_millis(1400)).await;

    let sealed = state.job_repository.get_job(&job_identifier).await.expect("read");
    assert_eq!(sealed.status, JobStatus::Cancelled, "best-effort seal on ack timeout");

    let trail = state
        .audit_repository
        .recent_for_subject(&job_identifier, 10)
        .await
        .expect("trail");
    assert!(trail
        .iter()
        .any(|(kind, detail, _)| kind == "job_cancelled" && detail == "cancel_ack_missing"));
}
