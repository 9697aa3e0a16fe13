// [tests/mirror/apps/orchestrator/services/reaper_reconciliation.test.rs]
/*!
 * =================================================================
 * APARATO: CERTIFICADOR DE CONCILIACIÓN DEL BARRENDERO (V4.1)
 * CLASIFICACIÓN: TRINITY EVIDENCE // ESTRATO L4-MIRROR
 * RESPONSABILIDAD: RAM REPORTADA vs LEDGER Y REPARACIÓN DE FICHA
 *
 * # Logic:
 * Una misión que el Ledger cree en vuelo pero que la unidad dejó de
 * reportar pasada la gracia debe volver a la cola; la misión que la
 * unidad sigue reportando conserva su candado; y la ficha de la
 * unidad queda reparada con el inventario superviviente del Ledger.
 * =================================================================
 */

use fabrica_domain_models::job::{JobPriority, JobStatus, JobSubmission};
use fabrica_domain_models::robot::{ResourceTelemetry, RobotPulse, RobotRegistration, RobotStatus};
use fabrica_infra_db::StoreClient;
use fabrica_infra_protocol::HeartbeatPayload;
use fabrica_orchestrator::bootstrap::OrchestratorConfig;
use fabrica_orchestrator::services::reaper::execute_sweep_cycle;
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

async fn enqueue_demo(state: &AppState, workflow: &str) -> String {
    state
        .job_repository
        .enqueue_job(&JobSubmission {
            workflow_name: workflow.to_string(),
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

/**
 * CONCILIACIÓN: la misión no reportada se libera, la reportada
 * conserva su candado y la ficha de la unidad queda reparada.
 */
#[tokio::test(flavor = "multi_thread")]
async fn certify_unreported_mission_release_and_row_repair() {
    println!("\n💀 [INICIO]: Auditoría de conciliación del barrendero V4.1...");

    let database_client =
        StoreClient::connect("file:mem_reaper_reconcile_v41?mode=memory&cache=shared", None)
            .await
            .expect("CRITICAL_FAULT: memory anchor");
    let state = AppState::new(database_client.clone(), rehearsal_config());

    // 1. GÉNESIS: unidad registrada con dos misiones reclamadas.
    state
        .robot_repository
        .register_robot(&RobotRegistration {
            robot_id: "unit-r1".to_string(),
            name: "Reconcile R1".to_string(),
            hostname: String::new(),
            tenant_id: "default".to_string(),
            environment: "default".to_string(),
            max_concurrent_jobs: 2,
            capabilities: Vec::new(),
            tags: Vec::new(),
        })
        .await
        .expect("register");

    let kept_mission = enqueue_demo(&state, "kept").await;
    let lost_mission = enqueue_demo(&state, "lost").await;
    state
        .job_repository
        .claim_pending_job(&kept_mission, "unit-r1")
        .await
        .expect("claim kept");
    state
        .job_repository
        .claim_pending_job(&lost_mission, "unit-r1")
        .await
        .expect("claim lost");

    // La ficha de la unidad aún cree poseer ambas misiones (deriva).
    state
        .robot_repository
        .record_status_pulse(&RobotPulse {
            robot_id: "unit-r1".to_string(),
            status: RobotStatus::Busy,
            current_jobs: 2,
            metrics: ResourceTelemetry::default(),
            active_job_ids: vec![kept_mission.clone(), lost_mission.clone()],
            observed_at: chrono::Utc::now().to_rfc3339(),
        })
        .await
        .expect("row pulse");

    // 2. ENLACE VIVO: la unidad reporta en su latido SOLO la misión viva.
    let (handle, _outbound) = RobotConnectionHandle::new(HandleIdentity {
        robot_id: "unit-r1".to_string(),
        robot_name: "Reconcile R1".to_string(),
        tenant_id: "default".to_string(),
        capabilities: Vec::new(),
        tags: Vec::new(),
        max_concurrent_jobs: 2,
    });
    state.fleet_registry.register_connection(Arc::clone(&handle));
    assert!(handle.try_reserve_job_slot(&kept_mission));
    assert!(handle.try_reserve_job_slot(&lost_mission));

    handle.absorb_heartbeat(&HeartbeatPayload {
        robot_id: "unit-r1".to_string(),
        status: "online".to_string(),
        current_jobs: 1,
        cpu_percent: 10.0,
        memory_percent: 20.0,
        disk_percent: 5.0,
        active_job_ids: vec![kept_mission.clone()],
    });

    // 3. ENVEJECIMIENTO: ambas asignaciones superan la gracia (30s).
    let database_connection = database_client.get_connection().expect("conn");
    for mission in [&kept_mission, &lost_mission] {
        database_connection
            .execute(
                "UPDATE jobs SET assigned_at = datetime('now', '-120 seconds')
                 WHERE job_id = ?1",
                libsql::params![mission.clone()],
            )
            .await
            .expect("aging");
    }

    // 4. BARRIDO
    execute_sweep_cycle(&state, Duration::from_secs(60)).await;

    // La misión no reportada volvió a la cola; la reportada sigue suya.
    assert_eq!(
        state.job_repository.get_job(&lost_mission).await.expect("read").status,
        JobStatus::Pending,
        "unreported mission must requeue"
    );
    let kept = state.job_repository.get_job(&kept_mission).await.expect("read");
    assert_eq!(kept.status, JobStatus::Assigned);
    assert_eq!(kept.assigned_robot_id.as_deref(), Some("unit-r1"));

    // La reserva en RAM de la misión perdida fue rendida.
    assert_eq!(handle.active_job_count(), 1);

    // Reparación de ficha: el inventario refleja el Ledger superviviente.
    let repaired_row = state.robot_repository.get_robot("unit-r1").await.expect("read row");
    assert_eq!(repaired_row.current_job_ids, vec![kept_mission.clone()]);

    let trail = state
        .audit_repository
        .recent_for_subject(&lost_mission, 10)
        .await
        .expect("trail");
    assert!(trail
        .iter()
        .any(|(kind, detail, _)| kind == "job_released" && detail == "unreported by owning unit"));

    println!("   ✅ [SUCCESS]: Reconciliation and row repair certified.");
}

/**
 * FRESCURA: una asignación dentro de la gracia jamás se juzga, aunque
 * la unidad aún no la reporte (ventana de vuelo del handshake).
 */
#[tokio::test(flavor = "multi_thread")]
async fn certify_grace_window_protects_fresh_assignments() {
    let database_client =
        StoreClient::connect("file:mem_reaper_grace_v41?mode=memory&cache=shared", None)
            .await
            .expect("memory anchor");
    let state = AppState::new(database_client, rehearsal_config());

    let fresh_mission = enqueue_demo(&state, "fresh").await;
    state
        .job_repository
        .claim_pending_job(&fresh_mission, "unit-r2")
        .await
        .expect("claim");

    let (handle, _outbound) = RobotConnectionHandle::new(HandleIdentity {
        robot_id: "unit-r2".to_string(),
        robot_name: "Reconcile R2".to_string(),
        tenant_id: "default".to_string(),
        capabilities: Vec::new(),
        tags: Vec::new(),
        max_concurrent_jobs: 1,
    });
    state.fleet_registry.register_connection(Arc::clone(&handle));
    assert!(handle.try_reserve_job_slot(&fresh_mission));

    // Latido fresco sin la misión (el acuse aún viaja por el canal).
    handle.absorb_heartbeat(&HeartbeatPayload {
        robot_id: "unit-r2".to_string(),
        status: "online".to_string(),
        current_jobs: 0,
        cpu_percent: 0.0,
        memory_percent: 0.0,
        disk_percent: 0.0,
        active_job_ids: Vec::new(),
    });

    execute_sweep_cycle(&state, Duration::from_secs(60)).await;

    assert_eq!(
        state.job_repository.get_job(&fresh_mission).await.expect("read").status,
        JobStatus::Assigned,
        "grace window must shield in-flight handshakes"
    );
    assert_eq!(handle.active_job_count(), 1);
}
