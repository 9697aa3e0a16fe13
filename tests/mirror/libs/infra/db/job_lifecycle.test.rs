// [tests/mirror/libs/infra/db/job_lifecycle.test.rs]
/*!
 * =================================================================
 * APARATO: CERTIFICADOR DE CICLO DE VIDA DE MISIONES (V4.2 - ZENITH)
 * CLASIFICACIÓN: TRINITY EVIDENCE // ESTRATO L3-MIRROR
 * RESPONSABILIDAD: AUDITORÍA DE CANDADOS ACID Y ESTADOS ABSORBENTES
 *
 * # Mathematical Proof (ACID Mission Lifecycle):
 * El Ledger actúa como semáforo atómico: una misión solo puede ser
 * reclamada por una única unidad, los estados terminales absorben, y
 * la liberación devuelve la misión intacta a la cola global.
 * =================================================================
 */

use fabrica_domain_models::job::{JobPriority, JobStatus, JobSubmission};
use fabrica_infra_db::repositories::JobRepository;
use fabrica_infra_db::{DbError, StoreClient};
use serde_json::json;

fn submission(workflow: &str, priority: JobPriority) -> JobSubmission {
    JobSubmission {
        workflow_name: workflow.to_string(),
        workflow_payload: json!({"nodes": []}),
        parameters: json!({}),
        tenant_id: "default".to_string(),
        requested_robot_id: None,
        required_capabilities: Vec::new(),
        priority,
        timeout_seconds: 600,
    }
}

/**
 * CERTIFICACIÓN: [Pending -> Assigned -> Running -> Succeeded] con
 * protección contra robo de misión y sellado idempotente.
 */
#[tokio::test]
async fn certify_mission_ledger_lifecycle() {
    println!("\n🗄️  [INICIO]: Auditoría del Ciclo de Vida de Misiones V4.2...");
    let mut accumulated_anomalies_count = 0;

    // 1. SETUP: Infraestructura volátil (RAM con caché compartido)
    let database_client = StoreClient::connect("file:mem_job_lifecycle_v42?mode=memory&cache=shared", None)
        .await
        .expect("CRITICAL_FAULT: Failed to anchor in-memory fleet ledger.");
    let job_repository = JobRepository::new(database_client.clone());

    // 2. FASE DE PROVISIÓN (Génesis)
    println!("   🧪 Fase 1: Inyectando misión de prueba en cola...");
    let job_identifier = job_repository
        .enqueue_job(&submission("demo", JobPriority::Normal))
        .await
        .expect("DB_INSERT_FAULT: Genesis injection failed.");

    let queued_job = job_repository.get_job(&job_identifier).await.expect("read-back");
    assert_eq!(queued_job.status, JobStatus::Pending);
    assert!(queued_job.assigned_robot_id.is_none());

    // 3. FASE DE ASIGNACIÓN (Theft Protection Guard)
    println!("   🧪 Fase 2: Validando protección contra colisión de propiedad...");
    job_repository
        .claim_pending_job(&job_identifier, "UNIT_ALPHA")
        .await
        .expect("DISPATCH_FAULT: Unit ALPHA failed to acquire mission.");

    match job_repository.claim_pending_job(&job_identifier, "UNIT_BETA").await {
        Err(DbError::OwnershipConflict) => {
            println!("      ✅ Exclusividad de Propiedad: Certificada.");
        }
        other => {
            println!("      ❌ FALLO: doble asignación tolerada: {:?}", other.is_ok());
            accumulated_anomalies_count += 1;
        }
    }

    // 4. FASE DE AVANCE (Pacemaker + candado de propietario)
    println!("   🧪 Fase 3: Validando el candado del rastro de avance...");
    assert!(matches!(
        job_repository.record_progress(&job_identifier, "UNIT_BETA", 10, "n-1").await,
        Err(DbError::OwnershipConflict)
    ));

    job_repository
        .record_progress(&job_identifier, "UNIT_ALPHA", 40, "open-browser")
        .await
        .expect("CHECKPOINT_FAULT: owner progress rejected.");

    let running_job = job_repository.get_job(&job_identifier).await.expect("read-back");
    assert_eq!(running_job.status, JobStatus::Running);
    assert_eq!(running_job.progress_percent, 40);
    assert!(running_job.started_at.is_some(), "first progress must seal started_at");

    // El avance fuera de rango se acota a [0,100].
    job_repository
        .record_progress(&job_identifier, "UNIT_ALPHA", 250, "n-x")
        .await
        .expect("clamped progress");
    assert_eq!(
        job_repository.get_job(&job_identifier).await.expect("read").progress_percent,
        100
    );

    // 5. FASE DE SELLADO (Absorbing Terminal)
    println!("   🧪 Fase 4: Validando el sellado terminal idempotente...");
    let first_seal = job_repository
        .record_terminal(&job_identifier, JobStatus::Succeeded, Some(json!({"rows": 3}).to_string()), None)
        .await
        .expect("SEAL_FAULT");
    assert!(first_seal, "first terminal call must advance");

    let second_seal = job_repository
        .record_terminal(&job_identifier, JobStatus::Succeeded, None, None)
        .await
        .expect("SEAL_FAULT");
    assert!(!second_seal, "repeated terminal call must be a certified no-op");

    // Un estado absorbente jamás retrocede, ni siquiera hacia otro terminal.
    let cross_seal = job_repository
        .record_terminal(&job_identifier, JobStatus::Failed, None, Some("late".into()))
        .await
        .expect("SEAL_FAULT");
    assert!(!cross_seal);
    assert_eq!(
        job_repository.get_job(&job_identifier).await.expect("read").status,
        JobStatus::Succeeded
    );

    // Una misión sellada tampoco puede liberarse.
    assert!(!job_repository.release_job(&job_identifier).await.expect("release probe"));

    assert_eq!(accumulated_anomalies_count, 0, "La integridad del Ledger ha sido comprometida.");
    println!("\n🏁 [INFORME]: Ciclo de vida certificado sin anomalías.");
}

/**
 * CERTIFICACIÓN: Orden de despacho (prioridad DESC, FIFO intra-banda)
 * y liberación hacia la cola global.
 */
#[tokio::test]
async fn certify_priority_ordering_and_release() {
    let database_client = StoreClient::connect("file:mem_job_priority_v42?mode=memory&cache=shared", None)
        .await
        .expect("memory anchor");
    let job_repository = JobRepository::new(database_client.clone());

    let low = job_repository.enqueue_job(&submission("low", JobPriority::Low)).await.expect("enqueue");
    let normal_first = job_repository.enqueue_job(&submission("n1", JobPriority::Normal)).await.expect("enqueue");
    let normal_second = job_repository.enqueue_job(&submission("n2", JobPriority::Normal)).await.expect("enqueue");
    let critical = job_repository.enqueue_job(&submission("crit", JobPriority::Critical)).await.expect("enqueue");

    let batch = job_repository.fetch_pending_batch(10).await.expect("batch");
    let batch_ids: Vec<&str> = batch.iter().map(|job| job.job_id.as_str()).collect();

    assert_eq!(batch_ids[0], critical, "critical always wins the next slot");
    assert_eq!(batch_ids[1], normal_first, "FIFO within the priority band");
    assert_eq!(batch_ids[2], normal_second);
    assert_eq!(batch_ids[3], low);

    // Liberación: assigned -> pending deja la misión re-despachable.
    job_repository.claim_pending_job(&critical, "UNIT_ALPHA").await.expect("claim");
    assert!(job_repository.release_job(&critical).await.expect("release"));

    let released = job_repository.get_job(&critical).await.expect("read");
    assert_eq!(released.status, JobStatus::Pending);
    assert!(released.assigned_robot_id.is_none());
    assert_eq!(released.progress_percent, 0);

    // El contador de rechazos alimenta el escudo anti-inanición.
    assert_eq!(job_repository.record_rejection(&critical).await.expect("reject count"), 1);
    assert_eq!(job_repository.record_rejection(&critical).await.expect("reject count"), 2);
}

/**
 * CERTIFICACIÓN: Vencimiento pasivo y liberación de unidades caídas.
 */
#[tokio::test]
async fn certify_overdue_and_orphan_sweeps() {
    let database_client = StoreClient::connect("file:mem_job_sweeps_v42?mode=memory&cache=shared", None)
        .await
        .expect("memory anchor");
    let job_repository = JobRepository::new(database_client.clone());

    let overdue = job_repository.enqueue_job(&submission("overdue", JobPriority::Normal)).await.expect("enqueue");
    let orphan = job_repository.enqueue_job(&submission("orphan", JobPriority::Normal)).await.expect("enqueue");

    job_repository.claim_pending_job(&overdue, "UNIT_GHOST").await.expect("claim");
    job_repository.claim_pending_job(&orphan, "UNIT_GHOST").await.expect("claim");

    // Envejecimiento artificial: la misión arrancó hace dos horas con
    // una ventana de 600s.
    let database_connection = database_client.get_connection().expect("conn");
    database_connection
        .execute(
            "UPDATE jobs SET status = 'running', started_at = datetime('now', '-7200 seconds')
             WHERE job_id = ?1",
            libsql::params![overdue.clone()],
        )
        .await
        .expect("aging");

    let sealed_overdue = job_repository.mark_timed_out_overdue(60).await.expect("sweep");
    assert_eq!(sealed_overdue, vec![overdue.clone()]);
    assert_eq!(
        job_repository.get_job(&overdue).await.expect("read").status,
        JobStatus::TimedOut
    );

    // La caída de la unidad libera únicamente sus misiones no terminales.
    let released = job_repository.release_jobs_for_robot("UNIT_GHOST").await.expect("orphan sweep");
    assert_eq!(released, vec![orphan.clone()]);
    assert_eq!(
        job_repository.get_job(&orphan).await.expect("read").status,
        JobStatus::Pending
    );
    // La misión vencida permanece absorbida.
    assert_eq!(
        job_repository.get_job(&overdue).await.expect("read").status,
        JobStatus::TimedOut
    );
}
