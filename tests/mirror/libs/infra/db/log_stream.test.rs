// [tests/mirror/libs/infra/db/log_stream.test.rs]
/*!
 * =================================================================
 * APARATO: CERTIFICADOR DEL FLUJO DE DIAGNÓSTICO (V4.0)
 * CLASIFICACIÓN: TRINITY EVIDENCE // ESTRATO L3-MIRROR
 * RESPONSABILIDAD: APPEND-ONLY, RÁFAGAS TRANSACCIONALES Y AUDITORÍA
 * =================================================================
 */

use fabrica_domain_models::logging::{LogEntryRecord, LogLevel};
use fabrica_infra_db::repositories::{AuditRepository, LogRepository};
use fabrica_infra_db::StoreClient;
use serde_json::json;

fn entry(job_id: &str, level: LogLevel, message: &str) -> LogEntryRecord {
    LogEntryRecord {
        job_id: job_id.to_string(),
        robot_id: "unit-alpha-01".to_string(),
        level,
        source: "robot".to_string(),
        message: message.to_string(),
        node_id: Some("n-1".to_string()),
        extra: Some(json!({"attempt": 1})),
        emitted_at: chrono::Utc::now().to_rfc3339(),
    }
}

#[tokio::test]
async fn certify_append_only_stream() {
    println!("\n📜 [INICIO]: Auditoría del flujo de diagnóstico V4.0...");

    let database_client =
        StoreClient::connect("file:mem_log_stream_v40?mode=memory&cache=shared", None)
            .await
            .expect("CRITICAL_FAULT: memory anchor");
    let log_repository = LogRepository::new(database_client.clone());

    // 1. ENTRADA INDIVIDUAL + RASTRO DE AVANCE
    log_repository
        .append_entry(&entry("j-1", LogLevel::Info, "navigating inbox"))
        .await
        .expect("APPEND_FAULT");
    log_repository
        .append_progress("j-1", "unit-alpha-01", 40, "open-browser", "navigating")
        .await
        .expect("PROGRESS_FAULT");

    // 2. RÁFAGA TRANSACCIONAL
    let burst: Vec<LogEntryRecord> = (0..5)
        .map(|index| entry("j-1", LogLevel::Warning, &format!("retry {}", index)))
        .collect();
    assert_eq!(log_repository.append_batch(&burst).await.expect("BATCH_FAULT"), 5);

    // 3. RECUPERACIÓN EN ORDEN DE EMISIÓN
    let recovered = log_repository.fetch_recent("j-1", 100).await.expect("FETCH_FAULT");
    assert_eq!(recovered.len(), 7);
    assert_eq!(recovered[0].message, "navigating inbox");
    assert_eq!(recovered[1].source, "progress");
    assert_eq!(recovered[1].message, "40% navigating");
    assert_eq!(recovered[6].level, LogLevel::Warning);
    assert_eq!(recovered[6].extra, Some(json!({"attempt": 1})));

    // 4. AISLAMIENTO POR MISIÓN
    assert!(log_repository.fetch_recent("j-2", 100).await.expect("FETCH_FAULT").is_empty());

    println!("   ✅ [SUCCESS]: Diagnostic stream certified.");
}

#[tokio::test]
async fn certify_audit_trail() {
    let database_client =
        StoreClient::connect("file:mem_audit_trail_v40?mode=memory&cache=shared", None)
            .await
            .expect("memory anchor");
    let audit_repository = AuditRepository::new(database_client.clone());

    audit_repository
        .append("job_rejected", "j-9", "unit-alpha-01", "busy")
        .await
        .expect("AUDIT_FAULT");
    audit_repository
        .append("job_cancelled", "j-9", "operator", "cancel_ack_missing")
        .await
        .expect("AUDIT_FAULT");

    let trail = audit_repository.recent_for_subject("j-9", 10).await.expect("TRAIL_FAULT");
    assert_eq!(trail.len(), 2);
    // Más nuevas primero.
    assert_eq!(trail[0].0, "job_cancelled");
    assert_eq!(trail[0].1, "cancel_ack_missing");
    assert_eq!(trail[1].0, "job_rejected");
}
