// [libs/domain/models/src/tests_serialization.rs]
/**
 * =================================================================
 * APARATO: DOMAIN SERIALIZATION TEST (V4.1 - CONTRACT PARITY)
 * CLASIFICACIÓN: TRINITY EVIDENCE (ESTRATO L2-MODELS)
 * RESPONSABILIDAD: CERTIFICACIÓN DE PARIDAD JSON DE CONTRATOS
 *
 * # Mathematical Proof (Wire Parity):
 * Toda entidad que cruza el túnel WebSocket o la API REST debe
 * sobrevivir el ciclo Struct -> JSON -> Struct sin deriva de campos,
 * preservando los renombres de serde que consume el Dashboard.
 * =================================================================
 */

use crate::events::FleetEvent;
use crate::job::{JobPriority, JobStatus, JobSubmission};
use crate::logging::LogLevel;
use crate::robot::{ResourceTelemetry, RobotPulse, RobotRegistration, RobotStatus};
use serde_json::json;

/**
 * CERTIFICACIÓN: Roundtrip del pulso biométrico con renombres de wire.
 */
#[test]
fn certify_robot_pulse_wire_parity() {
    println!("\n🧪 [PROVING_GROUNDS]: Validating RobotPulse wire parity...");

    let pulse_instance = RobotPulse {
        robot_id: "unit-alpha-01".to_string(),
        status: RobotStatus::Busy,
        current_jobs: 2,
        metrics: ResourceTelemetry {
            cpu_percent: 73.5,
            memory_percent: 41.0,
            disk_percent: 12.25,
        },
        active_job_ids: vec!["j-1".into(), "j-2".into()],
        observed_at: "2026-02-11T10:00:00+00:00".to_string(),
    };

    let serialized_json = serde_json::to_string(&pulse_instance)
        .expect("CRITICAL_FAULT: Serialization strata collapsed.");

    // Auditoría de firma de protocolo: renombres exactos para el Dashboard.
    assert!(serialized_json.contains("\"robot_identifier\""));
    assert!(serialized_json.contains("\"cpu_load_percentage\""));
    assert!(serialized_json.contains("\"busy\""));

    let recovered: RobotPulse = serde_json::from_str(&serialized_json)
        .expect("CRITICAL_FAULT: Deserialization failed. Schema drift detected.");

    assert_eq!(recovered.robot_id, "unit-alpha-01");
    assert_eq!(recovered.status, RobotStatus::Busy);
    assert_eq!(recovered.active_job_ids.len(), 2);
    assert_eq!(recovered.metrics, pulse_instance.metrics);

    println!("   ✅ [SUCCESS]: Pulse contract parity confirmed.");
}

/**
 * CERTIFICACIÓN: Defaults de encolado y absorción de estados terminales.
 */
#[test]
fn certify_job_submission_defaults_and_terminal_algebra() {
    // Un envío mínimo debe hidratar tenant, prioridad y timeout por defecto.
    let minimal_submission: JobSubmission = serde_json::from_value(json!({
        "workflow_name": "invoice-sweep",
        "workflow_payload": {"nodes": []}
    }))
    .expect("SUBMISSION_FAULT: minimal payload rejected.");

    assert_eq!(minimal_submission.tenant_id, "default");
    assert_eq!(minimal_submission.priority, JobPriority::Normal);
    assert_eq!(minimal_submission.timeout_seconds, 3600);
    assert!(minimal_submission.requested_robot_id.is_none());

    // Álgebra de estados: el conjunto terminal es absorbente y cerrado.
    for terminal in [
        JobStatus::Succeeded,
        JobStatus::Failed,
        JobStatus::Cancelled,
        JobStatus::TimedOut,
    ] {
        assert!(terminal.is_terminal());
        assert_eq!(JobStatus::from_label(terminal.as_label()), terminal);
    }
    assert!(!JobStatus::Pending.is_terminal());
    assert!(!JobStatus::Running.is_terminal());

    // La prioridad crítica domina el rango de despacho.
    assert!(JobPriority::Critical.dispatch_rank() > JobPriority::High.dispatch_rank());
    assert!(JobPriority::High.dispatch_rank() > JobPriority::Normal.dispatch_rank());
}

/**
 * CERTIFICACIÓN: Registro con defaults y severidad de logs tolerante.
 */
#[test]
fn certify_registration_defaults_and_log_levels() {
    let registration: RobotRegistration = serde_json::from_value(json!({
        "robot_identifier": "unit-beta-02",
        "name": "Beta 02"
    }))
    .expect("REGISTRATION_FAULT: minimal payload rejected.");

    assert_eq!(registration.tenant_id, "default");
    assert_eq!(registration.max_concurrent_jobs, 1);
    assert!(registration.capabilities.is_empty());

    // Etiquetas legadas ("WARN", "CRITICAL") se normalizan sin pánico.
    assert_eq!(LogLevel::from_label("WARN"), LogLevel::Warning);
    assert_eq!(LogLevel::from_label("CRITICAL"), LogLevel::Error);
    assert_eq!(LogLevel::from_label("whatever"), LogLevel::Info);
    assert!(LogLevel::Error.severity_rank() > LogLevel::Warning.severity_rank());
}

/**
 * CERTIFICACIÓN: La unión discriminada del bus preserva discriminadores cortos.
 */
#[test]
fn certify_fleet_event_discriminators() {
    let event_instance = FleetEvent::JobTerminal {
        job_identifier: "j-9".to_string(),
        robot_identifier: "unit-alpha-01".to_string(),
        status: JobStatus::Succeeded,
        summary: "workflow sealed".to_string(),
    };

    let serialized_json =
        serde_json::to_string(&event_instance).expect("EVENT_FAULT: serialization collapsed.");

    assert!(serialized_json.contains("\"t\":\"jt\""));

    let recovered: FleetEvent = serde_json::from_str(&serialized_json)
        .expect("EVENT_FAULT: deserialization drift detected.");

    match recovered {
        FleetEvent::JobTerminal { status, .. } => assert_eq!(status, JobStatus::Succeeded),
        other => panic!("INTEGRITY_COLLAPSE: variant corrupted during transit: {:?}", other),
    }
}
