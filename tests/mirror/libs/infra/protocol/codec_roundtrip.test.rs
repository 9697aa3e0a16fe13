// [tests/mirror/libs/infra/protocol/codec_roundtrip.test.rs]
/*!
 * =================================================================
 * APARATO: CERTIFICADOR DE BIYECCIÓN DEL CODEC (V4.1 - ZENITH)
 * CLASIFICACIÓN: TRINITY EVIDENCE // ESTRATO L3-MIRROR
 * RESPONSABILIDAD: AUDITORÍA DE PARIDAD Decode ∘ Encode = id
 *
 * # Mathematical Proof (Bijection):
 * Sobre el subconjunto de mensajes bien formados, decodificar lo
 * codificado debe devolver el mensaje original bit-a-bit: identidad,
 * marca temporal, correlación y payload.
 * =================================================================
 */

use fabrica_infra_protocol::{
    decode_frame, encode_frame, HeartbeatPayload, JobAssignPayload, JobCompletePayload,
    JobFailedPayload, JobProgressPayload, LogBatchItem, LogBatchPayload, LogEntryPayload,
    MessageBody, RegisterAckConfig, RegisterAckPayload, RegisterPayload, WireMessage,
};
use serde_json::json;
use uuid::Uuid;

fn representative_catalog() -> Vec<WireMessage> {
    vec![
        WireMessage::fresh(MessageBody::Register(RegisterPayload {
            robot_id: "unit-alpha-01".into(),
            robot_name: "Alpha 01".into(),
            hostname: "alpha-host".into(),
            tenant_id: "acme".into(),
            environment: "production".into(),
            max_concurrent_jobs: 3,
            tags: vec!["night-shift".into()],
            capabilities: vec!["browser".into(), "desktop".into()],
            auth_token: Some("rsk_secret".into()),
        })),
        WireMessage::fresh(MessageBody::RegisterAck(RegisterAckPayload {
            success: true,
            message: "unit registered".into(),
            config: RegisterAckConfig { heartbeat_interval: 30 },
        })),
        WireMessage::fresh(MessageBody::Heartbeat(HeartbeatPayload {
            robot_id: "unit-alpha-01".into(),
            status: "busy".into(),
            current_jobs: 2,
            cpu_percent: 74.5,
            memory_percent: 31.0,
            disk_percent: 12.0,
            active_job_ids: vec!["j-1".into(), "j-2".into()],
        })),
        WireMessage::fresh(MessageBody::HeartbeatAck),
        WireMessage::fresh(MessageBody::JobAssign(JobAssignPayload {
            job_id: "j-9".into(),
            workflow_id: "j-9".into(),
            workflow_name: "invoice-sweep".into(),
            workflow_json: json!({"nodes": [{"id": "open-browser"}]}),
            priority: "high".into(),
            timeout_seconds: 600,
            parameters: json!({"target": "inbox"}),
        })),
        WireMessage::fresh(MessageBody::JobProgress(JobProgressPayload {
            job_id: "j-9".into(),
            robot_id: "unit-alpha-01".into(),
            progress: 40,
            current_node: "open-browser".into(),
            message: "navigating".into(),
        })),
        WireMessage::fresh(MessageBody::JobComplete(JobCompletePayload {
            job_id: "j-9".into(),
            robot_id: "unit-alpha-01".into(),
            result: json!({"rows": 12}),
            duration_ms: 5400,
        })),
        WireMessage::fresh(MessageBody::JobFailed(JobFailedPayload {
            job_id: "j-9".into(),
            robot_id: "unit-alpha-01".into(),
            error_message: "selector vanished".into(),
            error_type: "ExecutionError".into(),
            stack_trace: "".into(),
            failed_node: "click-submit".into(),
        })),
        WireMessage::fresh(MessageBody::JobCancel {
            job_id: "j-9".into(),
            reason: "operator request".into(),
        }),
        WireMessage::fresh(MessageBody::LogEntry(LogEntryPayload {
            job_id: "j-9".into(),
            robot_id: "unit-alpha-01".into(),
            level: "WARNING".into(),
            message: "retrying selector".into(),
            node_id: "click-submit".into(),
            extra: Some(json!({"attempt": 2})),
        })),
        WireMessage::fresh(MessageBody::LogBatch(LogBatchPayload {
            job_id: "j-9".into(),
            robot_id: "unit-alpha-01".into(),
            entries: vec![
                LogBatchItem {
                    level: "INFO".into(),
                    message: "step one".into(),
                    node_id: "n-1".into(),
                    extra: None,
                },
                LogBatchItem {
                    level: "ERROR".into(),
                    message: "step two".into(),
                    node_id: "n-2".into(),
                    extra: Some(json!({"code": 7})),
                },
            ],
        })),
        WireMessage::fresh(MessageBody::StatusRequest),
        WireMessage::fresh(MessageBody::Pause),
        WireMessage::fresh(MessageBody::Resume),
        WireMessage::fresh(MessageBody::Shutdown { graceful: false }),
        WireMessage::fresh(MessageBody::Disconnect {
            robot_id: "unit-alpha-01".into(),
            reason: "maintenance window".into(),
        }),
        WireMessage::fresh(MessageBody::Error {
            error_code: "AUTH_REJECTED".into(),
            error_message: "invalid credential".into(),
        }),
    ]
}

/**
 * CERTIFICACIÓN: Roundtrip del catálogo completo del canal.
 */
#[test]
fn certify_full_catalog_bijection() {
    println!("\n📡 [INICIO]: Auditoría de biyección del codec V4.1...");
    let mut audited_frames_count = 0;

    for original_message in representative_catalog() {
        let encoded_frame = encode_frame(&original_message)
            .expect("CRITICAL_FAULT: Encoding strata collapsed.");

        let recovered_message = decode_frame(&encoded_frame)
            .expect("CRITICAL_FAULT: Decoding strata collapsed.");

        assert_eq!(
            recovered_message, original_message,
            "BIJECTION_VIOLATION on type '{}'",
            original_message.body.type_label()
        );
        audited_frames_count += 1;
    }

    println!("   ✅ [SUCCESS]: {} catalog frames preserved bit-perfectly.", audited_frames_count);
}

/**
 * CERTIFICACIÓN: Disciplina de correlación de respuestas.
 */
#[test]
fn certify_correlation_discipline() {
    let assignment = WireMessage::fresh(MessageBody::JobAssign(JobAssignPayload {
        job_id: "j-1".into(),
        workflow_name: "demo".into(),
        workflow_json: json!({}),
        ..Default::default()
    }));

    assert!(assignment.expects_reply(), "job_assign must register a pending future");
    assert!(assignment.correlation_id.is_none());

    let acceptance = WireMessage::reply_to(
        assignment.message_id,
        MessageBody::JobAccept {
            job_id: "j-1".into(),
            robot_id: "unit-alpha-01".into(),
        },
    );

    assert_eq!(acceptance.correlation_id, Some(assignment.message_id));
    assert!(!acceptance.expects_reply());

    // El roundtrip preserva la llave de correlación.
    let recovered = decode_frame(&encode_frame(&acceptance).expect("encode")).expect("decode");
    assert_eq!(recovered.correlation_id, Some(assignment.message_id));
    assert_ne!(recovered.message_id, assignment.message_id, "reply carries a fresh identity");
}

/**
 * CERTIFICACIÓN: Sobres defectuosos se rechazan con diagnóstico.
 */
#[test]
fn certify_malformed_envelope_rejection() {
    // Sobre ilegible
    assert!(decode_frame("not-json-at-all").is_err());

    // Identidad ausente
    assert!(decode_frame("{\"type\": \"heartbeat\", \"ts\": \"2026-01-01T00:00:00Z\"}").is_err());

    // Payload que traiciona su tipo declarado (job_id obligatorio)
    let schema_drift = format!(
        "{{\"id\": \"{}\", \"type\": \"job_assign\", \"ts\": \"2026-01-01T00:00:00Z\", \"payload\": {{}} }}",
        Uuid::new_v4()
    );
    assert!(decode_frame(&schema_drift).is_err());

    // Payload ausente en un tipo sin campos obligatorios: tolerado.
    let bare_ack = format!(
        "{{\"id\": \"{}\", \"type\": \"heartbeat_ack\", \"ts\": \"2026-01-01T00:00:00Z\"}}",
        Uuid::new_v4()
    );
    let recovered = decode_frame(&bare_ack).expect("bare heartbeat_ack must decode");
    assert_eq!(recovered.body, MessageBody::HeartbeatAck);
}
