// [tests/mirror/apps/orchestrator/state/pending_reply_tracker.test.rs]
/*!
 * =================================================================
 * APARATO: CERTIFICADOR DEL TRACKER DE RESPUESTAS (V4.0)
 * CLASIFICACIÓN: TRINITY EVIDENCE // ESTRATO L3-MIRROR
 * RESPONSABILIDAD: CORRELACIÓN DE FUTUROS, IGNORADOS Y TIMEOUTS
 * =================================================================
 */

use fabrica_infra_protocol::{MessageBody, WireMessage};
use fabrica_orchestrator::state::fleet_registry::{HandleIdentity, RobotConnectionHandle};
use std::time::Duration;
use uuid::Uuid;

fn rehearsal_identity() -> HandleIdentity {
    HandleIdentity {
        robot_id: "unit-alpha-01".to_string(),
        robot_name: "Alpha 01".to_string(),
        tenant_id: "default".to_string(),
        capabilities: Vec::new(),
        tags: Vec::new(),
        max_concurrent_jobs: 1,
    }
}

#[tokio::test]
async fn certify_correlated_resolution() {
    println!("\n🎯 [INICIO]: Auditoría del tracker de respuestas V4.0...");

    let (handle, _outbound) = RobotConnectionHandle::new(rehearsal_identity());

    let assignment = WireMessage::fresh(MessageBody::JobAssign(Default::default()));
    let reply_future = handle.register_pending_reply(assignment.message_id);

    // La respuesta correlacionada completa el futuro exacto.
    let acceptance = WireMessage::reply_to(
        assignment.message_id,
        MessageBody::JobAccept {
            job_id: "j-1".to_string(),
            robot_id: "unit-alpha-01".to_string(),
        },
    );
    assert!(handle.resolve_pending_reply(&assignment.message_id, acceptance));

    let delivered = reply_future.await.expect("future must resolve");
    assert!(matches!(delivered.body, MessageBody::JobAccept { .. }));

    // Un segundo intento sobre la misma llave se ignora por contrato.
    let late_duplicate = WireMessage::reply_to(
        assignment.message_id,
        MessageBody::JobAccept {
            job_id: "j-1".to_string(),
            robot_id: "unit-alpha-01".to_string(),
        },
    );
    assert!(!handle.resolve_pending_reply(&assignment.message_id, late_duplicate));

    println!("   ✅ [SUCCESS]: Correlation discipline certified.");
}

#[tokio::test]
async fn certify_uncorrelated_replies_are_ignored() {
    let (handle, _outbound) = RobotConnectionHandle::new(rehearsal_identity());

    let phantom_reply = WireMessage::reply_to(
        Uuid::new_v4(),
        MessageBody::JobReject {
            job_id: "j-ghost".to_string(),
            robot_id: "unit-alpha-01".to_string(),
            reason: "never asked".to_string(),
        },
    );

    // Sin petición pendiente no hay pánico ni efecto alguno.
    assert!(!handle.resolve_pending_reply(&phantom_reply.correlation_id.unwrap(), phantom_reply.clone()));
}

#[tokio::test]
async fn certify_disconnect_fails_futures_within_window() {
    let (handle, _outbound) = RobotConnectionHandle::new(rehearsal_identity());

    let assignment = WireMessage::fresh(MessageBody::JobAssign(Default::default()));
    let reply_future = handle.register_pending_reply(assignment.message_id);

    // La desconexión falla el futuro de inmediato: el llamador observa
    // el fallo mucho antes de agotar su ventana de espera.
    handle.fail_all_pending();
    handle.request_close();

    let verdict = tokio::time::timeout(Duration::from_millis(100), reply_future).await;
    assert!(
        matches!(verdict, Ok(Err(_))),
        "failed future must surface immediately, not via timeout"
    );

    // Tras el cierre, el handle rechaza nuevas tramas.
    let post_mortem = WireMessage::fresh(MessageBody::HeartbeatAck);
    assert!(handle.send_frame(post_mortem).await.is_err());
}
