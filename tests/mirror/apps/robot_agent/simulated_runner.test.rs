// [tests/mirror/apps/robot_agent/simulated_runner.test.rs]
/*!
 * =================================================================
 * APARATO: CERTIFICADOR DEL RUNNER DE ENSAYO (V4.0)
 * CLASIFICACIÓN: TRINITY EVIDENCE // ESTRATO L1-MIRROR
 * RESPONSABILIDAD: AVANCE MONÓTONO Y CANCELACIÓN COOPERATIVA
 * =================================================================
 */

use fabrica_robot_lib::runner::{ProgressProbe, SimulatedWorkflowRunner, WorkflowRunner};
use serde_json::json;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;

#[tokio::test]
async fn certify_rehearsal_walks_declared_nodes() {
    println!("\n🎭 [INICIO]: Ensayo del runner simulado V4.0...");

    let runner = SimulatedWorkflowRunner::new(Duration::from_millis(5));
    let cancellation_flag = Arc::new(AtomicBool::new(false));
    let (tick_sender, mut tick_receiver) = tokio::sync::mpsc::channel(16);
    let probe = ProgressProbe::new(Arc::clone(&cancellation_flag), tick_sender);

    let workflow_definition = json!({
        "nodes": [{"id": "open"}, {"id": "extract"}, {"id": "archive"}]
    });

    let result = runner
        .execute("invoice-sweep".to_string(), workflow_definition, json!({}), probe)
        .await
        .expect("rehearsal must succeed");

    assert_eq!(result["nodes_executed"], json!(3));
    assert_eq!(result["workflow"], json!("invoice-sweep"));

    // El avance es monótono y culmina en 100.
    let mut observed_progress = Vec::new();
    while let Ok(tick) = tick_receiver.try_recv() {
        observed_progress.push((tick.progress_percent, tick.current_node));
    }
    assert_eq!(observed_progress.len(), 3);
    assert_eq!(observed_progress[0], (33, "open".to_string()));
    assert_eq!(observed_progress[1], (66, "extract".to_string()));
    assert_eq!(observed_progress[2], (100, "archive".to_string()));

    println!("   ✅ [SUCCESS]: Rehearsal runner certified.");
}

#[tokio::test]
async fn certify_cooperative_cancellation() {
    let runner = SimulatedWorkflowRunner::new(Duration::from_millis(5));
    let cancellation_flag = Arc::new(AtomicBool::new(true)); // aborto inmediato
    let (tick_sender, _tick_receiver) = tokio::sync::mpsc::channel(16);
    let probe = ProgressProbe::new(Arc::clone(&cancellation_flag), tick_sender);

    let fault = runner
        .execute(
            "doomed".to_string(),
            json!({"nodes": [{"id": "never-runs"}]}),
            json!({}),
            probe,
        )
        .await
        .expect_err("cancelled rehearsal must fail");

    assert_eq!(fault.error_type, "Cancelled");
    assert_eq!(fault.failed_node, "never-runs");
}

#[tokio::test]
async fn certify_nodeless_definition_single_step() {
    let runner = SimulatedWorkflowRunner::new(Duration::from_millis(1));
    let (tick_sender, mut tick_receiver) = tokio::sync::mpsc::channel(4);
    let probe = ProgressProbe::new(Arc::new(AtomicBool::new(false)), tick_sender);

    let result = runner
        .execute("bare".to_string(), json!({}), json!({}), probe)
        .await
        .expect("nodeless rehearsal");

    assert_eq!(result["nodes_executed"], json!(1));
    let only_tick = tick_receiver.try_recv().expect("single tick");
    assert_eq!(only_tick.progress_percent, 100);
}
