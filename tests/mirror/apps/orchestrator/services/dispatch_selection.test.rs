// [tests/mirror/apps/orchestrator/services/dispatch_selection.test.rs]
/*!
 * =================================================================
 * APARATO: CERTIFICADOR DEL DESEMPATE DE DESPACHO (V4.0)
 * CLASIFICACIÓN: TRINITY EVIDENCE // ESTRATO L4-MIRROR
 * RESPONSABILIDAD: ORDEN DETERMINISTA DE CANDIDATAS
 *
 * # Logic:
 * El desempate es: menos misiones en vuelo, latido más reciente,
 * orden estable por robot_id. El determinismo del emparejamiento es
 * lo que hace reproducible el comportamiento de la flota.
 * =================================================================
 */

use fabrica_orchestrator::services::dispatcher::{select_candidate_index, CandidateProfile};

fn profile(robot_id: &str, active_jobs: usize, heartbeat_age_ms: u128) -> CandidateProfile {
    CandidateProfile {
        robot_id: robot_id.to_string(),
        active_jobs,
        heartbeat_age_ms,
    }
}

#[test]
fn certify_fewest_active_jobs_wins() {
    let profiles = vec![
        profile("unit-b", 2, 100),
        profile("unit-a", 0, 5000),
        profile("unit-c", 1, 10),
    ];

    let chosen = select_candidate_index(&profiles).expect("candidate");
    assert_eq!(profiles[chosen].robot_id, "unit-a", "idle unit must win regardless of heartbeat");
}

#[test]
fn certify_freshest_heartbeat_breaks_load_tie() {
    let profiles = vec![
        profile("unit-a", 1, 9000),
        profile("unit-b", 1, 120),
        profile("unit-c", 1, 4000),
    ];

    let chosen = select_candidate_index(&profiles).expect("candidate");
    assert_eq!(profiles[chosen].robot_id, "unit-b");
}

#[test]
fn certify_stable_identifier_breaks_full_tie() {
    let profiles = vec![
        profile("unit-c", 1, 500),
        profile("unit-a", 1, 500),
        profile("unit-b", 1, 500),
    ];

    let chosen = select_candidate_index(&profiles).expect("candidate");
    assert_eq!(profiles[chosen].robot_id, "unit-a", "full tie resolves by stable robot_id");

    // El veredicto es invariante ante permutaciones de entrada.
    let permuted = vec![
        profile("unit-b", 1, 500),
        profile("unit-c", 1, 500),
        profile("unit-a", 1, 500),
    ];
    let chosen_again = select_candidate_index(&permuted).expect("candidate");
    assert_eq!(permuted[chosen_again].robot_id, "unit-a");
}

#[test]
fn certify_empty_snapshot_yields_none() {
    assert!(select_candidate_index(&[]).is_none());
}
