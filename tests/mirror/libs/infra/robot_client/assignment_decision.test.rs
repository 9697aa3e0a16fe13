// [tests/mirror/libs/infra/robot_client/assignment_decision.test.rs]
/*!
 * =================================================================
 * APARATO: CERTIFICADOR DE LA COMPUERTA DE ACEPTACIÓN (V4.0)
 * CLASIFICACIÓN: TRINITY EVIDENCE // ESTRATO L3-MIRROR
 * RESPONSABILIDAD: DECISIÓN PURA DE ACEPTAR O RECHAZAR MISIONES
 *
 * # Logic:
 * La compuerta replica el contrato del canal: una unidad pausada o
 * saturada rechaza con una razón estable que el orquestador audita.
 * =================================================================
 */

use fabrica_infra_robot_client::client::evaluate_assignment_gate;

#[test]
fn certify_gate_accepts_with_free_capacity() {
    assert_eq!(evaluate_assignment_gate(false, 0, 1), None);
    assert_eq!(evaluate_assignment_gate(false, 2, 3), None);
}

#[test]
fn certify_gate_rejects_when_paused() {
    // La pausa domina incluso con capacidad libre.
    assert_eq!(evaluate_assignment_gate(true, 0, 4), Some("Robot is paused"));
}

#[test]
fn certify_gate_rejects_at_saturation() {
    assert_eq!(
        evaluate_assignment_gate(false, 1, 1),
        Some("Maximum concurrent jobs reached")
    );
    // La saturación por exceso (deriva de inventario) también veta.
    assert_eq!(
        evaluate_assignment_gate(false, 5, 2),
        Some("Maximum concurrent jobs reached")
    );
}
