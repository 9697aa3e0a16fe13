// [tests/mirror/apps/orchestrator/middleware/rate_limit_matrix.test.rs]
/*!
 * =================================================================
 * APARATO: CERTIFICADOR DE LA MATRIZ DE TRÁFICO (V4.0)
 * CLASIFICACIÓN: TRINITY EVIDENCE // ESTRATO L4-MIRROR
 * RESPONSABILIDAD: TECHOS POR ETIQUETA Y AISLAMIENTO POR FUENTE
 * =================================================================
 */

use axum::http::Method;
use fabrica_orchestrator::middleware::{classify_request, RateLimitMatrix, RateLimitTag};
use std::net::{IpAddr, Ipv4Addr};

const SOURCE_ALPHA: IpAddr = IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1));
const SOURCE_BETA: IpAddr = IpAddr::V4(Ipv4Addr::new(10, 0, 0, 2));

#[test]
fn certify_request_classification() {
    // Los latidos gozan del techo privilegiado aunque sean POST.
    assert_eq!(
        classify_request(&Method::POST, "/api/v1/robots/unit-alpha-01/heartbeat"),
        RateLimitTag::Heartbeat
    );
    // Toda lectura comparte el techo de consulta.
    assert_eq!(classify_request(&Method::GET, "/api/v1/robots"), RateLimitTag::Read);
    assert_eq!(classify_request(&Method::GET, "/api/v1/jobs/j-1"), RateLimitTag::Read);
    // El encolado de misiones tiene su propio presupuesto.
    assert_eq!(classify_request(&Method::POST, "/api/v1/jobs"), RateLimitTag::Submission);
    // El resto de escrituras son mutaciones de registro.
    assert_eq!(
        classify_request(&Method::POST, "/api/v1/robots/register"),
        RateLimitTag::Mutation
    );
    assert_eq!(
        classify_request(&Method::DELETE, "/api/v1/keys/ak-1"),
        RateLimitTag::Mutation
    );
}

#[test]
fn certify_tag_ceilings() {
    println!("\n🚦 [INICIO]: Auditoría de techos de tráfico V4.0...");
    let matrix = RateLimitMatrix::new();

    // 1. MUTACIÓN: 30/min por fuente; la ráfaga 31 se veta.
    let mut granted_mutations = 0;
    for _ in 0..31 {
        if matrix.check(RateLimitTag::Mutation, SOURCE_ALPHA) {
            granted_mutations += 1;
        }
    }
    assert_eq!(granted_mutations, 30, "mutation ceiling must be 30/min");

    // 2. LATIDOS: el techo privilegiado absorbe ráfagas que matarían
    //    al estrato de mutaciones.
    for pulse_index in 0..120 {
        assert!(
            matrix.check(RateLimitTag::Heartbeat, SOURCE_ALPHA),
            "heartbeat pulse {} must pass under the privileged ceiling",
            pulse_index
        );
    }

    // 3. AISLAMIENTO: el presupuesto agotado de ALPHA no contamina a BETA.
    assert!(matrix.check(RateLimitTag::Mutation, SOURCE_BETA));

    // 4. ENCOLADO: presupuesto propio (60/min).
    let mut granted_submissions = 0;
    for _ in 0..61 {
        if matrix.check(RateLimitTag::Submission, SOURCE_ALPHA) {
            granted_submissions += 1;
        }
    }
    assert_eq!(granted_submissions, 60, "submission ceiling must be 60/min");

    println!("   ✅ [SUCCESS]: Traffic governance certified.");
}
