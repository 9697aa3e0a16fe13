// [tests/mirror/libs/infra/protocol/unknown_tolerance.test.rs]
/*!
 * =================================================================
 * APARATO: CERTIFICADOR DE TOLERANCIA A TIPOS FUTUROS (V4.0)
 * CLASIFICACIÓN: TRINITY EVIDENCE // ESTRATO L3-MIRROR
 * RESPONSABILIDAD: COMPATIBILIDAD HACIA ADELANTE DEL CATÁLOGO
 *
 * # Logic:
 * Un lado del canal debe poder añadir tipos de mensaje sin romper al
 * otro: los tipos no catalogados decodifican como variante opaca y
 * re-codifican sin pérdida de payload.
 * =================================================================
 */

use fabrica_infra_protocol::{decode_frame, encode_frame, MessageBody, WireMessage};
use serde_json::json;
use uuid::Uuid;

#[test]
fn certify_unknown_type_opaque_transit() {
    println!("\n🔮 [INICIO]: Auditoría de tolerancia a tipos futuros...");

    let future_frame = format!(
        "{{\"id\": \"{}\", \"type\": \"screen_capture_ready\", \"ts\": \"2026-03-01T12:00:00+00:00\", \
          \"payload\": {{\"frame_base64\": \"QUJD\", \"sequence\": 42}}}}",
        Uuid::new_v4()
    );

    // 1. DECODIFICACIÓN: el tipo futuro no debe romper el codec.
    let recovered = decode_frame(&future_frame)
        .expect("FORWARD_COMPAT_FAULT: unknown type must decode opaquely.");

    match &recovered.body {
        MessageBody::Unknown { type_label, payload } => {
            assert_eq!(type_label, "screen_capture_ready");
            assert_eq!(payload["sequence"], json!(42));
        }
        other => panic!("INTEGRITY_COLLAPSE: expected opaque variant, got '{}'", other.type_label()),
    }

    // 2. RE-CODIFICACIÓN: el reenvío preserva el payload bit-a-bit.
    let reencoded = encode_frame(&recovered).expect("opaque re-encode collapsed");
    let second_pass = decode_frame(&reencoded).expect("opaque second decode collapsed");
    assert_eq!(second_pass, recovered, "opaque transit must be lossless");

    println!("   ✅ [SUCCESS]: Future frame survived opaque transit.");
}

#[test]
fn certify_frame_overflow_shield() {
    // Protección DoS: una trama que supera el techo de 10MB se rechaza
    // antes de tocar el parser.
    let oversized_frame = "x".repeat(fabrica_infra_protocol::MAXIMUM_FRAME_BYTES + 1);
    assert!(decode_frame(&oversized_frame).is_err());
}

#[test]
fn certify_unknown_builder_passthrough() {
    let opaque_message = WireMessage::fresh(MessageBody::Unknown {
        type_label: "vendor_extension".to_string(),
        payload: json!({"anything": [1, 2, 3]}),
    });

    let recovered =
        decode_frame(&encode_frame(&opaque_message).expect("encode")).expect("decode");
    assert_eq!(recovered, opaque_message);
}
