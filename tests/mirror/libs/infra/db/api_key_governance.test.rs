// [tests/mirror/libs/infra/db/api_key_governance.test.rs]
/*!
 * =================================================================
 * APARATO: CERTIFICADOR DE GOBERNANZA DE CREDENCIALES (V4.1)
 * CLASIFICACIÓN: TRINITY EVIDENCE // ESTRATO L3-MIRROR
 * RESPONSABILIDAD: MINT-ONCE, VERIFICACIÓN PBKDF2 Y ROTACIÓN
 *
 * # Logic:
 * El secreto en claro existe solo en el sobre de emisión. La bóveda
 * custodia el hash; verificar exige la derivación PBKDF2 completa, y
 * revocar gobierna los handshakes futuros (escenario de rotación S6).
 * =================================================================
 */

use fabrica_domain_models::api_key::ApiKeyStatus;
use fabrica_infra_db::repositories::ApiKeyRepository;
use fabrica_infra_db::StoreClient;

/**
 * CERTIFICACIÓN: Acuñación, verificación y rastro forense de uso.
 */
#[tokio::test]
async fn certify_mint_and_verify_cycle() {
    println!("\n🔑 [INICIO]: Auditoría de la Bóveda de Credenciales V4.1...");

    let database_client =
        StoreClient::connect("file:mem_vault_mint_v41?mode=memory&cache=shared", None)
            .await
            .expect("CRITICAL_FAULT: memory anchor");
    let vault = ApiKeyRepository::new(database_client.clone());

    // 1. ACUÑACIÓN: el secreto viaja una única vez.
    let minted = vault
        .create_api_key("unit-alpha-01", None)
        .await
        .expect("MINT_FAULT");

    assert!(minted.secret.starts_with("rsk_"));
    assert_eq!(minted.record.status, ApiKeyStatus::Valid);
    assert!(minted.record.last_used_at.is_none());

    // 2. HIGIENE: el claro jamás toca el Ledger.
    let database_connection = database_client.get_connection().expect("conn");
    let mut hash_probe = database_connection
        .query(
            "SELECT secret_hash FROM api_keys WHERE key_id = ?1",
            libsql::params![minted.record.key_id.clone()],
        )
        .await
        .expect("probe");
    let stored_hash: String = hash_probe
        .next()
        .await
        .expect("row")
        .expect("present")
        .get(0)
        .expect("hash");
    assert_ne!(stored_hash, minted.secret, "cleartext must never be persisted");
    assert!(stored_hash.starts_with("$pbkdf2"), "vault must store a PBKDF2 hash");

    // 3. VERIFICACIÓN: coincidencia estampa el rastro forense de uso.
    let verified = vault
        .verify_presented_secret("unit-alpha-01", &minted.secret, Some("10.0.0.9"))
        .await
        .expect("VERIFY_FAULT")
        .expect("valid secret must authenticate");
    assert_eq!(verified.key_id, minted.record.key_id);

    let refreshed = vault.list_for_robot("unit-alpha-01").await.expect("list");
    assert_eq!(refreshed.len(), 1);
    assert!(refreshed[0].last_used_at.is_some());
    assert_eq!(refreshed[0].last_used_ip.as_deref(), Some("10.0.0.9"));

    // 4. RECHAZOS: secreto ajeno y unidad equivocada.
    assert!(vault
        .verify_presented_secret("unit-alpha-01", "rsk_forged_material", None)
        .await
        .expect("VERIFY_FAULT")
        .is_none());
    assert!(vault
        .verify_presented_secret("unit-beta-02", &minted.secret, None)
        .await
        .expect("VERIFY_FAULT")
        .is_none());

    println!("   ✅ [SUCCESS]: Vault governance certified.");
}

/**
 * CERTIFICACIÓN: Rotación de llaves (escenario S6). La revocación no
 * corta enlaces vivos; gobierna el próximo handshake.
 */
#[tokio::test]
async fn certify_rotation_cycle() {
    let database_client =
        StoreClient::connect("file:mem_vault_rotate_v41?mode=memory&cache=shared", None)
            .await
            .expect("memory anchor");
    let vault = ApiKeyRepository::new(database_client.clone());

    let original = vault.create_api_key("unit-alpha-01", None).await.expect("mint");

    // Revocación idempotente.
    vault.revoke_api_key(&original.record.key_id).await.expect("revoke");
    vault.revoke_api_key(&original.record.key_id).await.expect("revoke twice is a no-op");

    // El próximo handshake con la llave retirada falla.
    assert!(vault
        .verify_presented_secret("unit-alpha-01", &original.secret, None)
        .await
        .expect("verify")
        .is_none());

    // Una llave fresca restablece el acceso.
    let replacement = vault.create_api_key("unit-alpha-01", None).await.expect("mint");
    assert!(vault
        .verify_presented_secret("unit-alpha-01", &replacement.secret, None)
        .await
        .expect("verify")
        .is_some());

    // Revocar una llave fantasma es un fallo semántico, no un pánico.
    assert!(matches!(
        vault.revoke_api_key("ak_nonexistent").await,
        Err(fabrica_infra_db::DbError::Missing)
    ));
}

/**
 * CERTIFICACIÓN: Expiración perezosa en el instante de uso.
 */
#[tokio::test]
async fn certify_lazy_expiry() {
    let database_client =
        StoreClient::connect("file:mem_vault_expiry_v41?mode=memory&cache=shared", None)
            .await
            .expect("memory anchor");
    let vault = ApiKeyRepository::new(database_client.clone());

    let already_expired = (chrono::Utc::now() - chrono::Duration::seconds(60)).to_rfc3339();
    let expired_key = vault
        .create_api_key("unit-alpha-01", Some(already_expired))
        .await
        .expect("mint");

    assert!(vault
        .verify_presented_secret("unit-alpha-01", &expired_key.secret, None)
        .await
        .expect("verify")
        .is_none());

    // El uso selló el estado 'expired' en la bóveda.
    let inventory = vault.list_for_robot("unit-alpha-01").await.expect("list");
    assert_eq!(inventory[0].status, ApiKeyStatus::Expired);
}
