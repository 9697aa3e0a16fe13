// [apps/orchestrator/src/handlers/keys.rs]
/*!
 * =================================================================
 * APARATO: API KEY GOVERNANCE HANDLER (V4.2 - VAULT SURFACE)
 * CLASIFICACIÓN: API ADAPTER LAYER (ESTRATO L3)
 * RESPONSABILIDAD: CICLO DE VIDA DE CREDENCIALES DEL CANAL DE ROBOTS
 *
 * # Logic:
 * El secreto de una llave abandona la bóveda exactamente una vez, en
 * la respuesta de acuñación. La revocación no corta conexiones ya
 * autenticadas: gobierna únicamente los handshakes futuros.
 * =================================================================
 */

use crate::handlers::ApiError;
use crate::state::AppState;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use fabrica_domain_models::api_key::{ApiKeyRecord, MintedApiKey};
use serde::Deserialize;
use tracing::{info, instrument};

#[derive(Debug, Deserialize)]
pub struct MintKeyPayload {
    pub robot_id: String,
    #[serde(default)]
    pub expires_at: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct KeyListQuery {
    pub robot_id: String,
}

pub struct ApiKeyGovernanceHandler;

impl ApiKeyGovernanceHandler {
    /**
     * Endpoint: POST /api/v1/keys
     *
     * Acuña una credencial nueva. La respuesta transporta el secreto
     * en claro por única vez; solo el hash queda custodiado.
     */
    #[instrument(skip(application_state, payload), fields(robot = %payload.robot_id))]
    pub async fn handle_mint(
        State(application_state): State<AppState>,
        Json(payload): Json<MintKeyPayload>,
    ) -> Result<impl IntoResponse, ApiError> {
        if payload.robot_id.trim().is_empty() {
            return Err(ApiError::Validation("robot_id is mandatory".to_string()));
        }

        if let Some(expiry_label) = &payload.expires_at {
            if chrono::DateTime::parse_from_rfc3339(expiry_label).is_err() {
                return Err(ApiError::Validation(
                    "expires_at must be an RFC-3339 timestamp".to_string(),
                ));
            }
        }

        let minted_credential: MintedApiKey = application_state
            .api_key_repository
            .create_api_key(&payload.robot_id, payload.expires_at)
            .await?;

        let _ = application_state
            .audit_repository
            .append(
                "api_key_minted",
                &payload.robot_id,
                "operator",
                &minted_credential.record.key_id,
            )
            .await;

        Ok((StatusCode::CREATED, Json(minted_credential)))
    }

    /// Endpoint: GET /api/v1/keys?robot_id= (proyección sin secretos).
    pub async fn handle_list(
        State(application_state): State<AppState>,
        Query(query): Query<KeyListQuery>,
    ) -> Result<Json<Vec<ApiKeyRecord>>, ApiError> {
        Ok(Json(
            application_state
                .api_key_repository
                .list_for_robot(&query.robot_id)
                .await?,
        ))
    }

    /**
     * Endpoint: DELETE /api/v1/keys/{key_id}
     *
     * Revoca una credencial. Las conexiones vivas autenticadas con
     * ella NO se cortan retroactivamente; el próximo handshake falla.
     */
    #[instrument(skip(application_state), fields(key = %key_identifier))]
    pub async fn handle_revoke(
        State(application_state): State<AppState>,
        Path(key_identifier): Path<String>,
    ) -> Result<impl IntoResponse, ApiError> {
        application_state.api_key_repository.revoke_api_key(&key_identifier).await?;

        let _ = application_state
            .audit_repository
            .append("api_key_revoked", &key_identifier, "operator", "")
            .await;

        info!("🚫 [VAULT]: Credential {} revoked. Live links remain authed.", key_identifier);
        Ok(StatusCode::NO_CONTENT)
    }
}
