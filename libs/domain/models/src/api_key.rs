// [libs/domain/models/src/api_key.rs]
/*!
 * =================================================================
 * APARATO: API KEY DOMAIN CONTRACTS (V4.0 - CREDENTIAL VAULT)
 * CLASIFICACIÓN: DOMAIN MODELS (ESTRATO L2)
 * RESPONSABILIDAD: CONTRATO DE CREDENCIALES DEL CANAL DE ROBOTS
 *
 * # Logic:
 * El secreto de una llave existe en claro únicamente dentro de
 * 'MintedApiKey', el sobre de emisión que el operador recibe una sola
 * vez. El Ledger custodia exclusivamente el hash PBKDF2.
 * =================================================================
 */

use serde::{Deserialize, Serialize};
use typeshare::typeshare;

/// Estado administrativo de una credencial de canal.
#[typeshare]
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ApiKeyStatus {
    Valid,
    Revoked,
    Expired,
}

impl ApiKeyStatus {
    pub fn as_label(&self) -> &'static str {
        match self {
            ApiKeyStatus::Valid => "valid",
            ApiKeyStatus::Revoked => "revoked",
            ApiKeyStatus::Expired => "expired",
        }
    }

    pub fn from_label(label: &str) -> Self {
        match label {
            "valid" => ApiKeyStatus::Valid,
            "expired" => ApiKeyStatus::Expired,
            _ => ApiKeyStatus::Revoked,
        }
    }
}

/// Proyección pública de una credencial (nunca incluye material secreto).
#[typeshare]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiKeyRecord {
    pub key_id: String,
    #[serde(rename = "robot_identifier")]
    pub robot_id: String,
    pub status: ApiKeyStatus,
    pub expires_at: Option<String>,
    pub last_used_at: Option<String>,
    pub last_used_ip: Option<String>,
    pub created_at: String,
}

/// Sobre de emisión: el secreto viaja aquí exactamente una vez.
#[typeshare]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MintedApiKey {
    #[serde(flatten)]
    pub record: ApiKeyRecord,
    /// Material secreto en claro. No se persiste ni se vuelve a emitir.
    pub secret: String,
}
