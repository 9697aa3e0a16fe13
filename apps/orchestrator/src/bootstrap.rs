// [apps/orchestrator/src/bootstrap.rs]
/*!
 * =================================================================
 * APARATO: SOVEREIGN CONFIGURATION BOOTSTRAP (V4.2 - ENV HYDRATION)
 * CLASIFICACIÓN: INFRASTRUCTURE LAYER (ESTRATO L3)
 * RESPONSABILIDAD: ADQUISICIÓN DE COORDENADAS TÁCTICAS DEL ENTORNO
 *
 * # Logic:
 * Toda perilla operativa del orquestador se hidrata aquí una única
 * vez y viaja inmutable (Arc) por el resto del proceso. Los valores
 * por defecto están sintonizados para despliegues de flota medianos.
 * =================================================================
 */

use std::env;
use tracing::info;

/// Configuración inmutable del proceso orquestador.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Puerto TCP del servidor de control y del canal de robots.
    pub listening_port: u16,
    /// Secreto Bearer del plano de control REST.
    pub control_plane_secret: String,
    /// Secreto del túnel de logs de administración (separado del Bearer).
    pub admin_stream_secret: String,
    /// Intervalo de latido publicado a los robots en el RegisterAck.
    pub heartbeat_interval_seconds: u64,
    /// Ventana de expiración de latidos (por defecto 2x intervalo).
    pub heartbeat_timeout_seconds: u64,
    /// Espera máxima por la respuesta correlacionada de un robot.
    pub reply_timeout_seconds: u64,
    /// Tamaño del lote de candidatas por ciclo de despacho.
    pub dispatch_batch_size: usize,
    /// Techo del backoff de inactividad del bucle de despacho.
    pub dispatch_idle_backoff_cap_ms: u64,
    /// Penalización de una unidad tras un timeout de asignación.
    pub dispatch_error_penalty_seconds: u64,
    /// Gracia sobre timeout_seconds antes del sellado 'timed_out'.
    pub job_timeout_grace_seconds: i64,
    /// Edad mínima de una asignación antes de conciliarla contra el
    /// inventario reportado por la unidad.
    pub reconcile_grace_seconds: i64,
    /// Si es verdadero, el reaper además envía 'job_cancel' a la unidad
    /// propietaria de una misión vencida (por defecto: sellado pasivo).
    pub active_timeout_kill: bool,
}

impl OrchestratorConfig {
    /**
     * Hidrata la configuración desde variables de entorno.
     *
     * # Panics:
     * Aborta la ignición si CONTROL_PLANE_SECRET no está definido:
     * un plano de control sin credencial es un fallo de despliegue.
     */
    pub fn from_environment() -> Self {
        let control_plane_secret = env::var("CONTROL_PLANE_SECRET")
            .expect("CRITICAL_CONFIG_VOID: 'CONTROL_PLANE_SECRET' is missing in environment.");

        let admin_stream_secret =
            env::var("ADMIN_STREAM_SECRET").unwrap_or_else(|_| control_plane_secret.clone());

        let heartbeat_interval_seconds = read_numeric("HEARTBEAT_INTERVAL_SECONDS", 30);

        let config = Self {
            listening_port: read_numeric("PORT", 8080) as u16,
            control_plane_secret,
            admin_stream_secret,
            heartbeat_interval_seconds,
            heartbeat_timeout_seconds: read_numeric(
                "HEARTBEAT_TIMEOUT_SECONDS",
                heartbeat_interval_seconds * 2,
            ),
            reply_timeout_seconds: read_numeric("REPLY_TIMEOUT_SECONDS", 10),
            dispatch_batch_size: read_numeric("DISPATCH_BATCH_SIZE", 16) as usize,
            dispatch_idle_backoff_cap_ms: read_numeric("DISPATCH_IDLE_BACKOFF_CAP_MS", 2000),
            dispatch_error_penalty_seconds: read_numeric("DISPATCH_ERROR_PENALTY_SECONDS", 5),
            job_timeout_grace_seconds: read_numeric("JOB_TIMEOUT_GRACE_SECONDS", 60) as i64,
            reconcile_grace_seconds: read_numeric("RECONCILE_GRACE_SECONDS", 30) as i64,
            active_timeout_kill: env::var("ACTIVE_TIMEOUT_KILL")
                .map(|raw| raw == "1" || raw.eq_ignore_ascii_case("true"))
                .unwrap_or(false),
        };

        info!(
            "🧭 [BOOTSTRAP]: Configuration hydrated. heartbeat={}s timeout={}s reply={}s batch={}",
            config.heartbeat_interval_seconds,
            config.heartbeat_timeout_seconds,
            config.reply_timeout_seconds,
            config.dispatch_batch_size
        );
        config
    }
}

fn read_numeric(variable_name: &str, default_value: u64) -> u64 {
    env::var(variable_name)
        .ok()
        .and_then(|raw_value| raw_value.parse::<u64>().ok())
        .unwrap_or(default_value)
}
