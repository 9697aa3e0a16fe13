// [apps/orchestrator/src/middleware.rs]
/*!
 * =================================================================
 * APARATO: PERIMETER GUARD STRATUM (V4.4 - TRAFFIC GOVERNANCE)
 * CLASIFICACIÓN: SECURITY STRATUM (ESTRATO L4)
 * RESPONSABILIDAD: AUTENTICACIÓN BEARER Y CONTROL DE TRÁFICO KEYED
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. TAG-BASED CEILINGS: Cada petición se clasifica por (método, ruta)
 *    en una etiqueta de tráfico; cada etiqueta mantiene un token-bucket
 *    keyed por IP de origen (los latidos gozan de techos muy superiores
 *    a las mutaciones de registro).
 * 2. STABLE REJECTIONS: 401 para credencial inválida, 429 con sobre
 *    JSON estable para techo alcanzado.
 * =================================================================
 */

use crate::handlers::ApiError;
use crate::state::AppState;
use axum::extract::{ConnectInfo, Request, State};
use axum::http::{header, Method};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use governor::clock::DefaultClock;
use governor::state::keyed::DefaultKeyedStateStore;
use governor::{Quota, RateLimiter};
use std::net::{IpAddr, SocketAddr};
use std::num::NonZeroU32;
use std::sync::Arc;
use tracing::{debug, warn};

type KeyedIpLimiter = RateLimiter<IpAddr, DefaultKeyedStateStore<IpAddr>, DefaultClock>;

/// Etiquetas de tráfico del plano de control.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateLimitTag {
    /// Alta, edición y borrado de entidades (30/min).
    Mutation,
    /// Lecturas de flota, misiones y streams (120/min).
    Read,
    /// Latidos de unidades (600/min).
    Heartbeat,
    /// Encolado de misiones (60/min).
    Submission,
}

/// Techo por minuto de cada etiqueta de tráfico.
const MUTATION_CEILING_PER_MINUTE: u32 = 30;
const READ_CEILING_PER_MINUTE: u32 = 120;
const HEARTBEAT_CEILING_PER_MINUTE: u32 = 600;
const SUBMISSION_CEILING_PER_MINUTE: u32 = 60;

/**
 * Matriz de token-buckets keyed por (etiqueta, IP de origen).
 */
pub struct RateLimitMatrix {
    mutation_bucket: KeyedIpLimiter,
    read_bucket: KeyedIpLimiter,
    heartbeat_bucket: KeyedIpLimiter,
    submission_bucket: KeyedIpLimiter,
}

impl RateLimitMatrix {
    pub fn new() -> Self {
        Self {
            mutation_bucket: keyed_per_minute(MUTATION_CEILING_PER_MINUTE),
            read_bucket: keyed_per_minute(READ_CEILING_PER_MINUTE),
            heartbeat_bucket: keyed_per_minute(HEARTBEAT_CEILING_PER_MINUTE),
            submission_bucket: keyed_per_minute(SUBMISSION_CEILING_PER_MINUTE),
        }
    }

    /**
     * Evalúa el presupuesto de la fuente para la etiqueta dada.
     */
    pub fn check(&self, tag: RateLimitTag, source_address: IpAddr) -> bool {
        let bucket = match tag {
            RateLimitTag::Mutation => &self.mutation_bucket,
            RateLimitTag::Read => &self.read_bucket,
            RateLimitTag::Heartbeat => &self.heartbeat_bucket,
            RateLimitTag::Submission => &self.submission_bucket,
        };
        bucket.check_key(&source_address).is_ok()
    }
}

impl Default for RateLimitMatrix {
    fn default() -> Self {
        Self::new()
    }
}

fn keyed_per_minute(ceiling: u32) -> KeyedIpLimiter {
    let quota = Quota::per_minute(
        NonZeroU32::new(ceiling.max(1)).expect("FATAL: rate ceiling must be nonzero"),
    );
    RateLimiter::keyed(quota)
}

/**
 * Clasifica una petición del plano de control en su etiqueta de tráfico.
 */
pub fn classify_request(method: &Method, path: &str) -> RateLimitTag {
    if path.ends_with("/heartbeat") {
        return RateLimitTag::Heartbeat;
    }
    if *method == Method::GET {
        return RateLimitTag::Read;
    }
    if path.ends_with("/jobs") && *method == Method::POST {
        return RateLimitTag::Submission;
    }
    RateLimitTag::Mutation
}

/**
 * Guardia de tráfico: aplica el token-bucket de la etiqueta derivada.
 */
pub async fn rate_limit_guard(
    State(rate_matrix): State<Arc<RateLimitMatrix>>,
    ConnectInfo(remote_address): ConnectInfo<SocketAddr>,
    request: Request,
    next: Next,
) -> Response {
    let traffic_tag = classify_request(request.method(), request.uri().path());

    if !rate_matrix.check(traffic_tag, remote_address.ip()) {
        warn!("⛔ [TRAFFIC_GUARD]: Source {} exceeded the {:?} ceiling.",
            remote_address.ip(), traffic_tag);
        return ApiError::RateLimited.into_response();
    }

    next.run(request).await
}

/**
 * Guardia de autenticación del plano de control (Bearer).
 *
 * # Logic:
 * Los endpoints REST exigen el secreto del plano de control; los
 * túneles WebSocket autentican por su propio mecanismo (API key de
 * unidad / secreto de administración) y no atraviesan esta guardia.
 */
pub async fn control_plane_guard(
    State(application_state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let auth_header_content = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|header_value| header_value.to_str().ok());

    let presented_token = match auth_header_content {
        Some(header_value) if header_value.starts_with("Bearer ") => &header_value[7..],
        _ => return Err(ApiError::Unauthorized),
    };

    if presented_token != application_state.config.control_plane_secret {
        warn!("❌ [AUTH_REJECTION]: Invalid control-plane token.");
        return Err(ApiError::Unauthorized);
    }

    debug!("👤 [AUTH]: Control-plane operator authenticated.");
    Ok(next.run(request).await)
}
