//! HTTP handlers for the payment mesh request plane.

use crate::error::{AppError, AppResult, ErrorCode};
use crate::models::{ChargeRequestBody, ChargeResponse, HealthResponse, PaymentKeyRequest, PaymentKeyResponse};
use crate::payment::intent_store::IntentStore;
use crate::shedder::ShedReason;
use crate::AppState;
use axum::extract::State as AxumState;
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;

pub async fn create_payment_key(
    AxumState(state): AxumState<AppState>,
    Json(body): Json<PaymentKeyRequest>,
) -> AppResult<Json<PaymentKeyResponse>> {
    if body.id.trim().is_empty() || body.amount <= 0 {
        return Err(AppError::new(ErrorCode::InvalidRequest, "id and a positive amount are required"));
    }
    let intents = IntentStore::new(state.kv.as_ref());
    let payment_id = intents.register(&body.id, body.amount).await?;
    Ok(Json(PaymentKeyResponse { payment_id }))
}

pub async fn delete_payment_key(
    AxumState(state): AxumState<AppState>,
    Json(body): Json<PaymentKeyRequest>,
) -> AppResult<StatusCode> {
    let intents = IntentStore::new(state.kv.as_ref());
    intents.revoke(&body.id, body.amount).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn charge(
    AxumState(state): AxumState<AppState>,
    Json(body): Json<ChargeRequestBody>,
) -> Response {
    let open_circuits = state.registry.open_circuit_count();
    let p99 = state.registry.global_percentiles().p99_ms as u64;
    if let Some(reason) = state.shedder.admit(p99, open_circuits) {
        let retryable = match reason {
            ShedReason::InflightExceeded => "too many in-flight requests",
            ShedReason::LatencyExceeded => "latency budget exceeded",
            ShedReason::CpuExceeded => "system under high CPU load",
            ShedReason::TooManyCircuitsOpen => "too many providers degraded",
        };
        let mut headers = HeaderMap::new();
        headers.insert("Retry-After", HeaderValue::from_static("5"));
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            headers,
            Json(serde_json::json!({
                "success": false,
                "error_code": "GATEWAY_UNAVAILABLE",
                "message": retryable,
                "status": 503,
            })),
        )
            .into_response();
    }

    let admit_result = state.dispatcher.admit(&body).await;
    let response = match admit_result {
        Ok(resp) => resp,
        Err(e) => {
            state.shedder.release();
            return e.into_response();
        }
    };

    let is_replay = response.status != crate::models::PaymentState::Processing;
    if !is_replay {
        let dispatcher = state.dispatcher.clone();
        let shedder = state.shedder.clone();
        tokio::spawn(async move {
            dispatcher.run(body).await;
            shedder.release();
        });
    } else {
        state.shedder.release();
    }

    let mut headers = HeaderMap::new();
    if is_replay {
        headers.insert("X-Idempotent-Replay", HeaderValue::from_static("true"));
    }
    (StatusCode::OK, headers, Json(response)).into_response()
}

pub async fn metrics_json(AxumState(state): AxumState<AppState>) -> Json<Vec<crate::registry::ProviderSnapshot>> {
    Json(state.registry.snapshot())
}

pub async fn metrics_prometheus(AxumState(state): AxumState<AppState>) -> String {
    let mut out = String::new();
    for snapshot in state.registry.snapshot() {
        out.push_str(&format!(
            "provider_score{{provider=\"{}\"}} {}\n",
            snapshot.name, snapshot.score
        ));
    }
    out
}

pub async fn health_check(AxumState(state): AxumState<AppState>) -> Json<HealthResponse> {
    let snapshot = state.registry.snapshot();
    let healthy = snapshot
        .iter()
        .filter(|p| p.enabled && p.circuit_state != crate::breaker::CircuitState::Open)
        .count();
    Json(HealthResponse {
        status: "ok",
        providers_registered: snapshot.len(),
        providers_healthy: healthy,
    })
}
