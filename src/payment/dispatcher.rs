//! Orchestrates a single payment end to end: selection, invocation,
//! recording, retry and finalization.

use crate::error::{AppError, AppResult, ErrorCode};
use crate::kv::KvStore;
use crate::metrics::ErrorKind;
use crate::models::{ChargeRequestBody, ChargeResponse, ChargeResultData, PaymentState};
use crate::notify::NotificationBus;
use crate::payment::intent_store::IntentStore;
use crate::payment::state_machine::PaymentStateStore;
use crate::providers::{ChargeRequest, ComplianceCheckKind, ComplianceProvider, PaymentProvider};
use crate::registry::Registry;
use crate::retry::{next_backoff, RetryConfig};
use crate::selector::Selector;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

pub struct Dispatcher {
    pub registry: Arc<Registry>,
    pub selector: Arc<Selector>,
    pub state_store: Arc<PaymentStateStore>,
    pub notify: Arc<NotificationBus>,
    pub kv: Arc<dyn KvStore>,
    pub providers: HashMap<String, Arc<dyn PaymentProvider>>,
    pub compliance_provider: Option<Arc<dyn ComplianceProvider>>,
    pub retry_config: RetryConfig,
    pub compliance_threshold: i64,
    pub dispatch_deadline: Duration,
    pub result_cache_ttl: Duration,
}

impl Dispatcher {
    /// Validates the request, applies the idempotent-replay and
    /// compliance gates, and atomically enters PROCESSING before
    /// returning. The remainder runs asynchronously via `run`.
    pub async fn admit(&self, body: &ChargeRequestBody) -> AppResult<ChargeResponse> {
        if body.amount <= 0 {
            return Err(AppError::new(ErrorCode::InvalidRequest, "amount must be positive"));
        }
        if body.currency.len() != 3 {
            return Err(AppError::new(ErrorCode::InvalidRequest, "currency must be a 3-letter code"));
        }
        if body.payment_id.trim().is_empty() {
            return Err(AppError::new(ErrorCode::PaymentIdRequired, "payment_id is required"));
        }

        let intents = IntentStore::new(self.kv.as_ref());
        if let Err(e) = intents.verify(&body.id, body.amount, &body.payment_id).await {
            self.finalize_mismatch(&body.payment_id).await;
            return Err(e);
        }

        // SUCCESS, FAILED and CANCELLED are all terminal from the client's
        // perspective: a repeat charge replays the cached result blob rather
        // than touching providers again. A fresh attempt after a failure
        // requires a new payment id from paymentKey, not a second charge call.
        match self.state_store.state(&body.payment_id) {
            Some(PaymentState::Success) | Some(PaymentState::Failed) | Some(PaymentState::Cancelled) => {
                if let Some(cached) = self.state_store.cached_result(&body.payment_id) {
                    return Ok(cached);
                }
            }
            Some(PaymentState::Processing) => {
                return Err(AppError::new(ErrorCode::Conflict, "payment is already being processed"));
            }
            _ => {}
        }

        if body.amount >= self.compliance_threshold {
            if let Some(user_id) = &body.user_id {
                if let Some(compliance) = &self.compliance_provider {
                    if let Err(fault) = compliance.check(ComplianceCheckKind::Kyc, user_id).await {
                        warn!(payment_id = %body.payment_id, "compliance check failed: {}", fault.message);
                        let result = ChargeResponse {
                            success: false,
                            status: PaymentState::Failed,
                            payment_id: body.payment_id.clone(),
                            data: ChargeResultData {
                                provider: Some(compliance.name().to_string()),
                                latency_ms: None,
                                error_code: Some(ErrorCode::KycRequired),
                                error_message: Some(fault.message.clone()),
                            },
                        };
                        let _ = self
                            .state_store
                            .finalize(&body.payment_id, PaymentState::Failed, result.clone());
                        self.notify.publish(&body.payment_id, result);
                        return Err(AppError::new(ErrorCode::KycRequired, "compliance check rejected this payment"));
                    }
                }
            }
        }

        match self.state_store.state(&body.payment_id) {
            None => self
                .state_store
                .initiate_and_process(&body.payment_id)
                .map_err(|_| AppError::new(ErrorCode::Conflict, "payment is already being processed"))?,
            _ => {
                return Err(AppError::new(
                    ErrorCode::Conflict,
                    "payment cannot be processed from its current state",
                ))
            }
        }

        Ok(ChargeResponse {
            success: true,
            status: PaymentState::Processing,
            payment_id: body.payment_id.clone(),
            data: ChargeResultData {
                provider: None,
                latency_ms: None,
                error_code: None,
                error_message: None,
            },
        })
    }

    async fn finalize_mismatch(&self, payment_id: &str) {
        let result = ChargeResponse {
            success: false,
            status: PaymentState::Failed,
            payment_id: payment_id.to_string(),
            data: ChargeResultData {
                provider: None,
                latency_ms: None,
                error_code: Some(ErrorCode::PaymentIdMismatch),
                error_message: Some("payment id does not match the registered intent".to_string()),
            },
        };
        let _ = self
            .state_store
            .finalize(payment_id, PaymentState::Failed, result.clone());
        self.notify.publish(payment_id, result);
    }

    /// Runs the asynchronous leg of a payment already in PROCESSING.
    pub async fn run(&self, body: ChargeRequestBody) {
        let payment_id = body.payment_id.clone();
        let outcome = tokio::time::timeout(self.dispatch_deadline, self.drive(&body)).await;

        let result = match outcome {
            Ok(result) => result,
            Err(_) => ChargeResponse {
                success: false,
                status: PaymentState::Failed,
                payment_id: payment_id.clone(),
                data: ChargeResultData {
                    provider: None,
                    latency_ms: None,
                    error_code: Some(ErrorCode::GatewayTimeout),
                    error_message: Some("dispatch deadline exceeded".to_string()),
                },
            },
        };

        let final_state = result.status;
        if let Err(e) = self.state_store.finalize(&payment_id, final_state, result.clone()) {
            error!(payment_id = %payment_id, "failed to finalize payment: {e}");
        }
        if let Ok(blob) = serde_json::to_string(&result) {
            let cache_key = format!("payment_result:{payment_id}");
            if let Err(e) = self.kv.set(&cache_key, &blob, Some(self.result_cache_ttl)).await {
                warn!(payment_id = %payment_id, "failed to cache result: {e}");
            }
        }
        self.notify.publish(&payment_id, result);
    }

    async fn drive(&self, body: &ChargeRequestBody) -> ChargeResponse {
        let mut attempt = 0;
        let mut last_error: Option<(ErrorCode, String, Option<Duration>)> = None;

        loop {
            if attempt >= self.retry_config.max_attempts {
                break;
            }

            let eligible = self.registry.eligible(body.amount, &body.currency);
            if eligible.is_empty() {
                last_error = Some((
                    ErrorCode::NoEligibleProviders,
                    "no eligible provider for this request".to_string(),
                    None,
                ));
                break;
            }

            let idempotency_key = format!("{}:{}", body.payment_id, attempt);
            let chosen = self
                .selector
                .select(
                    &eligible,
                    &self.registry,
                    self.kv.as_ref(),
                    body.user_id.as_deref(),
                    &idempotency_key,
                )
                .await;

            let Some(provider_entry) = chosen else {
                last_error = Some((
                    ErrorCode::NoEligibleProviders,
                    "selector returned no provider".to_string(),
                    None,
                ));
                break;
            };

            if !provider_entry.breaker.before_request() {
                attempt += 1;
                continue;
            }

            let Some(client) = self.providers.get(&provider_entry.name) else {
                last_error = Some((
                    ErrorCode::InternalError,
                    format!("no client registered for provider {}", provider_entry.name),
                    None,
                ));
                break;
            };

            provider_entry.metrics.inc_active();
            let request = ChargeRequest {
                payment_id: body.payment_id.clone(),
                amount: body.amount,
                currency: body.currency.clone(),
                idempotency_key: idempotency_key.clone(),
            };
            let outcome = client.charge(&request).await;
            provider_entry.metrics.dec_active();

            match outcome {
                Ok(success) => {
                    provider_entry.metrics.record_request(success.latency, true);
                    self.registry.record_global_latency(success.latency);
                    provider_entry.breaker.record_success();
                    info!(payment_id = %body.payment_id, provider = %provider_entry.name, "charge succeeded");
                    return ChargeResponse {
                        success: true,
                        status: PaymentState::Success,
                        payment_id: body.payment_id.clone(),
                        data: ChargeResultData {
                            provider: Some(provider_entry.name.clone()),
                            latency_ms: Some(success.latency.as_millis()),
                            error_code: None,
                            error_message: None,
                        },
                    };
                }
                Err(fault) => {
                    provider_entry.metrics.record_request(Duration::from_millis(0), false);
                    provider_entry.metrics.record_error(ErrorKind::Gateway, fault.message.clone());
                    provider_entry.breaker.record_failure();
                    warn!(payment_id = %body.payment_id, provider = %provider_entry.name, code = ?fault.code, "charge failed");

                    if !fault.code.is_retryable() {
                        last_error = Some((fault.code, fault.message, fault.retry_after));
                        break;
                    }
                    last_error = Some((fault.code, fault.message.clone(), fault.retry_after));
                    let delay = next_backoff(&self.retry_config, attempt, fault.retry_after);
                    tokio::time::sleep(delay).await;
                }
            }

            attempt += 1;
        }

        let (code, message, _) = last_error.unwrap_or((
            ErrorCode::InternalError,
            "exhausted retry attempts without a definitive outcome".to_string(),
            None,
        ));

        ChargeResponse {
            success: false,
            status: PaymentState::Failed,
            payment_id: body.payment_id.clone(),
            data: ChargeResultData {
                provider: None,
                latency_ms: None,
                error_code: Some(code),
                error_message: Some(message),
            },
        }
    }
}
