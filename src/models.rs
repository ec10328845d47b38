//! Wire-level request/response DTOs for the payment mesh HTTP surface.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentState {
    Initiated,
    Processing,
    Success,
    Failed,
    Cancelled,
}

#[derive(Debug, Deserialize)]
pub struct PaymentKeyRequest {
    pub id: String,
    pub amount: i64,
}

#[derive(Debug, Serialize)]
pub struct PaymentKeyResponse {
    pub payment_id: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChargeRequestBody {
    pub id: String,
    pub amount: i64,
    pub payment_id: String,
    pub currency: String,
    #[serde(default)]
    pub user_id: Option<String>,
}

#[derive(Debug, Serialize, Clone)]
pub struct ChargeResultData {
    pub provider: Option<String>,
    pub latency_ms: Option<u128>,
    pub error_code: Option<crate::error::ErrorCode>,
    pub error_message: Option<String>,
}

#[derive(Debug, Serialize, Clone)]
pub struct ChargeResponse {
    pub success: bool,
    pub status: PaymentState,
    pub payment_id: String,
    pub data: ChargeResultData,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub providers_registered: usize,
    pub providers_healthy: usize,
}
