//! Payment gateway client
//!
//! Khalti-style ePayment API: `initiate` returns a payment token (`pidx`)
//! and a hosted payment URL; `lookup` reports the authoritative status of a
//! token. Amounts are currency minor units throughout and must match
//! bit-exactly between the two sides.
//!
//! The gateway sits behind a trait so the reconciler can be exercised with
//! the in-process stub, and so dev mode can run without a real gateway the
//! same way the rest of this codebase treats optional external services.

use async_trait::async_trait;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;
use tracing::{debug, warn};

use crate::types::{CoreError, Result};

/// Status values reported by the gateway's lookup endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GatewayStatus {
    Completed,
    Pending,
    Initiated,
    Expired,
    #[serde(rename = "User canceled")]
    UserCanceled,
    Refunded,
}

impl std::fmt::Display for GatewayStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Completed => "Completed",
            Self::Pending => "Pending",
            Self::Initiated => "Initiated",
            Self::Expired => "Expired",
            Self::UserCanceled => "User canceled",
            Self::Refunded => "Refunded",
        };
        f.write_str(s)
    }
}

/// Payload for the initiate endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct InitiateRequest {
    /// Amount in currency minor units.
    pub amount: u64,
    pub purchase_order_id: String,
    pub purchase_order_name: String,
    pub return_url: String,
}

/// Response from the initiate endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct InitiateResponse {
    pub pidx: String,
    pub payment_url: String,
}

/// Response from the lookup endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct LookupResponse {
    pub pidx: String,
    pub total_amount: u64,
    pub status: GatewayStatus,
}

/// External settlement gateway.
#[async_trait]
pub trait SettlementGateway: Send + Sync {
    async fn initiate(&self, request: InitiateRequest) -> Result<InitiateResponse>;
    async fn lookup(&self, pidx: &str) -> Result<LookupResponse>;
}

// ============================================================================
// HTTP implementation
// ============================================================================

/// Gateway client over HTTPS with a bounded request timeout.
pub struct HttpGateway {
    client: reqwest::Client,
    base_url: String,
    secret_key: String,
    return_url: String,
}

impl HttpGateway {
    pub fn new(
        base_url: &str,
        secret_key: &str,
        return_url: &str,
        timeout: Duration,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| CoreError::Config(format!("Gateway client build failed: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            secret_key: secret_key.to_string(),
            return_url: return_url.to_string(),
        })
    }

    async fn post<B: Serialize, T: for<'de> Deserialize<'de>>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T> {
        let url = format!("{}{}", self.base_url, path);
        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Key {}", self.secret_key))
            .json(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            warn!(url = %url, status = %status, "Gateway returned non-success");
            return Err(CoreError::UpstreamUnavailable(format!(
                "Gateway returned {} for {}",
                status, path
            )));
        }

        response
            .json::<T>()
            .await
            .map_err(|e| CoreError::UpstreamUnavailable(format!("Gateway response decode: {}", e)))
    }
}

#[async_trait]
impl SettlementGateway for HttpGateway {
    async fn initiate(&self, mut request: InitiateRequest) -> Result<InitiateResponse> {
        if request.return_url.is_empty() {
            request.return_url = self.return_url.clone();
        }
        debug!(order_id = %request.purchase_order_id, amount = request.amount, "Gateway initiate");
        self.post("/epayment/initiate/", &request).await
    }

    async fn lookup(&self, pidx: &str) -> Result<LookupResponse> {
        debug!(pidx = pidx, "Gateway lookup");
        self.post("/epayment/lookup/", &serde_json::json!({ "pidx": pidx }))
            .await
    }
}

// ============================================================================
// In-process stub
// ============================================================================

/// In-process gateway used in dev mode and tests.
///
/// Payments complete immediately by default; tests flip individual tokens
/// with [`StubGateway::set_status`] or take the whole stub offline with
/// [`StubGateway::set_unavailable`].
pub struct StubGateway {
    payments: DashMap<String, (u64, GatewayStatus)>,
    counter: AtomicU64,
    lookups: AtomicU64,
    unavailable: AtomicBool,
}

impl StubGateway {
    pub fn new() -> Self {
        Self {
            payments: DashMap::new(),
            counter: AtomicU64::new(0),
            lookups: AtomicU64::new(0),
            unavailable: AtomicBool::new(false),
        }
    }

    /// Override the status a token will report on lookup.
    pub fn set_status(&self, pidx: &str, status: GatewayStatus) {
        if let Some(mut entry) = self.payments.get_mut(pidx) {
            entry.1 = status;
        }
    }

    /// Override the amount a token will report on lookup (tamper testing).
    pub fn set_amount(&self, pidx: &str, amount: u64) {
        if let Some(mut entry) = self.payments.get_mut(pidx) {
            entry.0 = amount;
        }
    }

    /// Simulate the gateway being unreachable.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Number of lookup calls served (idempotence accounting in tests).
    pub fn lookup_count(&self) -> u64 {
        self.lookups.load(Ordering::SeqCst)
    }
}

impl Default for StubGateway {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SettlementGateway for StubGateway {
    async fn initiate(&self, request: InitiateRequest) -> Result<InitiateResponse> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(CoreError::UpstreamUnavailable("stub gateway offline".into()));
        }

        let n = self.counter.fetch_add(1, Ordering::SeqCst);
        let pidx = format!("stub-{:08x}", n);
        self.payments
            .insert(pidx.clone(), (request.amount, GatewayStatus::Completed));

        Ok(InitiateResponse {
            payment_url: format!("https://gateway.invalid/pay/{}", pidx),
            pidx,
        })
    }

    async fn lookup(&self, pidx: &str) -> Result<LookupResponse> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(CoreError::UpstreamUnavailable("stub gateway offline".into()));
        }

        self.lookups.fetch_add(1, Ordering::SeqCst);
        let entry = self.payments.get(pidx).ok_or_else(|| {
            CoreError::UpstreamUnavailable(format!("stub gateway has no record of {}", pidx))
        })?;

        Ok(LookupResponse {
            pidx: pidx.to_string(),
            total_amount: entry.0,
            status: entry.1,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gateway_status_wire_values() {
        assert_eq!(
            serde_json::to_string(&GatewayStatus::Completed).unwrap(),
            "\"Completed\""
        );
        assert_eq!(
            serde_json::to_string(&GatewayStatus::UserCanceled).unwrap(),
            "\"User canceled\""
        );
        let parsed: GatewayStatus = serde_json::from_str("\"Expired\"").unwrap();
        assert_eq!(parsed, GatewayStatus::Expired);
    }

    #[tokio::test]
    async fn test_stub_round_trip() {
        let stub = StubGateway::new();
        let resp = stub
            .initiate(InitiateRequest {
                amount: 3000,
                purchase_order_id: "order-1".into(),
                purchase_order_name: "Test rental".into(),
                return_url: String::new(),
            })
            .await
            .unwrap();

        let lookup = stub.lookup(&resp.pidx).await.unwrap();
        assert_eq!(lookup.total_amount, 3000);
        assert_eq!(lookup.status, GatewayStatus::Completed);
        assert_eq!(stub.lookup_count(), 1);
    }

    #[tokio::test]
    async fn test_stub_unavailable() {
        let stub = StubGateway::new();
        stub.set_unavailable(true);
        let res = stub
            .initiate(InitiateRequest {
                amount: 100,
                purchase_order_id: "order-2".into(),
                purchase_order_name: "Test".into(),
                return_url: String::new(),
            })
            .await;
        assert!(matches!(res, Err(CoreError::UpstreamUnavailable(_))));
    }
}
