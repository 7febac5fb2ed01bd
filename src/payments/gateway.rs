use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use hmac::{Hmac, Mac};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::json;
use sha2::Sha256;

use crate::error::{AppError, Result};

type HmacSha256 = Hmac<Sha256>;

/// An order registered with the payment gateway ahead of checkout.
/// `amount_minor` is in minor currency units; the conversion from the
/// major units used everywhere else in this crate happens exactly at
/// this boundary and nowhere else.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayOrder {
    pub id: String,
    pub amount_minor: i64,
    pub currency: String,
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Register a payment order. `amount` is in major currency units;
    /// `notes` is an opaque metadata map echoed back in webhook events.
    async fn create_order(
        &self,
        amount: Decimal,
        currency: &str,
        receipt: &str,
        notes: HashMap<String, String>,
    ) -> Result<GatewayOrder>;
}

/// Verify the gateway's HMAC-SHA256 signature over the raw webhook
/// body. The header value is lowercase hex; comparison is the MAC
/// crate's constant-time verify.
pub fn verify_signature(raw_body: &[u8], signature_hex: &str, secret: &str) -> Result<()> {
    let expected = hex::decode(signature_hex).map_err(|_| AppError::InvalidSignature)?;

    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| AppError::Internal(format!("HMAC key setup failed: {}", e)))?;
    mac.update(raw_body);
    mac.verify_slice(&expected)
        .map_err(|_| AppError::InvalidSignature)
}

/// REST client for the gateway's order API (basic auth, JSON).
pub struct HttpGatewayClient {
    client: reqwest::Client,
    base_url: String,
    key_id: String,
    key_secret: String,
}

#[derive(Debug, Deserialize)]
struct OrderResponse {
    id: String,
    amount: i64,
    currency: String,
}

impl HttpGatewayClient {
    pub fn new(base_url: String, key_id: String, key_secret: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url,
            key_id,
            key_secret,
        }
    }

    fn to_minor_units(amount: Decimal) -> Result<i64> {
        (amount * Decimal::from(100))
            .round()
            .to_i64()
            .ok_or_else(|| AppError::Payment(format!("Amount out of range: {}", amount)))
    }
}

#[async_trait]
impl PaymentGateway for HttpGatewayClient {
    async fn create_order(
        &self,
        amount: Decimal,
        currency: &str,
        receipt: &str,
        notes: HashMap<String, String>,
    ) -> Result<GatewayOrder> {
        let amount_minor = Self::to_minor_units(amount)?;

        let body = json!({
            "amount": amount_minor,
            "currency": currency,
            "receipt": receipt,
            "notes": notes,
        });

        let response = self
            .client
            .post(format!("{}/v1/orders", self.base_url))
            .basic_auth(&self.key_id, Some(&self.key_secret))
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::External(format!("Gateway error: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(AppError::External(format!(
                "Gateway order creation failed ({}): {}",
                status, text
            )));
        }

        let order: OrderResponse = response
            .json()
            .await
            .map_err(|e| AppError::External(format!("Gateway response decode failed: {}", e)))?;

        Ok(GatewayOrder {
            id: order.id,
            amount_minor: order.amount,
            currency: order.currency,
        })
    }
}

/// In-process gateway used by tests and local development: hands out
/// deterministic order ids and can be told to fail, which exercises
/// the reservation compensation path.
#[derive(Default)]
pub struct FakeGateway {
    pub fail_next: Mutex<bool>,
    pub orders: Mutex<Vec<GatewayOrder>>,
}

impl FakeGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_next(&self) {
        *self.fail_next.lock().unwrap() = true;
    }
}

#[async_trait]
impl PaymentGateway for FakeGateway {
    async fn create_order(
        &self,
        amount: Decimal,
        currency: &str,
        _receipt: &str,
        _notes: HashMap<String, String>,
    ) -> Result<GatewayOrder> {
        if std::mem::take(&mut *self.fail_next.lock().unwrap()) {
            return Err(AppError::External("Gateway unavailable".to_string()));
        }

        let amount_minor = HttpGatewayClient::to_minor_units(amount)?;
        let order = GatewayOrder {
            id: format!("order_{}", uuid::Uuid::new_v4().simple()),
            amount_minor,
            currency: currency.to_string(),
        };
        self.orders.lock().unwrap().push(order.clone());
        Ok(order)
    }
}
