//! services/api/src/adapters/billing/crypto.rs
//!
//! Generic crypto-payment gateway. Checkout is a redirect onto the configured
//! gateway with a fresh order id; the IPN callback carries an HMAC-SHA256 hex
//! signature over the raw body in `x-ipn-signature`.

use async_trait::async_trait;
use serde::Deserialize;
use tracing::warn;
use uuid::Uuid;

use edem_core::domain::{
    CheckoutRedirect, PaymentNotification, PaymentProvider, SubscriptionTier, User,
};
use edem_core::ports::{BillingGateway, PortError, PortResult};

use super::verify_hmac_sha256_hex;

pub struct CryptoGateway {
    ipn_secret: Option<String>,
    gateway_url: String,
}

impl CryptoGateway {
    pub fn new(ipn_secret: Option<String>, gateway_url: String) -> Self {
        Self {
            ipn_secret,
            gateway_url,
        }
    }
}

#[derive(Deserialize)]
struct IpnPayload {
    order_id: String,
    status: String,
    #[serde(default)]
    user_id: Option<String>,
    #[serde(default)]
    customer_email: Option<String>,
    #[serde(default)]
    plan: Option<String>,
}

#[async_trait]
impl BillingGateway for CryptoGateway {
    fn provider(&self) -> PaymentProvider {
        PaymentProvider::Crypto
    }

    async fn create_checkout(
        &self,
        user: &User,
        plan: SubscriptionTier,
    ) -> PortResult<CheckoutRedirect> {
        let price_rub = plan
            .monthly_price_rub()
            .ok_or_else(|| PortError::Unexpected("Free plan has no checkout".to_string()))?;

        let order_id = Uuid::new_v4().to_string();
        let url = format!(
            "{}?order={}&amount={}&currency=RUB&user={}&plan={}",
            self.gateway_url,
            order_id,
            price_rub,
            user.user_id,
            plan.as_str(),
        );

        Ok(CheckoutRedirect { order_id, url })
    }

    async fn verify_notification(
        &self,
        signature: Option<&str>,
        body: &str,
    ) -> PortResult<Option<PaymentNotification>> {
        let secret = self.ipn_secret.as_deref().ok_or(PortError::InvalidSignature)?;
        let signature = signature.ok_or(PortError::InvalidSignature)?;

        if !verify_hmac_sha256_hex(secret.as_bytes(), body.as_bytes(), signature) {
            return Err(PortError::InvalidSignature);
        }

        let payload: IpnPayload = serde_json::from_str(body)
            .map_err(|e| PortError::Unexpected(format!("Malformed IPN payload: {}", e)))?;

        if payload.status != "completed" && payload.status != "confirmed" {
            return Ok(None);
        }

        let user_id = match payload.user_id.as_deref() {
            Some(raw) => match Uuid::parse_str(raw) {
                Ok(id) => Some(id),
                Err(_) => {
                    warn!("IPN {} carries a malformed user id", payload.order_id);
                    None
                }
            },
            None => None,
        };
        let plan = payload
            .plan
            .as_deref()
            .and_then(SubscriptionTier::parse)
            .unwrap_or(SubscriptionTier::Pro);

        Ok(Some(PaymentNotification {
            event_id: payload.order_id,
            user_id,
            customer_email: payload.customer_email,
            plan,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::super::hmac_sha256_hex;
    use super::*;

    fn gateway() -> CryptoGateway {
        CryptoGateway::new(
            Some("ipn-secret".to_string()),
            "https://crypto-payment-gateway.com/pay".to_string(),
        )
    }

    const COMPLETED_IPN: &str = r#"{
        "order_id": "ord_1",
        "status": "completed",
        "user_id": "7f8a5e6e-3f0c-4c39-9f8e-2a60cbfd4c3a",
        "plan": "pro"
    }"#;

    #[tokio::test]
    async fn valid_signature_yields_a_notification() {
        let signature = hmac_sha256_hex(b"ipn-secret", COMPLETED_IPN.as_bytes());
        let result = gateway()
            .verify_notification(Some(&signature), COMPLETED_IPN)
            .await
            .unwrap();
        let notification = result.unwrap();
        assert_eq!(notification.event_id, "ord_1");
        assert_eq!(notification.plan, SubscriptionTier::Pro);
    }

    #[tokio::test]
    async fn invalid_signature_is_rejected_before_parsing() {
        let err = gateway()
            .verify_notification(Some("deadbeef"), COMPLETED_IPN)
            .await
            .unwrap_err();
        assert!(matches!(err, PortError::InvalidSignature));
    }

    #[tokio::test]
    async fn missing_signature_is_rejected() {
        let err = gateway()
            .verify_notification(None, COMPLETED_IPN)
            .await
            .unwrap_err();
        assert!(matches!(err, PortError::InvalidSignature));
    }

    #[tokio::test]
    async fn unconfigured_secret_fails_closed() {
        let unconfigured =
            CryptoGateway::new(None, "https://crypto-payment-gateway.com/pay".to_string());
        let signature = hmac_sha256_hex(b"ipn-secret", COMPLETED_IPN.as_bytes());
        let err = unconfigured
            .verify_notification(Some(&signature), COMPLETED_IPN)
            .await
            .unwrap_err();
        assert!(matches!(err, PortError::InvalidSignature));
    }

    #[tokio::test]
    async fn pending_payments_are_ignored() {
        let body = r#"{"order_id": "ord_2", "status": "pending"}"#;
        let signature = hmac_sha256_hex(b"ipn-secret", body.as_bytes());
        let result = gateway()
            .verify_notification(Some(&signature), body)
            .await
            .unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn checkout_builds_a_redirect_on_the_configured_gateway() {
        let user = User {
            user_id: Uuid::new_v4(),
            email: None,
        };
        let redirect = gateway()
            .create_checkout(&user, SubscriptionTier::Basic)
            .await
            .unwrap();
        assert!(redirect.url.starts_with("https://crypto-payment-gateway.com/pay?order="));
        assert!(redirect.url.contains("amount=1500"));
        assert!(redirect.url.contains(&redirect.order_id));
    }
}
