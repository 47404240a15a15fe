//! services/api/src/adapters/billing/stripe.rs
//!
//! Card-checkout gateway: hosted checkout sessions plus signed webhook
//! verification. The `stripe-signature` header carries `t=<ts>,v1=<hex>`;
//! the signed payload is `"{t}.{body}"` under the webhook secret.

use async_trait::async_trait;
use serde::Deserialize;
use tracing::warn;
use uuid::Uuid;

use edem_core::domain::{
    CheckoutRedirect, PaymentNotification, PaymentProvider, SubscriptionTier, User,
};
use edem_core::ports::{BillingGateway, PortError, PortResult};

use super::verify_hmac_sha256_hex;

const CHECKOUT_API_URL: &str = "https://api.stripe.com/v1/checkout/sessions";

pub struct StripeGateway {
    http: reqwest::Client,
    secret_key: Option<String>,
    webhook_secret: Option<String>,
    app_base_url: String,
}

impl StripeGateway {
    pub fn new(
        http: reqwest::Client,
        secret_key: Option<String>,
        webhook_secret: Option<String>,
        app_base_url: String,
    ) -> Self {
        Self {
            http,
            secret_key,
            webhook_secret,
            app_base_url,
        }
    }
}

//=========================================================================================
// Wire Types
//=========================================================================================

#[derive(Deserialize)]
struct CheckoutSessionResponse {
    id: String,
    url: String,
}

#[derive(Deserialize)]
struct WebhookEvent {
    id: String,
    #[serde(rename = "type")]
    kind: String,
    data: WebhookEventData,
}

#[derive(Deserialize)]
struct WebhookEventData {
    object: WebhookObject,
}

#[derive(Deserialize)]
struct WebhookObject {
    #[serde(default)]
    metadata: WebhookMetadata,
    #[serde(default)]
    customer_email: Option<String>,
}

#[derive(Deserialize, Default)]
struct WebhookMetadata {
    #[serde(default)]
    user_id: Option<String>,
    #[serde(default)]
    plan: Option<String>,
}

/// Pulls `t` and `v1` out of the signature header.
fn parse_signature_header(header: &str) -> Option<(String, String)> {
    let mut timestamp = None;
    let mut signature = None;
    for part in header.split(',') {
        let (key, value) = part.trim().split_once('=')?;
        match key {
            "t" => timestamp = Some(value.to_string()),
            "v1" => signature = Some(value.to_string()),
            _ => {}
        }
    }
    Some((timestamp?, signature?))
}

//=========================================================================================
// `BillingGateway` Trait Implementation
//=========================================================================================

#[async_trait]
impl BillingGateway for StripeGateway {
    fn provider(&self) -> PaymentProvider {
        PaymentProvider::Stripe
    }

    async fn create_checkout(
        &self,
        user: &User,
        plan: SubscriptionTier,
    ) -> PortResult<CheckoutRedirect> {
        let secret_key = self
            .secret_key
            .as_deref()
            .ok_or_else(|| PortError::Unexpected("Card provider is not configured".to_string()))?;
        let price_rub = plan
            .monthly_price_rub()
            .ok_or_else(|| PortError::Unexpected("Free plan has no checkout".to_string()))?;

        let user_id = user.user_id.to_string();
        let unit_amount = (price_rub * 100).to_string();
        let success_url = format!("{}/account?success=true", self.app_base_url);
        let cancel_url = format!("{}/account?canceled=true", self.app_base_url);

        let mut form: Vec<(&str, String)> = vec![
            ("mode", "subscription".to_string()),
            ("payment_method_types[0]", "card".to_string()),
            ("line_items[0][price_data][currency]", "rub".to_string()),
            (
                "line_items[0][price_data][product_data][name]",
                "EDEM — подписка".to_string(),
            ),
            (
                "line_items[0][price_data][product_data][description]",
                "Безлимитный доступ к ИИ-чату".to_string(),
            ),
            (
                "line_items[0][price_data][recurring][interval]",
                "month".to_string(),
            ),
            ("line_items[0][price_data][unit_amount]", unit_amount),
            ("line_items[0][quantity]", "1".to_string()),
            ("metadata[user_id]", user_id),
            ("metadata[plan]", plan.as_str().to_string()),
            ("success_url", success_url),
            ("cancel_url", cancel_url),
        ];
        if let Some(email) = &user.email {
            form.push(("customer_email", email.clone()));
        }

        let response = self
            .http
            .post(CHECKOUT_API_URL)
            .bearer_auth(secret_key)
            .form(&form)
            .send()
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?;

        if !response.status().is_success() {
            return Err(PortError::Unexpected(format!(
                "Checkout session creation failed with status {}",
                response.status()
            )));
        }

        let session: CheckoutSessionResponse = response
            .json()
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?;

        Ok(CheckoutRedirect {
            order_id: session.id,
            url: session.url,
        })
    }

    async fn verify_notification(
        &self,
        signature: Option<&str>,
        body: &str,
    ) -> PortResult<Option<PaymentNotification>> {
        let webhook_secret = self
            .webhook_secret
            .as_deref()
            .ok_or(PortError::InvalidSignature)?;
        let header = signature.ok_or(PortError::InvalidSignature)?;
        let (timestamp, expected) =
            parse_signature_header(header).ok_or(PortError::InvalidSignature)?;

        let signed_payload = format!("{}.{}", timestamp, body);
        if !verify_hmac_sha256_hex(
            webhook_secret.as_bytes(),
            signed_payload.as_bytes(),
            &expected,
        ) {
            return Err(PortError::InvalidSignature);
        }

        let event: WebhookEvent = serde_json::from_str(body)
            .map_err(|e| PortError::Unexpected(format!("Malformed webhook payload: {}", e)))?;

        if event.kind != "checkout.session.completed" {
            return Ok(None);
        }

        let user_id = match event.data.object.metadata.user_id.as_deref() {
            Some(raw) => match Uuid::parse_str(raw) {
                Ok(id) => Some(id),
                Err(_) => {
                    warn!("Webhook {} carries a malformed user id", event.id);
                    None
                }
            },
            None => None,
        };
        let plan = event
            .data
            .object
            .metadata
            .plan
            .as_deref()
            .and_then(SubscriptionTier::parse)
            .unwrap_or(SubscriptionTier::Pro);

        Ok(Some(PaymentNotification {
            event_id: event.id,
            user_id,
            customer_email: event.data.object.customer_email,
            plan,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::super::hmac_sha256_hex;
    use super::*;

    fn gateway(webhook_secret: &str) -> StripeGateway {
        StripeGateway::new(
            reqwest::Client::new(),
            Some("sk_test".to_string()),
            Some(webhook_secret.to_string()),
            "http://localhost:3000".to_string(),
        )
    }

    fn signed_header(secret: &str, timestamp: &str, body: &str) -> String {
        let payload = format!("{}.{}", timestamp, body);
        format!(
            "t={},v1={}",
            timestamp,
            hmac_sha256_hex(secret.as_bytes(), payload.as_bytes())
        )
    }

    const COMPLETED_EVENT: &str = r#"{
        "id": "evt_1",
        "type": "checkout.session.completed",
        "data": {"object": {
            "metadata": {"user_id": "7f8a5e6e-3f0c-4c39-9f8e-2a60cbfd4c3a", "plan": "pro"},
            "customer_email": "user@example.com"
        }}
    }"#;

    #[tokio::test]
    async fn valid_signature_yields_a_notification() {
        let header = signed_header("whsec", "1700000000", COMPLETED_EVENT);
        let result = gateway("whsec")
            .verify_notification(Some(&header), COMPLETED_EVENT)
            .await
            .unwrap();
        let notification = result.unwrap();
        assert_eq!(notification.event_id, "evt_1");
        assert_eq!(notification.plan, SubscriptionTier::Pro);
        assert!(notification.user_id.is_some());
    }

    #[tokio::test]
    async fn invalid_signature_is_rejected_before_parsing() {
        let header = signed_header("other-secret", "1700000000", COMPLETED_EVENT);
        let err = gateway("whsec")
            .verify_notification(Some(&header), COMPLETED_EVENT)
            .await
            .unwrap_err();
        assert!(matches!(err, PortError::InvalidSignature));
    }

    #[tokio::test]
    async fn missing_signature_is_rejected() {
        let err = gateway("whsec")
            .verify_notification(None, COMPLETED_EVENT)
            .await
            .unwrap_err();
        assert!(matches!(err, PortError::InvalidSignature));
    }

    #[tokio::test]
    async fn irrelevant_event_kinds_are_ignored() {
        let body = r#"{"id": "evt_2", "type": "invoice.paid", "data": {"object": {}}}"#;
        let header = signed_header("whsec", "1700000000", body);
        let result = gateway("whsec")
            .verify_notification(Some(&header), body)
            .await
            .unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn signature_header_parsing_extracts_both_fields() {
        let parsed = parse_signature_header("t=123,v1=abcdef").unwrap();
        assert_eq!(parsed.0, "123");
        assert_eq!(parsed.1, "abcdef");
        assert!(parse_signature_header("v1=abcdef").is_none());
        assert!(parse_signature_header("garbage").is_none());
    }
}
