//! services/api/src/adapters/billing/yookassa.rs
//!
//! Hosted-checkout gateway over the YooKassa payments API. The provider does
//! not sign its webhooks, so a notification is verified by re-fetching the
//! payment over the authenticated API and requiring `succeeded` before any
//! payload field is trusted.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tracing::warn;
use uuid::Uuid;

use edem_core::domain::{
    CheckoutRedirect, PaymentNotification, PaymentProvider, SubscriptionTier, User,
};
use edem_core::ports::{BillingGateway, PortError, PortResult};

const API_BASE_URL: &str = "https://api.yookassa.ru/v3";

pub struct YookassaGateway {
    http: reqwest::Client,
    shop_id: Option<String>,
    secret_key: Option<String>,
    app_base_url: String,
    api_base_url: String,
}

impl YookassaGateway {
    pub fn new(
        http: reqwest::Client,
        shop_id: Option<String>,
        secret_key: Option<String>,
        app_base_url: String,
    ) -> Self {
        Self {
            http,
            shop_id,
            secret_key,
            app_base_url,
            api_base_url: API_BASE_URL.to_string(),
        }
    }

    fn credentials(&self) -> PortResult<(&str, &str)> {
        match (self.shop_id.as_deref(), self.secret_key.as_deref()) {
            (Some(shop_id), Some(secret_key)) => Ok((shop_id, secret_key)),
            _ => Err(PortError::Unexpected(
                "Hosted checkout provider is not configured".to_string(),
            )),
        }
    }

    /// Re-reads the payment from the provider API; the source of truth for
    /// webhook verification.
    async fn fetch_payment(&self, payment_id: &str) -> PortResult<PaymentResource> {
        let (shop_id, secret_key) = self
            .credentials()
            .map_err(|_| PortError::InvalidSignature)?;

        let response = self
            .http
            .get(format!("{}/payments/{}", self.api_base_url, payment_id))
            .basic_auth(shop_id, Some(secret_key))
            .send()
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?;

        if !response.status().is_success() {
            return Err(PortError::InvalidSignature);
        }

        response
            .json::<PaymentResource>()
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))
    }
}

//=========================================================================================
// Wire Types
//=========================================================================================

#[derive(Deserialize)]
struct PaymentResource {
    id: String,
    status: String,
    #[serde(default)]
    metadata: PaymentMetadata,
}

#[derive(Deserialize, Default)]
struct PaymentMetadata {
    #[serde(rename = "userId", default)]
    user_id: Option<String>,
    #[serde(default)]
    plan: Option<String>,
}

#[derive(Deserialize)]
struct CreatePaymentResponse {
    id: String,
    confirmation: PaymentConfirmation,
}

#[derive(Deserialize)]
struct PaymentConfirmation {
    confirmation_url: String,
}

#[derive(Deserialize)]
struct WebhookBody {
    event: String,
    object: WebhookObject,
}

#[derive(Deserialize)]
struct WebhookObject {
    id: String,
}

//=========================================================================================
// `BillingGateway` Trait Implementation
//=========================================================================================

#[async_trait]
impl BillingGateway for YookassaGateway {
    fn provider(&self) -> PaymentProvider {
        PaymentProvider::Yookassa
    }

    async fn create_checkout(
        &self,
        user: &User,
        plan: SubscriptionTier,
    ) -> PortResult<CheckoutRedirect> {
        let (shop_id, secret_key) = self.credentials()?;
        let price_rub = plan
            .monthly_price_rub()
            .ok_or_else(|| PortError::Unexpected("Free plan has no checkout".to_string()))?;

        let payload = json!({
            "amount": {
                "value": format!("{}.00", price_rub),
                "currency": "RUB",
            },
            "capture": true,
            "confirmation": {
                "type": "redirect",
                "return_url": format!("{}/account?success=true", self.app_base_url),
            },
            "description": format!("EDEM — подписка ({})", plan.as_str()),
            "metadata": {
                "userId": user.user_id.to_string(),
                "plan": plan.as_str(),
            },
        });

        let response = self
            .http
            .post(format!("{}/payments", self.api_base_url))
            .basic_auth(shop_id, Some(secret_key))
            .header("Idempotence-Key", Uuid::new_v4().to_string())
            .json(&payload)
            .send()
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?;

        if !response.status().is_success() {
            return Err(PortError::Unexpected(format!(
                "Payment creation failed with status {}",
                response.status()
            )));
        }

        let created: CreatePaymentResponse = response
            .json()
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?;

        Ok(CheckoutRedirect {
            order_id: created.id,
            url: created.confirmation.confirmation_url,
        })
    }

    async fn verify_notification(
        &self,
        _signature: Option<&str>,
        body: &str,
    ) -> PortResult<Option<PaymentNotification>> {
        let webhook: WebhookBody = serde_json::from_str(body)
            .map_err(|e| PortError::Unexpected(format!("Malformed webhook payload: {}", e)))?;

        if webhook.event != "payment.succeeded" {
            return Ok(None);
        }

        // Trust only the re-fetched payment, never the webhook body.
        let payment = self.fetch_payment(&webhook.object.id).await?;
        if payment.status != "succeeded" {
            return Err(PortError::InvalidSignature);
        }

        let user_id = match payment.metadata.user_id.as_deref() {
            Some(raw) => match Uuid::parse_str(raw) {
                Ok(id) => Some(id),
                Err(_) => {
                    warn!("Payment {} carries a malformed user id", payment.id);
                    None
                }
            },
            None => None,
        };
        let plan = payment
            .metadata
            .plan
            .as_deref()
            .and_then(SubscriptionTier::parse)
            .unwrap_or(SubscriptionTier::Pro);

        Ok(Some(PaymentNotification {
            event_id: payment.id,
            user_id,
            customer_email: None,
            plan,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unconfigured() -> YookassaGateway {
        YookassaGateway::new(
            reqwest::Client::new(),
            None,
            None,
            "http://localhost:3000".to_string(),
        )
    }

    #[tokio::test]
    async fn irrelevant_event_kinds_are_ignored() {
        let body = r#"{"event": "payment.canceled", "object": {"id": "pay_1"}}"#;
        let result = unconfigured().verify_notification(None, body).await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn unconfigured_gateway_fails_closed_on_success_events() {
        let body = r#"{"event": "payment.succeeded", "object": {"id": "pay_1"}}"#;
        let err = unconfigured()
            .verify_notification(None, body)
            .await
            .unwrap_err();
        assert!(matches!(err, PortError::InvalidSignature));
    }

    #[tokio::test]
    async fn malformed_payload_is_rejected() {
        let err = unconfigured()
            .verify_notification(None, "not-json")
            .await
            .unwrap_err();
        assert!(matches!(err, PortError::Unexpected(_)));
    }

    #[tokio::test]
    async fn checkout_requires_configuration() {
        let user = User {
            user_id: Uuid::new_v4(),
            email: None,
        };
        let err = unconfigured()
            .create_checkout(&user, SubscriptionTier::Basic)
            .await
            .unwrap_err();
        assert!(matches!(err, PortError::Unexpected(_)));
    }
}
