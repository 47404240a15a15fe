//! services/api/src/web/billing.rs
//!
//! Checkout and webhook endpoints for the payment providers. Webhooks are
//! verified by the matching gateway before any payload field is trusted, and
//! entitlement mutations are idempotent via the payment-event ledger.

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Extension, Json,
};
use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, warn};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::{reject, reject_port_error, ApiRejection, ErrorCode};
use crate::web::state::AppState;
use edem_core::domain::{PaymentNotification, PaymentProvider, SubscriptionTier};
use edem_core::ports::BillingGateway;

/// How long one successful payment extends a subscription.
const SUBSCRIPTION_DAYS: i64 = 30;

//=========================================================================================
// Request/Response Types
//=========================================================================================

#[derive(Deserialize, ToSchema)]
pub struct CheckoutRequest {
    /// Paid plan to purchase; defaults to `pro`.
    #[serde(default)]
    pub plan: Option<String>,
}

#[derive(Serialize, ToSchema)]
pub struct CheckoutResponse {
    pub order_id: String,
    pub url: String,
}

#[derive(Serialize, ToSchema)]
pub struct WebhookAck {
    pub received: bool,
}

fn resolve_gateway(
    state: &AppState,
    provider: &str,
) -> Result<(PaymentProvider, Arc<dyn BillingGateway>), ApiRejection> {
    let provider = PaymentProvider::parse(provider).ok_or_else(|| {
        reject(StatusCode::NOT_FOUND, ErrorCode::NotFound, "Unknown payment provider")
    })?;
    let gateway = state.gateway(provider).ok_or_else(|| {
        reject(StatusCode::NOT_FOUND, ErrorCode::NotFound, "Unknown payment provider")
    })?;
    Ok((provider, gateway))
}

//=========================================================================================
// Handlers
//=========================================================================================

/// POST /billing/{provider}/checkout - Create a hosted checkout redirect
#[utoipa::path(
    post,
    path = "/billing/{provider}/checkout",
    params(("provider" = String, Path, description = "stripe, yookassa or crypto")),
    request_body = CheckoutRequest,
    responses(
        (status = 200, description = "Redirect URL for the hosted checkout", body = CheckoutResponse),
        (status = 400, description = "Free plan has no checkout"),
        (status = 401, description = "Not authenticated"),
        (status = 404, description = "Unknown provider")
    )
)]
pub async fn checkout_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Path(provider): Path<String>,
    Json(req): Json<CheckoutRequest>,
) -> Result<impl IntoResponse, ApiRejection> {
    let (_, gateway) = resolve_gateway(&state, &provider)?;

    let plan = match req.plan.as_deref() {
        None => SubscriptionTier::Pro,
        Some(raw) => SubscriptionTier::parse(raw).ok_or_else(|| {
            reject(StatusCode::BAD_REQUEST, ErrorCode::Validation, "Unknown plan")
        })?,
    };
    if !plan.is_paid() {
        return Err(reject(
            StatusCode::BAD_REQUEST,
            ErrorCode::Validation,
            "The free plan has no checkout",
        ));
    }

    let user = state.db.get_user(user_id).await.map_err(reject_port_error)?;
    let redirect = gateway.create_checkout(&user, plan).await.map_err(|e| {
        error!("Checkout creation failed: {}", e);
        reject(
            StatusCode::BAD_GATEWAY,
            ErrorCode::Upstream,
            "Checkout creation failed",
        )
    })?;

    Ok(Json(CheckoutResponse {
        order_id: redirect.order_id,
        url: redirect.url,
    }))
}

/// POST /billing/{provider}/webhook - Payment notification endpoint
///
/// Signature verification happens inside the gateway before the payload is
/// parsed; duplicate deliveries of the same event id are acknowledged without
/// touching entitlement state again.
#[utoipa::path(
    post,
    path = "/billing/{provider}/webhook",
    params(("provider" = String, Path, description = "stripe, yookassa or crypto")),
    responses(
        (status = 200, description = "Notification processed or ignored", body = WebhookAck),
        (status = 401, description = "Signature verification failed"),
        (status = 404, description = "Unknown provider")
    )
)]
pub async fn webhook_handler(
    State(state): State<Arc<AppState>>,
    Path(provider): Path<String>,
    headers: HeaderMap,
    body: String,
) -> Result<impl IntoResponse, ApiRejection> {
    let (provider, gateway) = resolve_gateway(&state, &provider)?;

    let signature_header = match provider {
        PaymentProvider::Stripe => Some("stripe-signature"),
        PaymentProvider::Crypto => Some("x-ipn-signature"),
        PaymentProvider::Yookassa => None,
    };
    let signature = signature_header
        .and_then(|name| headers.get(name))
        .and_then(|value| value.to_str().ok());

    let notification = gateway
        .verify_notification(signature, &body)
        .await
        .map_err(|e| {
            warn!("Webhook rejected for {}: {}", provider.as_str(), e);
            reject_port_error(e)
        })?;

    let Some(notification) = notification else {
        return Ok(Json(WebhookAck { received: true }));
    };

    apply_payment(&state, provider, notification).await?;
    Ok(Json(WebhookAck { received: true }))
}

/// Resolves the paying user and applies the tier change exactly once per
/// event id.
async fn apply_payment(
    state: &AppState,
    provider: PaymentProvider,
    notification: PaymentNotification,
) -> Result<(), ApiRejection> {
    let user_id = match notification.user_id {
        Some(user_id) => Some(user_id),
        None => match &notification.customer_email {
            Some(email) => state
                .db
                .find_user_id_by_email(email)
                .await
                .map_err(reject_port_error)?,
            None => None,
        },
    };
    let Some(user_id) = user_id else {
        warn!(
            "Payment {} from {} matches no user; acknowledged without changes",
            notification.event_id,
            provider.as_str(),
        );
        return Ok(());
    };

    let fresh = state
        .db
        .record_payment_event(provider, &notification.event_id)
        .await
        .map_err(reject_port_error)?;
    if !fresh {
        info!(
            "Duplicate delivery of event {} from {}; entitlement unchanged",
            notification.event_id,
            provider.as_str(),
        );
        return Ok(());
    }

    let expires_at = Utc::now() + Duration::days(SUBSCRIPTION_DAYS);
    state
        .db
        .update_subscription(user_id, notification.plan, expires_at)
        .await
        .map_err(reject_port_error)?;

    info!(
        "Payment {} from {} set user {} to {} until {}",
        notification.event_id,
        provider.as_str(),
        user_id,
        notification.plan.as_str(),
        expires_at,
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::{DateTime, Utc};
    use std::collections::HashSet;
    use std::sync::Mutex;

    use crate::config::Config;
    use edem_core::domain::{
        ChatMessage, ChatSession, MessageRole, Profile, User, UserCredentials, VoiceId,
    };
    use edem_core::emotion::{EmotionClassifier, MessageAnalyzer};
    use edem_core::entitlement::QuotaPolicy;
    use edem_core::language::LanguageDetector;
    use edem_core::ports::{
        ChatModelService, DatabaseService, GenerationParams, PortError, PortResult, ReplyStream,
    };
    use edem_core::prompt::PromptCatalog;
    use edem_core::voice::VoiceCatalog;

    /// A storage stub covering only the calls the webhook path makes.
    #[derive(Default)]
    struct MockDb {
        processed_events: Mutex<HashSet<(String, String)>>,
        subscription_updates: Mutex<Vec<(Uuid, SubscriptionTier)>>,
    }

    #[async_trait]
    impl DatabaseService for MockDb {
        async fn create_user_with_email(&self, _: &str, _: &str) -> PortResult<User> {
            unimplemented!()
        }
        async fn get_user_by_email(&self, _: &str) -> PortResult<UserCredentials> {
            unimplemented!()
        }
        async fn get_user(&self, _: Uuid) -> PortResult<User> {
            unimplemented!()
        }
        async fn find_user_id_by_email(&self, email: &str) -> PortResult<Option<Uuid>> {
            if email == "known@example.com" {
                Ok(Some(Uuid::from_u128(7)))
            } else {
                Ok(None)
            }
        }
        async fn create_auth_session(
            &self,
            _: &str,
            _: Uuid,
            _: DateTime<Utc>,
        ) -> PortResult<()> {
            unimplemented!()
        }
        async fn validate_auth_session(&self, _: &str) -> PortResult<Uuid> {
            unimplemented!()
        }
        async fn delete_auth_session(&self, _: &str) -> PortResult<()> {
            unimplemented!()
        }
        async fn get_profile(&self, _: Uuid) -> PortResult<Option<Profile>> {
            unimplemented!()
        }
        async fn update_subscription(
            &self,
            user_id: Uuid,
            tier: SubscriptionTier,
            _: DateTime<Utc>,
        ) -> PortResult<()> {
            self.subscription_updates
                .lock()
                .unwrap()
                .push((user_id, tier));
            Ok(())
        }
        async fn create_chat_session(
            &self,
            _: Uuid,
            _: Option<VoiceId>,
        ) -> PortResult<ChatSession> {
            unimplemented!()
        }
        async fn get_chat_session(&self, _: Uuid) -> PortResult<ChatSession> {
            unimplemented!()
        }
        async fn latest_session_for_user(&self, _: Uuid) -> PortResult<Option<ChatSession>> {
            unimplemented!()
        }
        async fn list_sessions_for_user(&self, _: Uuid) -> PortResult<Vec<ChatSession>> {
            unimplemented!()
        }
        async fn bind_session_voice(&self, _: Uuid, _: VoiceId) -> PortResult<()> {
            unimplemented!()
        }
        async fn insert_message(
            &self,
            _: Uuid,
            _: MessageRole,
            _: &str,
        ) -> PortResult<ChatMessage> {
            unimplemented!()
        }
        async fn recent_messages(&self, _: Uuid, _: i64) -> PortResult<Vec<ChatMessage>> {
            unimplemented!()
        }
        async fn count_user_messages(
            &self,
            _: Uuid,
            _: Option<DateTime<Utc>>,
        ) -> PortResult<u64> {
            unimplemented!()
        }
        async fn record_payment_event(
            &self,
            provider: PaymentProvider,
            event_id: &str,
        ) -> PortResult<bool> {
            Ok(self
                .processed_events
                .lock()
                .unwrap()
                .insert((provider.as_str().to_string(), event_id.to_string())))
        }
    }

    struct NoopModel;

    #[async_trait]
    impl ChatModelService for NoopModel {
        async fn stream_reply(
            &self,
            _: &str,
            _: &[edem_core::domain::PromptMessage],
            _: GenerationParams,
        ) -> PortResult<ReplyStream> {
            Err(PortError::Unexpected("not used in these tests".to_string()))
        }
    }

    fn test_state(db: Arc<MockDb>) -> AppState {
        AppState {
            db,
            config: Arc::new(Config {
                bind_address: "127.0.0.1:3000".parse().unwrap(),
                database_url: "postgres://unused".to_string(),
                log_level: tracing::Level::INFO,
                app_base_url: "http://localhost:3000".to_string(),
                openai_api_key: None,
                chat_model: "gpt-4o-mini".to_string(),
                chat_temperature: 0.8,
                chat_max_tokens: 400,
                free_message_allowance: 2,
                paid_monthly_allowance: 500,
                stripe_secret_key: None,
                stripe_webhook_secret: None,
                yookassa_shop_id: None,
                yookassa_secret_key: None,
                crypto_ipn_secret: None,
                crypto_gateway_url: "https://crypto-payment-gateway.com/pay".to_string(),
            }),
            chat_model: Arc::new(NoopModel),
            payments: Vec::new(),
            language_detector: Arc::new(LanguageDetector::with_default_signals()),
            emotion_classifier: Arc::new(EmotionClassifier::with_default_rules()),
            message_analyzer: Arc::new(MessageAnalyzer::default()),
            voices: Arc::new(VoiceCatalog::with_default_profiles()),
            prompts: Arc::new(PromptCatalog::with_default_prompts()),
            quota: QuotaPolicy::default(),
        }
    }

    fn notification(event_id: &str, user_id: Option<Uuid>) -> PaymentNotification {
        PaymentNotification {
            event_id: event_id.to_string(),
            user_id,
            customer_email: None,
            plan: SubscriptionTier::Pro,
        }
    }

    #[tokio::test]
    async fn duplicate_deliveries_mutate_entitlement_once() {
        let db = Arc::new(MockDb::default());
        let state = test_state(db.clone());
        let user_id = Uuid::from_u128(42);

        for _ in 0..3 {
            apply_payment(
                &state,
                PaymentProvider::Crypto,
                notification("evt_dup", Some(user_id)),
            )
            .await
            .unwrap();
        }

        let updates = db.subscription_updates.lock().unwrap();
        assert_eq!(updates.as_slice(), &[(user_id, SubscriptionTier::Pro)]);
    }

    #[tokio::test]
    async fn distinct_events_each_apply() {
        let db = Arc::new(MockDb::default());
        let state = test_state(db.clone());
        let user_id = Uuid::from_u128(42);

        apply_payment(&state, PaymentProvider::Stripe, notification("evt_1", Some(user_id)))
            .await
            .unwrap();
        apply_payment(&state, PaymentProvider::Stripe, notification("evt_2", Some(user_id)))
            .await
            .unwrap();

        assert_eq!(db.subscription_updates.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn same_event_id_from_another_provider_still_applies() {
        // The ledger key is (provider, event id).
        let db = Arc::new(MockDb::default());
        let state = test_state(db.clone());
        let user_id = Uuid::from_u128(42);

        apply_payment(&state, PaymentProvider::Stripe, notification("evt_x", Some(user_id)))
            .await
            .unwrap();
        apply_payment(&state, PaymentProvider::Crypto, notification("evt_x", Some(user_id)))
            .await
            .unwrap();

        assert_eq!(db.subscription_updates.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn unknown_user_is_acknowledged_without_changes() {
        let db = Arc::new(MockDb::default());
        let state = test_state(db.clone());

        let mut unmatched = notification("evt_ghost", None);
        unmatched.customer_email = Some("nobody@example.com".to_string());
        apply_payment(&state, PaymentProvider::Stripe, unmatched)
            .await
            .unwrap();

        assert!(db.subscription_updates.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn email_fallback_resolves_the_user() {
        let db = Arc::new(MockDb::default());
        let state = test_state(db.clone());

        let mut by_email = notification("evt_mail", None);
        by_email.customer_email = Some("known@example.com".to_string());
        apply_payment(&state, PaymentProvider::Yookassa, by_email)
            .await
            .unwrap();

        let updates = db.subscription_updates.lock().unwrap();
        assert_eq!(
            updates.as_slice(),
            &[(Uuid::from_u128(7), SubscriptionTier::Pro)]
        );
    }
}
