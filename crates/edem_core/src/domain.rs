//! crates/edem_core/src/domain.rs
//!
//! Defines the pure, core data structures for the application.
//! These structs are independent of any database or serialization format.

use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Subscription level of a user account. Ordered from most to least
/// restrictive so voice entitlement can be expressed as `tier >= min_tier`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum SubscriptionTier {
    Free,
    Basic,
    Plus,
    Pro,
}

impl SubscriptionTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubscriptionTier::Free => "free",
            SubscriptionTier::Basic => "basic",
            SubscriptionTier::Plus => "plus",
            SubscriptionTier::Pro => "pro",
        }
    }

    /// Parses a stored tier value. Callers reading external data are expected
    /// to fall back to `Free` when this returns `None`.
    pub fn parse(value: &str) -> Option<SubscriptionTier> {
        match value {
            "free" => Some(SubscriptionTier::Free),
            "basic" => Some(SubscriptionTier::Basic),
            "plus" => Some(SubscriptionTier::Plus),
            "pro" => Some(SubscriptionTier::Pro),
            _ => None,
        }
    }

    pub fn is_paid(&self) -> bool {
        !matches!(self, SubscriptionTier::Free)
    }

    /// Monthly price in rubles for paid plans.
    pub fn monthly_price_rub(&self) -> Option<u32> {
        match self {
            SubscriptionTier::Free => None,
            SubscriptionTier::Basic => Some(1500),
            SubscriptionTier::Plus => Some(2900),
            SubscriptionTier::Pro => Some(4900),
        }
    }
}

/// A named system-prompt variant shaping the model's persona for a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoiceId {
    Live,
    Shadow,
}

impl VoiceId {
    pub fn as_str(&self) -> &'static str {
        match self {
            VoiceId::Live => "live",
            VoiceId::Shadow => "shadow",
        }
    }

    pub fn parse(value: &str) -> Option<VoiceId> {
        match value {
            "live" => Some(VoiceId::Live),
            "shadow" => Some(VoiceId::Shadow),
            _ => None,
        }
    }
}

/// Author of a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageRole {
    User,
    Assistant,
}

impl MessageRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageRole::User => "user",
            MessageRole::Assistant => "assistant",
        }
    }

    pub fn parse(value: &str) -> Option<MessageRole> {
        match value {
            "user" => Some(MessageRole::User),
            "assistant" => Some(MessageRole::Assistant),
            _ => None,
        }
    }
}

/// Payment integrations the service accepts notifications from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentProvider {
    Stripe,
    Yookassa,
    Crypto,
}

impl PaymentProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentProvider::Stripe => "stripe",
            PaymentProvider::Yookassa => "yookassa",
            PaymentProvider::Crypto => "crypto",
        }
    }

    pub fn parse(value: &str) -> Option<PaymentProvider> {
        match value {
            "stripe" => Some(PaymentProvider::Stripe),
            "yookassa" => Some(PaymentProvider::Yookassa),
            "crypto" => Some(PaymentProvider::Crypto),
            _ => None,
        }
    }
}

// Represents a user - used throughout app
#[derive(Debug, Clone)]
pub struct User {
    pub user_id: Uuid,
    pub email: Option<String>,
}

// Only used internally for login/signup - contains sensitive data
#[derive(Debug, Clone)]
pub struct UserCredentials {
    pub user_id: Uuid,
    pub email: String,
    pub hashed_password: String,
}

// Represents a browser login session (auth cookie)
#[derive(Debug, Clone)]
pub struct AuthSession {
    pub id: String,
    pub user_id: Uuid,
    pub expires_at: DateTime<Utc>,
}

/// Subscription state of an account. The tier is immutable within a single
/// request; payment webhooks are the only writers.
#[derive(Debug, Clone)]
pub struct Profile {
    pub user_id: Uuid,
    pub tier: SubscriptionTier,
    pub expires_at: Option<DateTime<Utc>>,
}

/// One ongoing conversation. The voice is bound on the first turn and must
/// not change silently afterwards.
#[derive(Debug, Clone)]
pub struct ChatSession {
    pub id: Uuid,
    pub user_id: Uuid,
    pub voice: Option<VoiceId>,
    pub created_at: DateTime<Utc>,
}

/// One turn's worth of text. Append-only; ordering by `created_at` defines
/// the conversation history fed back to the model.
#[derive(Debug, Clone)]
pub struct ChatMessage {
    pub id: Uuid,
    pub session_id: Uuid,
    pub role: MessageRole,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

/// A role-tagged message handed to the language model.
#[derive(Debug, Clone)]
pub struct PromptMessage {
    pub role: MessageRole,
    pub content: String,
}

/// Result of creating a hosted checkout with a payment provider.
#[derive(Debug, Clone)]
pub struct CheckoutRedirect {
    pub order_id: String,
    pub url: String,
}

/// A verified payment-succeeded notification from a provider webhook.
/// Only constructed after signature verification.
#[derive(Debug, Clone)]
pub struct PaymentNotification {
    pub event_id: String,
    pub user_id: Option<Uuid>,
    pub customer_email: Option<String>,
    pub plan: SubscriptionTier,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tier_ordering_matches_product_ladder() {
        assert!(SubscriptionTier::Free < SubscriptionTier::Basic);
        assert!(SubscriptionTier::Basic < SubscriptionTier::Plus);
        assert!(SubscriptionTier::Plus < SubscriptionTier::Pro);
    }

    #[test]
    fn tier_round_trips_through_storage_form() {
        for tier in [
            SubscriptionTier::Free,
            SubscriptionTier::Basic,
            SubscriptionTier::Plus,
            SubscriptionTier::Pro,
        ] {
            assert_eq!(SubscriptionTier::parse(tier.as_str()), Some(tier));
        }
        assert_eq!(SubscriptionTier::parse("platinum"), None);
    }

    #[test]
    fn voice_and_role_parse_known_values_only() {
        assert_eq!(VoiceId::parse("live"), Some(VoiceId::Live));
        assert_eq!(VoiceId::parse("shadow"), Some(VoiceId::Shadow));
        assert_eq!(VoiceId::parse("oracle"), None);
        assert_eq!(MessageRole::parse("assistant"), Some(MessageRole::Assistant));
        assert_eq!(MessageRole::parse("system"), None);
    }
}
