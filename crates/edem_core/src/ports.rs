//! crates/edem_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the application's core logic.
//! These traits form the boundary of the hexagonal architecture, allowing the core
//! to be independent of specific external implementations like databases or APIs.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::Stream;
use std::pin::Pin;
use uuid::Uuid;

use crate::domain::{
    ChatMessage, ChatSession, CheckoutRedirect, MessageRole, PaymentNotification, PaymentProvider,
    Profile, PromptMessage, SubscriptionTier, User, UserCredentials, VoiceId,
};

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from external services (e.g., database, network).
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
    #[error("Unauthorized")]
    Unauthorized,
    /// A webhook payload whose signature (or provider-side re-check) failed.
    /// Payload contents must not be trusted past this point.
    #[error("Invalid notification signature")]
    InvalidSignature,
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

/// A pinned, boxed stream of incremental text fragments from the model.
pub type ReplyStream = Pin<Box<dyn Stream<Item = Result<String, PortError>> + Send>>;

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

#[async_trait]
pub trait DatabaseService: Send + Sync {
    // --- Auth Methods ---
    async fn create_user_with_email(
        &self,
        email: &str,
        hashed_password: &str,
    ) -> PortResult<User>;

    async fn get_user_by_email(&self, email: &str) -> PortResult<UserCredentials>;

    async fn get_user(&self, user_id: Uuid) -> PortResult<User>;

    async fn find_user_id_by_email(&self, email: &str) -> PortResult<Option<Uuid>>;

    async fn create_auth_session(
        &self,
        session_id: &str,
        user_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> PortResult<()>;

    async fn validate_auth_session(&self, session_id: &str) -> PortResult<Uuid>;

    async fn delete_auth_session(&self, session_id: &str) -> PortResult<()>;

    // --- Subscription State ---
    /// Returns `None` when no profile row exists; callers resolve that to the
    /// most restrictive tier.
    async fn get_profile(&self, user_id: Uuid) -> PortResult<Option<Profile>>;

    async fn update_subscription(
        &self,
        user_id: Uuid,
        tier: SubscriptionTier,
        expires_at: DateTime<Utc>,
    ) -> PortResult<()>;

    // --- Chat Sessions ---
    async fn create_chat_session(
        &self,
        user_id: Uuid,
        voice: Option<VoiceId>,
    ) -> PortResult<ChatSession>;

    async fn get_chat_session(&self, session_id: Uuid) -> PortResult<ChatSession>;

    async fn latest_session_for_user(&self, user_id: Uuid) -> PortResult<Option<ChatSession>>;

    async fn list_sessions_for_user(&self, user_id: Uuid) -> PortResult<Vec<ChatSession>>;

    async fn bind_session_voice(&self, session_id: Uuid, voice: VoiceId) -> PortResult<()>;

    // --- Chat Messages ---
    async fn insert_message(
        &self,
        session_id: Uuid,
        role: MessageRole,
        content: &str,
    ) -> PortResult<ChatMessage>;

    /// The `limit` most recent messages of a session, returned in creation
    /// order (oldest of the window first).
    async fn recent_messages(&self, session_id: Uuid, limit: i64) -> PortResult<Vec<ChatMessage>>;

    /// Counts user-role messages across all of a user's sessions, optionally
    /// bounded to rows created at or after `since`.
    async fn count_user_messages(
        &self,
        user_id: Uuid,
        since: Option<DateTime<Utc>>,
    ) -> PortResult<u64>;

    // --- Payment Events ---
    /// Records a webhook delivery. Returns `false` when the event id was seen
    /// before, in which case entitlement state must not be mutated again.
    async fn record_payment_event(
        &self,
        provider: PaymentProvider,
        event_id: &str,
    ) -> PortResult<bool>;
}

#[async_trait]
pub trait ChatModelService: Send + Sync {
    /// Streams a completion for the composed prompt. `messages` carries the
    /// bounded history plus the current user turn, in order.
    async fn stream_reply(
        &self,
        system_prompt: &str,
        messages: &[PromptMessage],
        params: GenerationParams,
    ) -> PortResult<ReplyStream>;
}

/// Generation parameters forwarded to the model.
#[derive(Debug, Clone, Copy)]
pub struct GenerationParams {
    pub temperature: f32,
    pub max_output_tokens: u32,
}

#[async_trait]
pub trait BillingGateway: Send + Sync {
    fn provider(&self) -> PaymentProvider;

    /// Creates a hosted checkout for the given paid plan and returns the
    /// redirect URL the client should be sent to.
    async fn create_checkout(
        &self,
        user: &User,
        plan: SubscriptionTier,
    ) -> PortResult<CheckoutRedirect>;

    /// Verifies a webhook delivery before anything in it is trusted.
    /// `Ok(None)` means a well-formed event of a kind this service ignores.
    async fn verify_notification(
        &self,
        signature: Option<&str>,
        body: &str,
    ) -> PortResult<Option<PaymentNotification>>;
}
