//! services/api/src/adapters/db.rs
//!
//! This module contains the database adapter, which is the concrete implementation
//! of the `DatabaseService` port from the `core` crate. It handles all interactions
//! with the PostgreSQL database using `sqlx`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use edem_core::domain::{
    ChatMessage, ChatSession, MessageRole, PaymentProvider, Profile, SubscriptionTier, User,
    UserCredentials, VoiceId,
};
use edem_core::ports::{DatabaseService, PortError, PortResult};

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A database adapter that implements the `DatabaseService` port.
#[derive(Clone)]
pub struct DbAdapter {
    pool: PgPool,
}

impl DbAdapter {
    /// Creates a new `DbAdapter`.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// A helper function to run database migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }
}

fn unexpected(e: sqlx::Error) -> PortError {
    PortError::Unexpected(e.to_string())
}

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

#[derive(FromRow)]
struct UserRecord {
    user_id: Uuid,
    email: String,
}
impl UserRecord {
    fn to_domain(self) -> User {
        User {
            user_id: self.user_id,
            email: Some(self.email),
        }
    }
}

#[derive(FromRow)]
struct CredentialsRecord {
    user_id: Uuid,
    email: String,
    hashed_password: String,
}
impl CredentialsRecord {
    fn to_domain(self) -> UserCredentials {
        UserCredentials {
            user_id: self.user_id,
            email: self.email,
            hashed_password: self.hashed_password,
        }
    }
}

#[derive(FromRow)]
struct ProfileRecord {
    user_id: Uuid,
    subscription_tier: String,
    subscription_expires_at: Option<DateTime<Utc>>,
}
impl ProfileRecord {
    fn to_domain(self) -> Profile {
        Profile {
            user_id: self.user_id,
            // Unknown tier values read as the most restrictive tier.
            tier: SubscriptionTier::parse(&self.subscription_tier)
                .unwrap_or(SubscriptionTier::Free),
            expires_at: self.subscription_expires_at,
        }
    }
}

#[derive(FromRow)]
struct ChatSessionRecord {
    id: Uuid,
    user_id: Uuid,
    voice: Option<String>,
    created_at: DateTime<Utc>,
}
impl ChatSessionRecord {
    fn to_domain(self) -> PortResult<ChatSession> {
        let voice = match self.voice {
            None => None,
            Some(raw) => Some(VoiceId::parse(&raw).ok_or_else(|| {
                PortError::Unexpected(format!("Unknown voice '{}' on session {}", raw, self.id))
            })?),
        };
        Ok(ChatSession {
            id: self.id,
            user_id: self.user_id,
            voice,
            created_at: self.created_at,
        })
    }
}

#[derive(FromRow)]
struct ChatMessageRecord {
    id: Uuid,
    session_id: Uuid,
    role: String,
    content: String,
    created_at: DateTime<Utc>,
}
impl ChatMessageRecord {
    fn to_domain(self) -> PortResult<ChatMessage> {
        let role = MessageRole::parse(&self.role).ok_or_else(|| {
            PortError::Unexpected(format!("Unknown role '{}' on message {}", self.role, self.id))
        })?;
        Ok(ChatMessage {
            id: self.id,
            session_id: self.session_id,
            role,
            content: self.content,
            created_at: self.created_at,
        })
    }
}

//=========================================================================================
// `DatabaseService` Trait Implementation
//=========================================================================================

#[async_trait]
impl DatabaseService for DbAdapter {
    async fn create_user_with_email(
        &self,
        email: &str,
        hashed_password: &str,
    ) -> PortResult<User> {
        let mut tx = self.pool.begin().await.map_err(unexpected)?;

        let record = sqlx::query_as::<_, UserRecord>(
            "INSERT INTO users (user_id, email, hashed_password) VALUES ($1, $2, $3) \
             RETURNING user_id, email",
        )
        .bind(Uuid::new_v4())
        .bind(email)
        .bind(hashed_password)
        .fetch_one(&mut *tx)
        .await
        .map_err(unexpected)?;

        // Every account starts on the free tier.
        sqlx::query("INSERT INTO profiles (user_id) VALUES ($1)")
            .bind(record.user_id)
            .execute(&mut *tx)
            .await
            .map_err(unexpected)?;

        tx.commit().await.map_err(unexpected)?;
        Ok(record.to_domain())
    }

    async fn get_user_by_email(&self, email: &str) -> PortResult<UserCredentials> {
        let record = sqlx::query_as::<_, CredentialsRecord>(
            "SELECT user_id, email, hashed_password FROM users WHERE email = $1",
        )
        .bind(email)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => PortError::NotFound(format!("User {} not found", email)),
            _ => unexpected(e),
        })?;
        Ok(record.to_domain())
    }

    async fn get_user(&self, user_id: Uuid) -> PortResult<User> {
        let record = sqlx::query_as::<_, UserRecord>(
            "SELECT user_id, email FROM users WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => PortError::NotFound(format!("User {} not found", user_id)),
            _ => unexpected(e),
        })?;
        Ok(record.to_domain())
    }

    async fn find_user_id_by_email(&self, email: &str) -> PortResult<Option<Uuid>> {
        let user_id = sqlx::query_scalar::<_, Uuid>("SELECT user_id FROM users WHERE email = $1")
            .bind(email)
            .fetch_optional(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(user_id)
    }

    async fn create_auth_session(
        &self,
        session_id: &str,
        user_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> PortResult<()> {
        sqlx::query("INSERT INTO auth_sessions (id, user_id, expires_at) VALUES ($1, $2, $3)")
            .bind(session_id)
            .bind(user_id)
            .bind(expires_at)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(())
    }

    async fn validate_auth_session(&self, session_id: &str) -> PortResult<Uuid> {
        let user_id = sqlx::query_scalar::<_, Uuid>(
            "SELECT user_id FROM auth_sessions WHERE id = $1 AND expires_at > now()",
        )
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?;
        user_id.ok_or(PortError::Unauthorized)
    }

    async fn delete_auth_session(&self, session_id: &str) -> PortResult<()> {
        sqlx::query("DELETE FROM auth_sessions WHERE id = $1")
            .bind(session_id)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(())
    }

    async fn get_profile(&self, user_id: Uuid) -> PortResult<Option<Profile>> {
        let record = sqlx::query_as::<_, ProfileRecord>(
            "SELECT user_id, subscription_tier, subscription_expires_at \
             FROM profiles WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(record.map(|r| r.to_domain()))
    }

    async fn update_subscription(
        &self,
        user_id: Uuid,
        tier: SubscriptionTier,
        expires_at: DateTime<Utc>,
    ) -> PortResult<()> {
        sqlx::query(
            "INSERT INTO profiles (user_id, subscription_tier, subscription_expires_at) \
             VALUES ($1, $2, $3) \
             ON CONFLICT (user_id) DO UPDATE \
             SET subscription_tier = $2, subscription_expires_at = $3",
        )
        .bind(user_id)
        .bind(tier.as_str())
        .bind(expires_at)
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(())
    }

    async fn create_chat_session(
        &self,
        user_id: Uuid,
        voice: Option<VoiceId>,
    ) -> PortResult<ChatSession> {
        let record = sqlx::query_as::<_, ChatSessionRecord>(
            "INSERT INTO chat_sessions (user_id, voice) VALUES ($1, $2) \
             RETURNING id, user_id, voice, created_at",
        )
        .bind(user_id)
        .bind(voice.map(|v| v.as_str()))
        .fetch_one(&self.pool)
        .await
        .map_err(unexpected)?;
        record.to_domain()
    }

    async fn get_chat_session(&self, session_id: Uuid) -> PortResult<ChatSession> {
        let record = sqlx::query_as::<_, ChatSessionRecord>(
            "SELECT id, user_id, voice, created_at FROM chat_sessions WHERE id = $1",
        )
        .bind(session_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => {
                PortError::NotFound(format!("Session {} not found", session_id))
            }
            _ => unexpected(e),
        })?;
        record.to_domain()
    }

    async fn latest_session_for_user(&self, user_id: Uuid) -> PortResult<Option<ChatSession>> {
        let record = sqlx::query_as::<_, ChatSessionRecord>(
            "SELECT id, user_id, voice, created_at FROM chat_sessions \
             WHERE user_id = $1 ORDER BY created_at DESC LIMIT 1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?;
        record.map(|r| r.to_domain()).transpose()
    }

    async fn list_sessions_for_user(&self, user_id: Uuid) -> PortResult<Vec<ChatSession>> {
        let records = sqlx::query_as::<_, ChatSessionRecord>(
            "SELECT id, user_id, voice, created_at FROM chat_sessions \
             WHERE user_id = $1 ORDER BY created_at DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;
        records.into_iter().map(|r| r.to_domain()).collect()
    }

    async fn bind_session_voice(&self, session_id: Uuid, voice: VoiceId) -> PortResult<()> {
        sqlx::query("UPDATE chat_sessions SET voice = $1 WHERE id = $2")
            .bind(voice.as_str())
            .bind(session_id)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(())
    }

    async fn insert_message(
        &self,
        session_id: Uuid,
        role: MessageRole,
        content: &str,
    ) -> PortResult<ChatMessage> {
        let record = sqlx::query_as::<_, ChatMessageRecord>(
            "INSERT INTO chat_messages (session_id, role, content) VALUES ($1, $2, $3) \
             RETURNING id, session_id, role, content, created_at",
        )
        .bind(session_id)
        .bind(role.as_str())
        .bind(content)
        .fetch_one(&self.pool)
        .await
        .map_err(unexpected)?;
        record.to_domain()
    }

    async fn recent_messages(&self, session_id: Uuid, limit: i64) -> PortResult<Vec<ChatMessage>> {
        // Newest rows first, then flipped so the caller sees creation order.
        let records = sqlx::query_as::<_, ChatMessageRecord>(
            "SELECT id, session_id, role, content, created_at FROM chat_messages \
             WHERE session_id = $1 ORDER BY created_at DESC LIMIT $2",
        )
        .bind(session_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;

        let mut messages = records
            .into_iter()
            .map(|r| r.to_domain())
            .collect::<PortResult<Vec<_>>>()?;
        messages.reverse();
        Ok(messages)
    }

    async fn count_user_messages(
        &self,
        user_id: Uuid,
        since: Option<DateTime<Utc>>,
    ) -> PortResult<u64> {
        let count = match since {
            Some(since) => {
                sqlx::query_scalar::<_, i64>(
                    "SELECT COUNT(*) FROM chat_messages m \
                     JOIN chat_sessions s ON m.session_id = s.id \
                     WHERE s.user_id = $1 AND m.role = 'user' AND m.created_at >= $2",
                )
                .bind(user_id)
                .bind(since)
                .fetch_one(&self.pool)
                .await
            }
            None => {
                sqlx::query_scalar::<_, i64>(
                    "SELECT COUNT(*) FROM chat_messages m \
                     JOIN chat_sessions s ON m.session_id = s.id \
                     WHERE s.user_id = $1 AND m.role = 'user'",
                )
                .bind(user_id)
                .fetch_one(&self.pool)
                .await
            }
        }
        .map_err(unexpected)?;
        Ok(count.max(0) as u64)
    }

    async fn record_payment_event(
        &self,
        provider: PaymentProvider,
        event_id: &str,
    ) -> PortResult<bool> {
        let result = sqlx::query(
            "INSERT INTO payment_events (provider, event_id) VALUES ($1, $2) \
             ON CONFLICT (provider, event_id) DO NOTHING",
        )
        .bind(provider.as_str())
        .bind(event_id)
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(result.rows_affected() == 1)
    }
}
