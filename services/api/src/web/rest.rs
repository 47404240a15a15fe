//! services/api/src/web/rest.rs
//!
//! Contains the Axum handlers for the session and account REST endpoints and
//! the master definition for the OpenAPI specification.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json},
    Extension,
};
use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::error;
use utoipa::{OpenApi, ToSchema};
use uuid::Uuid;

use crate::error::{reject, reject_port_error, ApiRejection, ErrorCode};
use crate::web::state::AppState;
use edem_core::domain::{ChatSession, VoiceId};
use edem_core::entitlement::{effective_tier, start_of_current_month, QuotaScope};

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::web::auth::signup_handler,
        crate::web::auth::login_handler,
        crate::web::auth::logout_handler,
        crate::web::chat::chat_stream_handler,
        crate::web::billing::checkout_handler,
        crate::web::billing::webhook_handler,
        create_session_handler,
        current_session_handler,
        list_sessions_handler,
        session_messages_handler,
        account_handler,
    ),
    components(
        schemas(
            crate::web::auth::SignupRequest,
            crate::web::auth::LoginRequest,
            crate::web::auth::AuthResponse,
            crate::web::chat::ChatStreamRequest,
            crate::web::billing::CheckoutRequest,
            crate::web::billing::CheckoutResponse,
            crate::web::billing::WebhookAck,
            crate::error::ErrorBody,
            crate::error::ErrorCode,
            CreateSessionRequest,
            SessionResponse,
            MessageResponse,
            AccountResponse,
        )
    ),
    tags(
        (name = "EDEM Chat API", description = "Subscription-gated AI chat with voice selection.")
    )
)]
pub struct ApiDoc;

//=========================================================================================
// API Response and Payload Structs
//=========================================================================================

#[derive(Deserialize, ToSchema)]
pub struct CreateSessionRequest {
    /// Initial voice to bind; omitted means the first turn decides.
    #[serde(default)]
    pub voice: Option<String>,
}

#[derive(Serialize, ToSchema)]
pub struct SessionResponse {
    pub session_id: Uuid,
    pub voice: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl SessionResponse {
    fn from_domain(session: ChatSession) -> Self {
        Self {
            session_id: session.id,
            voice: session.voice.map(|v| v.as_str().to_string()),
            created_at: session.created_at,
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct MessageResponse {
    pub id: Uuid,
    pub role: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Serialize, ToSchema)]
pub struct AccountResponse {
    pub user_id: Uuid,
    pub email: Option<String>,
    pub tier: String,
    pub expires_at: Option<DateTime<Utc>>,
    pub messages_used: u64,
    pub message_allowance: u64,
}

/// History window returned to clients, matching what the model sees.
const MESSAGE_WINDOW: i64 = 50;

//=========================================================================================
// REST API Handlers
//=========================================================================================

/// POST /sessions - Create a new chat session
#[utoipa::path(
    post,
    path = "/sessions",
    request_body = CreateSessionRequest,
    responses(
        (status = 201, description = "Session created", body = SessionResponse),
        (status = 400, description = "Unknown voice"),
        (status = 401, description = "Not authenticated")
    )
)]
pub async fn create_session_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Json(req): Json<CreateSessionRequest>,
) -> Result<impl IntoResponse, ApiRejection> {
    let voice = match req.voice.as_deref() {
        None => None,
        Some(raw) => Some(VoiceId::parse(raw).ok_or_else(|| {
            reject(StatusCode::BAD_REQUEST, ErrorCode::Validation, "Unknown voice")
        })?),
    };

    let session = state
        .db
        .create_chat_session(user_id, voice)
        .await
        .map_err(|e| {
            error!("Failed to create chat session: {:?}", e);
            reject_port_error(e)
        })?;

    Ok((StatusCode::CREATED, Json(SessionResponse::from_domain(session))))
}

/// POST /sessions/current - Return today's session, creating it lazily
///
/// The most recent session is reused if it was created today; otherwise a
/// fresh unbound session is created.
#[utoipa::path(
    post,
    path = "/sessions/current",
    responses(
        (status = 200, description = "Today's session", body = SessionResponse),
        (status = 401, description = "Not authenticated")
    )
)]
pub async fn current_session_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
) -> Result<impl IntoResponse, ApiRejection> {
    let latest = state
        .db
        .latest_session_for_user(user_id)
        .await
        .map_err(reject_port_error)?;

    let today = Utc::now();
    if let Some(session) = latest {
        let created = session.created_at;
        if (created.year(), created.ordinal()) == (today.year(), today.ordinal()) {
            return Ok(Json(SessionResponse::from_domain(session)));
        }
    }

    let session = state
        .db
        .create_chat_session(user_id, None)
        .await
        .map_err(reject_port_error)?;
    Ok(Json(SessionResponse::from_domain(session)))
}

/// GET /sessions - List the caller's sessions, newest first
#[utoipa::path(
    get,
    path = "/sessions",
    responses(
        (status = 200, description = "The caller's sessions", body = [SessionResponse]),
        (status = 401, description = "Not authenticated")
    )
)]
pub async fn list_sessions_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
) -> Result<impl IntoResponse, ApiRejection> {
    let sessions = state
        .db
        .list_sessions_for_user(user_id)
        .await
        .map_err(reject_port_error)?;
    let response: Vec<SessionResponse> = sessions
        .into_iter()
        .map(SessionResponse::from_domain)
        .collect();
    Ok(Json(response))
}

/// GET /sessions/{id}/messages - Bounded history in creation order
#[utoipa::path(
    get,
    path = "/sessions/{id}/messages",
    params(("id" = Uuid, Path, description = "Session id")),
    responses(
        (status = 200, description = "The 50 most recent messages, oldest first", body = [MessageResponse]),
        (status = 401, description = "Not authenticated"),
        (status = 403, description = "Session owned by another user"),
        (status = 404, description = "Unknown session")
    )
)]
pub async fn session_messages_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Path(session_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiRejection> {
    let session = state
        .db
        .get_chat_session(session_id)
        .await
        .map_err(reject_port_error)?;
    if session.user_id != user_id {
        return Err(reject(
            StatusCode::FORBIDDEN,
            ErrorCode::Forbidden,
            "Нет доступа к этой сессии",
        ));
    }

    let messages = state
        .db
        .recent_messages(session_id, MESSAGE_WINDOW)
        .await
        .map_err(reject_port_error)?;
    let response: Vec<MessageResponse> = messages
        .into_iter()
        .map(|message| MessageResponse {
            id: message.id,
            role: message.role.as_str().to_string(),
            content: message.content,
            created_at: message.created_at,
        })
        .collect();
    Ok(Json(response))
}

/// GET /account - Subscription state and quota usage
#[utoipa::path(
    get,
    path = "/account",
    responses(
        (status = 200, description = "Account overview", body = AccountResponse),
        (status = 401, description = "Not authenticated")
    )
)]
pub async fn account_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
) -> Result<impl IntoResponse, ApiRejection> {
    let user = state.db.get_user(user_id).await.map_err(reject_port_error)?;
    let profile = state
        .db
        .get_profile(user_id)
        .await
        .map_err(reject_port_error)?;

    let now = Utc::now();
    let tier = effective_tier(profile.as_ref(), now);
    let since = match state.quota.scope_for(tier) {
        QuotaScope::Lifetime => None,
        QuotaScope::CalendarMonth => Some(start_of_current_month(now)),
    };
    let messages_used = state
        .db
        .count_user_messages(user_id, since)
        .await
        .map_err(reject_port_error)?;

    Ok(Json(AccountResponse {
        user_id,
        email: user.email,
        tier: tier.as_str().to_string(),
        expires_at: profile.and_then(|p| p.expires_at),
        messages_used,
        message_allowance: state.quota.allowance_for(tier),
    }))
}
