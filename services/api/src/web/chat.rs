//! services/api/src/web/chat.rs
//!
//! The chat turn handler: entitlement gate, classifier pass, voice
//! resolution, prompt composition and the SSE relay of the model's streaming
//! reply. Terminal on the first error; once the stream has started, failures
//! surface as an in-band error event followed by stream closure.

use std::convert::Infallible;
use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::sse::{Event, KeepAlive, Sse},
    Extension, Json,
};
use chrono::Utc;
use futures::{Stream, StreamExt};
use serde::Deserialize;
use serde_json::json;
use tracing::{error, info};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::{reject, reject_port_error, ApiRejection, ErrorCode};
use crate::web::state::AppState;
use edem_core::domain::{MessageRole, PromptMessage, VoiceId};
use edem_core::entitlement::{effective_tier, start_of_current_month, QuotaDecision, QuotaScope};
use edem_core::language::SupportedLanguage;
use edem_core::ports::GenerationParams;
use edem_core::prompt::UiLocale;
use edem_core::voice::select_voice;

/// Upper bound on conversation history fed back to the model.
const HISTORY_LIMIT: i64 = 50;

//=========================================================================================
// Request Types
//=========================================================================================

#[derive(Deserialize, ToSchema)]
pub struct ChatStreamRequest {
    pub session_id: Uuid,
    pub message: String,
    /// Explicit voice choice; overrides automatic selection.
    #[serde(default)]
    pub voice: Option<String>,
    /// UI locale, `ru` or `en`. Selects the core prompt and greeting.
    #[serde(default)]
    pub locale: Option<String>,
}

//=========================================================================================
// Voice Resolution
//=========================================================================================

#[derive(Debug, PartialEq, Eq)]
enum VoiceResolution {
    Use(VoiceId),
    /// An explicit choice contradicts the session's bound voice.
    Conflict,
}

/// A bound session voice never changes underneath a conversation: an explicit
/// mismatch is a hard error, an automatic pick falls back to the binding.
fn resolve_turn_voice(
    bound: Option<VoiceId>,
    explicit: Option<VoiceId>,
    selected: VoiceId,
) -> VoiceResolution {
    match bound {
        Some(bound) if bound != selected => {
            if explicit.is_some() {
                VoiceResolution::Conflict
            } else {
                VoiceResolution::Use(bound)
            }
        }
        _ => VoiceResolution::Use(selected),
    }
}

fn content_event(chunk: &str) -> Event {
    Event::default().data(json!({ "content": chunk }).to_string())
}

fn error_event(message: &str) -> Event {
    Event::default().data(json!({ "error": message }).to_string())
}

//=========================================================================================
// Handler
//=========================================================================================

/// POST /chat/stream - Send a message and stream the reply
#[utoipa::path(
    post,
    path = "/chat/stream",
    request_body = ChatStreamRequest,
    responses(
        (status = 200, description = "SSE stream of incremental reply fragments"),
        (status = 400, description = "Missing or invalid fields"),
        (status = 401, description = "Not authenticated"),
        (status = 402, description = "Message quota exhausted"),
        (status = 403, description = "Session not owned or voice not unlocked"),
        (status = 409, description = "Voice conflicts with the session binding")
    )
)]
pub async fn chat_stream_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Json(req): Json<ChatStreamRequest>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, ApiRejection> {
    // 1. Validate required fields before touching any collaborator.
    if req.message.trim().is_empty() {
        return Err(reject(
            StatusCode::BAD_REQUEST,
            ErrorCode::Validation,
            "session_id and message are required",
        ));
    }
    let explicit_voice = match req.voice.as_deref() {
        None => None,
        Some(raw) => Some(VoiceId::parse(raw).ok_or_else(|| {
            reject(StatusCode::BAD_REQUEST, ErrorCode::Validation, "Unknown voice")
        })?),
    };
    let locale = req
        .locale
        .as_deref()
        .and_then(UiLocale::parse)
        .unwrap_or(UiLocale::Ru);

    // 2. Entitlement: effective tier, then the quota for its scope.
    let now = Utc::now();
    let profile = state
        .db
        .get_profile(user_id)
        .await
        .map_err(reject_port_error)?;
    let tier = effective_tier(profile.as_ref(), now);

    let since = match state.quota.scope_for(tier) {
        QuotaScope::Lifetime => None,
        QuotaScope::CalendarMonth => Some(start_of_current_month(now)),
    };
    let prior_count = state
        .db
        .count_user_messages(user_id, since)
        .await
        .map_err(reject_port_error)?;
    if let QuotaDecision::Exhausted { .. } = state.quota.check(tier, prior_count) {
        info!("User {} hit the {} message ceiling", user_id, tier.as_str());
        return Err(reject(
            StatusCode::PAYMENT_REQUIRED,
            ErrorCode::PaywallRequired,
            "Лимит сообщений исчерпан. Оформите подписку, чтобы продолжить.",
        ));
    }

    // 3. The session must exist and belong to the caller.
    let session = state
        .db
        .get_chat_session(req.session_id)
        .await
        .map_err(reject_port_error)?;
    if session.user_id != user_id {
        return Err(reject(
            StatusCode::FORBIDDEN,
            ErrorCode::Forbidden,
            "Нет доступа к этой сессии",
        ));
    }

    // 4. Classify the message and resolve the voice for this turn.
    let detection = state.language_detector.detect(&req.message);
    let emotion = state.emotion_classifier.classify(&req.message);
    let analysis = state.message_analyzer.analyze(&req.message);

    let selected = select_voice(&analysis, explicit_voice, session.voice);
    let voice_id = match resolve_turn_voice(session.voice, explicit_voice, selected) {
        VoiceResolution::Use(voice_id) => voice_id,
        VoiceResolution::Conflict => {
            return Err(reject(
                StatusCode::CONFLICT,
                ErrorCode::VoiceConflict,
                "Сессия уже привязана к другому голосу",
            ));
        }
    };

    // 5. Voice entitlement is checked after selection, never downgraded.
    if !state.voices.is_allowed(tier, voice_id) {
        return Err(reject(
            StatusCode::FORBIDDEN,
            ErrorCode::UpgradeRequired,
            "Этот голос недоступен на текущем тарифе. Оформите подписку.",
        ));
    }
    let voice_profile = state.voices.get(voice_id).ok_or_else(|| {
        reject(
            StatusCode::INTERNAL_SERVER_ERROR,
            ErrorCode::Internal,
            "Internal server error",
        )
    })?;

    if session.voice.is_none() {
        state
            .db
            .bind_session_voice(session.id, voice_id)
            .await
            .map_err(reject_port_error)?;
    }

    // 6. Compose the system prompt and gather bounded history.
    let response_language = if detection.detected {
        detection.language
    } else {
        match locale {
            UiLocale::Ru => SupportedLanguage::Ru,
            UiLocale::En => SupportedLanguage::En,
        }
    };
    let system_prompt = state.prompts.compose_system_prompt(
        locale,
        voice_profile,
        emotion,
        response_language,
    );

    let history = state
        .db
        .recent_messages(session.id, HISTORY_LIMIT)
        .await
        .map_err(reject_port_error)?;
    let is_first_turn = history.is_empty();
    let greeting = is_first_turn.then(|| state.prompts.first_greeting(locale).to_string());

    let mut prompt_messages: Vec<PromptMessage> = history
        .iter()
        .map(|message| PromptMessage {
            role: message.role,
            content: message.content.clone(),
        })
        .collect();
    prompt_messages.push(PromptMessage {
        role: MessageRole::User,
        content: req.message.clone(),
    });

    state
        .db
        .insert_message(session.id, MessageRole::User, &req.message)
        .await
        .map_err(reject_port_error)?;

    info!(
        "Turn for session {}: voice={}, emotion={}, language={} (confidence {:.2})",
        session.id,
        voice_id.as_str(),
        emotion.as_str(),
        detection.language.code(),
        detection.confidence,
    );

    // 7. Relay the model stream, persisting the full reply at the end.
    // Dropping this generator (client disconnect) drops the upstream stream.
    let params = GenerationParams {
        temperature: state.config.chat_temperature,
        max_output_tokens: state.config.chat_max_tokens,
    };
    let session_id = session.id;
    let stream_state = state.clone();

    let stream = async_stream::stream! {
        let mut full_response = String::new();

        if let Some(greeting) = greeting {
            let opening = format!("{}\n\n", greeting);
            full_response.push_str(&opening);
            yield Ok::<Event, Infallible>(content_event(&opening));
        }

        let upstream = stream_state
            .chat_model
            .stream_reply(&system_prompt, &prompt_messages, params)
            .await;
        let mut upstream = match upstream {
            Ok(upstream) => upstream,
            Err(e) => {
                error!("Model stream failed to start: {}", e);
                yield Ok(error_event("Не удалось получить ответ. Попробуйте ещё раз."));
                return;
            }
        };

        while let Some(fragment) = upstream.next().await {
            match fragment {
                Ok(chunk) => {
                    if chunk.is_empty() {
                        continue;
                    }
                    full_response.push_str(&chunk);
                    yield Ok(content_event(&chunk));
                }
                Err(e) => {
                    error!("Model stream failed mid-turn: {}", e);
                    yield Ok(error_event("Ответ прервался. Попробуйте ещё раз."));
                    return;
                }
            }
        }

        if let Err(e) = stream_state
            .db
            .insert_message(session_id, MessageRole::Assistant, &full_response)
            .await
        {
            error!("Failed to persist assistant message: {}", e);
            yield Ok(error_event("Ответ не сохранился. Попробуйте ещё раз."));
            return;
        }

        yield Ok(Event::default().data("[DONE]"));
    };

    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unbound_session_takes_the_selected_voice() {
        assert_eq!(
            resolve_turn_voice(None, None, VoiceId::Shadow),
            VoiceResolution::Use(VoiceId::Shadow)
        );
    }

    #[test]
    fn explicit_mismatch_with_binding_is_a_conflict() {
        assert_eq!(
            resolve_turn_voice(Some(VoiceId::Live), Some(VoiceId::Shadow), VoiceId::Shadow),
            VoiceResolution::Conflict
        );
    }

    #[test]
    fn automatic_pick_never_overrides_the_binding() {
        // Aggressive turn selects shadow, but the session stays on live.
        assert_eq!(
            resolve_turn_voice(Some(VoiceId::Live), None, VoiceId::Shadow),
            VoiceResolution::Use(VoiceId::Live)
        );
    }

    #[test]
    fn matching_explicit_choice_passes_through() {
        assert_eq!(
            resolve_turn_voice(Some(VoiceId::Shadow), Some(VoiceId::Shadow), VoiceId::Shadow),
            VoiceResolution::Use(VoiceId::Shadow)
        );
    }

    #[test]
    fn sse_payloads_are_single_line_json() {
        // SSE data must not contain raw newlines; json escaping guarantees it.
        let event_json = json!({ "content": "line one\nline two" }).to_string();
        assert!(!event_json.contains('\n'));
    }
}
