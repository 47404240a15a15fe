//! services/api/src/web/state.rs
//!
//! Defines the application's shared state.

use std::sync::Arc;

use crate::config::Config;
use edem_core::domain::PaymentProvider;
use edem_core::emotion::{EmotionClassifier, MessageAnalyzer};
use edem_core::entitlement::QuotaPolicy;
use edem_core::language::LanguageDetector;
use edem_core::ports::{BillingGateway, ChatModelService, DatabaseService};
use edem_core::prompt::PromptCatalog;
use edem_core::voice::VoiceCatalog;

//=========================================================================================
// AppState (Shared Across All Connections)
//=========================================================================================

/// The shared application state, created once at startup and passed to all handlers.
/// The classifier tables and prompt catalogs are immutable configuration data
/// built here and injected, not ambient constants.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<dyn DatabaseService>,
    pub config: Arc<Config>,
    pub chat_model: Arc<dyn ChatModelService>,
    pub payments: Vec<Arc<dyn BillingGateway>>,
    pub language_detector: Arc<LanguageDetector>,
    pub emotion_classifier: Arc<EmotionClassifier>,
    pub message_analyzer: Arc<MessageAnalyzer>,
    pub voices: Arc<VoiceCatalog>,
    pub prompts: Arc<PromptCatalog>,
    pub quota: QuotaPolicy,
}

impl AppState {
    pub fn gateway(&self, provider: PaymentProvider) -> Option<Arc<dyn BillingGateway>> {
        self.payments
            .iter()
            .find(|gateway| gateway.provider() == provider)
            .cloned()
    }
}
