pub mod domain;
pub mod emotion;
pub mod entitlement;
pub mod language;
pub mod ports;
pub mod prompt;
pub mod voice;

pub use domain::{
    AuthSession, ChatMessage, ChatSession, CheckoutRedirect, MessageRole, PaymentNotification,
    PaymentProvider, Profile, PromptMessage, SubscriptionTier, User, UserCredentials, VoiceId,
};
pub use emotion::{EmotionClassifier, EmotionState, MessageAnalysis, MessageAnalyzer};
pub use entitlement::{effective_tier, QuotaDecision, QuotaPolicy, QuotaScope};
pub use language::{LanguageDetection, LanguageDetector, SupportedLanguage};
pub use ports::{
    BillingGateway, ChatModelService, DatabaseService, GenerationParams, PortError, PortResult,
    ReplyStream,
};
pub use prompt::{PromptCatalog, UiLocale};
pub use voice::{select_voice, VoiceCatalog, VoiceProfile};
