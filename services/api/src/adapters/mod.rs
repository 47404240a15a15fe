pub mod billing;
pub mod chat_llm;
pub mod db;

pub use billing::{CryptoGateway, StripeGateway, YookassaGateway};
pub use chat_llm::OpenAiChatAdapter;
pub use db::DbAdapter;
