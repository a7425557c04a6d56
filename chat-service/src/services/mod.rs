pub mod metrics;
pub mod providers;
pub mod store;

pub use providers::{CompletionProvider, MockCompletionProvider, OpenAiCompletionProvider};
pub use store::{ConversationStore, InMemoryConversationStore, MongoConversationStore, StoreError};
