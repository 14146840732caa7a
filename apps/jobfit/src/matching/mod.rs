// Matching layer: lexical and semantic scorers, the greedy hybrid engine,
// and the sentence-context fallback built on top of it.

pub mod context;
pub mod engine;
pub mod lexical;
pub mod semantic;

pub use context::{ContextError, ContextMatcher, SentenceIndex};
pub use engine::{classify_match, EmbeddingBundle, MatchingEngine};
