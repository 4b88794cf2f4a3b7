pub mod answer_retrieval;
pub mod knowledge_base;
pub mod scoring;

pub use answer_retrieval::{
    build_context, create_user_message, knowledge_base_digest, NO_CONTEXT_FOUND,
};
pub use knowledge_base::KnowledgeBase;
pub use scoring::{jaccard, rank, LexicalWeights, Scored};
