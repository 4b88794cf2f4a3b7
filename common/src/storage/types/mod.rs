pub mod cache_snapshot;
pub mod corpus;
pub mod knowledge_entry;
