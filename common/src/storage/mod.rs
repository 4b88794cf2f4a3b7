pub mod kv;
pub mod store;
pub mod types;
