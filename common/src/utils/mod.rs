pub mod config;
pub mod credentials;
pub mod document;
pub mod schema_registry;
