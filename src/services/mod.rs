pub mod datasource; // Multi-backend datasource adapters and registry
pub mod discovery;
pub mod mapping_service;
pub mod query_compiler;

pub use discovery::*;
pub use mapping_service::*;
pub use query_compiler::*;
