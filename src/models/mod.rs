pub mod catalog;
pub mod integration;
pub mod mapping;
pub mod query_ast;
pub mod schema;

pub use catalog::*;
pub use integration::*;
pub use mapping::*;
pub use query_ast::*;
pub use schema::*;
