//! Compiles a parsed GraphQL query tree into a single Postgres statement
//! that returns the whole response as one JSON document.

pub mod ast;
pub mod config;
pub mod db;
pub mod error;
pub mod ext;
pub mod generate;
pub mod jsn;
pub mod schema;

pub use ast::QCode;
pub use config::Config;
pub use error::{Error, Result};
pub use generate::sql::{Compiled, Compiler, SkipMask};
pub use schema::Schema;
