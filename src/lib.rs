//! # sqlfauna — SQL dialect driver for Fauna
//!
//! > **Keep your ORM. Swap the database.**
//!
//! sqlfauna reads the SQL an ORM emits, builds a query model from it and
//! compiles that model into an FQL expression the document store executes.
//!
//! ## Quick Example
//!
//! ```rust,ignore
//! use sqlfauna::prelude::*;
//!
//! let model = sqlfauna::parse("SELECT users.name FROM users WHERE users.age > 30")?;
//! let fql = translate(&model)?.expr;
//! // => Map(Filter(Select(["data"], Map(Paginate(Documents(Collection("users"))), ...
//! ```
//!
//! ## Pipeline
//!
//! | Stage        | Module         | Output                          |
//! |--------------|----------------|---------------------------------|
//! | Bind         | `driver`       | SQL text with literals          |
//! | Tokenize     | `lexer`        | [`token::Node`] tree            |
//! | Build        | `parser`       | [`ast::QueryModel`]             |
//! | Translate    | `transpiler`   | [`transpiler::Expr`] + shape    |
//! | Execute      | `driver`       | rows, row count, last row id    |

pub mod ast;
pub mod config;
pub mod driver;
pub mod error;
pub mod extract;
pub mod fmt;
pub mod lexer;
pub mod parser;
pub mod token;
pub mod transpiler;

pub use fmt::format_sql_query;

pub mod prelude {
    pub use crate::ast::*;
    pub use crate::config::Config;
    pub use crate::driver::{connect, connect_url, Connection, Cursor, MemoryTransport, Params, Row};
    pub use crate::error::*;
    pub use crate::fmt::format_sql_query;
    pub use crate::parser::parse;
    pub use crate::transpiler::{translate, Expr, ToFql, Translation};
}

/// Parse one SQL statement into a query model.
///
/// # Example
///
/// ```
/// use sqlfauna::parse;
///
/// let model = parse("SELECT users.name FROM users WHERE users.age > 30").unwrap();
/// assert_eq!(model.base_table(), "users");
/// ```
pub fn parse(input: &str) -> Result<ast::QueryModel, error::FaunaError> {
    parser::parse(input)
}
