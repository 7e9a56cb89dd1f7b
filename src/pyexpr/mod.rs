//! Python expression engine. The Django extractor uses it to resolve view
//! bodies into parameter-extraction expressions; nothing here executes
//! Python, it only classifies and shapes statements.

pub mod ast;
pub mod atoms;
pub mod parser;
pub mod scope;

pub use ast::PyExpr;
pub use parser::parse_statement;
pub use scope::{ScopeArena, ScopeKind};
