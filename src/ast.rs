//! # Rule Language - Abstract Syntax Tree
//!
//! A rule is a sequence of statements. Each statement is either a registered
//! tag (`set`, `if`), an assignment to a variable path, or a bare expression
//! whose value lands in the default result group.
//!
//! - **[tokens]** - Lexical tokens produced by the lexer
//! - **[expressions]** - Expression nodes (literals, paths, operations)
//! - **[operators]** - Binary and prefix operators
//! - **[path]** - Variable paths with field, subscript and call parts
//! - **[statements]** - Statements, blocks and the compiled document
//!
//! ## Example
//!
//! ```text
//! set base = 100
//! if base > 50 {
//!     res.discount = base * 0.1
//! } else {
//!     res.discount = 0
//! }
//! base ^ 2        // stored as res.res1
//! ```
//!
//! ## Precedence
//!
//! From loosest to tightest: `and`/`or` (right-assoc), relational and `in`,
//! `+`/`-`, `*`/`/`/`%`, `^` (right-assoc), then parenthesised expressions,
//! prefix operators, literals and variable paths.
pub mod tokens;
pub mod expressions;
pub mod operators;
pub mod path;
pub mod statements;

pub use tokens::{Token, TokenKind};
pub use expressions::{Expr, NumberLiteral};
pub use operators::{BinOp, UnaryOp};
pub use path::{Part, PartKind, VariablePath};
pub use statements::{Assignment, Block, Document, Node, ResultExpr, Statement};
