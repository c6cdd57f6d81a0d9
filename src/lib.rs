pub mod ast;
pub mod builtins;
pub mod cli;
pub mod context;
pub mod error;
pub mod evaluator;
pub mod function;
pub mod lexer;
pub mod output;
pub mod parser;
pub mod resolve;
pub mod tags;
pub mod template;
pub mod value;

pub use ast::{BinOp, Document, Expr, Node, Statement, Token, TokenKind};
pub use context::{Binding, CancelToken, EvalContext, Precision, ResultGroups, Scope};
pub use error::{Error, ErrorCode, ErrorCodes, ErrorKind, FormattedError, Position};
pub use function::{Args, Function, ParamType, Signature};
pub use lexer::Lexer;
pub use output::{to_json, to_json_pretty};
pub use parser::{Parser, parse};
pub use tags::{TagParser, TagTable};
pub use template::Template;
pub use value::{Map, MapKey, Record, Reference, Value};
