use std::fmt;

use tracing::debug;

use crate::{
    ast::{Expr, VariablePath},
    context::EvalContext,
    error::{Error, Position},
};

/// An executable statement produced by a tag parser.
///
/// Tags are registered at runtime, so their nodes are trait objects rather
/// than variants of [`Statement`].
pub trait Node: fmt::Debug + Send + Sync {
    fn execute(&self, ctx: &mut EvalContext) -> Result<(), Error>;

    fn position(&self) -> Position;
}

/// A top-level or block-level statement.
#[derive(Debug)]
pub enum Statement {
    /// Statement produced by a registered tag (`set`, `if`, ...)
    ///
    /// # Example
    /// ```text
    /// set rate = 0.17
    /// ```
    Tag(Box<dyn Node>),

    /// Assignment to a variable path
    ///
    /// # Example
    /// ```text
    /// res.total = price * qty
    /// ```
    Assign(Assignment),

    /// Bare expression stored under a synthesized key of the default result
    /// group
    ///
    /// # Example
    /// ```text
    /// 1 + 2      // res.res1 = 3
    /// ```
    Result(ResultExpr),
}

impl Statement {
    pub fn execute(&self, ctx: &mut EvalContext) -> Result<(), Error> {
        let result = match self {
            Statement::Tag(node) => node.execute(ctx),
            Statement::Assign(assign) => assign.execute(ctx),
            Statement::Result(expr) => expr.execute(ctx),
        };
        result.map_err(|e| e.or_at(self.position()))
    }

    pub fn position(&self) -> Position {
        match self {
            Statement::Tag(node) => node.position(),
            Statement::Assign(assign) => assign.target.position(),
            Statement::Result(expr) => expr.expr.position(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Assignment {
    pub target: VariablePath,
    pub value: Expr,
}

impl Assignment {
    pub fn execute(&self, ctx: &mut EvalContext) -> Result<(), Error> {
        crate::resolve::assign(&self.target, &self.value, ctx)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResultExpr {
    pub key: String,
    pub expr: Expr,
}

impl ResultExpr {
    pub fn execute(&self, ctx: &mut EvalContext) -> Result<(), Error> {
        let value = self.expr.evaluate(ctx)?;
        ctx.insert_result(&self.key, value)
    }
}

/// A `{ ... }` sequence of statements.
#[derive(Debug, Default)]
pub struct Block {
    pub statements: Vec<Statement>,
}

impl Block {
    /// Runs the statements in order; the first error aborts the rest.
    pub fn execute(&self, ctx: &mut EvalContext) -> Result<(), Error> {
        for stmt in &self.statements {
            stmt.execute(ctx)?;
        }
        Ok(())
    }
}

/// A compiled rule: the top-level statements plus the private names its
/// `set` statements declare.
#[derive(Debug, Default)]
pub struct Document {
    pub statements: Vec<Statement>,
    pub declared: Vec<String>,
}

impl Document {
    /// Executes every statement against `ctx`.
    ///
    /// Cancellation is observed between top-level statements only.
    pub fn execute(&self, ctx: &mut EvalContext) -> Result<(), Error> {
        debug!(statements = self.statements.len(), "executing document");
        for stmt in &self.statements {
            ctx.check_cancelled().map_err(|e| e.at(stmt.position()))?;
            stmt.execute(ctx)?;
        }
        Ok(())
    }
}
