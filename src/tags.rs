//! Statement tags: the table of registered tag parsers and the built-in
//! `set` and `if` tags.

use std::collections::HashMap;

use crate::{
    ast::{Block, Expr, Node, Token, TokenKind},
    context::EvalContext,
    error::{Error, ErrorKind, Position},
    parser::Parser,
    value::Value,
};

/// Parses a tag's arguments. Receives the parser positioned just after the
/// tag name, and the tag name token itself.
pub type TagParser = fn(&mut Parser<'_>, Token) -> Result<Box<dyn Node>, Error>;

/// Tag name to parser. Each template owns one.
#[derive(Debug, Clone)]
pub struct TagTable {
    tags: HashMap<String, TagParser>,
}

impl Default for TagTable {
    /// The built-in `set` and `if` tags.
    fn default() -> Self {
        let mut tags: HashMap<String, TagParser> = HashMap::new();
        tags.insert("set".to_string(), parse_set);
        tags.insert("if".to_string(), parse_if);
        TagTable { tags }
    }
}

impl TagTable {
    /// A table without any tags.
    pub fn empty() -> Self {
        TagTable {
            tags: HashMap::new(),
        }
    }

    pub fn register(&mut self, name: &str, parser: TagParser) -> Result<(), Error> {
        if self.tags.contains_key(name) {
            return Err(ErrorKind::TagRegistered(name.to_string()).into());
        }
        self.tags.insert(name.to_string(), parser);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<TagParser> {
        self.tags.get(name).copied()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tags.contains_key(name)
    }
}

/// `set a = expr`, `set a, b = expr` or `set a`.
///
/// Declares private bindings. The expression is evaluated once and assigned
/// to every name; without one the names are nil.
#[derive(Debug)]
pub struct SetNode {
    pub names: Vec<String>,
    pub value: Option<Expr>,
    pub pos: Position,
}

impl Node for SetNode {
    fn execute(&self, ctx: &mut EvalContext) -> Result<(), Error> {
        let value = match &self.value {
            Some(expr) => expr.evaluate(ctx)?,
            None => Value::Nil,
        };
        for name in &self.names {
            ctx.set_private(name, value.clone())
                .map_err(|e| e.at(self.pos))?;
        }
        Ok(())
    }

    fn position(&self) -> Position {
        self.pos
    }
}

fn parse_set(parser: &mut Parser<'_>, tag: Token) -> Result<Box<dyn Node>, Error> {
    let mut names = Vec::new();
    let mut value = None;
    loop {
        let name = parser.next()?;
        if !name.is(TokenKind::Identifier) {
            return Err(
                Error::from(ErrorKind::IdentifierExpected(name.to_string())).at(name.position()),
            );
        }
        parser.declare(&name)?;
        names.push(name.text);

        match parser.peek_kind()? {
            TokenKind::Comma => {
                parser.next()?;
            }
            TokenKind::Assign => {
                parser.next()?;
                value = Some(parser.parse_expression()?);
                break;
            }
            _ => break,
        }
    }

    Ok(Box::new(SetNode {
        names,
        value,
        pos: tag.position(),
    }))
}

/// `if c { ... } else if c2 { ... } else { ... }`
///
/// Runs the block of the first truthy condition, or the `else` block when
/// none is.
#[derive(Debug)]
pub struct IfNode {
    pub branches: Vec<(Expr, Block)>,
    pub otherwise: Option<Block>,
    pub pos: Position,
}

impl Node for IfNode {
    fn execute(&self, ctx: &mut EvalContext) -> Result<(), Error> {
        for (condition, block) in &self.branches {
            if condition.evaluate(ctx)?.is_truthy() {
                return block.execute(ctx);
            }
        }
        match &self.otherwise {
            Some(block) => block.execute(ctx),
            None => Ok(()),
        }
    }

    fn position(&self) -> Position {
        self.pos
    }
}

fn is_keyword(token: &Token, word: &str) -> bool {
    token.is(TokenKind::Identifier) && token.text == word
}

fn parse_if(parser: &mut Parser<'_>, tag: Token) -> Result<Box<dyn Node>, Error> {
    let mut branches = Vec::new();
    let mut otherwise = None;

    let condition = parser.parse_expression()?;
    branches.push((condition, parser.wrap_until()?));

    while is_keyword(parser.peek()?, "else") {
        parser.next()?;
        if is_keyword(parser.peek()?, "if") {
            parser.next()?;
            let condition = parser.parse_expression()?;
            branches.push((condition, parser.wrap_until()?));
        } else {
            otherwise = Some(parser.wrap_until()?);
            break;
        }
    }

    Ok(Box::new(IfNode {
        branches,
        otherwise,
        pos: tag.position(),
    }))
}
