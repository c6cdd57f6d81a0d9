use std::fmt;

use crate::{ast::Expr, error::Position};

/// One step of a variable path.
#[derive(Debug, Clone, PartialEq)]
pub enum PartKind {
    /// Plain name: the root identifier or a `.field`
    Ident(String),
    /// `[expr]`
    Subscript(Box<Expr>),
    /// `(arg, ...)` applied to the value produced so far
    Call(Vec<Expr>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Part {
    pub kind: PartKind,
    pub pos: Position,
}

/// A variable reference such as `a.b[i](x, y)`.
///
/// The first part is always an identifier naming a binding; the remaining
/// parts are applied left to right.
#[derive(Debug, Clone, PartialEq)]
pub struct VariablePath {
    pub parts: Vec<Part>,
}

impl VariablePath {
    pub fn new(root: impl Into<String>, pos: Position) -> Self {
        VariablePath {
            parts: vec![Part {
                kind: PartKind::Ident(root.into()),
                pos,
            }],
        }
    }

    pub fn push(&mut self, kind: PartKind, pos: Position) {
        self.parts.push(Part { kind, pos });
    }

    pub fn root(&self) -> &str {
        match self.parts.first().map(|p| &p.kind) {
            Some(PartKind::Ident(name)) => name,
            _ => "",
        }
    }

    pub fn position(&self) -> Position {
        self.parts.first().map(|p| p.pos).unwrap_or_default()
    }

    pub fn has_call(&self) -> bool {
        self.parts.iter().any(|p| matches!(p.kind, PartKind::Call(_)))
    }

    /// Name of the second part when it is a plain field, e.g. `total` in
    /// `res.total`.
    pub fn first_field(&self) -> Option<&str> {
        match self.parts.get(1).map(|p| &p.kind) {
            Some(PartKind::Ident(name)) => Some(name),
            _ => None,
        }
    }
}

impl fmt::Display for VariablePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, part) in self.parts.iter().enumerate() {
            match &part.kind {
                PartKind::Ident(name) if i == 0 => write!(f, "{}", name)?,
                PartKind::Ident(name) => write!(f, ".{}", name)?,
                PartKind::Subscript(_) => write!(f, "[subscript]")?,
                PartKind::Call(_) => write!(f, "()")?,
            }
        }
        Ok(())
    }
}
