use std::fmt;

use crate::error::Position;

/// Kind of a lexical token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    /// Lexical error; the token text holds the message
    Error,
    /// End of input
    Eof,

    // Literals
    /// Integer, decimal, hex or exponent number, sign folded in
    ///
    /// # Examples
    /// ```text
    /// 42
    /// -3.5
    /// 0x1F
    /// 1e3
    /// ```
    Number,
    /// Double-quoted string, text holds the unescaped contents
    String,
    /// Single-quoted character constant, text holds the unescaped contents
    CharConstant,
    /// Any other printable ASCII character (`@`, `#`, `$`, ...)
    Char,
    /// `true` or `false`
    Bool,
    /// `nil`
    Nil,

    // Names
    /// Alphanumeric identifier not starting with a digit
    Identifier,
    /// `.name` field access, text holds the name without the dot
    Field,

    // Punctuation
    /// `,`
    Comma,
    /// `;`
    Semicolon,
    /// `+`
    Add,
    /// `-`
    Sub,
    /// `*`
    Mul,
    /// `/`
    Div,
    /// `%`
    Mod,
    /// `^`
    Pow,
    /// `?`
    Question,
    /// `:`
    Colon,
    /// `=` or `:=`
    Assign,
    /// `==`
    Equals,
    /// `!=` or `<>`
    NotEquals,
    /// `<`
    Less,
    /// `<=`
    LessEquals,
    /// `>`
    Greater,
    /// `>=`
    GreaterEquals,
    /// `&&` or `and`
    And,
    /// `||` or `or`
    Or,
    /// `!`
    Not,
    /// `in`
    In,
    /// `&`
    Ampersand,
    /// `|`
    Pipe,
    /// `(`
    LeftParen,
    /// `)`
    RightParen,
    /// `[`
    LeftBracket,
    /// `]`
    RightBracket,
    /// `{`
    LeftBrace,
    /// `}`
    RightBrace,
}

impl TokenKind {
    /// Tokens after which a `-`/`+` is a binary operator rather than a sign.
    pub fn produces_value(self) -> bool {
        matches!(
            self,
            TokenKind::Number
                | TokenKind::String
                | TokenKind::CharConstant
                | TokenKind::Char
                | TokenKind::Bool
                | TokenKind::Nil
                | TokenKind::Identifier
                | TokenKind::Field
                | TokenKind::RightParen
                | TokenKind::RightBracket
        )
    }
}

/// A token with its source text and the position of its first character.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub line: usize,
    pub col: usize,
    pub text: String,
}

impl Token {
    pub fn new(kind: TokenKind, position: Position, text: impl Into<String>) -> Self {
        Token {
            kind,
            line: position.line,
            col: position.col,
            text: text.into(),
        }
    }

    pub fn eof(position: Position) -> Self {
        Token::new(TokenKind::Eof, position, "")
    }

    pub fn position(&self) -> Position {
        Position::new(self.line, self.col)
    }

    pub fn is(&self, kind: TokenKind) -> bool {
        self.kind == kind
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            TokenKind::Eof => write!(f, "EOF"),
            TokenKind::String => write!(f, "\"{}\"", self.text),
            TokenKind::CharConstant => write!(f, "'{}'", self.text),
            TokenKind::Field => write!(f, "'.{}'", self.text),
            _ => write!(f, "'{}'", self.text),
        }
    }
}
