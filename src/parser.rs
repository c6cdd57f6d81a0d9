use std::collections::HashSet;

use tracing::debug;

use crate::{
    ast::{
        Assignment, BinOp, Block, Document, Expr, NumberLiteral, PartKind, ResultExpr, Statement,
        Token, TokenKind, UnaryOp, VariablePath,
    },
    context::DEFAULT_RESULT_KEY,
    error::{Error, ErrorKind},
    lexer::Lexer,
    tags::TagTable,
};

const MAX_LOOKAHEAD: usize = 3;

/// Recursive-descent parser over a [`Lexer`].
///
/// Tag parsers registered in the [`TagTable`] drive the parser through its
/// public methods: [`peek`](Parser::peek), [`next`](Parser::next),
/// [`backup`](Parser::backup), [`parse_expression`](Parser::parse_expression)
/// and [`wrap_until`](Parser::wrap_until).
pub struct Parser<'t> {
    lexer: Lexer,
    tags: &'t TagTable,
    lookahead: Vec<Token>,
    consumed: Vec<Token>,
    declared: Vec<String>,
    scopes: Vec<Vec<String>>,
    default_key: String,
    explicit_keys: HashSet<String>,
}

impl<'t> Parser<'t> {
    pub fn new(source: &str, tags: &'t TagTable) -> Self {
        Parser {
            lexer: Lexer::new(source),
            tags,
            lookahead: Vec::with_capacity(MAX_LOOKAHEAD),
            consumed: Vec::with_capacity(MAX_LOOKAHEAD),
            declared: Vec::new(),
            scopes: vec![Vec::new()],
            default_key: DEFAULT_RESULT_KEY.to_string(),
            explicit_keys: HashSet::new(),
        }
    }

    /// Sets the result group that bare expressions are stored in.
    pub fn with_default_key(mut self, key: &str) -> Self {
        self.default_key = key.to_string();
        self
    }

    fn fetch(&mut self) -> Result<Token, Error> {
        let token = match self.lexer.next_token() {
            Some(token) => token,
            None => Token::eof(self.lexer.location()),
        };
        if token.is(TokenKind::Error) {
            return Err(Error::from(ErrorKind::Lexical(token.text.clone())).at(token.position()));
        }
        Ok(token)
    }

    /// Returns the next token without consuming it.
    pub fn peek(&mut self) -> Result<&Token, Error> {
        if self.lookahead.is_empty() {
            let token = self.fetch()?;
            self.lookahead.push(token);
        }
        self.lookahead
            .last()
            .ok_or_else(|| ErrorKind::Internal.into())
    }

    pub fn peek_kind(&mut self) -> Result<TokenKind, Error> {
        Ok(self.peek()?.kind)
    }

    /// Consumes and returns the next token.
    pub fn next(&mut self) -> Result<Token, Error> {
        let token = match self.lookahead.pop() {
            Some(token) => token,
            None => self.fetch()?,
        };
        if self.consumed.len() == MAX_LOOKAHEAD {
            self.consumed.remove(0);
        }
        self.consumed.push(token.clone());
        Ok(token)
    }

    /// Pushes the most recently consumed token back. Up to three tokens can
    /// be backed up in a row; they come out again in their original order.
    pub fn backup(&mut self) {
        if let Some(token) = self.consumed.pop() {
            self.lookahead.push(token);
        }
    }

    /// Error for a token that doesn't fit `context`.
    pub fn unexpected(&self, token: &Token, context: &str) -> Error {
        let kind = if token.is(TokenKind::Eof) {
            ErrorKind::UnexpectedEof(context.to_string())
        } else {
            ErrorKind::UnexpectedToken {
                context: context.to_string(),
                token: token.to_string(),
            }
        };
        Error::from(kind).at(token.position())
    }

    /// Consumes a token of `kind` or fails with `context`.
    pub fn expect(&mut self, kind: TokenKind, context: &str) -> Result<Token, Error> {
        let token = self.next()?;
        if token.is(kind) {
            Ok(token)
        } else {
            Err(self.unexpected(&token, context))
        }
    }

    fn expect_closing(&mut self, kind: TokenKind, delimiter: &str, context: &str) -> Result<Token, Error> {
        let token = self.next()?;
        if token.is(kind) {
            return Ok(token);
        }
        if token.is(TokenKind::Eof) {
            return Err(self.unexpected(&token, delimiter));
        }
        Err(Error::from(ErrorKind::MissingDelimiter {
            delimiter: delimiter.to_string(),
            context: context.to_string(),
        })
        .at(token.position()))
    }

    /// Records a name declared by `set`.
    ///
    /// A name may be declared once in a block and the blocks enclosing it.
    /// Sibling blocks, such as the branches of one `if`, never run in the
    /// same pass and may each declare it.
    pub fn declare(&mut self, token: &Token) -> Result<(), Error> {
        if self.scopes.iter().flatten().any(|n| *n == token.text) {
            return Err(
                Error::from(ErrorKind::VariableAlreadyExists(token.text.clone())).at(token.position()),
            );
        }
        if let Some(scope) = self.scopes.last_mut() {
            scope.push(token.text.clone());
        }
        if !self.declared.contains(&token.text) {
            self.declared.push(token.text.clone());
        }
        Ok(())
    }

    /// Parses a whole rule.
    pub fn parse_document(mut self) -> Result<Document, Error> {
        let mut statements = Vec::new();
        loop {
            match self.peek_kind()? {
                TokenKind::Eof => break,
                TokenKind::Semicolon => {
                    self.next()?;
                }
                _ => statements.push(self.parse_statement(true)?),
            }
        }

        let mut n = 1;
        for stmt in &mut statements {
            if let Statement::Result(result) = stmt {
                let mut key = format!("{}{}", self.default_key, n);
                while self.explicit_keys.contains(&key) {
                    n += 1;
                    key = format!("{}{}", self.default_key, n);
                }
                result.key = key;
                n += 1;
            }
        }

        debug!(
            statements = statements.len(),
            declared = self.declared.len(),
            "parsed document"
        );
        Ok(Document {
            statements,
            declared: self.declared,
        })
    }

    /// A tag, an assignment, or (at top level only) a bare expression.
    fn parse_statement(&mut self, top_level: bool) -> Result<Statement, Error> {
        let token = self.next()?;
        if token.is(TokenKind::Identifier)
            && let Some(tag) = self.tags.get(&token.text)
        {
            return tag(self, token).map(Statement::Tag);
        }
        self.backup();

        let expr = self.parse_expression()?;
        if self.peek_kind()? == TokenKind::Assign {
            let assign = self.next()?;
            let Expr::Variable(target) = expr else {
                return Err(self.unexpected(&assign, "assignment target"));
            };
            if target.root() == self.default_key
                && let Some(name) = target.first_field()
            {
                self.explicit_keys.insert(name.to_string());
            }
            let value = self.parse_expression()?;
            return Ok(Statement::Assign(Assignment { target, value }));
        }

        if !top_level {
            let token = self.next()?;
            return Err(self.unexpected(&token, "assignment"));
        }
        Ok(Statement::Result(ResultExpr {
            key: String::new(),
            expr,
        }))
    }

    /// Parses `{ statement* }`.
    pub fn wrap_until(&mut self) -> Result<Block, Error> {
        let open = self.expect(TokenKind::LeftBrace, "block")?;
        self.scopes.push(Vec::new());
        let mut statements = Vec::new();
        loop {
            match self.peek_kind()? {
                TokenKind::RightBrace => {
                    self.next()?;
                    self.scopes.pop();
                    return Ok(Block { statements });
                }
                TokenKind::Eof => {
                    return Err(Error::from(ErrorKind::WrapperUnclosed).at(open.position()));
                }
                TokenKind::Semicolon => {
                    self.next()?;
                }
                _ => statements.push(self.parse_statement(false)?),
            }
        }
    }

    /// `Relational (("and" | "or") Expression)?`
    pub fn parse_expression(&mut self) -> Result<Expr, Error> {
        let left = self.parse_relational()?;
        let op = match self.peek_kind()? {
            TokenKind::And => BinOp::And,
            TokenKind::Or => BinOp::Or,
            _ => return Ok(left),
        };
        let token = self.next()?;
        let right = self.parse_expression()?;
        Ok(Expr::binary(op, left, right, token.position()))
    }

    fn parse_relational(&mut self) -> Result<Expr, Error> {
        let left = self.parse_simple()?;
        let op = match self.peek_kind()? {
            TokenKind::Equals => BinOp::Equal,
            TokenKind::NotEquals => BinOp::NotEqual,
            TokenKind::Less => BinOp::LessThan,
            TokenKind::LessEquals => BinOp::LessEqual,
            TokenKind::Greater => BinOp::GreaterThan,
            TokenKind::GreaterEquals => BinOp::GreaterEqual,
            TokenKind::In => {
                let token = self.next()?;
                let right = self.parse_simple()?;
                return Ok(Expr::binary(BinOp::In, left, right, token.position()));
            }
            _ => return Ok(left),
        };
        let token = self.next()?;
        let right = self.parse_relational()?;
        Ok(Expr::binary(op, left, right, token.position()))
    }

    fn parse_simple(&mut self) -> Result<Expr, Error> {
        let mut left = self.parse_term()?;
        loop {
            let op = match self.peek_kind()? {
                TokenKind::Add => BinOp::Add,
                TokenKind::Sub => BinOp::Subtract,
                _ => return Ok(left),
            };
            let token = self.next()?;
            let right = self.parse_term()?;
            left = Expr::binary(op, left, right, token.position());
        }
    }

    fn parse_term(&mut self) -> Result<Expr, Error> {
        let mut left = self.parse_power()?;
        loop {
            let op = match self.peek_kind()? {
                TokenKind::Mul => BinOp::Multiply,
                TokenKind::Div => BinOp::Divide,
                TokenKind::Mod => BinOp::Modulo,
                _ => return Ok(left),
            };
            let token = self.next()?;
            let right = self.parse_power()?;
            left = Expr::binary(op, left, right, token.position());
        }
    }

    fn parse_power(&mut self) -> Result<Expr, Error> {
        let base = self.parse_factor()?;
        if self.peek_kind()? != TokenKind::Pow {
            return Ok(base);
        }
        let token = self.next()?;
        let exponent = self.parse_power()?;
        Ok(Expr::binary(BinOp::Power, base, exponent, token.position()))
    }

    fn parse_factor(&mut self) -> Result<Expr, Error> {
        let token = self.next()?;
        let op = match token.kind {
            TokenKind::LeftParen => {
                let expr = self.parse_expression()?;
                self.expect_closing(TokenKind::RightParen, "')'", "in parenthesised expression")?;
                return Ok(expr);
            }
            TokenKind::Sub => UnaryOp::Negate,
            TokenKind::Not => UnaryOp::Not,
            _ => {
                self.backup();
                return self.parse_operand();
            }
        };
        let operand = self.parse_factor()?;
        Ok(Expr::Unary {
            op,
            operand: Box::new(operand),
            pos: token.position(),
        })
    }

    /// Literal, array literal or variable path.
    fn parse_operand(&mut self) -> Result<Expr, Error> {
        let token = self.next()?;
        let pos = token.position();
        match token.kind {
            TokenKind::Number => match NumberLiteral::parse(&token.text) {
                Some(value) => Ok(Expr::Number { value, pos }),
                None => Err(Error::from(ErrorKind::Lexical(format!(
                    "bad number syntax: \"{}\"",
                    token.text
                )))
                .at(pos)),
            },
            TokenKind::Bool => Ok(Expr::Boolean {
                value: token.text == "true",
                pos,
            }),
            TokenKind::String | TokenKind::CharConstant => Ok(Expr::String {
                value: token.text,
                pos,
            }),
            TokenKind::Nil => Ok(Expr::Nil(pos)),
            TokenKind::LeftBracket => self.parse_array(token),
            TokenKind::Identifier => self.parse_variable(token),
            _ => Err(self.unexpected(&token, "expression")),
        }
    }

    fn parse_array(&mut self, open: Token) -> Result<Expr, Error> {
        let mut elements = Vec::new();
        if self.peek_kind()? == TokenKind::RightBracket {
            self.next()?;
        } else {
            loop {
                elements.push(self.parse_expression()?);
                let token = self.next()?;
                match token.kind {
                    TokenKind::Comma => continue,
                    TokenKind::RightBracket => break,
                    _ => {
                        return Err(Error::from(ErrorKind::MissingDelimiter {
                            delimiter: "']'".to_string(),
                            context: "in array literal".to_string(),
                        })
                        .at(token.position()));
                    }
                }
            }
        }
        Ok(Expr::Array {
            elements,
            pos: open.position(),
        })
    }

    /// `Identifier (Field | Subscript | Call)*`
    fn parse_variable(&mut self, root: Token) -> Result<Expr, Error> {
        let pos = root.position();
        let mut path = VariablePath::new(root.text, pos);
        loop {
            match self.peek_kind()? {
                TokenKind::Field => {
                    let field = self.next()?;
                    let pos = field.position();
                    path.push(PartKind::Ident(field.text), pos);
                }
                TokenKind::LeftBracket => {
                    let open = self.next()?;
                    let index = self.parse_expression()?;
                    self.expect_closing(TokenKind::RightBracket, "']'", "in subscript")?;
                    path.push(PartKind::Subscript(Box::new(index)), open.position());
                }
                TokenKind::LeftParen => {
                    let open = self.next()?;
                    let args = self.parse_call_args()?;
                    path.push(PartKind::Call(args), open.position());
                }
                _ => return Ok(Expr::Variable(path)),
            }
        }
    }

    fn parse_call_args(&mut self) -> Result<Vec<Expr>, Error> {
        let mut args = Vec::new();
        if self.peek_kind()? == TokenKind::RightParen {
            self.next()?;
            return Ok(args);
        }
        loop {
            args.push(self.parse_expression()?);
            let token = self.next()?;
            match token.kind {
                TokenKind::Comma => {
                    if self.peek_kind()? == TokenKind::RightParen {
                        let close = self.next()?;
                        return Err(self.unexpected(&close, "call arguments"));
                    }
                }
                TokenKind::RightParen => return Ok(args),
                TokenKind::Eof => return Err(self.unexpected(&token, "')'")),
                _ => {
                    return Err(Error::from(ErrorKind::MissingDelimiter {
                        delimiter: "')'".to_string(),
                        context: "in call arguments".to_string(),
                    })
                    .at(token.position()));
                }
            }
        }
    }
}

/// Parses `source` with the built-in tags and the default result key.
pub fn parse(source: &str) -> Result<Document, Error> {
    let tags = TagTable::default();
    Parser::new(source, &tags).parse_document()
}
