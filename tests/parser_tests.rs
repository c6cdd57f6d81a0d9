// tests/parser_tests.rs

use pretty_assertions::assert_eq;
use tally_lang::ast::{BinOp, Expr, Node, PartKind, Statement, Token, UnaryOp};
use tally_lang::context::EvalContext;
use tally_lang::error::{Error, ErrorKind, Position};
use tally_lang::parser::{Parser, parse};
use tally_lang::tags::TagTable;

fn single_expr(source: &str) -> Expr {
    let doc = parse(source).unwrap();
    assert_eq!(doc.statements.len(), 1);
    match doc.statements.into_iter().next() {
        Some(Statement::Result(result)) => result.expr,
        other => panic!("expected a bare expression, got {:?}", other),
    }
}

fn parse_error(source: &str) -> Error {
    parse(source).unwrap_err()
}

// ============================================================================
// Precedence and Associativity
// ============================================================================

#[test]
fn test_multiplication_binds_tighter() {
    let Expr::Binary { op, right, .. } = single_expr("1 + 2 * 3") else {
        panic!("expected binary");
    };
    assert_eq!(op, BinOp::Add);
    assert!(matches!(*right, Expr::Binary { op: BinOp::Multiply, .. }));
}

#[test]
fn test_additive_is_left_associative() {
    let Expr::Binary { op, left, .. } = single_expr("10 - 4 - 3") else {
        panic!("expected binary");
    };
    assert_eq!(op, BinOp::Subtract);
    assert!(matches!(*left, Expr::Binary { op: BinOp::Subtract, .. }));
}

#[test]
fn test_power_is_right_associative() {
    let Expr::Binary { op, right, .. } = single_expr("2 ^ 3 ^ 2") else {
        panic!("expected binary");
    };
    assert_eq!(op, BinOp::Power);
    assert!(matches!(*right, Expr::Binary { op: BinOp::Power, .. }));
}

#[test]
fn test_logical_is_loosest() {
    let Expr::Binary { op, left, right, .. } = single_expr("a > 1 and b < 2 or c") else {
        panic!("expected binary");
    };
    assert_eq!(op, BinOp::And);
    assert!(matches!(*left, Expr::Binary { op: BinOp::GreaterThan, .. }));
    assert!(matches!(*right, Expr::Binary { op: BinOp::Or, .. }));
}

#[test]
fn test_in_operator() {
    let Expr::Binary { op, .. } = single_expr("\"a\" in tags") else {
        panic!("expected binary");
    };
    assert_eq!(op, BinOp::In);
}

#[test]
fn test_unary_operators() {
    assert!(matches!(
        single_expr("-x"),
        Expr::Unary { op: UnaryOp::Negate, .. }
    ));
    assert!(matches!(single_expr("!ok"), Expr::Unary { op: UnaryOp::Not, .. }));
}

#[test]
fn test_binary_position_is_operator() {
    let Expr::Binary { pos, .. } = single_expr("1 +\n  2") else {
        panic!("expected binary");
    };
    assert_eq!(pos, Position::new(1, 3));
}

// ============================================================================
// Variable Paths
// ============================================================================

#[test]
fn test_path_with_four_parts() {
    let Expr::Variable(path) = single_expr("a.b[i](x, y)") else {
        panic!("expected variable");
    };
    assert_eq!(path.parts.len(), 4);
    assert_eq!(path.root(), "a");
    assert!(matches!(&path.parts[1].kind, PartKind::Ident(name) if name == "b"));
    assert!(matches!(path.parts[2].kind, PartKind::Subscript(_)));
    assert!(matches!(&path.parts[3].kind, PartKind::Call(args) if args.len() == 2));
    assert_eq!(path.to_string(), "a.b[subscript]()");
}

#[test]
fn test_array_literal() {
    let Expr::Array { elements, .. } = single_expr("[1, \"two\", [3]]") else {
        panic!("expected array");
    };
    assert_eq!(elements.len(), 3);
}

#[test]
fn test_trailing_comma_in_call() {
    let err = parse_error("max(1, 2,)");
    assert!(matches!(err.kind(), ErrorKind::UnexpectedToken { .. }));
    assert_eq!(err.position(), Some(Position::new(1, 10)));
}

#[test]
fn test_missing_close_paren() {
    let err = parse_error("(1 2)");
    assert!(matches!(err.kind(), ErrorKind::MissingDelimiter { .. }));
    assert_eq!(err.position(), Some(Position::new(1, 4)));
}

// ============================================================================
// Documents
// ============================================================================

#[test]
fn test_result_keys_are_synthesized() {
    let doc = parse("1; res.res2 = 5\n2\n3").unwrap();
    let keys: Vec<&str> = doc
        .statements
        .iter()
        .filter_map(|s| match s {
            Statement::Result(r) => Some(r.key.as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(keys, vec!["res1", "res3", "res4"]);
}

#[test]
fn test_custom_default_key() {
    let tags = TagTable::default();
    let doc = Parser::new("1 + 1", &tags)
        .with_default_key("out")
        .parse_document()
        .unwrap();
    assert!(matches!(&doc.statements[0], Statement::Result(r) if r.key == "out1"));
}

#[test]
fn test_set_declarations() {
    let doc = parse("set a, b = 1\nset c").unwrap();
    assert_eq!(doc.declared, vec!["a", "b", "c"]);
}

#[test]
fn test_duplicate_set_is_rejected() {
    let err = parse_error("set x = 5\nset x = 6");
    assert_eq!(err.kind(), &ErrorKind::VariableAlreadyExists("x".to_string()));
    assert_eq!(err.position(), Some(Position::new(2, 5)));
}

#[test]
fn test_set_in_sibling_branches() {
    let doc = parse("if flag { set x = 1 } else if other { set x = 2 } else { set x = 3 }\nres.x = x")
        .unwrap();
    assert_eq!(doc.declared, vec!["x"]);
}

#[test]
fn test_set_shadowing_enclosing_declaration_is_rejected() {
    let err = parse_error("set x = 1\nif true { set x = 2 }");
    assert_eq!(err.kind(), &ErrorKind::VariableAlreadyExists("x".to_string()));
    assert_eq!(err.position(), Some(Position::new(2, 15)));

    let err = parse_error("if true { set y = 1\n set y = 2 }");
    assert_eq!(err.position(), Some(Position::new(2, 6)));
}

#[test]
fn test_backup_restores_tokens_in_order() {
    let tags = TagTable::default();
    let mut parser = Parser::new("a b c d", &tags);
    for _ in 0..3 {
        parser.next().unwrap();
    }
    for _ in 0..3 {
        parser.backup();
    }
    let texts: Vec<String> = (0..4).map(|_| parser.next().unwrap().text).collect();
    assert_eq!(texts, vec!["a", "b", "c", "d"]);

    let mut parser = Parser::new("a b c", &tags);
    parser.next().unwrap();
    parser.next().unwrap();
    parser.backup();
    parser.backup();
    assert_eq!(parser.peek().unwrap().text, "a");
    assert_eq!(parser.next().unwrap().text, "a");
    assert_eq!(parser.next().unwrap().text, "b");
}

#[test]
fn test_set_requires_identifier() {
    let err = parse_error("set 5 = 1");
    assert_eq!(err.code(), -518);
}

#[test]
fn test_unclosed_block() {
    let err = parse_error("if true {\n res.a = 1\n");
    assert_eq!(err.kind(), &ErrorKind::WrapperUnclosed);
    assert_eq!(err.position(), Some(Position::new(1, 9)));
}

#[test]
fn test_block_requires_assignment() {
    let err = parse_error("if true { 1 + 2 }");
    assert!(matches!(err.kind(), ErrorKind::UnexpectedToken { .. }));
}

#[test]
fn test_assignment_target_must_be_path() {
    let err = parse_error("1 = 2");
    assert!(matches!(err.kind(), ErrorKind::UnexpectedToken { .. }));
}

#[test]
fn test_lexical_error_surfaces() {
    let err = parse_error("a = \"open");
    assert_eq!(err.code(), -517);
    assert_eq!(err.message(), "unterminated string constant");
}

#[test]
fn test_unexpected_eof() {
    let err = parse_error("1 +");
    assert_eq!(err.kind(), &ErrorKind::UnexpectedEof("expression".to_string()));
}

// ============================================================================
// Custom Tags
// ============================================================================

#[derive(Debug)]
struct Noop(Position);

impl Node for Noop {
    fn execute(&self, _ctx: &mut EvalContext) -> Result<(), Error> {
        Ok(())
    }

    fn position(&self) -> Position {
        self.0
    }
}

fn parse_noop(_parser: &mut Parser<'_>, tag: Token) -> Result<Box<dyn Node>, Error> {
    Ok(Box::new(Noop(tag.position())))
}

#[test]
fn test_registered_tag() {
    let mut tags = TagTable::default();
    tags.register("noop", parse_noop).unwrap();
    let doc = Parser::new("noop\nnoop", &tags).parse_document().unwrap();
    assert_eq!(doc.statements.len(), 2);
    assert!(matches!(doc.statements[0], Statement::Tag(_)));

    let err = tags.register("noop", parse_noop).unwrap_err();
    assert_eq!(err.code(), -520);
}
