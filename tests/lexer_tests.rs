// tests/lexer_tests.rs

use pretty_assertions::assert_eq;
use tally_lang::ast::{Token, TokenKind};
use tally_lang::lexer::Lexer;

fn tokens(input: &str) -> Vec<Token> {
    Lexer::new(input).collect()
}

fn kinds(input: &str) -> Vec<TokenKind> {
    Lexer::new(input).map(|t| t.kind).collect()
}

// ============================================================================
// Operators and Punctuation
// ============================================================================

#[test]
fn test_single_char_tokens() {
    let test_cases = vec![
        (",", TokenKind::Comma),
        (";", TokenKind::Semicolon),
        ("*", TokenKind::Mul),
        ("/", TokenKind::Div),
        ("%", TokenKind::Mod),
        ("^", TokenKind::Pow),
        ("?", TokenKind::Question),
        ("&", TokenKind::Ampersand),
        ("|", TokenKind::Pipe),
        ("<", TokenKind::Less),
        (">", TokenKind::Greater),
        ("=", TokenKind::Assign),
        (":", TokenKind::Colon),
        ("!", TokenKind::Not),
        ("+", TokenKind::Add),
        ("-", TokenKind::Sub),
        ("@", TokenKind::Char),
    ];

    for (input, expected) in test_cases {
        assert_eq!(kinds(input), vec![expected, TokenKind::Eof], "Failed for input: {}", input);
    }
}

#[test]
fn test_two_char_tokens() {
    let test_cases = vec![
        ("==", TokenKind::Equals),
        ("!=", TokenKind::NotEquals),
        ("<>", TokenKind::NotEquals),
        ("<=", TokenKind::LessEquals),
        (">=", TokenKind::GreaterEquals),
        (":=", TokenKind::Assign),
        ("&&", TokenKind::And),
        ("||", TokenKind::Or),
    ];

    for (input, expected) in test_cases {
        assert_eq!(kinds(input), vec![expected, TokenKind::Eof], "Failed for input: {}", input);
    }
}

#[test]
fn test_brackets() {
    assert_eq!(
        kinds("([{}])"),
        vec![
            TokenKind::LeftParen,
            TokenKind::LeftBracket,
            TokenKind::LeftBrace,
            TokenKind::RightBrace,
            TokenKind::RightBracket,
            TokenKind::RightParen,
            TokenKind::Eof,
        ]
    );
}

// ============================================================================
// Literals
// ============================================================================

#[test]
fn test_numbers() {
    for input in ["42", "3.14", "0x1F", "1e3", "2.5E-2", ".5"] {
        let toks = tokens(input);
        assert_eq!(toks[0].kind, TokenKind::Number, "Failed for input: {}", input);
        assert_eq!(toks[0].text, input);
        assert_eq!(toks.len(), 2);
    }
}

#[test]
fn test_number_with_trailing_letters_is_error() {
    let toks = tokens("123abc");
    assert_eq!(toks[0].kind, TokenKind::Error);
    assert_eq!(toks[0].text, "bad number syntax: \"123a\"");
    assert_eq!(toks[1].kind, TokenKind::Eof);
    assert_eq!(toks.len(), 2);
}

#[test]
fn test_string_escapes() {
    let toks = tokens(r#""a\"b\n" 'x\'y'"#);
    assert_eq!(toks[0].kind, TokenKind::String);
    assert_eq!(toks[0].text, "a\"b\n");
    assert_eq!(toks[1].kind, TokenKind::CharConstant);
    assert_eq!(toks[1].text, "x'y");
}

#[test]
fn test_unterminated_string() {
    let toks = tokens("a = \"open");
    assert_eq!(toks[2].kind, TokenKind::Error);
    assert_eq!(toks[2].text, "unterminated string constant");
    assert_eq!((toks[2].line, toks[2].col), (1, 5));
    assert_eq!(toks.last().map(|t| t.kind), Some(TokenKind::Eof));
}

#[test]
fn test_keywords() {
    assert_eq!(
        kinds("true false nil in and or other"),
        vec![
            TokenKind::Bool,
            TokenKind::Bool,
            TokenKind::Nil,
            TokenKind::In,
            TokenKind::And,
            TokenKind::Or,
            TokenKind::Identifier,
            TokenKind::Eof,
        ]
    );
}

// ============================================================================
// Sign Folding
// ============================================================================

#[test]
fn test_minus_after_value_is_operator() {
    let texts: Vec<String> = tokens("x-1").into_iter().map(|t| t.text).collect();
    assert_eq!(texts, vec!["x", "-", "1", ""]);

    let texts: Vec<String> = tokens("2 -1").into_iter().map(|t| t.text).collect();
    assert_eq!(texts, vec!["2", "-", "1", ""]);
}

#[test]
fn test_minus_after_operator_is_sign() {
    let texts: Vec<String> = tokens("3 * -2").into_iter().map(|t| t.text).collect();
    assert_eq!(texts, vec!["3", "*", "-2", ""]);

    let texts: Vec<String> = tokens("-.5").into_iter().map(|t| t.text).collect();
    assert_eq!(texts, vec!["-.5", ""]);
}

// ============================================================================
// Fields, Comments and Positions
// ============================================================================

#[test]
fn test_field_access() {
    let toks = tokens("order.items");
    assert_eq!(toks[0].kind, TokenKind::Identifier);
    assert_eq!(toks[1].kind, TokenKind::Field);
    assert_eq!(toks[1].text, "items");
}

#[test]
fn test_comments_are_skipped() {
    assert_eq!(
        kinds("a // line\n/* block\n */ b"),
        vec![TokenKind::Identifier, TokenKind::Identifier, TokenKind::Eof]
    );
}

#[test]
fn test_unclosed_block_comment() {
    let toks = tokens("a /* never");
    assert_eq!(toks[1].kind, TokenKind::Error);
    assert_eq!(toks[1].text, "unclosed comment");
}

#[test]
fn test_positions() {
    let toks = tokens("a\n  bb + 1");
    let positions: Vec<(usize, usize)> = toks.iter().map(|t| (t.line, t.col)).collect();
    assert_eq!(positions, vec![(1, 1), (2, 3), (2, 6), (2, 8), (2, 9)]);
}

#[test]
fn test_bracket_balance() {
    let toks = tokens("(1]");
    assert_eq!(toks[2].kind, TokenKind::Error);
    assert_eq!(toks[2].text, "unexpected closing ']'");

    let toks = tokens("f(1");
    assert_eq!(toks[3].kind, TokenKind::Error);
    assert_eq!(toks[3].text, "unclosed '('");
}

#[test]
fn test_unrecognized_character() {
    let toks = tokens("a \u{00e9}");
    assert_eq!(toks[1].kind, TokenKind::Identifier);

    let toks = tokens("a \u{2603}");
    assert_eq!(toks[1].kind, TokenKind::Error);
    assert_eq!(toks.len(), 3);
}
