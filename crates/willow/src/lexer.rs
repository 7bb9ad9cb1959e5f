//! Lexer for the willow expression language, built on logos.

use logos::Logos;

use crate::error::Span;

fn unescape(slice: &str) -> Option<String> {
    // Strip the surrounding quotes, then process escapes.
    let inner = &slice[1..slice.len() - 1];
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next()? {
            'n' => out.push('\n'),
            't' => out.push('\t'),
            'r' => out.push('\r'),
            '0' => out.push('\0'),
            '\\' => out.push('\\'),
            '\'' => out.push('\''),
            other => out.push(other),
        }
    }
    Some(out)
}

/// All tokens in the willow language.
#[allow(missing_docs)]
#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\r\n\f]+")] // Whitespace
#[logos(skip r"//[^\n]*")] // Line comment
#[logos(skip r"#[^\n]*")] // Line comment, shell style
#[logos(skip r"/\*[^*]*\*+(?:[^/*][^*]*\*+)*/")] // Block comment
pub enum Token {
    // === Literals ===
    #[regex(r"[0-9]+(\.[0-9]+)?([eE][+-]?[0-9]+)?", |lex| lex.slice().parse::<f64>().ok())]
    Number(f64),

    #[regex(r"'(\\.|[^'\\])*'", |lex| unescape(lex.slice()))]
    StringLit(String),

    // === Keywords ===
    #[token("var")]
    Var,
    #[token("const")]
    Const,
    #[token("if")]
    If,
    #[token("else")]
    Else,
    #[token("for")]
    For,
    #[token("while")]
    While,
    #[token("repeat")]
    Repeat,
    #[token("until")]
    Until,
    #[token("switch")]
    Switch,
    #[token("case")]
    Case,
    #[token("default")]
    Default,
    #[token("break")]
    Break,
    #[token("continue")]
    Continue,
    #[token("return")]
    Return,
    #[token("assert")]
    Assert,
    #[token("true")]
    True,
    #[token("false")]
    False,

    // === Word operators ===
    #[token("and")]
    And,
    #[token("or")]
    Or,
    #[token("not")]
    Not,
    #[token("xor")]
    Xor,
    #[token("nand")]
    Nand,
    #[token("nor")]
    Nor,

    #[regex(r"[A-Za-z_][A-Za-z0-9_]*", |lex| lex.slice().to_owned())]
    Ident(String),

    // === Assignment and swap ===
    #[token(":=")]
    Assign,
    #[token("+=")]
    AddAssign,
    #[token("-=")]
    SubAssign,
    #[token("*=")]
    MulAssign,
    #[token("/=")]
    DivAssign,
    #[token("%=")]
    ModAssign,
    #[token("<=>")]
    SwapOp,

    // === Comparison ===
    #[token("==")]
    EqEq,
    #[token("=")]
    Eq,
    #[token("!=")]
    Ne,
    #[token("<>")]
    NeAlt,
    #[token("<=")]
    Le,
    #[token(">=")]
    Ge,
    #[token("<")]
    Lt,
    #[token(">")]
    Gt,

    // === Arithmetic ===
    #[token("+")]
    Plus,
    #[token("-")]
    Minus,
    #[token("*")]
    Star,
    #[token("/")]
    Slash,
    #[token("%")]
    Percent,
    #[token("^")]
    Caret,

    // === Punctuation ===
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token("{")]
    LBrace,
    #[token("}")]
    RBrace,
    #[token("[")]
    LBracket,
    #[token("]")]
    RBracket,
    #[token(":")]
    Colon,
    #[token(",")]
    Comma,
    #[token(";")]
    Semicolon,
    #[token("~")]
    Tilde,
    #[token("?")]
    Question,

    /// Invalid character sequence; the parser reports it as a LexError.
    Error(String),
}

impl Token {
    /// Short description for diagnostics.
    pub fn describe(&self) -> String {
        match self {
            Token::Number(n) => format!("number '{n}'"),
            Token::StringLit(_) => "string literal".to_owned(),
            Token::Ident(name) => format!("identifier '{name}'"),
            Token::Error(lexeme) => format!("invalid token '{lexeme}'"),
            Token::Var => "'var'".to_owned(),
            Token::Const => "'const'".to_owned(),
            Token::If => "'if'".to_owned(),
            Token::Else => "'else'".to_owned(),
            Token::For => "'for'".to_owned(),
            Token::While => "'while'".to_owned(),
            Token::Repeat => "'repeat'".to_owned(),
            Token::Until => "'until'".to_owned(),
            Token::Switch => "'switch'".to_owned(),
            Token::Case => "'case'".to_owned(),
            Token::Default => "'default'".to_owned(),
            Token::Break => "'break'".to_owned(),
            Token::Continue => "'continue'".to_owned(),
            Token::Return => "'return'".to_owned(),
            Token::Assert => "'assert'".to_owned(),
            Token::True => "'true'".to_owned(),
            Token::False => "'false'".to_owned(),
            Token::And => "'and'".to_owned(),
            Token::Or => "'or'".to_owned(),
            Token::Not => "'not'".to_owned(),
            Token::Xor => "'xor'".to_owned(),
            Token::Nand => "'nand'".to_owned(),
            Token::Nor => "'nor'".to_owned(),
            Token::Assign => "':='".to_owned(),
            Token::AddAssign => "'+='".to_owned(),
            Token::SubAssign => "'-='".to_owned(),
            Token::MulAssign => "'*='".to_owned(),
            Token::DivAssign => "'/='".to_owned(),
            Token::ModAssign => "'%='".to_owned(),
            Token::SwapOp => "'<=>'".to_owned(),
            Token::EqEq => "'=='".to_owned(),
            Token::Eq => "'='".to_owned(),
            Token::Ne => "'!='".to_owned(),
            Token::NeAlt => "'<>'".to_owned(),
            Token::Le => "'<='".to_owned(),
            Token::Ge => "'>='".to_owned(),
            Token::Lt => "'<'".to_owned(),
            Token::Gt => "'>'".to_owned(),
            Token::Plus => "'+'".to_owned(),
            Token::Minus => "'-'".to_owned(),
            Token::Star => "'*'".to_owned(),
            Token::Slash => "'/'".to_owned(),
            Token::Percent => "'%'".to_owned(),
            Token::Caret => "'^'".to_owned(),
            Token::LParen => "'('".to_owned(),
            Token::RParen => "')'".to_owned(),
            Token::LBrace => "'{'".to_owned(),
            Token::RBrace => "'}'".to_owned(),
            Token::LBracket => "'['".to_owned(),
            Token::RBracket => "']'".to_owned(),
            Token::Colon => "':'".to_owned(),
            Token::Comma => "','".to_owned(),
            Token::Semicolon => "';'".to_owned(),
            Token::Tilde => "'~'".to_owned(),
            Token::Question => "'?'".to_owned(),
        }
    }
}

/// A token with its byte range in the source.
#[derive(Debug, Clone, PartialEq)]
pub struct Spanned {
    /// The token
    pub token: Token,
    /// Byte range in the source text
    pub span: Span,
}

/// Eagerly tokenize a whole source string.
///
/// Malformed input never aborts the scan: each unrecognized character
/// sequence becomes a [`Token::Error`] in the stream, so one compile
/// can report multiple lex errors while parsing continues around them.
pub fn tokenize(source: &str) -> Vec<Spanned> {
    let mut tokens = Vec::new();
    let mut lexer = Token::lexer(source);
    while let Some(result) = lexer.next() {
        let span = lexer.span();
        let token = match result {
            Ok(token) => token,
            Err(()) => Token::Error(lexer.slice().to_owned()),
        };
        tokens.push(Spanned { token, span });
    }
    tokens
}

/// Maps byte offsets to 1-based line/column pairs for diagnostics.
#[derive(Debug, Clone)]
pub struct LineIndex {
    line_starts: Vec<usize>,
}

impl LineIndex {
    /// Build the index for a source string.
    pub fn new(source: &str) -> Self {
        let mut line_starts = vec![0];
        for (i, b) in source.bytes().enumerate() {
            if b == b'\n' {
                line_starts.push(i + 1);
            }
        }
        Self { line_starts }
    }

    /// Line and column (both 1-based) of a byte offset.
    pub fn line_col(&self, offset: usize) -> (usize, usize) {
        let line = match self.line_starts.binary_search(&offset) {
            Ok(i) => i,
            Err(i) => i - 1,
        };
        (line + 1, offset - self.line_starts[line] + 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lex(src: &str) -> Vec<Token> {
        tokenize(src).into_iter().map(|s| s.token).collect()
    }

    #[test]
    fn test_numbers() {
        assert_eq!(
            lex("42 3.14 1.5e-3"),
            vec![
                Token::Number(42.0),
                Token::Number(3.14),
                Token::Number(1.5e-3),
            ]
        );
    }

    #[test]
    fn test_string_escapes() {
        assert_eq!(
            lex(r"'a\'b\n'"),
            vec![Token::StringLit("a'b\n".to_owned())]
        );
    }

    #[test]
    fn test_operators() {
        assert_eq!(
            lex(":= += <=> <> <= =="),
            vec![
                Token::Assign,
                Token::AddAssign,
                Token::SwapOp,
                Token::NeAlt,
                Token::Le,
                Token::EqEq,
            ]
        );
    }

    #[test]
    fn test_keywords_vs_idents() {
        assert_eq!(
            lex("var variable repeat repeats"),
            vec![
                Token::Var,
                Token::Ident("variable".to_owned()),
                Token::Repeat,
                Token::Ident("repeats".to_owned()),
            ]
        );
    }

    #[test]
    fn test_comments_skipped() {
        assert_eq!(
            lex("1 // one\n# two\n/* three\nfour */ 2"),
            vec![Token::Number(1.0), Token::Number(2.0)]
        );
    }

    #[test]
    fn test_error_token_does_not_abort() {
        let tokens = lex("1 @ 2 $");
        assert_eq!(
            tokens,
            vec![
                Token::Number(1.0),
                Token::Error("@".to_owned()),
                Token::Number(2.0),
                Token::Error("$".to_owned()),
            ]
        );
    }

    #[test]
    fn test_line_index() {
        let index = LineIndex::new("ab\ncd\nef");
        assert_eq!(index.line_col(0), (1, 1));
        assert_eq!(index.line_col(4), (2, 2));
        assert_eq!(index.line_col(6), (3, 1));
    }
}
