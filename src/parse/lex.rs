use std::{collections::VecDeque, fmt, num::IntErrorKind};

use logos::{skip, Lexer, Logos, Span};

use crate::{
    error::SourceErrorKind,
    lines::LineResolver,
    tree::{Scalar, Specifier},
};

/// Tokens as recognized by the lexer, before identifiers are classified.
#[derive(Debug, Clone, Logos, PartialEq)]
#[logos(extras = TokenExtras)]
#[logos(skip r"[\t\v\f\r\n ]+")]
#[logos(subpattern exponent = r"[eE][+\-]?[0-9]+")]
enum RawToken<'a> {
    #[regex("[A-Za-z_][A-Za-z0-9_]*")]
    Ident(&'a str),
    #[regex("0", |_| 0u64)]
    #[regex("0[0-7]+", |lex| int(lex, 8, 1))]
    #[regex("[1-9][0-9]*", |lex| int(lex, 10, 0))]
    #[regex("0[xX][0-9A-Fa-f]+", |lex| int(lex, 16, 2))]
    IntLiteral(u64),
    #[regex(r#"[0-9]+\.[0-9]*(?&exponent)?"#, float)]
    #[regex(r#"[0-9]+(?&exponent)"#, float)]
    #[regex(r#"\.[0-9]+(?&exponent)?"#, float)]
    FloatLiteral(f64),
    #[regex(r#"'|""#, string)]
    StringLiteral(String),
    #[token(".")]
    Dot,
    #[token("-")]
    Minus,
    #[token("+")]
    Plus,
    #[token("(")]
    LeftParen,
    #[token(")")]
    RightParen,
    #[token("{")]
    LeftBrace,
    #[token("}")]
    RightBrace,
    #[token("[")]
    LeftBracket,
    #[token("]")]
    RightBracket,
    #[token("<")]
    LeftAngle,
    #[token(">")]
    RightAngle,
    #[token(",")]
    Comma,
    #[token("=")]
    Equals,
    #[token(";")]
    Semicolon,
    #[regex(r"//[^\n]*", skip)]
    LineComment,
    #[token("/*", block_comment)]
    BlockComment,
}

#[derive(Debug, Default)]
struct TokenExtras {
    error: Option<SourceErrorKind>,
}

/// Words that are never identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Keyword {
    Syntax,
    Package,
    Import,
    Public,
    Weak,
    Option,
    Message,
    Enum,
    Extend,
    Reserved,
    Extensions,
    To,
    Max,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Punct {
    Equals,
    Semicolon,
    LeftBrace,
    RightBrace,
    LeftBracket,
    RightBracket,
    LeftAngle,
    RightAngle,
    LeftParen,
    RightParen,
    Dot,
    Comma,
    Minus,
    Plus,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum TokenKind {
    Keyword(Keyword),
    Ident,
    DataType(Scalar),
    Specifier(Specifier),
    Int(u64),
    Float(f64),
    String(String),
    Bool(bool),
    Punct(Punct),
    Eof,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Token<'a> {
    pub kind: TokenKind,
    pub text: &'a str,
    pub span: Span,
    pub line: usize,
    pub column: usize,
}

/// Produces classified tokens with unbounded lookahead.
///
/// Identifiers are reclassified by membership in fixed word sets, checked in this order:
/// `true`/`false`, [`Keyword`]s, [`Specifier`]s, then [`Scalar`] type names. A word found in any
/// of these sets is never an identifier, regardless of where it appears.
pub(crate) struct Scanner<'a> {
    lexer: Lexer<'a, RawToken<'a>>,
    lines: LineResolver,
    queue: VecDeque<Token<'a>>,
    done: bool,
}

impl<'a> Scanner<'a> {
    pub fn new(source: &'a str) -> Self {
        Scanner {
            lexer: RawToken::lexer(source),
            lines: LineResolver::new(source),
            queue: VecDeque::new(),
            done: false,
        }
    }

    /// Returns the `n`th unconsumed token. Past the end of input, this is always the end-of-input token.
    pub fn peek(&mut self, n: usize) -> Result<&Token<'a>, SourceErrorKind> {
        self.fill(n)?;
        let index = n.min(self.queue.len() - 1);
        Ok(&self.queue[index])
    }

    /// Consumes the next token. The end-of-input token can't be consumed.
    pub fn pop(&mut self) -> Result<Token<'a>, SourceErrorKind> {
        self.fill(0)?;
        match self.queue.pop_front() {
            Some(token) if token.kind != TokenKind::Eof => Ok(token),
            Some(eof) => {
                let span = eof.span.clone();
                self.queue.push_front(eof);
                Err(SourceErrorKind::UnexpectedEof {
                    rule: "input",
                    expected: "another token".to_owned(),
                    span,
                })
            }
            None => unreachable!("scanner queue is never empty after fill"),
        }
    }

    fn fill(&mut self, n: usize) -> Result<(), SourceErrorKind> {
        while self.queue.len() <= n && !self.done {
            let (kind, span, text) = match self.lexer.next() {
                None => {
                    self.done = true;
                    let end = self.lexer.source().len();
                    (TokenKind::Eof, end..end, "")
                }
                Some(Ok(RawToken::BlockComment)) => continue,
                Some(Ok(token)) => (classify(token), self.lexer.span(), self.lexer.slice()),
                Some(Err(())) => return Err(self.lex_error()),
            };

            let (line, column) = self.lines.resolve(span.start);
            self.queue.push_back(Token {
                kind,
                text,
                span,
                line,
                column,
            });
        }
        Ok(())
    }

    fn lex_error(&mut self) -> SourceErrorKind {
        if let Some(err) = self.lexer.extras.error.take() {
            return err;
        }

        let start = self.lexer.span().start;
        let character = self.lexer.source()[start..]
            .chars()
            .next()
            .unwrap_or(char::REPLACEMENT_CHARACTER);
        SourceErrorKind::InvalidToken {
            character,
            span: start..start + character.len_utf8(),
        }
    }
}

fn classify(token: RawToken<'_>) -> TokenKind {
    match token {
        RawToken::Ident(word) => classify_word(word),
        RawToken::IntLiteral(value) => TokenKind::Int(value),
        RawToken::FloatLiteral(value) => TokenKind::Float(value),
        RawToken::StringLiteral(value) => TokenKind::String(value),
        RawToken::Dot => TokenKind::Punct(Punct::Dot),
        RawToken::Minus => TokenKind::Punct(Punct::Minus),
        RawToken::Plus => TokenKind::Punct(Punct::Plus),
        RawToken::LeftParen => TokenKind::Punct(Punct::LeftParen),
        RawToken::RightParen => TokenKind::Punct(Punct::RightParen),
        RawToken::LeftBrace => TokenKind::Punct(Punct::LeftBrace),
        RawToken::RightBrace => TokenKind::Punct(Punct::RightBrace),
        RawToken::LeftBracket => TokenKind::Punct(Punct::LeftBracket),
        RawToken::RightBracket => TokenKind::Punct(Punct::RightBracket),
        RawToken::LeftAngle => TokenKind::Punct(Punct::LeftAngle),
        RawToken::RightAngle => TokenKind::Punct(Punct::RightAngle),
        RawToken::Comma => TokenKind::Punct(Punct::Comma),
        RawToken::Equals => TokenKind::Punct(Punct::Equals),
        RawToken::Semicolon => TokenKind::Punct(Punct::Semicolon),
        RawToken::LineComment | RawToken::BlockComment => {
            unreachable!("comments are skipped by the scanner")
        }
    }
}

fn classify_word(word: &str) -> TokenKind {
    match word {
        "true" => return TokenKind::Bool(true),
        "false" => return TokenKind::Bool(false),
        _ => (),
    }

    if let Some(keyword) = Keyword::from_word(word) {
        TokenKind::Keyword(keyword)
    } else if let Some(specifier) = Specifier::from_name(word) {
        TokenKind::Specifier(specifier)
    } else if let Some(scalar) = Scalar::from_name(word) {
        TokenKind::DataType(scalar)
    } else {
        TokenKind::Ident
    }
}

impl Keyword {
    fn from_word(word: &str) -> Option<Self> {
        Some(match word {
            "syntax" => Keyword::Syntax,
            "package" => Keyword::Package,
            "import" => Keyword::Import,
            "public" => Keyword::Public,
            "weak" => Keyword::Weak,
            "option" => Keyword::Option,
            "message" => Keyword::Message,
            "enum" => Keyword::Enum,
            "extend" => Keyword::Extend,
            "reserved" => Keyword::Reserved,
            "extensions" => Keyword::Extensions,
            "to" => Keyword::To,
            "max" => Keyword::Max,
            _ => return None,
        })
    }
}

impl TokenKind {
    /// The word class of a token that is spelled like an identifier but is never one.
    pub fn reserved_class(&self) -> Option<&'static str> {
        match self {
            TokenKind::Keyword(_) => Some("keyword"),
            TokenKind::Specifier(_) => Some("specifier"),
            TokenKind::DataType(_) => Some("type name"),
            TokenKind::Bool(_) => Some("literal"),
            _ => None,
        }
    }
}

impl fmt::Display for Punct {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Punct::Equals => "=",
            Punct::Semicolon => ";",
            Punct::LeftBrace => "{",
            Punct::RightBrace => "}",
            Punct::LeftBracket => "[",
            Punct::RightBracket => "]",
            Punct::LeftAngle => "<",
            Punct::RightAngle => ">",
            Punct::LeftParen => "(",
            Punct::RightParen => ")",
            Punct::Dot => ".",
            Punct::Comma => ",",
            Punct::Minus => "-",
            Punct::Plus => "+",
        })
    }
}

fn int<'a>(lex: &mut Lexer<'a, RawToken<'a>>, radix: u32, prefix_len: usize) -> Result<u64, ()> {
    let span = lex.span().start + prefix_len..lex.span().end;
    match u64::from_str_radix(&lex.source()[span.clone()], radix) {
        Ok(value) => Ok(value),
        Err(err) => {
            debug_assert_eq!(err.kind(), &IntErrorKind::PosOverflow);
            lex.extras.error = Some(SourceErrorKind::IntegerOutOfRange { span: lex.span() });
            Err(())
        }
    }
}

fn float<'a>(lex: &mut Lexer<'a, RawToken<'a>>) -> Result<f64, ()> {
    lex.slice().parse().map_err(drop)
}

fn string<'a>(lex: &mut Lexer<'a, RawToken<'a>>) -> Result<String, ()> {
    let terminator = lex.slice().as_bytes()[0];
    let start = lex.span().start;
    let mut bytes = Vec::new();
    let mut chars = lex.remainder().char_indices().peekable();

    let len = loop {
        let (index, ch) = match chars.next() {
            Some(next) => next,
            None => {
                lex.extras.error = Some(SourceErrorKind::UnterminatedString {
                    span: start..lex.span().end,
                });
                return Err(());
            }
        };

        match ch {
            '\n' => {
                lex.extras.error = Some(SourceErrorKind::UnterminatedString {
                    span: start..lex.span().end + index,
                });
                return Err(());
            }
            '\\' => {
                let escape_start = lex.span().end + index;
                let byte = match chars.next() {
                    Some((_, 'a')) => Some(b'\x07'),
                    Some((_, 'b')) => Some(b'\x08'),
                    Some((_, 'f')) => Some(b'\x0c'),
                    Some((_, 'n')) => Some(b'\n'),
                    Some((_, 'r')) => Some(b'\r'),
                    Some((_, 't')) => Some(b'\t'),
                    Some((_, 'v')) => Some(b'\x0b'),
                    Some((_, c @ ('?' | '\\' | '\'' | '"'))) => Some(c as u8),
                    Some((_, 'x' | 'X')) => digits(&mut chars, 16, 2),
                    Some((_, c @ '0'..='7')) => octal(c, &mut chars),
                    _ => None,
                };
                match byte {
                    Some(byte) => bytes.push(byte),
                    None => {
                        let end = chars
                            .peek()
                            .map_or(lex.source().len(), |&(i, _)| lex.span().end + i);
                        lex.extras.error =
                            Some(SourceErrorKind::InvalidStringEscape { span: escape_start..end });
                        return Err(());
                    }
                }
            }
            ch if ch as u32 == terminator as u32 => break index + 1,
            ch => {
                let mut buf = [0; 4];
                bytes.extend_from_slice(ch.encode_utf8(&mut buf).as_bytes());
            }
        }
    };

    lex.bump(len);
    String::from_utf8(bytes).map_err(|_| {
        lex.extras.error = Some(SourceErrorKind::InvalidStringEscape { span: lex.span() });
    })
}

fn digits(
    chars: &mut std::iter::Peekable<std::str::CharIndices<'_>>,
    radix: u32,
    max: usize,
) -> Option<u8> {
    let mut value: u32 = 0;
    let mut count = 0;
    while count < max {
        match chars.peek().and_then(|&(_, c)| c.to_digit(radix)) {
            Some(digit) => {
                value = value * radix + digit;
                count += 1;
                chars.next();
            }
            None => break,
        }
    }
    if count == 0 {
        None
    } else {
        u8::try_from(value).ok()
    }
}

/// Octal escapes are at most three digits and must fit in a byte.
fn octal(first: char, chars: &mut std::iter::Peekable<std::str::CharIndices<'_>>) -> Option<u8> {
    let mut value = first.to_digit(8)?;
    for _ in 0..2 {
        match chars.peek().and_then(|&(_, c)| c.to_digit(8)) {
            Some(digit) => {
                value = value * 8 + digit;
                chars.next();
            }
            None => break,
        }
    }
    u8::try_from(value).ok()
}

fn block_comment<'a>(lex: &mut Lexer<'a, RawToken<'a>>) -> bool {
    match lex.remainder().find("*/") {
        Some(end) => {
            lex.bump(end + 2);
            true
        }
        None => {
            lex.extras.error = Some(SourceErrorKind::UnterminatedComment { span: lex.span() });
            lex.bump(lex.remainder().len());
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        let mut scanner = Scanner::new(source);
        let mut result = Vec::new();
        while scanner.peek(0).unwrap().kind != TokenKind::Eof {
            result.push(scanner.pop().unwrap().kind);
        }
        result
    }

    #[test]
    fn simple_message() {
        assert_eq!(
            kinds("message Foo { optional int32 x = 1; }"),
            vec![
                TokenKind::Keyword(Keyword::Message),
                TokenKind::Ident,
                TokenKind::Punct(Punct::LeftBrace),
                TokenKind::Specifier(Specifier::Optional),
                TokenKind::DataType(Scalar::Int32),
                TokenKind::Ident,
                TokenKind::Punct(Punct::Equals),
                TokenKind::Int(1),
                TokenKind::Punct(Punct::Semicolon),
                TokenKind::Punct(Punct::RightBrace),
            ]
        );
    }

    #[test]
    fn reserved_words_take_precedence() {
        assert_eq!(
            kinds("max to reserved_ map true bytes"),
            vec![
                TokenKind::Keyword(Keyword::Max),
                TokenKind::Keyword(Keyword::To),
                TokenKind::Ident,
                TokenKind::Specifier(Specifier::Map),
                TokenKind::Bool(true),
                TokenKind::DataType(Scalar::Bytes),
            ]
        );
    }

    #[test]
    fn numbers() {
        assert_eq!(
            kinds("0 0x1F 017 1.5 1e3 .5"),
            vec![
                TokenKind::Int(0),
                TokenKind::Int(31),
                TokenKind::Int(15),
                TokenKind::Float(1.5),
                TokenKind::Float(1000.0),
                TokenKind::Float(0.5),
            ]
        );
    }

    #[test]
    fn strings() {
        assert_eq!(
            kinds(r#"'a\n\x41\101"b' "é""#),
            vec![
                TokenKind::String("a\nAA\"b".to_owned()),
                TokenKind::String("é".to_owned()),
            ]
        );
    }

    #[test]
    fn comments_span_lines() {
        let mut scanner = Scanner::new("/* a\n b */\n  foo // c\nbar");

        let foo = scanner.pop().unwrap();
        assert_eq!(foo.text, "foo");
        assert_eq!((foo.line, foo.column), (3, 3));

        let bar = scanner.pop().unwrap();
        assert_eq!(bar.text, "bar");
        assert_eq!((bar.line, bar.column), (4, 1));

        assert_eq!(scanner.peek(0).unwrap().kind, TokenKind::Eof);
    }

    #[test]
    fn lookahead() {
        let mut scanner = Scanner::new("a . b");
        assert_eq!(scanner.peek(2).unwrap().text, "b");
        assert_eq!(scanner.peek(0).unwrap().text, "a");
        assert_eq!(scanner.pop().unwrap().text, "a");
        assert_eq!(scanner.peek(1).unwrap().text, "b");
        assert_eq!(scanner.peek(7).unwrap().kind, TokenKind::Eof);
    }

    #[test]
    fn pop_after_end_of_input() {
        let mut scanner = Scanner::new("a");
        scanner.pop().unwrap();
        assert_eq!(
            scanner.pop().unwrap_err(),
            SourceErrorKind::UnexpectedEof {
                rule: "input",
                expected: "another token".to_owned(),
                span: 1..1,
            }
        );
        assert_eq!(scanner.peek(0).unwrap().kind, TokenKind::Eof);
    }

    #[test]
    fn invalid_character() {
        let mut scanner = Scanner::new("message $");
        assert_eq!(
            scanner.peek(0).unwrap().kind,
            TokenKind::Keyword(Keyword::Message)
        );
        assert_eq!(
            scanner.peek(1).unwrap_err(),
            SourceErrorKind::InvalidToken {
                character: '$',
                span: 8..9,
            }
        );
    }

    #[test]
    fn unterminated_comment() {
        let mut scanner = Scanner::new("foo /* bar");
        assert_eq!(scanner.pop().unwrap().text, "foo");
        assert_eq!(
            scanner.peek(0).unwrap_err(),
            SourceErrorKind::UnterminatedComment { span: 4..6 }
        );
    }

    #[test]
    fn unterminated_string() {
        let mut scanner = Scanner::new("\"abc\ndef\"");
        assert_eq!(
            scanner.peek(0).unwrap_err(),
            SourceErrorKind::UnterminatedString { span: 0..4 }
        );
    }

    #[test]
    fn integer_out_of_range() {
        let mut scanner = Scanner::new("99999999999999999999");
        assert_eq!(
            scanner.peek(0).unwrap_err(),
            SourceErrorKind::IntegerOutOfRange { span: 0..20 }
        );
    }

    proptest! {
        #[test]
        fn scan_terminates(source in "[ -~\n]{0,256}") {
            let mut scanner = Scanner::new(&source);
            for _ in 0..=source.len() {
                match scanner.peek(0) {
                    Ok(token) if token.kind == TokenKind::Eof => break,
                    Ok(_) => {
                        scanner.pop().unwrap();
                    }
                    Err(_) => break,
                }
            }
        }
    }
}
