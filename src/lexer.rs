//! Tokenizer: turns source text into a restartable stream of [`Token`]s.
//!
//! Numeric and bracket-literal sub-parsing uses `nom`, in the same style as
//! a conventional recursive-descent combinator parser; token boundaries
//! (whitespace, comments, balanced brackets, reader-macro dispatch) are
//! scanned by hand since they depend on running lexer state (position).

use crate::error::LexError;
use crate::form::HostLit;
use crate::span::{Position, Span};
use nom::{
    branch::alt,
    bytes::complete::tag,
    character::complete::{char, digit1},
    combinator::{opt, recognize},
    sequence::{pair, preceded},
    IResult,
};

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    LParen,
    RParen,
    Quote,
    Backtick,
    Comma,
    CommaAt,
    /// Unescaped content of a `"..."` string literal.
    Str(String),
    /// Verbatim text of a `[...]`/`{...}` bracket-literal token.
    Bracket(String),
    /// Any other contiguous non-whitespace run: a symbol, a bare number, or
    /// (if it ends in `#`) a reader-macro dispatch prefix.
    Raw(String),
}

pub struct Lexer<'a> {
    src: &'a str,
    chars: Vec<char>,
    idx: usize,
    pos: Position,
}

impl<'a> Lexer<'a> {
    pub fn new(src: &'a str) -> Self {
        Lexer { src, chars: src.chars().collect(), idx: 0, pos: Position::start() }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.idx).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.idx + offset).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let ch = self.peek()?;
        self.idx += 1;
        self.pos.advance(ch);
        Some(ch)
    }

    fn skip_trivia(&mut self) {
        loop {
            match self.peek() {
                Some(c) if c.is_whitespace() => {
                    self.bump();
                }
                Some(';') => {
                    while let Some(c) = self.peek() {
                        if c == '\n' {
                            break;
                        }
                        self.bump();
                    }
                }
                _ => break,
            }
        }
    }

    pub fn position(&self) -> Position {
        self.pos
    }

    /// Pull the next token, or `None` at end of input.
    pub fn next_token(&mut self) -> Result<Option<(Token, Span)>, (LexError, Span)> {
        self.skip_trivia();
        let start = self.pos;
        let Some(ch) = self.peek() else { return Ok(None) };

        let tok = match ch {
            '(' => {
                self.bump();
                Token::LParen
            }
            ')' => {
                self.bump();
                Token::RParen
            }
            '\'' => {
                self.bump();
                Token::Quote
            }
            '`' => {
                self.bump();
                Token::Backtick
            }
            ',' => {
                self.bump();
                if self.peek() == Some('@') {
                    self.bump();
                    Token::CommaAt
                } else {
                    Token::Comma
                }
            }
            '"' => {
                self.bump();
                let s = self.scan_string(start)?;
                Token::Str(s)
            }
            '[' | '{' => {
                let s = self.scan_bracket(start)?;
                Token::Bracket(s)
            }
            _ => Token::Raw(self.scan_raw()),
        };
        let end = self.pos;
        Ok(Some((tok, Span::new(start, end))))
    }

    fn scan_string(&mut self, start: Position) -> Result<String, (LexError, Span)> {
        let mut out = String::new();
        loop {
            match self.bump() {
                None => return Err((LexError::UnterminatedString, Span::new(start, self.pos))),
                Some('"') => return Ok(out),
                Some('\\') => match self.bump() {
                    Some('n') => out.push('\n'),
                    Some('t') => out.push('\t'),
                    Some('r') => out.push('\r'),
                    Some('"') => out.push('"'),
                    Some('\\') => out.push('\\'),
                    Some(other) => return Err((LexError::BadEscape(other), Span::new(start, self.pos))),
                    None => return Err((LexError::UnterminatedString, Span::new(start, self.pos))),
                },
                Some(c) => out.push(c),
            }
        }
    }

    /// Scan a balanced `[...]`/`{...}` token, forbidding raw whitespace
    /// outside of a nested string literal (a bracket-literal must be a
    /// single token with no interior whitespace).
    fn scan_bracket(&mut self, start: Position) -> Result<String, (LexError, Span)> {
        let mut out = String::new();
        let mut depth: i32 = 0;
        let mut in_string = false;
        loop {
            let Some(c) = self.peek() else {
                return Err((LexError::UnbalancedBracket, Span::new(start, self.pos)));
            };
            if in_string {
                out.push(c);
                self.bump();
                if c == '\\' {
                    if let Some(next) = self.bump() {
                        out.push(next);
                    }
                } else if c == '\'' {
                    in_string = false;
                }
                continue;
            }
            match c {
                '[' | '{' => {
                    depth += 1;
                    out.push(c);
                    self.bump();
                }
                ']' | '}' => {
                    depth -= 1;
                    out.push(c);
                    self.bump();
                    if depth == 0 {
                        return Ok(out);
                    }
                }
                '\'' => {
                    in_string = true;
                    out.push(c);
                    self.bump();
                }
                c if c.is_whitespace() => {
                    return Err((LexError::UnbalancedBracket, Span::new(start, self.pos)));
                }
                _ => {
                    out.push(c);
                    self.bump();
                }
            }
        }
    }

    /// Scan a symbol/number/dispatch-prefix token: a contiguous run of
    /// non-whitespace, non-delimiter characters, stopping immediately after
    /// a bare `#` (the reader-macro dispatch boundary).
    fn scan_raw(&mut self) -> String {
        let mut out = String::new();
        loop {
            match self.peek() {
                None => break,
                Some(c) if c.is_whitespace() => break,
                Some('(') | Some(')') | Some('\'') | Some('`') | Some('"') => break,
                Some(',') if out.is_empty() => break,
                Some('#') => {
                    out.push(c);
                    self.bump();
                    break;
                }
                Some(c) => {
                    out.push(c);
                    self.bump();
                }
            }
        }
        out
    }
}

// --- Host-literal sub-parser (numbers and bracket containers) ----------

fn int_digits(input: &str) -> IResult<&str, &str> {
    recognize(pair(opt(char('-')), digit1))(input)
}

fn float_literal(input: &str) -> IResult<&str, &str> {
    recognize(pair(
        opt(char('-')),
        alt((
            recognize(pair(digit1, pair(char('.'), digit1))),
            recognize(pair(digit1, char('.'))),
            recognize(preceded(char('.'), digit1)),
        )),
    ))(input)
}

/// Try to parse `text` as a bare numeric host literal: `42`, `-3`, `.5`,
/// `3.`, or a `j`-suffixed imaginary literal like `2j`.
pub fn parse_number(text: &str) -> Option<HostLit> {
    if let Ok((rest, digits)) = recognize(pair(opt(alt((float_literal, int_digits))), tag::<_, _, nom::error::Error<&str>>("j")))(text) {
        if rest.is_empty() {
            let mag = &digits[..digits.len() - 1];
            let im: f64 = if mag.is_empty() || mag == "-" {
                if mag == "-" { -1.0 } else { 1.0 }
            } else {
                mag.parse().ok()?
            };
            return Some(HostLit::Complex(0.0, im));
        }
    }
    if let Ok((rest, m)) = float_literal(text) {
        if rest.is_empty() {
            return m.parse::<f64>().ok().map(HostLit::Float);
        }
    }
    if let Ok((rest, m)) = int_digits(text) {
        if rest.is_empty() {
            return m.parse::<i64>().ok().map(HostLit::Int);
        }
    }
    None
}

/// Parse verbatim bracket-literal text (e.g. `[4,'5',6]`) into structured
/// [`HostLit`] elements, so the emitter can apply numeric-atom wrapping to
/// nested numbers the same way it does for top-level atoms.
pub fn parse_bracket(text: &str) -> Option<HostLit> {
    let mut chars = text.chars().peekable();
    let opening = *chars.peek()?;
    let (open, close, is_dict) = match opening {
        '[' => ('[', ']', false),
        '{' => ('{', '}', true),
        _ => return None,
    };
    chars.next();
    let body = {
        let mut s: String = chars.collect();
        if !s.ends_with(close) {
            return None;
        }
        s.pop();
        s
    };
    let _ = open;
    let parts = split_top_level(&body, ',');
    if is_dict {
        let mut pairs = Vec::new();
        for part in parts {
            let part = part.trim();
            if part.is_empty() {
                continue;
            }
            let kv = split_top_level(part, ':');
            if kv.len() != 2 {
                return None;
            }
            pairs.push((parse_host_atom(kv[0].trim())?, parse_host_atom(kv[1].trim())?));
        }
        Some(HostLit::Dict(pairs))
    } else {
        let mut items = Vec::new();
        for part in parts {
            let part = part.trim();
            if part.is_empty() {
                continue;
            }
            items.push(parse_host_atom(part)?);
        }
        Some(HostLit::List(items))
    }
}

fn parse_host_atom(text: &str) -> Option<HostLit> {
    if let Some(n) = parse_number(text) {
        return Some(n);
    }
    if text.starts_with('\'') && text.ends_with('\'') && text.len() >= 2 {
        return Some(HostLit::Str(text.to_string()));
    }
    if text.starts_with('[') || text.starts_with('{') {
        return parse_bracket(text);
    }
    None
}

/// Split on `sep` at nesting depth 0, ignoring separators inside nested
/// brackets or single-quoted strings.
fn split_top_level(s: &str, sep: char) -> Vec<String> {
    let mut parts = Vec::new();
    let mut depth = 0i32;
    let mut in_str = false;
    let mut cur = String::new();
    let mut chars = s.chars().peekable();
    while let Some(c) = chars.next() {
        if in_str {
            cur.push(c);
            if c == '\'' {
                in_str = false;
            }
            continue;
        }
        match c {
            '\'' => {
                in_str = true;
                cur.push(c);
            }
            '[' | '{' => {
                depth += 1;
                cur.push(c);
            }
            ']' | '}' => {
                depth -= 1;
                cur.push(c);
            }
            c if c == sep && depth == 0 => {
                parts.push(std::mem::take(&mut cur));
            }
            c => cur.push(c),
        }
    }
    if !cur.is_empty() {
        parts.push(cur);
    }
    parts
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(src: &str) -> Vec<Token> {
        let mut lx = Lexer::new(src);
        let mut out = Vec::new();
        while let Some((t, _)) = lx.next_token().unwrap() {
            out.push(t);
        }
        out
    }

    #[test]
    fn parens_and_atoms() {
        assert_eq!(
            tokens("(+ 1 2)"),
            vec![
                Token::LParen,
                Token::Raw("+".into()),
                Token::Raw("1".into()),
                Token::Raw("2".into()),
                Token::RParen,
            ]
        );
    }

    #[test]
    fn sigils() {
        assert_eq!(tokens("'x"), vec![Token::Quote, Token::Raw("x".into())]);
        assert_eq!(tokens("`x"), vec![Token::Backtick, Token::Raw("x".into())]);
        assert_eq!(tokens(",x"), vec![Token::Comma, Token::Raw("x".into())]);
        assert_eq!(tokens(",@x"), vec![Token::CommaAt, Token::Raw("x".into())]);
    }

    #[test]
    fn dispatch_prefixes_split_from_following_form() {
        assert_eq!(tokens("$#foo"), vec![Token::Raw("$#".into()), Token::Raw("foo".into())]);
        assert_eq!(tokens("_#(1 2)"), vec![Token::Raw("_#".into()), Token::LParen, Token::Raw("1".into()), Token::Raw("2".into()), Token::RParen]);
        assert_eq!(tokens(".#x"), vec![Token::Raw(".#".into()), Token::Raw("x".into())]);
        assert_eq!(tokens("my#x"), vec![Token::Raw("my#".into()), Token::Raw("x".into())]);
    }

    #[test]
    fn comments_are_skipped() {
        assert_eq!(tokens("1 ; comment\n2"), vec![Token::Raw("1".into()), Token::Raw("2".into())]);
    }

    #[test]
    fn string_literal_unescapes() {
        assert_eq!(tokens(r#""a\nb""#), vec![Token::Str("a\nb".into())]);
    }

    #[test]
    fn unterminated_string_errors() {
        let mut lx = Lexer::new("\"abc");
        assert!(lx.next_token().is_err());
    }

    #[test]
    fn number_parsing() {
        assert_eq!(parse_number("42"), Some(HostLit::Int(42)));
        assert_eq!(parse_number("-42"), Some(HostLit::Int(-42)));
        assert_eq!(parse_number(".5"), Some(HostLit::Float(0.5)));
        assert_eq!(parse_number("3."), Some(HostLit::Float(3.0)));
        assert_eq!(parse_number("2j"), Some(HostLit::Complex(0.0, 2.0)));
        assert_eq!(parse_number("foo"), None);
    }

    #[test]
    fn bracket_literal_parsing() {
        let lit = parse_bracket("[4,'5',6]").unwrap();
        assert_eq!(lit, HostLit::List(vec![HostLit::Int(4), HostLit::Str("'5'".into()), HostLit::Int(6)]));
    }
}
