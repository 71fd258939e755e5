//! Syntax highlighter for the REPL: implements rustyline's `Highlighter`
//! trait to colorize Lissp's reader syntax (parens, quote sigils, strings,
//! numbers, and the reserved special-form names) without touching the
//! line's display width.

use rustyline::completion::Completer;
use rustyline::highlight::{CmdKind, Highlighter};
use rustyline::hint::Hinter;
use rustyline::validate::Validator;
use rustyline::Helper;
use std::borrow::Cow;

const COLOR_RESET: &str = "\x1b[0m";
const COLOR_PARENS: &str = "\x1b[1;34m";
const COLOR_SPECIAL_FORM: &str = "\x1b[1;35m";
const COLOR_NUMBER: &str = "\x1b[33m";
const COLOR_STRING: &str = "\x1b[32m";
const COLOR_COMMENT: &str = "\x1b[90m";
const COLOR_QUOTE: &str = "\x1b[1;33m";

pub struct LisspHelper;

impl LisspHelper {
    pub fn new() -> Self {
        LisspHelper
    }
}

impl Default for LisspHelper {
    fn default() -> Self {
        Self::new()
    }
}

impl Helper for LisspHelper {}

impl Completer for LisspHelper {
    type Candidate = String;
}

impl Hinter for LisspHelper {
    type Hint = String;
}

impl Validator for LisspHelper {}

impl Highlighter for LisspHelper {
    fn highlight<'l>(&self, line: &'l str, _pos: usize) -> Cow<'l, str> {
        let highlighted = highlight_line(line);
        if highlighted == line {
            Cow::Borrowed(line)
        } else {
            Cow::Owned(highlighted)
        }
    }

    fn highlight_char(&self, _line: &str, _pos: usize, _kind: CmdKind) -> bool {
        true
    }
}

fn highlight_line(line: &str) -> String {
    let chars: Vec<char> = line.chars().collect();
    let mut out = String::new();
    let mut i = 0;

    while i < chars.len() {
        match chars[i] {
            ';' => {
                out.push_str(COLOR_COMMENT);
                while i < chars.len() && chars[i] != '\n' {
                    out.push(chars[i]);
                    i += 1;
                }
                out.push_str(COLOR_RESET);
            }
            '"' => {
                out.push_str(COLOR_STRING);
                out.push('"');
                i += 1;
                while i < chars.len() {
                    if chars[i] == '\\' && i + 1 < chars.len() {
                        out.push(chars[i]);
                        out.push(chars[i + 1]);
                        i += 2;
                    } else if chars[i] == '"' {
                        out.push('"');
                        i += 1;
                        break;
                    } else {
                        out.push(chars[i]);
                        i += 1;
                    }
                }
                out.push_str(COLOR_RESET);
            }
            '(' | ')' | '[' | ']' | '{' | '}' => {
                out.push_str(COLOR_PARENS);
                out.push(chars[i]);
                i += 1;
                out.push_str(COLOR_RESET);
            }
            '\'' | '`' => {
                out.push_str(COLOR_QUOTE);
                out.push(chars[i]);
                i += 1;
                out.push_str(COLOR_RESET);
            }
            ',' => {
                out.push_str(COLOR_QUOTE);
                out.push(',');
                i += 1;
                if i < chars.len() && chars[i] == '@' {
                    out.push('@');
                    i += 1;
                }
                out.push_str(COLOR_RESET);
            }
            c if c.is_whitespace() => {
                out.push(c);
                i += 1;
            }
            _ => {
                let start = i;
                while i < chars.len() && !is_delimiter(chars[i]) {
                    i += 1;
                }
                let token: String = chars[start..i].iter().collect();
                if is_number(&token) {
                    out.push_str(COLOR_NUMBER);
                    out.push_str(&token);
                    out.push_str(COLOR_RESET);
                } else if is_reserved(&token) {
                    out.push_str(COLOR_SPECIAL_FORM);
                    out.push_str(&token);
                    out.push_str(COLOR_RESET);
                } else {
                    out.push_str(&token);
                }
            }
        }
    }
    out
}

fn is_delimiter(c: char) -> bool {
    c.is_whitespace() || matches!(c, '(' | ')' | '[' | ']' | '{' | '}' | '"' | ';' | '\'' | '`' | ',')
}

fn is_reserved(token: &str) -> bool {
    crate::form::is_reserved(token) || token == ":" || token == ":*" || token == ":**" || token == ":?"
}

fn is_number(token: &str) -> bool {
    crate::lexer::parse_number(token).is_some()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numbers_are_colored() {
        assert!(highlight_line("42").contains(COLOR_NUMBER));
    }

    #[test]
    fn strings_are_colored() {
        assert!(highlight_line("\"hi\"").contains(COLOR_STRING));
    }

    #[test]
    fn comments_are_colored() {
        assert!(highlight_line("; note").contains(COLOR_COMMENT));
    }

    #[test]
    fn reserved_words_are_colored() {
        assert!(highlight_line("(lambda (x) x)").contains(COLOR_SPECIAL_FORM));
        assert!(highlight_line("(lambda (x) x)").contains(COLOR_PARENS));
    }

    #[test]
    fn quote_sigils_are_colored() {
        assert!(highlight_line("'(1 2)").contains(COLOR_QUOTE));
        assert!(highlight_line("`(1 ,x)").contains(COLOR_QUOTE));
    }
}
