//! The tree-level data model: [`Form`], its [`Atom`] leaves, and the
//! canonical printer.

use std::fmt;

/// A parsed host literal: the value of a bare numeric token, or of a
/// bracket/brace token recognized as host-literal syntax (`[1,2,3]`,
/// `{1: 2}`). Lists and dicts keep their elements as `HostLit` too, so that
/// numeric sub-elements still get the emitter's numeric-atom treatment.
#[derive(Debug, Clone, PartialEq)]
pub enum HostLit {
    Int(i64),
    Float(f64),
    Complex(f64, f64),
    /// Already-host-literal text for a string sub-element, e.g. `'5'`.
    Str(String),
    List(Vec<HostLit>),
    Dict(Vec<(HostLit, HostLit)>),
}

impl fmt::Display for HostLit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HostLit::Int(n) => write!(f, "{n}"),
            HostLit::Float(x) => {
                if x.fract() == 0.0 && x.is_finite() {
                    write!(f, "{x:.1}")
                } else {
                    write!(f, "{x}")
                }
            }
            HostLit::Complex(re, im) => {
                if *re == 0.0 {
                    write!(f, "{im}j")
                } else {
                    write!(f, "({re}+{im}j)")
                }
            }
            HostLit::Str(s) => write!(f, "{s}"),
            HostLit::List(items) => {
                write!(f, "[")?;
                for (i, it) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{it}")?;
                }
                write!(f, "]")
            }
            HostLit::Dict(pairs) => {
                write!(f, "{{")?;
                for (i, (k, v)) in pairs.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{k}: {v}")?;
                }
                write!(f, "}}")
            }
        }
    }
}

/// A leaf of the form tree.
///
/// `Str` is the unified string atom described in the data model: the same
/// representation serves both as an identifier-shaped atom (a symbol, a
/// qualified symbol, a method symbol, or a host literal string already in
/// source syntax) and, under a `quote` head, as opaque payload data. Which
/// role applies is determined entirely by where the atom sits in the tree,
/// never by a tag on the atom itself.
#[derive(Debug, Clone, PartialEq)]
pub enum Atom {
    Str(String),
    Lit(HostLit),
}

/// A Hissp form: either an atom, or an ordered, immutable tuple of forms.
/// A tuple is a function call when evaluated and opaque data when quoted;
/// `Tuple(vec![])` is the empty-tuple unit value.
#[derive(Debug, Clone, PartialEq)]
pub enum Form {
    Atom(Atom),
    Tuple(Vec<Form>),
}

impl Form {
    pub fn sym(s: impl Into<String>) -> Form {
        Form::Atom(Atom::Str(s.into()))
    }

    pub fn int(n: i64) -> Form {
        Form::Atom(Atom::Lit(HostLit::Int(n)))
    }

    pub fn tuple(items: Vec<Form>) -> Form {
        Form::Tuple(items)
    }

    pub fn as_sym(&self) -> Option<&str> {
        match self {
            Form::Atom(Atom::Str(s)) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn as_tuple(&self) -> Option<&[Form]> {
        match self {
            Form::Tuple(items) => Some(items),
            _ => None,
        }
    }

    /// True if this tuple's head is the symbol `name` (used throughout the
    /// reader and expander to recognize `quote`, `lambda`, `unquote`, etc).
    pub fn is_headed(&self, name: &str) -> bool {
        matches!(self.as_tuple(), Some(items) if matches!(items.first().and_then(Form::as_sym), Some(h) if h == name))
    }
}

/// True if `s` begins with `.` and has no further dots: a method symbol,
/// read as `(.method obj args...)` -> `obj.method(args...)`.
pub fn is_method_symbol(s: &str) -> bool {
    s.len() > 1 && s.starts_with('.') && !s[1..].contains('.')
}

/// Split a qualified symbol `PACKAGE..NAME` on its first `..`.
pub fn split_qualified(s: &str) -> Option<(&str, &str)> {
    s.find("..").map(|i| (&s[..i], &s[i + 2..]))
}

pub fn is_qualified(s: &str) -> bool {
    split_qualified(s).is_some()
}

/// Symbols the reader's qualification pass must never rewrite.
pub const RESERVED: &[&str] = &["quote", "lambda", "unquote", "unquote-splicing", "quasiquote"];

pub fn is_reserved(s: &str) -> bool {
    RESERVED.contains(&s)
}

/// Gensym symbols are rewritten once at read time to `_Qz<hash>z_<name>`;
/// re-qualifying them would be both wrong and idempotency-breaking.
pub const GENSYM_PREFIX: &str = "_Qz";

pub fn is_gensym(s: &str) -> bool {
    s.starts_with(GENSYM_PREFIX)
}

impl fmt::Display for Form {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Form::Atom(Atom::Lit(lit)) => write!(f, "{lit}"),
            Form::Atom(Atom::Str(s)) => write!(f, "{}", print_string_atom(s)),
            Form::Tuple(items) => {
                write!(f, "(")?;
                for (i, it) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, " ")?;
                    }
                    write!(f, "{it}")?;
                }
                write!(f, ")")
            }
        }
    }
}

/// Best-effort reconstruction of a readable Lissp token for a string atom.
/// Demunges escape words when present (the atom is almost certainly a
/// munged symbol); otherwise prints the raw text, falling back to a quoted
/// Lissp string literal when the text contains characters a bare symbol
/// token could not.
fn print_string_atom(s: &str) -> String {
    let demunged = crate::munge::demunge(s);
    if demunged != s {
        return demunged;
    }
    let needs_quoting = s.is_empty()
        || s.chars().any(|c| c.is_whitespace() || c == '(' || c == ')');
    if needs_quoting {
        format!("{s:?}")
    } else {
        s.to_string()
    }
}
