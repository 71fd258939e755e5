//! Recursive-descent reader: tokens -> [`Form`] tree.
//!
//! Handles the built-in reader macros (`'`, `` ` ``, `,`, `,@`, `_#`, `.#`,
//! `$#`) and dispatches bare `NAME#` prefixes to macros registered in the
//! module's reader-macro table. Quasiquote expansion happens here, at read
//! time, per the compiler's contract: a backtick template is read once and
//! turned directly into ordinary code, never into a special emitted form.

use crate::error::{CompileError, HostError, ReadError};
use crate::form::{self, Atom, Form, HostLit};
use crate::host::{form_to_host_value, host_value_to_form, HostValue};
use crate::lexer::{parse_bracket, parse_number, Lexer, Token};
use crate::module::Module;
use crate::span::Span;
use std::cell::RefCell;
use std::rc::Rc;

use crate::error::Phase;

/// A reader macro invoked for `.#form`: evaluates `form` at read time and
/// splices the resulting value back into the tree as a literal. Supplied by
/// the compiler, which alone knows how to run the full pipeline recursively.
pub type Injector<'a> = dyn Fn(&Form) -> Result<HostValue, HostError> + 'a;

pub struct Reader<'a> {
    lexer: Lexer<'a>,
    module: Rc<Module>,
    gensym_stack: RefCell<Vec<String>>,
    inject: Option<&'a Injector<'a>>,
}

impl<'a> Reader<'a> {
    pub fn new(src: &'a str, module: Rc<Module>, inject: Option<&'a Injector<'a>>) -> Self {
        Reader { lexer: Lexer::new(src), module, gensym_stack: RefCell::new(Vec::new()), inject }
    }

    fn next_token(&mut self) -> Result<Option<(Token, Span)>, CompileError> {
        self.lexer.next_token().map_err(|(e, s)| CompileError::new(Phase::Lex, s, e))
    }

    /// The lexer's current position: how much of the source text has been
    /// consumed so far. Used by callers (the REPL) that need to know where
    /// one top-level form ended within a larger buffer.
    pub fn position(&self) -> crate::span::Position {
        self.lexer.position()
    }

    /// Read one top-level form, or `None` at end of input.
    pub fn read_one(&mut self) -> Result<Option<Form>, CompileError> {
        let Some((tok, span)) = self.next_token()? else { return Ok(None) };
        self.read_from(tok, span).map(Some)
    }

    fn read_required(&mut self, after: Span) -> Result<Form, CompileError> {
        match self.read_one()? {
            Some(f) => Ok(f),
            None => Err(CompileError::new(Phase::Read, after, ReadError::EofInForm(after))),
        }
    }

    fn read_from(&mut self, tok: Token, span: Span) -> Result<Form, CompileError> {
        match tok {
            Token::RParen => Err(CompileError::new(Phase::Read, span, ReadError::UnexpectedClose)),
            Token::LParen => self.read_tuple(span),
            Token::Quote => {
                let inner = self.read_required(span)?;
                Ok(Form::tuple(vec![Form::sym("quote"), inner]))
            }
            Token::Comma => {
                let inner = self.read_required(span)?;
                Ok(Form::tuple(vec![Form::sym("unquote"), inner]))
            }
            Token::CommaAt => {
                let inner = self.read_required(span)?;
                Ok(Form::tuple(vec![Form::sym("unquote-splicing"), inner]))
            }
            Token::Backtick => {
                self.gensym_stack.borrow_mut().push(self.module.fresh_gensym_hash());
                let inner = self.read_required(span);
                self.gensym_stack.borrow_mut().pop();
                Ok(qq(&inner?, &self.module.name))
            }
            Token::Str(s) => Ok(Form::Atom(Atom::Lit(HostLit::Str(quote_host_string(&s))))),
            Token::Bracket(s) => match parse_bracket(&s) {
                Some(lit) => Ok(Form::Atom(Atom::Lit(lit))),
                None => Err(CompileError::new(Phase::Read, span, ReadError::BadReaderMacro(s))),
            },
            Token::Raw(s) => self.read_raw(&s, span),
        }
    }

    fn read_tuple(&mut self, open: Span) -> Result<Form, CompileError> {
        let mut items = Vec::new();
        loop {
            let Some((tok, span)) = self.next_token()? else {
                return Err(CompileError::new(Phase::Read, open, ReadError::EofInForm(open)));
            };
            if matches!(tok, Token::RParen) {
                return Ok(Form::tuple(items));
            }
            items.push(self.read_from(tok, span)?);
        }
    }

    fn read_raw(&mut self, s: &str, span: Span) -> Result<Form, CompileError> {
        if let Some(prefix) = s.strip_suffix('#').filter(|_| s != "#") {
            return self.read_dispatch(prefix, span);
        }
        if let Some(lit) = parse_number(s) {
            return Ok(Form::Atom(Atom::Lit(lit)));
        }
        Ok(Form::sym(s))
    }

    fn read_dispatch(&mut self, prefix: &str, span: Span) -> Result<Form, CompileError> {
        match prefix {
            "_" => {
                // discard macro: read and drop one form, then read the next
                // as the actual result of this position.
                self.read_required(span)?;
                self.read_required(span)
            }
            "." => {
                let form = self.read_required(span)?;
                let Some(inject) = self.inject else {
                    return Err(CompileError::new(Phase::Read, span, ReadError::BadReaderMacro(".#".into())));
                };
                let value = inject(&form).map_err(|e| CompileError::new(Phase::Host, span, e))?;
                host_value_to_form(&value).map_err(|e| CompileError::new(Phase::Read, span, e))
            }
            "$" => {
                let form = self.read_required(span)?;
                let name = form
                    .as_sym()
                    .ok_or_else(|| CompileError::new(Phase::Read, span, ReadError::BadReaderMacro("$#".into())))?;
                let hash = self
                    .gensym_stack
                    .borrow()
                    .last()
                    .cloned()
                    .unwrap_or_else(|| self.module.fresh_gensym_hash());
                Ok(Form::sym(format!("{}{}z_{}", form::GENSYM_PREFIX, hash, name)))
            }
            other => {
                let form = self.read_required(span)?;
                let Some(macro_fn) = self.module.get_reader_macro(other) else {
                    return Err(CompileError::new(Phase::Read, span, ReadError::UnknownReaderMacro(other.to_string())));
                };
                let arg = form_to_host_value(&form);
                let result = crate::host::call(macro_fn, &[arg], &[])
                    .map_err(|e| CompileError::new(Phase::Host, span, e))?;
                host_value_to_form(&result).map_err(|e| CompileError::new(Phase::Read, span, e))
            }
        }
    }
}

fn quote_host_string(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len() + 2);
    out.push('\'');
    for ch in raw.chars() {
        match ch {
            '\'' => out.push_str("\\'"),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            _ => out.push(ch),
        }
    }
    out.push('\'');
    out
}

/// The `(lambda (: :* xs) xs)` tuple constructor used to reassemble tuples
/// at runtime from a quasiquote template: a lambda that collects every
/// argument into `xs` and returns it unchanged, so calling it with spread
/// `:*` entries produces exactly the tuple those entries describe.
fn tuple_ctor() -> Form {
    Form::tuple(vec![
        Form::sym("lambda"),
        Form::tuple(vec![Form::sym(":"), Form::sym(":*"), Form::sym("xs")]),
        Form::sym("xs"),
    ])
}

fn wrap_single(item: Form) -> Form {
    Form::tuple(vec![tuple_ctor(), item])
}

/// Expand a quasiquote template into ordinary code. Each backtick is
/// expanded independently and immediately at read time; a backtick nested
/// inside another template's non-unquoted position is treated as a literal
/// tuple headed by the symbol `quasiquote`, not specially re-expanded, which
/// covers the common single-level macro-writing idiom this reader targets.
fn qq(form: &Form, module_name: &str) -> Form {
    match form {
        Form::Atom(Atom::Lit(_)) => form.clone(),
        Form::Atom(Atom::Str(s)) => {
            let name = if form::is_reserved(s) || form::is_method_symbol(s) || form::is_qualified(s) || form::is_gensym(s) {
                s.clone()
            } else {
                format!("{module_name}..{s}")
            };
            Form::tuple(vec![Form::sym("quote"), Form::sym(name)])
        }
        Form::Tuple(items) if form.is_headed("unquote") && items.len() == 2 => items[1].clone(),
        Form::Tuple(items) if form.is_headed("unquote-splicing") && items.len() == 2 => items[1].clone(),
        // A nested `(quote X)` is already the user asking for X verbatim;
        // qualifying identifiers inside it would defeat the point of
        // spelling it with an explicit quote instead of leaving it bare.
        Form::Tuple(items) if form.is_headed("quote") && items.len() == 2 => form.clone(),
        Form::Tuple(items) => {
            let mut entries = Vec::with_capacity(items.len());
            for child in items {
                if child.is_headed("unquote-splicing") {
                    if let Some(rest) = child.as_tuple() {
                        entries.push(rest[1].clone());
                        continue;
                    }
                }
                entries.push(wrap_single(qq(child, module_name)));
            }
            let mut call = vec![tuple_ctor(), Form::sym(":")];
            for e in entries {
                call.push(Form::sym(":*"));
                call.push(e);
            }
            Form::tuple(call)
        }
    }
}

pub fn read_all(src: &str, module: &Rc<Module>) -> Result<Vec<Form>, CompileError> {
    read_all_with(src, module, None)
}

pub fn read_all_with(src: &str, module: &Rc<Module>, inject: Option<&Injector>) -> Result<Vec<Form>, CompileError> {
    let mut reader = Reader::new(src, module.clone(), inject);
    let mut forms = Vec::new();
    while let Some(form) = reader.read_one()? {
        forms.push(form);
    }
    Ok(forms)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn read_one_str(src: &str) -> Form {
        let module = Module::new("tests.reader");
        let mut forms = read_all(src, &module).unwrap();
        assert_eq!(forms.len(), 1, "expected exactly one form from {src:?}");
        forms.remove(0)
    }

    /// Recursively collect every symbol wrapped as `(quote SYM)`, the shape
    /// `qq` reconstructs a bare symbol as. The reconstructed call tree nests
    /// each entry inside a tuple-constructor wrapper, so a direct one-level
    /// scan of a template's expansion misses them.
    fn collect_quoted_syms<'a>(form: &'a Form, out: &mut Vec<&'a str>) {
        let Some(items) = form.as_tuple() else { return };
        if items.len() == 2 && items[0].as_sym() == Some("quote") {
            if let Some(s) = items[1].as_sym() {
                out.push(s);
                return;
            }
        }
        for item in items {
            collect_quoted_syms(item, out);
        }
    }

    #[test]
    fn quote_reads_as_quote_tuple() {
        assert_eq!(read_one_str("'x"), Form::tuple(vec![Form::sym("quote"), Form::sym("x")]));
    }

    #[test]
    fn plain_call_reads_as_tuple_of_atoms() {
        assert_eq!(
            read_one_str("(+ 1 2)"),
            Form::tuple(vec![Form::sym("+"), Form::int(1), Form::int(2)])
        );
    }

    #[test]
    fn unbalanced_close_paren_errors() {
        let module = Module::new("tests.reader");
        assert!(read_all(")", &module).is_err());
    }

    #[test]
    fn discard_macro_drops_the_next_form_only() {
        assert_eq!(read_one_str("_#1 2"), Form::int(2));
    }

    #[test]
    fn auto_gensym_is_stable_within_one_template_and_fresh_across_templates() {
        let module = Module::new("tests.reader");
        let forms = read_all("`($#x $#x) `($#x $#x)", &module).unwrap();

        let mut syms = Vec::new();
        collect_quoted_syms(&forms[0], &mut syms);
        assert_eq!(syms.len(), 2);
        assert_eq!(syms[0], syms[1]);

        let mut syms2 = Vec::new();
        collect_quoted_syms(&forms[1], &mut syms2);
        assert_eq!(syms2.len(), 2);
        assert_eq!(syms2[0], syms2[1]);

        assert_ne!(syms[0], syms2[0]);
    }

    #[test]
    fn quasiquote_qualifies_a_bare_symbol_to_the_reading_module() {
        let module = Module::new("tests.qualify");
        let forms = read_all("`(foo)", &module).unwrap();

        let mut syms = Vec::new();
        collect_quoted_syms(&forms[0], &mut syms);
        assert_eq!(syms, vec!["tests.qualify..foo"]);
    }

    #[test]
    fn quasiquote_leaves_a_nested_quote_form_unqualified() {
        let module = Module::new("tests.qualify");
        let forms = read_all("`('foo)", &module).unwrap();

        let mut syms = Vec::new();
        collect_quoted_syms(&forms[0], &mut syms);
        assert_eq!(syms, vec!["foo"]);
    }

    #[test]
    fn unquote_escapes_back_to_ordinary_code() {
        let form = read_one_str("`(a ,(+ 1 2))");
        let items = form.as_tuple().unwrap();
        // second spread entry wraps the unquoted code directly, unqualified.
        let has_raw_call = items.iter().any(|f| {
            f.as_tuple()
                .map(|t| t.len() == 2 && t[0].as_tuple().is_some())
                .unwrap_or(false)
        });
        assert!(has_raw_call);
    }

    #[test]
    fn bracket_literal_is_read_as_structured_lit() {
        assert_eq!(
            read_one_str("[4,'5',6]"),
            Form::Atom(Atom::Lit(HostLit::List(vec![HostLit::Int(4), HostLit::Str("'5'".into()), HostLit::Int(6)])))
        );
    }
}
