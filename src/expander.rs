//! Macro expansion: repeatedly replace a macro-call tuple with the result of
//! calling its macro function, until the head position is no longer a macro
//! call, then recurse into children. `quote` and `lambda` are never macro
//! calls and `quote`'s argument is never recursed into, since it is data.

use crate::error::{CompileError, HisspError, MacroError, Phase};
use crate::form::{self, Form};
use crate::host::{self, form_to_host_value, host_value_to_form};
use crate::module::Module;
use crate::span::Span;
use std::rc::Rc;

/// Passes without reaching a fixed point before giving up; real macro bugs
/// (an infinitely self-recursive macro) surface as [`HisspError::MacroLoop`]
/// instead of hanging the compiler.
const MAX_EXPANSION_DEPTH: usize = 500;

pub fn expand_all(forms: Vec<Form>, module: &Rc<Module>) -> Result<Vec<Form>, CompileError> {
    forms.into_iter().map(|f| expand_form(f, module, Span::default())).collect()
}

/// Expand a single top-level form, for callers (the `.#` injector, the
/// REPL) that evaluate one form at a time rather than a whole file.
pub fn expand_one(form: Form, module: &Rc<Module>) -> Result<Form, CompileError> {
    expand_form(form, module, Span::default())
}

fn expand_form(form: Form, module: &Rc<Module>, span: Span) -> Result<Form, CompileError> {
    let mut current = form;
    let mut depth = 0usize;
    loop {
        match try_expand_once(&current, module, span)? {
            Some(expanded) => {
                current = expanded;
                depth += 1;
                if depth > MAX_EXPANSION_DEPTH {
                    return Err(CompileError::new(Phase::Expand, span, HisspError::MacroLoop { depth }));
                }
            }
            None => break,
        }
    }
    if current.is_headed("quote") {
        return Ok(current);
    }
    match current {
        Form::Tuple(items) => {
            let mut out = Vec::with_capacity(items.len());
            for item in items {
                out.push(expand_form(item, module, span)?);
            }
            Ok(Form::Tuple(out))
        }
        atom => Ok(atom),
    }
}

/// If `form` is a tuple whose head names a macro bound in `module`, call it
/// and return the replacement form; otherwise `None`.
fn try_expand_once(form: &Form, module: &Rc<Module>, span: Span) -> Result<Option<Form>, CompileError> {
    let Form::Tuple(items) = form else { return Ok(None) };
    let Some(head) = items.first().and_then(Form::as_sym) else { return Ok(None) };
    if head == "quote" || head == "lambda" {
        return Ok(None);
    }
    let Some(macro_fn) = lookup_macro(head, module) else { return Ok(None) };

    let args: Vec<_> = items[1..].iter().map(form_to_host_value).collect();
    let result = host::call(macro_fn, &args, &[]).map_err(|e| {
        CompileError::new(Phase::Expand, span, MacroError::Raised(head.to_string(), e.to_string()))
    })?;
    let expanded = host_value_to_form(&result)
        .map_err(|e| CompileError::new(Phase::Expand, span, HisspError::Read(e.into())))?;
    Ok(Some(expanded))
}

/// A qualified symbol only ever dispatches as a macro when it has the
/// explicit `PKG.._macro_.NAME` shape: `NAME` looked up in `PKG`'s macro
/// namespace. `PKG..NAME` without the `_macro_` segment is an ordinary
/// qualified reference (attribute access), never a macro call.
fn lookup_macro(head: &str, module: &Rc<Module>) -> Option<crate::host::HostValue> {
    if let Some((pkg, rest)) = form::split_qualified(head) {
        let name = rest.strip_prefix("_macro_.")?;
        if pkg == module.name {
            module.get_macro(name)
        } else {
            None
        }
    } else {
        module.get_macro(head)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::HostValue;
    use std::rc::Rc as StdRc;

    fn always_one() -> HostValue {
        HostValue::Builtin(StdRc::new(|_pos: &[HostValue], _kw: &[(String, HostValue)]| {
            Ok(HostValue::Int(1))
        }))
    }

    #[test]
    fn non_macro_head_is_left_alone() {
        let module = Module::new("tests.expand");
        let form = Form::tuple(vec![Form::sym("+"), Form::int(1), Form::int(2)]);
        let expanded = expand_form(form.clone(), &module, Span::default()).unwrap();
        assert_eq!(expanded, form);
    }

    #[test]
    fn registered_macro_is_replaced_by_its_result() {
        let module = Module::new("tests.expand");
        module.define_macro("one", always_one());
        let form = Form::tuple(vec![Form::sym("one")]);
        let expanded = expand_form(form, &module, Span::default()).unwrap();
        assert_eq!(expanded, Form::int(1));
    }

    #[test]
    fn quote_body_is_never_expanded() {
        let module = Module::new("tests.expand");
        module.define_macro("one", always_one());
        let form = Form::tuple(vec![Form::sym("quote"), Form::tuple(vec![Form::sym("one")])]);
        let expanded = expand_form(form.clone(), &module, Span::default()).unwrap();
        assert_eq!(expanded, form);
    }

    #[test]
    fn nested_calls_expand_recursively() {
        let module = Module::new("tests.expand");
        module.define_macro("one", always_one());
        let form = Form::tuple(vec![Form::sym("+"), Form::tuple(vec![Form::sym("one")]), Form::int(2)]);
        let expanded = expand_form(form, &module, Span::default()).unwrap();
        assert_eq!(expanded, Form::tuple(vec![Form::sym("+"), Form::int(1), Form::int(2)]));
    }
}
