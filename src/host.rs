//! The embedded host: a tiny tree-walking evaluator for the restricted
//! expression fragment the emitter produces (names, attribute access,
//! imports, calls with positional/keyword/spread arguments, and lambdas).
//!
//! Real Hissp hands its emitted text to an external dynamic language. Here
//! the "host" is this module: the emitter lowers a [`crate::form::Form`] to
//! a [`HostExpr`] at the same time it renders source text, and this
//! evaluator runs that `HostExpr` directly, so macro expansion, `.#`, and
//! the REPL all have a real evaluator to call without shelling out to an
//! external interpreter.

use crate::error::{HostError, ReadError};
use crate::form::{Atom, Form, HostLit};
use crate::module::Module;
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

#[derive(Clone)]
pub enum HostValue {
    Int(i64),
    Float(f64),
    Complex(f64, f64),
    Str(Rc<String>),
    Bool(bool),
    None,
    Tuple(Rc<Vec<HostValue>>),
    List(Rc<RefCell<Vec<HostValue>>>),
    Dict(Rc<RefCell<Vec<(HostValue, HostValue)>>>),
    Lambda(Rc<HostLambda>),
    Builtin(Rc<dyn Fn(&[HostValue], &[(String, HostValue)]) -> Result<HostValue, HostError>>),
    Module(Rc<Module>),
}

pub struct HostLambda {
    pub params: ParamSpec,
    pub body: HostExpr,
    pub closure: Scope,
}

impl fmt::Debug for HostValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.type_name())
    }
}

impl PartialEq for HostValue {
    fn eq(&self, other: &Self) -> bool {
        use HostValue::*;
        match (self, other) {
            (Int(a), Int(b)) => a == b,
            (Float(a), Float(b)) => a == b,
            (Complex(a, b), Complex(c, d)) => a == c && b == d,
            (Str(a), Str(b)) => a == b,
            (Bool(a), Bool(b)) => a == b,
            (None, None) => true,
            (Tuple(a), Tuple(b)) => a == b,
            (List(a), List(b)) => *a.borrow() == *b.borrow(),
            (Dict(a), Dict(b)) => *a.borrow() == *b.borrow(),
            _ => false,
        }
    }
}

impl HostValue {
    pub fn type_name(&self) -> &'static str {
        match self {
            HostValue::Int(_) => "int",
            HostValue::Float(_) => "float",
            HostValue::Complex(..) => "complex",
            HostValue::Str(_) => "str",
            HostValue::Bool(_) => "bool",
            HostValue::None => "NoneType",
            HostValue::Tuple(_) => "tuple",
            HostValue::List(_) => "list",
            HostValue::Dict(_) => "dict",
            HostValue::Lambda(_) => "function",
            HostValue::Builtin(_) => "builtin_function",
            HostValue::Module(_) => "module",
        }
    }

    pub fn truthy(&self) -> bool {
        match self {
            HostValue::Bool(b) => *b,
            HostValue::None => false,
            HostValue::Int(n) => *n != 0,
            HostValue::Float(x) => *x != 0.0,
            HostValue::Str(s) => !s.is_empty(),
            HostValue::Tuple(t) => !t.is_empty(),
            HostValue::List(l) => !l.borrow().is_empty(),
            _ => true,
        }
    }

    pub fn str(s: impl Into<String>) -> HostValue {
        HostValue::Str(Rc::new(s.into()))
    }
}

/// Lexical scope chain for lambda application: a single level of bindings
/// plus an optional parent, the same shape the teacher's `Environment` uses
/// for its own interpreter.
#[derive(Clone)]
pub struct Scope(Rc<ScopeNode>);

struct ScopeNode {
    bindings: RefCell<HashMap<String, HostValue>>,
    parent: Option<Scope>,
    module: Rc<Module>,
}

impl Scope {
    pub fn root(module: Rc<Module>) -> Scope {
        Scope(Rc::new(ScopeNode { bindings: RefCell::new(HashMap::new()), parent: None, module }))
    }

    pub fn child(parent: &Scope) -> Scope {
        Scope(Rc::new(ScopeNode {
            bindings: RefCell::new(HashMap::new()),
            parent: Some(parent.clone()),
            module: parent.0.module.clone(),
        }))
    }

    pub fn define(&self, name: &str, value: HostValue) {
        self.0.bindings.borrow_mut().insert(name.to_string(), value);
    }

    pub fn module(&self) -> &Rc<Module> {
        &self.0.module
    }

    /// Resolve a name: local bindings, then enclosing scopes, then the
    /// module's globals (so top-level `define`d names are visible to any
    /// lambda body compiled against this module).
    pub fn lookup(&self, name: &str) -> Option<HostValue> {
        if let Some(v) = self.0.bindings.borrow().get(name) {
            return Some(v.clone());
        }
        if let Some(parent) = &self.0.parent {
            return parent.lookup(name);
        }
        self.0.module.get(name)
    }
}

/// A lowered host expression: the structural twin of the text the emitter
/// also renders, evaluated directly instead of being re-parsed.
#[derive(Debug, Clone)]
pub enum HostExpr {
    Lit(LitExpr),
    Name(String),
    Attr(Box<HostExpr>, String),
    Import(String),
    Call {
        callee: Box<HostExpr>,
        positional: Vec<HostExpr>,
        keywords: Vec<(String, HostExpr)>,
        star: Vec<HostExpr>,
        starstar: Vec<HostExpr>,
    },
    Lambda { params: ParamSpec, body: Box<HostExpr> },
    /// The `(e0, e1, ..., en)[-1]` encoding of a multi-expression body.
    Sequence(Vec<HostExpr>),
}

#[derive(Debug, Clone)]
pub enum LitExpr {
    Int(i64),
    Float(f64),
    Complex(f64, f64),
    Str(String),
    Bool(bool),
    None,
    /// A bracket-syntax list literal (`[1,2,3]`), evaluates to `HostValue::List`.
    List(Vec<LitExpr>),
    /// A quoted tuple, built at emit time from already-quoted sub-literals
    /// (numbers, strings, nested tuples), never containing live sub-exprs.
    /// Evaluates to `HostValue::Tuple`.
    Tuple(Vec<LitExpr>),
    Dict(Vec<(LitExpr, LitExpr)>),
}

#[derive(Debug, Clone, Default)]
pub struct Param {
    pub name: String,
    pub default: Option<HostExpr>,
}

#[derive(Debug, Clone, Default)]
pub struct ParamSpec {
    pub positional: Vec<String>,
    pub pre_star: Vec<Param>,
    pub star_args: Option<String>,
    pub bare_star: bool,
    pub kwonly: Vec<Param>,
    pub star_kwargs: Option<String>,
}

pub fn eval(expr: &HostExpr, scope: &Scope) -> Result<HostValue, HostError> {
    match expr {
        HostExpr::Lit(lit) => Ok(eval_lit(lit)),
        HostExpr::Name(name) => scope.lookup(name).ok_or_else(|| HostError::UndefinedName(name.clone())),
        HostExpr::Attr(base, attr) => {
            let v = eval(base, scope)?;
            match v {
                HostValue::Module(m) => m
                    .get(attr)
                    .ok_or_else(|| HostError::NoAttribute(m.name.clone(), attr.clone())),
                other => Err(HostError::NoAttribute(other.type_name().to_string(), attr.clone())),
            }
        }
        HostExpr::Import(path) => Ok(HostValue::Module(import_module(path, scope))),
        HostExpr::Call { callee, positional, keywords, star, starstar } => {
            let callee_v = eval(callee, scope)?;
            let mut pos = Vec::new();
            for p in positional {
                pos.push(eval(p, scope)?);
            }
            for s in star {
                match eval(s, scope)? {
                    HostValue::Tuple(items) => pos.extend(items.iter().cloned()),
                    HostValue::List(items) => pos.extend(items.borrow().iter().cloned()),
                    other => return Err(HostError::TypeError(format!("cannot spread a {}", other.type_name()))),
                }
            }
            let mut kw = Vec::new();
            for (name, e) in keywords {
                kw.push((name.clone(), eval(e, scope)?));
            }
            for s in starstar {
                match eval(s, scope)? {
                    HostValue::Dict(pairs) => {
                        for (k, v) in pairs.borrow().iter() {
                            if let HostValue::Str(name) = k {
                                kw.push((name.as_str().to_string(), v.clone()));
                            }
                        }
                    }
                    other => return Err(HostError::TypeError(format!("cannot spread a {} as keywords", other.type_name()))),
                }
            }
            call(callee_v, &pos, &kw)
        }
        HostExpr::Lambda { params, body } => Ok(HostValue::Lambda(Rc::new(HostLambda {
            params: params.clone(),
            body: (**body).clone(),
            closure: scope.clone(),
        }))),
        HostExpr::Sequence(exprs) => {
            let mut last = HostValue::None;
            for e in exprs {
                last = eval(e, scope)?;
            }
            Ok(last)
        }
    }
}

fn eval_lit(lit: &LitExpr) -> HostValue {
    match lit {
        LitExpr::Int(n) => HostValue::Int(*n),
        LitExpr::Float(x) => HostValue::Float(*x),
        LitExpr::Complex(re, im) => HostValue::Complex(*re, *im),
        LitExpr::Str(s) => HostValue::str(s.clone()),
        LitExpr::Bool(b) => HostValue::Bool(*b),
        LitExpr::None => HostValue::None,
        LitExpr::List(items) => HostValue::List(Rc::new(RefCell::new(items.iter().map(eval_lit).collect()))),
        LitExpr::Tuple(items) => HostValue::Tuple(Rc::new(items.iter().map(eval_lit).collect())),
        LitExpr::Dict(pairs) => {
            HostValue::Dict(Rc::new(RefCell::new(pairs.iter().map(|(k, v)| (eval_lit(k), eval_lit(v))).collect())))
        }
    }
}

fn import_module(path: &str, scope: &Scope) -> Rc<Module> {
    // A minimal stand-in for `__import__`: the compiling module answers for
    // its own name, "builtins" resolves to the prelude's pseudo-module
    // (crate::prelude::builtins_module), and any other path is an empty
    // placeholder, since this implementation never loads real external
    // packages.
    if path == scope.module().name {
        return scope.module().clone();
    }
    if path == "builtins" {
        return crate::prelude::builtins_module();
    }
    Module::new(path.to_string())
}

pub fn call(callee: HostValue, pos: &[HostValue], kw: &[(String, HostValue)]) -> Result<HostValue, HostError> {
    match callee {
        HostValue::Builtin(f) => f(pos, kw),
        HostValue::Lambda(lam) => call_lambda(&lam, pos, kw),
        other => Err(HostError::NotCallable(other.type_name().to_string())),
    }
}

fn call_lambda(lam: &HostLambda, pos: &[HostValue], kw: &[(String, HostValue)]) -> Result<HostValue, HostError> {
    let scope = Scope::child(&lam.closure);
    let spec = &lam.params;
    let mut kw_map: HashMap<&str, HostValue> = kw.iter().map(|(k, v)| (k.as_str(), v.clone())).collect();
    let mut idx = 0usize;

    for name in &spec.positional {
        let v = if let Some(v) = kw_map.remove(name.as_str()) {
            v
        } else if idx < pos.len() {
            let v = pos[idx].clone();
            idx += 1;
            v
        } else {
            return Err(HostError::Arity { function: "<lambda>".into(), expected: spec.positional.len(), actual: pos.len() });
        };
        scope.define(name, v);
    }

    for p in &spec.pre_star {
        let v = if let Some(v) = kw_map.remove(p.name.as_str()) {
            v
        } else if idx < pos.len() && spec.star_args.is_none() {
            let v = pos[idx].clone();
            idx += 1;
            v
        } else if let Some(d) = &p.default {
            eval(d, &scope)?
        } else {
            return Err(HostError::Arity { function: "<lambda>".into(), expected: spec.positional.len() + spec.pre_star.len(), actual: pos.len() });
        };
        scope.define(&p.name, v);
    }

    if let Some(star) = &spec.star_args {
        let rest: Vec<HostValue> = pos.get(idx..).map(|s| s.to_vec()).unwrap_or_default();
        scope.define(star, HostValue::Tuple(Rc::new(rest)));
    }

    for p in &spec.kwonly {
        let v = if let Some(v) = kw_map.remove(p.name.as_str()) {
            v
        } else if let Some(d) = &p.default {
            eval(d, &scope)?
        } else {
            return Err(HostError::TypeError(format!("missing required keyword-only argument '{}'", p.name)));
        };
        scope.define(&p.name, v);
    }

    if let Some(starstar) = &spec.star_kwargs {
        let rest: Vec<(HostValue, HostValue)> =
            kw_map.into_iter().map(|(k, v)| (HostValue::str(k), v)).collect();
        scope.define(starstar, HostValue::Dict(Rc::new(RefCell::new(rest))));
    } else if !kw_map.is_empty() {
        return Err(HostError::TypeError(format!(
            "unexpected keyword argument(s): {}",
            kw_map.keys().cloned().collect::<Vec<_>>().join(", ")
        )));
    }

    eval(&lam.body, &scope)
}

/// Lower a form into the value a reader macro or compile-time macro call
/// sees as its argument: code and data share one representation here, so
/// this is a structural copy, not an evaluation.
pub fn form_to_host_value(form: &Form) -> HostValue {
    match form {
        Form::Atom(Atom::Str(s)) => HostValue::str(s.clone()),
        Form::Atom(Atom::Lit(lit)) => hostlit_to_host_value(lit),
        Form::Tuple(items) => HostValue::Tuple(Rc::new(items.iter().map(form_to_host_value).collect())),
    }
}

fn hostlit_to_host_value(lit: &HostLit) -> HostValue {
    match lit {
        HostLit::Int(n) => HostValue::Int(*n),
        HostLit::Float(x) => HostValue::Float(*x),
        HostLit::Complex(re, im) => HostValue::Complex(*re, *im),
        HostLit::Str(s) => HostValue::str(s.clone()),
        HostLit::List(items) => HostValue::List(Rc::new(RefCell::new(items.iter().map(hostlit_to_host_value).collect()))),
        HostLit::Dict(pairs) => HostValue::Dict(Rc::new(RefCell::new(
            pairs.iter().map(|(k, v)| (hostlit_to_host_value(k), hostlit_to_host_value(v))).collect(),
        ))),
    }
}

/// The inverse of [`form_to_host_value`]: what a macro or reader macro
/// returns must be re-read back into the tree.
pub fn host_value_to_form(value: &HostValue) -> Result<Form, ReadError> {
    match value {
        HostValue::Int(n) => Ok(Form::Atom(Atom::Lit(HostLit::Int(*n)))),
        HostValue::Float(x) => Ok(Form::Atom(Atom::Lit(HostLit::Float(*x)))),
        HostValue::Complex(re, im) => Ok(Form::Atom(Atom::Lit(HostLit::Complex(*re, *im)))),
        HostValue::Str(s) => Ok(Form::Atom(Atom::Str(s.as_str().to_string()))),
        HostValue::Bool(b) => Ok(Form::sym(if *b { "True" } else { "False" })),
        HostValue::None => Ok(Form::sym("None")),
        HostValue::Tuple(items) => {
            let forms = items.iter().map(host_value_to_form).collect::<Result<Vec<_>, _>>()?;
            Ok(Form::tuple(forms))
        }
        HostValue::List(items) => {
            let lits = items.borrow().iter().map(host_value_to_hostlit).collect::<Result<Vec<_>, _>>()?;
            Ok(Form::Atom(Atom::Lit(HostLit::List(lits))))
        }
        HostValue::Dict(pairs) => {
            let lits = pairs
                .borrow()
                .iter()
                .map(|(k, v)| Ok((host_value_to_hostlit(k)?, host_value_to_hostlit(v)?)))
                .collect::<Result<Vec<_>, ReadError>>()?;
            Ok(Form::Atom(Atom::Lit(HostLit::Dict(lits))))
        }
        other => Err(ReadError::BadReaderMacro(format!(
            "reader macro returned a {} value, which cannot become a form",
            other.type_name()
        ))),
    }
}

/// Narrower than [`host_value_to_form`]: used for a list/dict's own
/// elements, which must fit `HostLit`'s literal-only shape (no tuples,
/// lambdas, or other non-literal values nested inside a bracket/brace form).
fn host_value_to_hostlit(value: &HostValue) -> Result<HostLit, ReadError> {
    match value {
        HostValue::Int(n) => Ok(HostLit::Int(*n)),
        HostValue::Float(x) => Ok(HostLit::Float(*x)),
        HostValue::Complex(re, im) => Ok(HostLit::Complex(*re, *im)),
        HostValue::Str(s) => Ok(HostLit::Str(crate::emitter::quote_literal_text(s))),
        HostValue::List(items) => {
            Ok(HostLit::List(items.borrow().iter().map(host_value_to_hostlit).collect::<Result<Vec<_>, _>>()?))
        }
        HostValue::Dict(pairs) => Ok(HostLit::Dict(
            pairs
                .borrow()
                .iter()
                .map(|(k, v)| Ok((host_value_to_hostlit(k)?, host_value_to_hostlit(v)?)))
                .collect::<Result<Vec<_>, ReadError>>()?,
        )),
        other => Err(ReadError::BadReaderMacro(format!(
            "reader macro returned a {} value, which cannot become a list/dict element",
            other.type_name()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id_lambda() -> HostExpr {
        HostExpr::Lambda {
            params: ParamSpec { positional: vec!["x".into()], ..Default::default() },
            body: Box::new(HostExpr::Name("x".into())),
        }
    }

    #[test]
    fn simple_call_roundtrips_argument() {
        let m = Module::new("tests.host");
        let scope = Scope::root(m);
        let call_expr = HostExpr::Call {
            callee: Box::new(id_lambda()),
            positional: vec![HostExpr::Lit(LitExpr::Int(5))],
            keywords: vec![],
            star: vec![],
            starstar: vec![],
        };
        assert_eq!(eval(&call_expr, &scope).unwrap(), HostValue::Int(5));
    }

    #[test]
    fn rest_args_collect_into_tuple() {
        let m = Module::new("tests.host");
        let scope = Scope::root(m);
        let lam = HostExpr::Lambda {
            params: ParamSpec { star_args: Some("xs".into()), ..Default::default() },
            body: Box::new(HostExpr::Name("xs".into())),
        };
        let call_expr = HostExpr::Call {
            callee: Box::new(lam),
            positional: vec![HostExpr::Lit(LitExpr::Int(1)), HostExpr::Lit(LitExpr::Int(2))],
            keywords: vec![],
            star: vec![],
            starstar: vec![],
        };
        let v = eval(&call_expr, &scope).unwrap();
        assert_eq!(v, HostValue::Tuple(Rc::new(vec![HostValue::Int(1), HostValue::Int(2)])));
    }

    #[test]
    fn spread_argument_unpacks_tuple() {
        let m = Module::new("tests.host");
        let scope = Scope::root(m);
        let lam = HostExpr::Lambda {
            params: ParamSpec { star_args: Some("xs".into()), ..Default::default() },
            body: Box::new(HostExpr::Name("xs".into())),
        };
        let call_expr = HostExpr::Call {
            callee: Box::new(lam),
            positional: vec![],
            keywords: vec![],
            star: vec![HostExpr::Lit(LitExpr::List(vec![LitExpr::Int(1), LitExpr::Int(2)]))],
            starstar: vec![],
        };
        let v = eval(&call_expr, &scope).unwrap();
        assert_eq!(v, HostValue::Tuple(Rc::new(vec![HostValue::Int(1), HostValue::Int(2)])));
    }

    #[test]
    fn undefined_name_errors() {
        let m = Module::new("tests.host");
        let scope = Scope::root(m);
        assert!(eval(&HostExpr::Name("nope".into()), &scope).is_err());
    }
}
