//! The small set of host names a freshly constructed module needs before any
//! user source can run: arithmetic/comparison operators bound directly into
//! the module's globals, and a `builtins` pseudo-module reachable by
//! qualified symbol (`builtins..print`, `builtins..len`, …).
//!
//! None of this is part of the two-special-form core — it is ordinary
//! library code in exactly the sense the teacher's own `builtins/` tree was,
//! just rebuilt against [`HostValue`] instead of the teacher's original
//! `Value`.

use crate::error::HostError;
use crate::host::HostValue;
use crate::module::Module;
use std::rc::Rc;

/// Bind the arithmetic and comparison operators, plus every `builtins`
/// name, into `module`'s globals under their munged names, so `(+ 1 2)` and
/// bare `(print ...)` both resolve without an import — matching a host
/// whose builtins are implicitly in scope everywhere, qualified access via
/// `builtins..name` (`host::import_module`) being just an alternate spelling
/// of the same names. Grounded on the teacher's `builtins/arithmetic.rs` and
/// `builtins/comparison.rs`.
pub fn install(module: &Rc<Module>) {
    module.define("+", HostValue::Builtin(Rc::new(arith_add)));
    module.define("-", HostValue::Builtin(Rc::new(arith_sub)));
    module.define("*", HostValue::Builtin(Rc::new(arith_mul)));
    module.define("/", HostValue::Builtin(Rc::new(arith_div)));
    module.define("%", HostValue::Builtin(Rc::new(arith_mod)));
    module.define("=", HostValue::Builtin(Rc::new(cmp_eq)));
    module.define("<", HostValue::Builtin(Rc::new(|p, _| cmp_chain(p, |a, b| a < b))));
    module.define(">", HostValue::Builtin(Rc::new(|p, _| cmp_chain(p, |a, b| a > b))));
    module.define("<=", HostValue::Builtin(Rc::new(|p, _| cmp_chain(p, |a, b| a <= b))));
    module.define(">=", HostValue::Builtin(Rc::new(|p, _| cmp_chain(p, |a, b| a >= b))));
    for name in ["print", "len", "repr", "str", "int", "float", "bool", "list", "tuple", "dict"] {
        if let Some(v) = builtins_module().get(&crate::munge::munge_symbol(name)) {
            module.define(name, v);
        }
    }
}

/// The `builtins` pseudo-module: what `host::import_module` hands back for
/// the literal path `"builtins"`. Grounded on the teacher's
/// `builtins/console.rs` (`print`) and `builtins/types.rs` (type predicates
/// and conversions, here exposed as Python-style constructor names since the
/// host fragment is Python-shaped).
pub fn builtins_module() -> Rc<Module> {
    let m = Module::new("builtins");
    m.define("print", HostValue::Builtin(Rc::new(host_print)));
    m.define("len", HostValue::Builtin(Rc::new(host_len)));
    m.define("repr", HostValue::Builtin(Rc::new(|p, _| Ok(HostValue::str(repr(&arg(p, 0)?))))));
    m.define("str", HostValue::Builtin(Rc::new(|p, _| Ok(HostValue::str(display_one(&arg(p, 0)?))))));
    m.define("int", HostValue::Builtin(Rc::new(host_int)));
    m.define("float", HostValue::Builtin(Rc::new(host_float)));
    m.define("bool", HostValue::Builtin(Rc::new(|p, _| Ok(HostValue::Bool(arg(p, 0)?.truthy())))));
    m.define("list", HostValue::Builtin(Rc::new(host_list)));
    m.define("tuple", HostValue::Builtin(Rc::new(host_tuple)));
    m.define("dict", HostValue::Builtin(Rc::new(|_p, _kw| {
        Ok(HostValue::Dict(Rc::new(std::cell::RefCell::new(Vec::new()))))
    })));
    m
}

fn arg(pos: &[HostValue], i: usize) -> Result<HostValue, HostError> {
    pos.get(i).cloned().ok_or_else(|| HostError::Arity { function: "<builtin>".into(), expected: i + 1, actual: pos.len() })
}

fn as_f64(v: &HostValue) -> Result<f64, HostError> {
    match v {
        HostValue::Int(n) => Ok(*n as f64),
        HostValue::Float(x) => Ok(*x),
        other => Err(HostError::TypeError(format!("expected a number, got {}", other.type_name()))),
    }
}

/// True if every argument is an exact `Int`, so arithmetic on all-integer
/// input stays integral instead of promoting to float.
fn all_ints(args: &[HostValue]) -> bool {
    args.iter().all(|v| matches!(v, HostValue::Int(_)))
}

fn arith_add(pos: &[HostValue], _kw: &[(String, HostValue)]) -> Result<HostValue, HostError> {
    if all_ints(pos) {
        let mut sum = 0i64;
        for v in pos {
            let HostValue::Int(n) = v else { unreachable!() };
            sum += n;
        }
        return Ok(HostValue::Int(sum));
    }
    let mut sum = 0.0;
    for v in pos {
        sum += as_f64(v)?;
    }
    Ok(HostValue::Float(sum))
}

fn arith_sub(pos: &[HostValue], _kw: &[(String, HostValue)]) -> Result<HostValue, HostError> {
    if pos.is_empty() {
        return Err(HostError::Arity { function: "-".into(), expected: 1, actual: 0 });
    }
    if all_ints(pos) {
        let ints: Vec<i64> = pos.iter().map(|v| if let HostValue::Int(n) = v { *n } else { unreachable!() }).collect();
        return Ok(HostValue::Int(if ints.len() == 1 { -ints[0] } else { ints[0] - ints[1..].iter().sum::<i64>() }));
    }
    let nums: Vec<f64> = pos.iter().map(as_f64).collect::<Result<_, _>>()?;
    Ok(HostValue::Float(if nums.len() == 1 { -nums[0] } else { nums[0] - nums[1..].iter().sum::<f64>() }))
}

fn arith_mul(pos: &[HostValue], _kw: &[(String, HostValue)]) -> Result<HostValue, HostError> {
    if all_ints(pos) {
        let mut prod = 1i64;
        for v in pos {
            let HostValue::Int(n) = v else { unreachable!() };
            prod *= n;
        }
        return Ok(HostValue::Int(prod));
    }
    let mut prod = 1.0;
    for v in pos {
        prod *= as_f64(v)?;
    }
    Ok(HostValue::Float(prod))
}

fn arith_div(pos: &[HostValue], _kw: &[(String, HostValue)]) -> Result<HostValue, HostError> {
    let nums: Vec<f64> = pos.iter().map(as_f64).collect::<Result<_, _>>()?;
    if nums.is_empty() {
        return Err(HostError::Arity { function: "/".into(), expected: 1, actual: 0 });
    }
    if nums.len() == 1 {
        return Ok(HostValue::Float(1.0 / nums[0]));
    }
    let mut out = nums[0];
    for n in &nums[1..] {
        out /= n;
    }
    Ok(HostValue::Float(out))
}

fn arith_mod(pos: &[HostValue], _kw: &[(String, HostValue)]) -> Result<HostValue, HostError> {
    if pos.len() != 2 {
        return Err(HostError::Arity { function: "%".into(), expected: 2, actual: pos.len() });
    }
    if let (HostValue::Int(a), HostValue::Int(b)) = (&pos[0], &pos[1]) {
        return Ok(HostValue::Int(a.rem_euclid(*b)));
    }
    Ok(HostValue::Float(as_f64(&pos[0])?.rem_euclid(as_f64(&pos[1])?)))
}

fn cmp_eq(pos: &[HostValue], _kw: &[(String, HostValue)]) -> Result<HostValue, HostError> {
    Ok(HostValue::Bool(pos.windows(2).all(|w| w[0] == w[1])))
}

fn cmp_chain(pos: &[HostValue], ok: impl Fn(f64, f64) -> bool) -> Result<HostValue, HostError> {
    let nums: Vec<f64> = pos.iter().map(as_f64).collect::<Result<_, _>>()?;
    Ok(HostValue::Bool(nums.windows(2).all(|w| ok(w[0], w[1]))))
}

fn display_one(v: &HostValue) -> String {
    match v {
        HostValue::Str(s) => s.as_str().to_string(),
        other => repr(other),
    }
}

/// Best-effort `repr()`-style rendering of a [`HostValue`], used by the
/// `repr` builtin and by the REPL's `=> value` echo.
pub fn repr(v: &HostValue) -> String {
    match v {
        HostValue::Int(n) => n.to_string(),
        HostValue::Float(x) => if x.fract() == 0.0 && x.is_finite() { format!("{x:.1}") } else { format!("{x}") },
        HostValue::Complex(re, im) => if *re == 0.0 { format!("{im}j") } else { format!("({re}+{im}j)") },
        HostValue::Str(s) => format!("'{}'", s.as_str()),
        HostValue::Bool(b) => if *b { "True" } else { "False" }.to_string(),
        HostValue::None => "None".to_string(),
        HostValue::Tuple(items) => {
            let inner = items.iter().map(repr).collect::<Vec<_>>().join(", ");
            if items.len() == 1 { format!("({inner},)") } else { format!("({inner})") }
        }
        HostValue::List(items) => {
            format!("[{}]", items.borrow().iter().map(repr).collect::<Vec<_>>().join(", "))
        }
        HostValue::Dict(pairs) => {
            let inner = pairs.borrow().iter().map(|(k, v)| format!("{}: {}", repr(k), repr(v))).collect::<Vec<_>>().join(", ");
            format!("{{{inner}}}")
        }
        HostValue::Lambda(_) => "<function>".to_string(),
        HostValue::Builtin(_) => "<built-in function>".to_string(),
        HostValue::Module(m) => format!("<module '{}'>", m.name),
    }
}

fn host_print(pos: &[HostValue], kw: &[(String, HostValue)]) -> Result<HostValue, HostError> {
    let sep = kw
        .iter()
        .find(|(k, _)| k == "sep")
        .map(|(_, v)| display_one(v))
        .unwrap_or_else(|| " ".to_string());
    let end = kw
        .iter()
        .find(|(k, _)| k == "end")
        .map(|(_, v)| display_one(v))
        .unwrap_or_else(|| "\n".to_string());
    let rendered: Vec<String> = pos.iter().map(display_one).collect();
    print!("{}{}", rendered.join(&sep), end);
    Ok(HostValue::None)
}

fn host_len(pos: &[HostValue], _kw: &[(String, HostValue)]) -> Result<HostValue, HostError> {
    let n = match &arg(pos, 0)? {
        HostValue::Str(s) => s.chars().count(),
        HostValue::Tuple(items) => items.len(),
        HostValue::List(items) => items.borrow().len(),
        HostValue::Dict(pairs) => pairs.borrow().len(),
        other => return Err(HostError::TypeError(format!("object of type {} has no len()", other.type_name()))),
    };
    Ok(HostValue::Int(n as i64))
}

fn host_int(pos: &[HostValue], _kw: &[(String, HostValue)]) -> Result<HostValue, HostError> {
    match &arg(pos, 0)? {
        HostValue::Int(n) => Ok(HostValue::Int(*n)),
        HostValue::Float(x) => Ok(HostValue::Int(*x as i64)),
        HostValue::Str(s) => s.trim().parse::<i64>().map(HostValue::Int).map_err(|_| HostError::TypeError(format!("invalid literal for int(): '{s}'"))),
        HostValue::Bool(b) => Ok(HostValue::Int(*b as i64)),
        other => Err(HostError::TypeError(format!("int() argument must be a string or a number, not '{}'", other.type_name()))),
    }
}

fn host_float(pos: &[HostValue], _kw: &[(String, HostValue)]) -> Result<HostValue, HostError> {
    match &arg(pos, 0)? {
        HostValue::Int(n) => Ok(HostValue::Float(*n as f64)),
        HostValue::Float(x) => Ok(HostValue::Float(*x)),
        HostValue::Str(s) => s.trim().parse::<f64>().map(HostValue::Float).map_err(|_| HostError::TypeError(format!("could not convert string to float: '{s}'"))),
        other => Err(HostError::TypeError(format!("float() argument must be a string or a number, not '{}'", other.type_name()))),
    }
}

fn host_list(pos: &[HostValue], _kw: &[(String, HostValue)]) -> Result<HostValue, HostError> {
    let items = match pos.first() {
        None => Vec::new(),
        Some(HostValue::Tuple(items)) => items.as_ref().clone(),
        Some(HostValue::List(items)) => items.borrow().clone(),
        Some(other) => return Err(HostError::TypeError(format!("'{}' object is not iterable", other.type_name()))),
    };
    Ok(HostValue::List(Rc::new(std::cell::RefCell::new(items))))
}

fn host_tuple(pos: &[HostValue], _kw: &[(String, HostValue)]) -> Result<HostValue, HostError> {
    let items = match pos.first() {
        None => Vec::new(),
        Some(HostValue::Tuple(items)) => items.as_ref().clone(),
        Some(HostValue::List(items)) => items.borrow().clone(),
        Some(other) => return Err(HostError::TypeError(format!("'{}' object is not iterable", other.type_name()))),
    };
    Ok(HostValue::Tuple(Rc::new(items)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::{self, Scope};

    #[test]
    fn integer_arithmetic_stays_integral() {
        let m = Module::new("tests.prelude");
        install(&m);
        let scope = Scope::root(m);
        let v = host::eval(
            &crate::host::HostExpr::Call {
                callee: Box::new(crate::host::HostExpr::Name("xPLUS_".into())),
                positional: vec![crate::host::HostExpr::Lit(crate::host::LitExpr::Int(1)), crate::host::HostExpr::Lit(crate::host::LitExpr::Int(2))],
                keywords: vec![],
                star: vec![],
                starstar: vec![],
            },
            &scope,
        )
        .unwrap();
        assert_eq!(v, HostValue::Int(3));
    }

    #[test]
    fn division_always_promotes_to_float() {
        assert_eq!(arith_div(&[HostValue::Int(4), HostValue::Int(2)], &[]).unwrap(), HostValue::Float(2.0));
    }

    #[test]
    fn print_joins_with_sep_and_ends_with_end() {
        let r = host_print(&[HostValue::Int(1), HostValue::Int(2)], &[("sep".into(), HostValue::str(":"))]);
        assert!(r.is_ok());
    }

    #[test]
    fn len_reports_string_char_count_not_byte_count() {
        let v = host_len(&[HostValue::str("héllo")], &[]).unwrap();
        assert_eq!(v, HostValue::Int(5));
    }

    #[test]
    fn repr_quotes_strings_and_str_does_not() {
        assert_eq!(repr(&HostValue::str("hi")), "'hi'");
        assert_eq!(display_one(&HostValue::str("hi")), "hi");
    }

    #[test]
    fn builtins_module_exposes_print_by_name() {
        let m = builtins_module();
        assert!(m.get("print").is_some());
        assert!(m.get("nonexistent").is_none());
    }
}
