//! Code generation: lowers an expanded [`Form`] to host source text and, in
//! lock step, to the [`HostExpr`] the embedded evaluator runs. Both are
//! built by the same recursive walk so the rendered text and the value the
//! REPL prints can never drift apart.
//!
//! Implements the two special forms, `quote` and `lambda`, plus the general
//! call grammar every other headed tuple falls through to.

use crate::error::EmitError;
use crate::form::{self, Atom, Form, HostLit};
use crate::host::{HostExpr, LitExpr, Param, ParamSpec};
use crate::munge::munge_symbol;

/// The result of lowering one form: source text paired with the expression
/// tree the embedded evaluator runs.
#[derive(Debug, Clone)]
pub struct Emitted {
    pub text: String,
    pub expr: HostExpr,
}

pub fn emit_all(forms: &[Form]) -> Result<Vec<Emitted>, EmitError> {
    forms.iter().map(emit).collect()
}

pub fn emit(form: &Form) -> Result<Emitted, EmitError> {
    match form {
        Form::Atom(Atom::Lit(lit)) => {
            let text = render_hostlit_text(lit);
            let expr = HostExpr::Lit(hostlit_to_litexpr(lit));
            Ok(Emitted { text, expr })
        }
        Form::Atom(Atom::Str(s)) => emit_symbol(s),
        Form::Tuple(items) if items.is_empty() => {
            Ok(Emitted { text: "()".to_string(), expr: HostExpr::Lit(LitExpr::Tuple(vec![])) })
        }
        Form::Tuple(items) if form.is_headed("quote") => emit_quote(items),
        Form::Tuple(items) if form.is_headed("lambda") => emit_lambda(items),
        Form::Tuple(items) => emit_call(items),
    }
}

fn emit_symbol(s: &str) -> Result<Emitted, EmitError> {
    if let Some((pkg, name)) = form::split_qualified(s) {
        let munged_pkg = pkg.split('.').map(munge_symbol).collect::<Vec<_>>().join(".");
        let munged_name = munge_symbol(name);
        let text = format!("{munged_pkg}.{munged_name}");
        let expr = HostExpr::Attr(Box::new(HostExpr::Import(pkg.to_string())), munged_name);
        return Ok(Emitted { text, expr });
    }
    let munged = munge_symbol(s);
    Ok(Emitted { text: munged.clone(), expr: HostExpr::Name(munged) })
}

// --- quote ---------------------------------------------------------------

fn emit_quote(items: &[Form]) -> Result<Emitted, EmitError> {
    if items.len() != 2 {
        return Err(EmitError::BadParamTuple("'quote' takes exactly one argument".into()));
    }
    let (text, lit) = emit_quoted(&items[1]);
    Ok(Emitted { text, expr: HostExpr::Lit(lit) })
}

/// Render a form as opaque data: symbol atoms keep their exact text (no
/// munging, no qualification) as bare strings, and tuples become nested
/// literal sequences.
///
/// A payload string literal (one that was read from source as `"..."`, held
/// as `Atom::Lit(HostLit::Str)`) is instead reconstructed as a nested
/// `('quote', <content>)` pair: a bare string in quoted data is otherwise
/// indistinguishable from a symbol name, so this is the only way re-reading
/// the quoted tuple as code could recover which one it was.
fn emit_quoted(form: &Form) -> (String, LitExpr) {
    match form {
        Form::Atom(Atom::Lit(HostLit::Str(s))) => {
            let content = unquote_host_str(s);
            let text = format!("('quote', {})", quote_literal_text(&content));
            let lit = LitExpr::Tuple(vec![LitExpr::Str("quote".to_string()), LitExpr::Str(content)]);
            (text, lit)
        }
        Form::Atom(Atom::Lit(lit)) => (render_hostlit_text(lit), hostlit_to_litexpr(lit)),
        Form::Atom(Atom::Str(s)) => (quote_literal_text(s), LitExpr::Str(s.clone())),
        Form::Tuple(items) => {
            let parts: Vec<(String, LitExpr)> = items.iter().map(emit_quoted).collect();
            let text = format!("({})", parts.iter().map(|(t, _)| t.clone()).collect::<Vec<_>>().join(", "));
            let lit = LitExpr::Tuple(parts.into_iter().map(|(_, l)| l).collect());
            (text, lit)
        }
    }
}

pub(crate) fn quote_literal_text(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('\'');
    for ch in s.chars() {
        match ch {
            '\'' => out.push_str("\\'"),
            '\\' => out.push_str("\\\\"),
            _ => out.push(ch),
        }
    }
    out.push('\'');
    out
}

// --- lambda ----------------------------------------------------------------

fn emit_lambda(items: &[Form]) -> Result<Emitted, EmitError> {
    if items.len() < 3 {
        return Err(EmitError::EmptyLambdaBody);
    }
    let params_form = &items[1];
    let body_forms = &items[2..];
    let Some(param_items) = params_form.as_tuple() else {
        return Err(EmitError::BadParamTuple("lambda parameter list must be a tuple".into()));
    };
    let spec = parse_params(param_items)?;

    let body: Vec<Emitted> = body_forms.iter().map(emit).collect::<Result<_, _>>()?;
    let body_text = if body.len() == 1 {
        body[0].text.clone()
    } else {
        format!("({})[-1]", body.iter().map(|e| e.text.clone()).collect::<Vec<_>>().join(", "))
    };
    let body_expr = HostExpr::Sequence(body.into_iter().map(|e| e.expr).collect());

    let text = format!("(lambda {}: {body_text})", render_params_text(&spec));
    Ok(Emitted { text, expr: HostExpr::Lambda { params: spec, body: Box::new(body_expr) } })
}

fn parse_params(items: &[Form]) -> Result<ParamSpec, EmitError> {
    let mut spec = ParamSpec::default();
    let colon = items.iter().position(|f| f.as_sym() == Some(":"));
    let (positional, paired) = match colon {
        Some(i) => (&items[..i], &items[i + 1..]),
        None => (items, &items[..0]),
    };

    for p in positional {
        let name = p
            .as_sym()
            .ok_or_else(|| EmitError::BadParamTuple("positional parameter must be a bare name".into()))?;
        spec.positional.push(munge_symbol(name));
    }

    let mut idx = 0usize;
    let mut post_star = false;
    while idx < paired.len() {
        let tok = paired[idx].as_sym();
        match tok {
            Some(":*") => {
                idx += 1;
                if paired.get(idx).and_then(Form::as_sym) == Some(":?") {
                    spec.bare_star = true;
                    idx += 1;
                } else {
                    let name = paired
                        .get(idx)
                        .and_then(Form::as_sym)
                        .ok_or_else(|| EmitError::BadParamTuple("':*' must be followed by a name or ':?'".into()))?;
                    spec.star_args = Some(munge_symbol(name));
                    idx += 1;
                }
                post_star = true;
            }
            Some(":**") => {
                idx += 1;
                let name = paired
                    .get(idx)
                    .and_then(Form::as_sym)
                    .ok_or_else(|| EmitError::BadParamTuple("':**' must be followed by a name".into()))?;
                spec.star_kwargs = Some(munge_symbol(name));
                idx += 1;
            }
            Some(name) => {
                let value_tok = paired.get(idx + 1);
                let param = if value_tok.and_then(Form::as_sym) == Some(":?") {
                    Param { name: munge_symbol(name), default: None }
                } else {
                    let default_form = value_tok
                        .ok_or_else(|| EmitError::BadParamTuple(format!("parameter '{name}' is missing a default")))?;
                    Param { name: munge_symbol(name), default: Some(emit(default_form)?.expr) }
                };
                idx += 2;
                if post_star {
                    spec.kwonly.push(param);
                } else {
                    spec.pre_star.push(param);
                }
            }
            None => return Err(EmitError::BadParamTuple("parameter name must be a bare symbol".into())),
        }
    }
    Ok(spec)
}

fn render_params_text(spec: &ParamSpec) -> String {
    let mut parts = Vec::new();
    parts.extend(spec.positional.iter().cloned());
    for p in &spec.pre_star {
        match &p.default {
            Some(d) => parts.push(format!("{}={}", p.name, render_expr_text(d))),
            None => parts.push(p.name.clone()),
        }
    }
    if let Some(name) = &spec.star_args {
        parts.push(format!("*{name}"));
    } else if spec.bare_star || !spec.kwonly.is_empty() {
        if spec.star_args.is_none() {
            parts.push("*".to_string());
        }
    }
    for p in &spec.kwonly {
        match &p.default {
            Some(d) => parts.push(format!("{}={}", p.name, render_expr_text(d))),
            None => parts.push(p.name.clone()),
        }
    }
    if let Some(name) = &spec.star_kwargs {
        parts.push(format!("**{name}"));
    }
    parts.join(", ")
}

/// Best-effort re-rendering of an already-lowered default-value expression,
/// used only for the parameter-list text (the expression tree itself, not
/// this text, is what the evaluator runs).
fn render_expr_text(expr: &HostExpr) -> String {
    match expr {
        HostExpr::Lit(lit) => render_litexpr_text(lit),
        HostExpr::Name(n) => n.clone(),
        HostExpr::Attr(base, attr) => format!("{}.{attr}", render_expr_text(base)),
        HostExpr::Import(path) => path.clone(),
        HostExpr::Call { callee, positional, keywords, star, starstar } => {
            let mut args: Vec<String> = positional.iter().map(render_expr_text).collect();
            args.extend(keywords.iter().map(|(k, v)| format!("{k}={}", render_expr_text(v))));
            args.extend(star.iter().map(|e| format!("*{}", render_expr_text(e))));
            args.extend(starstar.iter().map(|e| format!("**{}", render_expr_text(e))));
            format!("{}({})", render_expr_text(callee), args.join(", "))
        }
        HostExpr::Lambda { .. } => "<lambda>".to_string(),
        HostExpr::Sequence(exprs) => exprs.last().map(render_expr_text).unwrap_or_default(),
    }
}

fn render_litexpr_text(lit: &LitExpr) -> String {
    match lit {
        LitExpr::Int(n) => format!("({n})"),
        LitExpr::Float(x) => format!("({x})"),
        LitExpr::Complex(re, im) => format!("({re}+{im}j)"),
        LitExpr::Str(s) => quote_literal_text(s),
        LitExpr::Bool(b) => b.to_string(),
        LitExpr::None => "None".to_string(),
        LitExpr::List(items) => format!("[{}]", items.iter().map(render_litexpr_text).collect::<Vec<_>>().join(", ")),
        LitExpr::Tuple(items) => format!("({})", items.iter().map(render_litexpr_text).collect::<Vec<_>>().join(", ")),
        LitExpr::Dict(pairs) => format!(
            "{{{}}}",
            pairs.iter().map(|(k, v)| format!("{}: {}", render_litexpr_text(k), render_litexpr_text(v))).collect::<Vec<_>>().join(", ")
        ),
    }
}

// --- general call ---------------------------------------------------------

fn emit_call(items: &[Form]) -> Result<Emitted, EmitError> {
    let head = &items[0];
    if let Some(method) = head.as_sym().filter(|s| form::is_method_symbol(s)) {
        return emit_method_call(method, &items[1..]);
    }

    let callee = emit(head)?;
    let colon = items[1..].iter().position(|f| f.as_sym() == Some(":"));
    let (positional_forms, paired_forms) = match colon {
        Some(i) => (&items[1..1 + i], &items[1 + i + 1..]),
        None => (&items[1..], &items[..0]),
    };
    let positional: Vec<Emitted> = positional_forms.iter().map(emit).collect::<Result<_, _>>()?;
    let (keywords, star, starstar) = parse_call_pairing(paired_forms)?;

    let args_text = render_call_args(&positional, &keywords, &star, &starstar);
    let text = format!("{}({})", callee.text, args_text);
    let expr = HostExpr::Call {
        callee: Box::new(callee.expr),
        positional: positional.into_iter().map(|e| e.expr).collect(),
        keywords: keywords.into_iter().map(|(k, e)| (k, e.expr)).collect(),
        star: star.into_iter().map(|e| e.expr).collect(),
        starstar: starstar.into_iter().map(|e| e.expr).collect(),
    };
    Ok(Emitted { text, expr })
}

fn emit_method_call(method: &str, rest: &[Form]) -> Result<Emitted, EmitError> {
    if rest.is_empty() {
        return Err(EmitError::BadPairing("method call requires at least one argument (the receiver)".into()));
    }
    let colon = rest[1..].iter().position(|f| f.as_sym() == Some(":"));
    let (positional_forms, paired_forms) = match colon {
        Some(i) => (&rest[1..1 + i], &rest[1 + i + 1..]),
        None => (&rest[1..], &rest[..0]),
    };
    let receiver = emit(&rest[0])?;
    let positional: Vec<Emitted> = positional_forms.iter().map(emit).collect::<Result<_, _>>()?;
    let (keywords, star, starstar) = parse_call_pairing(paired_forms)?;

    let method_name = munge_symbol(&method[1..]);
    let args_text = render_call_args(&positional, &keywords, &star, &starstar);
    let text = format!("{}.{method_name}({args_text})", receiver.text);
    let expr = HostExpr::Call {
        callee: Box::new(HostExpr::Attr(Box::new(receiver.expr), method_name)),
        positional: positional.into_iter().map(|e| e.expr).collect(),
        keywords: keywords.into_iter().map(|(k, e)| (k, e.expr)).collect(),
        star: star.into_iter().map(|e| e.expr).collect(),
        starstar: starstar.into_iter().map(|e| e.expr).collect(),
    };
    Ok(Emitted { text, expr })
}

type Pairing = (Vec<(String, Emitted)>, Vec<Emitted>, Vec<Emitted>);

fn parse_call_pairing(paired: &[Form]) -> Result<Pairing, EmitError> {
    let mut keywords = Vec::new();
    let mut star = Vec::new();
    let mut starstar = Vec::new();
    let mut idx = 0usize;
    while idx < paired.len() {
        match paired[idx].as_sym() {
            Some(":*") => {
                let value = paired.get(idx + 1).ok_or_else(|| EmitError::BadPairing("':*' with no value".into()))?;
                star.push(emit(value)?);
                idx += 2;
            }
            Some(":**") => {
                let value = paired.get(idx + 1).ok_or_else(|| EmitError::BadPairing("':**' with no value".into()))?;
                starstar.push(emit(value)?);
                idx += 2;
            }
            Some(name) => {
                let value = paired
                    .get(idx + 1)
                    .ok_or_else(|| EmitError::BadPairing(format!("keyword '{name}' is missing a value")))?;
                keywords.push((munge_symbol(name), emit(value)?));
                idx += 2;
            }
            None => return Err(EmitError::BadPairing("call keyword must be a bare symbol".into())),
        }
    }
    Ok((keywords, star, starstar))
}

fn render_call_args(
    positional: &[Emitted],
    keywords: &[(String, Emitted)],
    star: &[Emitted],
    starstar: &[Emitted],
) -> String {
    let mut parts: Vec<String> = positional.iter().map(|e| e.text.clone()).collect();
    parts.extend(keywords.iter().map(|(k, v)| format!("{k}={}", v.text)));
    parts.extend(star.iter().map(|e| format!("*{}", e.text)));
    parts.extend(starstar.iter().map(|e| format!("**{}", e.text)));
    parts.join(", ")
}

// --- host-literal rendering ------------------------------------------------

fn render_hostlit_text(lit: &HostLit) -> String {
    match lit {
        HostLit::Int(_) | HostLit::Float(_) | HostLit::Complex(..) => format!("({lit})"),
        HostLit::Str(s) => s.clone(),
        HostLit::List(items) => format!("[{}]", items.iter().map(render_hostlit_text).collect::<Vec<_>>().join(",")),
        HostLit::Dict(pairs) => format!(
            "{{{}}}",
            pairs.iter().map(|(k, v)| format!("{}: {}", render_hostlit_text(k), render_hostlit_text(v))).collect::<Vec<_>>().join(",")
        ),
    }
}

fn hostlit_to_litexpr(lit: &HostLit) -> LitExpr {
    match lit {
        HostLit::Int(n) => LitExpr::Int(*n),
        HostLit::Float(x) => LitExpr::Float(*x),
        HostLit::Complex(re, im) => LitExpr::Complex(*re, *im),
        HostLit::Str(s) => LitExpr::Str(unquote_host_str(s)),
        HostLit::List(items) => LitExpr::List(items.iter().map(hostlit_to_litexpr).collect()),
        HostLit::Dict(pairs) => LitExpr::Dict(pairs.iter().map(|(k, v)| (hostlit_to_litexpr(k), hostlit_to_litexpr(v))).collect()),
    }
}

fn unquote_host_str(s: &str) -> String {
    let inner = s.strip_prefix('\'').and_then(|r| r.strip_suffix('\'')).unwrap_or(s);
    inner.replace("\\'", "'").replace("\\\\", "\\")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_atom_is_wrapped_in_parens() {
        let e = emit(&Form::int(5)).unwrap();
        assert_eq!(e.text, "(5)");
    }

    #[test]
    fn bracket_literal_wraps_nested_numbers_only() {
        let form = Form::Atom(Atom::Lit(HostLit::List(vec![
            HostLit::Int(4),
            HostLit::Str("'5'".into()),
            HostLit::Int(6),
        ])));
        let e = emit(&form).unwrap();
        assert_eq!(e.text, "[(4),'5',(6)]");
    }

    #[test]
    fn plain_call_emits_positional_args() {
        let form = Form::tuple(vec![Form::sym("add"), Form::int(1), Form::int(2)]);
        let e = emit(&form).unwrap();
        assert_eq!(e.text, "add((1), (2))");
    }

    #[test]
    fn method_call_emits_dotted_call() {
        let form = Form::tuple(vec![Form::sym(".upper"), Form::sym("s")]);
        let e = emit(&form).unwrap();
        assert_eq!(e.text, "s.upper()");
    }

    #[test]
    fn quoted_symbol_keeps_raw_text_unmunged() {
        let form = Form::tuple(vec![Form::sym("quote"), Form::sym("enlist")]);
        let e = emit(&form).unwrap();
        assert_eq!(e.text, "'enlist'");
    }

    #[test]
    fn quoted_tuple_nests_as_literal() {
        let form = Form::tuple(vec![Form::sym("quote"), Form::tuple(vec![Form::sym("a"), Form::int(1)])]);
        let e = emit(&form).unwrap();
        assert_eq!(e.text, "('a', (1))");
    }

    #[test]
    fn lambda_parameter_grammar_matches_worked_example() {
        let params = Form::tuple(vec![
            Form::sym("a"),
            Form::sym("b"),
            Form::sym(":"),
            Form::sym("e"),
            Form::int(1),
            Form::sym("f"),
            Form::int(2),
            Form::sym(":*"),
            Form::sym("args"),
            Form::sym("h"),
            Form::int(4),
            Form::sym("i"),
            Form::sym(":?"),
            Form::sym("j"),
            Form::int(1),
            Form::sym(":**"),
            Form::sym("kw"),
        ]);
        let lambda = Form::tuple(vec![Form::sym("lambda"), params, Form::int(42)]);
        let e = emit(&lambda).unwrap();
        assert_eq!(e.text, "(lambda a, b, e=(1), f=(2), *args, h=(4), i, j=(1), **kw: (42))");
    }

    #[test]
    fn bare_star_with_no_capture_and_required_kwonly() {
        let params = Form::tuple(vec![
            Form::sym(":"),
            Form::sym(":*"),
            Form::sym(":?"),
            Form::sym("x"),
            Form::sym(":?"),
        ]);
        let lambda = Form::tuple(vec![Form::sym("lambda"), params, Form::int(1)]);
        let e = emit(&lambda).unwrap();
        assert_eq!(e.text, "(lambda *, x: (1))");
    }

    #[test]
    fn empty_tuple_is_self_evaluating() {
        let e = emit(&Form::tuple(vec![])).unwrap();
        assert_eq!(e.text, "()");
    }
}
