//! End-to-end reader -> expander -> emitter -> host scenarios, mirroring the
//! worked examples a Hissp implementation is expected to satisfy.

use hissp::bridge::{EmbeddedBridge, EvaluatorBridge};
use hissp::compiler::Compiler;
use hissp::error::HostError;
use hissp::host::{self, HostValue};
use hissp::module::Module;
use hissp::reader;
use std::rc::Rc;

fn new_module(name: &str) -> Rc<Module> {
    let module = Module::new(name);
    hissp::prelude::install(&module);
    module
}

#[test]
fn hello_world_emits_and_runs_a_bare_print_call() {
    let module = new_module("tests.e2e.hello");
    let compiler = Compiler::new(module.clone());

    let emitted = compiler.compile_text(r#"(print "Hello, World!")"#).unwrap();
    assert_eq!(emitted.len(), 1);
    assert_eq!(emitted[0].text, "print('Hello, World!')");

    let values = compiler.eval_text(r#"(print "Hello, World!")"#).unwrap();
    assert_eq!(values, vec![HostValue::None]);
}

#[test]
fn qualified_print_with_keyword_separator_renders_expected_text() {
    let module = new_module("tests.e2e.qualified");
    let compiler = Compiler::new(module);

    let src = r#"(builtins..print 1 2j 3.0 [4,'5',6] : sep ":")"#;
    let emitted = compiler.compile_text(src).unwrap();
    assert_eq!(emitted.len(), 1);
    assert_eq!(emitted[0].text, "builtins.print((1), (2j), (3.0), [(4),'5',(6)], sep=':')");

    // Running it exercises the embedded host end to end; print's return
    // value is always None regardless of what it wrote to stdout.
    let values = compiler.eval_text(src).unwrap();
    assert_eq!(values, vec![HostValue::None]);
}

#[test]
fn quoting_a_call_yields_a_structured_tuple_of_its_parts() {
    let module = new_module("tests.e2e.quote");
    let compiler = Compiler::new(module);

    let src = r#"(quote (builtins..print 1 2j 3.0 [4,'5',6] : sep ":"))"#;
    let values = compiler.eval_text(src).unwrap();
    assert_eq!(values.len(), 1);

    let expected = HostValue::Tuple(Rc::new(vec![
        HostValue::str("builtins..print"),
        HostValue::Int(1),
        HostValue::Complex(0.0, 2.0),
        HostValue::Float(3.0),
        HostValue::List(Rc::new(std::cell::RefCell::new(vec![
            HostValue::Int(4),
            HostValue::str("5"),
            HostValue::Int(6),
        ]))),
        HostValue::str(":"),
        HostValue::str("sep"),
        // A payload string literal nested inside quoted data reconstructs as
        // `(quote <text>)`, the only way it stays distinguishable from a
        // bare symbol string once the tuple is itself read back as code.
        HostValue::Tuple(Rc::new(vec![HostValue::str("quote"), HostValue::str(":")])),
    ]));
    assert_eq!(values[0], expected);
}

#[test]
fn lambda_parameter_grammar_binds_positional_default_star_and_keyword_only() {
    let module = new_module("tests.e2e.lambda");
    let compiler = Compiler::new(module.clone());
    let bridge = EmbeddedBridge::new(module.clone());

    let src = "(lambda (a b : e 1 f 2 :* args h 4 i :? j 1 :** kw) 42)";
    let forms = reader::read_all(src, &module).unwrap();
    assert_eq!(forms.len(), 1);
    let lambda_value = bridge.eval_top(&forms[0]).unwrap();
    let HostValue::Lambda(lam) = lambda_value else { panic!("expected a lambda value") };

    // `i` is the required keyword-only parameter introduced by the `:?`
    // no-default marker; calling without it must fail...
    let missing_i = host::call(HostValue::Lambda(lam.clone()), &[HostValue::Int(1), HostValue::Int(2)], &[]);
    assert!(matches!(missing_i, Err(HostError::TypeError(_))));

    // ...and supplying it returns the lambda body's literal 42 regardless of
    // what else was passed, since the body ignores every parameter.
    let result = host::call(
        HostValue::Lambda(lam),
        &[HostValue::Int(1), HostValue::Int(2)],
        &[("i".to_string(), HostValue::Int(10))],
    )
    .unwrap();
    assert_eq!(result, HostValue::Int(42));
}

#[test]
fn auto_gensym_is_shared_within_one_template_and_fresh_between_siblings() {
    let module = Module::new("tests.e2e.gensym");

    // Two sibling top-level templates, each using `$#x` twice.
    let forms = reader::read_all("`($#x $#x) `($#x $#x)", &module).unwrap();
    assert_eq!(forms.len(), 2);

    // Within one template, both `$#x` occurrences name the same generated
    // symbol.
    let HostValue::Tuple(first) = host_eval_form(&module, &forms[0]) else { panic!("expected a tuple") };
    assert_eq!(first.len(), 2);
    assert_eq!(first[0], first[1]);

    let HostValue::Tuple(second) = host_eval_form(&module, &forms[1]) else { panic!("expected a tuple") };
    assert_eq!(second.len(), 2);
    assert_eq!(second[0], second[1]);

    // Between the two sibling templates, the generated symbols differ.
    assert_ne!(first[0], second[0]);
}

fn host_eval_form(module: &Rc<Module>, form: &hissp::form::Form) -> HostValue {
    let emitted = hissp::emitter::emit(form).unwrap();
    let scope = host::Scope::root(module.clone());
    host::eval(&emitted.expr, &scope).unwrap()
}

#[test]
fn empty_tuple_compiles_to_unit_and_equals_itself_under_quote() {
    let module = new_module("tests.e2e.empty");
    let compiler = Compiler::new(module);

    let bare = compiler.eval_text("()").unwrap();
    let quoted = compiler.eval_text("(quote ())").unwrap();
    assert_eq!(bare, vec![HostValue::Tuple(Rc::new(vec![]))]);
    assert_eq!(bare, quoted);
}

#[test]
fn one_arg_method_call_compiles_to_a_zero_arg_method_invocation() {
    let module = new_module("tests.e2e.method");
    let compiler = Compiler::new(module);

    let emitted = compiler.compile_text("(.upper greeting)").unwrap();
    assert_eq!(emitted[0].text, "greeting.upper()");
}

#[test]
fn macro_bound_in_module_expands_via_its_module_qualified_name() {
    let module = Module::new("tests.e2e.macros");
    // A classic "enlist" macro: collects its unevaluated argument forms
    // into a single tuple, the way a user macro bound in `_macro_` would.
    module.define_macro(
        "enlist",
        HostValue::Builtin(Rc::new(|pos: &[HostValue], _kw: &[(String, HostValue)]| {
            Ok(HostValue::Tuple(Rc::new(pos.to_vec())))
        })),
    );

    let expected = hissp::form::Form::tuple(vec![hissp::form::Form::sym("a"), hissp::form::Form::sym("b")]);

    // Macro calls may be spelled either under the bare name or qualified
    // with the compiling module's own name via the `_macro_` namespace
    // segment; both must resolve to the same registered macro and produce
    // the same expansion. A qualified name missing `_macro_` is an ordinary
    // attribute reference, not a macro call, and must not expand.
    for src in ["(enlist a b)", "(tests.e2e.macros.._macro_.enlist a b)"] {
        let forms = reader::read_all(src, &module).unwrap();
        let expanded = hissp::expander::expand_one(forms[0].clone(), &module).unwrap();
        assert_eq!(expanded, expected);
    }
}

#[test]
fn qualified_name_without_macro_segment_is_not_treated_as_a_macro_call() {
    let module = Module::new("tests.e2e.macros_attr");
    module.define_macro(
        "enlist",
        HostValue::Builtin(Rc::new(|pos: &[HostValue], _kw: &[(String, HostValue)]| {
            Ok(HostValue::Tuple(Rc::new(pos.to_vec())))
        })),
    );

    let src = "(tests.e2e.macros_attr..enlist a b)";
    let forms = reader::read_all(src, &module).unwrap();
    let expanded = hissp::expander::expand_one(forms[0].clone(), &module).unwrap();
    // Left alone: the head is an ordinary qualified reference, so the call
    // form passes through unexpanded (its children still get recursed into,
    // but none of them are macro calls either).
    assert_eq!(expanded, forms[0]);
}

#[test]
fn dot_hash_injector_splices_a_compile_time_value_into_the_tree() {
    let module = new_module("tests.e2e.inject");
    let bridge = EmbeddedBridge::new(module.clone());
    let injector = bridge.injector();

    let forms = reader::read_all_with("(quote .#(+ 20 22))", &module, Some(&injector)).unwrap();
    let value = bridge.eval_top(&forms[0]).unwrap();
    assert_eq!(value, HostValue::Int(42));
}
