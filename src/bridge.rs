//! The evaluator bridge: the seam between the compiler and whatever runs
//! the emitted code. Macro calls, `.#` injection, and the REPL all need to
//! run host code *during* compilation, not just after it, so the compiler
//! depends on this trait instead of calling the evaluator directly.
//!
//! [`EmbeddedBridge`] is the only implementation this crate ships: since
//! there is no external host process to shell out to, it evaluates through
//! the same [`crate::host`] tree-walker the rest of the pipeline uses.

use crate::emitter;
use crate::error::{CompileError, HostError, Phase};
use crate::expander;
use crate::form::Form;
use crate::host::{self, HostValue, Scope};
use crate::module::Module;
use crate::span::Span;
use std::rc::Rc;

pub trait EvaluatorBridge {
    /// Expand, emit, and run one top-level form, returning its value.
    fn eval_top(&self, form: &Form) -> Result<HostValue, CompileError>;

    /// Bind a name directly in the bridge's module, bypassing compilation
    /// (used to seed builtins before any source is read).
    fn define(&self, name: &str, value: HostValue);
}

/// The bridge backing this crate's own embedded host.
pub struct EmbeddedBridge {
    module: Rc<Module>,
}

impl EmbeddedBridge {
    pub fn new(module: Rc<Module>) -> Self {
        EmbeddedBridge { module }
    }

    pub fn module(&self) -> &Rc<Module> {
        &self.module
    }

    /// A closure suitable for [`crate::reader::Reader`]'s `.#` injector:
    /// compiles and runs `form` right now, through this same bridge.
    pub fn injector(&self) -> impl Fn(&Form) -> Result<HostValue, HostError> + '_ {
        move |form: &Form| {
            self.eval_top(form).map_err(|err| match err.cause {
                crate::error::HisspError::Host(e) => e,
                other => HostError::Other(other.to_string()),
            })
        }
    }
}

impl EvaluatorBridge for EmbeddedBridge {
    fn eval_top(&self, form: &Form) -> Result<HostValue, CompileError> {
        let expanded = expander::expand_one(form.clone(), &self.module)?;
        let emitted = emitter::emit(&expanded).map_err(|e| CompileError::new(Phase::Emit, Span::default(), e))?;
        let scope = Scope::root(self.module.clone());
        host::eval(&emitted.expr, &scope).map_err(|e| CompileError::new(Phase::Host, Span::default(), e))
    }

    fn define(&self, name: &str, value: HostValue) {
        self.module.define(name, value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reader;

    #[test]
    fn eval_top_runs_a_simple_call() {
        let module = Module::new("tests.bridge");
        module.define(
            "add",
            HostValue::Builtin(Rc::new(|pos: &[HostValue], _kw: &[(String, HostValue)]| {
                let (HostValue::Int(a), HostValue::Int(b)) = (&pos[0], &pos[1]) else {
                    return Err(HostError::TypeError("add expects two ints".into()));
                };
                Ok(HostValue::Int(a + b))
            })),
        );
        let bridge = EmbeddedBridge::new(module.clone());
        let forms = reader::read_all("(add 1 2)", &module).unwrap();
        let value = bridge.eval_top(&forms[0]).unwrap();
        assert_eq!(value, HostValue::Int(3));
    }

    #[test]
    fn macro_registered_in_module_expands_before_eval() {
        let module = Module::new("tests.bridge");
        module.define_macro(
            "twice",
            HostValue::Builtin(Rc::new(|pos: &[HostValue], _kw| {
                // (twice x) -> (+ x x), represented here directly as data.
                Ok(HostValue::Tuple(Rc::new(vec![HostValue::str("+"), pos[0].clone(), pos[0].clone()])))
            })),
        );
        module.define(
            "+",
            HostValue::Builtin(Rc::new(|pos: &[HostValue], _kw: &[(String, HostValue)]| {
                let (HostValue::Int(a), HostValue::Int(b)) = (&pos[0], &pos[1]) else {
                    return Err(HostError::TypeError("+ expects two ints".into()));
                };
                Ok(HostValue::Int(a + b))
            })),
        );
        let bridge = EmbeddedBridge::new(module.clone());
        let forms = reader::read_all("(twice 21)", &module).unwrap();
        let value = bridge.eval_top(&forms[0]).unwrap();
        assert_eq!(value, HostValue::Int(42));
    }
}
