//! Top-level pipeline orchestration: source text in, emitted source (and,
//! for the REPL, evaluated results) out. Ties the reader, expander, emitter,
//! and bridge together the way a caller actually wants to use them.

use crate::bridge::{EmbeddedBridge, EvaluatorBridge};
use crate::emitter::{self, Emitted};
use crate::error::CompileError;
use crate::expander;
use crate::host::HostValue;
use crate::module::Module;
use crate::reader;
use std::rc::Rc;

/// A compiler bound to one module: owns the bridge that backs `.#`
/// injection and macro calls during its own compilation.
pub struct Compiler {
    module: Rc<Module>,
}

impl Compiler {
    pub fn new(module: Rc<Module>) -> Self {
        Compiler { module }
    }

    pub fn module(&self) -> &Rc<Module> {
        &self.module
    }

    /// Read, expand, and emit every top-level form in `src`, without
    /// running any of it (beyond whatever `.#` and macros need at compile
    /// time). Suitable for producing a source file to hand to a real host.
    pub fn compile_text(&self, src: &str) -> Result<Vec<Emitted>, CompileError> {
        let bridge = EmbeddedBridge::new(self.module.clone());
        let injector = bridge.injector();
        let forms = reader::read_all_with(src, &self.module, Some(&injector))?;
        let expanded = expander::expand_all(forms, &self.module)?;
        emitter::emit_all(&expanded).map_err(|e| {
            CompileError::new(crate::error::Phase::Emit, crate::span::Span::default(), e)
        })
    }

    /// Read, expand, emit, and evaluate every top-level form in `src`,
    /// returning each form's resulting value in order. What a file-loader
    /// or a one-shot `-c` evaluation would use.
    pub fn eval_text(&self, src: &str) -> Result<Vec<HostValue>, CompileError> {
        let bridge = EmbeddedBridge::new(self.module.clone());
        let injector = bridge.injector();
        let forms = reader::read_all_with(src, &self.module, Some(&injector))?;
        forms.iter().map(|f| bridge.eval_top(f)).collect()
    }

    /// Read, expand, emit, and evaluate a single top-level form from `src`,
    /// returning `None` if `src` holds no complete form (e.g. it's blank, or
    /// the REPL's input buffer is still waiting on a closing paren). Unlike
    /// `eval_text`, anything in `src` past the first complete form is left
    /// unread — the shape a REPL needs so it can show a result immediately
    /// after each input instead of waiting for an entire buffer.
    pub fn eval_one(&self, src: &str) -> Result<Option<HostValue>, CompileError> {
        let bridge = EmbeddedBridge::new(self.module.clone());
        let injector = bridge.injector();
        let mut r = reader::Reader::new(src, self.module.clone(), Some(&injector));
        match r.read_one()? {
            Some(form) => bridge.eval_top(&form).map(Some),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compile_text_emits_source_for_each_top_level_form() {
        let module = Module::new("tests.compiler");
        let compiler = Compiler::new(module);
        let emitted = compiler.compile_text("(f 1 2) (g 3)").unwrap();
        assert_eq!(emitted.len(), 2);
        assert_eq!(emitted[0].text, "f((1), (2))");
        assert_eq!(emitted[1].text, "g((3))");
    }

    #[test]
    fn eval_text_runs_builtins_registered_on_the_module() {
        let module = Module::new("tests.compiler");
        module.define(
            "inc",
            HostValue::Builtin(std::rc::Rc::new(|pos: &[HostValue], _kw: &[(String, HostValue)]| {
                let HostValue::Int(n) = &pos[0] else {
                    return Err(crate::error::HostError::TypeError("inc expects an int".into()));
                };
                Ok(HostValue::Int(n + 1))
            })),
        );
        let compiler = Compiler::new(module);
        let values = compiler.eval_text("(inc 41)").unwrap();
        assert_eq!(values, vec![HostValue::Int(42)]);
    }
}
