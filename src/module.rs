//! A compiling module: its global namespace, its `_macro_` namespace, the
//! per-module reader-macro registry cache, and its gensym counter.

use crate::host::HostValue;
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

pub struct Module {
    pub name: String,
    globals: RefCell<HashMap<String, HostValue>>,
    macro_ns: RefCell<HashMap<String, HostValue>>,
    reader_macros: RefCell<HashMap<String, HostValue>>,
    gensym_counter: Cell<u64>,
}

impl Module {
    pub fn new(name: impl Into<String>) -> Rc<Self> {
        Rc::new(Module {
            name: name.into(),
            globals: RefCell::new(HashMap::new()),
            macro_ns: RefCell::new(HashMap::new()),
            reader_macros: RefCell::new(HashMap::new()),
            gensym_counter: Cell::new(0),
        })
    }

    /// Bind `name` in the module's global namespace. `name` is munged
    /// before storage, since lookups at evaluation time come from emitted
    /// identifier text (already munged) rather than the original symbol.
    pub fn define(&self, name: &str, value: HostValue) {
        self.globals.borrow_mut().insert(crate::munge::munge_symbol(name), value);
    }

    /// Look up a global by its already-munged identifier text.
    pub fn get(&self, name: &str) -> Option<HostValue> {
        self.globals.borrow().get(name).cloned()
    }

    pub fn define_macro(&self, name: &str, value: HostValue) {
        self.macro_ns.borrow_mut().insert(name.to_string(), value);
    }

    pub fn get_macro(&self, name: &str) -> Option<HostValue> {
        self.macro_ns.borrow().get(name).cloned()
    }

    pub fn define_reader_macro(&self, name: &str, value: HostValue) {
        self.reader_macros.borrow_mut().insert(name.to_string(), value);
    }

    pub fn get_reader_macro(&self, name: &str) -> Option<HostValue> {
        self.reader_macros.borrow().get(name).cloned()
    }

    /// A fresh hash shared by every `$#name` occurrence within one top-level
    /// quasiquote; sibling top-level quasiquotes get different hashes.
    pub fn fresh_gensym_hash(&self) -> String {
        let n = self.gensym_counter.get();
        self.gensym_counter.set(n + 1);
        format!("{n:04x}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn globals_round_trip() {
        let m = Module::new("tests.mod");
        m.define("x", HostValue::Int(1));
        assert_eq!(m.get("x"), Some(HostValue::Int(1)));
        assert_eq!(m.get("y"), None);
    }

    #[test]
    fn macro_namespace_is_distinct_from_globals() {
        let m = Module::new("tests.mod");
        m.define_macro("enlist", HostValue::Int(1));
        assert_eq!(m.get("enlist"), None);
        assert_eq!(m.get_macro("enlist"), Some(HostValue::Int(1)));
    }

    #[test]
    fn gensym_hashes_are_distinct_and_increasing() {
        let m = Module::new("tests.mod");
        let a = m.fresh_gensym_hash();
        let b = m.fresh_gensym_hash();
        assert_ne!(a, b);
    }
}
