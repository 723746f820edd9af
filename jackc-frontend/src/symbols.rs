//! Symbol table for the Jack compiler
//!
//! Two scopes: class scope holds `static` and `field` variables for the
//! lifetime of the class; subroutine scope holds `arg` and `var` variables
//! and is cleared, with its counters reset, at the start of every
//! subroutine. Lookups check subroutine scope first, so a subroutine
//! variable shadows a class variable of the same name. A name found in
//! neither scope is treated by callers as a class or function reference,
//! not a variable.

use jackc_common::VarKind;
use std::collections::HashMap;

/// Which kind of subroutine a scope is opened for. Only methods receive the
/// implicit `this` receiver as argument 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubroutineKind {
    Constructor,
    Function,
    Method,
}

#[derive(Debug, Clone)]
struct SymbolEntry {
    ty: String,
    kind: VarKind,
    index: u16,
}

/// Two-scope identifier table with per-kind index counters.
#[derive(Debug, Default)]
pub struct SymbolTable {
    class_scope: HashMap<String, SymbolEntry>,
    subroutine_scope: HashMap<String, SymbolEntry>,
    static_count: u16,
    field_count: u16,
    arg_count: u16,
    var_count: u16,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Define a new variable. Indices are 0-based and unique within their
    /// kind and scope, assigned in call order.
    pub fn define(&mut self, name: &str, ty: &str, kind: VarKind) {
        let counter = match kind {
            VarKind::Static => &mut self.static_count,
            VarKind::Field => &mut self.field_count,
            VarKind::Arg => &mut self.arg_count,
            VarKind::Var => &mut self.var_count,
        };
        let entry = SymbolEntry {
            ty: ty.to_string(),
            kind,
            index: *counter,
        };
        *counter += 1;
        let scope = match kind {
            VarKind::Static | VarKind::Field => &mut self.class_scope,
            VarKind::Arg | VarKind::Var => &mut self.subroutine_scope,
        };
        scope.insert(name.to_string(), entry);
    }

    /// Open a fresh subroutine scope: clears all subroutine variables and
    /// resets the arg/var counters. For a method the implicit receiver is
    /// defined as `this`, arg 0, of the class's own type — reserving index 0
    /// ahead of the explicit parameters.
    pub fn start_subroutine(&mut self, kind: SubroutineKind, class_name: &str) {
        self.subroutine_scope.clear();
        self.arg_count = 0;
        self.var_count = 0;
        if kind == SubroutineKind::Method {
            self.define("this", class_name, VarKind::Arg);
        }
    }

    fn lookup(&self, name: &str) -> Option<&SymbolEntry> {
        self.subroutine_scope
            .get(name)
            .or_else(|| self.class_scope.get(name))
    }

    pub fn kind_of(&self, name: &str) -> Option<VarKind> {
        self.lookup(name).map(|e| e.kind)
    }

    pub fn type_of(&self, name: &str) -> Option<&str> {
        self.lookup(name).map(|e| e.ty.as_str())
    }

    pub fn index_of(&self, name: &str) -> Option<u16> {
        self.lookup(name).map(|e| e.index)
    }

    /// Current counter value for a kind: sizes a subroutine's local-frame
    /// declaration (`Var`) and a constructor's receiver allocation (`Field`).
    pub fn var_count(&self, kind: VarKind) -> u16 {
        match kind {
            VarKind::Static => self.static_count,
            VarKind::Field => self.field_count,
            VarKind::Arg => self.arg_count,
            VarKind::Var => self.var_count,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sequential_defines_number_from_zero() {
        let mut table = SymbolTable::new();
        for (i, name) in ["a", "b", "c"].iter().enumerate() {
            table.define(name, "int", VarKind::Field);
            assert_eq!(table.index_of(name), Some(i as u16));
        }
        assert_eq!(table.var_count(VarKind::Field), 3);
    }

    #[test]
    fn test_method_scope_defines_this_as_arg_zero() {
        let mut table = SymbolTable::new();
        table.start_subroutine(SubroutineKind::Method, "Point");
        assert_eq!(table.kind_of("this"), Some(VarKind::Arg));
        assert_eq!(table.index_of("this"), Some(0));
        assert_eq!(table.type_of("this"), Some("Point"));
        // explicit parameters come after the receiver
        table.define("dx", "int", VarKind::Arg);
        assert_eq!(table.index_of("dx"), Some(1));
    }

    #[test]
    fn test_function_and_constructor_scopes_have_no_this() {
        let mut table = SymbolTable::new();
        table.start_subroutine(SubroutineKind::Function, "Point");
        assert_eq!(table.kind_of("this"), None);
        table.start_subroutine(SubroutineKind::Constructor, "Point");
        assert_eq!(table.kind_of("this"), None);
    }

    #[test]
    fn test_start_subroutine_resets_counters_and_scope() {
        let mut table = SymbolTable::new();
        table.start_subroutine(SubroutineKind::Function, "Main");
        table.define("x", "int", VarKind::Var);
        table.define("y", "int", VarKind::Var);
        assert_eq!(table.var_count(VarKind::Var), 2);

        table.start_subroutine(SubroutineKind::Function, "Main");
        assert_eq!(table.var_count(VarKind::Var), 0);
        assert_eq!(table.kind_of("x"), None);
    }

    #[test]
    fn test_class_scope_persists_across_subroutines() {
        let mut table = SymbolTable::new();
        table.define("count", "int", VarKind::Static);
        table.start_subroutine(SubroutineKind::Function, "Main");
        assert_eq!(table.kind_of("count"), Some(VarKind::Static));
        table.start_subroutine(SubroutineKind::Function, "Main");
        assert_eq!(table.kind_of("count"), Some(VarKind::Static));
    }

    #[test]
    fn test_subroutine_scope_shadows_class_scope() {
        let mut table = SymbolTable::new();
        table.define("size", "int", VarKind::Field);
        table.start_subroutine(SubroutineKind::Function, "Square");
        table.define("size", "boolean", VarKind::Var);
        assert_eq!(table.kind_of("size"), Some(VarKind::Var));
        assert_eq!(table.type_of("size"), Some("boolean"));
    }
}
