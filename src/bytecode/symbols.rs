use std::collections::HashMap;

// =============================================================================
// SYMBOLS - Lexically scoped name resolution
// =============================================================================

/// Where a resolved name lives at runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolScope {
    /// Slot in the VM globals array.
    Global,
    /// Stack slot relative to the enclosing call frame.
    Local,
    /// Entry in the host builtin registry.
    Builtin,
    /// Captured value carried by the enclosing closure.
    Free,
}

/// A resolved name: its scope and the slot index within that scope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Symbol {
    pub name: String,
    pub scope: SymbolScope,
    pub index: usize,
}

/// Nested symbol tables, one per compilation scope.
///
/// Tables form a chain from the current function scope out to the program
/// scope. The chain is kept as an arena of frames with explicit outer
/// indices rather than owned pointers, so entering and leaving scopes is
/// just moving a cursor.
#[derive(Debug, Clone)]
pub struct SymbolTable {
    frames: Vec<TableFrame>,
    current: usize,
}

#[derive(Debug, Clone, Default)]
struct TableFrame {
    outer: Option<usize>,
    store: HashMap<String, Symbol>,
    definition_count: usize,
    free: Vec<Symbol>,
}

impl SymbolTable {
    pub fn new() -> Self {
        SymbolTable {
            frames: vec![TableFrame::default()],
            current: 0,
        }
    }

    /// Open a new table enclosed by the current one.
    pub fn enter_scope(&mut self) {
        self.frames.push(TableFrame {
            outer: Some(self.current),
            ..TableFrame::default()
        });
        self.current = self.frames.len() - 1;
    }

    /// Return to the enclosing table. Leaving the program scope is a no-op.
    pub fn leave_scope(&mut self) {
        if let Some(outer) = self.frames[self.current].outer {
            self.current = outer;
        }
    }

    /// Bind a name in the current table, assigning the next index.
    ///
    /// Names defined in the outermost table are Global, everything else is
    /// Local. Rebinding an existing name overwrites it but still consumes
    /// a fresh index.
    pub fn define(&mut self, name: &str) -> Symbol {
        let frame = &mut self.frames[self.current];
        let scope = if frame.outer.is_none() {
            SymbolScope::Global
        } else {
            SymbolScope::Local
        };
        let symbol = Symbol {
            name: name.to_string(),
            scope,
            index: frame.definition_count,
        };
        frame.store.insert(name.to_string(), symbol.clone());
        frame.definition_count += 1;
        symbol
    }

    /// Bind a host builtin at an explicit registry index.
    pub fn define_builtin(&mut self, index: usize, name: &str) -> Symbol {
        let symbol = Symbol {
            name: name.to_string(),
            scope: SymbolScope::Builtin,
            index,
        };
        self.frames[self.current]
            .store
            .insert(name.to_string(), symbol.clone());
        symbol
    }

    /// Record `original` as captured by the current table and bind a
    /// Free-scoped symbol pointing at its position in the capture list.
    pub fn define_free(&mut self, original: Symbol) -> Symbol {
        self.define_free_in(self.current, original)
    }

    /// Resolve a name against the current table and its enclosing chain.
    ///
    /// A hit in an outer table that is Global or Builtin propagates
    /// unchanged; a hit that is Local or Free in an outer table becomes a
    /// capture in every table between its definition and the current one.
    pub fn resolve(&mut self, name: &str) -> Option<Symbol> {
        self.resolve_in(self.current, name)
    }

    fn resolve_in(&mut self, table: usize, name: &str) -> Option<Symbol> {
        if let Some(symbol) = self.frames[table].store.get(name) {
            return Some(symbol.clone());
        }

        let outer = self.frames[table].outer?;
        let resolved = self.resolve_in(outer, name)?;
        match resolved.scope {
            SymbolScope::Global | SymbolScope::Builtin => Some(resolved),
            SymbolScope::Local | SymbolScope::Free => {
                Some(self.define_free_in(table, resolved))
            }
        }
    }

    fn define_free_in(&mut self, table: usize, original: Symbol) -> Symbol {
        let frame = &mut self.frames[table];
        frame.free.push(original.clone());
        let symbol = Symbol {
            name: original.name,
            scope: SymbolScope::Free,
            index: frame.free.len() - 1,
        };
        frame.store.insert(symbol.name.clone(), symbol.clone());
        symbol
    }

    /// Number of names defined directly in the current table.
    pub fn definition_count(&self) -> usize {
        self.frames[self.current].definition_count
    }

    /// Symbols captured by the current table, in capture order.
    pub fn free_symbols(&self) -> &[Symbol] {
        &self.frames[self.current].free
    }
}

impl Default for SymbolTable {
    fn default() -> Self {
        Self::new()
    }
}
