//! Per-program string interning.
//!
//! Every name that flows through a `Program` (record names, mangled function
//! names, export-table strings) is deduplicated into this pool. A `Symbol` is
//! a cheap integer handle; comparing two symbols is O(1).
//!
//! Interning is first-writer-wins: once a string is in the pool, later
//! requests return the existing handle. This is a correctness requirement for
//! value identity, not an optimization.

use std::collections::HashMap;

/// Handle to an interned string.
///
/// Ordered by insertion order, not lexicographically.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct Symbol(u32);

impl Symbol {
    /// Raw pool index, for serialization and debugging.
    #[inline]
    pub fn index(self) -> u32 {
        self.0
    }
}

/// String pool with first-writer-wins deduplication.
#[derive(Debug, Clone, Default)]
pub struct Interner {
    lookup: HashMap<String, Symbol>,
    pool: Vec<String>,
}

impl Interner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Intern a string, returning its handle. Re-interning an existing
    /// string returns the original handle.
    pub fn intern(&mut self, s: &str) -> Symbol {
        if let Some(&sym) = self.lookup.get(s) {
            return sym;
        }
        let sym = Symbol(self.pool.len() as u32);
        self.pool.push(s.to_owned());
        self.lookup.insert(s.to_owned(), sym);
        sym
    }

    /// Handle for a string that may already be interned, without inserting.
    pub fn get(&self, s: &str) -> Option<Symbol> {
        self.lookup.get(s).copied()
    }

    /// Resolve a handle back to its string.
    ///
    /// # Panics
    /// Panics if the symbol came from a different interner.
    #[inline]
    pub fn resolve(&self, sym: Symbol) -> &str {
        &self.pool[sym.0 as usize]
    }

    /// Resolve a handle, returning `None` for a foreign symbol.
    #[inline]
    pub fn try_resolve(&self, sym: Symbol) -> Option<&str> {
        self.pool.get(sym.0 as usize).map(String::as_str)
    }

    /// Number of interned strings.
    #[inline]
    pub fn len(&self) -> usize {
        self.pool.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.pool.is_empty()
    }

    /// Iterate over all interned strings in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (Symbol, &str)> {
        self.pool
            .iter()
            .enumerate()
            .map(|(i, s)| (Symbol(i as u32), s.as_str()))
    }
}
