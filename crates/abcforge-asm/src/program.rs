//! The symbolic program: the unit of mutation and emission.

use abcforge_core::{Interner, Symbol};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::function::Function;
use crate::literal::LiteralArray;
use crate::record::Record;

/// In-memory program representation.
///
/// Produced by a front end (parser or binary reader), mutated through the
/// rewrite APIs, and consumed by the emission pipeline. Owned by one thread
/// for the duration of any mutate-then-emit sequence.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Program {
    /// Records keyed by name, in declaration order.
    pub records: IndexMap<String, Record>,
    /// Functions keyed by exact mangled signature.
    pub functions: IndexMap<String, Function>,
    /// Named literal arrays.
    pub literal_arrays: IndexMap<String, LiteralArray>,
    /// Per-program string pool. Rebuilt on deserialization; the binary
    /// string section is derived during emission, not from this pool.
    #[serde(skip)]
    pub strings: Interner,
}

impl Program {
    pub fn new() -> Self {
        Self::default()
    }

    /// Intern a string into the program pool. First-writer-wins: an already
    /// pooled string returns its existing handle.
    pub fn intern(&mut self, s: &str) -> Symbol {
        self.strings.intern(s)
    }

    pub fn add_record(&mut self, record: Record) {
        self.strings.intern(&record.name);
        self.records.insert(record.name.clone(), record);
    }

    pub fn add_function(&mut self, function: Function) {
        self.strings.intern(&function.name);
        self.functions.insert(function.name.clone(), function);
    }

    pub fn add_literal_array(&mut self, key: impl Into<String>, array: LiteralArray) {
        self.literal_arrays.insert(key.into(), array);
    }

    /// Records that declare a module descriptor.
    pub fn module_records(&self) -> impl Iterator<Item = &Record> {
        self.records.values().filter(|r| r.is_module_descriptor())
    }

    /// Records that declare an annotation interface.
    pub fn annotation_records(&self) -> impl Iterator<Item = &Record> {
        self.records
            .values()
            .filter(|r| r.metadata.annotation.is_some())
    }
}
