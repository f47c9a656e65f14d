//! Error types for module-table decoding, hierarchy building, and mutation.

/// Error raised by the module descriptor core.
///
/// Decode/build failures abort the whole module being built; no partially
/// populated module is ever exposed. `UnresolvedParent`, `ScopeNameOutOfRange`,
/// and `StaleOperandReference` are defensive internal-consistency errors: they
/// indicate a precondition violation by an earlier stage, not bad user input.
#[derive(Clone, Debug, thiserror::Error)]
pub enum ModuleError {
    /// A literal had an unexpected tag (or the table is otherwise
    /// inconsistent) while decoding a module table section.
    #[error("malformed module table `{array}`: {reason}")]
    MalformedModuleTable { array: String, reason: String },

    /// Hierarchy building failed to find a parent that must exist.
    #[error("unresolved parent `{parent}` of `{child}`")]
    UnresolvedParent { child: String, parent: String },

    /// A scoped identifier reference indexes past the scope-names table.
    #[error("scope name index {index} out of range (table has {len} entries)")]
    ScopeNameOutOfRange { index: usize, len: usize },

    /// A scoped identifier reference is not a base-16 index.
    #[error("invalid scope reference `{reference}`")]
    InvalidScopeRef { reference: String },

    /// An instruction immediate has no entry in an index remap.
    #[error("stale operand reference: slot {slot} in function `{function}`")]
    StaleOperandReference { function: String, slot: u32 },

    /// A caller passed something that cannot be honored (e.g. removing a
    /// descriptor that is not in the module). State is never mutated when
    /// this is returned.
    #[error("bad argument: {0}")]
    BadArgument(String),
}

impl ModuleError {
    pub fn malformed(array: &str, reason: impl Into<String>) -> Self {
        Self::MalformedModuleTable {
            array: array.to_string(),
            reason: reason.into(),
        }
    }
}
