//! Shared primitives for the abcforge workspace.
//!
//! This crate contains:
//! - String interning (`Interner`, `Symbol`) used by the program string pool
//! - The target `Dialect` tag shared between the assembler and the rewriter

pub mod interner;

#[cfg(test)]
mod interner_tests;

pub use interner::{Interner, Symbol};

/// Target dialect of a compiled module.
///
/// Exactly two dialects exist; every dispatch over this enum is an
/// exhaustive `match` with no default arm.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum Dialect {
    /// The dynamically-typed, JS-like dialect.
    Dynamic,
    /// The statically-typed dialect.
    Static,
}

impl Dialect {
    /// Short lowercase name, used by dumps and logs.
    pub fn name(self) -> &'static str {
        match self {
            Dialect::Dynamic => "dynamic",
            Dialect::Static => "static",
        }
    }
}
