//! Symbolic program model and binary container emission.
//!
//! This crate provides:
//! - `program` / `record` / `function` / `ins` / `literal` / `annotation` -
//!   the in-memory data model produced by a front end and consumed here
//! - `emit` - the staged pipeline that serializes a resolved program into an
//!   indexed binary container
//!
//! The textual-assembly parser and the foreign-binary reader are external
//! collaborators; this crate only consumes their output data model.

pub mod annotation;
pub mod emit;
pub mod function;
pub mod ins;
pub mod literal;
pub mod program;
pub mod record;

#[cfg(test)]
mod literal_tests;
#[cfg(test)]
mod program_tests;

pub use abcforge_core::Dialect;
pub use annotation::{AnnotationData, AnnotationElement, AnnotationValue};
pub use emit::{EmitError, EmitOptions, emit};
pub use function::{CatchBlock, Function, FunctionMetadata, LocalVariable, Param};
pub use ins::{Format, Imm, Ins, InsDebug, Opcode};
pub use literal::{Literal, LiteralArray, LiteralTag, LiteralValue};
pub use program::Program;
pub use record::{AnnotationKind, Field, Record, RecordMetadata};
