//! Binary container emission.
//!
//! Walks a resolved symbolic program and serializes it into an indexed
//! binary container. This module handles:
//! - Item creation and value interning (strings, classes, fields, methods,
//!   literal arrays, annotations)
//! - Layout computation with an optional profile-guided code ordering
//! - Bytecode encoding with label resolution, debug records, and try/catch
//!   tables
//! - Header generation and checksum sealing

mod code;
mod container;
mod emitter;
mod error;
mod items;

#[cfg(test)]
mod container_tests;
#[cfg(test)]
mod emitter_tests;

pub use container::{
    ContainerError, GLOBAL_CLASS, HEADER_SIZE, Header, ItemContainer, MAGIC, MethodTable,
    SectionOffsets, VERSION, View,
};
pub use emitter::{EXPORT_ENTITIES_KEY, EmitOptions, emit};
pub use error::{DependencyKind, EmitError};
pub use items::{
    AnnotationItem, AnnotationOwner, CatchItem, ClassItem, ClassItemId, CodeItem, CodeItemId,
    DebugItem, DebugItemId, ElementItem, FieldItem, FieldItemId, LiteralArrayItem,
    LiteralArrayItemId, LiteralItem, LocalVarItem, MethodItem, MethodItemId, StringItem,
    StringItemId, TryBlockItem, ValueItem,
};
