//! Module descriptor model and literal-array rewriting.
//!
//! This crate decodes the packed import/export tables of compiled modules,
//! reconstructs the module/namespace/class/function hierarchy from mangled
//! names, supports structural edits of the tables, and re-linearizes the
//! packed form (patching bytecode operands) before write-back:
//! - `codec` - the six-section literal-array codec and derived table layout
//! - `model` - arena-of-nodes module set with typed handles
//! - `hierarchy` - pure demangling and parent resolution
//! - `dump` - human-readable table dumps
//!
//! Mutation and re-linearization live in `impl ModuleSet` blocks; the
//! whole surface is synchronous and single-threaded: a set is owned by one
//! thread for the duration of any mutate-then-commit sequence.

mod build;
pub mod codec;
pub mod dump;
pub mod error;
pub mod hierarchy;
pub mod model;
mod mutate;
mod relinearize;

#[cfg(test)]
mod build_tests;
#[cfg(test)]
mod codec_tests;
#[cfg(test)]
mod relinearize_tests;

#[cfg(test)]
mod test_utils;

pub use codec::{RawEntry, SectionKind, TableLayout, decode_section, empty_table, encode_section};
pub use error::ModuleError;
pub use hierarchy::{
    CTOR_MARK, MAIN_FUNC, NAMESPACE_MARK, ParentKind, SERVICE_EXPORT_PREFIX, class_name_from_ctor,
    class_parent_of, demangle_segment, is_constructor, is_namespace_wrapper, namespace_name,
    parent_of, plain_name,
};
pub use model::{
    AnnotationInterfaceField, AnnotationInterfaceId, AnnotationInterfaceNode, ClassId, ClassNode,
    ExportDescriptor, ExportKind, FunctionId, FunctionNode, ImportDescriptor, ImportKind, ModuleId,
    ModuleNode, ModuleRequest, ModuleSet, NamespaceId, NamespaceNode, ParentRef,
};
