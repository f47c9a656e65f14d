//! Module descriptor model: arenas, handles, and descriptors.
//!
//! Every node lives in an arena on [`ModuleSet`]; cross-references are typed
//! index handles, never pointers. The "owns" relationship is therefore
//! unambiguous: arenas own, handles refer.

use std::collections::HashMap;

use abcforge_asm::{AnnotationData, Literal};
use abcforge_core::Dialect;

macro_rules! node_id {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(pub u32);

        impl $name {
            #[inline]
            pub fn index(self) -> usize {
                self.0 as usize
            }
        }
    };
}

node_id!(
    /// Handle to a module node.
    ModuleId
);
node_id!(
    /// Handle to a namespace node.
    NamespaceId
);
node_id!(
    /// Handle to a class node.
    ClassId
);
node_id!(
    /// Handle to a function node.
    FunctionId
);
node_id!(
    /// Handle to an annotation-interface node.
    AnnotationInterfaceId
);

/// Weak back-reference to a node's parent.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ParentRef {
    Module(ModuleId),
    Namespace(NamespaceId),
    Class(ClassId),
    Function(FunctionId),
}

/// Kind of an import descriptor.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ImportKind {
    Regular,
    Namespace,
}

/// Kind of an export descriptor.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExportKind {
    Local,
    Indirect,
    Star,
}

/// One entry of the import tables.
#[derive(Clone, Debug, PartialEq)]
pub struct ImportDescriptor {
    pub kind: ImportKind,
    /// Alias bound in the importing module.
    pub local_name: String,
    /// Name exported by the target module; `None` for namespace imports.
    pub imported_name: Option<String>,
    /// Index into the owning module's request list.
    pub request_idx: u16,
    /// Resolved target module; `None` until the resolution pass runs.
    pub target: Option<ModuleId>,
    /// Physical position within the entry's section.
    pub entry_idx: u32,
}

/// One entry of the export tables.
#[derive(Clone, Debug, PartialEq)]
pub struct ExportDescriptor {
    pub kind: ExportKind,
    /// Locally bound name; local exports only.
    pub local_name: Option<String>,
    /// Exported name; for a star export with a service import this is the
    /// user-visible alias.
    pub export_name: Option<String>,
    /// Imported name; indirect exports only.
    pub import_name: Option<String>,
    /// Index into the owning module's request list; absent for local
    /// exports.
    pub request_idx: Option<u16>,
    /// Resolved target module for indirect and star exports.
    pub target: Option<ModuleId>,
    /// Physical position within the entry's section; `None` for star
    /// exports realized through a service import (they own no star slot).
    pub entry_idx: Option<u32>,
    /// Set when this star export is implemented by a synthesized
    /// namespace-import / local-export pair.
    pub has_service_import: bool,
    /// Slot of the synthesized namespace import.
    pub service_namespace_import_idx: Option<u32>,
    /// Synthesized `=ens<N>` service name.
    pub service_name: Option<String>,
}

/// One entry of the module-request list, parallel to the request section.
#[derive(Clone, Debug, PartialEq)]
pub struct ModuleRequest {
    pub path: String,
    /// Resolved (or lazily created external) target module.
    pub target: Option<ModuleId>,
}

/// A module: its descriptor tables plus its hierarchy roots.
#[derive(Clone, Debug)]
pub struct ModuleNode {
    pub name: String,
    pub dialect: Dialect,
    /// Key of the packed module table in the program's literal arrays.
    pub table_key: String,
    /// Key of the scope-names table.
    pub scopes_key: String,
    /// The `md` list: request paths in section order.
    pub requests: Vec<ModuleRequest>,
    /// The `id` list.
    pub imports: Vec<ImportDescriptor>,
    /// The `ed` list.
    pub exports: Vec<ExportDescriptor>,
    pub scope_names: Vec<String>,
    /// Synthesized for a request whose target was never loaded.
    pub external: bool,
    /// Set by any mutation; cleared by re-linearization.
    pub dirty: bool,
    /// Request strings are absolute paths and must be relativized before
    /// write-back.
    pub abs_paths: bool,
    pub namespaces: Vec<NamespaceId>,
    pub classes: Vec<ClassId>,
    /// Top-level functions only.
    pub functions: Vec<FunctionId>,
    pub annotation_interfaces: Vec<AnnotationInterfaceId>,
}

impl ModuleNode {
    /// A placeholder for a module referenced but not loaded.
    pub fn external(name: &str, dialect: Dialect) -> Self {
        Self {
            name: name.to_string(),
            dialect,
            table_key: String::new(),
            scopes_key: String::new(),
            requests: Vec::new(),
            imports: Vec::new(),
            exports: Vec::new(),
            scope_names: Vec::new(),
            external: true,
            dirty: false,
            abs_paths: false,
            namespaces: Vec::new(),
            classes: Vec::new(),
            functions: Vec::new(),
            annotation_interfaces: Vec::new(),
        }
    }
}

/// A namespace, wrapped by its defining function.
#[derive(Clone, Debug)]
pub struct NamespaceNode {
    pub name: String,
    pub module: ModuleId,
    pub parent: ParentRef,
    /// Mangled name of the wrapper function.
    pub wrapper: String,
    pub namespaces: Vec<NamespaceId>,
    pub classes: Vec<ClassId>,
    pub functions: Vec<FunctionId>,
}

/// A class, owned by its constructor function.
#[derive(Clone, Debug)]
pub struct ClassNode {
    pub name: String,
    pub module: ModuleId,
    pub parent: ParentRef,
    /// Mangled name of the constructor.
    pub ctor: String,
    pub methods: Vec<FunctionId>,
}

/// A function node; nested functions hang off their parent function.
#[derive(Clone, Debug)]
pub struct FunctionNode {
    /// Full mangled name (module prefix included).
    pub name: String,
    /// Demangled plain name; empty for anonymous functions.
    pub plain_name: String,
    pub module: ModuleId,
    pub parent: ParentRef,
    pub nested: Vec<FunctionId>,
    pub annotations: Vec<AnnotationData>,
}

/// One field of an annotation interface.
#[derive(Clone, Debug)]
pub struct AnnotationInterfaceField {
    pub name: String,
    pub ty: String,
    pub default: Option<Literal>,
}

/// An annotation interface under its owning module.
#[derive(Clone, Debug)]
pub struct AnnotationInterfaceNode {
    pub name: String,
    pub module: ModuleId,
    pub fields: Vec<AnnotationInterfaceField>,
}

/// Arena of all modules and hierarchy nodes built from one program.
#[derive(Clone, Debug, Default)]
pub struct ModuleSet {
    pub modules: Vec<ModuleNode>,
    pub namespaces: Vec<NamespaceNode>,
    pub classes: Vec<ClassNode>,
    pub functions: Vec<FunctionNode>,
    pub annotation_interfaces: Vec<AnnotationInterfaceNode>,
    pub(crate) by_name: HashMap<String, ModuleId>,
    /// (module, namespace name) -> node, for parent assignment.
    pub(crate) namespace_lookup: HashMap<(ModuleId, String), NamespaceId>,
    /// (module, class name) -> node.
    pub(crate) class_lookup: HashMap<(ModuleId, String), ClassId>,
    /// (module, plain function name) -> node.
    pub(crate) function_lookup: HashMap<(ModuleId, String), FunctionId>,
}

impl ModuleSet {
    pub fn module(&self, id: ModuleId) -> &ModuleNode {
        &self.modules[id.index()]
    }

    pub fn module_mut(&mut self, id: ModuleId) -> &mut ModuleNode {
        &mut self.modules[id.index()]
    }

    pub fn module_by_name(&self, name: &str) -> Option<ModuleId> {
        self.by_name.get(name).copied()
    }

    /// Register a new module node and index it by name.
    pub(crate) fn push_module(&mut self, node: ModuleNode) -> ModuleId {
        let id = ModuleId(self.modules.len() as u32);
        self.by_name.insert(node.name.clone(), id);
        self.modules.push(node);
        id
    }

    /// Find or lazily create an external module for a request target.
    pub(crate) fn resolve_or_external(&mut self, name: &str, dialect: Dialect) -> ModuleId {
        if let Some(id) = self.module_by_name(name) {
            return id;
        }
        self.push_module(ModuleNode::external(name, dialect))
    }
}
