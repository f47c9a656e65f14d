//! Building the module set from a program.
//!
//! One pass creates a module per descriptor record by decoding its packed
//! table; a second pass resolves request targets (lazily creating external
//! modules) and backfills descriptor targets from their recomputed table
//! offsets; the final passes reconstruct the namespace/class/function
//! hierarchy from mangled names.

use abcforge_asm::{LiteralTag, Program, Record};
use tracing::debug;

use crate::codec::{RawEntry, SectionKind, TableLayout, decode_section};
use crate::error::ModuleError;
use crate::hierarchy::{
    MAIN_FUNC, ParentKind, SERVICE_EXPORT_PREFIX, class_name_from_ctor, class_parent_of,
    demangle_segment, is_constructor, is_namespace_wrapper, namespace_name, parent_of, plain_name,
};
use crate::model::{
    AnnotationInterfaceField, AnnotationInterfaceNode, ClassNode, ExportDescriptor, ExportKind,
    FunctionNode, ImportDescriptor, ImportKind, ModuleId, ModuleNode, ModuleRequest, ModuleSet,
    NamespaceNode, ParentRef,
};

/// Records whose name starts with this prefix are toolchain service records,
/// never module descriptors.
const SERVICE_RECORD_PREFIX: char = '_';

impl ModuleSet {
    /// Build the full module/namespace/class/function tree for a program.
    ///
    /// Any decode failure aborts the whole build; callers never observe a
    /// partially populated set.
    pub fn build(program: &Program) -> Result<ModuleSet, ModuleError> {
        let mut set = ModuleSet::default();

        for record in program.records.values() {
            if record.name.starts_with(SERVICE_RECORD_PREFIX) || !record.is_module_descriptor() {
                continue;
            }
            let module = build_module(program, record)?;
            debug!(module = %module.name, requests = module.requests.len(), "decoded module table");
            set.push_module(module);
        }

        resolve_targets(&mut set, program)?;
        build_annotation_interfaces(&mut set, program);
        build_hierarchy(&mut set, program)?;

        Ok(set)
    }
}

/// Decode one module-descriptor record into a module node (targets still
/// unresolved).
fn build_module(program: &Program, record: &Record) -> Result<ModuleNode, ModuleError> {
    let table_key = record.module_record_key().expect("checked by caller");
    let scopes_key = record.scope_names_key().expect("checked by caller");

    let array = program
        .literal_arrays
        .get(table_key)
        .ok_or_else(|| ModuleError::malformed(table_key, "module table array does not exist"))?;
    let scopes_array = program
        .literal_arrays
        .get(scopes_key)
        .ok_or_else(|| ModuleError::malformed(scopes_key, "scope-names array does not exist"))?;

    let mut scope_names = Vec::with_capacity(scopes_array.literals.len());
    for literal in &scopes_array.literals {
        if literal.tag != LiteralTag::String {
            return Err(ModuleError::malformed(
                scopes_key,
                format!(
                    "scope name has tag {:#04x}, expected STRING",
                    literal.tag as u8
                ),
            ));
        }
        scope_names.push(literal.as_str().expect("tag checked").to_string());
    }

    let layout = TableLayout::compute(array, table_key)?;
    let live = |kind| -> Result<Vec<RawEntry>, ModuleError> {
        let entries = decode_section(array, &layout, kind, table_key, false)?;
        Ok(entries.into_iter().filter(|e| !e.tombstone).collect())
    };

    let field_str = |entry: &RawEntry, field: usize| -> String {
        entry.fields[field].as_str().expect("tag checked").to_string()
    };
    let field_idx =
        |entry: &RawEntry, field: usize| entry.fields[field].as_affiliate().expect("tag checked");

    let mut requests = Vec::new();
    let mut abs_paths = false;
    for entry in live(SectionKind::ModuleRequests)? {
        let path = field_str(&entry, 0);
        abs_paths |= path.starts_with('/');
        requests.push(ModuleRequest { path, target: None });
    }

    let mut imports = Vec::new();
    let mut exports = Vec::new();
    // Synthesized service-import machinery, joined back into star exports
    // below: (slot, service name, request idx) and (slot, service name,
    // alias).
    let mut service_namespace_imports: Vec<(u32, String, u16)> = Vec::new();
    let mut service_local_exports: Vec<(u32, String, String)> = Vec::new();

    for entry in live(SectionKind::RegularImports)? {
        imports.push(ImportDescriptor {
            kind: ImportKind::Regular,
            local_name: field_str(&entry, 0),
            imported_name: Some(field_str(&entry, 1)),
            request_idx: field_idx(&entry, 2),
            target: None,
            entry_idx: entry.index,
        });
    }

    for entry in live(SectionKind::NamespaceImports)? {
        let local = field_str(&entry, 0);
        // Service marker is only recognized on the first field of a group.
        if local.contains(SERVICE_EXPORT_PREFIX) {
            service_namespace_imports.push((entry.index, local, field_idx(&entry, 1)));
            continue;
        }
        imports.push(ImportDescriptor {
            kind: ImportKind::Namespace,
            local_name: local,
            imported_name: None,
            request_idx: field_idx(&entry, 1),
            target: None,
            entry_idx: entry.index,
        });
    }

    for entry in live(SectionKind::LocalExports)? {
        let local = field_str(&entry, 0);
        if local.contains(SERVICE_EXPORT_PREFIX) {
            service_local_exports.push((entry.index, local, field_str(&entry, 1)));
            continue;
        }
        exports.push(ExportDescriptor {
            kind: ExportKind::Local,
            local_name: Some(local),
            export_name: Some(field_str(&entry, 1)),
            import_name: None,
            request_idx: None,
            target: None,
            entry_idx: Some(entry.index),
            has_service_import: false,
            service_namespace_import_idx: None,
            service_name: None,
        });
    }

    for entry in live(SectionKind::IndirectExports)? {
        exports.push(ExportDescriptor {
            kind: ExportKind::Indirect,
            local_name: None,
            export_name: Some(field_str(&entry, 0)),
            import_name: Some(field_str(&entry, 1)),
            request_idx: Some(field_idx(&entry, 2)),
            target: None,
            entry_idx: Some(entry.index),
            has_service_import: false,
            service_namespace_import_idx: None,
            service_name: None,
        });
    }

    for entry in live(SectionKind::StarExports)? {
        exports.push(ExportDescriptor {
            kind: ExportKind::Star,
            local_name: None,
            export_name: None,
            import_name: None,
            request_idx: Some(field_idx(&entry, 0)),
            target: None,
            entry_idx: Some(entry.index),
            has_service_import: false,
            service_namespace_import_idx: None,
            service_name: None,
        });
    }

    for (_, service_name, alias) in service_local_exports {
        let ns = service_namespace_imports
            .iter()
            .find(|(_, local, _)| *local == service_name)
            .ok_or_else(|| {
                ModuleError::malformed(
                    table_key,
                    format!("service export `{service_name}` has no namespace import"),
                )
            })?;
        exports.push(ExportDescriptor {
            kind: ExportKind::Star,
            local_name: None,
            export_name: Some(alias),
            import_name: None,
            request_idx: Some(ns.2),
            target: None,
            entry_idx: None,
            has_service_import: true,
            service_namespace_import_idx: Some(ns.0),
            service_name: Some(service_name),
        });
    }

    Ok(ModuleNode {
        name: record.name.clone(),
        dialect: record.dialect,
        table_key: table_key.to_string(),
        scopes_key: scopes_key.to_string(),
        requests,
        imports,
        exports,
        scope_names,
        external: false,
        dirty: false,
        abs_paths,
        namespaces: Vec::new(),
        classes: Vec::new(),
        functions: Vec::new(),
        annotation_interfaces: Vec::new(),
    })
}

/// Resolve a request path against the requesting module's directory.
///
/// `@`-prefixed package identifiers pass through untouched; absolute paths
/// drop their leading slash; relative paths are joined and normalized.
pub(crate) fn resolve_request_path(module_name: &str, request: &str) -> String {
    if request.starts_with('@') {
        return request.to_string();
    }
    if let Some(stripped) = request.strip_prefix('/') {
        return stripped.to_string();
    }
    if !request.starts_with("./") && !request.starts_with("../") {
        return request.to_string();
    }

    let mut parts: Vec<&str> = module_name.split('/').collect();
    parts.pop(); // drop the module's own file component
    for part in request.split('/') {
        match part {
            "." | "" => {}
            ".." => {
                parts.pop();
            }
            other => parts.push(other),
        }
    }
    parts.join("/")
}

/// Second pass: resolve every request target, then backfill descriptor
/// targets by re-reading each descriptor's request index from its recomputed
/// table offset.
fn resolve_targets(set: &mut ModuleSet, program: &Program) -> Result<(), ModuleError> {
    let loaded = set.modules.len();

    for idx in 0..loaded {
        for req in 0..set.modules[idx].requests.len() {
            let (name, path, dialect) = {
                let module = &set.modules[idx];
                (
                    module.name.clone(),
                    module.requests[req].path.clone(),
                    module.dialect,
                )
            };
            let target_name = resolve_request_path(&name, &path);
            let target = set.resolve_or_external(&target_name, dialect);
            set.modules[idx].requests[req].target = Some(target);
        }
    }

    for idx in 0..loaded {
        let table_key = set.modules[idx].table_key.clone();
        let array = program
            .literal_arrays
            .get(&table_key)
            .ok_or_else(|| ModuleError::malformed(&table_key, "module table array disappeared"))?;
        let layout = TableLayout::compute(array, &table_key)?;

        let read_request_idx = |kind: SectionKind, entry: u32| -> Result<u16, ModuleError> {
            let field = kind
                .request_field()
                .expect("only request-bearing sections are read here");
            let offset = layout.entry_field(kind, entry, field);
            array
                .literals
                .get(offset)
                .and_then(|l| l.as_affiliate())
                .ok_or_else(|| {
                    ModuleError::malformed(
                        &table_key,
                        format!("request index missing at literal {offset}"),
                    )
                })
        };

        let mut import_targets = Vec::new();
        for (i, import) in set.modules[idx].imports.iter().enumerate() {
            if import.target.is_some() {
                continue;
            }
            let kind = match import.kind {
                ImportKind::Regular => SectionKind::RegularImports,
                ImportKind::Namespace => SectionKind::NamespaceImports,
            };
            let request = read_request_idx(kind, import.entry_idx)?;
            import_targets.push((i, request));
        }
        for (i, request) in import_targets {
            let target = request_target(set, idx, request, &table_key)?;
            let import = &mut set.modules[idx].imports[i];
            import.request_idx = request;
            import.target = Some(target);
        }

        let mut export_targets = Vec::new();
        for (i, export) in set.modules[idx].exports.iter().enumerate() {
            if export.target.is_some() {
                continue;
            }
            let read = match (export.kind, export.entry_idx) {
                (ExportKind::Indirect, Some(entry)) => {
                    Some(read_request_idx(SectionKind::IndirectExports, entry)?)
                }
                (ExportKind::Star, Some(entry)) => {
                    Some(read_request_idx(SectionKind::StarExports, entry)?)
                }
                (ExportKind::Star, None) => {
                    let slot = export
                        .service_namespace_import_idx
                        .expect("service star exports record their import slot");
                    Some(read_request_idx(SectionKind::NamespaceImports, slot)?)
                }
                (ExportKind::Local, _) | (ExportKind::Indirect, None) => None,
            };
            if let Some(request) = read {
                export_targets.push((i, request));
            }
        }
        for (i, request) in export_targets {
            let target = request_target(set, idx, request, &table_key)?;
            let export = &mut set.modules[idx].exports[i];
            export.request_idx = Some(request);
            export.target = Some(target);
        }
    }

    Ok(())
}

fn request_target(
    set: &ModuleSet,
    module: usize,
    request: u16,
    table_key: &str,
) -> Result<ModuleId, ModuleError> {
    set.modules[module]
        .requests
        .get(request as usize)
        .and_then(|r| r.target)
        .ok_or_else(|| {
            ModuleError::malformed(table_key, format!("request index {request} out of range"))
        })
}

/// Attach annotation-interface records under their owning modules.
fn build_annotation_interfaces(set: &mut ModuleSet, program: &Program) {
    for record in program.annotation_records() {
        let Some((owner, name)) = record.name.split_once('.') else {
            continue;
        };
        let Some(module) = set.module_by_name(owner) else {
            continue;
        };
        let fields = record
            .fields
            .iter()
            .map(|f| AnnotationInterfaceField {
                name: f.name.clone(),
                ty: f.ty.clone(),
                default: f.value.clone(),
            })
            .collect();
        let id = crate::model::AnnotationInterfaceId(set.annotation_interfaces.len() as u32);
        set.annotation_interfaces.push(AnnotationInterfaceNode {
            name: name.to_string(),
            module,
            fields,
        });
        set.modules[module.index()].annotation_interfaces.push(id);
    }
}

/// Reconstruct namespaces, classes, and functions from mangled names.
fn build_hierarchy(set: &mut ModuleSet, program: &Program) -> Result<(), ModuleError> {
    use crate::model::{ClassId, FunctionId, NamespaceId};

    // Pass 1: create all namespace nodes.
    let mut wrappers: Vec<(NamespaceId, ModuleId, String)> = Vec::new();
    for function in program.functions.values() {
        let (Some(owner), base) = function.owner_and_base() else {
            continue;
        };
        let Some(module) = set.module_by_name(owner) else {
            continue;
        };
        if !is_namespace_wrapper(base) {
            continue;
        }
        let scopes = set.modules[module.index()].scope_names.clone();
        let name = namespace_name(base, &scopes)?;
        let id = NamespaceId(set.namespaces.len() as u32);
        set.namespaces.push(NamespaceNode {
            name: name.clone(),
            module,
            parent: ParentRef::Module(module),
            wrapper: function.name.clone(),
            namespaces: Vec::new(),
            classes: Vec::new(),
            functions: Vec::new(),
        });
        set.namespace_lookup.insert((module, name), id);
        wrappers.push((id, module, base.to_string()));
    }

    // Pass 2: parent every namespace now that all of them exist.
    for (id, module, base) in wrappers {
        let scopes = set.modules[module.index()].scope_names.clone();
        let (kind, parent_name) = parent_of(&base, &scopes)?;
        match kind {
            ParentKind::Namespace => {
                let parent = *set
                    .namespace_lookup
                    .get(&(module, parent_name.clone()))
                    .ok_or_else(|| ModuleError::UnresolvedParent {
                        child: set.namespaces[id.index()].name.clone(),
                        parent: parent_name,
                    })?;
                set.namespaces[id.index()].parent = ParentRef::Namespace(parent);
                set.namespaces[parent.index()].namespaces.push(id);
            }
            // Namespaces nest under namespaces or sit at module level.
            _ => {
                set.namespaces[id.index()].parent = ParentRef::Module(module);
                set.modules[module.index()].namespaces.push(id);
            }
        }
    }

    // Pass 3: classes from constructors.
    for function in program.functions.values() {
        let (Some(owner), base) = function.owner_and_base() else {
            continue;
        };
        let Some(module) = set.module_by_name(owner) else {
            continue;
        };
        if is_namespace_wrapper(base) || !is_constructor(base) {
            continue;
        }
        let scopes = set.modules[module.index()].scope_names.clone();
        let name = class_name_from_ctor(base, &scopes)?;
        let (kind, parent_name) = class_parent_of(base, &scopes)?;
        let id = ClassId(set.classes.len() as u32);
        let parent = match kind {
            ParentKind::Namespace => {
                let ns = *set
                    .namespace_lookup
                    .get(&(module, parent_name.clone()))
                    .ok_or_else(|| ModuleError::UnresolvedParent {
                        child: name.clone(),
                        parent: parent_name,
                    })?;
                set.namespaces[ns.index()].classes.push(id);
                ParentRef::Namespace(ns)
            }
            _ => {
                set.modules[module.index()].classes.push(id);
                ParentRef::Module(module)
            }
        };
        set.classes.push(ClassNode {
            name: name.clone(),
            module,
            parent,
            ctor: function.name.clone(),
            methods: Vec::new(),
        });
        set.class_lookup.insert((module, name), id);
    }

    // Pass 4: remaining functions; nodes first, parents second, so nested
    // functions can reference parents declared later.
    let mut pending: Vec<(FunctionId, ModuleId, String)> = Vec::new();
    for function in program.functions.values() {
        let (Some(owner), base) = function.owner_and_base() else {
            continue;
        };
        let Some(module) = set.module_by_name(owner) else {
            continue;
        };
        if is_namespace_wrapper(base) || is_constructor(base) {
            continue;
        }
        let scopes = set.modules[module.index()].scope_names.clone();
        let plain = demangle_segment(plain_name(base), &scopes)?;
        let annotations = function
            .annotations
            .iter()
            .filter(|a| !a.name.starts_with(SERVICE_RECORD_PREFIX))
            .cloned()
            .collect();
        let id = FunctionId(set.functions.len() as u32);
        set.functions.push(FunctionNode {
            name: function.name.clone(),
            plain_name: plain.clone(),
            module,
            parent: ParentRef::Module(module),
            nested: Vec::new(),
            annotations,
        });
        set.function_lookup.insert((module, plain), id);
        pending.push((id, module, base.to_string()));
    }

    for (id, module, base) in pending {
        let scopes = set.modules[module.index()].scope_names.clone();
        let plain = set.functions[id.index()].plain_name.clone();

        // Anonymous functions and the entry point attach straight to the
        // module.
        if plain.is_empty() || plain == MAIN_FUNC {
            set.modules[module.index()].functions.push(id);
            continue;
        }

        let (kind, parent_name) = parent_of(&base, &scopes)?;
        let child = set.functions[id.index()].name.clone();
        let missing = move |parent: &str| ModuleError::UnresolvedParent {
            child: child.clone(),
            parent: parent.to_string(),
        };
        match kind {
            ParentKind::Module => {
                set.modules[module.index()].functions.push(id);
            }
            ParentKind::Namespace => {
                let ns = *set
                    .namespace_lookup
                    .get(&(module, parent_name.clone()))
                    .ok_or_else(|| missing(&parent_name))?;
                set.functions[id.index()].parent = ParentRef::Namespace(ns);
                set.namespaces[ns.index()].functions.push(id);
            }
            ParentKind::Class => {
                let class = *set
                    .class_lookup
                    .get(&(module, parent_name.clone()))
                    .ok_or_else(|| missing(&parent_name))?;
                set.functions[id.index()].parent = ParentRef::Class(class);
                set.classes[class.index()].methods.push(id);
            }
            ParentKind::Function => {
                let parent = *set
                    .function_lookup
                    .get(&(module, parent_name.clone()))
                    .ok_or_else(|| missing(&parent_name))?;
                set.functions[id.index()].parent = ParentRef::Function(parent);
                set.functions[parent.index()].nested.push(id);
            }
        }
    }

    Ok(())
}
