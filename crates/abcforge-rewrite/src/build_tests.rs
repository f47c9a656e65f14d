//! Unit tests for module-set building.

use abcforge_asm::{AnnotationData, Field, Function, Literal, Program, Record};
use abcforge_asm::record::AnnotationKind;
use abcforge_core::Dialect;

use super::error::ModuleError;
use super::model::{ExportKind, ImportKind, ModuleSet, ParentRef};
use super::test_utils::{add_module, index_program, table_literals};

#[test]
fn builds_the_walkthrough_module() {
    let program = index_program();
    let set = ModuleSet::build(&program).unwrap();

    let index = set.module_by_name("src/index").unwrap();
    let a = set.module_by_name("src/a").unwrap();
    let b = set.module_by_name("src/b").unwrap();

    let node = set.module(index);
    assert!(!node.external);
    assert_eq!(node.requests.len(), 2);
    assert_eq!(node.requests[0].target, Some(a));
    assert_eq!(node.requests[1].target, Some(b));

    assert_eq!(node.imports.len(), 1);
    let import = &node.imports[0];
    assert_eq!(import.kind, ImportKind::Regular);
    assert_eq!(import.local_name, "x");
    assert_eq!(import.imported_name.as_deref(), Some("y"));
    assert_eq!(import.target, Some(a));

    // Requested-but-never-loaded modules materialize as external.
    assert!(set.module(a).external);
    assert!(set.module(b).external);
}

#[test]
fn package_requests_resolve_verbatim() {
    let mut program = Program::new();
    let table = table_literals(&["@ohos/hilog"], &[], &[("log", 0)], &[], &[], &[]);
    add_module(&mut program, "src/index", table, &[]);

    let set = ModuleSet::build(&program).unwrap();
    let index = set.module_by_name("src/index").unwrap();
    assert_eq!(
        set.module(index).requests[0].path,
        "@ohos/hilog".to_string()
    );
    assert!(set.module_by_name("@ohos/hilog").is_some());
}

#[test]
fn absolute_requests_flag_the_module() {
    let mut program = Program::new();
    let table = table_literals(&["/src/b"], &[], &[], &[], &[], &[0]);
    add_module(&mut program, "src/index", table, &[]);

    let set = ModuleSet::build(&program).unwrap();
    let index = set.module_by_name("src/index").unwrap();
    assert!(set.module(index).abs_paths);
}

#[test]
fn missing_table_array_is_malformed() {
    let mut program = Program::new();
    let mut record = Record::new("src/broken", Dialect::Dynamic);
    let mut table_field = Field::new("moduleRecordIdx", "u32");
    table_field.value = Some(Literal::array_ref("no.such.array"));
    let mut scopes_field = Field::new("scopeNames", "u32");
    scopes_field.value = Some(Literal::array_ref("also.missing"));
    record.fields.push(table_field);
    record.fields.push(scopes_field);
    program.add_record(record);

    let err = ModuleSet::build(&program).unwrap_err();
    assert!(matches!(err, ModuleError::MalformedModuleTable { .. }));
}

#[test]
fn service_pairs_reconstruct_star_exports() {
    let mut program = Program::new();
    let table = table_literals(
        &["./b"],
        &[],
        &[("=ens0", 0)],
        &[("=ens0", "ns")],
        &[],
        &[],
    );
    add_module(&mut program, "src/index", table, &[]);

    let set = ModuleSet::build(&program).unwrap();
    let index = set.module_by_name("src/index").unwrap();
    let node = set.module(index);

    // The service pair is not surfaced as a plain import/export.
    assert!(node.imports.is_empty());
    assert_eq!(node.exports.len(), 1);

    let star = &node.exports[0];
    assert_eq!(star.kind, ExportKind::Star);
    assert!(star.has_service_import);
    assert_eq!(star.export_name.as_deref(), Some("ns"));
    assert_eq!(star.service_name.as_deref(), Some("=ens0"));
    assert_eq!(star.service_namespace_import_idx, Some(0));
    assert_eq!(star.target, set.module_by_name("src/b"));
}

#[test]
fn orphan_service_export_is_malformed() {
    let mut program = Program::new();
    let table = table_literals(&["./b"], &[], &[], &[("=ens0", "ns")], &[], &[]);
    add_module(&mut program, "src/index", table, &[]);

    let err = ModuleSet::build(&program).unwrap_err();
    assert!(matches!(err, ModuleError::MalformedModuleTable { .. }));
}

#[test]
fn hierarchy_reconstruction() {
    let mut program = Program::new();
    let table = table_literals(&[], &[], &[], &[], &[], &[]);
    add_module(&mut program, "m", table, &[]);

    program.add_function(Function::new("m.func_main_0", Dialect::Dynamic));
    program.add_function(Function::new("m.&#utils", Dialect::Dynamic));
    program.add_function(Function::new("m.&utils#helper", Dialect::Dynamic));
    program.add_function(Function::new("m.~Widget=#ctor", Dialect::Dynamic));
    program.add_function(Function::new("m.~Widget#render", Dialect::Dynamic));
    program.add_function(Function::new("m.*helper#inner", Dialect::Dynamic));

    let set = ModuleSet::build(&program).unwrap();
    let module = set.module_by_name("m").unwrap();
    let node = set.module(module);

    // One namespace at module level.
    assert_eq!(node.namespaces.len(), 1);
    let ns = &set.namespaces[node.namespaces[0].index()];
    assert_eq!(ns.name, "utils");
    assert_eq!(ns.functions.len(), 1);

    // helper lives under the namespace; inner nests under helper.
    let helper = &set.functions[ns.functions[0].index()];
    assert_eq!(helper.plain_name, "helper");
    assert_eq!(helper.nested.len(), 1);
    let inner = &set.functions[helper.nested[0].index()];
    assert_eq!(inner.plain_name, "inner");
    assert_eq!(inner.parent, ParentRef::Function(ns.functions[0]));

    // Widget is a module-level class; render is its method.
    assert_eq!(node.classes.len(), 1);
    let class = &set.classes[node.classes[0].index()];
    assert_eq!(class.name, "Widget");
    assert_eq!(class.methods.len(), 1);
    assert_eq!(
        set.functions[class.methods[0].index()].plain_name,
        "render"
    );

    // The entry point stays at module level.
    assert!(
        node.functions
            .iter()
            .any(|f| set.functions[f.index()].plain_name == "func_main_0")
    );
}

#[test]
fn scoped_names_demangle_during_hierarchy_building() {
    let mut program = Program::new();
    let table = table_literals(&[], &[], &[], &[], &[], &[]);
    add_module(&mut program, "m", table, &["utils"]);

    program.add_function(Function::new("m.&#@0", Dialect::Dynamic));
    program.add_function(Function::new("m.&@0#helper", Dialect::Dynamic));

    let set = ModuleSet::build(&program).unwrap();
    let module = set.module_by_name("m").unwrap();
    let ns = &set.namespaces[set.module(module).namespaces[0].index()];
    assert_eq!(ns.name, "utils");
    assert_eq!(ns.functions.len(), 1);
}

#[test]
fn unresolved_namespace_parent_is_reported() {
    let mut program = Program::new();
    let table = table_literals(&[], &[], &[], &[], &[], &[]);
    add_module(&mut program, "m", table, &[]);
    program.add_function(Function::new("m.&ghost#f", Dialect::Dynamic));

    let err = ModuleSet::build(&program).unwrap_err();
    assert!(matches!(err, ModuleError::UnresolvedParent { parent, .. } if parent == "ghost"));
}

#[test]
fn annotation_interfaces_attach_to_their_module() {
    let mut program = Program::new();
    let table = table_literals(&[], &[], &[], &[], &[], &[]);
    add_module(&mut program, "m", table, &[]);

    let mut anno = Record::new("m.Log", Dialect::Dynamic);
    anno.metadata.annotation = Some(AnnotationKind::Runtime);
    anno.fields.push(Field::new("level", "i32"));
    program.add_record(anno);

    let set = ModuleSet::build(&program).unwrap();
    let module = set.module_by_name("m").unwrap();
    let node = set.module(module);
    assert_eq!(node.annotation_interfaces.len(), 1);
    let iface = &set.annotation_interfaces[node.annotation_interfaces[0].index()];
    assert_eq!(iface.name, "Log");
    assert_eq!(iface.fields.len(), 1);
}

#[test]
fn service_annotations_are_filtered_from_functions() {
    let mut program = Program::new();
    let table = table_literals(&[], &[], &[], &[], &[], &[]);
    add_module(&mut program, "m", table, &[]);

    let mut function = Function::new("m.func_main_0", Dialect::Dynamic);
    function.annotations.push(AnnotationData::new("_SlotNumber"));
    function.annotations.push(AnnotationData::new("m.Log"));
    program.add_function(function);

    let set = ModuleSet::build(&program).unwrap();
    let module = set.module_by_name("m").unwrap();
    let id = set.module(module).functions[0];
    let node = &set.functions[id.index()];
    assert_eq!(node.annotations.len(), 1);
    assert_eq!(node.annotations[0].name, "m.Log");
}
